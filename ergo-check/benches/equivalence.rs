use criterion::{criterion_group, criterion_main, Criterion};
use ergo_check::{
    checker::{Checker, Problem},
    config::{CheckOptions, ProverConfig},
    derivation::DerivationBuilder,
    equivalence::Prover,
    schema::System,
};
use ergo_fol::ParseContext;

const PAIRS: &[(&str, &str)] = &[
    ("¬(P ∧ Q)", "¬P ∨ ¬Q"),
    ("P → (Q → R)", "(P ∧ Q) → R"),
    ("(P ↔ Q) ↔ R", "P ↔ (Q ↔ R)"),
    ("P ∨ Q", "P ∧ Q"),
    ("¬∀x(Fx → Gx)", "∃x(Fx ∧ ¬Gx)"),
    ("∀x(Fx ∧ Gx)", "∀xFx ∧ ∀xGx"),
    ("∃x(Fx ∨ Gx)", "∃xFx ∨ ∃xGx"),
    ("∀x∃yRxy", "∃y∀xRxy"),
];

fn propositional_benchmark(c: &mut Criterion) {
    c.bench_function("propositional", |b| b.iter(|| time_pairs(&PAIRS[..4])));
}

fn quantified_benchmark(c: &mut Criterion) {
    c.bench_function("quantified", |b| b.iter(|| time_pairs(&PAIRS[4..])));
}

fn check_benchmark(c: &mut Criterion) {
    c.bench_function("check", |b| b.iter(time_check));
}

fn time_pairs(pairs: &[(&str, &str)]) {
    let ctx = ParseContext::default();
    let config = ProverConfig::default();
    let prover = Prover::new(&ctx, &config);
    for (first, second) in pairs {
        prover.equivalent(&ctx.parse(first), &ctx.parse(second));
    }
}

fn time_check() {
    let ctx = ParseContext::default();
    let system = System::builtin("fitch").unwrap();
    let options = CheckOptions::default();
    let problem = Problem::parse(&ctx, &["P ∨ Q".into()], "Q ∨ P");

    let mut builder = DerivationBuilder::new();
    builder
        .line(1, "P ∨ Q", "Pr")
        .open()
        .line(2, "P", "Hyp")
        .line(3, "Q ∨ P", "2 ∨I")
        .close()
        .open()
        .line(4, "Q", "Hyp")
        .line(5, "Q ∨ P", "4 ∨I")
        .close()
        .line(6, "Q ∨ P", "1, 2–3, 4–5 ∨E");
    Checker::new(&ctx, &system, &options).check(&problem, &builder.build());
}

criterion_group!(
    benches,
    propositional_benchmark,
    quantified_benchmark,
    check_benchmark
);
criterion_main!(benches);
