pub use crate::{formula::Op, notation::Notation, ParseContext};
use std::collections::BTreeSet;

pub fn standard() -> ParseContext {
    ParseContext::new(Notation::standard())
}

pub fn classic() -> ParseContext {
    ParseContext::new(Notation::classic())
}

pub fn set(items: &[char]) -> BTreeSet<char> {
    items.iter().cloned().collect()
}
