pub mod subscriber;

pub const DEFAULT_JSON_LOG_FILE: &str = "log.json";

// log record fields:
pub const EVENT_FIELD: &str = "event";
pub const LINE_FIELD: &str = "line";
pub const RULE_FIELD: &str = "rule";
pub const FORMULA_FIELD: &str = "formula";
pub const RESULT_FIELD: &str = "result";
pub const METHOD_FIELD: &str = "method";
pub const DESCRIPTION_FIELD: &str = "description";

// log span types:
/// Inside the check of a derivation.
pub const CHECK: &str = "@check";

/// Inside an equivalence test.
pub const PROVE: &str = "@prove";

// log event types:
/// A line is read.
pub const LINE: &str = "@line";

/// A citation is resolved.
pub const CITATION: &str = "@citation";

/// A line is matched against a form of its rule.
pub const MATCH: &str = "@match";

/// An error is recorded.
pub const ERROR: &str = "@error";

/// An error is propagated to a dependent line.
pub const DEPENDENCY: &str = "@dependency";

/// The credit of a derivation is computed.
pub const CREDIT: &str = "@credit";

/// An equivalence test is decided by one of its methods.
pub const EQUIVALENCE: &str = "@equivalence";

/// A tableau branch is closed, saturated or abandoned.
pub const BRANCH: &str = "@branch";
