//! Stage environment handling.
//!
//! The pipeline carries an explicit base environment instead of mutating the
//! process environment. Each stage sees `base` layered with its own overrides.

use std::collections::BTreeMap;

/// Ordered mapping of environment variable name to value.
pub type Environment = BTreeMap<String, String>;

/// Variable that escalates rustc and clippy warnings to errors.
pub const WARNINGS_FLAG_VAR: &str = "RUSTFLAGS";

/// Value of [`WARNINGS_FLAG_VAR`] that denies all warnings.
pub const WARNINGS_FLAG_VALUE: &str = "-Dwarnings";

/// The blanket base environment applied to every stage.
pub fn warnings_as_errors() -> Environment {
    let mut env = Environment::new();
    env.insert(WARNINGS_FLAG_VAR.to_string(), WARNINGS_FLAG_VALUE.to_string());
    env
}

/// Merge `overrides` on top of `base`. Overrides win on conflicting keys.
pub fn merge(base: &Environment, overrides: &Environment) -> Environment {
    let mut merged = base.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
