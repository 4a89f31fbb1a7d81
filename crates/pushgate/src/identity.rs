//! Pipeline identity.
//!
//! A pipeline's digest covers the ordered stage names, their commands and the
//! environment each stage sees, so two runs with the same digest executed the
//! same checks.

use crate::env::{self, Environment};
use crate::stage::StageConfig;
use sha2::{Digest, Sha256};

/// Compute a deterministic, order-sensitive digest of a stage list.
pub fn compute_pipeline_digest(stages: &[StageConfig], base_env: &Environment) -> String {
    let mut hasher = Sha256::new();
    for stage in stages {
        hasher.update(stage.name.as_bytes());
        hasher.update(b"\0");
        for arg in &stage.command {
            hasher.update(arg.as_bytes());
            hasher.update(b"\x1f");
        }
        hasher.update(b"\0");
        // BTreeMap iteration is sorted, so the env contribution is stable.
        for (key, value) in env::merge(base_env, &stage.env) {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        hasher.update(b"\x1e");
    }
    hex::encode(hasher.finalize())
}

/// Short digest (first 12 chars), for log lines.
pub fn short_digest(digest: &str) -> &str {
    &digest[..12.min(digest.len())]
}
