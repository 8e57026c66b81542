//! Per-run limits and policies.

use serde::Deserialize;

/// What to do with a pointer whose target cannot be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidPointerPolicy {
    /// Fail the run with [`FlattenError::InvalidRead`](crate::FlattenError::InvalidRead).
    #[default]
    Abort,
    /// Log a warning and record the pointer as having no target.
    TreatAsNull,
}

/// Limits for one flattening run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlattenConfig {
    /// Maximum size of the flattened data (default: 256 MiB).
    pub max_size: u64,
    /// Longest text followed through a text field, terminator excluded (default: 1 MiB).
    pub max_string_len: usize,
    /// Most elements walked in one container (default: 1,048,576).
    pub max_container_len: usize,
    pub invalid_pointers: InvalidPointerPolicy,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        Self {
            max_size: 256 << 20,
            max_string_len: 1 << 20,
            max_container_len: 1 << 20,
            invalid_pointers: InvalidPointerPolicy::Abort,
        }
    }
}

impl FlattenConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the data size limit.
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = bytes;
        self
    }

    pub fn max_string_len(mut self, len: usize) -> Self {
        self.max_string_len = len;
        self
    }

    pub fn max_container_len(mut self, len: usize) -> Self {
        self.max_container_len = len;
        self
    }

    pub fn invalid_pointers(mut self, policy: InvalidPointerPolicy) -> Self {
        self.invalid_pointers = policy;
        self
    }
}
