//! Per-cycle outcome accumulator
//!
//! One `UpdateStatus` belongs to exactly one sync cycle. The engine only appends to it;
//! callers read it once the cycle returns. Sharing an instance between concurrent cycles
//! mixes their outcomes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    successful_updates: Vec<String>,
    failed_updates: Vec<String>,
    successful_deletes: Vec<String>,
    failed_deletes: Vec<String>,
}

impl UpdateStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_successful_update(&mut self, path: impl Into<String>) {
        self.successful_updates.push(path.into());
    }

    pub fn add_failed_update(&mut self, path: impl Into<String>) {
        self.failed_updates.push(path.into());
    }

    pub fn add_successful_delete(&mut self, path: impl Into<String>) {
        self.successful_deletes.push(path.into());
    }

    pub fn add_failed_delete(&mut self, path: impl Into<String>) {
        self.failed_deletes.push(path.into());
    }

    pub fn successful_updates(&self) -> &[String] {
        &self.successful_updates
    }

    pub fn failed_updates(&self) -> &[String] {
        &self.failed_updates
    }

    pub fn successful_deletes(&self) -> &[String] {
        &self.successful_deletes
    }

    pub fn failed_deletes(&self) -> &[String] {
        &self.failed_deletes
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_updates.is_empty() || !self.failed_deletes.is_empty()
    }

    /// Total number of recorded outcomes
    pub fn total(&self) -> usize {
        self.successful_updates.len()
            + self.failed_updates.len()
            + self.successful_deletes.len()
            + self.failed_deletes.len()
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} updated, {} update failures, {} deleted, {} delete failures",
            self.successful_updates.len(),
            self.failed_updates.len(),
            self.successful_deletes.len(),
            self.failed_deletes.len()
        )
    }
}
