//! Status state machines
//!
//! `BatchStatus` is the internal lifecycle state shared by job and step
//! executions. `ExitStatus` is the human-facing outcome: a code plus a
//! free-form description, used to drive flow transitions and surface
//! failure causes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a job or step execution.
///
/// Variants are declared in severity order so that `upgrade_to` can pick
/// the more severe of two statuses when aggregating step outcomes into a
/// job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Execution finished without unrecoverable failure
    Completed,
    /// Execution record created, work not yet begun
    Starting,
    /// Work in progress
    Started,
    /// Stop requested, waiting for the next chunk boundary
    Stopping,
    /// Stopped cooperatively before completion
    Stopped,
    /// Unrecoverable failure
    Failed,
    /// Marked dead by an operator; never resumed
    Abandoned,
}

impl BatchStatus {
    /// Whether the execution is still in flight.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Starting | Self::Started | Self::Stopping)
    }

    /// Whether this status can never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Stopped | Self::Failed | Self::Abandoned
        )
    }

    /// Whether the execution ended without reaching a successful end state.
    pub fn is_unsuccessful(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed | Self::Abandoned)
    }

    /// Return the more severe of `self` and `other`, except that a
    /// running status yields to COMPLETED so a finishing execution is not
    /// pinned at STARTED.
    pub fn upgrade_to(self, other: BatchStatus) -> BatchStatus {
        if self > Self::Started || other > Self::Started {
            return self.max(other);
        }
        if self == Self::Completed || other == Self::Completed {
            return Self::Completed;
        }
        self.max(other)
    }

    /// Stable string form used for persistence.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "COMPLETED",
            Self::Starting => "STARTING",
            Self::Started => "STARTED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Failed => "FAILED",
            Self::Abandoned => "ABANDONED",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COMPLETED" => Some(Self::Completed),
            "STARTING" => Some(Self::Starting),
            "STARTED" => Some(Self::Started),
            "STOPPING" => Some(Self::Stopping),
            "STOPPED" => Some(Self::Stopped),
            "FAILED" => Some(Self::Failed),
            "ABANDONED" => Some(Self::Abandoned),
            _ => None,
        }
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-facing outcome of an execution: a code and a description.
///
/// Distinct from [`BatchStatus`]: the exit code is what flow transitions
/// match against and what operators read, so steps may return custom codes
/// beyond the standard set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitStatus {
    pub exit_code: String,
    pub exit_description: String,
}

impl ExitStatus {
    pub const UNKNOWN: &'static str = "UNKNOWN";
    pub const EXECUTING: &'static str = "EXECUTING";
    pub const COMPLETED: &'static str = "COMPLETED";
    pub const NOOP: &'static str = "NOOP";
    pub const STOPPED: &'static str = "STOPPED";
    pub const FAILED: &'static str = "FAILED";

    pub fn new(exit_code: impl Into<String>) -> Self {
        Self {
            exit_code: exit_code.into(),
            exit_description: String::new(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(Self::UNKNOWN)
    }

    pub fn executing() -> Self {
        Self::new(Self::EXECUTING)
    }

    pub fn completed() -> Self {
        Self::new(Self::COMPLETED)
    }

    pub fn noop() -> Self {
        Self::new(Self::NOOP)
    }

    pub fn stopped() -> Self {
        Self::new(Self::STOPPED)
    }

    pub fn failed() -> Self {
        Self::new(Self::FAILED)
    }

    /// Append to the description, separating entries with `;`.
    pub fn add_description(mut self, description: impl AsRef<str>) -> Self {
        let description = description.as_ref();
        if description.is_empty() {
            return self;
        }
        if !self.exit_description.is_empty() {
            self.exit_description.push_str("; ");
        }
        self.exit_description.push_str(description);
        self
    }

    /// Combine with another exit status, keeping the more severe code and
    /// concatenating descriptions.
    pub fn and_then(self, other: ExitStatus) -> ExitStatus {
        let description = other.exit_description.clone();
        if severity(&other.exit_code) > severity(&self.exit_code) {
            ExitStatus {
                exit_code: other.exit_code,
                exit_description: self.exit_description,
            }
            .add_description(description)
        } else {
            self.add_description(description)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.exit_code == Self::COMPLETED
    }
}

impl Default for ExitStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.exit_code, self.exit_description)
    }
}

/// Severity order for combining exit codes. Custom codes rank just above
/// COMPLETED so they survive combination with the standard success code.
fn severity(code: &str) -> u8 {
    match code {
        ExitStatus::EXECUTING => 1,
        ExitStatus::COMPLETED => 2,
        ExitStatus::NOOP => 4,
        ExitStatus::STOPPED => 5,
        ExitStatus::FAILED => 6,
        ExitStatus::UNKNOWN => 7,
        _ => 3,
    }
}
