//! Job lifecycle phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a job resource.
///
/// State transitions:
/// - New -> Pending -> Progress -> Completed
/// - New -> Pending -> Progress -> Failed
/// - New -> Pending -> Failed (execution resources rejected)
/// - New | Pending | Progress -> Failed (timeout)
///
/// `New` is the phase of a resource no reconciliation has acted on yet. On the
/// wire it is accepted as an absent field or an empty string. Values written
/// by a newer schema decode to `Unknown` instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobPhase {
    #[default]
    New,
    Pending,
    Progress,
    Completed,
    Failed,
    Unknown(String),
}

impl JobPhase {
    /// The five phases the controller knows how to handle.
    pub const KNOWN: [JobPhase; 5] = [
        JobPhase::New,
        JobPhase::Pending,
        JobPhase::Progress,
        JobPhase::Completed,
        JobPhase::Failed,
    ];

    /// Is this a terminal phase (no further transitions)?
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Completed | JobPhase::Failed)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, JobPhase::Unknown(_))
    }

    /// Whether `self -> next` is a legal edge of the lifecycle.
    pub fn can_transition_to(&self, next: &JobPhase) -> bool {
        use JobPhase::*;
        matches!(
            (self, next),
            (New, Pending)
                | (Pending, Progress)
                | (Progress, Completed)
                | (New | Pending | Progress, Failed)
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobPhase::New => "New",
            JobPhase::Pending => "Pending",
            JobPhase::Progress => "Progress",
            JobPhase::Completed => "Completed",
            JobPhase::Failed => "Failed",
            JobPhase::Unknown(raw) => raw,
        }
    }
}

impl From<String> for JobPhase {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "" | "New" => JobPhase::New,
            "Pending" => JobPhase::Pending,
            "Progress" => JobPhase::Progress,
            "Completed" => JobPhase::Completed,
            "Failed" => JobPhase::Failed,
            _ => JobPhase::Unknown(raw),
        }
    }
}

impl From<JobPhase> for String {
    fn from(phase: JobPhase) -> Self {
        match phase {
            JobPhase::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
