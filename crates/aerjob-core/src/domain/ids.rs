//! Strongly-typed identifiers.
//!
//! `Id<T>` wraps a ULID and uses a phantom marker so that ids of different
//! resources cannot be mixed up. The marker only supplies the display prefix.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for id kinds.
pub trait IdMarker: Send + Sync + 'static {
    /// Prefix used by `Display` (for example `"job-"`).
    fn prefix() -> &'static str;
}

/// Generic ULID-backed id.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for job resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Job {}

impl IdMarker for Job {
    fn prefix() -> &'static str {
        "job-"
    }
}

/// Marker for one reconciliation pass (log correlation only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Pass {}

impl IdMarker for Pass {
    fn prefix() -> &'static str {
        "pass-"
    }
}

/// Uid assigned by the store when a job resource is created.
///
/// Execution resources carry it as their owner reference, which is what
/// lets garbage collection find them after the job is deleted.
pub type JobUid = Id<Job>;

/// Identifier of a single reconciliation pass.
pub type PassId = Id<Pass>;
