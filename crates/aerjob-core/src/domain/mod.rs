//! Domain model (identity, job resource, phases, requeue directives, errors, events).

pub mod errors;
pub mod events;
pub mod execution;
pub mod ids;
pub mod job;
pub mod key;
pub mod phase;
pub mod requeue;

pub use self::errors::{BackendError, ClusterError, ErrorKind, ReconcileError, StoreError};
pub use self::events::{EventReason, JobEvent};
pub use self::execution::{
    BackendPoll, ExecutionUnit, ExecutionUnitSpec, IdentityBindingSpec, JOB_LABEL,
    NAMESPACE_LABEL, OwnerRef, SubmitRequest, UnitPhase,
};
pub use self::ids::{JobUid, PassId};
pub use self::job::{AerJob, AerJobSpec, AerJobStatus, ObjectMeta};
pub use self::key::{ParseKeyError, ResourceKey};
pub use self::phase::JobPhase;
pub use self::requeue::Requeue;
