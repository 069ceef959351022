//! IdGenerator port - ID 生成の抽象化
//!
//! The store asks for a uid when a job is created; the reconciler asks for a
//! pass id to correlate the log lines of one reconciliation.

use crate::domain::ids::{JobUid, PassId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は ULID ベースの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数ワーカーから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_job_uid(&self) -> JobUid;

    fn generate_pass_id(&self) -> PassId;
}

/// ULID generator whose timestamp half comes from a `Clock`.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_job_uid(&self) -> JobUid {
        JobUid::from(self.next_ulid())
    }

    fn generate_pass_id(&self) -> PassId {
        PassId::from(self.next_ulid())
    }
}
