//! EventSink port - イベント記録の抽象化
//!
//! Emission is fire-and-forget: a sink that cannot record an event must not
//! fail the reconciliation that produced it.

use crate::domain::JobEvent;

pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}
