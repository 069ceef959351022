//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryJobStore**: versioned job store with change notifications
//! - **InMemoryExecutionClient**: execution units and identity bindings
//! - **SimulatedBackend**: scripted quantum backend
//! - **TracingEventSink / RecordingEventSink**: event recording

pub mod event_sinks;
pub mod inmem_cluster;
pub mod inmem_store;
pub mod sim_backend;

pub use self::event_sinks::{RecordingEventSink, TracingEventSink};
pub use self::inmem_cluster::{ClusterOp, InMemoryExecutionClient};
pub use self::inmem_store::InMemoryJobStore;
pub use self::sim_backend::{SimOutcome, SimulatedBackend};
