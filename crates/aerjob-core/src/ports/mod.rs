//! Ports - 抽象化レイヤー
//!
//! Every external collaborator of the reconciliation core is a trait here:
//! the job store, the execution-resource client, the quantum backend, the
//! clock, id generation and event recording. In-memory implementations live
//! in `impls`.

pub mod backend;
pub mod clock;
pub mod event_sink;
pub mod execution_client;
pub mod id_generator;
pub mod job_store;

pub use self::backend::QuantumBackend;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::execution_client::ExecutionClient;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job_store::JobStore;
