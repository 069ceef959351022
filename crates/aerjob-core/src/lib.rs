//! aerjob-core
//!
//! Level-triggered reconciliation of quantum execution jobs.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, key, job, phase, requeue, errors, events, execution）
//! - **ports**: 抽象化レイヤー（JobStore, ExecutionClient, QuantumBackend, Clock, など）
//! - **queue**: key 単位の重複排除つきワークキュー（遅延・バックオフ）
//! - **app**: アプリケーションロジック（reconciler, handlers, registry, controller）
//! - **impls**: 実装（InMemoryJobStore など開発用）
//! - **config**: TOML 設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
