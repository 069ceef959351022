//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Context**: ports と設定の束
//! - **Reconciler**: 1 key に対する 1 回の reconcile（timeout 判定 → フェーズ別ハンドラ）
//! - **HandlerRegistry**: フェーズ → ハンドラの対応表（起動時検証つき）
//! - **Controller**: 通知 → キュー → ワーカー
//! - **status_writer**: status を変更する唯一の経路

pub mod context;
pub mod controller;
pub mod handlers;
pub mod reconciler;
pub mod registry;
pub mod status;
pub mod status_writer;
pub mod timeout;

#[cfg(test)]
pub(crate) mod testing;

// 主要な型を再エクスポート
pub use self::context::Context;
pub use self::controller::{Controller, ControllerHandle};
pub use self::handlers::PhaseHandler;
pub use self::reconciler::Reconciler;
pub use self::registry::{BuildError, HandlerRegistry, HandlerRegistryBuilder, RegistryError};
pub use self::status::{ControllerStatus, PhaseCounts, controller_status, phase_counts};
pub use self::timeout::TimeoutCheck;
