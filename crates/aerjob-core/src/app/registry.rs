//! HandlerRegistry - フェーズとハンドラの対応表
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）: 既知フェーズ全てにハンドラが必要
//! - 構築後は immutable（ロック不要）

use std::collections::HashMap;
use std::sync::Arc;

use super::handlers::{
    CompletedHandler, FailedHandler, NewJobHandler, PendingHandler, PhaseHandler, RunningHandler,
    TimeoutHandler,
};
use crate::domain::JobPhase;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a handler is already registered for phase {0}")]
    AlreadyRegistered(JobPhase),

    #[error("phase {0} cannot have a handler")]
    UnknownPhase(JobPhase),
}

/// BuildError はレジストリ構築時のエラー
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Missing handlers for phases: {0:?}. Every known phase must be handled.")]
    MissingPhases(Vec<JobPhase>),

    #[error("No timeout handler registered.")]
    MissingTimeoutHandler,
}

/// Registry of handlers (phase -> handler), plus the timeout handler that
/// pre-empts them.
pub struct HandlerRegistry {
    handlers: HashMap<JobPhase, Arc<dyn PhaseHandler>>,
    timeout: Arc<dyn PhaseHandler>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::new()
    }

    /// The production wiring: one handler per known phase.
    pub fn standard() -> Self {
        Self {
            handlers: HashMap::from([
                (JobPhase::New, Arc::new(NewJobHandler) as Arc<dyn PhaseHandler>),
                (JobPhase::Pending, Arc::new(PendingHandler) as Arc<dyn PhaseHandler>),
                (JobPhase::Progress, Arc::new(RunningHandler) as Arc<dyn PhaseHandler>),
                (JobPhase::Completed, Arc::new(CompletedHandler) as Arc<dyn PhaseHandler>),
                (JobPhase::Failed, Arc::new(FailedHandler) as Arc<dyn PhaseHandler>),
            ]),
            timeout: Arc::new(TimeoutHandler),
        }
    }

    pub fn get(&self, phase: &JobPhase) -> Option<&Arc<dyn PhaseHandler>> {
        self.handlers.get(phase)
    }

    pub fn timeout(&self) -> &Arc<dyn PhaseHandler> {
        &self.timeout
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// # 使用例
/// ```ignore
/// let registry = HandlerRegistry::builder()
///     .register(JobPhase::New, Arc::new(NewJobHandler))?
///     // ...
///     .timeout(Arc::new(TimeoutHandler))
///     .build()?;
/// ```
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<JobPhase, Arc<dyn PhaseHandler>>,
    timeout: Option<Arc<dyn PhaseHandler>>,
}

impl HandlerRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        phase: JobPhase,
        handler: Arc<dyn PhaseHandler>,
    ) -> Result<Self, RegistryError> {
        if !phase.is_known() {
            return Err(RegistryError::UnknownPhase(phase));
        }
        if self.handlers.contains_key(&phase) {
            return Err(RegistryError::AlreadyRegistered(phase));
        }
        self.handlers.insert(phase, handler);
        Ok(self)
    }

    pub fn timeout(mut self, handler: Arc<dyn PhaseHandler>) -> Self {
        self.timeout = Some(handler);
        self
    }

    /// # 検証
    /// - 既知の5フェーズ全てにハンドラが登録されているかチェック
    /// - timeout ハンドラが登録されているかチェック
    pub fn build(self) -> Result<HandlerRegistry, BuildError> {
        let missing: Vec<JobPhase> = JobPhase::KNOWN
            .iter()
            .filter(|phase| !self.handlers.contains_key(*phase))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(BuildError::MissingPhases(missing));
        }
        let timeout = self.timeout.ok_or(BuildError::MissingTimeoutHandler)?;
        Ok(HandlerRegistry {
            handlers: self.handlers,
            timeout,
        })
    }
}
