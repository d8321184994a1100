use std::sync::Arc;

use crate::evaluation::Evaluator;
use crate::interview::questions::QuestionBank;
use crate::interview::store::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup, read-only afterwards.
    pub questions: Arc<QuestionBank>,
    /// Pluggable session repository. Default: InMemorySessionStore.
    pub sessions: Arc<dyn SessionStore>,
    pub evaluator: Evaluator,
}
