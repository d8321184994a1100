// Interview flow: question bank, session bookkeeping, HTTP handlers.
// Scoring and report synthesis are delegated to evaluation::Evaluator.

pub mod handlers;
pub mod questions;
pub mod store;
