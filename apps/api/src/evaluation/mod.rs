// Answer evaluation and report synthesis.
// All model calls go through llm_client::ModelGateway, never direct HTTP.

pub mod evaluator;
pub mod models;
pub mod normalize;
pub mod prompts;

pub use evaluator::{EvaluationError, Evaluator, EvaluatorSettings};
pub use models::{AnswerEvaluation, FinalReport, TranscriptEntry};
