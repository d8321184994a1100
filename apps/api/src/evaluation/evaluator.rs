//! Evaluation Orchestrator: prompt → one model call → normalized record.
//!
//! Failure policy is deliberately asymmetric:
//! - `evaluate_answer` never fails. A broken model call becomes a sentinel
//!   score of 0 so the interview keeps moving.
//! - `synthesize_report` fails loudly. A report is the final deliverable and
//!   must never be fabricated from a broken response.
//!
//! Neither entry point retries; transient retries belong to the gateway.

use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::evaluation::models::{AnswerEvaluation, FinalReport, TranscriptEntry};
use crate::evaluation::normalize::{
    normalize_evaluation, normalize_report, CoercionWarning, NormalizeFailure,
    REPORT_RECOMMENDATION,
};
use crate::evaluation::prompts::{render_transcript, rubric_prompt, synthesis_prompt};
use crate::llm_client::{GatewayError, ModelGateway};

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("model gateway failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Normalize(#[from] NormalizeFailure),
}

/// Sampling temperatures per call type. Both stay at or below 0.5.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatorSettings {
    pub rubric_temperature: f32,
    pub synthesis_temperature: f32,
}

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            rubric_temperature: 0.1,
            synthesis_temperature: 0.3,
        }
    }
}

/// Stateless and cheap to clone; share one across all sessions.
#[derive(Clone)]
pub struct Evaluator {
    gateway: Arc<dyn ModelGateway>,
    settings: EvaluatorSettings,
}

impl Evaluator {
    pub fn new(gateway: Arc<dyn ModelGateway>, settings: EvaluatorSettings) -> Self {
        Self { gateway, settings }
    }

    /// Scores one answer against the rubric. Always returns a value.
    pub async fn evaluate_answer(&self, question: &str, answer: &str) -> AnswerEvaluation {
        let prompt = rubric_prompt(question, answer);

        let raw = match self
            .gateway
            .complete(&prompt, self.settings.rubric_temperature, true)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                error!("Answer evaluation failed at the gateway: {e}");
                return AnswerEvaluation::sentinel(e);
            }
        };

        let normalized = normalize_evaluation(&raw);
        log_drift("answer evaluation", normalized.warnings());

        match normalized.into_result() {
            Ok(evaluation) => evaluation,
            Err(failure) => {
                error!("Answer evaluation response unusable: {failure}");
                AnswerEvaluation::sentinel(failure)
            }
        }
    }

    /// Synthesizes the hiring report from the full ordered transcript.
    ///
    /// A degraded report is accepted unless the recommendation itself is missing.
    pub async fn synthesize_report(
        &self,
        transcript: &[TranscriptEntry],
    ) -> Result<FinalReport, EvaluationError> {
        let prompt = synthesis_prompt(&render_transcript(transcript));
        info!("Synthesizing report from {} transcript entries", transcript.len());

        let raw = self
            .gateway
            .complete(&prompt, self.settings.synthesis_temperature, true)
            .await?;

        let normalized = normalize_report(&raw);
        log_drift("report synthesis", normalized.warnings());

        if normalized.was_defaulted(REPORT_RECOMMENDATION.canonical) {
            return Err(
                NormalizeFailure::MissingCriticalField(REPORT_RECOMMENDATION.canonical).into(),
            );
        }

        Ok(normalized.into_result()?)
    }
}

fn log_drift(call: &str, warnings: &[CoercionWarning]) {
    for warning in warnings {
        warn!("{call}: model output drift, {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::mock::ScriptedGateway;

    fn evaluator(gateway: Arc<ScriptedGateway>) -> Evaluator {
        Evaluator::new(gateway, EvaluatorSettings::default())
    }

    fn transcript() -> Vec<TranscriptEntry> {
        vec![
            TranscriptEntry {
                question: "What does VLOOKUP do?".to_string(),
                answer: "It looks up a value".to_string(),
                evaluation: AnswerEvaluation {
                    score: 3,
                    rationale: "Reasonable but shallow".to_string(),
                },
            },
            TranscriptEntry {
                question: "What is a pivot table?".to_string(),
                answer: "A summary of data grouped by fields".to_string(),
                evaluation: AnswerEvaluation {
                    score: 4,
                    rationale: "Good".to_string(),
                },
            },
        ]
    }

    #[tokio::test]
    async fn test_evaluate_answer_coerces_string_score() {
        let gateway = Arc::new(ScriptedGateway::replying(&[
            r#"{"score":"3","evaluation":"Reasonable but shallow"}"#,
        ]));
        let result = evaluator(gateway.clone())
            .evaluate_answer("What does VLOOKUP do?", "It looks up a value")
            .await;

        assert_eq!(
            result,
            AnswerEvaluation {
                score: 3,
                rationale: "Reasonable but shallow".to_string(),
            }
        );

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("What does VLOOKUP do?"));
        assert!(calls[0].prompt.contains("It looks up a value"));
        assert!(calls[0].expect_json);
        assert!((calls[0].temperature - 0.1).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_evaluate_answer_gateway_failure_is_sentinel() {
        let gateway = Arc::new(ScriptedGateway::failing("connection refused"));
        let result = evaluator(gateway.clone()).evaluate_answer("q", "a").await;

        assert_eq!(result.score, 0);
        assert!(result.rationale.contains("connection refused"), "{}", result.rationale);
        // no silent retry
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_answer_malformed_json_is_sentinel() {
        let gateway = Arc::new(ScriptedGateway::replying(&["The answer is pretty good."]));
        let result = evaluator(gateway).evaluate_answer("q", "a").await;

        assert!(result.is_sentinel());
        assert!(result.rationale.contains("MalformedJSON"), "{}", result.rationale);
    }

    #[tokio::test]
    async fn test_evaluate_answer_missing_score_is_sentinel() {
        let gateway = Arc::new(ScriptedGateway::replying(&[r#"{"evaluation":"Nice"}"#]));
        let result = evaluator(gateway).evaluate_answer("q", "a").await;

        assert!(result.is_sentinel());
        assert!(result.rationale.contains("MissingCriticalField"));
    }

    #[tokio::test]
    async fn test_synthesize_report_renders_transcript_and_normalizes() {
        let gateway = Arc::new(ScriptedGateway::replying(&[r#"{
            "Recommendation": "Hire",
            "Overall_Skill_Score": "70/100",
            "Key_Strengths": ["Lookups", "Pivot tables"],
            "Areas_for_Improvement": ["Depth"],
            "Professional_Summary": "Competent."
        }"#]));
        let report = evaluator(gateway.clone())
            .synthesize_report(&transcript())
            .await
            .unwrap();

        assert_eq!(
            report,
            FinalReport {
                overall_recommendation: "Hire".to_string(),
                proficiency_score: 70,
                key_strengths: "- Lookups\n- Pivot tables".to_string(),
                areas_for_improvement: "- Depth".to_string(),
                summary: "Competent.".to_string(),
            }
        );

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0]
            .prompt
            .contains("Question 1: What does VLOOKUP do?\nAnswer: It looks up a value\nEvaluation: 3/5"));
        assert!(calls[0].prompt.contains("Question 2: What is a pivot table?"));
        assert!((calls[0].temperature - 0.3).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_synthesize_report_malformed_json_fails() {
        let gateway = Arc::new(ScriptedGateway::replying(&["Candidate seems fine overall."]));
        let err = evaluator(gateway)
            .synthesize_report(&transcript())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EvaluationError::Normalize(NormalizeFailure::MalformedJson(_))
        ));
        assert!(err.to_string().contains("MalformedJSON"));
    }

    #[tokio::test]
    async fn test_synthesize_report_gateway_failure_propagates() {
        let gateway = Arc::new(ScriptedGateway::failing("backend down"));
        let err = evaluator(gateway.clone())
            .synthesize_report(&transcript())
            .await
            .unwrap_err();

        assert!(matches!(err, EvaluationError::Gateway(_)));
        assert!(err.to_string().contains("backend down"));
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_synthesize_report_without_recommendation_fails() {
        let gateway = Arc::new(ScriptedGateway::replying(&[
            r#"{"proficiency_score": 60, "summary": "Okay."}"#,
        ]));
        let err = evaluator(gateway)
            .synthesize_report(&transcript())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EvaluationError::Normalize(NormalizeFailure::MissingCriticalField(
                "overall_recommendation"
            ))
        ));
    }

    #[tokio::test]
    async fn test_synthesize_report_accepts_missing_summary() {
        let gateway = Arc::new(ScriptedGateway::replying(&[
            r#"{"proficiency_score": 60, "overall_recommendation": "Do Not Hire"}"#,
        ]));
        let report = evaluator(gateway)
            .synthesize_report(&transcript())
            .await
            .unwrap();

        assert_eq!(report.summary, "N/A");
        assert_eq!(report.key_strengths, "");
    }

    #[tokio::test]
    async fn test_evaluate_answer_against_unreachable_backend() {
        use crate::llm_client::{GatewaySettings, LlmClient};
        use std::time::Duration;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = LlmClient::new(GatewaySettings {
            base_url: format!("http://{addr}/v1"),
            model: "phi3".to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
            max_retries: 0,
        })
        .unwrap();
        let evaluator = Evaluator::new(Arc::new(client), EvaluatorSettings::default());

        let result = evaluator.evaluate_answer("q", "a").await;
        assert_eq!(result.score, 0);
        assert!(result.rationale.starts_with("An error occurred during evaluation: HTTP error"));
    }

    #[tokio::test]
    async fn test_default_config_makes_one_attempt_per_call() {
        use crate::config::Config;
        use crate::llm_client::mock::StubBackend;
        use crate::llm_client::LlmClient;

        let backend = StubBackend::start(503, r#"{"error":{"message":"overloaded"}}"#).await;
        let base_url = backend.base_url.clone();
        let config = Config::from_lookup(|key| (key == "LLM_BASE_URL").then(|| base_url.clone()))
            .unwrap();
        let client = LlmClient::new(config.gateway_settings()).unwrap();
        let evaluator = Evaluator::new(Arc::new(client), config.evaluator_settings());

        let err = evaluator.synthesize_report(&transcript()).await.unwrap_err();
        assert!(matches!(
            err,
            EvaluationError::Gateway(GatewayError::Api { status: 503, .. })
        ));
        assert_eq!(backend.request_count(), 1);

        let result = evaluator.evaluate_answer("q", "a").await;
        assert!(result.is_sentinel());
        assert_eq!(backend.request_count(), 2);
    }
}
