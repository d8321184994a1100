use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Score carried by an evaluation that could not be produced.
pub const SENTINEL_SCORE: u8 = 0;

/// Highest score the rubric allows.
pub const MAX_ANSWER_SCORE: u8 = 5;

/// Upper bound of the report's proficiency scale.
pub const MAX_PROFICIENCY_SCORE: u32 = 100;

/// Rubric result for one answer.
///
/// `score` is in `1..=5`, or `SENTINEL_SCORE` when evaluation failed.
/// Serialized with the `evaluation` key the rubric prompt and the frontend use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    pub score: u8,
    #[serde(rename = "evaluation", alias = "rationale")]
    pub rationale: String,
}

impl AnswerEvaluation {
    /// Placeholder result for an answer the model could not score.
    pub fn sentinel(cause: impl Display) -> Self {
        Self {
            score: SENTINEL_SCORE,
            rationale: format!("An error occurred during evaluation: {cause}"),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.score == SENTINEL_SCORE
    }
}

/// One answered question, in the order it was asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
    pub evaluation: AnswerEvaluation,
}

/// End-of-interview hiring report. Every field is always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub overall_recommendation: String,
    /// 0 – 100
    pub proficiency_score: u32,
    /// Newline-separated `- ` bullets.
    pub key_strengths: String,
    /// Newline-separated `- ` bullets.
    pub areas_for_improvement: String,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_evaluation_serializes_evaluation_key() {
        let eval = AnswerEvaluation {
            score: 4,
            rationale: "Solid".to_string(),
        };
        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(json["score"], 4);
        assert_eq!(json["evaluation"], "Solid");
        assert!(json.get("rationale").is_none());
    }

    #[test]
    fn test_answer_evaluation_accepts_rationale_alias() {
        let eval: AnswerEvaluation =
            serde_json::from_str(r#"{"score": 2, "rationale": "Thin"}"#).unwrap();
        assert_eq!(eval.rationale, "Thin");
    }

    #[test]
    fn test_sentinel_carries_cause() {
        let eval = AnswerEvaluation::sentinel("connection refused");
        assert!(eval.is_sentinel());
        assert_eq!(
            eval.rationale,
            "An error occurred during evaluation: connection refused"
        );
    }
}
