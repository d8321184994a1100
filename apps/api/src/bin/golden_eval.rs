//! Golden dataset check. Runs expert-graded sample answers through the rubric
//! and prints the model's verdict next to the expert's, for manual calibration.
//!
//! Usage: `golden-eval [path/to/golden_dataset.json]`

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use interview_api::config::Config;
use interview_api::evaluation::Evaluator;
use interview_api::llm_client::LlmClient;

const DEFAULT_DATASET: &str = "golden_dataset.json";

#[derive(Debug, Deserialize)]
struct GoldenQuestion {
    question: String,
    samples: Vec<GoldenSample>,
}

#[derive(Debug, Deserialize)]
struct GoldenSample {
    id: String,
    answer: String,
    expert_evaluation: String,
}

fn parse_dataset(raw: &str) -> Result<Vec<GoldenQuestion>> {
    serde_json::from_str(raw).context("golden dataset must be [{question, samples: [...]}]")
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DATASET.to_string());
    let raw = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
    let dataset = parse_dataset(&raw)?;

    let llm = LlmClient::new(config.gateway_settings())?;
    let evaluator = Evaluator::new(Arc::new(llm), config.evaluator_settings());

    println!("--- Golden dataset validation ({path}) ---");
    let rule = "=".repeat(60);

    for item in &dataset {
        for sample in &item.samples {
            let result = evaluator.evaluate_answer(&item.question, &sample.answer).await;

            println!("\n{rule}\nSAMPLE: {}\n{rule}", sample.id.to_uppercase());
            println!("QUESTION: {}", item.question);
            println!("ANSWER:   {}", sample.answer);
            println!("{}", "-".repeat(60));
            println!("EXPERT:\n  {}", sample.expert_evaluation);
            println!("{}", "-".repeat(60));
            println!("MODEL:\n  Score: {}/5\n  Rationale: {}", result.score, result.rationale);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dataset() {
        let dataset = parse_dataset(
            r#"[{"question": "What does VLOOKUP do?",
                 "samples": [{"id": "strong", "answer": "Searches the first column...",
                              "expert_evaluation": "Complete and accurate."}]}]"#,
        )
        .unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset[0].samples[0].id, "strong");
    }

    #[test]
    fn test_parse_dataset_rejects_wrong_shape() {
        assert!(parse_dataset(r#"{"question": "q"}"#).is_err());
    }
}
