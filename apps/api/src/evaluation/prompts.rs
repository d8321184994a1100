// Prompt templates for answer scoring and report synthesis.
// Placeholders are `{name}`; JSON braces in the templates are left untouched.

use crate::evaluation::models::TranscriptEntry;

/// Rubric prompt. Placeholders: `{question}`, `{answer}`.
pub const RUBRIC_PROMPT_TEMPLATE: &str = r#"You are an expert technical interviewer. Evaluate the candidate's answer to one interview question.

Judge the answer on three criteria:
- Correctness: is the information factually accurate?
- Completeness: does it cover the key aspects of the question?
- Clarity: is the explanation clear and easy to follow?

Assign an integer score from 1 to 5, where 1 is "Very Poor" and 5 is "Excellent".
Write a concise, professional rationale naming the strengths and weaknesses of the answer.

Return ONLY a JSON object with exactly these keys:
{"score": <integer 1-5>, "evaluation": "<rationale>"}

QUESTION:
{question}

CANDIDATE ANSWER:
{answer}"#;

/// Report synthesis prompt. Placeholder: `{transcript}`.
pub const SYNTHESIS_PROMPT_TEMPLATE: &str = r#"You are a senior hiring manager. Synthesize the interview transcript below into a concise executive report.

Do not re-grade question by question. Form a holistic view of the candidate's proficiency.

Return ONLY a JSON object with exactly these keys:
{
  "overall_recommendation": "Strong Hire" | "Hire" | "Hire with Reservations" | "Do Not Hire",
  "proficiency_score": <integer 1-100>,
  "key_strengths": "- strength one\n- strength two",
  "areas_for_improvement": "- area one\n- area two",
  "summary": "<2-3 sentence professional summary>"
}

RULES:
1. key_strengths and areas_for_improvement are SINGLE strings of 2-3 bullets, each line starting with "- "
2. proficiency_score is one integer, not a fraction or a range
3. Base every statement on the transcript only

INTERVIEW TRANSCRIPT:
{transcript}"#;

/// Which fixed template to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    Rubric,
    Synthesis,
}

impl PromptTemplate {
    pub fn text(self) -> &'static str {
        match self {
            PromptTemplate::Rubric => RUBRIC_PROMPT_TEMPLATE,
            PromptTemplate::Synthesis => SYNTHESIS_PROMPT_TEMPLATE,
        }
    }

    pub fn placeholders(self) -> &'static [&'static str] {
        match self {
            PromptTemplate::Rubric => &["question", "answer"],
            PromptTemplate::Synthesis => &["transcript"],
        }
    }

    /// Fills every placeholder in one pass, so interpolated text is never re-scanned.
    ///
    /// # Panics
    /// If `vars` lacks a placeholder this template requires. That is a bug in
    /// the caller, not bad input; use `rubric_prompt` / `synthesis_prompt`.
    pub fn render(self, vars: &[(&str, &str)]) -> String {
        let placeholders = self.placeholders();
        for name in placeholders {
            assert!(
                vars.iter().any(|(key, _)| key == name),
                "{self:?} prompt requires a value for {{{name}}}"
            );
        }

        let template = self.text();
        let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
        let mut out = String::with_capacity(template.len() + extra);
        let mut rest = template;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after_brace = &rest[start + 1..];

            let substitution = placeholders.iter().find_map(|name| {
                let tail = after_brace.strip_prefix(name)?.strip_prefix('}')?;
                let value = vars.iter().find(|(key, _)| key == name).map(|(_, v)| *v)?;
                Some((value, tail))
            });

            match substitution {
                Some((value, tail)) => {
                    out.push_str(value);
                    rest = tail;
                }
                None => {
                    out.push('{');
                    rest = after_brace;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Rubric prompt for one question/answer pair.
pub fn rubric_prompt(question: &str, answer: &str) -> String {
    PromptTemplate::Rubric.render(&[("question", question), ("answer", answer)])
}

/// Synthesis prompt for an already rendered transcript.
pub fn synthesis_prompt(transcript: &str) -> String {
    PromptTemplate::Synthesis.render(&[("transcript", transcript)])
}

/// Renders the transcript as numbered Question / Answer / Evaluation blocks.
pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "Question {}: {}\nAnswer: {}\nEvaluation: {}/5",
                i + 1,
                entry.question,
                entry.answer,
                entry.evaluation.score
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
