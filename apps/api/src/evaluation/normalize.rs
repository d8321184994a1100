//! Response Normalizer: turns free-form model text into canonical records.
//!
//! Models routinely break their own output contract: alternate key spellings,
//! scores as `"4/5"`, bullet lists as arrays, prose around the JSON. Every
//! function here is pure and total. Nothing panics on model output; the worst
//! case is `Normalized::Unrecoverable` with a reason.
//!
//! Key reconciliation is table driven (`FieldSpec`): a new backend quirk is a
//! new alternate in a table, not a new branch.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::evaluation::models::{
    AnswerEvaluation, FinalReport, MAX_ANSWER_SCORE, MAX_PROFICIENCY_SCORE, SENTINEL_SCORE,
};

// ────────────────────────────────────────────────────────────────────────────
// Outcome types
// ────────────────────────────────────────────────────────────────────────────

/// Why a model response could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeFailure {
    #[error("MalformedJSON: {0}")]
    MalformedJson(String),

    #[error("MissingCriticalField: '{0}' is absent from the model response")]
    MissingCriticalField(&'static str),
}

/// Something the normalizer had to repair. Not an error, but a sign of backend drift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionWarning {
    pub field: &'static str,
    pub kind: WarningKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// Found under a non-canonical key.
    Alias { key: String },
    /// No candidate key present; the documented default was used.
    Defaulted,
    /// Present with an unexpected JSON shape and converted.
    Coerced { from: &'static str },
    /// Numeric value outside the field's range.
    OutOfRange { value: i64, clamped_to: i64 },
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::Alias { key } => write!(f, "{}: read from alternate key '{key}'", self.field),
            WarningKind::Defaulted => write!(f, "{}: missing, default used", self.field),
            WarningKind::Coerced { from } => write!(f, "{}: coerced from {from}", self.field),
            WarningKind::OutOfRange { value, clamped_to } => {
                write!(f, "{}: {value} out of range, clamped to {clamped_to}", self.field)
            }
        }
    }
}

/// Result of normalizing one model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized<T> {
    /// Every field present under its canonical key with the expected shape.
    Recognized(T),
    /// A usable record, but some fields were repaired.
    Degraded {
        record: T,
        warnings: Vec<CoercionWarning>,
    },
    Unrecoverable(NormalizeFailure),
}

impl<T> Normalized<T> {
    fn from_parts(record: T, warnings: Vec<CoercionWarning>) -> Self {
        if warnings.is_empty() {
            Normalized::Recognized(record)
        } else {
            Normalized::Degraded { record, warnings }
        }
    }

    pub fn record(&self) -> Option<&T> {
        match self {
            Normalized::Recognized(record) | Normalized::Degraded { record, .. } => Some(record),
            Normalized::Unrecoverable(_) => None,
        }
    }

    pub fn warnings(&self) -> &[CoercionWarning] {
        match self {
            Normalized::Degraded { warnings, .. } => warnings,
            _ => &[],
        }
    }

    /// True if `field` was absent and filled with its default.
    pub fn was_defaulted(&self, field: &str) -> bool {
        self.warnings()
            .iter()
            .any(|w| w.field == field && w.kind == WarningKind::Defaulted)
    }

    pub fn into_result(self) -> Result<T, NormalizeFailure> {
        match self {
            Normalized::Recognized(record) | Normalized::Degraded { record, .. } => Ok(record),
            Normalized::Unrecoverable(failure) => Err(failure),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Key table
// ────────────────────────────────────────────────────────────────────────────

/// Canonical field name plus known alternates, tried in order, case-insensitively.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub canonical: &'static str,
    pub alternates: &'static [&'static str],
}

impl FieldSpec {
    fn candidates(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.canonical).chain(self.alternates.iter().copied())
    }
}

pub const EVALUATION_SCORE: FieldSpec = FieldSpec {
    canonical: "score",
    alternates: &["rating", "grade"],
};

pub const EVALUATION_TEXT: FieldSpec = FieldSpec {
    canonical: "evaluation",
    alternates: &["rationale", "feedback", "explanation"],
};

pub const REPORT_RECOMMENDATION: FieldSpec = FieldSpec {
    canonical: "overall_recommendation",
    alternates: &["recommendation", "hiring_recommendation"],
};

pub const REPORT_SCORE: FieldSpec = FieldSpec {
    canonical: "proficiency_score",
    alternates: &["overall_skill_score", "skill_score", "overall_score", "score"],
};

pub const REPORT_STRENGTHS: FieldSpec = FieldSpec {
    canonical: "key_strengths",
    alternates: &["strengths"],
};

pub const REPORT_IMPROVEMENTS: FieldSpec = FieldSpec {
    canonical: "areas_for_improvement",
    alternates: &["improvement_areas", "weaknesses"],
};

pub const REPORT_SUMMARY: FieldSpec = FieldSpec {
    canonical: "summary",
    alternates: &["professional_summary", "overall_summary"],
};

/// Default for free-text report fields the model left out.
const TEXT_DEFAULT: &str = "N/A";

// ────────────────────────────────────────────────────────────────────────────
// Coercions
// ────────────────────────────────────────────────────────────────────────────

fn number_token() -> &'static Regex {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    NUMBER.get_or_init(|| Regex::new(r"\d+(\.\d+)?").expect("number pattern is valid"))
}

/// Reads a score from whatever shape the model used, truncating toward zero.
///
/// Integers pass through, floats truncate, strings yield their first numeric
/// token (`"4/5"` → 4, `"4.7"` → 4). Anything else, including strings with no
/// digits, is 0.
pub fn parse_score(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => number_token()
            .find(s)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|f| f.trunc() as i64)
            .unwrap_or(0),
        _ => 0,
    }
}

/// Flattens a bullet field to one string.
///
/// Strings pass through; arrays become `- item` lines joined by `\n`;
/// anything else is empty.
pub fn parse_list_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => format!("- {s}"),
                other => format!("- {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────────────────

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}

/// The outermost `{ ... }` slice, for JSON surrounded by prose.
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, NormalizeFailure> {
    let text = strip_json_fences(raw);
    let value = match serde_json::from_str::<Value>(text) {
        Ok(value) => value,
        Err(err) => embedded_object(text)
            .and_then(|slice| serde_json::from_str::<Value>(slice).ok())
            .ok_or_else(|| NormalizeFailure::MalformedJson(err.to_string()))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(NormalizeFailure::MalformedJson(format!(
            "expected a JSON object, found {}",
            shape_name(&other)
        ))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field resolution
// ────────────────────────────────────────────────────────────────────────────

/// First candidate key with a non-null value wins. Nulls count as absent.
/// Within one candidate an exact-case key beats a case-insensitive match.
fn resolve<'a>(
    object: &'a Map<String, Value>,
    spec: &FieldSpec,
    warnings: &mut Vec<CoercionWarning>,
) -> Option<&'a Value> {
    let (key, value) = spec.candidates().find_map(|candidate| {
        object
            .get_key_value(candidate)
            .filter(|(_, value)| !value.is_null())
            .or_else(|| {
                object
                    .iter()
                    .find(|(key, value)| key.eq_ignore_ascii_case(candidate) && !value.is_null())
            })
    })?;

    if key != spec.canonical {
        warnings.push(CoercionWarning {
            field: spec.canonical,
            kind: WarningKind::Alias { key: key.clone() },
        });
    }
    Some(value)
}

fn defaulted(spec: &FieldSpec, warnings: &mut Vec<CoercionWarning>) {
    warnings.push(CoercionWarning {
        field: spec.canonical,
        kind: WarningKind::Defaulted,
    });
}

fn coerced(spec: &FieldSpec, value: &Value, warnings: &mut Vec<CoercionWarning>) {
    warnings.push(CoercionWarning {
        field: spec.canonical,
        kind: WarningKind::Coerced {
            from: shape_name(value),
        },
    });
}

fn score_field(spec: &FieldSpec, value: &Value, warnings: &mut Vec<CoercionWarning>) -> i64 {
    if !value.is_i64() && !value.is_u64() {
        coerced(spec, value, warnings);
    }
    parse_score(value)
}

fn clamp_score(
    spec: &FieldSpec,
    value: i64,
    min: i64,
    max: i64,
    warnings: &mut Vec<CoercionWarning>,
) -> i64 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        warnings.push(CoercionWarning {
            field: spec.canonical,
            kind: WarningKind::OutOfRange {
                value,
                clamped_to: clamped,
            },
        });
    }
    clamped
}

fn text_field(
    object: &Map<String, Value>,
    spec: &FieldSpec,
    default: &str,
    warnings: &mut Vec<CoercionWarning>,
) -> String {
    let Some(value) = resolve(object, spec, warnings) else {
        defaulted(spec, warnings);
        return default.to_string();
    };
    match value {
        Value::String(s) => s.clone(),
        Value::Array(_) => {
            coerced(spec, value, warnings);
            parse_list_to_string(value)
        }
        other => {
            coerced(spec, other, warnings);
            other.to_string()
        }
    }
}

fn list_field(
    object: &Map<String, Value>,
    spec: &FieldSpec,
    warnings: &mut Vec<CoercionWarning>,
) -> String {
    let Some(value) = resolve(object, spec, warnings) else {
        defaulted(spec, warnings);
        return String::new();
    };
    if !value.is_string() {
        coerced(spec, value, warnings);
    }
    parse_list_to_string(value)
}

// ────────────────────────────────────────────────────────────────────────────
// Schemas
// ────────────────────────────────────────────────────────────────────────────

const UNSCORABLE_PREFIX: &str = "Unscorable model score";

/// Marks a sentinel 0 that came from the model's own score, so the record
/// says why it holds no grade.
fn unscorable_rationale(score: &Value, rationale: &str) -> String {
    if rationale.trim().is_empty() {
        format!("{UNSCORABLE_PREFIX} {score}")
    } else {
        format!("{UNSCORABLE_PREFIX} {score}: {rationale}")
    }
}

/// Normalizes a rubric response into an `AnswerEvaluation`.
///
/// The score key is required. Scores above 5 clamp to 5; anything below 1
/// becomes the sentinel 0 with a rationale naming the score the model gave.
pub fn normalize_evaluation(raw: &str) -> Normalized<AnswerEvaluation> {
    let object = match parse_object(raw) {
        Ok(object) => object,
        Err(failure) => return Normalized::Unrecoverable(failure),
    };
    let mut warnings = Vec::new();

    let Some(score_value) = resolve(&object, &EVALUATION_SCORE, &mut warnings) else {
        return Normalized::Unrecoverable(NormalizeFailure::MissingCriticalField(
            EVALUATION_SCORE.canonical,
        ));
    };
    let raw_score = score_field(&EVALUATION_SCORE, score_value, &mut warnings);
    let unscorable = raw_score < 1;
    let score = if unscorable {
        // 0 is reserved for failures, so a sub-rubric score is always flagged
        warnings.push(CoercionWarning {
            field: EVALUATION_SCORE.canonical,
            kind: WarningKind::OutOfRange {
                value: raw_score,
                clamped_to: i64::from(SENTINEL_SCORE),
            },
        });
        SENTINEL_SCORE
    } else {
        let clamped = clamp_score(
            &EVALUATION_SCORE,
            raw_score,
            1,
            i64::from(MAX_ANSWER_SCORE),
            &mut warnings,
        );
        u8::try_from(clamped).unwrap_or(MAX_ANSWER_SCORE)
    };

    let mut rationale = text_field(&object, &EVALUATION_TEXT, "", &mut warnings);
    if unscorable && !rationale.starts_with(UNSCORABLE_PREFIX) {
        rationale = unscorable_rationale(score_value, &rationale);
    }

    let record = AnswerEvaluation { score, rationale };
    Normalized::from_parts(record, warnings)
}

/// Normalizes a synthesis response into a `FinalReport`.
///
/// Only the proficiency score is required here. Missing text fields get
/// defaults; whether a defaulted report is acceptable is the caller's call.
pub fn normalize_report(raw: &str) -> Normalized<FinalReport> {
    let object = match parse_object(raw) {
        Ok(object) => object,
        Err(failure) => return Normalized::Unrecoverable(failure),
    };
    let mut warnings = Vec::new();

    let Some(score_value) = resolve(&object, &REPORT_SCORE, &mut warnings) else {
        return Normalized::Unrecoverable(NormalizeFailure::MissingCriticalField(
            REPORT_SCORE.canonical,
        ));
    };
    let score = score_field(&REPORT_SCORE, score_value, &mut warnings);
    let score = clamp_score(
        &REPORT_SCORE,
        score,
        0,
        i64::from(MAX_PROFICIENCY_SCORE),
        &mut warnings,
    );

    let record = FinalReport {
        overall_recommendation: text_field(
            &object,
            &REPORT_RECOMMENDATION,
            TEXT_DEFAULT,
            &mut warnings,
        ),
        proficiency_score: u32::try_from(score).unwrap_or(0),
        key_strengths: list_field(&object, &REPORT_STRENGTHS, &mut warnings),
        areas_for_improvement: list_field(&object, &REPORT_IMPROVEMENTS, &mut warnings),
        summary: text_field(&object, &REPORT_SUMMARY, TEXT_DEFAULT, &mut warnings),
    };
    Normalized::from_parts(record, warnings)
}
