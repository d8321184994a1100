// Shared prompt fragments used by the gateway itself.
// Task-specific templates live in evaluation/prompts.rs.

/// System message sent with every JSON-mode request.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";
