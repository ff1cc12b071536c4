use clerk_core::types::PromptConfig;

/// Build the user message for one question from the profile's template.
///
/// A profile without a template gets the bare question so a backend never
/// sends an empty user turn.
pub fn build_instruction(question: &str, prompt: &PromptConfig) -> String {
    if prompt.instruction.trim().is_empty() {
        return question.to_string();
    }
    prompt.instruction.replace("{QUESTION}", question)
}

// ── Tests ──────────────────────────────────────────────────────────────────
