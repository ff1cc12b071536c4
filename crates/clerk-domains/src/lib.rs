pub mod zoning;

use clerk_core::types::PromptConfig;

/// Return all built-in prompt profiles.
pub fn all_prompts() -> Vec<PromptConfig> {
    vec![zoning::zoning_prompt()]
}

/// Look up a built-in profile by name (with short aliases).
pub fn get_prompt(name: &str) -> Option<PromptConfig> {
    match name {
        "zoning" | "legal" | "clerk" => get_prompt("zoning_clerk"),
        _ => all_prompts().into_iter().find(|p| p.name == name),
    }
}
