//! Builds the code-repair instruction sent to the model.
//!
//! The code and error log are embedded verbatim; nothing is escaped.

use codefix_core::llm::{Prompt, PromptStyle};

const COMBINED_PROMPT: &str = include_str!("prompts/combined_prompt.txt");
const SYSTEM_PROMPT: &str = include_str!("prompts/system_prompt.txt");
const USER_PROMPT: &str = include_str!("prompts/user_prompt.txt");

/// The system instruction a client of the given style must be built with, if any.
pub fn system_prompt(style: PromptStyle) -> Option<&'static str> {
    match style {
        PromptStyle::Combined => None,
        PromptStyle::Chat => Some(SYSTEM_PROMPT.trim_end()),
    }
}

/// Builds the prompt asking the model to repair `code` given `error_log`.
pub fn build(code: &str, error_log: &str, style: PromptStyle) -> Prompt {
    match style {
        PromptStyle::Combined => Prompt::Combined(render(COMBINED_PROMPT, code, error_log)),
        PromptStyle::Chat => Prompt::Chat(render(USER_PROMPT, code, error_log)),
    }
}

/// Substitutes `{code}` and `{error}` in a single pass, so braces inside the inputs are copied
/// as-is.
fn render(template: &str, code: &str, error: &str) -> String {
    let mut out = String::with_capacity(template.len() + code.len() + error.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{code}") {
            out.push_str(code);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{error}") {
            out.push_str(error);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
