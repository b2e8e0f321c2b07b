//! Prompt assembly: sessions and tool outcomes rendered for the wire.
//!
//! The wire knows three roles. `ToolResults` turns travel as user messages
//! because they carry information given *to* the model, and the tag protocol
//! inside the text is what distinguishes them from actual user prose.

use lorecall_core::{Role, Session, ToolOutcome, TransportMessage};
use lorecall_protocol::TOOL_NAMES;

/// Build the system prompt that teaches the model the tag protocol.
pub fn system_prompt() -> String {
    format!(
        "You answer questions about an indexed document collection.\n\
         \n\
         Follow the tag protocol exactly:\n\
         - Reason inside <thinking>...</thinking>.\n\
         - Request information with <tool_NAME><param>value</param></tool_NAME>, \
         then stop and wait for the results.\n\
         - When you can answer, write the final answer inside \
         <present_answer>...</present_answer>.\n\
         \n\
         Available tools: {}.",
        TOOL_NAMES.join(", ")
    )
}

/// Render a session as wire messages, system prompt first.
pub fn render_messages(session: &Session) -> Vec<TransportMessage> {
    let mut messages = Vec::with_capacity(session.turns.len() + 1);
    messages.push(TransportMessage::system(system_prompt()));

    for turn in &session.turns {
        let message = match turn.role {
            Role::User => TransportMessage::user(&turn.content),
            Role::Assistant => TransportMessage::assistant(&turn.content),
            Role::ToolResults => TransportMessage::user(&turn.content),
        };
        messages.push(message);
    }

    messages
}

/// Render dispatched outcomes as the body of a `ToolResults` turn.
///
/// Failures are rendered too; the model sees what went wrong and can retry
/// with different parameters or answer without the tool.
pub fn render_outcomes(outcomes: &[ToolOutcome]) -> String {
    let mut out = String::new();
    for outcome in outcomes {
        if outcome.success {
            out.push_str(&format!(
                "<tool_result name=\"{}\">\n{}\n</tool_result>\n",
                outcome.tool_name,
                outcome.data.as_deref().unwrap_or("")
            ));
        } else {
            out.push_str(&format!(
                "<tool_result name=\"{}\" error=\"true\">\n{}\n</tool_result>\n",
                outcome.tool_name,
                outcome.error_message.as_deref().unwrap_or("unspecified failure")
            ));
        }
    }
    out
}
