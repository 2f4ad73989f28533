use crate::event::{Content, Event};
use tracing::{error, info};

/// Reply returned when neither pass finds any text.
pub const NO_RESPONSE: &str = "no response available.";

/// Read access to a session's persisted event log.
pub trait History {
    fn events(&self) -> &[Event];
}

impl History for [Event] {
    fn events(&self) -> &[Event] {
        self
    }
}

impl History for Vec<Event> {
    fn events(&self) -> &[Event] {
        self
    }
}

/// Turns the events of one invocation into a single reply.
///
/// The live events are scanned first; the session history is only read when
/// they produce no non-whitespace text.
pub fn extract_response<H>(events: &[Event], history: &H) -> String
where
    H: History + ?Sized,
{
    let text = collect_invocation_text(events);
    if !text.trim().is_empty() {
        return text;
    }

    latest_reply_in_history(history.events()).unwrap_or_else(|| NO_RESPONSE.to_string())
}

/// Primary pass: concatenates text from every non-user event in emission order.
pub fn collect_invocation_text(events: &[Event]) -> String {
    let mut text = String::new();

    for event in events {
        if let Some(calls) = event.tool_calls.as_ref().filter(|calls| !calls.is_empty()) {
            let names: Vec<&str> = calls.iter().map(|call| call.name.as_str()).collect();
            info!(tools = ?names, "agent requested tool calls");
            continue;
        }
        if let Some(err) = &event.error {
            error!(error = %err, "agent reported an error event");
            continue;
        }
        if event.is_user() {
            continue;
        }

        match event.direct_text.as_deref() {
            Some(direct) if !direct.is_empty() => text.push_str(direct),
            _ => {
                if let Some(content) = &event.content {
                    append_content(&mut text, content);
                }
            }
        }

        // Evaluated independently of the branch above, so an event carrying
        // both `content` and `message.content` contributes twice.
        if let Some(nested) = event.message.as_ref().and_then(|m| m.content.as_ref()) {
            for part in nested.part_texts() {
                text.push_str(part);
            }
        }
    }

    text
}

fn append_content(text: &mut String, content: &Content) {
    match &content.parts {
        Some(_) => {
            for part in content.part_texts() {
                text.push_str(part);
            }
        }
        None => {
            if let Some(flat) = &content.text {
                text.push_str(flat);
            }
        }
    }
}

/// Fallback pass: the most recent non-user reply after the last user turn.
pub fn latest_reply_in_history(history: &[Event]) -> Option<String> {
    let start = history
        .iter()
        .rposition(Event::is_user)
        .map_or(0, |index| index + 1);

    history[start..]
        .iter()
        .rev()
        .filter(|event| !event.is_user() && !event.is_tool_traffic() && event.error.is_none())
        .find_map(|event| event.content.as_ref().and_then(reply_from_content))
}

fn reply_from_content(content: &Content) -> Option<String> {
    let texts: Vec<&str> = content.part_texts().collect();
    if !texts.is_empty() {
        return Some(texts.join(" "));
    }

    if let Some(flat) = content.text.as_deref().filter(|flat| !flat.is_empty()) {
        return Some(flat.to_string());
    }

    let rendered = serde_json::to_string(content).ok()?;
    (!rendered.is_empty() && rendered != "{}").then_some(rendered)
}
