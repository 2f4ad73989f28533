use crate::event::{Content, Event, Part, FUNCTION_ROLE, USER_ROLE};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub(crate) system_instruction: Content,
    pub(crate) contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) tools: Vec<ToolDeclarations>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolDeclarations {
    pub(crate) function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FunctionDeclaration {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<Candidate>,
    #[serde(default)]
    pub(crate) prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub(crate) content: Option<Content>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub(crate) block_reason: Option<String>,
}

/// Conversation contents sent upstream, rebuilt from the session log.
///
/// Only events with content take part. Tool responses are stored under the
/// `function` role and sent with the `user` role the API expects. Consecutive
/// contents that share a wire role are merged into one turn, so a text reply
/// and the calls that came with it go back as a single model turn.
pub(crate) fn conversation_contents<'a>(
    events: impl IntoIterator<Item = &'a Event>,
) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();

    for event in events {
        if event.error.is_some() {
            continue;
        }
        let Some(content) = &event.content else {
            continue;
        };
        let Some(parts) = content.parts.as_ref().filter(|parts| !parts.is_empty()) else {
            continue;
        };

        let role = match content.role.as_deref() {
            Some(FUNCTION_ROLE) => Some(USER_ROLE.to_string()),
            other => other.map(str::to_string),
        };

        if let Some(last) = contents.last_mut().filter(|last| last.role == role) {
            last.parts
                .get_or_insert_with(Vec::new)
                .extend(parts.iter().cloned());
        } else {
            contents.push(Content {
                role,
                parts: Some(parts.clone()),
                text: None,
            });
        }
    }

    contents
}

pub(crate) fn system_instruction(text: &str) -> Content {
    Content {
        role: None,
        parts: Some(vec![Part::text(text)]),
        text: None,
    }
}

/// Converts a model turn into log events: text first, then any function calls.
///
/// Thought parts are dropped. Other parts keep their signatures. A missing or
/// empty candidate becomes an error event carrying the reason.
pub(crate) fn events_from_response(response: GenerateContentResponse) -> Vec<Event> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return vec![Event::failure(format!("model returned no reply: {reason}"))];
    };

    let parts = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default();

    let mut text_parts = Vec::new();
    let mut call_parts = Vec::new();
    for part in parts {
        if part.is_thought() {
            debug!("dropping thought part from model turn");
        } else if part.function_call.is_some() {
            call_parts.push(part);
        } else if part.text.is_some() || part.thought_signature.is_some() {
            text_parts.push(part);
        }
    }

    let mut events = Vec::new();
    if !text_parts.is_empty() {
        events.push(Event::model_content(text_parts));
    }
    if !call_parts.is_empty() {
        events.push(Event::tool_call(call_parts));
    }
    if events.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "empty candidate".to_string());
        events.push(Event::failure(format!("model returned no content: {reason}")));
    }
    events
}
