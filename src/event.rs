use serde::{Deserialize, Serialize};

pub const USER_ROLE: &str = "user";
pub const MODEL_ROLE: &str = "model";
pub const FUNCTION_ROLE: &str = "function";

/// Participant that produced an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    User,
    #[serde(alias = "agent")]
    Model,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One step emitted while the agent handles a single message.
///
/// Any combination of the optional fields may be populated; readers check
/// presence field by field rather than assuming a single shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<FunctionCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured payload shared with the Gemini wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Vec<Part>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
    /// Set on reasoning summaries from thinking models; never part of a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
    /// Opaque token that must be sent back upstream on the same part.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought_signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: serde_json::Value,
}

/// Alternate nesting where the content sits one level deeper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }

    pub fn is_thought(&self) -> bool {
        self.thought == Some(true)
    }
}

impl Content {
    pub fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: Some(parts),
            text: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.as_deref() == Some(USER_ROLE)
    }

    /// Texts of the non-thought parts that carry one, in part order.
    pub fn part_texts(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .flatten()
            .filter(|part| !part.is_thought())
            .filter_map(|part| part.text.as_deref())
    }
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            content: Some(Content::new(USER_ROLE, vec![Part::text(text)])),
            ..Self::default()
        }
    }

    pub fn model_content(parts: Vec<Part>) -> Self {
        Self {
            author: Author::Model,
            content: Some(Content::new(MODEL_ROLE, parts)),
            ..Self::default()
        }
    }

    /// Model turn requesting tools. The parts are stored as received so
    /// their signatures go back upstream unchanged.
    pub fn tool_call(parts: Vec<Part>) -> Self {
        let calls = parts
            .iter()
            .filter_map(|part| part.function_call.clone())
            .collect();
        Self {
            author: Author::Model,
            content: Some(Content::new(MODEL_ROLE, parts)),
            tool_calls: Some(calls),
            ..Self::default()
        }
    }

    pub fn tool_response(parts: Vec<Part>) -> Self {
        Self {
            author: Author::Model,
            content: Some(Content::new(FUNCTION_ROLE, parts)),
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            author: Author::Model,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// True when either the author tag or the content role marks a user turn.
    pub fn is_user(&self) -> bool {
        self.author == Author::User || self.content.as_ref().is_some_and(Content::is_user)
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().is_some_and(|calls| !calls.is_empty())
    }

    /// Tool requests and the results fed back for them.
    pub fn is_tool_traffic(&self) -> bool {
        self.has_tool_calls()
            || self
                .content
                .as_ref()
                .is_some_and(|content| content.role.as_deref() == Some(FUNCTION_ROLE))
    }
}
