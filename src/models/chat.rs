use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role tag on a client message.
///
/// The UI library may emit tags beyond the three the interview cares about
/// (`data`, `tool`, ...); those land in `Other` and are projected like
/// assistant turns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "model")]
    Assistant,
    System,
    #[serde(other)]
    Other,
}

/// One role-tagged turn as sent by the browser.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    /// Usually a string; anything else is stringified when formatted.
    #[serde(default)]
    pub content: Value,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Value::String(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Content when it is a plain string.
    pub fn as_str(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// Content rendered as text; non-string content is serialized to JSON.
    pub fn content_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Body of `POST /api/chat`. Any other top-level field is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_accepts_model_alias_and_unknown_tags() {
        let msgs: Vec<Message> = serde_json::from_value(json!([
            {"role": "model", "content": "a"},
            {"role": "assistant", "content": "b"},
            {"role": "data", "content": "c"}
        ]))
        .expect("messages decode");
        assert_eq!(msgs[0].role, Role::Assistant);
        assert_eq!(msgs[1].role, Role::Assistant);
        assert_eq!(msgs[2].role, Role::Other);
    }

    #[test]
    fn non_string_content_is_stringified() {
        let msg: Message = serde_json::from_value(json!({
            "role": "user",
            "content": [{"type": "text", "text": "hi"}]
        }))
        .expect("message decodes");
        assert_eq!(msg.as_str(), None);
        assert_eq!(msg.content_text(), r#"[{"text":"hi","type":"text"}]"#);
    }

    #[test]
    fn request_ignores_extra_fields_but_requires_messages() {
        let ok: ChatRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "hello", "id": "m1"}],
            "data": {"ignored": true}
        }))
        .expect("request decodes");
        assert_eq!(ok.messages.len(), 1);

        let missing = serde_json::from_value::<ChatRequest>(json!({"prompt": "hi"}));
        assert!(missing.is_err());
    }
}
