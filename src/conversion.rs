use crate::interview::{EVALUATION_TRIGGER, PREAMBLE_ACKNOWLEDGEMENT, PREAMBLE_INSTRUCTION};
use crate::models::chat::{Message, Role};
use crate::models::gemini::{Content, TurnRole};

// ============================================================================
// Client messages -> provider turns
// ============================================================================

/// Messages that take part in the provider-facing history.
///
/// `system` messages are always dropped (the provider's chat session only
/// takes alternating user/model turns). On evaluation requests the bare
/// trigger message is dropped as well; a trigger embedded in a longer message
/// is kept.
pub fn filter_messages(messages: &[Message], evaluation: bool) -> Vec<&Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .filter(|m| !(evaluation && m.as_str() == Some(EVALUATION_TRIGGER)))
        .collect()
}

/// Project one client message onto the provider's two roles.
pub fn to_turn(message: &Message) -> Content {
    let role = match message.role {
        Role::User => TurnRole::User,
        _ => TurnRole::Model,
    };
    Content::new(role, message.content_text())
}

/// Filter and project the full client sequence, preserving order.
pub fn format_history(messages: &[Message], evaluation: bool) -> Vec<Content> {
    filter_messages(messages, evaluation)
        .into_iter()
        .map(to_turn)
        .collect()
}

/// The synthetic user/model pair that replaces a system prompt.
pub fn preamble() -> [Content; 2] {
    [
        Content::user(PREAMBLE_INSTRUCTION),
        Content::model(PREAMBLE_ACKNOWLEDGEMENT),
    ]
}

/// Prepend the preamble pair to a chat history.
///
/// An empty history stays empty: with nothing to precede, the session starts
/// cold and the introduction instruction carries the persona.
pub fn with_preamble(history: Vec<Content>) -> Vec<Content> {
    if history.is_empty() {
        return history;
    }
    let mut out = Vec::with_capacity(history.len() + 2);
    out.extend(preamble());
    out.extend(history);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_system_messages_and_maps_roles() {
        let msgs = vec![
            Message::system("be nice"),
            Message::user("hi"),
            Message::assistant("hello"),
            Message::new(Role::Other, "tool output"),
        ];
        let history = format_history(&msgs, false);
        assert_eq!(
            history,
            vec![
                Content::user("hi"),
                Content::model("hello"),
                Content::model("tool output"),
            ]
        );
    }

    #[test]
    fn trigger_removed_only_on_exact_match_in_evaluation_mode() {
        let msgs = vec![
            Message::user("intro"),
            Message::user("please [EVALUATE_CANDIDATE] now"),
            Message::user(EVALUATION_TRIGGER),
        ];
        assert_eq!(format_history(&msgs, true).len(), 2);
        assert_eq!(format_history(&msgs, false).len(), 3);
    }

    #[test]
    fn non_string_content_is_serialized() {
        let msg: Message =
            serde_json::from_value(json!({"role": "user", "content": {"skills": ["rust"]}}))
                .expect("message decodes");
        assert_eq!(to_turn(&msg).text(), r#"{"skills":["rust"]}"#);
    }

    #[test]
    fn preamble_occupies_first_two_slots_and_keeps_order() {
        let history = vec![
            Content::user("a"),
            Content::model("b"),
            Content::user("c"),
        ];
        let full = with_preamble(history.clone());
        assert_eq!(full.len(), 5);
        assert_eq!(full[0].role, TurnRole::User);
        assert_eq!(full[0].text(), PREAMBLE_INSTRUCTION);
        assert_eq!(full[1].role, TurnRole::Model);
        assert_eq!(full[1].text(), PREAMBLE_ACKNOWLEDGEMENT);
        assert_eq!(&full[2..], history.as_slice());
    }

    #[test]
    fn empty_history_gets_no_preamble() {
        assert!(with_preamble(Vec::new()).is_empty());
    }
}
