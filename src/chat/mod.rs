use crate::CHAT_HISTORY_CAP;
use crate::CHAT_TEXT_MAX;
use crate::Millis;
use crate::PlayerId;
use crate::protocol::ChatSend;
use crate::protocol::ErrorCode;
use serde::Deserialize;
use serde::Serialize;
use std::collections::VecDeque;

/// The eight reaction emoji clients may send.
pub const EMOJI_SET: [&str; 8] = ["👍", "😂", "😮", "😢", "🔥", "🎯", "💥", "🚢"];

/// The five canned gif ids clients may send.
pub const GIF_SET: [&str; 5] = ["gg", "wave", "laugh", "salute", "anchor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Text,
    Emoji,
    Gif,
    System,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub kind: ChatKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<PlayerId>,
    pub nickname: String,
    pub created_at: Millis,
    pub body: String,
}

impl ChatMessage {
    pub fn system(body: impl Into<String>) -> Self {
        Self {
            kind: ChatKind::System,
            sender: None,
            nickname: String::from("system"),
            created_at: crate::now(),
            body: body.into(),
        }
    }
}

/// Strips control characters and trims. None when nothing survives or the
/// survivor exceeds the length cap.
pub fn sanitize_text(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    match cleaned.chars().count() {
        0 => None,
        n if n > CHAT_TEXT_MAX => None,
        _ => Some(cleaned.to_string()),
    }
}

/// Validates a `chat:send` payload down to its kind and body.
pub fn validate(payload: &ChatSend) -> Result<(ChatKind, String), ErrorCode> {
    match payload.kind.as_str() {
        "text" => payload
            .text
            .as_deref()
            .and_then(sanitize_text)
            .map(|body| (ChatKind::Text, body))
            .ok_or(ErrorCode::ChatInvalidPayload),
        "emoji" => payload
            .emoji
            .as_deref()
            .filter(|e| EMOJI_SET.contains(e))
            .map(|e| (ChatKind::Emoji, e.to_string()))
            .ok_or(ErrorCode::ChatInvalidPayload),
        "gif" => payload
            .gif_id
            .as_deref()
            .filter(|g| GIF_SET.contains(g))
            .map(|g| (ChatKind::Gif, g.to_string()))
            .ok_or(ErrorCode::ChatInvalidPayload),
        _ => Err(ErrorCode::ChatInvalidPayload),
    }
}

/// Appends to a room's history, evicting the oldest past the cap.
pub fn append(history: &mut VecDeque<ChatMessage>, message: ChatMessage) {
    history.push_back(message);
    while history.len() > CHAT_HISTORY_CAP {
        history.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(kind: &str) -> ChatSend {
        ChatSend {
            room_id: 1,
            kind: kind.to_string(),
            text: None,
            emoji: None,
            gif_id: None,
        }
    }

    #[test]
    fn text_cap_is_exact() {
        let mut payload = send("text");
        payload.text = Some("x".repeat(CHAT_TEXT_MAX));
        assert!(validate(&payload).is_ok());
        payload.text = Some("x".repeat(CHAT_TEXT_MAX + 1));
        assert!(validate(&payload) == Err(ErrorCode::ChatInvalidPayload));
    }

    #[test]
    fn control_chars_strip_before_the_cap() {
        let mut payload = send("text");
        let mut body = "y".repeat(CHAT_TEXT_MAX);
        body.push('\u{0007}');
        payload.text = Some(body);
        let (_, sanitized) = validate(&payload).expect("cap holds after strip");
        assert!(sanitized.chars().count() == CHAT_TEXT_MAX);
        payload.text = Some(String::from("\u{0000}\u{001b} \t"));
        assert!(validate(&payload).is_err());
    }

    #[test]
    fn emoji_and_gif_sets_are_closed() {
        let mut payload = send("emoji");
        payload.emoji = Some(String::from("🎯"));
        assert!(validate(&payload).is_ok());
        payload.emoji = Some(String::from("🦀"));
        assert!(validate(&payload).is_err());
        let mut payload = send("gif");
        payload.gif_id = Some(String::from("anchor"));
        assert!(validate(&payload).is_ok());
        payload.gif_id = Some(String::from("rickroll"));
        assert!(validate(&payload).is_err());
    }

    #[test]
    fn unknown_kind_rejected() {
        assert!(validate(&send("sticker")) == Err(ErrorCode::ChatInvalidPayload));
        assert!(validate(&send("system")) == Err(ErrorCode::ChatInvalidPayload));
    }

    #[test]
    fn history_evicts_oldest_past_cap() {
        let mut history = VecDeque::new();
        for i in 0..(CHAT_HISTORY_CAP + 5) {
            append(&mut history, ChatMessage::system(format!("m{}", i)));
        }
        assert!(history.len() == CHAT_HISTORY_CAP);
        assert!(history.front().expect("nonempty").body == "m5");
    }
}
