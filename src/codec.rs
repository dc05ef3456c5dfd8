//! ActionCable wire codec.
//!
//! Encodes outgoing commands into frame strings and classifies incoming
//! frames into [`WireMessage`]s.
//!
//! # Framing
//!
//! Outgoing frames double-encode their payloads: `identifier` and `data`
//! are JSON strings holding JSON objects, which is what the server expects.
//!
//! ```text
//! {"command":"subscribe","identifier":"{\"channel\":\"ChatChannel\"}"}
//! {"command":"message","identifier":"{...}","data":"{\"action\":\"speak\",...}"}
//! ```
//!
//! Incoming frames are keyed on `type`; a frame without a recognized `type`
//! that carries both `identifier` and `message` is a data push.

// Rust guideline compliant 2026-02

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CableError;
use crate::identifier::{Identifier, Pairs};

/// Key reserved for the action name inside a perform payload.
const ACTION_KEY: &str = "action";

// Inbound `type` values.
const TYPE_WELCOME: &str = "welcome";
const TYPE_PING: &str = "ping";
const TYPE_CONFIRM: &str = "confirm_subscription";
const TYPE_REJECT: &str = "reject_subscription";
const TYPE_DISCONNECT: &str = "disconnect";

/// Outgoing command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Ask the server to subscribe to a channel.
    Subscribe(Identifier),
    /// Ask the server to drop a subscription.
    Unsubscribe(Identifier),
    /// Invoke an action on a subscribed channel.
    Message {
        /// Target subscription.
        identifier: Identifier,
        /// Action name, sent as the `action` key of the data object.
        action: String,
        /// Caller fields, sent after `action` in this order.
        data: Vec<(String, Value)>,
    },
}

/// Serialized shape of every outgoing frame.
#[derive(Debug, Serialize, Deserialize)]
struct CommandFrame {
    command: String,
    identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

/// Data object of a `message` command: `action` first, then caller fields.
struct ActionData<'a> {
    action: &'a str,
    fields: &'a [(String, Value)],
}

impl Serialize for ActionData<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(ACTION_KEY, self.action)?;
        for (key, value) in self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl Command {
    /// Wire name carried in the `command` field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Subscribe(_) => "subscribe",
            Self::Unsubscribe(_) => "unsubscribe",
            Self::Message { .. } => "message",
        }
    }

    /// Subscription this command targets.
    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        match self {
            Self::Subscribe(id) | Self::Unsubscribe(id) => id,
            Self::Message { identifier, .. } => identifier,
        }
    }

    /// Encode as a single-line frame ready for the transport.
    #[must_use]
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse an outgoing frame back into a command.
    ///
    /// This is the server's side of the exchange; the client uses it in tests
    /// and tooling to inspect what it sends.
    pub fn decode(frame: &str) -> Result<Self, CableError> {
        let parsed: CommandFrame = serde_json::from_str(frame)
            .map_err(|err| CableError::General(format!("invalid command frame: {err}")))?;
        let identifier = Identifier::parse(&parsed.identifier)?;

        match (parsed.command.as_str(), parsed.data) {
            ("subscribe", None) => Ok(Self::Subscribe(identifier)),
            ("unsubscribe", None) => Ok(Self::Unsubscribe(identifier)),
            ("message", Some(data)) => {
                let Pairs(mut fields) = serde_json::from_str::<Pairs<Value>>(&data)
                    .map_err(|err| CableError::General(format!("invalid command data: {err}")))?;
                let position = fields
                    .iter()
                    .position(|(key, _)| key == ACTION_KEY)
                    .ok_or_else(|| CableError::General("command data has no action".into()))?;
                let action = match fields.remove(position) {
                    (_, Value::String(action)) => action,
                    (_, other) => {
                        return Err(CableError::General(format!(
                            "command action is not a string: {other}"
                        )))
                    }
                };
                Ok(Self::Message {
                    identifier,
                    action,
                    data: fields,
                })
            }
            (command, _) => Err(CableError::General(format!(
                "unexpected command frame: {command}"
            ))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = match self {
            Self::Message { action, data, .. } => {
                let object = ActionData {
                    action,
                    fields: data,
                };
                Some(to_json(&object)?)
            }
            Self::Subscribe(_) | Self::Unsubscribe(_) => None,
        };
        let frame = CommandFrame {
            command: self.name().to_string(),
            identifier: self.identifier().to_json_string(),
            data,
        };
        f.write_str(&to_json(&frame)?)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, fmt::Error> {
    serde_json::to_string(value).or(Err(fmt::Error))
}

/// Frame asking the server to subscribe to `id`.
#[must_use]
pub fn subscribe_command(id: &Identifier) -> String {
    Command::Subscribe(id.clone()).encode()
}

/// Frame asking the server to drop the subscription for `id`.
#[must_use]
pub fn unsubscribe_command(id: &Identifier) -> String {
    Command::Unsubscribe(id.clone()).encode()
}

/// Frame invoking `action` on the channel named by `id`.
///
/// `data` must not contain an `action` key. If it does, the frame carries
/// both and the server's JSON parser decides which wins (usually the later
/// one, i.e. the caller's).
#[must_use]
pub fn perform_command(action: &str, data: &[(String, Value)], id: &Identifier) -> String {
    Command::Message {
        identifier: id.clone(),
        action: action.to_string(),
        data: data.to_vec(),
    }
    .encode()
}

/// Decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// Server accepted the connection.
    Welcome,
    /// Keepalive carrying the server's timestamp.
    Ping(i64),
    /// Subscription accepted.
    Confirm(Identifier),
    /// Subscription refused.
    Rejected(Identifier),
    /// Server is closing the connection.
    Disconnect {
        /// Reason given by the server (e.g. `"unauthorized"`).
        reason: Option<String>,
        /// Whether the server allows reconnecting.
        reconnect: Option<bool>,
    },
    /// Data pushed to a subscription.
    ReceiveData(Identifier, Value),
    /// Frame could not be classified; carries a diagnostic.
    Error(String),
}

/// Classify one inbound frame. Never fails: unreadable frames become
/// [`WireMessage::Error`].
#[must_use]
pub fn decode(frame: &str) -> WireMessage {
    let json: Value = match serde_json::from_str(frame) {
        Ok(json) => json,
        Err(err) => return WireMessage::Error(format!("frame is not valid JSON: {err}")),
    };

    match json.get("type").and_then(Value::as_str) {
        Some(TYPE_WELCOME) => WireMessage::Welcome,
        Some(TYPE_PING) => match json.get("message").and_then(Value::as_i64) {
            Some(timestamp) => WireMessage::Ping(timestamp),
            None => WireMessage::Error("ping frame without integer message".to_string()),
        },
        Some(TYPE_CONFIRM) => match identifier_field(&json) {
            Ok(id) => WireMessage::Confirm(id),
            Err(reason) => WireMessage::Error(reason),
        },
        Some(TYPE_REJECT) => match identifier_field(&json) {
            Ok(id) => WireMessage::Rejected(id),
            Err(reason) => WireMessage::Error(reason),
        },
        Some(TYPE_DISCONNECT) => WireMessage::Disconnect {
            reason: json.get("reason").and_then(Value::as_str).map(String::from),
            reconnect: json.get("reconnect").and_then(Value::as_bool),
        },
        _ => match (identifier_field(&json), json.get("message")) {
            (Ok(id), Some(message)) => WireMessage::ReceiveData(id, message.clone()),
            (Err(reason), Some(_)) => WireMessage::Error(reason),
            (_, None) => WireMessage::Error(format!(
                "unrecognized frame: {}",
                truncate(frame, 100)
            )),
        },
    }
}

/// Parse the `identifier` json-string of an inbound frame.
fn identifier_field(json: &Value) -> Result<Identifier, String> {
    let raw = json
        .get("identifier")
        .and_then(Value::as_str)
        .ok_or_else(|| "frame has no identifier string".to_string())?;
    Identifier::parse(raw).map_err(|err| err.to_string())
}

/// Shorten `text` to at most `max` chars for diagnostics.
pub(crate) fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat() -> Identifier {
        Identifier::new("ChatChannel", [("room", "general")])
    }

    #[test]
    fn test_subscribe_command_format() {
        assert_eq!(
            subscribe_command(&chat()),
            r#"{"command":"subscribe","identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}"}"#
        );
    }

    #[test]
    fn test_unsubscribe_command_format() {
        let frame: Value = serde_json::from_str(&unsubscribe_command(&chat())).unwrap();
        assert_eq!(frame["command"], "unsubscribe");
        assert!(frame["identifier"].is_string());
        assert!(frame.get("data").is_none());
    }

    #[test]
    fn test_perform_command_format() {
        let data = vec![
            ("text".to_string(), json!("hi")),
            ("sequence".to_string(), json!(42)),
        ];
        let frame = perform_command("speak", &data, &chat());
        assert!(!frame.contains('\n'));

        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["command"], "message");
        assert_eq!(
            parsed["data"],
            r#"{"action":"speak","text":"hi","sequence":42}"#
        );
        let identifier = Identifier::parse(parsed["identifier"].as_str().unwrap()).unwrap();
        assert_eq!(identifier, chat());
    }

    #[test]
    fn test_perform_command_keeps_colliding_action_last() {
        let data = vec![("action".to_string(), json!("override"))];
        let frame = perform_command("speak", &data, &chat());
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["data"], r#"{"action":"speak","action":"override"}"#);
    }

    #[test]
    fn test_command_decode_round_trip() {
        let commands = [
            Command::Subscribe(chat()),
            Command::Unsubscribe(Identifier::named("Empty")),
            Command::Message {
                identifier: chat(),
                action: "speak".into(),
                data: vec![("text".into(), json!({"nested": [1, 2]}))],
            },
        ];
        for command in commands {
            assert_eq!(Command::decode(&command.encode()).unwrap(), command);
        }
    }

    #[test]
    fn test_command_decode_rejects_unknown_command() {
        let frame = r#"{"command":"shout","identifier":"{\"channel\":\"C\"}"}"#;
        assert!(Command::decode(frame).is_err());
    }

    #[test]
    fn test_decode_welcome() {
        assert_eq!(decode(r#"{"type":"welcome"}"#), WireMessage::Welcome);
    }

    #[test]
    fn test_decode_ping() {
        assert_eq!(
            decode(r#"{"type":"ping","message":1700000000}"#),
            WireMessage::Ping(1_700_000_000)
        );
        assert!(matches!(
            decode(r#"{"type":"ping","message":"soon"}"#),
            WireMessage::Error(_)
        ));
    }

    #[test]
    fn test_decode_confirm_and_reject() {
        let confirm = r#"{"type":"confirm_subscription","identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}"}"#;
        assert_eq!(decode(confirm), WireMessage::Confirm(chat()));

        let reject = r#"{"type":"reject_subscription","identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}"}"#;
        assert_eq!(decode(reject), WireMessage::Rejected(chat()));
    }

    #[test]
    fn test_decode_confirm_with_bad_identifier_is_error() {
        let frame = r#"{"type":"confirm_subscription","identifier":"{\"room\":\"x\"}","message":1}"#;
        assert!(matches!(decode(frame), WireMessage::Error(_)));
    }

    #[test]
    fn test_decode_disconnect() {
        assert_eq!(
            decode(r#"{"type":"disconnect","reason":"unauthorized","reconnect":false}"#),
            WireMessage::Disconnect {
                reason: Some("unauthorized".into()),
                reconnect: Some(false),
            }
        );
    }

    #[test]
    fn test_decode_data_push() {
        let frame = r#"{"identifier":"{\"channel\":\"ChatChannel\",\"room\":\"general\"}","message":{"text":"hi"}}"#;
        assert_eq!(
            decode(frame),
            WireMessage::ReceiveData(chat(), json!({"text": "hi"}))
        );
    }

    #[test]
    fn test_decode_data_push_with_unknown_type() {
        let frame = r#"{"type":"custom","identifier":"{\"channel\":\"C\"}","message":null}"#;
        assert_eq!(
            decode(frame),
            WireMessage::ReceiveData(Identifier::named("C"), Value::Null)
        );
    }

    #[test]
    fn test_decode_failures() {
        for frame in ["not json", "42", "{}", r#"{"identifier":"{\"channel\":\"C\"}"}"#] {
            assert!(matches!(decode(frame), WireMessage::Error(_)), "{frame}");
        }
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
