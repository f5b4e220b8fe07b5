#![forbid(unsafe_code)]

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use taskchat_domain::{ChatMessage, MessageId, UserName};

use crate::codec::CodecError;

/// Name of the field carrying the action tag in every envelope.
pub const ACTION_FIELD: &str = "action";

/// The closed set of action tags understood by the chat room protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTag {
	SendNewMessage,
	FetchMessages,
	DeleteMessage,
	JoinChat,
	LeaveChat,
	ThrowError,
}

impl ActionTag {
	pub const ALL: [ActionTag; 6] = [
		ActionTag::SendNewMessage,
		ActionTag::FetchMessages,
		ActionTag::DeleteMessage,
		ActionTag::JoinChat,
		ActionTag::LeaveChat,
		ActionTag::ThrowError,
	];

	/// Stable wire identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			ActionTag::SendNewMessage => "send_new_message",
			ActionTag::FetchMessages => "fetch_messages",
			ActionTag::DeleteMessage => "delete_message",
			ActionTag::JoinChat => "join_chat",
			ActionTag::LeaveChat => "leave_chat",
			ActionTag::ThrowError => "throw_error",
		}
	}

	/// Exact (case-sensitive) match against the wire identifier.
	pub fn parse(s: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|tag| tag.as_str() == s)
	}
}

impl fmt::Display for ActionTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One structured frame: the action tag plus every other top-level field as payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
	pub action: String,
	pub payload: Map<String, Value>,
}

impl Envelope {
	/// Build from a JSON object. Fails when the object has no string `action` field.
	pub fn from_object(mut object: Map<String, Value>) -> Result<Self, CodecError> {
		let action = match object.remove(ACTION_FIELD) {
			Some(Value::String(action)) => action,
			Some(other) => {
				return Err(CodecError::MalformedEnvelope(format!(
					"`{ACTION_FIELD}` must be a string, got {other}"
				)));
			}
			None => {
				return Err(CodecError::MalformedEnvelope(format!("missing `{ACTION_FIELD}` field")));
			}
		};

		Ok(Self { action, payload: object })
	}

	/// Known tag, if any.
	pub fn tag(&self) -> Option<ActionTag> {
		ActionTag::parse(&self.action)
	}

	/// Classify into a typed server event. Unknown tags are not an error.
	pub fn into_inbound(self) -> Result<Inbound, CodecError> {
		let Some(tag) = self.tag() else {
			return Ok(Inbound::Unrecognized { action: self.action });
		};

		let mut object = self.payload;
		object.insert(ACTION_FIELD.to_string(), Value::String(self.action));

		serde_json::from_value::<ServerEvent>(Value::Object(object))
			.map(Inbound::Event)
			.map_err(|e| CodecError::MalformedEnvelope(format!("{tag} payload: {e}")))
	}
}

/// Result of classifying a decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
	Event(ServerEvent),
	Unrecognized { action: String },
}

/// Outbound intents, one per action the client may initiate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientIntent {
	SendNewMessage {
		author: UserName,
		content: String,
	},
	FetchMessages {
		/// Moment the client connected; the server excludes messages newer than this.
		chat_connection_timestamp: String,
		/// Cumulative number of history messages requested so far.
		visible_messages: u32,
	},
	DeleteMessage {
		message_id: MessageId,
		requester: UserName,
	},
	JoinChat {
		user: UserName,
	},
	LeaveChat {
		user: UserName,
	},
}

impl ClientIntent {
	pub fn action(&self) -> ActionTag {
		match self {
			ClientIntent::SendNewMessage { .. } => ActionTag::SendNewMessage,
			ClientIntent::FetchMessages { .. } => ActionTag::FetchMessages,
			ClientIntent::DeleteMessage { .. } => ActionTag::DeleteMessage,
			ClientIntent::JoinChat { .. } => ActionTag::JoinChat,
			ClientIntent::LeaveChat { .. } => ActionTag::LeaveChat,
		}
	}
}

/// Join/leave confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModerationNotice {
	pub notification: String,

	/// User who joined or left, when the broker names them.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<UserName>,

	/// Authoritative moderator after the change. `Some(None)` means the seat is vacant.
	#[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "present")]
	pub moderator: Option<Option<UserName>>,
}

/// Inbound events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerEvent {
	SendNewMessage {
		message: ChatMessage,
	},
	FetchMessages {
		#[serde(default)]
		messages: Vec<ChatMessage>,
	},
	DeleteMessage {
		notification: String,
	},
	JoinChat(ModerationNotice),
	LeaveChat(ModerationNotice),
	ThrowError {
		#[serde(deserialize_with = "one_or_many")]
		error: Vec<String>,
	},
}

impl ServerEvent {
	pub fn action(&self) -> ActionTag {
		match self {
			ServerEvent::SendNewMessage { .. } => ActionTag::SendNewMessage,
			ServerEvent::FetchMessages { .. } => ActionTag::FetchMessages,
			ServerEvent::DeleteMessage { .. } => ActionTag::DeleteMessage,
			ServerEvent::JoinChat(_) => ActionTag::JoinChat,
			ServerEvent::LeaveChat(_) => ActionTag::LeaveChat,
			ServerEvent::ThrowError { .. } => ActionTag::ThrowError,
		}
	}
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	T::deserialize(deserializer).map(Some)
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum OneOrMany {
		One(String),
		Many(Vec<String>),
	}

	Ok(match OneOrMany::deserialize(deserializer)? {
		OneOrMany::One(line) => vec![line],
		OneOrMany::Many(lines) => lines,
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn object(v: Value) -> Map<String, Value> {
		match v {
			Value::Object(m) => m,
			other => panic!("expected object, got {other}"),
		}
	}

	#[test]
	fn action_tags_parse_exactly() {
		for tag in ActionTag::ALL {
			assert_eq!(ActionTag::parse(tag.as_str()), Some(tag));
		}
		assert_eq!(ActionTag::parse("Send_New_Message"), None);
		assert_eq!(ActionTag::parse(""), None);
	}

	#[test]
	fn envelope_requires_string_action() {
		let err = Envelope::from_object(object(json!({"notification": "x"}))).unwrap_err();
		assert!(matches!(err, CodecError::MalformedEnvelope(_)));

		let err = Envelope::from_object(object(json!({"action": 5}))).unwrap_err();
		assert!(matches!(err, CodecError::MalformedEnvelope(_)));
	}

	#[test]
	fn unknown_action_is_unrecognized_not_error() {
		let env = Envelope::from_object(object(json!({"action": "typing", "user": "bob"}))).unwrap();
		assert_eq!(env.tag(), None);
		assert_eq!(
			env.into_inbound().unwrap(),
			Inbound::Unrecognized {
				action: "typing".to_string()
			}
		);
	}

	#[test]
	fn known_action_with_wrong_shape_is_malformed() {
		let env = Envelope::from_object(object(json!({"action": "fetch_messages", "messages": "nope"}))).unwrap();
		assert!(matches!(env.into_inbound(), Err(CodecError::MalformedEnvelope(_))));
	}

	#[test]
	fn moderation_notice_distinguishes_vacant_from_absent() {
		let vacant: ModerationNotice = serde_json::from_value(json!({"notification": "left", "moderator": null})).unwrap();
		assert_eq!(vacant.moderator, Some(None));

		let absent: ModerationNotice = serde_json::from_value(json!({"notification": "left"})).unwrap();
		assert_eq!(absent.moderator, None);

		let named: ModerationNotice =
			serde_json::from_value(json!({"notification": "joined", "moderator": "mod1"})).unwrap();
		assert_eq!(named.moderator, Some(Some(UserName::new("mod1").unwrap())));
	}

	#[test]
	fn throw_error_accepts_single_string() {
		let ev: ServerEvent = serde_json::from_value(json!({"action": "throw_error", "error": "boom"})).unwrap();
		assert_eq!(
			ev,
			ServerEvent::ThrowError {
				error: vec!["boom".to_string()]
			}
		);
	}

	#[test]
	fn broker_extra_fields_are_ignored() {
		let ev: ServerEvent = serde_json::from_value(json!({
			"type": "chat.message",
			"action": "delete_message",
			"notification": "Message deleted"
		}))
		.unwrap();
		assert_eq!(ev.action(), ActionTag::DeleteMessage);
	}
}
