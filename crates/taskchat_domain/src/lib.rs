#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

/// Chat room identifier (the primary key of the room on the server).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
	/// Create a non-empty `RoomId` without path separators.
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		let trimmed = id.trim();
		if trimmed.is_empty() {
			return Err(ParseIdError::Empty);
		}
		if trimmed.contains('/') {
			return Err(ParseIdError::InvalidFormat(format!("room id must not contain '/': {trimmed}")));
		}
		Ok(Self(trimmed.to_string()))
	}
	pub fn as_str(&self) -> &str {
		&self.0
	}
	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for RoomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for RoomId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		RoomId::new(s.to_string())
	}
}

/// Username of a chat participant. Used both as viewer identity and message author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserName(String);

impl UserName {
	/// Create a non-empty `UserName`.
	pub fn new(name: impl Into<String>) -> Result<Self, ParseIdError> {
		let name = name.into();
		if name.trim().is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(name))
	}
	pub fn as_str(&self) -> &str {
		&self.0
	}
	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for UserName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for UserName {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		UserName::new(s.to_string())
	}
}

impl PartialEq<str> for UserName {
	fn eq(&self, other: &str) -> bool {
		self.0 == other
	}
}

/// Server-assigned message identifier.
///
/// The broker emits database keys as JSON numbers, while identifiers read back from the
/// rendered transcript are strings; both forms decode to the same value. Always encodes as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
	pub fn new(id: impl Into<String>) -> Result<Self, ParseIdError> {
		let id = id.into();
		let trimmed = id.trim();
		if trimmed.is_empty() {
			return Err(ParseIdError::Empty);
		}
		Ok(Self(trimmed.to_string()))
	}
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for MessageId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for MessageId {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		MessageId::new(s.to_string())
	}
}

impl From<u64> for MessageId {
	fn from(id: u64) -> Self {
		Self(id.to_string())
	}
}

impl<'de> Deserialize<'de> for MessageId {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Raw {
			Int(u64),
			Str(String),
		}

		match Raw::deserialize(deserializer)? {
			Raw::Int(n) => Ok(MessageId::from(n)),
			Raw::Str(s) => MessageId::new(s).map_err(serde::de::Error::custom),
		}
	}
}

/// A chat message as produced by the server on send or history fetch.
///
/// Never mutated on the client side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub message_id: MessageId,
	pub author: UserName,
	pub content: String,
	/// Human-readable timestamp, already formatted by the server (e.g. `Today, 11:00:00`).
	pub timestamp: String,
	/// Avatar URL of the author; `null` when the author has no picture.
	#[serde(default)]
	pub picture: Option<String>,
}

impl ChatMessage {
	pub fn is_authored_by(&self, user: &UserName) -> bool {
		&self.author == user
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_empty_ids() {
		assert!(RoomId::new("").is_err());
		assert!(UserName::new("   ").is_err());
		assert!(MessageId::new(" ").is_err());
	}

	#[test]
	fn room_id_rejects_path_separators() {
		assert!(matches!(RoomId::new("1/2"), Err(ParseIdError::InvalidFormat(_))));
		assert_eq!(RoomId::new(" 42 ").unwrap().as_str(), "42");
	}

	#[test]
	fn message_id_accepts_numbers_and_strings() {
		let a: MessageId = serde_json::from_str("17").unwrap();
		let b: MessageId = serde_json::from_str("\"17\"").unwrap();
		assert_eq!(a, b);
		assert_eq!(serde_json::to_string(&a).unwrap(), "\"17\"");
	}

	#[test]
	fn chat_message_picture_defaults_to_none() {
		let raw = r#"{"message_id":3,"author":"alice","content":"hi","timestamp":"Today, 10:00:00"}"#;
		let msg: ChatMessage = serde_json::from_str(raw).unwrap();
		assert_eq!(msg.picture, None);
		assert!(msg.is_authored_by(&UserName::new("alice").unwrap()));

		let raw = r#"{"message_id":3,"author":"alice","content":"hi","timestamp":"x","picture":null}"#;
		let msg: ChatMessage = serde_json::from_str(raw).unwrap();
		assert_eq!(msg.picture, None);
	}
}
