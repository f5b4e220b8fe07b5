#![forbid(unsafe_code)]

use serde_json::Value;
use thiserror::Error;

use crate::envelope::{ClientIntent, Envelope, Inbound};

/// Default maximum text frame size.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024; // 2 MiB

#[derive(Debug, Error)]
pub enum CodecError {
	#[error("frame exceeds maximum size: len={len} max={max}")]
	FrameTooLarge {
		len: usize,
		max: usize,
	},

	/// Inbound text is not a JSON object with a string `action`, or its payload
	/// does not fit the shape of a known action. Callers drop the frame.
	#[error("malformed envelope: {0}")]
	MalformedEnvelope(String),

	#[error("json encode error: {0}")]
	Encode(#[from] serde_json::Error),
}

/// Serialize an outbound intent into one text frame.
pub fn encode_intent(intent: &ClientIntent, max_frame_size: usize) -> Result<String, CodecError> {
	let text = serde_json::to_string(intent)?;
	if text.len() > max_frame_size {
		return Err(CodecError::FrameTooLarge {
			len: text.len(),
			max: max_frame_size,
		});
	}
	Ok(text)
}

/// Encode using `DEFAULT_MAX_FRAME_SIZE`.
pub fn encode_intent_default(intent: &ClientIntent) -> Result<String, CodecError> {
	encode_intent(intent, DEFAULT_MAX_FRAME_SIZE)
}

/// Parse one inbound text frame into an envelope. Each frame is one complete envelope.
pub fn decode_envelope(text: &str, max_frame_size: usize) -> Result<Envelope, CodecError> {
	if text.len() > max_frame_size {
		return Err(CodecError::FrameTooLarge {
			len: text.len(),
			max: max_frame_size,
		});
	}

	let value: Value =
		serde_json::from_str(text).map_err(|e| CodecError::MalformedEnvelope(format!("invalid json: {e}")))?;

	match value {
		Value::Object(object) => Envelope::from_object(object),
		other => Err(CodecError::MalformedEnvelope(format!(
			"expected a json object, got {}",
			json_kind(&other)
		))),
	}
}

/// Decode using `DEFAULT_MAX_FRAME_SIZE`.
pub fn decode_envelope_default(text: &str) -> Result<Envelope, CodecError> {
	decode_envelope(text, DEFAULT_MAX_FRAME_SIZE)
}

/// Decode and classify in one step.
pub fn decode_inbound(text: &str, max_frame_size: usize) -> Result<Inbound, CodecError> {
	decode_envelope(text, max_frame_size)?.into_inbound()
}

fn json_kind(v: &Value) -> &'static str {
	match v {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}

#[cfg(test)]
mod tests {
	use taskchat_domain::UserName;

	use super::*;
	use crate::envelope::ActionTag;

	#[test]
	fn encode_produces_flat_tagged_object() {
		let intent = ClientIntent::JoinChat {
			user: UserName::new("mod1").unwrap(),
		};
		let text = encode_intent_default(&intent).expect("encode");
		let v: Value = serde_json::from_str(&text).unwrap();
		assert_eq!(v["action"], "join_chat");
		assert_eq!(v["user"], "mod1");
		assert_eq!(v.as_object().unwrap().len(), 2);
	}

	#[test]
	fn encode_rejects_too_large() {
		let intent = ClientIntent::SendNewMessage {
			author: UserName::new("a").unwrap(),
			content: "x".repeat(1_000),
		};
		let err = encode_intent(&intent, 64).unwrap_err();
		match err {
			CodecError::FrameTooLarge { len, max } => assert!(len > max),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn decode_rejects_non_objects_and_garbage() {
		for text in ["", "not json", "[1,2]", "\"send_new_message\"", "null"] {
			let err = decode_envelope_default(text).unwrap_err();
			assert!(matches!(err, CodecError::MalformedEnvelope(_)), "{text:?} -> {err:?}");
		}
	}

	#[test]
	fn decode_rejects_oversized_frames() {
		let text = format!(r#"{{"action":"delete_message","notification":"{}"}}"#, "y".repeat(100));
		assert!(matches!(
			decode_envelope(&text, 32),
			Err(CodecError::FrameTooLarge { .. })
		));
	}

	#[test]
	fn decode_splits_action_from_payload() {
		let env = decode_envelope_default(r#"{"action":"delete_message","notification":"gone"}"#).unwrap();
		assert_eq!(env.tag(), Some(ActionTag::DeleteMessage));
		assert_eq!(env.payload.get("notification").and_then(Value::as_str), Some("gone"));
		assert!(!env.payload.contains_key("action"));
	}
}
