#![forbid(unsafe_code)]

pub mod codec;
pub mod envelope;

pub use codec::{
	CodecError, DEFAULT_MAX_FRAME_SIZE, decode_envelope, decode_envelope_default, decode_inbound, encode_intent,
	encode_intent_default,
};
pub use envelope::{ACTION_FIELD, ActionTag, ClientIntent, Envelope, Inbound, ModerationNotice, ServerEvent};

