#![forbid(unsafe_code)]

//! Client-side controller for one task chat room.
//!
//! [`session::ChatSession`] is the transport-free state machine; [`client::ChatClient`] drives it
//! over a WebSocket.

pub mod client;
pub mod config;
pub mod input;
pub mod moderation;
pub mod pagination;
pub mod render;
pub mod session;
pub mod view;
pub mod warnings;

pub use client::{ChatClient, SessionCommand, SessionHandle};
pub use config::{ClientConfig, SessionConfig, Settings, load_settings, load_settings_from_path};
pub use input::{Key, KeyPress};
pub use render::{DisplayNode, MessageOrigin};
pub use session::{ChatSession, ConnectionState, SessionOutcome};
pub use view::{ChatView, RecordingView, ViewEvent};

/// Client core error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientCoreError {
	/// Invalid or incomplete configuration.
	#[error("invalid configuration: {0}")]
	Config(String),

	/// Connection establishment failed.
	#[error("failed to connect: {0}")]
	Connect(String),

	/// The session task has stopped and no longer accepts commands.
	#[error("session task is not running")]
	NotRunning,

	/// Other error.
	#[error("error: {0}")]
	Other(String),
}

impl From<anyhow::Error> for ClientCoreError {
	fn from(e: anyhow::Error) -> Self {
		ClientCoreError::Other(format!("{e:#}"))
	}
}
