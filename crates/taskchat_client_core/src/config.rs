#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use serde::Deserialize;
use taskchat_domain::{RoomId, UserName};
use taskchat_protocol::DEFAULT_MAX_FRAME_SIZE;
use taskchat_util::endpoint::WsEndpoint;
use tracing::info;

use crate::ClientCoreError;

/// Local dev default, matching the task app's development server.
pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8000";

/// Default path prefix under which the chat routes are mounted.
pub const DEFAULT_PATH_PREFIX: &str = "ws";

/// Immutable per-session configuration supplied by the hosting page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
	pub room_id: RoomId,

	/// Current user; author of outgoing messages.
	pub viewer: UserName,

	/// Number of history messages stored for the room when the page was rendered.
	pub history_length: u32,

	/// Whether the viewer holds a moderator-capable role. Enables the moderation gate.
	pub moderation_enabled: bool,

	/// Moderator currently assigned to the room, if any.
	pub assigned_moderator: Option<UserName>,
}

impl SessionConfig {
	pub fn new(room_id: RoomId, viewer: UserName, history_length: u32) -> Self {
		Self {
			room_id,
			viewer,
			history_length,
			moderation_enabled: false,
			assigned_moderator: None,
		}
	}

	pub fn with_moderation(mut self, assigned_moderator: Option<UserName>) -> Self {
		self.moderation_enabled = true;
		self.assigned_moderator = assigned_moderator;
		self
	}
}

/// Transport configuration for the WebSocket connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	pub endpoint: WsEndpoint,

	/// Leading path segment(s) before `chat/room/...` (empty for none).
	pub path_prefix: String,

	/// Append `user/<viewer>/` so the broker can address confirmations to this viewer.
	pub include_user_in_path: bool,

	/// Maximum inbound/outbound text frame size.
	pub max_frame_bytes: usize,

	/// Timeout for the WebSocket handshake.
	pub connect_timeout: Duration,
}

impl ClientConfig {
	/// Convenience: create a config from `ws://host:port`.
	pub fn from_endpoint(endpoint: &str) -> Result<Self, ClientCoreError> {
		let endpoint = WsEndpoint::parse(endpoint).map_err(ClientCoreError::Config)?;
		Ok(Self {
			endpoint,
			..Self::default()
		})
	}

	/// `<endpoint>/<prefix>/chat/room/<room>/[user/<viewer>/]`
	pub fn room_url(&self, session: &SessionConfig) -> String {
		let mut segments: Vec<&str> = self.path_prefix.split('/').filter(|s| !s.is_empty()).collect();
		segments.extend(["chat", "room", session.room_id.as_str()]);
		if self.include_user_in_path {
			segments.extend(["user", session.viewer.as_str()]);
		}
		self.endpoint.url_with_segments(segments)
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			endpoint: WsEndpoint {
				secure: false,
				host: "127.0.0.1".to_string(),
				port: 8000,
			},
			path_prefix: DEFAULT_PATH_PREFIX.to_string(),
			include_user_in_path: true,
			max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
			connect_timeout: Duration::from_secs(15),
		}
	}
}

/// Session bootstrap values that may be only partially known until CLI flags are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSettings {
	pub room_id: Option<String>,
	pub user: Option<String>,
	pub history_length: Option<u32>,
	pub moderator_role: bool,
	pub moderator: Option<String>,
}

impl SessionSettings {
	pub fn build(&self) -> Result<SessionConfig, ClientCoreError> {
		let room_id = self
			.room_id
			.as_deref()
			.ok_or_else(|| ClientCoreError::Config("room id is required".to_string()))
			.and_then(|v| RoomId::new(v).map_err(|e| ClientCoreError::Config(format!("room id: {e}"))))?;

		let viewer = self
			.user
			.as_deref()
			.ok_or_else(|| ClientCoreError::Config("user is required".to_string()))
			.and_then(|v| UserName::new(v).map_err(|e| ClientCoreError::Config(format!("user: {e}"))))?;

		let assigned_moderator = match self.moderator.as_deref() {
			Some(m) => Some(UserName::new(m).map_err(|e| ClientCoreError::Config(format!("moderator: {e}")))?),
			None => None,
		};

		Ok(SessionConfig {
			room_id,
			viewer,
			history_length: self.history_length.unwrap_or(0),
			moderation_enabled: self.moderator_role,
			assigned_moderator,
		})
	}
}

/// Everything loaded from disk and environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
	pub client: ClientConfig,
	pub session: SessionSettings,
}

/// Default config path: `~/.taskchat/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".taskchat").join("config.toml"))
}

/// Load settings from the default path and env overrides.
pub fn load_settings() -> anyhow::Result<Settings> {
	let path = default_config_path()?;
	load_settings_from_path(&path)
}

/// Same as `load_settings` but with an explicit config path. A missing file is not an error.
pub fn load_settings_from_path(path: &Path) -> anyhow::Result<Settings> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut settings = Settings::from_file(file_cfg)?;

	apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;

	Ok(settings)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	endpoint: Option<String>,
	path_prefix: Option<String>,
	include_user_in_path: Option<bool>,
	max_frame_bytes: Option<usize>,
	connect_timeout_secs: Option<u64>,

	#[serde(default)]
	session: FileSessionSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileSessionSettings {
	room_id: Option<String>,
	user: Option<String>,
	history_length: Option<u32>,
	moderator_role: Option<bool>,
	moderator: Option<String>,
}

impl Settings {
	fn from_file(file: FileConfig) -> anyhow::Result<Self> {
		let mut client = ClientConfig::default();

		if let Some(endpoint) = file.endpoint.filter(|s| !s.trim().is_empty()) {
			client.endpoint = WsEndpoint::parse(&endpoint).map_err(|e| anyhow!(e))?;
		}
		if let Some(prefix) = file.path_prefix {
			client.path_prefix = prefix.trim().to_string();
		}
		client.include_user_in_path = file.include_user_in_path.unwrap_or(true);
		if let Some(max) = file.max_frame_bytes.filter(|v| *v > 0) {
			client.max_frame_bytes = max;
		}
		if let Some(secs) = file.connect_timeout_secs.filter(|v| *v > 0) {
			client.connect_timeout = Duration::from_secs(secs);
		}

		let session = SessionSettings {
			room_id: file.session.room_id.filter(|s| !s.trim().is_empty()),
			user: file.session.user.filter(|s| !s.trim().is_empty()),
			history_length: file.session.history_length,
			moderator_role: file.session.moderator_role.unwrap_or(false),
			moderator: file.session.moderator.filter(|s| !s.trim().is_empty()),
		};

		Ok(Self { client, session })
	}
}

fn parse_env_bool(v: &str) -> Option<bool> {
	match v.trim().to_ascii_lowercase().as_str() {
		"1" | "true" | "yes" | "on" => Some(true),
		"0" | "false" | "no" | "off" => Some(false),
		_ => None,
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
	let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

	if let Some(v) = non_empty("TASKCHAT_ENDPOINT") {
		settings.client.endpoint = WsEndpoint::parse(&v).map_err(|e| anyhow!(e).context("TASKCHAT_ENDPOINT"))?;
		info!("client config: endpoint overridden by env");
	}

	if let Some(v) = non_empty("TASKCHAT_ROOM_ID") {
		settings.session.room_id = Some(v);
		info!("session config: room_id overridden by env");
	}

	if let Some(v) = non_empty("TASKCHAT_USER") {
		settings.session.user = Some(v);
		info!("session config: user overridden by env");
	}

	if let Some(v) = non_empty("TASKCHAT_HISTORY_LENGTH")
		&& let Ok(n) = v.parse::<u32>()
	{
		settings.session.history_length = Some(n);
		info!(history_length = n, "session config: history_length overridden by env");
	}

	if let Some(v) = non_empty("TASKCHAT_MODERATOR_ROLE")
		&& let Some(b) = parse_env_bool(&v)
	{
		settings.session.moderator_role = b;
		info!(moderator_role = b, "session config: moderator_role overridden by env");
	}

	if let Some(v) = non_empty("TASKCHAT_MODERATOR") {
		settings.session.moderator = Some(v);
		info!("session config: moderator overridden by env");
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use tempfile::tempdir;

	use super::*;

	fn session(room: &str, user: &str) -> SessionConfig {
		SessionConfig::new(RoomId::new(room).unwrap(), UserName::new(user).unwrap(), 0)
	}

	#[test]
	fn room_url_includes_user_segment_by_default() {
		let cfg = ClientConfig::from_endpoint("ws://127.0.0.1:8000").unwrap();
		assert_eq!(cfg.room_url(&session("7", "alice")), "ws://127.0.0.1:8000/ws/chat/room/7/user/alice/");
	}

	#[test]
	fn room_url_without_prefix_or_user() {
		let cfg = ClientConfig {
			path_prefix: String::new(),
			include_user_in_path: false,
			..ClientConfig::from_endpoint("wss://tasks.example.com").unwrap()
		};
		assert_eq!(cfg.room_url(&session("7", "alice")), "wss://tasks.example.com:443/chat/room/7/");
	}

	#[test]
	fn missing_file_yields_defaults() {
		let td = tempdir().expect("tempdir");
		let file = read_toml_if_exists(&td.path().join("nope.toml")).expect("read");
		assert!(file.is_none());

		let settings = Settings::from_file(FileConfig::default()).unwrap();
		assert_eq!(settings.client.endpoint.port, 8000);
		assert!(settings.session.build().is_err());
	}

	#[test]
	fn file_settings_are_normalised() {
		let td = tempdir().expect("tempdir");
		let path = td.path().join("config.toml");
		std::fs::write(
			&path,
			r#"
endpoint = "wss://tasks.example.com:9443"
connect_timeout_secs = 3

[session]
room_id = "12"
user = "alice"
history_length = 25
moderator_role = true
moderator = "  "
"#,
		)
		.unwrap();

		let settings = Settings::from_file(read_toml_if_exists(&path).unwrap().unwrap()).unwrap();
		assert!(settings.client.endpoint.secure);
		assert_eq!(settings.client.connect_timeout, Duration::from_secs(3));

		let cfg = settings.session.build().unwrap();
		assert_eq!(cfg.room_id.as_str(), "12");
		assert_eq!(cfg.history_length, 25);
		assert!(cfg.moderation_enabled);
		assert_eq!(cfg.assigned_moderator, None);
	}

	#[test]
	fn env_overrides_win_over_file() {
		let mut settings = Settings::default();
		settings.session.room_id = Some("1".to_string());

		let env: HashMap<&str, &str> = HashMap::from([
			("TASKCHAT_ROOM_ID", "2"),
			("TASKCHAT_USER", "bob"),
			("TASKCHAT_HISTORY_LENGTH", "not-a-number"),
			("TASKCHAT_MODERATOR_ROLE", "yes"),
			("TASKCHAT_MODERATOR", "bob"),
		]);
		apply_env_overrides(&mut settings, |k| env.get(k).map(|v| v.to_string())).unwrap();

		let cfg = settings.session.build().unwrap();
		assert_eq!(cfg.room_id.as_str(), "2");
		assert_eq!(cfg.history_length, 0);
		assert!(cfg.moderation_enabled);
		assert_eq!(cfg.assigned_moderator, Some(UserName::new("bob").unwrap()));
	}

	#[test]
	fn env_bool_parsing() {
		assert_eq!(parse_env_bool(" On "), Some(true));
		assert_eq!(parse_env_bool("0"), Some(false));
		assert_eq!(parse_env_bool("maybe"), None);
	}
}
