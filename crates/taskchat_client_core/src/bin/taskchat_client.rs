#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::anyhow;
use taskchat_client_core::{
	ChatClient, ChatView, ClientConfig, DisplayNode, KeyPress, MessageOrigin, SessionCommand, SessionConfig,
	SessionHandle, load_settings, load_settings_from_path,
};
use taskchat_domain::MessageId;
use taskchat_util::endpoint::{WsEndpoint, validate_ws_endpoint};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{info, warn};

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: taskchat_client [--connect ws://host:port] --room <id> --user <name> [options]\n\
\n\
Options:\n\
	--connect          Server endpoint (alias: --endpoint) (default: ws://127.0.0.1:8000)\n\
	                   Format: ws://host:port or wss://host:port\n\
	--endpoint         Alias for --connect\n\
	--room             Room (task) id\n\
	--user             Viewer name; author of outgoing messages\n\
	--history-length   Number of stored messages in the room (default: 0)\n\
	--moderator-role   Viewer may moderate this room\n\
	--moderator        Moderator currently assigned to the room\n\
	--config           Config file (default: ~/.taskchat/config.toml)\n\
	--help             Show this help\n\
\n\
Commands (stdin):\n\
	/more              Load older messages\n\
	/delete <id>       Delete a message\n\
	/join, /leave      Claim or give up the moderator seat\n\
	/dismiss           Dismiss the warning banner\n\
	/ok                Close the confirmation (resets the session)\n\
	/reset             Reconnect with fresh configuration\n\
	/quit              Exit\n\
	anything else      Send as a message\n\
\n\
Examples:\n\
	taskchat_client --room 42 --user alice --history-length 25\n\
	taskchat_client --connect wss://tasks.example.com:443 --room 42 --user mod1 --moderator-role\n"
	);
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,taskchat_client_core=debug".to_string());
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

/// Flags layered over the config file and environment.
#[derive(Debug, Clone, Default)]
struct CliArgs {
	config: Option<PathBuf>,
	endpoint: Option<String>,
	room_id: Option<String>,
	user: Option<String>,
	history_length: Option<u32>,
	moderator_role: bool,
	moderator: Option<String>,
}

fn parse_args() -> CliArgs {
	let mut args = CliArgs::default();

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--connect" | "--endpoint" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if let Err(e) = validate_ws_endpoint(&v) {
					eprintln!("Invalid --connect value: {v}\n{e}");
					usage_and_exit();
				}
				args.endpoint = Some(v);
			}
			"--room" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--room must be non-empty");
					usage_and_exit();
				}
				args.room_id = Some(v);
			}
			"--user" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--user must be non-empty");
					usage_and_exit();
				}
				args.user = Some(v);
			}
			"--history-length" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				let parsed: u32 = v.parse().unwrap_or_else(|_| {
					eprintln!("Invalid --history-length value: {v}");
					usage_and_exit()
				});
				args.history_length = Some(parsed);
			}
			"--moderator-role" => args.moderator_role = true,
			"--moderator" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--moderator must be non-empty");
					usage_and_exit();
				}
				args.moderator = Some(v);
			}
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				args.config = Some(PathBuf::from(v));
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	args
}

/// Config file, then environment, then flags. Re-run on every reset.
fn resolve(args: &CliArgs) -> anyhow::Result<(ClientConfig, SessionConfig)> {
	let mut settings = match &args.config {
		Some(path) => load_settings_from_path(path)?,
		None => load_settings()?,
	};

	if let Some(endpoint) = &args.endpoint {
		settings.client.endpoint = WsEndpoint::parse(endpoint).map_err(|e| anyhow!(e))?;
	}
	if let Some(room_id) = &args.room_id {
		settings.session.room_id = Some(room_id.clone());
	}
	if let Some(user) = &args.user {
		settings.session.user = Some(user.clone());
	}
	if let Some(len) = args.history_length {
		settings.session.history_length = Some(len);
	}
	if args.moderator_role {
		settings.session.moderator_role = true;
	}
	if let Some(moderator) = &args.moderator {
		settings.session.moderator = Some(moderator.clone());
	}

	let session = settings.session.build()?;
	Ok((settings.client, session))
}

/// Prints the transcript to stdout; warnings go to stderr.
#[derive(Debug, Default)]
struct TerminalView;

fn format_node(node: &DisplayNode) -> String {
	let who = match node.origin {
		MessageOrigin::Own => "you :".to_string(),
		MessageOrigin::Other => node.author_label.clone().unwrap_or_default(),
	};
	let delete = if node.delete_offered { " [/delete]" } else { "" };
	format!("[{}] #{} {} {}{}", node.title, node.message_id, who, node.content, delete)
}

impl ChatView for TerminalView {
	fn append_message(&mut self, node: DisplayNode) {
		println!("{}", format_node(&node));
	}

	fn insert_history_message(&mut self, node: DisplayNode) {
		println!("(history) {}", format_node(&node));
	}

	fn update_message(&mut self, node: DisplayNode) {
		println!("(updated) {}", format_node(&node));
	}

	fn scroll_to_latest(&mut self) {}

	fn set_history_remaining(&mut self, remaining: u32) {
		if remaining > 0 {
			println!("-- {remaining} older messages, /more to load --");
		}
	}

	fn set_load_more_visible(&mut self, visible: bool) {
		if !visible {
			println!("-- start of conversation --");
		}
	}

	fn show_notification(&mut self, text: &str) {
		println!("** {text} ** (/ok to continue)");
	}

	fn show_warnings(&mut self, lines: &[String]) {
		for line in lines {
			eprintln!("!! {line}");
		}
		eprintln!("!! (/dismiss to hide)");
	}

	fn hide_warnings(&mut self) {}

	fn set_input_enabled(&mut self, enabled: bool) {
		if !enabled {
			println!("-- read only: another moderator holds this room --");
		}
	}

	fn set_moderation_controls(&mut self, join_visible: bool, leave_visible: bool) {
		if join_visible {
			println!("-- no moderator assigned, /join to take over --");
		}
		if leave_visible {
			println!("-- you are the moderator, /leave to step down --");
		}
	}

	fn set_draft(&mut self, _text: &str) {}

	fn set_letter_count(&mut self, _count: usize) {}

	fn clear_transcript(&mut self) {
		println!("-- session reset --");
	}
}

fn parse_line(line: &str) -> Option<SessionCommand> {
	let cmd = match line.trim_end() {
		"/more" => SessionCommand::LoadMore,
		"/join" => SessionCommand::JoinModeration,
		"/leave" => SessionCommand::LeaveModeration,
		"/dismiss" => SessionCommand::DismissWarnings,
		"/ok" => SessionCommand::DismissNotification,
		"/reset" => SessionCommand::Reset,
		"/quit" => SessionCommand::Shutdown,
		other if other.starts_with("/delete") => {
			let id = other.trim_start_matches("/delete").trim();
			match id.parse::<MessageId>() {
				Ok(id) => SessionCommand::DeleteMessage(id),
				Err(e) => {
					eprintln!("usage: /delete <id> ({e})");
					return None;
				}
			}
		}
		_ => SessionCommand::KeyPressed {
			text: line.to_string(),
			key: KeyPress::ENTER,
		},
	};
	Some(cmd)
}

fn spawn_stdin_reader(handle: SessionHandle) {
	tokio::spawn(async move {
		let mut lines = BufReader::new(tokio::io::stdin()).lines();
		loop {
			match lines.next_line().await {
				Ok(Some(line)) => {
					let Some(cmd) = parse_line(&line) else {
						continue;
					};
					let quit = cmd == SessionCommand::Shutdown;
					if handle.send(cmd).is_err() || quit {
						break;
					}
				}
				Ok(None) => {
					let _ = handle.shutdown();
					break;
				}
				Err(e) => {
					warn!(error = %e, "stdin read failed");
					let _ = handle.shutdown();
					break;
				}
			}
		}
	});
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let args = parse_args();

	let (client_cfg, session_cfg) = resolve(&args)?;
	info!(url = %client_cfg.room_url(&session_cfg), "starting chat client");

	let refresh_args = args.clone();
	let (client, handle) = ChatClient::new(client_cfg, session_cfg, TerminalView);
	let client = client.with_config_refresh(move || Ok(resolve(&refresh_args)?.1));

	spawn_stdin_reader(handle);
	client.run().await?;

	Ok(())
}
