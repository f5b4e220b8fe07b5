#![forbid(unsafe_code)]

use std::collections::VecDeque;

use chrono::{DateTime, SecondsFormat, Utc};
use taskchat_domain::{ChatMessage, MessageId};
use taskchat_protocol::{ClientIntent, DEFAULT_MAX_FRAME_SIZE, Inbound, ModerationNotice, ServerEvent, decode_inbound, encode_intent};
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::input::{DraftUpdate, InputValidator, KeyPress};
use crate::moderation::{ModerationChange, ModerationGate};
use crate::pagination::HistoryPaginator;
use crate::render::{self, DisplayNode, Viewer};
use crate::view::ChatView;
use crate::warnings::{WarningBanner, connection_closed_lines};

/// Close code reported when the peer closed without a status.
pub const CLOSE_CODE_NO_STATUS: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_CODE_ABNORMAL: u16 = 1006;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Connecting,
	Open,
	/// Error signal seen. Inert like `Closed`; the close signal that follows reports the code.
	Failed,
	/// Terminal. Only `reset` leaves this state.
	Closed { code: u16 },
}

/// What the caller should do after a local UI event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
	Continue,
	/// Tear down the connection and call `reset` with fresh configuration.
	ResetRequested,
}

#[derive(Debug)]
enum Link {
	Connecting,
	/// Frames queued for the transport. Only exists while open.
	Open { outbox: VecDeque<String> },
	Failed,
	Closed { code: u16 },
}

/// Controller for one room/viewer connection.
///
/// Sans-IO: the transport feeds lifecycle signals and inbound frames in, and drains
/// encoded outbound frames with [`ChatSession::drain_outbound`]. All mutation happens on the
/// caller's thread in the order events arrive.
pub struct ChatSession<V> {
	config: SessionConfig,
	connected_at: DateTime<Utc>,
	max_frame_bytes: usize,
	link: Link,
	paginator: HistoryPaginator,
	gate: ModerationGate,
	input: InputValidator,
	warnings: WarningBanner,
	transcript: VecDeque<ChatMessage>,
	notification_open: bool,
	view: V,
}

impl<V: ChatView> ChatSession<V> {
	pub fn new(config: SessionConfig, view: V) -> Self {
		Self {
			paginator: HistoryPaginator::new(config.history_length),
			gate: gate_for(&config),
			config,
			connected_at: Utc::now(),
			max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
			link: Link::Connecting,
			input: InputValidator::new(),
			warnings: WarningBanner::new(),
			transcript: VecDeque::new(),
			notification_open: false,
			view,
		}
	}

	pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
		self.max_frame_bytes = max_frame_bytes;
		self
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn state(&self) -> ConnectionState {
		match self.link {
			Link::Connecting => ConnectionState::Connecting,
			Link::Open { .. } => ConnectionState::Open,
			Link::Failed => ConnectionState::Failed,
			Link::Closed { code } => ConnectionState::Closed { code },
		}
	}

	pub fn is_open(&self) -> bool {
		matches!(self.link, Link::Open { .. })
	}

	/// Captured when the session was constructed (or last reset), in `2023-10-08T11:00:00.000Z` form.
	pub fn connection_timestamp(&self) -> String {
		self.connected_at.to_rfc3339_opts(SecondsFormat::Millis, true)
	}

	pub fn paginator(&self) -> &HistoryPaginator {
		&self.paginator
	}

	pub fn moderation(&self) -> &ModerationGate {
		&self.gate
	}

	pub fn warnings(&self) -> &WarningBanner {
		&self.warnings
	}

	/// Messages in display order.
	pub fn transcript(&self) -> impl Iterator<Item = &ChatMessage> {
		self.transcript.iter()
	}

	pub fn view(&self) -> &V {
		&self.view
	}

	pub fn view_mut(&mut self) -> &mut V {
		&mut self.view
	}

	pub fn into_view(self) -> V {
		self.view
	}

	/// Encoded frames waiting for the transport. Empty unless open.
	pub fn drain_outbound(&mut self) -> Vec<String> {
		match &mut self.link {
			Link::Open { outbox } => outbox.drain(..).collect(),
			_ => Vec::new(),
		}
	}

	// Connection lifecycle.

	/// The transport is ready. Senders exist only from here on.
	pub fn on_open(&mut self) {
		if !matches!(self.link, Link::Connecting) {
			warn!(state = ?self.state(), "open signal outside of connecting state; ignored");
			return;
		}

		self.link = Link::Open {
			outbox: VecDeque::new(),
		};
		info!(room = %self.config.room_id, viewer = %self.config.viewer, "chat session open");

		if self.gate.is_enabled() {
			self.apply_gate();
		}

		let ts = self.connection_timestamp();
		if let Some(intent) = self.paginator.first_page(&ts) {
			self.send(intent);
		}

		self.input = InputValidator::new();
		self.view.set_draft("");
		self.view.set_letter_count(0);
		self.view.focus_input();
	}

	/// Close signal from the transport. Terminal: the session never sends again.
	pub fn on_close(&mut self, code: u16) {
		if let Link::Closed { code: prev } = self.link {
			debug!(code, prev, "duplicate close signal ignored");
			return;
		}

		if let Link::Open { outbox } = &self.link
			&& !outbox.is_empty()
		{
			debug!(dropped = outbox.len(), "discarding unsent frames on close");
		}

		self.link = Link::Closed { code };
		error!(code, room = %self.config.room_id, "chat connection has been closed");

		self.warnings.extend(connection_closed_lines(code));
		self.view.show_warnings(self.warnings.lines());
	}

	/// Low-level error signal. The session stops sending at once; the close signal expected to
	/// follow does the user-visible part.
	pub fn on_error(&mut self, detail: &str) {
		warn!(error = %detail, state = ?self.state(), "chat connection error");

		if let Link::Open { outbox } = &self.link
			&& !outbox.is_empty()
		{
			debug!(dropped = outbox.len(), "discarding unsent frames on error");
		}
		if matches!(self.link, Link::Connecting | Link::Open { .. }) {
			self.link = Link::Failed;
		}
	}

	/// One inbound text frame. Malformed frames and unknown actions are dropped.
	pub fn on_frame(&mut self, text: &str) {
		if !self.is_open() {
			debug!(state = ?self.state(), "frame received while not open; dropped");
			return;
		}

		match decode_inbound(text, self.max_frame_bytes) {
			Ok(Inbound::Event(event)) => self.dispatch(event),
			Ok(Inbound::Unrecognized { action }) => {
				warn!(action = %action, "ignoring envelope with unrecognized action");
			}
			Err(e) => {
				warn!(error = %e, "dropping inbound frame");
			}
		}
	}

	fn dispatch(&mut self, event: ServerEvent) {
		debug!(action = %event.action(), "dispatching inbound envelope");

		match event {
			ServerEvent::SendNewMessage { message } => self.on_new_message(message),
			ServerEvent::FetchMessages { messages } => self.on_history_page(messages),
			ServerEvent::DeleteMessage { notification } => self.notify(&notification),
			ServerEvent::JoinChat(notice) => self.on_moderation_notice(ModerationChange::Joined, notice),
			ServerEvent::LeaveChat(notice) => self.on_moderation_notice(ModerationChange::Left, notice),
			ServerEvent::ThrowError { error } => self.on_server_errors(error),
		}
	}

	fn on_new_message(&mut self, message: ChatMessage) {
		let node = self.render(&message);
		self.transcript.push_back(message);
		self.view.append_message(node);
		self.view.scroll_to_latest();
	}

	fn on_history_page(&mut self, messages: Vec<ChatMessage>) {
		for message in messages {
			let node = self.render(&message);
			self.transcript.push_front(message);
			self.view.insert_history_message(node);
		}

		let page = self.paginator.page_received();
		self.view.set_history_remaining(page.remaining);
		if page.scroll_to_latest {
			self.view.scroll_to_latest();
		}
		if page.hide_load_more {
			self.view.set_load_more_visible(false);
		}
	}

	fn on_moderation_notice(&mut self, change: ModerationChange, notice: ModerationNotice) {
		self.notify(&notice.notification);

		let was_moderator = self.gate.is_self_moderator();
		if self.gate.apply_notice(change, &notice) && self.gate.is_enabled() {
			self.apply_gate();
			if self.gate.is_self_moderator() != was_moderator {
				self.refresh_delete_controls();
			}
		}
	}

	/// Other people's messages offer delete only to the seated moderator.
	fn refresh_delete_controls(&mut self) {
		let nodes: Vec<DisplayNode> = self
			.transcript
			.iter()
			.filter(|m| !m.is_authored_by(&self.config.viewer))
			.map(|m| self.render(m))
			.collect();
		for node in nodes {
			self.view.update_message(node);
		}
	}

	fn on_server_errors(&mut self, lines: Vec<String>) {
		if lines.is_empty() {
			return;
		}
		self.warnings.extend(lines);
		self.view.show_warnings(self.warnings.lines());
	}

	fn notify(&mut self, text: &str) {
		self.notification_open = true;
		self.view.show_notification(text);
	}

	// Local UI events.

	/// Input text changed.
	pub fn draft_changed(&mut self, text: &str) {
		match self.input.draft_changed(text) {
			DraftUpdate::Cleared => {
				self.view.set_draft("");
				self.view.set_letter_count(0);
			}
			DraftUpdate::Counted(n) => self.view.set_letter_count(n),
		}
	}

	/// Key released in the input; plain Enter behaves like the submit control.
	pub fn key_released(&mut self, text: &str, key: KeyPress) -> bool {
		let text = match self.input.draft_changed(text) {
			DraftUpdate::Cleared => {
				self.view.set_draft("");
				self.view.set_letter_count(0);
				""
			}
			DraftUpdate::Counted(n) => {
				self.view.set_letter_count(n);
				text
			}
		};

		key.submits() && self.submit(text)
	}

	/// Submit control. Empty or blank text is a silent no-op.
	pub fn submit(&mut self, text: &str) -> bool {
		if !self.gate.decision().input_enabled {
			return false;
		}
		let Some(content) = self.input.accept(text) else {
			return false;
		};

		let intent = ClientIntent::SendNewMessage {
			author: self.config.viewer.clone(),
			content: content.to_string(),
		};
		if !self.send(intent) {
			return false;
		}

		self.input.submitted();
		self.view.set_draft("");
		self.view.set_letter_count(0);
		true
	}

	/// "Load more" control. No-op once history is exhausted.
	pub fn load_more(&mut self) -> bool {
		if !self.is_open() {
			return false;
		}
		let ts = self.connection_timestamp();
		match self.paginator.next_page(&ts) {
			Some(intent) => self.send(intent),
			None => false,
		}
	}

	/// Delete control on a rendered message. Only offered to the author or the seated moderator.
	pub fn delete_message(&mut self, message_id: &MessageId) -> bool {
		let Some(message) = self.transcript.iter().find(|m| &m.message_id == message_id) else {
			debug!(message_id = %message_id, "delete requested for message not in transcript");
			return false;
		};
		if !self.render(message).delete_offered {
			return false;
		}

		self.send(ClientIntent::DeleteMessage {
			message_id: message_id.clone(),
			requester: self.config.viewer.clone(),
		})
	}

	/// Claim the vacant moderator seat. The gate changes only on confirmation.
	pub fn join_moderation(&mut self) -> bool {
		match self.gate.join_intent() {
			Some(intent) => self.send(intent),
			None => false,
		}
	}

	/// Give up the moderator seat. The gate changes only on confirmation.
	pub fn leave_moderation(&mut self) -> bool {
		match self.gate.leave_intent() {
			Some(intent) => self.send(intent),
			None => false,
		}
	}

	/// Click on the warning banner.
	pub fn dismiss_warnings(&mut self) {
		self.warnings.dismiss();
		self.view.hide_warnings();
	}

	/// Confirmation modal closed. Role or transcript changes are picked up by a reset.
	pub fn dismiss_notification(&mut self) -> SessionOutcome {
		if !self.notification_open {
			return SessionOutcome::Continue;
		}
		self.notification_open = false;
		SessionOutcome::ResetRequested
	}

	/// Rebuild all state from fresh configuration and wait for a new open signal.
	/// The caller owns tearing down the old transport.
	pub fn reset(&mut self, config: SessionConfig) {
		info!(room = %config.room_id, viewer = %config.viewer, "resetting chat session");

		self.link = Link::Connecting;
		self.connected_at = Utc::now();
		self.paginator = HistoryPaginator::new(config.history_length);
		self.gate = gate_for(&config);
		self.input = InputValidator::new();
		self.warnings = WarningBanner::new();
		self.transcript.clear();
		self.notification_open = false;
		self.config = config;

		self.view.clear_transcript();
		self.view.hide_warnings();
		self.view.set_load_more_visible(true);
		self.view.set_history_remaining(self.paginator.remaining());
		self.apply_gate();
	}

	fn apply_gate(&mut self) {
		let d = self.gate.decision();
		self.view.set_input_enabled(d.input_enabled);
		self.view.set_moderation_controls(d.join_visible, d.leave_visible);
	}

	fn render(&self, message: &ChatMessage) -> DisplayNode {
		render::render(
			message,
			&Viewer {
				identity: &self.config.viewer,
				is_moderator: self.gate.is_self_moderator(),
			},
		)
	}

	fn send(&mut self, intent: ClientIntent) -> bool {
		let Link::Open { outbox } = &mut self.link else {
			debug!(action = %intent.action(), state = ?self.state(), "session not open; intent dropped");
			return false;
		};

		match encode_intent(&intent, self.max_frame_bytes) {
			Ok(text) => {
				debug!(action = %intent.action(), "queued outbound intent");
				outbox.push_back(text);
				true
			}
			Err(e) => {
				warn!(action = %intent.action(), error = %e, "failed to encode outbound intent");
				false
			}
		}
	}
}

fn gate_for(config: &SessionConfig) -> ModerationGate {
	ModerationGate::new(
		config.moderation_enabled,
		config.viewer.clone(),
		config.assigned_moderator.clone(),
	)
}

#[cfg(test)]
mod tests {
	use serde_json::{Value, json};
	use taskchat_domain::{RoomId, UserName};

	use super::*;
	use crate::input::Key;
	use crate::render::MessageOrigin;
	use crate::view::{RecordingView, ViewEvent};

	fn user(name: &str) -> UserName {
		UserName::new(name).unwrap()
	}

	fn config(viewer: &str, history_length: u32) -> SessionConfig {
		SessionConfig::new(RoomId::new("7").unwrap(), user(viewer), history_length)
	}

	fn open(cfg: SessionConfig) -> (ChatSession<RecordingView>, RecordingView) {
		let view = RecordingView::new();
		let mut s = ChatSession::new(cfg, view.clone());
		s.on_open();
		(s, view)
	}

	fn sent(s: &mut ChatSession<RecordingView>) -> Vec<Value> {
		s.drain_outbound()
			.iter()
			.map(|f| serde_json::from_str(f).expect("outbound json"))
			.collect()
	}

	fn message(id: u64, author: &str, content: &str) -> Value {
		json!({"message_id": id, "author": author, "content": content, "timestamp": "Today, 11:00:00", "picture": null})
	}

	fn history(ids: &[u64]) -> String {
		let messages: Vec<Value> = ids.iter().map(|id| message(*id, "bob", "old")).collect();
		json!({"action": "fetch_messages", "messages": messages}).to_string()
	}

	#[test]
	fn nothing_is_sent_before_open() {
		let view = RecordingView::new();
		let mut s = ChatSession::new(config("alice", 30), view.clone());
		assert_eq!(s.state(), ConnectionState::Connecting);

		assert!(!s.submit("hello"));
		assert!(!s.load_more());
		assert!(s.drain_outbound().is_empty());
		assert_eq!(s.paginator().visible_count(), 0);
	}

	#[test]
	fn open_requests_first_page_with_connection_timestamp() {
		let (mut s, view) = open(config("alice", 30));
		assert_eq!(s.state(), ConnectionState::Open);

		let frames = sent(&mut s);
		assert_eq!(frames.len(), 1);
		assert_eq!(frames[0]["action"], "fetch_messages");
		assert_eq!(frames[0]["visible_messages"], 10);
		assert_eq!(frames[0]["chat_connection_timestamp"], s.connection_timestamp());
		assert!(s.connection_timestamp().ends_with('Z'));

		let events = view.events();
		assert!(events.contains(&ViewEvent::Draft(String::new())));
		assert!(events.contains(&ViewEvent::Focused));
		// No gate without moderation.
		assert!(!events.iter().any(|e| matches!(e, ViewEvent::InputEnabled(_))));
	}

	#[test]
	fn second_open_signal_is_ignored() {
		let (mut s, _view) = open(config("alice", 30));
		let _ = sent(&mut s);
		s.on_open();
		assert!(s.drain_outbound().is_empty());
		assert_eq!(s.paginator().visible_count(), 10);
	}

	#[test]
	fn single_page_history_scrolls_once_and_hides_load_more() {
		let (mut s, view) = open(config("alice", 10));
		let _ = sent(&mut s);
		view.drain();

		s.on_frame(&history(&[10, 9, 8]));
		let events = view.drain();
		let inserted: Vec<&str> = events
			.iter()
			.filter_map(|e| match e {
				ViewEvent::InsertedHistory(n) => Some(n.message_id.as_str()),
				_ => None,
			})
			.collect();
		assert_eq!(inserted, ["10", "9", "8"]);
		assert_eq!(events.iter().filter(|e| **e == ViewEvent::ScrolledToLatest).count(), 1);
		assert!(events.contains(&ViewEvent::LoadMoreVisible(false)));
		assert!(events.contains(&ViewEvent::HistoryRemaining(0)));

		// Transcript reads oldest-first.
		let ids: Vec<&str> = s.transcript().map(|m| m.message_id.as_str()).collect();
		assert_eq!(ids, ["8", "9", "10"]);

		assert!(!s.load_more());
		assert!(s.drain_outbound().is_empty());
	}

	#[test]
	fn later_pages_do_not_scroll() {
		let (mut s, view) = open(config("alice", 25));
		s.on_frame(&history(&[25, 24]));
		let _ = sent(&mut s);

		assert!(s.load_more());
		assert_eq!(sent(&mut s)[0]["visible_messages"], 20);
		view.drain();
		s.on_frame(&history(&[15]));
		let events = view.drain();
		assert!(!events.contains(&ViewEvent::ScrolledToLatest));
		assert!(!events.contains(&ViewEvent::LoadMoreVisible(false)));

		assert!(s.load_more());
		s.on_frame(&history(&[5]));
		assert!(view.drain().contains(&ViewEvent::LoadMoreVisible(false)));
		assert_eq!(s.paginator().visible_count(), 30);
		assert!(!s.load_more());
	}

	#[test]
	fn live_messages_render_for_any_author() {
		let (mut s, view) = open(config("alice", 0));
		view.drain();

		s.on_frame(&json!({"action": "send_new_message", "message": message(1, "alice", "mine")}).to_string());
		s.on_frame(&json!({"action": "send_new_message", "message": message(2, "bob", "theirs")}).to_string());

		let appended: Vec<DisplayNode> = view
			.events()
			.into_iter()
			.filter_map(|e| match e {
				ViewEvent::Appended(n) => Some(n),
				_ => None,
			})
			.collect();
		assert_eq!(appended.len(), 2);
		assert_eq!(appended[0].origin, MessageOrigin::Own);
		assert_eq!(appended[1].author_label.as_deref(), Some("bob :"));
	}

	#[test]
	fn blank_and_empty_drafts_never_send() {
		let (mut s, view) = open(config("alice", 0));
		let _ = sent(&mut s);

		assert!(!s.submit(""));
		assert!(!s.submit("   "));
		assert!(!s.key_released(" \n", KeyPress::ENTER));
		assert!(s.drain_outbound().is_empty());
		assert!(view.events().contains(&ViewEvent::Draft(String::new())));
	}

	#[test]
	fn enter_submits_and_resets_counter() {
		let (mut s, view) = open(config("alice", 0));
		let _ = sent(&mut s);
		view.drain();

		assert!(!s.key_released("hi", KeyPress { key: Key::Other, shift: false }));
		assert!(!s.key_released("hi\n", KeyPress { key: Key::Enter, shift: true }));
		assert!(s.key_released("hi\n", KeyPress::ENTER));

		let frames = sent(&mut s);
		assert_eq!(frames, [json!({"action": "send_new_message", "author": "alice", "content": "hi\n"})]);
		let events = view.drain();
		assert_eq!(events.last(), Some(&ViewEvent::LetterCount(0)));
		assert!(events.contains(&ViewEvent::LetterCount(2)));
	}

	#[test]
	fn delete_offered_only_to_author_or_seated_moderator() {
		let (mut s, _view) = open(config("alice", 0));
		s.on_frame(&json!({"action": "send_new_message", "message": message(1, "alice", "mine")}).to_string());
		s.on_frame(&json!({"action": "send_new_message", "message": message(2, "bob", "theirs")}).to_string());
		let _ = sent(&mut s);

		assert!(!s.delete_message(&MessageId::from(2)));
		assert!(!s.delete_message(&MessageId::from(99)));
		assert!(s.delete_message(&MessageId::from(1)));
		assert_eq!(
			sent(&mut s),
			[json!({"action": "delete_message", "message_id": "1", "requester": "alice"})]
		);

		let mut moderated = config("mod1", 0).with_moderation(Some(user("mod1")));
		moderated.room_id = RoomId::new("8").unwrap();
		let (mut m, _view) = open(moderated);
		m.on_frame(&json!({"action": "send_new_message", "message": message(3, "bob", "spam")}).to_string());
		let _ = sent(&mut m);
		assert!(m.delete_message(&MessageId::from(3)));
	}

	#[test]
	fn deletion_confirmation_is_notification_only() {
		let (mut s, view) = open(config("alice", 0));
		view.drain();

		s.on_frame(r#"{"action":"delete_message","notification":"Message has been deleted"}"#);
		let events = view.drain();
		assert_eq!(events, [ViewEvent::Notification("Message has been deleted".to_string())]);
		assert!(s.warnings().lines().is_empty());

		assert_eq!(s.dismiss_notification(), SessionOutcome::ResetRequested);
		assert_eq!(s.dismiss_notification(), SessionOutcome::Continue);
	}

	#[test]
	fn moderator_gate_applied_on_open() {
		let cfg = config("mod2", 0).with_moderation(None);
		let (mut s, view) = open(cfg);
		let events = view.events();
		assert!(events.contains(&ViewEvent::InputEnabled(false)));
		assert!(events.contains(&ViewEvent::ModerationControls {
			join_visible: true,
			leave_visible: false
		}));
		let _ = sent(&mut s);
		assert!(!s.submit("hello"));
		assert!(s.drain_outbound().is_empty());
	}

	#[test]
	fn join_is_fire_and_forget_until_confirmed() {
		let (mut s, view) = open(config("mod1", 0).with_moderation(None));
		let _ = sent(&mut s);
		view.drain();

		assert!(s.join_moderation());
		assert_eq!(sent(&mut s), [json!({"action": "join_chat", "user": "mod1"})]);
		assert!(view.drain().is_empty());
		assert!(!s.moderation().is_self_moderator());

		s.on_frame(r#"{"action":"join_chat","notification":"You joined the chat","user":"mod1"}"#);
		let events = view.drain();
		assert!(events.contains(&ViewEvent::Notification("You joined the chat".to_string())));
		assert!(events.contains(&ViewEvent::InputEnabled(true)));
		assert!(events.contains(&ViewEvent::ModerationControls {
			join_visible: false,
			leave_visible: true
		}));
		assert!(!events.iter().any(|e| matches!(e, ViewEvent::Warnings(_))));

		assert!(!s.join_moderation());
		assert!(s.leave_moderation());
		let _ = sent(&mut s);
		s.on_frame(r#"{"action":"leave_chat","notification":"You left the chat","user":"mod1"}"#);
		assert!(view.drain().contains(&ViewEvent::InputEnabled(false)));
	}

	#[test]
	fn seat_change_rerenders_delete_controls() {
		let (mut s, view) = open(config("mod1", 0).with_moderation(None));
		s.on_frame(&json!({"action": "send_new_message", "message": message(1, "bob", "spam")}).to_string());
		s.on_frame(&json!({"action": "send_new_message", "message": message(2, "mod1", "mine")}).to_string());
		view.drain();

		s.on_frame(r#"{"action":"join_chat","notification":"joined","user":"mod1"}"#);
		let updated: Vec<DisplayNode> = view
			.drain()
			.into_iter()
			.filter_map(|e| match e {
				ViewEvent::Updated(n) => Some(n),
				_ => None,
			})
			.collect();
		assert_eq!(updated.len(), 1);
		assert_eq!(updated[0].message_id, MessageId::from(1));
		assert!(updated[0].delete_offered);

		s.on_frame(r#"{"action":"leave_chat","notification":"left","user":"mod1"}"#);
		assert!(view.drain().contains(&ViewEvent::Updated(DisplayNode {
			delete_offered: false,
			..updated[0].clone()
		})));

		// Someone else's leave does not touch the seat or the transcript.
		s.on_frame(r#"{"action":"join_chat","notification":"joined","user":"mod1"}"#);
		view.drain();
		s.on_frame(r#"{"action":"leave_chat","notification":"mod2 left","user":"mod2"}"#);
		assert!(s.moderation().is_self_moderator());
		assert!(!view.drain().iter().any(|e| matches!(e, ViewEvent::Updated(_))));
	}

	#[test]
	fn server_errors_accumulate_until_dismissed() {
		let (mut s, view) = open(config("alice", 0));
		view.drain();

		s.on_frame(r#"{"action":"throw_error","error":["first"]}"#);
		s.on_frame(r#"{"action":"throw_error","error":["second","third"]}"#);
		assert_eq!(s.warnings().lines(), ["first", "second", "third"]);
		assert_eq!(
			view.events().last(),
			Some(&ViewEvent::Warnings(vec![
				"first".to_string(),
				"second".to_string(),
				"third".to_string()
			]))
		);

		s.dismiss_warnings();
		assert!(!s.warnings().is_visible());
		s.on_frame(r#"{"action":"throw_error","error":["fresh"]}"#);
		assert_eq!(s.warnings().lines(), ["fresh"]);
	}

	#[test]
	fn malformed_and_unknown_frames_are_dropped() {
		let (mut s, view) = open(config("alice", 0));
		view.drain();

		s.on_frame("not json");
		s.on_frame(r#"{"notification":"no action"}"#);
		s.on_frame(r#"{"action":"typing","user":"bob"}"#);
		s.on_frame(r#"{"action":"send_new_message","message":{"content":"no id"}}"#);
		assert!(view.events().is_empty());
		assert_eq!(s.state(), ConnectionState::Open);

		s.on_frame(&json!({"action": "send_new_message", "message": message(1, "bob", "still alive")}).to_string());
		assert_eq!(view.events().len(), 2);
	}

	#[test]
	fn close_is_terminal_and_shows_code() {
		let (mut s, view) = open(config("alice", 30));
		let _ = sent(&mut s);
		view.drain();

		s.on_error("connection reset");
		assert!(view.events().is_empty());
		assert_eq!(s.state(), ConnectionState::Failed);

		s.on_close(CLOSE_CODE_ABNORMAL);
		assert_eq!(s.state(), ConnectionState::Closed { code: 1006 });
		let lines = s.warnings().lines().to_vec();
		assert_eq!(lines.len(), 3);
		assert_eq!(lines[2], "Error 1006");

		assert!(!s.submit("hello"));
		assert!(!s.load_more());
		s.on_frame(&history(&[1]));
		s.on_close(1000);
		assert!(s.drain_outbound().is_empty());
		assert_eq!(s.state(), ConnectionState::Closed { code: 1006 });
		assert_eq!(s.warnings().lines().len(), 3);
	}

	#[test]
	fn error_signal_stops_sending_before_close_arrives() {
		let (mut s, view) = open(config("alice", 30));
		let _ = sent(&mut s);
		s.submit("queued");
		view.drain();

		s.on_error("io error");
		assert_eq!(s.state(), ConnectionState::Failed);
		assert!(!s.submit("hello"));
		assert!(!s.load_more());
		assert!(s.drain_outbound().is_empty());
		assert!(!s.warnings().is_visible());
		s.on_frame(&history(&[1]));
		assert!(view.events().is_empty());

		s.on_close(4001);
		assert_eq!(s.state(), ConnectionState::Closed { code: 4001 });
		assert_eq!(s.warnings().lines()[2], "Error 4001");
	}

	#[test]
	fn reset_rebuilds_state_from_fresh_config() {
		let (mut s, view) = open(config("mod1", 10).with_moderation(None));
		s.on_frame(&history(&[1, 2]));
		s.on_close(1000);
		let _ = view.drain();

		let fresh = config("mod1", 40).with_moderation(Some(user("mod1")));
		s.reset(fresh);
		assert_eq!(s.state(), ConnectionState::Connecting);
		assert_eq!(s.paginator().visible_count(), 0);
		assert_eq!(s.paginator().total_available(), 40);
		assert!(s.moderation().is_self_moderator());
		assert_eq!(s.transcript().count(), 0);
		assert!(!s.warnings().is_visible());

		let events = view.drain();
		assert!(events.contains(&ViewEvent::TranscriptCleared));
		assert!(events.contains(&ViewEvent::LoadMoreVisible(true)));
		assert!(events.contains(&ViewEvent::InputEnabled(true)));

		s.on_open();
		assert_eq!(sent(&mut s)[0]["visible_messages"], 10);
	}
}
