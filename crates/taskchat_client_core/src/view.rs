#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

use crate::render::DisplayNode;

/// Presentation surface driven by the session. The session decides what to show and when;
/// implementations decide how.
pub trait ChatView {
	/// Live message at the end of the transcript.
	fn append_message(&mut self, node: DisplayNode);

	/// History message placed directly next to the "load more" affordance, so that a
	/// newest-first batch reads oldest-first on screen.
	fn insert_history_message(&mut self, node: DisplayNode);

	fn scroll_to_latest(&mut self);

	fn set_history_remaining(&mut self, remaining: u32);

	fn set_load_more_visible(&mut self, visible: bool);

	/// Modal confirmation (deletion, join, leave).
	fn show_notification(&mut self, text: &str);

	/// Show the banner with every accumulated line.
	fn show_warnings(&mut self, lines: &[String]);

	fn hide_warnings(&mut self);

	/// Message input and submit control.
	fn set_input_enabled(&mut self, enabled: bool);

	fn set_moderation_controls(&mut self, join_visible: bool, leave_visible: bool);

	fn set_draft(&mut self, text: &str);

	fn set_letter_count(&mut self, count: usize);

	/// Replace an already rendered message, e.g. when the viewer's delete rights change.
	fn update_message(&mut self, _node: DisplayNode) {}

	fn focus_input(&mut self) {}

	/// Drop every rendered message; called when the session is reset.
	fn clear_transcript(&mut self) {}
}

/// Everything a `ChatView` was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
	Appended(DisplayNode),
	InsertedHistory(DisplayNode),
	Updated(DisplayNode),
	ScrolledToLatest,
	HistoryRemaining(u32),
	LoadMoreVisible(bool),
	Notification(String),
	Warnings(Vec<String>),
	WarningsHidden,
	InputEnabled(bool),
	ModerationControls { join_visible: bool, leave_visible: bool },
	Draft(String),
	LetterCount(usize),
	Focused,
	TranscriptCleared,
}

/// Headless view that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingView {
	events: Arc<Mutex<Vec<ViewEvent>>>,
}

impl RecordingView {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<ViewEvent> {
		self.events.lock().map(|e| e.clone()).unwrap_or_default()
	}

	/// Take and clear the log.
	pub fn drain(&self) -> Vec<ViewEvent> {
		self.events.lock().map(|mut e| std::mem::take(&mut *e)).unwrap_or_default()
	}

	fn push(&self, ev: ViewEvent) {
		if let Ok(mut events) = self.events.lock() {
			events.push(ev);
		}
	}
}

impl ChatView for RecordingView {
	fn append_message(&mut self, node: DisplayNode) {
		self.push(ViewEvent::Appended(node));
	}

	fn insert_history_message(&mut self, node: DisplayNode) {
		self.push(ViewEvent::InsertedHistory(node));
	}

	fn update_message(&mut self, node: DisplayNode) {
		self.push(ViewEvent::Updated(node));
	}

	fn scroll_to_latest(&mut self) {
		self.push(ViewEvent::ScrolledToLatest);
	}

	fn set_history_remaining(&mut self, remaining: u32) {
		self.push(ViewEvent::HistoryRemaining(remaining));
	}

	fn set_load_more_visible(&mut self, visible: bool) {
		self.push(ViewEvent::LoadMoreVisible(visible));
	}

	fn show_notification(&mut self, text: &str) {
		self.push(ViewEvent::Notification(text.to_string()));
	}

	fn show_warnings(&mut self, lines: &[String]) {
		self.push(ViewEvent::Warnings(lines.to_vec()));
	}

	fn hide_warnings(&mut self) {
		self.push(ViewEvent::WarningsHidden);
	}

	fn set_input_enabled(&mut self, enabled: bool) {
		self.push(ViewEvent::InputEnabled(enabled));
	}

	fn set_moderation_controls(&mut self, join_visible: bool, leave_visible: bool) {
		self.push(ViewEvent::ModerationControls {
			join_visible,
			leave_visible,
		});
	}

	fn set_draft(&mut self, text: &str) {
		self.push(ViewEvent::Draft(text.to_string()));
	}

	fn set_letter_count(&mut self, count: usize) {
		self.push(ViewEvent::LetterCount(count));
	}

	fn focus_input(&mut self) {
		self.push(ViewEvent::Focused);
	}

	fn clear_transcript(&mut self) {
		self.push(ViewEvent::TranscriptCleared);
	}
}
