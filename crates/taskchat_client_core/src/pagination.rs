#![forbid(unsafe_code)]

use taskchat_protocol::ClientIntent;

/// Number of history messages requested per page.
pub const PAGE_SIZE: u32 = 10;

/// What the view should do after a history page has been inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReceived {
	/// First page of the session: scroll the transcript to the latest message.
	pub scroll_to_latest: bool,
	/// Hide the "load more" affordance. Reported once per session.
	pub hide_load_more: bool,
	/// History messages not yet requested.
	pub remaining: u32,
}

/// Tracks how much history has been requested against the total available.
///
/// The counter is advanced before the request goes out and is never corrected from the
/// response: it is a limit hint for the server, not a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPaginator {
	visible_count: u32,
	total_available: u32,
	load_more_hidden: bool,
}

impl HistoryPaginator {
	pub fn new(total_available: u32) -> Self {
		Self {
			visible_count: 0,
			total_available,
			load_more_hidden: false,
		}
	}

	pub fn visible_count(&self) -> u32 {
		self.visible_count
	}

	pub fn total_available(&self) -> u32 {
		self.total_available
	}

	/// The "load more" affordance is offered iff `visible_count < total_available`.
	pub fn has_more(&self) -> bool {
		self.visible_count < self.total_available
	}

	pub fn remaining(&self) -> u32 {
		self.total_available.saturating_sub(self.visible_count)
	}

	/// Request the first page. Sent once on open even if the room has no stored history,
	/// so that the affordance gets hidden by the (empty) response.
	pub fn first_page(&mut self, chat_connection_timestamp: &str) -> Option<ClientIntent> {
		if self.visible_count != 0 {
			return None;
		}
		Some(self.advance(chat_connection_timestamp))
	}

	/// Request the next page, or `None` when history is exhausted (silent no-op).
	pub fn next_page(&mut self, chat_connection_timestamp: &str) -> Option<ClientIntent> {
		if self.visible_count == 0 {
			return self.first_page(chat_connection_timestamp);
		}
		if !self.has_more() {
			return None;
		}
		Some(self.advance(chat_connection_timestamp))
	}

	/// Book-keeping once a batch has been inserted into the transcript.
	pub fn page_received(&mut self) -> PageReceived {
		let hide_load_more = !self.load_more_hidden && !self.has_more();
		if hide_load_more {
			self.load_more_hidden = true;
		}

		PageReceived {
			scroll_to_latest: self.visible_count == PAGE_SIZE,
			hide_load_more,
			remaining: self.remaining(),
		}
	}

	fn advance(&mut self, chat_connection_timestamp: &str) -> ClientIntent {
		self.visible_count = self.visible_count.saturating_add(PAGE_SIZE);
		ClientIntent::FetchMessages {
			chat_connection_timestamp: chat_connection_timestamp.to_string(),
			visible_messages: self.visible_count,
		}
	}
}
