#![forbid(unsafe_code)]

/// Key released in the message input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
	Enter,
	Other,
}

/// Key event with the one modifier the input cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
	pub key: Key,
	pub shift: bool,
}

impl KeyPress {
	pub const ENTER: KeyPress = KeyPress {
		key: Key::Enter,
		shift: false,
	};

	/// Enter without shift submits; shift+enter inserts a newline.
	pub fn submits(&self) -> bool {
		self.key == Key::Enter && !self.shift
	}
}

/// Result of a draft edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftUpdate {
	/// Draft started with whitespace and was wiped.
	Cleared,
	/// Live letter count for the draft.
	Counted(usize),
}

/// Guards the message input against blank submissions and keeps the live letter count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputValidator {
	draft_len: usize,
}

impl InputValidator {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn draft_len(&self) -> usize {
		self.draft_len
	}

	/// Leading whitespace clears the whole draft, so blank text never accumulates.
	pub fn draft_changed(&mut self, text: &str) -> DraftUpdate {
		if starts_with_whitespace(text) {
			self.draft_len = 0;
			return DraftUpdate::Cleared;
		}
		self.draft_len = text.chars().count();
		DraftUpdate::Counted(self.draft_len)
	}

	/// Text to send, or `None` when the submit is a silent no-op.
	pub fn accept<'a>(&self, text: &'a str) -> Option<&'a str> {
		if text.is_empty() || starts_with_whitespace(text) {
			return None;
		}
		Some(text)
	}

	/// Draft was sent; counter goes back to zero.
	pub fn submitted(&mut self) {
		self.draft_len = 0;
	}
}

fn starts_with_whitespace(text: &str) -> bool {
	text.chars().next().is_some_and(char::is_whitespace)
}
