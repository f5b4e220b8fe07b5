#![forbid(unsafe_code)]

/// Persistent, dismissible list of server-declared and connection warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarningBanner {
	lines: Vec<String>,
}

impl WarningBanner {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	pub fn is_visible(&self) -> bool {
		!self.lines.is_empty()
	}

	/// Append lines; earlier lines stay until dismissed.
	pub fn extend<I, S>(&mut self, lines: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.lines.extend(lines.into_iter().map(Into::into));
	}

	/// Clear everything. Returns false when there was nothing to dismiss.
	pub fn dismiss(&mut self) -> bool {
		let had_lines = self.is_visible();
		self.lines.clear();
		had_lines
	}
}

/// Lines shown when the connection is gone for good.
pub fn connection_closed_lines(code: u16) -> [String; 3] {
	[
		"Chat connection has been terminated, please close and restart the chat.".to_string(),
		"If the issue persists, please contact the administrator.".to_string(),
		format!("Error {code}"),
	]
}
