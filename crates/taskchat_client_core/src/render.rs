#![forbid(unsafe_code)]

use taskchat_domain::{ChatMessage, MessageId, UserName};

/// Who is looking at the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer<'a> {
	pub identity: &'a UserName,
	/// Viewer currently holds the room's moderator seat.
	pub is_moderator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
	Own,
	Other,
}

/// Presentation-ready description of one message. Content is plain text, never markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNode {
	pub message_id: MessageId,
	pub origin: MessageOrigin,
	/// `"<author> :"` for other people's messages.
	pub author_label: Option<String>,
	pub content: String,
	/// Tooltip text.
	pub title: String,
	pub picture: Option<String>,
	/// Offer the delete control. The server still decides.
	pub delete_offered: bool,
}

pub fn render(message: &ChatMessage, viewer: &Viewer<'_>) -> DisplayNode {
	let own = message.is_authored_by(viewer.identity);

	DisplayNode {
		message_id: message.message_id.clone(),
		origin: if own { MessageOrigin::Own } else { MessageOrigin::Other },
		author_label: (!own).then(|| format!("{} :", message.author)),
		content: message.content.clone(),
		title: message.timestamp.clone(),
		picture: message.picture.clone(),
		delete_offered: own || viewer.is_moderator,
	}
}
