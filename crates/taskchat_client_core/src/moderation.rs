#![forbid(unsafe_code)]

use taskchat_domain::UserName;
use taskchat_protocol::{ClientIntent, ModerationNotice};
use tracing::debug;

/// Visible state derived from the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
	pub input_enabled: bool,
	pub join_visible: bool,
	pub leave_visible: bool,
}

impl GateDecision {
	/// Moderation inactive: plain participant, always allowed to write.
	pub const UNGATED: GateDecision = GateDecision {
		input_enabled: true,
		join_visible: false,
		leave_visible: false,
	};
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationChange {
	Joined,
	Left,
}

/// Tracks the assigned moderator and whether the viewer holds that seat.
///
/// The server arbitrates role assignment; the gate only mirrors the last value it pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationGate {
	enabled: bool,
	viewer: UserName,
	assigned: Option<UserName>,
}

impl ModerationGate {
	pub fn new(enabled: bool, viewer: UserName, assigned: Option<UserName>) -> Self {
		Self {
			enabled,
			viewer,
			assigned,
		}
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn assigned_moderator(&self) -> Option<&UserName> {
		self.assigned.as_ref()
	}

	pub fn is_self_moderator(&self) -> bool {
		self.enabled && self.assigned.as_ref() == Some(&self.viewer)
	}

	pub fn decision(&self) -> GateDecision {
		if !self.enabled {
			return GateDecision::UNGATED;
		}

		if self.is_self_moderator() {
			GateDecision {
				input_enabled: true,
				join_visible: false,
				leave_visible: true,
			}
		} else {
			GateDecision {
				input_enabled: false,
				join_visible: self.assigned.is_none(),
				leave_visible: false,
			}
		}
	}

	/// Request to claim the vacant seat; `None` unless the join control is offered.
	pub fn join_intent(&self) -> Option<ClientIntent> {
		self.decision().join_visible.then(|| ClientIntent::JoinChat {
			user: self.viewer.clone(),
		})
	}

	/// Request to give up the seat; `None` unless the leave control is offered.
	pub fn leave_intent(&self) -> Option<ClientIntent> {
		self.decision().leave_visible.then(|| ClientIntent::LeaveChat {
			user: self.viewer.clone(),
		})
	}

	/// Refresh from a server confirmation. Returns true when the assigned moderator changed.
	///
	/// An explicit `moderator` field is authoritative. Otherwise a join assigns the named user
	/// (or the viewer, to whom unnamed confirmations are addressed). A leave vacates the seat unless
	/// it names someone other than the seated moderator.
	pub fn apply_notice(&mut self, change: ModerationChange, notice: &ModerationNotice) -> bool {
		let next = match (&notice.moderator, change) {
			(Some(explicit), _) => explicit.clone(),
			(None, ModerationChange::Joined) => Some(notice.user.clone().unwrap_or_else(|| self.viewer.clone())),
			(None, ModerationChange::Left) => match &notice.user {
				Some(left) if self.assigned.as_ref() != Some(left) => self.assigned.clone(),
				_ => None,
			},
		};

		if next == self.assigned {
			return false;
		}

		debug!(
			from = ?self.assigned.as_ref().map(UserName::as_str),
			to = ?next.as_ref().map(UserName::as_str),
			"assigned moderator changed"
		);
		self.assigned = next;
		true
	}
}
