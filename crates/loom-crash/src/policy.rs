// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interaction policy.
//!
//! Decides what happens to a report once it is on disk, both right after a
//! crash and on the next start. The decisions are pure: the persisted state
//! is the report file name, and callers carry out the returned plan against
//! the [`ReportStore`](crate::ReportStore) and the send worker.
//!
//! ```text
//! NEW ──┬─ silent, or mode silent/toast ──> SEND_IMMEDIATELY ─> APPROVED ─┬─> SENT
//!       └─ mode notification/dialog ─────> AWAIT_USER_APPROVAL ─ accept ─┘
//!                                                              └ decline ─> DISCARDED
//! ```

use loom_crash_core::{InteractionMode, ReportFile};

/// What to do with a freshly captured report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureAction {
	/// Approve and hand to the send worker now, with this run.
	SendImmediately(DrainRequest),
	/// Leave unapproved and ask the user.
	AwaitUserApproval,
}

/// A send run to request from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainRequest {
	/// Approve every pending report before sending.
	pub approve_first: bool,
	/// Send only silent reports.
	pub only_silent: bool,
}

/// What to do with leftover reports when the application starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupPlan {
	pub drain: Option<DrainRequest>,
	/// Report to prompt the user about again.
	pub resurface: Option<ReportFile>,
	/// Show the toast text, because unapproved reports are being sent without asking.
	pub announce: bool,
}

impl StartupPlan {
	pub fn is_empty(&self) -> bool {
		self.drain.is_none() && self.resurface.is_none() && !self.announce
	}
}

#[derive(Debug, Clone, Copy)]
pub struct InteractionPolicy {
	mode: InteractionMode,
}

impl InteractionPolicy {
	pub fn new(mode: InteractionMode) -> Self {
		Self { mode }
	}

	pub fn mode(&self) -> InteractionMode {
		self.mode
	}

	pub fn on_capture(&self, silent: bool) -> CaptureAction {
		if !self.mode.requires_approval() {
			// Leftovers from earlier runs go out too.
			CaptureAction::SendImmediately(DrainRequest {
				approve_first: true,
				only_silent: false,
			})
		} else if silent {
			// Never approve on the user's behalf in an interactive mode.
			CaptureAction::SendImmediately(DrainRequest {
				approve_first: false,
				only_silent: true,
			})
		} else {
			CaptureAction::AwaitUserApproval
		}
	}

	/// Plan for `pending`, listed oldest first, after start-time housekeeping ran.
	pub fn on_start(&self, pending: &[ReportFile]) -> StartupPlan {
		if pending.is_empty() {
			return StartupPlan::default();
		}

		let all_approved = pending.iter().all(ReportFile::is_approved);
		if all_approved || !self.mode.requires_approval() {
			return StartupPlan {
				drain: Some(DrainRequest {
					approve_first: !all_approved,
					only_silent: false,
				}),
				resurface: None,
				announce: !all_approved && self.mode == InteractionMode::Toast,
			};
		}

		// Mixed: already-approved reports go out, the newest unapproved one is asked about again.
		let has_approved = pending.iter().any(ReportFile::is_approved);
		StartupPlan {
			drain: has_approved.then_some(DrainRequest {
				approve_first: false,
				only_silent: false,
			}),
			resurface: pending
				.iter()
				.rev()
				.find(|f| !f.is_silent() && !f.is_approved())
				.copied(),
			announce: false,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_crash_core::ReportStatus;

	fn file(millis: i64, status: ReportStatus) -> ReportFile {
		ReportFile::new(millis, status)
	}

	#[test]
	fn capture_decisions() {
		use InteractionMode::*;
		let approve_all = CaptureAction::SendImmediately(DrainRequest {
			approve_first: true,
			only_silent: false,
		});
		let silent_only = CaptureAction::SendImmediately(DrainRequest {
			approve_first: false,
			only_silent: true,
		});
		for (mode, silent, expected) in [
			(Silent, false, approve_all),
			(Silent, true, approve_all),
			(Toast, false, approve_all),
			(Notification, false, CaptureAction::AwaitUserApproval),
			(Dialog, false, CaptureAction::AwaitUserApproval),
			(Notification, true, silent_only),
			(Dialog, true, silent_only),
		] {
			assert_eq!(
				InteractionPolicy::new(mode).on_capture(silent),
				expected,
				"mode {mode}, silent {silent}"
			);
		}
	}

	#[test]
	fn nothing_pending_means_nothing_to_do() {
		let plan = InteractionPolicy::new(InteractionMode::Dialog).on_start(&[]);
		assert!(plan.is_empty());
	}

	#[test]
	fn all_approved_drains_in_any_mode() {
		let pending = [file(1, ReportStatus::Silent), file(2, ReportStatus::Approved)];
		let plan = InteractionPolicy::new(InteractionMode::Notification).on_start(&pending);
		assert_eq!(
			plan.drain,
			Some(DrainRequest {
				approve_first: false,
				only_silent: false
			})
		);
		assert_eq!(plan.resurface, None);
	}

	#[test]
	fn silent_mode_approves_leftovers() {
		let pending = [file(1, ReportStatus::New)];
		let plan = InteractionPolicy::new(InteractionMode::Silent).on_start(&pending);
		assert!(plan.drain.unwrap().approve_first);
		assert!(!plan.announce);
	}

	#[test]
	fn toast_mode_announces_unapproved_leftovers() {
		let pending = [file(1, ReportStatus::New)];
		let plan = InteractionPolicy::new(InteractionMode::Toast).on_start(&pending);
		assert!(plan.drain.unwrap().approve_first);
		assert!(plan.announce);
	}

	#[test]
	fn notification_resurfaces_most_recent_unapproved() {
		let pending = [
			file(1, ReportStatus::New),
			file(2, ReportStatus::New),
			file(3, ReportStatus::Silent),
		];
		let plan = InteractionPolicy::new(InteractionMode::Notification).on_start(&pending);
		assert_eq!(plan.resurface, Some(file(2, ReportStatus::New)));
		assert!(plan.drain.is_some(), "silent report should still go out");
		assert!(!plan.drain.unwrap().approve_first);
	}

	#[test]
	fn dialog_with_only_unapproved_does_not_send() {
		let pending = [file(1, ReportStatus::New)];
		let plan = InteractionPolicy::new(InteractionMode::Dialog).on_start(&pending);
		assert_eq!(plan.drain, None);
		assert_eq!(plan.resurface, Some(pending[0]));
	}
}
