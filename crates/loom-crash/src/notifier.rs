// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! User interface surfaces the reporter talks to.
//!
//! The reporter never draws anything itself. Applications plug in their own
//! notification, dialog and toast surfaces through [`Notifier`]; the user's
//! answer comes back through
//! [`CrashReporter::accept_report`](crate::CrashReporter::accept_report) or
//! [`CrashReporter::decline_report`](crate::CrashReporter::decline_report).

use loom_crash_core::{InteractionMode, ReportFile};
use tracing::{info, warn};

pub trait Notifier: Send + Sync {
	/// Ask the user whether `file` may be sent. `mode` is either
	/// [`InteractionMode::Notification`] or [`InteractionMode::Dialog`].
	fn notify_pending_approval(&self, file: &ReportFile, mode: InteractionMode);

	/// Show a short non-blocking message.
	fn show_transient_message(&self, text: &str);
}

/// Logs instead of showing anything. Used by headless applications and when
/// no notifier is registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
	fn notify_pending_approval(&self, file: &ReportFile, mode: InteractionMode) {
		warn!(file = %file, mode = %mode, "crash report is waiting for user approval");
	}

	fn show_transient_message(&self, text: &str) {
		info!(message = text, "crash reporter message");
	}
}
