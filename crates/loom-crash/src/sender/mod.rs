// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report transports and the background send worker.

mod http;
mod mailto;
mod worker;

use async_trait::async_trait;
use loom_crash_core::CrashReport;

use crate::error::SendError;

pub use http::HttpSender;
pub use mailto::MailtoSender;
pub use worker::{Drainer, RunSummary, SendCommand, SendWorker, WORKER_THREAD_NAME};
pub(crate) use worker::wait;

/// A delivery mechanism for completed reports.
///
/// Transports are tried in configured order and the first success wins, so a
/// second transport acts as a fallback rather than a duplicate.
#[async_trait]
pub trait ReportSender: Send + Sync {
	/// Name used in logs.
	fn name(&self) -> &str;

	/// Deliver one report. Return [`SendError::Permanent`] only when the
	/// report can never be delivered; anything else keeps it for a later run.
	async fn send(&self, report: &CrashReport) -> Result<(), SendError>;
}
