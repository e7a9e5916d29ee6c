// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Draining the pending-report queue.
//!
//! Failures are handled in two tiers. A report that cannot be loaded, or
//! that every transport rejects permanently, is structurally broken: it is
//! deleted and the run stops. A transport failure is isolated to its report,
//! which stays on disk for the next run while the run moves on.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use loom_crash_core::{CrashReport, ReportFile};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::ReportSender;
use crate::error::{SendError, StoreError};
use crate::policy::DrainRequest;
use crate::store::ReportStore;

/// Name of the thread that runs the worker.
pub const WORKER_THREAD_NAME: &str = "loom-crash-sender";

/// Outcome of one send run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
	/// Delivered and deleted.
	pub sent: usize,
	/// Kept for a later run after a transport failure.
	pub failed: usize,
	/// Deleted without delivery because they were broken.
	pub discarded: usize,
	/// The run stopped early on a structural failure.
	pub aborted: bool,
}

/// Command sent to the worker thread.
#[derive(Debug)]
pub enum SendCommand {
	Drain {
		request: DrainRequest,
		done: Option<SyncSender<RunSummary>>,
	},
	/// Deliver a report that could not be persisted.
	SendReport {
		report: Box<CrashReport>,
		done: Option<SyncSender<RunSummary>>,
	},
	Shutdown,
}

enum Delivery {
	Sent,
	Failed,
	Rejected(SendError),
}

/// Runs send passes over the store. One pass at a time: the worker owns the only instance.
pub struct Drainer {
	store: Arc<ReportStore>,
	senders: Vec<Arc<dyn ReportSender>>,
	max_reports_per_run: usize,
	sending_allowed: bool,
}

impl Drainer {
	pub fn new(
		store: Arc<ReportStore>,
		senders: Vec<Arc<dyn ReportSender>>,
		max_reports_per_run: usize,
	) -> Self {
		Self {
			store,
			senders,
			max_reports_per_run: max_reports_per_run.max(1),
			sending_allowed: true,
		}
	}

	/// When false, runs still approve reports but never transmit them.
	pub fn sending_allowed(mut self, allowed: bool) -> Self {
		self.sending_allowed = allowed;
		self
	}

	/// One pass over the approved pending reports, oldest first, up to the batch cap.
	pub async fn drain(&self, request: DrainRequest) -> RunSummary {
		let mut summary = RunSummary::default();

		if request.approve_first {
			if let Err(e) = self.store.approve_all() {
				error!(error = %e, "failed to approve pending crash reports");
			}
		}

		if !self.sending_allowed {
			debug!("sending crash reports is disabled for this build");
			return summary;
		}
		if self.senders.is_empty() {
			warn!("no crash report transports configured, reports stay pending");
			return summary;
		}

		let pending = match self.store.list_pending() {
			Ok(pending) => pending,
			Err(e) => {
				error!(error = %e, "failed to list pending crash reports");
				return summary;
			}
		};

		let mut attempted = 0;
		for file in pending {
			if attempted >= self.max_reports_per_run {
				debug!(
					max = self.max_reports_per_run,
					"batch cap reached, leaving the rest for the next run"
				);
				break;
			}
			if !file.is_approved() || (request.only_silent && !file.is_silent()) {
				continue;
			}
			attempted += 1;

			let report = match self.store.load(&file) {
				Ok(report) => report,
				Err(StoreError::NotFound(_)) => {
					debug!(file = %file, "report vanished before sending");
					continue;
				}
				Err(e) if e.is_structural() => {
					error!(
						file = %file,
						error = %e,
						"corrupt crash report, deleting it and stopping this run"
					);
					self.discard(&file, &mut summary);
					summary.aborted = true;
					break;
				}
				Err(e) => {
					warn!(file = %file, error = %e, "failed to read crash report, keeping it");
					summary.failed += 1;
					continue;
				}
			};

			match self.deliver(&report).await {
				Delivery::Sent => {
					summary.sent += 1;
					if let Err(e) = self.store.delete(&file) {
						error!(
							file = %file,
							error = %e,
							"sent crash report could not be deleted"
						);
					}
				}
				Delivery::Failed => summary.failed += 1,
				Delivery::Rejected(e) => {
					error!(
						file = %file,
						error = %e,
						"crash report rejected permanently, deleting it and stopping this run"
					);
					self.discard(&file, &mut summary);
					summary.aborted = true;
					break;
				}
			}
		}

		info!(
			sent = summary.sent,
			failed = summary.failed,
			discarded = summary.discarded,
			aborted = summary.aborted,
			"crash report send run finished"
		);
		summary
	}

	/// Deliver a report that never reached the disk.
	pub async fn send_report(&self, report: &CrashReport) -> RunSummary {
		let mut summary = RunSummary::default();
		if !self.sending_allowed || self.senders.is_empty() {
			return summary;
		}
		match self.deliver(report).await {
			Delivery::Sent => summary.sent = 1,
			Delivery::Failed => summary.failed = 1,
			Delivery::Rejected(e) => {
				error!(error = %e, "in-memory crash report rejected permanently");
				summary.discarded = 1;
			}
		}
		summary
	}

	/// Try each transport in order, stopping at the first success. The
	/// report counts as rejected only when every transport rejected it.
	async fn deliver(&self, report: &CrashReport) -> Delivery {
		let mut rejection = None;
		let mut retryable = false;
		for sender in &self.senders {
			match sender.send(report).await {
				Ok(()) => {
					debug!(transport = sender.name(), "crash report delivered");
					return Delivery::Sent;
				}
				Err(e @ SendError::Permanent(_)) => {
					warn!(
						transport = sender.name(),
						error = %e,
						"transport rejected crash report"
					);
					rejection.get_or_insert(e);
				}
				Err(e) => {
					warn!(
						transport = sender.name(),
						error = %e,
						"transport failed to send crash report"
					);
					retryable = true;
				}
			}
		}
		match rejection {
			Some(e) if !retryable => Delivery::Rejected(e),
			_ => Delivery::Failed,
		}
	}

	fn discard(&self, file: &ReportFile, summary: &mut RunSummary) {
		match self.store.delete(file) {
			Ok(_) => summary.discarded += 1,
			Err(e) => error!(file = %file, error = %e, "failed to delete broken crash report"),
		}
	}
}

/// Handle to the background send thread.
///
/// All methods are synchronous and never block on the channel, so they are
/// safe to call from the panic hook, including on a runtime thread.
pub struct SendWorker {
	tx: mpsc::UnboundedSender<SendCommand>,
	handle: Mutex<Option<JoinHandle<()>>>,
}

impl SendWorker {
	/// Start the worker thread with its own single-threaded runtime.
	pub fn spawn(drainer: Drainer) -> std::io::Result<Self> {
		let (tx, rx) = mpsc::unbounded_channel();
		let handle = std::thread::Builder::new()
			.name(WORKER_THREAD_NAME.to_string())
			.spawn(move || {
				let runtime = match tokio::runtime::Builder::new_current_thread()
					.enable_all()
					.build()
				{
					Ok(runtime) => runtime,
					Err(e) => {
						error!(error = %e, "failed to start crash report sender runtime");
						return;
					}
				};
				runtime.block_on(run(drainer, rx));
			})?;

		Ok(Self {
			tx,
			handle: Mutex::new(Some(handle)),
		})
	}

	/// Queue a send run. The returned receiver yields its summary.
	pub fn request_drain(&self, request: DrainRequest) -> Option<Receiver<RunSummary>> {
		let (done, rx) = sync_channel(1);
		self.submit(SendCommand::Drain {
			request,
			done: Some(done),
		})
		.then_some(rx)
	}

	/// Queue a send run and wait at most `timeout` for it.
	pub fn drain_and_wait(&self, request: DrainRequest, timeout: Duration) -> Option<RunSummary> {
		wait(self.request_drain(request)?, timeout)
	}

	/// Queue delivery of a report that could not be persisted.
	pub fn request_send(&self, report: CrashReport) -> Option<Receiver<RunSummary>> {
		let (done, rx) = sync_channel(1);
		self.submit(SendCommand::SendReport {
			report: Box::new(report),
			done: Some(done),
		})
		.then_some(rx)
	}

	/// Queue delivery of an unpersisted report and wait at most `timeout` for it.
	pub fn send_and_wait(&self, report: CrashReport, timeout: Duration) -> Option<RunSummary> {
		wait(self.request_send(report)?, timeout)
	}

	/// Stop the worker after the command in flight and wait for the thread.
	pub fn shutdown(&self) {
		let _ = self.tx.send(SendCommand::Shutdown);
		let handle = match self.handle.lock() {
			Ok(mut guard) => guard.take(),
			Err(poisoned) => poisoned.into_inner().take(),
		};
		if let Some(handle) = handle {
			if handle.thread().id() == std::thread::current().id() {
				return;
			}
			if handle.join().is_err() {
				error!("crash report sender thread panicked");
			}
		}
	}

	pub fn is_running(&self) -> bool {
		!self.tx.is_closed()
	}

	fn submit(&self, command: SendCommand) -> bool {
		match self.tx.send(command) {
			Ok(()) => true,
			Err(_) => {
				warn!("crash report sender is not running");
				false
			}
		}
	}
}

pub(crate) fn wait(rx: Receiver<RunSummary>, timeout: Duration) -> Option<RunSummary> {
	match rx.recv_timeout(timeout) {
		Ok(summary) => Some(summary),
		Err(e) => {
			warn!(
				timeout_ms = timeout.as_millis() as u64,
				error = %e,
				"gave up waiting for crash report sender"
			);
			None
		}
	}
}

async fn run(drainer: Drainer, mut rx: mpsc::UnboundedReceiver<SendCommand>) {
	info!("crash report sender started");
	while let Some(command) = rx.recv().await {
		match command {
			SendCommand::Drain { request, done } => {
				let summary = drainer.drain(request).await;
				if let Some(done) = done {
					let _ = done.try_send(summary);
				}
			}
			SendCommand::SendReport { report, done } => {
				let summary = drainer.send_report(&report).await;
				if let Some(done) = done {
					let _ = done.try_send(summary);
				}
			}
			SendCommand::Shutdown => break,
		}
	}
	info!("crash report sender stopped");
}
