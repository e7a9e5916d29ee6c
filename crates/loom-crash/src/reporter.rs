// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The crash reporter: wires the store, collectors, policy, send worker and
//! finisher together and owns the panic hook.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread::ThreadId;
use std::time::Instant;

use loom_crash_core::{InteractionMode, ReportFile};
use tracing::{debug, error, info, warn};

use crate::assembler::ReportAssembler;
use crate::collector::{default_registry, Collector, CollectorHandles};
use crate::config::CrashConfig;
use crate::context::CrashContext;
use crate::error::{ConfigError, InitError, Result};
use crate::finisher::{BackgroundService, ForegroundSurface, ProcessFinisher};
use crate::notifier::{Notifier, TracingNotifier};
use crate::panic_hook;
use crate::policy::{CaptureAction, DrainRequest, InteractionPolicy, StartupPlan};
use crate::sender::{wait, Drainer, HttpSender, MailtoSender, ReportSender, RunSummary, SendWorker};
use crate::store::ReportStore;

/// Set once a reporter has installed the panic hook in this process.
static HOOK_OWNER: AtomicBool = AtomicBool::new(false);

type Terminator = Box<dyn Fn(i32) + Send + Sync>;

/// Builder for [`CrashReporter`].
pub struct CrashReporterBuilder {
	config: CrashConfig,
	collectors: Vec<Arc<dyn Collector>>,
	senders: Vec<Arc<dyn ReportSender>>,
	notifier: Option<Arc<dyn Notifier>>,
	terminator: Option<Terminator>,
	install_panic_hook: bool,
}

impl CrashReporterBuilder {
	pub fn new(config: CrashConfig) -> Self {
		Self {
			config,
			collectors: Vec::new(),
			senders: Vec::new(),
			notifier: None,
			terminator: None,
			install_panic_hook: true,
		}
	}

	/// Adds a collector. Within the same order, built-in collectors run first
	/// and keep the fields they claim.
	pub fn collector(mut self, collector: Arc<dyn Collector>) -> Self {
		self.collectors.push(collector);
		self
	}

	/// Adds a transport after the ones derived from the configuration.
	pub fn sender(mut self, sender: Arc<dyn ReportSender>) -> Self {
		self.senders.push(sender);
		self
	}

	pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
		self.notifier = Some(notifier);
		self
	}

	/// Replaces `std::process::exit` when a crash ends the process.
	pub fn terminator<F>(mut self, terminator: F) -> Self
	where
		F: Fn(i32) + Send + Sync + 'static,
	{
		self.terminator = Some(Box::new(terminator));
		self
	}

	/// Whether to take over the process panic hook. Defaults to true.
	///
	/// Only one reporter per process may install the hook. Reporters built
	/// without it still capture errors handed to them explicitly.
	pub fn install_panic_hook(mut self, install: bool) -> Self {
		self.install_panic_hook = install;
		self
	}

	/// Validate the configuration, set everything up, install the hook and
	/// run start-up processing of leftover reports.
	pub fn init(self) -> std::result::Result<CrashReporter, InitError> {
		self.config.validate()?;

		if self.install_panic_hook
			&& HOOK_OWNER
				.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
				.is_err()
		{
			return Err(InitError::AlreadyInitialized);
		}

		let install = self.install_panic_hook;
		match self.build() {
			Ok(inner) => {
				if install {
					panic_hook::install(Arc::clone(&inner));
					info!("crash reporter panic hook installed");
				}
				let reporter = CrashReporter { inner };
				if reporter.inner.config.enabled {
					if let Err(e) = reporter.on_application_start() {
						error!(error = %e, "start-up processing of pending crash reports failed");
					}
				}
				info!(
					mode = %reporter.inner.config.mode,
					dir = %reporter.inner.store.dir().display(),
					"crash reporter initialized"
				);
				Ok(reporter)
			}
			Err(e) => {
				if install {
					HOOK_OWNER.store(false, Ordering::SeqCst);
				}
				Err(e)
			}
		}
	}

	fn build(self) -> std::result::Result<Arc<ReporterInner>, InitError> {
		let config = Arc::new(self.config);
		let store = Arc::new(ReportStore::from_config(&config)?);

		let handles = CollectorHandles::default();
		let mut registry = default_registry(store.installation_file(), &handles);
		for collector in self.collectors {
			registry.register(collector);
		}
		let assembler = ReportAssembler::new(registry, Arc::clone(&config));

		let mut senders: Vec<Arc<dyn ReportSender>> = Vec::new();
		if let Some(http) = &config.http {
			let sender = HttpSender::new(http.clone())
				.map_err(|e| ConfigError::invalid_value("http", e.to_string()))?;
			senders.push(Arc::new(sender));
		}
		if let Some(to) = &config.mail_to {
			senders.push(Arc::new(MailtoSender::new(to.clone())));
		}
		senders.extend(self.senders);

		let drainer = Drainer::new(Arc::clone(&store), senders, config.max_reports_per_run)
			.sending_allowed(config.sending_allowed());
		let worker = SendWorker::spawn(drainer).map_err(InitError::Worker)?;

		let mut finisher = ProcessFinisher::new(&config);
		if let Some(terminator) = self.terminator {
			finisher = finisher.with_terminator(terminator);
		}

		Ok(Arc::new(ReporterInner {
			policy: InteractionPolicy::new(config.mode),
			enabled: AtomicBool::new(config.enabled),
			shut_down: AtomicBool::new(false),
			notifier: self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier)),
			config,
			store,
			assembler,
			handles,
			worker,
			finisher,
		}))
	}
}

/// Shared state behind [`CrashReporter`] and the panic hook.
pub(crate) struct ReporterInner {
	config: Arc<CrashConfig>,
	store: Arc<ReportStore>,
	assembler: ReportAssembler,
	policy: InteractionPolicy,
	handles: CollectorHandles,
	worker: SendWorker,
	finisher: ProcessFinisher,
	notifier: Arc<dyn Notifier>,
	enabled: AtomicBool,
	shut_down: AtomicBool,
}

impl ReporterInner {
	pub(crate) fn config(&self) -> &CrashConfig {
		&self.config
	}

	pub(crate) fn is_active(&self) -> bool {
		self.enabled.load(Ordering::SeqCst) && !self.shut_down.load(Ordering::SeqCst)
	}

	/// Assemble, persist and dispatch one report. With `wait_for_send`, blocks until
	/// the resulting send run finishes or the send timeout passes, so the
	/// process can end afterwards without losing an in-flight send.
	pub(crate) fn capture(&self, crash: &CrashContext, wait_for_send: bool) -> Option<ReportFile> {
		let started = Instant::now();
		let report = self.assembler.assemble(crash);
		let mode = self.policy.mode();

		let file = match self.store.save(&report, None) {
			Ok(file) => {
				info!(file = %file, silent = report.is_silent(), "crash report saved");
				Some(file)
			}
			Err(e) => {
				error!(error = %e, "failed to persist crash report");
				None
			}
		};

		let pending = match self.policy.on_capture(report.is_silent()) {
			CaptureAction::SendImmediately(request) => {
				if mode == InteractionMode::Toast && !crash.silent {
					self.show_toast();
				}
				match &file {
					Some(_) => self.worker.request_drain(request),
					// Nothing on disk to drain; send the in-memory copy once.
					None => self.worker.request_send(report),
				}
			}
			CaptureAction::AwaitUserApproval => {
				match &file {
					Some(file) => self.notifier.notify_pending_approval(file, mode),
					None => warn!("unsaved crash report needs approval and is dropped"),
				}
				None
			}
		};

		if wait_for_send {
			if mode == InteractionMode::Toast && !crash.silent {
				std::thread::sleep(self.config.toast_wait());
			}
			if let Some(rx) = pending {
				let remaining = self.config.send_timeout().saturating_sub(started.elapsed());
				if let Some(summary) = wait(rx, remaining) {
					debug!(
						sent = summary.sent,
						failed = summary.failed,
						"crash-time send finished"
					);
				}
			}
		}

		file
	}

	pub(crate) fn finish(&self, crashed_thread: Option<ThreadId>) {
		self.finisher.finish(crashed_thread);
	}

	fn show_toast(&self) {
		if let Some(text) = &self.config.toast_text {
			self.notifier.show_transient_message(text);
		}
	}
}

/// Crash reporter for one application process.
///
/// # Example
///
/// ```ignore
/// use loom_crash::{CrashConfig, CrashReporter};
///
/// let config = CrashConfig::load(Path::new("crash.toml"))?;
/// let reporter = CrashReporter::builder(config)
///     .notifier(Arc::new(MyNotifier::new(ui_handle)))
///     .init()?;
///
/// reporter.put_custom_data("workspace", "loom");
///
/// // Later, from the notification the user accepted:
/// reporter.accept_report(&file, Some("It crashed on save".into()), None)?;
/// ```
#[derive(Clone)]
pub struct CrashReporter {
	inner: Arc<ReporterInner>,
}

impl CrashReporter {
	pub fn builder(config: CrashConfig) -> CrashReporterBuilder {
		CrashReporterBuilder::new(config)
	}

	/// Build with defaults and install the panic hook.
	pub fn init(config: CrashConfig) -> std::result::Result<Self, InitError> {
		CrashReporterBuilder::new(config).init()
	}

	pub fn config(&self) -> &CrashConfig {
		&self.inner.config
	}

	pub fn store(&self) -> &ReportStore {
		&self.inner.store
	}

	/// Process reports left over from earlier runs. Called by `init`; safe to
	/// call again.
	pub fn on_application_start(&self) -> Result<StartupPlan> {
		let config = &self.inner.config;
		let store = &self.inner.store;

		let previous = store.last_version()?;
		if previous.as_deref() != Some(config.app_version.as_str()) {
			if config.delete_old_version_reports_on_start && previous.is_some() {
				let removed = store.delete_all()?;
				info!(
					previous = previous.as_deref().unwrap_or_default(),
					current = %config.app_version,
					removed,
					"application version changed, deleted pending crash reports"
				);
			}
			store.set_last_version(&config.app_version)?;
		}

		if config.delete_unapproved_on_start && config.mode.requires_approval() {
			let removed = store.delete_unapproved(config.unapproved_retain_count)?;
			if removed > 0 {
				info!(removed, "deleted unapproved crash reports");
			}
		}

		let pending = store.list_pending()?;
		let plan = self.inner.policy.on_start(&pending);
		debug!(pending = pending.len(), ?plan, "start-up crash report plan");

		if plan.announce {
			self.inner.show_toast();
		}
		if let Some(request) = plan.drain {
			self.inner.worker.request_drain(request);
		}
		if let Some(file) = &plan.resurface {
			self.inner.notifier.notify_pending_approval(file, config.mode);
		}

		Ok(plan)
	}

	/// Report a handled error. Returns the pending file, if persisted.
	pub fn handle_error<E>(&self, error: &E) -> Option<ReportFile>
	where
		E: StdError + ?Sized,
	{
		self.handle(CrashContext::from_error(error, false))
	}

	/// Report a handled error without involving the user, in any mode.
	pub fn handle_silent_error<E>(&self, error: &E) -> Option<ReportFile>
	where
		E: StdError + ?Sized,
	{
		self.handle(CrashContext::from_error(error, true))
	}

	fn handle(&self, crash: CrashContext) -> Option<ReportFile> {
		if !self.inner.is_active() {
			debug!("crash reporter inactive, ignoring error");
			return None;
		}
		let inner = &self.inner;
		// Collectors may panic; keep that off the caller's thread.
		panic_hook::run_isolated(|| inner.capture(&crash, false)).flatten()
	}

	/// The user accepted `file`, optionally with a comment and contact address.
	/// Returns the approved file name after queuing a send run.
	pub fn accept_report(
		&self,
		file: &ReportFile,
		comment: Option<String>,
		email: Option<String>,
	) -> Result<ReportFile> {
		let store = &self.inner.store;
		if comment.is_some() || email.is_some() {
			let mut report = store.load(file)?;
			report.merge_user_input(comment.as_deref(), email.as_deref());
			store.save(&report, Some(file))?;
		}
		let approved = store.mark_approved(file)?;
		info!(file = %approved, "crash report approved by user");
		self.inner.worker.request_drain(DrainRequest {
			approve_first: false,
			only_silent: false,
		});
		Ok(approved)
	}

	/// The user declined `file`.
	pub fn decline_report(&self, file: &ReportFile) -> Result<bool> {
		let deleted = self.inner.store.delete(file)?;
		info!(file = %file, "crash report declined by user");
		Ok(deleted)
	}

	/// Queue a send run over the approved pending reports.
	pub fn send_pending(&self) -> Option<std::sync::mpsc::Receiver<RunSummary>> {
		self.inner.worker.request_drain(DrainRequest {
			approve_first: false,
			only_silent: false,
		})
	}

	/// Attach a key/value pair to every later report.
	pub fn put_custom_data(
		&self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Option<String> {
		self.inner.handles.custom_data.put(key, value)
	}

	pub fn remove_custom_data(&self, key: &str) -> Option<String> {
		self.inner.handles.custom_data.remove(key)
	}

	pub fn clear_custom_data(&self) {
		self.inner.handles.custom_data.clear();
	}

	/// Default contact address for reports the user did not annotate.
	pub fn set_user_email(&self, email: Option<String>) {
		let lock: &RwLock<Option<String>> = &self.inner.handles.user_email;
		match lock.write() {
			Ok(mut guard) => *guard = email,
			Err(poisoned) => *poisoned.into_inner() = email,
		}
	}

	/// Turn reporting on or off at runtime. While off, panics go straight to
	/// the previous hook.
	pub fn set_enabled(&self, enabled: bool) {
		self.inner.enabled.store(enabled, Ordering::SeqCst);
		info!(enabled, "crash reporting toggled");
	}

	pub fn is_enabled(&self) -> bool {
		self.inner.is_active()
	}

	/// The surface to close when a crash ends the process.
	pub fn set_foreground_surface(&self, surface: Option<Arc<dyn ForegroundSurface>>) {
		self.inner.finisher.set_foreground_surface(surface);
	}

	/// A service to stop when a crash ends the process.
	pub fn register_service(&self, service: Arc<dyn BackgroundService>) {
		self.inner.finisher.register_service(service);
	}

	/// Stop the send worker. Panics afterwards go to the previous hook.
	pub fn shutdown(&self) {
		if self.inner.shut_down.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.worker.shutdown();
		info!("crash reporter shut down");
	}
}
