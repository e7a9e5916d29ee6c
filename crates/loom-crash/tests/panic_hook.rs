// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The panic hook is process-wide, so everything that needs it lives in one test.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use loom_crash::collector::{CollectContext, CollectOrder, Collector};
use loom_crash::{
	CollectorError, CrashConfig, CrashReport, CrashReporter, FieldValue, InitError, InteractionMode,
	ReportField, ReportSender, SendError, CRASH_EXIT_CODE,
};
use tempfile::TempDir;

const SEND_TIMEOUT_MS: u64 = 3_000;

struct ExplodingCollector;

impl Collector for ExplodingCollector {
	fn name(&self) -> &'static str {
		"exploding"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::Environment]
	}

	fn order(&self) -> CollectOrder {
		CollectOrder::First
	}

	fn collect(
		&self,
		_field: ReportField,
		_ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		panic!("environment collector bug");
	}
}

/// Transport with an adjustable delay that counts completed deliveries.
#[derive(Default)]
struct SlowSender {
	online: AtomicBool,
	delay_ms: AtomicU64,
	delivered: AtomicUsize,
}

impl SlowSender {
	fn configure(&self, online: bool, delay_ms: u64) {
		self.online.store(online, Ordering::SeqCst);
		self.delay_ms.store(delay_ms, Ordering::SeqCst);
	}

	fn delivered(&self) -> usize {
		self.delivered.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl ReportSender for SlowSender {
	fn name(&self) -> &str {
		"slow"
	}

	async fn send(&self, _report: &CrashReport) -> Result<(), SendError> {
		let delay = self.delay_ms.load(Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(delay)).await;
		if !self.online.load(Ordering::SeqCst) {
			return Err(SendError::transient("offline"));
		}
		self.delivered.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}

/// Records the exit code and how many reports had been delivered when the
/// process would have ended.
#[derive(Default)]
struct Exit {
	code: AtomicI32,
	delivered: AtomicUsize,
}

impl Exit {
	fn reset(&self) {
		self.code.store(0, Ordering::SeqCst);
		self.delivered.store(usize::MAX, Ordering::SeqCst);
	}

	fn code(&self) -> i32 {
		self.code.load(Ordering::SeqCst)
	}

	fn delivered(&self) -> usize {
		self.delivered.load(Ordering::SeqCst)
	}
}

fn crash_thread(name: &str, message: &'static str) -> Duration {
	let started = Instant::now();
	let result = std::thread::Builder::new()
		.name(name.to_string())
		.spawn(move || panic!("{message}"))
		.unwrap()
		.join();
	assert!(result.is_err());
	started.elapsed()
}

#[test]
fn panic_hook_lifecycle() {
	let tmp = TempDir::new().unwrap();
	let sender = Arc::new(SlowSender::default());
	let exit = Arc::new(Exit::default());
	let config = CrashConfig {
		app_name: "loom".to_string(),
		report_dir: Some(tmp.path().join("reports")),
		mode: InteractionMode::Silent,
		send_timeout_ms: SEND_TIMEOUT_MS,
		..Default::default()
	};

	let terminator = {
		let exit = exit.clone();
		let sender = sender.clone();
		move |code| {
			exit.delivered.store(sender.delivered(), Ordering::SeqCst);
			exit.code.store(code, Ordering::SeqCst);
		}
	};
	let reporter = CrashReporter::builder(config.clone())
		.collector(Arc::new(ExplodingCollector))
		.sender(sender.clone())
		.terminator(terminator)
		.init()
		.unwrap();

	assert!(matches!(
		CrashReporter::init(config),
		Err(InitError::AlreadyInitialized)
	));

	// Offline: the report stays on disk, approved, for the next run.
	exit.reset();
	crash_thread("render", "index out of bounds");

	assert_eq!(exit.code(), CRASH_EXIT_CODE);
	let pending = reporter.store().list_pending().unwrap();
	assert_eq!(pending.len(), 1);
	assert!(pending[0].is_approved());

	let report = reporter.store().load(&pending[0]).unwrap();
	let trace = report.get_text(ReportField::StackTrace).unwrap();
	assert!(trace.contains("thread 'render' panicked"));
	assert!(trace.contains("index out of bounds"));
	assert_eq!(report.get(ReportField::Environment), Some(&FieldValue::NotAvailable));
	assert_eq!(report.get(ReportField::IsSilent).and_then(FieldValue::as_bool), Some(false));

	// A slow transport finishes before the process ends.
	exit.reset();
	sender.configure(true, 500);
	crash_thread("render", "slow network");

	assert_eq!(exit.code(), CRASH_EXIT_CODE);
	assert_eq!(exit.delivered(), 2);
	assert!(reporter.store().list_pending().unwrap().is_empty());

	// A hanging transport does not hold the process past the send timeout.
	exit.reset();
	sender.configure(true, SEND_TIMEOUT_MS + 2_000);
	let elapsed = crash_thread("render", "hanging network");

	assert_eq!(exit.code(), CRASH_EXIT_CODE);
	assert_eq!(exit.delivered(), 2);
	assert!(elapsed < Duration::from_millis(SEND_TIMEOUT_MS + 1_500), "took {elapsed:?}");

	// Disabled: the previous hook handles it and nothing is written.
	exit.reset();
	sender.configure(false, 0);
	let before = reporter.store().list_pending().unwrap().len();
	reporter.set_enabled(false);
	crash_thread("render", "second failure");
	assert_eq!(exit.code(), 0);
	assert_eq!(reporter.store().list_pending().unwrap().len(), before);

	// Shutdown waits for the hanging send, then the hook stands down.
	reporter.set_enabled(true);
	reporter.shutdown();
	let before = reporter.store().list_pending().unwrap().len();
	crash_thread("render", "after shutdown");
	assert_eq!(exit.code(), 0);
	assert_eq!(reporter.store().list_pending().unwrap().len(), before);
}
