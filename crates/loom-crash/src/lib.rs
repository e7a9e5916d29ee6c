// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting client for Rust applications.
//!
//! Captures panics and handled errors, writes each report to a local
//! pending directory before anything else happens, and delivers approved
//! reports in the background. Depending on the [`InteractionMode`], reports
//! go out silently, with a toast, or only after the user accepts them.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::Path;
//! use loom_crash::{CrashConfig, CrashReporter};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CrashConfig::load(Path::new("crash.toml"))?;
//!     let crash = CrashReporter::init(config)?;
//!
//!     crash.put_custom_data("workspace", "loom");
//!
//!     if let Err(e) = risky_operation() {
//!         crash.handle_silent_error(&e);
//!     }
//!
//!     crash.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Lifecycle
//!
//! - **Capture**: the panic hook records the failure on the panicking thread,
//!   then assembles the report from the registered collectors on a helper
//!   thread, so a buggy collector cannot take the hook down.
//! - **Persist**: reports are written atomically; approval and silence are
//!   encoded in the file name.
//! - **Dispatch**: the [`InteractionPolicy`] decides between sending now and
//!   asking the user through the application's [`Notifier`].
//! - **Deliver**: a single background worker drains approved reports, oldest
//!   first, through the configured transports.
//! - **Finish**: the foreground surface is closed, services stop and the
//!   process exits.

mod assembler;
mod backtrace;
pub mod collector;
mod config;
mod context;
mod error;
mod finisher;
mod notifier;
mod panic_hook;
mod policy;
mod reporter;
mod retry;
pub mod sender;
mod store;

pub use assembler::ReportAssembler;
pub use config::{
	CrashConfig, HttpConfig, HttpFormat, HttpMethod, DEFAULT_MAX_REPORTS_PER_RUN, ENV_DISABLED,
	ENV_ENDPOINT, ENV_MODE,
};
pub use context::{CrashCause, CrashContext, ThreadDetails};
pub use error::{CollectorError, ConfigError, InitError, Result, SendError, StoreError};
pub use finisher::{BackgroundService, ForegroundSurface, ProcessFinisher, CRASH_EXIT_CODE};
pub use notifier::{Notifier, TracingNotifier};
pub use panic_hook::HANDLER_THREAD_NAME;
pub use policy::{CaptureAction, DrainRequest, InteractionPolicy, StartupPlan};
pub use reporter::{CrashReporter, CrashReporterBuilder};
pub use retry::{retry, RetryConfig, RetryableError};
pub use sender::{ReportSender, RunSummary};
pub use store::ReportStore;

// Re-export core types for convenience
pub use loom_crash_core::{
	CrashReport, FieldValue, Frame, InteractionMode, ReportField, ReportFile, ReportStatus,
	Stacktrace,
};
