// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The failure event a report is built for.
//!
//! A [`CrashContext`] is captured on the failing thread before anything else
//! runs, so the backtrace and thread identity are those of the failure, not
//! of whatever thread later assembles the report.

use std::panic::PanicHookInfo;
use std::thread::ThreadId;

use chrono::{DateTime, Utc};
use loom_crash_core::{stack_trace_hash, Stacktrace};

use crate::backtrace::{capture_backtrace, parse_backtrace};

/// Exception type recorded for panics.
pub const PANIC_EXCEPTION_TYPE: &str = "panic";

/// What failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashCause {
	/// An unwinding panic.
	Panic {
		message: String,
		location: Option<String>,
	},
	/// An error handed to the reporter by the application.
	Error {
		type_name: String,
		message: String,
		/// `source()` chain, outermost first, excluding the error itself.
		causes: Vec<String>,
	},
}

/// Identity of the thread that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDetails {
	pub id: ThreadId,
	pub name: Option<String>,
}

impl ThreadDetails {
	pub fn current() -> Self {
		let thread = std::thread::current();
		Self {
			id: thread.id(),
			name: thread.name().map(str::to_string),
		}
	}
}

/// Everything known about a failure at the moment it happened.
#[derive(Debug, Clone)]
pub struct CrashContext {
	pub cause: CrashCause,
	pub backtrace: String,
	pub stacktrace: Stacktrace,
	pub thread: ThreadDetails,
	pub crashed_at: DateTime<Utc>,
	pub silent: bool,
}

impl CrashContext {
	/// Capture a panic. Call from the panic hook, on the panicking thread.
	pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
		// Capture the backtrace before any allocation-heavy work.
		let backtrace = capture_backtrace();

		let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
			(*s).to_string()
		} else if let Some(s) = info.payload().downcast_ref::<String>() {
			s.clone()
		} else {
			"Box<dyn Any>".to_string()
		};

		let location = info
			.location()
			.map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));

		Self {
			cause: CrashCause::Panic { message, location },
			stacktrace: parse_backtrace(&backtrace),
			backtrace: backtrace.to_string(),
			thread: ThreadDetails::current(),
			crashed_at: Utc::now(),
			silent: false,
		}
	}

	/// Capture an application error on the calling thread.
	pub fn from_error<E>(error: &E, silent: bool) -> Self
	where
		E: std::error::Error + ?Sized,
	{
		let backtrace = capture_backtrace();

		let mut causes = Vec::new();
		let mut source = error.source();
		while let Some(cause) = source {
			causes.push(cause.to_string());
			source = cause.source();
		}

		Self {
			cause: CrashCause::Error {
				type_name: std::any::type_name::<E>().to_string(),
				message: error.to_string(),
				causes,
			},
			stacktrace: parse_backtrace(&backtrace),
			backtrace: backtrace.to_string(),
			thread: ThreadDetails::current(),
			crashed_at: Utc::now(),
			silent,
		}
	}

	pub fn exception_type(&self) -> &str {
		match &self.cause {
			CrashCause::Panic { .. } => PANIC_EXCEPTION_TYPE,
			CrashCause::Error { type_name, .. } => type_name,
		}
	}

	pub fn message(&self) -> &str {
		match &self.cause {
			CrashCause::Panic { message, .. } | CrashCause::Error { message, .. } => message,
		}
	}

	/// `file:line:col` of the panic, or of the innermost in-app frame for errors.
	pub fn location(&self) -> Option<String> {
		match &self.cause {
			CrashCause::Panic { location, .. } => location.clone(),
			CrashCause::Error { .. } => self.stacktrace.culprit().and_then(|frame| {
				let file = frame.filename.as_ref()?;
				Some(match frame.lineno {
					Some(line) => format!("{file}:{line}"),
					None => file.clone(),
				})
			}),
		}
	}

	/// The full stack trace text, in the shape `rustc` prints panics.
	pub fn render_stack_trace(&self) -> String {
		let mut out = String::new();
		let thread = self.thread.name.as_deref().unwrap_or("<unnamed>");
		match &self.cause {
			CrashCause::Panic { message, location } => {
				out.push_str(&format!("thread '{thread}' panicked"));
				if let Some(location) = location {
					out.push_str(&format!(" at {location}"));
				}
				out.push_str(&format!(":\n{message}\n"));
			}
			CrashCause::Error {
				type_name,
				message,
				causes,
			} => {
				out.push_str(&format!("error in thread '{thread}': {type_name}: {message}\n"));
				for cause in causes {
					out.push_str(&format!("caused by: {cause}\n"));
				}
			}
		}
		out.push_str("stack backtrace:\n");
		out.push_str(&self.backtrace);
		out
	}

	pub fn stack_trace_hash(&self) -> String {
		stack_trace_hash(self.exception_type(), &self.stacktrace)
	}
}

#[cfg(test)]
pub(crate) mod test_support {
	use super::*;
	use crate::backtrace::parse_backtrace_string;

	/// A deterministic panic context for tests.
	pub fn panic_context(message: &str) -> CrashContext {
		let backtrace = concat!(
			"   0: my_app::storage::save\n",
			"             at ./src/storage.rs:42:9\n",
			"   1: my_app::main\n",
			"             at ./src/main.rs:7:5\n",
		);
		CrashContext {
			cause: CrashCause::Panic {
				message: message.to_string(),
				location: Some("src/storage.rs:42:9".to_string()),
			},
			backtrace: backtrace.to_string(),
			stacktrace: parse_backtrace_string(backtrace),
			thread: ThreadDetails::current(),
			crashed_at: Utc::now(),
			silent: false,
		}
	}
}
