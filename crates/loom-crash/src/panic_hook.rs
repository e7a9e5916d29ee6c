// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The process-wide panic hook.
//!
//! The hook captures the panic on the panicking thread, then runs the rest
//! of the pipeline on a short-lived helper thread. A panic raised while a
//! hook runs aborts the process, so anything that may panic (collectors,
//! user surfaces and services) must not run on the hook's own thread.

use std::panic::PanicHookInfo;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, warn};

use crate::context::CrashContext;
use crate::reporter::ReporterInner;
use crate::sender::WORKER_THREAD_NAME;

/// Name of the helper thread that assembles and persists reports.
pub const HANDLER_THREAD_NAME: &str = "loom-crash-handler";

type PreviousHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Set while a crash is being handled; a second concurrent crash goes to the previous hook.
static HANDLING: AtomicBool = AtomicBool::new(false);

/// Install the hook, keeping the current one as the fallback.
pub(crate) fn install(inner: Arc<ReporterInner>) {
	let previous: PreviousHook = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		let thread = std::thread::current();
		match thread.name() {
			// Collector panics are caught and recorded by the assembler.
			Some(HANDLER_THREAD_NAME) => return,
			Some(WORKER_THREAD_NAME) => {
				error!("crash report sender panicked");
				previous(info);
				return;
			}
			_ => {}
		}

		if !inner.is_active() {
			previous(info);
			return;
		}

		if HANDLING.swap(true, Ordering::SeqCst) {
			warn!("panic while another crash is being handled");
			previous(info);
			return;
		}

		let crash = CrashContext::from_panic(info);
		let crashed_thread = crash.thread.id;
		let handled = run_isolated(|| {
			inner.capture(&crash, true);
		})
		.is_some();

		if inner.config().chain_to_previous_hook || !handled {
			previous(info);
		}

		if inner.config().terminate_process {
			run_isolated(|| inner.finish(Some(crashed_thread)));
		}

		HANDLING.store(false, Ordering::SeqCst);
	}));
}

/// Run `f` on a helper thread and wait for it. `None` if it panicked or
/// could not be started.
pub(crate) fn run_isolated<T, F>(f: F) -> Option<T>
where
	F: FnOnce() -> T + Send,
	T: Send,
{
	std::thread::scope(|scope| {
		let handle = match std::thread::Builder::new()
			.name(HANDLER_THREAD_NAME.to_string())
			.spawn_scoped(scope, f)
		{
			Ok(handle) => handle,
			Err(e) => {
				error!(error = %e, "failed to start crash handler thread");
				return None;
			}
		};
		match handle.join() {
			Ok(value) => Some(value),
			Err(_) => {
				error!("crash handler panicked");
				None
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn run_isolated_returns_value() {
		assert_eq!(run_isolated(|| 40 + 2), Some(42));
	}

	#[test]
	fn run_isolated_runs_on_named_thread() {
		let name = run_isolated(|| std::thread::current().name().map(str::to_string));
		assert_eq!(name.flatten().as_deref(), Some(HANDLER_THREAD_NAME));
	}

	#[test]
	fn run_isolated_contains_panics() {
		let result: Option<()> = run_isolated(|| panic!("collector bug"));
		assert!(result.is_none());
	}
}
