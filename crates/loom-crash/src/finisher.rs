// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ending the process after a crash.
//!
//! Runs only once the report is on disk. Closes the foreground surface and
//! gives it a bounded time to settle, stops the application's background
//! services, then terminates.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::assembler::panic_message;
use crate::config::CrashConfig;

/// Exit code used when the process is terminated after a panic, matching the
/// code Rust uses for a panicking main thread.
pub const CRASH_EXIT_CODE: i32 = 101;

const SURFACE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The window or view the user was looking at when the crash happened.
pub trait ForegroundSurface: Send + Sync {
	/// Thread that owns the surface, if it is bound to one.
	fn thread_id(&self) -> Option<ThreadId>;

	/// Ask the surface to close. Must not block.
	fn close(&self);

	fn is_closed(&self) -> bool;
}

/// An application-owned background service to stop before termination.
pub trait BackgroundService: Send + Sync {
	fn name(&self) -> &str;

	fn stop(&self);
}

type Terminator = Box<dyn Fn(i32) + Send + Sync>;

pub struct ProcessFinisher {
	surface: RwLock<Option<Arc<dyn ForegroundSurface>>>,
	services: RwLock<Vec<Arc<dyn BackgroundService>>>,
	surface_close_timeout: Duration,
	stop_services: bool,
	terminator: Terminator,
}

impl ProcessFinisher {
	pub fn new(config: &CrashConfig) -> Self {
		Self {
			surface: RwLock::new(None),
			services: RwLock::new(Vec::new()),
			surface_close_timeout: config.surface_close_timeout(),
			stop_services: config.stop_services_on_crash,
			terminator: Box::new(|code| std::process::exit(code)),
		}
	}

	/// Replace process termination, e.g. to end an embedded runtime instead.
	pub fn with_terminator<F>(mut self, terminator: F) -> Self
	where
		F: Fn(i32) + Send + Sync + 'static,
	{
		self.terminator = Box::new(terminator);
		self
	}

	pub fn set_foreground_surface(&self, surface: Option<Arc<dyn ForegroundSurface>>) {
		match self.surface.write() {
			Ok(mut guard) => *guard = surface,
			Err(poisoned) => *poisoned.into_inner() = surface,
		}
	}

	pub fn register_service(&self, service: Arc<dyn BackgroundService>) {
		match self.services.write() {
			Ok(mut guard) => guard.push(service),
			Err(poisoned) => poisoned.into_inner().push(service),
		}
	}

	/// Close the surface, stop services and terminate the process.
	pub fn finish(&self, crashed_thread: Option<ThreadId>) {
		self.close_surface(crashed_thread);
		if self.stop_services {
			self.stop_services();
		}
		info!(code = CRASH_EXIT_CODE, "terminating crashed process");
		(self.terminator)(CRASH_EXIT_CODE);
	}

	/// Close the foreground surface. Waits for it to close unless the crashed
	/// thread owns it, since that thread can no longer process the close.
	/// Returns whether the surface is known to be closed.
	pub fn close_surface(&self, crashed_thread: Option<ThreadId>) -> bool {
		let surface = match self.surface.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		};
		let Some(surface) = surface else {
			return true;
		};

		if let Err(payload) = catch_unwind(AssertUnwindSafe(|| surface.close())) {
			warn!(
				panic = %panic_message(payload.as_ref()),
				"foreground surface panicked while closing"
			);
			return false;
		}

		if crashed_thread.is_some() && surface.thread_id() == crashed_thread {
			debug!("crashed thread owns the foreground surface, not waiting for it to close");
			return false;
		}

		let deadline = Instant::now() + self.surface_close_timeout;
		loop {
			let closed = catch_unwind(AssertUnwindSafe(|| surface.is_closed())).unwrap_or(false);
			if closed {
				return true;
			}
			if Instant::now() >= deadline {
				warn!(
					timeout_ms = self.surface_close_timeout.as_millis() as u64,
					"foreground surface did not close in time"
				);
				return false;
			}
			std::thread::sleep(SURFACE_POLL_INTERVAL);
		}
	}

	/// Stop every registered service. A panicking service does not stop the others.
	pub fn stop_services(&self) {
		let services = match self.services.read() {
			Ok(guard) => guard.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		};
		for service in services {
			match catch_unwind(AssertUnwindSafe(|| service.stop())) {
				Ok(()) => debug!(service = service.name(), "stopped background service"),
				Err(payload) => warn!(
					service = service.name(),
					panic = %panic_message(payload.as_ref()),
					"background service panicked while stopping"
				),
			}
		}
	}
}
