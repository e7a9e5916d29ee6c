// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture and parsing for Rust panics.

use loom_crash_core::{Frame, Stacktrace};
use rustc_demangle::demangle;
use std::backtrace::Backtrace;

/// Parse a Rust backtrace into a Stacktrace.
pub fn parse_backtrace(backtrace: &Backtrace) -> Stacktrace {
	parse_backtrace_string(&backtrace.to_string())
}

/// Parse the `Display` output of [`Backtrace`].
///
/// The format is a numbered function line optionally followed by an
/// `at file:line:col` line:
///
/// ```text
///    4: my_app::handlers::save
///              at ./src/handlers.rs:42:9
/// ```
pub fn parse_backtrace_string(bt_string: &str) -> Stacktrace {
	let mut frames: Vec<Frame> = Vec::new();

	for line in bt_string.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				apply_location(frame, location);
			}
			continue;
		}

		if let Some(frame) = parse_frame_line(line) {
			frames.push(frame);
		}
	}

	Stacktrace { frames }
}

/// Parse a single `N: function` line into a Frame.
fn parse_frame_line(line: &str) -> Option<Frame> {
	let (prefix, rest) = line.split_once(':')?;
	if prefix.trim().parse::<u32>().is_err() {
		return None;
	}

	let function_part = rest.trim();
	if function_part.is_empty() {
		return None;
	}

	let demangled = demangle(function_part).to_string();

	// e.g., "my_app::handlers::save" -> "my_app::handlers"
	let module = demangled.rfind("::").map(|idx| demangled[..idx].to_string());
	let in_app = is_in_app_frame(&demangled);

	Some(Frame {
		function: Some(demangled),
		module,
		filename: None,
		lineno: None,
		in_app,
	})
}

/// `./src/main.rs:5:9` -> filename `./src/main.rs`, lineno 5.
fn apply_location(frame: &mut Frame, location: &str) {
	let mut parts = location.rsplitn(3, ':');
	let col = parts.next();
	let line = parts.next();
	let file = parts.next();

	match (file, line, col) {
		(Some(file), Some(line), Some(_)) if line.parse::<u32>().is_ok() => {
			frame.filename = Some(file.to_string());
			frame.lineno = line.parse().ok();
		}
		_ => frame.filename = Some(location.to_string()),
	}
}

/// Determine if a frame is from user application code vs standard library.
fn is_in_app_frame(function: &str) -> bool {
	const SYSTEM_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"tokio::",
		"<tokio::",
		"futures::",
		"<futures::",
		"async_trait::",
		"tracing::",
		"<tracing::",
		"backtrace::",
		"<backtrace::",
		"panic_unwind::",
		"<panic_unwind::",
		"loom_crash::",
		"<loom_crash::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
		"__libc_start",
		"_start",
	];

	const SYSTEM_CONTAINS: &[&str] = &[
		"::panic::",
		"::panicking::",
		"::rt::",
		"::sys_common::",
	];

	!SYSTEM_PREFIXES.iter().any(|p| function.starts_with(p))
		&& !SYSTEM_CONTAINS.iter().any(|c| function.contains(c))
}

/// Capture a fresh backtrace regardless of `RUST_BACKTRACE`.
pub fn capture_backtrace() -> Backtrace {
	Backtrace::force_capture()
}
