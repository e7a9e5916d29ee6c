// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: capture a handled error and a panic with the loom-crash client.
//!
//! Run with:
//!   LOOM_CRASH_ENDPOINT=http://localhost:8080/api/crash/report \
//!     cargo run --example capture -p loom-crash

use std::time::Duration;

use loom_crash::{CrashConfig, CrashReporter, InteractionMode};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter("loom_crash=debug")
		.init();

	let mut config = CrashConfig {
		app_name: "loom-crash-example".to_string(),
		report_dir: Some(std::env::temp_dir().join("loom-crash-example").join("reports")),
		mode: InteractionMode::Silent,
		terminate_process: false,
		..Default::default()
	};
	config.apply_env_overrides()?;

	println!("Initializing crash reporter...");
	println!("  Report dir: {}", config.resolve_report_dir()?.display());
	println!("  Mode: {}", config.mode);

	let crash = CrashReporter::init(config)?;
	crash.put_custom_data("example", "true");

	println!("\nReporting a handled error...");
	let err = std::fs::read("/definitely/not/here").unwrap_err();
	match crash.handle_silent_error(&err) {
		Some(file) => println!("  Saved {file}"),
		None => println!("  Not saved"),
	}

	println!("\nPanicking on a worker thread...");
	let _ = std::thread::Builder::new()
		.name("example-worker".to_string())
		.spawn(|| panic!("example panic from loom-crash"))?
		.join();

	if let Some(done) = crash.send_pending() {
		match done.recv_timeout(Duration::from_secs(30)) {
			Ok(summary) => println!("\nSend run: {summary:?}"),
			Err(e) => println!("\nSend run did not finish: {e}"),
		}
	}

	println!("Pending: {:?}", crash.store().list_pending()?);
	crash.shutdown();
	Ok(())
}
