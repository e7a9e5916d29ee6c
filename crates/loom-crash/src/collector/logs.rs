// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::Command;

use loom_crash_core::{truncate_head, CrashReport, FieldValue, ReportField};

use super::{CollectContext, CollectOrder, Collector};
use crate::error::CollectorError;

/// Upper bound on a log excerpt in bytes. Older content is cut first.
const MAX_LOG_BYTES: usize = 64 * 1024;

/// Last `lines` lines of a text file. Invalid UTF-8 is replaced.
fn tail_file(path: &Path, lines: usize) -> std::io::Result<String> {
	let file = std::fs::File::open(path)?;
	if lines == 0 {
		return Ok(String::new());
	}
	let mut reader = BufReader::new(file);
	let mut tail: VecDeque<String> = VecDeque::with_capacity(lines.min(1024));
	let mut buf = Vec::new();
	loop {
		buf.clear();
		if reader.read_until(b'\n', &mut buf)? == 0 {
			break;
		}
		if tail.len() == lines {
			tail.pop_front();
		}
		let line = String::from_utf8_lossy(&buf);
		tail.push_back(line.trim_end_matches(['\n', '\r']).to_string());
	}
	let text = tail.into_iter().collect::<Vec<_>>().join("\n");
	Ok(truncate_head(&text, MAX_LOG_BYTES).to_string())
}

/// Tail of the application's own log file.
pub struct LogFileCollector;

impl Collector for LogFileCollector {
	fn name(&self) -> &'static str {
		"log_file"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::ApplicationLog]
	}

	fn order(&self) -> CollectOrder {
		CollectOrder::Late
	}

	fn should_collect(
		&self,
		ctx: &CollectContext<'_>,
		field: ReportField,
		_report: &CrashReport,
	) -> bool {
		ctx.is_requested(field) && ctx.config.application_log_file.is_some()
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		let Some(path) = ctx.config.application_log_file.as_deref() else {
			return Err(CollectorError::failed(
				self.name(),
				field,
				"no application log file configured",
			));
		};
		tail_file(path, ctx.config.application_log_lines)
			.map(FieldValue::Text)
			.map_err(|e| {
				CollectorError::failed(self.name(), field, format!("{}: {e}", path.display()))
			})
	}
}

/// Recent system journal entries. Only collected when enabled in configuration.
pub struct SystemLogCollector;

impl Collector for SystemLogCollector {
	fn name(&self) -> &'static str {
		"system_log"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::SystemLog]
	}

	fn order(&self) -> CollectOrder {
		CollectOrder::Late
	}

	fn should_collect(
		&self,
		ctx: &CollectContext<'_>,
		field: ReportField,
		_report: &CrashReport,
	) -> bool {
		ctx.is_requested(field) && ctx.config.include_system_logs && cfg!(target_os = "linux")
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		let output = Command::new("journalctl")
			.arg("-n")
			.arg(ctx.config.system_log_lines.to_string())
			.arg("--no-pager")
			.arg("--quiet")
			.output()
			.map_err(|e| CollectorError::failed(self.name(), field, format!("journalctl: {e}")))?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(CollectorError::failed(
				self.name(),
				field,
				format!("journalctl exited with {}: {}", output.status, stderr.trim()),
			));
		}
		let stdout = String::from_utf8_lossy(&output.stdout);
		Ok(truncate_head(stdout.trim_end(), MAX_LOG_BYTES).to_string().into())
	}
}
