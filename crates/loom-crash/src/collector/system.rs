// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use loom_crash_core::{CrashReport, FieldValue, ReportField};
use serde_json::{json, Map, Value};

use super::{CollectContext, Collector};
use crate::error::CollectorError;

const PROC_MEMINFO: &str = "/proc/meminfo";
const PROC_OSRELEASE: &str = "/proc/sys/kernel/osrelease";

/// Operating system description and host name.
pub struct SystemInfoCollector;

impl Collector for SystemInfoCollector {
	fn name(&self) -> &'static str {
		"system_info"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::OsInfo, ReportField::Hostname]
	}

	fn collect(
		&self,
		field: ReportField,
		_ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::OsInfo => {
				let mut map = Map::new();
				map.insert("os".to_string(), json!(std::env::consts::OS));
				map.insert("family".to_string(), json!(std::env::consts::FAMILY));
				map.insert("arch".to_string(), json!(std::env::consts::ARCH));
				let kernel = std::fs::read_to_string(PROC_OSRELEASE)
					.map(|s| Value::String(s.trim().to_string()))
					.unwrap_or(Value::Null);
				map.insert("kernel".to_string(), kernel);
				Ok(FieldValue::Object(map))
			}
			ReportField::Hostname => {
				let name = hostname::get()
					.map_err(|e| CollectorError::failed(self.name(), field, e.to_string()))?;
				Ok(name.to_string_lossy().into_owned().into())
			}
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}

/// Total and available memory, in bytes, from `/proc/meminfo`.
pub struct MemoryCollector {
	meminfo: PathBuf,
}

impl Default for MemoryCollector {
	fn default() -> Self {
		Self::new(PROC_MEMINFO)
	}
}

impl MemoryCollector {
	pub fn new(meminfo: impl Into<PathBuf>) -> Self {
		Self {
			meminfo: meminfo.into(),
		}
	}
}

/// Value of `key` in meminfo text, converted from kB to bytes.
fn meminfo_bytes(meminfo: &str, key: &str) -> Option<u64> {
	meminfo.lines().find_map(|line| {
		let (name, rest) = line.split_once(':')?;
		if name.trim() != key {
			return None;
		}
		let mut parts = rest.split_whitespace();
		let value: u64 = parts.next()?.parse().ok()?;
		match parts.next() {
			Some("kB") => Some(value * 1024),
			None => Some(value),
			Some(_) => None,
		}
	})
}

impl Collector for MemoryCollector {
	fn name(&self) -> &'static str {
		"memory"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::TotalMemSize, ReportField::AvailableMemSize]
	}

	fn collect(
		&self,
		field: ReportField,
		_ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		let key = match field {
			ReportField::TotalMemSize => "MemTotal",
			ReportField::AvailableMemSize => "MemAvailable",
			_ => {
				return Err(CollectorError::Unsupported {
					collector: self.name(),
					field,
				})
			}
		};
		let meminfo = std::fs::read_to_string(&self.meminfo).map_err(|e| {
			CollectorError::failed(self.name(), field, format!("{}: {e}", self.meminfo.display()))
		})?;
		meminfo_bytes(&meminfo, key)
			.map(FieldValue::from)
			.ok_or_else(|| CollectorError::failed(self.name(), field, format!("{key} missing")))
	}
}

/// Process id, executable and arguments, and allowlisted environment variables.
pub struct ProcessCollector;

impl Collector for ProcessCollector {
	fn name(&self) -> &'static str {
		"process"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::ProcessInfo, ReportField::Environment]
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::ProcessInfo => {
				let mut map = Map::new();
				map.insert("pid".to_string(), json!(std::process::id()));
				map.insert(
					"executable".to_string(),
					std::env::current_exe()
						.map(|p| json!(p.display().to_string()))
						.unwrap_or(Value::Null),
				);
				map.insert(
					"args".to_string(),
					json!(std::env::args_os()
						.map(|a| a.to_string_lossy().into_owned())
						.collect::<Vec<_>>()),
				);
				map.insert(
					"cwd".to_string(),
					std::env::current_dir()
						.map(|p| json!(p.display().to_string()))
						.unwrap_or(Value::Null),
				);
				Ok(FieldValue::Object(map))
			}
			ReportField::Environment => {
				let map: Map<String, Value> = ctx
					.config
					.environment_allowlist
					.iter()
					.filter_map(|key| {
						std::env::var(key)
							.ok()
							.map(|v| (key.clone(), Value::String(v)))
					})
					.collect();
				Ok(FieldValue::Object(map))
			}
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}
