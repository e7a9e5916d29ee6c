// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report status and its encoding in the report file name.
//!
//! The file name is the persisted state of a pending report:
//!
//! ```text
//! 1735689600000.stacktrace            new, awaiting approval
//! 1735689600000-approved.stacktrace   approved by the user or the policy
//! 1735689600000-silent.stacktrace     silent, implicitly approved
//! ```
//!
//! There is no other state store. Renaming a file is the state transition.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrashCoreError;

/// Extension of every persisted report.
pub const REPORT_EXTENSION: &str = ".stacktrace";
/// Suffix marking a silent report.
pub const SILENT_SUFFIX: &str = "-silent";
/// Suffix marking an approved report.
pub const APPROVED_SUFFIX: &str = "-approved";

/// Width the creation timestamp is zero-padded to, so that name order is creation order.
const TIMESTAMP_WIDTH: usize = 13;

/// Persisted state of a pending report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
	/// Captured, not yet cleared for sending.
	New,
	/// Cleared for sending by the user or the interaction policy.
	Approved,
	/// Marked non-interactive at capture time.
	Silent,
}

impl ReportStatus {
	/// Silent reports are approved without ever being renamed.
	pub fn is_approved(&self) -> bool {
		match self {
			Self::New => false,
			Self::Approved | Self::Silent => true,
		}
	}

	pub fn is_silent(&self) -> bool {
		matches!(self, Self::Silent)
	}

	fn suffix(&self) -> &'static str {
		match self {
			Self::New => "",
			Self::Approved => APPROVED_SUFFIX,
			Self::Silent => SILENT_SUFFIX,
		}
	}
}

impl fmt::Display for ReportStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::New => write!(f, "new"),
			Self::Approved => write!(f, "approved"),
			Self::Silent => write!(f, "silent"),
		}
	}
}

/// A pending report, identified by its creation timestamp and status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReportFile {
	created_at_millis: i64,
	status: ReportStatus,
}

impl ReportFile {
	pub fn new(created_at_millis: i64, status: ReportStatus) -> Self {
		Self {
			created_at_millis,
			status,
		}
	}

	pub fn created_at_millis(&self) -> i64 {
		self.created_at_millis
	}

	pub fn created_at(&self) -> Option<DateTime<Utc>> {
		Utc.timestamp_millis_opt(self.created_at_millis).single()
	}

	pub fn status(&self) -> ReportStatus {
		self.status
	}

	pub fn is_silent(&self) -> bool {
		self.status.is_silent()
	}

	pub fn is_approved(&self) -> bool {
		self.status.is_approved()
	}

	/// The approved form of this file. Already-approved and silent files map to themselves.
	pub fn approved(&self) -> Self {
		match self.status {
			ReportStatus::New => Self::new(self.created_at_millis, ReportStatus::Approved),
			ReportStatus::Approved | ReportStatus::Silent => *self,
		}
	}

	pub fn file_name(&self) -> String {
		format!(
			"{:0width$}{}{}",
			self.created_at_millis,
			self.status.suffix(),
			REPORT_EXTENSION,
			width = TIMESTAMP_WIDTH
		)
	}
}

impl fmt::Display for ReportFile {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.file_name())
	}
}

impl FromStr for ReportFile {
	type Err = CrashCoreError;

	fn from_str(name: &str) -> Result<Self, Self::Err> {
		let invalid = || CrashCoreError::InvalidFileName(name.to_string());

		let stem = name.strip_suffix(REPORT_EXTENSION).ok_or_else(invalid)?;
		let (timestamp, status) = if let Some(ts) = stem.strip_suffix(APPROVED_SUFFIX) {
			(ts, ReportStatus::Approved)
		} else if let Some(ts) = stem.strip_suffix(SILENT_SUFFIX) {
			(ts, ReportStatus::Silent)
		} else {
			(stem, ReportStatus::New)
		};

		if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
			return Err(invalid());
		}
		let created_at_millis = timestamp.parse::<i64>().map_err(|_| invalid())?;

		Ok(Self::new(created_at_millis, status))
	}
}

impl PartialOrd for ReportFile {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
		Some(self.cmp(other))
	}
}

/// Oldest first.
impl Ord for ReportFile {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		self
			.created_at_millis
			.cmp(&other.created_at_millis)
			.then_with(|| self.file_name().cmp(&other.file_name()))
	}
}
