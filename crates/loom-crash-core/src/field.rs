// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report field identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrashCoreError;

/// Identifier of one named datum in a crash report.
///
/// Declaration order is the order fields appear in a serialized report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportField {
	ReportId,
	AppName,
	AppVersion,
	InstallationId,
	StackTrace,
	StackTraceHash,
	ExceptionType,
	CrashLocation,
	ThreadDetails,
	OsInfo,
	Hostname,
	TotalMemSize,
	AvailableMemSize,
	ProcessInfo,
	Environment,
	UserAppStartDate,
	UserCrashDate,
	CustomData,
	ApplicationLog,
	SystemLog,
	IsSilent,
	UserComment,
	UserEmail,
}

impl ReportField {
	/// Every field, in declaration order.
	pub const ALL: &'static [ReportField] = &[
		ReportField::ReportId,
		ReportField::AppName,
		ReportField::AppVersion,
		ReportField::InstallationId,
		ReportField::StackTrace,
		ReportField::StackTraceHash,
		ReportField::ExceptionType,
		ReportField::CrashLocation,
		ReportField::ThreadDetails,
		ReportField::OsInfo,
		ReportField::Hostname,
		ReportField::TotalMemSize,
		ReportField::AvailableMemSize,
		ReportField::ProcessInfo,
		ReportField::Environment,
		ReportField::UserAppStartDate,
		ReportField::UserCrashDate,
		ReportField::CustomData,
		ReportField::ApplicationLog,
		ReportField::SystemLog,
		ReportField::IsSilent,
		ReportField::UserComment,
		ReportField::UserEmail,
	];

	/// Fields collected when no custom list is configured.
	pub const DEFAULT: &'static [ReportField] = Self::ALL;

	/// Short list used when reports go out by mail, where the body is read by a human.
	pub const MAIL: &'static [ReportField] = &[
		ReportField::UserComment,
		ReportField::AppVersion,
		ReportField::OsInfo,
		ReportField::Hostname,
		ReportField::CustomData,
		ReportField::StackTrace,
	];

	/// The wire name of this field.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::ReportId => "REPORT_ID",
			Self::AppName => "APP_NAME",
			Self::AppVersion => "APP_VERSION",
			Self::InstallationId => "INSTALLATION_ID",
			Self::StackTrace => "STACK_TRACE",
			Self::StackTraceHash => "STACK_TRACE_HASH",
			Self::ExceptionType => "EXCEPTION_TYPE",
			Self::CrashLocation => "CRASH_LOCATION",
			Self::ThreadDetails => "THREAD_DETAILS",
			Self::OsInfo => "OS_INFO",
			Self::Hostname => "HOSTNAME",
			Self::TotalMemSize => "TOTAL_MEM_SIZE",
			Self::AvailableMemSize => "AVAILABLE_MEM_SIZE",
			Self::ProcessInfo => "PROCESS_INFO",
			Self::Environment => "ENVIRONMENT",
			Self::UserAppStartDate => "USER_APP_START_DATE",
			Self::UserCrashDate => "USER_CRASH_DATE",
			Self::CustomData => "CUSTOM_DATA",
			Self::ApplicationLog => "APPLICATION_LOG",
			Self::SystemLog => "SYSTEM_LOG",
			Self::IsSilent => "IS_SILENT",
			Self::UserComment => "USER_COMMENT",
			Self::UserEmail => "USER_EMAIL",
		}
	}
}

impl fmt::Display for ReportField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ReportField {
	type Err = CrashCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.iter()
			.copied()
			.find(|field| field.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| CrashCoreError::UnknownField(s.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_is_sorted_in_declaration_order() {
		let mut sorted = ReportField::ALL.to_vec();
		sorted.sort();
		assert_eq!(sorted, ReportField::ALL);
	}

	#[test]
	fn wire_name_matches_serde() {
		for field in ReportField::ALL {
			let json = serde_json::to_string(field).unwrap();
			assert_eq!(json, format!("\"{}\"", field.as_str()));
		}
	}

	#[test]
	fn parse_is_case_insensitive() {
		assert_eq!(
			"stack_trace".parse::<ReportField>().unwrap(),
			ReportField::StackTrace
		);
		assert_eq!(
			"USER_EMAIL".parse::<ReportField>().unwrap(),
			ReportField::UserEmail
		);
	}

	#[test]
	fn parse_unknown_field_fails() {
		let result = "PHONE_MODEL".parse::<ReportField>();
		assert!(matches!(result, Err(CrashCoreError::UnknownField(_))));
	}

	#[test]
	fn mail_list_is_subset_of_all() {
		for field in ReportField::MAIL {
			assert!(ReportField::ALL.contains(field));
		}
	}
}
