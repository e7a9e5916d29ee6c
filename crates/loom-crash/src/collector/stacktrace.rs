// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_crash_core::{CrashReport, FieldValue, ReportField};
use serde_json::{json, Map};

use super::{CollectContext, CollectOrder, Collector};
use crate::error::CollectorError;

/// Stack trace, its hash, the exception type and the crash location.
pub struct StackTraceCollector;

impl Collector for StackTraceCollector {
	fn name(&self) -> &'static str {
		"stacktrace"
	}

	fn fields(&self) -> &[ReportField] {
		&[
			ReportField::StackTrace,
			ReportField::StackTraceHash,
			ReportField::ExceptionType,
			ReportField::CrashLocation,
		]
	}

	fn order(&self) -> CollectOrder {
		CollectOrder::First
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::StackTrace => Ok(ctx.crash.render_stack_trace().into()),
			ReportField::StackTraceHash => Ok(ctx.crash.stack_trace_hash().into()),
			ReportField::ExceptionType => Ok(ctx.crash.exception_type().into()),
			ReportField::CrashLocation => Ok(ctx
				.crash
				.location()
				.map(FieldValue::Text)
				.unwrap_or(FieldValue::NotAvailable)),
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}

/// Name and id of the failing thread.
pub struct ThreadCollector;

impl Collector for ThreadCollector {
	fn name(&self) -> &'static str {
		"thread"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::ThreadDetails]
	}

	fn order(&self) -> CollectOrder {
		CollectOrder::First
	}

	fn collect(
		&self,
		_field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		let thread = &ctx.crash.thread;
		let mut map = Map::new();
		map.insert("id".to_string(), json!(format!("{:?}", thread.id)));
		map.insert(
			"name".to_string(),
			thread.name.as_deref().map(|n| json!(n)).unwrap_or(json!(null)),
		);
		map.insert(
			"is_main".to_string(),
			json!(thread.name.as_deref() == Some("main")),
		);
		Ok(FieldValue::Object(map))
	}
}
