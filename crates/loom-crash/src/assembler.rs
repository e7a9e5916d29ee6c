// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Report assembly.
//!
//! Runs every registered collector over the configured field set and
//! produces one [`CrashReport`]. A failing or panicking collector costs
//! only its own field, which is recorded as not available.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use loom_crash_core::{CrashReport, ReportField};
use tracing::{debug, warn};

use crate::collector::{CollectContext, Collector, CollectorRegistry};
use crate::config::CrashConfig;
use crate::context::CrashContext;
use crate::error::CollectorError;

pub struct ReportAssembler {
	registry: CollectorRegistry,
	config: Arc<CrashConfig>,
	fields: Vec<ReportField>,
}

impl ReportAssembler {
	pub fn new(registry: CollectorRegistry, config: Arc<CrashConfig>) -> Self {
		let fields = config.report_fields();
		Self {
			registry,
			config,
			fields,
		}
	}

	/// The sorted field set reports are assembled from.
	pub fn fields(&self) -> &[ReportField] {
		&self.fields
	}

	/// Build a report for `crash`. Never fails; collector failures become
	/// not-available fields.
	pub fn assemble(&self, crash: &CrashContext) -> CrashReport {
		let mut report = if crash.silent {
			CrashReport::silent()
		} else {
			CrashReport::new()
		};

		let ctx = CollectContext {
			crash,
			config: &self.config,
			requested: &self.fields,
		};

		for collector in self.registry.iter() {
			for &field in collector.fields() {
				// First collector to claim a field wins.
				if report.contains(field) {
					continue;
				}
				if !guarded(collector.as_ref(), &ctx, field, &report) {
					continue;
				}
				match run_collector(collector.as_ref(), field, &ctx, &report) {
					Ok(value) => report.put(field, value),
					Err(e) => {
						warn!(
							collector = collector.name(),
							field = %field,
							error = %e,
							"collector failed"
						);
						report.put_not_available(field);
					}
				}
			}
		}

		debug!(fields = report.len(), silent = report.is_silent(), "assembled crash report");
		report
	}
}

fn guarded(
	collector: &dyn Collector,
	ctx: &CollectContext<'_>,
	field: ReportField,
	report: &CrashReport,
) -> bool {
	match catch_unwind(AssertUnwindSafe(|| collector.should_collect(ctx, field, report))) {
		Ok(collect) => collect,
		Err(payload) => {
			warn!(
				collector = collector.name(),
				field = %field,
				panic = %panic_message(payload.as_ref()),
				"collector guard panicked, skipping field"
			);
			false
		}
	}
}

fn run_collector(
	collector: &dyn Collector,
	field: ReportField,
	ctx: &CollectContext<'_>,
	report: &CrashReport,
) -> Result<loom_crash_core::FieldValue, CollectorError> {
	catch_unwind(AssertUnwindSafe(|| collector.collect(field, ctx, report))).unwrap_or_else(
		|payload| {
			Err(CollectorError::Panicked {
				collector: collector.name(),
				field,
				message: panic_message(payload.as_ref()),
			})
		},
	)
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		(*s).to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
