// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Data collectors and their registry.
//!
//! A collector is a stateless-per-call unit that knows how to produce one or
//! more report fields. Collectors run in [`CollectOrder`]: stack trace and
//! thread details first, before anything else can disturb the process, and
//! expensive reads such as log files last.

mod app;
mod logs;
mod stacktrace;
mod system;

use std::sync::Arc;

use loom_crash_core::{CrashReport, FieldValue, ReportField};

use crate::config::CrashConfig;
use crate::context::CrashContext;
use crate::error::CollectorError;

pub use app::{
	AppInfoCollector, CustomData, CustomDataCollector, InstallationCollector,
	ReportIdentityCollector, TimeCollector, UserInputCollector,
};
pub use logs::{LogFileCollector, SystemLogCollector};
pub use stacktrace::{StackTraceCollector, ThreadCollector};
pub use system::{MemoryCollector, ProcessCollector, SystemInfoCollector};

/// When a collector runs relative to the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CollectOrder {
	/// Before everything else. For data that later collectors could destroy.
	First,
	#[default]
	Normal,
	/// After everything else. For slow or bulky data.
	Late,
}

/// What a collector sees while a report is being assembled.
pub struct CollectContext<'a> {
	pub crash: &'a CrashContext,
	pub config: &'a CrashConfig,
	/// Fields requested for this report, sorted.
	pub requested: &'a [ReportField],
}

impl CollectContext<'_> {
	pub fn is_requested(&self, field: ReportField) -> bool {
		self.requested.binary_search(&field).is_ok()
	}
}

/// A unit that gathers one or more report fields.
pub trait Collector: Send + Sync {
	/// Name used in logs.
	fn name(&self) -> &'static str;

	/// Fields this collector can produce. Never empty.
	fn fields(&self) -> &[ReportField];

	fn order(&self) -> CollectOrder {
		CollectOrder::Normal
	}

	/// Guard called before [`collect`](Self::collect). Defaults to "the field
	/// was requested"; collectors add runtime checks on top.
	fn should_collect(
		&self,
		ctx: &CollectContext<'_>,
		field: ReportField,
		_report: &CrashReport,
	) -> bool {
		ctx.is_requested(field)
	}

	/// Produce the value of `field`. `report` holds what earlier collectors produced.
	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		report: &CrashReport,
	) -> Result<FieldValue, CollectorError>;
}

/// Ordered set of collectors.
#[derive(Clone, Default)]
pub struct CollectorRegistry {
	collectors: Vec<Arc<dyn Collector>>,
}

impl CollectorRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a collector. Among collectors of the same order, registration order is kept.
	pub fn register(&mut self, collector: Arc<dyn Collector>) {
		debug_assert!(!collector.fields().is_empty(), "collector declares no fields");
		self.collectors.push(collector);
		self.collectors.sort_by_key(|c| c.order());
	}

	pub fn with(mut self, collector: Arc<dyn Collector>) -> Self {
		self.register(collector);
		self
	}

	/// Collectors in run order.
	pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Collector>> {
		self.collectors.iter()
	}

	pub fn len(&self) -> usize {
		self.collectors.len()
	}

	pub fn is_empty(&self) -> bool {
		self.collectors.is_empty()
	}

	/// Whether any registered collector claims `field`.
	pub fn claims(&self, field: ReportField) -> bool {
		self.collectors.iter().any(|c| c.fields().contains(&field))
	}
}

/// Shared state owned by the built-in collectors that the application can update at runtime.
#[derive(Clone, Default)]
pub struct CollectorHandles {
	pub custom_data: CustomData,
	pub user_email: Arc<std::sync::RwLock<Option<String>>>,
}

/// The built-in collectors.
pub fn default_registry(
	installation_file: std::path::PathBuf,
	handles: &CollectorHandles,
) -> CollectorRegistry {
	CollectorRegistry::new()
		.with(Arc::new(StackTraceCollector))
		.with(Arc::new(ThreadCollector))
		.with(Arc::new(ReportIdentityCollector))
		.with(Arc::new(AppInfoCollector))
		.with(Arc::new(InstallationCollector::new(installation_file)))
		.with(Arc::new(SystemInfoCollector))
		.with(Arc::new(MemoryCollector::default()))
		.with(Arc::new(ProcessCollector))
		.with(Arc::new(TimeCollector::started_now()))
		.with(Arc::new(CustomDataCollector::new(handles.custom_data.clone())))
		.with(Arc::new(LogFileCollector))
		.with(Arc::new(SystemLogCollector))
		.with(Arc::new(UserInputCollector::new(handles.user_email.clone())))
}
