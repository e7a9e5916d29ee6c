// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};

use chrono::{DateTime, Utc};
use loom_crash_core::{CrashReport, FieldValue, ReportField};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CollectContext, CollectOrder, Collector};
use crate::error::CollectorError;

/// Report id and silent flag.
pub struct ReportIdentityCollector;

impl Collector for ReportIdentityCollector {
	fn name(&self) -> &'static str {
		"identity"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::ReportId, ReportField::IsSilent]
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::ReportId => Ok(Uuid::now_v7().to_string().into()),
			ReportField::IsSilent => Ok(ctx.crash.silent.into()),
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}

/// Application name and version from configuration.
pub struct AppInfoCollector;

impl Collector for AppInfoCollector {
	fn name(&self) -> &'static str {
		"app_info"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::AppName, ReportField::AppVersion]
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::AppName => Ok(ctx.config.app_name.as_str().into()),
			ReportField::AppVersion => Ok(ctx.config.app_version.as_str().into()),
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}

/// A random id generated on first use and persisted, identifying this installation.
pub struct InstallationCollector {
	path: PathBuf,
	id: OnceLock<String>,
}

impl InstallationCollector {
	pub fn new(path: PathBuf) -> Self {
		Self {
			path,
			id: OnceLock::new(),
		}
	}

	fn read_or_create(&self) -> std::io::Result<String> {
		match std::fs::read_to_string(&self.path) {
			Ok(contents) if Uuid::parse_str(contents.trim()).is_ok() => {
				return Ok(contents.trim().to_string());
			}
			Ok(_) => warn!(
				path = %self.path.display(),
				"installation id file is invalid, regenerating"
			),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => return Err(e),
		}

		let id = Uuid::new_v4().to_string();
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&self.path, &id)?;
		debug!(path = %self.path.display(), "created installation id");
		Ok(id)
	}
}

impl Collector for InstallationCollector {
	fn name(&self) -> &'static str {
		"installation"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::InstallationId]
	}

	fn collect(
		&self,
		field: ReportField,
		_ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		if let Some(id) = self.id.get() {
			return Ok(id.as_str().into());
		}
		let id = self
			.read_or_create()
			.map_err(|e| CollectorError::failed(self.name(), field, e.to_string()))?;
		Ok(self.id.get_or_init(|| id).as_str().into())
	}
}

/// Application start time, captured once when the reporter starts, and crash time.
pub struct TimeCollector {
	started_at: DateTime<Utc>,
}

impl TimeCollector {
	pub fn new(started_at: DateTime<Utc>) -> Self {
		Self { started_at }
	}

	pub fn started_now() -> Self {
		Self::new(Utc::now())
	}
}

impl Collector for TimeCollector {
	fn name(&self) -> &'static str {
		"time"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::UserAppStartDate, ReportField::UserCrashDate]
	}

	fn collect(
		&self,
		field: ReportField,
		ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::UserAppStartDate => Ok(self.started_at.to_rfc3339().into()),
			ReportField::UserCrashDate => Ok(ctx.crash.crashed_at.to_rfc3339().into()),
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}

/// Key-value pairs the application attaches to every report.
#[derive(Clone, Default)]
pub struct CustomData {
	inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl CustomData {
	pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
		match self.inner.write() {
			Ok(mut map) => map.insert(key.into(), value.into()),
			Err(poisoned) => poisoned.into_inner().insert(key.into(), value.into()),
		}
	}

	pub fn remove(&self, key: &str) -> Option<String> {
		match self.inner.write() {
			Ok(mut map) => map.remove(key),
			Err(poisoned) => poisoned.into_inner().remove(key),
		}
	}

	pub fn get(&self, key: &str) -> Option<String> {
		self.snapshot().get(key).cloned()
	}

	pub fn clear(&self) {
		match self.inner.write() {
			Ok(mut map) => map.clear(),
			Err(poisoned) => poisoned.into_inner().clear(),
		}
	}

	/// A copy of the current data. Tolerates a poisoned lock: a panic while
	/// holding it must not cost us the crash report.
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		match self.inner.read() {
			Ok(map) => map.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}
}

pub struct CustomDataCollector {
	data: CustomData,
}

impl CustomDataCollector {
	pub fn new(data: CustomData) -> Self {
		Self { data }
	}
}

impl Collector for CustomDataCollector {
	fn name(&self) -> &'static str {
		"custom_data"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::CustomData]
	}

	fn collect(
		&self,
		_field: ReportField,
		_ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		let map: Map<String, Value> = self
			.data
			.snapshot()
			.into_iter()
			.map(|(k, v)| (k, Value::String(v)))
			.collect();
		Ok(FieldValue::Object(map))
	}
}

/// User comment and email. Filled in later by the dialog; at capture time the
/// comment is empty and the email is whatever the application last set.
pub struct UserInputCollector {
	email: Arc<RwLock<Option<String>>>,
}

impl UserInputCollector {
	pub fn new(email: Arc<RwLock<Option<String>>>) -> Self {
		Self { email }
	}
}

impl Collector for UserInputCollector {
	fn name(&self) -> &'static str {
		"user_input"
	}

	fn fields(&self) -> &[ReportField] {
		&[ReportField::UserComment, ReportField::UserEmail]
	}

	fn order(&self) -> CollectOrder {
		CollectOrder::Late
	}

	fn collect(
		&self,
		field: ReportField,
		_ctx: &CollectContext<'_>,
		_report: &CrashReport,
	) -> Result<FieldValue, CollectorError> {
		match field {
			ReportField::UserComment => Ok(FieldValue::text("")),
			ReportField::UserEmail => {
				let email = match self.email.read() {
					Ok(guard) => guard.clone(),
					Err(poisoned) => poisoned.into_inner().clone(),
				};
				Ok(email.map(FieldValue::Text).unwrap_or(FieldValue::NotAvailable))
			}
			_ => Err(CollectorError::Unsupported {
				collector: self.name(),
				field,
			}),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::CrashConfig;
	use crate::context::test_support::panic_context;

	fn collect(collector: &dyn Collector, field: ReportField) -> FieldValue {
		let crash = panic_context("boom");
		let config = CrashConfig {
			app_name: "loom".to_string(),
			app_version: "1.2.3".to_string(),
			..Default::default()
		};
		let ctx = CollectContext {
			crash: &crash,
			config: &config,
			requested: ReportField::ALL,
		};
		collector.collect(field, &ctx, &CrashReport::new()).unwrap()
	}

	#[test]
	fn app_info_comes_from_config() {
		assert_eq!(collect(&AppInfoCollector, ReportField::AppName).as_text(), Some("loom"));
		assert_eq!(collect(&AppInfoCollector, ReportField::AppVersion).as_text(), Some("1.2.3"));
	}

	#[test]
	fn report_ids_are_unique() {
		let a = collect(&ReportIdentityCollector, ReportField::ReportId);
		let b = collect(&ReportIdentityCollector, ReportField::ReportId);
		assert_ne!(a, b);
	}

	#[test]
	fn installation_id_is_persisted() {
		let tmp = tempfile::TempDir::new().unwrap();
		let path = tmp.path().join("nested").join("installation");

		let first = collect(&InstallationCollector::new(path.clone()), ReportField::InstallationId);
		let second = collect(
			&InstallationCollector::new(path.clone()),
			ReportField::InstallationId,
		);

		assert_eq!(first, second);
		assert_eq!(
			std::fs::read_to_string(&path).unwrap(),
			first.as_text().unwrap()
		);
	}

	#[test]
	fn start_date_is_captured_once() {
		let started = Utc::now() - chrono::Duration::hours(1);
		let collector = TimeCollector::new(started);
		assert_eq!(
			collect(&collector, ReportField::UserAppStartDate).as_text(),
			Some(started.to_rfc3339().as_str())
		);
	}

	#[test]
	fn custom_data_snapshot() {
		let data = CustomData::default();
		data.put("user_tier", "pro");
		data.put("document", "draft.md");
		data.remove("document");

		let value = collect(&CustomDataCollector::new(data.clone()), ReportField::CustomData);
		let map = value.as_object().unwrap();
		assert_eq!(map.len(), 1);
		assert_eq!(map["user_tier"], Value::String("pro".to_string()));
		assert_eq!(data.get("user_tier").as_deref(), Some("pro"));
	}

	#[test]
	fn email_defaults_to_not_available() {
		let email = Arc::new(RwLock::new(None));
		let collector = UserInputCollector::new(email.clone());
		assert_eq!(collect(&collector, ReportField::UserEmail), FieldValue::NotAvailable);

		*email.write().unwrap() = Some("dev@example.com".to_string());
		assert_eq!(
			collect(&collector, ReportField::UserEmail).as_text(),
			Some("dev@example.com")
		);
	}
}
