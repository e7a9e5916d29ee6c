// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporter configuration.
//!
//! Configuration is read once at initialization, from TOML and environment
//! overrides, and is immutable afterwards.
//!
//! ```toml
//! app_name = "loom"
//! mode = "notification"
//! notification_title = "Loom crashed"
//! notification_text = "Send a crash report?"
//! max_reports_per_run = 5
//!
//! [http]
//! url = "https://crash.example.com/api/crash/report"
//! auth_token = "secret"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use loom_crash_core::{InteractionMode, ReportField};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, StoreError};

/// Environment variable overriding the interaction mode.
pub const ENV_MODE: &str = "LOOM_CRASH_MODE";
/// Environment variable overriding the HTTP endpoint.
pub const ENV_ENDPOINT: &str = "LOOM_CRASH_ENDPOINT";
/// Environment variable disabling crash reporting when set to `1` or `true`.
pub const ENV_DISABLED: &str = "LOOM_CRASH_DISABLED";

/// Default number of reports handled by one send run.
pub const DEFAULT_MAX_REPORTS_PER_RUN: usize = 5;

/// HTTP method used by the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpMethod {
	#[default]
	Post,
	/// PUT to `<url>/<report id>`, which makes resends idempotent on the server.
	Put,
}

/// Body encoding used by the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpFormat {
	#[default]
	Json,
	Form,
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
	pub url: String,
	pub method: HttpMethod,
	pub format: HttpFormat,
	pub auth_token: Option<String>,
	pub basic_auth_login: Option<String>,
	pub basic_auth_password: Option<String>,
	pub timeout_ms: u64,
	pub max_retries: u32,
}

impl Default for HttpConfig {
	fn default() -> Self {
		Self {
			url: String::new(),
			method: HttpMethod::default(),
			format: HttpFormat::default(),
			auth_token: None,
			basic_auth_login: None,
			basic_auth_password: None,
			timeout_ms: 20_000,
			max_retries: 2,
		}
	}
}

impl HttpConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}
}

/// Complete crash reporter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrashConfig {
	/// When false the panic hook delegates straight to the previous hook.
	pub enabled: bool,
	pub app_name: String,
	pub app_version: String,
	/// Pending-report directory. Defaults to `$XDG_DATA_HOME/<app_name>/crash-reports`.
	pub report_dir: Option<PathBuf>,
	pub mode: InteractionMode,
	/// Custom field list. Empty selects the default or mail list.
	pub fields: Vec<ReportField>,
	pub excluded_fields: Vec<ReportField>,
	pub max_reports_per_run: usize,
	pub delete_unapproved_on_start: bool,
	pub unapproved_retain_count: usize,
	pub delete_old_version_reports_on_start: bool,
	pub send_reports_in_dev_mode: bool,
	pub terminate_process: bool,
	pub chain_to_previous_hook: bool,
	pub stop_services_on_crash: bool,
	pub send_timeout_ms: u64,
	pub toast_wait_ms: u64,
	pub surface_close_timeout_ms: u64,
	pub toast_text: Option<String>,
	pub notification_title: Option<String>,
	pub notification_text: Option<String>,
	pub dialog_text: Option<String>,
	pub include_system_logs: bool,
	pub system_log_lines: usize,
	pub application_log_file: Option<PathBuf>,
	pub application_log_lines: usize,
	pub environment_allowlist: Vec<String>,
	pub http: Option<HttpConfig>,
	pub mail_to: Option<String>,
}

impl Default for CrashConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			app_name: "app".to_string(),
			app_version: env!("CARGO_PKG_VERSION").to_string(),
			report_dir: None,
			mode: InteractionMode::Silent,
			fields: Vec::new(),
			excluded_fields: Vec::new(),
			max_reports_per_run: DEFAULT_MAX_REPORTS_PER_RUN,
			delete_unapproved_on_start: false,
			unapproved_retain_count: 1,
			delete_old_version_reports_on_start: true,
			send_reports_in_dev_mode: true,
			terminate_process: true,
			chain_to_previous_hook: true,
			stop_services_on_crash: true,
			send_timeout_ms: 10_000,
			toast_wait_ms: 2_000,
			surface_close_timeout_ms: 500,
			toast_text: None,
			notification_title: None,
			notification_text: None,
			dialog_text: None,
			include_system_logs: false,
			system_log_lines: 100,
			application_log_file: None,
			application_log_lines: 100,
			environment_allowlist: ["PATH", "LANG", "SHELL", "TERM", "RUST_LOG", "RUST_BACKTRACE"]
				.iter()
				.map(|s| s.to_string())
				.collect(),
			http: None,
			mail_to: None,
		}
	}
}

impl CrashConfig {
	/// Parse configuration from TOML text. `path` is only used in error messages.
	pub fn from_toml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
		toml::from_str(contents).map_err(|source| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Load configuration from a TOML file and apply environment overrides.
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path)?;
		let mut config = Self::from_toml_str(&contents, path)?;
		config.apply_env_overrides()?;
		debug!(path = %path.display(), mode = %config.mode, "loaded crash reporter config");
		Ok(config)
	}

	/// Apply `LOOM_CRASH_*` overrides from the process environment.
	pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
		self.apply_overrides(|key| std::env::var(key).ok())
	}

	/// Apply overrides from an arbitrary lookup.
	pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(mode) = lookup(ENV_MODE) {
			self.mode = mode
				.parse()
				.map_err(|_| {
					ConfigError::invalid_value(ENV_MODE, format!("unknown mode '{mode}'"))
				})?;
		}
		if let Some(url) = lookup(ENV_ENDPOINT) {
			self.http.get_or_insert_with(HttpConfig::default).url = url;
		}
		if let Some(disabled) = lookup(ENV_DISABLED) {
			self.enabled = !matches!(disabled.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
		}
		Ok(())
	}

	/// Check the configuration is usable for the chosen mode.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let require = |value: &Option<String>, resource: &'static str| match value {
			Some(v) if !v.trim().is_empty() => Ok(()),
			_ => Err(ConfigError::MissingResource {
				mode: self.mode,
				resource,
			}),
		};

		match self.mode {
			InteractionMode::Silent => {}
			InteractionMode::Toast => require(&self.toast_text, "toast_text")?,
			InteractionMode::Notification => {
				require(&self.notification_title, "notification_title")?;
				require(&self.notification_text, "notification_text")?;
			}
			InteractionMode::Dialog => require(&self.dialog_text, "dialog_text")?,
		}

		if self.max_reports_per_run == 0 {
			return Err(ConfigError::invalid_value(
				"max_reports_per_run",
				"must be at least 1",
			));
		}

		if self.app_name.trim().is_empty() {
			return Err(ConfigError::invalid_value("app_name", "must not be empty"));
		}

		if let Some(http) = &self.http {
			let url = url::Url::parse(&http.url)
				.map_err(|e| ConfigError::invalid_value("http.url", e.to_string()))?;
			if !matches!(url.scheme(), "http" | "https") {
				return Err(ConfigError::invalid_value(
					"http.url",
					format!("unsupported scheme '{}'", url.scheme()),
				));
			}
		}

		if let Some(mail_to) = &self.mail_to {
			if !mail_to.contains('@') {
				return Err(ConfigError::invalid_value(
					"mail_to",
					"must be an email address",
				));
			}
		}

		Ok(())
	}

	/// The fields to collect: the custom list if set, otherwise the mail list
	/// when reports go out by mail only, otherwise the default list.
	pub fn report_fields(&self) -> Vec<ReportField> {
		let base: &[ReportField] = if !self.fields.is_empty() {
			&self.fields
		} else if self.mail_to.is_some() && self.http.is_none() {
			ReportField::MAIL
		} else {
			ReportField::DEFAULT
		};

		let mut fields: Vec<ReportField> = base
			.iter()
			.copied()
			.filter(|f| !self.excluded_fields.contains(f))
			.collect();
		fields.sort();
		fields.dedup();
		fields
	}

	/// Resolve the pending-report directory.
	pub fn resolve_report_dir(&self) -> Result<PathBuf, StoreError> {
		if let Some(dir) = &self.report_dir {
			return Ok(dir.clone());
		}
		let data_dir = dirs::data_dir().ok_or(StoreError::NoDataDir)?;
		Ok(data_dir.join(&self.app_name).join("crash-reports"))
	}

	pub fn send_timeout(&self) -> Duration {
		Duration::from_millis(self.send_timeout_ms)
	}

	pub fn toast_wait(&self) -> Duration {
		Duration::from_millis(self.toast_wait_ms)
	}

	pub fn surface_close_timeout(&self) -> Duration {
		Duration::from_millis(self.surface_close_timeout_ms)
	}

	/// Whether reports may be transmitted from this build.
	pub fn sending_allowed(&self) -> bool {
		self.send_reports_in_dev_mode || !cfg!(debug_assertions)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn parse(toml: &str) -> CrashConfig {
		CrashConfig::from_toml_str(toml, Path::new("test.toml")).unwrap()
	}

	#[test]
	fn defaults_are_valid() {
		let config = CrashConfig::default();
		assert_eq!(config.max_reports_per_run, DEFAULT_MAX_REPORTS_PER_RUN);
		assert_eq!(config.mode, InteractionMode::Silent);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn empty_toml_gives_defaults() {
		assert_eq!(parse(""), CrashConfig::default());
	}

	#[test]
	fn parses_full_config() {
		let config = parse(
			r#"
app_name = "loom"
mode = "dialog"
dialog_text = "Send a report?"
fields = ["STACK_TRACE", "APP_VERSION"]
max_reports_per_run = 3

[http]
url = "https://crash.example.com/report"
method = "put"
format = "form"
"#,
		);
		assert_eq!(config.app_name, "loom");
		assert_eq!(config.mode, InteractionMode::Dialog);
		assert_eq!(config.max_reports_per_run, 3);
		let http = config.http.as_ref().unwrap();
		assert_eq!(http.method, HttpMethod::Put);
		assert_eq!(http.format, HttpFormat::Form);
		assert_eq!(http.timeout_ms, 20_000);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn invalid_toml_reports_path() {
		let err = CrashConfig::from_toml_str("mode = ", Path::new("crash.toml")).unwrap_err();
		assert!(err.to_string().contains("crash.toml"));
	}

	#[test]
	fn unknown_field_name_is_rejected() {
		let result = CrashConfig::from_toml_str(r#"fields = ["PHONE_MODEL"]"#, Path::new("x"));
		assert!(result.is_err());
	}

	#[test]
	fn notification_mode_requires_texts() {
		let config = CrashConfig {
			mode: InteractionMode::Notification,
			notification_title: Some("Crash".to_string()),
			..Default::default()
		};
		let err = config.validate().unwrap_err();
		assert!(matches!(
			err,
			ConfigError::MissingResource {
				resource: "notification_text",
				..
			}
		));
	}

	#[test]
	fn toast_mode_requires_text() {
		let config = CrashConfig {
			mode: InteractionMode::Toast,
			toast_text: Some("   ".to_string()),
			..Default::default()
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::MissingResource {
				resource: "toast_text",
				..
			})
		));
	}

	#[test]
	fn zero_batch_size_is_invalid() {
		let config = CrashConfig {
			max_reports_per_run: 0,
			..Default::default()
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::InvalidValue { .. })
		));
	}

	#[test]
	fn bad_http_url_is_invalid() {
		let config = CrashConfig {
			http: Some(HttpConfig {
				url: "ftp://example.com".to_string(),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn env_overrides_apply() {
		let env: HashMap<&str, &str> = [
			(ENV_MODE, "toast"),
			(ENV_ENDPOINT, "https://override.example.com"),
			(ENV_DISABLED, "true"),
		]
		.into_iter()
		.collect();
		let mut config = CrashConfig::default();
		config
			.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
			.unwrap();
		assert_eq!(config.mode, InteractionMode::Toast);
		assert_eq!(config.http.unwrap().url, "https://override.example.com");
		assert!(!config.enabled);
	}

	#[test]
	fn env_override_with_bad_mode_fails() {
		let mut config = CrashConfig::default();
		let result = config.apply_overrides(|k| (k == ENV_MODE).then(|| "popup".to_string()));
		assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
	}

	#[test]
	fn report_fields_selection() {
		let default = CrashConfig::default();
		assert_eq!(default.report_fields(), ReportField::DEFAULT.to_vec());

		let mail = CrashConfig {
			mail_to: Some("crashes@example.com".to_string()),
			..Default::default()
		};
		let mut expected = ReportField::MAIL.to_vec();
		expected.sort();
		assert_eq!(mail.report_fields(), expected);

		let custom = CrashConfig {
			fields: vec![ReportField::StackTrace, ReportField::AppVersion, ReportField::StackTrace],
			excluded_fields: vec![ReportField::AppVersion],
			mail_to: Some("crashes@example.com".to_string()),
			..Default::default()
		};
		assert_eq!(custom.report_fields(), vec![ReportField::StackTrace]);
	}

	#[test]
	fn explicit_report_dir_wins() {
		let config = CrashConfig {
			report_dir: Some(PathBuf::from("/tmp/reports")),
			..Default::default()
		};
		assert_eq!(config.resolve_report_dir().unwrap(), PathBuf::from("/tmp/reports"));
	}
}
