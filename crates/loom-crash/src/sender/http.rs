// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_crash_core::{CrashReport, FieldValue, ReportField};
use reqwest::{Client, RequestBuilder, StatusCode};
use tracing::debug;

use super::ReportSender;
use crate::config::{HttpConfig, HttpFormat, HttpMethod};
use crate::error::SendError;
use crate::retry::{retry, RetryConfig};

const SDK_NAME: &str = "loom-crash-rust";
const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Posts reports to an HTTP endpoint.
pub struct HttpSender {
	client: Client,
	config: HttpConfig,
	retry_config: RetryConfig,
}

impl HttpSender {
	pub fn new(config: HttpConfig) -> Result<Self, reqwest::Error> {
		let client = Client::builder()
			.user_agent(format!("{SDK_NAME}/{SDK_VERSION}"))
			.timeout(config.timeout())
			.build()?;
		let retry_config = RetryConfig::with_retries(config.max_retries);
		Ok(Self {
			client,
			config,
			retry_config,
		})
	}

	pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
		self.retry_config = config;
		self
	}

	fn request(&self, report: &CrashReport) -> RequestBuilder {
		let base = self.config.url.trim_end_matches('/');
		let req = match self.config.method {
			HttpMethod::Post => self.client.post(base),
			HttpMethod::Put => {
				let id = report
					.get_text(ReportField::ReportId)
					.map(str::to_string)
					.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
				self.client.put(format!("{base}/{id}"))
			}
		};

		let req = match self.config.format {
			HttpFormat::Json => req.json(&report.to_value()),
			HttpFormat::Form => req.form(&form_fields(report)),
		};

		self.apply_auth(req)
	}

	fn apply_auth(&self, req: RequestBuilder) -> RequestBuilder {
		if let Some(token) = &self.config.auth_token {
			req.bearer_auth(token)
		} else if let Some(login) = &self.config.basic_auth_login {
			req.basic_auth(login, self.config.basic_auth_password.as_ref())
		} else {
			req
		}
	}

	async fn send_once(&self, report: &CrashReport) -> Result<(), SendError> {
		let response = self.request(report).send().await?;
		let status = response.status();
		if status.is_success() {
			return Ok(());
		}

		let message = response.text().await.unwrap_or_default();
		Err(classify(status, message))
	}
}

/// Map a failed response to a send error. Rejected credentials are a
/// configuration problem that a later run may not have, so they are kept.
fn classify(status: StatusCode, message: String) -> SendError {
	match status {
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
			SendError::transient(format!("endpoint rejected credentials ({status})"))
		}
		StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => SendError::Server {
			status: status.as_u16(),
			message,
		},
		s if s.is_client_error() => {
			SendError::permanent(format!("endpoint rejected report ({status}): {message}"))
		}
		s => SendError::Server {
			status: s.as_u16(),
			message,
		},
	}
}

fn form_fields(report: &CrashReport) -> Vec<(&'static str, String)> {
	report
		.iter()
		.map(|(field, value)| {
			let value = match value {
				FieldValue::Text(s) => s.clone(),
				FieldValue::Number(n) => n.to_string(),
				FieldValue::Bool(b) => b.to_string(),
				FieldValue::Object(map) => serde_json::Value::Object(map.clone()).to_string(),
				FieldValue::NotAvailable => String::new(),
			};
			(field.as_str(), value)
		})
		.collect()
}

#[async_trait]
impl ReportSender for HttpSender {
	fn name(&self) -> &str {
		"http"
	}

	async fn send(&self, report: &CrashReport) -> Result<(), SendError> {
		debug!(url = %self.config.url, method = ?self.config.method, "sending crash report");
		retry(&self.retry_config, || self.send_once(report)).await
	}
}
