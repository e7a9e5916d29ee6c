// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use loom_crash_core::{CrashReport, ReportField};
use tracing::info;
use url::{form_urlencoded, Url};

use super::ReportSender;
use crate::error::SendError;

/// Mail clients truncate or refuse longer URLs.
const MAX_BODY_CHARS: usize = 8_000;

type Opener = Box<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Hands the report to the desktop mail client as a `mailto:` link.
///
/// Delivery counts as successful once the mail client opened; whether the
/// user actually sends the message is out of our hands.
pub struct MailtoSender {
	to: String,
	opener: Opener,
}

impl MailtoSender {
	pub fn new(to: impl Into<String>) -> Self {
		Self::with_opener(to, |url| webbrowser::open(url))
	}

	pub fn with_opener<F>(to: impl Into<String>, opener: F) -> Self
	where
		F: Fn(&str) -> std::io::Result<()> + Send + Sync + 'static,
	{
		Self {
			to: to.into(),
			opener: Box::new(opener),
		}
	}

	pub fn mailto_url(&self, report: &CrashReport) -> Result<Url, SendError> {
		let app = report.get_text(ReportField::AppName).unwrap_or("Application");
		let subject = format!("{app} crash report");
		let body: String = report.to_text().chars().take(MAX_BODY_CHARS).collect();

		let url = format!(
			"mailto:{}?subject={}&body={}",
			self.to,
			encode(&subject),
			encode(&body)
		);
		Url::parse(&url).map_err(|e| SendError::permanent(format!("invalid mailto url: {e}")))
	}
}

/// Percent-encode for a mailto header value. Spaces must be `%20`, not `+`.
fn encode(value: &str) -> String {
	form_urlencoded::byte_serialize(value.as_bytes())
		.collect::<String>()
		.replace('+', "%20")
}

#[async_trait]
impl ReportSender for MailtoSender {
	fn name(&self) -> &str {
		"mailto"
	}

	async fn send(&self, report: &CrashReport) -> Result<(), SendError> {
		let url = self.mailto_url(report)?;
		(self.opener)(url.as_str())
			.map_err(|e| SendError::transient(format!("failed to open mail client: {e}")))?;
		info!(to = %self.to, "opened crash report in mail client");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::{Arc, Mutex};

	fn report() -> CrashReport {
		let mut report = CrashReport::new();
		report.put(ReportField::AppName, "loom");
		report.put(ReportField::StackTrace, "thread 'main' panicked at a+b");
		report
	}

	#[test]
	fn builds_encoded_mailto_url() {
		let sender = MailtoSender::with_opener("crashes@example.com", |_| Ok(()));
		let url = sender.mailto_url(&report()).unwrap();
		let url = url.as_str();
		assert!(url.starts_with("mailto:crashes@example.com?subject=loom%20crash%20report"));
		assert!(url.contains("a%2Bb"));
		assert!(!url.contains(' '));
	}

	#[tokio::test]
	async fn send_opens_mail_client() {
		let opened = Arc::new(Mutex::new(Vec::new()));
		let seen = opened.clone();
		let sender = MailtoSender::with_opener("crashes@example.com", move |url| {
			seen.lock().unwrap().push(url.to_string());
			Ok(())
		});

		sender.send(&report()).await.unwrap();
		assert_eq!(opened.lock().unwrap().len(), 1);
	}

	#[tokio::test]
	async fn opener_failure_is_transient() {
		let sender = MailtoSender::with_opener("crashes@example.com", |_| {
			Err(std::io::Error::other("no mail client"))
		});
		let err = sender.send(&report()).await.unwrap_err();
		assert!(matches!(err, SendError::Transient(_)));
	}
}
