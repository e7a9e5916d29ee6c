// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Retry with exponential backoff for transport requests.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Errors that know whether a later attempt may succeed.
pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		match self.status() {
			Some(status) => matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504),
			None => self.is_request(),
		}
	}
}

/// Backoff policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	/// Randomize each delay between half and the full computed value.
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(200),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// A config that retries `retries` times after the first attempt.
	pub fn with_retries(retries: u32) -> Self {
		Self {
			max_attempts: retries.saturating_add(1),
			..Self::default()
		}
	}

	/// Delay before attempt number `attempt + 1`, with `attempt` counted from 0.
	pub fn delay_for(&self, attempt: u32) -> Duration {
		let factor = self.backoff_factor.powi(attempt as i32);
		let millis =
			(self.base_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
		let millis = if self.jitter {
			millis * (0.5 + fastrand::f64() * 0.5)
		} else {
			millis
		};
		Duration::from_millis(millis as u64)
	}
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, E>
where
	E: RetryableError + std::fmt::Display,
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
{
	let max_attempts = config.max_attempts.max(1);
	let mut attempt = 0;
	loop {
		match op().await {
			Ok(value) => return Ok(value),
			Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
				let delay = config.delay_for(attempt);
				warn!(
					attempt = attempt + 1,
					max_attempts,
					delay_ms = delay.as_millis() as u64,
					error = %e,
					"request failed, retrying"
				);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(e) => {
				debug!(attempt = attempt + 1, error = %e, "giving up");
				return Err(e);
			}
		}
	}
}
