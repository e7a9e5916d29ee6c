// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the crash reporting client.

use std::path::PathBuf;

use loom_crash_core::{CrashCoreError, ReportField};
use thiserror::Error;

use crate::retry::RetryableError;

/// Errors from the pending-report directory.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("corrupt report {file}: {source}")]
	Corrupt {
		file: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	InvalidName(#[from] CrashCoreError),

	#[error("report not found: {0}")]
	NotFound(String),

	#[error("could not determine a data directory for crash reports")]
	NoDataDir,
}

impl StoreError {
	/// Whether the persisted data itself is broken, as opposed to the filesystem failing.
	pub fn is_structural(&self) -> bool {
		matches!(
			self,
			Self::Corrupt { .. } | Self::Serialization(_) | Self::InvalidName(_)
		)
	}
}

/// Errors from a single field collection.
#[derive(Debug, Error)]
pub enum CollectorError {
	#[error("{collector} failed to collect {field}: {message}")]
	Failed {
		collector: &'static str,
		field: ReportField,
		message: String,
	},

	#[error("{collector} does not support {field}")]
	Unsupported {
		collector: &'static str,
		field: ReportField,
	},

	#[error("{collector} panicked while collecting {field}: {message}")]
	Panicked {
		collector: &'static str,
		field: ReportField,
		message: String,
	},
}

impl CollectorError {
	pub fn failed(collector: &'static str, field: ReportField, message: impl Into<String>) -> Self {
		Self::Failed {
			collector,
			field,
			message: message.into(),
		}
	}
}

/// Errors from a transport.
#[derive(Debug, Error)]
pub enum SendError {
	/// Worth retrying on the next run: network down, server busy.
	#[error("transient send failure: {0}")]
	Transient(String),

	/// The report itself cannot be delivered, now or later.
	#[error("permanent send failure: {0}")]
	Permanent(String),

	#[error("HTTP request failed: {0}")]
	Request(#[from] reqwest::Error),

	#[error("server error (status {status}): {message}")]
	Server { status: u16, message: String },
}

impl SendError {
	pub fn transient(message: impl Into<String>) -> Self {
		Self::Transient(message.into())
	}

	pub fn permanent(message: impl Into<String>) -> Self {
		Self::Permanent(message.into())
	}
}

impl RetryableError for SendError {
	fn is_retryable(&self) -> bool {
		match self {
			Self::Transient(_) => true,
			Self::Permanent(_) => false,
			Self::Request(e) => e.is_retryable(),
			Self::Server { status, .. } => matches!(*status, 408 | 429 | 500 | 502 | 503 | 504),
		}
	}
}

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },

	/// The interaction mode needs a UI resource that is not configured.
	#[error("mode {mode} requires {resource} to be set")]
	MissingResource {
		mode: loom_crash_core::InteractionMode,
		resource: &'static str,
	},
}

impl ConfigError {
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}

/// Errors from [`CrashReporter::init`](crate::CrashReporter::init).
#[derive(Debug, Error)]
pub enum InitError {
	/// A reporter already owns the panic hook in this process.
	#[error("crash reporter is already initialized in this process")]
	AlreadyInitialized,

	#[error("invalid crash reporter configuration: {0}")]
	Config(#[from] ConfigError),

	#[error("crash report store unavailable: {0}")]
	Store(#[from] StoreError),

	#[error("failed to start the report sender: {0}")]
	Worker(std::io::Error),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
