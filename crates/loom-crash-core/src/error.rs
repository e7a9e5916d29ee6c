// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for crash report data.

use thiserror::Error;

/// Errors that can occur while parsing or encoding crash report data.
#[derive(Debug, Error)]
pub enum CrashCoreError {
	#[error("invalid report file name: {0}")]
	InvalidFileName(String),

	#[error("unknown report field: {0}")]
	UnknownField(String),

	#[error("invalid interaction mode: {0}")]
	InvalidMode(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for crash report data operations.
pub type Result<T> = std::result::Result<T, CrashCoreError>;
