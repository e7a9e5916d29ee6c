// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Parsed stack traces.

use serde::{Deserialize, Serialize};

/// A single stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
	pub function: Option<String>,
	pub module: Option<String>,
	pub filename: Option<String>,
	pub lineno: Option<u32>,
	/// Whether the frame belongs to application code rather than std or runtime crates.
	pub in_app: bool,
}

/// Frames ordered innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

impl Stacktrace {
	/// First frame in application code.
	pub fn culprit(&self) -> Option<&Frame> {
		self.frames.iter().find(|f| f.in_app)
	}
}
