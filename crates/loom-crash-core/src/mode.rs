// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! How much the user is involved before a report is sent.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CrashCoreError;

/// Interaction mode, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
	/// Send without telling the user.
	#[default]
	Silent,
	/// Send, and show a transient message.
	Toast,
	/// Ask through a notification; the user opens it to accept or decline.
	Notification,
	/// Ask through a modal dialog.
	Dialog,
}

impl InteractionMode {
	/// Whether reports captured in this mode wait for the user.
	pub fn requires_approval(&self) -> bool {
		matches!(self, Self::Notification | Self::Dialog)
	}
}

impl fmt::Display for InteractionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Silent => write!(f, "silent"),
			Self::Toast => write!(f, "toast"),
			Self::Notification => write!(f, "notification"),
			Self::Dialog => write!(f, "dialog"),
		}
	}
}

impl FromStr for InteractionMode {
	type Err = CrashCoreError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"silent" => Ok(Self::Silent),
			"toast" => Ok(Self::Toast),
			"notification" => Ok(Self::Notification),
			"dialog" => Ok(Self::Dialog),
			_ => Err(CrashCoreError::InvalidMode(s.to_string())),
		}
	}
}
