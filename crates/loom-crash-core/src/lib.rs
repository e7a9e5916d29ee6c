// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom crash reporting client.
//!
//! This crate holds the data shared by the client runtime (`loom-crash`)
//! and anything that reads persisted reports:
//! - [`ReportField`] and [`FieldValue`], the vocabulary of a [`CrashReport`]
//! - [`ReportStatus`] and [`ReportFile`], the file-name encoded state of a
//!   pending report
//! - [`InteractionMode`], the user-involvement policy
//! - stack trace types and hashing

pub mod error;
pub mod field;
pub mod fingerprint;
pub mod mode;
pub mod report;
pub mod stacktrace;
pub mod status;

pub use error::{CrashCoreError, Result};
pub use field::ReportField;
pub use fingerprint::{stack_trace_hash, truncate_head};
pub use mode::InteractionMode;
pub use report::{CrashReport, FieldValue};
pub use stacktrace::{Frame, Stacktrace};
pub use status::{ReportFile, ReportStatus, APPROVED_SUFFIX, REPORT_EXTENSION, SILENT_SUFFIX};
