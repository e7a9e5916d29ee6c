// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The crash report: an ordered mapping from field to typed value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::field::ReportField;

/// A typed value recorded for one report field.
///
/// `NotAvailable` marks a field that was requested but could not be
/// collected. It is encoded as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
	Text(String),
	Number(Number),
	Bool(bool),
	Object(Map<String, Value>),
	NotAvailable,
}

impl FieldValue {
	pub fn text(s: impl Into<String>) -> Self {
		Self::Text(s.into())
	}

	pub fn is_available(&self) -> bool {
		!matches!(self, Self::NotAvailable)
	}

	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Text(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Map<String, Value>> {
		match self {
			Self::Object(map) => Some(map),
			_ => None,
		}
	}
}

impl From<Value> for FieldValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::NotAvailable,
			Value::Bool(b) => Self::Bool(b),
			Value::Number(n) => Self::Number(n),
			Value::String(s) => Self::Text(s),
			Value::Object(map) => Self::Object(map),
			// Arrays only appear nested inside objects; a bare array is wrapped
			// so the field stays an object-shaped value.
			Value::Array(items) => {
				let mut map = Map::new();
				map.insert("items".to_string(), Value::Array(items));
				Self::Object(map)
			}
		}
	}
}

impl From<FieldValue> for Value {
	fn from(value: FieldValue) -> Self {
		match value {
			FieldValue::Text(s) => Value::String(s),
			FieldValue::Number(n) => Value::Number(n),
			FieldValue::Bool(b) => Value::Bool(b),
			FieldValue::Object(map) => Value::Object(map),
			FieldValue::NotAvailable => Value::Null,
		}
	}
}

impl From<&str> for FieldValue {
	fn from(s: &str) -> Self {
		Self::Text(s.to_string())
	}
}

impl From<String> for FieldValue {
	fn from(s: String) -> Self {
		Self::Text(s)
	}
}

impl From<bool> for FieldValue {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<u64> for FieldValue {
	fn from(n: u64) -> Self {
		Self::Number(n.into())
	}
}

impl From<i64> for FieldValue {
	fn from(n: i64) -> Self {
		Self::Number(n.into())
	}
}

impl From<Map<String, Value>> for FieldValue {
	fn from(map: Map<String, Value>) -> Self {
		Self::Object(map)
	}
}

/// One crash report.
///
/// The silent flag is not a serialized field: it travels in the report file
/// name, and is restored from it on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrashReport {
	fields: BTreeMap<ReportField, FieldValue>,
	#[serde(skip)]
	silent: bool,
}

impl CrashReport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn silent() -> Self {
		Self {
			fields: BTreeMap::new(),
			silent: true,
		}
	}

	pub fn is_silent(&self) -> bool {
		self.silent
	}

	pub fn set_silent(&mut self, silent: bool) {
		self.silent = silent;
	}

	pub fn put(&mut self, field: ReportField, value: impl Into<FieldValue>) {
		self.fields.insert(field, value.into());
	}

	pub fn put_not_available(&mut self, field: ReportField) {
		self.fields.insert(field, FieldValue::NotAvailable);
	}

	pub fn get(&self, field: ReportField) -> Option<&FieldValue> {
		self.fields.get(&field)
	}

	pub fn get_text(&self, field: ReportField) -> Option<&str> {
		self.get(field).and_then(FieldValue::as_text)
	}

	pub fn contains(&self, field: ReportField) -> bool {
		self.fields.contains_key(&field)
	}

	pub fn remove(&mut self, field: ReportField) -> Option<FieldValue> {
		self.fields.remove(&field)
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Iterates fields in declaration order.
	pub fn iter(&self) -> impl Iterator<Item = (ReportField, &FieldValue)> {
		self.fields.iter().map(|(field, value)| (*field, value))
	}

	/// Merges the late-bound fields a user provides after the crash.
	///
	/// Only `USER_COMMENT` and `USER_EMAIL` may change after persistence.
	pub fn merge_user_input(&mut self, comment: Option<&str>, email: Option<&str>) {
		if let Some(comment) = comment {
			self.put(ReportField::UserComment, comment);
		}
		if let Some(email) = email {
			self.put(ReportField::UserEmail, email);
		}
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	pub fn to_value(&self) -> Value {
		Value::Object(
			self
				.fields
				.iter()
				.map(|(field, value)| (field.as_str().to_string(), Value::from(value.clone())))
				.collect(),
		)
	}

	pub fn from_json(json: &str) -> Result<Self> {
		Ok(serde_json::from_str(json)?)
	}

	/// Renders the report as `FIELD=value` lines, for human-read transports.
	pub fn to_text(&self) -> String {
		let mut out = String::new();
		for (field, value) in self.iter() {
			let rendered = match value {
				FieldValue::Text(s) => s.clone(),
				FieldValue::Number(n) => n.to_string(),
				FieldValue::Bool(b) => b.to_string(),
				FieldValue::Object(map) => serde_json::to_string_pretty(map).unwrap_or_default(),
				FieldValue::NotAvailable => "N/A".to_string(),
			};
			out.push_str(field.as_str());
			out.push('=');
			out.push_str(&rendered);
			out.push('\n');
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::json;

	fn sample_report() -> CrashReport {
		let mut report = CrashReport::new();
		report.put(ReportField::StackTrace, "panicked at src/main.rs:3:5: boom");
		report.put(ReportField::TotalMemSize, 16_000_000u64);
		report.put(ReportField::IsSilent, false);
		report.put_not_available(ReportField::Hostname);
		let mut os = Map::new();
		os.insert("name".to_string(), json!("linux"));
		os.insert("arch".to_string(), json!("x86_64"));
		os.insert("nested".to_string(), json!({ "a": [1, 2, 3] }));
		report.put(ReportField::OsInfo, os);
		report
	}

	#[test]
	fn serializes_as_object_keyed_by_field_name() {
		let value: Value = serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();
		assert_eq!(value["STACK_TRACE"], json!("panicked at src/main.rs:3:5: boom"));
		assert_eq!(value["HOSTNAME"], Value::Null);
		assert_eq!(value["OS_INFO"]["arch"], json!("x86_64"));
	}

	#[test]
	fn json_roundtrip_preserves_all_value_kinds() {
		let report = sample_report();
		let parsed = CrashReport::from_json(&report.to_json().unwrap()).unwrap();
		assert_eq!(parsed, report);
		assert_eq!(parsed.get(ReportField::Hostname), Some(&FieldValue::NotAvailable));
	}

	#[test]
	fn to_value_matches_serialized_form() {
		let report = sample_report();
		let from_json: Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
		assert_eq!(report.to_value(), from_json);
	}

	#[test]
	fn iteration_follows_declaration_order() {
		let mut report = CrashReport::new();
		report.put(ReportField::UserEmail, "a@b.c");
		report.put(ReportField::ReportId, "id");
		report.put(ReportField::StackTrace, "trace");
		let order: Vec<_> = report.iter().map(|(f, _)| f).collect();
		assert_eq!(
			order,
			vec![ReportField::ReportId, ReportField::StackTrace, ReportField::UserEmail]
		);
	}

	#[test]
	fn unknown_key_is_rejected() {
		let result = CrashReport::from_json(r#"{"NOT_A_FIELD": 1}"#);
		assert!(result.is_err());
	}

	#[test]
	fn merge_user_input_sets_late_bound_fields() {
		let mut report = sample_report();
		report.merge_user_input(Some("it crashed when saving"), None);
		assert_eq!(
			report.get_text(ReportField::UserComment),
			Some("it crashed when saving")
		);
		assert!(!report.contains(ReportField::UserEmail));
	}

	#[test]
	fn text_rendering_marks_missing_values() {
		let text = sample_report().to_text();
		assert!(text.contains("HOSTNAME=N/A\n"));
		assert!(text.contains("IS_SILENT=false\n"));
	}

	fn leaf_value() -> impl Strategy<Value = Value> {
		prop_oneof![
			Just(Value::Null),
			any::<bool>().prop_map(Value::Bool),
			any::<i64>().prop_map(|n| json!(n)),
			"[a-zA-Z0-9 :/._-]{0,24}".prop_map(Value::String),
		]
	}

	fn field_value() -> impl Strategy<Value = FieldValue> {
		let nested = leaf_value().prop_recursive(3, 24, 4, |inner| {
			prop_oneof![
				prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
				prop::collection::btree_map("[a-z]{1,8}", inner, 0..4)
					.prop_map(|m| Value::Object(m.into_iter().collect())),
			]
		});
		prop_oneof![
			Just(FieldValue::NotAvailable),
			any::<bool>().prop_map(FieldValue::Bool),
			any::<i64>().prop_map(FieldValue::from),
			".{0,40}".prop_map(FieldValue::Text),
			prop::collection::btree_map("[a-z]{1,8}", nested, 0..4)
				.prop_map(|m| FieldValue::Object(m.into_iter().collect())),
		]
	}

	proptest! {
		#[test]
		fn report_json_roundtrip(
			entries in prop::collection::vec(
				(prop::sample::select(ReportField::ALL.to_vec()), field_value()),
				0..12,
			)
		) {
			let mut report = CrashReport::new();
			for (field, value) in entries {
				report.put(field, value);
			}
			let parsed = CrashReport::from_json(&report.to_json().unwrap()).unwrap();
			prop_assert_eq!(parsed, report);
		}
	}
}
