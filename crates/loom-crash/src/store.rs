// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! File-backed queue of pending crash reports.
//!
//! One JSON file per report. The file name carries the creation timestamp
//! and the approval state (see [`ReportFile`]), so listing the directory is
//! enough to recover every report's position in the lifecycle after a
//! restart. The store is synchronous: it is called from the panic hook,
//! where no runtime can be relied on.

use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use loom_crash_core::{CrashReport, ReportFile, ReportStatus, REPORT_EXTENSION};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CrashConfig;
use crate::error::{Result, StoreError};

/// Write `contents` and flush them to disk before returning.
fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
	let mut file = File::create(path)?;
	file.write_all(contents)?;
	file.sync_all()
}

const LAST_VERSION_FILE: &str = "last_version";
const INSTALLATION_FILE: &str = "installation";

pub struct ReportStore {
	dir: PathBuf,
	last_millis: AtomicI64,
}

impl ReportStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: dir.into(),
			last_millis: AtomicI64::new(0),
		}
	}

	/// Open the store at the configured directory, creating it if needed.
	pub fn from_config(config: &CrashConfig) -> Result<Self> {
		let dir = config.resolve_report_dir()?;
		std::fs::create_dir_all(&dir)?;
		info!(report_dir = %dir.display(), "opened crash report store");
		Ok(Self::new(dir))
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Directory for reporter state that is not a report: the parent of the
	/// report directory, so listing reports never trips over it.
	fn state_dir(&self) -> &Path {
		self.dir.parent().unwrap_or(&self.dir)
	}

	/// Where the installation id is kept.
	pub fn installation_file(&self) -> PathBuf {
		self.state_dir().join(INSTALLATION_FILE)
	}

	fn path(&self, file: &ReportFile) -> PathBuf {
		self.dir.join(file.file_name())
	}

	/// A creation timestamp strictly greater than any handed out before and
	/// not used by any file on disk, so name order stays creation order.
	/// Each value is reserved atomically, so concurrent callers never share one.
	fn next_timestamp(&self) -> i64 {
		let now = Utc::now().timestamp_millis();
		let mut last = self.last_millis.load(Ordering::SeqCst);
		loop {
			let candidate = now.max(last + 1);
			match self.last_millis.compare_exchange(
				last,
				candidate,
				Ordering::SeqCst,
				Ordering::SeqCst,
			) {
				Ok(_) if self.timestamp_taken(candidate) => last = candidate,
				Ok(_) => return candidate,
				Err(actual) => last = actual,
			}
		}
	}

	fn timestamp_taken(&self, millis: i64) -> bool {
		[ReportStatus::New, ReportStatus::Approved, ReportStatus::Silent]
			.into_iter()
			.any(|status| self.path(&ReportFile::new(millis, status)).exists())
	}

	/// Persist `report`. With `existing`, overwrite that file in place;
	/// otherwise create a new file, silent if the report is silent.
	pub fn save(&self, report: &CrashReport, existing: Option<&ReportFile>) -> Result<ReportFile> {
		std::fs::create_dir_all(&self.dir)?;

		let file = match existing {
			Some(file) => *file,
			None => {
				let status = if report.is_silent() {
					ReportStatus::Silent
				} else {
					ReportStatus::New
				};
				ReportFile::new(self.next_timestamp(), status)
			}
		};

		let json = serde_json::to_vec_pretty(report)?;
		self.write_atomic(&file, &json)?;

		debug!(file = %file, fields = report.len(), "saved crash report");
		Ok(file)
	}

	fn write_atomic(&self, file: &ReportFile, contents: &[u8]) -> Result<()> {
		let path = self.path(file);
		let tmp_path = self
			.dir
			.join(format!(".{}.{}.tmp", file.file_name(), Uuid::now_v7()));
		if let Err(e) = write_synced(&tmp_path, contents) {
			let _ = std::fs::remove_file(&tmp_path);
			return Err(e.into());
		}
		if let Err(e) = std::fs::rename(&tmp_path, &path) {
			let _ = std::fs::remove_file(&tmp_path);
			return Err(e.into());
		}
		Ok(())
	}

	/// Pending reports, oldest first. A missing directory has no reports.
	pub fn list_pending(&self) -> Result<Vec<ReportFile>> {
		let entries = match std::fs::read_dir(&self.dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		let mut files = Vec::new();
		for entry in entries {
			let entry = entry?;
			let name = entry.file_name();
			let Some(name) = name.to_str() else {
				continue;
			};
			if !name.ends_with(REPORT_EXTENSION) || name.starts_with('.') {
				continue;
			}
			match name.parse::<ReportFile>() {
				Ok(file) => files.push(file),
				Err(e) => warn!(
					file = name,
					error = %e,
					"ignoring unrecognized file in report directory"
				),
			}
		}

		files.sort();
		Ok(files)
	}

	/// Read a report. Its silent flag is restored from the file name.
	pub fn load(&self, file: &ReportFile) -> Result<CrashReport> {
		let contents = match std::fs::read(self.path(file)) {
			Ok(contents) => contents,
			Err(e) if e.kind() == ErrorKind::NotFound => {
				return Err(StoreError::NotFound(file.file_name()))
			}
			Err(e) => return Err(e.into()),
		};

		let mut report: CrashReport =
			serde_json::from_slice(&contents).map_err(|source| StoreError::Corrupt {
				file: file.file_name(),
				source,
			})?;
		report.set_silent(file.is_silent());
		Ok(report)
	}

	/// Remove a report. Returns false if it was already gone.
	pub fn delete(&self, file: &ReportFile) -> Result<bool> {
		match std::fs::remove_file(self.path(file)) {
			Ok(()) => {
				debug!(file = %file, "deleted crash report");
				Ok(true)
			}
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	/// Rename to the approved name. A no-op for approved and silent files,
	/// and for a file some earlier call already renamed.
	pub fn mark_approved(&self, file: &ReportFile) -> Result<ReportFile> {
		let approved = file.approved();
		if approved == *file {
			return Ok(approved);
		}

		match std::fs::rename(self.path(file), self.path(&approved)) {
			Ok(()) => {
				debug!(from = %file, to = %approved, "approved crash report");
				Ok(approved)
			}
			Err(e) if e.kind() == ErrorKind::NotFound && self.path(&approved).exists() => {
				Ok(approved)
			}
			Err(e) if e.kind() == ErrorKind::NotFound => {
				Err(StoreError::NotFound(file.file_name()))
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Approve every pending report. Returns the pending list after approval, oldest first.
	pub fn approve_all(&self) -> Result<Vec<ReportFile>> {
		let mut approved = Vec::new();
		for file in self.list_pending()? {
			approved.push(self.mark_approved(&file)?);
		}
		Ok(approved)
	}

	/// Remove every pending report. Returns how many were removed.
	pub fn delete_all(&self) -> Result<usize> {
		let mut deleted = 0;
		for file in self.list_pending()? {
			if self.delete(&file)? {
				deleted += 1;
			}
		}
		Ok(deleted)
	}

	/// Remove unapproved reports, keeping the `keep` most recent ones.
	/// Returns how many were removed.
	pub fn delete_unapproved(&self, keep: usize) -> Result<usize> {
		let unapproved: Vec<ReportFile> = self
			.list_pending()?
			.into_iter()
			.filter(|f| !f.is_approved())
			.collect();
		let excess = unapproved.len().saturating_sub(keep);

		let mut deleted = 0;
		for file in &unapproved[..excess] {
			if self.delete(file)? {
				deleted += 1;
			}
		}
		if deleted > 0 {
			info!(deleted, kept = unapproved.len() - excess, "purged unapproved crash reports");
		}
		Ok(deleted)
	}

	/// The most recent report still waiting for the user. Silent reports never wait.
	pub fn latest_non_silent(&self) -> Result<Option<ReportFile>> {
		Ok(self
			.list_pending()?
			.into_iter()
			.rev()
			.find(|f| !f.is_silent() && !f.is_approved()))
	}

	/// The application version recorded by the previous start, if any.
	pub fn last_version(&self) -> Result<Option<String>> {
		match std::fs::read_to_string(self.state_dir().join(LAST_VERSION_FILE)) {
			Ok(version) => Ok(Some(version.trim().to_string())),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	pub fn set_last_version(&self, version: &str) -> Result<()> {
		let state_dir = self.state_dir();
		std::fs::create_dir_all(state_dir)?;
		let path = state_dir.join(LAST_VERSION_FILE);
		let tmp_path = state_dir.join(format!(".{LAST_VERSION_FILE}.tmp"));
		std::fs::write(&tmp_path, version)?;
		std::fs::rename(&tmp_path, &path)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_crash_core::{FieldValue, ReportField};
	use proptest::prelude::*;
	use serde_json::json;
	use std::collections::HashSet;
	use std::sync::{Arc, Barrier};
	use tempfile::TempDir;

	fn store() -> (TempDir, ReportStore) {
		let tmp = TempDir::new().unwrap();
		let store = ReportStore::new(tmp.path().join("crash-reports"));
		(tmp, store)
	}

	fn sample_report() -> CrashReport {
		let mut report = CrashReport::new();
		report.put(ReportField::StackTrace, "thread 'main' panicked");
		report.put(ReportField::TotalMemSize, 16_000_000u64);
		report.put(ReportField::IsSilent, false);
		report.put(
			ReportField::OsInfo,
			FieldValue::from(json!({"os": "linux", "arch": "x86_64"})),
		);
		report.put_not_available(ReportField::Hostname);
		report
	}

	#[test]
	fn save_then_load_round_trips() {
		let (_tmp, store) = store();
		let report = sample_report();
		let file = store.save(&report, None).unwrap();
		assert_eq!(file.status(), ReportStatus::New);
		assert_eq!(store.load(&file).unwrap(), report);
	}

	#[test]
	fn silent_report_is_saved_silent_and_loads_silent() {
		let (_tmp, store) = store();
		let mut report = sample_report();
		report.set_silent(true);
		let file = store.save(&report, None).unwrap();
		assert!(file.is_silent());
		assert!(file.is_approved());
		assert!(store.load(&file).unwrap().is_silent());
	}

	#[test]
	fn concurrent_saves_all_persist() {
		const THREADS: usize = 16;
		let (_tmp, store) = store();
		let store = Arc::new(store);

		for round in 0..20 {
			let barrier = Arc::new(Barrier::new(THREADS));
			let handles: Vec<_> = (0..THREADS)
				.map(|i| {
					let store = store.clone();
					let barrier = barrier.clone();
					std::thread::spawn(move || {
						let mut report = sample_report();
						report.put(ReportField::UserComment, format!("{round}-{i}"));
						barrier.wait();
						store.save(&report, None).unwrap()
					})
				})
				.collect();
			let saved: HashSet<ReportFile> =
				handles.into_iter().map(|h| h.join().unwrap()).collect();
			assert_eq!(saved.len(), THREADS);
		}

		let pending = store.list_pending().unwrap();
		assert_eq!(pending.len(), THREADS * 20);
		let seqs: HashSet<String> = pending
			.iter()
			.map(|file| {
				let report = store.load(file).unwrap();
				report.get_text(ReportField::UserComment).unwrap().to_string()
			})
			.collect();
		assert_eq!(seqs.len(), THREADS * 20);

		let leftovers = std::fs::read_dir(store.dir())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
			.count();
		assert_eq!(leftovers, 0);
	}

	#[test]
	fn names_follow_creation_order() {
		let (_tmp, store) = store();
		let saved: Vec<ReportFile> = (0..20)
			.map(|_| store.save(&sample_report(), None).unwrap())
			.collect();
		assert_eq!(store.list_pending().unwrap(), saved);
	}

	#[test]
	fn save_with_existing_overwrites_in_place() {
		let (_tmp, store) = store();
		let file = store.save(&sample_report(), None).unwrap();

		let mut updated = store.load(&file).unwrap();
		updated.merge_user_input(Some("it froze"), Some("dev@example.com"));
		let same = store.save(&updated, Some(&file)).unwrap();

		assert_eq!(same, file);
		assert_eq!(store.list_pending().unwrap().len(), 1);
		assert_eq!(
			store.load(&file).unwrap().get_text(ReportField::UserComment),
			Some("it froze")
		);
	}

	#[test]
	fn mark_approved_is_idempotent() {
		let (_tmp, store) = store();
		let file = store.save(&sample_report(), None).unwrap();

		let first = store.mark_approved(&file).unwrap();
		let second = store.mark_approved(&first).unwrap();
		let stale = store.mark_approved(&file).unwrap();

		assert_eq!(first, second);
		assert_eq!(first, stale);
		assert_eq!(store.list_pending().unwrap(), vec![first]);
		assert!(first.file_name().ends_with("-approved.stacktrace"));
	}

	#[test]
	fn mark_approved_missing_file_is_not_found() {
		let (_tmp, store) = store();
		let file = ReportFile::new(1, ReportStatus::New);
		assert!(matches!(store.mark_approved(&file), Err(StoreError::NotFound(_))));
	}

	#[test]
	fn delete_reports_whether_file_existed() {
		let (_tmp, store) = store();
		let file = store.save(&sample_report(), None).unwrap();
		assert!(store.delete(&file).unwrap());
		assert!(!store.delete(&file).unwrap());
	}

	#[test]
	fn corrupt_file_is_structural() {
		let (_tmp, store) = store();
		let file = store.save(&sample_report(), None).unwrap();
		std::fs::write(store.dir().join(file.file_name()), "{ not json").unwrap();
		let err = store.load(&file).unwrap_err();
		assert!(err.is_structural(), "{err}");
	}

	#[test]
	fn list_ignores_foreign_and_temp_files() {
		let (_tmp, store) = store();
		let file = store.save(&sample_report(), None).unwrap();
		std::fs::write(store.dir().join("notes.txt"), "x").unwrap();
		std::fs::write(store.dir().join(".0000000000001.stacktrace.tmp"), "x").unwrap();
		std::fs::write(store.dir().join("garbage.stacktrace"), "x").unwrap();
		assert_eq!(store.list_pending().unwrap(), vec![file]);
	}

	#[test]
	fn missing_directory_lists_nothing() {
		let (_tmp, store) = store();
		assert!(store.list_pending().unwrap().is_empty());
	}

	#[test]
	fn delete_unapproved_keeps_most_recent() {
		let (_tmp, store) = store();
		let mut unapproved = Vec::new();
		for _ in 0..4 {
			unapproved.push(store.save(&sample_report(), None).unwrap());
		}
		let mut silent = sample_report();
		silent.set_silent(true);
		let silent = store.save(&silent, None).unwrap();

		assert_eq!(store.delete_unapproved(1).unwrap(), 3);
		assert_eq!(store.list_pending().unwrap(), vec![unapproved[3], silent]);
	}

	#[test]
	fn latest_non_silent_skips_silent_and_approved() {
		let (_tmp, store) = store();
		let older = store.save(&sample_report(), None).unwrap();
		let newer = store.save(&sample_report(), None).unwrap();
		let mut silent = sample_report();
		silent.set_silent(true);
		store.save(&silent, None).unwrap();

		assert_eq!(store.latest_non_silent().unwrap(), Some(newer));
		store.mark_approved(&newer).unwrap();
		assert_eq!(store.latest_non_silent().unwrap(), Some(older));
	}

	#[test]
	fn approve_all_then_delete_all() {
		let (_tmp, store) = store();
		for _ in 0..3 {
			store.save(&sample_report(), None).unwrap();
		}
		let approved = store.approve_all().unwrap();
		assert!(approved.iter().all(ReportFile::is_approved));
		assert_eq!(store.delete_all().unwrap(), 3);
		assert!(store.list_pending().unwrap().is_empty());
	}

	#[test]
	fn last_version_round_trip() {
		let (_tmp, store) = store();
		assert_eq!(store.last_version().unwrap(), None);
		store.set_last_version("1.2.3").unwrap();
		assert_eq!(store.last_version().unwrap().as_deref(), Some("1.2.3"));
	}

	#[test]
	fn state_files_live_outside_report_dir() {
		let (tmp, store) = store();
		assert_eq!(store.installation_file(), tmp.path().join("installation"));
	}

	fn arb_value() -> impl Strategy<Value = FieldValue> {
		prop_oneof![
			"[a-zA-Z0-9 \n]{0,40}".prop_map(FieldValue::Text),
			any::<u32>().prop_map(|n| FieldValue::from(n as u64)),
			any::<bool>().prop_map(FieldValue::Bool),
			Just(FieldValue::NotAvailable),
			("[a-z]{1,8}", "[a-z]{0,8}").prop_map(|(k, v)| {
				let mut map = serde_json::Map::new();
				map.insert(k, json!({ "nested": v, "values": [1, 2] }));
				FieldValue::Object(map)
			}),
		]
	}

	proptest! {
		#[test]
		fn load_of_save_is_identity(
			values in proptest::collection::vec(arb_value(), 1..ReportField::ALL.len()),
			silent in any::<bool>(),
		) {
			let (_tmp, store) = store();
			let mut report = CrashReport::new();
			for (field, value) in ReportField::ALL.iter().zip(values) {
				report.put(*field, value);
			}
			report.set_silent(silent);

			let file = store.save(&report, None).unwrap();
			prop_assert_eq!(store.load(&file).unwrap(), report);
		}
	}
}
