// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Stack trace hashing, so the collector can group reports of the same crash.

use sha2::{Digest, Sha256};

use crate::stacktrace::Stacktrace;

/// Number of frames that contribute to the hash.
const HASHED_FRAMES: usize = 5;

/// Compute a stable hash for a crash.
///
/// The hash covers the exception type and the top in-app frames (function
/// and module). Line numbers and the message are left out so that the same
/// crash hashes identically across builds and inputs. Falls back to the top
/// frames of any kind when no frame is in-app.
pub fn stack_trace_hash(exception_type: &str, stacktrace: &Stacktrace) -> String {
	let mut hasher = Sha256::new();

	hasher.update(exception_type.as_bytes());
	hasher.update(b"|");

	let in_app_frames: Vec<_> = stacktrace
		.frames
		.iter()
		.filter(|f| f.in_app)
		.take(HASHED_FRAMES)
		.collect();

	for frame in &in_app_frames {
		if let Some(func) = &frame.function {
			hasher.update(func.as_bytes());
		}
		hasher.update(b"@");
		if let Some(module) = &frame.module {
			hasher.update(module.as_bytes());
		}
		hasher.update(b"|");
	}

	if in_app_frames.is_empty() {
		for frame in stacktrace.frames.iter().take(HASHED_FRAMES) {
			if let Some(func) = &frame.function {
				hasher.update(func.as_bytes());
			}
			hasher.update(b"|");
		}
	}

	hex::encode(hasher.finalize())
}

/// Truncate a string to at most `max_len` bytes, keeping the tail.
///
/// Used for log excerpts, where the last lines are the interesting ones.
pub fn truncate_head(s: &str, max_len: usize) -> &str {
	if s.len() <= max_len {
		return s;
	}
	let mut start = s.len() - max_len;
	while !s.is_char_boundary(start) {
		start += 1;
	}
	&s[start..]
}
