//! Summary-file inspection for parallel runs.
//!
//! A parallel simulation flushes its unified summary file (`<base>.UNSMRY`)
//! from several ranks, and the file may still be growing when the launcher
//! exits. Before declaring the run complete, the record count is polled
//! until it holds steady across two consecutive polls. A run that never
//! produces a summary (a NOSIM dry run, for instance) simply times out and
//! is accepted as-is.
//!
//! The summary is a sequence of big-endian Fortran unformatted records:
//! each record is framed by a 4-byte length before and after the payload,
//! and every data vector starts with a 16-byte keyword header (8-character
//! keyword, element count, type tag). One `PARAMS` header per report
//! ministep, so the number of `PARAMS` headers is the record count.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::Instant;

const KEYWORD_HEADER_LEN: usize = 16;
const PARAMS_KEYWORD: &[u8; 8] = b"PARAMS  ";

/// Path of the unified summary file for a case.
pub fn summary_file(run_path: &Path, base_name: &str) -> PathBuf {
    run_path.join(format!("{base_name}.UNSMRY"))
}

/// Count the data records in a summary byte stream. Returns `None` for a
/// stream that is torn mid-record (still being written) or not framed as
/// Fortran records at all; the caller treats both as "not ready yet".
pub fn count_records(buf: &[u8]) -> Option<usize> {
    let mut offset = 0usize;
    let mut count = 0usize;
    while offset < buf.len() {
        if offset + 4 > buf.len() {
            return None;
        }
        let len = u32::from_be_bytes(buf[offset..offset + 4].try_into().ok()?) as usize;
        let end = offset + 4 + len + 4;
        if end > buf.len() {
            return None;
        }
        let trailer =
            u32::from_be_bytes(buf[end - 4..end].try_into().ok()?) as usize;
        if trailer != len {
            return None;
        }
        if len == KEYWORD_HEADER_LEN && &buf[offset + 4..offset + 12] == PARAMS_KEYWORD {
            count += 1;
        }
        offset = end;
    }
    Some(count)
}

/// Record count of the summary file, or `None` while it is absent or torn.
pub fn record_count(path: &Path) -> Option<usize> {
    let buf = std::fs::read(path).ok()?;
    count_records(&buf)
}

/// Poll the summary file until its record count is non-zero and stable
/// across two consecutive polls, returning that count. A timeout returns
/// `None` and is never an error: a dry run produces no summary at all.
pub async fn await_stable(
    path: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Option<usize> {
    let start = Instant::now();
    let mut prev_count = 0usize;
    loop {
        if start.elapsed() > timeout {
            tracing::debug!(path = %path.display(), "summary file did not stabilize");
            return None;
        }

        tokio::time::sleep(poll_interval).await;

        let Some(count) = record_count(path) else {
            continue;
        };
        // Zero records means the simulator has not started reporting yet.
        if count == 0 {
            continue;
        }
        if prev_count == count {
            tracing::debug!(records = count, "summary file stabilized");
            return Some(count);
        }
        prev_count = count;
    }
}
