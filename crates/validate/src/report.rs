//! Cleaning diagnostics. Cleaners return these; callers decide what to log.

use metadata::Cell;
use serde::Serialize;
use tracing::{info, warn};

/// Rows (input positions) sharing the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    pub key: Vec<Cell>,
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub rows_in: u64,
    pub rows_out: u64,
    pub dropped_missing_id: u64,
    pub dropped_duplicates: u64,
    /// Groups of rows with the same identifier tuple; all but the first were dropped.
    pub id_duplicates: Vec<DuplicateGroup>,
    /// Kept rows sharing an (email_hash, phone_hash) pair under different lead ids.
    pub contact_duplicates: Vec<DuplicateGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyExtractReport {
    pub rows_in: u64,
    pub rows_out: u64,
    pub dropped_sentinel: u64,
    pub dropped_unbooked: u64,
    pub dropped_zip_zero: u64,
    pub missing_tokens: u64,
    pub entry_dates_invalid: u64,
    pub appt_dates_invalid: u64,
    pub states_inferred: u64,
    pub states_missing: u64,
    pub zips_invalid: u64,
    pub flags_normalized: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "dataset", rename_all = "snake_case")]
pub enum CleanReport {
    Snapshot(SnapshotReport),
    DailyExtract(DailyExtractReport),
}

impl CleanReport {
    pub fn rows_in(&self) -> u64 {
        match self {
            CleanReport::Snapshot(r) => r.rows_in,
            CleanReport::DailyExtract(r) => r.rows_in,
        }
    }

    pub fn rows_out(&self) -> u64 {
        match self {
            CleanReport::Snapshot(r) => r.rows_out,
            CleanReport::DailyExtract(r) => r.rows_out,
        }
    }

    pub fn log(&self) {
        match self {
            CleanReport::Snapshot(r) => r.log(),
            CleanReport::DailyExtract(r) => r.log(),
        }
    }
}

fn render_key(key: &[Cell]) -> String {
    key.iter()
        .map(|c| c.as_deref().unwrap_or("<missing>"))
        .collect::<Vec<_>>()
        .join("|")
}

impl SnapshotReport {
    pub fn log(&self) {
        info!(
            rows_in = self.rows_in,
            rows_out = self.rows_out,
            dropped_missing_id = self.dropped_missing_id,
            dropped_duplicates = self.dropped_duplicates,
            "snapshot cleaned"
        );
        for g in &self.id_duplicates {
            warn!(key = %render_key(&g.key), rows = ?g.rows, "duplicate lead identifiers");
        }
        if !self.contact_duplicates.is_empty() {
            warn!(
                groups = self.contact_duplicates.len(),
                "leads sharing email_hash and phone_hash"
            );
        }
        for g in &self.contact_duplicates {
            tracing::debug!(key = %render_key(&g.key), rows = ?g.rows, "contact duplicate");
        }
    }
}

impl DailyExtractReport {
    pub fn log(&self) {
        info!(
            rows_in = self.rows_in,
            rows_out = self.rows_out,
            "daily extract cleaned"
        );
        let drops = [
            ("sentinel", self.dropped_sentinel),
            ("unbooked appointment", self.dropped_unbooked),
            ("zip zero", self.dropped_zip_zero),
        ];
        for (rule, n) in drops {
            if n > 0 {
                warn!(rule, rows = n, "rows dropped");
            }
        }
        if self.entry_dates_invalid + self.appt_dates_invalid + self.zips_invalid > 0 {
            warn!(
                entry_dates = self.entry_dates_invalid,
                appt_dates = self.appt_dates_invalid,
                zips = self.zips_invalid,
                "unparsable values set to missing"
            );
        }
        tracing::debug!(
            missing_tokens = self.missing_tokens,
            states_inferred = self.states_inferred,
            states_missing = self.states_missing,
            flags_normalized = self.flags_normalized,
            "daily extract value rewrites"
        );
    }
}
