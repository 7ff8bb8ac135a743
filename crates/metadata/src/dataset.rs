use serde::{Deserialize, Serialize};
use std::fmt;

/// Lineage column stamped on every landed record.
pub const EXTRACTION_DATE: &str = "_extraction_date";
/// Partition key stamped on every daily-extract record.
pub const PARTITION_DATE: &str = "_partition_date";
/// Optional source timestamp of a snapshot row, carried as text.
pub const SNAPSHOT_INSERTED_AT: &str = "inserted_at";

// (bronze name, silver name), in storage order.
const SNAPSHOT_COLUMNS: &[(&str, &str)] = &[
    ("lead_UUID", "lead_uuid"),
    ("phone_hash", "phone_hash"),
    ("email_hash", "email_hash"),
    (SNAPSHOT_INSERTED_AT, SNAPSHOT_INSERTED_AT),
    (EXTRACTION_DATE, EXTRACTION_DATE),
];

const DAILY_EXTRACT_COLUMNS: &[(&str, &str)] = &[
    ("ENTRYDATE", "entry_date"),
    ("LEADNUMBER", "lead_number"),
    ("email_hash", "email_hash"),
    ("phone_hash", "phone_hash"),
    ("CITY", "city"),
    ("STATE", "state"),
    ("ZIP", "zip"),
    ("APPT_DATE", "appt_date"),
    ("Set", "set"),
    ("Demo", "demo"),
    ("Dispo", "dispo"),
    ("JOB_STATUS", "job_status"),
    ("location", "location"),
    (EXTRACTION_DATE, EXTRACTION_DATE),
    (PARTITION_DATE, PARTITION_DATE),
];

/// Header spellings that differ between daily extract files.
pub const DAILY_EXTRACT_HEADER_ALIASES: &[(&str, &str)] = &[
    ("CityName", "CITY"),
    ("Appt Date", "APPT_DATE"),
    ("Job Status", "JOB_STATUS"),
];

/// The two record shapes landed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetShape {
    /// Nightly identity snapshot (lead id, hashed phone, hashed email).
    Snapshot,
    /// Per-day operational extract carrying a partition key.
    DailyExtract,
}

impl DatasetShape {
    pub const ALL: [DatasetShape; 2] = [DatasetShape::Snapshot, DatasetShape::DailyExtract];

    pub fn slug(self) -> &'static str {
        match self {
            DatasetShape::Snapshot => "leads_snapshot",
            DatasetShape::DailyExtract => "daily_extract",
        }
    }

    fn column_pairs(self) -> &'static [(&'static str, &'static str)] {
        match self {
            DatasetShape::Snapshot => SNAPSHOT_COLUMNS,
            DatasetShape::DailyExtract => DAILY_EXTRACT_COLUMNS,
        }
    }

    /// Column names as landed in bronze.
    pub fn bronze_columns(self) -> Vec<&'static str> {
        self.column_pairs().iter().map(|(bronze, _)| *bronze).collect()
    }

    /// Canonical silver column names, in silver storage order.
    pub fn silver_columns(self) -> Vec<&'static str> {
        self.column_pairs().iter().map(|(_, silver)| *silver).collect()
    }

    /// Silver name for a bronze column, if the column is part of this shape.
    pub fn silver_name(self, bronze: &str) -> Option<&'static str> {
        self.column_pairs()
            .iter()
            .find(|(b, _)| *b == bronze)
            .map(|(_, s)| *s)
    }
}

impl fmt::Display for DatasetShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silver_names_follow_rename_table() {
        let silver = DatasetShape::DailyExtract.silver_columns();
        assert_eq!(silver.len(), DatasetShape::DailyExtract.bronze_columns().len());
        assert_eq!(silver[0], "entry_date");
        assert_eq!(DatasetShape::DailyExtract.silver_name("Set"), Some("set"));
        assert_eq!(DatasetShape::DailyExtract.silver_name("CityName"), None);
        assert_eq!(DatasetShape::Snapshot.silver_name("lead_UUID"), Some("lead_uuid"));
    }

    #[test]
    fn partition_key_is_last_daily_column() {
        let silver = DatasetShape::DailyExtract.silver_columns();
        assert_eq!(silver.last().copied(), Some(PARTITION_DATE));
        assert!(!DatasetShape::Snapshot.silver_columns().contains(&PARTITION_DATE));
        assert!(DatasetShape::Snapshot.silver_columns().contains(&SNAPSHOT_INSERTED_AT));
    }
}
