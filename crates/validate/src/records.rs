//! Typed rows for the two dataset shapes, resolved from a bronze table by column
//! name once, at the boundary.

use crate::CleanError;
use metadata::{
    Cell, DatasetShape, Row, Table, EXTRACTION_DATE, PARTITION_DATE, SNAPSHOT_INSERTED_AT,
};

fn require(table: &Table, shape: DatasetShape, column: &'static str) -> Result<usize, CleanError> {
    table.index_of(column).ok_or(CleanError::MissingColumn {
        dataset: shape,
        column,
    })
}

fn cell(row: &Row, idx: Option<usize>) -> Cell {
    idx.and_then(|i| row.get(i).cloned().flatten())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub lead_uuid: Cell,
    pub phone_hash: Cell,
    pub email_hash: Cell,
    pub inserted_at: Cell,
    pub extraction_date: Cell,
}

impl SnapshotRecord {
    /// `inserted_at` is optional in the source.
    pub fn from_table(table: &Table) -> Result<Vec<Self>, CleanError> {
        let shape = DatasetShape::Snapshot;
        let lead = require(table, shape, "lead_UUID")?;
        let phone = require(table, shape, "phone_hash")?;
        let email = require(table, shape, "email_hash")?;
        let extracted = require(table, shape, EXTRACTION_DATE)?;
        let inserted = table.index_of(SNAPSHOT_INSERTED_AT);
        Ok(table
            .rows()
            .iter()
            .map(|row| Self {
                lead_uuid: cell(row, Some(lead)),
                phone_hash: cell(row, Some(phone)),
                email_hash: cell(row, Some(email)),
                inserted_at: cell(row, inserted),
                extraction_date: cell(row, Some(extracted)),
            })
            .collect())
    }

    /// The three identifier columns, in storage order.
    pub fn identifiers(&self) -> [&Cell; 3] {
        [&self.lead_uuid, &self.phone_hash, &self.email_hash]
    }

    /// Row in `DatasetShape::Snapshot.silver_columns()` order.
    pub fn into_silver_row(self) -> Row {
        vec![
            self.lead_uuid,
            self.phone_hash,
            self.email_hash,
            self.inserted_at,
            self.extraction_date,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyExtractRecord {
    pub entry_date: Cell,
    pub lead_number: Cell,
    pub email_hash: Cell,
    pub phone_hash: Cell,
    pub city: Cell,
    pub state: Cell,
    pub zip: Cell,
    pub appt_date: Cell,
    pub set: Cell,
    pub demo: Cell,
    pub dispo: Cell,
    pub job_status: Cell,
    pub location: Cell,
    pub extraction_date: Cell,
    pub partition_date: Cell,
}

impl DailyExtractRecord {
    /// `Demo` and `location` are optional in the source; everything else is required.
    pub fn from_table(table: &Table) -> Result<Vec<Self>, CleanError> {
        let shape = DatasetShape::DailyExtract;
        let entry = require(table, shape, "ENTRYDATE")?;
        let lead = require(table, shape, "LEADNUMBER")?;
        let email = require(table, shape, "email_hash")?;
        let phone = require(table, shape, "phone_hash")?;
        let city = require(table, shape, "CITY")?;
        let state = require(table, shape, "STATE")?;
        let zip = require(table, shape, "ZIP")?;
        let appt = require(table, shape, "APPT_DATE")?;
        let set = require(table, shape, "Set")?;
        let dispo = require(table, shape, "Dispo")?;
        let job = require(table, shape, "JOB_STATUS")?;
        let extracted = require(table, shape, EXTRACTION_DATE)?;
        let partition = require(table, shape, PARTITION_DATE)?;
        let demo = table.index_of("Demo");
        let location = table.index_of("location");

        Ok(table
            .rows()
            .iter()
            .map(|row| Self {
                entry_date: cell(row, Some(entry)),
                lead_number: cell(row, Some(lead)),
                email_hash: cell(row, Some(email)),
                phone_hash: cell(row, Some(phone)),
                city: cell(row, Some(city)),
                state: cell(row, Some(state)),
                zip: cell(row, Some(zip)),
                appt_date: cell(row, Some(appt)),
                set: cell(row, Some(set)),
                demo: cell(row, demo),
                dispo: cell(row, Some(dispo)),
                job_status: cell(row, Some(job)),
                location: cell(row, location),
                extraction_date: cell(row, Some(extracted)),
                partition_date: cell(row, Some(partition)),
            })
            .collect())
    }

    /// Applies `f` to every field.
    pub fn map_fields<F>(self, mut f: F) -> Self
    where
        F: FnMut(Cell) -> Cell,
    {
        Self {
            entry_date: f(self.entry_date),
            lead_number: f(self.lead_number),
            email_hash: f(self.email_hash),
            phone_hash: f(self.phone_hash),
            city: f(self.city),
            state: f(self.state),
            zip: f(self.zip),
            appt_date: f(self.appt_date),
            set: f(self.set),
            demo: f(self.demo),
            dispo: f(self.dispo),
            job_status: f(self.job_status),
            location: f(self.location),
            extraction_date: f(self.extraction_date),
            partition_date: f(self.partition_date),
        }
    }

    /// Row in `DatasetShape::DailyExtract.silver_columns()` order.
    pub fn into_silver_row(self) -> Row {
        vec![
            self.entry_date,
            self.lead_number,
            self.email_hash,
            self.phone_hash,
            self.city,
            self.state,
            self.zip,
            self.appt_date,
            self.set,
            self.demo,
            self.dispo,
            self.job_status,
            self.location,
            self.extraction_date,
            self.partition_date,
        ]
    }
}
