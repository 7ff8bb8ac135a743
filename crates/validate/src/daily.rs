//! Daily extract cleaning: an ordered chain of row filters and field rewrites.

use crate::normalize::{
    normalize_appt_date, normalize_entry_date, normalize_flag, normalize_state, normalize_zip,
    null_missing_token, StateCode, INVALID_ROW_SENTINEL, UNBOOKED_APPOINTMENT,
};
use crate::records::DailyExtractRecord;
use crate::report::DailyExtractReport;
use crate::CleanError;
use metadata::{Cell, DatasetShape, Table};

type Step = fn(Vec<DailyExtractRecord>, &mut DailyExtractReport) -> Vec<DailyExtractRecord>;

const STEPS: &[Step] = &[
    null_missing_tokens,
    normalize_entry_dates,
    drop_unbooked_and_normalize_appt_dates,
    infer_states,
    normalize_zips,
    normalize_demo_flags,
];

/// Cleans the consolidated daily extract into silver shape.
///
/// Rows holding the `-----` sentinel in any column are dropped first, then each
/// step runs in order over the surviving records.
pub fn clean_daily_extract(table: &Table) -> Result<(Table, DailyExtractReport), CleanError> {
    let records = DailyExtractRecord::from_table(table)?;
    let mut report = DailyExtractReport {
        rows_in: records.len() as u64,
        ..Default::default()
    };

    let mut records: Vec<DailyExtractRecord> = records
        .into_iter()
        .zip(table.rows())
        .filter_map(|(rec, raw)| {
            let garbage = raw
                .iter()
                .flatten()
                .any(|v| v.trim() == INVALID_ROW_SENTINEL);
            if garbage {
                report.dropped_sentinel += 1;
                None
            } else {
                Some(rec)
            }
        })
        .collect();

    for step in STEPS {
        records = step(records, &mut report);
    }

    let rows = records
        .into_iter()
        .map(DailyExtractRecord::into_silver_row)
        .collect();
    let out = Table::with_rows(DatasetShape::DailyExtract.silver_columns(), rows)?;
    report.rows_out = out.len() as u64;
    Ok((out, report))
}

fn null_missing_tokens(
    records: Vec<DailyExtractRecord>,
    report: &mut DailyExtractReport,
) -> Vec<DailyExtractRecord> {
    records
        .into_iter()
        .map(|rec| {
            rec.map_fields(|cell| {
                let was_present = cell.is_some();
                let cell = null_missing_token(cell);
                if was_present && cell.is_none() {
                    report.missing_tokens += 1;
                }
                cell
            })
        })
        .collect()
}

/// Runs `normalize` over a present value, counting values it could not read.
fn rewrite(cell: Cell, normalize: fn(&str) -> Option<String>, invalid: &mut u64) -> Cell {
    let raw = cell?;
    let out = normalize(&raw);
    if out.is_none() {
        *invalid += 1;
    }
    out
}

fn normalize_entry_dates(
    records: Vec<DailyExtractRecord>,
    report: &mut DailyExtractReport,
) -> Vec<DailyExtractRecord> {
    records
        .into_iter()
        .map(|mut rec| {
            rec.entry_date = rewrite(
                rec.entry_date,
                normalize_entry_date,
                &mut report.entry_dates_invalid,
            );
            rec
        })
        .collect()
}

fn drop_unbooked_and_normalize_appt_dates(
    records: Vec<DailyExtractRecord>,
    report: &mut DailyExtractReport,
) -> Vec<DailyExtractRecord> {
    records
        .into_iter()
        .filter_map(|mut rec| {
            if rec.appt_date.as_deref().map(str::trim) == Some(UNBOOKED_APPOINTMENT) {
                report.dropped_unbooked += 1;
                return None;
            }
            rec.appt_date = rewrite(
                rec.appt_date,
                normalize_appt_date,
                &mut report.appt_dates_invalid,
            );
            Some(rec)
        })
        .collect()
}

fn infer_states(
    records: Vec<DailyExtractRecord>,
    report: &mut DailyExtractReport,
) -> Vec<DailyExtractRecord> {
    records
        .into_iter()
        .map(|mut rec| {
            rec.location = rec
                .location
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            let state = normalize_state(rec.state.as_deref(), rec.location.as_deref());
            match state {
                StateCode::Inferred(_) => report.states_inferred += 1,
                StateCode::Missing => report.states_missing += 1,
                StateCode::Valid(_) => {}
            }
            rec.state = state.into_value();
            rec
        })
        .collect()
}

fn normalize_zips(
    records: Vec<DailyExtractRecord>,
    report: &mut DailyExtractReport,
) -> Vec<DailyExtractRecord> {
    records
        .into_iter()
        .filter_map(|mut rec| {
            rec.zip = match rec.zip.as_deref().map(normalize_zip) {
                None => None,
                Some(None) => {
                    report.zips_invalid += 1;
                    None
                }
                Some(Some(0)) => {
                    report.dropped_zip_zero += 1;
                    return None;
                }
                Some(Some(z)) => Some(z.to_string()),
            };
            Some(rec)
        })
        .collect()
}

fn normalize_demo_flags(
    records: Vec<DailyExtractRecord>,
    report: &mut DailyExtractReport,
) -> Vec<DailyExtractRecord> {
    records
        .into_iter()
        .map(|mut rec| {
            if let Some(raw) = rec.demo.take() {
                let flag = normalize_flag(&raw);
                if flag != raw {
                    report.flags_normalized += 1;
                }
                rec.demo = Some(flag);
            }
            rec
        })
        .collect()
}
