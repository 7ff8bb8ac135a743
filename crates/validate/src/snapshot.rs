use crate::normalize::is_missing_token;
use crate::records::SnapshotRecord;
use crate::report::{DuplicateGroup, SnapshotReport};
use crate::CleanError;
use blake3::Hasher;
use metadata::{Cell, DatasetShape, Table};
use std::collections::{HashMap, HashSet};

fn hash_key(parts: &[&Cell]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    for p in parts {
        match p {
            Some(v) => {
                hasher.update(b"\x01");
                hasher.update(v.as_bytes());
            }
            None => {
                hasher.update(b"\x00");
            }
        }
        hasher.update(b"|");
    }
    *hasher.finalize().as_bytes()
}

fn lower_trim(v: Cell) -> Cell {
    v.map(|s| s.trim().to_lowercase())
}

/// Groups positions by key, keeping groups with more than one member, ordered by
/// their first position.
fn duplicate_groups<'a, I>(keyed: I) -> Vec<DuplicateGroup>
where
    I: IntoIterator<Item = (usize, Vec<&'a Cell>)>,
{
    let mut index: HashMap<[u8; 32], usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();
    for (pos, key) in keyed {
        let slot = *index.entry(hash_key(&key)).or_insert_with(|| {
            groups.push(DuplicateGroup {
                key: key.iter().map(|c| (*c).clone()).collect(),
                rows: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].rows.push(pos);
    }
    groups.retain(|g| g.rows.len() > 1);
    groups
}

/// Cleans the nightly snapshot into silver shape.
///
/// Rows missing an identifier are dropped, contact hashes are lower-cased and
/// trimmed, and the identifier tuple is deduplicated keeping the first occurrence.
/// Reported row positions refer to `table`.
pub fn clean_snapshot(table: &Table) -> Result<(Table, SnapshotReport), CleanError> {
    let records = SnapshotRecord::from_table(table)?;
    let mut report = SnapshotReport {
        rows_in: records.len() as u64,
        ..Default::default()
    };

    let mut candidates: Vec<(usize, SnapshotRecord)> = Vec::with_capacity(records.len());
    for (pos, rec) in records.into_iter().enumerate() {
        let missing_id = rec
            .identifiers()
            .iter()
            .any(|c| c.as_deref().map_or(true, is_missing_token));
        if missing_id {
            report.dropped_missing_id += 1;
            continue;
        }
        let rec = SnapshotRecord {
            lead_uuid: rec.lead_uuid.map(|s| s.trim().to_string()),
            phone_hash: lower_trim(rec.phone_hash),
            email_hash: lower_trim(rec.email_hash),
            ..rec
        };
        candidates.push((pos, rec));
    }

    report.id_duplicates = duplicate_groups(
        candidates
            .iter()
            .map(|(pos, rec)| (*pos, rec.identifiers().to_vec())),
    );

    let mut seen_keys: HashSet<[u8; 32]> = HashSet::new();
    let mut kept: Vec<(usize, SnapshotRecord)> = Vec::with_capacity(candidates.len());
    for (pos, rec) in candidates {
        if !seen_keys.insert(hash_key(&rec.identifiers())) {
            report.dropped_duplicates += 1;
            continue;
        }
        kept.push((pos, rec));
    }

    report.contact_duplicates = duplicate_groups(
        kept.iter()
            .map(|(pos, rec)| (*pos, vec![&rec.email_hash, &rec.phone_hash])),
    );

    let rows = kept.into_iter().map(|(_, r)| r.into_silver_row()).collect();
    let out = Table::with_rows(DatasetShape::Snapshot.silver_columns(), rows)?;
    report.rows_out = out.len() as u64;
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[[Option<&str>; 3]]) -> Table {
        Table::with_rows(
            DatasetShape::Snapshot.bronze_columns(),
            rows.iter()
                .map(|r| {
                    let mut row: Vec<Cell> = r.iter().map(|c| c.map(str::to_string)).collect();
                    row.push(Some("2024-10-01 08:00:00".into()));
                    row.push(Some("2024-10-23".into()));
                    row
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn drops_rows_missing_an_identifier() {
        let t = raw(&[
            [Some("u1"), Some("p1"), Some("e1")],
            [None, Some("p2"), Some("e2")],
            [Some("u3"), Some("nan"), Some("e3")],
            [Some("u4"), Some("p4"), Some("  ")],
        ]);
        let (out, report) = clean_snapshot(&t).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(report.dropped_missing_id, 3);
        for row in out.rows() {
            assert!(row[..3].iter().all(Option::is_some));
        }
    }

    #[test]
    fn dedup_keeps_first_after_normalizing_hashes() {
        let t = raw(&[
            [Some("u1"), Some("P1"), Some("E1 ")],
            [Some("u2"), Some("p2"), Some("e2")],
            [Some("u1"), Some(" p1"), Some("e1")],
        ]);
        let (out, report) = clean_snapshot(&t).unwrap();
        assert_eq!(out.columns()[0], "lead_uuid");
        assert_eq!(out.len(), 2);
        assert_eq!(out.value(0, 0), Some("u1"));
        assert_eq!(out.value(0, 1), Some("p1"));
        assert_eq!(out.value(0, 2), Some("e1"));
        assert_eq!(out.value(0, 3), Some("2024-10-01 08:00:00"));
        assert_eq!(out.value(1, 0), Some("u2"));
        assert_eq!(report.dropped_duplicates, 1);
        assert_eq!(report.id_duplicates.len(), 1);
        assert_eq!(report.id_duplicates[0].rows, vec![0, 2]);
    }

    #[test]
    fn reports_shared_contacts_across_leads() {
        let t = raw(&[
            [Some("u1"), Some("p"), Some("e")],
            [Some("u2"), Some("x"), Some("y")],
            [Some("u3"), Some("p"), Some("e")],
        ]);
        let (out, report) = clean_snapshot(&t).unwrap();
        assert_eq!(out.len(), 3);
        assert!(report.id_duplicates.is_empty());
        assert_eq!(report.contact_duplicates.len(), 1);
        assert_eq!(
            report.contact_duplicates[0].key,
            vec![Some("e".to_string()), Some("p".to_string())]
        );
        assert_eq!(report.contact_duplicates[0].rows, vec![0, 2]);
    }

    #[test]
    fn cleaning_is_idempotent_and_leaves_input_alone() {
        let t = raw(&[
            [Some("u1"), Some("P1"), Some("E1")],
            [Some("u1"), Some("p1"), Some("e1")],
            [Some("u2"), None, Some("e2")],
        ]);
        let before = t.clone();
        let (once, _) = clean_snapshot(&t).unwrap();
        assert_eq!(t, before);

        let again_input = once
            .clone()
            .rename_columns(|c| (c == "lead_uuid").then_some("lead_UUID"))
            .unwrap();
        let (twice, report) = clean_snapshot(&again_input).unwrap();
        assert_eq!(twice, once);
        assert_eq!(report.rows_in, report.rows_out);
    }

    #[test]
    fn missing_identifier_column_is_fatal() {
        let t = Table::new(["lead_UUID", "phone_hash", "_extraction_date"]).unwrap();
        assert!(matches!(
            clean_snapshot(&t),
            Err(CleanError::MissingColumn { column: "email_hash", .. })
        ));
    }
}
