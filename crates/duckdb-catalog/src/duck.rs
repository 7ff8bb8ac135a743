//! Catalog backed by the DuckDB CLI. Every call runs one script through
//! `duckdb <db> -csv -noheader -bail` and reads its stdout.

use crate::{Catalog, CatalogError};
use metadata::{Destination, Table};
use std::fs::{create_dir_all, remove_file, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Written in place of missing cells in staged CSV files.
const NULL_TOKEN: &str = "\\N";

#[derive(Debug, Clone)]
pub struct DuckDbCatalog {
    bin: String,
    db_path: PathBuf,
}

impl DuckDbCatalog {
    pub fn new(bin: impl Into<String>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            db_path: db_path.into(),
        }
    }

    fn run_sql(&self, sql: &str) -> Result<String, CatalogError> {
        if let Some(dir) = self.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        debug!(db = %self.db_path.display(), sql, "duckdb");
        let mut child = Command::new(&self.bin)
            .arg(&self.db_path)
            .args(["-csv", "-noheader", "-bail"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CatalogError::Spawn {
                bin: self.bin.clone(),
                source,
            })?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(sql.as_bytes())?;
        }
        let out = child.wait_with_output()?;
        if !out.status.success() {
            return Err(CatalogError::Failed {
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn stage_path(&self, dest: &Destination) -> PathBuf {
        self.db_path
            .with_extension(format!("{}.{}.stage.csv", dest.schema, dest.table))
    }
}

impl Catalog for DuckDbCatalog {
    fn columns_for(&self, dest: &Destination) -> Result<Vec<String>, CatalogError> {
        let out = self.run_sql(&columns_sql(dest))?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(out.as_bytes());
        let mut columns = Vec::new();
        for rec in rdr.records() {
            if let Some(name) = rec?.get(0) {
                columns.push(name.to_string());
            }
        }
        Ok(columns)
    }

    fn append_rows(&self, dest: &Destination, table: &Table) -> Result<u64, CatalogError> {
        if table.is_empty() {
            return Ok(0);
        }
        let stage = StageFile(self.stage_path(dest));
        write_stage_csv(table, &stage.0)?;
        let out = self.run_sql(&append_sql(dest, table.columns(), &stage.0))?;
        appended_rows(&out)
    }

    fn ensure_table(&self, dest: &Destination, columns: &[&str]) -> Result<(), CatalogError> {
        self.run_sql(&create_sql(dest, columns)).map(|_| ())
    }
}

/// Staged CSV removed when dropped, whatever the append outcome.
struct StageFile(PathBuf);

impl Drop for StageFile {
    fn drop(&mut self) {
        match remove_file(&self.0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.0.display(), error = %e, "stage file not removed"),
        }
    }
}

fn quote_ident(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn escape_single_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

fn normalize_for_duckdb_path(p: &Path) -> String {
    // DuckDB accepts forward slashes on all platforms
    p.to_string_lossy().replace('\\', "/")
}

fn qualified(dest: &Destination) -> String {
    format!("{}.{}", quote_ident(&dest.schema), quote_ident(&dest.table))
}

fn columns_sql(dest: &Destination) -> String {
    format!(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = '{}' AND table_name = '{}' \
         ORDER BY ordinal_position;\n",
        escape_single_quotes(&dest.schema),
        escape_single_quotes(&dest.table),
    )
}

/// Counts before and after the insert bracket it inside the same transaction.
fn append_sql(dest: &Destination, columns: &[String], stage: &Path) -> String {
    let target = qualified(dest);
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    let path = escape_single_quotes(&normalize_for_duckdb_path(stage));
    format!(
        r#"BEGIN TRANSACTION;
SELECT count(*) FROM {target};
INSERT INTO {target} ({cols})
SELECT {cols} FROM read_csv('{path}', header = true, delim = ',', quote = '"', escape = '"', all_varchar = true, nullstr = '{null}');
SELECT count(*) FROM {target};
COMMIT;
"#,
        null = escape_single_quotes(NULL_TOKEN),
    )
}

fn create_sql(dest: &Destination, columns: &[&str]) -> String {
    let cols = columns
        .iter()
        .map(|c| format!("  {} VARCHAR", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE SCHEMA IF NOT EXISTS {};\nCREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
        quote_ident(&dest.schema),
        qualified(dest),
        cols
    )
}

fn write_stage_csv(table: &Table, path: &Path) -> Result<(), CatalogError> {
    let mut wtr = csv::WriterBuilder::new().from_writer(File::create(path)?);
    wtr.write_record(table.columns())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or(NULL_TOKEN)))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Difference between the last and first row counts printed by `append_sql`.
fn appended_rows(stdout: &str) -> Result<u64, CatalogError> {
    let counts: Vec<u64> = stdout
        .lines()
        .filter_map(|l| l.trim().parse().ok())
        .collect();
    match (counts.first(), counts.last()) {
        (Some(before), Some(after)) if counts.len() >= 2 && after >= before => Ok(after - before),
        _ => Err(CatalogError::Output(stdout.trim().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> Destination {
        Destination::new("silver", "stg_csv_data_01")
    }

    #[test]
    fn identifiers_and_literals_are_escaped() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
        let sql = columns_sql(&Destination::new("o'neil", "t"));
        assert!(sql.contains("table_schema = 'o''neil'"));
        assert!(sql.contains("table_name = 't'"));
    }

    #[test]
    fn append_script_is_one_transaction() {
        let cols = vec!["entry_date".to_string(), "city".to_string()];
        let sql = append_sql(&dest(), &cols, Path::new(r"C:\tmp\x.csv"));
        assert!(sql.starts_with("BEGIN TRANSACTION;"));
        assert!(sql.trim_end().ends_with("COMMIT;"));
        assert!(sql.contains(r#"INSERT INTO "silver"."stg_csv_data_01" ("entry_date", "city")"#));
        assert!(sql.contains("read_csv('C:/tmp/x.csv'"));
        assert!(sql.contains(r"nullstr = '\N'"));
        assert!(sql.contains(r#"delim = ',', quote = '"', escape = '"'"#));
    }

    #[test]
    fn create_script_uses_text_columns() {
        let sql = create_sql(&dest(), &["zip", "state"]);
        assert!(sql.contains(r#"CREATE SCHEMA IF NOT EXISTS "silver";"#));
        assert!(sql.contains(r#""zip" VARCHAR"#));
        assert!(sql.contains(r#"CREATE TABLE IF NOT EXISTS "silver"."stg_csv_data_01""#));
    }

    #[test]
    fn appended_count_is_the_difference() {
        assert_eq!(appended_rows("10\n15\n").unwrap(), 5);
        assert_eq!(appended_rows("0\n5\n5\n").unwrap(), 5);
        assert!(matches!(appended_rows("10\n"), Err(CatalogError::Output(_))));
        assert!(matches!(appended_rows(""), Err(CatalogError::Output(_))));
    }

    #[test]
    fn staged_csv_marks_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stage.csv");
        let t = Table::with_rows(
            ["a", "b"],
            vec![vec![Some("x, y".into()), None]],
        )
        .unwrap();
        write_stage_csv(&t, &path).unwrap();
        let txt = std::fs::read_to_string(&path).unwrap();
        assert_eq!(txt, "a,b\n\"x, y\",\\N\n");
    }

    #[test]
    fn stage_file_is_removed_when_append_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cat = DuckDbCatalog::new(
            "definitely-not-a-duckdb-binary",
            dir.path().join("leads.duckdb"),
        );
        let t = Table::with_rows(["a"], vec![vec![Some("1".into())]]).unwrap();
        assert!(matches!(
            cat.append_rows(&dest(), &t),
            Err(CatalogError::Spawn { .. })
        ));
        assert!(!cat.stage_path(&dest()).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn dropping_an_absent_stage_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        drop(StageFile(dir.path().join("never-written.csv")));
        let written = StageFile(dir.path().join("written.csv"));
        std::fs::write(&written.0, "a\n").unwrap();
        let path = written.0.clone();
        drop(written);
        assert!(!path.exists());
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let cat = DuckDbCatalog::new(
            "definitely-not-a-duckdb-binary",
            dir.path().join("w/leads.duckdb"),
        );
        assert!(matches!(
            cat.columns_for(&dest()),
            Err(CatalogError::Spawn { .. })
        ));
    }
}
