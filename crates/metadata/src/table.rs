//! Ordered text table shared by every stage.
//!
//! A cell is `Option<String>`: `None` is the missing marker. Cleaned tables never
//! carry empty strings, they carry `None`.

use thiserror::Error;

pub type Cell = Option<String>;
pub type Row = Vec<Cell>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("row has {got} cells, table has {expected} columns")]
    RowWidth { expected: usize, got: usize },
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].contains(c) {
                return Err(TableError::DuplicateColumn(c.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn with_rows<I, S>(columns: I, rows: Vec<Row>) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Row) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index_of(column).is_some()
    }

    /// Cell text at (`row`, `col`); `None` when missing or out of bounds.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Appends a column filled with `value` (or replaces its values when it exists).
    pub fn with_constant(mut self, column: &str, value: Cell) -> Self {
        match self.index_of(column) {
            Some(idx) => {
                for row in &mut self.rows {
                    row[idx] = value.clone();
                }
            }
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(value.clone());
                }
            }
        }
        self
    }

    /// Renames columns through `lookup`; columns it does not know keep their name.
    pub fn rename_columns<F>(mut self, lookup: F) -> Result<Self, TableError>
    where
        F: Fn(&str) -> Option<&str>,
    {
        let renamed: Vec<String> = self
            .columns
            .iter()
            .map(|c| lookup(c).map(str::to_string).unwrap_or_else(|| c.clone()))
            .collect();
        // re-validate uniqueness after renaming
        let checked = Table::new(renamed)?;
        self.columns = checked.columns;
        Ok(self)
    }

    /// New table with the rows at `indices`, in the order given.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Projects onto `columns`, in that order.
    ///
    /// Returns the list of requested columns this table lacks when the projection
    /// is impossible.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Result<Table, Vec<String>> {
        let mut idx = Vec::with_capacity(columns.len());
        let mut missing = Vec::new();
        for c in columns {
            match self.index_of(c.as_ref()) {
                Some(i) => idx.push(i),
                None => missing.push(c.as_ref().to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| idx.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        })
    }

    /// Stacks tables by column name. The result holds the union of all columns in
    /// first-seen order; cells of columns a table lacks are missing.
    pub fn concat_by_name<'a, I>(tables: I) -> Table
    where
        I: IntoIterator<Item = &'a Table>,
    {
        let tables: Vec<&Table> = tables.into_iter().collect();
        let mut columns: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }
        let mut rows = Vec::with_capacity(tables.iter().map(|t| t.len()).sum());
        for t in &tables {
            let mapping: Vec<Option<usize>> = columns.iter().map(|c| t.index_of(c)).collect();
            for row in &t.rows {
                rows.push(
                    mapping
                        .iter()
                        .map(|m| m.and_then(|i| row[i].clone()))
                        .collect(),
                );
            }
        }
        Table { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(s: &str) -> Cell {
        Some(s.to_string())
    }

    #[test]
    fn rejects_ragged_rows_and_duplicate_columns() {
        let mut t = Table::new(["a", "b"]).unwrap();
        assert_eq!(
            t.push_row(vec![cell("1")]),
            Err(TableError::RowWidth { expected: 2, got: 1 })
        );
        assert_eq!(
            Table::new(["a", "a"]).unwrap_err(),
            TableError::DuplicateColumn("a".into())
        );
    }

    #[test]
    fn project_reorders_and_reports_missing() {
        let t = Table::with_rows(["a", "b", "c"], vec![vec![cell("1"), cell("2"), None]]).unwrap();
        let p = t.project(&["c", "a"]).unwrap();
        assert_eq!(p.columns(), &["c".to_string(), "a".to_string()]);
        assert_eq!(p.rows()[0], vec![None, cell("1")]);

        let err = t.project(&["a", "z", "y"]).unwrap_err();
        assert_eq!(err, vec!["z".to_string(), "y".to_string()]);
    }

    #[test]
    fn concat_aligns_columns_by_name() {
        let a = Table::with_rows(["x", "y"], vec![vec![cell("1"), cell("2")]]).unwrap();
        let b = Table::with_rows(["y", "z"], vec![vec![cell("3"), cell("4")]]).unwrap();
        let c = Table::concat_by_name([&a, &b]);
        assert_eq!(c.columns(), &["x", "y", "z"].map(String::from));
        assert_eq!(c.rows()[0], vec![cell("1"), cell("2"), None]);
        assert_eq!(c.rows()[1], vec![None, cell("3"), cell("4")]);
    }

    #[test]
    fn constant_column_and_rename() {
        let t = Table::with_rows(["CityName"], vec![vec![cell("Austin")]])
            .unwrap()
            .with_constant("_partition_date", cell("2024-10-01"))
            .rename_columns(|c| (c == "CityName").then_some("CITY"))
            .unwrap();
        assert_eq!(t.columns(), &["CITY", "_partition_date"].map(String::from));
        assert_eq!(t.value(0, 1), Some("2024-10-01"));
    }

    #[test]
    fn rename_into_existing_name_fails() {
        let t = Table::new(["CITY", "CityName"]).unwrap();
        let err = t
            .rename_columns(|c| (c == "CityName").then_some("CITY"))
            .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("CITY".into()));
    }
}
