use std::fmt::{self, Display};
use std::sync::Arc;

use crate::errors::{CoolerError, Result};

///
/// Decoded values of one column. Integer storage of any width is widened to
/// `i64`, floating point to `f64`.
///
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    /// Enum-coded values. `codes[i]` indexes into `labels`, which are ordered by code.
    Categorical {
        codes: Vec<u32>,
        labels: Arc<Vec<String>>,
    },
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ColumnData::Int(_) => "int",
            ColumnData::Float(_) => "float",
            ColumnData::Text(_) => "text",
            ColumnData::Categorical { .. } => "categorical",
        }
    }

    /// An empty column of the same kind (labels are kept for categoricals).
    pub fn empty_like(&self) -> ColumnData {
        match self {
            ColumnData::Int(_) => ColumnData::Int(Vec::new()),
            ColumnData::Float(_) => ColumnData::Float(Vec::new()),
            ColumnData::Text(_) => ColumnData::Text(Vec::new()),
            ColumnData::Categorical { labels, .. } => ColumnData::Categorical {
                codes: Vec::new(),
                labels: Arc::clone(labels),
            },
        }
    }

    ///
    /// Gather rows by position.
    ///
    /// # Arguments
    /// - positions: row positions, each `< self.len()`
    pub fn take(&self, positions: &[usize]) -> ColumnData {
        match self {
            ColumnData::Int(v) => ColumnData::Int(positions.iter().map(|&p| v[p]).collect()),
            ColumnData::Float(v) => ColumnData::Float(positions.iter().map(|&p| v[p]).collect()),
            ColumnData::Text(v) => {
                ColumnData::Text(positions.iter().map(|&p| v[p].clone()).collect())
            }
            ColumnData::Categorical { codes, labels } => ColumnData::Categorical {
                codes: positions.iter().map(|&p| codes[p]).collect(),
                labels: Arc::clone(labels),
            },
        }
    }

    /// Append rows of a column of the same kind.
    pub fn append(&mut self, other: ColumnData) -> Result<()> {
        match (self, other) {
            (ColumnData::Int(a), ColumnData::Int(b)) => a.extend(b),
            (ColumnData::Float(a), ColumnData::Float(b)) => a.extend(b),
            (ColumnData::Text(a), ColumnData::Text(b)) => a.extend(b),
            (
                ColumnData::Categorical { codes: a, labels: la },
                ColumnData::Categorical { codes: b, labels: lb },
            ) if *la == lb => a.extend(b),
            (this, other) => {
                return Err(CoolerError::InvalidRange(format!(
                    "can't append a {} column to a {} column",
                    other.kind(),
                    this.kind()
                )));
            }
        }
        Ok(())
    }

    pub fn as_int(&self) -> Option<&[i64]> {
        match self {
            ColumnData::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            ColumnData::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Per-row labels of a text or categorical column.
    pub fn labels(&self) -> Option<Vec<&str>> {
        match self {
            ColumnData::Text(v) => Some(v.iter().map(|s| s.as_str()).collect()),
            ColumnData::Categorical { codes, labels } => {
                Some(codes.iter().map(|&c| labels[c as usize].as_str()).collect())
            }
            _ => None,
        }
    }

    /// Numeric values as `f64`, if the column is numeric.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match self {
            ColumnData::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            ColumnData::Float(v) => Some(v.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: &str, data: ColumnData) -> Self {
        Column {
            name: name.to_string(),
            data,
        }
    }
}

///
/// An ordered set of equal-length named columns with an optional row index.
///
/// Tables returned by selectors carry the row ids they were read from (for the
/// bin table the index doubles as the bin id of each row).
///
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    index: Option<Vec<u64>>,
}

impl Table {
    pub fn new(columns: Vec<Column>, index: Option<Vec<u64>>) -> Result<Self> {
        let mut table = Table {
            columns: Vec::with_capacity(columns.len()),
            index: None,
        };
        for column in columns {
            table.push_column(column)?;
        }
        table.set_index(index)?;
        Ok(table)
    }

    pub fn nrows(&self) -> usize {
        match (self.columns.first(), &self.index) {
            (Some(c), _) => c.data.len(),
            (None, Some(index)) => index.len(),
            (None, None) => 0,
        }
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Result<&ColumnData> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| &c.data)
            .ok_or_else(|| CoolerError::NotFound(format!("column '{}'", name)))
    }

    pub fn index(&self) -> Option<&[u64]> {
        self.index.as_deref()
    }

    pub fn set_index(&mut self, index: Option<Vec<u64>>) -> Result<()> {
        if let Some(ix) = &index {
            if !self.columns.is_empty() && ix.len() != self.nrows() {
                return Err(CoolerError::InvalidRange(format!(
                    "index of length {} does not match {} rows",
                    ix.len(),
                    self.nrows()
                )));
            }
        }
        self.index = index;
        Ok(())
    }

    pub fn push_column(&mut self, column: Column) -> Result<()> {
        self.insert_column(self.columns.len(), column)
    }

    pub fn insert_column(&mut self, position: usize, column: Column) -> Result<()> {
        let expected = self.nrows();
        let has_rows = !self.columns.is_empty() || self.index.is_some();
        if has_rows && column.data.len() != expected {
            return Err(CoolerError::InvalidRange(format!(
                "column '{}' has {} rows, table has {}",
                column.name,
                column.data.len(),
                expected
            )));
        }
        if self.contains(&column.name) {
            return Err(CoolerError::InvalidRange(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        self.columns.insert(position.min(self.columns.len()), column);
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.position(name).map(|p| self.columns.remove(p))
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if self.contains(to) {
            return Err(CoolerError::InvalidRange(format!("duplicate column '{}'", to)));
        }
        let p = self
            .position(from)
            .ok_or_else(|| CoolerError::NotFound(format!("column '{}'", from)))?;
        self.columns[p].name = to.to_string();
        Ok(())
    }

    /// Gather rows by position, index included.
    pub fn take_rows(&self, positions: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(positions),
                })
                .collect(),
            index: self
                .index
                .as_ref()
                .map(|ix| positions.iter().map(|&p| ix[p]).collect()),
        }
    }

    pub fn into_parts(self) -> (Vec<Column>, Option<Vec<u64>>) {
        (self.columns, self.index)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Table ({} rows x {} columns)", self.nrows(), self.ncols())?;
        writeln!(f, "{}", self.column_names().join("\t"))?;
        for row in 0..self.nrows().min(10) {
            let cells: Vec<String> = self
                .columns
                .iter()
                .map(|c| match &c.data {
                    ColumnData::Int(v) => v[row].to_string(),
                    ColumnData::Float(v) => v[row].to_string(),
                    ColumnData::Text(v) => v[row].clone(),
                    ColumnData::Categorical { codes, labels } => labels[codes[row] as usize].clone(),
                })
                .collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn table() -> Table {
        Table::new(
            vec![
                Column::new("a", ColumnData::Int(vec![1, 2, 3])),
                Column::new(
                    "b",
                    ColumnData::Categorical {
                        codes: vec![1, 0, 1],
                        labels: Arc::new(vec!["x".to_string(), "y".to_string()]),
                    },
                ),
            ],
            Some(vec![10, 11, 12]),
        )
        .unwrap()
    }

    #[rstest]
    fn test_take_rows(table: Table) {
        let taken = table.take_rows(&[2, 0]);
        assert_eq!(taken.column("a").unwrap().as_int().unwrap(), &[3, 1]);
        assert_eq!(taken.column("b").unwrap().labels().unwrap(), vec!["y", "y"]);
        assert_eq!(taken.index().unwrap(), &[12, 10]);
    }

    #[rstest]
    fn test_append_checks_kind() {
        let mut a = ColumnData::Int(vec![1]);
        a.append(ColumnData::Int(vec![2, 3])).unwrap();
        assert_eq!(a, ColumnData::Int(vec![1, 2, 3]));
        assert!(a.append(ColumnData::Float(vec![1.0])).is_err());
    }

    #[rstest]
    fn test_length_mismatch_rejected(mut table: Table) {
        let res = table.push_column(Column::new("c", ColumnData::Float(vec![1.0])));
        assert!(res.is_err());
        assert!(table.set_index(Some(vec![0])).is_err());
    }

    #[rstest]
    fn test_rename_and_remove(mut table: Table) {
        table.rename_column("a", "a1").unwrap();
        assert!(table.rename_column("a1", "b").is_err());
        assert_eq!(table.column_names(), vec!["a1", "b"]);
        assert!(table.remove_column("a1").is_some());
        assert!(matches!(table.column("a1"), Err(CoolerError::NotFound(_))));
    }
}
