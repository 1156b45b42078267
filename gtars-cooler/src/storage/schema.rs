use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{CoolerError, Result};

/// On-disk element type of a column file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Float32,
    Float64,
    /// Fixed-width, NUL-padded byte strings.
    Bytes(usize),
}

impl Dtype {
    pub fn itemsize(&self) -> usize {
        match self {
            Dtype::Int32 | Dtype::Uint32 | Dtype::Float32 => 4,
            Dtype::Int64 | Dtype::Uint64 | Dtype::Float64 => 8,
            Dtype::Bytes(width) => *width,
        }
    }
}

/// One entry of a group's `schema.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: Dtype,
    /// code -> label dictionary of an enum-coded integer column
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_dict: Option<BTreeMap<i64, String>>,
}

impl ColumnSpec {
    pub fn new(name: &str, dtype: Dtype) -> Self {
        ColumnSpec {
            name: name.to_string(),
            dtype,
            enum_dict: None,
        }
    }

    pub fn with_enum(mut self, labels: &[String]) -> Self {
        self.enum_dict = Some(
            labels
                .iter()
                .enumerate()
                .map(|(code, label)| (code as i64, label.clone()))
                .collect(),
        );
        self
    }
}

/// Contents of a group's `schema.json`: the declared columns, in order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct GroupSpec {
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericType {
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl NumericType {
    pub fn is_float(&self) -> bool {
        matches!(self, NumericType::Float32 | NumericType::Float64)
    }

    pub fn itemsize(&self) -> usize {
        match self {
            NumericType::Int32 | NumericType::UInt32 | NumericType::Float32 => 4,
            NumericType::Int64 | NumericType::UInt64 | NumericType::Float64 => 8,
        }
    }
}

///
/// Labels of an enum-coded column. Codes are kept sorted so a stored code maps
/// to the position of its label with a binary search.
///
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDictionary {
    codes: Vec<i64>,
    labels: Arc<Vec<String>>,
}

impl EnumDictionary {
    pub fn new(dict: &BTreeMap<i64, String>) -> Self {
        EnumDictionary {
            codes: dict.keys().copied().collect(),
            labels: Arc::new(dict.values().cloned().collect()),
        }
    }

    pub fn labels(&self) -> &Arc<Vec<String>> {
        &self.labels
    }

    /// Position of `code` among the labels ordered by code.
    pub fn position(&self, code: i64) -> Option<u32> {
        self.codes.binary_search(&code).ok().map(|p| p as u32)
    }
}

/// How a column is decoded, fixed once when the schema is read.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Numeric(NumericType),
    Text { width: usize },
    Categorical {
        codes: NumericType,
        dictionary: Arc<EnumDictionary>,
    },
}

impl ColumnType {
    pub fn from_spec(spec: &ColumnSpec) -> Result<Self> {
        let numeric = match spec.dtype {
            Dtype::Int32 => NumericType::Int32,
            Dtype::Int64 => NumericType::Int64,
            Dtype::Uint32 => NumericType::UInt32,
            Dtype::Uint64 => NumericType::UInt64,
            Dtype::Float32 => NumericType::Float32,
            Dtype::Float64 => NumericType::Float64,
            Dtype::Bytes(0) => {
                return Err(CoolerError::MalformedStorage(format!(
                    "text column '{}' has zero width",
                    spec.name
                )));
            }
            Dtype::Bytes(width) => {
                if spec.enum_dict.is_some() {
                    return Err(CoolerError::MalformedStorage(format!(
                        "text column '{}' cannot carry an enum dictionary",
                        spec.name
                    )));
                }
                return Ok(ColumnType::Text { width });
            }
        };

        match &spec.enum_dict {
            None => Ok(ColumnType::Numeric(numeric)),
            Some(_) if numeric.is_float() => Err(CoolerError::MalformedStorage(format!(
                "float column '{}' cannot carry an enum dictionary",
                spec.name
            ))),
            Some(dict) => Ok(ColumnType::Categorical {
                codes: numeric,
                dictionary: Arc::new(EnumDictionary::new(dict)),
            }),
        }
    }

    pub fn itemsize(&self) -> usize {
        match self {
            ColumnType::Numeric(n) => n.itemsize(),
            ColumnType::Text { width } => *width,
            ColumnType::Categorical { codes, .. } => codes.itemsize(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ctype: ColumnType,
}

/// Which columns of a table to read.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnSelection {
    /// Every declared column, resolved against the cached schema.
    #[default]
    All,
    Names(Vec<String>),
}

impl ColumnSelection {
    pub fn names<S: AsRef<str>>(names: &[S]) -> Self {
        ColumnSelection::Names(names.iter().map(|s| s.as_ref().to_string()).collect())
    }
}

///
/// Ordered column declarations of one table, read once when the container is
/// opened.
///
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub group: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn from_spec(group: &str, spec: &GroupSpec) -> Result<Self> {
        let mut columns: Vec<ColumnDef> = Vec::with_capacity(spec.columns.len());
        for c in &spec.columns {
            if columns.iter().any(|d| d.name == c.name) {
                return Err(CoolerError::MalformedStorage(format!(
                    "column '{}' declared twice in '{}'",
                    c.name, group
                )));
            }
            columns.push(ColumnDef {
                name: c.name.clone(),
                ctype: ColumnType::from_spec(c)?,
            });
        }
        Ok(TableSchema {
            group: group.to_string(),
            columns,
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| CoolerError::NotFound(format!("column '{}/{}'", self.group, name)))
    }

    ///
    /// Turn a selection into a concrete, de-duplicated list of column names.
    ///
    /// # Arguments
    /// - selection: requested columns
    /// - leading: columns placed first when every column is requested
    pub fn resolve(&self, selection: &ColumnSelection, leading: &[&str]) -> Result<Vec<String>> {
        let requested: Vec<&str> = match selection {
            ColumnSelection::All => leading
                .iter()
                .copied()
                .filter(|n| self.contains(n))
                .chain(self.names())
                .collect(),
            ColumnSelection::Names(names) => names.iter().map(|s| s.as_str()).collect(),
        };

        let mut resolved: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            self.column(name)?;
            if !resolved.iter().any(|r| r == name) {
                resolved.push(name.to_string());
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn bins_spec() -> GroupSpec {
        let labels = vec!["chr1".to_string(), "chr2".to_string()];
        GroupSpec {
            columns: vec![
                ColumnSpec::new("weight", Dtype::Float64),
                ColumnSpec::new("start", Dtype::Int64),
                ColumnSpec::new("end", Dtype::Int64),
                ColumnSpec::new("chrom", Dtype::Int32).with_enum(&labels),
            ],
        }
    }

    #[rstest]
    fn test_schema_json_round_trip(bins_spec: GroupSpec) {
        let json = serde_json::to_string(&bins_spec).unwrap();
        assert!(json.contains("\"enum\":{\"0\":\"chr1\",\"1\":\"chr2\"}"));
        let parsed: GroupSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, bins_spec);

        let text: ColumnSpec = serde_json::from_str(r#"{"name":"name","dtype":{"bytes":8}}"#).unwrap();
        assert_eq!(text.dtype, Dtype::Bytes(8));
    }

    #[rstest]
    fn test_column_types(bins_spec: GroupSpec) {
        let schema = TableSchema::from_spec("bins", &bins_spec).unwrap();
        let chrom = schema.column("chrom").unwrap();
        match &chrom.ctype {
            ColumnType::Categorical { codes, dictionary } => {
                assert_eq!(*codes, NumericType::Int32);
                assert_eq!(dictionary.position(1), Some(1));
                assert_eq!(dictionary.position(7), None);
            }
            other => panic!("unexpected type {:?}", other),
        }
        assert!(schema.column("weight").unwrap().ctype.is_numeric());
    }

    #[rstest]
    fn test_resolve_all_puts_leading_first(bins_spec: GroupSpec) {
        let schema = TableSchema::from_spec("bins", &bins_spec).unwrap();
        let cols = schema
            .resolve(&ColumnSelection::All, &["chrom", "start", "end"])
            .unwrap();
        assert_eq!(cols, vec!["chrom", "start", "end", "weight"]);
    }

    #[rstest]
    fn test_resolve_names_dedups_and_checks(bins_spec: GroupSpec) {
        let schema = TableSchema::from_spec("bins", &bins_spec).unwrap();
        let cols = schema
            .resolve(&ColumnSelection::names(&["end", "start", "end"]), &[])
            .unwrap();
        assert_eq!(cols, vec!["end", "start"]);

        let res = schema.resolve(&ColumnSelection::names(&["nope"]), &[]);
        assert!(matches!(res, Err(CoolerError::NotFound(_))));
    }

    #[rstest]
    fn test_bad_specs_rejected() {
        let mut float_enum = ColumnSpec::new("x", Dtype::Float64);
        float_enum.enum_dict = Some(BTreeMap::from([(0, "a".to_string())]));
        assert!(ColumnType::from_spec(&float_enum).is_err());
        assert!(ColumnType::from_spec(&ColumnSpec::new("y", Dtype::Bytes(0))).is_err());
    }
}
