use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fxhash::FxHashMap;
use log::debug;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::consts::{
    ATTRS_FILE, BINS_GROUP, CHROMS_GROUP, COLUMN_EXT, INDEXES_GROUP, PIXELS_GROUP, SCHEMA_FILE,
};
use crate::errors::{CoolerError, Result};
use crate::models::ColumnData;
use crate::storage::column::{decode_column, decode_offsets};
use crate::storage::schema::{ColumnType, GroupSpec, TableSchema};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BinType {
    #[default]
    Fixed,
    Variable,
}

/// Root attributes of a container (`attrs.json`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Attributes {
    pub format: String,
    pub format_version: u32,
    #[serde(default)]
    pub bin_type: BinType,
    #[serde(default)]
    pub bin_size: Option<u64>,
    pub nbins: u64,
    pub nchroms: u64,
    pub nnz: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    /// Anything else the writer stored (assembly, user metadata, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Attributes {
    /// Uniform bin width, if the bins are fixed-width.
    pub fn uniform_bin_size(&self) -> Option<u64> {
        match self.bin_type {
            BinType::Fixed => self.bin_size.filter(|&b| b > 0),
            BinType::Variable => None,
        }
    }
}

/// One memory-mapped column file.
#[derive(Debug)]
struct MappedColumn {
    ctype: ColumnType,
    len: u64,
    // empty files are not mapped
    map: Option<Mmap>,
}

impl MappedColumn {
    fn open(path: &Path, ctype: ColumnType) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            CoolerError::MalformedStorage(format!("can't open column {}: {}", path.display(), e))
        })?;
        let nbytes = file.metadata()?.len();
        let itemsize = ctype.itemsize() as u64;
        if nbytes % itemsize != 0 {
            return Err(CoolerError::MalformedStorage(format!(
                "{} holds {} bytes, not a multiple of the item size {}",
                path.display(),
                nbytes,
                itemsize
            )));
        }

        let map = match nbytes {
            0 => None,
            _ => Some(unsafe { Mmap::map(&file) }?),
        };

        Ok(MappedColumn {
            ctype,
            len: nbytes / itemsize,
            map,
        })
    }

    /// Raw bytes of rows [lo, hi); both bounds already clamped to `len`.
    fn bytes(&self, lo: u64, hi: u64) -> &[u8] {
        let itemsize = self.ctype.itemsize();
        match &self.map {
            Some(map) => &map[lo as usize * itemsize..hi as usize * itemsize],
            None => &[],
        }
    }
}

#[derive(Debug)]
struct Group {
    schema: TableSchema,
    columns: FxHashMap<String, MappedColumn>,
}

///
/// Read-only handle to an on-disk container.
///
/// Attributes and schemas are read once at open; every column is memory-mapped
/// read-only, so reads borrow `&self` and a handle can be shared between
/// threads. A handle must never be used while another process writes the same
/// container.
///
#[derive(Debug)]
pub struct ContainerReader {
    root: PathBuf,
    attrs: Attributes,
    groups: FxHashMap<String, Group>,
}

impl ContainerReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        let attrs_path = root.join(ATTRS_FILE);
        let json = fs::read_to_string(&attrs_path).map_err(|e| {
            CoolerError::MalformedStorage(format!("can't read {}: {}", attrs_path.display(), e))
        })?;
        let attrs: Attributes = serde_json::from_str(&json)?;

        let mut groups = FxHashMap::default();
        for name in [CHROMS_GROUP, BINS_GROUP, PIXELS_GROUP, INDEXES_GROUP] {
            groups.insert(name.to_string(), Self::open_group(&root, name)?);
        }

        let reader = ContainerReader {
            root,
            attrs,
            groups,
        };
        reader.check_table_lengths()?;

        debug!(
            "Opened container {} ({} chroms, {} bins, {} pixels)",
            reader.root.display(),
            reader.attrs.nchroms,
            reader.attrs.nbins,
            reader.attrs.nnz
        );
        Ok(reader)
    }

    fn open_group(root: &Path, name: &str) -> Result<Group> {
        let dir = root.join(name);
        let schema_path = dir.join(SCHEMA_FILE);
        let json = fs::read_to_string(&schema_path).map_err(|e| {
            CoolerError::MalformedStorage(format!("can't read {}: {}", schema_path.display(), e))
        })?;
        let spec: GroupSpec = serde_json::from_str(&json)?;
        let schema = TableSchema::from_spec(name, &spec)?;

        let mut columns = FxHashMap::default();
        for def in &schema.columns {
            let path = dir.join(format!("{}.{}", def.name, COLUMN_EXT));
            columns.insert(def.name.clone(), MappedColumn::open(&path, def.ctype.clone())?);
        }

        Ok(Group { schema, columns })
    }

    // the three tables must have equal-length columns that agree with the attributes
    fn check_table_lengths(&self) -> Result<()> {
        for (name, expected) in [
            (CHROMS_GROUP, self.attrs.nchroms),
            (BINS_GROUP, self.attrs.nbins),
            (PIXELS_GROUP, self.attrs.nnz),
        ] {
            let group = self.group(name)?;
            for (column, mapped) in &group.columns {
                if mapped.len != expected {
                    return Err(CoolerError::MalformedStorage(format!(
                        "{}/{} has {} rows, expected {}",
                        name, column, mapped.len, expected
                    )));
                }
            }
        }
        Ok(())
    }

    fn group(&self, name: &str) -> Result<&Group> {
        self.groups
            .get(name)
            .ok_or_else(|| CoolerError::NotFound(format!("table '{}'", name)))
    }

    fn mapped(&self, group: &str, column: &str) -> Result<&MappedColumn> {
        let g = self.group(group)?;
        g.columns
            .get(column)
            .ok_or_else(|| CoolerError::NotFound(format!("column '{}/{}'", group, column)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn schema(&self, group: &str) -> Result<&TableSchema> {
        Ok(&self.group(group)?.schema)
    }

    pub fn has_column(&self, group: &str, column: &str) -> bool {
        self.mapped(group, column).is_ok()
    }

    /// Number of rows of a table (from the attributes).
    pub fn nrows(&self, group: &str) -> Result<u64> {
        match group {
            CHROMS_GROUP => Ok(self.attrs.nchroms),
            BINS_GROUP => Ok(self.attrs.nbins),
            PIXELS_GROUP => Ok(self.attrs.nnz),
            _ => Err(CoolerError::NotFound(format!("table '{}'", group))),
        }
    }

    /// Number of stored values of one column.
    pub fn column_len(&self, group: &str, column: &str) -> Result<u64> {
        Ok(self.mapped(group, column)?.len)
    }

    ///
    /// Read rows [lo, hi) of a column. The range is clamped to the column length.
    ///
    pub fn read_column(
        &self,
        group: &str,
        column: &str,
        lo: u64,
        hi: u64,
        convert_enum: bool,
    ) -> Result<ColumnData> {
        let mapped = self.mapped(group, column)?;
        let (lo, hi) = clamp(lo, hi, mapped.len);
        decode_column(&mapped.ctype, mapped.bytes(lo, hi), convert_enum)
    }

    ///
    /// Read rows [lo, hi) of an integer index column as unsigned offsets.
    ///
    pub fn read_offsets(&self, group: &str, column: &str, lo: u64, hi: u64) -> Result<Vec<u64>> {
        let mapped = self.mapped(group, column)?;
        let (lo, hi) = clamp(lo, hi, mapped.len);
        decode_offsets(&mapped.ctype, mapped.bytes(lo, hi))
    }
}

/// Clamp a half-open row range to [0, len]; an inverted range becomes empty.
pub fn clamp(lo: u64, hi: u64, len: u64) -> (u64, u64) {
    let lo = lo.min(len);
    let hi = hi.clamp(lo, len);
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case((0, 5, 10), (0, 5))]
    #[case((3, 50, 10), (3, 10))]
    #[case((12, 50, 10), (10, 10))]
    #[case((6, 2, 10), (6, 6))]
    fn test_clamp(#[case] input: (u64, u64, u64), #[case] expected: (u64, u64)) {
        assert_eq!(clamp(input.0, input.1, input.2), expected);
    }

    #[rstest]
    fn test_attributes_keep_extra_keys() {
        let json = r#"{
            "format": "gtars::cooler", "format-version": 2, "bin-type": "fixed",
            "bin-size": 5, "nbins": 9, "nchroms": 3, "nnz": 3,
            "genome-assembly": "hg38", "metadata": {"lab": "x"}
        }"#;
        let attrs: Attributes = serde_json::from_str(json).unwrap();
        assert_eq!(attrs.uniform_bin_size(), Some(5));
        assert_eq!(attrs.extra["genome-assembly"], "hg38");
        assert!(attrs.extra.contains_key("metadata"));
    }

    #[rstest]
    fn test_variable_bins_have_no_uniform_size() {
        let json = r#"{"format": "gtars::cooler", "format-version": 2, "bin-type": "variable",
            "bin-size": null, "nbins": 9, "nchroms": 3, "nnz": 3}"#;
        let attrs: Attributes = serde_json::from_str(json).unwrap();
        assert_eq!(attrs.uniform_bin_size(), None);
    }
}
