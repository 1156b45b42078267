//! Row-range selectors over the chroms, bins and pixels tables.
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::annotate::annotate_from_selector;
use crate::consts::{
    BIN_COLUMNS, BINS_GROUP, CHROM_COLUMNS, CHROMS_GROUP, PIXEL_COLUMNS, PIXELS_GROUP,
};
use crate::cooler::Cooler;
use crate::errors::{CoolerError, Result};
use crate::models::{Column, IntoRegion, Table};
use crate::storage::ColumnSelection;
use crate::storage::reader::clamp;

/// The three row-addressable tables of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Chroms,
    Bins,
    Pixels,
}

impl TableKind {
    pub fn group(&self) -> &'static str {
        match self {
            TableKind::Chroms => CHROMS_GROUP,
            TableKind::Bins => BINS_GROUP,
            TableKind::Pixels => PIXELS_GROUP,
        }
    }

    /// Columns placed first when every column is selected.
    pub fn leading_columns(&self) -> &'static [&'static str] {
        match self {
            TableKind::Chroms => &CHROM_COLUMNS,
            TableKind::Bins => &BIN_COLUMNS,
            TableKind::Pixels => &PIXEL_COLUMNS,
        }
    }
}

impl FromStr for TableKind {
    type Err = CoolerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            CHROMS_GROUP => Ok(TableKind::Chroms),
            BINS_GROUP => Ok(TableKind::Bins),
            PIXELS_GROUP => Ok(TableKind::Pixels),
            _ => Err(CoolerError::NotFound(format!("table '{}'", s))),
        }
    }
}

impl Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group())
    }
}

///
/// A column selection over one table of an open [Cooler].
///
/// Selectors are cheap to build and clone: they borrow the handle and hold
/// nothing but the selection. Reads happen in [TableSelector::slice] and
/// [TableSelector::fetch].
///
/// ```ignore
/// let bins = cooler.bins().columns(&["start", "weight"]);
/// let table = bins.fetch("chr2:0-10")?;
/// ```
///
#[derive(Debug, Clone)]
pub struct TableSelector<'a> {
    cooler: &'a Cooler,
    kind: TableKind,
    columns: ColumnSelection,
    join: bool,
}

impl<'a> TableSelector<'a> {
    pub fn new(cooler: &'a Cooler, kind: TableKind) -> Self {
        TableSelector {
            cooler,
            kind,
            columns: ColumnSelection::All,
            join: false,
        }
    }

    /// Restrict the selection to the given columns, in that order.
    pub fn columns<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.columns = ColumnSelection::names(names);
        self
    }

    pub fn selection(mut self, columns: ColumnSelection) -> Self {
        self.columns = columns;
        self
    }

    /// Attach bin `chrom`, `start`, `end` to each pixel (pixels table only).
    pub fn join(mut self, join: bool) -> Self {
        self.join = join;
        self
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Resolved column names, in output order.
    pub fn column_names(&self) -> Result<Vec<String>> {
        self.cooler
            .reader()
            .schema(self.kind.group())?
            .resolve(&self.columns, self.kind.leading_columns())
    }

    /// Row count of the whole table.
    pub fn len(&self) -> Result<u64> {
        self.cooler.reader().nrows(self.kind.group())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    ///
    /// Read rows [lo, hi). The range is clamped to the table, and an inverted
    /// range gives an empty table.
    ///
    pub fn slice(&self, lo: u64, hi: u64) -> Result<Table> {
        let reader = self.cooler.reader();
        let group = self.kind.group();
        let (lo, hi) = clamp(lo, hi, reader.nrows(group)?);
        let convert_enum = self.cooler.config().convert_enum;

        let columns = self
            .column_names()?
            .iter()
            .map(|name| {
                let data = reader.read_column(group, name, lo, hi, convert_enum)?;
                Ok(Column::new(name, data))
            })
            .collect::<Result<Vec<Column>>>()?;
        let table = Table::new(columns, Some((lo..hi).collect()))?;

        match (self.kind, self.join) {
            (TableKind::Pixels, true) => {
                let bins = self.cooler.bins().columns(&BIN_COLUMNS);
                annotate_from_selector(&table, &bins, true)
            }
            _ => Ok(table),
        }
    }

    ///
    /// Row extent of a genomic region in this table.
    ///
    /// For chroms this is the chromosome's own row, for bins the bin extent
    /// and for pixels the rows whose `bin1_id` falls in the bin extent.
    ///
    pub fn extent<R: IntoRegion>(&self, region: R) -> Result<(u64, u64)> {
        let region = region.into_region()?;
        match self.kind {
            TableKind::Chroms => {
                let index = self.cooler.index();
                let cid = index.chrom_id(&region.chrom)?;
                region.bounds(index.chrom_length(cid))?;
                Ok((cid as u64, cid as u64 + 1))
            }
            TableKind::Bins => self.cooler.extent(&region),
            TableKind::Pixels => {
                let (i0, i1) = self.cooler.extent(&region)?;
                let offsets = self.cooler.bin1_offsets(i0, i1)?;
                match (offsets.first(), offsets.last()) {
                    (Some(&lo), Some(&hi)) => Ok((lo, hi)),
                    _ => Ok((0, 0)),
                }
            }
        }
    }

    pub fn fetch<R: IntoRegion>(&self, region: R) -> Result<Table> {
        let (lo, hi) = self.extent(region)?;
        self.slice(lo, hi)
    }
}
