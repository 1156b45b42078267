use std::path::Path;

use log::info;

use crate::config::CoolerConfig;
use crate::consts::{BIN1_OFFSET, INDEXES_GROUP};
use crate::errors::{CoolerError, Result};
use crate::index::CoordinateIndex;
use crate::matrix::{MatrixOptions, MatrixSelection, MatrixSelector};
use crate::models::{IntoRegion, Table};
use crate::selector::{TableKind, TableSelector};
use crate::storage::{Attributes, ColumnSelection, ContainerReader};

///
/// An open contact-map container.
///
/// The handle owns the memory maps, the cached schemas and the coordinate
/// index. Every selector borrows it, so one handle serves any number of
/// queries, from any number of threads.
///
/// ```ignore
/// use gtars_cooler::{Cooler, MatrixOptions};
///
/// let clr = Cooler::open("sample.cool")?;
/// let (lo, hi) = clr.extent("chr2:0-10")?;
/// let mat = clr.matrix(MatrixOptions::default().balance(false)).fetch("chr2")?;
/// ```
///
#[derive(Debug)]
pub struct Cooler {
    reader: ContainerReader,
    index: CoordinateIndex,
    config: CoolerConfig,
}

impl Cooler {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, CoolerConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: CoolerConfig) -> Result<Self> {
        let reader = ContainerReader::open(path)?;
        let index = CoordinateIndex::from_reader(&reader)?;
        let cooler = Cooler {
            reader,
            index,
            config,
        };
        cooler.check_bin1_offset()?;

        info!(
            "Opened {} ({} bins, {} pixels)",
            cooler.reader.root().display(),
            cooler.nbins(),
            cooler.nnz()
        );
        Ok(cooler)
    }

    fn check_bin1_offset(&self) -> Result<()> {
        let nbins = self.nbins();
        let len = self.reader.column_len(INDEXES_GROUP, BIN1_OFFSET)?;
        if len != nbins + 1 {
            return Err(CoolerError::MalformedStorage(format!(
                "bin1_offset has {} entries, expected {}",
                len,
                nbins + 1
            )));
        }
        let offsets = self.bin1_offsets(0, nbins)?;
        if offsets.first() != Some(&0) || offsets.last() != Some(&self.nnz()) {
            return Err(CoolerError::MalformedStorage(format!(
                "bin1_offset must run from 0 to nnz = {}",
                self.nnz()
            )));
        }
        Ok(())
    }

    ///
    /// Entries `lo..=hi` of `bin1_offset`: the pixel-row bounds of bins
    /// `[lo, hi)`.
    ///
    pub(crate) fn bin1_offsets(&self, lo: u64, hi: u64) -> Result<Vec<u64>> {
        if lo > hi {
            return Err(CoolerError::InvalidRange(format!("bins [{}, {})", lo, hi)));
        }
        let offsets = self.reader.read_offsets(INDEXES_GROUP, BIN1_OFFSET, lo, hi + 1)?;
        if offsets.len() as u64 != hi + 1 - lo {
            return Err(CoolerError::MalformedStorage(format!(
                "bin1_offset is too short for bins [{}, {})",
                lo, hi
            )));
        }
        let nnz = self.nnz();
        if offsets.windows(2).any(|w| w[0] > w[1]) || offsets.iter().any(|&o| o > nnz) {
            return Err(CoolerError::MalformedStorage(format!(
                "bin1_offset of bins [{}, {}) is not a non-decreasing run within [0, {}]",
                lo, hi, nnz
            )));
        }
        Ok(offsets)
    }

    pub fn reader(&self) -> &ContainerReader {
        &self.reader
    }

    pub fn index(&self) -> &CoordinateIndex {
        &self.index
    }

    pub fn config(&self) -> &CoolerConfig {
        &self.config
    }

    pub fn attrs(&self) -> &Attributes {
        self.reader.attrs()
    }

    /// Root attributes as a JSON object.
    pub fn info(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self.attrs())? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(CoolerError::MalformedStorage(
                "attributes are not a JSON object".to_string(),
            )),
        }
    }

    pub fn nbins(&self) -> u64 {
        self.attrs().nbins
    }

    pub fn nnz(&self) -> u64 {
        self.attrs().nnz
    }

    pub fn binsize(&self) -> Option<u64> {
        self.index.binsize()
    }

    /// Shape of the full contact matrix.
    pub fn shape(&self) -> (u64, u64) {
        (self.nbins(), self.nbins())
    }

    pub fn chromsizes(&self) -> Vec<(&str, u64)> {
        self.index.chromsizes()
    }

    pub fn chromnames(&self) -> &[String] {
        self.index.chromnames()
    }

    /// Bin-id extent `[lo, hi)` of a genomic region.
    pub fn extent<R: IntoRegion>(&self, region: R) -> Result<(u64, u64)> {
        let region = region.into_region()?;
        self.index.resolve(&self.reader, &region)
    }

    /// Bin id containing the left end of a genomic region.
    pub fn offset<R: IntoRegion>(&self, region: R) -> Result<u64> {
        let region = region.into_region()?;
        self.index.offset(&self.reader, &region)
    }

    pub fn resolve_region<R: IntoRegion>(&self, region: R) -> Result<(u64, u64)> {
        self.extent(region)
    }

    pub fn chroms(&self) -> TableSelector<'_> {
        TableSelector::new(self, TableKind::Chroms)
    }

    pub fn bins(&self) -> TableSelector<'_> {
        TableSelector::new(self, TableKind::Bins)
    }

    pub fn pixels(&self, join: bool) -> TableSelector<'_> {
        TableSelector::new(self, TableKind::Pixels).join(join)
    }

    pub fn matrix(&self, options: MatrixOptions) -> MatrixSelector<'_> {
        MatrixSelector::new(self, options)
    }

    ///
    /// Read rows [lo, hi) of one of the tables `chroms`, `bins`, `pixels`.
    ///
    pub fn select_table(
        &self,
        table: &str,
        lo: u64,
        hi: u64,
        columns: ColumnSelection,
    ) -> Result<Table> {
        let kind: TableKind = table.parse()?;
        TableSelector::new(self, kind).selection(columns).slice(lo, hi)
    }

    ///
    /// The `[i0, i1) x [j0, j1)` rectangle of the full symmetric matrix.
    ///
    pub fn select_matrix(
        &self,
        i0: u64,
        i1: u64,
        j0: u64,
        j1: u64,
        options: &MatrixOptions,
    ) -> Result<MatrixSelection> {
        MatrixSelector::new(self, options.clone()).slice(i0, i1, j0, j1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_handle_is_shareable() {
        assert_send_sync::<Cooler>();
    }
}
