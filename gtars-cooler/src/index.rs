//! Genomic coordinate → bin id resolution.
use fxhash::FxHashMap;

use crate::consts::{BINS_GROUP, CHROM_OFFSET, CHROMS_GROUP, INDEXES_GROUP};
use crate::errors::{CoolerError, Result};
use crate::models::{ColumnData, GenomicRegion};
use crate::storage::ContainerReader;

///
/// Extent of `[start, end)` on a chromosome of fixed-width bins.
///
/// # Arguments
/// - chrom_lo: bin id of the chromosome's first bin
/// - start, end: genomic interval, `start <= end`
/// - binsize: bin width
pub fn uniform_extent(chrom_lo: u64, start: u64, end: u64, binsize: u64) -> (u64, u64) {
    (chrom_lo + start / binsize, chrom_lo + end.div_ceil(binsize))
}

///
/// Extent of `[start, end)` on a chromosome of variable-width bins.
///
/// The low end is the last bin starting at or before `start` and the high end
/// the first bin starting at or after `end`, so the extent always covers the
/// whole overlap.
///
/// # Arguments
/// - chrom_lo: bin id of the chromosome's first bin
/// - starts: ascending start coordinates of the chromosome's bins
pub fn variable_extent(chrom_lo: u64, starts: &[i64], start: u64, end: u64) -> (u64, u64) {
    let (start, end) = (start as i64, end as i64);
    let lo = starts.partition_point(|&s| s <= start).saturating_sub(1);
    let hi = starts.partition_point(|&s| s < end);
    (chrom_lo + lo as u64, chrom_lo + hi as u64)
}

///
/// Chromosome table and `chrom_offset` index, loaded once per open container.
///
#[derive(Debug, Clone)]
pub struct CoordinateIndex {
    names: Vec<String>,
    lengths: Vec<u64>,
    ids: FxHashMap<String, usize>,
    chrom_offset: Vec<u64>,
    binsize: Option<u64>,
}

impl CoordinateIndex {
    pub fn new(
        names: Vec<String>,
        lengths: Vec<u64>,
        chrom_offset: Vec<u64>,
        binsize: Option<u64>,
        nbins: u64,
    ) -> Result<Self> {
        if names.len() != lengths.len() {
            return Err(CoolerError::MalformedStorage(format!(
                "{} chromosome names but {} lengths",
                names.len(),
                lengths.len()
            )));
        }
        if chrom_offset.len() != names.len() + 1 {
            return Err(CoolerError::MalformedStorage(format!(
                "chrom_offset has {} entries, expected {}",
                chrom_offset.len(),
                names.len() + 1
            )));
        }
        if chrom_offset[0] != 0
            || chrom_offset.windows(2).any(|w| w[0] > w[1])
            || chrom_offset[names.len()] != nbins
        {
            return Err(CoolerError::MalformedStorage(format!(
                "chrom_offset must rise monotonically from 0 to {}",
                nbins
            )));
        }

        let mut ids = FxHashMap::default();
        for (cid, name) in names.iter().enumerate() {
            if ids.insert(name.clone(), cid).is_some() {
                return Err(CoolerError::MalformedStorage(format!(
                    "duplicate chromosome name '{}'",
                    name
                )));
            }
        }

        Ok(CoordinateIndex {
            names,
            lengths,
            ids,
            chrom_offset,
            binsize,
        })
    }

    pub fn from_reader(reader: &ContainerReader) -> Result<Self> {
        let attrs = reader.attrs();
        let names = match reader.read_column(CHROMS_GROUP, "name", 0, attrs.nchroms, true)? {
            ColumnData::Text(names) => names,
            other => other
                .labels()
                .map(|l| l.into_iter().map(|s| s.to_string()).collect())
                .ok_or_else(|| {
                    CoolerError::MalformedStorage("chroms/name is not a text column".to_string())
                })?,
        };
        let lengths = reader
            .read_column(CHROMS_GROUP, "length", 0, attrs.nchroms, true)?
            .as_int()
            .ok_or_else(|| {
                CoolerError::MalformedStorage("chroms/length is not an integer column".to_string())
            })?
            .iter()
            .map(|&l| {
                u64::try_from(l).map_err(|_| {
                    CoolerError::MalformedStorage(format!("negative chromosome length {}", l))
                })
            })
            .collect::<Result<Vec<u64>>>()?;

        let n = reader.column_len(INDEXES_GROUP, CHROM_OFFSET)?;
        let chrom_offset = reader.read_offsets(INDEXES_GROUP, CHROM_OFFSET, 0, n)?;

        Self::new(names, lengths, chrom_offset, attrs.uniform_bin_size(), attrs.nbins)
    }

    pub fn nchroms(&self) -> usize {
        self.names.len()
    }

    pub fn chromnames(&self) -> &[String] {
        &self.names
    }

    pub fn chromsizes(&self) -> Vec<(&str, u64)> {
        self.names
            .iter()
            .map(|n| n.as_str())
            .zip(self.lengths.iter().copied())
            .collect()
    }

    pub fn binsize(&self) -> Option<u64> {
        self.binsize
    }

    pub fn chrom_id(&self, name: &str) -> Result<usize> {
        self.ids
            .get(name)
            .copied()
            .ok_or_else(|| CoolerError::NotFound(format!("Unknown sequence label: {}", name)))
    }

    pub fn chrom_length(&self, cid: usize) -> u64 {
        self.lengths[cid]
    }

    /// Bin-id extent of a whole chromosome.
    pub fn chrom_extent(&self, cid: usize) -> (u64, u64) {
        (self.chrom_offset[cid], self.chrom_offset[cid + 1])
    }

    ///
    /// Resolve a region into a half-open bin-id extent `(lo, hi)`.
    ///
    /// # Arguments
    /// - reader: the open container (bin starts are read for variable-width bins)
    /// - region: region on a known chromosome, within its bounds
    pub fn resolve(&self, reader: &ContainerReader, region: &GenomicRegion) -> Result<(u64, u64)> {
        let cid = self.chrom_id(&region.chrom)?;
        let (start, end) = region.bounds(self.lengths[cid])?;
        let (chrom_lo, chrom_hi) = self.chrom_extent(cid);

        let (lo, hi) = match self.binsize {
            Some(binsize) => uniform_extent(chrom_lo, start, end, binsize),
            None => {
                let starts = reader.read_column(BINS_GROUP, "start", chrom_lo, chrom_hi, true)?;
                let starts = starts.as_int().ok_or_else(|| {
                    CoolerError::MalformedStorage("bins/start is not an integer column".to_string())
                })?;
                variable_extent(chrom_lo, starts, start, end)
            }
        };

        if hi > chrom_hi {
            return Err(CoolerError::MalformedStorage(format!(
                "{} resolves past the last bin of {}",
                region, region.chrom
            )));
        }
        Ok((lo, hi))
    }

    /// Bin id containing the left end of a region.
    pub fn offset(&self, reader: &ContainerReader, region: &GenomicRegion) -> Result<u64> {
        Ok(self.resolve(reader, region)?.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn index() -> CoordinateIndex {
        CoordinateIndex::new(
            vec!["chr1".into(), "chr2".into(), "chr3".into()],
            vec![10, 20, 15],
            vec![0, 2, 6, 9],
            Some(5),
            9,
        )
        .unwrap()
    }

    #[rstest]
    #[case(2, 0, 10, (2, 4))]
    #[case(2, 1, 11, (2, 5))]
    #[case(2, 7, 7, (3, 4))]
    #[case(2, 0, 20, (2, 6))]
    fn test_uniform_extent(
        #[case] chrom_lo: u64,
        #[case] start: u64,
        #[case] end: u64,
        #[case] expected: (u64, u64),
    ) {
        assert_eq!(uniform_extent(chrom_lo, start, end, 5), expected);
    }

    #[rstest]
    #[case(0, 10, (0, 1))]
    #[case(3, 12, (0, 2))]
    #[case(10, 10, (1, 1))]
    #[case(12, 12, (1, 2))]
    #[case(25, 30, (2, 3))]
    fn test_variable_extent(#[case] start: u64, #[case] end: u64, #[case] expected: (u64, u64)) {
        // bins [0, 10) [10, 25) [25, 30)
        let starts = vec![0, 10, 25];
        let (lo, hi) = variable_extent(100, &starts, start, end);
        assert_eq!((lo - 100, hi - 100), expected);
    }

    #[rstest]
    fn test_chrom_lookup(index: CoordinateIndex) {
        assert_eq!(index.chrom_id("chr3").unwrap(), 2);
        assert_eq!(index.chrom_extent(1), (2, 6));
        assert!(matches!(index.chrom_id("chrM"), Err(CoolerError::NotFound(_))));
    }

    #[rstest]
    #[case(vec![0, 2, 6], 9)]
    #[case(vec![1, 2, 6, 9], 9)]
    #[case(vec![0, 6, 2, 9], 9)]
    #[case(vec![0, 2, 6, 9], 10)]
    fn test_malformed_chrom_offset(#[case] chrom_offset: Vec<u64>, #[case] nbins: u64) {
        let res = CoordinateIndex::new(
            vec!["chr1".into(), "chr2".into(), "chr3".into()],
            vec![10, 20, 15],
            chrom_offset,
            Some(5),
            nbins,
        );
        assert!(matches!(res, Err(CoolerError::MalformedStorage(_))));
    }
}
