use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::Utc;
use log::info;

use crate::consts::{
    ATTRS_FILE, BIN1_ID, BIN1_OFFSET, BIN2_ID, BINS_GROUP, CHROM_OFFSET, CHROMS_GROUP, COLUMN_EXT,
    DEFAULT_FIELD, FORMAT, FORMAT_VERSION, INDEXES_GROUP, PIXELS_GROUP, SCHEMA_FILE, WEIGHT,
};
use crate::errors::{CoolerError, Result};
use crate::models::ColumnData;
use crate::storage::column::encode_column;
use crate::storage::reader::{Attributes, BinType};
use crate::storage::schema::{ColumnSpec, Dtype, GroupSpec};
use crate::utils::binnify;

/// A genomic bin: a half-open interval on chromosome `chrom` (table position).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bin {
    pub chrom: usize,
    pub start: u64,
    pub end: u64,
}

/// One upper-triangle matrix entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub bin1: u64,
    pub bin2: u64,
    pub count: i64,
}

impl From<(u64, u64, i64)> for Pixel {
    fn from(value: (u64, u64, i64)) -> Self {
        Pixel {
            bin1: value.0,
            bin2: value.1,
            count: value.2,
        }
    }
}

#[derive(Debug, Clone)]
enum BinLayout {
    Fixed(u64),
    Variable(Vec<Bin>),
}

///
/// Write a group directory: `schema.json` plus one file per column.
///
pub fn write_group(root: &Path, group: &str, columns: &[(ColumnSpec, ColumnData)]) -> Result<()> {
    let dir = root.join(group);
    fs::create_dir_all(&dir)?;

    for (spec, data) in columns {
        let bytes = encode_column(spec.dtype, data)?;
        let file = File::create(dir.join(format!("{}.{}", spec.name, COLUMN_EXT)))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
    }

    let spec = GroupSpec {
        columns: columns.iter().map(|(spec, _)| spec.clone()).collect(),
    };
    fs::write(dir.join(SCHEMA_FILE), serde_json::to_string_pretty(&spec)?)?;
    Ok(())
}

///
/// Build a container from chromosome sizes, bins, optional balancing weights and
/// pixels. This is the minimal ingestion side of the format; the query engine
/// only ever reads what it writes.
///
/// ```no_run
/// use gtars_cooler::storage::writer::CoolerBuilder;
///
/// CoolerBuilder::new(vec![("chr1".to_string(), 10), ("chr2".to_string(), 20)])
///     .fixed_bins(5)
///     .pixels(vec![(0, 0, 5).into(), (0, 2, 3).into(), (1, 1, 7).into()])
///     .write("test.cool")
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct CoolerBuilder {
    chromsizes: Vec<(String, u64)>,
    layout: BinLayout,
    weights: Option<Vec<f64>>,
    pixels: Vec<Pixel>,
    pixel_columns: Vec<(String, Vec<f64>)>,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl CoolerBuilder {
    pub fn new(chromsizes: Vec<(String, u64)>) -> Self {
        CoolerBuilder {
            chromsizes,
            layout: BinLayout::Variable(Vec::new()),
            weights: None,
            pixels: Vec::new(),
            pixel_columns: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn fixed_bins(mut self, binsize: u64) -> Self {
        self.layout = BinLayout::Fixed(binsize);
        self
    }

    pub fn bins(mut self, bins: Vec<Bin>) -> Self {
        self.layout = BinLayout::Variable(bins);
        self
    }

    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn pixels(mut self, pixels: Vec<Pixel>) -> Self {
        self.pixels = pixels;
        self
    }

    /// An extra floating point pixel column, aligned with the pixels as given.
    pub fn pixel_column(mut self, name: &str, values: Vec<f64>) -> Self {
        self.pixel_columns.push((name.to_string(), values));
        self
    }

    /// An extra root attribute, stored verbatim.
    pub fn attr(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    fn resolve_bins(&self) -> Result<Vec<Bin>> {
        let bins = match &self.layout {
            BinLayout::Fixed(binsize) => binnify(&self.chromsizes, *binsize)?,
            BinLayout::Variable(bins) => bins.clone(),
        };

        // each chromosome: contiguous, ascending, gap-free bins covering [0, length)
        let mut cursor: Option<(usize, u64)> = None;
        for bin in &bins {
            if bin.chrom >= self.chromsizes.len() || bin.start >= bin.end {
                return Err(CoolerError::InvalidRange(format!("invalid bin {:?}", bin)));
            }
            let expected_start = match cursor {
                Some((chrom, end)) if chrom == bin.chrom => end,
                Some((chrom, _)) if chrom > bin.chrom => {
                    return Err(CoolerError::InvalidRange(format!(
                        "bins of chromosome {} are not contiguous",
                        bin.chrom
                    )));
                }
                _ => 0,
            };
            if let Some((chrom, end)) = cursor {
                if chrom != bin.chrom && end != self.chromsizes[chrom].1 {
                    return Err(CoolerError::InvalidRange(format!(
                        "bins of {} do not cover the chromosome",
                        self.chromsizes[chrom].0
                    )));
                }
            }
            if bin.start != expected_start {
                return Err(CoolerError::InvalidRange(format!(
                    "bin {:?} should start at {}",
                    bin, expected_start
                )));
            }
            cursor = Some((bin.chrom, bin.end));
        }
        if let Some((chrom, end)) = cursor {
            if end != self.chromsizes[chrom].1 {
                return Err(CoolerError::InvalidRange(format!(
                    "bins of {} do not cover the chromosome",
                    self.chromsizes[chrom].0
                )));
            }
        }
        Ok(bins)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let root = path.as_ref();
        let bins = self.resolve_bins()?;
        let nbins = bins.len() as u64;
        let nchroms = self.chromsizes.len();

        if let Some(weights) = &self.weights {
            if weights.len() != bins.len() {
                return Err(CoolerError::InvalidRange(format!(
                    "{} weights for {} bins",
                    weights.len(),
                    bins.len()
                )));
            }
        }
        for (name, values) in &self.pixel_columns {
            if values.len() != self.pixels.len() {
                return Err(CoolerError::InvalidRange(format!(
                    "pixel column '{}' has {} values for {} pixels",
                    name,
                    values.len(),
                    self.pixels.len()
                )));
            }
        }

        for p in &self.pixels {
            if p.bin1 > p.bin2 || p.bin2 >= nbins {
                return Err(CoolerError::InvalidRange(format!(
                    "pixel ({}, {}) is not an upper-triangle entry of a {}-bin matrix",
                    p.bin1, p.bin2, nbins
                )));
            }
        }

        let mut order: Vec<usize> = (0..self.pixels.len()).collect();
        order.sort_by_key(|&k| (self.pixels[k].bin1, self.pixels[k].bin2));
        if order
            .windows(2)
            .any(|w| (self.pixels[w[0]].bin1, self.pixels[w[0]].bin2) == (self.pixels[w[1]].bin1, self.pixels[w[1]].bin2))
        {
            return Err(CoolerError::InvalidRange("duplicate pixels".to_string()));
        }

        // indexes
        let mut chrom_offset = vec![0i64; nchroms + 1];
        for bin in &bins {
            chrom_offset[bin.chrom + 1] += 1;
        }
        let mut bin1_offset = vec![0i64; bins.len() + 1];
        for p in &self.pixels {
            bin1_offset[p.bin1 as usize + 1] += 1;
        }
        for k in 1..chrom_offset.len() {
            chrom_offset[k] += chrom_offset[k - 1];
        }
        for k in 1..bin1_offset.len() {
            bin1_offset[k] += bin1_offset[k - 1];
        }

        // chroms
        let names: Vec<String> = self.chromsizes.iter().map(|(n, _)| n.clone()).collect();
        let width = names.iter().map(|n| n.len()).max().unwrap_or(1).max(1);
        write_group(
            root,
            CHROMS_GROUP,
            &[
                (ColumnSpec::new("name", Dtype::Bytes(width)), ColumnData::Text(names.clone())),
                (
                    ColumnSpec::new("length", Dtype::Int64),
                    ColumnData::Int(self.chromsizes.iter().map(|(_, l)| *l as i64).collect()),
                ),
            ],
        )?;

        // bins
        let mut bin_columns = vec![
            (
                ColumnSpec::new("chrom", Dtype::Int32).with_enum(&names),
                ColumnData::Int(bins.iter().map(|b| b.chrom as i64).collect()),
            ),
            (
                ColumnSpec::new("start", Dtype::Int64),
                ColumnData::Int(bins.iter().map(|b| b.start as i64).collect()),
            ),
            (
                ColumnSpec::new("end", Dtype::Int64),
                ColumnData::Int(bins.iter().map(|b| b.end as i64).collect()),
            ),
        ];
        if let Some(weights) = &self.weights {
            bin_columns.push((
                ColumnSpec::new(WEIGHT, Dtype::Float64),
                ColumnData::Float(weights.clone()),
            ));
        }
        write_group(root, BINS_GROUP, &bin_columns)?;

        // pixels
        let counts: Vec<i64> = order.iter().map(|&k| self.pixels[k].count).collect();
        let count_dtype = match counts.iter().all(|&c| i32::try_from(c).is_ok()) {
            true => Dtype::Int32,
            false => Dtype::Int64,
        };
        let mut pixel_columns = vec![
            (
                ColumnSpec::new(BIN1_ID, Dtype::Int64),
                ColumnData::Int(order.iter().map(|&k| self.pixels[k].bin1 as i64).collect()),
            ),
            (
                ColumnSpec::new(BIN2_ID, Dtype::Int64),
                ColumnData::Int(order.iter().map(|&k| self.pixels[k].bin2 as i64).collect()),
            ),
            (ColumnSpec::new(DEFAULT_FIELD, count_dtype), ColumnData::Int(counts)),
        ];
        for (name, values) in &self.pixel_columns {
            pixel_columns.push((
                ColumnSpec::new(name, Dtype::Float64),
                ColumnData::Float(order.iter().map(|&k| values[k]).collect()),
            ));
        }
        write_group(root, PIXELS_GROUP, &pixel_columns)?;

        write_group(
            root,
            INDEXES_GROUP,
            &[
                (ColumnSpec::new(CHROM_OFFSET, Dtype::Int64), ColumnData::Int(chrom_offset)),
                (ColumnSpec::new(BIN1_OFFSET, Dtype::Int64), ColumnData::Int(bin1_offset)),
            ],
        )?;

        let (bin_type, bin_size) = match self.layout {
            BinLayout::Fixed(binsize) => (BinType::Fixed, Some(binsize)),
            BinLayout::Variable(_) => (BinType::Variable, None),
        };
        let attrs = Attributes {
            format: FORMAT.to_string(),
            format_version: FORMAT_VERSION,
            bin_type,
            bin_size,
            nbins,
            nchroms: nchroms as u64,
            nnz: self.pixels.len() as u64,
            creation_date: Some(Utc::now().to_rfc3339()),
            generated_by: Some(format!("gtars-cooler-{}", env!("CARGO_PKG_VERSION"))),
            extra: self.extra.clone(),
        };
        fs::write(root.join(ATTRS_FILE), serde_json::to_string_pretty(&attrs)?)?;

        info!(
            "Wrote container {} ({} chroms, {} bins, {} pixels)",
            root.display(),
            nchroms,
            nbins,
            self.pixels.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::reader::ContainerReader;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::tempdir;

    #[fixture]
    fn chromsizes() -> Vec<(String, u64)> {
        vec![
            ("chr1".to_string(), 10),
            ("chr2".to_string(), 20),
            ("chr3".to_string(), 15),
        ]
    }

    #[rstest]
    fn test_write_then_read_indexes(chromsizes: Vec<(String, u64)>) {
        let dir = tempdir().unwrap();
        CoolerBuilder::new(chromsizes)
            .fixed_bins(5)
            .pixels(vec![(1, 1, 7).into(), (0, 2, 3).into(), (0, 0, 5).into()])
            .write(dir.path())
            .unwrap();

        let reader = ContainerReader::open(dir.path()).unwrap();
        assert_eq!(reader.attrs().nbins, 9);
        assert_eq!(
            reader.read_offsets(INDEXES_GROUP, CHROM_OFFSET, 0, 4).unwrap(),
            vec![0, 2, 6, 9]
        );
        assert_eq!(
            reader.read_offsets(INDEXES_GROUP, BIN1_OFFSET, 0, 10).unwrap(),
            vec![0, 2, 3, 3, 3, 3, 3, 3, 3, 3]
        );
        // sorted on write
        assert_eq!(
            reader.read_column(PIXELS_GROUP, BIN2_ID, 0, 3, true).unwrap(),
            ColumnData::Int(vec![0, 2, 1])
        );
    }

    #[rstest]
    #[case(vec![(2, 1, 1).into()])]
    #[case(vec![(0, 9, 1).into()])]
    #[case(vec![(0, 1, 1).into(), (0, 1, 2).into()])]
    fn test_bad_pixels_rejected(chromsizes: Vec<(String, u64)>, #[case] pixels: Vec<Pixel>) {
        let dir = tempdir().unwrap();
        let res = CoolerBuilder::new(chromsizes)
            .fixed_bins(5)
            .pixels(pixels)
            .write(dir.path());
        assert!(matches!(res, Err(CoolerError::InvalidRange(_))));
    }

    #[rstest]
    fn test_variable_bins_must_cover_chromosomes() {
        let chromsizes = vec![("chr1".to_string(), 10), ("chr2".to_string(), 5)];
        let gap = vec![
            Bin { chrom: 0, start: 0, end: 4 },
            Bin { chrom: 0, start: 6, end: 10 },
            Bin { chrom: 1, start: 0, end: 5 },
        ];
        let short = vec![
            Bin { chrom: 0, start: 0, end: 9 },
            Bin { chrom: 1, start: 0, end: 5 },
        ];
        let dir = tempdir().unwrap();
        for bins in [gap, short] {
            let res = CoolerBuilder::new(chromsizes.clone()).bins(bins).write(dir.path());
            assert!(matches!(res, Err(CoolerError::InvalidRange(_))));
        }
    }

    #[rstest]
    fn test_weights_length_checked(chromsizes: Vec<(String, u64)>) {
        let dir = tempdir().unwrap();
        let res = CoolerBuilder::new(chromsizes)
            .fixed_bins(5)
            .weights(vec![1.0; 3])
            .write(dir.path());
        assert!(matches!(res, Err(CoolerError::InvalidRange(_))));
    }
}
