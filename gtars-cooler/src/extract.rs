//! Copy a container keeping only the contacts of one chromosome.
use std::path::Path;

use log::{debug, info};

use crate::consts::{BIN1_ID, BIN2_ID, BINS_GROUP, DEFAULT_FIELD, PIXELS_GROUP, WEIGHT};
use crate::cooler::Cooler;
use crate::errors::{CoolerError, Result};
use crate::models::{ColumnData, GenomicRegion};
use crate::storage::{Bin, CoolerBuilder, Pixel};

///
/// Write a new container with the chroms and bins (and weights) of `src` but
/// only the pixels whose two bins both lie on `chrom`.
///
/// The chromosome's pixel rows are streamed `chunksize` rows at a time, and
/// the indexes and `nnz` of the new container are computed from the kept
/// pixels.
///
/// Only `bin1_id`, `bin2_id` and `count` are carried over: any other pixel
/// column is dropped. `count` must be an integer column, otherwise the call
/// fails with `MalformedStorage`.
///
/// # Arguments
/// - src: the source container
/// - chrom: chromosome to keep
/// - dest: directory of the new container
/// - chunksize: pixel rows read per pass
///
/// # Returns
/// - the number of pixels kept
pub fn extract_chromosome<P: AsRef<Path>>(
    src: &Cooler,
    chrom: &str,
    dest: P,
    chunksize: u64,
) -> Result<u64> {
    if chunksize == 0 {
        return Err(CoolerError::InvalidRange("chunksize must be positive".to_string()));
    }
    let index = src.index();
    let cid = index.chrom_id(chrom)?;
    let (_, chrom_hi) = index.chrom_extent(cid);
    let (plo, phi) = src.pixels(false).extent(GenomicRegion::chrom(chrom))?;
    let reader = src.reader();

    let mut pixels: Vec<Pixel> = Vec::new();
    let mut lo = plo;
    while lo < phi {
        let hi = phi.min(lo + chunksize);
        let bin1 = int_column(reader.read_column(PIXELS_GROUP, BIN1_ID, lo, hi, true)?, BIN1_ID)?;
        let bin2 = int_column(reader.read_column(PIXELS_GROUP, BIN2_ID, lo, hi, true)?, BIN2_ID)?;
        let count = int_column(
            reader.read_column(PIXELS_GROUP, DEFAULT_FIELD, lo, hi, true)?,
            DEFAULT_FIELD,
        )?;

        // bin1 is on chrom by construction of the extent
        let before = pixels.len();
        pixels.extend(
            bin1.iter()
                .zip(bin2.iter())
                .zip(count.iter())
                .filter(|((_, b2), _)| (**b2 as u64) < chrom_hi)
                .map(|((&b1, &b2), &c)| Pixel::from((b1 as u64, b2 as u64, c))),
        );
        debug!(
            "Pixels [{}, {}): kept {} of {}",
            lo,
            hi,
            pixels.len() - before,
            hi - lo
        );
        lo = hi;
    }

    let chromsizes: Vec<(String, u64)> = src
        .chromsizes()
        .into_iter()
        .map(|(name, length)| (name.to_string(), length))
        .collect();
    let mut builder = CoolerBuilder::new(chromsizes);
    builder = match src.binsize() {
        Some(binsize) => builder.fixed_bins(binsize),
        None => builder.bins(read_bins(src)?),
    };
    if reader.has_column(BINS_GROUP, WEIGHT) {
        let weights = reader.read_column(BINS_GROUP, WEIGHT, 0, src.nbins(), true)?;
        let weights = weights.to_f64().ok_or_else(|| {
            CoolerError::MalformedStorage("bins/weight is not numeric".to_string())
        })?;
        builder = builder.weights(weights);
    }
    for (key, value) in &src.attrs().extra {
        builder = builder.attr(key, value.clone());
    }

    let nnz = pixels.len() as u64;
    builder.pixels(pixels).write(dest.as_ref())?;
    info!(
        "Extracted {} pixels of {} into {}",
        nnz,
        chrom,
        dest.as_ref().display()
    );
    Ok(nnz)
}

fn int_column(data: ColumnData, name: &str) -> Result<Vec<i64>> {
    match data {
        ColumnData::Int(values) => Ok(values),
        other => Err(CoolerError::MalformedStorage(format!(
            "pixels/{} is a {} column, expected integers",
            name,
            other.kind()
        ))),
    }
}

// the full bin table as writer bins; chromosome ids come from enum codes
fn read_bins(src: &Cooler) -> Result<Vec<Bin>> {
    let reader = src.reader();
    let nbins = src.nbins();
    let starts = int_column(reader.read_column(BINS_GROUP, "start", 0, nbins, true)?, "start")?;
    let ends = int_column(reader.read_column(BINS_GROUP, "end", 0, nbins, true)?, "end")?;

    let mut bins = Vec::with_capacity(nbins as usize);
    for cid in 0..src.index().nchroms() {
        let (lo, hi) = src.index().chrom_extent(cid);
        for k in lo as usize..hi as usize {
            bins.push(Bin {
                chrom: cid,
                start: starts[k] as u64,
                end: ends[k] as u64,
            });
        }
    }
    Ok(bins)
}
