//! Bin-metadata join for pixel tables.
use log::debug;

use crate::consts::{BIN1_ID, BIN2_ID};
use crate::errors::{CoolerError, Result};
use crate::models::{Column, ColumnData, Table};
use crate::selector::TableSelector;

///
/// Join bin metadata onto a table of pixels, by bin id.
///
/// The join is positional: `bins` must be a contiguous slice of the bin table
/// whose first row is bin id `index[0]` (or 0 without an index). For each of
/// `bin1_id` and `bin2_id` present in `pixels`, every column of `bins` is
/// gathered under its own name. A name that collides with an existing column
/// renames the existing one to `<name>1` and the gathered one to `<name>2`, so
/// joining both ids gives `chrom1 .. end1, chrom2 .. end2`. Gathered columns
/// come first, then the original columns.
///
/// # Arguments
/// - pixels: rows carrying `bin1_id` and/or `bin2_id`
/// - bins: contiguous bin table slice covering every referenced id
/// - replace: drop `bin1_id`/`bin2_id` from the output
///
/// # Returns
/// - a table with the same rows (and index) as `pixels`
pub fn annotate(pixels: &Table, bins: &Table, replace: bool) -> Result<Table> {
    let base = bin_table_base(bins)?;
    let nbins = bins.nrows() as u64;
    let noriginal = pixels.ncols();
    let mut out = pixels.clone();

    for key in [BIN1_ID, BIN2_ID] {
        if !out.contains(key) {
            continue;
        }
        let positions = gather_positions(out.column(key)?, key, base, nbins)?;

        for column in bins.columns() {
            let data = column.data.take(&positions);
            let name = &column.name;
            if out.contains(name) {
                out.rename_column(name, &format!("{}1", name))?;
                out.push_column(Column::new(&format!("{}2", name), data))?;
            } else {
                out.push_column(Column::new(name, data))?;
            }
        }
    }

    // injected columns first
    let (mut columns, index) = out.into_parts();
    let injected = columns.split_off(noriginal);
    let mut reordered = injected;
    reordered.extend(columns);
    if replace {
        reordered.retain(|c| c.name != BIN1_ID && c.name != BIN2_ID);
    }
    Table::new(reordered, index)
}

///
/// Like [annotate], reading only the window of bins the pixels refer to.
///
pub fn annotate_from_selector(
    pixels: &Table,
    bins: &TableSelector<'_>,
    replace: bool,
) -> Result<Table> {
    let mut window: Option<(i64, i64)> = None;
    for key in [BIN1_ID, BIN2_ID] {
        if !pixels.contains(key) {
            continue;
        }
        let ids = pixels.column(key)?.as_int().ok_or_else(|| {
            CoolerError::InvalidRange(format!("'{}' must be an integer column", key))
        })?;
        for &id in ids {
            window = Some(match window {
                None => (id, id),
                Some((lo, hi)) => (lo.min(id), hi.max(id)),
            });
        }
    }

    let (lo, hi) = match window {
        Some((lo, _)) if lo < 0 => {
            return Err(CoolerError::InvalidRange(format!("negative bin id {}", lo)));
        }
        Some((lo, hi)) => (lo as u64, hi as u64 + 1),
        None => (0, 0),
    };
    debug!("Annotating {} pixels with bins [{}, {})", pixels.nrows(), lo, hi);

    let bins = bins.slice(lo, hi)?;
    annotate(pixels, &bins, replace)
}

// first bin id of a bin table slice; the index must be contiguous
pub(crate) fn bin_table_base(bins: &Table) -> Result<u64> {
    match bins.index() {
        None => Ok(0),
        Some(index) => {
            let base = index.first().copied().unwrap_or(0);
            if index.iter().enumerate().any(|(k, &id)| id != base + k as u64) {
                return Err(CoolerError::InvalidRange(
                    "bin table must be a contiguous range of bin ids".to_string(),
                ));
            }
            Ok(base)
        }
    }
}

/// Row of `bins` holding each id in `ids`, for a slice starting at bin `base`.
pub(crate) fn gather_positions(
    ids: &ColumnData,
    key: &str,
    base: u64,
    nbins: u64,
) -> Result<Vec<usize>> {
    let ids = ids.as_int().ok_or_else(|| {
        CoolerError::InvalidRange(format!("'{}' must be an integer column", key))
    })?;
    ids.iter()
        .map(|&id| {
            let pos = u64::try_from(id)
                .ok()
                .and_then(|id| id.checked_sub(base))
                .filter(|&pos| pos < nbins);
            pos.map(|p| p as usize).ok_or_else(|| {
                CoolerError::InvalidRange(format!(
                    "{} {} is outside the bin table [{}, {})",
                    key,
                    id,
                    base,
                    base + nbins
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn bins() -> Table {
        // bins 2..5 of some container
        Table::new(
            vec![
                Column::new("start", ColumnData::Int(vec![0, 5, 10])),
                Column::new("weight", ColumnData::Float(vec![1.0, 0.5, 2.0])),
            ],
            Some(vec![2, 3, 4]),
        )
        .unwrap()
    }

    #[fixture]
    fn pixels() -> Table {
        Table::new(
            vec![
                Column::new(BIN1_ID, ColumnData::Int(vec![2, 3])),
                Column::new(BIN2_ID, ColumnData::Int(vec![4, 3])),
                Column::new("count", ColumnData::Int(vec![9, 1])),
            ],
            Some(vec![17, 18]),
        )
        .unwrap()
    }

    #[rstest]
    fn test_annotate_orders_columns(pixels: Table, bins: Table) {
        let out = annotate(&pixels, &bins, false).unwrap();
        assert_eq!(
            out.column_names(),
            vec!["start1", "weight1", "start2", "weight2", BIN1_ID, BIN2_ID, "count"]
        );
        assert_eq!(out.column("start2").unwrap().as_int().unwrap(), &[10, 5]);
        assert_eq!(out.column("weight1").unwrap().as_float().unwrap(), &[1.0, 0.5]);
        assert_eq!(out.index().unwrap(), &[17, 18]);
    }

    #[rstest]
    fn test_annotate_replace_drops_ids(pixels: Table, bins: Table) {
        let out = annotate(&pixels, &bins, true).unwrap();
        assert!(!out.contains(BIN1_ID));
        assert!(!out.contains(BIN2_ID));
        assert_eq!(out.nrows(), pixels.nrows());
    }

    #[rstest]
    fn test_annotate_single_id_keeps_names(bins: Table) {
        let pixels = Table::new(
            vec![
                Column::new(BIN1_ID, ColumnData::Int(vec![4, 2])),
                Column::new("start", ColumnData::Int(vec![-1, -2])),
            ],
            None,
        )
        .unwrap();
        let out = annotate(&pixels, &bins, false).unwrap();
        // "start" collides with the existing column, "weight" does not
        assert_eq!(out.column_names(), vec!["start2", "weight", BIN1_ID, "start1"]);
        assert_eq!(out.column("start2").unwrap().as_int().unwrap(), &[10, 0]);
        assert_eq!(out.column("start1").unwrap().as_int().unwrap(), &[-1, -2]);
    }

    #[rstest]
    fn test_annotate_out_of_range(bins: Table) {
        let pixels = Table::new(
            vec![Column::new(BIN1_ID, ColumnData::Int(vec![2, 7]))],
            None,
        )
        .unwrap();
        assert!(matches!(
            annotate(&pixels, &bins, false),
            Err(CoolerError::InvalidRange(_))
        ));
    }

    #[rstest]
    fn test_annotate_empty(bins: Table) {
        let pixels = Table::new(
            vec![
                Column::new(BIN1_ID, ColumnData::Int(vec![])),
                Column::new(BIN2_ID, ColumnData::Int(vec![])),
            ],
            None,
        )
        .unwrap();
        let out = annotate(&pixels, &bins, true).unwrap();
        assert_eq!(out.nrows(), 0);
        assert_eq!(out.column_names(), vec!["start1", "weight1", "start2", "weight2"]);
    }
}
