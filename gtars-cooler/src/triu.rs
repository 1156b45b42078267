//! Rectangular queries over an upper-triangle pixel table.
//!
//! Only entries with `bin1_id <= bin2_id` are stored. A query rectangle
//! `[i0, i1) x [j0, j1)` of the full symmetric matrix is answered by at most
//! two stored-orientation reads, one of them transposed back into the
//! caller's frame. Each read walks the pixel table through `bin1_offset` and
//! is split along the row axis so that no pass spans more than `max_chunk`
//! cells.
use log::debug;

use crate::consts::{BIN2_ID, PIXELS_GROUP};
use crate::cooler::Cooler;
use crate::errors::{CoolerError, Result};
use crate::models::ColumnData;
use crate::storage::ColumnType;
use crate::storage::reader::clamp;

///
/// Sparse entries returned by a rectangular query, in the caller's frame.
///
/// Within one read the triples follow stored `(bin1_id, bin2_id)` order.
/// There is no global order across the direct and transposed reads.
///
#[derive(Debug, Clone, PartialEq)]
pub struct Triples {
    pub rows: Vec<u64>,
    pub cols: Vec<u64>,
    pub values: ColumnData,
    /// Pixel-table row each triple was read from, when requested.
    pub pixel_ids: Option<Vec<u64>>,
    /// True when every triple maps to a distinct stored pixel. Mirrored and
    /// transposed triples can repeat a pixel id.
    pub unique_ids: bool,
}

impl Triples {
    fn empty(values: ColumnData, with_ids: bool) -> Self {
        Triples {
            rows: Vec::new(),
            cols: Vec::new(),
            values,
            pixel_ids: with_ids.then(Vec::new),
            unique_ids: true,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn append(&mut self, other: Triples) -> Result<()> {
        self.rows.extend(other.rows);
        self.cols.extend(other.cols);
        self.values.append(other.values)?;
        if let (Some(ids), Some(more)) = (self.pixel_ids.as_mut(), other.pixel_ids) {
            ids.extend(more);
        }
        self.unique_ids &= other.unique_ids;
        Ok(())
    }

    fn transpose(&mut self) {
        std::mem::swap(&mut self.rows, &mut self.cols);
    }

    // append the strictly-lower triangle of a diagonal block read
    fn mirror(&mut self) -> Result<()> {
        let off: Vec<usize> = (0..self.len())
            .filter(|&k| self.rows[k] != self.cols[k])
            .collect();
        if off.is_empty() {
            return Ok(());
        }
        let rows: Vec<u64> = off.iter().map(|&k| self.cols[k]).collect();
        let cols: Vec<u64> = off.iter().map(|&k| self.rows[k]).collect();
        self.rows.extend(rows);
        self.cols.extend(cols);
        let mirrored = self.values.take(&off);
        self.values.append(mirrored)?;
        if let Some(ids) = self.pixel_ids.as_mut() {
            let more: Vec<u64> = off.iter().map(|&k| ids[k]).collect();
            ids.extend(more);
        }
        self.unique_ids = false;
        Ok(())
    }

    // keep entries by position
    fn retain(&mut self, keep: &[usize]) {
        self.rows = keep.iter().map(|&k| self.rows[k]).collect();
        self.cols = keep.iter().map(|&k| self.cols[k]).collect();
        self.values = self.values.take(keep);
        if let Some(ids) = self.pixel_ids.as_mut() {
            *ids = keep.iter().map(|&k| ids[k]).collect();
        }
    }
}

///
/// Reads rectangles of the symmetric matrix stored as its upper triangle.
///
pub struct TriangularMatrixReader<'a> {
    cooler: &'a Cooler,
    field: String,
    max_chunk: u64,
    with_ids: bool,
    is_float: bool,
}

impl<'a> TriangularMatrixReader<'a> {
    ///
    /// # Arguments
    /// - cooler: open container
    /// - field: numeric pixel column holding the matrix values
    /// - max_chunk: largest rows x cols rectangle read in one pass
    pub fn new(cooler: &'a Cooler, field: &str, max_chunk: u64) -> Result<Self> {
        let def = cooler.reader().schema(PIXELS_GROUP)?.column(field)?;
        let is_float = match &def.ctype {
            ColumnType::Numeric(n) => n.is_float(),
            _ => {
                return Err(CoolerError::NotFound(format!(
                    "numeric pixel column '{}' (found a {:?} column)",
                    field, def.ctype
                )));
            }
        };
        Ok(TriangularMatrixReader {
            cooler,
            field: field.to_string(),
            max_chunk: max_chunk.max(1),
            with_ids: false,
            is_float,
        })
    }

    /// Also return the pixel-table row of every triple.
    pub fn with_pixel_ids(mut self, with_ids: bool) -> Self {
        self.with_ids = with_ids;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    fn empty(&self) -> Triples {
        let values = match self.is_float {
            true => ColumnData::Float(Vec::new()),
            false => ColumnData::Int(Vec::new()),
        };
        Triples::empty(values, self.with_ids)
    }

    ///
    /// Entries of the full symmetric matrix in `[i0, i1) x [j0, j1)`.
    ///
    /// Bounds past the last bin are clamped. An inverted range is an error.
    ///
    pub fn query(&self, i0: u64, i1: u64, j0: u64, j1: u64) -> Result<Triples> {
        if i0 > i1 || j0 > j1 {
            return Err(CoolerError::InvalidRange(format!(
                "inverted query rectangle [{}, {}) x [{}, {})",
                i0, i1, j0, j1
            )));
        }
        let nbins = self.cooler.nbins();
        let (i0, i1) = clamp(i0, i1, nbins);
        let (j0, j1) = clamp(j0, j1, nbins);
        if i0 == i1 || j0 == j1 {
            return Ok(self.empty());
        }

        if (i0, i1) == (j0, j1) {
            debug!("Diagonal block [{}, {}), mirrored in memory", i0, i1);
            let mut triples = self.read_upper(i0, i1, i0, i1)?;
            triples.mirror()?;
            return Ok(triples);
        }

        if i1 <= j0 {
            debug!("Upper rectangle [{}, {}) x [{}, {}), direct read", i0, i1, j0, j1);
            return self.read_upper(i0, i1, j0, j1);
        }

        let mut triples = self.empty();
        let diag = i0.max(j0);

        // stored orientation
        let (r0, r1) = (i0, i1.min(j1));
        if r0 < r1 && diag < j1 {
            debug!("Direct part [{}, {}) x [{}, {})", r0, r1, diag, j1);
            triples.append(self.read_upper(r0, r1, diag, j1)?)?;
        }

        // transposed, strictly below the diagonal
        let (r0, r1) = (j0, j1.min(i1));
        if r0 < r1 && diag < i1 {
            debug!("Transposed part [{}, {}) x [{}, {})", r0, r1, diag, i1);
            let mut lower = self.read_upper(r0, r1, diag, i1)?;
            let keep: Vec<usize> = (0..lower.len())
                .filter(|&k| lower.rows[k] < lower.cols[k])
                .collect();
            lower.retain(&keep);
            lower.transpose();
            lower.unique_ids = lower.is_empty();
            triples.append(lower)?;
        }

        Ok(triples)
    }

    ///
    /// Stored entries with `bin1_id` in `[i0, i1)` and `bin2_id` in `[j0, j1)`.
    ///
    /// Bounds must already be clamped and non-empty.
    ///
    fn read_upper(&self, i0: u64, i1: u64, j0: u64, j1: u64) -> Result<Triples> {
        let offsets = self.cooler.bin1_offsets(i0, i1)?;
        let ncols = j1 - j0;
        let rows_per_chunk = (self.max_chunk / ncols).max(1);

        let mut out = self.empty();
        let mut r0 = i0;
        while r0 < i1 {
            let r1 = i1.min(r0.saturating_add(rows_per_chunk));
            let (lo, hi) = (offsets[(r0 - i0) as usize], offsets[(r1 - i0) as usize]);
            if r1 - r0 < i1 - i0 {
                debug!("Chunk rows [{}, {}) -> pixels [{}, {})", r0, r1, lo, hi);
            }
            if lo < hi {
                let bounds = &offsets[(r0 - i0) as usize..=(r1 - i0) as usize];
                out.append(self.read_rows(bounds, r0, j0, j1)?)?;
            }
            r0 = r1;
        }
        Ok(out)
    }

    // one pass over consecutive rows; `offsets` holds their nrows + 1 bounds
    fn read_rows(&self, offsets: &[u64], first_row: u64, j0: u64, j1: u64) -> Result<Triples> {
        let reader = self.cooler.reader();
        let (lo, hi) = (offsets[0], offsets[offsets.len() - 1]);

        let bin2 = reader.read_column(PIXELS_GROUP, BIN2_ID, lo, hi, true)?;
        let bin2 = bin2.as_int().ok_or_else(|| {
            CoolerError::MalformedStorage("pixels/bin2_id is not an integer column".to_string())
        })?;

        // bin2_id is sorted within each row; keep [j0, j1) of every row
        let mut keep: Vec<usize> = Vec::new();
        let mut rows: Vec<u64> = Vec::new();
        for (k, bounds) in offsets.windows(2).enumerate() {
            let row = first_row + k as u64;
            let (a, b) = ((bounds[0] - lo) as usize, (bounds[1] - lo) as usize);
            let cells = &bin2[a..b];
            if let Some(&first) = cells.first() {
                if first < row as i64 {
                    return Err(CoolerError::MalformedStorage(format!(
                        "pixel ({}, {}) lies below the diagonal",
                        row, first
                    )));
                }
            }
            let s = a + cells.partition_point(|&c| c < j0 as i64);
            let e = a + cells.partition_point(|&c| c < j1 as i64);
            keep.extend(s..e);
            rows.extend(std::iter::repeat_n(row, e - s));
        }
        if keep.is_empty() {
            return Ok(self.empty());
        }

        let values = reader.read_column(PIXELS_GROUP, &self.field, lo, hi, true)?;
        Ok(Triples {
            cols: keep.iter().map(|&k| bin2[k] as u64).collect(),
            rows,
            values: values.take(&keep),
            pixel_ids: self
                .with_ids
                .then(|| keep.iter().map(|&k| lo + k as u64).collect()),
            unique_ids: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CoolerBuilder;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::*;
    use tempfile::{TempDir, tempdir};

    type Entry = (u64, u64, i64);

    struct Fixture {
        _dir: TempDir,
        cooler: Cooler,
        pixels: Vec<Entry>,
    }

    #[fixture]
    fn fixture() -> Fixture {
        // 8 + 7 = 15 bins of width 5
        let chromsizes = vec![("chr1".to_string(), 40), ("chr2".to_string(), 35)];
        let mut rng = StdRng::seed_from_u64(42);
        let mut pixels = Vec::new();
        for a in 0..15u64 {
            for b in a..15u64 {
                if rng.random_bool(0.4) {
                    pixels.push((a, b, rng.random_range(1..100)));
                }
            }
        }

        let dir = tempdir().unwrap();
        CoolerBuilder::new(chromsizes)
            .fixed_bins(5)
            .pixels(pixels.iter().map(|&p| p.into()).collect())
            .write(dir.path())
            .unwrap();
        let cooler = Cooler::open(dir.path()).unwrap();
        Fixture {
            _dir: dir,
            cooler,
            pixels,
        }
    }

    fn brute_force(pixels: &[Entry], i0: u64, i1: u64, j0: u64, j1: u64) -> Vec<Entry> {
        let mut out = Vec::new();
        for &(a, b, v) in pixels {
            if (i0..i1).contains(&a) && (j0..j1).contains(&b) {
                out.push((a, b, v));
            }
            if a != b && (i0..i1).contains(&b) && (j0..j1).contains(&a) {
                out.push((b, a, v));
            }
        }
        out.sort();
        out
    }

    fn entries(triples: &Triples) -> Vec<Entry> {
        let values = triples.values.as_int().unwrap();
        let mut out: Vec<Entry> = (0..triples.len())
            .map(|k| (triples.rows[k], triples.cols[k], values[k]))
            .collect();
        out.sort();
        out
    }

    #[rstest]
    #[case(0, 4, 6, 10)]
    #[case(2, 9, 2, 9)]
    #[case(0, 10, 5, 15)]
    #[case(8, 15, 0, 6)]
    #[case(3, 7, 0, 15)]
    #[case(0, 15, 0, 15)]
    #[case(5, 6, 5, 6)]
    #[case(4, 12, 6, 9)]
    fn test_query_matches_brute_force(
        fixture: Fixture,
        #[case] i0: u64,
        #[case] i1: u64,
        #[case] j0: u64,
        #[case] j1: u64,
    ) {
        let reader = TriangularMatrixReader::new(&fixture.cooler, "count", 1_000).unwrap();
        let triples = reader.query(i0, i1, j0, j1).unwrap();
        assert_eq!(entries(&triples), brute_force(&fixture.pixels, i0, i1, j0, j1));
    }

    #[rstest]
    fn test_random_rectangles(fixture: Fixture) {
        let reader = TriangularMatrixReader::new(&fixture.cooler, "count", 1_000).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let (a, b) = (rng.random_range(0..=15), rng.random_range(0..=15));
            let (c, d) = (rng.random_range(0..=15), rng.random_range(0..=15));
            let (i0, i1) = (a.min(b), a.max(b));
            let (j0, j1) = (c.min(d), c.max(d));
            let triples = reader.query(i0, i1, j0, j1).unwrap();
            assert_eq!(entries(&triples), brute_force(&fixture.pixels, i0, i1, j0, j1));

            // the transposed query is the mirror image
            let mirrored: Vec<Entry> = {
                let mut t: Vec<Entry> = entries(&reader.query(j0, j1, i0, i1).unwrap())
                    .into_iter()
                    .map(|(r, c, v)| (c, r, v))
                    .collect();
                t.sort();
                t
            };
            assert_eq!(entries(&triples), mirrored);
        }
    }

    #[rstest]
    #[case(0, 15, 0, 15)]
    #[case(0, 10, 5, 15)]
    #[case(1, 3, 4, 14)]
    fn test_chunked_reads_agree(
        fixture: Fixture,
        #[case] i0: u64,
        #[case] i1: u64,
        #[case] j0: u64,
        #[case] j1: u64,
    ) {
        let whole = TriangularMatrixReader::new(&fixture.cooler, "count", u64::MAX)
            .unwrap()
            .query(i0, i1, j0, j1)
            .unwrap();
        for max_chunk in [1, 7, 30] {
            let chunked = TriangularMatrixReader::new(&fixture.cooler, "count", max_chunk)
                .unwrap()
                .query(i0, i1, j0, j1)
                .unwrap();
            assert_eq!(chunked, whole);
        }
    }

    #[rstest]
    #[case(1, 3, 5, 6)]
    #[case(4, 12, 7, 8)]
    #[case(9, 10, 9, 10)]
    fn test_unbounded_chunk_single_column(
        fixture: Fixture,
        #[case] i0: u64,
        #[case] i1: u64,
        #[case] j0: u64,
        #[case] j1: u64,
    ) {
        let reader = TriangularMatrixReader::new(&fixture.cooler, "count", u64::MAX).unwrap();
        let triples = reader.query(i0, i1, j0, j1).unwrap();
        assert_eq!(entries(&triples), brute_force(&fixture.pixels, i0, i1, j0, j1));
    }

    #[rstest]
    fn test_bounds(fixture: Fixture) {
        let reader = TriangularMatrixReader::new(&fixture.cooler, "count", 1_000).unwrap();
        assert!(matches!(reader.query(5, 4, 0, 1), Err(CoolerError::InvalidRange(_))));
        assert!(matches!(reader.query(0, 1, 9, 2), Err(CoolerError::InvalidRange(_))));
        assert!(reader.query(3, 3, 0, 15).unwrap().is_empty());
        assert!(reader.query(20, 30, 0, 15).unwrap().is_empty());
        assert_eq!(
            entries(&reader.query(10, 99, 10, 99).unwrap()),
            brute_force(&fixture.pixels, 10, 15, 10, 15)
        );
    }

    #[rstest]
    fn test_pixel_ids(fixture: Fixture) {
        let reader = TriangularMatrixReader::new(&fixture.cooler, "count", 1_000)
            .unwrap()
            .with_pixel_ids(true);

        let direct = reader.query(0, 5, 8, 15).unwrap();
        assert!(direct.unique_ids);
        let ids = direct.pixel_ids.as_ref().unwrap();
        let mut sorted = fixture.pixels.clone();
        sorted.sort();
        for (k, &id) in ids.iter().enumerate() {
            let (a, b, _) = sorted[id as usize];
            assert_eq!((a, b), (direct.rows[k], direct.cols[k]));
        }

        let diag = reader.query(0, 15, 0, 15).unwrap();
        assert!(!diag.unique_ids);
        assert_eq!(diag.pixel_ids.as_ref().unwrap().len(), diag.len());
    }

    #[rstest]
    fn test_unknown_field(fixture: Fixture) {
        assert!(matches!(
            TriangularMatrixReader::new(&fixture.cooler, "nope", 1_000),
            Err(CoolerError::NotFound(_))
        ));
    }
}
