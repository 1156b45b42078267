//! Matrix assembly: sparse, dense or tabular output of a query rectangle.
use log::debug;
use ndarray::Array2;
use sprs::TriMat;

use crate::annotate::{annotate, bin_table_base, gather_positions};
use crate::consts::{BALANCED, BIN_COLUMNS, BIN1_ID, BIN2_ID, BINS_GROUP, WEIGHT};
use crate::cooler::Cooler;
use crate::errors::{CoolerError, Result};
use crate::models::{Column, ColumnData, IntoRegion, Table};
use crate::triu::{Triples, TriangularMatrixReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixOutput {
    #[default]
    Sparse,
    Dense,
    Table,
}

///
/// How a matrix query is answered.
///
/// `join` and `ignore_index` only apply to [MatrixOutput::Table]. A missing
/// `field` or `max_chunk` falls back to the handle's [crate::CoolerConfig].
///
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixOptions {
    pub field: Option<String>,
    pub balance: bool,
    pub output: MatrixOutput,
    pub join: bool,
    pub ignore_index: bool,
    pub max_chunk: Option<u64>,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        MatrixOptions {
            field: None,
            balance: true,
            output: MatrixOutput::Sparse,
            join: true,
            ignore_index: true,
            max_chunk: None,
        }
    }
}

impl MatrixOptions {
    pub fn field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn balance(mut self, balance: bool) -> Self {
        self.balance = balance;
        self
    }

    pub fn output(mut self, output: MatrixOutput) -> Self {
        self.output = output;
        self
    }

    pub fn join(mut self, join: bool) -> Self {
        self.join = join;
        self
    }

    pub fn ignore_index(mut self, ignore_index: bool) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    pub fn max_chunk(mut self, max_chunk: u64) -> Self {
        self.max_chunk = Some(max_chunk);
        self
    }
}

/// Sparse COO matrix; balanced output is always floating point.
#[derive(Debug)]
pub enum SparseMatrix {
    Int(TriMat<i64>),
    Float(TriMat<f64>),
}

impl SparseMatrix {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            SparseMatrix::Int(m) => m.shape(),
            SparseMatrix::Float(m) => m.shape(),
        }
    }

    pub fn nnz(&self) -> usize {
        match self {
            SparseMatrix::Int(m) => m.nnz(),
            SparseMatrix::Float(m) => m.nnz(),
        }
    }

    /// `(row, col, value)` entries sorted by position.
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut entries: Vec<(usize, usize, f64)> = match self {
            SparseMatrix::Int(m) => m
                .triplet_iter()
                .map(|(v, (r, c))| (r, c, *v as f64))
                .collect(),
            SparseMatrix::Float(m) => m.triplet_iter().map(|(v, (r, c))| (r, c, *v)).collect(),
        };
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries
    }

    /// Densify; repeated coordinates are summed.
    pub fn to_dense(&self) -> DenseMatrix {
        match self {
            SparseMatrix::Int(m) => {
                let mut arr = Array2::zeros(m.shape());
                for (v, (r, c)) in m.triplet_iter() {
                    arr[[r, c]] += *v;
                }
                DenseMatrix::Int(arr)
            }
            SparseMatrix::Float(m) => {
                let mut arr = Array2::zeros(m.shape());
                for (v, (r, c)) in m.triplet_iter() {
                    arr[[r, c]] += *v;
                }
                DenseMatrix::Float(arr)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenseMatrix {
    Int(Array2<i64>),
    Float(Array2<f64>),
}

impl DenseMatrix {
    pub fn shape(&self) -> (usize, usize) {
        match self {
            DenseMatrix::Int(a) => a.dim(),
            DenseMatrix::Float(a) => a.dim(),
        }
    }

    pub fn to_f64(&self) -> Array2<f64> {
        match self {
            DenseMatrix::Int(a) => a.mapv(|v| v as f64),
            DenseMatrix::Float(a) => a.clone(),
        }
    }
}

/// Pixel rows of a query rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelTable {
    pub table: Table,
    /// The index holds pixel ids that may repeat (mirrored or transposed
    /// entries), so it can't be used as a unique row key.
    pub advisory_index: bool,
}

#[derive(Debug)]
pub enum MatrixSelection {
    Sparse(SparseMatrix),
    Dense(DenseMatrix),
    Table(PixelTable),
}

impl MatrixSelection {
    pub fn into_sparse(self) -> Option<SparseMatrix> {
        match self {
            MatrixSelection::Sparse(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_dense(self) -> Option<DenseMatrix> {
        match self {
            MatrixSelection::Dense(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_table(self) -> Option<PixelTable> {
        match self {
            MatrixSelection::Table(t) => Some(t),
            _ => None,
        }
    }
}

///
/// Sparse matrix of a rectangle from its triples.
///
/// # Arguments
/// - triples: entries in the caller's frame
/// - origin: `(i0, j0)`, the global ids of local row and column 0
/// - shape: `(i1 - i0, j1 - j0)`
/// - bias: per-row and per-column weights when balancing
pub fn assemble_sparse(
    triples: &Triples,
    origin: (u64, u64),
    shape: (usize, usize),
    bias: Option<(&[f64], &[f64])>,
) -> Result<SparseMatrix> {
    let rows = local_ids(&triples.rows, origin.0, shape.0)?;
    let cols = local_ids(&triples.cols, origin.1, shape.1)?;

    match (bias, &triples.values) {
        (None, ColumnData::Int(values)) => Ok(SparseMatrix::Int(TriMat::from_triplets(
            shape,
            rows,
            cols,
            values.clone(),
        ))),
        (None, ColumnData::Float(values)) => Ok(SparseMatrix::Float(TriMat::from_triplets(
            shape,
            rows,
            cols,
            values.clone(),
        ))),
        (Some((bias1, bias2)), values) => {
            let values = numeric(values)?;
            let balanced = (0..values.len())
                .map(|k| values[k] * bias1[rows[k]] * bias2[cols[k]])
                .collect();
            Ok(SparseMatrix::Float(TriMat::from_triplets(shape, rows, cols, balanced)))
        }
        (None, other) => Err(CoolerError::InvalidRange(format!(
            "can't build a matrix from a {} column",
            other.kind()
        ))),
    }
}

///
/// Dense matrix of a rectangle. Unfilled cells are zero; balancing scales
/// every cell by the outer product of the biases.
///
pub fn assemble_dense(
    triples: &Triples,
    origin: (u64, u64),
    shape: (usize, usize),
    bias: Option<(&[f64], &[f64])>,
) -> Result<DenseMatrix> {
    let dense = assemble_sparse(triples, origin, shape, None)?.to_dense();
    match bias {
        None => Ok(dense),
        Some((bias1, bias2)) => {
            let mut arr = dense.to_f64();
            for ((r, c), v) in arr.indexed_iter_mut() {
                *v *= bias1[r] * bias2[c];
            }
            Ok(DenseMatrix::Float(arr))
        }
    }
}

///
/// Rebuild a sparse matrix from a pixel table holding `bin1_id`, `bin2_id`
/// and a value column.
///
pub fn sparse_from_table(
    table: &Table,
    value: &str,
    origin: (u64, u64),
    shape: (usize, usize),
) -> Result<SparseMatrix> {
    let ids = |name: &str| -> Result<Vec<u64>> {
        table
            .column(name)?
            .as_int()
            .map(|v| v.iter().map(|&x| x as u64).collect())
            .ok_or_else(|| CoolerError::InvalidRange(format!("'{}' must be an integer column", name)))
    };
    let triples = Triples {
        rows: ids(BIN1_ID)?,
        cols: ids(BIN2_ID)?,
        values: table.column(value)?.clone(),
        pixel_ids: None,
        unique_ids: true,
    };
    assemble_sparse(&triples, origin, shape, None)
}

// global bin ids to zero-based positions in [0, n)
fn local_ids(ids: &[u64], origin: u64, n: usize) -> Result<Vec<usize>> {
    ids.iter()
        .map(|&id| {
            id.checked_sub(origin)
                .map(|k| k as usize)
                .filter(|&k| k < n)
                .ok_or_else(|| {
                    CoolerError::InvalidRange(format!(
                        "bin {} is outside [{}, {})",
                        id,
                        origin,
                        origin + n as u64
                    ))
                })
        })
        .collect()
}

fn numeric(values: &ColumnData) -> Result<Vec<f64>> {
    values.to_f64().ok_or_else(|| {
        CoolerError::InvalidRange(format!("can't balance a {} column", values.kind()))
    })
}

///
/// Matrix queries with fixed [MatrixOptions] over an open [Cooler].
///
#[derive(Debug, Clone)]
pub struct MatrixSelector<'a> {
    cooler: &'a Cooler,
    options: MatrixOptions,
}

impl<'a> MatrixSelector<'a> {
    pub fn new(cooler: &'a Cooler, options: MatrixOptions) -> Self {
        MatrixSelector { cooler, options }
    }

    pub fn options(&self) -> &MatrixOptions {
        &self.options
    }

    pub fn shape(&self) -> (u64, u64) {
        self.cooler.shape()
    }

    /// Rectangle of a region against itself.
    pub fn fetch<R: IntoRegion>(&self, region: R) -> Result<MatrixSelection> {
        let (i0, i1) = self.cooler.extent(region)?;
        self.slice(i0, i1, i0, i1)
    }

    /// Rectangle of rows from `region` and columns from `region2`.
    pub fn fetch_pair<R1: IntoRegion, R2: IntoRegion>(
        &self,
        region: R1,
        region2: R2,
    ) -> Result<MatrixSelection> {
        let (i0, i1) = self.cooler.extent(region)?;
        let (j0, j1) = self.cooler.extent(region2)?;
        self.slice(i0, i1, j0, j1)
    }

    pub fn slice(&self, i0: u64, i1: u64, j0: u64, j1: u64) -> Result<MatrixSelection> {
        let reader = self.cooler.reader();
        let config = self.cooler.config();
        let options = &self.options;

        // checked against the cached schema, before any column is read
        if options.balance && !reader.has_column(BINS_GROUP, WEIGHT) {
            return Err(CoolerError::MissingWeights);
        }
        let field = options.field.as_deref().unwrap_or(&config.default_field);
        let max_chunk = options.max_chunk.unwrap_or(config.max_chunk);
        let with_ids = options.output == MatrixOutput::Table && !options.ignore_index;

        let triples = TriangularMatrixReader::new(self.cooler, field, max_chunk)?
            .with_pixel_ids(with_ids)
            .query(i0, i1, j0, j1)?;

        // query() clamps, so clamp here too for the output frame
        let nbins = self.cooler.nbins();
        let (i0, i1) = (i0.min(nbins), i1.min(nbins));
        let (j0, j1) = (j0.min(nbins), j1.min(nbins));
        let shape = ((i1 - i0) as usize, (j1 - j0) as usize);
        debug!(
            "Assembling {:?} of [{}, {}) x [{}, {}) from {} entries",
            options.output,
            i0,
            i1,
            j0,
            j1,
            triples.len()
        );

        match options.output {
            MatrixOutput::Sparse | MatrixOutput::Dense => {
                let bias = match options.balance {
                    true => Some(self.biases(i0, i1, j0, j1)?),
                    false => None,
                };
                let bias = bias.as_ref().map(|(b1, b2)| (b1.as_slice(), b2.as_slice()));
                match options.output {
                    MatrixOutput::Dense => Ok(MatrixSelection::Dense(assemble_dense(
                        &triples,
                        (i0, j0),
                        shape,
                        bias,
                    )?)),
                    _ => Ok(MatrixSelection::Sparse(assemble_sparse(
                        &triples,
                        (i0, j0),
                        shape,
                        bias,
                    )?)),
                }
            }
            MatrixOutput::Table => {
                let table = self.assemble_table(triples, field, (i0, i1), (j0, j1))?;
                Ok(MatrixSelection::Table(table))
            }
        }
    }

    fn weights(&self, lo: u64, hi: u64) -> Result<Vec<f64>> {
        let weights = self.cooler.reader().read_column(BINS_GROUP, WEIGHT, lo, hi, true)?;
        numeric(&weights)
    }

    fn biases(&self, i0: u64, i1: u64, j0: u64, j1: u64) -> Result<(Vec<f64>, Vec<f64>)> {
        let bias1 = self.weights(i0, i1)?;
        let bias2 = match (i0, i1) == (j0, j1) {
            true => bias1.clone(),
            false => self.weights(j0, j1)?,
        };
        Ok((bias1, bias2))
    }

    fn assemble_table(
        &self,
        triples: Triples,
        field: &str,
        (i0, i1): (u64, u64),
        (j0, j1): (u64, u64),
    ) -> Result<PixelTable> {
        let Triples {
            rows,
            cols,
            values,
            pixel_ids,
            unique_ids,
        } = triples;
        let mut table = Table::new(
            vec![
                Column::new(BIN1_ID, ColumnData::Int(rows.iter().map(|&r| r as i64).collect())),
                Column::new(BIN2_ID, ColumnData::Int(cols.iter().map(|&c| c as i64).collect())),
                Column::new(field, values),
            ],
            pixel_ids,
        )?;

        let (lo, hi) = (i0.min(j0), i1.max(j1));
        let options = &self.options;

        if options.balance {
            // by position: the field itself may be named like a bin column
            let window = self.cooler.bins().columns(&[WEIGHT]).slice(lo, hi)?;
            let base = bin_table_base(&window)?;
            let nbins = window.nrows() as u64;
            let weights = numeric(window.column(WEIGHT)?)?;
            let pos1 = gather_positions(table.column(BIN1_ID)?, BIN1_ID, base, nbins)?;
            let pos2 = gather_positions(table.column(BIN2_ID)?, BIN2_ID, base, nbins)?;
            let v = numeric(table.column(field)?)?;
            let balanced = (0..v.len())
                .map(|k| weights[pos1[k]] * weights[pos2[k]] * v[k])
                .collect();
            table.push_column(Column::new(BALANCED, ColumnData::Float(balanced)))?;
        }

        if options.join {
            let window = self.cooler.bins().columns(&BIN_COLUMNS).slice(lo, hi)?;
            table = annotate(&table, &window, true)?;
        }

        Ok(PixelTable {
            advisory_index: table.index().is_some() && !unique_ids,
            table,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn triples() -> Triples {
        // bins 4..7, diagonal block mirrored
        Triples {
            rows: vec![4, 4, 5, 6],
            cols: vec![4, 6, 5, 4],
            values: ColumnData::Int(vec![5, 3, 7, 3]),
            pixel_ids: None,
            unique_ids: false,
        }
    }

    #[rstest]
    fn test_assemble_sparse_keeps_int(triples: Triples) {
        let m = assemble_sparse(&triples, (4, 4), (3, 3), None).unwrap();
        assert!(matches!(m, SparseMatrix::Int(_)));
        assert_eq!(
            m.triplets(),
            vec![(0, 0, 5.0), (0, 2, 3.0), (1, 1, 7.0), (2, 0, 3.0)]
        );
    }

    #[rstest]
    fn test_assemble_sparse_balanced(triples: Triples) {
        let bias = [1.0, 0.5, 2.0];
        let m = assemble_sparse(&triples, (4, 4), (3, 3), Some((&bias[..], &bias[..]))).unwrap();
        assert!(matches!(m, SparseMatrix::Float(_)));
        assert_eq!(
            m.triplets(),
            vec![(0, 0, 5.0), (0, 2, 6.0), (1, 1, 1.75), (2, 0, 6.0)]
        );
    }

    #[rstest]
    fn test_assemble_dense_outer_product(triples: Triples) {
        let bias = [1.0, f64::NAN, 2.0];
        let m = assemble_dense(&triples, (4, 4), (3, 3), Some((&bias[..], &bias[..]))).unwrap();
        let arr = match m {
            DenseMatrix::Float(arr) => arr,
            other => panic!("expected a float matrix, got {:?}", other),
        };
        assert_eq!(arr[[0, 2]], 6.0);
        assert_eq!(arr[[2, 2]], 0.0);
        assert!(arr[[1, 0]].is_nan());
        assert!(arr[[1, 1]].is_nan());
    }

    #[rstest]
    fn test_assemble_rejects_foreign_ids(triples: Triples) {
        assert!(matches!(
            assemble_sparse(&triples, (5, 4), (3, 3), None),
            Err(CoolerError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_options_defaults() {
        let options = MatrixOptions::default();
        assert!(options.balance);
        assert!(options.join);
        assert!(options.ignore_index);
        assert_eq!(options.output, MatrixOutput::Sparse);
        assert_eq!(options.clone().field("balanced").field, Some("balanced".to_string()));
    }
}
