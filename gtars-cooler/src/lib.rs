//! # Range queries over genomic contact matrices.
//!
//! A contact map is a symmetric sparse matrix indexed by genomic bins. This
//! crate stores it as its upper triangle in a chunked, columnar container and
//! answers rectangular queries over the full matrix:
//!
//! - genomic regions resolve to bin-id extents through a [CoordinateIndex],
//! - row ranges of the `chroms`, `bins` and `pixels` tables are read with a
//!   [TableSelector],
//! - any rectangle of the matrix, including one that straddles the diagonal,
//!   is read with a [MatrixSelector] as sparse, dense or tabular output,
//!   optionally balanced with the `bins/weight` column,
//! - pixel tables can be joined with bin metadata with [annotate].
//!
//! ```ignore
//! use gtars_cooler::{Cooler, MatrixOptions, MatrixOutput};
//!
//! let clr = Cooler::open("sample.cool")?;
//! let bins = clr.bins().fetch("chr2:0-10")?;
//! let table = clr
//!     .matrix(MatrixOptions::default().output(MatrixOutput::Table))
//!     .fetch_pair("chr1", "chr2")?;
//! ```
//!
pub mod annotate;
pub mod config;
pub mod consts;
pub mod cooler;
pub mod errors;
pub mod extract;
pub mod index;
pub mod matrix;
pub mod models;
pub mod selector;
pub mod storage;
pub mod triu;
pub mod utils;

// re-export the public surface
pub use annotate::{annotate, annotate_from_selector};
pub use config::CoolerConfig;
pub use cooler::Cooler;
pub use errors::{CoolerError, Result};
pub use extract::extract_chromosome;
pub use index::CoordinateIndex;
pub use matrix::{
    DenseMatrix, MatrixOptions, MatrixOutput, MatrixSelection, MatrixSelector, PixelTable,
    SparseMatrix,
};
pub use models::{Column, ColumnData, GenomicRegion, IntoRegion, Table};
pub use selector::{TableKind, TableSelector};
pub use storage::{ColumnSelection, CoolerBuilder, Pixel};
pub use triu::{TriangularMatrixReader, Triples};
