//! The on-disk container: a directory of column files grouped into tables.
//!
//! ```text
//! <root>/attrs.json
//! <root>/{chroms,bins,pixels,indexes}/schema.json
//! <root>/{chroms,bins,pixels,indexes}/<column>.col
//! ```
pub mod column;
pub mod reader;
pub mod schema;
pub mod writer;

pub use reader::{Attributes, BinType, ContainerReader};
pub use schema::{ColumnSelection, ColumnType, TableSchema};
pub use writer::{Bin, CoolerBuilder, Pixel};
