pub mod region;
pub mod table;

// re-export for cleaner imports
pub use self::region::{GenomicRegion, IntoRegion};
pub use self::table::{Column, ColumnData, Table};
