pub const CHROMS_GROUP: &str = "chroms";
pub const BINS_GROUP: &str = "bins";
pub const PIXELS_GROUP: &str = "pixels";
pub const INDEXES_GROUP: &str = "indexes";

pub const ATTRS_FILE: &str = "attrs.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const COLUMN_EXT: &str = "col";

pub const CHROM_OFFSET: &str = "chrom_offset";
pub const BIN1_OFFSET: &str = "bin1_offset";

pub const BIN1_ID: &str = "bin1_id";
pub const BIN2_ID: &str = "bin2_id";
pub const WEIGHT: &str = "weight";
pub const BALANCED: &str = "balanced";

pub const FORMAT: &str = "gtars::cooler";
pub const FORMAT_VERSION: u32 = 2;

pub const DEFAULT_FIELD: &str = "count";
pub const DEFAULT_MAX_CHUNK: u64 = 500_000_000;
pub const DEFAULT_EXTRACT_CHUNKSIZE: u64 = 1_000_000;

/// Leading columns of each table when every column is requested.
pub const CHROM_COLUMNS: [&str; 2] = ["name", "length"];
pub const BIN_COLUMNS: [&str; 3] = ["chrom", "start", "end"];
pub const PIXEL_COLUMNS: [&str; 3] = [BIN1_ID, BIN2_ID, DEFAULT_FIELD];
