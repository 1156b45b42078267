use std::fmt::{self, Display};
use std::str::FromStr;

use crate::errors::{CoolerError, Result};
use crate::utils::parse_region_string;

///
/// A genomic query region. Missing bounds mean "from the chromosome start" and
/// "to the chromosome end".
///
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
pub struct GenomicRegion {
    pub chrom: String,
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl GenomicRegion {
    pub fn new(chrom: &str, start: u64, end: u64) -> Self {
        GenomicRegion {
            chrom: chrom.to_string(),
            start: Some(start),
            end: Some(end),
        }
    }

    /// The whole chromosome.
    pub fn chrom(chrom: &str) -> Self {
        GenomicRegion {
            chrom: chrom.to_string(),
            start: None,
            end: None,
        }
    }

    ///
    /// Fill in missing bounds from the chromosome length and check the result.
    ///
    /// # Arguments
    /// - chromsize: length of `self.chrom` in bp
    ///
    /// # Returns
    /// - the concrete half-open interval `(start, end)`
    pub fn bounds(&self, chromsize: u64) -> Result<(u64, u64)> {
        let start = self.start.unwrap_or(0);
        let end = self.end.unwrap_or(chromsize);

        if start > end {
            return Err(CoolerError::InvalidRange(format!(
                "End cannot be less than start: {}",
                self
            )));
        }
        if end > chromsize {
            return Err(CoolerError::InvalidRange(format!(
                "Genomic region out of bounds: [{}, {}) on {} of length {}",
                start, end, self.chrom, chromsize
            )));
        }
        Ok((start, end))
    }
}

impl FromStr for GenomicRegion {
    type Err = CoolerError;

    fn from_str(s: &str) -> Result<Self> {
        let (chrom, start, end) = parse_region_string(s)?;
        Ok(GenomicRegion { chrom, start, end })
    }
}

impl From<(&str, u64, u64)> for GenomicRegion {
    fn from(value: (&str, u64, u64)) -> Self {
        GenomicRegion::new(value.0, value.1, value.2)
    }
}

/// Anything a selector accepts as a region: a [GenomicRegion], a region string
/// such as `"chr1:1,000-2,000"`, or a `(chrom, start, end)` tuple.
pub trait IntoRegion {
    fn into_region(self) -> Result<GenomicRegion>;
}

impl IntoRegion for GenomicRegion {
    fn into_region(self) -> Result<GenomicRegion> {
        Ok(self)
    }
}

impl IntoRegion for &GenomicRegion {
    fn into_region(self) -> Result<GenomicRegion> {
        Ok(self.clone())
    }
}

impl IntoRegion for &str {
    fn into_region(self) -> Result<GenomicRegion> {
        self.parse()
    }
}

impl IntoRegion for (&str, u64, u64) {
    fn into_region(self) -> Result<GenomicRegion> {
        Ok(self.into())
    }
}

impl Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (None, None) => write!(f, "{}", self.chrom),
            (Some(start), None) => write!(f, "{}:{}-", self.chrom, start),
            (start, Some(end)) => write!(f, "{}:{}-{}", self.chrom, start.unwrap_or(0), end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_bounds_defaults_to_whole_chrom() {
        let region = GenomicRegion::chrom("chr2");
        assert_eq!(region.bounds(20).unwrap(), (0, 20));
    }

    #[rstest]
    #[case(GenomicRegion::new("chr1", 8, 4))]
    #[case(GenomicRegion::new("chr1", 0, 21))]
    fn test_bounds_rejects(#[case] region: GenomicRegion) {
        assert!(matches!(region.bounds(20), Err(CoolerError::InvalidRange(_))));
    }

    #[rstest]
    fn test_display_round_trips() {
        let region = GenomicRegion::new("chrX", 100, 2000);
        let parsed: GenomicRegion = region.to_string().parse().unwrap();
        assert_eq!(parsed, region);
    }
}
