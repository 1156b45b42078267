use crate::errors::{CoolerError, Result};
use crate::storage::writer::Bin;

///
/// Parse a number with an optional `k`/`M`/`G` suffix and thousands separators,
/// e.g. `"1,500"`, `"2k"` or `"1.5M"`.
///
pub fn parse_humanized(s: &str) -> Result<u64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    let bad = || CoolerError::InvalidRange(format!("Can't parse genomic coordinate: '{}'", s));

    let (digits, multiplier) = match cleaned.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('k') => (&cleaned[..cleaned.len() - 1], 1_000u64),
        Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000u64),
        Some('g') => (&cleaned[..cleaned.len() - 1], 1_000_000_000u64),
        Some(_) => (cleaned.as_str(), 1u64),
        None => return Err(bad()),
    };

    if let Ok(v) = digits.parse::<u64>() {
        return v.checked_mul(multiplier).ok_or_else(bad);
    }
    if multiplier == 1 {
        return Err(bad());
    }
    let v: f64 = digits.parse().map_err(|_| bad())?;
    let scaled = v * multiplier as f64;
    if !scaled.is_finite() || scaled < 0.0 || scaled.fract() != 0.0 {
        return Err(bad());
    }
    Ok(scaled as u64)
}

///
/// Split a UCSC-style region string into its parts.
///
/// Accepts `chrom`, `chrom:start`, `chrom:start-` and `chrom:start-end`.
///
/// # Returns
/// - (chrom, start, end), with missing bounds as `None`
pub fn parse_region_string(s: &str) -> Result<(String, Option<u64>, Option<u64>)> {
    let s = s.trim();
    let (chrom, range) = match s.rsplit_once(':') {
        Some((chrom, range)) => (chrom, Some(range)),
        None => (s, None),
    };

    if chrom.is_empty() || chrom.chars().any(char::is_whitespace) {
        return Err(CoolerError::InvalidRange(format!("Invalid region string: '{}'", s)));
    }

    let (start, end) = match range {
        None => (None, None),
        Some(range) => match range.split_once('-') {
            Some((start, end)) if end.trim().is_empty() => (Some(parse_humanized(start)?), None),
            Some((start, end)) => (Some(parse_humanized(start)?), Some(parse_humanized(end)?)),
            None => (Some(parse_humanized(range)?), None),
        },
    };

    Ok((chrom.to_string(), start, end))
}

///
/// Divide each chromosome into bins of a fixed width. The last bin of every
/// chromosome is truncated to the chromosome length.
///
/// # Arguments
/// - chromsizes: (name, length) in table order
/// - binsize: bin width in bp
pub fn binnify(chromsizes: &[(String, u64)], binsize: u64) -> Result<Vec<Bin>> {
    if binsize == 0 {
        return Err(CoolerError::InvalidRange("bin size must be positive".to_string()));
    }

    let mut bins = Vec::new();
    for (chrom, (_, length)) in chromsizes.iter().enumerate() {
        let mut start = 0;
        while start < *length {
            let end = (start + binsize).min(*length);
            bins.push(Bin { chrom, start, end });
            start = end;
        }
    }
    Ok(bins)
}
