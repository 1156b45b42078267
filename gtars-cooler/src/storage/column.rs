//! Little-endian codecs between raw column bytes and [ColumnData].
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::errors::{CoolerError, Result};
use crate::models::ColumnData;
use crate::storage::schema::{ColumnType, Dtype, NumericType};

fn decode_ints(ntype: NumericType, bytes: &[u8]) -> Result<Vec<i64>> {
    let n = bytes.len() / ntype.itemsize();
    let values = match ntype {
        NumericType::Int32 => {
            let mut buf = vec![0i32; n];
            LittleEndian::read_i32_into(bytes, &mut buf);
            buf.into_iter().map(i64::from).collect()
        }
        NumericType::Int64 => {
            let mut buf = vec![0i64; n];
            LittleEndian::read_i64_into(bytes, &mut buf);
            buf
        }
        NumericType::UInt32 => {
            let mut buf = vec![0u32; n];
            LittleEndian::read_u32_into(bytes, &mut buf);
            buf.into_iter().map(i64::from).collect()
        }
        NumericType::UInt64 => {
            let mut buf = vec![0u64; n];
            LittleEndian::read_u64_into(bytes, &mut buf);
            buf.into_iter()
                .map(|v| {
                    i64::try_from(v).map_err(|_| {
                        CoolerError::MalformedStorage(format!("value {} overflows i64", v))
                    })
                })
                .collect::<Result<Vec<i64>>>()?
        }
        NumericType::Float32 | NumericType::Float64 => {
            return Err(CoolerError::MalformedStorage(
                "expected an integer column, found floats".to_string(),
            ));
        }
    };
    Ok(values)
}

fn decode_floats(ntype: NumericType, bytes: &[u8]) -> Vec<f64> {
    let n = bytes.len() / ntype.itemsize();
    match ntype {
        NumericType::Float32 => {
            let mut buf = vec![0f32; n];
            LittleEndian::read_f32_into(bytes, &mut buf);
            buf.into_iter().map(f64::from).collect()
        }
        _ => {
            let mut buf = vec![0f64; n];
            LittleEndian::read_f64_into(bytes, &mut buf);
            buf
        }
    }
}

///
/// Decode a run of rows of one column.
///
/// # Arguments
/// - ctype: the column's schema type
/// - bytes: whole rows, `len % ctype.itemsize() == 0`
/// - convert_enum: decode categorical codes into labels; raw codes otherwise
pub fn decode_column(ctype: &ColumnType, bytes: &[u8], convert_enum: bool) -> Result<ColumnData> {
    match ctype {
        ColumnType::Numeric(n) if n.is_float() => Ok(ColumnData::Float(decode_floats(*n, bytes))),
        ColumnType::Numeric(n) => Ok(ColumnData::Int(decode_ints(*n, bytes)?)),
        ColumnType::Text { width } => {
            let strings = bytes
                .chunks_exact(*width)
                .map(|chunk| {
                    let end = chunk.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                    String::from_utf8(chunk[..end].to_vec()).map_err(|_| {
                        CoolerError::MalformedStorage("text column is not valid UTF-8".to_string())
                    })
                })
                .collect::<Result<Vec<String>>>()?;
            Ok(ColumnData::Text(strings))
        }
        ColumnType::Categorical { codes, dictionary } => {
            let raw = decode_ints(*codes, bytes)?;
            if !convert_enum {
                return Ok(ColumnData::Int(raw));
            }
            let positions = raw
                .into_iter()
                .map(|code| {
                    dictionary.position(code).ok_or_else(|| {
                        CoolerError::MalformedStorage(format!("unknown enum code {}", code))
                    })
                })
                .collect::<Result<Vec<u32>>>()?;
            Ok(ColumnData::Categorical {
                codes: positions,
                labels: Arc::clone(dictionary.labels()),
            })
        }
    }
}

///
/// Decode an index column into unsigned offsets.
///
pub fn decode_offsets(ctype: &ColumnType, bytes: &[u8]) -> Result<Vec<u64>> {
    let ntype = match ctype {
        ColumnType::Numeric(n) if !n.is_float() => *n,
        _ => {
            return Err(CoolerError::MalformedStorage(
                "index columns must be plain integers".to_string(),
            ));
        }
    };
    decode_ints(ntype, bytes)?
        .into_iter()
        .map(|v| {
            u64::try_from(v)
                .map_err(|_| CoolerError::MalformedStorage(format!("negative offset {}", v)))
        })
        .collect()
}

fn out_of_range(v: impl std::fmt::Display, dtype: Dtype) -> CoolerError {
    CoolerError::InvalidRange(format!("value {} does not fit {:?}", v, dtype))
}

///
/// Encode column values into the on-disk representation of `dtype`.
/// Categorical columns are written as their codes.
///
pub fn encode_column(dtype: Dtype, data: &ColumnData) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::with_capacity(data.len() * dtype.itemsize());

    let ints: Vec<i64> = match data {
        ColumnData::Int(v) => v.clone(),
        ColumnData::Categorical { codes, .. } => codes.iter().map(|&c| i64::from(c)).collect(),
        ColumnData::Float(v) => {
            for &x in v {
                match dtype {
                    Dtype::Float32 => buf.write_f32::<LittleEndian>(x as f32)?,
                    Dtype::Float64 => buf.write_f64::<LittleEndian>(x)?,
                    _ => return Err(out_of_range(x, dtype)),
                }
            }
            return Ok(buf);
        }
        ColumnData::Text(v) => {
            let Dtype::Bytes(width) = dtype else {
                return Err(CoolerError::InvalidRange(format!(
                    "text cannot be stored as {:?}",
                    dtype
                )));
            };
            for s in v {
                let bytes = s.as_bytes();
                if bytes.len() > width || bytes.contains(&0) {
                    return Err(out_of_range(s, dtype));
                }
                buf.extend_from_slice(bytes);
                buf.resize(buf.len() + width - bytes.len(), 0);
            }
            return Ok(buf);
        }
    };

    for x in ints {
        match dtype {
            Dtype::Int32 => {
                buf.write_i32::<LittleEndian>(i32::try_from(x).map_err(|_| out_of_range(x, dtype))?)?
            }
            Dtype::Int64 => buf.write_i64::<LittleEndian>(x)?,
            Dtype::Uint32 => {
                buf.write_u32::<LittleEndian>(u32::try_from(x).map_err(|_| out_of_range(x, dtype))?)?
            }
            Dtype::Uint64 => {
                buf.write_u64::<LittleEndian>(u64::try_from(x).map_err(|_| out_of_range(x, dtype))?)?
            }
            Dtype::Float32 => buf.write_f32::<LittleEndian>(x as f32)?,
            Dtype::Float64 => buf.write_f64::<LittleEndian>(x as f64)?,
            Dtype::Bytes(_) => return Err(out_of_range(x, dtype)),
        }
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ColumnSpec;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    fn test_text_is_nul_trimmed() {
        let data = ColumnData::Text(vec!["chr1".to_string(), "chrX_alt".to_string()]);
        let bytes = encode_column(Dtype::Bytes(8), &data).unwrap();
        assert_eq!(bytes.len(), 16);
        let decoded = decode_column(&ColumnType::Text { width: 8 }, &bytes, true).unwrap();
        assert_eq!(decoded, data);
    }

    #[rstest]
    fn test_text_too_wide() {
        let data = ColumnData::Text(vec!["chromosome1".to_string()]);
        assert!(encode_column(Dtype::Bytes(4), &data).is_err());
    }

    #[rstest]
    fn test_categorical_codes_map_to_labels() {
        let labels = vec!["chr1".to_string(), "chr2".to_string(), "chr3".to_string()];
        let spec = ColumnSpec::new("chrom", Dtype::Int32).with_enum(&labels);
        let ctype = ColumnType::from_spec(&spec).unwrap();
        let bytes = encode_column(Dtype::Int32, &ColumnData::Int(vec![2, 0, 0])).unwrap();

        let decoded = decode_column(&ctype, &bytes, true).unwrap();
        assert_eq!(decoded.labels().unwrap(), vec!["chr3", "chr1", "chr1"]);

        let raw = decode_column(&ctype, &bytes, false).unwrap();
        assert_eq!(raw, ColumnData::Int(vec![2, 0, 0]));

        let bad = encode_column(Dtype::Int32, &ColumnData::Int(vec![9])).unwrap();
        assert!(matches!(
            decode_column(&ctype, &bad, true),
            Err(CoolerError::MalformedStorage(_))
        ));
    }

    #[rstest]
    #[case(Dtype::Int32, NumericType::Int32)]
    #[case(Dtype::Uint64, NumericType::UInt64)]
    fn test_offsets(#[case] dtype: Dtype, #[case] ntype: NumericType) {
        let bytes = encode_column(dtype, &ColumnData::Int(vec![0, 3, 3, 7])).unwrap();
        let offsets = decode_offsets(&ColumnType::Numeric(ntype), &bytes).unwrap();
        assert_eq!(offsets, vec![0, 3, 3, 7]);
    }

    #[rstest]
    fn test_negative_offsets_rejected() {
        let bytes = encode_column(Dtype::Int64, &ColumnData::Int(vec![0, -1])).unwrap();
        let res = decode_offsets(&ColumnType::Numeric(NumericType::Int64), &bytes);
        assert!(matches!(res, Err(CoolerError::MalformedStorage(_))));
    }

    #[rstest]
    fn test_float32_widened() {
        let bytes = encode_column(Dtype::Float32, &ColumnData::Float(vec![0.5, 2.0])).unwrap();
        let decoded =
            decode_column(&ColumnType::Numeric(NumericType::Float32), &bytes, true).unwrap();
        assert_eq!(decoded, ColumnData::Float(vec![0.5, 2.0]));
    }
}
