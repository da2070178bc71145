//! Wire/storage codecs for the catalog's blob and JSON-text columns.
//!
//! `vector_values.payload` is a small self-describing binary encoding (kind
//! tag + length-prefixed floats/indices) rather than JSON, since it sits on
//! the hot upsert/search path; `indexes.hnsw_cfg`/`quant_cfg` are JSON text,
//! since they're read once per Index load, not once per vector.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;
use vdb_core::{Error, HnswConfig, QuantConfig, Result, ValueKind, VectorPayload};

const TAG_DENSE: u8 = 0;
const TAG_SPARSE: u8 = 1;
const TAG_MULTI_VECTOR: u8 = 2;

/// Encode a [`VectorPayload`] into the `vector_values.payload` blob format.
pub fn encode_payload(payload: &VectorPayload) -> Vec<u8> {
    let mut out = Vec::new();
    match payload {
        VectorPayload::Dense(v) => {
            out.write_u8(TAG_DENSE).unwrap();
            out.write_u32::<LittleEndian>(v.len() as u32).unwrap();
            for &x in v {
                out.write_f32::<LittleEndian>(x).unwrap();
            }
        }
        VectorPayload::Sparse { indices, values } => {
            out.write_u8(TAG_SPARSE).unwrap();
            out.write_u32::<LittleEndian>(indices.len() as u32).unwrap();
            for &i in indices {
                out.write_i32::<LittleEndian>(i).unwrap();
            }
            for &v in values {
                out.write_f32::<LittleEndian>(v).unwrap();
            }
        }
        VectorPayload::MultiVector { rows, data } => {
            out.write_u8(TAG_MULTI_VECTOR).unwrap();
            out.write_i32::<LittleEndian>(*rows).unwrap();
            out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
            for &x in data {
                out.write_f32::<LittleEndian>(x).unwrap();
            }
        }
    }
    out
}

/// Decode a `vector_values.payload` blob written by [`encode_payload`].
pub fn decode_payload(bytes: &[u8]) -> Result<VectorPayload> {
    let mut cur = Cursor::new(bytes);
    let tag = cur
        .read_u8()
        .map_err(|e| Error::Storage(format!("corrupt vector payload: {e}")))?;
    match tag {
        TAG_DENSE => {
            let len = cur.read_u32::<LittleEndian>()? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(cur.read_f32::<LittleEndian>()?);
            }
            Ok(VectorPayload::Dense(v))
        }
        TAG_SPARSE => {
            let len = cur.read_u32::<LittleEndian>()? as usize;
            let mut indices = Vec::with_capacity(len);
            for _ in 0..len {
                indices.push(cur.read_i32::<LittleEndian>()?);
            }
            let mut values = Vec::with_capacity(len);
            for _ in 0..len {
                values.push(cur.read_f32::<LittleEndian>()?);
            }
            Ok(VectorPayload::Sparse { indices, values })
        }
        TAG_MULTI_VECTOR => {
            let rows = cur.read_i32::<LittleEndian>()?;
            let len = cur.read_u32::<LittleEndian>()? as usize;
            let mut data = Vec::with_capacity(len);
            for _ in 0..len {
                data.push(cur.read_f32::<LittleEndian>()?);
            }
            Ok(VectorPayload::MultiVector { rows, data })
        }
        other => Err(Error::Storage(format!("unknown vector payload tag {other}"))),
    }
}

/// `ValueKind` as stored in `vectors.kind` / `vector_values.kind` / `indexes.value_kind`.
pub fn kind_to_str(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Dense => "dense",
        ValueKind::Sparse => "sparse",
        ValueKind::MultiVector => "multi_vector",
        ValueKind::Combined => "combined",
    }
}

/// Parse a `ValueKind` column value written by [`kind_to_str`].
pub fn kind_from_str(s: &str) -> Result<ValueKind> {
    match s {
        "dense" => Ok(ValueKind::Dense),
        "sparse" => Ok(ValueKind::Sparse),
        "multi_vector" => Ok(ValueKind::MultiVector),
        "combined" => Ok(ValueKind::Combined),
        other => Err(Error::Storage(format!("unknown value kind {other:?}"))),
    }
}

/// Serialise `hnsw_cfg`/`quant_cfg` to the JSON text stored in `indexes`.
pub fn encode_hnsw_config(cfg: &HnswConfig) -> String {
    serde_json::to_string(cfg).expect("HnswConfig serialises")
}

/// Parse the `indexes.hnsw_cfg` column.
pub fn decode_hnsw_config(s: &str) -> Result<HnswConfig> {
    serde_json::from_str(s).map_err(Into::into)
}

/// Serialise `indexes.quant_cfg`.
pub fn encode_quant_config(cfg: &QuantConfig) -> String {
    serde_json::to_string(cfg).expect("QuantConfig serialises")
}

/// Parse the `indexes.quant_cfg` column.
pub fn decode_quant_config(s: &str) -> Result<QuantConfig> {
    serde_json::from_str(s).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_payload_round_trips() {
        let p = VectorPayload::Dense(vec![0.25, 0.45, 0.75, 0.85]);
        let bytes = encode_payload(&p);
        assert_eq!(decode_payload(&bytes).unwrap(), p);
    }

    #[test]
    fn sparse_payload_round_trips() {
        let p = VectorPayload::Sparse {
            indices: vec![0, 2],
            values: vec![0.5, 0.8],
        };
        let bytes = encode_payload(&p);
        assert_eq!(decode_payload(&bytes).unwrap(), p);
    }

    #[test]
    fn multi_vector_payload_round_trips() {
        let p = VectorPayload::MultiVector {
            rows: 2,
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        let bytes = encode_payload(&p);
        assert_eq!(decode_payload(&bytes).unwrap(), p);
    }

    #[test]
    fn hnsw_config_round_trips() {
        let cfg = HnswConfig {
            m: 8,
            ef_construction: 50,
            ef_search: 32,
        };
        let s = encode_hnsw_config(&cfg);
        assert_eq!(decode_hnsw_config(&s).unwrap(), cfg);
    }
}
