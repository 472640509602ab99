//! Descriptor blob encoding: packed little-endian `f64` values.

const VALUE_SIZE: usize = std::mem::size_of::<f64>();

pub fn encode_values(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * VALUE_SIZE);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode a blob. Returns `None` if its length is not a whole number of values.
pub fn decode_values(bytes: &[u8]) -> Option<Vec<f64>> {
    if bytes.len() % VALUE_SIZE != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(VALUE_SIZE)
            .map(|chunk| {
                let mut raw = [0u8; VALUE_SIZE];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect(),
    )
}
