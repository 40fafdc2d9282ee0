//! BLAKE3-based identifiers and request fingerprints.


use blake3::Hasher;

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for Qdrant point ids, where a collision maps two products onto one point.
/// At catalog scale (millions of products) the probability is negligible.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Stable numeric point id for a product identifier.
#[inline]
pub fn product_point_id(product_id: &str) -> u64 {
    hash_to_u64(product_id.as_bytes())
}

/// Short hex tag for a model id, embedded in vector cache keys.
///
/// Switching models must never serve vectors produced by the previous one.
pub fn model_tag(model: &str) -> String {
    hex_prefix(&blake3::hash(model.as_bytes()), 8)
}

/// Fingerprint of a JSON value.
///
/// Object keys are sorted before hashing, so logically equal values fingerprint identically.
pub fn fingerprint(value: &serde_json::Value) -> String {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);

    let mut hasher = Hasher::new();
    hasher.update(canonical.as_bytes());
    hex_prefix(&hasher.finalize(), 16)
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn hex_prefix(hash: &blake3::Hash, chars: usize) -> String {
    hash.to_hex()[..chars].to_string()
}
