//! Key-format generators (§4.8.1): one function per catalog pattern,
//! each producing a single key string from caller-supplied randomness so
//! the generator's per-document RNG reseed determines the whole document.

use rand::Rng;
use std::time::{SystemTime, UNIX_EPOCH};

const CROCKFORD_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PREFIXES: &[&str] = &["user", "doc", "item", "order"];

pub fn uuid_v4(rng: &mut impl Rng) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// 12 bytes: a big-endian Unix-seconds prefix followed by 8 random bytes,
/// hex-encoded to the canonical 24-character ObjectId form.
pub fn mongodb_object_id(rng: &mut impl Rng) -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32;
    let mut bytes = [0u8; 12];
    bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
    rng.fill(&mut bytes[4..12]);
    hex::encode(bytes)
}

/// A 48-bit millisecond timestamp followed by 80 bits of randomness,
/// Crockford base32 encoded to 26 characters.
pub fn ulid(rng: &mut impl Rng) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let randomness: u128 = rng.gen::<u128>() & ((1u128 << 80) - 1);
    let value = ((millis as u128) << 80) | randomness;
    let mut buffer = [0u8; 26];
    for (i, byte) in buffer.iter_mut().rev().enumerate() {
        *byte = CROCKFORD_ALPHABET[((value >> (i * 5)) & 0x1F) as usize];
    }
    String::from_utf8(buffer.to_vec()).expect("crockford alphabet is ascii")
}

/// A decimal identifier in `[10^5, 10^9 - 1]`.
pub fn numeric_id(rng: &mut impl Rng) -> String {
    rng.gen_range(100_000i64..1_000_000_000i64).to_string()
}

/// `{user|doc|item|order}_` followed by 16 lowercase alphanumerics.
pub fn prefixed_id(rng: &mut impl Rng) -> String {
    let prefix = PREFIXES[rng.gen_range(0..PREFIXES.len())];
    let suffix = random_alphanumeric(rng, 16);
    format!("{prefix}_{suffix}")
}

fn random_alphanumeric(rng: &mut impl Rng, len: usize) -> String {
    (0..len)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

/// Fallback for a custom or unrecognized pattern name: there is no stored
/// regex to synthesize against in a persisted generation schema, so this
/// produces a plausible opaque key rather than refusing to generate.
pub fn generic_id(rng: &mut impl Rng) -> String {
    format!("key_{}", random_alphanumeric(rng, 12))
}

pub fn generate_key(pattern_name: Option<&str>, rng: &mut impl Rng) -> String {
    match pattern_name {
        Some("UUID") => uuid_v4(rng),
        Some("MONGODB_OBJECTID") => mongodb_object_id(rng),
        Some("ULID") => ulid(rng),
        Some("NUMERIC_ID") => numeric_id(rng),
        Some("PREFIXED_ID") => prefixed_id(rng),
        _ => generic_id(rng),
    }
}
