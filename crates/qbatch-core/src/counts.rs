//! Counts-key normalization.
//!
//! The engine reports measurement outcomes as bit-strings, possibly with
//! register separators (`"1 0"`). Downstream reporting expects canonical
//! keys: `0x`-prefixed lowercase hex of the bit-string read as a base-2
//! integer, e.g. `"1 1"` → `"0x3"`.

use std::collections::BTreeMap;
use std::hash::BuildHasher;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Normalize one bit-string key.
///
/// Whitespace is removed before conversion. Returns `None` if the
/// remaining characters are empty or not all `0`/`1`.
pub fn normalize_key(key: &str) -> Option<String> {
    let bits: Vec<u8> = key
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if bits.is_empty() || bits.iter().any(|b| *b != b'0' && *b != b'1') {
        return None;
    }

    let significant = match bits.iter().position(|b| *b == b'1') {
        Some(first_one) => &bits[first_one..],
        None => return Some("0x0".to_string()),
    };

    let pad = (4 - significant.len() % 4) % 4;
    let mut out = String::with_capacity(2 + significant.len().div_ceil(4));
    out.push_str("0x");

    let mut nibble = 0usize;
    for (i, bit) in std::iter::repeat_n(&b'0', pad)
        .chain(significant.iter())
        .enumerate()
    {
        nibble = (nibble << 1) | usize::from(*bit == b'1');
        if i % 4 == 3 {
            out.push(HEX_DIGITS[nibble] as char);
            nibble = 0;
        }
    }

    Some(out)
}

/// Normalize every key of a raw counts histogram.
///
/// Keys that collapse onto the same canonical form (`"1 0"` and `"10"`)
/// have their counts summed. Returns `None` if any key is not a bit-string.
pub fn normalize_counts<S: BuildHasher>(
    raw: &std::collections::HashMap<String, u64, S>,
) -> Option<BTreeMap<String, u64>> {
    let mut out = BTreeMap::new();
    for (key, count) in raw {
        let key = normalize_key(key)?;
        *out.entry(key).or_insert(0) += *count;
    }
    Some(out)
}
