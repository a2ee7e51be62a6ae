//! Content fingerprints used to recognise a note after it has been renamed.
//!
//! The fingerprint is a rolling 32-bit polynomial hash over the UTF-16 code units of the
//! content, rendered as a signed decimal string. It is an identity hint only: collisions are
//! tolerated because the rename detector treats a match as a heuristic, never as proof.

/// Fingerprint `content`. Deterministic and total; the empty string yields `"0"`.
pub fn fingerprint(content: &str) -> String {
    content
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
        .to_string()
}
