//! Cache-key encoding into filesystem path segments

use crate::key::CacheKey;
use sha2::{Digest, Sha512};

/// How a cache key maps onto path segments under the cache root.
///
/// The mode is part of the store configuration and is assumed stable for the
/// lifetime of a cache root. Switching modes against an existing root makes
/// every prior entry a silent miss; it never corrupts anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEncoding {
    /// One `name_value` path segment per surviving pair.
    ///
    /// Human-readable on disk, but performs no escaping: values containing
    /// path separators (or otherwise path-unsafe text) are the caller's
    /// responsibility to avoid. Use [`KeyEncoding::Digest`] for arbitrary
    /// values.
    #[default]
    Literal,
    /// A single fixed-length digest segment.
    ///
    /// Each `name_value` string is hashed individually and the concatenation
    /// of the per-pair digests is hashed again, so differing pair splits can
    /// never collide the way a flat hash of the joined pairs could.
    Digest,
}

/// Encode a cache key as path segments under the active mode.
///
/// Total over all keys: the empty key encodes to no segments in literal mode
/// (the entry then lives directly under the computation directory) and to
/// the digest of the empty concatenation in digest mode.
#[must_use]
pub fn encode_key(key: &CacheKey, encoding: KeyEncoding) -> Vec<String> {
    let segments: Vec<String> = key
        .pairs()
        .iter()
        .map(|(name, value)| format!("{name}_{value}"))
        .collect();
    match encoding {
        KeyEncoding::Literal => segments,
        KeyEncoding::Digest => vec![hash_all(&segments)],
    }
}

/// Two-level SHA-512: hash each segment, then hash the concatenation of the
/// per-segment hex digests. Lowercase hex output.
fn hash_all(segments: &[String]) -> String {
    let mut joined = String::with_capacity(segments.len() * 128);
    for segment in segments {
        joined.push_str(&hex::encode(Sha512::digest(segment.as_bytes())));
    }
    hex::encode(Sha512::digest(joined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CallArgs, KeyPolicy, Parameter, Signature};

    fn key_of(pairs: &[(&str, i64)]) -> CacheKey {
        let sig = Signature::new(
            pairs
                .iter()
                .map(|(name, _)| Parameter::required(*name))
                .collect(),
        )
        .expect("signature");
        let mut args = CallArgs::new();
        for (_, value) in pairs {
            args = args.arg(*value);
        }
        let binding = sig.bind(&args).expect("binding");
        KeyPolicy::new().derive_key(&binding, &sig)
    }

    #[test]
    fn test_literal_mode_yields_name_value_segments() {
        let key = key_of(&[("x", 1), ("y", 2)]);
        assert_eq!(encode_key(&key, KeyEncoding::Literal), ["x_1", "y_2"]);
    }

    #[test]
    fn test_digest_mode_yields_single_hex_segment() {
        let key = key_of(&[("x", 1), ("y", 2)]);
        let segments = encode_key(&key, KeyEncoding::Digest);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].len(), 128);
        assert!(segments[0].chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(segments[0], segments[0].to_lowercase());
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = encode_key(&key_of(&[("x", 1), ("y", 2)]), KeyEncoding::Digest);
        let b = encode_key(&key_of(&[("x", 1), ("y", 2)]), KeyEncoding::Digest);
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_distinguishes_pair_splits() {
        // Joined flat, both keys would read "x_1y_2"; the two-level scheme
        // must keep them apart.
        let split = key_of(&[("x", 1), ("y", 2)]);
        let sig = Signature::new(vec![Parameter::required("x")]).expect("signature");
        let binding = sig
            .bind(&CallArgs::new().arg("1y_2"))
            .expect("binding");
        let joined = KeyPolicy::new().derive_key(&binding, &sig);
        assert_ne!(
            encode_key(&split, KeyEncoding::Digest),
            encode_key(&joined, KeyEncoding::Digest)
        );
    }

    #[test]
    fn test_empty_key_encodes_in_both_modes() {
        let sig = Signature::new(vec![]).expect("signature");
        let binding = sig.bind(&CallArgs::new()).expect("binding");
        let key = KeyPolicy::new().derive_key(&binding, &sig);
        assert!(encode_key(&key, KeyEncoding::Literal).is_empty());
        let digest = encode_key(&key, KeyEncoding::Digest);
        assert_eq!(digest.len(), 1);
        assert_eq!(digest[0].len(), 128);
    }
}
