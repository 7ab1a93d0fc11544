//! Key hash router.
//!
//! `hash_int` picks the bucket for a record id; `hash_title` turns a title
//! into the key stored in the title index.

use crate::types::Key;

/// Map `key` to a bucket in `0..bucket_count`.
///
/// Uses the MurmurHash3 32-bit finalizer, so zero maps to bucket zero for any
/// bucket count. Panics if `bucket_count` is zero; a validated
/// [`StoreConfig`](crate::StoreConfig) never has one.
///
/// ```
/// use bucketdb::hash_int;
///
/// assert_eq!(hash_int(0, 16), 0);
/// assert_eq!(hash_int(42, 16), hash_int(42, 16));
/// ```
pub fn hash_int(key: Key, bucket_count: u32) -> u32 {
    fmix32(key as u32) % bucket_count
}

fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Title key for the title index.
///
/// Rolling hash `b + (h << 6) + (h << 16) - h` over the UTF-8 bytes with
/// wrapping 64-bit arithmetic, reduced modulo `2^31` so the result is never
/// negative.
pub fn hash_title(title: &str) -> Key {
    let hash = title.bytes().fold(0u64, |h, b| {
        u64::from(b)
            .wrapping_add(h << 6)
            .wrapping_add(h << 16)
            .wrapping_sub(h)
    });
    (hash % (1u64 << 31)) as Key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_int_zero_is_bucket_zero() {
        for n in [1, 2, 7, 16, 1024, u32::MAX] {
            assert_eq!(hash_int(0, n), 0);
        }
    }

    #[test]
    fn test_hash_int_known_values() {
        assert_eq!(fmix32(1), 1_364_076_727);
        assert_eq!(fmix32(2), 821_347_078);
        assert_eq!(fmix32(42), 142_593_372);
        assert_eq!(fmix32(u32::MAX), 2_180_083_513);

        assert_eq!(hash_int(1, 16), 7);
        assert_eq!(hash_int(2, 16), 6);
        assert_eq!(hash_int(42, 16), 12);
        assert_eq!(hash_int(-1, 16), 9);
        assert_eq!(hash_int(123_456, 16), 11);
    }

    #[test]
    fn test_hash_int_stays_in_range() {
        for key in -500..500 {
            assert!(hash_int(key, 13) < 13);
            assert_eq!(hash_int(key, 1), 0);
        }
    }

    #[test]
    fn test_hash_title_known_values() {
        assert_eq!(hash_title(""), 0);
        assert_eq!(hash_title("a"), 97);
        assert_eq!(hash_title("ab"), 6_363_201);
        assert_eq!(hash_title("Database Systems"), 202_986_719);
        assert_eq!(hash_title("Poxviridae"), 968_641_893);
    }

    #[test]
    fn test_hash_title_zero_extends_non_ascii_bytes() {
        // "é" is C3 A9; each byte enters the hash as 195 and 169.
        assert_eq!(hash_title("é"), 169 + (195 << 6) + (195 << 16) - 195);
        assert_eq!(hash_title("é"), 12_791_974);
        assert_eq!(hash_title("Étude"), 207_925_256);
        assert_eq!(hash_title("日本"), 1_796_081_730);
    }

    #[test]
    fn test_hash_title_is_never_negative() {
        let long = "x".repeat(1000);
        for title in ["é", "日本語のタイトル", long.as_str(), "\u{ff}\u{ff}\u{ff}"] {
            assert!(hash_title(title) >= 0);
        }
    }
}
