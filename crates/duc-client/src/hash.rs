//! Salted login challenge
//!
//! The controller proves knowledge of the password with a two-stage MD5:
//! `MD5(MD5(password || salt_a) || salt_b)`, rendered as uppercase hex.

use md5::{Digest, Md5};

use crate::types::Salts;

/// Width of the encoded proof (one MD5 digest as hex)
pub const HASH_LEN: usize = 32;

/// Compute the login proof for `password` against the issued salts.
pub fn compute_hash(password: &str, salts: &Salts) -> String {
    let first = Md5::new()
        .chain_update(password.as_bytes())
        .chain_update(&salts.salt_a)
        .finalize();

    let second = Md5::new()
        .chain_update(first)
        .chain_update(&salts.salt_b)
        .finalize();

    // The controller compares case-sensitively
    hex::encode_upper(second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn salts(a: &[u8], b: &[u8]) -> Salts {
        Salts {
            salt_a: a.to_vec(),
            salt_b: b.to_vec(),
        }
    }

    #[test]
    fn test_known_vector() {
        let hash = compute_hash("secret", &salts(b"abc", b"xyz"));
        assert_eq!(hash, "80CB5CDF5ABDE8EA2FE7B1D557C7A35A");
    }

    #[test]
    fn test_empty_inputs() {
        let hash = compute_hash("", &salts(b"", b""));
        assert_eq!(hash, "59ADB24EF3CDBE0297F05B395827453F");
    }

    #[test]
    fn test_deterministic_and_fixed_width() {
        let s = salts(b"\x00\x01\xff", b"pepper");
        let a = compute_hash("hunter2", &s);
        let b = compute_hash("hunter2", &s);
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_LEN);
        assert!(a.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_salts_are_not_interchangeable() {
        let forward = compute_hash("secret", &salts(b"abc", b"xyz"));
        let swapped = compute_hash("secret", &salts(b"xyz", b"abc"));
        assert_ne!(forward, swapped);
    }
}
