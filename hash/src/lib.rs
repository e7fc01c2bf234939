//! The two proof-of-work hash primitives this miner supports, plus the
//! 256-bit little-endian target comparison they're judged against.
//!
//! These are intentionally thin: per the project's scope, the actual hash
//! functions are "external collaborators" (RustCrypto's `sha2` and `scrypt`
//! crates do the real work) and this crate only frames the inputs/outputs
//! the rest of the workspace needs — the 80-byte header in, a 32-byte
//! digest out, and the word-order comparison against a target.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HashError {
    #[error("unknown algorithm: {0}")]
    InvalidAlgorithm(String),

    #[error("scrypt N must be a power of two >= 2, got {0}")]
    InvalidScryptN(u32),

    #[error("scrypt parameter error: {0}")]
    Scrypt(String),
}

/// Which proof-of-work function a job is judged by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Sha256d,
    Scrypt { n: u32 },
}

impl Algorithm {
    /// Parses `sha256d`, `scrypt`, or `scrypt:N` (N a power of two >= 2).
    pub fn parse(s: &str) -> Result<Self, HashError> {
        match s {
            "sha256d" => Ok(Algorithm::Sha256d),
            "scrypt" => Ok(Algorithm::Scrypt { n: 1024 }),
            other if other.starts_with("scrypt:") => {
                let n: u32 = other[7..]
                    .parse()
                    .map_err(|_| HashError::InvalidAlgorithm(other.to_string()))?;
                if n < 2 || !n.is_power_of_two() {
                    return Err(HashError::InvalidScryptN(n));
                }
                Ok(Algorithm::Scrypt { n })
            }
            other => Err(HashError::InvalidAlgorithm(other.to_string())),
        }
    }

    /// Default nonce-span per outer iteration when scantime leaves no
    /// explicit budget, per the worker-loop contract in the spec.
    pub fn default_nonce_span(&self) -> u32 {
        match self {
            Algorithm::Sha256d => 0x1fffff,
            Algorithm::Scrypt { n } if *n < 16 => 0x3ffff,
            Algorithm::Scrypt { n } => 0x3fffff / n,
        }
    }
}

/// Double SHA-256: used for merkle folding and coinbase hashing regardless
/// of the mining algorithm (Bitcoin-family merkle trees are always
/// SHA-256d, even on scrypt chains).
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let once = Sha256::digest(data);
    let twice = Sha256::digest(once);
    twice.into()
}

/// Precomputed scrypt parameters, allocated once per worker thread and
/// reused across scan iterations (the resource policy the spec calls out
/// for the scrypt scratch buffer — RustCrypto's `scrypt` crate manages its
/// own working memory internally, so what's worth caching here is the
/// validated `Params`, not a raw buffer).
pub struct ScryptScratch {
    params: scrypt::Params,
}

impl ScryptScratch {
    pub fn new(n: u32) -> Result<Self, HashError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(HashError::InvalidScryptN(n));
        }
        let log_n = n.trailing_zeros() as u8;
        let params =
            scrypt::Params::new(log_n, 1, 1, 32).map_err(|e| HashError::Scrypt(e.to_string()))?;
        Ok(Self { params })
    }
}

fn scrypt_hash(header: &[u8; 80], scratch: &ScryptScratch) -> [u8; 32] {
    let mut out = [0u8; 32];
    scrypt::scrypt(header, header, &scratch.params, &mut out)
        .expect("32-byte scrypt output is always within the crate's length limit");
    out
}

/// Computes the proof-of-work digest for the first 80 bytes of a header.
/// `scratch` is required (and must match `algorithm`'s N) when mining
/// scrypt; ignored for sha256d.
pub fn pow_hash(algorithm: Algorithm, header: &[u8; 80], scratch: Option<&ScryptScratch>) -> [u8; 32] {
    match algorithm {
        Algorithm::Sha256d => sha256d(header),
        Algorithm::Scrypt { .. } => {
            scrypt_hash(header, scratch.expect("scrypt scratch buffer required for scrypt algorithm"))
        }
    }
}

/// Reinterprets a 32-byte digest as eight little-endian 32-bit words,
/// word 0 least significant — the representation the target is stored in.
pub fn digest_to_words(hash: &[u8; 32]) -> [u32; 8] {
    let mut words = [0u32; 8];
    for (i, word) in words.iter_mut().enumerate() {
        *word = u32::from_le_bytes(hash[4 * i..4 * i + 4].try_into().unwrap());
    }
    words
}

/// True iff `hash`, read as a 256-bit little-endian integer, is strictly
/// less than `target` (also little-endian words, word 0 least significant).
/// Compares word 7 (most significant) down to word 0, short-circuiting on
/// the first difference.
pub fn hash_meets_target(hash: &[u8; 32], target: &[u32; 8]) -> bool {
    let words = digest_to_words(hash);
    for i in (0..8).rev() {
        if words[i] < target[i] {
            return true;
        }
        if words[i] > target[i] {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_matches_double_hash() {
        use sha2::{Digest, Sha256};
        let data = b"hello world";
        let expect = Sha256::digest(Sha256::digest(data));
        assert_eq!(sha256d(data).as_slice(), expect.as_slice());
    }

    #[test]
    fn parses_algorithm_strings() {
        assert_eq!(Algorithm::parse("sha256d").unwrap(), Algorithm::Sha256d);
        assert_eq!(
            Algorithm::parse("scrypt").unwrap(),
            Algorithm::Scrypt { n: 1024 }
        );
        assert_eq!(
            Algorithm::parse("scrypt:2048").unwrap(),
            Algorithm::Scrypt { n: 2048 }
        );
        assert!(Algorithm::parse("scrypt:100").is_err());
        assert!(Algorithm::parse("kawpow").is_err());
    }

    #[test]
    fn target_comparison_is_strict_and_msw_first() {
        let mut target = [0u32; 8];
        target[7] = 0x0000ffff; // difficulty-1-ish target

        let mut low = [0u8; 32];
        low[31] = 0x00; // top byte of word 7 is 0 -> below target
        assert!(hash_meets_target(&low, &target));

        let mut equal = [0u8; 32];
        equal[28..32].copy_from_slice(&0x0000ffffu32.to_le_bytes());
        assert!(!hash_meets_target(&equal, &target));

        let mut high = [0u8; 32];
        high[28..32].copy_from_slice(&0x00010000u32.to_le_bytes());
        assert!(!hash_meets_target(&high, &target));
    }
}
