//! nBits/difficulty to 256-bit target conversion.
//!
//! Targets are stored as `[u32; 8]`, little-endian words, word 0 least
//! significant — the same convention the header/hash comparison uses.

/// Expands a compact `nBits` value into a 256-bit target.
pub fn nbits_to_target(nbits: u32) -> [u32; 8] {
    let exponent = (nbits >> 24) as u32;
    let mantissa = nbits & 0x00ff_ffff;

    let mut target = [0u32; 8];
    if exponent <= 3 {
        let value = mantissa >> (8 * (3 - exponent));
        target[0] = value;
        return target;
    }

    let byte_shift = exponent as usize - 3;
    if byte_shift >= 32 {
        return target;
    }

    let bytes = mantissa.to_be_bytes();
    for (i, &b) in bytes[1..4].iter().enumerate() {
        let pos = byte_shift + (2 - i);
        if pos < 32 {
            let word = pos / 4;
            let shift = (pos % 4) * 8;
            target[word] |= (b as u32) << shift;
        }
    }
    target
}

/// `floor(DIFF1 / difficulty)`, where `DIFF1` is the target at difficulty
/// 1.0: word 7 (most significant) equal to `0x0000ffff`, everything else
/// zero. Scrypt pools report difficulty pre-scaled by 65536 relative to
/// this reference, so the scrypt branch divides it back out first.
pub fn target_from_difficulty(difficulty: f64, is_scrypt: bool) -> [u32; 8] {
    let difficulty = if is_scrypt {
        difficulty / 65536.0
    } else {
        difficulty
    };
    let difficulty = if difficulty.is_finite() && difficulty > 0.0 {
        difficulty
    } else {
        return [u32::MAX; 8];
    };

    // Shift the divisor down by whole 32-bit words while it's large,
    // compensating by sliding where the 64-bit mantissa lands in the
    // target. The total contributed magnitude is unchanged by how many
    // shifts happen; this only keeps the intermediate float in range.
    let mut diff = difficulty;
    let mut hi_word = 7usize;
    while diff > 1.0 && hi_word > 1 {
        diff /= 4_294_967_296.0; // 2^32
        hi_word -= 1;
    }

    let numerator = 0x0000_ffff_0000_0000u64 as f64;
    let m = numerator / diff;
    let mantissa = if m >= u64::MAX as f64 { u64::MAX } else { m as u64 };

    let mut target = [0u32; 8];
    target[hi_word - 1] = mantissa as u32;
    target[hi_word] = (mantissa >> 32) as u32;
    target
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_one_sha256d_matches_reference_target() {
        let target = target_from_difficulty(1.0, false);
        assert_eq!(target[7], 0x0000_ffff);
        assert_eq!(target[6], 0);
        assert!(target[0..6].iter().all(|&w| w == 0));
    }

    #[test]
    fn higher_difficulty_yields_smaller_target() {
        let t1 = target_from_difficulty(1.0, false);
        let t2 = target_from_difficulty(4.0, false);
        // Compare as 256-bit integers, most-significant word first.
        let as_be = |t: &[u32; 8]| {
            let mut words = *t;
            words.reverse();
            words
        };
        assert!(as_be(&t2) < as_be(&t1));
    }

    #[test]
    fn scrypt_difficulty_is_descaled_by_65536() {
        let sha_target = target_from_difficulty(1.0, false);
        let scrypt_target = target_from_difficulty(65536.0, true);
        assert_eq!(sha_target, scrypt_target);
    }

    #[test]
    fn nbits_expands_to_expected_target() {
        // 0x1d00ffff is Bitcoin mainnet's genesis difficulty-1 bits.
        let target = nbits_to_target(0x1d00_ffff);
        assert_eq!(target[6], 0xffff_0000);
        assert_eq!(target[7], 0);
    }
}
