//! Script-building helpers: BIP-34 height encoding, push-data framing, and
//! the coinbase scriptSig signature/aux append.

/// Minimal-encodes `height` the way BIP-34 requires: a little-endian
/// byte string with no superfluous leading zero byte, except that an
/// extra `0x00` is appended when the top byte's high bit is set (so the
/// value can't be misread as a negative CScriptNum), then wrapped as a
/// single `OP_PUSHDATA` of that length.
pub fn bip34_height_push(height: u64) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut h = height;
    while h > 0 {
        bytes.push((h & 0xff) as u8);
        h >>= 8;
    }
    if bytes.is_empty() {
        bytes.push(0);
    }
    if bytes.last().copied().unwrap_or(0) & 0x80 != 0 {
        bytes.push(0x00);
    }

    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(bytes.len() as u8);
    out.extend_from_slice(&bytes);
    out
}

/// Inverse of [`bip34_height_push`]: reads the length-prefixed push at the
/// start of a coinbase scriptSig and decodes the little-endian height.
pub fn bip34_height_parse(script_sig: &[u8]) -> Option<u64> {
    let len = *script_sig.first()? as usize;
    let bytes = script_sig.get(1..1 + len)?;
    let mut height: u64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        height |= (b as u64) << (8 * i);
    }
    // A trailing 0x00 added solely to clear the sign bit doesn't
    // contribute to the value; nothing further to strip since the
    // accumulation above already ignores it (it's zero).
    Some(height)
}

/// Threshold (from `OP_PUSHDATA1 = 0x4c`) above which a push needs the
/// explicit pushdata opcode instead of a bare length byte.
const OP_PUSHDATA1: u8 = 0x4c;
const PUSHDATA1_THRESHOLD: usize = 76;

/// Appends `sig` and each value in `aux` (already hex-decoded by the
/// caller) to a coinbase scriptSig, subject to cpuminer's 100-byte
/// scriptSig cap. Bytes that don't fit are silently truncated, matching
/// the original's "subject to a 100-byte limit" behavior.
pub fn append_signature(script_sig: &mut Vec<u8>, sig: &[u8], aux: &[Vec<u8>]) {
    const MAX_SCRIPT_SIG: usize = 100;

    let mut extra = Vec::new();
    extra.extend_from_slice(sig);
    for a in aux {
        extra.extend_from_slice(a);
    }

    let room = MAX_SCRIPT_SIG.saturating_sub(script_sig.len());
    if extra.len() > room {
        extra.truncate(room);
    }
    if extra.is_empty() {
        return;
    }

    if extra.len() >= PUSHDATA1_THRESHOLD {
        script_sig.push(OP_PUSHDATA1);
        script_sig.push(extra.len() as u8);
    } else {
        script_sig.push(extra.len() as u8);
    }
    script_sig.extend_from_slice(&extra);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bip34_round_trips_for_heights_above_genesis() {
        for height in [17u64, 100, 500_000, 0x7f, 0x80, 0xffff, 21_000_000] {
            let pushed = bip34_height_push(height);
            assert_eq!(bip34_height_parse(&pushed), Some(height));
        }
    }

    #[test]
    fn high_bit_byte_gets_a_zero_pad() {
        // 0x80 alone has its top bit set -> needs a trailing 0x00.
        let pushed = bip34_height_push(0x80);
        assert_eq!(pushed, vec![2, 0x80, 0x00]);
    }

    #[test]
    fn append_signature_uses_pushdata1_at_76_bytes() {
        let mut script = vec![0x03, 0x01, 0x02, 0x03]; // pretend height push
        let sig = vec![0xAAu8; 76];
        append_signature(&mut script, &sig, &[]);
        assert_eq!(script[4], OP_PUSHDATA1);
        assert_eq!(script[5], 76);
    }

    #[test]
    fn append_signature_uses_plain_length_byte_under_threshold() {
        let mut script = vec![0x03, 0x01, 0x02, 0x03];
        let sig = vec![0xAAu8; 10];
        append_signature(&mut script, &sig, &[]);
        assert_eq!(script[4], 10);
    }

    #[test]
    fn append_signature_respects_the_100_byte_cap() {
        let mut script = vec![0u8; 99];
        let sig = vec![0xAAu8; 20];
        append_signature(&mut script, &sig, &[]);
        assert!(script.len() <= 101); // 99 + 1 length byte + (<=1 byte extra)
    }
}
