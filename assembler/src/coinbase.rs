//! Coinbase transaction construction: the miner-built fallback used when
//! the template doesn't already supply one, the BIP-34 height push, the
//! scriptSig signature append, and the SegWit witness commitment output.

use crate::script::{append_signature, bip34_height_push};
use miner_hash::sha256d;

/// Bitcoin's variable-length integer ("CompactSize") encoding.
pub fn write_varint(out: &mut Vec<u8>, n: u64) {
    if n < 0xfd {
        out.push(n as u8);
    } else if n <= 0xffff {
        out.push(0xfd);
        out.extend_from_slice(&(n as u16).to_le_bytes());
    } else if n <= 0xffff_ffff {
        out.push(0xfe);
        out.extend_from_slice(&(n as u32).to_le_bytes());
    } else {
        out.push(0xff);
        out.extend_from_slice(&n.to_le_bytes());
    }
}

pub struct CoinbaseParams<'a> {
    pub height: u64,
    pub payout_script: &'a [u8],
    pub coinbase_value: u64,
    pub coinbase_sig: &'a [u8],
    pub coinbaseaux: &'a [Vec<u8>],
    pub witness_root: Option<[u8; 32]>,
}

/// Builds the serialized coinbase transaction the worker assembles when
/// the template doesn't already supply one (§4.1 step 4).
pub fn build_coinbase(params: &CoinbaseParams) -> Vec<u8> {
    let mut tx = Vec::new();
    tx.extend_from_slice(&1u32.to_le_bytes()); // version
    write_varint(&mut tx, 1); // one input

    tx.extend_from_slice(&[0u8; 32]); // null prev-txid
    tx.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // prev-index

    let mut script_sig = bip34_height_push(params.height);
    append_signature(&mut script_sig, params.coinbase_sig, params.coinbaseaux);
    write_varint(&mut tx, script_sig.len() as u64);
    tx.extend_from_slice(&script_sig);

    tx.extend_from_slice(&0xffff_ffffu32.to_le_bytes()); // sequence

    let output_count = if params.witness_root.is_some() { 2 } else { 1 };
    write_varint(&mut tx, output_count);

    tx.extend_from_slice(&params.coinbase_value.to_le_bytes());
    write_varint(&mut tx, params.payout_script.len() as u64);
    tx.extend_from_slice(params.payout_script);

    if let Some(witness_root) = params.witness_root {
        let commitment = segwit_commitment_script(&witness_root);
        tx.extend_from_slice(&0u64.to_le_bytes());
        write_varint(&mut tx, commitment.len() as u64);
        tx.extend_from_slice(&commitment);
    }

    tx.extend_from_slice(&0u32.to_le_bytes()); // locktime
    tx
}

/// `OP_RETURN 0x24 0xaa21a9ed <witness-root>` — the SegWit commitment
/// output script (§4.1 step 4, BIP-141).
pub fn segwit_commitment_script(witness_root: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(38);
    script.push(0x6a); // OP_RETURN
    script.push(0x24); // push 36 bytes
    script.extend_from_slice(&[0xaa, 0x21, 0xa9, 0xed]);
    script.extend_from_slice(witness_root);
    script
}

/// The witness Merkle root: leaf 0 is 32 zero bytes (coinbase's witness is
/// empty), followed by each non-coinbase tx's witness hash reversed to
/// internal byte order, folded the same way as the transaction tree
/// (duplicate-last-on-odd), then hashed once more against a 32-byte zero
/// "witness reserved value" (§4.1 step 4).
pub fn witness_commitment(other_tx_hashes_display_order: &[[u8; 32]]) -> [u8; 32] {
    let mut leaves = Vec::with_capacity(other_tx_hashes_display_order.len() + 1);
    leaves.push([0u8; 32]);
    for h in other_tx_hashes_display_order {
        let mut reversed = *h;
        reversed.reverse();
        leaves.push(reversed);
    }
    let witness_root = crate::merkle::fold(leaves);

    let mut buf = [0u8; 64];
    buf[0..32].copy_from_slice(&witness_root);
    // witness reserved value: 32 zero bytes
    sha256d(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segwit_commitment_has_expected_prefix() {
        let script = segwit_commitment_script(&[0u8; 32]);
        assert_eq!(&script[0..6], &[0x6a, 0x24, 0xaa, 0x21, 0xa9, 0xed]);
        assert_eq!(script.len(), 38);
    }

    #[test]
    fn build_coinbase_without_segwit_has_one_output() {
        let params = CoinbaseParams {
            height: 800_000,
            payout_script: &[0x76, 0xa9, 0x14],
            coinbase_value: 625_000_000,
            coinbase_sig: b"/miner/",
            coinbaseaux: &[],
            witness_root: None,
        };
        let tx = build_coinbase(&params);
        // version(4) + input-count(1) + prevtxid(32) + previndex(4) +
        // scriptsig-len(1) + scriptsig + sequence(4) + output-count(1) + ...
        assert_eq!(&tx[0..4], &1u32.to_le_bytes());
        assert_eq!(tx[4], 1); // input count varint
    }

    #[test]
    fn witness_commitment_matches_spec_example_shape() {
        // S2: three transactions with witness hashes h1,h2,h3 must produce
        // SHA256d(SHA256d(0||h1) || SHA256d(h2||h3)) after endian-reversal
        // of each hash (four leaves, no duplication needed).
        let h1 = [0x01u8; 32];
        let h2 = [0x02u8; 32];
        let h3 = [0x03u8; 32];

        let commitment = witness_commitment(&[h1, h2, h3]);

        let mut rev = |h: [u8; 32]| {
            let mut r = h;
            r.reverse();
            r
        };

        let mut ab = [0u8; 64];
        ab[0..32].copy_from_slice(&[0u8; 32]);
        ab[32..64].copy_from_slice(&rev(h1));
        let h_01 = sha256d(&ab);

        let mut cd = [0u8; 64];
        cd[0..32].copy_from_slice(&rev(h2));
        cd[32..64].copy_from_slice(&rev(h3));
        let h_23 = sha256d(&cd);

        let mut top = [0u8; 64];
        top[0..32].copy_from_slice(&h_01);
        top[32..64].copy_from_slice(&h_23);
        let witness_root = sha256d(&top);

        let mut buf = [0u8; 64];
        buf[0..32].copy_from_slice(&witness_root);
        let expected = sha256d(&buf);

        assert_eq!(commitment, expected);
    }
}
