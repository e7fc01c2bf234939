//! The in-flight work item: a 128-word buffer holding the 80-byte block
//! header plus SHA-256 padding, a 256-bit target, and whatever bookkeeping
//! the originating transport (GBT or Stratum) needs to build a submission.

/// A single piece of work handed to the scan loop.
///
/// `data[0..20]` is the 80-byte header, one word per 4 bytes, each word
/// holding the plain field value such that `word.to_le_bytes()` reproduces
/// the field's correct wire bytes — so `header_bytes()` is just the LE
/// encoding of `data[0..20]` concatenated. `data[20]` and `data[31]` carry
/// the fixed SHA-256 padding markers the original protocol describes;
/// nothing here actually hashes through them since the hash crate pads the
/// 80-byte slice itself, but the words are kept for shape fidelity and
/// because some transports echo them back verbatim.
#[derive(Debug, Clone)]
pub struct Work {
    pub data: [u32; 32],
    /// 256-bit target, little-endian words, word 0 least significant.
    pub target: [u32; 8],
    /// Block height, GBT only.
    pub height: Option<u64>,
    /// Hex-encoded `txcount-varint || coinbase || transactions`, GBT only.
    pub txs: Option<String>,
    /// Opaque GBT workid to echo back on submission, if the template had one.
    pub workid: Option<String>,
    /// Stratum job id, Stratum only.
    pub job_id: Option<String>,
    /// Stratum extranonce2, little-endian counter, Stratum only.
    pub xnonce2: Vec<u8>,
}

impl Work {
    pub fn empty() -> Self {
        Work {
            data: [0u32; 32],
            target: [0u32; 8],
            height: None,
            txs: None,
            workid: None,
            job_id: None,
            xnonce2: Vec::new(),
        }
    }

    /// Builds a work item's header words from already wire-ordered fields.
    ///
    /// `prev_hash_wire` and `merkle_root` are the raw 32 bytes as they
    /// appear in the serialized header (not the reversed, human-displayed
    /// hex some RPCs return) — callers normalize that before calling in.
    pub fn from_header_fields(
        version: u32,
        prev_hash_wire: [u8; 32],
        merkle_root: [u8; 32],
        ntime: u32,
        nbits: u32,
        target: [u32; 8],
    ) -> Self {
        let mut header = [0u8; 80];
        header[0..4].copy_from_slice(&version.to_le_bytes());
        header[4..36].copy_from_slice(&prev_hash_wire);
        header[36..68].copy_from_slice(&merkle_root);
        header[68..72].copy_from_slice(&ntime.to_le_bytes());
        header[72..76].copy_from_slice(&nbits.to_le_bytes());
        header[76..80].copy_from_slice(&0u32.to_le_bytes());

        let mut work = Work::empty();
        for i in 0..20 {
            work.data[i] = u32::from_le_bytes(header[4 * i..4 * i + 4].try_into().unwrap());
        }
        work.data[20] = 0x8000_0000;
        work.data[31] = 0x0000_0280;
        work.target = target;
        work
    }

    /// The 80-byte header as it should be fed to the proof-of-work hash.
    pub fn header_bytes(&self) -> [u8; 80] {
        let mut out = [0u8; 80];
        for i in 0..20 {
            out[4 * i..4 * i + 4].copy_from_slice(&self.data[i].to_le_bytes());
        }
        out
    }

    pub fn nonce(&self) -> u32 {
        self.data[19]
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.data[19] = nonce;
    }

    pub fn ntime(&self) -> u32 {
        self.data[17]
    }

    pub fn set_ntime(&mut self, ntime: u32) {
        self.data[17] = ntime;
    }

    pub fn nbits(&self) -> u32 {
        self.data[18]
    }

    /// The first 76 bytes (words 0..=18) — version, previous-hash, merkle
    /// root, ntime, nbits. Used to detect whether two work items are for
    /// the same job (everything but the nonce and, historically, ntime
    /// rolling) and to find the previous-hash words for the stale-share
    /// check.
    pub fn prefix19(&self) -> &[u32] {
        &self.data[0..19]
    }

    /// Previous-hash words, matching `data[1..=8]` in the header layout.
    pub fn prev_hash_words(&self) -> &[u32] {
        &self.data[1..9]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bytes_round_trips_fields() {
        let prev_hash_wire = [0xAAu8; 32];
        let merkle_root = [0xBBu8; 32];
        let work = Work::from_header_fields(
            0x2000_0000,
            prev_hash_wire,
            merkle_root,
            0x6123_4567,
            0x1d00_ffff,
            [0u32; 8],
        );

        let header = work.header_bytes();
        assert_eq!(&header[0..4], &0x2000_0000u32.to_le_bytes());
        assert_eq!(&header[4..36], &prev_hash_wire[..]);
        assert_eq!(&header[36..68], &merkle_root[..]);
        assert_eq!(&header[68..72], &0x6123_4567u32.to_le_bytes());
        assert_eq!(&header[72..76], &0x1d00_ffffu32.to_le_bytes());
        assert_eq!(&header[76..80], &0u32.to_le_bytes());
    }

    #[test]
    fn nonce_is_the_only_mutable_header_word() {
        let mut work = Work::from_header_fields(1, [0; 32], [0; 32], 2, 3, [0; 8]);
        let prefix_before = work.prefix19().to_vec();
        work.set_nonce(0xdead_beef);
        assert_eq!(work.prefix19().to_vec(), prefix_before);
        assert_eq!(work.nonce(), 0xdead_beef);
    }

    #[test]
    fn padding_words_are_fixed() {
        let work = Work::from_header_fields(1, [0; 32], [0; 32], 2, 3, [0; 8]);
        assert_eq!(work.data[20], 0x8000_0000);
        assert_eq!(work.data[31], 0x0000_0280);
    }
}
