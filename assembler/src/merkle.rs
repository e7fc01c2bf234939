//! Merkle tree folding shared by the transaction tree and the SegWit
//! witness commitment tree: duplicate the last node on an odd level,
//! double-SHA-256 pairs bottom-up until one root remains.

use miner_hash::sha256d;

pub fn fold(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    if level.is_empty() {
        return [0u8; 32];
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut buf = [0u8; 64];
                buf[0..32].copy_from_slice(&pair[0]);
                buf[32..64].copy_from_slice(&pair[1]);
                sha256d(&buf)
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = [0x11u8; 32];
        assert_eq!(fold(vec![leaf]), leaf);
    }

    #[test]
    fn odd_level_duplicates_the_last_leaf() {
        let a = [0x01u8; 32];
        let b = [0x02u8; 32];
        let with_dup = fold(vec![a, b, b]);
        let three = fold(vec![a, b]);
        // three leaves [a,b] duplicated to [a,b,b] folds the same as just
        // re-hashing (a,b) and (b,b) then combining -- sanity: differs from
        // the two-leaf root.
        assert_ne!(with_dup, three);
    }

    #[test]
    fn four_leaf_tree_matches_manual_computation() {
        let a = [0x01u8; 32];
        let b = [0x02u8; 32];
        let c = [0x03u8; 32];
        let d = [0x04u8; 32];

        let mut ab = [0u8; 64];
        ab[0..32].copy_from_slice(&a);
        ab[32..64].copy_from_slice(&b);
        let h_ab = sha256d(&ab);

        let mut cd = [0u8; 64];
        cd[0..32].copy_from_slice(&c);
        cd[32..64].copy_from_slice(&d);
        let h_cd = sha256d(&cd);

        let mut top = [0u8; 64];
        top[0..32].copy_from_slice(&h_ab);
        top[32..64].copy_from_slice(&h_cd);
        let expected = sha256d(&top);

        assert_eq!(fold(vec![a, b, c, d]), expected);
    }
}
