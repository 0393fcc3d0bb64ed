// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AULA - MERKLE TREE
//
// Pairwise SHA-256 fold over hex leaf hashes. Odd levels duplicate their
// last element; a single leaf is its own root.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use aula_crypto::sha256_hex;

/// Root of the tree built from `leaf_hashes`, bottom-up. Order-sensitive:
/// swapping two leaves changes the root.
pub fn merkle_root(leaf_hashes: &[String]) -> String {
    if leaf_hashes.is_empty() {
        return sha256_hex("");
    }
    let mut level: Vec<String> = leaf_hashes.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&pair[0]);
                sha256_hex(&format!("{}{}", pair[0], right))
            })
            .collect();
    }
    level.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<String> {
        (0..n).map(|i| sha256_hex(&format!("tx-{i}"))).collect()
    }

    #[test]
    fn test_single_leaf_is_its_own_root() {
        let leaf = sha256_hex("only");
        assert_eq!(merkle_root(&[leaf.clone()]), leaf);
    }

    #[test]
    fn test_two_leaves() {
        let l = leaves(2);
        let expected = sha256_hex(&format!("{}{}", l[0], l[1]));
        assert_eq!(merkle_root(&l), expected);
    }

    #[test]
    fn test_odd_count_duplicates_last() {
        let l = leaves(3);
        let left = sha256_hex(&format!("{}{}", l[0], l[1]));
        let right = sha256_hex(&format!("{}{}", l[2], l[2]));
        assert_eq!(merkle_root(&l), sha256_hex(&format!("{left}{right}")));
    }

    #[test]
    fn test_order_sensitive() {
        let l = leaves(4);
        let mut swapped = l.clone();
        swapped.swap(0, 1);
        assert_ne!(merkle_root(&l), merkle_root(&swapped));
    }

    #[test]
    fn test_deterministic() {
        let l = leaves(7);
        assert_eq!(merkle_root(&l), merkle_root(&l));
    }
}
