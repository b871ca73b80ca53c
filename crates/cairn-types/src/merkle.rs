//! Merkle roots and storage-proof branches.
//!
//! Trees split at the largest power of two strictly below the leaf count, so
//! a root is `H(root(left) || root(right))` with a full left subtree. Proof
//! branches list sibling hashes leaf-to-root; verification re-walks the same
//! split positionally.

use crate::contract::{Segment, SEGMENT_SIZE};
use crate::hash::{hash_all, hash_bytes, Hash256};

/// Root of a tree whose leaves are already hashes. An empty forest hashes to
/// the zero digest.
pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    match leaves.len() {
        0 => Hash256::ZERO,
        1 => leaves[0],
        n => {
            let mid = split_point(n);
            join(merkle_root(&leaves[..mid]), merkle_root(&leaves[mid..]))
        }
    }
}

/// Number of segments a file of `file_size` bytes occupies.
pub fn segment_count(file_size: u64) -> u64 {
    file_size.div_ceil(SEGMENT_SIZE as u64)
}

/// Verify that `segment` sits at `index` in a file of `num_segments`
/// segments whose Merkle root is `root`, using the sibling hashes in
/// `branch` (ordered leaf-to-root).
pub fn verify_segment_proof(
    root: Hash256,
    segment: &Segment,
    index: u64,
    num_segments: u64,
    branch: &[Hash256],
) -> bool {
    if index >= num_segments {
        return false;
    }
    match root_from_branch(hash_bytes(&segment.0), index, num_segments, branch) {
        Some(computed) => computed == root,
        None => false,
    }
}

/// Build the proof branch for the segment at `index` from the full leaf set.
/// This is what a prover (or a test) runs; verifiers only need
/// [`verify_segment_proof`].
pub fn build_segment_proof(leaves: &[Hash256], index: u64) -> Vec<Hash256> {
    let mut branch = Vec::new();
    collect_branch(leaves, index as usize, &mut branch);
    branch
}

fn collect_branch(leaves: &[Hash256], index: usize, branch: &mut Vec<Hash256>) {
    if leaves.len() <= 1 {
        return;
    }
    let mid = split_point(leaves.len());
    if index < mid {
        collect_branch(&leaves[..mid], index, branch);
        branch.push(merkle_root(&leaves[mid..]));
    } else {
        collect_branch(&leaves[mid..], index - mid, branch);
        branch.push(merkle_root(&leaves[..mid]));
    }
}

fn root_from_branch(
    leaf: Hash256,
    index: u64,
    n: u64,
    branch: &[Hash256],
) -> Option<Hash256> {
    if n == 1 {
        return branch.is_empty().then_some(leaf);
    }
    let mid = split_point(n as usize) as u64;
    let (&sibling, rest) = branch.split_last()?;
    if index < mid {
        let left = root_from_branch(leaf, index, mid, rest)?;
        Some(join(left, sibling))
    } else {
        let right = root_from_branch(leaf, index - mid, n - mid, rest)?;
        Some(join(sibling, right))
    }
}

/// Largest power of two strictly less than `n`. Callers guarantee `n > 1`.
fn split_point(n: usize) -> usize {
    debug_assert!(n > 1);
    let p = n.next_power_of_two();
    if p == n {
        n / 2
    } else {
        p / 2
    }
}

fn join(left: Hash256, right: Hash256) -> Hash256 {
    hash_all(&[left.as_bytes(), right.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u64) -> Vec<Hash256> {
        (0..n).map(|i| hash_bytes(&i.to_le_bytes())).collect()
    }

    fn segments(n: u64) -> Vec<Segment> {
        (0..n)
            .map(|i| {
                let mut seg = [0u8; SEGMENT_SIZE];
                seg[0] = i as u8;
                Segment(seg)
            })
            .collect()
    }

    #[test]
    fn split_point_is_largest_power_of_two_below() {
        assert_eq!(split_point(2), 1);
        assert_eq!(split_point(3), 2);
        assert_eq!(split_point(4), 2);
        assert_eq!(split_point(5), 4);
        assert_eq!(split_point(8), 4);
        assert_eq!(split_point(9), 8);
    }

    #[test]
    fn root_of_two_is_join() {
        let ls = leaves(2);
        assert_eq!(
            merkle_root(&ls),
            hash_all(&[ls[0].as_bytes(), ls[1].as_bytes()])
        );
    }

    #[test]
    fn empty_and_single() {
        assert_eq!(merkle_root(&[]), Hash256::ZERO);
        let ls = leaves(1);
        assert_eq!(merkle_root(&ls), ls[0]);
    }

    #[test]
    fn segment_counts() {
        assert_eq!(segment_count(0), 0);
        assert_eq!(segment_count(1), 1);
        assert_eq!(segment_count(64), 1);
        assert_eq!(segment_count(65), 2);
        assert_eq!(segment_count(640), 10);
    }

    #[test]
    fn proofs_verify_for_every_index() {
        for n in 1..=9u64 {
            let segs = segments(n);
            let leaf_hashes: Vec<Hash256> =
                segs.iter().map(|s| hash_bytes(&s.0)).collect();
            let root = merkle_root(&leaf_hashes);
            for i in 0..n {
                let branch = build_segment_proof(&leaf_hashes, i);
                assert!(
                    verify_segment_proof(root, &segs[i as usize], i, n, &branch),
                    "n={n} i={i}"
                );
                // The same branch must not verify at a different index.
                if n > 1 {
                    let other = (i + 1) % n;
                    assert!(!verify_segment_proof(root, &segs[i as usize], other, n, &branch));
                }
            }
        }
    }

    #[test]
    fn tampered_segment_fails() {
        let segs = segments(4);
        let leaf_hashes: Vec<Hash256> = segs.iter().map(|s| hash_bytes(&s.0)).collect();
        let root = merkle_root(&leaf_hashes);
        let branch = build_segment_proof(&leaf_hashes, 2);
        let mut bad = segs[2];
        bad.0[1] ^= 1;
        assert!(!verify_segment_proof(root, &bad, 2, 4, &branch));
    }
}
