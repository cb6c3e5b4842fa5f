//! Property-based tests for grouping, encoding arithmetic and byte ranges
//!
//! Tests for:
//! - Size bound: groups never exceed the maximum unless a lone file does
//! - Determinism: the same files always group the same way
//! - Encoded length is monotone in the input length
//! - Every packed file gets a range, and ranges tile the group exactly

use super::grouper::{group_files, FileRecord};
use super::site::byte_ranges;
use crate::storage::{encoded_blob_length, quorum_shards, source_symbols, EncodingType};
use proptest::prelude::*;

fn files(sizes: &[usize]) -> Vec<FileRecord> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, size)| FileRecord::new(format!("/file-{:03}.bin", i), vec![i as u8; *size]))
        .collect()
}

proptest! {
    /// Property test: Size bound
    /// Every group fits the maximum, or is a single oversized file
    #[test]
    fn prop_groups_respect_max_size(
        sizes in prop::collection::vec(0usize..400, 0..40),
        max in 0u64..1_000,
    ) {
        let groups = group_files(files(&sizes), max);

        for group in &groups {
            prop_assert!(
                group.size <= max || group.files.len() == 1,
                "group {} has {} bytes in {} files (max {})",
                group.group_id, group.size, group.files.len(), max
            );
        }
        let grouped: usize = groups.iter().map(|g| g.files.len()).sum();
        prop_assert_eq!(grouped, sizes.len());
    }

    /// Property test: Determinism
    /// Grouping the same input twice yields identical groups
    #[test]
    fn prop_grouping_is_deterministic(
        sizes in prop::collection::vec(0usize..200, 0..30),
        max in 0u64..500,
    ) {
        let first = group_files(files(&sizes), max);
        let second = group_files(files(&sizes), max);
        prop_assert_eq!(first, second);
    }

    /// Property test: Group ids are sequential and files keep their order
    #[test]
    fn prop_group_ids_sequential(
        sizes in prop::collection::vec(1usize..100, 1..30),
        max in 1u64..300,
    ) {
        let groups = group_files(files(&sizes), max);
        let ids: Vec<usize> = groups.iter().map(|g| g.group_id).collect();
        prop_assert_eq!(ids, (0..groups.len()).collect::<Vec<_>>());

        let paths: Vec<String> = groups
            .iter()
            .flat_map(|g| g.files.iter().map(|f| f.path.clone()))
            .collect();
        let expected: Vec<String> = files(&sizes).into_iter().map(|f| f.path).collect();
        prop_assert_eq!(paths, expected);
    }

    /// Property test: Encoded length never shrinks as the input grows
    #[test]
    fn prop_encoded_length_monotone(
        n_shards in 1u16..1_000,
        length in 0u64..10_000_000,
        delta in 0u64..1_000_000,
    ) {
        for encoding in [EncodingType::Rs2, EncodingType::RedStuff] {
            prop_assert!(
                encoded_blob_length(length, n_shards, encoding)
                    <= encoded_blob_length(length + delta, n_shards, encoding)
            );
        }
    }

    /// Property test: Symbol counts are positive for any real committee
    #[test]
    fn prop_symbols_positive(n_shards in 4u16..2_000) {
        for encoding in [EncodingType::Rs2, EncodingType::RedStuff] {
            let symbols = source_symbols(n_shards, encoding);
            prop_assert!(symbols.primary > 0);
            prop_assert!(symbols.secondary > symbols.primary);
        }
    }

    /// Property test: Quorum tolerates at most a third of the shards failing
    #[test]
    fn prop_quorum_bounds(n_shards in 1u16..2_000) {
        let quorum = quorum_shards(n_shards);
        let n = u64::from(n_shards);
        prop_assert!(quorum <= n);
        prop_assert!(3 * (n - quorum) < n);
    }

    /// Property test: Ranges tile the group
    #[test]
    fn prop_ranges_tile_group(sizes in prop::collection::vec(0u64..10_000, 1..50)) {
        let ranges = byte_ranges(&sizes);

        prop_assert_eq!(ranges.len(), sizes.len());
        prop_assert_eq!(ranges[0].start, 0);
        for (range, size) in ranges.iter().zip(&sizes) {
            prop_assert_eq!(range.len(), *size);
        }
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
        let total: u64 = sizes.iter().sum();
        prop_assert_eq!(ranges.last().map(|r| r.end), Some(total));
    }
}
