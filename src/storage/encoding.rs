//! Symbol allocation and size arithmetic for erasure-coded blobs.
//!
//! The storage network tolerates `f = floor((n - 1) / 3)` faulty shards out of
//! `n`. Everything in this module derives from that single bound:
//!
//! ```text
//! max_faulty  = floor((n - 1) / 3)
//! min_correct = n - max_faulty            (also the write quorum)
//! primary     = min_correct - max_faulty - safety_limit
//! secondary   = min_correct - safety_limit
//! ```
//!
//! The quorum used by the writer and the symbol counts used to size storage
//! reservations therefore always agree.

use serde::{Deserialize, Serialize};

/// Length of a sliver hash digest.
pub const DIGEST_LEN: u64 = 32;

/// Length of a blob id.
pub const BLOB_ID_LEN: u64 = 32;

/// Erasure-coding scheme of a blob.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingType {
    RedStuff,
    #[default]
    Rs2,
}

impl EncodingType {
    /// On-chain tag passed to `register_blob`.
    pub fn tag(&self) -> u8 {
        match self {
            EncodingType::RedStuff => 0,
            EncodingType::Rs2 => 1,
        }
    }

    /// Whether symbols must have an even size.
    fn requires_even_symbols(&self) -> bool {
        matches!(self, EncodingType::Rs2)
    }
}

/// Number of source symbols along each encoding axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSymbols {
    pub primary: u64,
    pub secondary: u64,
}

/// Maximum number of faulty shards tolerated by a committee of `n_shards`.
pub fn max_faulty_shards(n_shards: u16) -> u64 {
    u64::from(n_shards).saturating_sub(1) / 3
}

/// Shards that must confirm a write before a blob can be certified.
///
/// `q(n) = n - floor((n - 1) / 3)`, e.g. `q(10) = 7`, `q(13) = 9`.
pub fn quorum_shards(n_shards: u16) -> u64 {
    u64::from(n_shards) - max_faulty_shards(n_shards)
}

fn decoding_safety_limit(n_shards: u16, encoding: EncodingType) -> u64 {
    match encoding {
        EncodingType::RedStuff => (max_faulty_shards(n_shards) / 5).min(5),
        EncodingType::Rs2 => 0,
    }
}

/// Source symbol counts for a committee of `n_shards`.
pub fn source_symbols(n_shards: u16, encoding: EncodingType) -> SourceSymbols {
    let safety_limit = decoding_safety_limit(n_shards, encoding);
    let max_faulty = max_faulty_shards(n_shards);
    let min_correct = u64::from(n_shards) - max_faulty;

    SourceSymbols {
        primary: min_correct
            .saturating_sub(max_faulty)
            .saturating_sub(safety_limit),
        secondary: min_correct.saturating_sub(safety_limit),
    }
}

/// Size of a single symbol for a blob of `unencoded_length` bytes.
pub fn symbol_size(unencoded_length: u64, n_shards: u16, encoding: EncodingType) -> u64 {
    let symbols = source_symbols(n_shards, encoding);
    let per_symbol = (symbols.primary * symbols.secondary).max(1);

    let mut size = (unencoded_length.max(1) - 1) / per_symbol + 1;
    if encoding.requires_even_symbols() && size % 2 == 1 {
        size += 1;
    }
    size
}

/// Total storage footprint reserved on the network for one blob.
///
/// Includes every node's copy of the metadata plus all primary and secondary
/// slivers across the committee.
pub fn encoded_blob_length(unencoded_length: u64, n_shards: u16, encoding: EncodingType) -> u64 {
    let n = u64::from(n_shards);
    let symbols = source_symbols(n_shards, encoding);
    let size = symbol_size(unencoded_length, n_shards, encoding);

    let slivers_size = (symbols.primary + symbols.secondary) * size * n;
    let metadata = n * DIGEST_LEN * 2 + BLOB_ID_LEN;
    n * metadata + slivers_size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum_known_values() {
        assert_eq!(quorum_shards(10), 7);
        assert_eq!(quorum_shards(13), 9);
        assert_eq!(quorum_shards(4), 3);
        assert_eq!(quorum_shards(1000), 667);
    }

    #[test]
    fn test_source_symbols_rs2() {
        // n = 10: f = 3, min_correct = 7
        let symbols = source_symbols(10, EncodingType::Rs2);
        assert_eq!(symbols.primary, 4);
        assert_eq!(symbols.secondary, 7);
    }

    #[test]
    fn test_source_symbols_red_stuff_applies_safety_limit() {
        // n = 1000: f = 333, safety = min(5, 66) = 5
        let symbols = source_symbols(1000, EncodingType::RedStuff);
        assert_eq!(symbols.primary, 667 - 333 - 5);
        assert_eq!(symbols.secondary, 667 - 5);
    }

    #[test]
    fn test_symbol_size_rounds_up_to_even_for_rs2() {
        // 4 * 7 = 28 bytes per symbol row; 29 bytes needs 2 symbols
        assert_eq!(symbol_size(28, 10, EncodingType::Rs2), 2);
        assert_eq!(symbol_size(29, 10, EncodingType::Rs2), 2);
        assert_eq!(symbol_size(29, 10, EncodingType::RedStuff), 2);
        assert_eq!(symbol_size(28, 10, EncodingType::RedStuff), 1);
    }

    #[test]
    fn test_empty_blob_still_occupies_one_symbol() {
        assert_eq!(
            encoded_blob_length(0, 10, EncodingType::RedStuff),
            encoded_blob_length(1, 10, EncodingType::RedStuff)
        );
    }

    #[test]
    fn test_encoded_blob_length_formula() {
        // n = 10, symbol size 2, 11 symbols per node, metadata 10 * 64 + 32
        let expected = 10 * (10 * 64 + 32) + (4 + 7) * 2 * 10;
        assert_eq!(encoded_blob_length(10, 10, EncodingType::Rs2), expected);
    }

    #[test]
    fn test_encoding_tags() {
        assert_eq!(EncodingType::Rs2.tag(), 1);
        assert_eq!(EncodingType::RedStuff.tag(), 0);
        assert_eq!(EncodingType::default(), EncodingType::Rs2);
    }
}
