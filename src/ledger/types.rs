//! Ledger identifiers and transaction results.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing a hex identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid identifier '{0}': expected up to 32 hex-encoded bytes")]
pub struct InvalidId(pub String);

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = InvalidId;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                if digits.is_empty() || digits.len() > 64 {
                    return Err(InvalidId(s.to_string()));
                }
                // Short ids are left-padded, e.g. 0x2 for the framework package
                let padded = format!("{:0>64}", digits);
                let decoded = hex::decode(&padded).map_err(|_| InvalidId(s.to_string()))?;
                let mut bytes = [0u8; 32];
                bytes.copy_from_slice(&decoded);
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// Identifier of an on-chain object (also used for package ids).
    ObjectId
);

hex_id!(
    /// Account address.
    Address
);

impl ObjectId {
    /// Base36 rendering used for site subdomains.
    pub fn to_base36(&self) -> String {
        const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

        let mut number = self.0.to_vec();
        let mut digits = Vec::new();

        while number.iter().any(|b| *b != 0) {
            let mut remainder = 0u32;
            for byte in number.iter_mut() {
                let value = (remainder << 8) | u32::from(*byte);
                *byte = (value / 36) as u8;
                remainder = value % 36;
            }
            digits.push(ALPHABET[remainder as usize]);
        }

        if digits.is_empty() {
            return "0".to_string();
        }
        digits.reverse();
        String::from_utf8_lossy(&digits).into_owned()
    }
}

/// Digest identifying a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionDigest(pub String);

impl fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Execution status reported in transaction effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Failure { error: String },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// Reference to an object created or mutated by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
}

/// Effects of a transaction once it reached finality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEffects {
    pub digest: TransactionDigest,
    pub status: ExecutionStatus,
    pub created: Vec<ObjectRef>,
    pub deleted: Vec<ObjectId>,
}

/// Result of simulating a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunResult {
    pub status: ExecutionStatus,
    /// Gas budget the transaction needs to execute.
    pub gas_budget: u64,
}

/// A raw object as returned by object queries.
///
/// `contents` is the encoded Move struct; decode it with an
/// [`super::ObjectCodec`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerObject {
    pub object_id: ObjectId,
    pub version: u64,
    pub type_tag: String,
    pub contents: Vec<u8>,
}

/// Entry of an object's dynamic-field index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicFieldInfo {
    /// Field object holding the value.
    pub object_id: ObjectId,
    /// Type of the value stored in the field.
    pub object_type: String,
    /// Decoded field name (the resource path for site resources).
    pub name: String,
}

/// One page of a cursor-paginated query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_next_page: bool,
}
