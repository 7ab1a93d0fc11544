//! Store geometry configuration.
//!
//! The geometry of a data file is fixed when it is created: the number of
//! hash buckets, how many blocks each bucket owns, and the size of a block.
//! The B+ tree order travels alongside it so both indices are built with the
//! same fanout.
//!
//! # Environment Variables
//!
//! - `BUCKETDB_BUCKET_COUNT`: number of hash buckets (default: `1024`)
//! - `BUCKETDB_BLOCKS_PER_BUCKET`: blocks per bucket (default: `4`)
//! - `BUCKETDB_BLOCK_SIZE`: bytes per block (default: `4096`)
//! - `BUCKETDB_TREE_ORDER`: tree order `m` (default: `8`)

use crate::block::{BLOCK_HEADER_SIZE, SLOT_SIZE};
use crate::record::Record;
use crate::types::{MAX_ORDER, MIN_ORDER};

/// Geometry of a record store.
///
/// # Invariants
///
/// After `validate()` succeeds:
/// - every value is non-zero and `MIN_ORDER <= tree_order <= MAX_ORDER`
/// - an empty block can hold at least one minimal record
/// - every block address fits in a 32-bit block pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Number of hash buckets in the table.
    pub bucket_count: u32,
    /// Fixed number of blocks owned by each bucket.
    pub blocks_per_bucket: u32,
    /// Size of one block in bytes.
    pub block_size: u32,
    /// Order `m` of both B+ tree indices (at most `2m` keys per node).
    pub tree_order: usize,
}

/// Error returned when a configuration value is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A value is out of range or unparsable.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket_count: Self::DEFAULT_BUCKET_COUNT,
            blocks_per_bucket: Self::DEFAULT_BLOCKS_PER_BUCKET,
            block_size: Self::DEFAULT_BLOCK_SIZE,
            tree_order: Self::DEFAULT_TREE_ORDER,
        }
    }
}

impl StoreConfig {
    pub const DEFAULT_BUCKET_COUNT: u32 = 1024;
    pub const DEFAULT_BLOCKS_PER_BUCKET: u32 = 4;
    pub const DEFAULT_BLOCK_SIZE: u32 = 4096;
    pub const DEFAULT_TREE_ORDER: usize = 8;

    /// Smallest block that can hold one minimal record.
    pub const MIN_BLOCK_SIZE: u32 =
        (BLOCK_HEADER_SIZE + SLOT_SIZE + Record::MIN_ENCODED_LEN) as u32;

    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but does not parse, or if the
    /// resulting geometry fails `validate()`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            bucket_count: load_var("BUCKETDB_BUCKET_COUNT", defaults.bucket_count)?,
            blocks_per_bucket: load_var("BUCKETDB_BLOCKS_PER_BUCKET", defaults.blocks_per_bucket)?,
            block_size: load_var("BUCKETDB_BLOCK_SIZE", defaults.block_size)?,
            tree_order: load_var("BUCKETDB_TREE_ORDER", defaults.tree_order)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the geometry is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_count == 0 {
            return Err(invalid("bucket_count", "must be at least 1".to_string()));
        }
        if self.blocks_per_bucket == 0 {
            return Err(invalid("blocks_per_bucket", "must be at least 1".to_string()));
        }
        if self.block_size < Self::MIN_BLOCK_SIZE {
            return Err(invalid(
                "block_size",
                format!(
                    "{} is smaller than the minimum of {}",
                    self.block_size,
                    Self::MIN_BLOCK_SIZE
                ),
            ));
        }
        if self.tree_order < MIN_ORDER {
            return Err(invalid(
                "tree_order",
                format!("must be at least {}", MIN_ORDER),
            ));
        }
        if self.tree_order > MAX_ORDER {
            return Err(invalid(
                "tree_order",
                format!("{} exceeds the maximum of {}", self.tree_order, MAX_ORDER),
            ));
        }
        // Block pointers are u32 and u32::MAX is reserved as the null reference.
        match self.checked_file_len() {
            Some(len) if len < u64::from(u32::MAX) => Ok(()),
            _ => Err(invalid(
                "bucket_count",
                "data file would exceed the 32-bit block address range".to_string(),
            )),
        }
    }

    /// Total number of blocks in the data file.
    pub fn total_blocks(&self) -> u64 {
        u64::from(self.bucket_count) * u64::from(self.blocks_per_bucket)
    }

    /// Size in bytes of one bucket.
    pub fn bucket_len(&self) -> u64 {
        u64::from(self.blocks_per_bucket) * u64::from(self.block_size)
    }

    /// Exact size in bytes of a data file with this geometry.
    pub fn file_len(&self) -> u64 {
        self.total_blocks() * u64::from(self.block_size)
    }

    fn checked_file_len(&self) -> Option<u64> {
        u64::from(self.bucket_count)
            .checked_mul(u64::from(self.blocks_per_bucket))?
            .checked_mul(u64::from(self.block_size))
    }
}

fn invalid(name: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message,
    }
}

fn load_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a valid number"),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.bucket_count, 1024);
        assert_eq!(config.blocks_per_bucket, 4);
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.tree_order, 8);
        assert!(config.validate().is_ok());
        assert_eq!(config.file_len(), 1024 * 4 * 4096);
    }

    #[test]
    fn test_rejects_zero_values() {
        let config = StoreConfig {
            bucket_count: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            blocks_per_bucket: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            tree_order: 0,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_tiny_blocks() {
        let config = StoreConfig {
            block_size: StoreConfig::MIN_BLOCK_SIZE - 1,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            block_size: StoreConfig::MIN_BLOCK_SIZE,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_tree_order() {
        let config = StoreConfig {
            tree_order: usize::MAX / 4,
            ..StoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tree_order"));

        let config = StoreConfig {
            tree_order: MAX_ORDER,
            ..StoreConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_geometry_past_pointer_range() {
        let config = StoreConfig {
            bucket_count: u32::MAX,
            blocks_per_bucket: 2,
            block_size: 4096,
            tree_order: 2,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("32-bit"));
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::InvalidValue {
            name: "TEST_VAR".to_string(),
            message: "bad value".to_string(),
        };
        assert_eq!(error.to_string(), "invalid value for TEST_VAR: bad value");
    }

    #[test]
    fn test_load_var_falls_back_to_default() {
        let value: u32 = load_var("BUCKETDB_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
