//! Error handling and result types for the record store.
//!
//! Every fallible operation in the crate reports a [`StoreError`]. Outcomes
//! that are part of normal operation (a full bucket, a missing id) are values
//! on the success path instead of errors.

use crate::config::ConfigError;

/// Error type for record store and index operations.
#[derive(Debug)]
pub enum StoreError {
    /// Invalid tree order specified.
    InvalidOrder(String),
    /// Store geometry rejected.
    Config(ConfigError),
    /// Node or index allocation failed.
    AllocationError(String),
    /// Block address is unaligned or past the end of the data file.
    InvalidAddress { address: u64, file_len: u64 },
    /// Record can never fit into an empty block.
    RecordTooLarge { size: usize, max: usize },
    /// Block header or slot array is inconsistent.
    CorruptedBlock(String),
    /// Serialized record failed to decode.
    CorruptedRecord(String),
    /// Tree structure (in memory or on disk) is malformed.
    CorruptedTree(String),
    /// Internal data structure integrity violation.
    DataIntegrityError(String),
    /// Underlying file operation failed.
    Io(std::io::Error),
}

impl StoreError {
    /// Create an InvalidOrder error with context
    pub fn invalid_order(order: usize, min_required: usize) -> Self {
        Self::InvalidOrder(format!(
            "Order {} is invalid (minimum required: {})",
            order, min_required
        ))
    }

    /// Create an InvalidOrder error for an order above the supported maximum
    pub fn order_too_large(order: usize, max_allowed: usize) -> Self {
        Self::InvalidOrder(format!(
            "Order {} is invalid (maximum allowed: {})",
            order, max_allowed
        ))
    }

    /// Create a DataIntegrityError with context
    pub fn data_integrity(context: &str, details: &str) -> Self {
        Self::DataIntegrityError(format!("{}: {}", context, details))
    }

    /// Create an AllocationError with context
    pub fn allocation_error(resource: &str, reason: &str) -> Self {
        Self::AllocationError(format!("Failed to allocate {}: {}", resource, reason))
    }

    /// Create a CorruptedTree error with context
    pub fn corrupted_tree(component: &str, details: &str) -> Self {
        Self::CorruptedTree(format!("{} corruption: {}", component, details))
    }

    /// Create a CorruptedBlock error with context
    pub fn corrupted_block(address: u64, details: &str) -> Self {
        Self::CorruptedBlock(format!("block at {}: {}", address, details))
    }

    /// Create a CorruptedRecord error with context
    pub fn corrupted_record(details: &str) -> Self {
        Self::CorruptedRecord(details.to_string())
    }

    /// Check if this error came from the file layer
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Check if this error reports on-disk corruption
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::CorruptedBlock(_) | Self::CorruptedRecord(_) | Self::CorruptedTree(_)
        )
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::InvalidOrder(msg) => write!(f, "Invalid order: {}", msg),
            StoreError::Config(e) => write!(f, "Invalid configuration: {}", e),
            StoreError::AllocationError(msg) => write!(f, "Allocation error: {}", msg),
            StoreError::InvalidAddress { address, file_len } => write!(
                f,
                "Invalid block address {} (data file is {} bytes)",
                address, file_len
            ),
            StoreError::RecordTooLarge { size, max } => {
                write!(f, "Record too large: {} bytes (max {})", size, max)
            }
            StoreError::CorruptedBlock(msg) => write!(f, "Corrupted block: {}", msg),
            StoreError::CorruptedRecord(msg) => write!(f, "Corrupted record: {}", msg),
            StoreError::CorruptedTree(msg) => write!(f, "Corrupted tree: {}", msg),
            StoreError::DataIntegrityError(msg) => write!(f, "Data integrity error: {}", msg),
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        StoreError::Config(e)
    }
}

/// Internal result type for tree operations
pub(crate) type TreeResult<T> = Result<T, StoreError>;

/// Public result type for store operations that may fail
pub type StoreResult<T> = Result<T, StoreError>;

/// Result extension trait for attaching context to errors
pub trait StoreResultExt<T> {
    /// Convert to a StoreResult with additional context
    fn with_context(self, context: &str) -> StoreResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn with_context(self, context: &str) -> StoreResult<T> {
        self.map_err(|e| match e {
            StoreError::InvalidOrder(msg) => {
                StoreError::InvalidOrder(format!("{}: {}", context, msg))
            }
            StoreError::AllocationError(msg) => {
                StoreError::AllocationError(format!("{}: {}", context, msg))
            }
            StoreError::CorruptedBlock(msg) => {
                StoreError::CorruptedBlock(format!("{}: {}", context, msg))
            }
            StoreError::CorruptedRecord(msg) => {
                StoreError::CorruptedRecord(format!("{}: {}", context, msg))
            }
            StoreError::CorruptedTree(msg) => StoreError::corrupted_tree(context, &msg),
            StoreError::DataIntegrityError(msg) => StoreError::data_integrity(context, &msg),
            other => other,
        })
    }
}
