//! Error types for migration admission.

use crate::types::{ChunkRange, NamespaceString, ShardId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for migration admission.
///
/// Errors are `Clone` so a single migration outcome can be handed to every
/// caller that joined the same migration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Another, non-joinable migration already occupies this node.
    #[error("{0}")]
    ConflictingOperationInProgress(ActiveMigration),

    /// The operation was killed while waiting.
    #[error("operation {op_id} was interrupted")]
    Interrupted { op_id: u64 },

    /// The operation's deadline passed while waiting.
    #[error("operation {op_id} exceeded its time limit")]
    DeadlineExceeded { op_id: u64 },

    /// Malformed namespace.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Empty or inverted chunk bounds.
    #[error("invalid chunk range: {0}")]
    InvalidChunkRange(String),

    /// The migration protocol reported a failure.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Encoding or decoding a diagnostic document failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    ConflictingOperationInProgress,
    Interrupted,
    DeadlineExceeded,
    InvalidNamespace,
    BadValue,
    MigrationFailed,
    SerializationError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::ConflictingOperationInProgress => write!(f, "ConflictingOperationInProgress"),
            ErrorCode::Interrupted => write!(f, "Interrupted"),
            ErrorCode::DeadlineExceeded => write!(f, "DeadlineExceeded"),
            ErrorCode::InvalidNamespace => write!(f, "InvalidNamespace"),
            ErrorCode::BadValue => write!(f, "BadValue"),
            ErrorCode::MigrationFailed => write!(f, "MigrationFailed"),
            ErrorCode::SerializationError => write!(f, "SerializationError"),
            ErrorCode::InternalError => write!(f, "InternalError"),
        }
    }
}

impl Error {
    /// Get the machine-readable kind of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConflictingOperationInProgress(_) => ErrorCode::ConflictingOperationInProgress,
            Error::Interrupted { .. } => ErrorCode::Interrupted,
            Error::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            Error::InvalidNamespace(_) => ErrorCode::InvalidNamespace,
            Error::InvalidChunkRange(_) => ErrorCode::BadValue,
            Error::MigrationFailed(_) => ErrorCode::MigrationFailed,
            Error::Serialization(_) => ErrorCode::SerializationError,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if this error came from a killed or timed-out wait.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Interrupted { .. } | Error::DeadlineExceeded { .. })
    }

    /// Create a migration failure with the given message.
    pub fn migration_failed(msg: impl Into<String>) -> Self {
        Self::MigrationFailed(msg.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// The migration occupying this node when an admission was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveMigration {
    /// This node is donating `range` of `nss` to `to_shard`.
    Donating {
        nss: NamespaceString,
        range: ChunkRange,
        to_shard: ShardId,
    },
    /// This node is receiving `range` of `nss` from `from_shard`.
    Receiving {
        nss: NamespaceString,
        range: ChunkRange,
        from_shard: ShardId,
    },
}

impl ActiveMigration {
    /// Namespace of the active migration.
    pub fn nss(&self) -> &NamespaceString {
        match self {
            ActiveMigration::Donating { nss, .. } | ActiveMigration::Receiving { nss, .. } => nss,
        }
    }

    /// Chunk range of the active migration.
    pub fn range(&self) -> &ChunkRange {
        match self {
            ActiveMigration::Donating { range, .. } | ActiveMigration::Receiving { range, .. } => {
                range
            }
        }
    }

    /// The shard on the other end of the active migration.
    pub fn peer_shard(&self) -> &ShardId {
        match self {
            ActiveMigration::Donating { to_shard, .. } => to_shard,
            ActiveMigration::Receiving { from_shard, .. } => from_shard,
        }
    }

    /// Check if this node is the donor.
    pub fn is_donating(&self) -> bool {
        matches!(self, ActiveMigration::Donating { .. })
    }
}

impl fmt::Display for ActiveMigration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActiveMigration::Donating { nss, range, to_shard } => write!(
                f,
                "Unable to start new migration because this shard is currently donating chunk {} \
                 for namespace {} to {}",
                range, nss, to_shard
            ),
            ActiveMigration::Receiving { nss, range, from_shard } => write!(
                f,
                "Unable to start new migration because this shard is currently receiving chunk {} \
                 for namespace {} from {}",
                range, nss, from_shard
            ),
        }
    }
}
