//! Batch operation types: an ordered list of reads and writes, scoped to one
//! workspace, whose writes commit atomically or not at all.

use serde_json::Value;

use trellis_store::{DocPath, MAX_TRANSACT_ITEMS};

use crate::error::{ClientError, Result};

/// One operation in a batch.
#[derive(Clone, Debug)]
pub enum BatchOperation {
    /// Read the document at a path. Observes pre-batch state.
    Read {
        /// Path to read.
        path: DocPath,
    },
    /// Write a value at a path. Commits atomically with the batch's other
    /// writes.
    Write {
        /// Path to write.
        path: DocPath,
        /// Value to store; null writes a tombstone.
        value: Value,
    },
}

impl BatchOperation {
    /// The path this operation addresses.
    pub fn path(&self) -> &DocPath {
        match self {
            BatchOperation::Read { path } | BatchOperation::Write { path, .. } => path,
        }
    }
}

/// Per-operation result, in the order the operations were supplied.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOpResult {
    /// Value read, or `None` for an absent document.
    Read(Option<Value>),
    /// The write at this path committed.
    Written(DocPath),
}

/// Validates batch shape before any store contact: 1..=25 operations.
pub fn validate_batch(ops: &[BatchOperation]) -> Result<()> {
    if ops.is_empty() {
        return Err(ClientError::Validation {
            reason: "batch contains no operations".to_string(),
        });
    }
    if ops.len() > MAX_TRANSACT_ITEMS {
        return Err(ClientError::TooManyItems {
            count: ops.len(),
            max: MAX_TRANSACT_ITEMS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read_op(path: &str) -> BatchOperation {
        BatchOperation::Read {
            path: DocPath::parse(path).unwrap(),
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        assert!(matches!(
            validate_batch(&[]),
            Err(ClientError::Validation { .. })
        ));
    }

    #[test]
    fn test_oversized_batch_rejected() {
        let ops: Vec<_> = (0..26).map(|i| read_op(&format!("/n/{}", i))).collect();
        match validate_batch(&ops) {
            Err(ClientError::TooManyItems { count, max }) => {
                assert_eq!(count, 26);
                assert_eq!(max, 25);
            }
            other => panic!("expected TooManyItems, got {:?}", other),
        }
    }

    #[test]
    fn test_full_batch_accepted() {
        let ops: Vec<_> = (0..25).map(|i| read_op(&format!("/n/{}", i))).collect();
        assert!(validate_batch(&ops).is_ok());
    }

    #[test]
    fn test_op_path_accessor() {
        let op = BatchOperation::Write {
            path: DocPath::parse("/a").unwrap(),
            value: json!(1),
        };
        assert_eq!(op.path().as_str(), "/a");
    }
}
