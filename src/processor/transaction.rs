//! Undo journal for multi-step filesystem commands
//!
//! Each mutating command records the steps it performed. If a later step
//! (including index regeneration) fails, the steps are undone in reverse
//! order so the directory returns to its last committed state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, Result};
use crate::fs_utils::{atomic_rename, atomic_write, write_new};

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Committed,
    RolledBack,
}

/// One completed filesystem step and what is needed to undo it
#[derive(Debug, Clone)]
pub enum FsOperation {
    Created { path: PathBuf },
    Removed { path: PathBuf, contents: Vec<u8> },
    Renamed { from: PathBuf, to: PathBuf },
    Overwritten { path: PathBuf, previous: Option<Vec<u8>> },
}

/// Ordered record of the steps one command performed
#[derive(Debug)]
pub struct FsTransaction {
    operations: Vec<FsOperation>,
    status: TransactionStatus,
}

impl Default for FsTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl FsTransaction {
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
            status: TransactionStatus::Pending,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn operations(&self) -> &[FsOperation] {
        &self.operations
    }

    /// Create a new file (fails if it exists)
    pub fn create(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        write_new(path, contents).map_err(|e| EngineError::fs(path, e))?;
        self.operations.push(FsOperation::Created {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Remove a file, keeping its bytes for rollback
    pub fn remove(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read(path).map_err(|e| EngineError::fs(path, e))?;
        fs::remove_file(path).map_err(|e| EngineError::fs(path, e))?;
        self.operations.push(FsOperation::Removed {
            path: path.to_path_buf(),
            contents,
        });
        Ok(())
    }

    /// Rename a file; refuses to clobber an existing target
    pub fn rename(&mut self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            return Err(EngineError::fs(to, "target already exists"));
        }
        atomic_rename(from, to).map_err(|e| EngineError::fs(from, e))?;
        self.operations.push(FsOperation::Renamed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
        Ok(())
    }

    /// Atomically replace (or create) a file, keeping the old bytes
    pub fn overwrite(&mut self, path: &Path, contents: &[u8]) -> Result<()> {
        let previous = fs::read(path).ok();
        atomic_write(path, contents).map_err(|e| EngineError::fs(path, e))?;
        self.operations.push(FsOperation::Overwritten {
            path: path.to_path_buf(),
            previous,
        });
        Ok(())
    }

    /// Mark every step as permanent
    pub fn commit(mut self) {
        self.status = TransactionStatus::Committed;
        self.operations.clear();
    }

    /// Undo every recorded step in reverse order
    ///
    /// Keeps going after individual failures and reports the first one.
    pub fn rollback(mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(op) = self.operations.pop() {
            if let Err(e) = undo(&op) {
                tracing::error!("[PROCESSOR] Rollback step {:?} failed: {}", op, e);
                first_error.get_or_insert(e);
            }
        }
        self.status = TransactionStatus::RolledBack;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn undo(op: &FsOperation) -> Result<()> {
    match op {
        FsOperation::Created { path } => fs::remove_file(path).map_err(|e| EngineError::fs(path, e)),
        FsOperation::Removed { path, contents } => {
            atomic_write(path, contents).map_err(|e| EngineError::fs(path, e))
        }
        FsOperation::Renamed { from, to } => atomic_rename(to, from).map_err(|e| EngineError::fs(to, e)),
        FsOperation::Overwritten { path, previous } => match previous {
            Some(bytes) => atomic_write(path, bytes).map_err(|e| EngineError::fs(path, e)),
            None => fs::remove_file(path).map_err(|e| EngineError::fs(path, e)),
        },
    }
}
