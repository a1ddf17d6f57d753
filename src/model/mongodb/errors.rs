//! The mongodb crate doesn't provide error code constants, so we define
//! the one we rely on ourselves.

use mongodb::error::{
    Error as DbError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
};

pub const DUPLICATE_KEY: i32 = 11000;
pub const WRITE_CONFLICT: i32 = 112;

/// Return true if the given error is a duplicate key violation, either as a
/// plain write error or as a command error at transaction commit.
pub fn is_duplicate_key_error(err: &DbError) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Return true if the error marks a transaction that lost a storage-level
/// race. The server reports this either with the transient transaction
/// label or as a bare write conflict; either way the transaction did not
/// apply and may be re-evaluated or retried.
pub fn is_transient_transaction_error(err: &DbError) -> bool {
    if err.contains_label(TRANSIENT_TRANSACTION_ERROR) {
        return true;
    }
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == WRITE_CONFLICT,
        ErrorKind::Command(e) => e.code == WRITE_CONFLICT,
        _ => false,
    }
}
