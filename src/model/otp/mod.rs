mod code;

pub use code::{Code, ParseError, CODE_LENGTH};

use thiserror::Error;

/// Why an OTP verification attempt was refused.
///
/// A missing user is not represented here; lookups happen before the
/// pending code is ever consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("user is already verified")]
    AlreadyVerified,
    #[error("no valid code is pending")]
    Expired,
    #[error("submitted code does not match")]
    Mismatch,
}
