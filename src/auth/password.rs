/// Password Hashing and Verification

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

const BCRYPT_COST: u32 = 10;
// bcrypt only reads the first 72 bytes; longer input would be silently truncated
const MAX_PASSWORD_LENGTH: usize = 72;

/// Hash a password using bcrypt
///
/// # Errors
/// Returns error if the password is empty or too long, or if hashing fails
pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password".to_string(), MAX_PASSWORD_LENGTH).into());
    }

    hash(password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}
