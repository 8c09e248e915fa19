use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),
}

/// Fill `len` bytes from the operating system's CSPRNG.
pub fn generate_bytes(len: usize) -> Result<Vec<u8>, TokenError> {
    let mut bytes = vec![0u8; len];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

/// Generate a session token: `len` random bytes, upper-case hex encoded.
pub fn generate_session_token(len: usize) -> Result<String, TokenError> {
    Ok(hex::encode_upper(generate_bytes(len)?))
}
