pub mod generator;
pub mod session;

pub use generator::{generate_session_token, TokenError};
pub use session::{
    Credentials, IssuedSession, SessionConfig, SessionError, SessionManager,
    MAX_TOKEN_EXPIRATION_MINUTES,
};
