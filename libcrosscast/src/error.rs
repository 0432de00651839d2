//! Error types for Crosscast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::InvalidInput(_) | CrosscastError::UnsupportedPlatform(_) => 3,
            CrosscastError::Platform(PlatformError::Authentication(_)) => 2,
            CrosscastError::Config(_) => 2,
            CrosscastError::Cipher(CipherError::MissingKey | CipherError::InvalidKey(_)) => 2,
            CrosscastError::Platform(_) => 1,
            CrosscastError::Cipher(_) => 1,
            CrosscastError::Database(_) => 1,
            CrosscastError::InvalidState(_) => 1,
        }
    }

    /// Message that is safe to hand back to an end user
    ///
    /// Upstream provider descriptions are passed through for OAuth failures,
    /// everything else is collapsed into a generic sentence.
    pub fn user_message(&self) -> String {
        match self {
            CrosscastError::UnsupportedPlatform(platform) => {
                format!("Unsupported platform: {}", platform)
            }
            CrosscastError::InvalidState(_) => {
                "The connection attempt could not be verified. Please try again.".to_string()
            }
            CrosscastError::InvalidInput(msg) => msg.clone(),
            CrosscastError::Platform(e) => e.user_message(),
            CrosscastError::Cipher(CipherError::Decryption) => {
                "Stored credentials are unreadable; reconnect required".to_string()
            }
            CrosscastError::Cipher(_) | CrosscastError::Config(_) | CrosscastError::Database(_) => {
                "Internal error; please try again later".to_string()
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: String, reason: String },
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Publishing failed: {0}")]
    Publish(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Identity lookup failed: {0}")]
    IdentityLookup(String),

    #[error("Token refresh failed: {0}")]
    Refresh(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl PlatformError {
    fn user_message(&self) -> String {
        match self {
            PlatformError::TokenExchange(msg) => {
                format!("Could not complete sign-in with the platform: {}", msg)
            }
            PlatformError::IdentityLookup(msg) => {
                format!("Could not read the connected account: {}", msg)
            }
            other => other.to_string(),
        }
    }
}

/// Errors from the token cipher
///
/// `Decryption` deliberately carries no detail: tampered data, a wrong key and
/// a truncated blob all look the same to the caller.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Encryption key is not configured")]
    MissingKey,

    #[error("Encryption key is invalid: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: ciphertext is corrupted or was sealed with another key")]
    Decryption,
}
