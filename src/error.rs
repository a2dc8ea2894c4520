use thiserror::Error;

/// Represents errors that can occur in the certforge library.
///
/// Every fallible operation returns one of these variants; nothing in the
/// library panics on bad input or retries a failed primitive.
#[derive(Debug, Error)]
pub enum CertForgeError {
    /// The underlying key generation primitive failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A non-CA descriptor was issued while no CA pair is held.
    #[error("CA certificate or private key is not provided")]
    MissingAuthority,

    /// The signing primitive rejected the certificate template.
    #[error("Failed to sign certificate: {0}")]
    Signing(String),

    /// Error during data encoding.
    #[error("Failed to encode data: {0}")]
    Encoding(String),

    /// Error during data decoding.
    #[error("Failed to decode data: {0}")]
    Decoding(String),

    /// Error due to invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Writing the certificate bytes to the destination failed.
    #[error("Failed to write certificate: {0}")]
    CertificateWrite(#[source] std::io::Error),

    /// Writing the private key bytes to the destination failed.
    #[error("Failed to write private key: {0}")]
    KeyWrite(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CertForgeError>;

impl From<der::Error> for CertForgeError {
    /// Converts a `der::Error` into a `CertForgeError`.
    fn from(err: der::Error) -> Self {
        CertForgeError::Decoding(err.to_string())
    }
}

impl From<pem::PemError> for CertForgeError {
    fn from(err: pem::PemError) -> Self {
        CertForgeError::Decoding(err.to_string())
    }
}

impl From<rsa::Error> for CertForgeError {
    fn from(err: rsa::Error) -> Self {
        CertForgeError::KeyGeneration(err.to_string())
    }
}
