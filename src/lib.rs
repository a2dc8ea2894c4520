//! # CertForge - X.509 certificate issuance from declarative descriptors
//!
//! CertForge issues X.509 certificates from declarative descriptors. It is
//! built entirely with rustcrypto libraries, with no dependency on ring or
//! openssl: a descriptor names the subject, role, validity window, usages
//! and alternative names; the issuer generates a key pair, materializes the
//! descriptor into a signable template, signs it against a certificate
//! authority (self-signed for CA descriptors, chained otherwise) and
//! returns PEM-encoded certificate and key bytes.
//!
//! ## Supported key types
//!
//! - **RSA**: 2048-bit minimum, 4096-bit recommended
//! - **ECDSA**: P-256 and P-384 curves
//!
//! Private keys marshal to PKCS#1 (RSA) or SEC1 (ECDSA) PEM blocks, with
//! optional passphrase encryption, or to PKCS#8.
//!
//! ## Quick Start
//!
//! ### Issuing a CA and a server certificate
//!
//! ```rust,no_run
//! use certforge::{
//!     cert::Certificate,
//!     issuer::{IssueOptions, Issuer},
//!     key::{EcCurve, KeyGenerator},
//! };
//!
//! # fn main() -> Result<(), certforge::error::CertForgeError> {
//! let mut issuer = Issuer::with_key_generator(KeyGenerator::ecdsa(EcCurve::P256));
//!
//! // Self-sign a CA and adopt it as the issuer's current authority.
//! let ca = Certificate::ca().build();
//! let opts = IssueOptions {
//!     adopt_as_authority: true,
//!     ..Default::default()
//! };
//! let (ca_cert, ca_key) = issuer.issue_with_options(&ca, opts)?;
//!
//! // Issue a server certificate chained to the adopted CA.
//! let server = Certificate::server()
//!     .common_name("server.example.com")
//!     .dns_names(["example.com", "www.example.com"])
//!     .build();
//! let (server_cert, server_key) = issuer.issue(&server)?;
//! println!("{}", String::from_utf8_lossy(&server_cert));
//! # Ok(())
//! # }
//! ```
//!
//! ### Writing the result to files
//!
//! ```rust,no_run
//! use certforge::{cert::Certificate, issuer::Issuer, writer::FileWriter};
//!
//! # fn main() -> Result<(), certforge::error::CertForgeError> {
//! let mut issuer = Issuer::new();
//! let ca = Certificate::ca().build();
//! let mut writer = FileWriter::new("ca.crt", "ca.key");
//! issuer.issue_and_write(&mut writer, &ca)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Passphrase-protected keys
//!
//! ```rust,no_run
//! use certforge::{
//!     cert::Certificate,
//!     issuer::{IssueOptions, Issuer},
//!     key::{KeyFormat, MarshalOptions},
//! };
//!
//! # fn main() -> Result<(), certforge::error::CertForgeError> {
//! let mut issuer = Issuer::new();
//! let ca = Certificate::ca().build();
//! let opts = IssueOptions {
//!     key_opts: MarshalOptions {
//!         password: Some(b"changeit".to_vec()),
//!         format: KeyFormat::Native,
//!     },
//!     ..Default::default()
//! };
//! let (_cert, _key) = issuer.issue_with_options(&ca, opts)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: key generation and private-key marshaling
//! - [`cert`]: certificate descriptors, builders, and templates
//! - [`issuer`]: issuance and CA state
//! - [`writer`]: persistence adapters for issued bytes
//! - [`error`]: error types

pub mod cert;
pub mod error;
pub mod issuer;
pub mod key;
pub mod writer;
