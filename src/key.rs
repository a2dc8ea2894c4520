//! Key generation and private-key marshaling.
//!
//! A [`KeyGenerator`] produces a fresh [`KeyPair`] (RSA or ECDSA) and
//! marshals it to PEM, either in the algorithm's native form (PKCS#1 for
//! RSA, SEC1 for ECDSA) or as PKCS#8. Native-form output can additionally
//! be protected with a passphrase using legacy PEM encryption
//! (`DEK-Info: AES-256-CBC`); PKCS#8 output always ignores the passphrase
//! because encrypted PKCS#8 uses a different envelope this library does
//! not produce.

use p256::ecdsa::{SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey};
use p384::ecdsa::{SigningKey as P384SigningKey, VerifyingKey as P384VerifyingKey};
use pkcs8::EncodePrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sec1::EncodeEcPrivateKey;
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CertForgeError, Result};

/// PEM block type for PKCS#1 RSA private keys.
pub const RSA_BLOCK_TYPE: &str = "RSA PRIVATE KEY";
/// PEM block type for SEC1 EC private keys.
pub const EC_BLOCK_TYPE: &str = "EC PRIVATE KEY";
/// PEM block type for PKCS#8 private keys of any algorithm.
pub const PKCS8_BLOCK_TYPE: &str = "PRIVATE KEY";
/// PEM block type for signed certificates.
pub const CERTIFICATE_BLOCK_TYPE: &str = "CERTIFICATE";

/// Minimum and default RSA modulus size in bits.
pub const DEFAULT_RSA_BITS: usize = 2048;
/// Recommended RSA modulus size in bits.
pub const RECOMMENDED_RSA_BITS: usize = 4096;

const DEK_INFO_CIPHER: &str = "AES-256-CBC";

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    fn from(value: SignatureAlgorithm) -> Self {
        match value {
            SignatureAlgorithm::Sha256WithRSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
                parameters: None,
            },
            SignatureAlgorithm::Sha256WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
                parameters: None,
            },
            SignatureAlgorithm::Sha384WithECDSA => x509_cert::spki::AlgorithmIdentifierOwned {
                oid: const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
                parameters: None,
            },
        }
    }
}

/// An asymmetric key pair held by the issuance pipeline.
#[derive(Clone)]
pub enum KeyPair {
    Rsa {
        private: Box<RsaPrivateKey>,
        public: RsaPublicKey,
    },
    EcdsaP256 {
        signing_key: P256SigningKey,
        verifying_key: P256VerifyingKey,
    },
    EcdsaP384 {
        signing_key: P384SigningKey,
        verifying_key: P384VerifyingKey,
    },
}

impl KeyPair {
    /// Signs `data` with this key, returning the signature bytes in the
    /// encoding X.509 expects (PKCS#1 v1.5 for RSA, ASN.1 DER for ECDSA).
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            KeyPair::Rsa { private, .. } => {
                let signing_key: RsaSigningKey<Sha256> = RsaSigningKey::new(*private.clone());
                let signature = signing_key
                    .try_sign(data)
                    .map_err(|e| CertForgeError::Signing(e.to_string()))?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP256 { signing_key, .. } => {
                let signature: p256::ecdsa::Signature = signing_key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384 { signing_key, .. } => {
                let signature: p384::ecdsa::Signature = signing_key.sign(data);
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    /// Returns the SubjectPublicKeyInfo for the public half of this pair.
    pub fn to_spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            KeyPair::Rsa { public, .. } => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            KeyPair::EcdsaP256 { verifying_key, .. } => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
            KeyPair::EcdsaP384 { verifying_key, .. } => {
                SubjectPublicKeyInfoOwned::from_key(*verifying_key)
            }
        };
        spki.map_err(|e| CertForgeError::Encoding(e.to_string()))
    }

    /// Returns the signature algorithm certificates signed with this key use.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa { .. } => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP256 { .. } => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384 { .. } => SignatureAlgorithm::Sha384WithECDSA,
        }
    }
}

/// NIST curves supported for ECDSA key generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EcCurve {
    #[default]
    P256,
    P384,
}

/// Serialization formats for marshaled private keys.
///
/// `Native` means PKCS#1 for RSA keys and SEC1 for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyFormat {
    #[default]
    Native,
    Pkcs8,
}

/// Options controlling how a generated private key is marshaled.
#[derive(Debug, Clone, Default)]
pub struct MarshalOptions {
    /// Encrypts the PEM block with this passphrase when present.
    /// Ignored for [`KeyFormat::Pkcs8`].
    pub password: Option<Vec<u8>>,
    pub format: KeyFormat,
}

/// Generates key pairs for a fixed algorithm and parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenerator {
    Rsa { bits: usize },
    Ecdsa { curve: EcCurve },
}

impl Default for KeyGenerator {
    fn default() -> Self {
        KeyGenerator::Rsa {
            bits: RECOMMENDED_RSA_BITS,
        }
    }
}

impl KeyGenerator {
    /// Returns an RSA key generator.
    /// A bit size below 2048 is raised to 2048.
    pub fn rsa(bits: usize) -> Self {
        KeyGenerator::Rsa {
            bits: bits.max(DEFAULT_RSA_BITS),
        }
    }

    /// Returns an ECDSA key generator for the given curve.
    pub fn ecdsa(curve: EcCurve) -> Self {
        KeyGenerator::Ecdsa { curve }
    }

    /// Generates a fresh key pair.
    ///
    /// Fails only if the underlying primitive fails; such failures are
    /// fatal and never retried.
    pub fn generate(&self) -> Result<KeyPair> {
        let mut rng = rand_core::OsRng;
        match self {
            KeyGenerator::Rsa { bits } => {
                let private = RsaPrivateKey::new(&mut rng, *bits)
                    .map_err(|e| CertForgeError::KeyGeneration(e.to_string()))?;
                let public = RsaPublicKey::from(&private);
                Ok(KeyPair::Rsa {
                    private: Box::new(private),
                    public,
                })
            }
            KeyGenerator::Ecdsa { curve: EcCurve::P256 } => {
                let signing_key = P256SigningKey::random(&mut rng);
                let verifying_key = signing_key.verifying_key().to_owned();
                Ok(KeyPair::EcdsaP256 {
                    signing_key,
                    verifying_key,
                })
            }
            KeyGenerator::Ecdsa { curve: EcCurve::P384 } => {
                let signing_key = P384SigningKey::random(&mut rng);
                let verifying_key = signing_key.verifying_key().to_owned();
                Ok(KeyPair::EcdsaP384 {
                    signing_key,
                    verifying_key,
                })
            }
        }
    }

    /// Marshals a generated key pair to PEM bytes per `opts`.
    pub fn marshal(&self, signer: &KeyPair, opts: &MarshalOptions) -> Result<Vec<u8>> {
        let (tag, der) = match (signer, opts.format) {
            (KeyPair::Rsa { private, .. }, KeyFormat::Native) => {
                let doc = private
                    .to_pkcs1_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                (RSA_BLOCK_TYPE, doc.as_bytes().to_vec())
            }
            (KeyPair::Rsa { private, .. }, KeyFormat::Pkcs8) => {
                let doc = private
                    .to_pkcs8_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                (PKCS8_BLOCK_TYPE, doc.as_bytes().to_vec())
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, KeyFormat::Native) => {
                let doc = signing_key
                    .to_sec1_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                (EC_BLOCK_TYPE, doc.as_bytes().to_vec())
            }
            (KeyPair::EcdsaP256 { signing_key, .. }, KeyFormat::Pkcs8) => {
                let doc = signing_key
                    .to_pkcs8_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                (PKCS8_BLOCK_TYPE, doc.as_bytes().to_vec())
            }
            (KeyPair::EcdsaP384 { signing_key, .. }, KeyFormat::Native) => {
                let doc = signing_key
                    .to_sec1_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                (EC_BLOCK_TYPE, doc.as_bytes().to_vec())
            }
            (KeyPair::EcdsaP384 { signing_key, .. }, KeyFormat::Pkcs8) => {
                let doc = signing_key
                    .to_pkcs8_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                (PKCS8_BLOCK_TYPE, doc.as_bytes().to_vec())
            }
        };

        // Encrypted PKCS#8 uses its own envelope, so the passphrase only
        // applies to native-form blocks.
        let pem_str = match (&opts.password, opts.format) {
            (Some(password), KeyFormat::Native) => encrypt_block(tag, &der, password)?,
            _ => encode_block(tag, &der),
        };
        Ok(pem_str.into_bytes())
    }

    /// Returns the PEM block type of native-form keys from this generator.
    pub fn block_type(&self) -> &'static str {
        match self {
            KeyGenerator::Rsa { .. } => RSA_BLOCK_TYPE,
            KeyGenerator::Ecdsa { .. } => EC_BLOCK_TYPE,
        }
    }
}

/// Returns the PEM encoding of `der` under the given block type.
pub fn encode_block(tag: &str, der: &[u8]) -> String {
    let block = pem::Pem::new(tag, der);
    pem::encode_config(&block, pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF))
}

/// Encrypts `der` with the passphrase and encodes it as a PEM block with
/// RFC 1423 `Proc-Type`/`DEK-Info` headers, the way OpenSSL-style tools
/// protect native-form keys.
fn encrypt_block(tag: &str, der: &[u8], password: &[u8]) -> Result<String> {
    use aes::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};

    let iv: [u8; 16] = rand::random();
    let cipher_key = derive_cipher_key(password, &iv[..8]);
    let ciphertext = cbc::Encryptor::<aes::Aes256>::new(&cipher_key.into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(der);

    let mut block = pem::Pem::new(tag, ciphertext);
    block.headers_mut().add("Proc-Type", "4,ENCRYPTED")?;
    block
        .headers_mut()
        .add("DEK-Info", &format!("{DEK_INFO_CIPHER},{}", hex::encode_upper(iv)))?;
    Ok(pem::encode_config(
        &block,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    ))
}

/// Decrypts a PEM block produced by passphrase-protected marshaling,
/// returning the plaintext DER bytes.
pub fn decrypt_block(block: &pem::Pem, password: &[u8]) -> Result<Vec<u8>> {
    use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};

    let dek_info = block
        .headers()
        .get("DEK-Info")
        .ok_or_else(|| CertForgeError::InvalidInput("missing DEK-Info header".to_string()))?;
    let (cipher, iv_hex) = dek_info
        .split_once(',')
        .ok_or_else(|| CertForgeError::InvalidInput("malformed DEK-Info header".to_string()))?;
    if cipher != DEK_INFO_CIPHER {
        return Err(CertForgeError::InvalidInput(format!(
            "unsupported PEM cipher: {cipher}"
        )));
    }

    let iv: [u8; 16] = hex::decode(iv_hex)
        .map_err(|e| CertForgeError::Decoding(e.to_string()))?
        .try_into()
        .map_err(|_| CertForgeError::InvalidInput("bad DEK-Info IV length".to_string()))?;
    let cipher_key = derive_cipher_key(password, &iv[..8]);

    cbc::Decryptor::<aes::Aes256>::new(&cipher_key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(block.contents())
        .map_err(|_| CertForgeError::Decoding("bad decryption padding".to_string()))
}

// OpenSSL EVP_BytesToKey with MD5, one block of salt, two rounds. The salt
// is the first eight bytes of the IV per RFC 1423.
fn derive_cipher_key(password: &[u8], salt: &[u8]) -> [u8; 32] {
    use md5::{Digest, Md5};

    let d1 = Md5::new().chain_update(password).chain_update(salt).finalize();
    let d2 = Md5::new()
        .chain_update(d1)
        .chain_update(password)
        .chain_update(salt)
        .finalize();

    let mut cipher_key = [0u8; 32];
    cipher_key[..16].copy_from_slice(&d1);
    cipher_key[16..].copy_from_slice(&d2);
    cipher_key
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkcs8::DecodePrivateKey;
    use sec1::DecodeEcPrivateKey;

    #[test]
    fn rsa_bits_below_minimum_are_raised() {
        assert_eq!(KeyGenerator::rsa(1024), KeyGenerator::Rsa { bits: 2048 });
        assert_eq!(KeyGenerator::rsa(3072), KeyGenerator::Rsa { bits: 3072 });
    }

    #[test]
    fn default_generator_is_recommended_rsa() {
        assert_eq!(
            KeyGenerator::default(),
            KeyGenerator::Rsa {
                bits: RECOMMENDED_RSA_BITS
            }
        );
    }

    #[test]
    fn native_marshal_uses_algorithm_block_type() {
        let generator = KeyGenerator::ecdsa(EcCurve::P256);
        let signer = generator.generate().unwrap();
        let raw = generator.marshal(&signer, &MarshalOptions::default()).unwrap();
        let block = pem::parse(&raw).unwrap();
        assert_eq!(block.tag(), EC_BLOCK_TYPE);
        assert!(P256SigningKey::from_sec1_der(block.contents()).is_ok());
    }

    #[test]
    fn encrypted_block_round_trip() {
        let generator = KeyGenerator::ecdsa(EcCurve::P256);
        let signer = generator.generate().unwrap();
        let opts = MarshalOptions {
            password: Some(b"123456".to_vec()),
            format: KeyFormat::Native,
        };
        let raw = generator.marshal(&signer, &opts).unwrap();
        let block = pem::parse(&raw).unwrap();
        assert_eq!(block.tag(), EC_BLOCK_TYPE);
        assert_eq!(block.headers().get("Proc-Type"), Some("4,ENCRYPTED"));

        let der = decrypt_block(&block, b"123456").unwrap();
        assert!(P256SigningKey::from_sec1_der(&der).is_ok());
    }

    #[test]
    fn decrypt_with_wrong_password_fails() {
        let generator = KeyGenerator::ecdsa(EcCurve::P256);
        let signer = generator.generate().unwrap();
        let opts = MarshalOptions {
            password: Some(b"123456".to_vec()),
            format: KeyFormat::Native,
        };
        let raw = generator.marshal(&signer, &opts).unwrap();
        let block = pem::parse(&raw).unwrap();

        // A wrong key either fails the padding check or decodes to garbage.
        match decrypt_block(&block, b"654321") {
            Ok(der) => assert!(P256SigningKey::from_sec1_der(&der).is_err()),
            Err(_) => {}
        }
    }

    #[test]
    fn pkcs8_marshal_ignores_password() {
        let generator = KeyGenerator::ecdsa(EcCurve::P256);
        let signer = generator.generate().unwrap();
        let opts = MarshalOptions {
            password: Some(b"123456".to_vec()),
            format: KeyFormat::Pkcs8,
        };
        let raw = generator.marshal(&signer, &opts).unwrap();
        let block = pem::parse(&raw).unwrap();
        assert_eq!(block.tag(), PKCS8_BLOCK_TYPE);
        assert!(block.headers().get("DEK-Info").is_none());
        assert!(P256SigningKey::from_pkcs8_der(block.contents()).is_ok());
    }
}
