//! Certificate issuance against a held or freshly minted authority.
//!
//! The [`Issuer`] owns a default key generator and an authority slot (CA
//! certificate plus private key). Each [`Issuer::issue`] call generates a
//! key pair, materializes the descriptor's template, signs it (self-signed
//! for CA descriptors, chained to the held authority otherwise) and
//! returns the PEM-encoded certificate and key bytes.

use der::Encode;
use der::asn1::BitString;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::{Certificate, Template};
use crate::error::{CertForgeError, Result};
use crate::key::{CERTIFICATE_BLOCK_TYPE, KeyGenerator, KeyPair, MarshalOptions, encode_block};
use crate::writer::Writer;

/// Per-call options for [`Issuer::issue_with_options`].
#[derive(Debug, Clone, Default)]
pub struct IssueOptions {
    /// Overrides the issuer's configured key generator for this call.
    pub key_generator: Option<KeyGenerator>,
    /// Controls how the generated private key is marshaled.
    pub key_opts: MarshalOptions,
    /// Adopts the issued certificate as the issuer's current authority.
    /// Ignored unless the descriptor has the CA role.
    pub adopt_as_authority: bool,
    /// Appends the held authority's PEM block after the issued certificate,
    /// unless the held authority is the certificate just issued.
    pub append_authority: bool,
}

/// Issues certificates, holding the current CA state between calls.
///
/// The authority slot starts unset and can only move to set, either through
/// [`Issuer::set_authority`] or by issuing a CA certificate with
/// [`IssueOptions::adopt_as_authority`]; it is overwritten thereafter, never
/// cleared. Authority mutation requires `&mut self`, so concurrent use must
/// be serialized by the caller.
pub struct Issuer {
    key_gen: KeyGenerator,
    authority: Option<(CertificateInner, KeyPair)>,
}

impl Default for Issuer {
    fn default() -> Self {
        Self::new()
    }
}

impl Issuer {
    /// Returns an issuer with the default RSA-4096 key generator and no
    /// held authority.
    pub fn new() -> Self {
        Self {
            key_gen: KeyGenerator::default(),
            authority: None,
        }
    }

    /// Returns an issuer using the given key generator by default.
    pub fn with_key_generator(key_gen: KeyGenerator) -> Self {
        Self {
            key_gen,
            authority: None,
        }
    }

    /// Returns the held CA certificate and private key, if any.
    pub fn authority(&self) -> Option<(&CertificateInner, &KeyPair)> {
        self.authority.as_ref().map(|(cert, key)| (cert, key))
    }

    /// Replaces the held CA pair. The pair is not validated for
    /// consistency; that is the caller's responsibility.
    pub fn set_authority(&mut self, cert: CertificateInner, key: KeyPair) {
        self.authority = Some((cert, key));
    }

    /// Issues a certificate and key for the descriptor with default options.
    pub fn issue(&mut self, cert: &Certificate) -> Result<(Vec<u8>, Vec<u8>)> {
        self.issue_with_options(cert, IssueOptions::default())
    }

    /// Issues a certificate and key for the descriptor.
    ///
    /// Returns the PEM-encoded certificate bytes (possibly multiple blocks
    /// when appending the authority) and private key bytes, or an error and
    /// neither.
    pub fn issue_with_options(
        &mut self,
        cert: &Certificate,
        opts: IssueOptions,
    ) -> Result<(Vec<u8>, Vec<u8>)> {
        let key_gen = opts.key_generator.unwrap_or(self.key_gen);
        let signer = key_gen.generate()?;
        let key_pem = key_gen.marshal(&signer, &opts.key_opts)?;

        let template = cert.to_template()?;
        let spki = signer.to_spki()?;

        let issued = if cert.is_ca() {
            // CA descriptors self-sign with the key generated for them.
            let issuer_name = template.subject.to_x509_name()?;
            sign_template(&template, issuer_name, spki, &signer)?
        } else {
            let (ca_cert, ca_key) = self
                .authority
                .as_ref()
                .ok_or(CertForgeError::MissingAuthority)?;
            let issuer_name = ca_cert.tbs_certificate.subject.clone();
            sign_template(&template, issuer_name, spki, ca_key)?
        };

        let issued_der = issued
            .to_der()
            .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
        let mut cert_pem = encode_block(CERTIFICATE_BLOCK_TYPE, &issued_der).into_bytes();

        if cert.is_ca() && opts.adopt_as_authority {
            self.authority = Some((issued, signer));
        }

        if opts.append_authority {
            if let Some((held, _)) = &self.authority {
                let held_der = held
                    .to_der()
                    .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
                if held_der != issued_der {
                    cert_pem
                        .extend_from_slice(encode_block(CERTIFICATE_BLOCK_TYPE, &held_der).as_bytes());
                }
            }
        }

        Ok((cert_pem, key_pem))
    }

    /// Issues a certificate and key, then hands both to the writer.
    /// Failures from either step are propagated as-is.
    pub fn issue_and_write<W: Writer>(&mut self, writer: &mut W, cert: &Certificate) -> Result<()> {
        let (cert_pem, key_pem) = self.issue(cert)?;
        writer.write(&cert_pem, &key_pem)
    }
}

fn sign_template(
    template: &Template,
    issuer: Name,
    subject_public_key: SubjectPublicKeyInfoOwned,
    signing_key: &KeyPair,
) -> Result<CertificateInner> {
    let algorithm = signing_key.signature_algorithm();
    let tbs = template.to_tbs_certificate(issuer, subject_public_key, algorithm.clone())?;
    let tbs_der = tbs
        .to_der()
        .map_err(|e| CertForgeError::Encoding(e.to_string()))?;
    let signature = signing_key.sign_data(&tbs_der)?;

    Ok(CertificateInner {
        tbs_certificate: tbs,
        signature_algorithm: algorithm.into(),
        signature: BitString::from_bytes(&signature)
            .map_err(|e| CertForgeError::Encoding(e.to_string()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::DistinguishedName;
    use crate::key::EcCurve;

    fn ecdsa_issuer() -> Issuer {
        Issuer::with_key_generator(KeyGenerator::ecdsa(EcCurve::P256))
    }

    #[test]
    fn non_ca_without_authority_is_rejected() {
        let mut issuer = ecdsa_issuer();
        let cert = Certificate::server().build();
        match issuer.issue(&cert) {
            Err(CertForgeError::MissingAuthority) => {}
            other => panic!("expected MissingAuthority, got {other:?}"),
        }
    }

    #[test]
    fn authority_slot_set_by_adoption() {
        let mut issuer = ecdsa_issuer();
        assert!(issuer.authority().is_none());

        let ca = Certificate::ca().build();
        let opts = IssueOptions {
            adopt_as_authority: true,
            ..Default::default()
        };
        issuer.issue_with_options(&ca, opts).unwrap();

        let (held, _) = issuer.authority().unwrap();
        let subject = DistinguishedName::from_x509_name(&held.tbs_certificate.subject);
        assert_eq!(subject.common_name, crate::cert::DEFAULT_CA_COMMON_NAME);
    }

    #[test]
    fn adoption_is_ignored_for_non_ca_descriptors() {
        let mut issuer = ecdsa_issuer();
        let ca = Certificate::ca().build();
        issuer
            .issue_with_options(
                &ca,
                IssueOptions {
                    adopt_as_authority: true,
                    ..Default::default()
                },
            )
            .unwrap();

        let before = issuer.authority().unwrap().0.clone();
        let server = Certificate::server().build();
        issuer
            .issue_with_options(
                &server,
                IssueOptions {
                    adopt_as_authority: true,
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(issuer.authority().unwrap().0, &before);
    }

    #[test]
    fn ca_without_adoption_leaves_slot_unset() {
        let mut issuer = ecdsa_issuer();
        let ca = Certificate::ca().build();
        issuer.issue(&ca).unwrap();
        assert!(issuer.authority().is_none());
    }
}
