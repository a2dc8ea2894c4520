#![allow(dead_code)]

use std::time::SystemTime;

use certforge::cert::extensions::{BasicConstraints, ToAndFromX509Extension};
use certforge::cert::{Certificate, DistinguishedName};
use certforge::issuer::{IssueOptions, Issuer};
use certforge::key::{CERTIFICATE_BLOCK_TYPE, EcCurve, KeyGenerator};
use der::Decode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

/// Parses every CERTIFICATE block in the raw PEM bytes.
pub fn parse_certs(raw: &[u8]) -> Vec<CertificateInner> {
    pem::parse_many(raw)
        .unwrap()
        .iter()
        .filter(|block| block.tag() == CERTIFICATE_BLOCK_TYPE)
        .map(|block| CertificateInner::from_der(block.contents()).unwrap())
        .collect()
}

pub fn parse_cert(raw: &[u8]) -> CertificateInner {
    let certs = parse_certs(raw);
    assert_eq!(certs.len(), 1, "expected a single certificate block");
    certs.into_iter().next().unwrap()
}

pub fn common_name(name: &Name) -> String {
    DistinguishedName::from_x509_name(name).common_name
}

pub fn is_ca(cert: &CertificateInner) -> bool {
    cert.tbs_certificate
        .extensions
        .as_ref()
        .unwrap()
        .iter()
        .find(|ext| ext.extn_id == BasicConstraints::OID)
        .map(|ext| {
            BasicConstraints::from_x509_extension_value(ext.extn_value.as_bytes())
                .unwrap()
                .is_ca
        })
        .unwrap_or(false)
}

pub fn to_system_time(time: &x509_cert::time::Time) -> SystemTime {
    match time {
        x509_cert::time::Time::UtcTime(ut) => ut.to_system_time(),
        x509_cert::time::Time::GeneralTime(gt) => gt.to_system_time(),
    }
}

/// Validity length of a parsed certificate in whole seconds.
pub fn validity_secs(cert: &CertificateInner) -> u64 {
    let validity = &cert.tbs_certificate.validity;
    to_system_time(&validity.not_after)
        .duration_since(to_system_time(&validity.not_before))
        .unwrap()
        .as_secs()
}

/// Returns an ECDSA P-256 issuer that has issued and adopted a default CA.
pub fn issuer_with_adopted_ca() -> Issuer {
    let mut issuer = Issuer::with_key_generator(KeyGenerator::ecdsa(EcCurve::P256));
    let ca = Certificate::ca().build();
    let opts = IssueOptions {
        adopt_as_authority: true,
        ..Default::default()
    };
    issuer.issue_with_options(&ca, opts).unwrap();
    issuer
}
