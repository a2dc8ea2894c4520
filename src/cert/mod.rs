//! Certificate descriptors and signable templates.
//!
//! A [`Certificate`] describes the certificate to issue: subject identity,
//! role, validity, usages and alternative names. It is assembled through
//! [`CertificateBuilder`] (or one of the role factories) and is immutable
//! once built; [`Certificate::to_template`] materializes it into the
//! signable [`Template`] the issuer works with.

pub mod extensions;

use std::net::IpAddr;

use der::asn1::OctetString;
use time::{Duration, OffsetDateTime};
use x509_cert::Version;
use x509_cert::certificate::TbsCertificateInner;
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence};
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CertForgeError, Result};
use crate::key::SignatureAlgorithm;
use extensions::{
    BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, FlagSet, KeyUsage, KeyUsages,
    SubjectAltName, ToAndFromX509Extension,
};

/// Common name used for CA certificates when the caller does not set one.
pub const DEFAULT_CA_COMMON_NAME: &str = "CERTFORGE GENERATOR CA";

/// Default validity of CA certificates: ten years.
pub const DEFAULT_CA_VALIDITY: Duration = Duration::hours(87660);

/// Default validity of non-CA certificates: one year.
pub const DEFAULT_CERT_VALIDITY: Duration = Duration::days(365);

/// The role a certificate plays, driving its default usages and validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateRole {
    CertificateAuthority,
    Server,
    Client,
    #[default]
    Unspecified,
}

/// Subject or issuer identity: a common name plus ordered organizations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    pub common_name: String,
    pub organizations: Vec<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509 RDN sequence.
    /// Empty attribute values are omitted entirely.
    pub fn to_x509_name(&self) -> Result<Name> {
        use core::str::FromStr;

        let mut parts = Vec::new();
        if !self.common_name.is_empty() {
            parts.push(format!("CN={}", escape_rdn_value(&self.common_name)));
        }
        // RFC 4514 strings list RDNs in reverse of their encoded order.
        parts.extend(
            self.organizations
                .iter()
                .filter(|org| !org.is_empty())
                .rev()
                .map(|org| format!("O={}", escape_rdn_value(org))),
        );
        if parts.is_empty() {
            return Ok(Name::default());
        }
        RdnSequence::from_str(&parts.join(","))
            .map_err(|e| CertForgeError::Encoding(e.to_string()))
    }

    /// Extracts the common name and organizations from an X.509 name.
    pub fn from_x509_name(name: &Name) -> Self {
        let mut out = DistinguishedName::default();
        for rdn in name.0.iter() {
            for attr in rdn.0.iter() {
                let oid = attr.oid.to_string();
                if let Ok(value) = attr.value.decode_as::<String>() {
                    if oid == "2.5.4.3" {
                        out.common_name = value;
                    } else if oid == "2.5.4.10" {
                        out.organizations.push(value);
                    }
                }
            }
        }
        out
    }
}

/// An immutable description of a certificate to issue.
#[derive(Debug, Clone)]
pub struct Certificate {
    common_name: String,
    role: CertificateRole,
    validity: Duration,
    key_usage: FlagSet<KeyUsages>,
    ext_key_usages: Vec<ExtendedKeyUsageOption>,
    organizations: Vec<String>,
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
}

impl Certificate {
    /// Returns a builder with no role-specific defaults.
    pub fn builder() -> CertificateBuilder {
        CertificateBuilder::new()
    }

    /// Returns a builder for a CA certificate.
    ///
    /// The common name defaults to [`DEFAULT_CA_COMMON_NAME`] and the role
    /// is fixed to [`CertificateRole::CertificateAuthority`].
    pub fn ca() -> CertificateBuilder {
        CertificateBuilder::new()
            .common_name(DEFAULT_CA_COMMON_NAME)
            .forced_role(CertificateRole::CertificateAuthority)
    }

    /// Returns a builder for a server certificate.
    ///
    /// The common name defaults to the local hostname, key usage to
    /// `DigitalSignature | KeyEncipherment`, and `ServerAuth` is appended
    /// to the extended usages after the caller's options are applied.
    pub fn server() -> CertificateBuilder {
        CertificateBuilder::new()
            .common_name(local_hostname())
            .key_usage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
            .forced_role(CertificateRole::Server)
            .role_usage(ExtendedKeyUsageOption::ServerAuth)
    }

    /// Returns a builder for a client certificate.
    ///
    /// Defaults mirror [`Certificate::server`] with `ClientAuth` appended.
    pub fn client() -> CertificateBuilder {
        CertificateBuilder::new()
            .common_name(local_hostname())
            .key_usage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
            .forced_role(CertificateRole::Client)
            .role_usage(ExtendedKeyUsageOption::ClientAuth)
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn role(&self) -> CertificateRole {
        self.role
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn key_usage(&self) -> FlagSet<KeyUsages> {
        self.key_usage
    }

    pub fn ext_key_usages(&self) -> &[ExtendedKeyUsageOption] {
        &self.ext_key_usages
    }

    /// Returns whether this descriptor is a CA certificate.
    pub fn is_ca(&self) -> bool {
        self.role == CertificateRole::CertificateAuthority
    }

    /// Returns whether this descriptor is a server certificate, either by
    /// role or by carrying the `ServerAuth` extended usage.
    pub fn is_server_cert(&self) -> bool {
        self.role == CertificateRole::Server
            || self
                .ext_key_usages
                .contains(&ExtendedKeyUsageOption::ServerAuth)
    }

    /// Returns whether this descriptor is a client certificate, either by
    /// role or by carrying the `ClientAuth` extended usage.
    pub fn is_client_cert(&self) -> bool {
        self.role == CertificateRole::Client
            || self
                .ext_key_usages
                .contains(&ExtendedKeyUsageOption::ClientAuth)
    }

    /// Materializes the signable template: fresh random serial, validity
    /// window anchored at now, and deduplicated alternative names.
    pub fn to_template(&self) -> Result<Template> {
        let not_before = OffsetDateTime::now_utc();
        Ok(Template {
            serial: rand::random_range(0..(1u64 << 63)),
            subject: DistinguishedName {
                common_name: self.common_name.clone(),
                organizations: self.organizations.clone(),
            },
            not_before,
            not_after: not_before + self.validity,
            is_ca: self.is_ca(),
            key_usage: self.key_usage,
            ext_key_usages: self.ext_key_usages.clone(),
            dns_names: deduplicate_names(&self.dns_names),
            ip_addresses: deduplicate_ips(&self.ip_addresses),
        })
    }
}

/// Builds a [`Certificate`] through chained setters.
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    common_name: String,
    role: CertificateRole,
    forced_role: Option<CertificateRole>,
    role_usage: Option<ExtendedKeyUsageOption>,
    validity: Option<Duration>,
    key_usage: FlagSet<KeyUsages>,
    ext_key_usages: Vec<ExtendedKeyUsageOption>,
    organizations: Vec<String>,
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
}

impl CertificateBuilder {
    fn new() -> Self {
        Self {
            common_name: String::new(),
            role: CertificateRole::Unspecified,
            forced_role: None,
            role_usage: None,
            validity: None,
            key_usage: FlagSet::empty(),
            ext_key_usages: Vec::new(),
            organizations: Vec::new(),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
        }
    }

    /// Sets the subject common name.
    pub fn common_name(mut self, cn: impl Into<String>) -> Self {
        self.common_name = cn.into();
        self
    }

    /// Sets the validity duration. Left unset, it resolves at build time to
    /// ten years for CA certificates and one year otherwise.
    pub fn validity(mut self, validity: Duration) -> Self {
        self.validity = Some(validity);
        self
    }

    /// Sets the DNS names of the certificate.
    pub fn dns_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dns_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the IP addresses of the certificate.
    pub fn ip_addresses<I>(mut self, ips: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        self.ip_addresses = ips.into_iter().collect();
        self
    }

    /// Sets the subject organizations, in order.
    pub fn organizations<I, S>(mut self, orgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.organizations = orgs.into_iter().map(Into::into).collect();
        self
    }

    /// ORs key-usage flags into the descriptor. Repeated calls accumulate
    /// rather than overwrite.
    pub fn key_usage(mut self, usage: impl Into<FlagSet<KeyUsages>>) -> Self {
        self.key_usage |= usage.into();
        self
    }

    /// Sets the extended key usages, replacing any previously set.
    pub fn ext_key_usages<I>(mut self, usages: I) -> Self
    where
        I: IntoIterator<Item = ExtendedKeyUsageOption>,
    {
        self.ext_key_usages = usages.into_iter().collect();
        self
    }

    /// Sets the certificate role. Role factories override this at build
    /// time with their own role.
    pub fn role(mut self, role: CertificateRole) -> Self {
        self.role = role;
        self
    }

    fn forced_role(mut self, role: CertificateRole) -> Self {
        self.forced_role = Some(role);
        self
    }

    fn role_usage(mut self, usage: ExtendedKeyUsageOption) -> Self {
        self.role_usage = Some(usage);
        self
    }

    /// Finalizes the descriptor, resolving role defaults exactly once.
    pub fn build(self) -> Certificate {
        let role = self.forced_role.unwrap_or(self.role);

        // Role-default extended usage is appended after user options so
        // user-supplied usages are preserved, not replaced.
        let mut ext_key_usages = self.ext_key_usages;
        if let Some(usage) = self.role_usage {
            if !ext_key_usages.contains(&usage) {
                ext_key_usages.push(usage);
            }
        }

        let validity = self.validity.unwrap_or(match role {
            CertificateRole::CertificateAuthority => DEFAULT_CA_VALIDITY,
            _ => DEFAULT_CERT_VALIDITY,
        });

        Certificate {
            common_name: self.common_name,
            role,
            validity,
            key_usage: self.key_usage,
            ext_key_usages,
            organizations: self.organizations,
            dns_names: self.dns_names,
            ip_addresses: self.ip_addresses,
        }
    }
}

/// The signable portion of a certificate, materialized from a descriptor.
#[derive(Debug, Clone)]
pub struct Template {
    pub serial: u64,
    pub subject: DistinguishedName,
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
    pub is_ca: bool,
    pub key_usage: FlagSet<KeyUsages>,
    pub ext_key_usages: Vec<ExtendedKeyUsageOption>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl Template {
    /// Assembles the TBSCertificate to sign: the template fields plus the
    /// issuer name, the subject's public key and the signature algorithm
    /// of the signing key.
    pub fn to_tbs_certificate(
        &self,
        issuer: Name,
        subject_public_key: SubjectPublicKeyInfoOwned,
        algorithm: SignatureAlgorithm,
    ) -> Result<TbsCertificateInner> {
        let serial_number = SerialNumber::new(&serial_bytes(self.serial))
            .map_err(|e| CertForgeError::Encoding(e.to_string()))?;

        let not_before = to_validity_time(self.not_before)?;
        let not_after = to_validity_time(self.not_after)?;

        let mut exts = vec![encode_extension(
            BasicConstraints {
                is_ca: self.is_ca,
                max_path_length: None,
            },
            true,
        )?];

        if !self.key_usage.is_empty() {
            exts.push(encode_extension(KeyUsage(self.key_usage), true)?);
        }

        if !self.ext_key_usages.is_empty() {
            exts.push(encode_extension(
                ExtendedKeyUsage {
                    usage: self.ext_key_usages.clone(),
                },
                false,
            )?);
        }

        if !self.dns_names.is_empty() || !self.ip_addresses.is_empty() {
            exts.push(encode_extension(
                SubjectAltName {
                    dns_names: self.dns_names.clone(),
                    ip_addresses: self.ip_addresses.clone(),
                },
                false,
            )?);
        }

        Ok(TbsCertificateInner {
            version: Version::V3,
            serial_number,
            signature: algorithm.into(),
            issuer,
            validity: x509_cert::time::Validity {
                not_before,
                not_after,
            },
            subject: self.subject.to_x509_name()?,
            subject_public_key_info: subject_public_key,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(exts),
        })
    }
}

// RFC 5280 4.1.2.5: dates through 2049 use UTCTime, 2050 and later use
// GeneralizedTime.
fn to_validity_time(at: OffsetDateTime) -> Result<x509_cert::time::Time> {
    if at.year() >= 2050 {
        der::asn1::GeneralizedTime::from_system_time(at.into())
            .map(x509_cert::time::Time::GeneralTime)
            .map_err(|e| CertForgeError::Encoding(e.to_string()))
    } else {
        der::asn1::UtcTime::from_system_time(at.into())
            .map(x509_cert::time::Time::UtcTime)
            .map_err(|e| CertForgeError::Encoding(e.to_string()))
    }
}

fn encode_extension<E: ToAndFromX509Extension>(ext: E, critical: bool) -> Result<Extension> {
    let value = ext.to_x509_extension_value()?;
    Ok(Extension {
        extn_id: E::OID,
        critical,
        extn_value: OctetString::new(value).map_err(|e| CertForgeError::Encoding(e.to_string()))?,
    })
}

// Minimal positive DER integer content for a 63-bit serial.
fn serial_bytes(serial: u64) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    let mut out = bytes[first..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

// RFC 4514 section 2.4: backslash-escape the string's special characters,
// plus a leading space or `#` and a trailing space.
fn escape_rdn_value(value: &str) -> String {
    let last = value.chars().count().saturating_sub(1);
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        let needs_escape = match c {
            '"' | '+' | ',' | ';' | '<' | '>' | '\\' | '=' => true,
            ' ' => i == 0 || i == last,
            '#' => i == 0,
            _ => false,
        };
        if needs_escape {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn local_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Removes duplicates and empty entries, keeping first-occurrence order.
fn deduplicate_names(names: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    names
        .iter()
        .filter(|name| !name.is_empty() && seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// Removes duplicate addresses, keeping first-occurrence order.
fn deduplicate_ips(ips: &[IpAddr]) -> Vec<IpAddr> {
    let mut seen = std::collections::HashSet::new();
    ips.iter().filter(|ip| seen.insert(**ip)).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ca_factory_defaults() {
        let cert = Certificate::ca().build();
        assert!(cert.is_ca());
        assert_eq!(cert.common_name(), DEFAULT_CA_COMMON_NAME);
        assert_eq!(cert.validity(), DEFAULT_CA_VALIDITY);
    }

    #[test]
    fn server_factory_defaults() {
        let cert = Certificate::server().build();
        assert!(cert.is_server_cert());
        assert!(!cert.is_ca());
        assert_eq!(cert.validity(), DEFAULT_CERT_VALIDITY);
        assert_eq!(
            cert.key_usage(),
            KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment
        );
        assert_eq!(
            cert.ext_key_usages(),
            &[ExtendedKeyUsageOption::ServerAuth]
        );
    }

    #[test]
    fn validity_window_matches_duration() {
        let cert = Certificate::ca().build();
        let template = cert.to_template().unwrap();
        assert_eq!(template.not_after - template.not_before, DEFAULT_CA_VALIDITY);

        let cert = Certificate::server().build();
        let template = cert.to_template().unwrap();
        assert_eq!(template.not_after - template.not_before, DEFAULT_CERT_VALIDITY);
    }

    #[test]
    fn explicit_validity_wins_over_role_default() {
        let cert = Certificate::ca().validity(Duration::days(30)).build();
        assert_eq!(cert.validity(), Duration::days(30));
    }

    #[test]
    fn role_factory_appends_usage_after_user_options() {
        let cert = Certificate::server()
            .ext_key_usages([ExtendedKeyUsageOption::ClientAuth])
            .build();
        assert_eq!(
            cert.ext_key_usages(),
            &[
                ExtendedKeyUsageOption::ClientAuth,
                ExtendedKeyUsageOption::ServerAuth
            ]
        );
    }

    #[test]
    fn key_usage_accumulates_across_calls() {
        let split = Certificate::builder()
            .key_usage(KeyUsages::DigitalSignature)
            .key_usage(KeyUsages::KeyEncipherment)
            .build();
        let combined = Certificate::builder()
            .key_usage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
            .build();
        assert_eq!(split.key_usage(), combined.key_usage());
    }

    #[test]
    fn predicates_follow_extended_usage_without_role() {
        let cert = Certificate::builder()
            .ext_key_usages([ExtendedKeyUsageOption::ServerAuth])
            .build();
        assert!(cert.is_server_cert());
        assert!(!cert.is_client_cert());
        assert!(!cert.is_ca());

        let cert = Certificate::client()
            .ext_key_usages([ExtendedKeyUsageOption::ServerAuth])
            .build();
        assert!(cert.is_server_cert());
        assert!(cert.is_client_cert());
    }

    #[test]
    fn template_deduplicates_dns_names_and_ips() {
        let cert = Certificate::server()
            .dns_names(["a", "a", "", "b"])
            .ip_addresses([
                "127.0.0.1".parse().unwrap(),
                "127.0.0.1".parse().unwrap(),
                "10.0.0.1".parse().unwrap(),
            ])
            .build();
        let template = cert.to_template().unwrap();
        assert_eq!(template.dns_names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            template.ip_addresses,
            vec![
                "127.0.0.1".parse::<IpAddr>().unwrap(),
                "10.0.0.1".parse::<IpAddr>().unwrap()
            ]
        );
    }

    #[test]
    fn distinguished_name_round_trip() {
        let dn = DistinguishedName {
            common_name: "server.local".to_string(),
            organizations: vec!["First".to_string(), "Second".to_string()],
        };
        let name = dn.to_x509_name().unwrap();
        assert_eq!(DistinguishedName::from_x509_name(&name), dn);
    }

    #[test]
    fn distinguished_name_escapes_special_characters() {
        let dn = DistinguishedName {
            common_name: "Example, Inc. + Co".to_string(),
            organizations: vec!["Dev; Ops <east>".to_string(), " padded ".to_string()],
        };
        let name = dn.to_x509_name().unwrap();
        assert_eq!(DistinguishedName::from_x509_name(&name), dn);
    }

    #[test]
    fn rdn_escaping_covers_leading_and_trailing_forms() {
        assert_eq!(escape_rdn_value("a,b=c"), "a\\,b\\=c");
        assert_eq!(escape_rdn_value("#tag"), "\\#tag");
        assert_eq!(escape_rdn_value(" padded "), "\\ padded\\ ");
        assert_eq!(escape_rdn_value("back\\slash"), "back\\\\slash");
        assert_eq!(escape_rdn_value("plain"), "plain");
    }

    #[test]
    fn serial_bytes_are_canonical() {
        assert_eq!(serial_bytes(0), vec![0]);
        assert_eq!(serial_bytes(1), vec![1]);
        assert_eq!(serial_bytes(0x80), vec![0, 0x80]);
        assert_eq!(serial_bytes(0x1234), vec![0x12, 0x34]);
    }
}
