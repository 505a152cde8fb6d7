//! PKCS#12 client certificates for mutual TLS.

use base64::{Engine, engine::general_purpose::STANDARD};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Invalid PKCS#12 container: {0}")]
    Decode(String),
    #[error("PKCS#12 integrity check failed, wrong password?")]
    InvalidPassword,
    #[error("PKCS#12 container holds no private key")]
    MissingKey,
    #[error("PKCS#12 container holds no certificate")]
    MissingCertificate,
    #[error("Invalid X.509 certificate: {0}")]
    X509(String),
    #[error("Could not build TLS identity: {0}")]
    Identity(#[from] reqwest::Error),
}

/// Raw PKCS#12 material used to authenticate against the identity provider.
#[derive(Clone)]
pub struct UserCertificate {
    pub pkcs12: Vec<u8>,
    pub password: String,
}

impl UserCertificate {
    pub fn new(pkcs12: impl Into<Vec<u8>>, password: impl Into<String>) -> Self {
        Self {
            pkcs12: pkcs12.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for UserCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCertificate")
            .field("pkcs12_len", &self.pkcs12.len())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Private key and certificate chain extracted from a PKCS#12 container.
#[derive(Clone)]
pub struct ClientIdentity {
    /// PKCS#8 DER private key.
    key_der: Vec<u8>,
    /// DER certificates, leaf first.
    chain_der: Vec<Vec<u8>>,
}

impl ClientIdentity {
    pub fn leaf_der(&self) -> &[u8] {
        &self.chain_der[0]
    }

    pub fn chain_der(&self) -> &[Vec<u8>] {
        &self.chain_der
    }

    /// PEM bundle with the private key followed by the chain, leaf first.
    pub fn to_pem(&self) -> Vec<u8> {
        let mut pem = pem_block("PRIVATE KEY", &self.key_der);
        for cert in &self.chain_der {
            pem.push_str(&pem_block("CERTIFICATE", cert));
        }
        pem.into_bytes()
    }

    pub fn to_reqwest_identity(&self) -> Result<reqwest::Identity, CertificateError> {
        Ok(reqwest::Identity::from_pem(&self.to_pem())?)
    }
}

impl std::fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("chain_len", &self.chain_der.len())
            .finish_non_exhaustive()
    }
}

/// Decode a PKCS#12 container into a TLS client identity.
///
/// The leaf is the first certificate without the CA flag; when every
/// certificate is a CA the first one is used.
pub fn parse_certificate(pkcs12: &[u8], password: &str) -> Result<ClientIdentity, CertificateError> {
    let pfx = p12::PFX::parse(pkcs12).map_err(|e| CertificateError::Decode(format!("{e:?}")))?;
    if !pfx.verify_mac(password) {
        return Err(CertificateError::InvalidPassword);
    }

    let key_der = pfx
        .key_bags(password)
        .map_err(|e| CertificateError::Decode(format!("{e:?}")))?
        .into_iter()
        .next()
        .ok_or(CertificateError::MissingKey)?;

    let mut certs = pfx
        .cert_x509_bags(password)
        .map_err(|e| CertificateError::Decode(format!("{e:?}")))?;
    if certs.is_empty() {
        return Err(CertificateError::MissingCertificate);
    }

    let mut leaf_index = None;
    for (index, der) in certs.iter().enumerate() {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| CertificateError::X509(e.to_string()))?;
        if leaf_index.is_none() && !cert.tbs_certificate.is_ca() {
            leaf_index = Some(index);
        }
    }
    let leaf = certs.remove(leaf_index.unwrap_or(0));
    certs.insert(0, leaf);

    debug!(chain_len = certs.len(), "Parsed PKCS#12 client certificate");
    Ok(ClientIdentity {
        key_der,
        chain_der: certs,
    })
}

fn pem_block(label: &str, der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut block = format!("-----BEGIN {label}-----\n");
    for line in encoded.as_bytes().chunks(64) {
        // base64 output is ASCII
        block.push_str(std::str::from_utf8(line).unwrap_or_default());
        block.push('\n');
    }
    block.push_str(&format!("-----END {label}-----\n"));
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_block_wraps_lines() {
        let block = pem_block("CERTIFICATE", &[0u8; 100]);
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(lines.first(), Some(&"-----BEGIN CERTIFICATE-----"));
        assert_eq!(lines.last(), Some(&"-----END CERTIFICATE-----"));
        assert_eq!(lines[1].len(), 64);
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_garbage_container_rejected() {
        assert!(matches!(
            parse_certificate(b"not a pkcs12 blob", "secret"),
            Err(CertificateError::Decode(_))
        ));
    }

    #[test]
    fn test_user_certificate_debug_redacts_password() {
        let cert = UserCertificate::new(vec![1, 2, 3], "hunter2");
        assert!(!format!("{cert:?}").contains("hunter2"));
    }
}
