//! rustls client configuration for FTPS and HTTPS.
//!
//! Server certificates are not checked against a CA store. They are either
//! pinned by SHA-256 fingerprint or accepted unconditionally, matching how
//! the connect parameters describe TLS identity.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::ConnectParams;
use crate::errors::{FsError, FsResult};

/// Parse `aa:bb:...` or plain hex into a 32-byte SHA-256 digest.
pub fn parse_certificate_pin(fingerprint: &str) -> FsResult<Vec<u8>> {
    let token = fingerprint.split_whitespace().last().unwrap_or("");
    let token = token
        .strip_prefix("SHA256:")
        .or_else(|| token.strip_prefix("sha256:"))
        .unwrap_or(token);
    let hex_digits: String = token.chars().filter(|c| *c != ':').collect();
    let digest = hex::decode(&hex_digits)
        .map_err(|e| FsError::Config(format!("invalid certificate fingerprint: {e}")))?;
    if digest.len() != 32 {
        return Err(FsError::Config(format!(
            "certificate fingerprint must be a SHA-256 digest, got {} bytes",
            digest.len()
        )));
    }
    Ok(digest)
}

#[derive(Debug)]
struct PinnedCertVerifier {
    /// `None` accepts any certificate.
    pin: Option<Vec<u8>>,
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let Some(pin) = &self.pin else {
            return Ok(ServerCertVerified::assertion());
        };
        let digest = Sha256::digest(end_entity.as_ref());
        if digest.as_slice() == pin.as_slice() {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::General(format!(
                "certificate fingerprint mismatch: server presented {}",
                hex::encode(digest)
            )))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Certificate chain and key from one PEM file.
fn load_client_identity(
    path: &Path,
) -> FsResult<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let pem_err = |e: rustls::pki_types::pem::Error| {
        FsError::Config(format!(
            "cannot read client certificate '{}': {e}",
            path.display()
        ))
    };
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(pem_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(pem_err)?;
    if certs.is_empty() {
        return Err(FsError::Config(format!(
            "no certificate found in '{}'",
            path.display()
        )));
    }
    let key = PrivateKeyDer::from_pem_file(path).map_err(pem_err)?;
    Ok((certs, key))
}

/// Build the client config for `params`.
pub fn client_config(params: &ConnectParams) -> FsResult<Arc<ClientConfig>> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let pin = if params.accept_any() {
        warn!(host = params.host(), "accepting any TLS certificate");
        None
    } else {
        Some(parse_certificate_pin(params.fingerprint())?)
    };
    let verifier = Arc::new(PinnedCertVerifier {
        pin,
        provider: provider.clone(),
    });

    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| FsError::Config(format!("TLS setup failed: {e}")))?
        .dangerous()
        .with_custom_certificate_verifier(verifier);

    let config = match params.private_key_path() {
        Some(path) => {
            let (certs, key) = load_client_identity(Path::new(path))?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| FsError::Config(format!("invalid client certificate: {e}")))?
        }
        None => builder.with_no_client_auth(),
    };
    Ok(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    const PIN: &str = "AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89:AB:CD:EF:01:23:45:67:89";

    #[test]
    fn pin_accepts_colon_and_plain_hex() {
        let with_colons = parse_certificate_pin(PIN).unwrap();
        let plain = parse_certificate_pin(&PIN.replace(':', "").to_lowercase()).unwrap();
        assert_eq!(with_colons, plain);
        assert_eq!(with_colons.len(), 32);
    }

    #[test]
    fn pin_rejects_short_digest() {
        let err = parse_certificate_pin("ab:cd").unwrap_err();
        assert!(matches!(err, FsError::Config(_)));
    }

    #[test]
    fn pin_rejects_non_hex() {
        assert!(parse_certificate_pin("not-a-fingerprint").is_err());
    }

    #[test]
    fn config_with_accept_any() {
        let mut params = ConnectParams::new(Protocol::Ftp);
        params.set_host("ftp.example.com");
        params.set_accept_any(true);
        assert!(client_config(&params).is_ok());
    }

    #[test]
    fn config_with_pin() {
        let mut params = ConnectParams::new(Protocol::WebDav);
        params.set_fingerprint(PIN);
        assert!(client_config(&params).is_ok());
    }

    #[test]
    fn missing_client_certificate_is_config_error() {
        let mut params = ConnectParams::new(Protocol::Ftp);
        params.set_accept_any(true);
        params.set_private_key_path(Some("/nonexistent/client.pem".into()));
        assert!(matches!(client_config(&params), Err(FsError::Config(_))));
    }
}
