/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, ServerName, UnixTime};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

#[derive(Debug, Error)]
pub enum TlsConfigError {
    #[error("failed to read ca cert file {0}: {1:?}")]
    CaCertFileRead(PathBuf, io::Error),
    #[error("invalid ca cert: {0}")]
    InvalidCaCert(rustls::Error),
    #[error("no usable ca cert loaded")]
    NoCaCertLoaded,
    #[error("invalid tls server name {0}")]
    InvalidServerName(String),
}

/// Options for the client side TLS layer. `build()` turns this into a
/// reusable [`TlsClientConfig`].
#[derive(Debug, Default, Clone)]
pub struct TlsClientConfigBuilder {
    ca_base_path: Option<PathBuf>,
    ca_cert_file: Option<PathBuf>,
    disable_verify: bool,
    server_name: Option<String>,
}

impl TlsClientConfigBuilder {
    /// Directory the ca cert file path is resolved against.
    pub fn set_ca_base_path(&mut self, path: impl Into<PathBuf>) {
        self.ca_base_path = Some(path.into());
    }

    /// Trust exactly the CA certs found in this PEM file instead of the
    /// platform root store.
    pub fn set_ca_cert_file(&mut self, path: impl Into<PathBuf>) {
        self.ca_cert_file = Some(path.into());
    }

    /// Accept any server certificate. Peer signatures are still checked.
    pub fn set_disable_cert_verify(&mut self) {
        self.disable_verify = true;
    }

    /// SNI and certificate verification name to use instead of the
    /// request uri host.
    pub fn set_server_name(&mut self, name: impl Into<String>) {
        self.server_name = Some(name.into());
    }

    fn ca_cert_path(&self) -> Option<PathBuf> {
        let file = self.ca_cert_file.as_ref()?;
        match &self.ca_base_path {
            Some(base) => Some(base.join(file)),
            None => Some(file.clone()),
        }
    }

    fn load_ca_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
        let data = std::fs::read(path)
            .map_err(|e| TlsConfigError::CaCertFileRead(path.to_path_buf(), e))?;
        let mut reader = io::BufReader::new(data.as_slice());
        rustls_pemfile::certs(&mut reader)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TlsConfigError::CaCertFileRead(path.to_path_buf(), e))
    }

    pub fn build(&self) -> Result<TlsClientConfig, TlsConfigError> {
        let config = if self.disable_verify {
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoCertificateVerification::new(
                    rustls::crypto::ring::default_provider(),
                )))
                .with_no_client_auth()
        } else {
            let mut roots = RootCertStore::empty();
            if let Some(path) = self.ca_cert_path() {
                for cert in Self::load_ca_certs(&path)? {
                    roots.add(cert).map_err(TlsConfigError::InvalidCaCert)?;
                }
            } else {
                let loaded = rustls_native_certs::load_native_certs();
                for e in &loaded.errors {
                    debug!("native ca cert load error: {e}");
                }
                for cert in loaded.certs {
                    let _ = roots.add(cert);
                }
            }
            if roots.is_empty() {
                return Err(TlsConfigError::NoCaCertLoaded);
            }
            ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth()
        };

        let server_name = match &self.server_name {
            Some(name) => Some(
                ServerName::try_from(name.clone())
                    .map_err(|_| TlsConfigError::InvalidServerName(name.clone()))?,
            ),
            None => None,
        };

        Ok(TlsClientConfig {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }
}

#[derive(Clone)]
pub struct TlsClientConfig {
    connector: TlsConnector,
    server_name: Option<ServerName<'static>>,
}

impl TlsClientConfig {
    pub(crate) async fn handshake(
        &self,
        stream: TcpStream,
        host: &str,
    ) -> io::Result<TlsStream<TcpStream>> {
        let name = match &self.server_name {
            Some(n) => n.clone(),
            None => ServerName::try_from(host.to_string())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?,
        };
        self.connector.connect(name, stream).await
    }
}

#[derive(Debug)]
struct NoCertificateVerification(CryptoProvider);

impl NoCertificateVerification {
    fn new(provider: CryptoProvider) -> Self {
        NoCertificateVerification(provider)
    }
}

impl ServerCertVerifier for NoCertificateVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_no_verify() {
        let mut b = TlsClientConfigBuilder::default();
        b.set_disable_cert_verify();
        b.set_server_name("example.com");
        assert!(b.build().is_ok());
    }

    #[test]
    fn missing_ca_file() {
        let mut b = TlsClientConfigBuilder::default();
        b.set_ca_base_path("/nonexistent");
        b.set_ca_cert_file("ca.pem");
        assert!(matches!(
            b.build(),
            Err(TlsConfigError::CaCertFileRead(_, _))
        ));
    }

    #[test]
    fn invalid_server_name() {
        let mut b = TlsClientConfigBuilder::default();
        b.set_disable_cert_verify();
        b.set_server_name("bad name with spaces");
        assert!(matches!(
            b.build(),
            Err(TlsConfigError::InvalidServerName(_))
        ));
    }
}
