/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::sync::{Arc, LazyLock};

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

// One client context for the whole process; rustls client configs are
// immutable and safe to share across connections.
static TLS_CONNECTOR: LazyLock<TlsConnector> = LazyLock::new(|| {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    TlsConnector::from(Arc::new(config))
});

/// Wraps a TCP stream in TLS, using `hostname` for SNI and certificate
/// verification.
pub(crate) async fn wrap(
    stream: TcpStream,
    hostname: &str,
) -> crate::Result<tokio_rustls::client::TlsStream<TcpStream>> {
    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| crate::Error::InvalidTlsName)?;
    Ok(TLS_CONNECTOR.connect(server_name, stream).await?)
}
