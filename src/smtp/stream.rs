/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::smtp::tls;

/// The transport under one submission connection.
#[allow(clippy::large_enum_variant)]
pub enum SmtpStream {
    Basic(TcpStream),
    Tls(tokio_rustls::client::TlsStream<TcpStream>),
    None,
}

impl SmtpStream {
    pub(crate) async fn read(&mut self, buf: &mut [u8]) -> tokio::io::Result<usize> {
        match self {
            SmtpStream::Basic(stream) => stream.read(buf).await,
            SmtpStream::Tls(stream) => stream.read(buf).await,
            SmtpStream::None => Ok(0),
        }
    }

    pub(crate) async fn write_all(&mut self, bytes: &[u8]) -> tokio::io::Result<()> {
        match self {
            SmtpStream::Basic(stream) => stream.write_all(bytes).await,
            SmtpStream::Tls(stream) => stream.write_all(bytes).await,
            SmtpStream::None => Ok(()),
        }
    }

    pub(crate) async fn flush(&mut self) -> tokio::io::Result<()> {
        match self {
            SmtpStream::Basic(stream) => stream.flush().await,
            SmtpStream::Tls(stream) => stream.flush().await,
            SmtpStream::None => Ok(()),
        }
    }

    /// Installs TLS at the transport end of the pipeline, keeping an
    /// already-encrypted stream as is.
    pub(crate) async fn upgrade_to_tls(&mut self, hostname: &str) -> crate::Result<()> {
        if let SmtpStream::Basic(stream) = std::mem::take(self) {
            *self = SmtpStream::Tls(tls::wrap(stream, hostname).await?);
        }
        Ok(())
    }

    pub(crate) fn is_secure(&self) -> bool {
        matches!(self, SmtpStream::Tls(_))
    }
}

impl Default for SmtpStream {
    fn default() -> Self {
        SmtpStream::None
    }
}
