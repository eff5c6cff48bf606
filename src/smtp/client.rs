/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The per-connection pipeline: transport, optional TLS, framing, decoding
//! and the conversation state machine, with a logger tapping both
//! directions.

use std::sync::Arc;

use tokio::net::{lookup_host, TcpSocket};
use tokio::time;

use crate::config::{Configuration, Encryption, FeatureFlags, StartTlsMode};
use crate::email::Email;
use crate::logger::{TransmissionLogger, INBOUND_PREFIX, OUTBOUND_PREFIX};
use crate::smtp::machine::{Conversation, Step};
use crate::smtp::reply::{decode, Decoded, LineFramer, Reply};
use crate::smtp::request::Request;
use crate::smtp::stream::SmtpStream;

pub struct SmtpConnection {
    stream: SmtpStream,
    framer: LineFramer,
    machine: Conversation,
    flags: FeatureFlags,
    hostname: String,
    starttls_mode: Option<StartTlsMode>,
    awaiting_starttls: bool,
    logger: Option<Arc<dyn TransmissionLogger>>,
}

/// Delivers one message over one fresh connection: connect, run the
/// conversation to completion, close.
pub async fn submit(
    config: &Configuration,
    email: Email,
    logger: Option<Arc<dyn TransmissionLogger>>,
) -> crate::Result<()> {
    SmtpConnection::connect(config, email, logger)
        .await?
        .run()
        .await
}

impl SmtpConnection {
    /// Opens the transport, wrapping it in TLS up front when the server
    /// uses implicit TLS. The configured timeout covers connect and
    /// handshake.
    pub async fn connect(
        config: &Configuration,
        email: Email,
        logger: Option<Arc<dyn TransmissionLogger>>,
    ) -> crate::Result<Self> {
        let hostname = config.server.hostname.clone();
        let stream = time::timeout(config.connection_timeout, async {
            let address = lookup_host((hostname.as_str(), config.server.port))
                .await?
                .next()
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "hostname did not resolve to any address",
                    )
                })?;
            let socket = if address.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            socket.set_reuseaddr(true)?;
            let mut stream = SmtpStream::Basic(socket.connect(address).await?);
            if matches!(config.server.encryption, Encryption::Ssl) {
                stream.upgrade_to_tls(&hostname).await?;
            }
            Ok::<_, crate::Error>(stream)
        })
        .await
        .map_err(|_| crate::Error::Timeout)??;

        tracing::debug!(server = %hostname, port = config.server.port, "connected");

        Ok(SmtpConnection {
            stream,
            framer: LineFramer::new(),
            machine: Conversation::new(config, email),
            flags: config.feature_flags,
            starttls_mode: match config.server.encryption {
                Encryption::StartTls(mode) => Some(mode),
                _ => None,
            },
            awaiting_starttls: false,
            hostname,
            logger,
        })
    }

    /// Runs the conversation until the server confirms `QUIT` or drops the
    /// connection after one.
    pub async fn run(&mut self) -> crate::Result<()> {
        loop {
            match self.next_reply().await? {
                None => return Ok(()),
                Some(_reply) => match self.machine.advance() {
                    Step::Send(request) => self.send(&request).await?,
                    Step::Close => return Ok(()),
                },
            }
        }
    }

    async fn send(&mut self, request: &Request) -> crate::Result<()> {
        let bytes = request.encode(self.flags);
        if let Some(logger) = &self.logger {
            logger.log_message(&format!(
                "{}{}",
                OUTBOUND_PREFIX,
                String::from_utf8_lossy(&bytes).trim_end()
            ));
        }
        tracing::trace!(server = %self.hostname, bytes = bytes.len(), "send");
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        if matches!(request, Request::StartTls) {
            self.awaiting_starttls = true;
        }
        Ok(())
    }

    /// The next terminal success reply. Returns `None` when the server
    /// closed the connection and the conversation had already reached a
    /// terminal state, in which case the submission counts as delivered.
    async fn next_reply(&mut self) -> crate::Result<Option<Reply>> {
        loop {
            let frame = match self.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    return if self.machine.is_closing() {
                        Ok(None)
                    } else {
                        Err(crate::Error::Io(std::io::ErrorKind::UnexpectedEof.into()))
                    };
                }
                Err(crate::Error::UncleanShutdown | crate::Error::LeftOverBytes)
                    if self.machine.is_closing() =>
                {
                    return Ok(None);
                }
                Err(err) => return Err(err),
            };

            let line = String::from_utf8_lossy(&frame).into_owned();
            if let Some(logger) = &self.logger {
                logger.log_message(&format!("{}{}", INBOUND_PREFIX, line));
            }
            tracing::trace!(server = %self.hostname, reply = %line, "recv");

            match decode(&line)? {
                Decoded::Intermediate => continue,
                Decoded::Success(reply) => {
                    if self.awaiting_starttls {
                        self.awaiting_starttls = false;
                        self.stream.upgrade_to_tls(&self.hostname).await?;
                        tracing::debug!(server = %self.hostname, "connection upgraded to TLS");
                    }
                    return Ok(Some(reply));
                }
                Decoded::Failure(line) => {
                    // An opportunistic upgrade continues in plaintext when
                    // the server refuses STARTTLS.
                    if self.awaiting_starttls
                        && self.starttls_mode == Some(StartTlsMode::IfAvailable)
                    {
                        self.awaiting_starttls = false;
                        return Ok(Some(Reply::new(201, "STARTTLS is not supported")));
                    }
                    return Err(crate::Error::Rejected(line));
                }
            }
        }
    }

    async fn next_frame(&mut self) -> crate::Result<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.framer.next_frame() {
                return Ok(Some(frame));
            }
            let mut buf = vec![0u8; 1024];
            let read = match self.stream.read(&mut buf).await {
                Ok(read) => read,
                // rustls reports a missing close_notify as an unexpected EOF.
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Err(crate::Error::UncleanShutdown);
                }
                Err(err) => return Err(err.into()),
            };
            if read == 0 {
                self.framer.close()?;
                return Ok(None);
            }
            self.framer.extend(&buf[..read]);
        }
    }

    /// True when TLS is installed on the transport.
    pub fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }
}
