/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! # mail-submit
//!
//! _mail-submit_ is a Rust library to compose and submit e-mail messages to an
//! SMTP/ESMTP submission server. It includes the following features:
//!
//! - Generates **MIME 1.0** messages with plain, HTML and combined bodies,
//!   regular and inline attachments (_RFC 2045 - 2046_).
//! - Simple Mail Transfer Protocol (**SMTP**; _RFC 5321_) submission with
//!   `HELO` and `EHLO` greetings.
//! - Implicit **TLS** as well as the SMTP Service Extension for Secure SMTP
//!   over TLS (_RFC 3207_), with an opportunistic mode that falls back to
//!   plaintext when the server does not offer `STARTTLS`.
//! - `AUTH LOGIN` authentication (base64 username and password exchange).
//! - A `Mailer` that queues submissions in FIFO order and delivers each one
//!   over a fresh connection, bounded by a configurable concurrency cap.
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! ```ignore
//!     let configuration = Configuration::new(Server::new(
//!         "mail.example.com",
//!         Encryption::StartTls(StartTlsMode::Always),
//!     ))
//!     .credentials("john", "p4ssw0rd");
//!
//!     let mailer = Mailer::new(configuration);
//!
//!     let email = Email::new(
//!         Contact::with_name("John Doe", "john@example.com")?,
//!         vec![Contact::new("jane@example.com")?],
//!         "Hi!",
//!         Body::Plain("Hello, world!".into()),
//!     )?;
//!
//!     mailer.send(email).await?;
//! ```
//!
//! Please note that this library does not parse inbound messages and performs
//! no delivery retries; a failed submission surfaces exactly once through its
//! completion handle.

#![forbid(unsafe_code)]

pub mod config;
pub mod email;
pub mod logger;
pub mod mailer;
pub mod mime;
pub mod smtp;

use std::fmt::Display;

pub use config::{Configuration, Credentials, Encryption, FeatureFlags, Server, StartTlsMode};
pub use email::{Attachment, AttachmentKind, Body, Contact, Email};
pub use logger::TransmissionLogger;
pub use mailer::{Delivery, Mailer};

#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// TLS error
    Tls(rustls::Error),

    /// Invalid TLS name provided.
    InvalidTlsName,

    /// Connection timeout.
    Timeout,

    /// Server reply does not match `DDD<SP|->text` with a numeric code.
    MalformedMessage,

    /// The server returned a terminal non-2xx/3xx reply; carries the full
    /// server line verbatim.
    Rejected(String),

    /// Unread bytes remained in the receive buffer when the connection closed.
    LeftOverBytes,

    /// The peer closed the TLS session without a close_notify.
    UncleanShutdown,

    /// An e-mail was constructed without envelope recipients.
    MissingRecipients,

    /// A contact was constructed with an empty address.
    MissingAddress,

    /// The connection cap must be at least one.
    InvalidConnectionCap,

    /// The submission was dropped before a delivery outcome was produced.
    Abandoned,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::InvalidTlsName => write!(f, "Invalid TLS name provided"),
            Error::Timeout => write!(f, "Connection timeout"),
            Error::MalformedMessage => write!(f, "Malformed SMTP reply"),
            Error::Rejected(line) => write!(f, "Server error: {}", line),
            Error::LeftOverBytes => {
                write!(f, "Connection closed with unread bytes in the buffer")
            }
            Error::UncleanShutdown => {
                write!(f, "TLS session closed without close_notify")
            }
            Error::MissingRecipients => write!(f, "Missing message recipients"),
            Error::MissingAddress => write!(f, "Missing e-mail address"),
            Error::InvalidConnectionCap => {
                write!(f, "The maximum connection count must be at least one")
            }
            Error::Abandoned => write!(f, "Submission abandoned before completion"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Tls(err)
    }
}
