/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::ops::BitOr;
use std::time::Duration;

/// Transport security negotiated for a submission connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// Plaintext SMTP, default port 25.
    Plain,
    /// Implicit TLS established before any SMTP bytes, default port 465.
    Ssl,
    /// Plaintext handshake upgraded via `STARTTLS`, default port 587.
    StartTls(StartTlsMode),
}

/// Behavior when the server rejects the `STARTTLS` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartTlsMode {
    /// Fail the submission if the upgrade is refused.
    Always,
    /// Continue in plaintext if the upgrade is refused.
    IfAvailable,
}

impl Encryption {
    /// Returns the standard port for this transport security.
    pub fn default_port(&self) -> u16 {
        match self {
            Encryption::Plain => 25,
            Encryption::Ssl => 465,
            Encryption::StartTls(_) => 587,
        }
    }
}

/// The submission server to connect to.
#[derive(Debug, Clone)]
pub struct Server {
    pub hostname: String,
    pub port: u16,
    pub encryption: Encryption,
}

impl Server {
    /// Creates a server entry on the encryption's default port.
    pub fn new(hostname: impl Into<String>, encryption: Encryption) -> Self {
        Server {
            hostname: hostname.into(),
            port: encryption.default_port(),
            encryption,
        }
    }

    /// Overrides the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

/// `AUTH LOGIN` credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Protocol toggles, modeled as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags(u32);

impl FeatureFlags {
    /// Greet with `EHLO` instead of `HELO`.
    pub const USE_ESMTP: FeatureFlags = FeatureFlags(1);
    /// Base64-encode every message text body.
    pub const BASE64_ENCODE_ALL_MESSAGES: FeatureFlags = FeatureFlags(1 << 1);
    /// Wrap base64 output at 64 characters.
    pub const MAX_BASE64_LINE_LENGTH_64: FeatureFlags = FeatureFlags(1 << 2);
    /// Wrap base64 output at 76 characters.
    pub const MAX_BASE64_LINE_LENGTH_76: FeatureFlags = FeatureFlags(1 << 3);

    pub const fn empty() -> Self {
        FeatureFlags(0)
    }

    pub const fn contains(self, flags: FeatureFlags) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// Base64 line wrap width, with 64 taking precedence when both wrap
    /// flags are set.
    pub(crate) fn base64_line_length(self) -> Option<usize> {
        if self.contains(Self::MAX_BASE64_LINE_LENGTH_64) {
            Some(64)
        } else if self.contains(Self::MAX_BASE64_LINE_LENGTH_76) {
            Some(76)
        } else {
            None
        }
    }
}

impl BitOr for FeatureFlags {
    type Output = FeatureFlags;

    fn bitor(self, rhs: FeatureFlags) -> FeatureFlags {
        FeatureFlags(self.0 | rhs.0)
    }
}

/// Immutable submission settings, captured per delivery.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub server: Server,
    pub connection_timeout: Duration,
    pub credentials: Option<Credentials>,
    pub feature_flags: FeatureFlags,
}

impl Configuration {
    pub fn new(server: Server) -> Self {
        Configuration {
            server,
            connection_timeout: Duration::from_secs(60),
            credentials: None,
            feature_flags: FeatureFlags::empty(),
        }
    }

    /// Sets the connect timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Authentication credentials.
    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Protocol toggles.
    pub fn feature_flags(mut self, flags: FeatureFlags) -> Self {
        self.feature_flags = flags;
        self
    }
}
