/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

/// Receives one line-formatted string per SMTP frame exchanged on a
/// connection. Implementations must be safe for concurrent invocation;
/// strings are only built when a logger is installed.
pub trait TransmissionLogger: Send + Sync {
    fn log_message(&self, message: &str);
}

impl<F> TransmissionLogger for F
where
    F: Fn(&str) + Send + Sync,
{
    fn log_message(&self, message: &str) {
        self(message)
    }
}

/// Prefix for frames received from the server.
pub(crate) const INBOUND_PREFIX: &str = "☁️ ";

/// Prefix for bytes written to the server.
pub(crate) const OUTBOUND_PREFIX: &str = "💻 ";
