/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Outbound command encoding.

use chrono::{DateTime, FixedOffset};

use crate::config::FeatureFlags;
use crate::email::Email;
use crate::mime;

/// One outbound SMTP command.
#[derive(Debug, Clone)]
pub enum Request {
    /// `EHLO`/`HELO` greeting carrying the configured server name.
    Hello { server_name: String, use_ehello: bool },
    StartTls,
    BeginAuth,
    AuthUser(String),
    AuthPassword(String),
    MailFrom(String),
    Recipient(String),
    Data,
    /// The message payload, closed by the `<CRLF>.<CRLF>` end-of-data marker.
    TransferData {
        date: DateTime<FixedOffset>,
        email: Email,
    },
    Quit,
}

impl Request {
    /// Renders the command to wire bytes, terminated by CRLF.
    pub fn encode(&self, flags: FeatureFlags) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Request::Hello {
                server_name,
                use_ehello,
            } => {
                out.extend_from_slice(if *use_ehello { b"EHLO " } else { b"HELO " });
                out.extend_from_slice(server_name.as_bytes());
            }
            Request::StartTls => out.extend_from_slice(b"STARTTLS"),
            Request::BeginAuth => out.extend_from_slice(b"AUTH LOGIN"),
            Request::AuthUser(username) => {
                out.extend_from_slice(mime::encode_base64(username.as_bytes(), flags).as_bytes());
            }
            Request::AuthPassword(password) => {
                out.extend_from_slice(mime::encode_base64(password.as_bytes(), flags).as_bytes());
            }
            Request::MailFrom(address) => {
                out.extend_from_slice(b"MAIL FROM:<");
                out.extend_from_slice(address.as_bytes());
                out.push(b'>');
            }
            Request::Recipient(address) => {
                out.extend_from_slice(b"RCPT TO:<");
                out.extend_from_slice(address.as_bytes());
                out.push(b'>');
            }
            Request::Data => out.extend_from_slice(b"DATA"),
            Request::TransferData { date, email } => {
                mime::write_payload(&mut out, email, date, flags);
                out.extend_from_slice(b"\r\n.");
            }
            Request::Quit => out.extend_from_slice(b"QUIT"),
        }
        out.extend_from_slice(b"\r\n");
        out
    }
}

#[cfg(test)]
mod test {
    use super::Request;
    use crate::config::FeatureFlags;
    use crate::email::{Body, Contact, Email};
    use chrono::{FixedOffset, TimeZone};

    fn encode(request: Request) -> String {
        String::from_utf8(request.encode(FeatureFlags::empty())).unwrap()
    }

    #[test]
    fn hello_commands() {
        assert_eq!(
            encode(Request::Hello {
                server_name: "mail.server.tld".to_string(),
                use_ehello: true,
            }),
            "EHLO mail.server.tld\r\n"
        );
        assert_eq!(
            encode(Request::Hello {
                server_name: "mail.server.tld".to_string(),
                use_ehello: false,
            }),
            "HELO mail.server.tld\r\n"
        );
    }

    #[test]
    fn auth_login_lines() {
        assert_eq!(encode(Request::BeginAuth), "AUTH LOGIN\r\n");
        assert_eq!(
            encode(Request::AuthUser("my.user@example.com".to_string())),
            "bXkudXNlckBleGFtcGxlLmNvbQ==\r\n"
        );
        assert_eq!(
            encode(Request::AuthPassword(
                "jB)7ie$sJ)Q8mXN@^ZR8RybVP!FDvwXG".to_string()
            )),
            "akIpN2llJHNKKVE4bVhOQF5aUjhSeWJWUCFGRHZ3WEc=\r\n"
        );
    }

    #[test]
    fn envelope_commands() {
        assert_eq!(
            encode(Request::MailFrom("s@e.com".to_string())),
            "MAIL FROM:<s@e.com>\r\n"
        );
        assert_eq!(
            encode(Request::Recipient("r@e.com".to_string())),
            "RCPT TO:<r@e.com>\r\n"
        );
        assert_eq!(encode(Request::Data), "DATA\r\n");
        assert_eq!(encode(Request::StartTls), "STARTTLS\r\n");
        assert_eq!(encode(Request::Quit), "QUIT\r\n");
    }

    #[test]
    fn transfer_data_end_marker() {
        let email = Email::new(
            Contact::with_name("Sender Name", "some.sender@example.com").unwrap(),
            vec![Contact::with_name("Receiver Name", "some.receiver@example.com").unwrap()],
            "Test Message",
            Body::Plain(
                "The contents of this email\nare very simple and just for testing...".to_string(),
            ),
        )
        .unwrap();
        let date = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .timestamp_opt(1744193604, 0)
            .unwrap();

        let payload = encode(Request::TransferData { date, email });
        assert!(payload.starts_with(concat!(
            "From: \"Sender Name\" <some.sender@example.com>\r\n",
            "To: \"Receiver Name\" <some.receiver@example.com>\r\n",
            "Date: Wed, 09 Apr 2025 12:13:24 +0200\r\n",
            "Message-ID: <1744193604.0@example.com>\r\n",
            "Subject: Test Message\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: text/plain; charset=\"UTF-8\"\r\n",
        )));
        assert!(payload.ends_with("are very simple and just for testing...\r\n\r\n.\r\n"));
    }

    #[test]
    fn credentials_wrap_with_line_length_flags() {
        let long_user = "a-rather-long-user-name-that-exceeds-the-limit@example.com".to_string();
        let wrapped = String::from_utf8(
            Request::AuthUser(long_user).encode(FeatureFlags::MAX_BASE64_LINE_LENGTH_64),
        )
        .unwrap();
        let first_line = wrapped.split("\r\n").next().unwrap();
        assert_eq!(first_line.len(), 64);
    }
}
