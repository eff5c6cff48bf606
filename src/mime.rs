/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Serialization of an [`Email`] into the MIME 1.0 `DATA` payload.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::config::FeatureFlags;
use crate::email::{Attachment, Body, Email};

/// Locale-invariant `Date:` header format (RFC 2822 style).
pub(crate) const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Encodes to base64, wrapped with CRLF at the width selected by the
/// feature flags.
pub(crate) fn encode_base64(data: &[u8], flags: FeatureFlags) -> String {
    let encoded = BASE64.encode(data);
    match flags.base64_line_length() {
        Some(width) if encoded.len() > width => {
            let mut wrapped = String::with_capacity(encoded.len() + (encoded.len() / width) * 2);
            for (pos, chunk) in encoded.as_bytes().chunks(width).enumerate() {
                if pos > 0 {
                    wrapped.push_str("\r\n");
                }
                wrapped.push_str(&String::from_utf8_lossy(chunk));
            }
            wrapped
        }
        _ => encoded,
    }
}

/// A fresh multipart boundary: the 32 hex characters of a new UUID.
fn fresh_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

fn header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn message_id(email: &Email, date: &DateTime<FixedOffset>) -> String {
    let timestamp =
        date.timestamp() as f64 + f64::from(date.timestamp_subsec_micros()) / 1_000_000.0;
    // The id tail is the sender address from its first '@' to the end; an
    // address without '@' leaves the tail empty.
    let address = email.sender.email_address.as_str();
    let domain = address.find('@').map_or("", |at| &address[at..]);
    format!("<{:?}{}>", timestamp, domain)
}

fn join_mime(contacts: &[crate::email::Contact]) -> String {
    contacts
        .iter()
        .map(|contact| contact.to_mime())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes the complete `DATA` payload: headers, a blank line, and the body
/// block. The SMTP end-of-data marker is appended by the request encoder,
/// not here.
pub(crate) fn write_payload(
    out: &mut Vec<u8>,
    email: &Email,
    date: &DateTime<FixedOffset>,
    flags: FeatureFlags,
) {
    header(out, "From", &email.sender.to_mime());
    header(out, "To", &join_mime(&email.recipients));
    if let Some(reply_to) = &email.reply_to {
        header(out, "Reply-to", &reply_to.to_mime());
    }
    if !email.cc.is_empty() {
        header(out, "Cc", &join_mime(&email.cc));
    }
    // bcc recipients appear in the envelope only.
    header(out, "Date", &date.format(DATE_FORMAT).to_string());
    header(out, "Message-ID", &message_id(email, date));
    header(out, "Subject", &email.subject);
    header(out, "MIME-Version", "1.0");
    write_body_block(out, email, flags);
}

fn write_body_block(out: &mut Vec<u8>, email: &Email, flags: FeatureFlags) {
    // Stable partition: submission order is preserved within each kind.
    let regular = email
        .attachments
        .iter()
        .filter(|attachment| !attachment.is_inline())
        .collect::<Vec<_>>();
    let inline = email
        .attachments
        .iter()
        .filter(|attachment| attachment.is_inline())
        .collect::<Vec<_>>();

    if !regular.is_empty() {
        let boundary = fresh_boundary();
        header(
            out,
            "Content-Type",
            &format!("multipart/mixed; boundary={}", boundary),
        );
        open_part(out, &boundary);
        write_related_or_body(out, email, &inline, flags);
        for attachment in &regular {
            open_part(out, &boundary);
            write_attachment_part(out, attachment, flags);
        }
        close_parts(out, &boundary);
    } else {
        write_related_or_body(out, email, &inline, flags);
    }
}

fn write_related_or_body(
    out: &mut Vec<u8>,
    email: &Email,
    inline: &[&Attachment],
    flags: FeatureFlags,
) {
    if !inline.is_empty() {
        let boundary = fresh_boundary();
        header(
            out,
            "Content-Type",
            &format!("multipart/related; boundary={}", boundary),
        );
        open_part(out, &boundary);
        write_body_part(out, &email.body, flags);
        for attachment in inline {
            open_part(out, &boundary);
            write_attachment_part(out, attachment, flags);
        }
        close_parts(out, &boundary);
    } else {
        write_body_part(out, &email.body, flags);
    }
}

fn write_body_part(out: &mut Vec<u8>, body: &Body, flags: FeatureFlags) {
    match body {
        Body::Plain(text) => write_text_part(out, "text/plain", text, flags),
        Body::Html(text) => write_text_part(out, "text/html", text, flags),
        Body::Universal { plain, html } => {
            let boundary = fresh_boundary();
            header(
                out,
                "Content-Type",
                &format!("multipart/alternative; boundary={}", boundary),
            );
            open_part(out, &boundary);
            write_text_part(out, "text/plain", plain, flags);
            open_part(out, &boundary);
            write_text_part(out, "text/html", html, flags);
            close_parts(out, &boundary);
        }
    }
}

fn write_text_part(out: &mut Vec<u8>, content_type: &str, text: &str, flags: FeatureFlags) {
    header(
        out,
        "Content-Type",
        &format!("{}; charset=\"UTF-8\"", content_type),
    );
    if flags.contains(FeatureFlags::BASE64_ENCODE_ALL_MESSAGES) {
        header(out, "Content-Transfer-Encoding", "base64");
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(encode_base64(text.as_bytes(), flags).as_bytes());
    } else {
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(text.as_bytes());
    }
    out.extend_from_slice(b"\r\n");
}

fn write_attachment_part(out: &mut Vec<u8>, attachment: &Attachment, flags: FeatureFlags) {
    let disposition = if attachment.is_inline() {
        "inline"
    } else {
        "attachment"
    };
    header(out, "Content-Type", &attachment.content_type);
    header(out, "Content-Transfer-Encoding", "base64");
    header(
        out,
        "Content-Disposition",
        &format!("{}; filename=\"{}\"", disposition, attachment.name),
    );
    if let Some(content_id) = attachment.content_id() {
        header(out, "Content-ID", &format!("<{}>", content_id));
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(encode_base64(&attachment.data, flags).as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn open_part(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"\r\n--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn close_parts(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"\r\n--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
}

#[cfg(test)]
mod test {
    use super::{encode_base64, write_payload};
    use crate::config::FeatureFlags;
    use crate::email::{Attachment, Body, Contact, Email};
    use chrono::{DateTime, FixedOffset, TimeZone};

    fn fixture_date() -> DateTime<FixedOffset> {
        // 2025-04-09 12:13:24 +02:00
        FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .timestamp_opt(1744193604, 0)
            .unwrap()
    }

    fn fixture_email(body: Body) -> Email {
        Email::new(
            Contact::with_name("Sender Name", "some.sender@example.com").unwrap(),
            vec![Contact::with_name("Receiver Name", "some.receiver@example.com").unwrap()],
            "Test Message",
            body,
        )
        .unwrap()
    }

    fn render(email: &Email, flags: FeatureFlags) -> String {
        let mut out = Vec::new();
        write_payload(&mut out, email, &fixture_date(), flags);
        String::from_utf8(out).unwrap()
    }

    /// Pulls `boundary=<b>` out of a `Content-Type` header line.
    fn boundary_after(payload: &str, content_type: &str) -> String {
        let start = payload.find(content_type).unwrap() + content_type.len();
        payload[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect()
    }

    #[test]
    fn plain_text_payload() {
        let email = fixture_email(Body::Plain(
            "The contents of this email\nare very simple and just for testing...".to_string(),
        ));
        assert_eq!(
            render(&email, FeatureFlags::empty()),
            concat!(
                "From: \"Sender Name\" <some.sender@example.com>\r\n",
                "To: \"Receiver Name\" <some.receiver@example.com>\r\n",
                "Date: Wed, 09 Apr 2025 12:13:24 +0200\r\n",
                "Message-ID: <1744193604.0@example.com>\r\n",
                "Subject: Test Message\r\n",
                "MIME-Version: 1.0\r\n",
                "Content-Type: text/plain; charset=\"UTF-8\"\r\n",
                "\r\n",
                "The contents of this email\nare very simple and just for testing...\r\n",
            )
        );
    }

    #[test]
    fn universal_body_payload() {
        let email = fixture_email(Body::Universal {
            plain: "Plain rendition".to_string(),
            html: "<p>HTML rendition</p>".to_string(),
        });
        let payload = render(&email, FeatureFlags::empty());
        let boundary = boundary_after(&payload, "multipart/alternative; boundary=");
        assert_eq!(boundary.len(), 32);
        let expected_tail = format!(
            concat!(
                "MIME-Version: 1.0\r\n",
                "Content-Type: multipart/alternative; boundary={b}\r\n",
                "\r\n--{b}\r\n",
                "Content-Type: text/plain; charset=\"UTF-8\"\r\n",
                "\r\n",
                "Plain rendition\r\n",
                "\r\n--{b}\r\n",
                "Content-Type: text/html; charset=\"UTF-8\"\r\n",
                "\r\n",
                "<p>HTML rendition</p>\r\n",
                "\r\n--{b}--\r\n",
            ),
            b = boundary
        );
        assert!(payload.ends_with(&expected_tail));
    }

    #[test]
    fn reply_to_and_cc_headers() {
        let email = fixture_email(Body::Plain("text".to_string()))
            .reply_to(Contact::new("replies@example.com").unwrap())
            .cc(Contact::new("first.cc@example.com").unwrap())
            .cc(Contact::with_name("Second", "second.cc@example.com").unwrap())
            .bcc(Contact::new("hidden@example.com").unwrap());

        let payload = render(&email, FeatureFlags::empty());
        assert!(payload.contains("Reply-to: replies@example.com\r\n"));
        assert!(payload
            .contains("Cc: first.cc@example.com, \"Second\" <second.cc@example.com>\r\n"));
        assert!(!payload.contains("hidden@example.com"));
    }

    #[test]
    fn message_id_without_domain() {
        let email = Email::new(
            Contact::new("local-only").unwrap(),
            vec![Contact::new("r@e.com").unwrap()],
            "Subject",
            Body::Plain("text".to_string()),
        )
        .unwrap();
        assert!(render(&email, FeatureFlags::empty())
            .contains("Message-ID: <1744193604.0>\r\n"));
    }

    #[test]
    fn base64_encoded_body() {
        let email = fixture_email(Body::Plain("Hello, world!".to_string()));
        let payload = render(&email, FeatureFlags::BASE64_ENCODE_ALL_MESSAGES);
        assert!(payload.ends_with(concat!(
            "Content-Type: text/plain; charset=\"UTF-8\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "SGVsbG8sIHdvcmxkIQ==\r\n",
        )));
    }

    #[test]
    fn mixed_and_related_nesting() {
        let email = fixture_email(Body::Html("<p>Hi</p>".to_string()))
            .attach(Attachment::inline("logo.png", "image/png", vec![1, 2, 3], "logo"))
            .attach(Attachment::new("a.txt", "text/plain", b"first".as_ref()))
            .attach(Attachment::new("b.txt", "text/plain", b"second".as_ref()));

        let payload = render(&email, FeatureFlags::empty());
        let mixed = boundary_after(&payload, "multipart/mixed; boundary=");
        let related = boundary_after(&payload, "multipart/related; boundary=");
        assert_ne!(mixed, related);

        // The related block holds the body and the inline part, inside the
        // first child of the mixed block.
        let mixed_open = payload.find(&format!("\r\n--{}\r\n", mixed)).unwrap();
        let related_header = payload.find("multipart/related").unwrap();
        assert!(related_header > mixed_open);
        assert!(payload.contains("Content-Disposition: inline; filename=\"logo.png\"\r\n"));
        assert!(payload.contains("Content-ID: <logo>\r\n"));

        // Regular attachments keep submission order.
        let first = payload.find("filename=\"a.txt\"").unwrap();
        let second = payload.find("filename=\"b.txt\"").unwrap();
        assert!(first < second);

        // Both multiparts are terminated.
        assert!(payload.contains(&format!("\r\n--{}--\r\n", related)));
        assert!(payload.ends_with(&format!("\r\n--{}--\r\n", mixed)));
    }

    #[test]
    fn base64_line_wrapping() {
        let data = [0u8; 90];
        let wrapped64 = encode_base64(&data, FeatureFlags::MAX_BASE64_LINE_LENGTH_64);
        for line in wrapped64.split("\r\n") {
            assert!(line.len() <= 64);
        }
        let wrapped76 = encode_base64(&data, FeatureFlags::MAX_BASE64_LINE_LENGTH_76);
        for line in wrapped76.split("\r\n") {
            assert!(line.len() <= 76);
        }
        assert!(!encode_base64(&data, FeatureFlags::empty()).contains("\r\n"));

        // Wrapping never alters the encoded content.
        assert_eq!(wrapped64.replace("\r\n", ""), encode_base64(&data, FeatureFlags::empty()));
    }
}
