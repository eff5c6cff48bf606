/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Inbound framing and reply decoding.

/// A terminal server reply that allows the conversation to continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Reply {
            code,
            message: message.into(),
        }
    }
}

/// The decoder's verdict on one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Terminal 2xx/3xx line.
    Success(Reply),
    /// Terminal line of any other class; carries the full line verbatim.
    Failure(String),
    /// Continuation line of a multi-line reply, dropped without advancing
    /// the conversation.
    Intermediate,
}

/// Decodes one frame as `DDDS` followed by the text tail, where `DDD` is a
/// three-digit code and `S` is a space (terminal) or hyphen (continuation).
pub fn decode(frame: &str) -> crate::Result<Decoded> {
    let bytes = frame.as_bytes();
    if bytes.len() < 4 {
        return Err(crate::Error::MalformedMessage);
    }
    let mut code = 0u16;
    for byte in &bytes[..3] {
        if !byte.is_ascii_digit() {
            return Err(crate::Error::MalformedMessage);
        }
        code = code * 10 + u16::from(byte - b'0');
    }
    match bytes[3] {
        b'-' => Ok(Decoded::Intermediate),
        b' ' if (200..400).contains(&code) => {
            Ok(Decoded::Success(Reply::new(code, &frame[4..])))
        }
        b' ' => Ok(Decoded::Failure(frame.to_string())),
        _ => Err(crate::Error::MalformedMessage),
    }
}

/// Splits the inbound byte stream into frames, one per received LF. A CR
/// immediately preceding the LF is stripped together with it. Scanning
/// resumes where the previous unsuccessful scan stopped.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
    scanned: usize,
    leftover_raised: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// The next complete frame, without its terminator. Empty frames are
    /// valid and forwarded.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        match self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let newline = self.scanned + offset;
                let end = if newline > 0 && self.buf[newline - 1] == b'\r' {
                    newline - 1
                } else {
                    newline
                };
                let frame = self.buf[..end].to_vec();
                self.buf.drain(..=newline);
                self.scanned = 0;
                Some(frame)
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Signals transport close: raises `LeftOverBytes` exactly once if a
    /// partial frame remains unread.
    pub fn close(&mut self) -> crate::Result<()> {
        if !self.buf.is_empty() && !self.leftover_raised {
            self.leftover_raised = true;
            Err(crate::Error::LeftOverBytes)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod test {
    use super::{decode, Decoded, LineFramer, Reply};

    #[test]
    fn frames_crlf_lines() {
        let mut framer = LineFramer::new();
        framer.extend(b"220 mail.server.tld ESMTP\r\n250 OK\r\n\r\nbare\n");
        assert_eq!(framer.next_frame().unwrap(), b"220 mail.server.tld ESMTP");
        assert_eq!(framer.next_frame().unwrap(), b"250 OK");
        assert_eq!(framer.next_frame().unwrap(), b"");
        assert_eq!(framer.next_frame().unwrap(), b"bare");
        assert_eq!(framer.next_frame(), None);
        assert!(framer.close().is_ok());
    }

    #[test]
    fn resumes_partial_scans() {
        let mut framer = LineFramer::new();
        framer.extend(b"250-partial");
        assert_eq!(framer.next_frame(), None);
        framer.extend(b" line\r");
        assert_eq!(framer.next_frame(), None);
        framer.extend(b"\n221 Bye\r\n");
        assert_eq!(framer.next_frame().unwrap(), b"250-partial line");
        assert_eq!(framer.next_frame().unwrap(), b"221 Bye");
        assert_eq!(framer.next_frame(), None);
    }

    #[test]
    fn leftover_raised_once() {
        let mut framer = LineFramer::new();
        framer.extend(b"250 OK\r\nincomplete");
        assert_eq!(framer.next_frame().unwrap(), b"250 OK");
        assert!(matches!(
            framer.close(),
            Err(crate::Error::LeftOverBytes)
        ));
        assert!(framer.close().is_ok());
    }

    #[test]
    fn close_without_leftovers() {
        let mut framer = LineFramer::new();
        framer.extend(b"250 OK\r\n");
        assert_eq!(framer.next_frame().unwrap(), b"250 OK");
        assert!(framer.close().is_ok());
    }

    #[test]
    fn decodes_terminal_success() {
        assert_eq!(
            decode("250 Requested mail action okay").unwrap(),
            Decoded::Success(Reply::new(250, "Requested mail action okay"))
        );
        assert_eq!(
            decode("354 Start mail input").unwrap(),
            Decoded::Success(Reply::new(354, "Start mail input"))
        );
        assert_eq!(decode("250 ").unwrap(), Decoded::Success(Reply::new(250, "")));
    }

    #[test]
    fn drops_continuation_lines() {
        assert_eq!(decode("250-mail.server.tld greets you").unwrap(), Decoded::Intermediate);
        assert_eq!(decode("550-even failures continue").unwrap(), Decoded::Intermediate);
    }

    #[test]
    fn failure_carries_full_line() {
        assert_eq!(
            decode("554 5.7.1 Relay access denied").unwrap(),
            Decoded::Failure("554 5.7.1 Relay access denied".to_string())
        );
        assert_eq!(
            decode("120 waiting").unwrap(),
            Decoded::Failure("120 waiting".to_string())
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in ["", "25", "2x0 nope", "250", "250_no separator", "abc hello"] {
            assert!(matches!(decode(line), Err(crate::Error::MalformedMessage)));
        }
    }
}
