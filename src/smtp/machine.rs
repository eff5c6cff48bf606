/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! The per-connection conversation state machine.
//!
//! The machine is purely sequential: it advances once per terminal success
//! reply and produces the next command to send. Failed replies never reach
//! it; the connection driver fails the submission first.

use chrono::Local;

use crate::config::{Configuration, Credentials, Encryption, FeatureFlags};
use crate::email::Email;
use crate::smtp::request::Request;

/// What the driver must do after an advance.
#[derive(Debug)]
pub enum Step {
    Send(Request),
    /// The server confirmed `QUIT`; close the connection and complete the
    /// submission.
    Close,
}

#[derive(Debug)]
enum State {
    Idle { sent: bool },
    HelloSent { after_starttls: bool },
    StartTlsSent,
    AuthBegan,
    UsernameSent,
    PasswordSent,
    MailFromSent,
    // The envelope iterator lives in the state and is moved, never copied,
    // between transitions so no recipient is sent twice.
    RecipientSent { pending: std::vec::IntoIter<String> },
    DataCommandSent,
    MailDataSent,
    QuitSent,
}

#[derive(Debug)]
pub struct Conversation {
    state: State,
    server_name: String,
    use_ehello: bool,
    needs_starttls: bool,
    credentials: Option<Credentials>,
    envelope: Vec<String>,
    email: Option<Email>,
}

impl Conversation {
    pub fn new(config: &Configuration, email: Email) -> Self {
        Conversation {
            state: State::Idle { sent: false },
            server_name: config.server.hostname.clone(),
            use_ehello: config.feature_flags.contains(FeatureFlags::USE_ESMTP),
            needs_starttls: matches!(config.server.encryption, Encryption::StartTls(_)),
            credentials: config.credentials.clone(),
            envelope: email
                .all_recipients()
                .map(|contact| contact.email_address.clone())
                .collect(),
            email: Some(email),
        }
    }

    /// True once `QUIT` has been sent; read errors from servers that drop
    /// the connection early are tolerated from here on.
    pub fn is_closing(&self) -> bool {
        matches!(self.state, State::QuitSent | State::Idle { sent: true })
    }

    fn hello(&self) -> Request {
        Request::Hello {
            server_name: self.server_name.clone(),
            use_ehello: self.use_ehello,
        }
    }

    fn mail_from(&mut self) -> (State, Step) {
        let sender = self
            .email
            .as_ref()
            .map(|email| email.sender.email_address.clone())
            .unwrap_or_default();
        (State::MailFromSent, Step::Send(Request::MailFrom(sender)))
    }

    /// Advances on one terminal success reply.
    pub fn advance(&mut self) -> Step {
        let state = std::mem::replace(&mut self.state, State::Idle { sent: true });
        let (next, step) = match state {
            State::Idle { sent: false } => (
                State::HelloSent {
                    after_starttls: false,
                },
                Step::Send(self.hello()),
            ),
            State::Idle { sent: true } => (State::Idle { sent: true }, Step::Close),
            State::HelloSent { after_starttls } => {
                if self.needs_starttls && !after_starttls {
                    (State::StartTlsSent, Step::Send(Request::StartTls))
                } else if self.credentials.is_some() {
                    (State::AuthBegan, Step::Send(Request::BeginAuth))
                } else {
                    self.mail_from()
                }
            }
            State::StartTlsSent => (
                State::HelloSent {
                    after_starttls: true,
                },
                Step::Send(self.hello()),
            ),
            State::AuthBegan => {
                let username = self
                    .credentials
                    .as_ref()
                    .map(|credentials| credentials.username.clone())
                    .unwrap_or_default();
                (State::UsernameSent, Step::Send(Request::AuthUser(username)))
            }
            State::UsernameSent => {
                let password = self
                    .credentials
                    .as_ref()
                    .map(|credentials| credentials.password.clone())
                    .unwrap_or_default();
                (
                    State::PasswordSent,
                    Step::Send(Request::AuthPassword(password)),
                )
            }
            State::PasswordSent => self.mail_from(),
            State::MailFromSent => {
                let mut pending = std::mem::take(&mut self.envelope).into_iter();
                match pending.next() {
                    Some(first) => (
                        State::RecipientSent { pending },
                        Step::Send(Request::Recipient(first)),
                    ),
                    // Unreachable while Email enforces non-empty recipients.
                    None => (State::DataCommandSent, Step::Send(Request::Data)),
                }
            }
            State::RecipientSent { mut pending } => match pending.next() {
                Some(next) => (
                    State::RecipientSent { pending },
                    Step::Send(Request::Recipient(next)),
                ),
                None => (State::DataCommandSent, Step::Send(Request::Data)),
            },
            State::DataCommandSent => match self.email.take() {
                Some(email) => (
                    State::MailDataSent,
                    Step::Send(Request::TransferData {
                        date: Local::now().fixed_offset(),
                        email,
                    }),
                ),
                None => (State::Idle { sent: true }, Step::Close),
            },
            State::MailDataSent => (State::QuitSent, Step::Send(Request::Quit)),
            State::QuitSent => (State::Idle { sent: true }, Step::Close),
        };
        self.state = next;
        step
    }
}
