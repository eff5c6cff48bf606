/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

/// A mailbox with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email_address: String,
    pub name: Option<String>,
}

impl Contact {
    /// Creates a contact from a bare address.
    pub fn new(email_address: impl Into<String>) -> crate::Result<Self> {
        let email_address = email_address.into();
        if email_address.is_empty() {
            return Err(crate::Error::MissingAddress);
        }
        Ok(Contact {
            email_address,
            name: None,
        })
    }

    /// Creates a contact with a display name.
    pub fn with_name(
        name: impl Into<String>,
        email_address: impl Into<String>,
    ) -> crate::Result<Self> {
        Ok(Contact {
            name: Some(name.into()),
            ..Contact::new(email_address)?
        })
    }

    /// Header form: `"name" <addr>` when a display name is present, with
    /// double quotes in the name backslash-escaped; the bare address
    /// otherwise.
    pub fn to_mime(&self) -> String {
        match &self.name {
            Some(name) => format!(
                "\"{}\" <{}>",
                name.replace('"', "\\\""),
                self.email_address
            ),
            None => self.email_address.clone(),
        }
    }
}

/// Message body contents.
#[derive(Debug, Clone)]
pub enum Body {
    Plain(String),
    Html(String),
    /// Plain and HTML renditions of the same content, sent as
    /// `multipart/alternative`.
    Universal { plain: String, html: String },
}

/// How an attachment participates in the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentKind {
    /// A regular attachment, optionally addressable by content id.
    Attachment { content_id: Option<String> },
    /// An inline part referenced from the body by content id.
    Inline { content_id: String },
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub kind: AttachmentKind,
}

impl Attachment {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Attachment {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
            kind: AttachmentKind::Attachment { content_id: None },
        }
    }

    pub fn inline(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
        content_id: impl Into<String>,
    ) -> Self {
        Attachment {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
            kind: AttachmentKind::Inline {
                content_id: content_id.into(),
            },
        }
    }

    /// Addressable content id, for either kind.
    pub fn content_id(&self) -> Option<&str> {
        match &self.kind {
            AttachmentKind::Attachment { content_id } => content_id.as_deref(),
            AttachmentKind::Inline { content_id } => Some(content_id.as_str()),
        }
    }

    pub(crate) fn is_inline(&self) -> bool {
        matches!(self.kind, AttachmentKind::Inline { .. })
    }
}

/// An e-mail message ready for submission.
#[derive(Debug, Clone)]
pub struct Email {
    pub sender: Contact,
    pub reply_to: Option<Contact>,
    pub recipients: Vec<Contact>,
    pub cc: Vec<Contact>,
    pub bcc: Vec<Contact>,
    pub subject: String,
    pub body: Body,
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Creates a message. At least one recipient is required.
    pub fn new(
        sender: Contact,
        recipients: Vec<Contact>,
        subject: impl Into<String>,
        body: Body,
    ) -> crate::Result<Self> {
        if recipients.is_empty() {
            return Err(crate::Error::MissingRecipients);
        }
        Ok(Email {
            sender,
            reply_to: None,
            recipients,
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            body,
            attachments: Vec::new(),
        })
    }

    /// Sets the Reply-to contact.
    pub fn reply_to(mut self, contact: Contact) -> Self {
        self.reply_to = Some(contact);
        self
    }

    /// Adds a carbon-copy recipient.
    pub fn cc(mut self, contact: Contact) -> Self {
        self.cc.push(contact);
        self
    }

    /// Adds a blind-carbon-copy recipient. Included in the envelope but
    /// never serialized into the headers.
    pub fn bcc(mut self, contact: Contact) -> Self {
        self.bcc.push(contact);
        self
    }

    /// Adds an attachment.
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// The envelope recipient list: `recipients + cc + bcc` in submission
    /// order. Every entry receives its own `RCPT TO`.
    pub fn all_recipients(&self) -> impl Iterator<Item = &Contact> {
        self.recipients.iter().chain(&self.cc).chain(&self.bcc)
    }
}
