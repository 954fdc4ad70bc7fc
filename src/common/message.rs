/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::borrow::Cow;

use mail_parser::{MessageParser, PartType};

use crate::{BodyPart, Error, HeaderMap, InboundMessage, Metadata};

use super::headers::{first, parse_header_map};

impl<'x> InboundMessage<'x> {
    /// Creates a message from headers that were parsed elsewhere.
    pub fn new(headers: HeaderMap, raw_message: impl Into<Cow<'x, [u8]>>) -> Self {
        InboundMessage {
            headers,
            metadata: Metadata::default(),
            raw_message: raw_message.into(),
            parts: Vec::new(),
        }
    }

    /// Parses a raw RFC 5322 message, collecting its headers and every
    /// embedded `message/rfc822` part.
    pub fn parse(raw_message: &'x [u8]) -> crate::Result<Self> {
        let message = MessageParser::new()
            .parse(raw_message)
            .ok_or(Error::MailParseError)?;
        let headers = parse_header_map(raw_message);
        if headers.is_empty() {
            return Err(Error::MailParseError);
        }

        let mut parts = Vec::new();
        for part in message.parts.into_iter().skip(1) {
            parts.push(match part.body {
                PartType::Message(message) => {
                    let embedded = match message.raw_message {
                        Cow::Borrowed(message) => Cow::Borrowed(
                            message
                                .get(part.offset_body as usize..part.offset_end as usize)
                                .unwrap_or(message),
                        ),
                        message => message,
                    };
                    BodyPart::embedded(embedded)
                }
                _ => BodyPart::default(),
            });
        }

        Ok(InboundMessage {
            headers,
            metadata: Metadata::default(),
            raw_message: raw_message.into(),
            parts,
        })
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_part(mut self, part: BodyPart<'x>) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.as_ref().to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        first(&self.headers, name)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn raw_message(&self) -> &[u8] {
        self.raw_message.as_ref()
    }

    pub fn parts(&self) -> &[BodyPart<'x>] {
        &self.parts
    }

    /// Address of the first `From` header, without display name.
    pub fn from_address(&self) -> Option<&str> {
        self.header("from").and_then(parse_mailbox)
    }
}

impl<'x> BodyPart<'x> {
    pub fn new(headers: Option<HeaderMap>, message: Option<Cow<'x, [u8]>>) -> Self {
        BodyPart { headers, message }
    }

    /// A `message/rfc822` part holding `raw_message`.
    pub fn embedded(raw_message: impl Into<Cow<'x, [u8]>>) -> Self {
        let raw_message = raw_message.into();
        BodyPart {
            headers: parse_header_map(raw_message.as_ref()).into(),
            message: raw_message.into(),
        }
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    pub fn message(&self) -> Option<&[u8]> {
        self.message.as_deref()
    }
}

/// Extracts the address from `Name <local@domain>` or a bare address.
pub(crate) fn parse_mailbox(value: &str) -> Option<&str> {
    let address = match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => &value[start + 1..end],
        _ => value,
    }
    .trim();

    if !address.is_empty() {
        Some(address)
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use crate::{InboundMessage, Metadata};

    const REPORT: &str = concat!(
        "From: Feedback Loop <fbl@isp.example>\r\n",
        "To: fbl@example.org\r\n",
        "Subject: FW: Newsletter\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/report; report-type=feedback-report;\r\n",
        "\tboundary=\"part\"\r\n",
        "\r\n",
        "--part\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "This is an abuse report.\r\n",
        "--part\r\n",
        "Content-Type: message/rfc822\r\n",
        "\r\n",
        "From: Newsletter <news@example.org>\r\n",
        "CFBL-Address: fbl@example.org; report=arf\r\n",
        "Subject: Newsletter\r\n",
        "\r\n",
        "Hello!\r\n",
        "--part--\r\n",
    );

    #[test]
    fn parse_message() {
        let message = InboundMessage::parse(REPORT.as_bytes()).unwrap();

        assert_eq!(message.from_address(), Some("fbl@isp.example"));
        assert_eq!(message.header("subject"), Some("FW: Newsletter"));
        assert_eq!(
            message.header("content-type"),
            Some("multipart/report; report-type=feedback-report;\r\n\tboundary=\"part\"")
        );
        assert!(!message.headers().contains_key("cfbl-address"));
        assert_eq!(message.raw_message(), REPORT.as_bytes());

        let embedded = message
            .parts()
            .iter()
            .find(|part| part.message().is_some())
            .unwrap();
        let headers = embedded.headers().unwrap();
        assert_eq!(
            headers.get("cfbl-address").unwrap(),
            &vec!["fbl@example.org; report=arf".to_string()]
        );
        assert_eq!(
            headers.get("from").unwrap(),
            &vec!["Newsletter <news@example.org>".to_string()]
        );
        assert!(std::str::from_utf8(embedded.message().unwrap())
            .unwrap()
            .starts_with("From: Newsletter <news@example.org>\r\n"));
    }

    #[test]
    fn build_message() {
        let metadata = serde_json::from_str::<Metadata>(
            r#"{"auth_header": "mx.example.net; dkim=pass header.d=example.org header.s=sel",
                "envelope_from": "bounce@example.org",
                "queue_id": "4XyZ"}"#,
        )
        .unwrap();
        assert_eq!(metadata.envelope_from.as_deref(), Some("bounce@example.org"));
        assert_eq!(metadata.extra.get("queue_id").unwrap(), "4XyZ");

        let message = InboundMessage::default()
            .with_header("From", "news@example.org")
            .with_header("Received", "from a")
            .with_header("RECEIVED", "from b")
            .with_metadata(metadata);
        assert_eq!(message.from_address(), Some("news@example.org"));
        assert_eq!(
            message.headers().get("received").unwrap(),
            &vec!["from a".to_string(), "from b".to_string()]
        );
        assert!(message.metadata().auth_header.is_some());
    }

    #[test]
    fn reject_garbage() {
        assert!(InboundMessage::parse(b"").is_err());
    }
}
