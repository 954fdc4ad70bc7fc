/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::borrow::Cow;

use crate::{
    common::{
        auth_results::{has_dkim_pass, split_auth_results},
        message::parse_mailbox,
    },
    Error, InboundMessage,
};

use super::{AuthSource, Report};

impl<'x> InboundMessage<'x> {
    /// Locates the headers carrying `CFBL-Address`.
    ///
    /// A top-level `CFBL-Address` is used as is. Otherwise the first body
    /// part whose headers contain one becomes the report. Its From address
    /// replaces `from_address` and its raw message is used for DKIM
    /// verification when the part has no passing Authentication-Results.
    pub(crate) fn locate_report<'a>(&'a self, from_address: &'a str) -> crate::Result<Report<'a>> {
        if self.headers.contains_key("cfbl-address") {
            // Authentication-Results headers of a top-level message come
            // from the sender, only results added by the receiving MTA count.
            let auth_source = match &self.metadata.auth_header {
                Some(auth_header) => AuthSource::Provided(split_auth_results(auth_header)),
                None => AuthSource::Reconcile,
            };

            return Ok(Report {
                headers: &self.headers,
                from_address: Cow::Borrowed(from_address),
                raw_message: self.raw_message.as_ref(),
                auth_source,
                unwrapped: false,
            });
        }

        for part in &self.parts {
            let Some(headers) = part
                .headers
                .as_ref()
                .filter(|headers| headers.contains_key("cfbl-address"))
            else {
                continue;
            };

            let from_address = headers
                .get("from")
                .and_then(|values| values.first())
                .and_then(|value| parse_mailbox(value))
                .unwrap_or(from_address);
            let auth_results = headers
                .get("authentication-results")
                .map(Vec::as_slice)
                .unwrap_or_default();

            let (auth_source, raw_message) =
                if auth_results.iter().any(|value| has_dkim_pass(value)) {
                    (
                        AuthSource::Provided(split_auth_results(&auth_results[0])),
                        self.raw_message.as_ref(),
                    )
                } else {
                    (
                        AuthSource::Reconcile,
                        part.message.as_deref().unwrap_or(self.raw_message.as_ref()),
                    )
                };

            tracing::debug!(
                from_address,
                reconcile = auth_source == AuthSource::Reconcile,
                "CFBL report found in embedded message"
            );

            return Ok(Report {
                headers,
                from_address: Cow::Borrowed(from_address),
                raw_message,
                auth_source,
                unwrapped: true,
            });
        }

        Err(Error::NoCfblAddress)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        cfbl::AuthSource, common::headers::parse_header_map, BodyPart, Error, HeaderMap,
        InboundMessage, Metadata,
    };

    const EMBEDDED: &str = concat!(
        "From: Newsletter <news@example.org>\r\n",
        "CFBL-Address: fbl@example.org\r\n",
        "DKIM-Signature: v=1; d=example.org; s=sel; h=From:CFBL-Address; b=abc\r\n",
        "\r\n",
        "Hello\r\n"
    );

    fn outer() -> InboundMessage<'static> {
        InboundMessage::new(
            parse_header_map(b"From: fbl@isp.example\r\nSubject: report\r\n\r\n"),
            b"outer message".as_slice(),
        )
    }

    #[test]
    fn top_level_report() {
        let metadata = Metadata {
            auth_header: Some(
                "mx.example.net; dkim=pass header.d=example.org header.s=sel".to_string(),
            ),
            ..Default::default()
        };
        let message = outer()
            .with_header("CFBL-Address", "fbl@example.org")
            .with_metadata(metadata);
        let report = message.locate_report("news@example.org").unwrap();
        assert!(!report.unwrapped);
        assert_eq!(report.from_address, "news@example.org");
        assert_eq!(report.raw_message, b"outer message");
        assert_eq!(
            report.auth_source,
            AuthSource::Provided(vec![
                " dkim=pass header.d=example.org header.s=sel".to_string()
            ])
        );

        // Without metadata the signatures are verified locally, even when
        // the message carries its own Authentication-Results
        for message in [
            outer().with_header("CFBL-Address", "fbl@example.org"),
            outer().with_header("CFBL-Address", "fbl@example.org").with_header(
                "Authentication-Results",
                "mx.example.net; dkim=pass header.d=example.org header.s=sel",
            ),
        ] {
            let report = message.locate_report("news@example.org").unwrap();
            assert_eq!(report.auth_source, AuthSource::Reconcile);
            assert_eq!(report.raw_message, b"outer message");
        }
    }

    #[test]
    fn embedded_report() {
        let message = outer()
            .with_part(BodyPart::default())
            .with_part(BodyPart::embedded(EMBEDDED.as_bytes()));
        let report = message.locate_report("fbl@isp.example").unwrap();
        assert!(report.unwrapped);
        assert_eq!(report.from_address, "news@example.org");
        assert_eq!(report.raw_message, EMBEDDED.as_bytes());
        assert_eq!(report.auth_source, AuthSource::Reconcile);
        assert_eq!(
            report.headers.get("cfbl-address").unwrap(),
            &vec!["fbl@example.org".to_string()]
        );
    }

    #[test]
    fn embedded_report_with_auth_results() {
        let mut headers = parse_header_map(EMBEDDED.as_bytes());
        headers.insert(
            "authentication-results".to_string(),
            vec![
                "mx.isp.example; dkim=pass header.d=example.org header.s=sel; spf=pass"
                    .to_string(),
            ],
        );
        headers.remove("from");
        let message = outer().with_part(BodyPart::new(
            Some(headers),
            Some(EMBEDDED.as_bytes().into()),
        ));
        let report = message.locate_report("fbl@isp.example").unwrap();

        assert!(report.unwrapped);
        // No From in the embedded headers
        assert_eq!(report.from_address, "fbl@isp.example");
        // Results are reused, the outer message stays the sample
        assert_eq!(report.raw_message, b"outer message");
        assert_eq!(
            report.auth_source,
            AuthSource::Provided(vec![
                " dkim=pass header.d=example.org header.s=sel".to_string(),
                " spf=pass".to_string()
            ])
        );
    }

    #[test]
    fn first_matching_part_wins() {
        let mut second = HeaderMap::default();
        second.insert(
            "cfbl-address".to_string(),
            vec!["other@example.net".to_string()],
        );
        let message = outer()
            .with_part(BodyPart::embedded(EMBEDDED.as_bytes()))
            .with_part(BodyPart::new(Some(second), None));
        let report = message.locate_report("fbl@isp.example").unwrap();
        assert_eq!(
            report.headers.get("cfbl-address").unwrap(),
            &vec!["fbl@example.org".to_string()]
        );
    }

    #[test]
    fn not_a_report() {
        for message in [
            outer(),
            outer().with_part(BodyPart::default()),
            outer().with_part(BodyPart::embedded(b"From: a@example.org\r\n\r\nbody".as_slice())),
        ] {
            assert_eq!(
                message.locate_report("fbl@isp.example").unwrap_err(),
                Error::NoCfblAddress
            );
        }
    }
}
