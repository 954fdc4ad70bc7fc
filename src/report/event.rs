/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    cfbl::{AuthSource, Report},
    common::{headers::first, message::parse_mailbox},
    CfblAddress, CfblParser, DkimAuthResult, DkimVerifier, Error, FblEvent, HeaderMap,
    InboundMessage, RegistrableDomain,
};

static IPV4: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid IPv4 regex")
});

impl<D: DkimVerifier, R: RegistrableDomain> CfblParser<D, R> {
    /// Verifies a CFBL report and builds its feedback loop event.
    ///
    /// `from_address` is the RFC5322.From address of `message`. It is
    /// replaced by the embedded message's From when the report is found in
    /// a `message/rfc822` part.
    pub fn parse(&self, message: &InboundMessage<'_>, from_address: &str) -> crate::Result<FblEvent> {
        let result = self.parse_report(message, from_address);

        match &result {
            Ok(event) => tracing::debug!(ip = event.ip(), url = event.url(), "CFBL report accepted"),
            Err(err) if err.is_rejection() => {
                tracing::debug!(code = err.code(), reason = %err, "CFBL report rejected")
            }
            Err(err) => tracing::warn!(code = err.code(), reason = %err, "Invalid CFBL message"),
        }

        result
    }

    /// Same as [`CfblParser::parse`], taking the From address from the
    /// message headers.
    pub fn parse_message(&self, message: &InboundMessage<'_>) -> crate::Result<FblEvent> {
        let from_address = message.from_address().unwrap_or_default();
        self.parse(message, from_address)
    }

    fn parse_report(&self, message: &InboundMessage<'_>, from_address: &str) -> crate::Result<FblEvent> {
        let report = message.locate_report(from_address)?;
        let headers = report.headers;

        let cfbl_addresses = CfblAddress::parse_all(
            headers
                .get("cfbl-address")
                .map(Vec::as_slice)
                .unwrap_or_default(),
            &self.config.default_report_type,
        )?;
        let signatures = headers
            .get("dkim-signature")
            .map(Vec::as_slice)
            .unwrap_or_default();

        let auth_results = match &report.auth_source {
            AuthSource::Provided(auth_results) => auth_results.clone(),
            AuthSource::Reconcile if !signatures.is_empty() => {
                DkimAuthResult::verify_all(&self.dkim, report.raw_message, signatures)
                    .into_iter()
                    .map(|result| result.to_string())
                    .collect()
            }
            AuthSource::Reconcile => return Err(Error::NoAuthHeader),
        };

        let from_domain = from_domain(&report.from_address)?;
        for cfbl_domain in cfbl_addresses
            .iter()
            .map(|address| address.domain())
            .collect::<BTreeSet<_>>()
        {
            self.verify_alignment(cfbl_domain, &auth_results, &from_domain, signatures)?;
        }

        let ip = self.originating_ip(headers)?;

        let mut event_headers = BTreeMap::from([
            (
                "cfbl-address".to_string(),
                cfbl_addresses
                    .iter()
                    .map(|address| address.address().to_string())
                    .collect::<Vec<_>>(),
            ),
            (
                "cfbl-report-type".to_string(),
                vec![cfbl_addresses[0].report_type().to_string()],
            ),
            (
                "message-id".to_string(),
                headers.get("message-id").cloned().unwrap_or_default(),
            ),
            ("return-path".to_string(), return_path(message, &report)),
        ]);
        if let Some(feedback_id) = headers.get("cfbl-feedback-id") {
            event_headers.insert("cfbl-feedback-id".to_string(), feedback_id.clone());
        }

        // Received timestamps are not parsed, event_date stays unset.
        Ok(FblEvent::new(
            ip,
            from_domain,
            event_headers,
            report.raw_message,
        ))
    }

    /// Originating IP of the reported message.
    ///
    /// The configured IP headers are tried in order. Otherwise the IPv4
    /// address in the `from` clause of the second Received header (the
    /// first one if there is only one) is used.
    pub fn originating_ip(&self, headers: &HeaderMap) -> crate::Result<String> {
        for name in &self.config.ip_headers {
            if let Some(ip) = first(headers, &name.to_ascii_lowercase())
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
            {
                return Ok(ip.to_string());
            }
        }

        let received = headers
            .get("received")
            .map(Vec::as_slice)
            .unwrap_or_default();
        let received = received
            .get(1)
            .or_else(|| received.first())
            .ok_or(Error::NoIpFound)?;
        let from_clause = received.split("by").next().unwrap_or_default();

        IPV4
            .find(from_clause)
            .map(|ip| ip.as_str().to_string())
            .ok_or(Error::NoIpFound)
    }
}

fn from_domain(from_address: &str) -> crate::Result<String> {
    parse_mailbox(from_address)
        .and_then(|address| address.split_once('@'))
        .map(|(_, domain)| domain.trim().to_ascii_lowercase())
        .filter(|domain| !domain.is_empty())
        .ok_or_else(|| Error::InvalidFromAddress(from_address.to_string()))
}

/// Return-Path of the report. An embedded report only uses its own header,
/// a top-level one falls back to the envelope sender.
fn return_path(message: &InboundMessage<'_>, report: &Report<'_>) -> Vec<String> {
    match report.headers.get("return-path") {
        Some(return_path) => return_path.clone(),
        None if !report.unwrapped => message
            .metadata
            .envelope_from
            .iter()
            .filter(|envelope_from| !envelope_from.is_empty())
            .cloned()
            .collect(),
        None => Vec::new(),
    }
}
