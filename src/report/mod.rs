/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

pub mod event;

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::FblEvent;

impl FblEvent {
    pub(crate) fn new(
        ip: String,
        url: String,
        headers: BTreeMap<String, Vec<String>>,
        sample: &[u8],
    ) -> Self {
        FblEvent {
            event_type: "feedback_loop".to_string(),
            spam_type: "spam".to_string(),
            ip,
            url,
            event_date: None,
            headers,
            sample_payload: STANDARD.encode(sample),
            sample_content_type: "message/rfc822".to_string(),
            sample_encoding: "base64".to_string(),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn spam_type(&self) -> &str {
        &self.spam_type
    }

    /// Originating IP address of the reported message.
    pub fn ip(&self) -> &str {
        &self.ip
    }

    /// RFC5322.From domain of the reported message.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn event_date(&self) -> Option<&str> {
        self.event_date.as_deref()
    }

    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name).map(|values| values.as_slice())
    }

    pub fn sample_payload(&self) -> &str {
        &self.sample_payload
    }

    pub fn sample_content_type(&self) -> &str {
        &self.sample_content_type
    }

    pub fn sample_encoding(&self) -> &str {
        &self.sample_encoding
    }

    /// Decodes the base64 sample back into the raw message.
    pub fn sample(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.sample_payload).ok()
    }
}
