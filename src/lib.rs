/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! # cfbl-auth
//!
//! Verification and event extraction for RFC 9477 Complaint Feedback Loop
//! (CFBL) reports.
//!
//! A CFBL report is trusted only when a DKIM signature covering the
//! `CFBL-Address` header aligns with the domain of the message author.
//! [`CfblParser`] unwraps the report, parses its CFBL addresses, gathers
//! DKIM results (verifying signatures itself when no results were supplied),
//! runs the strict, relaxed or third-party alignment check for every CFBL
//! domain and finally builds an [`FblEvent`].
//!
//! DKIM cryptography and public-suffix lookups are injected through the
//! [`DkimVerifier`] and [`RegistrableDomain`] traits.

use std::{borrow::Cow, collections::BTreeMap};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

pub mod cfbl;
pub mod common;
pub mod report;

/// Case-folded header name to the ordered list of its raw values.
pub type HeaderMap = AHashMap<String, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct InboundMessage<'x> {
    pub(crate) headers: HeaderMap,
    pub(crate) metadata: Metadata,
    pub(crate) raw_message: Cow<'x, [u8]>,
    pub(crate) parts: Vec<BodyPart<'x>>,
}

#[derive(Debug, Clone, Default)]
pub struct BodyPart<'x> {
    pub(crate) headers: Option<HeaderMap>,
    pub(crate) message: Option<Cow<'x, [u8]>>,
}

/// Metadata attached to a message by the receiving MTA.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Composite Authentication-Results string, including the
    /// authserv-id as its first `;` separated segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope_from: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CfblAddress {
    pub(crate) address: String,
    pub(crate) domain: String,
    pub(crate) report_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DkimResult {
    Pass,
    Fail,
}

/// A single `dkim=` result, either taken from an Authentication-Results
/// header or produced by verifying a DKIM-Signature locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimAuthResult {
    pub(crate) result: DkimResult,
    pub(crate) domain: String,
    pub(crate) selector: String,
}

/// RFC 9477 section 3.1 verification mode for a CFBL domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    /// CFBL domain equals the RFC5322.From domain.
    Strict,
    /// CFBL domain is a subdomain of the organizational From domain.
    Relaxed,
    /// CFBL domain is unrelated to the From domain.
    ThirdParty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FblEvent {
    pub(crate) event_type: String,
    pub(crate) spam_type: String,
    pub(crate) ip: String,
    pub(crate) url: String,
    pub(crate) event_date: Option<String>,
    pub(crate) headers: BTreeMap<String, Vec<String>>,
    pub(crate) sample_payload: String,
    pub(crate) sample_content_type: String,
    pub(crate) sample_encoding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Headers holding the originating IP, in priority order.
    pub ip_headers: Vec<String>,
    /// Report type used when `CFBL-Address` carries no `report=` tag.
    pub default_report_type: String,
}

/// Verifies CFBL reports using the supplied DKIM and public suffix services.
#[derive(Debug, Clone)]
pub struct CfblParser<D, R> {
    pub(crate) dkim: D,
    pub(crate) domains: R,
    pub(crate) config: Config,
}

/// Cryptographic DKIM verification of a single signature.
pub trait DkimVerifier {
    /// Verifies the DKIM-Signature found at position `index` (in header
    /// order) of `raw_message`. Errors are reported as a failed signature
    /// by the caller.
    fn verify_dkim_signature(&self, raw_message: &[u8], index: usize) -> anyhow::Result<bool>;
}

/// Public suffix aware lookup of a hostname's registrable domain.
pub trait RegistrableDomain {
    /// Returns the eTLD+1 of `hostname`, or `hostname` itself when it
    /// cannot be determined.
    fn registrable_domain<'x>(&self, hostname: &'x str) -> &'x str;
}

/// [`RegistrableDomain`] backed by the compiled-in public suffix list.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicSuffix;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("NO_CFBL_ADDRESS: Email is not a valid FBL report")]
    NoCfblAddress,
    #[error("CFBL_ADDRESS_INVALID: {0}")]
    CfblAddressInvalid(String),
    #[error("NO_AUTH_HEADER: DKIM is required for CFBL")]
    NoAuthHeader,
    #[error("DKIM_VALIDATION_FAILED: DKIM Validation failed for {0}")]
    DkimValidationFailed(String),
    #[error("CFBL_DKIM_STRICT_FAILED: CFBL DKIM check (strict) failed for CFBL address domain {0}")]
    CfblDkimStrictFailed(String),
    #[error(
        "CFBL_DKIM_RELAXED_FAILED: CFBL DKIM check (relaxed) failed for CFBL address domain {0}"
    )]
    CfblDkimRelaxedFailed(String),
    #[error("CFBL_DKIM_THIRD_PARTY_FAILED: CFBL DKIM check (third-party) failed for CFBL address domain {0}")]
    CfblDkimThirdPartyFailed(String),
    #[error("NO_IP_FOUND: Could not extract IP address from headers")]
    NoIpFound,

    #[error("MAIL_PARSE_ERROR: Failed to parse message")]
    MailParseError,
    #[error("INVALID_FROM_ADDRESS: {0}")]
    InvalidFromAddress(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable label for this error, suitable for metrics.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoCfblAddress => "NO_CFBL_ADDRESS",
            Error::CfblAddressInvalid(_) => "CFBL_ADDRESS_INVALID",
            Error::NoAuthHeader => "NO_AUTH_HEADER",
            Error::DkimValidationFailed(_) => "DKIM_VALIDATION_FAILED",
            Error::CfblDkimStrictFailed(_) => "CFBL_DKIM_STRICT_FAILED",
            Error::CfblDkimRelaxedFailed(_) => "CFBL_DKIM_RELAXED_FAILED",
            Error::CfblDkimThirdPartyFailed(_) => "CFBL_DKIM_THIRD_PARTY_FAILED",
            Error::NoIpFound => "NO_IP_FOUND",
            Error::MailParseError => "MAIL_PARSE_ERROR",
            Error::InvalidFromAddress(_) => "INVALID_FROM_ADDRESS",
        }
    }

    /// Returns `true` when the message was understood but is not an
    /// acceptable CFBL report, as opposed to being malformed input.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, Error::MailParseError | Error::InvalidFromAddress(_))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ip_headers: vec![
                "x-abusix-originating-ip".to_string(),
                "x-client-src".to_string(),
                "x-originating-ip".to_string(),
            ],
            default_report_type: "arf".to_string(),
        }
    }
}

impl<D: DkimVerifier, R: RegistrableDomain> CfblParser<D, R> {
    pub fn new(dkim: D, domains: R) -> Self {
        CfblParser {
            dkim,
            domains,
            config: Config::default(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_ip_headers<T: Into<String>>(mut self, headers: impl IntoIterator<Item = T>) -> Self {
        self.config.ip_headers = headers
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_default_report_type(mut self, report_type: impl Into<String>) -> Self {
        self.config.default_report_type = report_type.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
