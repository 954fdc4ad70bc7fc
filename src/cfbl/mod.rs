/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::borrow::Cow;

use crate::{CfblAddress, HeaderMap};

pub mod address;
pub mod unwrap;
pub mod verify;

/// Where the DKIM results for a report come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthSource {
    /// Result entries taken from an Authentication-Results value.
    Provided(Vec<String>),
    /// No usable results, DKIM-Signatures have to be verified locally.
    Reconcile,
}

/// Working view of the message carrying the `CFBL-Address` header.
#[derive(Debug, Clone)]
pub(crate) struct Report<'a> {
    pub headers: &'a HeaderMap,
    pub from_address: Cow<'a, str>,
    pub raw_message: &'a [u8],
    pub auth_source: AuthSource,
    pub unwrapped: bool,
}

impl CfblAddress {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn report_type(&self) -> &str {
        &self.report_type
    }
}
