/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::sync::LazyLock;

use regex::Regex;

use crate::{common::extract::find_between, CfblAddress, Error};

static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid address regex")
});

impl CfblAddress {
    /// Parses every `CFBL-Address` header value.
    ///
    /// The report type comes from a `report=` tag on the first value and
    /// applies to all addresses. Each value yields the first address found
    /// in it, so display names and comments are discarded. A value without
    /// an address fails the whole header.
    pub fn parse_all(values: &[String], default_report_type: &str) -> crate::Result<Vec<Self>> {
        let first = values.first().ok_or(Error::NoCfblAddress)?;
        let first = format!("{first};");
        let report_type = match find_between(&first, "report=", Some(";")).trim() {
            "" => default_report_type,
            report_type => report_type,
        };

        values
            .iter()
            .map(|value| -> crate::Result<Self> {
                let address = ADDRESS
                    .find(value)
                    .ok_or_else(|| Error::CfblAddressInvalid(value.trim().to_string()))?
                    .as_str();
                let (_, domain) = address
                    .split_once('@')
                    .ok_or_else(|| Error::CfblAddressInvalid(value.trim().to_string()))?;

                Ok(CfblAddress {
                    address: address.to_string(),
                    domain: domain.to_ascii_lowercase(),
                    report_type: report_type.to_string(),
                })
            })
            .collect()
    }
}
