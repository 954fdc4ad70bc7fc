/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::fmt::Display;

use crate::{DkimAuthResult, DkimResult, DkimVerifier};

use super::extract::find_between;

impl DkimAuthResult {
    pub fn new(result: DkimResult, domain: impl Into<String>, selector: impl Into<String>) -> Self {
        DkimAuthResult {
            result,
            domain: domain.into(),
            selector: selector.into(),
        }
    }

    pub fn result(&self) -> DkimResult {
        self.result
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Verifies every DKIM-Signature of `raw_message` and returns one result
    /// per signature, in the same order as `signatures`.
    ///
    /// Verifier errors count as a failed signature.
    pub fn verify_all(
        dkim: &impl DkimVerifier,
        raw_message: &[u8],
        signatures: &[String],
    ) -> Vec<DkimAuthResult> {
        signatures
            .iter()
            .enumerate()
            .map(|(index, signature)| {
                let result = match dkim.verify_dkim_signature(raw_message, index) {
                    Ok(true) => DkimResult::Pass,
                    Ok(false) => DkimResult::Fail,
                    Err(err) => {
                        tracing::warn!(index, error = %err, "DKIM verification error");
                        DkimResult::Fail
                    }
                };

                DkimAuthResult::new(
                    result,
                    find_between(signature, "d=", Some(";")),
                    find_between(signature, "s=", Some(";")),
                )
            })
            .collect()
    }
}

impl Display for DkimResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DkimResult::Pass => "pass",
            DkimResult::Fail => "fail",
        })
    }
}

impl Display for DkimAuthResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "dkim={} header.d={} header.s={}",
            self.result, self.domain, self.selector
        )
    }
}

/// Splits an Authentication-Results value into its result entries,
/// dropping the leading authserv-id.
pub fn split_auth_results(value: &str) -> Vec<String> {
    value.split(';').skip(1).map(|s| s.to_string()).collect()
}

/// Returns `true` if an Authentication-Results value holds a passing DKIM
/// result that names its signing domain.
pub(crate) fn has_dkim_pass(value: &str) -> bool {
    value.contains("dkim=pass") && value.contains("header.d=")
}
