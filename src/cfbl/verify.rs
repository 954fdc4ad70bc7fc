/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use crate::{
    common::extract::find_between, Alignment, CfblParser, DkimVerifier, Error, RegistrableDomain,
};

impl Alignment {
    /// Selects the RFC 9477 verification mode for `cfbl_domain`, given the
    /// From domain and its registrable domain.
    pub fn new(cfbl_domain: &str, from_domain: &str, base_domain: &str) -> Self {
        if cfbl_domain.eq_ignore_ascii_case(from_domain) {
            Alignment::Strict
        } else if !base_domain.is_empty()
            && cfbl_domain
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", base_domain.to_ascii_lowercase()))
        {
            Alignment::Relaxed
        } else {
            Alignment::ThirdParty
        }
    }
}

impl<D: DkimVerifier, R: RegistrableDomain> CfblParser<D, R> {
    /// Verifies that the DKIM signatures of a message vouch for
    /// `cfbl_domain`, returning the mode that was applied.
    ///
    /// `auth_results` holds `dkim=` result entries and `signatures` the raw
    /// DKIM-Signature values of the message.
    pub fn verify_alignment(
        &self,
        cfbl_domain: &str,
        auth_results: &[String],
        from_domain: &str,
        signatures: &[String],
    ) -> crate::Result<Alignment> {
        let base_domain = self.domains.registrable_domain(from_domain);
        let alignment = Alignment::new(cfbl_domain, from_domain, base_domain);
        let signs_cfbl = |domain: &str| -> crate::Result<bool> {
            Ok(self
                .find_dkim_signature(domain, auth_results, signatures)?
                .is_some_and(signs_cfbl_address))
        };

        tracing::debug!(cfbl_domain, from_domain, ?alignment, "Verifying CFBL alignment");

        match alignment {
            Alignment::Strict => {
                if !signs_cfbl(cfbl_domain)? {
                    return Err(Error::CfblDkimStrictFailed(cfbl_domain.to_string()));
                }
            }
            Alignment::Relaxed => {
                if !signs_cfbl(from_domain)? && !signs_cfbl(cfbl_domain)? {
                    return Err(Error::CfblDkimRelaxedFailed(cfbl_domain.to_string()));
                }
            }
            Alignment::ThirdParty => {
                let from_signs = signs_cfbl(from_domain)?;
                let cfbl_signs = signs_cfbl(cfbl_domain)?;

                match (from_signs, cfbl_signs) {
                    // Both the author and the report recipient sign CFBL-Address
                    (true, true) => (),
                    // Presigned message, only the report recipient signs CFBL-Address
                    (false, true) => (),
                    _ => return Err(Error::CfblDkimThirdPartyFailed(cfbl_domain.to_string())),
                }
            }
        }

        Ok(alignment)
    }

    /// Returns the DKIM-Signature of a passing result whose signing domain
    /// shares the registrable domain of `domain`.
    ///
    /// Any matching result that did not pass fails with
    /// [`Error::DkimValidationFailed`], whatever the alignment mode.
    pub fn find_dkim_signature<'s>(
        &self,
        domain: &str,
        auth_results: &[String],
        signatures: &'s [String],
    ) -> crate::Result<Option<&'s str>> {
        let domain = domain.to_ascii_lowercase();
        let domain = self.domains.registrable_domain(&domain);
        let mut valid_domain = None;

        for auth_result in auth_results {
            let dkim_domain = find_between(auth_result, "header.d=", Some(" "));
            let dkim_domain_lcase = dkim_domain.to_ascii_lowercase();
            if self.domains.registrable_domain(&dkim_domain_lcase) == domain {
                if !auth_result.contains("dkim=pass") {
                    return Err(Error::DkimValidationFailed(dkim_domain.to_string()));
                }
                valid_domain = Some(dkim_domain_lcase);
            }
        }

        Ok(valid_domain.and_then(|valid_domain| {
            let tag = format!("d={valid_domain};");
            signatures
                .iter()
                .find(|signature| signature.to_ascii_lowercase().contains(&tag))
                .map(|signature| signature.as_str())
        }))
    }
}

/// Returns `true` if the `h=` tag of a DKIM-Signature lists `CFBL-Address`.
pub fn signs_cfbl_address(signature: &str) -> bool {
    let signature = signature.replace("\r\n\t", " ").replace("\n\t", " ");

    find_between(&signature, " h=", Some(";"))
        .split(':')
        .any(|header| header.trim() == "CFBL-Address")
}
