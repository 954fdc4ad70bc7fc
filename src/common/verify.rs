/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::sync::Arc;

use crate::{DkimVerifier, PublicSuffix, RegistrableDomain};

impl RegistrableDomain for PublicSuffix {
    fn registrable_domain<'x>(&self, hostname: &'x str) -> &'x str {
        psl::domain_str(hostname).unwrap_or(hostname)
    }
}

impl<T: RegistrableDomain + ?Sized> RegistrableDomain for &T {
    fn registrable_domain<'x>(&self, hostname: &'x str) -> &'x str {
        (**self).registrable_domain(hostname)
    }
}

impl<T: RegistrableDomain + ?Sized> RegistrableDomain for Arc<T> {
    fn registrable_domain<'x>(&self, hostname: &'x str) -> &'x str {
        (**self).registrable_domain(hostname)
    }
}

impl<T: DkimVerifier + ?Sized> DkimVerifier for &T {
    fn verify_dkim_signature(&self, raw_message: &[u8], index: usize) -> anyhow::Result<bool> {
        (**self).verify_dkim_signature(raw_message, index)
    }
}

impl<T: DkimVerifier + ?Sized> DkimVerifier for Arc<T> {
    fn verify_dkim_signature(&self, raw_message: &[u8], index: usize) -> anyhow::Result<bool> {
        (**self).verify_dkim_signature(raw_message, index)
    }
}
