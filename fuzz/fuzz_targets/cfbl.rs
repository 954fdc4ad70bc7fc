/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

#![no_main]
use libfuzzer_sys::fuzz_target;

use cfbl_auth::{
    cfbl::verify::signs_cfbl_address,
    common::{extract::find_between, headers::parse_header_map},
    CfblAddress, CfblParser, DkimVerifier, InboundMessage, PublicSuffix,
};

static RFC822_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz:;=@.<>- \r\n\t";
static HEADER_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz1=;: \t\r\n";

struct Scripted<'x>(&'x [u8]);

impl DkimVerifier for Scripted<'_> {
    fn verify_dkim_signature(&self, _raw_message: &[u8], index: usize) -> anyhow::Result<bool> {
        match self.0.get(index).map(|byte| byte % 3) {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(anyhow::anyhow!("no key")),
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let data_rfc822 = into_alphabet(data, RFC822_ALPHABET);
    let data_header = into_alphabet(data, HEADER_ALPHABET);
    let text = String::from_utf8_lossy(&data_header);

    parse_header_map(data);
    parse_header_map(&data_rfc822);

    signs_cfbl_address(&text);
    find_between(&text, "h=", Some(";"));
    find_between(&text, "header.d=", None);

    CfblAddress::parse_all(&[text.to_string()], "arf").ok();

    let parser = CfblParser::new(Scripted(data), PublicSuffix);
    for raw in [data, data_rfc822.as_slice()] {
        if let Ok(message) = InboundMessage::parse(raw) {
            parser.parse_message(&message).ok();
        }
    }
});

fn into_alphabet(data: &[u8], alphabet: &[u8]) -> Vec<u8> {
    data.iter()
        .map(|&byte| alphabet[byte as usize % alphabet.len()])
        .collect()
}
