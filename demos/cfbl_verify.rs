/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use cfbl_auth::{CfblParser, DkimVerifier, InboundMessage, PublicSuffix};

const TEST_MESSAGE: &str = include_str!("../resources/cfbl/003.eml");

// Accepts every signature, replace with a real DKIM verifier.
struct TrustAll;

impl DkimVerifier for TrustAll {
    fn verify_dkim_signature(&self, _raw_message: &[u8], _index: usize) -> anyhow::Result<bool> {
        Ok(true)
    }
}

fn main() {
    // Parse the feedback report and its embedded message
    let message = InboundMessage::parse(TEST_MESSAGE.as_bytes()).unwrap();

    // Verify the CFBL-Address and build the feedback loop event
    let event = CfblParser::new(TrustAll, PublicSuffix)
        .parse_message(&message)
        .unwrap();

    // Write event to stdout as JSON
    println!("{}", serde_json::to_string_pretty(&event).unwrap());
}
