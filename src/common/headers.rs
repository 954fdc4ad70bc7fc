/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

use std::{
    iter::{Enumerate, Peekable},
    slice::Iter,
};

use crate::HeaderMap;

#[derive(Clone, Copy)]
enum State {
    Name { start: usize },
    Value { start: usize, colon: usize },
}

pub(crate) struct HeaderIterator<'x> {
    message: &'x [u8],
    iter: Peekable<Enumerate<Iter<'x, u8>>>,
    state: State,
}

impl<'x> HeaderIterator<'x> {
    pub fn new(message: &'x [u8]) -> Self {
        HeaderIterator {
            message,
            iter: message.iter().enumerate().peekable(),
            state: State::Name { start: 0 },
        }
    }
}

impl<'x> Iterator for HeaderIterator<'x> {
    type Item = (&'x [u8], &'x [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let mut last_ch = 0;
        while let Some((pos, &ch)) = self.iter.next() {
            if ch == b':' {
                if let State::Name { start } = &self.state {
                    self.state = State::Value {
                        start: *start,
                        colon: pos,
                    };
                }
            } else if ch == b'\n' {
                let is_folded = self
                    .iter
                    .peek()
                    .is_some_and(|(_, next_byte)| [b' ', b'\t'].contains(next_byte));

                match self.state {
                    State::Value { start, colon } if !is_folded => {
                        let name = self.message.get(start..colon).unwrap_or_default();
                        let value = self.message.get(colon + 1..pos + 1).unwrap_or_default();
                        self.state = State::Name { start: pos + 1 };
                        return Some((name, value));
                    }
                    State::Name { start } => {
                        if start == pos || (last_ch == b'\r' && start + 1 == pos) {
                            // End of headers
                            return None;
                        } else if !is_folded {
                            // Line without a colon, skip it.
                            self.state = State::Name { start: pos + 1 };
                        }
                    }
                    State::Value { .. } => (),
                }
            }

            last_ch = ch;
        }

        None
    }
}

/// Builds a header map from the header block of a raw message.
///
/// Names are trimmed and lowercased. Values lose their leading whitespace
/// and trailing line break but keep any folding, so a DKIM-Signature still
/// contains its `\r\n\t` continuations.
pub fn parse_header_map(raw_message: &[u8]) -> HeaderMap {
    let mut headers = HeaderMap::default();

    for (name, value) in HeaderIterator::new(raw_message) {
        let name = String::from_utf8_lossy(name).trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = String::from_utf8_lossy(value);
        headers
            .entry(name)
            .or_default()
            .push(value.trim_start().trim_end_matches(['\r', '\n']).to_string());
    }

    headers
}

/// First value of `name`, if present.
pub(crate) fn first<'x>(headers: &'x HeaderMap, name: &str) -> Option<&'x str> {
    headers
        .get(name)
        .and_then(|values| values.first())
        .map(|value| value.as_str())
}
