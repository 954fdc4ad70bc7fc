/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

//! Marker based token extraction for semi-structured header values.
//!
//! This is not a tag-list grammar: `find_between(sig, "d=", ";")` happily
//! matches inside `bd=` or a quoted string, and a tag that is the last one
//! in a value without a trailing terminator is reported as absent. Callers
//! treat an empty result as "field absent". Tightening this would change
//! verification outcomes on signatures seen in the wild.

/// Returns the text strictly between the first occurrence of `start` and
/// the first occurrence of `end` that follows it.
///
/// When `end` is `None` the value's line terminator is used: `\n` if the
/// value contains one, `\r\n` otherwise. An empty string is returned when
/// either marker is missing.
pub fn find_between<'x>(value: &'x str, start: &str, end: Option<&str>) -> &'x str {
    let end = end.unwrap_or(if value.contains('\n') { "\n" } else { "\r\n" });

    value
        .find(start)
        .map(|pos| pos + start.len())
        .and_then(|from| {
            value[from..]
                .find(end)
                .map(|to| &value[from..from + to])
        })
        .unwrap_or_default()
}
