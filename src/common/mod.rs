/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

pub mod auth_results;
pub mod extract;
pub mod headers;
pub mod message;
pub mod verify;
