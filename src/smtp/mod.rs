/*
 * SPDX-FileCopyrightText: 2020 Stalwart Labs LLC <hello@stalw.art>
 *
 * SPDX-License-Identifier: Apache-2.0 OR MIT
 */

pub mod client;
pub mod machine;
pub mod reply;
pub mod request;
pub mod stream;
pub mod tls;
