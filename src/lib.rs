// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

mod codec;
mod error;
mod frame;
mod handler;
mod server;
mod util;

pub use error::*;
pub use frame::*;
pub use handler::*;
pub use server::*;
