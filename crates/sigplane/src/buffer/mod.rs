// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Zero-copy payload containers for stream packets.

mod bits;
mod shared;

pub use bits::BitBuffer;
pub use shared::SharedBuffer;
