// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Port plumbing shared by stream and message ports.

pub mod filter;
pub mod negotiator;
pub mod statistics;

pub use filter::{ConnectionFilter, FilterEntry};
pub use negotiator::{
    ConnectionDetails, ConnectionInfo, ConnectionState, LinkFactory, PortUsageState,
    TransportNegotiator, UsesLink,
};
pub use statistics::{LinkStatistics, PortStatistics, StreamCounters};
