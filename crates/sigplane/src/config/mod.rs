// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data plane configuration.
//!
//! Two levels, like the rest of the crate expects:
//!
//! - **Static**: compile-time constants (wire limits, size classes, timeouts)
//! - **Dynamic**: [`RuntimeConfig`] holding a [`DataPlaneConfig`] behind an
//!   `ArcSwap`, so the push path reads it without taking a lock
//!
//! Values can come from code, from `SIGPLANE_*` environment variables
//! ([`DataPlaneConfig::from_env`]) or from a YAML file (`config-loaders`
//! feature, see [`loader`]).

#[cfg(feature = "config-loaders")]
pub mod loader;

use crate::error::{Error, Result};
use arc_swap::ArcSwap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

// =======================================================================
// Wire limits
// =======================================================================

/// Default per-call transfer limit of the RPC substrate (2 MiB).
pub const DEFAULT_MAX_TRANSFER_BYTES: usize = 2 * 1024 * 1024;

/// Fraction of the transfer limit available to sample payload.
///
/// The remainder covers descriptor, timestamp and framing overhead.
pub const PUSH_SIZE_MARGIN: f64 = 0.9;

/// Call timeout applied to a remote object while its transport is torn down.
pub const DISCONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Number of pushes kept in the rolling statistics window of a link.
pub const STATISTICS_WINDOW: usize = 10;

// =======================================================================
// Buffer cache size classes
// =======================================================================

/// Bookkeeping bytes accounted to every cached block.
pub const BLOCK_HEADER_BYTES: usize = 16;

/// Blocks up to this size (header included) round to [`SMALL_BLOCK_ROUNDING`].
pub const SMALL_BLOCK_LIMIT: usize = 128 * 1024;

/// Rounding granularity for small blocks.
pub const SMALL_BLOCK_ROUNDING: usize = 1024;

/// Rounding granularity for large blocks.
pub const LARGE_BLOCK_ROUNDING: usize = 4096;

// =======================================================================
// Environment variables
// =======================================================================

/// Overrides [`DataPlaneConfig::max_transfer_bytes`].
pub const ENV_MAX_TRANSFER_BYTES: &str = "SIGPLANE_MAX_TRANSFER_BYTES";
/// `0`, `off`, `false` or `no` disables the buffer cache.
pub const ENV_BUFFER_CACHE: &str = "SIGPLANE_BUFFER_CACHE";
/// `0`, `off`, `false` or `no` disables in-process transports.
pub const ENV_LOCAL_TRANSPORT: &str = "SIGPLANE_LOCAL_TRANSPORT";
/// `0`, `off`, `false` or `no` disables negotiated transports.
pub const ENV_NEGOTIATED_TRANSPORTS: &str = "SIGPLANE_NEGOTIATED_TRANSPORTS";

/// Per-thread buffer cache limits.
///
/// `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct BufferCacheConfig {
    pub enabled: bool,
    pub max_thread_bytes: Option<usize>,
    pub max_thread_blocks: Option<usize>,
    /// Age in cache ticks (one tick per block returned to the cache).
    pub max_thread_age: Option<usize>,
}

impl Default for BufferCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_thread_bytes: None,
            max_thread_blocks: None,
            max_thread_age: None,
        }
    }
}

/// Transport selection switches consulted by the negotiator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationPolicy {
    /// Use the in-process transport when the peer lives in this process.
    pub local_transport: bool,
    /// Query negotiable peers for their supported transports.
    pub negotiated_transports: bool,
}

impl Default for NegotiationPolicy {
    fn default() -> Self {
        Self {
            local_transport: true,
            negotiated_transports: true,
        }
    }
}

/// Process-wide data plane settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "config-loaders", derive(serde::Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct DataPlaneConfig {
    /// Per-call transfer limit of the remote transport, in bytes.
    pub max_transfer_bytes: usize,
    pub local_transport: bool,
    pub negotiated_transports: bool,
    pub buffer_cache: BufferCacheConfig,
}

impl Default for DataPlaneConfig {
    fn default() -> Self {
        Self {
            max_transfer_bytes: DEFAULT_MAX_TRANSFER_BYTES,
            local_transport: true,
            negotiated_transports: true,
            buffer_cache: BufferCacheConfig::default(),
        }
    }
}

impl DataPlaneConfig {
    /// Defaults overridden by `SIGPLANE_*` environment variables.
    ///
    /// Unset variables keep their default; malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides read through `lookup` (environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_TRANSFER_BYTES) {
            self.max_transfer_bytes = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{}: not a byte count: '{}'", ENV_MAX_TRANSFER_BYTES, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_BUFFER_CACHE) {
            self.buffer_cache.enabled = parse_switch(ENV_BUFFER_CACHE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOCAL_TRANSPORT) {
            self.local_transport = parse_switch(ENV_LOCAL_TRANSPORT, &raw)?;
        }
        if let Some(raw) = lookup(ENV_NEGOTIATED_TRANSPORTS) {
            self.negotiated_transports = parse_switch(ENV_NEGOTIATED_TRANSPORTS, &raw)?;
        }
        self.validate()
    }

    /// Reject values the data path cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_transfer_bytes == 0 {
            return Err(Error::Config("max_transfer_bytes must be non-zero".into()));
        }
        Ok(())
    }

    pub fn negotiation_policy(&self) -> NegotiationPolicy {
        NegotiationPolicy {
            local_transport: self.local_transport,
            negotiated_transports: self.negotiated_transports,
        }
    }
}

fn parse_switch(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" => Ok(true),
        "0" | "off" | "false" | "no" => Ok(false),
        other => Err(Error::Config(format!("{}: expected on/off, got '{}'", key, other))),
    }
}

/// Shared, atomically swappable data plane configuration.
///
/// Clones share the same underlying value; `set` is visible to every clone.
#[derive(Clone)]
pub struct RuntimeConfig {
    plane: Arc<ArcSwap<DataPlaneConfig>>,
}

impl RuntimeConfig {
    pub fn new(config: DataPlaneConfig) -> Self {
        Self {
            plane: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Process-wide instance, initialized from the environment on first use.
    ///
    /// A malformed environment is logged and the defaults are used.
    pub fn global() -> &'static RuntimeConfig {
        static GLOBAL: OnceLock<RuntimeConfig> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let config = DataPlaneConfig::from_env().unwrap_or_else(|e| {
                log::warn!("[config] {}; using defaults", e);
                DataPlaneConfig::default()
            });
            RuntimeConfig::new(config)
        })
    }

    /// Current snapshot (atomic load).
    #[inline]
    pub fn get(&self) -> Arc<DataPlaneConfig> {
        self.plane.load_full()
    }

    pub fn set(&self, config: DataPlaneConfig) {
        self.plane.store(Arc::new(config));
    }

    #[inline]
    pub fn max_transfer_bytes(&self) -> usize {
        self.plane.load().max_transfer_bytes
    }

    #[inline]
    pub fn negotiation_policy(&self) -> NegotiationPolicy {
        self.plane.load().negotiation_policy()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new(DataPlaneConfig::default())
    }
}
