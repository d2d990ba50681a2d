// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Signal descriptor (stream metadata).
//!
//! A [`SignalDescriptor`] describes how to interpret the samples of one
//! stream: sample spacing, framing, complex/real mode and free-form keywords.
//! Producers mutate the fields directly; the output port versions every
//! descriptor it is handed and each link forwards a changed version to its
//! transport before the next packet, flagging that packet `sri_changed`.

use crate::error::{Error, Result};
use crate::props::{Properties, Value};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Unit code for time-based axes.
pub const UNITS_TIME: i16 = 1;
/// Unit code for unspecified axes.
pub const UNITS_NONE: i16 = 0;

/// Per-stream metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptor {
    /// Stream identity; never empty.
    pub stream_id: String,
    pub hversion: i32,
    pub xstart: f64,
    /// Seconds (or `xunits`) between consecutive samples.
    pub xdelta: f64,
    pub xunits: i16,
    /// Samples per frame for framed data; 0 for contiguous data.
    pub subsize: u32,
    pub ystart: f64,
    pub ydelta: f64,
    pub yunits: i16,
    /// Samples are interleaved (real, imaginary) pairs.
    pub complex: bool,
    /// Consumers should apply back pressure instead of dropping.
    pub blocking: bool,
    pub keywords: Properties,
}

impl SignalDescriptor {
    /// Descriptor with default fields for `stream_id`.
    pub fn new(stream_id: impl Into<String>) -> Result<Self> {
        let stream_id = stream_id.into();
        if stream_id.is_empty() {
            return Err(Error::InvalidDescriptor("stream id must not be empty".into()));
        }
        Ok(Self {
            stream_id,
            hversion: 1,
            xstart: 0.0,
            xdelta: 0.0,
            xunits: UNITS_TIME,
            subsize: 0,
            ystart: 0.0,
            ydelta: 0.0,
            yunits: UNITS_NONE,
            complex: false,
            blocking: false,
            keywords: Properties::new(),
        })
    }

    /// Descriptor with `xdelta = 1 / sample_rate`.
    pub fn with_sample_rate(stream_id: impl Into<String>, sample_rate: f64) -> Result<Self> {
        let mut sri = Self::new(stream_id)?;
        sri.set_sample_rate(sample_rate);
        Ok(sri)
    }

    pub fn sample_rate(&self) -> Option<f64> {
        (self.xdelta > 0.0).then(|| 1.0 / self.xdelta)
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.xdelta = if sample_rate > 0.0 { 1.0 / sample_rate } else { 0.0 };
    }

    /// Scalars per sample: 2 for complex, 1 for real.
    #[inline]
    pub fn item_size(&self) -> usize {
        if self.complex {
            2
        } else {
            1
        }
    }

    /// Scalars per frame; a frame is never split across sub-packets.
    #[inline]
    pub fn frame_size(&self) -> usize {
        self.item_size() * (self.subsize.max(1) as usize)
    }

    pub fn keyword(&self, id: &str) -> Option<&Value> {
        self.keywords.get(id)
    }

    pub fn set_keyword(&mut self, id: impl Into<String>, value: impl Into<Value>) {
        self.keywords.set(id, value);
    }

    pub fn erase_keyword(&mut self, id: &str) -> Option<Value> {
        self.keywords.remove(id)
    }

    /// Set of fields that differ between `self` and `other`.
    pub fn compare_fields(&self, other: &SignalDescriptor) -> SriFields {
        let mut changed = SriFields::NONE;
        let mut mark = |differs: bool, field: SriFields| {
            if differs {
                changed |= field;
            }
        };
        mark(self.hversion != other.hversion, SriFields::HVERSION);
        mark(self.xstart != other.xstart, SriFields::XSTART);
        mark(self.xdelta != other.xdelta, SriFields::XDELTA);
        mark(self.xunits != other.xunits, SriFields::XUNITS);
        mark(self.subsize != other.subsize, SriFields::SUBSIZE);
        mark(self.ystart != other.ystart, SriFields::YSTART);
        mark(self.ydelta != other.ydelta, SriFields::YDELTA);
        mark(self.yunits != other.yunits, SriFields::YUNITS);
        mark(self.complex != other.complex, SriFields::MODE);
        mark(self.stream_id != other.stream_id, SriFields::STREAMID);
        mark(self.blocking != other.blocking, SriFields::BLOCKING);
        mark(self.keywords != other.keywords, SriFields::KEYWORDS);
        changed
    }
}

/// Bit set of descriptor fields, as returned by
/// [`SignalDescriptor::compare_fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SriFields(u32);

impl SriFields {
    pub const NONE: SriFields = SriFields(0);
    pub const HVERSION: SriFields = SriFields(1 << 0);
    pub const XSTART: SriFields = SriFields(1 << 1);
    pub const XDELTA: SriFields = SriFields(1 << 2);
    pub const XUNITS: SriFields = SriFields(1 << 3);
    pub const SUBSIZE: SriFields = SriFields(1 << 4);
    pub const YSTART: SriFields = SriFields(1 << 5);
    pub const YDELTA: SriFields = SriFields(1 << 6);
    pub const YUNITS: SriFields = SriFields(1 << 7);
    pub const MODE: SriFields = SriFields(1 << 8);
    pub const STREAMID: SriFields = SriFields(1 << 9);
    pub const BLOCKING: SriFields = SriFields(1 << 10);
    pub const KEYWORDS: SriFields = SriFields(1 << 11);

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn contains(self, other: SriFields) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SriFields {
    type Output = SriFields;

    fn bitor(self, rhs: SriFields) -> SriFields {
        SriFields(self.0 | rhs.0)
    }
}

impl BitOrAssign for SriFields {
    fn bitor_assign(&mut self, rhs: SriFields) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for SignalDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (xdelta={}, subsize={}, mode={}, keywords={})",
            self.stream_id,
            self.xdelta,
            self.subsize,
            if self.complex { "complex" } else { "real" },
            self.keywords
        )
    }
}
