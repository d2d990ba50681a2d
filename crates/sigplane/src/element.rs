// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Element kinds: the closed set of sample types a stream can carry.
//!
//! Each kind is a zero-sized marker implementing [`ElementKind`]. Ports,
//! links and transports are generic over the kind, so the sample type is
//! fixed at compile time while the transport layer only sees bytes and
//! element counts.
//!
//! | Kind | Buffer | Format |
//! |------|--------|--------|
//! | [`Char`], [`Octet`], [`Short`], [`UShort`], [`Long`], [`ULong`], [`LongLong`], [`ULongLong`] | [`SharedBuffer`] of the integer | `Integer` |
//! | [`Float`], [`Double`] | [`SharedBuffer`] of the float | `Float` |
//! | [`Bit`] | [`BitBuffer`] | `Bit` |
//! | [`File`] | `String` (URI) | `Opaque` |
//! | [`Xml`] | `String` (document) | `Text` |
//!
//! Only kinds with a fixed wire width are chunked; `Opaque` and `Text`
//! payloads always travel in one push.

use crate::buffer::{BitBuffer, SharedBuffer};
use std::fmt;

/// Wire representation of an element kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementFormat {
    Integer { bits: u32, signed: bool },
    Float { bits: u32 },
    Bit,
    Opaque,
    Text,
}

impl ElementFormat {
    /// Bits per element on the wire; `None` for unstructured payloads.
    pub const fn wire_bits(self) -> Option<u32> {
        match self {
            ElementFormat::Integer { bits, .. } | ElementFormat::Float { bits } => Some(bits),
            ElementFormat::Bit => Some(1),
            ElementFormat::Opaque | ElementFormat::Text => None,
        }
    }
}

impl fmt::Display for ElementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementFormat::Integer { bits, signed: true } => write!(f, "int{}", bits),
            ElementFormat::Integer { bits, signed: false } => write!(f, "uint{}", bits),
            ElementFormat::Float { bits } => write!(f, "float{}", bits),
            ElementFormat::Bit => write!(f, "bit"),
            ElementFormat::Opaque => write!(f, "opaque"),
            ElementFormat::Text => write!(f, "text"),
        }
    }
}

/// Sample type carried by a stream.
pub trait ElementKind: Send + Sync + 'static {
    /// Payload container; clones and slices are cheap.
    type Buffer: Clone + Send + Sync + fmt::Debug + 'static;

    /// Short type name used in logs and port descriptions.
    const NAME: &'static str;
    /// Interface identifier of ports accepting this kind.
    const REPO_ID: &'static str;
    const FORMAT: ElementFormat;

    fn element_count(buffer: &Self::Buffer) -> usize;

    /// Elements `[start, end)`, sharing storage where possible.
    fn slice(buffer: &Self::Buffer, start: usize, end: usize) -> Self::Buffer;

    fn empty() -> Self::Buffer;

    /// Encoded size in bytes.
    fn wire_len(buffer: &Self::Buffer) -> usize;

    /// Encode into `out`, which is exactly `wire_len(buffer)` bytes.
    fn encode(buffer: &Self::Buffer, out: &mut [u8]);

    /// Decode `count` elements; `None` if `bytes` has the wrong length.
    fn decode(bytes: &[u8], count: usize) -> Option<Self::Buffer>;

    /// Whether payloads may be split across several pushes.
    fn is_chunkable() -> bool {
        Self::FORMAT.wire_bits().is_some()
    }
}

macro_rules! numeric_kind {
    ($(#[$meta:meta])* $kind:ident, $scalar:ty, $name:literal, $format:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $kind;

        impl ElementKind for $kind {
            type Buffer = SharedBuffer<$scalar>;

            const NAME: &'static str = $name;
            const REPO_ID: &'static str = concat!("IDL:sigplane/", $name, ":1.0");
            const FORMAT: ElementFormat = $format;

            #[inline]
            fn element_count(buffer: &Self::Buffer) -> usize {
                buffer.len()
            }

            #[inline]
            fn slice(buffer: &Self::Buffer, start: usize, end: usize) -> Self::Buffer {
                buffer.slice(start, end)
            }

            fn empty() -> Self::Buffer {
                SharedBuffer::empty()
            }

            #[inline]
            fn wire_len(buffer: &Self::Buffer) -> usize {
                buffer.len() * std::mem::size_of::<$scalar>()
            }

            fn encode(buffer: &Self::Buffer, out: &mut [u8]) {
                const WIDTH: usize = std::mem::size_of::<$scalar>();
                for (chunk, value) in out.chunks_exact_mut(WIDTH).zip(buffer.iter()) {
                    chunk.copy_from_slice(&value.to_le_bytes());
                }
            }

            fn decode(bytes: &[u8], count: usize) -> Option<Self::Buffer> {
                const WIDTH: usize = std::mem::size_of::<$scalar>();
                if bytes.len() != count * WIDTH {
                    return None;
                }
                let values: Vec<$scalar> = bytes
                    .chunks_exact(WIDTH)
                    .map(|chunk| {
                        let mut raw = [0u8; WIDTH];
                        raw.copy_from_slice(chunk);
                        <$scalar>::from_le_bytes(raw)
                    })
                    .collect();
                Some(SharedBuffer::from(values))
            }
        }
    };
}

numeric_kind!(
    /// Signed 8-bit samples.
    Char, i8, "dataChar", ElementFormat::Integer { bits: 8, signed: true }
);
numeric_kind!(
    /// Unsigned 8-bit samples.
    Octet, u8, "dataOctet", ElementFormat::Integer { bits: 8, signed: false }
);
numeric_kind!(
    Short, i16, "dataShort", ElementFormat::Integer { bits: 16, signed: true }
);
numeric_kind!(
    UShort, u16, "dataUshort", ElementFormat::Integer { bits: 16, signed: false }
);
numeric_kind!(
    Long, i32, "dataLong", ElementFormat::Integer { bits: 32, signed: true }
);
numeric_kind!(
    ULong, u32, "dataUlong", ElementFormat::Integer { bits: 32, signed: false }
);
numeric_kind!(
    LongLong, i64, "dataLongLong", ElementFormat::Integer { bits: 64, signed: true }
);
numeric_kind!(
    ULongLong, u64, "dataUlongLong", ElementFormat::Integer { bits: 64, signed: false }
);
numeric_kind!(
    /// 32-bit IEEE-754 samples.
    Float, f32, "dataFloat", ElementFormat::Float { bits: 32 }
);
numeric_kind!(
    /// 64-bit IEEE-754 samples.
    Double, f64, "dataDouble", ElementFormat::Float { bits: 64 }
);

/// Packed single-bit samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bit;

impl ElementKind for Bit {
    type Buffer = BitBuffer;

    const NAME: &'static str = "dataBit";
    const REPO_ID: &'static str = "IDL:sigplane/dataBit:1.0";
    const FORMAT: ElementFormat = ElementFormat::Bit;

    fn element_count(buffer: &BitBuffer) -> usize {
        buffer.len()
    }

    fn slice(buffer: &BitBuffer, start: usize, end: usize) -> BitBuffer {
        buffer.slice(start, end)
    }

    fn empty() -> BitBuffer {
        BitBuffer::empty()
    }

    fn wire_len(buffer: &BitBuffer) -> usize {
        buffer.packed_len()
    }

    fn encode(buffer: &BitBuffer, out: &mut [u8]) {
        buffer.pack_into(out);
    }

    fn decode(bytes: &[u8], count: usize) -> Option<BitBuffer> {
        if bytes.len() != count.div_ceil(8) {
            return None;
        }
        Some(BitBuffer::from_bytes(bytes.to_vec(), count))
    }
}

macro_rules! string_kind {
    ($(#[$meta:meta])* $kind:ident, $name:literal, $format:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $kind;

        impl ElementKind for $kind {
            type Buffer = String;

            const NAME: &'static str = $name;
            const REPO_ID: &'static str = concat!("IDL:sigplane/", $name, ":1.0");
            const FORMAT: ElementFormat = $format;

            fn element_count(buffer: &String) -> usize {
                buffer.len()
            }

            fn slice(buffer: &String, start: usize, end: usize) -> String {
                buffer.get(start..end.min(buffer.len())).unwrap_or_default().to_string()
            }

            fn empty() -> String {
                String::new()
            }

            fn wire_len(buffer: &String) -> usize {
                buffer.len()
            }

            fn encode(buffer: &String, out: &mut [u8]) {
                out.copy_from_slice(buffer.as_bytes());
            }

            fn decode(bytes: &[u8], count: usize) -> Option<String> {
                if bytes.len() != count {
                    return None;
                }
                String::from_utf8(bytes.to_vec()).ok()
            }
        }
    };
}

string_kind!(
    /// URI of a file holding the samples.
    File, "dataFile", ElementFormat::Opaque
);
string_kind!(
    /// XML document payloads.
    Xml, "dataXML", ElementFormat::Text
);

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<K: ElementKind>(buffer: &K::Buffer) -> K::Buffer {
        let mut bytes = vec![0u8; K::wire_len(buffer)];
        K::encode(buffer, &mut bytes);
        K::decode(&bytes, K::element_count(buffer)).expect("decode")
    }

    #[test]
    fn wire_bits() {
        assert_eq!(Float::FORMAT.wire_bits(), Some(32));
        assert_eq!(Char::FORMAT.wire_bits(), Some(8));
        assert_eq!(Bit::FORMAT.wire_bits(), Some(1));
        assert_eq!(File::FORMAT.wire_bits(), None);
        assert!(Double::is_chunkable());
        assert!(!Xml::is_chunkable());
        assert_eq!(Float::REPO_ID, "IDL:sigplane/dataFloat:1.0");
    }

    #[test]
    fn numeric_encoding_is_little_endian() {
        let buffer = SharedBuffer::from(vec![0x0102i16, -2]);
        let mut bytes = vec![0u8; Short::wire_len(&buffer)];
        Short::encode(&buffer, &mut bytes);
        assert_eq!(bytes, vec![0x02, 0x01, 0xFE, 0xFF]);
        assert_eq!(roundtrip::<Short>(&buffer), buffer);
    }

    #[test]
    fn decode_rejects_length_mismatch() {
        assert!(Float::decode(&[0u8; 7], 2).is_none());
        assert!(Bit::decode(&[0u8; 2], 7).is_none());
        assert!(Xml::decode(b"<a/>", 3).is_none());
    }

    #[test]
    fn bit_slices_realign() {
        let bits = BitBuffer::from_bools(&[true, true, false, true, false, false, true, true, true]);
        let tail = Bit::slice(&bits, 3, 9);
        assert_eq!(Bit::wire_len(&tail), 1);
        assert_eq!(roundtrip::<Bit>(&tail), tail);
    }

    #[test]
    fn text_payloads() {
        let doc = "<sig rate=\"1e6\"/>".to_string();
        assert_eq!(Xml::element_count(&doc), doc.len());
        assert_eq!(roundtrip::<Xml>(&doc), doc);
        assert_eq!(File::slice(&"file:///tmp/x".to_string(), 0, 100), "file:///tmp/x");
    }
}
