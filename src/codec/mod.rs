//! Value and key-time encodings.
//!
//! This module provides:
//! - [`ValueCodec`] - Fixed-size encode/decode strategy for one value type
//! - [`RotationFormat`] / [`VectorFormat`] - The concrete quantizers
//! - [`KeyTimeFormat`] / [`TimeSource`] - Time axis widths and sharing
//! - [`EncodedChannel`] - A channel's encoded value and time buffers
//! - [`select_format`] - Smallest-output format trial

mod rotation;
mod vector;
mod key_times;
mod select;

pub use rotation::RotationFormat;
pub use vector::VectorFormat;
pub use key_times::{KeyTimeFormat, TimeSource};
pub use select::{select_format, Selection};

use smallvec::SmallVec;

use crate::core::{Channel, ChannelKind, CurveValue, Tick};
use crate::util::{Error, Quat, Result, Vec3};

/// Fixed-size encoding of one curve value.
pub trait ValueCodec: Copy + std::fmt::Debug + Send + Sync {
    type Value: CurveValue;

    /// Tag written to chunk headers.
    fn tag(self) -> u16;

    /// Encoded size of one value.
    fn byte_size(self) -> usize;

    /// Width of the words swapped on byte order conversion.
    fn word_size(self) -> usize;

    /// Encode one value little-endian.
    fn encode(self, value: Self::Value) -> SmallVec<[u8; 16]>;

    /// Decode one value from exactly `byte_size` bytes.
    fn decode(self, bytes: &[u8]) -> Self::Value;

    /// Value as it reads back after encoding.
    #[inline]
    fn round_trip(self, value: Self::Value) -> Self::Value {
        self.decode(&self.encode(value))
    }

    fn encode_all(self, values: &[Self::Value]) -> Vec<u8> {
        let mut out = Vec::with_capacity(values.len() * self.byte_size());
        for &v in values {
            out.extend_from_slice(&self.encode(v));
        }
        out
    }

    fn decode_all(self, bytes: &[u8], count: usize) -> Result<Vec<Self::Value>> {
        let size = self.byte_size();
        let needed = count * size;
        if bytes.len() < needed {
            return Err(Error::TruncatedChunk { needed, available: bytes.len() });
        }
        Ok(bytes[..needed].chunks_exact(size).map(|b| self.decode(b)).collect())
    }
}

/// Value format of an encoded channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    Rotation(RotationFormat),
    Vector(VectorFormat),
}

impl ValueFormat {
    /// Resolve a header tag for the given channel kind.
    pub fn from_tag(kind: ChannelKind, tag: u16) -> Result<Self> {
        match kind {
            ChannelKind::Rotation => RotationFormat::from_tag(tag).map(Self::Rotation),
            ChannelKind::Position | ChannelKind::Scale => VectorFormat::from_tag(tag).map(Self::Vector),
        }
    }

    pub fn tag(self) -> u16 {
        match self {
            Self::Rotation(f) => f.tag(),
            Self::Vector(f) => f.tag(),
        }
    }

    pub fn byte_size(self) -> usize {
        match self {
            Self::Rotation(f) => f.byte_size(),
            Self::Vector(f) => f.byte_size(),
        }
    }

    pub fn word_size(self) -> usize {
        match self {
            Self::Rotation(f) => f.word_size(),
            Self::Vector(f) => f.word_size(),
        }
    }
}

/// Key times of an encoded channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimeAxis {
    /// Own little-endian time buffer.
    Own { format: KeyTimeFormat, bytes: Vec<u8> },
    /// Reuses the axis of another channel of the same track.
    Shares(ChannelKind),
}

impl TimeAxis {
    pub fn source(&self) -> TimeSource {
        match self {
            Self::Own { .. } => TimeSource::Own,
            Self::Shares(kind) => TimeSource::shares(*kind),
        }
    }
}

/// Encoded values and time axis of one channel.
///
/// Buffers are little-endian; writers swap them for big-endian output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedChannel {
    pub kind: ChannelKind,
    pub format: ValueFormat,
    pub count: u32,
    pub values: Vec<u8>,
    pub times: TimeAxis,
}

impl EncodedChannel {
    /// Encode decimated keys with their own time axis.
    pub fn encode<C: ValueCodec>(
        kind: ChannelKind,
        codec: C,
        format: ValueFormat,
        times: &[Tick],
        values: &[C::Value],
    ) -> Result<Self> {
        crate::core::ensure_ascending(times)?;
        let time_format = KeyTimeFormat::narrowest(times);
        Ok(Self {
            kind,
            format,
            count: u32::try_from(values.len())
                .map_err(|_| Error::format(format!("{kind} channel has too many keys")))?,
            values: codec.encode_all(values),
            times: TimeAxis::Own { format: time_format, bytes: time_format.encode(times)? },
        })
    }

    pub fn encode_rotation(format: RotationFormat, times: &[Tick], values: &[Quat]) -> Result<Self> {
        Self::encode(ChannelKind::Rotation, format, ValueFormat::Rotation(format), times, values)
    }

    pub fn encode_vector(
        kind: ChannelKind,
        format: VectorFormat,
        times: &[Tick],
        values: &[Vec3],
    ) -> Result<Self> {
        Self::encode(kind, format, ValueFormat::Vector(format), times, values)
    }

    /// Decode this channel's own time axis.
    pub fn own_times(&self) -> Option<Result<Vec<Tick>>> {
        match &self.times {
            TimeAxis::Own { format, bytes } => Some(format.decode(bytes, self.count as usize)),
            TimeAxis::Shares(_) => None,
        }
    }

    /// Drop the own time buffer and point at another channel's axis.
    pub fn share_times_with(&mut self, kind: ChannelKind) {
        self.times = TimeAxis::Shares(kind);
    }

    pub fn decode_rotations(&self) -> Result<Vec<Quat>> {
        match self.format {
            ValueFormat::Rotation(f) => f.decode_all(&self.values, self.count as usize),
            ValueFormat::Vector(f) => Err(Error::UnsupportedFormat { kind: "rotation", tag: f.tag() }),
        }
    }

    pub fn decode_vectors(&self) -> Result<Vec<Vec3>> {
        match self.format {
            ValueFormat::Vector(f) => f.decode_all(&self.values, self.count as usize),
            ValueFormat::Rotation(f) => Err(Error::UnsupportedFormat { kind: "vector", tag: f.tag() }),
        }
    }

    /// Encoded size including the own time axis.
    pub fn encoded_size(&self) -> usize {
        let times = match &self.times {
            TimeAxis::Own { bytes, .. } => bytes.len(),
            TimeAxis::Shares(_) => 0,
        };
        self.values.len() + times
    }
}

/// Build a decoded channel from parallel arrays, checking values.
pub(crate) fn checked_channel<V: CurveValue>(times: Vec<Tick>, values: Vec<V>) -> Result<Channel<V>> {
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::format(format!("non-finite value at key {i}")));
    }
    Channel::new(times, values)
}
