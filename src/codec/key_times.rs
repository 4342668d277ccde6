//! Key time axes.
//!
//! Each channel stores its key ticks in the narrowest width that holds
//! them, or refers to an identical axis stored by an earlier channel.

use serde::{Deserialize, Serialize};

use crate::core::{ChannelKind, Tick, MAX_EXACT_F32_TICK};
use crate::util::{Error, Result};

/// Storage width of a time axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTimeFormat {
    F32,
    UInt16,
    Byte,
}

impl KeyTimeFormat {
    pub const fn tag(self) -> u8 {
        match self {
            Self::F32 => 0,
            Self::UInt16 => 1,
            Self::Byte => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::F32),
            1 => Ok(Self::UInt16),
            2 => Ok(Self::Byte),
            _ => Err(Error::UnsupportedFormat { kind: "key time", tag: tag.into() }),
        }
    }

    pub const fn byte_size(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::UInt16 => 2,
            Self::Byte => 1,
        }
    }

    /// Narrowest width that stores every tick exactly.
    pub fn narrowest(times: &[Tick]) -> Self {
        let (lo, hi) = times
            .iter()
            .fold((0, 0), |(lo, hi), &t| (Tick::min(lo, t), Tick::max(hi, t)));
        if lo < 0 {
            Self::F32
        } else if hi <= u8::MAX as Tick {
            Self::Byte
        } else if hi <= u16::MAX as Tick {
            Self::UInt16
        } else {
            Self::F32
        }
    }

    /// Encode ticks as a little-endian buffer.
    pub fn encode(self, times: &[Tick]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(times.len() * self.byte_size());
        for &t in times {
            match self {
                Self::Byte => out.push(narrow::<u8>(t)?),
                Self::UInt16 => out.extend_from_slice(&narrow::<u16>(t)?.to_le_bytes()),
                Self::F32 => {
                    if t.unsigned_abs() > MAX_EXACT_F32_TICK {
                        return Err(Error::format(format!("tick {t} not exact as f32")));
                    }
                    out.extend_from_slice(&(t as f32).to_le_bytes());
                }
            }
        }
        Ok(out)
    }

    /// Decode `count` ticks from a little-endian buffer.
    pub fn decode(self, bytes: &[u8], count: usize) -> Result<Vec<Tick>> {
        let needed = count * self.byte_size();
        if bytes.len() < needed {
            return Err(Error::TruncatedChunk { needed, available: bytes.len() });
        }
        let bytes = &bytes[..needed];
        Ok(match self {
            Self::Byte => bytes.iter().map(|&b| Tick::from(b)).collect(),
            Self::UInt16 => bytes
                .chunks_exact(2)
                .map(|c| Tick::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
            Self::F32 => bytes
                .chunks_exact(4)
                .map(|c| {
                    let t = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                    if !t.is_finite() || t.fract() != 0.0 || t.abs() > MAX_EXACT_F32_TICK as f32 {
                        return Err(Error::format(format!("invalid key time {t}")));
                    }
                    Ok(t as Tick)
                })
                .collect::<Result<_>>()?,
        })
    }
}

fn narrow<T: TryFrom<Tick>>(t: Tick) -> Result<T> {
    T::try_from(t).map_err(|_| Error::format(format!("tick {t} out of range for key time format")))
}

/// Where a channel's key times come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeSource {
    /// Channel absent.
    None,
    /// Channel stores its own axis.
    Own,
    SharesRotation,
    SharesPosition,
}

impl TimeSource {
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Own => 1,
            Self::SharesRotation => 2,
            Self::SharesPosition => 3,
        }
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Own),
            2 => Ok(Self::SharesRotation),
            3 => Ok(Self::SharesPosition),
            _ => Err(Error::UnsupportedFormat { kind: "time source", tag: v.into() }),
        }
    }

    pub const fn shares(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Rotation => Self::SharesRotation,
            ChannelKind::Position | ChannelKind::Scale => Self::SharesPosition,
        }
    }

    /// Channel whose axis is reused, if any.
    pub const fn shared_kind(self) -> Option<ChannelKind> {
        match self {
            Self::SharesRotation => Some(ChannelKind::Rotation),
            Self::SharesPosition => Some(ChannelKind::Position),
            Self::None | Self::Own => None,
        }
    }
}
