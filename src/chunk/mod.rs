//! Versioned controller chunks and the clip container.
//!
//! A controller chunk holds the curves of one joint in one of four
//! layouts (see [`ChunkVersion`]). Parsing a chunk is lossless: writing a
//! parsed chunk back with the same version and byte order reproduces the
//! original bytes. Decoding turns a chunk into a [`Track`], dropping only
//! the channels whose data is invalid.

mod format;
mod stream;
mod reader;
mod writer;
mod container;

pub use format::*;
pub use stream::{ByteCursor, ByteWriter};
pub use reader::{read_chunk, read_motion_params, read_track};
pub use writer::{write_chunk, write_motion_params};
pub use container::{read_clip, write_clip, write_clip_to, ClipRead, CompressedClip, ContainerSource};

use smallvec::SmallVec;
use tracing::warn;

use crate::codec::{checked_channel, EncodedChannel, TimeAxis};
use crate::compress::{extract, legacy_rotation, legacy_ticks, RawTrack, SeparatedKeys};
use crate::core::{ensure_ascending, ChannelKind, Tick, Track, LEGACY_POSITION_SCALE, LEGACY_TICKS_PER_KEY};
use crate::util::{Error, Result};

/// Legacy combined controller.
#[derive(Clone, Debug, PartialEq)]
pub struct LegacyController {
    pub controller_id: u32,
    pub keys: Vec<LegacyKey>,
}

/// Controller with independently encoded channels.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitController {
    pub controller_id: u32,
    /// Channel blocks start on 4-byte boundaries. Always set for
    /// [`ChunkVersion::SplitV2`].
    pub tracks_aligned: bool,
    pub rotation: Option<EncodedChannel>,
    pub position: Option<EncodedChannel>,
    pub scale: Option<EncodedChannel>,
}

impl SplitController {
    pub fn new(controller_id: u32) -> Self {
        Self { controller_id, tracks_aligned: true, rotation: None, position: None, scale: None }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&EncodedChannel> {
        match kind {
            ChannelKind::Rotation => self.rotation.as_ref(),
            ChannelKind::Position => self.position.as_ref(),
            ChannelKind::Scale => self.scale.as_ref(),
        }
    }

    /// Present channels in storage order.
    pub fn channels(&self) -> impl Iterator<Item = &EncodedChannel> {
        [&self.rotation, &self.position, &self.scale].into_iter().flatten()
    }

    /// Point later channels at earlier identical time axes.
    pub fn share_time_axes(&mut self) -> Result<()> {
        let rot_times = match &self.rotation {
            Some(ch) => ch.own_times().transpose()?,
            None => None,
        };
        let pos_times = match &self.position {
            Some(ch) => ch.own_times().transpose()?,
            None => None,
        };
        if let (Some(pos), Some(rt)) = (self.position.as_mut(), rot_times.as_ref()) {
            if pos_times.as_ref() == Some(rt) {
                pos.share_times_with(ChannelKind::Rotation);
            }
        }
        if let Some(scale) = self.scale.as_mut() {
            let scale_times = scale.own_times().transpose()?;
            if scale_times.is_some() && scale_times == rot_times {
                scale.share_times_with(ChannelKind::Rotation);
            } else if scale_times.is_some() && scale_times == pos_times {
                scale.share_times_with(ChannelKind::Position);
            }
        }
        Ok(())
    }
}

/// Flat per-sample controller.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatController {
    pub controller_id: u32,
    pub keys: Vec<FlatKey>,
}

/// A parsed controller chunk of any supported version.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerChunk {
    LegacyCombined(LegacyController),
    SplitV1(SplitController),
    SplitV2(SplitController),
    FlatPerSample(FlatController),
}

/// Track decoded from a chunk plus the channels that had to be dropped.
#[derive(Debug)]
pub struct DecodedTrack {
    pub track: Track,
    pub dropped: Vec<(ChannelKind, Error)>,
}

impl ControllerChunk {
    pub fn version(&self) -> ChunkVersion {
        match self {
            Self::LegacyCombined(_) => ChunkVersion::LegacyCombined,
            Self::SplitV1(_) => ChunkVersion::SplitV1,
            Self::SplitV2(_) => ChunkVersion::SplitV2,
            Self::FlatPerSample(_) => ChunkVersion::FlatPerSample,
        }
    }

    pub fn controller_id(&self) -> u32 {
        match self {
            Self::LegacyCombined(c) => c.controller_id,
            Self::SplitV1(c) | Self::SplitV2(c) => c.controller_id,
            Self::FlatPerSample(c) => c.controller_id,
        }
    }

    /// Rebuild the joint's channels.
    ///
    /// Combined layouts fail as a whole; split layouts drop only the
    /// channels whose values or times are invalid.
    pub fn decode(&self) -> Result<DecodedTrack> {
        match self {
            Self::LegacyCombined(c) => {
                // stored times are absolute; repeats are an error here, not merged
                let raw: Vec<Tick> = c.keys.iter().map(|k| k.time).collect();
                ensure_ascending(&raw)?;
                let times = legacy_ticks(&raw, 0, LEGACY_TICKS_PER_KEY)?;
                ensure_ascending(&times)?;
                let rotations = c.keys.iter().map(|k| legacy_rotation(k.rotation_log)).collect();
                let positions = c.keys.iter().map(|k| k.position * LEGACY_POSITION_SCALE).collect();
                let raw = RawTrack::Separated(SeparatedKeys {
                    controller_id: c.controller_id,
                    rotation: Some((times.clone(), rotations)),
                    position: Some((times, positions)),
                    scale: None,
                });
                Ok(DecodedTrack { track: extract(&raw)?, dropped: Vec::new() })
            }
            Self::SplitV1(c) | Self::SplitV2(c) => Ok(decode_split(c)),
            Self::FlatPerSample(c) => {
                let rotations = c.keys.iter().map(|k| k.rotation().normalize()).collect();
                let positions = c.keys.iter().map(FlatKey::position).collect();
                let scales = c.keys.iter().map(FlatKey::scale).collect();
                let times: Vec<Tick> = (0..c.keys.len() as Tick).collect();
                let track = Track::new(c.controller_id)
                    .with_rotation(checked_channel(times.clone(), rotations)?)
                    .with_position(checked_channel(times.clone(), positions)?)
                    .with_scale(checked_channel(times, scales)?);
                Ok(DecodedTrack { track, dropped: Vec::new() })
            }
        }
    }
}

fn resolve_times(
    ch: &EncodedChannel,
    axes: &[(ChannelKind, Vec<Tick>)],
) -> Result<Vec<Tick>> {
    match &ch.times {
        TimeAxis::Own { format, bytes } => format.decode(bytes, ch.count as usize),
        TimeAxis::Shares(kind) => {
            let (_, times) = axes.iter().find(|(k, _)| k == kind).ok_or_else(|| {
                Error::format(format!("{} shares missing {kind} time axis", ch.kind))
            })?;
            if times.len() != ch.count as usize {
                return Err(Error::CorruptData { declared: ch.count as usize, available: times.len() });
            }
            Ok(times.clone())
        }
    }
}

fn decode_split(c: &SplitController) -> DecodedTrack {
    let mut track = Track::new(c.controller_id);
    let mut dropped = Vec::new();
    let mut axes: SmallVec<[(ChannelKind, Vec<Tick>); 3]> = SmallVec::new();

    for ch in c.channels() {
        let decoded = resolve_times(ch, &axes).and_then(|times| {
            axes.push((ch.kind, times.clone()));
            match ch.kind {
                ChannelKind::Rotation => {
                    let values = ch.decode_rotations()?.into_iter().map(|q| q.normalize()).collect();
                    track.rotation = Some(checked_channel(times, values)?);
                }
                ChannelKind::Position => {
                    track.position = Some(checked_channel(times, ch.decode_vectors()?)?);
                }
                ChannelKind::Scale => {
                    track.scale = Some(checked_channel(times, ch.decode_vectors()?)?);
                }
            }
            Ok(())
        });
        if let Err(e) = decoded {
            warn!(controller = c.controller_id, channel = %ch.kind, error = %e, "dropping channel");
            dropped.push((ch.kind, e));
        }
    }
    DecodedTrack { track, dropped }
}
