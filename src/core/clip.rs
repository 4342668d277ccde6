//! Clips, per-joint tracks and clip-level motion metadata.

use std::fmt;

use super::channel::{Channel, PositionChannel, RotationChannel, ScaleChannel};
use super::time::{Tick, SECONDS_PER_TICK};
use crate::util::Transform;

// ============================================================================
// Channel kinds
// ============================================================================

/// The three curve kinds a joint track can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelKind {
    Rotation,
    Position,
    Scale,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 3] = [Self::Rotation, Self::Position, Self::Scale];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::Position => "position",
            Self::Scale => "scale",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Track
// ============================================================================

/// Up to three channels for one joint, keyed by controller id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    pub controller_id: u32,
    pub rotation: Option<RotationChannel>,
    pub position: Option<PositionChannel>,
    pub scale: Option<ScaleChannel>,
}

impl Track {
    pub fn new(controller_id: u32) -> Self {
        Self { controller_id, ..Default::default() }
    }

    pub fn with_rotation(mut self, channel: RotationChannel) -> Self {
        self.rotation = Some(channel);
        self
    }

    pub fn with_position(mut self, channel: PositionChannel) -> Self {
        self.position = Some(channel);
        self
    }

    pub fn with_scale(mut self, channel: ScaleChannel) -> Self {
        self.scale = Some(channel);
        self
    }

    pub fn has(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Rotation => self.rotation.is_some(),
            ChannelKind::Position => self.position.is_some(),
            ChannelKind::Scale => self.scale.is_some(),
        }
    }

    /// Number of keys in a channel, zero when absent.
    pub fn key_count(&self, kind: ChannelKind) -> usize {
        match kind {
            ChannelKind::Rotation => self.rotation.as_ref().map_or(0, Channel::len),
            ChannelKind::Position => self.position.as_ref().map_or(0, Channel::len),
            ChannelKind::Scale => self.scale.as_ref().map_or(0, Channel::len),
        }
    }

    pub fn remove(&mut self, kind: ChannelKind) {
        match kind {
            ChannelKind::Rotation => self.rotation = None,
            ChannelKind::Position => self.position = None,
            ChannelKind::Scale => self.scale = None,
        }
    }

    /// True when no channel is left.
    pub fn is_empty(&self) -> bool {
        self.rotation.is_none() && self.position.is_none() && self.scale.is_none()
    }

    /// First and last tick over all channels.
    pub fn key_range(&self) -> Option<(Tick, Tick)> {
        let ranges = [
            self.rotation.as_ref().and_then(|c| Some((c.first()?.0, c.last()?.0))),
            self.position.as_ref().and_then(|c| Some((c.first()?.0, c.last()?.0))),
            self.scale.as_ref().and_then(|c| Some((c.first()?.0, c.last()?.0))),
        ];
        merge_ranges(ranges.into_iter().flatten())
    }
}

fn merge_ranges(ranges: impl Iterator<Item = (Tick, Tick)>) -> Option<(Tick, Tick)> {
    ranges.reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))
}

// ============================================================================
// Motion parameters
// ============================================================================

bitflags::bitflags! {
    /// Clip-level asset flags.
    ///
    /// Unknown bits read from a container are retained so a rewrite stays
    /// byte-identical.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AssetFlags: u32 {
        const ADDITIVE = 0x0001;
        const CYCLIC = 0x0002;
        const BIG_ENDIAN = 0x0004;
        const CREATED = 0x0008;
    }
}

/// Clip metadata derived during compression and stored alongside the curves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionParams {
    pub flags: AssetFlags,
    pub ticks_per_frame: i32,
    pub seconds_per_tick: f32,
    pub start_tick: Tick,
    pub end_tick: Tick,
    /// Root travel speed in metres per second.
    pub speed: f32,
    /// Root heading change in radians per second.
    pub turn_speed: f32,
    /// Total root heading change in radians.
    pub asset_turn: f32,
    /// Root travel distance in metres.
    pub distance: f32,
    /// Pitch of the root travel direction in radians.
    pub slope: f32,
    /// Root location at the first tick. Scale is not persisted.
    pub start_location: Transform,
    /// Root location at the last tick. Scale is not persisted.
    pub end_location: Transform,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            flags: AssetFlags::empty(),
            ticks_per_frame: 1,
            seconds_per_tick: SECONDS_PER_TICK,
            start_tick: 0,
            end_tick: 0,
            speed: 0.0,
            turn_speed: 0.0,
            asset_turn: 0.0,
            distance: 0.0,
            slope: 0.0,
            start_location: Transform::IDENTITY,
            end_location: Transform::IDENTITY,
        }
    }
}

impl MotionParams {
    /// Clip length in seconds.
    pub fn duration(&self) -> f32 {
        (self.end_tick - self.start_tick) as f32 * self.seconds_per_tick
    }
}

// ============================================================================
// Clip
// ============================================================================

/// Ordered joint tracks plus clip metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub params: MotionParams,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    #[inline]
    pub fn is_additive(&self) -> bool {
        self.params.flags.contains(AssetFlags::ADDITIVE)
    }

    pub fn track(&self, controller_id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.controller_id == controller_id)
    }

    pub fn track_mut(&mut self, controller_id: u32) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.controller_id == controller_id)
    }

    /// First and last tick over all tracks.
    pub fn key_range(&self) -> Option<(Tick, Tick)> {
        merge_ranges(self.tracks.iter().filter_map(Track::key_range))
    }

    /// Set start/end ticks from the keys present.
    pub fn fit_time_range(&mut self) {
        if let Some((start, end)) = self.key_range() {
            self.params.start_tick = start;
            self.params.end_tick = end;
        }
    }

    /// Total number of keys over all channels.
    pub fn key_count(&self) -> usize {
        self.tracks
            .iter()
            .map(|t| ChannelKind::ALL.iter().map(|&k| t.key_count(k)).sum::<usize>())
            .sum()
    }
}
