//! Clip compression pipeline.
//!
//! Per clip: policy check, cycle detection and motion evaluation, channel
//! deletion, additive re-basing, then per-channel format trial and time
//! axis sharing for split layouts or dense resampling for the combined
//! ones. Clips are independent; [`compress_batch`] runs one per worker.

use rayon::prelude::*;
use tracing::{debug, warn};

use super::base_frame::{compute_base, rebase, BaseFrame};
use super::eligibility::{classify, Eligibility, JointContext, ReferenceMode};
use super::motion::{detect_cycle, evaluate_motion};
use super::root_motion::replace_root_by_locator;
use crate::chunk::{
    ChunkVersion, CompressedClip, ControllerChunk, FlatController, FlatKey, LegacyController,
    LegacyKey, SplitController,
};
use crate::codec::{select_format, EncodedChannel, ValueCodec, ValueFormat};
use crate::core::{
    AnimationClip, AssetFlags, Channel, ChannelKind, CompressionConfig, CurveValue, JointPolicy,
    PolicyProvider, ProcessingMode, SkeletonProvider, Tick, Track, LEGACY_POSITION_SCALE,
    LEGACY_TICKS_PER_KEY,
};
use crate::util::{quat_log, Error, Quat, Result, Transform, Vec3};

/// Outcome class of one clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipStatus {
    Success,
    SuccessWithWarnings,
    Failed,
}

/// Key and channel counts before and after compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompressionStats {
    pub tracks_in: usize,
    pub tracks_out: usize,
    pub channels_deleted: usize,
    pub keys_in: usize,
    pub keys_out: usize,
}

/// Result and diagnostics of compressing one clip.
#[derive(Debug)]
pub struct ClipReport {
    pub name: String,
    pub result: Result<CompressedClip>,
    pub stats: CompressionStats,
    pub warnings: Vec<String>,
}

impl ClipReport {
    pub fn status(&self) -> ClipStatus {
        match (&self.result, self.warnings.is_empty()) {
            (Err(_), _) => ClipStatus::Failed,
            (Ok(_), true) => ClipStatus::Success,
            (Ok(_), false) => ClipStatus::SuccessWithWarnings,
        }
    }
}

/// Warnings are logged as they are raised and kept for the report.
#[derive(Default)]
struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    fn warn(&mut self, msg: String) {
        warn!("{msg}");
        self.warnings.push(msg);
    }
}

/// Compress one clip.
pub fn compress_clip(
    clip: &AnimationClip,
    skeleton: &dyn SkeletonProvider,
    config: &CompressionConfig,
) -> ClipReport {
    let _span = tracing::debug_span!("compress_clip", clip = %clip.name).entered();
    let mut diag = Diagnostics::default();
    let mut stats = CompressionStats {
        tracks_in: clip.tracks.len(),
        keys_in: clip.key_count(),
        ..Default::default()
    };
    let result = run(clip, skeleton, config, &mut diag, &mut stats);
    match &result {
        Ok(_) => debug!(
            keys_in = stats.keys_in,
            keys_out = stats.keys_out,
            deleted = stats.channels_deleted,
            "clip compressed"
        ),
        Err(e) => warn!(error = %e, "clip failed"),
    }
    ClipReport { name: clip.name.clone(), result, stats, warnings: diag.warnings }
}

/// Compress clips in parallel, one report per clip in input order.
pub fn compress_batch(
    clips: &[AnimationClip],
    skeleton: &(dyn SkeletonProvider + Sync),
    config: &CompressionConfig,
) -> Vec<ClipReport> {
    clips.par_iter().map(|clip| compress_clip(clip, skeleton, config)).collect()
}

fn run(
    source: &AnimationClip,
    skeleton: &dyn SkeletonProvider,
    config: &CompressionConfig,
    diag: &mut Diagnostics,
    stats: &mut CompressionStats,
) -> Result<CompressedClip> {
    config.validate()?;
    for msg in config.policies.unmatched_rules(skeleton) {
        diag.warn(msg);
    }

    let mut clip = source.clone();
    if clip.params.end_tick <= clip.params.start_tick {
        clip.fit_time_range();
    }
    if let Some(locator) = &config.root_motion_joint {
        for msg in replace_root_by_locator(&mut clip, skeleton, locator) {
            diag.warn(msg);
        }
    }
    clip.params.flags.insert(AssetFlags::CREATED);
    clip.params.flags.set(AssetFlags::BIG_ENDIAN, config.endianness.is_big());
    if config.detect_cycles {
        clip.params.flags.set(AssetFlags::CYCLIC, detect_cycle(&clip, skeleton));
    }
    let mut params = clip.params;
    for msg in evaluate_motion(&clip, skeleton, &mut params) {
        diag.warn(msg);
    }

    let additive = clip.is_additive();
    let mut prepared = Vec::with_capacity(clip.tracks.len());
    for track in clip.tracks {
        if let Some(p) = prepare_track(track, skeleton, config, additive, diag, stats)? {
            prepared.push(p);
        }
    }
    if additive {
        params.start_tick += 1;
    }

    let version = config.chunk_version;
    let mut controllers = Vec::with_capacity(prepared.len());
    for p in &prepared {
        if !version.supports_scale() && p.track.scale.is_some() {
            diag.warn(format!(
                "controller {:#010x}: {version:?} cannot store scale, channel dropped",
                p.track.controller_id
            ));
        }
        let chunk = match version {
            ChunkVersion::SplitV1 | ChunkVersion::SplitV2 => {
                let split = encode_split(p, config, diag)?;
                stats.keys_out += split.channels().map(|c| c.count as usize).sum::<usize>();
                if version == ChunkVersion::SplitV1 {
                    ControllerChunk::SplitV1(split)
                } else {
                    ControllerChunk::SplitV2(split)
                }
            }
            ChunkVersion::FlatPerSample => {
                let flat = encode_flat(p, params.start_tick, params.end_tick);
                stats.keys_out += flat.keys.len() * 3;
                ControllerChunk::FlatPerSample(flat)
            }
            ChunkVersion::LegacyCombined => {
                let legacy = encode_legacy(p, params.start_tick, params.end_tick)?;
                stats.keys_out += legacy.keys.len() * 2;
                ControllerChunk::LegacyCombined(legacy)
            }
        };
        controllers.push(chunk);
    }
    stats.tracks_out = controllers.len();

    Ok(CompressedClip { name: clip.name, params, controllers })
}

// ============================================================================
// Per-track preparation
// ============================================================================

/// A track after deletion and re-basing, plus what deleted channels read as.
struct PreparedTrack {
    track: Track,
    policy: JointPolicy,
    fill: Transform,
}

fn reference_mode<V: CurveValue>(
    additive: bool,
    mode: ProcessingMode,
    base: Option<V>,
    bind: Option<V>,
) -> ReferenceMode<V> {
    match (additive, mode, bind) {
        (true, _, _) => ReferenceMode::Additive { base: base.unwrap_or(V::IDENTITY) },
        (false, ProcessingMode::Override, Some(bind_pose)) => ReferenceMode::Override { bind_pose },
        _ => ReferenceMode::Standard,
    }
}

/// Value a deleted channel decodes to: `neutral` for additive deltas, the
/// bind pose under override, the channel's own first value otherwise.
fn fill_value<V: CurveValue>(channel: &Channel<V>, mode: ReferenceMode<V>, neutral: V) -> V {
    match mode {
        ReferenceMode::Additive { .. } => neutral,
        ReferenceMode::Override { bind_pose } => bind_pose,
        ReferenceMode::Standard => channel.first().map_or(neutral, |(_, v)| v),
    }
}

fn prune<V: CurveValue>(
    slot: &mut Option<Channel<V>>,
    joint: Option<JointContext>,
    policy: &JointPolicy,
    kind: ChannelKind,
    mode: ReferenceMode<V>,
    fill: &mut V,
) -> bool {
    let Some(channel) = slot.as_ref() else {
        return false;
    };
    if classify(channel, joint, &policy.channel(kind).delete, mode) == Eligibility::Keep {
        return false;
    }
    *fill = fill_value(channel, mode, *fill);
    *slot = None;
    true
}

fn prepare_track(
    mut track: Track,
    skeleton: &dyn SkeletonProvider,
    config: &CompressionConfig,
    additive: bool,
    diag: &mut Diagnostics,
    stats: &mut CompressionStats,
) -> Result<Option<PreparedTrack>> {
    let id = track.controller_id;
    let Some(index) = skeleton.joint_index(id) else {
        diag.warn(format!("controller {id:#010x} drives no joint, track dropped"));
        return Ok(None);
    };
    let joint = Some(JointContext { index, is_root: skeleton.is_root(index) });
    let name = skeleton.joint_name(index).unwrap_or_default();
    let policy = config.policies.policy_for(name).clone();
    let bind = skeleton.bind_pose(index);
    let base = if additive { compute_base(&track)? } else { BaseFrame::default() };
    if base.scale_clamped {
        diag.warn(format!("joint '{name}': zero base scale clamped to one"));
    }

    let mut fill = Transform::IDENTITY;
    let deleted = [
        prune(
            &mut track.rotation,
            joint,
            &policy,
            ChannelKind::Rotation,
            reference_mode(additive, config.mode, base.rotation, bind.map(|b| b.rotation)),
            &mut fill.rotation,
        ),
        prune(
            &mut track.position,
            joint,
            &policy,
            ChannelKind::Position,
            reference_mode(additive, config.mode, base.position, bind.map(|b| b.position)),
            &mut fill.position,
        ),
        prune(
            &mut track.scale,
            joint,
            &policy,
            ChannelKind::Scale,
            reference_mode(additive, config.mode, base.scale, bind.map(|b| b.scale)),
            &mut fill.scale,
        ),
    ];
    stats.channels_deleted += deleted.iter().filter(|&&d| d).count();

    if additive {
        rebase(&mut track, &base)?;
    }
    if track.is_empty() {
        debug!(joint = name, "every channel deleted");
        return Ok(None);
    }
    Ok(Some(PreparedTrack { track, policy, fill }))
}

// ============================================================================
// Split layouts
// ============================================================================

fn encode_channel<C: ValueCodec>(
    channel: &Channel<C::Value>,
    kind: ChannelKind,
    tolerance: f32,
    candidates: &[C],
    to_format: impl Fn(C) -> ValueFormat,
    id: u32,
    diag: &mut Diagnostics,
) -> Result<EncodedChannel> {
    let sel = select_format(channel, tolerance, candidates)?;
    if let Some(msg) = sel.warning {
        // already logged by the trial
        diag.warnings.push(format!("controller {id:#010x} {kind}: {msg}"));
    }
    EncodedChannel::encode(kind, sel.format, to_format(sel.format), &sel.times, &sel.values)
}

fn encode_split(p: &PreparedTrack, config: &CompressionConfig, diag: &mut Diagnostics) -> Result<SplitController> {
    let id = p.track.controller_id;
    let mut c = SplitController::new(id);
    c.tracks_aligned = config.align_tracks || config.chunk_version == ChunkVersion::SplitV2;

    if let Some(ch) = &p.track.rotation {
        c.rotation = Some(encode_channel(
            ch,
            ChannelKind::Rotation,
            p.policy.rotation.tolerance,
            &config.rotation_formats,
            ValueFormat::Rotation,
            id,
            diag,
        )?);
    }
    if let Some(ch) = &p.track.position {
        c.position = Some(encode_channel(
            ch,
            ChannelKind::Position,
            p.policy.position.tolerance,
            &config.position_formats,
            ValueFormat::Vector,
            id,
            diag,
        )?);
    }
    if let Some(ch) = p.track.scale.as_ref().filter(|_| config.chunk_version.supports_scale()) {
        c.scale = Some(encode_channel(
            ch,
            ChannelKind::Scale,
            p.policy.scale.tolerance,
            &config.scale_formats,
            ValueFormat::Vector,
            id,
            diag,
        )?);
    }
    c.share_time_axes()?;
    Ok(c)
}

// ============================================================================
// Dense layouts
// ============================================================================

fn sample_or<V: CurveValue>(channel: &Option<Channel<V>>, tick: Tick, fill: V) -> V {
    channel.as_ref().and_then(|c| c.sample(tick)).unwrap_or(fill)
}

fn dense_ticks(start: Tick, end: Tick) -> impl Iterator<Item = Tick> {
    start..=end.max(start)
}

fn encode_flat(p: &PreparedTrack, start: Tick, end: Tick) -> FlatController {
    let t = &p.track;
    let keys = dense_ticks(start, end)
        .map(|tick| {
            FlatKey::new(
                sample_or(&t.rotation, tick, p.fill.rotation),
                sample_or(&t.position, tick, p.fill.position),
                sample_or(&t.scale, tick, p.fill.scale),
            )
        })
        .collect();
    FlatController { controller_id: t.controller_id, keys }
}

/// Legacy keys carry absolute raw ticks.
fn encode_legacy(p: &PreparedTrack, start: Tick, end: Tick) -> Result<LegacyController> {
    let t = &p.track;
    let keys = dense_ticks(start, end)
        .map(|tick| {
            let time = tick.checked_mul(LEGACY_TICKS_PER_KEY).ok_or_else(|| {
                Error::WriteFailed(format!("tick {tick} exceeds the legacy time range"))
            })?;
            let rotation: Quat = sample_or(&t.rotation, tick, p.fill.rotation);
            let position: Vec3 = sample_or(&t.position, tick, p.fill.position);
            Ok(LegacyKey {
                time,
                position: position / LEGACY_POSITION_SCALE,
                rotation_log: quat_log(rotation.conjugate()),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LegacyController { controller_id: t.controller_id, keys })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::VectorFormat;
    use crate::core::{controller_id_for, DeletePolicy, Skeleton};
    use crate::util::Error;

    fn rig() -> Skeleton {
        let mut s = Skeleton::new();
        s.add_joint("root", None, Transform::IDENTITY).unwrap();
        s.add_joint("spine", Some(0), Transform::from_rotation_translation(Quat::IDENTITY, Vec3::Y)).unwrap();
        s
    }

    fn walking_clip() -> AnimationClip {
        let mut clip = AnimationClip::new("walk");
        let root = Track::new(controller_id_for("root"))
            .with_position(Channel::from_dense(0, (0..31).map(|i| Vec3::new(0.0, i as f32 * 0.05, 0.0)).collect()))
            .with_rotation(Channel::from_dense(0, vec![Quat::IDENTITY; 31]));
        let spine = Track::new(controller_id_for("spine"))
            .with_rotation(Channel::from_dense(
                0,
                (0..31).map(|i| Quat::from_rotation_x((i as f32 * 0.2).sin() * 0.3)).collect(),
            ))
            .with_position(Channel::from_dense(0, vec![Vec3::Y; 31]));
        clip.tracks = vec![root, spine];
        clip
    }

    #[test]
    fn test_constant_channels_deleted() {
        let report = compress_clip(&walking_clip(), &rig(), &CompressionConfig::default());
        let clip = report.result.as_ref().unwrap();
        assert_eq!(report.stats.tracks_out, 2);
        // root rotation and spine position are constant
        assert_eq!(report.stats.channels_deleted, 2);
        let ChunkVersion::SplitV2 = clip.controllers[0].version() else {
            panic!("default layout is split v2");
        };
        assert!(clip.params.flags.contains(AssetFlags::CREATED));
        assert!((clip.params.distance - 1.5).abs() < 1e-3);
        assert!((clip.params.speed - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_override_keeps_channels_off_bind_pose() {
        let config = CompressionConfig { mode: ProcessingMode::Override, ..Default::default() };
        let mut clip = walking_clip();
        clip.tracks[1].position = Some(Channel::from_dense(0, vec![Vec3::X; 31]));
        let report = compress_clip(&clip, &rig(), &config);
        let compressed = report.result.unwrap();
        let ControllerChunk::SplitV2(spine) = &compressed.controllers[1] else {
            panic!("expected split v2");
        };
        // constant but away from the bind pose
        assert!(spine.position.is_some());
    }

    #[test]
    fn test_unknown_controller_warns() {
        let mut clip = walking_clip();
        clip.tracks.push(Track::new(1).with_position(Channel::from_dense(0, vec![Vec3::ZERO, Vec3::X])));
        let report = compress_clip(&clip, &rig(), &CompressionConfig::default());
        assert_eq!(report.status(), ClipStatus::SuccessWithWarnings);
        assert_eq!(report.stats.tracks_out, 2);
    }

    #[test]
    fn test_degenerate_additive_fails() {
        let mut clip = walking_clip();
        clip.params.flags.insert(AssetFlags::ADDITIVE);
        clip.tracks[1].rotation = Some(Channel::constant(0, Quat::IDENTITY));
        let report = compress_clip(&clip, &rig(), &CompressionConfig::default());
        assert_eq!(report.status(), ClipStatus::Failed);
        assert!(matches!(report.result, Err(Error::DegenerateAnimation(_))));
    }

    #[test]
    fn test_never_policy_keeps_everything() {
        let mut config = CompressionConfig::default();
        config.policies.default = JointPolicy::default().with_delete(DeletePolicy::Never);
        let report = compress_clip(&walking_clip(), &rig(), &config);
        assert_eq!(report.stats.channels_deleted, 0);
    }

    #[test]
    fn test_flat_layout_is_dense() {
        let config = CompressionConfig { chunk_version: ChunkVersion::FlatPerSample, ..Default::default() };
        let report = compress_clip(&walking_clip(), &rig(), &config);
        let clip = report.result.unwrap();
        let ControllerChunk::FlatPerSample(spine) = &clip.controllers[1] else {
            panic!("expected flat");
        };
        assert_eq!(spine.keys.len(), 31);
        // deleted position reads back as its constant value
        assert!(spine.keys.iter().all(|k| k.position() == Vec3::Y));
    }

    #[test]
    fn test_legacy_layout_units() {
        let config = CompressionConfig { chunk_version: ChunkVersion::LegacyCombined, ..Default::default() };
        let report = compress_clip(&walking_clip(), &rig(), &config);
        let clip = report.result.unwrap();
        let ControllerChunk::LegacyCombined(root) = &clip.controllers[0] else {
            panic!("expected legacy");
        };
        assert_eq!(root.keys[2].time, 2 * LEGACY_TICKS_PER_KEY);
        assert!((root.keys[2].position.y - 10.0).abs() < 1e-3);

        let decoded = clip.controllers[0].decode().unwrap().track;
        let pos = decoded.position.unwrap();
        assert_eq!(pos.times()[2], 2);
        assert!((pos.values()[2].y - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_legacy_layout_keeps_start_tick() {
        let config = CompressionConfig { chunk_version: ChunkVersion::LegacyCombined, ..Default::default() };
        let mut clip = walking_clip();
        clip.params.flags.insert(AssetFlags::ADDITIVE);
        let compressed = compress_clip(&clip, &rig(), &config).result.unwrap();
        assert_eq!(compressed.params.start_tick, 1);

        let ControllerChunk::LegacyCombined(root) = &compressed.controllers[0] else {
            panic!("expected legacy");
        };
        assert_eq!(root.keys[0].time, LEGACY_TICKS_PER_KEY);
        let decoded = compressed.controllers[0].decode().unwrap().track;
        assert_eq!(decoded.position.unwrap().times().first(), Some(&1));
    }

    #[test]
    fn test_unrepresentable_positions_fail_clip() {
        let config = CompressionConfig { position_formats: vec![VectorFormat::HalfVec3], ..Default::default() };
        let mut clip = walking_clip();
        clip.tracks[0].position = Some(Channel::from_dense(
            0,
            (0..31).map(|i| Vec3::new(1.0e6 + i as f32, 0.0, 0.0)).collect(),
        ));
        let report = compress_clip(&clip, &rig(), &config);
        assert_eq!(report.status(), ClipStatus::Failed);
        assert!(matches!(report.result, Err(Error::Format(_))));
    }
}
