//! Controller and motion parameter chunk serialization.

use crate::codec::{EncodedChannel, TimeAxis};
use crate::core::{ensure_ascending, ChannelKind, MotionParams};
use crate::util::{to_order, Endianness, Error, Quat, Result, Transform, Vec3};

use super::format::*;
use super::stream::ByteWriter;
use super::{ControllerChunk, FlatController, LegacyController, SplitController};

/// Serialize a controller chunk payload.
///
/// Key times must be strictly ascending. Encoded buffers are swapped to
/// the target byte order on the way out.
pub fn write_chunk(chunk: &ControllerChunk, endian: Endianness) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(endian);
    match chunk {
        ControllerChunk::LegacyCombined(c) => write_legacy(&mut w, c)?,
        ControllerChunk::SplitV1(c) => write_split_v1(&mut w, c)?,
        ControllerChunk::SplitV2(c) => write_split_v2(&mut w, c)?,
        ControllerChunk::FlatPerSample(c) => write_flat(&mut w, c)?,
    }
    Ok(w.into_inner())
}

fn write_count(w: &mut ByteWriter, n: usize) -> Result<()> {
    let n = u32::try_from(n).map_err(|_| Error::WriteFailed(format!("{n} keys exceed u32")))?;
    w.write_u32(n)
}

fn write_vec3(w: &mut ByteWriter, v: Vec3) -> Result<()> {
    for c in v.to_array() {
        w.write_f32(c)?;
    }
    Ok(())
}

fn write_quat(w: &mut ByteWriter, q: Quat) -> Result<()> {
    for c in q.to_array() {
        w.write_f32(c)?;
    }
    Ok(())
}

// ============================================================================
// Combined layouts
// ============================================================================

fn write_legacy(w: &mut ByteWriter, c: &LegacyController) -> Result<()> {
    let times: Vec<i32> = c.keys.iter().map(|k| k.time).collect();
    ensure_ascending(&times)?;
    w.write_u32(c.controller_id)?;
    write_count(w, c.keys.len())?;
    for key in &c.keys {
        w.write_i32(key.time)?;
        write_vec3(w, key.position)?;
        write_vec3(w, key.rotation_log)?;
    }
    Ok(())
}

fn write_flat(w: &mut ByteWriter, c: &FlatController) -> Result<()> {
    w.write_u32(c.controller_id)?;
    write_count(w, c.keys.len())?;
    for key in &c.keys {
        let key = if w.endian() == Endianness::native() { *key } else { key.swapped() };
        w.write_bytes(bytemuck::bytes_of(&key));
    }
    Ok(())
}

// ============================================================================
// Split layouts
// ============================================================================

/// Check a channel's buffers against its header fields.
fn validate_channel(ch: &EncodedChannel, shared_count: impl Fn(ChannelKind) -> Option<u32>) -> Result<()> {
    let expected = ch.count as usize * ch.format.byte_size();
    if ch.values.len() != expected {
        return Err(Error::WriteFailed(format!(
            "{} values hold {} bytes, header implies {expected}",
            ch.kind,
            ch.values.len()
        )));
    }
    match &ch.times {
        TimeAxis::Own { format, bytes } => {
            ensure_ascending(&format.decode(bytes, ch.count as usize)?)?;
        }
        TimeAxis::Shares(kind) => {
            if *kind >= ch.kind {
                return Err(Error::WriteFailed(format!("{} cannot share the {kind} time axis", ch.kind)));
            }
            if shared_count(*kind) != Some(ch.count) {
                return Err(Error::WriteFailed(format!(
                    "{} shares the {kind} time axis with a different key count",
                    ch.kind
                )));
            }
        }
    }
    Ok(())
}

fn time_format_tag(ch: Option<&EncodedChannel>) -> u8 {
    match ch.map(|c| &c.times) {
        Some(TimeAxis::Own { format, .. }) => format.tag(),
        _ => 0,
    }
}

fn time_source_tag(ch: Option<&EncodedChannel>) -> u8 {
    ch.map_or(0, |c| c.times.source().to_u8())
}

fn count_of(ch: Option<&EncodedChannel>) -> usize {
    ch.map_or(0, |c| c.count as usize)
}

fn format_tag(ch: Option<&EncodedChannel>) -> u16 {
    ch.map_or(0, |c| c.format.tag())
}

fn write_blocks(w: &mut ByteWriter, ch: &EncodedChannel, aligned: bool) -> Result<()> {
    if aligned {
        w.align4();
    }
    w.write_bytes(&to_order(&ch.values, ch.format.word_size(), w.endian()));
    if let TimeAxis::Own { format, bytes } = &ch.times {
        if aligned {
            w.align4();
        }
        w.write_bytes(&to_order(bytes, format.byte_size(), w.endian()));
    }
    Ok(())
}

fn validate_split(c: &SplitController) -> Result<()> {
    if c.rotation.as_ref().is_some_and(|r| !matches!(r.times, TimeAxis::Own { .. })) {
        return Err(Error::WriteFailed("rotation must store its own time axis".into()));
    }
    if c.rotation.as_ref().is_some_and(|r| r.count == 0) {
        return Err(Error::WriteFailed("rotation channel has no keys".into()));
    }
    let counts = |kind| c.channel(kind).map(|ch| ch.count);
    for ch in c.channels() {
        validate_channel(ch, counts)?;
    }
    Ok(())
}

fn write_split_v1(w: &mut ByteWriter, c: &SplitController) -> Result<()> {
    if c.scale.is_some() {
        return Err(Error::WriteFailed(format!(
            "controller {:#010x}: split v1 cannot store scale",
            c.controller_id
        )));
    }
    validate_split(c)?;
    let (rot, pos) = (c.rotation.as_ref(), c.position.as_ref());
    let narrow = |tag: u16| {
        u8::try_from(tag).map_err(|_| Error::WriteFailed(format!("format tag {tag} exceeds u8")))
    };

    w.write_u32(c.controller_id)?;
    write_count(w, count_of(rot))?;
    write_count(w, count_of(pos))?;
    w.write_u8(narrow(format_tag(rot))?);
    w.write_u8(time_format_tag(rot));
    w.write_u8(narrow(format_tag(pos))?);
    w.write_u8(time_source_tag(pos));
    w.write_u8(time_format_tag(pos));
    w.write_u8(u8::from(c.tracks_aligned));
    w.write_bytes(&[0, 0]);

    for ch in c.channels() {
        write_blocks(w, ch, c.tracks_aligned)?;
    }
    Ok(())
}

fn write_split_v2(w: &mut ByteWriter, c: &SplitController) -> Result<()> {
    validate_split(c)?;
    let (rot, pos, scl) = (c.rotation.as_ref(), c.position.as_ref(), c.scale.as_ref());

    w.write_u32(c.controller_id)?;
    write_count(w, count_of(rot))?;
    write_count(w, count_of(pos))?;
    write_count(w, count_of(scl))?;
    w.write_u16(format_tag(rot))?;
    w.write_u16(format_tag(pos))?;
    w.write_u16(format_tag(scl))?;
    w.write_u8(time_format_tag(rot));
    w.write_u8(time_source_tag(pos));
    w.write_u8(time_format_tag(pos));
    w.write_u8(time_source_tag(scl));
    w.write_u8(time_format_tag(scl));
    w.write_u8(0);

    for ch in c.channels() {
        write_blocks(w, ch, true)?;
    }
    Ok(())
}

// ============================================================================
// Motion parameters
// ============================================================================

fn write_location(w: &mut ByteWriter, t: &Transform) -> Result<()> {
    write_quat(w, t.rotation)?;
    write_vec3(w, t.position)
}

/// Serialize a motion parameters payload.
pub fn write_motion_params(params: &MotionParams, endian: Endianness) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new(endian);
    w.write_u32(params.flags.bits())?;
    w.write_i32(params.ticks_per_frame)?;
    w.write_f32(params.seconds_per_tick)?;
    w.write_i32(params.start_tick)?;
    w.write_i32(params.end_tick)?;
    w.write_f32(params.speed)?;
    w.write_f32(params.turn_speed)?;
    w.write_f32(params.asset_turn)?;
    w.write_f32(params.distance)?;
    w.write_f32(params.slope)?;
    write_location(&mut w, &params.start_location)?;
    write_location(&mut w, &params.end_location)?;
    debug_assert_eq!(w.pos(), MOTION_PARAMS_SIZE);
    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::super::{read_chunk, read_motion_params, read_track};
    use super::*;
    use crate::codec::{RotationFormat, TimeSource, VectorFormat};
    use crate::core::{AssetFlags, Track};

    fn split_v2() -> SplitController {
        let times = [0, 1, 2, 5];
        let rotations: Vec<Quat> = (0..4).map(|i| Quat::from_rotation_y(0.2 * i as f32)).collect();
        let positions: Vec<Vec3> = (0..4).map(|i| Vec3::new(i as f32, 0.5, -1.0)).collect();
        let mut c = SplitController::new(0xABCD_0123);
        c.rotation = Some(EncodedChannel::encode_rotation(RotationFormat::SmallTree48Bit, &times, &rotations).unwrap());
        c.position = Some(
            EncodedChannel::encode_vector(ChannelKind::Position, VectorFormat::NoCompressVec3, &times, &positions)
                .unwrap(),
        );
        c.scale = Some(
            EncodedChannel::encode_vector(ChannelKind::Scale, VectorFormat::HalfVec3, &[0, 9], &[Vec3::ONE, Vec3::splat(2.0)])
                .unwrap(),
        );
        c
    }

    #[test]
    fn test_rewrite_is_byte_identical() {
        let mut c = split_v2();
        c.share_time_axes().unwrap();
        let chunks = [
            ControllerChunk::SplitV2(c),
            ControllerChunk::LegacyCombined(LegacyController {
                controller_id: 5,
                keys: vec![
                    LegacyKey { time: 0, position: Vec3::new(10.0, 0.0, 0.0), rotation_log: Vec3::ZERO },
                    LegacyKey { time: 160, position: Vec3::new(20.0, 0.0, 0.0), rotation_log: Vec3::new(0.0, 0.0, 0.1) },
                ],
            }),
            ControllerChunk::FlatPerSample(FlatController {
                controller_id: 6,
                keys: vec![FlatKey::new(Quat::IDENTITY, Vec3::X, Vec3::ONE); 3],
            }),
        ];
        for chunk in &chunks {
            for endian in [Endianness::Little, Endianness::Big] {
                let bytes = write_chunk(chunk, endian).unwrap();
                let parsed = read_chunk(chunk.version(), &bytes, endian).unwrap();
                assert_eq!(&parsed, chunk);
                assert_eq!(write_chunk(&parsed, endian).unwrap(), bytes);
            }
        }
    }

    #[test]
    fn test_shared_position_axis() {
        let mut c = split_v2();
        c.share_time_axes().unwrap();
        let pos = c.position.as_ref().unwrap();
        assert_eq!(pos.times, TimeAxis::Shares(ChannelKind::Rotation));
        // scale keys differ from both
        assert!(matches!(c.scale.as_ref().unwrap().times, TimeAxis::Own { .. }));

        let bytes = write_chunk(&ControllerChunk::SplitV2(c), Endianness::Little).unwrap();
        assert_eq!(bytes[23], TimeSource::SharesRotation.to_u8());
        // header 28 + rotation 24 + 4 times + position 48 (no times) + scale 12 + 2 times
        assert_eq!(bytes.len(), 28 + 24 + 4 + 48 + 12 + 2);

        let track = read_track(ChunkVersion::SplitV2, &bytes, Endianness::Little).unwrap();
        assert_eq!(track.position.unwrap().times(), &[0, 1, 2, 5]);
    }

    #[test]
    fn test_v1_refuses_scale() {
        let c = split_v2();
        assert!(matches!(
            write_chunk(&ControllerChunk::SplitV1(c), Endianness::Little),
            Err(Error::WriteFailed(_))
        ));
    }

    #[test]
    fn test_v1_unaligned_layout() {
        let mut c = split_v2();
        c.scale = None;
        c.tracks_aligned = false;
        let chunk = ControllerChunk::SplitV1(c);
        let bytes = write_chunk(&chunk, Endianness::Little).unwrap();
        // header 20 + rotation 24 + 4 times + position 48 + 4 times
        assert_eq!(bytes.len(), 20 + 24 + 4 + 48 + 4);
        let track = read_track(ChunkVersion::SplitV1, &bytes, Endianness::Little).unwrap();
        assert_eq!(track.rotation.unwrap().len(), 4);
        assert!(track.scale.is_none());
    }

    #[test]
    fn test_writer_refuses_unsorted_keys() {
        let legacy = ControllerChunk::LegacyCombined(LegacyController {
            controller_id: 1,
            keys: vec![
                LegacyKey { time: 160, position: Vec3::ZERO, rotation_log: Vec3::ZERO },
                LegacyKey { time: 0, position: Vec3::ZERO, rotation_log: Vec3::ZERO },
            ],
        });
        assert!(matches!(
            write_chunk(&legacy, Endianness::Little),
            Err(Error::UnsortedKeys { index: 1 })
        ));

        let mut c = split_v2();
        if let Some(TimeAxis::Own { bytes, .. }) = c.rotation.as_mut().map(|r| &mut r.times) {
            bytes.swap(1, 2);
        }
        assert!(matches!(
            write_chunk(&ControllerChunk::SplitV2(c), Endianness::Little),
            Err(Error::UnsortedKeys { .. })
        ));
    }

    #[test]
    fn test_motion_params_round_trip() {
        let params = MotionParams {
            flags: AssetFlags::CYCLIC | AssetFlags::CREATED,
            start_tick: 3,
            end_tick: 60,
            speed: 1.25,
            distance: 2.375,
            start_location: Transform::from_rotation_translation(Quat::from_rotation_z(0.5), Vec3::Y),
            ..Default::default()
        };
        for endian in [Endianness::Little, Endianness::Big] {
            let bytes = write_motion_params(&params, endian).unwrap();
            assert_eq!(bytes.len(), MOTION_PARAMS_SIZE);
            let back = read_motion_params(MOTION_PARAMS_VERSION, &bytes, endian).unwrap();
            assert_eq!(back, params);
        }
        assert!(matches!(
            read_motion_params(0x0901, &[], Endianness::Little),
            Err(Error::UnsupportedVersion(0x0901))
        ));
    }

    #[test]
    fn test_track_from_flat() {
        let chunk = ControllerChunk::FlatPerSample(FlatController {
            controller_id: 4,
            keys: (0..3).map(|i| FlatKey::new(Quat::IDENTITY, Vec3::splat(i as f32), Vec3::ONE)).collect(),
        });
        let bytes = write_chunk(&chunk, Endianness::Big).unwrap();
        let track: Track = read_track(ChunkVersion::FlatPerSample, &bytes, Endianness::Big).unwrap();
        assert_eq!(track.position.unwrap().values()[2], Vec3::splat(2.0));
        assert_eq!(track.scale.unwrap().times(), &[0, 1, 2]);
    }
}
