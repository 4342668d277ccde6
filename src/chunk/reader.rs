//! Controller and motion parameter chunk parsing.

use crate::codec::{EncodedChannel, KeyTimeFormat, TimeAxis, TimeSource, ValueFormat};
use crate::core::{AssetFlags, ChannelKind, MotionParams, Track};
use crate::util::{swap_words, Endianness, Error, Quat, Result, Transform, Vec3};

use super::format::*;
use super::stream::ByteCursor;
use super::{ControllerChunk, FlatController, LegacyController, SplitController};

/// Parse a controller payload of the given version.
///
/// Every array is bounds-checked against the payload before it is read,
/// so a short payload fails with [`Error::TruncatedChunk`] and yields no
/// channel. Value and time buffers come back little-endian.
pub fn read_chunk(version: ChunkVersion, payload: &[u8], endian: Endianness) -> Result<ControllerChunk> {
    let mut cur = ByteCursor::new(payload, endian);
    Ok(match version {
        ChunkVersion::LegacyCombined => ControllerChunk::LegacyCombined(read_legacy(&mut cur)?),
        ChunkVersion::SplitV1 => ControllerChunk::SplitV1(read_split_v1(&mut cur)?),
        ChunkVersion::SplitV2 => ControllerChunk::SplitV2(read_split_v2(&mut cur)?),
        ChunkVersion::FlatPerSample => ControllerChunk::FlatPerSample(read_flat(&mut cur)?),
    })
}

/// Parse and decode a controller, failing on the first invalid channel.
pub fn read_track(version: ChunkVersion, payload: &[u8], endian: Endianness) -> Result<Track> {
    let decoded = read_chunk(version, payload, endian)?.decode()?;
    match decoded.dropped.into_iter().next() {
        Some((_, e)) => Err(e),
        None => Ok(decoded.track),
    }
}

fn read_count(cur: &mut ByteCursor<'_>) -> Result<usize> {
    Ok(cur.read_u32()? as usize)
}

fn read_vec3(cur: &mut ByteCursor<'_>) -> Result<Vec3> {
    Ok(Vec3::new(cur.read_f32()?, cur.read_f32()?, cur.read_f32()?))
}

fn read_quat(cur: &mut ByteCursor<'_>) -> Result<Quat> {
    Ok(Quat::from_xyzw(cur.read_f32()?, cur.read_f32()?, cur.read_f32()?, cur.read_f32()?))
}

// ============================================================================
// Combined layouts
// ============================================================================

fn read_legacy(cur: &mut ByteCursor<'_>) -> Result<LegacyController> {
    let controller_id = cur.read_u32()?;
    let count = read_count(cur)?;
    let bytes = cur.read_array(count, LEGACY_KEY_SIZE)?;

    let mut keys_cur = ByteCursor::new(bytes, cur.endian());
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        keys.push(LegacyKey {
            time: keys_cur.read_i32()?,
            position: read_vec3(&mut keys_cur)?,
            rotation_log: read_vec3(&mut keys_cur)?,
        });
    }
    Ok(LegacyController { controller_id, keys })
}

fn read_flat(cur: &mut ByteCursor<'_>) -> Result<FlatController> {
    let controller_id = cur.read_u32()?;
    let count = read_count(cur)?;
    let bytes = cur.read_array(count, FLAT_KEY_SIZE)?;
    let keys = bytes
        .chunks_exact(FLAT_KEY_SIZE)
        .map(|b| {
            let key: FlatKey = bytemuck::pod_read_unaligned(b);
            if cur.endian() == Endianness::native() {
                key
            } else {
                key.swapped()
            }
        })
        .collect();
    Ok(FlatController { controller_id, keys })
}

// ============================================================================
// Split layouts
// ============================================================================

/// Header fields of one channel before its blocks are read.
struct ChannelHeader {
    kind: ChannelKind,
    count: usize,
    format_tag: u16,
    source: TimeSource,
    time_tag: u8,
}

fn read_channel(cur: &mut ByteCursor<'_>, h: ChannelHeader, aligned: bool) -> Result<Option<EncodedChannel>> {
    if h.source == TimeSource::None {
        return Ok(None);
    }
    let format = ValueFormat::from_tag(h.kind, h.format_tag)?;
    if aligned {
        cur.align4()?;
    }
    let mut values = cur.read_array(h.count, format.byte_size())?.to_vec();
    if cur.endian().is_big() {
        swap_words(&mut values, format.word_size());
    }

    let times = match h.source {
        TimeSource::Own => {
            let time_format = KeyTimeFormat::from_tag(h.time_tag)?;
            if aligned {
                cur.align4()?;
            }
            let mut bytes = cur.read_array(h.count, time_format.byte_size())?.to_vec();
            if cur.endian().is_big() {
                swap_words(&mut bytes, time_format.byte_size());
            }
            TimeAxis::Own { format: time_format, bytes }
        }
        other => {
            let Some(kind) = other.shared_kind().filter(|&k| k < h.kind) else {
                return Err(Error::format(format!("{} cannot share a later time axis", h.kind)));
            };
            TimeAxis::Shares(kind)
        }
    };

    Ok(Some(EncodedChannel {
        kind: h.kind,
        format,
        count: h.count as u32,
        values,
        times,
    }))
}

fn rotation_source(count: usize) -> TimeSource {
    if count == 0 {
        TimeSource::None
    } else {
        TimeSource::Own
    }
}

fn read_split_v1(cur: &mut ByteCursor<'_>) -> Result<SplitController> {
    cur.ensure(SPLIT_V1_HEADER_SIZE)?;
    let controller_id = cur.read_u32()?;
    let rotation_count = read_count(cur)?;
    let position_count = read_count(cur)?;
    let rotation_format = cur.read_u8()?;
    let rotation_time = cur.read_u8()?;
    let position_format = cur.read_u8()?;
    let position_source = TimeSource::from_u8(cur.read_u8()?)?;
    let position_time = cur.read_u8()?;
    let tracks_aligned = cur.read_u8()? != 0;
    cur.read_bytes(2)?;

    let rotation = read_channel(
        cur,
        ChannelHeader {
            kind: ChannelKind::Rotation,
            count: rotation_count,
            format_tag: rotation_format.into(),
            source: rotation_source(rotation_count),
            time_tag: rotation_time,
        },
        tracks_aligned,
    )?;
    let position = read_channel(
        cur,
        ChannelHeader {
            kind: ChannelKind::Position,
            count: position_count,
            format_tag: position_format.into(),
            source: position_source,
            time_tag: position_time,
        },
        tracks_aligned,
    )?;

    Ok(SplitController { controller_id, tracks_aligned, rotation, position, scale: None })
}

fn read_split_v2(cur: &mut ByteCursor<'_>) -> Result<SplitController> {
    cur.ensure(SPLIT_V2_HEADER_SIZE)?;
    let controller_id = cur.read_u32()?;
    let rotation_count = read_count(cur)?;
    let position_count = read_count(cur)?;
    let scale_count = read_count(cur)?;
    let rotation_format = cur.read_u16()?;
    let position_format = cur.read_u16()?;
    let scale_format = cur.read_u16()?;
    let rotation_time = cur.read_u8()?;
    let position_source = TimeSource::from_u8(cur.read_u8()?)?;
    let position_time = cur.read_u8()?;
    let scale_source = TimeSource::from_u8(cur.read_u8()?)?;
    let scale_time = cur.read_u8()?;
    cur.read_u8()?;

    let rotation = read_channel(
        cur,
        ChannelHeader {
            kind: ChannelKind::Rotation,
            count: rotation_count,
            format_tag: rotation_format,
            source: rotation_source(rotation_count),
            time_tag: rotation_time,
        },
        true,
    )?;
    let position = read_channel(
        cur,
        ChannelHeader {
            kind: ChannelKind::Position,
            count: position_count,
            format_tag: position_format,
            source: position_source,
            time_tag: position_time,
        },
        true,
    )?;
    let scale = read_channel(
        cur,
        ChannelHeader {
            kind: ChannelKind::Scale,
            count: scale_count,
            format_tag: scale_format,
            source: scale_source,
            time_tag: scale_time,
        },
        true,
    )?;

    Ok(SplitController { controller_id, tracks_aligned: true, rotation, position, scale })
}

// ============================================================================
// Motion parameters
// ============================================================================

/// Parse a motion parameters payload.
pub fn read_motion_params(version: u16, payload: &[u8], endian: Endianness) -> Result<MotionParams> {
    if version != MOTION_PARAMS_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let mut cur = ByteCursor::new(payload, endian);
    cur.ensure(MOTION_PARAMS_SIZE)?;

    let flags = AssetFlags::from_bits_retain(cur.read_u32()?);
    let ticks_per_frame = cur.read_i32()?;
    let seconds_per_tick = cur.read_f32()?;
    let start_tick = cur.read_i32()?;
    let end_tick = cur.read_i32()?;
    let speed = cur.read_f32()?;
    let turn_speed = cur.read_f32()?;
    let asset_turn = cur.read_f32()?;
    let distance = cur.read_f32()?;
    let slope = cur.read_f32()?;
    let start_location = Transform::from_rotation_translation(read_quat(&mut cur)?, read_vec3(&mut cur)?);
    let end_location = Transform::from_rotation_translation(read_quat(&mut cur)?, read_vec3(&mut cur)?);

    Ok(MotionParams {
        flags,
        ticks_per_frame,
        seconds_per_tick,
        start_tick,
        end_tick,
        speed,
        turn_speed,
        asset_turn,
        distance,
        slope,
        start_location,
        end_location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ByteWriter;

    /// Legacy payload with one key per raw time, x position `10 cm * i`.
    fn legacy_payload(times: &[i32]) -> Vec<u8> {
        let mut w = ByteWriter::new(Endianness::Little);
        w.write_u32(0x42).unwrap();
        w.write_u32(times.len() as u32).unwrap();
        for (i, &t) in times.iter().enumerate() {
            w.write_i32(t).unwrap();
            for c in [i as f32 * 10.0, 0.0, 0.0, 0.0, 0.0, 0.0] {
                w.write_f32(c).unwrap();
            }
        }
        w.into_inner()
    }

    #[test]
    fn test_legacy_repeated_time_rejected() {
        let payload = legacy_payload(&[0, 160, 160, 320]);
        assert!(matches!(
            read_track(ChunkVersion::LegacyCombined, &payload, Endianness::Little),
            Err(Error::UnsortedKeys { index: 2 })
        ));

        // distinct raw times that land on the same tick
        let payload = legacy_payload(&[0, 80, 160]);
        assert!(matches!(
            read_track(ChunkVersion::LegacyCombined, &payload, Endianness::Little),
            Err(Error::UnsortedKeys { index: 1 })
        ));
    }

    #[test]
    fn test_legacy_absolute_ticks() {
        let payload = legacy_payload(&[160, 320, 480]);
        let track = read_track(ChunkVersion::LegacyCombined, &payload, Endianness::Little).unwrap();
        let pos = track.position.unwrap();
        assert_eq!(pos.times(), &[1, 2, 3]);
        assert!((pos.values()[1].x - 0.1).abs() < 1e-6);
        assert_eq!(track.rotation.unwrap().values()[0], Quat::IDENTITY);
    }

    #[test]
    fn test_legacy_extreme_times() {
        let payload = legacy_payload(&[-2_000_000_000, 2_000_000_000]);
        let track = read_track(ChunkVersion::LegacyCombined, &payload, Endianness::Little).unwrap();
        assert_eq!(track.position.unwrap().times(), &[-12_500_000, 12_500_000]);
    }

    #[test]
    fn test_split_times_out_of_order() {
        let mut chunk = SplitController::new(7);
        chunk.rotation = Some(
            EncodedChannel::encode_rotation(
                crate::codec::RotationFormat::NoCompressQuat,
                &[0, 1, 2],
                &[Quat::IDENTITY; 3],
            )
            .unwrap(),
        );
        let mut payload =
            crate::chunk::write_chunk(&ControllerChunk::SplitV2(chunk), Endianness::Little).unwrap();
        // header, three raw quaternions, then one byte per tick
        let times_at = 28 + 3 * 16;
        assert_eq!(&payload[times_at..times_at + 3], &[0, 1, 2]);
        payload[times_at..times_at + 3].copy_from_slice(&[0, 2, 1]);

        let decoded = read_chunk(ChunkVersion::SplitV2, &payload, Endianness::Little)
            .unwrap()
            .decode()
            .unwrap();
        assert!(decoded.track.rotation.is_none());
        assert!(matches!(
            decoded.dropped.as_slice(),
            [(ChannelKind::Rotation, Error::UnsortedKeys { index: 2 })]
        ));
    }
}
