//! Clip container: a motion parameters chunk followed by controller chunks.
//!
//! Layout (header fields after the endianness byte use the file's order):
//! ```text
//! magic "ANPK" | u8 endianness | u8 reserved | u16 version | u32 chunk count
//! chunk* { u16 type | u16 version | u32 payload size | payload | pad to 4 }
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use tracing::{debug, warn};

use super::format::*;
use super::reader::{read_chunk, read_motion_params};
use super::stream::{ByteCursor, ByteWriter};
use super::writer::{write_chunk, write_motion_params};
use super::ControllerChunk;
use crate::core::{AnimationClip, AssetFlags, MotionParams, Track};
use crate::util::{Endianness, Error, Result};

/// Serialized form of one clip, ready to be written.
#[derive(Clone, Debug, PartialEq)]
pub struct CompressedClip {
    pub name: String,
    pub params: MotionParams,
    pub controllers: Vec<ControllerChunk>,
}

impl CompressedClip {
    /// Byte order requested at compression time.
    pub fn endianness(&self) -> Endianness {
        if self.params.flags.contains(AssetFlags::BIG_ENDIAN) {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Total encoded payload over all controllers.
    pub fn payload_size(&self, endian: Endianness) -> Result<usize> {
        self.controllers
            .iter()
            .map(|c| write_chunk(c, endian).map(|b| b.len()))
            .sum()
    }
}

/// Result of reading a container.
#[derive(Debug)]
pub struct ClipRead {
    pub clip: AnimationClip,
    /// Controller chunks that parsed, in file order.
    pub chunks: Vec<ControllerChunk>,
    /// Skipped chunks and dropped channels.
    pub warnings: Vec<String>,
    pub endianness: Endianness,
}

impl ClipRead {
    /// Parsed chunks repackaged for writing.
    pub fn to_compressed(&self) -> CompressedClip {
        CompressedClip {
            name: self.clip.name.clone(),
            params: self.clip.params,
            controllers: self.chunks.clone(),
        }
    }
}

// ============================================================================
// Writing
// ============================================================================

fn write_record(w: &mut ByteWriter, ty: ChunkType, version: u16, payload: &[u8]) -> Result<()> {
    let size = u32::try_from(payload.len())
        .map_err(|_| Error::WriteFailed(format!("chunk of {} bytes", payload.len())))?;
    w.write_u16(ty.to_u16())?;
    w.write_u16(version)?;
    w.write_u32(size)?;
    w.write_bytes(payload);
    w.align4();
    Ok(())
}

/// Serialize a clip into a container.
pub fn write_clip(clip: &CompressedClip, endian: Endianness) -> Result<Vec<u8>> {
    let chunk_count = u32::try_from(clip.controllers.len() + 1)
        .map_err(|_| Error::WriteFailed("too many controllers".into()))?;

    let mut w = ByteWriter::new(endian);
    w.write_bytes(CONTAINER_MAGIC);
    w.write_u8(endian.to_byte());
    w.write_u8(0);
    w.write_u16(CONTAINER_VERSION)?;
    w.write_u32(chunk_count)?;

    let mut params = clip.params;
    params.flags.set(AssetFlags::BIG_ENDIAN, endian.is_big());
    let payload = write_motion_params(&params, endian)?;
    write_record(&mut w, ChunkType::MotionParameters, MOTION_PARAMS_VERSION, &payload)?;

    for chunk in &clip.controllers {
        let payload = write_chunk(chunk, endian)?;
        write_record(&mut w, ChunkType::Controller, chunk.version().to_u16(), &payload)?;
    }
    debug!(clip = %clip.name, chunks = chunk_count, bytes = w.pos(), "wrote container");
    Ok(w.into_inner())
}

/// Serialize a clip into a byte sink.
pub fn write_clip_to<W: Write>(clip: &CompressedClip, endian: Endianness, sink: &mut W) -> Result<()> {
    let bytes = write_clip(clip, endian)?;
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

fn read_header(data: &[u8]) -> Result<(Endianness, u32)> {
    if data.len() < CONTAINER_HEADER_SIZE {
        return Err(Error::UnexpectedEof(data.len() as u64));
    }
    if &data[..4] != CONTAINER_MAGIC {
        return Err(Error::InvalidMagic);
    }
    let endian = Endianness::from_byte(data[4])?;
    let mut cur = ByteCursor::new(&data[6..CONTAINER_HEADER_SIZE], endian);
    let version = cur.read_u16()?;
    if version != CONTAINER_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok((endian, cur.read_u32()?))
}

/// Parse a container.
///
/// Unknown chunk types and controller versions are skipped with a
/// warning, as are controllers that fail to parse. The read fails only
/// when the header is invalid or every controller chunk has an
/// unsupported version.
pub fn read_clip(data: &[u8]) -> Result<ClipRead> {
    let _span = tracing::debug_span!("read_clip", bytes = data.len()).entered();
    let (endian, chunk_count) = read_header(data)?;

    let mut cur = ByteCursor::new(data, endian);
    cur.read_bytes(CONTAINER_HEADER_SIZE)?;

    let mut warnings = Vec::new();
    let mut note = |msg: String| {
        warn!("{msg}");
        warnings.push(msg);
    };

    let mut params = None;
    let mut chunks: Vec<ControllerChunk> = Vec::new();
    let mut tracks = Vec::new();
    let mut controllers_seen = 0usize;
    let mut unsupported: Option<(usize, Error)> = None;

    for index in 0..chunk_count {
        cur.ensure(CHUNK_RECORD_HEADER_SIZE)?;
        let ty = cur.read_u16()?;
        let version = cur.read_u16()?;
        let size = cur.read_u32()? as usize;
        let payload = cur.read_bytes(size)?;
        cur.align4()?;

        match ChunkType::from_u16(ty) {
            Some(ChunkType::MotionParameters) => match read_motion_params(version, payload, endian) {
                Ok(p) if params.is_none() => params = Some(p),
                Ok(_) => note(format!("chunk {index}: duplicate motion parameters ignored")),
                Err(e) => note(format!("chunk {index}: motion parameters skipped: {e}")),
            },
            Some(ChunkType::Controller) => {
                controllers_seen += 1;
                let version = match ChunkVersion::from_u16(version) {
                    Ok(v) => v,
                    Err(e) => {
                        note(format!("chunk {index}: controller skipped: {e}"));
                        match unsupported.as_mut() {
                            Some((n, _)) => *n += 1,
                            None => unsupported = Some((1, e)),
                        }
                        continue;
                    }
                };
                let parsed = read_chunk(version, payload, endian).and_then(|c| {
                    let decoded = c.decode()?;
                    Ok((c, decoded))
                });
                match parsed {
                    Ok((chunk, decoded)) => {
                        if tracks.iter().any(|t: &Track| t.controller_id == chunk.controller_id()) {
                            note(format!(
                                "chunk {index}: duplicate controller {:#010x} ignored",
                                chunk.controller_id()
                            ));
                            continue;
                        }
                        for (kind, e) in decoded.dropped {
                            note(format!(
                                "controller {:#010x}: {kind} channel dropped: {e}",
                                chunk.controller_id()
                            ));
                        }
                        tracks.push(decoded.track);
                        chunks.push(chunk);
                    }
                    Err(e) => note(format!("chunk {index}: controller skipped: {e}")),
                }
            }
            None => note(format!("chunk {index}: unknown chunk type {ty} skipped")),
        }
    }

    if let Some((n, e)) = unsupported {
        if n == controllers_seen {
            return Err(e);
        }
    }
    if cur.remaining() > 0 {
        note(format!("{} trailing bytes ignored", cur.remaining()));
    }

    let params = match params {
        Some(p) => p,
        None => {
            note("no motion parameters chunk, using defaults".into());
            MotionParams::default()
        }
    };

    Ok(ClipRead {
        clip: AnimationClip { name: String::new(), params, tracks },
        chunks,
        warnings,
        endianness: endian,
    })
}

// ============================================================================
// Sources
// ============================================================================

/// Container bytes backed by a memory-mapped file or an owned buffer.
pub struct ContainerSource {
    inner: SourceInner,
    name: String,
}

enum SourceInner {
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    Bytes(Vec<u8>),
}

impl ContainerSource {
    /// Open a container file, memory-mapping it when the `mmap` feature is on.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata()?.len();
        if size < CONTAINER_HEADER_SIZE as u64 {
            return Err(Error::UnexpectedEof(size));
        }

        #[cfg(feature = "mmap")]
        let inner = {
            // Safety: the file is opened read-only and the map is never mutated.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
            SourceInner::Mmap(mmap)
        };
        #[cfg(not(feature = "mmap"))]
        let inner = {
            use std::io::Read;
            let mut file = file;
            let mut bytes = Vec::with_capacity(size as usize);
            file.read_to_end(&mut bytes)?;
            SourceInner::Bytes(bytes)
        };

        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        Ok(Self { inner, name })
    }

    /// Wrap an in-memory container.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { inner: SourceInner::Bytes(bytes.into()), name: String::new() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.inner {
            #[cfg(feature = "mmap")]
            SourceInner::Mmap(m) => m,
            SourceInner::Bytes(b) => b,
        }
    }

    /// Clip name, the file stem for opened files.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_mapped(&self) -> bool {
        match &self.inner {
            #[cfg(feature = "mmap")]
            SourceInner::Mmap(_) => true,
            SourceInner::Bytes(_) => false,
        }
    }

    /// Parse the container, naming the clip after its source.
    pub fn read_clip(&self) -> Result<ClipRead> {
        let mut read = read_clip(self.as_bytes())?;
        read.clip.name = self.name.clone();
        Ok(read)
    }
}
