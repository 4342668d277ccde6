//! Byte order selection and word swapping for encoded buffers.

use serde::{Deserialize, Serialize};

use super::{Error, Result};

/// Byte order of a container and every multi-byte field inside it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Byte order of the running platform.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    #[inline]
    pub const fn is_big(self) -> bool {
        matches!(self, Self::Big)
    }

    /// Header byte stored in the container.
    #[inline]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Little => 0,
            Self::Big => 1,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::Little),
            1 => Ok(Self::Big),
            other => Err(Error::format(format!("invalid endianness byte {other}"))),
        }
    }
}

/// Reverse the bytes of every `word`-sized group in `buf`.
///
/// Encoded value and time buffers are kept little-endian in memory; this
/// converts them to or from big-endian in place.
pub fn swap_words(buf: &mut [u8], word: usize) {
    if word <= 1 {
        return;
    }
    for chunk in buf.chunks_exact_mut(word) {
        chunk.reverse();
    }
}

/// Copy of `buf` in the target byte order.
pub fn to_order(buf: &[u8], word: usize, endian: Endianness) -> Vec<u8> {
    let mut out = buf.to_vec();
    if endian.is_big() {
        swap_words(&mut out, word);
    }
    out
}

/// Round `n` up to a multiple of four.
#[inline]
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Padding needed to bring `n` to a multiple of four.
#[inline]
pub const fn pad4(n: usize) -> usize {
    align4(n) - n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_words() {
        let mut buf = [1u8, 2, 3, 4, 5, 6];
        swap_words(&mut buf, 2);
        assert_eq!(buf, [2, 1, 4, 3, 6, 5]);
        swap_words(&mut buf, 2);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);

        let big = to_order(&[1, 0, 0, 0], 4, Endianness::Big);
        assert_eq!(big, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_align() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(5), 8);
        assert_eq!(pad4(6), 2);
        assert_eq!(pad4(8), 0);
    }

    #[test]
    fn test_endianness_byte() {
        assert_eq!(Endianness::from_byte(Endianness::Big.to_byte()).unwrap(), Endianness::Big);
        assert!(Endianness::from_byte(7).is_err());
    }
}
