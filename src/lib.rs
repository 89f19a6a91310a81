// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SPICE remote-desktop LZ/GLZ image frame decoder.
//!
//! This crate decodes the two frame kinds the SPICE protocol streams for
//! display updates: self-contained LZ frames ([`decode_lz`]) and
//! differentially encoded GLZ frames that reference pixels from previously
//! decoded frames via a shared sliding dictionary ([`GlzDecoder`]). Output
//! is always a flat, caller-owned buffer of 32-bit BGRA pixels.
//!
//! LZ4 block decompression and zlib/Inflate are treated as external
//! primitives this crate does not implement — composite SPICE image types
//! that need them are the caller's concern, wired in before or after this
//! crate's LZ/GLZ core runs.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]

mod error;
mod frame;
mod glz;
mod lz;
mod pixel;
mod window;

pub use error::DecodeError;
pub use frame::{decode_lz, GlzDecoder};
pub use pixel::{as_bgra, as_bgra_mut, flip_rows};
pub use window::{DecoderWindow, WindowEntry};

/// GLZ header magic: ASCII `"  ZL"`.
pub(crate) const GLZ_MAGIC: u32 = 0x20_20_5A_4C;
/// GLZ header version this decoder supports.
pub(crate) const GLZ_VERSION: u32 = 0x0001_0001;

/// An image's pixel encoding, as carried in the low nibble of a GLZ header's
/// type+flags byte (and implied by the call site for standalone LZ frames).
///
/// Numeric tags round-trip through the wire format: `RGB32` is `8`, `RGBA`
/// is `9`, `XXXA` is `10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Opaque BGRA: alpha byte is always `0`, regardless of what the stream
    /// carries for it.
    Rgb32,
    /// BGRA with a meaningful alpha channel, decoded in a second pass over a
    /// buffer that already holds color.
    Rgba,
    /// Alpha-only: three padding bytes per pixel, one meaningful alpha byte.
    Xxxa,
}

impl PixelFormat {
    /// The wire tag for this format (`8`, `9`, or `10`).
    #[must_use]
    pub fn tag(self) -> u8 {
        match self {
            PixelFormat::Rgb32 => 8,
            PixelFormat::Rgba => 9,
            PixelFormat::Xxxa => 10,
        }
    }
}

impl TryFrom<u8> for PixelFormat {
    type Error = DecodeError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            8 => Ok(PixelFormat::Rgb32),
            9 => Ok(PixelFormat::Rgba),
            10 => Ok(PixelFormat::Xxxa),
            other => Err(DecodeError::InvalidImageType { tag: other }),
        }
    }
}

/// A GLZ frame's header: identity, format, dimensions, and retention hint.
///
/// Carried alongside every [`WindowEntry`] and returned from a successful
/// [`GlzDecoder::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Monotonic per-stream identifier. References always point to a
    /// smaller id than the frame currently being decoded.
    pub id: u64,
    /// This image's pixel encoding.
    pub format: PixelFormat,
    /// `true` if row 0 of the decoded buffer is the top of the image.
    pub top_down: bool,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Retention hint: how far back any future frame may reference from
    /// this frame's position. The encoder guarantees `win_head_dist < id`,
    /// or `id - win_head_dist == 0` for the first frame.
    pub win_head_dist: u32,
}

impl ImageHeader {
    /// `width * height`, the pixel count of this image.
    #[must_use]
    pub fn gross_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}
