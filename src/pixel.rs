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

//! Typed views over decoded pixel buffers, and the row-flip helper.
//!
//! Decoded output is always a flat `[u8]` buffer of 4 bytes per pixel
//! (`B, G, R, A`). [`as_bgra`]/[`as_bgra_mut`] give a typed
//! [`rgb::Bgra<u8>`] view over that same memory via [`bytemuck`] with no
//! copy, for callers that want to work pixel-at-a-time instead of
//! byte-at-a-time.

use rgb::Bgra;

/// Reinterprets a decoded BGRA byte buffer as a slice of typed pixels.
///
/// # Panics
///
/// Panics if `buf.len()` is not a multiple of 4 (bytemuck's cast precondition
/// — every buffer this crate produces satisfies it by construction).
#[must_use]
pub fn as_bgra(buf: &[u8]) -> &[Bgra<u8>] {
    bytemuck::cast_slice(buf)
}

/// Mutable counterpart of [`as_bgra`].
#[must_use]
pub fn as_bgra_mut(buf: &mut [u8]) -> &mut [Bgra<u8>] {
    bytemuck::cast_slice_mut(buf)
}

/// Exchanges row `i` and row `height - 1 - i` for `i < height / 2`.
///
/// `decode_lz`/`GlzDecoder::decode` call this whenever the wire header says
/// `top_down = false`: the decoder always writes pixels in encounter order,
/// so a bottom-up source needs exactly one flip pass to become top-down.
///
/// Applying this twice is a no-op: the second call undoes the first,
/// byte-for-byte.
pub fn flip_rows(buf: &mut [u8], width: usize, height: usize) {
    let row_bytes = width * 4;
    debug_assert_eq!(buf.len(), row_bytes * height);
    let mut scratch = vec![0u8; row_bytes];
    for i in 0..height / 2 {
        let top = i * row_bytes;
        let bottom = (height - 1 - i) * row_bytes;
        scratch.copy_from_slice(&buf[top..top + row_bytes]);
        buf.copy_within(bottom..bottom + row_bytes, top);
        buf[bottom..bottom + row_bytes].copy_from_slice(&scratch);
    }
}

/// Writes one literal BGR32 pixel: three input bytes `B, G, R`, plus an
/// explicit alpha byte, at pixel index `pixel`.
#[inline]
pub(crate) fn write_bgr32_literal(output: &mut [u8], pixel: usize, b: u8, g: u8, r: u8, alpha: u8) {
    let at = pixel * 4;
    output[at] = b;
    output[at + 1] = g;
    output[at + 2] = r;
    output[at + 3] = alpha;
}

/// Writes just the alpha byte of pixel `pixel`, leaving `B, G, R` untouched.
#[inline]
pub(crate) fn write_alpha_literal(output: &mut [u8], pixel: usize, alpha: u8) {
    output[pixel * 4 + 3] = alpha;
}

/// Writes the alpha byte of pixel `pixel` and zeroes its `B, G, R` bytes.
///
/// Used for the `XXXA` format's literal runs, which (unlike `RGBA`) have no
/// preceding color pass whose bytes need preserving.
#[inline]
pub(crate) fn write_alpha_literal_zeroed(output: &mut [u8], pixel: usize, alpha: u8) {
    let at = pixel * 4;
    output[at] = 0;
    output[at + 1] = 0;
    output[at + 2] = 0;
    output[at + 3] = alpha;
}

/// Copies the full 4-byte pixel at `src` to `dst` within the same buffer.
///
/// Safe to call when `src < dst` and the two pixel windows overlap — the
/// caller drives this one pixel at a time, so each call only ever touches
/// already-finalized bytes.
#[inline]
pub(crate) fn copy_pixel_bgra(buf: &mut [u8], dst: usize, src: usize) {
    let (s, d) = (src * 4, dst * 4);
    for k in 0..4 {
        buf[d + k] = buf[s + k];
    }
}

/// Copies just the alpha byte at pixel `src` to pixel `dst`, same buffer.
#[inline]
pub(crate) fn copy_alpha_bgra(buf: &mut [u8], dst: usize, src: usize) {
    buf[dst * 4 + 3] = buf[src * 4 + 3];
}

/// Copies the full 4-byte pixel at `src` in `source` to pixel `dst` in
/// `dest`. `source` and `dest` are distinct buffers (a GLZ inter-image
/// reference never aliases the frame being decoded).
#[inline]
pub(crate) fn copy_pixel_bgra_cross(dest: &mut [u8], dst: usize, source: &[u8], src: usize) {
    let (s, d) = (src * 4, dst * 4);
    dest[d..d + 4].copy_from_slice(&source[s..s + 4]);
}

/// Cross-buffer counterpart of [`copy_alpha_bgra`].
#[inline]
pub(crate) fn copy_alpha_bgra_cross(dest: &mut [u8], dst: usize, source: &[u8], src: usize) {
    dest[dst * 4 + 3] = source[src * 4 + 3];
}
