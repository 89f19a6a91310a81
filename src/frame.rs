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

//! The two public entry points: decode one LZ frame, or decode one GLZ
//! frame against a decoder-owned window.

use crate::error::DecodeError;
use crate::glz;
use crate::lz;
use crate::pixel;
use crate::window::DecoderWindow;
use crate::PixelFormat;

/// Decodes one self-contained LZ frame into `output`.
///
/// `output` must be at least `width * height * 4` bytes. `default_alpha`
/// only matters for `RGB32`: when set, literal pixels get alpha `255`
/// instead of `0`. When `top_down` is `false`, the output is row-flipped
/// after decoding so row 0 always ends up as the top of the image.
///
/// Returns the number of input bytes consumed.
///
/// # Errors
///
/// See [`DecodeError`]. A failed decode may have written partial pixel data
/// into `output`, but that data must not be treated as a valid frame.
pub fn decode_lz(
    width: u32,
    height: u32,
    input: &[u8],
    format: PixelFormat,
    top_down: bool,
    default_alpha: bool,
    output: &mut [u8],
) -> Result<usize, DecodeError> {
    let width = width as usize;
    let height = height as usize;
    let consumed = lz::decode(input, 0, output, width, height, format, default_alpha)?;
    if !top_down {
        pixel::flip_rows(output, width, height);
    }
    #[cfg(feature = "debug-logging")]
    log::trace!("decode_lz: {width}x{height} {format:?}, {consumed} bytes consumed");
    Ok(consumed)
}

/// A GLZ decoder bound to one decoder window.
///
/// Owns the window that successfully decoded frames register themselves
/// into, and that later frames reference by id. Not `Send`/`Sync`: see
/// [`DecoderWindow`]'s own documentation for why.
pub struct GlzDecoder {
    window: DecoderWindow,
}

impl Default for GlzDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl GlzDecoder {
    /// Creates a decoder with an empty window at the minimum capacity.
    #[must_use]
    pub fn new() -> Self {
        GlzDecoder {
            window: DecoderWindow::new(),
        }
    }

    /// Creates a decoder whose window starts sized to hold at least `hint`
    /// live images before its first resize.
    #[must_use]
    pub fn with_capacity_hint(hint: usize) -> Self {
        GlzDecoder {
            window: DecoderWindow::with_capacity_hint(hint),
        }
    }

    /// Read-only access to the decoder's window, e.g. to check whether a
    /// given frame id is still retained.
    #[must_use]
    pub fn window(&self) -> &DecoderWindow {
        &self.window
    }

    /// Resets the window to empty, e.g. on a session/stream reset. Any
    /// future reference to a previously decoded id will fail with
    /// [`DecodeError::ReferenceNotFound`] until that id is decoded again.
    pub fn clear(&mut self) {
        self.window.clear();
    }

    /// Decodes one GLZ frame: parses the header, runs the RGB body (and the
    /// deferred alpha pass for `RGBA`), row-flips if needed, registers the
    /// result with the window, and runs the retention policy.
    ///
    /// `output` must be at least `header.width * header.height * 4` bytes,
    /// where `header` is the frame's parsed header — callers that need the
    /// header ahead of time to size their buffer should call this with a
    /// buffer sized from the same source the encoder used (SPICE delivers
    /// frame dimensions out of band as well).
    ///
    /// # Errors
    ///
    /// See [`DecodeError`]. On failure, the window is left exactly as it was
    /// before the call — no partially decoded entry is ever registered.
    pub fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<crate::ImageHeader, DecodeError> {
        let (header, body_start) = glz::parse_header(input)?;

        let width = header.width as usize;
        let height = header.height as usize;
        let total_pixels = width.checked_mul(height).ok_or_else(|| DecodeError::InvalidFrameSize {
            reason: format!("{width}x{height} overflows pixel count"),
        })?;
        let needed = total_pixels.checked_mul(4).ok_or_else(|| DecodeError::InvalidFrameSize {
            reason: format!("{width}x{height} overflows byte count"),
        })?;
        if output.len() < needed {
            return Err(DecodeError::InvalidFrameSize {
                reason: format!("output buffer is {} bytes, need {needed}", output.len()),
            });
        }

        let needs_alpha_pass = header.format == PixelFormat::Rgba;
        glz::decode_into(
            input,
            body_start,
            output,
            total_pixels,
            header.id,
            &self.window,
            needs_alpha_pass,
        )?;

        if !header.top_down {
            pixel::flip_rows(&mut output[..needed], width, height);
        }

        if header.win_head_dist == 0 {
            // SAFETY: the caller's contract for `decode` (documented above
            // and on `GlzDecoder`) requires `output` to stay valid and
            // unmutated until at least the next `decode` call, which is
            // exactly how long a win_head_dist == 0 entry is retained
            // before the next frame's retention pass can evict it.
            unsafe {
                self.window.add_borrowed(header.id, &output[..needed])?;
            }
        } else {
            self.window.add(header.id, header.win_head_dist, &output[..needed])?;
        }

        #[cfg(feature = "debug-logging")]
        log::trace!(
            "decode_glz: id={} {}x{} {:?}, win_head_dist={}",
            header.id,
            width,
            height,
            header.format,
            header.win_head_dist
        );

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_lz_s1_tiny_literal() {
        let input = [0x02, 10, 20, 30, 11, 21, 31, 12, 22, 32];
        let mut output = vec![0u8; 3 * 4];
        let consumed = decode_lz(3, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap();
        assert_eq!(consumed, input.len());
        assert_eq!(output, vec![10, 20, 30, 0, 11, 21, 31, 0, 12, 22, 32, 0]);
    }

    #[test]
    fn decode_lz_flips_bottom_up_input() {
        // Two 1x1 rows (2 pixels tall), fed as a bottom-up image: row 0 of
        // the wire data is the bottom row of the picture.
        let input = [0x01, 1, 1, 1, 2, 2, 2];
        let mut output = vec![0u8; 2 * 4];
        decode_lz(1, 2, &input, PixelFormat::Rgb32, false, false, &mut output).unwrap();
        assert_eq!(&output[0..4], &[2, 2, 2, 0], "top-down row 0 should be the wire's second row");
        assert_eq!(&output[4..8], &[1, 1, 1, 0]);
    }

    #[test]
    fn output_buffer_too_small_is_invalid_frame_size() {
        let input = [0x02, 10, 20, 30, 11, 21, 31, 12, 22, 32];
        let mut output = vec![0u8; 2]; // far too small
        let err = decode_lz(3, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidFrameSize { .. }));
    }

    fn glz_header(id: u64, win_head_dist: u32, width: u32, height: u32, format_tag: u8, top_down: bool) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&crate::GLZ_MAGIC.to_be_bytes());
        buf.extend_from_slice(&crate::GLZ_VERSION.to_be_bytes());
        let flags = format_tag | if top_down { 0x10 } else { 0 };
        buf.push(flags);
        buf.extend_from_slice(&width.to_be_bytes());
        buf.extend_from_slice(&height.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&win_head_dist.to_be_bytes());
        buf
    }

    #[test]
    fn s5_glz_decode_registers_window_entry() {
        let mut decoder = GlzDecoder::new();

        // F1: id=1, pure literal 2x1 RGB32 image, win_head_dist=1.
        let mut f1 = glz_header(1, 1, 2, 1, PixelFormat::Rgb32.tag(), true);
        f1.push(0x01); // literal run of 2 pixels
        f1.extend_from_slice(&[10, 20, 30, 40, 50, 60]);
        let mut f1_out = vec![0u8; 2 * 4];
        let header1 = decoder.decode(&f1, &mut f1_out).unwrap();
        assert_eq!(header1.id, 1);
        assert_eq!(header1.gross_pixels(), 2);

        // F2: id=2, win_head_dist=1, single reference: image_dist=1,
        // pixel_ofs=0, length=2 (length_nibble=1).
        let mut f2 = glz_header(2, 1, 2, 1, PixelFormat::Rgb32.tag(), true);
        let ctrl = (1u8 << 5) | 0; // pixel_flag=0, pixel_ofs low=0
        f2.push(ctrl);
        f2.push(0); // c1
        f2.push(1); // c2: image_dist = 1
        let mut f2_out = vec![0u8; 2 * 4];
        decoder.decode(&f2, &mut f2_out).unwrap();
        assert_eq!(f2_out, f1_out);
    }

    #[test]
    fn clear_forgets_previously_decoded_ids() {
        let mut decoder = GlzDecoder::new();
        let mut f1 = glz_header(1, 5, 1, 1, PixelFormat::Rgb32.tag(), true);
        f1.push(0x00);
        f1.extend_from_slice(&[1, 2, 3]);
        let mut f1_out = vec![0u8; 4];
        decoder.decode(&f1, &mut f1_out).unwrap();
        assert!(decoder.window().get(1).is_some());

        decoder.clear();
        assert!(decoder.window().get(1).is_none());
    }
}
