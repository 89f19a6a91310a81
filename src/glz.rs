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

//! GLZ frame header parsing and body decode: the same literal/back-reference
//! vocabulary as [`crate::lz`], extended with an inter-image distance that
//! can pull pixels out of the decoder window instead of the in-progress
//! output.

use bytes::Buf;

use crate::error::DecodeError;
use crate::pixel;
use crate::window::DecoderWindow;
use crate::{ImageHeader, PixelFormat, GLZ_MAGIC, GLZ_VERSION};

const HEADER_LEN: usize = 4 + 4 + 1 + 4 + 4 + 4 + 8 + 4;

/// Parses a GLZ frame header from the front of `input`.
///
/// Returns the header and the number of bytes consumed (always
/// [`HEADER_LEN`] on success).
pub(crate) fn parse_header(input: &[u8]) -> Result<(ImageHeader, usize), DecodeError> {
    if input.len() < HEADER_LEN {
        return Err(DecodeError::CorruptedStream {
            reason: format!("GLZ header needs {HEADER_LEN} bytes, input has {}", input.len()),
        });
    }
    let mut cursor = input;

    let magic = cursor.get_u32();
    if magic != GLZ_MAGIC {
        return Err(DecodeError::InvalidMagic {
            expected: GLZ_MAGIC,
            found: magic,
        });
    }

    let version = cursor.get_u32();
    if version != GLZ_VERSION {
        return Err(DecodeError::InvalidVersion {
            expected: GLZ_VERSION,
            found: version,
        });
    }

    let type_flags = cursor.get_u8();
    let format = PixelFormat::try_from(type_flags & 0x0F)?;
    let top_down = (type_flags >> 4) & 1 == 1;

    let width = cursor.get_u32();
    let height = cursor.get_u32();
    let _stride = cursor.get_u32();
    let id = cursor.get_u64();
    let win_head_dist = cursor.get_u32();

    let header = ImageHeader {
        id,
        format,
        top_down,
        width,
        height,
        win_head_dist,
    };
    Ok((header, HEADER_LEN))
}

/// One decoded reference field set, per the §4.4 grammar.
struct Reference {
    length: u32,
    image_dist: u64,
    pixel_ofs: u64,
}

fn read_u8(input: &[u8], pos: &mut usize) -> Result<u8, DecodeError> {
    let b = *input.get(*pos).ok_or_else(|| DecodeError::CorruptedStream {
        reason: "input exhausted mid-op".to_string(),
    })?;
    *pos += 1;
    Ok(b)
}

fn read_extended_length(input: &[u8], pos: &mut usize) -> Result<u32, DecodeError> {
    let mut extra: u32 = 0;
    loop {
        let b = read_u8(input, pos)?;
        extra = extra.checked_add(u32::from(b)).ok_or_else(|| DecodeError::CorruptedStream {
            reason: "variable-length extension overflowed".to_string(),
        })?;
        if b != 255 {
            return Ok(extra);
        }
    }
}

/// Decodes one reference op's fields, having already consumed `ctrl`.
fn read_reference(input: &[u8], pos: &mut usize, ctrl: u8) -> Result<Reference, DecodeError> {
    let length_nibble = u32::from(ctrl >> 5);
    let mut length = length_nibble;
    if length_nibble == 7 {
        length += read_extended_length(input, pos)?;
    }

    let pixel_flag = (ctrl >> 4) & 1;
    let mut pixel_ofs = u64::from(ctrl & 0x0F);

    let c1 = read_u8(input, pos)?;
    pixel_ofs += u64::from(c1) << 4;

    let c2 = read_u8(input, pos)?;
    let image_flag = u32::from((c2 >> 6) & 3);

    let image_dist;
    if pixel_flag == 0 {
        let mut dist = u64::from(c2 & 0x3F);
        for i in 0..image_flag {
            let b = read_u8(input, pos)?;
            dist += u64::from(b) << (6 + 8 * i);
        }
        image_dist = dist;
    } else {
        let pixel_flag2 = (c2 >> 5) & 1;
        pixel_ofs += u64::from(c2 & 0x1F) << 12;
        let mut dist = 0u64;
        for i in 0..image_flag {
            let b = read_u8(input, pos)?;
            dist += u64::from(b) << (8 * i);
        }
        image_dist = dist;
        if pixel_flag2 == 1 {
            let b = read_u8(input, pos)?;
            pixel_ofs += u64::from(b) << 17;
        }
    }

    if image_dist == 0 {
        pixel_ofs += 1;
    }

    Ok(Reference {
        length,
        image_dist,
        pixel_ofs,
    })
}

/// Runs the §4.4 body grammar once. `alpha_pass == false` writes full BGRA
/// literals/copies (the RGB body); `alpha_pass == true` writes only the
/// alpha byte of each pixel (the deferred alpha pass for RGBA).
#[allow(clippy::too_many_arguments)]
fn decode_body(
    input: &[u8],
    start: usize,
    output: &mut [u8],
    total_pixels: usize,
    current_id: u64,
    window: &DecoderWindow,
    alpha_pass: bool,
) -> Result<usize, DecodeError> {
    let mut pos = start;
    let mut cur = 0usize;
    // Caches the base pointer of the last resolved inter-image distance so
    // consecutive references sharing an image_dist skip repeated window
    // lookups.
    let mut cache: Option<(u64, &[u8])> = None;

    while cur < total_pixels {
        let ctrl = read_u8(input, &mut pos)?;

        if ctrl < 32 {
            let count = usize::from(ctrl) + 1;
            if cur + count > total_pixels {
                return Err(DecodeError::OutputOverflow {
                    needed: count * 4,
                    available: (total_pixels - cur) * 4,
                });
            }
            if alpha_pass {
                let end = pos.checked_add(count).ok_or_else(|| DecodeError::CorruptedStream {
                    reason: "alpha literal length overflowed input bounds".to_string(),
                })?;
                let payload = input.get(pos..end).ok_or_else(|| DecodeError::CorruptedStream {
                    reason: "alpha literal payload exceeds remaining input".to_string(),
                })?;
                for (i, &a) in payload.iter().enumerate() {
                    pixel::write_alpha_literal(output, cur + i, a);
                }
                pos = end;
            } else {
                let end = pos.checked_add(count * 3).ok_or_else(|| DecodeError::CorruptedStream {
                    reason: "literal length overflowed input bounds".to_string(),
                })?;
                let payload = input.get(pos..end).ok_or_else(|| DecodeError::CorruptedStream {
                    reason: "literal payload exceeds remaining input".to_string(),
                })?;
                for (i, chunk) in payload.chunks_exact(3).enumerate() {
                    pixel::write_bgr32_literal(output, cur + i, chunk[0], chunk[1], chunk[2], 0);
                }
                pos = end;
            }
            cur += count;
            continue;
        }

        let reference = read_reference(input, &mut pos, ctrl)?;
        let length = reference.length + if alpha_pass { 3 } else { 1 };
        let length = length as usize;

        if cur + length > total_pixels {
            return Err(DecodeError::OutputOverflow {
                needed: length * 4,
                available: (total_pixels - cur) * 4,
            });
        }

        if reference.image_dist == 0 {
            let offset = reference.pixel_ofs as usize;
            if offset > cur {
                return Err(DecodeError::CorruptedStream {
                    reason: format!("intra-image offset {offset} exceeds current position {cur}"),
                });
            }
            for _ in 0..length {
                let src = cur - offset;
                if alpha_pass {
                    pixel::copy_alpha_bgra(output, cur, src);
                } else {
                    pixel::copy_pixel_bgra(output, cur, src);
                }
                cur += 1;
            }
        } else {
            let target_image = match cache {
                Some((dist, buf)) if dist == reference.image_dist => buf,
                _ => {
                    let resolved = window.resolve(current_id, reference.image_dist, reference.pixel_ofs)?;
                    cache = Some((reference.image_dist, resolved));
                    resolved
                }
            };
            for i in 0..length as u64 {
                let pixel_index = reference.pixel_ofs + i;
                let at = (pixel_index * 4) as usize;
                if target_image.get(at..at + 4).is_none() {
                    return Err(DecodeError::ReferenceNotFound {
                        current_id,
                        distance: reference.image_dist,
                        target_id: current_id.saturating_sub(reference.image_dist),
                        pixel_offset: pixel_index,
                    });
                }
                if alpha_pass {
                    pixel::copy_alpha_bgra_cross(output, cur, target_image, pixel_index as usize);
                } else {
                    pixel::copy_pixel_bgra_cross(output, cur, target_image, pixel_index as usize);
                }
                cur += 1;
            }
        }
    }

    Ok(pos - start)
}

/// Runs the RGB body and, for RGBA images, the deferred alpha pass, over
/// `input[body_start..]` into `output`.
pub(crate) fn decode_into(
    input: &[u8],
    body_start: usize,
    output: &mut [u8],
    total_pixels: usize,
    current_id: u64,
    window: &DecoderWindow,
    needs_alpha_pass: bool,
) -> Result<(), DecodeError> {
    decode_body(input, body_start, output, total_pixels, current_id, window, false)?;
    if needs_alpha_pass {
        decode_body(input, body_start, output, total_pixels, current_id, window, true)?;
    }
    Ok(())
}
