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

//! Integration tests for `decode_lz`, covering the S1-S4 end-to-end
//! scenarios against the public API.

use glz_codec::{decode_lz, DecodeError, PixelFormat};

#[test]
fn s1_tiny_literal() {
    let input = [0x02, 10, 20, 30, 11, 21, 31, 12, 22, 32];
    let mut output = vec![0u8; 3 * 4];
    let consumed = decode_lz(3, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap();
    assert_eq!(consumed, input.len());
    assert_eq!(output, vec![10, 20, 30, 0, 11, 21, 31, 0, 12, 22, 32, 0]);
}

#[test]
fn s2_rle_from_last_pixel() {
    let input = [0x00, 0xAA, 0xBB, 0xCC, 0x20, 0x00];
    let mut output = vec![0u8; 3 * 4];
    decode_lz(3, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap();
    for pixel in output.chunks_exact(4) {
        assert_eq!(pixel, &[0xAA, 0xBB, 0xCC, 0]);
    }
}

#[test]
fn s3_overlapping_copy() {
    let mut input = vec![0x03u8, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
    input.extend_from_slice(&[(7 << 5) | 0, 0, 3]);
    let mut output = vec![0u8; 8 * 4];
    decode_lz(8, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap();
    let expected: Vec<u8> = [[1u8, 1, 1, 0], [2, 2, 2, 0], [3, 3, 3, 0], [4, 4, 4, 0]]
        .iter()
        .cycle()
        .take(8)
        .flatten()
        .copied()
        .collect();
    assert_eq!(output, expected);
}

#[test]
fn s4_rgba_alpha_only_literal() {
    let input = [0x01, 100, 200];
    let mut output = vec![9u8; 2 * 4];
    decode_lz(2, 1, &input, PixelFormat::Rgba, true, false, &mut output).unwrap();
    // Alpha bytes are overwritten; B, G, R are untouched.
    assert_eq!(output[3], 100);
    assert_eq!(output[7], 200);
    assert_eq!(&output[0..3], &[9, 9, 9]);
    assert_eq!(&output[4..7], &[9, 9, 9]);
}

#[test]
fn property_rgb32_alpha_is_always_zero_without_default_alpha() {
    let input = [0x04, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
    let mut output = vec![0u8; 5 * 4];
    decode_lz(5, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap();
    for pixel in output.chunks_exact(4) {
        assert_eq!(pixel[3], 0);
    }
}

#[test]
fn property_literal_byte_accounting_rgb32() {
    // A literal run of n pixels advances input by 3n (RGB32) and output by
    // 4n, and nothing else is consumed for a single-op stream.
    let n = 5usize;
    let mut input = vec![(n - 1) as u8];
    input.extend((0..n * 3).map(|i| i as u8));
    let mut output = vec![0u8; n * 4];
    let consumed = decode_lz(n as u32, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap();
    assert_eq!(consumed, 1 + 3 * n);
}

#[test]
fn row_flip_is_applied_for_bottom_up_input() {
    // Two 1-pixel-wide rows; wire order is bottom-up (top_down = false).
    let input = [0x01, 1, 1, 1, 2, 2, 2];
    let mut output = vec![0u8; 2 * 4];
    decode_lz(1, 2, &input, PixelFormat::Rgb32, false, false, &mut output).unwrap();
    assert_eq!(&output[0..4], &[2, 2, 2, 0]);
    assert_eq!(&output[4..8], &[1, 1, 1, 0]);
}

#[test]
fn offset_past_cursor_is_corrupted_stream() {
    let input = [0x00, 1, 2, 3, 0x20, 5];
    let mut output = vec![0u8; 4 * 4];
    let err = decode_lz(4, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap_err();
    assert!(matches!(err, DecodeError::CorruptedStream { .. }));
}

#[test]
fn output_buffer_smaller_than_frame_is_invalid_frame_size() {
    let input = [0x00, 1, 2, 3];
    let mut output = vec![0u8; 3];
    let err = decode_lz(1, 1, &input, PixelFormat::Rgb32, true, false, &mut output).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidFrameSize { .. }));
}
