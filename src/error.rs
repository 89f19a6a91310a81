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

//! The error taxonomy for LZ and GLZ decoding.
//!
//! Every fallible entry point in this crate returns `Result<_, DecodeError>`.
//! Decoding never panics on malformed input; a truncated or inconsistent
//! stream always surfaces as one of these variants instead.

/// All ways an LZ or GLZ decode can fail.
///
/// A failed decode leaves any window the caller passed in unchanged: no
/// partially constructed window entry is ever published.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum DecodeError {
    /// The GLZ header's magic bytes did not match `"  ZL"`.
    #[error("invalid GLZ magic: expected {expected:#010x}, found {found:#010x}")]
    InvalidMagic {
        /// The magic value this decoder requires.
        expected: u32,
        /// The magic value actually present in the stream.
        found: u32,
    },

    /// The GLZ header's version field did not match the supported version.
    #[error("invalid GLZ version: expected {expected:#010x}, found {found:#010x}")]
    InvalidVersion {
        /// The version value this decoder requires.
        expected: u32,
        /// The version value actually present in the stream.
        found: u32,
    },

    /// The pixel format tag in a header was outside `{8, 9, 10}`.
    #[error("invalid pixel format tag: {tag}")]
    InvalidImageType {
        /// The tag byte actually present in the stream.
        tag: u8,
    },

    /// The declared frame dimensions overflow, or the caller's output buffer
    /// is smaller than `width * height * 4`.
    #[error("invalid frame size: {reason}")]
    InvalidFrameSize {
        /// Human-readable detail (dimensions, required vs. available bytes).
        reason: String,
    },

    /// The byte stream is internally inconsistent: an intra-frame offset
    /// exceeds the current output cursor, a literal or reference would
    /// exceed remaining input or output, or a variable-length encoding ran
    /// past its bound.
    #[error("corrupted stream: {reason}")]
    CorruptedStream {
        /// Human-readable detail of which check failed.
        reason: String,
    },

    /// An inter-image GLZ reference named an id that is not present in the
    /// window, or whose `gross_pixels` is smaller than the requested pixel
    /// offset.
    #[error("reference not found: image id {target_id} (distance {distance} from {current_id}), offset {pixel_offset}")]
    ReferenceNotFound {
        /// The id of the frame currently being decoded.
        current_id: u64,
        /// The `image_dist` field read from the reference.
        distance: u64,
        /// The id the reference resolved to (`current_id - distance`).
        target_id: u64,
        /// The pixel offset requested into the target image.
        pixel_offset: u64,
    },

    /// A fully decoded op would write past the end of the caller's output
    /// buffer.
    #[error("output overflow: op needs {needed} more bytes, {available} available")]
    OutputOverflow {
        /// Bytes the current op would need to write.
        needed: usize,
        /// Bytes actually remaining in the output buffer.
        available: usize,
    },

    /// Window growth or an owned entry copy could not allocate memory.
    #[error("allocation failed: {reason}")]
    OutOfMemory {
        /// Human-readable detail of which allocation failed.
        reason: String,
    },
}
