/***************************************************************************************************
 * Copyright (c) 2021-2023 Qualcomm Innovation Center, Inc. All rights reserved.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the “Software”), to deal in the Software without
 * restriction, including without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice (including the next
 * paragraph) shall be included in all copies or substantial portions of the
 * Software.
 *
 * THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
 * BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 **************************************************************************************************/
/***************************************************************************************************
 * CBOR Encoder
 *
 * CTAP2 request bodies have statically known shape: the number of pairs in a command's top-level
 * map, and the number of items in any nested array, is known to the caller before a single byte
 * is written. This encoder takes advantage of that by requiring the item count up front for maps
 * and arrays rather than patching the count in after the fact, which is the approach taken by a
 * generic CBOR encoder that must support arbitrary, dynamically-built documents.
 *
 * Every write method returns `&mut Self` so calls can be chained. Once a write does not fit in
 * the backing buffer, the encoder latches `CBORError::EndOfBuffer` and every subsequent write
 * becomes a silent no-op; callers check this once at the end via [`Encoder::finish`] rather than
 * after every intermediate call.
 **************************************************************************************************/
use crate::error::CBORError;

use core::mem::size_of;

#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

const MT_UINT: u8 = 0x00;
const MT_NINT: u8 = 0x20;
const MT_BSTR: u8 = 0x40;
const MT_TSTR: u8 = 0x60;
const MT_ARRAY: u8 = 0x80;
const MT_MAP: u8 = 0xa0;

const AI_ONE_BYTE: u8 = 24;
const AI_TWO_BYTES: u8 = 25;
const AI_FOUR_BYTES: u8 = 26;
const AI_EIGHT_BYTES: u8 = 27;
const AI_FALSE: u8 = 0xf4;
const AI_TRUE: u8 = 0xf5;
const AI_NULL: u8 = 0xf6;

/// A canonical CBOR encoder writing into a caller-supplied buffer.
///
/// `Encoder` never allocates. `bytes_written()` reports the length of the encoded message so
/// far; once the buffer is exhausted every write becomes a no-op and [`Encoder::finish`] reports
/// the error.
pub struct Encoder<'buf> {
    buf: &'buf mut [u8],
    pos: usize,
    status: Result<(), CBORError>,
}

impl<'buf> Encoder<'buf> {
    /// Construct a new encoder writing into `buf`.
    #[cfg_attr(feature = "trace", trace)]
    pub fn new(buf: &'buf mut [u8]) -> Self {
        Encoder {
            buf,
            pos: 0,
            status: Ok(()),
        }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn bytes_written(&self) -> usize {
        self.pos
    }

    /// Consume the encoder, returning the encoded slice or the latched error.
    #[cfg_attr(feature = "trace", trace)]
    pub fn finish(self) -> Result<&'buf [u8], CBORError> {
        self.status?;
        Ok(&self.buf[..self.pos])
    }

    /// Write an unsigned integer using the canonical shortest encoding for `major_type`.
    fn write_head(&mut self, major_type: u8, value: u64) -> &mut Self {
        if self.status.is_err() {
            return self;
        }
        if value <= 23 {
            self.push(&[major_type | value as u8]);
        } else if value <= u8::MAX as u64 {
            self.push(&[major_type | AI_ONE_BYTE, value as u8]);
        } else if value <= u16::MAX as u64 {
            let mut out = [0u8; 1 + size_of::<u16>()];
            out[0] = major_type | AI_TWO_BYTES;
            out[1..].copy_from_slice(&(value as u16).to_be_bytes());
            self.push(&out);
        } else if value <= u32::MAX as u64 {
            let mut out = [0u8; 1 + size_of::<u32>()];
            out[0] = major_type | AI_FOUR_BYTES;
            out[1..].copy_from_slice(&(value as u32).to_be_bytes());
            self.push(&out);
        } else {
            let mut out = [0u8; 1 + size_of::<u64>()];
            out[0] = major_type | AI_EIGHT_BYTES;
            out[1..].copy_from_slice(&value.to_be_bytes());
            self.push(&out);
        }
        self
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.status.is_err() {
            return;
        }
        if self.pos + bytes.len() > self.buf.len() {
            self.status = Err(CBORError::EndOfBuffer);
            return;
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    /// Encode a non-negative integer.
    #[cfg_attr(feature = "trace", trace)]
    pub fn uint(&mut self, value: u64) -> &mut Self {
        self.write_head(MT_UINT, value)
    }

    /// Encode a negative integer. `value` must be negative; CBOR stores `-1 - value` as the
    /// unsigned magnitude.
    #[cfg_attr(feature = "trace", trace)]
    pub fn negint(&mut self, value: i64) -> &mut Self {
        debug_assert!(value < 0);
        self.write_head(MT_NINT, (-1 - value) as u64)
    }

    /// Encode a bytestring.
    #[cfg_attr(feature = "trace", trace)]
    pub fn bytestring(&mut self, value: &[u8]) -> &mut Self {
        self.write_head(MT_BSTR, value.len() as u64);
        self.push(value);
        self
    }

    /// Encode a UTF-8 text string.
    #[cfg_attr(feature = "trace", trace)]
    pub fn utf8string(&mut self, value: &str) -> &mut Self {
        self.write_head(MT_TSTR, value.len() as u64);
        self.push(value.as_bytes());
        self
    }

    /// Encode a boolean.
    #[cfg_attr(feature = "trace", trace)]
    pub fn boolean(&mut self, value: bool) -> &mut Self {
        self.push(&[if value { AI_TRUE } else { AI_FALSE }]);
        self
    }

    /// Encode a CBOR null.
    #[cfg_attr(feature = "trace", trace)]
    pub fn null(&mut self) -> &mut Self {
        self.push(&[AI_NULL]);
        self
    }

    /// Begin an array of exactly `n_items` items. The caller must follow with exactly `n_items`
    /// further encode calls - there is no way to patch the count in after the fact, so getting
    /// this wrong produces malformed CBOR rather than a runtime error.
    #[cfg_attr(feature = "trace", trace)]
    pub fn array_start(&mut self, n_items: usize) -> &mut Self {
        self.write_head(MT_ARRAY, n_items as u64)
    }

    /// Begin a map of exactly `n_pairs` key/value pairs. The caller must follow with exactly
    /// `2 * n_pairs` further encode calls, alternating key and value.
    #[cfg_attr(feature = "trace", trace)]
    pub fn map_start(&mut self, n_pairs: usize) -> &mut Self {
        self.write_head(MT_MAP, n_pairs as u64)
    }
}

/// Return the number of bytes a canonical encoding of the unsigned value `n` as an MT/AI head
/// would occupy, not including any following payload bytes for strings, arrays or maps.
#[cfg_attr(feature = "trace", trace)]
pub fn head_len(n: u64) -> usize {
    if n <= 23 {
        1
    } else if n <= u8::MAX as u64 {
        2
    } else if n <= u16::MAX as u64 {
        3
    } else if n <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_inline_uint() {
        let mut buf = [0u8; 8];
        let mut enc = Encoder::new(&mut buf);
        enc.uint(5);
        assert_eq!(enc.finish().unwrap(), &[0x05]);
    }

    #[test]
    fn encodes_one_byte_extended_uint() {
        let mut buf = [0u8; 8];
        let mut enc = Encoder::new(&mut buf);
        enc.uint(24);
        assert_eq!(enc.finish().unwrap(), &[0x18, 0x18]);
    }

    #[test]
    fn encodes_negative_eddsa_algorithm() {
        let mut buf = [0u8; 8];
        let mut enc = Encoder::new(&mut buf);
        enc.negint(-8);
        assert_eq!(enc.finish().unwrap(), &[0x27]);
    }

    #[test]
    fn encodes_map_with_two_pairs() {
        let mut buf = [0u8; 32];
        let mut enc = Encoder::new(&mut buf);
        enc.map_start(2);
        enc.uint(1).utf8string("Hello");
        enc.uint(2).utf8string("World");
        let expected: &[u8] = &[
            0xa2, 0x01, 0x65, 0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x02, 0x65, 0x57, 0x6f, 0x72, 0x6c,
            0x64,
        ];
        assert_eq!(enc.finish().unwrap(), expected);
    }

    #[test]
    fn latches_buffer_too_short() {
        let mut buf = [0u8; 2];
        let mut enc = Encoder::new(&mut buf);
        enc.utf8string("too long for this buffer");
        assert!(matches!(enc.finish(), Err(CBORError::EndOfBuffer)));
    }

    #[test]
    fn head_len_matches_boundaries() {
        assert_eq!(head_len(23), 1);
        assert_eq!(head_len(24), 2);
        assert_eq!(head_len(255), 2);
        assert_eq!(head_len(256), 3);
        assert_eq!(head_len(65535), 3);
        assert_eq!(head_len(65536), 5);
        assert_eq!(head_len(u32::MAX as u64), 5);
        assert_eq!(head_len(u32::MAX as u64 + 1), 9);
    }
}
