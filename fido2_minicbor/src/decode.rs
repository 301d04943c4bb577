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
 * CBOR Decoder
 *
 * A CTAP2-scoped deserializer for CBOR (RFC8949). Decodes the canonical subset CTAP2 actually
 * emits: definite-length maps, arrays, byte/text strings, unsigned and negative integers, and
 * the boolean/null simple values. Indefinite-length items, tags and floats are all rejected as
 * malformed, since an authenticator conforming to CTAP2 never sends them. This implementation is
 * designed for use in constrained systems and requires neither the Rust standard library nor an
 * allocator.
 **************************************************************************************************/
/// # Low-level CBOR decoding functions
///
/// This module contains the low-level CBOR decoding primitives. CBOR input is parsed via a
/// [`SequenceBuffer`], which is constructed over a byte slice and keeps track of the current
/// parse position.
///
/// ## Example
///
/// ```
///# use fido2_minicbor::decoder::SequenceBuffer;
///# use fido2_minicbor::types::CBOR;
/// let b = [0x18u8, 0x18];
/// let buf = SequenceBuffer::new(&b);
/// let mut it = buf.into_iter();
/// if let Some(cbor) = it.next() {
///     assert_eq!(CBOR::UInt(24), cbor);
/// } else {
///     assert!(false)
/// }
/// ```
use crate::array::ArrayBuf;
use crate::ast::CBOR;
use crate::decode::DecodeBufIteratorSource::Sequence;
use crate::error::{CBORError, Result};
use crate::map::MapBuf;
use crate::utils::within;

use core::convert::TryInto;
use core::mem::size_of;
use core::str::from_utf8;

#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

/// Mask selecting the Additional Information nibble of an MT/AI byte (RFC8949 §3).
const AI_MASK: u8 = 0x1f;
/// Largest Additional Information value carrying an inline argument rather than a byte extension.
const PAYLOAD_AI_BITS: u8 = 23;
/// AI value indicating the argument follows as one big-endian byte.
const PAYLOAD_ONE_BYTE: u8 = 24;
/// AI value indicating the argument follows as two big-endian bytes.
const PAYLOAD_TWO_BYTES: u8 = 25;
/// AI value indicating the argument follows as four big-endian bytes.
const PAYLOAD_FOUR_BYTES: u8 = 26;
/// AI value indicating the argument follows as eight big-endian bytes.
const PAYLOAD_EIGHT_BYTES: u8 = 27;

/***************************************************************************************************
 * Integer parsing assistance
 **************************************************************************************************/

/// Value obtained by reading an unsigned value, retaining original representation.
#[derive(Debug)]
pub enum AnyUnsigned {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
}

impl<'buf> AnyUnsigned {
    /// Convert `AnyUnsigned` into a `usize`. Always succeeds.
    #[cfg_attr(feature = "trace", trace)]
    fn as_usize(self) -> usize {
        match self {
            Self::U8(v) => v as usize,
            Self::U16(v) => v as usize,
            Self::U32(v) => v as usize,
            Self::U64(v) => v as usize,
        }
    }
    /// Convert `AnyUnsigned` into a `u64`. Always succeeds.
    #[cfg_attr(feature = "trace", trace)]
    fn as_u64(self) -> u64 {
        match self {
            Self::U8(v) => v as u64,
            Self::U16(v) => v as u64,
            Self::U32(v) => v as u64,
            Self::U64(v) => v,
        }
    }
    /// Convert `AnyUnsigned` into a `CBOR::Simple` value. Follows RFC8949 for Simple values:
    /// 20..23 have particular meanings; 24..31 are illegal; larger values would be float
    /// encodings, which CTAP2 never uses here.
    #[cfg_attr(feature = "trace", trace)]
    fn try_into_simple(self) -> Result<CBOR<'buf>> {
        match self {
            Self::U8(v) => match v {
                0..=19 => Ok(CBOR::Simple(v)),
                20 => Ok(CBOR::False),
                21 => Ok(CBOR::True),
                22 => Ok(CBOR::Null),
                23 => Ok(CBOR::Undefined),
                24..=31 => Err(CBORError::MalformedEncoding),
                v => Ok(CBOR::Simple(v)),
            },
            _ => Err(CBORError::MalformedEncoding),
        }
    }
}

/***************************************************************************************************
 * CBOR Sequence Buffer definitions
 **************************************************************************************************/

/// A buffer which contains a CBOR sequence to be decoded. The buffer has lifetime `'buf`,
/// which must be longer than any borrow from the buffer itself. This is generally used as the
/// top-level structure for parsing a complete CTAP2 response or request body.
///
/// This CBOR buffer implementation does not support indefinite length items.
#[derive(Debug, Copy, Clone)]
pub struct SequenceBuffer<'buf> {
    /// Underlying reference to data buffer
    pub bytes: &'buf [u8],
}

impl<'buf> SequenceBuffer<'buf> {
    /// Construct a new instance of `SequenceBuffer` with all context initialized.
    ///
    /// ## Example
    /// ```
    ///# use fido2_minicbor::decoder::SequenceBuffer;
    /// let b = [0x18u8, 0x18];
    /// let buf = SequenceBuffer::new(&b);
    /// ```
    #[cfg_attr(feature = "trace", trace)]
    pub fn new(init: &'buf [u8]) -> SequenceBuffer<'buf> {
        SequenceBuffer { bytes: init }
    }
}

/// A `DecodeBufIterator` can be constructed from any of `SequenceBuffer`, `ArrayBuf` or `MapBuf`.
#[derive(Debug, Clone, Copy)]
pub enum DecodeBufIteratorSource {
    Sequence,
    Array,
    Map,
}

/// `DecodeBufIterator` keeps track of the current parse position in a decode buffer.
#[derive(Debug, Clone, Copy)]
pub struct DecodeBufIterator<'buf> {
    /// Underlying buffer being decoded.
    pub buf: &'buf [u8],
    /// The current position in `buf`.
    pub index: usize,
    /// The source of this `DecodeBufIterator` instance.
    pub source: DecodeBufIteratorSource,
}

impl<'buf> IntoIterator for SequenceBuffer<'buf> {
    type Item = CBOR<'buf>;
    type IntoIter = DecodeBufIterator<'buf>;

    /// Construct an Iterator adapter from a `SequenceBuffer`.
    #[cfg_attr(feature = "trace", trace)]
    fn into_iter(self) -> Self::IntoIter {
        DecodeBufIterator {
            buf: self.bytes,
            index: 0,
            source: Sequence,
        }
    }
}

impl<'buf> DecodeBufIterator<'buf> {
    /// Parse a single CBOR item from `DecodeBufIterator`. On exit, `self.index` points at the
    /// start of the next item (if there is one).
    #[cfg_attr(feature = "trace", trace)]
    #[inline]
    fn item(&mut self) -> Result<CBOR<'buf>> {
        let (next_index, cbor) = parse_item(self.buf, self.index)?;
        self.index = next_index;
        Ok(cbor)
    }
}

impl<'buf> Iterator for DecodeBufIterator<'buf> {
    type Item = CBOR<'buf>;

    #[cfg_attr(feature = "trace", trace)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index < self.buf.len() {
            self.item().ok()
        } else {
            None
        }
    }
}

/***************************************************************************************************
 * CBOR Parser
 **************************************************************************************************/

/// Basic function for parsing a single CBOR item from `buf` starting at `start_index`.
///
/// Assuming that all goes well, a pair, `(usize, CBOR)`, is returned where the `usize` value is
/// the index in `buf` of the next item - this may be outside the bounds of `buf`, and must be
/// checked before use. This function does bounds checking, so it is safe to use a previously
/// returned next-item index as an error will be returned if it is out of bounds.
fn parse_item(buf: &[u8], start_index: usize) -> Result<(usize, CBOR)> {
    if within(buf, start_index, 0) {
        let mt_ai_byte = buf[start_index];
        match mt_ai_byte {
            // Positive integers
            0x00..=0x1b => parse_unsigned(buf, start_index)
                .map(|(next_idx, val)| (next_idx, CBOR::UInt(val.as_u64()))),
            // Negative integers
            0x20..=0x3b => parse_unsigned(buf, start_index)
                .map(|(next_idx, val)| (next_idx, CBOR::NInt(val.as_u64()))),
            // Byte strings (definite length only)
            0x40..=0x5b => parse_bytestring(buf, start_index)
                .map(|(next_idx, bytes)| (next_idx, CBOR::Bstr(bytes))),
            // UTF-8 strings (definite length only)
            0x60..=0x7b => {
                let (next_index, raw_bytes) = parse_bytestring(buf, start_index)?;
                match from_utf8(raw_bytes) {
                    Ok(s) => Ok((next_index, CBOR::Tstr(s))),
                    Err(_) => Err(CBORError::UTF8Error),
                }
            }
            // Arrays (definite length only)
            0x80..=0x9b => parse_array(buf, start_index),
            // Maps (definite length only)
            0xa0..=0xbb => parse_map(buf, start_index),
            // Simple values (booleans, null, undefined). Tags (0xc0..=0xdb) and floats
            // (0xf9..=0xfb) are not part of the CTAP2 wire format and are rejected.
            0xe0..=0xf8 => {
                let (next_index, v) = parse_unsigned(buf, start_index)?;
                Ok((next_index, v.try_into_simple()?))
            }
            _ => Err(CBORError::MalformedEncoding),
        }
    } else {
        Err(CBORError::EndOfBuffer)
    }
}

/***************************************************************************************************
 * Integer parser helpers
 **************************************************************************************************/

/// Parse an unsigned integer value.
///
/// On entry the `start` index is assumed to identify an MT/AI byte within `buf`.
/// On return we have a sized unsigned integer value and the index within `buf` of the next value.
#[cfg_attr(feature = "trace", trace)]
pub(crate) fn parse_unsigned(buf: &[u8], start_index: usize) -> Result<(usize, AnyUnsigned)> {
    // We do not care about the value of the MT bits
    if within(buf, start_index, 0) {
        let ai = buf[start_index] & AI_MASK;
        if ai <= PAYLOAD_AI_BITS {
            Ok((start_index + size_of::<u8>(), AnyUnsigned::U8(ai)))
        } else if ai == PAYLOAD_ONE_BYTE {
            let (next_index, item_slice) = read_extent(buf, start_index + 1, size_of::<u8>())?;
            let result: core::result::Result<[u8; 1], _> = item_slice.try_into();
            match result {
                Ok(bytes) => Ok((next_index, AnyUnsigned::U8(u8::from_be_bytes(bytes)))),
                Err(_) => Err(CBORError::BadSliceLength),
            }
        } else if ai == PAYLOAD_TWO_BYTES {
            let (next_index, item_slice) = read_extent(buf, start_index + 1, size_of::<u16>())?;
            let result: core::result::Result<[u8; 2], _> = item_slice.try_into();
            match result {
                Ok(bytes) => Ok((next_index, AnyUnsigned::U16(u16::from_be_bytes(bytes)))),
                Err(_) => Err(CBORError::BadSliceLength),
            }
        } else if ai == PAYLOAD_FOUR_BYTES {
            let (next_index, item_slice) = read_extent(buf, start_index + 1, size_of::<u32>())?;
            let result: core::result::Result<[u8; 4], _> = item_slice.try_into();
            match result {
                Ok(bytes) => Ok((next_index, AnyUnsigned::U32(u32::from_be_bytes(bytes)))),
                Err(_) => Err(CBORError::BadSliceLength),
            }
        } else if ai == PAYLOAD_EIGHT_BYTES {
            let (next_index, item_slice) = read_extent(buf, start_index + 1, size_of::<u64>())?;
            let result: core::result::Result<[u8; 8], _> = item_slice.try_into();
            match result {
                Ok(bytes) => Ok((next_index, AnyUnsigned::U64(u64::from_be_bytes(bytes)))),
                Err(_) => Err(CBORError::BadSliceLength),
            }
        } else {
            Err(CBORError::MalformedEncoding)
        }
    } else {
        Err(CBORError::EndOfBuffer)
    }
}

/***************************************************************************************************
 * Bytestring, array and map helpers
 **************************************************************************************************/

/// Parse a bytestring starting at `start_index` in buffer `buf`. The index `start_index` should
/// indicate the MT/AI byte for the item to be parsed.
#[cfg_attr(feature = "trace", trace)]
pub(crate) fn parse_bytestring(buf: &[u8], start_index: usize) -> Result<(usize, &[u8])> {
    let (start_bstr_index, value) = parse_unsigned(buf, start_index)?;
    let length = value.as_usize();
    let (next_item_index, bytes) = read_extent(buf, start_bstr_index, length)?;
    Ok((next_item_index, bytes))
}

/// Parse an array. An array of length N is simply a sequence of N CBOR items, some of which
/// could themselves be arrays or maps.
///
/// In order to avoid heap allocation we return a typed buffer which itself can be iterated with
/// helper API functions resembling the slice API provided by Rust as standard.
#[cfg_attr(feature = "trace", trace)]
fn parse_array(buf: &[u8], start_index: usize) -> Result<(usize, CBOR)> {
    let (array_start_index, u_value) = parse_unsigned(buf, start_index)?;
    let n_items = u_value.as_usize();
    let next_index = skip_items(buf, array_start_index, n_items)?;

    // No need to check that length + index is legal - already checked in skip_items
    Ok((
        next_index,
        CBOR::Array(ArrayBuf::new(&buf[array_start_index..next_index], n_items)),
    ))
}

/// Parse a map. A map of N pairs is simply a sequence of N*2 CBOR items, some of which could
/// themselves be arrays or maps.
///
/// In order to avoid heap allocation we return a typed buffer which itself can be iterated with
/// helper API functions resembling the slice API provided by Rust as standard.
#[cfg_attr(feature = "trace", trace)]
fn parse_map(buf: &[u8], start_index: usize) -> Result<(usize, CBOR)> {
    let (array_start_index, value) = parse_unsigned(buf, start_index)?;
    let n_pairs = value.as_usize();
    let n_items = n_pairs * 2; // we read pairs of items
    let next_index = skip_items(buf, array_start_index, n_items)?;

    // No need to check that length + index is legal - already checked in skip_items
    Ok((
        next_index,
        CBOR::Map(MapBuf::new(&buf[array_start_index..next_index], n_pairs)),
    ))
}

/***************************************************************************************************
 * Other helpers
 **************************************************************************************************/

/// Try to skip over N items, returning the index (which may be out of bounds) of the start of
/// the N+1'th item.
#[cfg_attr(feature = "trace", trace)]
fn skip_items(buf: &[u8], start_index: usize, n_items: usize) -> Result<usize> {
    let mut next_index = start_index;

    // We only call skip_items() if we are parsing an array or map. In each case we have already
    // parsed the length component, which means that if `n_items` is zero, `start_index` is
    // already the index of the next item. The call to `parse_item()` fails if we overflow the
    // buffer.
    if n_items > 0 {
        for _i in 0..n_items {
            next_index = parse_item(buf, next_index)?.0;
        }
        Ok(next_index)
    } else {
        Ok(start_index)
    }
}

/// Return the index of the next item to parse and a slice over the item within `buf`.
#[cfg_attr(feature = "trace", trace)]
fn read_extent(buf: &[u8], start: usize, length: usize) -> Result<(usize, &[u8])> {
    if within(buf, start, length) {
        Ok((start + length, &buf[start..start + length]))
    } else {
        Err(CBORError::EndOfBuffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::TryFrom;

    #[test]
    fn decodes_inline_uint() {
        let b = [0x05u8];
        let mut it = SequenceBuffer::new(&b).into_iter();
        assert_eq!(it.next(), Some(CBOR::UInt(5)));
    }

    #[test]
    fn decodes_one_byte_extended_uint() {
        let b = [0x18u8, 0x18];
        let mut it = SequenceBuffer::new(&b).into_iter();
        assert_eq!(it.next(), Some(CBOR::UInt(24)));
    }

    #[test]
    fn decodes_negative_integer() {
        // -8, the COSE algorithm identifier for EdDSA: MT 1, AI 7.
        let b = [0x27u8];
        let mut it = SequenceBuffer::new(&b).into_iter();
        let cbor = it.next().unwrap();
        assert_eq!(i32::try_from(cbor).unwrap(), -8);
    }

    #[test]
    fn decodes_definite_map_with_int_keys() {
        // {1: 2, 3: 4}
        let b = [0xa2u8, 0x01, 0x02, 0x03, 0x04];
        let mut it = SequenceBuffer::new(&b).into_iter();
        let cbor = it.next().unwrap();
        let map = MapBuf::try_from(cbor).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get_int(1), Some(CBOR::UInt(2)));
        assert_eq!(map.get_int(3), Some(CBOR::UInt(4)));
    }

    #[test]
    fn rejects_indefinite_length_map() {
        let b = [0xbfu8, 0xff];
        let mut it = SequenceBuffer::new(&b).into_iter();
        assert_eq!(it.next(), None);
    }

    #[test]
    fn rejects_float_encoding() {
        let b = [0xfau8, 0x00, 0x00, 0x00, 0x00];
        let mut it = SequenceBuffer::new(&b).into_iter();
        assert_eq!(it.next(), None);
    }

    #[test]
    fn truncated_bytestring_is_end_of_buffer() {
        let b = [0x44u8, 0x01, 0x02];
        assert!(matches!(
            parse_item(&b, 0),
            Err(CBORError::EndOfBuffer)
        ));
    }
}
