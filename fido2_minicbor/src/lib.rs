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
 * fido2_minicbor module definition
 *
 * A CBOR (RFC8949) codec scoped to the canonical subset used by CTAP2: definite-length maps,
 * arrays, byte/text strings, integers and booleans. This implementation is designed for use in
 * constrained systems and requires neither the Rust standard library nor an allocator.
 **************************************************************************************************/

#![no_std]
#![warn(missing_docs)]

//! # fido2_minicbor
//!
//! `fido2_minicbor` is a small CBOR codec used to build and parse the CTAP2 command and response
//! bodies exchanged with a FIDO2 authenticator. It deliberately does not implement all of
//! RFC8949: CTAP2 never sends indefinite-length items, tags, or floating point values, so none of
//! those are supported here, which keeps the decoder's dispatch table and the code size small
//! enough for a microcontroller target.
//!
//! The default configuration does not require an allocator and serializes or deserializes
//! directly on a byte buffer supplied by the caller. The `full` feature pulls in `std` and
//! `thiserror` for richer error messages on hosts that can afford them; the bare, `no_std`
//! configuration is what ships on an embedded target.
//!
//! ## Example
//!
//! Decoding the integer-keyed response map returned by `authenticatorGetInfo`:
//!
//! ```
//! use fido2_minicbor::decoder::SequenceBuffer;
//! use fido2_minicbor::types::CBOR;
//! use core::convert::TryFrom;
//!
//! let response: &[u8] = &[0xa1, 0x03, 0x41, 0x00]; // {3: h'00'} - aaguid truncated for brevity
//! let mut it = SequenceBuffer::new(response).into_iter();
//! let map = fido2_minicbor::decoder::MapBuf::try_from(it.next().unwrap()).unwrap();
//! let aaguid: &[u8] = map.lookup(3).unwrap();
//! assert_eq!(aaguid, &[0x00]);
//! ```

#[cfg(any(feature = "full", test))]
extern crate std;

#[cfg(all(not(feature = "std"), not(test)))]
extern crate core as std;

pub(crate) mod array;
pub(crate) mod ast;
pub(crate) mod decode;
pub(crate) mod encode;
pub(crate) mod map;
pub(crate) mod utils;

/// The `error` module contains error definitions used throughout `fido2_minicbor`.
pub mod error;

/// The `types` module exports the main [`types::CBOR`] item type.
pub mod types {
    pub use super::ast::CBOR;
}

/// The `decoder` module exports types and functions for decoding CBOR items from a buffer.
pub mod decoder {
    pub use super::array::ArrayBuf;
    pub use super::decode::{DecodeBufIterator, SequenceBuffer};
    pub use super::map::MapBuf;
}

/// The `encoder` module exports [`encoder::Encoder`], used to build CBOR-encoded command
/// bodies directly into a caller-supplied buffer.
pub mod encoder {
    pub use super::encode::{head_len, Encoder};
}
