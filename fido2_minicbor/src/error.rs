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
 * fido2_minicbor CBOR error API
 *
 * A small CBOR decoder/encoder tailored to the CTAP2 canonical subset (definite-length maps,
 * arrays and strings, no tags, no floats). Designed for use on constrained targets and requires
 * neither the Rust standard library nor an allocator.
 **************************************************************************************************/
use core::result;

#[cfg(any(feature = "full", test))]
use thiserror::Error;

/// An alias for `Result<T, CBORError>` used throughout this crate.
pub type Result<T> = result::Result<T, CBORError>;

/// `CBORError` describes why a decode or encode operation failed.
#[cfg_attr(any(feature="full", test), derive(Copy, Clone, Error, Debug))]
#[cfg_attr(all(not(feature="full"), not(test)), derive(Copy, Clone, Debug))]
pub enum CBORError {
    /// A number conversion has overflowed or underflowed.
    #[cfg_attr(any(feature="full", test), error("overflow or underflow in number conversion"))]
    OutOfRange,
    /// Attempt to convert an item to an incompatible type.
    #[cfg_attr(any(feature="full", test), error("item has incompatible type for requested conversion"))]
    IncompatibleType,
    /// Slice length is incompatible with the target type conversion.
    #[cfg_attr(any(feature="full", test), error("slice length incompatible with target type"))]
    BadSliceLength,
    /// Buffer too short to decode the next item, or too short to fit the encoded message.
    #[cfg_attr(any(feature="full", test), error("buffer insufficient to process the next item"))]
    EndOfBuffer,
    /// A tstr input contains an invalid UTF-8 sequence.
    #[cfg_attr(any(feature="full", test), error("tstr contains an invalid UTF8 sequence"))]
    UTF8Error,
    /// Encoding is illegal or unsupported by this decoder (indefinite length, tags, floats, ...).
    #[cfg_attr(any(feature="full", test), error("encoding is illegal or unsupported here"))]
    MalformedEncoding,
    /// No next item is possible because the end of the buffer was reached.
    #[cfg_attr(any(feature="full", test), error("no next item possible, end of buffer"))]
    NoMoreItems,
    /// The CBOR type indicated by the `str` was expected here.
    #[cfg_attr(any(feature="full", test), error("did not match expected CBOR type"))]
    ExpectedType(&'static str),
    /// A CBOR map does not contain the requested key.
    #[cfg_attr(any(feature="full", test), error("map does not contain the requested key"))]
    KeyNotPresent,
    /// The requested array index was outside the bounds of the encoded CBOR.
    #[cfg_attr(any(feature="full", test), error("array index out of bounds"))]
    IndexOutOfBounds,
}
