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
 * CBOR Abstract Syntax Tree
 *
 * CTAP2 restricts itself to a canonical subset of RFC8949: definite-length maps, arrays, byte
 * and text strings, integers, booleans and null. There is no use of tags or floating point
 * values anywhere in the protocol, so this AST does not represent them.
 **************************************************************************************************/
use crate::array::ArrayBuf;
use crate::error::CBORError;
use crate::map::MapBuf;

use core::convert::TryFrom;
use core::mem::transmute;

#[cfg(feature = "trace")]
use func_trace::trace;

#[cfg(feature = "trace")]
func_trace::init_depth_var!();

/// The data type for CBOR items. CBOR types may borrow immutably from an underlying buffer which
/// must therefore outlive the item itself - this is the `'buf` lifetime.
///
/// CBOR item representations are as follows:
///
/// - Positive and negative integers are stored as a u64 with enum tags used to distinguish
///   positive (UInt) and negative (NInt) numbers
/// - The bstr and tstr types are held as immutable borrowed slices over the CBOR parse buffer
/// - Simple types are stored as a u8
/// - Arrays are stored as a number of items and an immutable borrowed slice over the contents of
///   the array
/// - Maps are stored as a number of pairs and an immutable borrowed slice over the contents of the
///   map
#[derive(PartialEq, Debug, Copy, Clone)]
pub enum CBOR<'buf> {
    UInt(u64),
    NInt(u64),
    Bstr(&'buf [u8]),
    Tstr(&'buf str),
    Array(ArrayBuf<'buf>),
    Map(MapBuf<'buf>),
    Simple(u8),
    False,
    True,
    Null,
    Undefined,
    Eof,
}

/***************************************************************************************************
 * Standard Trait Implementations: From value to CBOR. Always succeeds
 **************************************************************************************************/

/// Convert a bool into CBOR
impl<'buf> From<bool> for CBOR<'buf> {
    #[inline(always)]
    fn from(v: bool) -> Self {
        if v {
            Self::True
        } else {
            Self::False
        }
    }
}

/// Convert a u8 into CBOR
impl<'buf> From<u8> for CBOR<'buf> {
    #[inline(always)]
    fn from(v: u8) -> Self {
        Self::UInt(v as u64)
    }
}

/// Convert a u16 into CBOR
impl<'buf> From<u16> for CBOR<'buf> {
    #[inline(always)]
    fn from(v: u16) -> Self {
        Self::UInt(v as u64)
    }
}

/// Convert a u32 into CBOR
impl<'buf> From<u32> for CBOR<'buf> {
    #[inline(always)]
    fn from(v: u32) -> Self {
        Self::UInt(v as u64)
    }
}

/// Convert a u64 into CBOR
impl<'buf> From<u64> for CBOR<'buf> {
    #[inline(always)]
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

/// Convert an i8 into CBOR
impl<'buf> From<i8> for CBOR<'buf> {
    #[inline]
    fn from(v: i8) -> Self {
        if v < 0 {
            Self::NInt((-1 - (v as i64)) as u64)
        } else {
            Self::UInt(v as u64)
        }
    }
}

/// Convert an i16 into CBOR
impl<'buf> From<i16> for CBOR<'buf> {
    #[inline]
    fn from(v: i16) -> Self {
        if v < 0 {
            Self::NInt((-1 - (v as i64)) as u64)
        } else {
            Self::UInt(v as u64)
        }
    }
}

/// Convert an i32 into CBOR. The CTAP2 COSE algorithm identifier for EdDSA is the negative
/// integer -8, which round-trips through this conversion.
impl<'buf> From<i32> for CBOR<'buf> {
    #[inline]
    fn from(v: i32) -> Self {
        if v < 0 {
            Self::NInt((-1 - (v as i64)) as u64)
        } else {
            Self::UInt(v as u64)
        }
    }
}

/// Convert an i64 into CBOR
impl<'buf> From<i64> for CBOR<'buf> {
    #[inline]
    fn from(v: i64) -> Self {
        if v < 0 {
            Self::NInt((-1 - v) as u64)
        } else {
            Self::UInt(v as u64)
        }
    }
}

/// Convert an &str into CBOR.
///
/// # Lifetime
///
/// The str reference *must* last at least as long as the CBOR item. If the
/// item is later encoded, it will be copied, but only at encode time.
impl<'buf> From<&'buf str> for CBOR<'buf> {
    #[inline]
    fn from(v: &'buf str) -> Self {
        Self::Tstr(v)
    }
}

/// Convert an &[u8] into CBOR.
///
/// # Lifetime
///
/// The slice reference *must* last at least as long as the CBOR item. If the
/// item is later encoded, it will be copied, but only at encode time.
impl<'buf> From<&'buf [u8]> for CBOR<'buf> {
    #[inline]
    fn from(v: &'buf [u8]) -> Self {
        Self::Bstr(v)
    }
}

/***************************************************************************************************
 * Standard Trait Implementations: Try to convert CBOR into a value. Always fallible
 **************************************************************************************************/

/// Attempt to convert CBOR into bool
impl<'buf> TryFrom<CBOR<'buf>> for bool {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        if let CBOR::True = value {
            Ok(true)
        } else if let CBOR::False = value {
            Ok(false)
        } else {
            Err(CBORError::IncompatibleType)
        }
    }
}

/// Attempt to convert CBOR into u8
impl<'buf> TryFrom<CBOR<'buf>> for u8 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        if let CBOR::UInt(v) = value {
            if v <= u8::MAX as u64 {
                Ok(v as u8)
            } else {
                Err(CBORError::OutOfRange)
            }
        } else {
            Err(CBORError::IncompatibleType)
        }
    }
}

/// Attempt to convert CBOR into u16
impl<'buf> TryFrom<CBOR<'buf>> for u16 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        if let CBOR::UInt(v) = value {
            if v <= u16::MAX as u64 {
                Ok(v as u16)
            } else {
                Err(CBORError::OutOfRange)
            }
        } else {
            Err(CBORError::IncompatibleType)
        }
    }
}

/// Attempt to convert CBOR into u32
impl<'buf> TryFrom<CBOR<'buf>> for u32 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        if let CBOR::UInt(v) = value {
            if v <= u32::MAX as u64 {
                Ok(v as u32)
            } else {
                Err(CBORError::OutOfRange)
            }
        } else {
            Err(CBORError::IncompatibleType)
        }
    }
}

/// Attempt to convert CBOR into u64
impl<'buf> TryFrom<CBOR<'buf>> for u64 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        if let CBOR::UInt(v) = value {
            Ok(v)
        } else {
            Err(CBORError::IncompatibleType)
        }
    }
}

/// Attempt to convert CBOR into i8
///
/// This will fail, for unsigned values, if n > i8::MAX.
/// This will fail, for signed values, if n < i8::MIN.
///
/// For positive values it is sufficient to check the MSB is not set (MSB used for 2's
/// complement sign).
///
/// For negative values it is also sufficient to check that the MSB is not set. This is because
/// it gives us a minimum value of -1 - (2^(n-1) - 1), for example, if we have the value -128
/// (i8::MIN), it is represented as 1 - 127. Similar rules apply for all signed types.
impl<'buf> TryFrom<CBOR<'buf>> for i8 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::UInt(val) => {
                if val <= i8::MAX as u64 {
                    Ok(val as i8)
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            CBOR::NInt(val) => {
                if val <= i8::MAX as u64 {
                    Ok(-1 - (val as i8))
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert CBOR into i16
impl<'buf> TryFrom<CBOR<'buf>> for i16 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::UInt(val) => {
                if val <= i16::MAX as u64 {
                    Ok(val as i16)
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            CBOR::NInt(val) => {
                if val <= i16::MAX as u64 {
                    Ok(-1 - (val as i16))
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert CBOR into i32. Used to decode COSE algorithm identifiers such as EdDSA
/// (-8), where the unsigned magnitude always fits comfortably within i32's range.
impl<'buf> TryFrom<CBOR<'buf>> for i32 {
    type Error = CBORError;

    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::UInt(val) => {
                if val <= i32::MAX as u64 {
                    Ok(val as i32)
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            CBOR::NInt(val) => {
                if val <= i32::MAX as u64 {
                    Ok(-1 - (val as i32))
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert CBOR into i64
///
/// For positive values it is sufficient to check the MSB is not set (MSB used for 2's
/// complement sign).
///
/// For negative values it is also sufficient to check that the MSB is not set. This is because
/// it gives us a minimum value of -1 - (2^(n-1) - 1).
impl<'buf> TryFrom<CBOR<'buf>> for i64 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::UInt(val) => {
                if val & (1 << 63) == 0 {
                    Ok(unsafe { transmute::<u64, i64>(val) })
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            CBOR::NInt(val) => {
                if val & (1 << 63) == 0 {
                    let v = !val;
                    Ok(unsafe { transmute::<u64, i64>(v) })
                } else {
                    Err(CBORError::OutOfRange)
                }
            }
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert CBOR into i128
///
/// This will always succeed for integer values as CBOR only supports values over 64 bits
/// which all fit in 128 bits.
impl<'buf> TryFrom<CBOR<'buf>> for i128 {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::UInt(v) => Ok(v as i128),
            CBOR::NInt(v) => Ok(-1 - (v as i128)),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert a CBOR value into a &str
///
/// # Lifetime
///
/// The lifetime of the str will be the lifetime of the underlying buffer
/// on which the CBOR item is bounded.
impl<'buf> TryFrom<CBOR<'buf>> for &'buf str {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR<'buf>) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::Tstr(s) => Ok(s),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert a CBOR item into a &[u8]
///
/// # Lifetime
///
/// The lifetime of the &[u8] will be the lifetime of the underlying buffer
/// on which the CBOR item is bounded.
impl<'buf> TryFrom<CBOR<'buf>> for &'buf [u8] {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR<'buf>) -> core::result::Result<Self, Self::Error> {
        match value {
            CBOR::Bstr(bytes) => Ok(bytes),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert a CBOR item into an ArrayBuf
impl<'buf> TryFrom<CBOR<'buf>> for ArrayBuf<'buf> {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR<'buf>) -> Result<Self, Self::Error> {
        match value {
            CBOR::Array(ab) => Ok(ab),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}

/// Attempt to convert a CBOR item into a MapBuf
impl<'buf> TryFrom<CBOR<'buf>> for MapBuf<'buf> {
    type Error = CBORError;

    #[cfg_attr(feature = "trace", trace)]
    fn try_from(value: CBOR<'buf>) -> Result<Self, Self::Error> {
        match value {
            CBOR::Map(mb) => Ok(mb),
            _ => Err(CBORError::IncompatibleType),
        }
    }
}
