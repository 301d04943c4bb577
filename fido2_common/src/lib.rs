/***************************************************************************************************
 * Copyright (c) 2021-2022, Qualcomm Innovation Center, Inc. All rights reserved.
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
 * fido2_common
 *
 * Buffer types shared between the fido2 client crates. No allocator is available on the target, so
 * every buffer used while talking to an authenticator is a fixed-capacity slice owned by the
 * caller. `Blob` tracks how much of such a slice is in use; `Reader`/`Writer` walk a slice in
 * lock-step, the way the original C implementation's `fido_buf_read`/`fido_buf_write` walk a raw
 * pointer and remaining-length pair.
 **************************************************************************************************/
#![no_std]

use fido2_error::Fido2Error;

/// A fixed-capacity, borrowed byte buffer with a tracked length.
///
/// `Blob` wraps a caller-owned slice together with how much of it currently holds valid data, the
/// same role `MessageBuffer`'s `(message, size, maxsize)` triple played in the C API - but without
/// the raw pointer, since the backing store is a borrow-checked Rust slice.
pub struct Blob<'a> {
    storage: &'a mut [u8],
    len: usize,
}

impl<'a> Blob<'a> {
    /// Wrap `storage` as an initially-empty blob.
    pub fn new(storage: &'a mut [u8]) -> Self {
        Blob { storage, len: 0 }
    }

    /// Total capacity of the backing storage.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of bytes currently holding valid data.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if no bytes are currently in use.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid portion of the blob.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// The valid portion of the blob, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[..self.len]
    }

    /// Discard any content, resetting the blob to empty.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Mark `len` bytes of the backing storage as valid. The caller is responsible for having
    /// written meaningful data into that range beforehand.
    pub fn set_len(&mut self, len: usize) -> Result<(), Fido2Error> {
        if len > self.storage.len() {
            return Err(Fido2Error::ShortBuffer(len));
        }
        self.len = len;
        Ok(())
    }

    /// Append `data` to the blob, growing its length. Fails if `data` does not fit in the
    /// remaining capacity.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<(), Fido2Error> {
        let new_len = self
            .len
            .checked_add(data.len())
            .ok_or(Fido2Error::Internal)?;
        if new_len > self.storage.len() {
            return Err(Fido2Error::ShortBuffer(new_len));
        }
        self.storage[self.len..new_len].copy_from_slice(data);
        self.len = new_len;
        Ok(())
    }
}

/// Sequential, bounds-checked reader over a byte slice.
///
/// Each `read*` call consumes bytes from the front of the slice and advances the cursor, the same
/// way `fido_buf_read` shrinks a `(buf, len)` pointer/length pair with every read.
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    /// Construct a reader over `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Consume and return the next `count` bytes.
    pub fn read(&mut self, count: usize) -> Result<&'a [u8], Fido2Error> {
        if count > self.buf.len() {
            return Err(Fido2Error::InvalidArgument);
        }
        let (head, tail) = self.buf.split_at(count);
        self.buf = tail;
        Ok(head)
    }

    /// Consume and return the next byte.
    pub fn read_u8(&mut self) -> Result<u8, Fido2Error> {
        Ok(self.read(1)?[0])
    }

    /// Consume and return the next two bytes as a big-endian `u16`.
    pub fn read_u16_be(&mut self) -> Result<u16, Fido2Error> {
        let bytes = self.read(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Consume and return the next four bytes as a big-endian `u32`.
    ///
    /// Used for authenticator data's `signCount`, which CTAP2 always encodes big-endian.
    pub fn read_u32_be(&mut self) -> Result<u32, Fido2Error> {
        let bytes = self.read(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Consume and return the next eight bytes as a little-endian `u64`.
    ///
    /// Used for a large-blob array entry's `origSize`, which is little-endian and must not be
    /// confused with the big-endian `signCount` above.
    pub fn read_u64_le(&mut self) -> Result<u64, Fido2Error> {
        let bytes = self.read(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }
}

/// Sequential, bounds-checked writer over a mutable byte slice.
///
/// Mirrors `fido_buf_write`'s `(buf, len)` pointer/length pair that shrinks with every write.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    /// Construct a writer over `buf`, starting at position 0.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Writer { buf, pos: 0 }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes of capacity remaining.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Write `src` at the current position, advancing it.
    pub fn write(&mut self, src: &[u8]) -> Result<(), Fido2Error> {
        if src.len() > self.remaining() {
            return Err(Fido2Error::InvalidArgument);
        }
        self.buf[self.pos..self.pos + src.len()].copy_from_slice(src);
        self.pos += src.len();
        Ok(())
    }

    /// The bytes written so far.
    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_tracks_length_independent_of_capacity() {
        let mut storage = [0u8; 16];
        let mut blob = Blob::new(&mut storage);
        assert_eq!(blob.capacity(), 16);
        assert!(blob.is_empty());
        blob.extend_from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(blob.as_slice(), &[1, 2, 3]);
        blob.clear();
        assert!(blob.is_empty());
    }

    #[test]
    fn blob_extend_rejects_overflow() {
        let mut storage = [0u8; 2];
        let mut blob = Blob::new(&mut storage);
        assert!(matches!(
            blob.extend_from_slice(&[1, 2, 3]),
            Err(Fido2Error::ShortBuffer(3))
        ));
    }

    #[test]
    fn reader_consumes_in_lock_step() {
        let data = [0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x2a];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u16_be().unwrap(), 0x0000);
        assert_eq!(r.read_u16_be().unwrap(), 0x0102);
        assert_eq!(r.read_u32_be().unwrap(), 42);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn reader_rejects_short_read() {
        let data = [0x00u8];
        let mut r = Reader::new(&data);
        assert!(matches!(r.read_u16_be(), Err(Fido2Error::InvalidArgument)));
    }

    #[test]
    fn writer_tracks_position() {
        let mut out = [0u8; 4];
        let mut w = Writer::new(&mut out);
        w.write(&[1, 2]).unwrap();
        w.write(&[3, 4]).unwrap();
        assert_eq!(w.written(), &[1, 2, 3, 4]);
        assert!(w.write(&[5]).is_err());
    }
}
