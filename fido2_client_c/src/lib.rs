/***************************************************************************************************
 * Copyright (c) 2021-2022, Qualcomm Innovation Center, Inc. All rights reserved.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software
 * and associated documentation files (the “Software”), to deal in the Software without
 * restriction, including without limitation the rights to use, copy, modify, merge, publish,
 * distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
 * Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all copies or
 * substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
 * BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
 * NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
 * DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
 **************************************************************************************************/
/***************************************************************************************************
 * Exported FIDO2 Client API (C language)
 *
 * A caller on the other side of this boundary cannot hold a `&dyn HostIo` or `&dyn CryptoProvider`,
 * so it supplies one function-pointer vtable for each, together with an opaque context pointer -
 * the same shape the original connector used before `fido2_hal` turned it into a trait. Each
 * exported function opens a device, performs exactly one operation, and closes the device again
 * before returning, rather than handing back a persistent session handle: `fido2_client::Device`
 * borrows its `HostIo`/`CryptoProvider` for its own lifetime, and there is no allocator on this
 * side of the boundary to park a self-referential handle in between calls.
 **************************************************************************************************/
#![no_std]

// Pull in std if we are testing or if it is defined as feature (because we run tests on a
// platform supporting I/O and full feature set.
#[cfg(any(feature = "std", test))]
extern crate std;

// If we are really building no_std, pull in core as well. It is aliased as std so that "use"
// statements are always the same
#[cfg(all(not(feature = "std"), not(test)))]
extern crate core as std;

use core::ffi::c_void;

use std::slice::{from_raw_parts, from_raw_parts_mut};

extern crate fido2_client;
extern crate fido2_error;
extern crate fido2_hal;

use fido2_client::{AssertionRequest, Fido2Error};
use fido2_error::c_errors::{ERROR_CBOR, ERROR_NULL_POINTER, ERROR_SHORT_BUFFER, SUCCESS};
use fido2_hal::{CryptoProvider, HostIo};

/***************************************************************************************************
 * Debug tracing support under `trace` feature
 **************************************************************************************************/
#[cfg(feature = "trace")]
use tracing::instrument;

/***************************************************************************************************
 * Host I/O and crypto vtables
 **************************************************************************************************/
/// Function-pointer form of [`fido2_hal::HostIo`] for callers across the C ABI boundary. `ctx` is
/// an opaque pointer passed back to every function unchanged; ownership and lifetime of whatever
/// it points to are the caller's responsibility.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Fido2HostIoVtable {
    pub ctx: *mut c_void,
    pub open: unsafe extern "C" fn(ctx: *mut c_void) -> u32,
    pub close: unsafe extern "C" fn(ctx: *mut c_void) -> u32,
    pub write: unsafe extern "C" fn(ctx: *mut c_void, data: *const u8, len: usize) -> u32,
    pub read: unsafe extern "C" fn(
        ctx: *mut c_void,
        out: *mut u8,
        out_len: usize,
        bytes_read: *mut usize,
    ) -> u32,
}

/// Function-pointer form of [`fido2_hal::CryptoProvider`] for callers across the C ABI boundary.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct Fido2CryptoVtable {
    pub ctx: *mut c_void,
    pub sha256: unsafe extern "C" fn(ctx: *mut c_void, data: *const u8, len: usize, out: *mut u8),
    pub sha512: unsafe extern "C" fn(ctx: *mut c_void, data: *const u8, len: usize, out: *mut u8),
    #[allow(clippy::too_many_arguments)]
    pub aes_gcm_encrypt: unsafe extern "C" fn(
        ctx: *mut c_void,
        key: *const u8,
        iv: *const u8,
        aad: *const u8,
        aad_len: usize,
        pt: *const u8,
        pt_len: usize,
        ct: *mut u8,
        tag: *mut u8,
    ) -> u32,
    #[allow(clippy::too_many_arguments)]
    pub aes_gcm_decrypt: unsafe extern "C" fn(
        ctx: *mut c_void,
        key: *const u8,
        iv: *const u8,
        aad: *const u8,
        aad_len: usize,
        ct: *const u8,
        ct_len: usize,
        tag: *const u8,
        pt: *mut u8,
    ) -> u32,
    pub ed25519_sign: unsafe extern "C" fn(
        ctx: *mut c_void,
        sk: *const u8,
        msg: *const u8,
        msg_len: usize,
        sig: *mut u8,
    ) -> u32,
    pub ed25519_verify: unsafe extern "C" fn(
        ctx: *mut c_void,
        pk: *const u8,
        msg: *const u8,
        msg_len: usize,
        sig: *const u8,
    ) -> u8,
    pub random: unsafe extern "C" fn(ctx: *mut c_void, buf: *mut u8, len: usize) -> u32,
}

struct VtableHostIo(Fido2HostIoVtable);

// Safety: the caller is required by the contract of `Fido2HostIoVtable::ctx` to provide a context
// that is safe to use from whichever thread `fido2_client`'s synchronous API runs on.
unsafe impl Send for VtableHostIo {}

impl HostIo for VtableHostIo {
    fn open(&mut self) -> Result<(), Fido2Error> {
        if unsafe { (self.0.open)(self.0.ctx) } == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::Transport)
        }
    }

    fn close(&mut self) -> Result<(), Fido2Error> {
        if unsafe { (self.0.close)(self.0.ctx) } == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::Transport)
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Fido2Error> {
        let rc = unsafe { (self.0.write)(self.0.ctx, data.as_ptr(), data.len()) };
        if rc == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::Transport)
        }
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize, Fido2Error> {
        let mut n: usize = 0;
        let rc = unsafe { (self.0.read)(self.0.ctx, out.as_mut_ptr(), out.len(), &mut n) };
        if rc == SUCCESS {
            Ok(n)
        } else {
            Err(Fido2Error::Transport)
        }
    }
}

struct VtableCrypto(Fido2CryptoVtable);

// Safety: see `VtableHostIo`. `CryptoProvider` additionally requires `Sync`; a provider built on
// caller-supplied function pointers has no Rust-visible interior state, so this holds as long as
// the functions themselves are reentrant, which is part of the same caller contract.
unsafe impl Send for VtableCrypto {}
unsafe impl Sync for VtableCrypto {}

impl CryptoProvider for VtableCrypto {
    fn sha256(&self, data: &[u8], out: &mut [u8; 32]) {
        unsafe { (self.0.sha256)(self.0.ctx, data.as_ptr(), data.len(), out.as_mut_ptr()) };
    }

    fn sha512(&self, data: &[u8], out: &mut [u8; 64]) {
        unsafe { (self.0.sha512)(self.0.ctx, data.as_ptr(), data.len(), out.as_mut_ptr()) };
    }

    fn aes_gcm_encrypt(
        &self,
        key: &[u8; 32],
        iv: &[u8; 12],
        aad: &[u8],
        pt: &[u8],
        ct: &mut [u8],
        tag: &mut [u8; 16],
    ) -> Result<(), Fido2Error> {
        let rc = unsafe {
            (self.0.aes_gcm_encrypt)(
                self.0.ctx,
                key.as_ptr(),
                iv.as_ptr(),
                aad.as_ptr(),
                aad.len(),
                pt.as_ptr(),
                pt.len(),
                ct.as_mut_ptr(),
                tag.as_mut_ptr(),
            )
        };
        if rc == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::Crypto)
        }
    }

    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        iv: &[u8; 12],
        aad: &[u8],
        ct: &[u8],
        tag: &[u8; 16],
        pt: &mut [u8],
    ) -> Result<(), Fido2Error> {
        let rc = unsafe {
            (self.0.aes_gcm_decrypt)(
                self.0.ctx,
                key.as_ptr(),
                iv.as_ptr(),
                aad.as_ptr(),
                aad.len(),
                ct.as_ptr(),
                ct.len(),
                tag.as_ptr(),
                pt.as_mut_ptr(),
            )
        };
        if rc == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::IntegrityCheckFailed)
        }
    }

    fn ed25519_sign(&self, sk: &[u8; 32], msg: &[u8], sig: &mut [u8; 64]) -> Result<(), Fido2Error> {
        let rc = unsafe {
            (self.0.ed25519_sign)(self.0.ctx, sk.as_ptr(), msg.as_ptr(), msg.len(), sig.as_mut_ptr())
        };
        if rc == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::Crypto)
        }
    }

    fn ed25519_verify(&self, pk: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> bool {
        unsafe { (self.0.ed25519_verify)(self.0.ctx, pk.as_ptr(), msg.as_ptr(), msg.len(), sig.as_ptr()) != 0 }
    }

    fn random(&self, buf: &mut [u8]) -> Result<(), Fido2Error> {
        let rc = unsafe { (self.0.random)(self.0.ctx, buf.as_mut_ptr(), buf.len()) };
        if rc == SUCCESS {
            Ok(())
        } else {
            Err(Fido2Error::Crypto)
        }
    }
}

/***************************************************************************************************
 * C language API
 **************************************************************************************************/

/// Opens a device over `io`, requests an assertion for `rp_id`, verifies it against `public_key`
/// under COSE algorithm `cose_alg`, and writes the returned credential id to `cred_id_out`.
/// Closes the device again before returning, whether or not the assertion succeeded.
///
/// `scratch` is working storage for the raw CBOR reply and must be at least as large as the
/// authenticator's negotiated message size; `ERROR_SHORT_BUFFER` is returned if it is not (or if
/// `cred_id_out_cap` is too small for the returned credential id), without leaking which buffer
/// was short.
///
/// # Safety
///
/// This function assumes that the caller ensures the following invariants are maintained:
///
/// - `io` and `crypto` point to fully initialized vtables whose function pointers remain valid
///   and reentrant-safe for the duration of the call.
/// - `rp_id` points to `rp_id_len` valid, UTF-8-encoded bytes.
/// - `client_data_hash` and `public_key` each point to 32 readable bytes.
/// - `scratch` points to `scratch_len` writable bytes; `cred_id_out` points to `cred_id_out_cap`
///   writable bytes; `cred_id_out_len` points to a single writable `usize`.
#[no_mangle]
#[cfg_attr(feature = "trace", instrument(skip_all))]
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn Fido2C_GetAssertion(
    io: *const Fido2HostIoVtable,
    crypto: *const Fido2CryptoVtable,
    rp_id: *const u8,
    rp_id_len: usize,
    client_data_hash: *const u8,
    cose_alg: i32,
    public_key: *const u8,
    up: u8,
    uv: u8,
    request_large_blob_key: u8,
    scratch: *mut u8,
    scratch_len: usize,
    cred_id_out: *mut u8,
    cred_id_out_cap: usize,
    cred_id_out_len: *mut usize,
) -> u32 {
    if io.is_null()
        || crypto.is_null()
        || rp_id.is_null()
        || client_data_hash.is_null()
        || public_key.is_null()
        || scratch.is_null()
        || cred_id_out.is_null()
        || cred_id_out_len.is_null()
    {
        return ERROR_NULL_POINTER;
    }

    let rp_id_str = match core::str::from_utf8(from_raw_parts(rp_id, rp_id_len)) {
        Ok(s) => s,
        Err(_) => return ERROR_CBOR,
    };
    let mut hash = [0u8; 32];
    hash.copy_from_slice(from_raw_parts(client_data_hash, 32));
    let mut pk = [0u8; 32];
    pk.copy_from_slice(from_raw_parts(public_key, 32));

    let mut host_io = VtableHostIo(*io);
    let crypto_provider = VtableCrypto(*crypto);

    let mut device = match fido2_client::open(&mut host_io, &crypto_provider) {
        Ok(d) => d,
        Err(e) => return e.into(),
    };

    let request = AssertionRequest {
        rp_id: rp_id_str,
        client_data_hash: hash,
        request_large_blob_key: request_large_blob_key != 0,
        up: up != 0,
        uv: uv != 0,
    };
    let scratch_slice = from_raw_parts_mut(scratch, scratch_len);
    let result = fido2_client::get_assertion(&mut device, &request, cose_alg, &pk, scratch_slice);
    let _ = fido2_client::close(&mut device);

    match result {
        Ok(reply) => {
            let id = reply.credential_id();
            if id.len() > cred_id_out_cap {
                return ERROR_SHORT_BUFFER;
            }
            from_raw_parts_mut(cred_id_out, cred_id_out_cap)[..id.len()].copy_from_slice(id);
            core::ptr::write(cred_id_out_len, id.len());
            SUCCESS
        }
        Err(e) => e.into(),
    }
}

/// Opens a device over `io`, retrieves and decrypts the large-blob array entry matching `key`,
/// and writes the decompressed plaintext to `out`. Closes the device again before returning,
/// whether or not retrieval succeeded.
///
/// # Safety
///
/// This function assumes that the caller ensures the following invariants are maintained:
///
/// - `io` and `crypto` point to fully initialized vtables whose function pointers remain valid
///   and reentrant-safe for the duration of the call.
/// - `key` points to 32 readable bytes.
/// - `out` points to `out_cap` writable bytes; `out_len` points to a single writable `usize`.
#[no_mangle]
#[cfg_attr(feature = "trace", instrument(skip_all))]
pub unsafe extern "C" fn Fido2C_GetLargeBlob(
    io: *const Fido2HostIoVtable,
    crypto: *const Fido2CryptoVtable,
    key: *const u8,
    out: *mut u8,
    out_cap: usize,
    out_len: *mut usize,
) -> u32 {
    if io.is_null() || crypto.is_null() || key.is_null() || out.is_null() || out_len.is_null() {
        return ERROR_NULL_POINTER;
    }

    let mut blob_key = [0u8; 32];
    blob_key.copy_from_slice(from_raw_parts(key, 32));

    let mut host_io = VtableHostIo(*io);
    let crypto_provider = VtableCrypto(*crypto);

    let mut device = match fido2_client::open(&mut host_io, &crypto_provider) {
        Ok(d) => d,
        Err(e) => return e.into(),
    };

    let out_slice = from_raw_parts_mut(out, out_cap);
    let result = fido2_client::get_large_blob_payload(&mut device, &blob_key, out_slice);
    let _ = fido2_client::close(&mut device);

    match result {
        Ok(n) => {
            core::ptr::write(out_len, n);
            SUCCESS
        }
        Err(e) => e.into(),
    }
}
