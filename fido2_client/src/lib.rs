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
#![no_std]

// Pull in std if we are testing or if it is defined as feature (because we run tests on a
// platform supporting I/O and full feature set.
#[cfg(any(feature = "std", test))]
extern crate std;

// If we are really building no_std, pull in core as well. It is aliased as std so that "use"
// statements are always the same
#[cfg(all(not(feature = "std"), not(test)))]
extern crate core as std;

extern crate fido2_common;
extern crate fido2_error;
extern crate fido2_hal;
extern crate fido2_minicbor;

mod assertion;
mod device;
mod info;
mod iso7816;
mod largeblob;
mod transport;

#[cfg(feature = "trace")]
use tracing::instrument;

pub use assertion::{AssertionReply, AssertionRequest, GET_ASSERTION_CMD};
pub use device::{
    Device, FIDO_DEV_CREDMAN, FIDO_DEV_CRED_PROT, FIDO_DEV_LARGE_BLOB, FIDO_DEV_LARGE_BLOB_KEY,
    FIDO_DEV_PIN_PROTOCOL_1, FIDO_DEV_PIN_PROTOCOL_2, FIDO_DEV_PIN_SET, FIDO_DEV_TOKEN_PERMS,
    FIDO_DEV_UV_SET, FIDO_MAXLARGEBLOB, FIDO_MAXMSG,
};
pub use fido2_error::{CtapStatus, Fido2Error};
pub use info::InfoRecord;
pub use largeblob::{get_large_blob, LARGEBLOB_KEY_SIZE};
pub use transport::{FIDO_AID, FIDO_CAP_CBOR, FIDO_CAP_NMSG};

/// CTAP2 command byte for `authenticatorGetInfo`.
pub(crate) const GET_INFO_CMD: u8 = 0x04;

/***************************************************************************************************
 * Rust Language API
 *
 * A thin, session-free wrapper around `Device`: open a connection, ask for an assertion or a
 * large-blob payload, close it. There is no service-discovery layer here - a client is built
 * against exactly one `HostIo`/`CryptoProvider` pair supplied by the caller, which on a
 * constrained host is usually the only authenticator transport available.
 **************************************************************************************************/

/// Open a connection to the authenticator reachable through `io`, performing the INIT/GetInfo
/// handshake. `crypto` is retained for the lifetime of the returned `Device` and used both for the
/// nonce generated during the handshake and for any verification performed by
/// [`get_assertion`]/[`get_large_blob`].
#[cfg_attr(feature = "trace", instrument(skip_all))]
pub fn open<'a>(
    io: &'a mut dyn fido2_hal::HostIo,
    crypto: &'a dyn fido2_hal::CryptoProvider,
) -> Result<Device<'a>, Fido2Error> {
    let mut device = Device::new(io, crypto);
    device.open()?;
    Ok(device)
}

/// Close a previously opened device. Idempotent.
#[cfg_attr(feature = "trace", instrument(skip_all))]
pub fn close(device: &mut Device<'_>) -> Result<(), Fido2Error> {
    device.close()
}

/// Request an assertion from `device` and verify it against `rp_id`/`client_data_hash` using the
/// authenticator's public key. Only the EdDSA COSE algorithm is supported for verification; any
/// other `cose_alg` value fails with `Fido2Error::Ctap(CtapStatus::UnsupportedOption)`.
#[cfg_attr(feature = "trace", instrument(skip_all))]
#[allow(clippy::too_many_arguments)]
pub fn get_assertion(
    device: &mut Device<'_>,
    request: &AssertionRequest<'_>,
    cose_alg: i32,
    public_key: &[u8; 32],
    scratch: &mut [u8],
) -> Result<AssertionReply, Fido2Error> {
    let reply = assertion::get_assertion(device, request, scratch)?;
    reply.verify(
        device.crypto(),
        request.rp_id,
        &request.client_data_hash,
        cose_alg,
        public_key,
        request.uv,
    )?;
    Ok(reply)
}

/// Fetch and decrypt the large-blob entry opened by `key`, inflating it into `out`. Returns the
/// number of plaintext bytes written, or `Fido2Error::NotFound` if no entry in the authenticator's
/// large-blob array decrypts under `key`.
#[cfg_attr(feature = "trace", instrument(skip_all))]
pub fn get_large_blob_payload(
    device: &mut Device<'_>,
    key: &[u8; LARGEBLOB_KEY_SIZE],
    out: &mut [u8],
) -> Result<usize, Fido2Error> {
    let crypto = device.crypto();
    largeblob::get_large_blob(device, crypto, key, out)
}
