/***************************************************************************************************
 * Copyright © 2021-2022, Qualcomm Innovation Center, Inc. All rights reserved.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated
 * documentation files (the “Software”), to deal in the Software without restriction, including without limitation
 * the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and
 * to permit persons to whom the Software is furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice (including the next
 * paragraph) shall be included in all copies or substantial portions of the
 * Software.
 *
 * THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO
 * THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
 * TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 **************************************************************************************************/
/***************************************************************************************************
 * Device object
 *
 * Owns the handshake with a single authenticator: opening the transport, exchanging INIT and
 * GetInfo, and deriving the capability flags the rest of the crate gates behavior on. Everything
 * that follows `open` (assertions, large-blob retrieval) goes through `Device::cbor_transaction`,
 * which is the one place the CTAP status byte embedded in a CBOR reply is checked.
 **************************************************************************************************/
use fido2_error::{CtapStatus, Fido2Error};
use fido2_hal::{CryptoProvider, HostIo};

use fido2_common::Blob;

use crate::info::{self, InfoRecord};
use crate::transport::{CtapCommand, Transport};

/// Upper bound on the negotiated CTAP message size, independent of what the authenticator
/// advertises. Chosen to fit comfortably in the RAM budget of a constrained host.
pub const FIDO_MAXMSG: usize = 2048;

/// Upper bound on the negotiated large-blob array size. Unlike the original implementation (which
/// leaves `maxlargeblob` unclamped), this cap is applied symmetrically with `FIDO_MAXMSG` so a
/// misbehaving or malicious authenticator cannot make the host size a buffer unboundedly.
pub const FIDO_MAXLARGEBLOB: usize = 2048;

/// `clientPin` is set.
pub const FIDO_DEV_PIN_SET: u32 = 1 << 0;
/// `credProtect` extension is supported.
pub const FIDO_DEV_CRED_PROT: u32 = 1 << 1;
/// `credMgmt` or `credentialMgmtPreview` option is set.
pub const FIDO_DEV_CREDMAN: u32 = 1 << 2;
/// `uv` is set.
pub const FIDO_DEV_UV_SET: u32 = 1 << 3;
/// `pinUvAuthToken` is set.
pub const FIDO_DEV_TOKEN_PERMS: u32 = 1 << 4;
/// `largeBlobs` option is set.
pub const FIDO_DEV_LARGE_BLOB: u32 = 1 << 5;
/// `largeBlobKey` extension is supported.
pub const FIDO_DEV_LARGE_BLOB_KEY: u32 = 1 << 6;
/// PIN/UV auth protocol one is in `pinUvAuthProtocols`.
pub const FIDO_DEV_PIN_PROTOCOL_1: u32 = 1 << 7;
/// PIN/UV auth protocol two is in `pinUvAuthProtocols`.
pub const FIDO_DEV_PIN_PROTOCOL_2: u32 = 1 << 8;

fn derive_flags(info: &InfoRecord) -> u32 {
    let mut flags = 0u32;
    if info.options & info::OPT_CLIENT_PIN != 0 {
        flags |= FIDO_DEV_PIN_SET;
    }
    if info.extensions & info::EXT_CRED_PROTECT != 0 {
        flags |= FIDO_DEV_CRED_PROT;
    }
    if info.options & (info::OPT_CRED_MGMT | info::OPT_CREDENTIAL_MGMT_PREVIEW) != 0 {
        flags |= FIDO_DEV_CREDMAN;
    }
    if info.options & info::OPT_UV != 0 {
        flags |= FIDO_DEV_UV_SET;
    }
    if info.options & info::OPT_PIN_UV_AUTH_TOKEN != 0 {
        flags |= FIDO_DEV_TOKEN_PERMS;
    }
    if info.options & info::OPT_LARGE_BLOBS != 0 {
        flags |= FIDO_DEV_LARGE_BLOB;
    }
    if info.extensions & info::EXT_LARGE_BLOB_KEY != 0 {
        flags |= FIDO_DEV_LARGE_BLOB_KEY;
    }
    if info.pin_protocols & info::PIN_PROTOCOL_1 != 0 {
        flags |= FIDO_DEV_PIN_PROTOCOL_1;
    }
    if info.pin_protocols & info::PIN_PROTOCOL_2 != 0 {
        flags |= FIDO_DEV_PIN_PROTOCOL_2;
    }
    flags
}

/// A single open connection to a FIDO2 authenticator.
pub struct Device<'a> {
    io: &'a mut dyn HostIo,
    crypto: &'a dyn CryptoProvider,
    is_open: bool,
    nonce: u64,
    cap_flags: u8,
    flags: u32,
    maxmsgsize: usize,
    maxlargeblob: usize,
}

impl<'a> Device<'a> {
    /// Construct an unopened device handle over `io`, using `crypto` for the nonce and for any
    /// cryptographic operations performed by higher layers built on this device.
    pub fn new(io: &'a mut dyn HostIo, crypto: &'a dyn CryptoProvider) -> Self {
        Device {
            io,
            crypto,
            is_open: false,
            nonce: 0,
            cap_flags: 0,
            flags: 0,
            maxmsgsize: FIDO_MAXMSG,
            maxlargeblob: 0,
        }
    }

    /// Open the transport, exchange INIT, and if the authenticator speaks CBOR fetch and parse
    /// `authenticatorGetInfo`, deriving the capability flags exposed by [`Device::flags`].
    pub fn open(&mut self) -> Result<(), Fido2Error> {
        let mut nonce_bytes = [0u8; 8];
        self.crypto.random(&mut nonce_bytes)?;
        self.nonce = u64::from_be_bytes(nonce_bytes);

        self.io.open().map_err(|_| Fido2Error::Internal)?;
        self.is_open = true;

        if let Err(e) = self.handshake() {
            let _ = self.close();
            return Err(e);
        }
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), Fido2Error> {
        Transport::send_command(self.io, CtapCommand::Init, &self.nonce.to_be_bytes())?;
        let reply = Transport::receive_init_reply(self.io, self.nonce)?;
        if reply.nonce != self.nonce {
            return Err(Fido2Error::AppletNotSelected);
        }
        self.cap_flags = reply.flags;

        if self.cap_flags & crate::transport::FIDO_CAP_CBOR == 0 {
            self.maxmsgsize = FIDO_MAXMSG;
            self.maxlargeblob = 0;
            return Ok(());
        }

        let mut storage = [0u8; FIDO_MAXMSG];
        let mut out = Blob::new(&mut storage);
        self.cbor_transaction(&[crate::GET_INFO_CMD], &mut out)?;
        let record = info::parse_get_info_reply(out.as_slice())?;

        self.flags = derive_flags(&record);
        self.maxmsgsize = core::cmp::min(
            if record.max_msg_size == 0 {
                FIDO_MAXMSG as u64
            } else {
                record.max_msg_size
            },
            FIDO_MAXMSG as u64,
        ) as usize;
        self.maxlargeblob = core::cmp::min(
            record.max_serialized_large_blob_array,
            FIDO_MAXLARGEBLOB as u64,
        ) as usize;
        Ok(())
    }

    /// Close the device. Idempotent: calling this on an already-closed (or never-opened) device
    /// returns `Ok(())`.
    pub fn close(&mut self) -> Result<(), Fido2Error> {
        if !self.is_open {
            return Ok(());
        }
        self.io.close()?;
        self.is_open = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Capability/option flags derived from `authenticatorGetInfo` (`FIDO_DEV_*`). Zero if the
    /// authenticator does not speak CBOR.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Negotiated maximum CTAP message size, clamped to [`FIDO_MAXMSG`].
    pub fn maxmsgsize(&self) -> usize {
        self.maxmsgsize
    }

    /// Negotiated maximum serialized large-blob array size, clamped to [`FIDO_MAXLARGEBLOB`].
    pub fn maxlargeblob(&self) -> usize {
        self.maxlargeblob
    }

    pub(crate) fn io(&mut self) -> &mut dyn HostIo {
        self.io
    }

    /// Returns the crypto provider with its own `'a` lifetime rather than one tied to `&self`, so
    /// callers can hold it across a subsequent `&mut self` call (see
    /// `get_large_blob_payload` in the crate root).
    pub(crate) fn crypto(&self) -> &'a dyn CryptoProvider {
        self.crypto
    }

    /// Send a CBOR-encoded CTAP2 command and collect its reply body into `out`, stripping the
    /// leading CTAP status byte and the trailing APDU status word. Fails with
    /// `Fido2Error::Ctap(_)` if the status byte is not `CTAP2_OK`.
    pub(crate) fn cbor_transaction(
        &mut self,
        request: &[u8],
        out: &mut Blob,
    ) -> Result<(), Fido2Error> {
        out.clear();
        Transport::send_command(self.io, CtapCommand::Cbor, request)?;
        Transport::receive_apdu_response(self.io, out)?;
        let raw = out.as_slice();
        if raw.len() < 3 {
            return Err(Fido2Error::Transport);
        }
        let body_end = raw.len() - 2;
        let status = raw[0];
        if status != 0x00 {
            return Err(Fido2Error::Ctap(CtapStatus::from(status)));
        }
        let body_len = body_end - 1;
        out.as_mut_slice().copy_within(1..body_end, 0);
        out.set_len(body_len)
    }
}
