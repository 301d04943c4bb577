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
 * authenticatorGetAssertion request/response
 *
 * The request is built in two passes: `encoded_len` computes the exact encoded size before a
 * single byte is written, so the caller can size (or reject as too large) a fixed buffer up
 * front rather than growing one speculatively. Everything else about the assertion exchange - the
 * authData layout, the signature check - follows CTAP2 directly.
 *
 * Only the EdDSA (COSE algorithm -8) signature algorithm is supported for verification; any other
 * requested algorithm is rejected rather than silently accepted, since this client has no use for
 * credentials it cannot itself verify.
 **************************************************************************************************/
use fido2_common::{Blob, Reader};
use fido2_error::{CtapStatus, Fido2Error};
use fido2_hal::CryptoProvider;
use fido2_minicbor::decoder::MapBuf;
use fido2_minicbor::encoder::{head_len, Encoder};
use subtle::ConstantTimeEq;

use crate::device::Device;

pub const GET_ASSERTION_CMD: u8 = 0x02;

const COSE_ALG_EDDSA: i32 = -8;

const MAX_CRED_ID: usize = 64;
const MAX_AUTH_DATA: usize = 128;
const MAX_SIGNATURE: usize = 64;

/// User presence flag in authData's flags byte (RFC CTAP2 §6.1).
const FLAG_UP: u8 = 1 << 0;
/// User verification flag in authData's flags byte.
const FLAG_UV: u8 = 1 << 2;

fn tstr_len(s: &str) -> usize {
    head_len(s.len() as u64) + s.len()
}

/// A `authenticatorGetAssertion` request. Does not support a credential allow-list or PIN/UV
/// auth - this client only ever asks "give me an assertion for this RP", relying on the
/// authenticator's own resident-key and user-verification policy.
pub struct AssertionRequest<'a> {
    pub rp_id: &'a str,
    pub client_data_hash: [u8; 32],
    /// Request the `largeBlobKey` extension, used to bind a large-blob array entry to this
    /// specific credential.
    pub request_large_blob_key: bool,
    pub up: bool,
    pub uv: bool,
}

impl<'a> AssertionRequest<'a> {
    fn n_options(&self) -> usize {
        1 + usize::from(self.uv)
    }

    fn n_top_pairs(&self) -> usize {
        2 + usize::from(self.request_large_blob_key) + 1
    }

    /// Exact number of bytes `encode` will write, computed without touching the output buffer.
    pub fn encoded_len(&self) -> usize {
        let mut len = head_len(self.n_top_pairs() as u64);
        len += head_len(1) + tstr_len(self.rp_id);
        len += head_len(2) + head_len(32) + 32;
        if self.request_large_blob_key {
            len += head_len(4);
            len += head_len(1);
            len += tstr_len("largeBlobKey") + 1;
        }
        len += head_len(5);
        len += head_len(self.n_options() as u64);
        len += tstr_len("up") + 1;
        if self.uv {
            len += tstr_len("uv") + 1;
        }
        len
    }

    /// Encode the request into `out`, returning the number of bytes written. `out` must be at
    /// least [`AssertionRequest::encoded_len`] bytes; as a defensive fallback against a caller
    /// that under-sized the buffer, this still reports `Fido2Error::Cbor` rather than panicking or
    /// writing out of bounds.
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, Fido2Error> {
        let mut enc = Encoder::new(out);
        enc.map_start(self.n_top_pairs())
            .uint(1)
            .utf8string(self.rp_id)
            .uint(2)
            .bytestring(&self.client_data_hash);
        if self.request_large_blob_key {
            enc.uint(4).map_start(1).utf8string("largeBlobKey").boolean(true);
        }
        enc.uint(5)
            .map_start(self.n_options())
            .utf8string("up")
            .boolean(self.up);
        if self.uv {
            enc.utf8string("uv").boolean(true);
        }
        enc.finish().map(|s| s.len()).map_err(|_| Fido2Error::Cbor)
    }
}

/// A decoded `authenticatorGetAssertion` reply.
#[derive(Clone, Debug)]
pub struct AssertionReply {
    cred_id: [u8; MAX_CRED_ID],
    cred_id_len: usize,
    auth_data: [u8; MAX_AUTH_DATA],
    auth_data_len: usize,
    signature: [u8; MAX_SIGNATURE],
    signature_len: usize,
    pub large_blob_key: Option<[u8; 32]>,
}

impl Default for AssertionReply {
    fn default() -> Self {
        AssertionReply {
            cred_id: [0u8; MAX_CRED_ID],
            cred_id_len: 0,
            auth_data: [0u8; MAX_AUTH_DATA],
            auth_data_len: 0,
            signature: [0u8; MAX_SIGNATURE],
            signature_len: 0,
            large_blob_key: None,
        }
    }
}

impl AssertionReply {
    pub fn credential_id(&self) -> &[u8] {
        &self.cred_id[..self.cred_id_len]
    }

    pub fn auth_data(&self) -> &[u8] {
        &self.auth_data[..self.auth_data_len]
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature[..self.signature_len]
    }

    /// Parse `body` (the CBOR map of a successful GetAssertion reply, status byte already
    /// stripped).
    pub fn parse(body: &[u8]) -> Result<Self, Fido2Error> {
        let item = fido2_minicbor::decoder::SequenceBuffer::new(body)
            .into_iter()
            .next()
            .ok_or(Fido2Error::Cbor)?;
        let map = MapBuf::try_from(item).map_err(|_| Fido2Error::Cbor)?;

        let mut reply = AssertionReply::default();
        let mut it = map.into_iter();
        loop {
            let key = match it.next() {
                Some(k) => k,
                None => break,
            };
            let value = match it.next() {
                Some(v) => v,
                None => break,
            };
            let key_int = match u8::try_from(key) {
                Ok(k) => k,
                Err(_) => continue,
            };
            match key_int {
                1 => {
                    let cred_map = MapBuf::try_from(value).map_err(|_| Fido2Error::Cbor)?;
                    if let Some(id) = cred_map.get_tstr("id") {
                        let bytes = <&[u8]>::try_from(id).map_err(|_| Fido2Error::Cbor)?;
                        if bytes.len() > MAX_CRED_ID {
                            return Err(Fido2Error::ShortBuffer(bytes.len()));
                        }
                        reply.cred_id[..bytes.len()].copy_from_slice(bytes);
                        reply.cred_id_len = bytes.len();
                    }
                }
                2 => {
                    let bytes = <&[u8]>::try_from(value).map_err(|_| Fido2Error::Cbor)?;
                    if bytes.len() > MAX_AUTH_DATA {
                        return Err(Fido2Error::ShortBuffer(bytes.len()));
                    }
                    reply.auth_data[..bytes.len()].copy_from_slice(bytes);
                    reply.auth_data_len = bytes.len();
                }
                3 => {
                    let bytes = <&[u8]>::try_from(value).map_err(|_| Fido2Error::Cbor)?;
                    if bytes.len() > MAX_SIGNATURE {
                        return Err(Fido2Error::ShortBuffer(bytes.len()));
                    }
                    reply.signature[..bytes.len()].copy_from_slice(bytes);
                    reply.signature_len = bytes.len();
                }
                4 | 5 | 6 => {}
                7 => {
                    let bytes = <&[u8]>::try_from(value).map_err(|_| Fido2Error::Cbor)?;
                    if bytes.len() != 32 {
                        return Err(Fido2Error::Cbor);
                    }
                    let mut key = [0u8; 32];
                    key.copy_from_slice(bytes);
                    reply.large_blob_key = Some(key);
                }
                _ => {}
            }
        }

        if reply.auth_data_len < 37 || reply.signature_len == 0 {
            return Err(Fido2Error::Cbor);
        }
        Ok(reply)
    }

    /// Verify the reply against `rp_id`/`client_data_hash`, the COSE algorithm the credential was
    /// created with, and the credential's EdDSA public key. Requires user presence (and, if
    /// `require_uv` is set, user verification) to have been asserted in authData's flags.
    pub fn verify(
        &self,
        crypto: &dyn CryptoProvider,
        rp_id: &str,
        client_data_hash: &[u8; 32],
        cose_alg: i32,
        public_key: &[u8; 32],
        require_uv: bool,
    ) -> Result<(), Fido2Error> {
        if rp_id.is_empty() {
            return Err(Fido2Error::InvalidArgument);
        }
        if cose_alg != COSE_ALG_EDDSA {
            return Err(Fido2Error::Ctap(CtapStatus::UnsupportedOption));
        }

        let auth_data = self.auth_data();
        let mut reader = Reader::new(auth_data);
        let rp_id_hash = reader.read(32)?;
        let flags = reader.read_u8()?;
        let _sign_count = reader.read_u32_be()?;

        let mut expected_hash = [0u8; 32];
        crypto.sha256(rp_id.as_bytes(), &mut expected_hash);
        if rp_id_hash.ct_eq(&expected_hash[..]).unwrap_u8() != 1 {
            return Err(Fido2Error::InvalidSignature);
        }

        if flags & FLAG_UP == 0 {
            return Err(Fido2Error::UserPresenceRequired);
        }
        if require_uv && flags & FLAG_UV == 0 {
            return Err(Fido2Error::UserPresenceRequired);
        }

        let mut message_storage = [0u8; MAX_AUTH_DATA + 32];
        let mut message = Blob::new(&mut message_storage);
        message.extend_from_slice(auth_data)?;
        message.extend_from_slice(client_data_hash)?;

        let signature = self.signature();
        if signature.len() != 64 {
            return Err(Fido2Error::InvalidSignature);
        }
        let mut sig = [0u8; 64];
        sig.copy_from_slice(signature);

        if crypto.ed25519_verify(public_key, message.as_slice(), &sig) {
            Ok(())
        } else {
            Err(Fido2Error::InvalidSignature)
        }
    }
}

/// Request and verify an assertion from `device`, storing the reply body in a `FIDO_MAXMSG`-sized
/// scratch buffer owned by the caller via `scratch`.
pub fn get_assertion<'a>(
    device: &mut Device<'a>,
    request: &AssertionRequest<'_>,
    scratch: &mut [u8],
) -> Result<AssertionReply, Fido2Error> {
    let len = request.encoded_len();
    if len > scratch.len() {
        return Err(Fido2Error::ShortBuffer(len));
    }
    let mut req_buf = [0u8; 256];
    if len > req_buf.len() {
        return Err(Fido2Error::ShortBuffer(len));
    }
    let mut request_bytes = [0u8; 257];
    request_bytes[0] = GET_ASSERTION_CMD;
    let n = request.encode(&mut req_buf[..len])?;
    request_bytes[1..1 + n].copy_from_slice(&req_buf[..n]);

    let mut out = Blob::new(scratch);
    device.cbor_transaction(&request_bytes[..1 + n], &mut out)?;
    AssertionReply::parse(out.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_len_matches_actual_encoding() {
        let req = AssertionRequest {
            rp_id: "example.com",
            client_data_hash: [0x42u8; 32],
            request_large_blob_key: true,
            up: true,
            uv: false,
        };
        let mut buf = [0u8; 128];
        let n = req.encode(&mut buf).unwrap();
        assert_eq!(n, req.encoded_len());
    }

    #[test]
    fn encoded_len_without_large_blob_key_is_smaller() {
        let with_ext = AssertionRequest {
            rp_id: "example.com",
            client_data_hash: [0u8; 32],
            request_large_blob_key: true,
            up: true,
            uv: false,
        };
        let without_ext = AssertionRequest {
            request_large_blob_key: false,
            ..with_ext
        };
        assert!(without_ext.encoded_len() < with_ext.encoded_len());
    }
}
