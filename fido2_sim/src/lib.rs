/***************************************************************************************************
 * Copyright (c) 2022 Qualcomm Innovation Center, Inc. All rights reserved.
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
 * fido2_sim
 *
 * A `HostIo` implementation that plays the authenticator's side of the protocol in-process: it
 * answers SELECT with a scripted version string, authenticatorGetInfo with a scripted info map,
 * authenticatorGetAssertion by signing over the attached rp_id/clientDataHash with an Ed25519
 * credential it holds, and authenticatorLargeBlobs by paginating a large-blob array it was
 * constructed with. It reassembles chained request APDUs and re-chains its own replies across
 * GET_RESPONSE round-trips exactly as real NFC hardware would, so it exercises the same transport
 * code path `fido2_client` uses against a physical authenticator.
 **************************************************************************************************/
use fido2_error::Fido2Error;
use fido2_hal::software::SoftwareCrypto;
use fido2_hal::{CryptoProvider, HostIo};
use fido2_minicbor::decoder::{MapBuf, SequenceBuffer};
use fido2_minicbor::encoder::Encoder;

const INS_SELECT: u8 = 0xa4;
const INS_GET_RESPONSE: u8 = 0xc0;
const CLA_CHAIN_CONTINUE: u8 = 0x10;

const GET_INFO_CMD: u8 = 0x04;
const GET_ASSERTION_CMD: u8 = 0x02;
const LARGEBLOBS_CMD: u8 = 0x0c;

const CTAP2_OK: u8 = 0x00;
const CTAP2_ERR_INVALID_CREDENTIAL: u8 = 0x22;
const CTAP2_ERR_INVALID_CBOR: u8 = 0x12;

/// Which version string (and therefore which capability flags) SELECT reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimVersion {
    U2fV2,
    Fido2_0,
}

/// A single plaintext large-blob payload the simulator will encrypt and serve, keyed by its own
/// independent large-blob key (mirroring per-credential large-blob keys).
pub struct SimLargeBlobEntry {
    pub key: [u8; 32],
    pub plaintext: std::vec::Vec<u8>,
}

/// Configuration for a [`SimAuthenticator`].
pub struct SimConfig {
    pub version: SimVersion,
    pub rp_id: std::string::String,
    pub signing_key: [u8; 32],
    pub cred_id: std::vec::Vec<u8>,
    pub large_blobs: std::vec::Vec<SimLargeBlobEntry>,
    /// Corrupt the trailing digest of the served large-blob array, exercising the seed-fallback
    /// path.
    pub corrupt_large_blob_digest: bool,
}

enum PendingAck {
    None,
    Immediate([u8; 2]),
}

/// The simulated authenticator. Implements [`HostIo`]; callers supply their own
/// `CryptoProvider` (typically [`fido2_hal::software::SoftwareCrypto`]) when driving
/// `fido2_client` against it, since `HostIo` and `CryptoProvider` are independent traits.
pub struct SimAuthenticator {
    crypto: SoftwareCrypto,
    config: SimConfig,
    rx_accum: std::vec::Vec<u8>,
    tx_buffer: std::vec::Vec<u8>,
    tx_pos: usize,
    ack: PendingAck,
    sign_count: u32,
}

impl SimAuthenticator {
    pub fn new(config: SimConfig) -> Self {
        SimAuthenticator {
            crypto: SoftwareCrypto,
            config,
            rx_accum: std::vec::Vec::new(),
            tx_buffer: std::vec::Vec::new(),
            tx_pos: 0,
            ack: PendingAck::None,
            sign_count: 0,
        }
    }

    fn queue_reply(&mut self, body: std::vec::Vec<u8>) {
        self.tx_buffer = body;
        self.tx_pos = 0;
    }

    fn handle_select(&mut self) {
        let version: &[u8] = match self.config.version {
            SimVersion::U2fV2 => b"U2F_V2",
            SimVersion::Fido2_0 => b"FIDO_2_0",
        };
        self.queue_reply(version.to_vec());
    }

    fn handle_get_info(&mut self) -> std::vec::Vec<u8> {
        let mut buf = [0u8; 512];
        let mut enc = Encoder::new(&mut buf);
        enc.map_start(3)
            .uint(1)
            .array_start(1)
            .utf8string(match self.config.version {
                SimVersion::U2fV2 => "U2F_V2",
                SimVersion::Fido2_0 => "FIDO_2_0",
            })
            .uint(5)
            .uint(1200)
            .uint(11)
            .uint(4096);
        let body = enc.finish().expect("GetInfo reply fits in scratch buffer");
        let mut out = std::vec::Vec::with_capacity(1 + body.len());
        out.push(CTAP2_OK);
        out.extend_from_slice(body);
        out
    }

    fn handle_get_assertion(&mut self, request: &[u8]) -> std::vec::Vec<u8> {
        let item = match SequenceBuffer::new(request).into_iter().next() {
            Some(i) => i,
            None => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
        };
        let map = match MapBuf::try_from(item) {
            Ok(m) => m,
            Err(_) => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
        };
        let rp_id = match map.get_int(1) {
            Some(v) => match <&str>::try_from(v) {
                Ok(s) => s,
                Err(_) => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
            },
            None => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
        };
        let client_data_hash = match map.get_int(2) {
            Some(v) => match <&[u8]>::try_from(v) {
                Ok(b) if b.len() == 32 => b,
                _ => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
            },
            None => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
        };
        let want_large_blob_key = map
            .get_int(4)
            .and_then(|ext| MapBuf::try_from(ext).ok())
            .map(|ext| ext.get_tstr("largeBlobKey").is_some())
            .unwrap_or(false);

        if rp_id != self.config.rp_id {
            return vec_with_status(CTAP2_ERR_INVALID_CREDENTIAL);
        }

        self.sign_count += 1;
        let mut rp_id_hash = [0u8; 32];
        self.crypto.sha256(rp_id.as_bytes(), &mut rp_id_hash);

        let mut auth_data = std::vec::Vec::with_capacity(37);
        auth_data.extend_from_slice(&rp_id_hash);
        auth_data.push(0x01); // flags: user present
        auth_data.extend_from_slice(&self.sign_count.to_be_bytes());

        let mut message = std::vec::Vec::with_capacity(auth_data.len() + 32);
        message.extend_from_slice(&auth_data);
        message.extend_from_slice(client_data_hash);
        let mut signature = [0u8; 64];
        self.crypto
            .ed25519_sign(&self.config.signing_key, &message, &mut signature)
            .expect("software Ed25519 signing cannot fail");

        let n_pairs = 3 + usize::from(want_large_blob_key);
        let mut buf = [0u8; 512];
        let mut enc = Encoder::new(&mut buf);
        enc.map_start(n_pairs)
            .uint(1)
            .map_start(1)
            .utf8string("id")
            .bytestring(&self.config.cred_id)
            .uint(2)
            .bytestring(&auth_data)
            .uint(3)
            .bytestring(&signature);
        if want_large_blob_key {
            if let Some(entry) = self.config.large_blobs.first() {
                enc.uint(7).bytestring(&entry.key);
            }
        }
        let body = enc.finish().expect("GetAssertion reply fits in scratch buffer");
        let mut out = std::vec::Vec::with_capacity(1 + body.len());
        out.push(CTAP2_OK);
        out.extend_from_slice(body);
        out
    }

    /// Serializes the configured large-blob entries into the wire array format: each entry is a
    /// CBOR map of ciphertext‖tag (key 1), nonce (key 2), original size (key 3), followed by a
    /// truncated SHA-256 digest of the whole array.
    fn build_large_blob_array(&self) -> std::vec::Vec<u8> {
        let mut array_body = std::vec::Vec::new();
        let mut scratch = [0u8; 4096];
        {
            let mut enc = Encoder::new(&mut scratch);
            enc.array_start(self.config.large_blobs.len());
            for (i, entry) in self.config.large_blobs.iter().enumerate() {
                let compressed = deflate(&entry.plaintext);
                let nonce = [i as u8; 12];
                let mut ad = [0u8; 12];
                ad[..4].copy_from_slice(b"blob");
                ad[4..].copy_from_slice(&(entry.plaintext.len() as u64).to_le_bytes());
                let mut ciphertext = std::vec![0u8; compressed.len()];
                let mut tag = [0u8; 16];
                self.crypto
                    .aes_gcm_encrypt(&entry.key, &nonce, &ad, &compressed, &mut ciphertext, &mut tag)
                    .expect("software AES-GCM encryption cannot fail");
                let mut combined = ciphertext;
                combined.extend_from_slice(&tag);
                enc.map_start(3)
                    .uint(1)
                    .bytestring(&combined)
                    .uint(2)
                    .bytestring(&nonce)
                    .uint(3)
                    .uint(entry.plaintext.len() as u64);
            }
            let body = enc.finish().expect("large-blob array fits in scratch buffer");
            array_body.extend_from_slice(body);
        }
        let mut digest = [0u8; 32];
        self.crypto.sha256(&array_body, &mut digest);
        array_body.extend_from_slice(&digest[..16]);
        if self.config.corrupt_large_blob_digest {
            let last = array_body.len() - 1;
            array_body[last] ^= 0xff;
        }
        array_body
    }

    fn handle_large_blobs(&mut self, request: &[u8]) -> std::vec::Vec<u8> {
        let item = match SequenceBuffer::new(request).into_iter().next() {
            Some(i) => i,
            None => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
        };
        let map = match MapBuf::try_from(item) {
            Ok(m) => m,
            Err(_) => return vec_with_status(CTAP2_ERR_INVALID_CBOR),
        };
        let count = map
            .get_int(1)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0) as usize;
        let offset = map
            .get_int(3)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0) as usize;

        let array = self.build_large_blob_array();
        let end = (offset + count).min(array.len());
        let chunk = if offset < array.len() {
            &array[offset..end]
        } else {
            &[]
        };

        let mut buf = [0u8; 4096];
        let mut enc = Encoder::new(&mut buf);
        enc.map_start(1).uint(1).bytestring(chunk);
        let body = enc.finish().expect("large-blob get reply fits in scratch buffer");
        let mut out = std::vec::Vec::with_capacity(1 + body.len());
        out.push(CTAP2_OK);
        out.extend_from_slice(body);
        out
    }

    fn handle_cbor_command(&mut self, full_payload: &[u8]) -> std::vec::Vec<u8> {
        if full_payload.is_empty() {
            return vec_with_status(CTAP2_ERR_INVALID_CBOR);
        }
        match full_payload[0] {
            GET_INFO_CMD => self.handle_get_info(),
            GET_ASSERTION_CMD => self.handle_get_assertion(&full_payload[1..]),
            LARGEBLOBS_CMD => self.handle_large_blobs(&full_payload[1..]),
            _ => vec_with_status(CTAP2_ERR_INVALID_CBOR),
        }
    }

    fn remaining(&self) -> usize {
        self.tx_buffer.len() - self.tx_pos
    }
}

fn vec_with_status(status: u8) -> std::vec::Vec<u8> {
    std::vec![status]
}

/// Minimal DEFLATE (RFC1951) encoder: emits a single uncompressed (stored) block, which any
/// conformant inflater (including `miniz_oxide`) decodes correctly. The simulator only needs to
/// produce *some* valid compressed representation of the plaintext, not a space-efficient one.
fn deflate(plaintext: &[u8]) -> std::vec::Vec<u8> {
    let mut out = std::vec::Vec::with_capacity(plaintext.len() + 5);
    let len = plaintext.len() as u16;
    out.push(0x01); // BFINAL=1, BTYPE=00 (stored), bit-packed into the first byte's low bits
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(!len).to_le_bytes());
    out.extend_from_slice(plaintext);
    out
}

impl HostIo for SimAuthenticator {
    fn open(&mut self) -> Result<(), Fido2Error> {
        self.rx_accum.clear();
        self.tx_buffer.clear();
        self.tx_pos = 0;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Fido2Error> {
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Fido2Error> {
        if data.len() < 5 {
            return Err(Fido2Error::Transport);
        }
        let cla = data[0];
        let ins = data[1];
        let lc = data[4] as usize;
        if data.len() < 5 + lc {
            return Err(Fido2Error::Transport);
        }
        let payload = &data[5..5 + lc];

        if ins == INS_GET_RESPONSE {
            // Continuation of an already-queued reply; nothing to do until the next read().
            return Ok(());
        }
        if ins == INS_SELECT {
            self.handle_select();
            return Ok(());
        }

        self.rx_accum.extend_from_slice(payload);
        if cla & CLA_CHAIN_CONTINUE != 0 {
            self.ack = PendingAck::Immediate([0x90, 0x00]);
        } else {
            let full_payload = core::mem::take(&mut self.rx_accum);
            let reply = self.handle_cbor_command(&full_payload);
            self.queue_reply(reply);
            self.ack = PendingAck::None;
        }
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize, Fido2Error> {
        if let PendingAck::Immediate(sw) = self.ack {
            self.ack = PendingAck::None;
            out[..2].copy_from_slice(&sw);
            return Ok(2);
        }
        let chunk_len = self.remaining().min(255);
        out[..chunk_len].copy_from_slice(&self.tx_buffer[self.tx_pos..self.tx_pos + chunk_len]);
        self.tx_pos += chunk_len;
        if self.remaining() > 0 {
            out[chunk_len] = 0x61;
            out[chunk_len + 1] = self.remaining().min(255) as u8;
        } else {
            out[chunk_len] = 0x90;
            out[chunk_len + 1] = 0x00;
        }
        Ok(chunk_len + 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_reports_configured_version() {
        let mut sim = SimAuthenticator::new(SimConfig {
            version: SimVersion::Fido2_0,
            rp_id: "example.com".into(),
            signing_key: [0x11; 32],
            cred_id: std::vec![0xaa, 0xbb],
            large_blobs: std::vec::Vec::new(),
            corrupt_large_blob_digest: false,
        });
        sim.open().unwrap();
        sim.write(&[0x00, INS_SELECT, 0x04, 0x00, 0x00]).unwrap();
        let mut out = [0u8; 16];
        let n = sim.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"FIDO_2_0\x90\x00");
    }

    #[test]
    fn large_blob_array_round_trips_through_pagination() {
        let sim = SimAuthenticator::new(SimConfig {
            version: SimVersion::Fido2_0,
            rp_id: "example.com".into(),
            signing_key: [0x11; 32],
            cred_id: std::vec![0xaa],
            large_blobs: std::vec![SimLargeBlobEntry {
                key: [0x22; 32],
                plaintext: std::vec![0x42; 155],
            }],
            corrupt_large_blob_digest: false,
        });
        let array = sim.build_large_blob_array();
        assert!(array.len() > 16);
        let mut digest = [0u8; 32];
        sim.crypto.sha256(&array[..array.len() - 16], &mut digest);
        assert_eq!(&array[array.len() - 16..], &digest[..16]);
    }
}
