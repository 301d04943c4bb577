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
//! The six literal end-to-end scenarios, driven against `fido2_sim` instead of real hardware.

use ed25519_dalek::SigningKey;
use fido2_client::{AssertionRequest, CtapStatus, Fido2Error};
use fido2_hal::software::SoftwareCrypto;
use fido2_sim::{SimAuthenticator, SimConfig, SimLargeBlobEntry, SimVersion};

fn keypair(seed: u8) -> ([u8; 32], [u8; 32]) {
    let sk = [seed; 32];
    let signing_key = SigningKey::from_bytes(&sk);
    (sk, signing_key.verifying_key().to_bytes())
}

#[test]
fn select_reports_u2f_v2() {
    let (sk, _pk) = keypair(0x01);
    let mut sim = SimAuthenticator::new(SimConfig {
        version: SimVersion::U2fV2,
        rp_id: "example.com".into(),
        signing_key: sk,
        cred_id: vec![0xaa],
        large_blobs: vec![],
        corrupt_large_blob_digest: false,
    });
    let crypto = SoftwareCrypto;
    let device = fido2_client::open(&mut sim, &crypto).unwrap();
    assert_eq!(device.flags(), 0);
}

#[test]
fn get_info_negotiates_message_and_blob_sizes() {
    let (sk, _pk) = keypair(0x02);
    let mut sim = SimAuthenticator::new(SimConfig {
        version: SimVersion::Fido2_0,
        rp_id: "example.com".into(),
        signing_key: sk,
        cred_id: vec![0xaa],
        large_blobs: vec![],
        corrupt_large_blob_digest: false,
    });
    let crypto = SoftwareCrypto;
    let device = fido2_client::open(&mut sim, &crypto).unwrap();
    assert_eq!(device.maxmsgsize(), 1200);
    assert_eq!(device.maxlargeblob(), 4096);
}

#[test]
fn get_assertion_succeeds_for_matching_rp() {
    let (sk, pk) = keypair(0x03);
    let mut sim = SimAuthenticator::new(SimConfig {
        version: SimVersion::Fido2_0,
        rp_id: "example.com".into(),
        signing_key: sk,
        cred_id: vec![0xaa, 0xbb],
        large_blobs: vec![],
        corrupt_large_blob_digest: false,
    });
    let crypto = SoftwareCrypto;
    let mut device = fido2_client::open(&mut sim, &crypto).unwrap();

    let request = AssertionRequest {
        rp_id: "example.com",
        client_data_hash: [0x55u8; 32],
        request_large_blob_key: false,
        up: true,
        uv: false,
    };
    let mut scratch = [0u8; 1024];
    let reply = fido2_client::get_assertion(&mut device, &request, -8, &pk, &mut scratch).unwrap();
    assert_eq!(reply.credential_id(), &[0xaa, 0xbb]);
}

#[test]
fn get_assertion_fails_for_rp_mismatch() {
    let (sk, pk) = keypair(0x04);
    let mut sim = SimAuthenticator::new(SimConfig {
        version: SimVersion::Fido2_0,
        rp_id: "example.com".into(),
        signing_key: sk,
        cred_id: vec![0xaa],
        large_blobs: vec![],
        corrupt_large_blob_digest: false,
    });
    let crypto = SoftwareCrypto;
    let mut device = fido2_client::open(&mut sim, &crypto).unwrap();

    let request = AssertionRequest {
        rp_id: "not-example.com",
        client_data_hash: [0x55u8; 32],
        request_large_blob_key: false,
        up: true,
        uv: false,
    };
    let mut scratch = [0u8; 1024];
    let err = fido2_client::get_assertion(&mut device, &request, -8, &pk, &mut scratch).unwrap_err();
    assert!(matches!(
        err,
        Fido2Error::Ctap(CtapStatus::InvalidCredential)
    ));
}

#[test]
fn large_blob_read_and_lookup_across_a_155_byte_payload() {
    let (sk, _pk) = keypair(0x05);
    let blob_key = [0x77u8; 32];
    let payload = vec![0x42u8; 155];
    let mut sim = SimAuthenticator::new(SimConfig {
        version: SimVersion::Fido2_0,
        rp_id: "example.com".into(),
        signing_key: sk,
        cred_id: vec![0xaa],
        large_blobs: vec![SimLargeBlobEntry {
            key: blob_key,
            plaintext: payload.clone(),
        }],
        corrupt_large_blob_digest: false,
    });
    let crypto = SoftwareCrypto;
    let mut device = fido2_client::open(&mut sim, &crypto).unwrap();

    let mut out = [0u8; 256];
    let n = fido2_client::get_large_blob_payload(&mut device, &blob_key, &mut out).unwrap();
    assert_eq!(&out[..n], payload.as_slice());
}

#[test]
fn corrupted_large_blob_array_falls_back_to_empty_seed() {
    let (sk, _pk) = keypair(0x06);
    let blob_key = [0x88u8; 32];
    let mut sim = SimAuthenticator::new(SimConfig {
        version: SimVersion::Fido2_0,
        rp_id: "example.com".into(),
        signing_key: sk,
        cred_id: vec![0xaa],
        large_blobs: vec![SimLargeBlobEntry {
            key: blob_key,
            plaintext: vec![0x11u8; 40],
        }],
        corrupt_large_blob_digest: true,
    });
    let crypto = SoftwareCrypto;
    let mut device = fido2_client::open(&mut sim, &crypto).unwrap();

    let mut out = [0u8; 256];
    let err = fido2_client::get_large_blob_payload(&mut device, &blob_key, &mut out).unwrap_err();
    assert!(matches!(err, Fido2Error::NotFound));
}
