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
 * authenticatorGetInfo reply
 *
 * Decodes the CBOR map returned by authenticatorGetInfo into a fixed-size `InfoRecord`. Every
 * multi-valued field (versions, extensions, options, transports, algorithms, pin protocols) is
 * folded into a bitmask rather than kept as a list, since the caller only ever asks "is X
 * supported" and a constrained host has no allocator to hold a variable-length list in anyway.
 *
 * `versions` is the one field where an unrecognized token is a hard error: every other table
 * silently ignores entries it doesn't recognize, so that a future authenticator extension doesn't
 * break an old client, but an authenticatorGetInfo reply that doesn't report a version string we
 * understand at all means we cannot safely talk to the device.
 **************************************************************************************************/
use fido2_error::Fido2Error;
use fido2_minicbor::decoder::{ArrayBuf, MapBuf, SequenceBuffer};
use fido2_minicbor::types::CBOR;

pub const VERSION_U2F_V2: u8 = 1 << 0;
pub const VERSION_FIDO_2_0: u8 = 1 << 1;
pub const VERSION_FIDO_2_1_PRE: u8 = 1 << 2;
pub const VERSION_FIDO_2_1: u8 = 1 << 3;

pub const EXT_CRED_BLOB: u8 = 1 << 0;
pub const EXT_HMAC_SECRET: u8 = 1 << 1;
pub const EXT_CRED_PROTECT: u8 = 1 << 2;
pub const EXT_LARGE_BLOB_KEY: u8 = 1 << 3;
pub const EXT_MIN_PIN_LENGTH: u8 = 1 << 4;

pub const OPT_PLAT: u32 = 1 << 0;
pub const OPT_RK: u32 = 1 << 1;
pub const OPT_CLIENT_PIN: u32 = 1 << 2;
pub const OPT_UP: u32 = 1 << 3;
pub const OPT_UV: u32 = 1 << 4;
pub const OPT_PIN_UV_AUTH_TOKEN: u32 = 1 << 5;
pub const OPT_NO_MC_GA_PERMISSIONS_WITH_CLIENT_PIN: u32 = 1 << 6;
pub const OPT_LARGE_BLOBS: u32 = 1 << 7;
pub const OPT_EP: u32 = 1 << 8;
pub const OPT_BIO_ENROLL: u32 = 1 << 9;
pub const OPT_USER_VERIFICATION_MGMT_PREVIEW: u32 = 1 << 10;
pub const OPT_UV_BIO_ENROLL: u32 = 1 << 11;
pub const OPT_AUTHNR_CFG: u32 = 1 << 12;
pub const OPT_UV_ACFG: u32 = 1 << 13;
pub const OPT_CRED_MGMT: u32 = 1 << 14;
pub const OPT_CREDENTIAL_MGMT_PREVIEW: u32 = 1 << 15;
pub const OPT_SET_MIN_PIN_LENGTH: u32 = 1 << 16;
pub const OPT_MAKE_CRED_UV_NOT_RQD: u32 = 1 << 17;
pub const OPT_ALWAYS_UV: u32 = 1 << 18;

pub const TRANSPORT_USB: u8 = 1 << 0;
pub const TRANSPORT_NFC: u8 = 1 << 1;
pub const TRANSPORT_BLE: u8 = 1 << 2;
pub const TRANSPORT_INTERNAL: u8 = 1 << 3;

pub const ALG_EDDSA: u8 = 1 << 0;
pub const ALG_ES256: u8 = 1 << 1;
pub const ALG_ES384: u8 = 1 << 2;
pub const ALG_ES512: u8 = 1 << 3;
pub const ALG_ES256K: u8 = 1 << 4;
pub const ALG_PS256: u8 = 1 << 5;
pub const ALG_RS256: u8 = 1 << 6;

pub const PIN_PROTOCOL_1: u8 = 1 << 0;
pub const PIN_PROTOCOL_2: u8 = 1 << 1;

/// Decoded, bit-packed view of an `authenticatorGetInfo` reply.
#[derive(Debug, Clone, Default)]
pub struct InfoRecord {
    pub versions: u8,
    pub extensions: u8,
    pub aaguid: [u8; 16],
    pub options: u32,
    pub max_msg_size: u64,
    pub pin_protocols: u8,
    pub max_cred_count_list: u64,
    pub max_cred_id_len: u64,
    pub transports: u8,
    pub algorithms: u8,
    pub max_serialized_large_blob_array: u64,
    pub fw_version: u64,
    pub max_cred_blob_len: u64,
}

/// Parse the CBOR map in `body` (the bytes of a successful `authenticatorGetInfo` reply, with the
/// leading CTAP status byte already stripped) into an [`InfoRecord`].
pub fn parse_get_info_reply(body: &[u8]) -> Result<InfoRecord, Fido2Error> {
    let item = SequenceBuffer::new(body)
        .into_iter()
        .next()
        .ok_or(Fido2Error::Cbor)?;
    let map = MapBuf::try_from(item).map_err(|_| Fido2Error::Cbor)?;

    let mut info = InfoRecord::default();
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
            1 => decode_versions(value, &mut info.versions)?,
            2 => decode_extensions(value, &mut info.extensions),
            3 => decode_aaguid(value, &mut info.aaguid)?,
            4 => decode_options(value, &mut info.options),
            5 => info.max_msg_size = u64::try_from(value).unwrap_or(0),
            6 => decode_pin_protocols(value, &mut info.pin_protocols),
            7 => info.max_cred_count_list = u64::try_from(value).unwrap_or(0),
            8 => info.max_cred_id_len = u64::try_from(value).unwrap_or(0),
            9 => decode_transports(value, &mut info.transports),
            10 => decode_algorithms(value, &mut info.algorithms)?,
            11 => info.max_serialized_large_blob_array = u64::try_from(value).unwrap_or(0),
            14 => info.fw_version = u64::try_from(value).unwrap_or(0),
            15 => info.max_cred_blob_len = u64::try_from(value).unwrap_or(0),
            _ => {}
        }
    }
    Ok(info)
}

fn decode_versions(value: CBOR<'_>, out: &mut u8) -> Result<(), Fido2Error> {
    let arr = ArrayBuf::try_from(value).map_err(|_| Fido2Error::Cbor)?;
    for item in arr {
        let s = <&str>::try_from(item).map_err(|_| Fido2Error::Cbor)?;
        match s {
            "U2F_V2" => *out |= VERSION_U2F_V2,
            "FIDO_2_0" => *out |= VERSION_FIDO_2_0,
            "FIDO_2_1_PRE" => *out |= VERSION_FIDO_2_1_PRE,
            "FIDO_2_1" => *out |= VERSION_FIDO_2_1,
            _ => return Err(Fido2Error::Cbor),
        }
    }
    Ok(())
}

fn decode_extensions(value: CBOR<'_>, out: &mut u8) {
    let arr = match ArrayBuf::try_from(value) {
        Ok(a) => a,
        Err(_) => return,
    };
    for item in arr {
        if let Ok(s) = <&str>::try_from(item) {
            match s {
                "credBlob" => *out |= EXT_CRED_BLOB,
                "hmac-secret" => *out |= EXT_HMAC_SECRET,
                "credProtect" => *out |= EXT_CRED_PROTECT,
                "largeBlobKey" => *out |= EXT_LARGE_BLOB_KEY,
                "minPinLength" => *out |= EXT_MIN_PIN_LENGTH,
                _ => {}
            }
        }
    }
}

fn decode_aaguid(value: CBOR<'_>, out: &mut [u8; 16]) -> Result<(), Fido2Error> {
    let bytes = <&[u8]>::try_from(value).map_err(|_| Fido2Error::Cbor)?;
    if bytes.len() != 16 {
        return Err(Fido2Error::Cbor);
    }
    out.copy_from_slice(bytes);
    Ok(())
}

fn decode_options(value: CBOR<'_>, out: &mut u32) {
    let map = match MapBuf::try_from(value) {
        Ok(m) => m,
        Err(_) => return,
    };
    let mut it = map.into_iter();
    loop {
        let key = match it.next() {
            Some(k) => k,
            None => break,
        };
        let val = match it.next() {
            Some(v) => v,
            None => break,
        };
        let name = match <&str>::try_from(key) {
            Ok(s) => s,
            Err(_) => continue,
        };
        // An option is recorded only when its value is literally `true`; `false` and an absent
        // key are indistinguishable on purpose.
        if !matches!(val, CBOR::True) {
            continue;
        }
        match name {
            "plat" => *out |= OPT_PLAT,
            "rk" => *out |= OPT_RK,
            "clientPin" => *out |= OPT_CLIENT_PIN,
            "up" => *out |= OPT_UP,
            "uv" => *out |= OPT_UV,
            "pinUvAuthToken" => *out |= OPT_PIN_UV_AUTH_TOKEN,
            "noMcGaPermissionsWithClientPin" => *out |= OPT_NO_MC_GA_PERMISSIONS_WITH_CLIENT_PIN,
            "largeBlobs" => *out |= OPT_LARGE_BLOBS,
            "ep" => *out |= OPT_EP,
            "bioEnroll" => *out |= OPT_BIO_ENROLL,
            "userVerificationMgmtPreview" => *out |= OPT_USER_VERIFICATION_MGMT_PREVIEW,
            "uvBioEnroll" => *out |= OPT_UV_BIO_ENROLL,
            "authnrCfg" => *out |= OPT_AUTHNR_CFG,
            "uvAcfg" => *out |= OPT_UV_ACFG,
            "credMgmt" => *out |= OPT_CRED_MGMT,
            "credentialMgmtPreview" => *out |= OPT_CREDENTIAL_MGMT_PREVIEW,
            "setMinPINLength" => *out |= OPT_SET_MIN_PIN_LENGTH,
            "makeCredUvNotRqd" => *out |= OPT_MAKE_CRED_UV_NOT_RQD,
            "alwaysUv" => *out |= OPT_ALWAYS_UV,
            _ => {}
        }
    }
}

fn decode_pin_protocols(value: CBOR<'_>, out: &mut u8) {
    let arr = match ArrayBuf::try_from(value) {
        Ok(a) => a,
        Err(_) => return,
    };
    for item in arr {
        if let Ok(v) = u8::try_from(item) {
            match v {
                1 => *out |= PIN_PROTOCOL_1,
                2 => *out |= PIN_PROTOCOL_2,
                _ => {}
            }
        }
    }
}

fn decode_transports(value: CBOR<'_>, out: &mut u8) {
    let arr = match ArrayBuf::try_from(value) {
        Ok(a) => a,
        Err(_) => return,
    };
    for item in arr {
        if let Ok(s) = <&str>::try_from(item) {
            match s {
                "usb" => *out |= TRANSPORT_USB,
                "nfc" => *out |= TRANSPORT_NFC,
                "ble" => *out |= TRANSPORT_BLE,
                "internal" => *out |= TRANSPORT_INTERNAL,
                _ => {}
            }
        }
    }
}

fn decode_algorithms(value: CBOR<'_>, out: &mut u8) -> Result<(), Fido2Error> {
    let arr = ArrayBuf::try_from(value).map_err(|_| Fido2Error::Cbor)?;
    for item in arr {
        let map = match MapBuf::try_from(item) {
            Ok(m) => m,
            Err(_) => continue,
        };
        let mut it = map.into_iter();
        loop {
            let key = match it.next() {
                Some(k) => k,
                None => break,
            };
            let val = match it.next() {
                Some(v) => v,
                None => break,
            };
            if matches!(<&str>::try_from(key), Ok("alg")) {
                let alg_id = match i32::try_from(val) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                match alg_id {
                    -8 => *out |= ALG_EDDSA,
                    -7 => *out |= ALG_ES256,
                    -35 => *out |= ALG_ES384,
                    -36 => *out |= ALG_ES512,
                    -47 => *out |= ALG_ES256K,
                    -37 => *out |= ALG_PS256,
                    -257 => *out |= ALG_RS256,
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fido2_minicbor::encoder::Encoder;

    #[test]
    fn parses_versions_options_and_sizes() {
        let mut buf = [0u8; 256];
        let mut enc = Encoder::new(&mut buf);
        enc.map_start(4)
            .uint(1)
            .array_start(1)
            .utf8string("FIDO_2_0")
            .uint(4)
            .map_start(2)
            .utf8string("clientPin")
            .boolean(true)
            .utf8string("rk")
            .boolean(false)
            .uint(5)
            .uint(1200)
            .uint(11)
            .uint(4096);
        let n = enc.finish().unwrap().len();
        let body = &buf[..n];
        let info = parse_get_info_reply(body).unwrap();
        assert_eq!(info.versions, VERSION_FIDO_2_0);
        assert_eq!(info.options & OPT_CLIENT_PIN, OPT_CLIENT_PIN);
        assert_eq!(info.options & OPT_RK, 0);
        assert_eq!(info.max_msg_size, 1200);
        assert_eq!(info.max_serialized_large_blob_array, 4096);
    }

    #[test]
    fn rejects_unrecognized_version_token() {
        let mut buf = [0u8; 64];
        let mut enc = Encoder::new(&mut buf);
        enc.map_start(1).uint(1).array_start(1).utf8string("BOGUS_1_0");
        let n = enc.finish().unwrap().len();
        assert!(matches!(
            parse_get_info_reply(&buf[..n]),
            Err(Fido2Error::Cbor)
        ));
    }
}
