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
 * ISO7816-4 short APDU
 *
 * Covers case-3 APDUs only (a header plus up to 255 bytes of command data, no Le byte) - the
 * only shape the SELECT, CBOR and MSG commands ever need. GET_RESPONSE is a case-2 APDU (Le, no
 * command data) and is built directly by the transport rather than through this type, the same
 * split the original implementation draws between its `iso7816_init` helper and the hand-rolled
 * five-byte buffer in `tx_get_response`.
 *
 * The payload is held by reference and serialized directly into the caller's output buffer by
 * `write_into`, so there is never an intermediate copy of the payload bytes themselves.
 **************************************************************************************************/
use fido2_error::Fido2Error;

/// Header-plus-payload view of a short (Lc ≤ 255) command APDU.
#[derive(Debug, Clone, Copy)]
pub struct Apdu<'a> {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub payload: &'a [u8],
}

impl<'a> Apdu<'a> {
    /// Construct an APDU over a borrowed payload. Fails if the payload cannot be framed as a
    /// short APDU (more than 255 bytes of command data).
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8, payload: &'a [u8]) -> Result<Self, Fido2Error> {
        if payload.len() > 255 {
            return Err(Fido2Error::Transport);
        }
        Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            payload,
        })
    }

    /// Total length of the serialized APDU: 5-byte header plus payload.
    pub fn encoded_len(&self) -> usize {
        5 + self.payload.len()
    }

    /// Serialize `self` into `out`, returning the number of bytes written.
    pub fn write_into(&self, out: &mut [u8]) -> Result<usize, Fido2Error> {
        let len = self.encoded_len();
        if out.len() < len {
            return Err(Fido2Error::ShortBuffer(len));
        }
        out[0] = self.cla;
        out[1] = self.ins;
        out[2] = self.p1;
        out[3] = self.p2;
        out[4] = self.payload.len() as u8;
        out[5..len].copy_from_slice(self.payload);
        Ok(len)
    }

    /// Parse a serialized short APDU back out of `bytes`, returning the parsed APDU and the
    /// number of bytes consumed. Used by tests exercising `write_into`'s framing and available
    /// to callers that need to inspect a raw APDU buffer directly.
    pub fn parse(bytes: &'a [u8]) -> Result<(Apdu<'a>, usize), Fido2Error> {
        if bytes.len() < 5 {
            return Err(Fido2Error::Transport);
        }
        let lc = bytes[4] as usize;
        let total = 5 + lc;
        if bytes.len() < total {
            return Err(Fido2Error::Transport);
        }
        Ok((
            Apdu {
                cla: bytes[0],
                ins: bytes[1],
                p1: bytes[2],
                p2: bytes[3],
                payload: &bytes[5..total],
            },
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_header_and_payload() {
        let apdu = Apdu::new(0x00, 0xa4, 0x04, 0x00, &[0xa0, 0x00, 0x00, 0x06]).unwrap();
        let mut buf = [0u8; 16];
        let n = apdu.write_into(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x00, 0xa4, 0x04, 0x00, 0x04, 0xa0, 0x00, 0x00, 0x06]);
        let (parsed, consumed) = Apdu::parse(&buf[..n]).unwrap();
        assert_eq!(consumed, n);
        assert_eq!(parsed.payload, apdu.payload);
    }

    #[test]
    fn rejects_oversized_payload() {
        let payload = [0u8; 256];
        assert!(matches!(
            Apdu::new(0x80, 0x10, 0x00, 0x00, &payload),
            Err(Fido2Error::Transport)
        ));
    }

    #[test]
    fn write_into_reports_required_size() {
        let apdu = Apdu::new(0x00, 0xa4, 0x04, 0x00, &[0x01, 0x02]).unwrap();
        let mut tiny = [0u8; 3];
        assert!(matches!(
            apdu.write_into(&mut tiny),
            Err(Fido2Error::ShortBuffer(7))
        ));
    }
}
