/***************************************************************************************************
 * Copyright (c) 2022 Jeremy O'Donoghue. All rights reserved.
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
 * Common Error Handling for fido2 Crates
 **************************************************************************************************/
use thiserror::Error;

/// The one-byte status code an authenticator returns at the end of every CTAP2 command response.
/// `0x00` is success; everything else is a specific CTAP2 failure mode. `Other` preserves any
/// status code this library does not give a dedicated name to, so a caller can still see the raw
/// value even when talking to an authenticator that returns a status not yet listed here.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CtapStatus {
    #[error("authenticator does not support the requested command")]
    InvalidCommand,
    #[error("invalid message parameter")]
    InvalidParameter,
    #[error("invalid message or item length")]
    InvalidLength,
    #[error("invalid message sequencing")]
    InvalidSeq,
    #[error("message timed out")]
    Timeout,
    #[error("channel busy")]
    ChannelBusy,
    #[error("command requires channel lock")]
    LockRequired,
    #[error("command not allowed on this cid")]
    InvalidChannel,
    #[error("invalid/unexpected CBOR error")]
    CborUnexpectedType,
    #[error("error when parsing CBOR")]
    InvalidCbor,
    #[error("missing non-optional parameter")]
    MissingParameter,
    #[error("limit for number of items exceeded")]
    LimitExceeded,
    #[error("unsupported extension")]
    UnsupportedExtension,
    #[error("large-blob storage is full")]
    LargeblobStorageFull,
    #[error("valid credential found in the exclude list")]
    CredentialExcluded,
    #[error("processing, lengthy operation is in progress")]
    Processing,
    #[error("credential not valid for the authenticator")]
    InvalidCredential,
    #[error("authentication is waiting for user interaction")]
    UserActionPending,
    #[error("processing, lengthy operation is in progress")]
    OperationPending,
    #[error("no request is pending")]
    NoOperations,
    #[error("authenticator does not support requested algorithm")]
    UnsupportedAlgorithm,
    #[error("not a valid action for current state")]
    OperationDenied,
    #[error("internal key storage is full")]
    KeyStoreFull,
    #[error("no outstanding operations")]
    NoOperationPending,
    #[error("unsupported option")]
    UnsupportedOption,
    #[error("not a valid option for current operation")]
    InvalidOption,
    #[error("pending keep alive was cancelled")]
    KeepaliveCancel,
    #[error("no valid credentials provided")]
    NoCredentials,
    #[error("timeout waiting for user interaction")]
    UserActionTimeout,
    #[error("continuation command, such as largeBlobs, is not allowed")]
    NotAllowed,
    #[error("invalid PIN")]
    PinInvalid,
    #[error("PIN blocked after too many failed attempts")]
    PinBlocked,
    #[error("PIN authentication (pinUvAuthParam) verification failed")]
    PinAuthInvalid,
    #[error("PIN authentication blocked after too many consecutive failed attempts")]
    PinAuthBlocked,
    #[error("no PIN has been set")]
    PinNotSet,
    #[error("PIN is required for the selected operation")]
    PinRequired,
    #[error("PIN policy violation")]
    PinPolicyViolation,
    #[error("pinUvAuthToken expired")]
    PinTokenExpired,
    #[error("authenticator cannot handle this request due to memory constraints")]
    RequestTooLarge,
    #[error("the current operation has timed out")]
    ActionTimeout,
    #[error("user presence is required for the requested operation")]
    UpRequired,
    #[error("built-in user verification is blocked")]
    UvBlocked,
    #[error("built-in user verification unsuccessful")]
    UvInvalid,
    #[error("permission denied for this request")]
    UnauthorizedPermission,
    #[error("other unspecified error")]
    Other,
    /// A status byte not covered by the variants above.
    #[error("authenticator returned unrecognised status 0x{0:02x}")]
    Unknown(u8),
}

impl From<u8> for CtapStatus {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Self::InvalidCommand,
            0x02 => Self::InvalidParameter,
            0x03 => Self::InvalidLength,
            0x04 => Self::InvalidSeq,
            0x05 => Self::Timeout,
            0x06 => Self::ChannelBusy,
            0x0a => Self::LockRequired,
            0x0b => Self::InvalidChannel,
            0x11 => Self::CborUnexpectedType,
            0x12 => Self::InvalidCbor,
            0x14 => Self::MissingParameter,
            0x15 => Self::LimitExceeded,
            0x16 => Self::UnsupportedExtension,
            0x18 => Self::LargeblobStorageFull,
            0x19 => Self::CredentialExcluded,
            0x21 => Self::Processing,
            0x22 => Self::InvalidCredential,
            0x23 => Self::UserActionPending,
            0x24 => Self::OperationPending,
            0x25 => Self::NoOperations,
            0x26 => Self::UnsupportedAlgorithm,
            0x27 => Self::OperationDenied,
            0x28 => Self::KeyStoreFull,
            0x29 => Self::NoOperationPending,
            0x2a => Self::NoOperationPending,
            0x2b => Self::UnsupportedOption,
            0x2c => Self::InvalidOption,
            0x2d => Self::KeepaliveCancel,
            0x2e => Self::NoCredentials,
            0x2f => Self::UserActionTimeout,
            0x30 => Self::NotAllowed,
            0x31 => Self::PinInvalid,
            0x32 => Self::PinBlocked,
            0x33 => Self::PinAuthInvalid,
            0x34 => Self::PinAuthBlocked,
            0x35 => Self::PinNotSet,
            0x36 => Self::PinRequired,
            0x37 => Self::PinPolicyViolation,
            0x38 => Self::PinTokenExpired,
            0x39 => Self::RequestTooLarge,
            0x3a => Self::ActionTimeout,
            0x3b => Self::UpRequired,
            0x3c => Self::UvBlocked,
            0x3f => Self::UvInvalid,
            0x40 => Self::UnauthorizedPermission,
            0x7f => Self::Other,
            other => Self::Unknown(other),
        }
    }
}

/// Set of errors used across the `fido2_*` crates: authenticator-reported CTAP2 failures,
/// transport-level failures talking to the authenticator over NFC, and local failures decoding
/// or verifying what the authenticator sent back.
///
/// Each error has a corresponding numeric code in [`c_errors`]; the error descriptions should be
/// pretty self-explanatory.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Fido2Error {
    /// The authenticator's CTAP2 response carried a non-success status byte.
    #[error("authenticator returned an error: {0}")]
    Ctap(CtapStatus),
    /// A CBOR encode or decode operation failed while building a request or parsing a response.
    #[error("CBOR encode/decode failure")]
    Cbor,
    /// The ISO7816-4 APDU exchange with the authenticator failed (bad status word, truncated
    /// chaining, or the transport itself returned an I/O error).
    #[error("APDU transport failure")]
    Transport,
    /// The authenticator did not answer SELECT with the expected FIDO applet AID.
    #[error("authenticator did not select the FIDO applet")]
    AppletNotSelected,
    /// A caller-supplied buffer was too small to hold the result. Carries the size actually
    /// required so the caller can retry with an adequately sized buffer.
    #[error("buffer too small, need at least {0} bytes")]
    ShortBuffer(usize),
    /// A cryptographic operation (AEAD open/seal, signature verification, hashing) failed.
    #[error("cryptographic operation failed")]
    Crypto,
    /// Signature verification did not validate against the provided public key.
    #[error("signature verification failed")]
    InvalidSignature,
    /// No large-blob array entry decrypted successfully under any of the supplied keys.
    #[error("no matching large-blob entry found")]
    NotFound,
    /// The large-blob array's trailing integrity checksum did not match its contents.
    #[error("large-blob array failed integrity check")]
    IntegrityCheckFailed,
    /// Decompression of a large-blob entry's compressed payload failed.
    #[error("large-blob payload decompression failed")]
    Decompress,
    /// An operation requires explicit user presence, which the authenticator has not obtained.
    #[error("user presence is required")]
    UserPresenceRequired,
    /// An internal invariant was violated; this indicates a bug rather than bad input.
    #[error("internal error")]
    Internal,
    /// A caller-supplied argument was structurally invalid (empty RP ID, malformed large-blob
    /// entry, truncated buffer contents) rather than merely undersized.
    #[error("invalid argument")]
    InvalidArgument,
}

/// Numeric error codes mirroring the ones above, for use at FFI boundaries where a C caller
/// cannot receive a Rust enum directly.
pub mod c_errors {
    /// Success; no error occurred.
    pub const SUCCESS: u32 = 0;
    /// See [`super::Fido2Error::Ctap`].
    pub const ERROR_CTAP: u32 = 0x0001_0000;
    /// See [`super::Fido2Error::Cbor`].
    pub const ERROR_CBOR: u32 = 0x0001_0001;
    /// See [`super::Fido2Error::Transport`].
    pub const ERROR_TRANSPORT: u32 = 0x0001_0002;
    /// See [`super::Fido2Error::AppletNotSelected`].
    pub const ERROR_APPLET_NOT_SELECTED: u32 = 0x0001_0003;
    /// See [`super::Fido2Error::ShortBuffer`].
    pub const ERROR_SHORT_BUFFER: u32 = 0x0001_0004;
    /// See [`super::Fido2Error::Crypto`].
    pub const ERROR_CRYPTO: u32 = 0x0001_0005;
    /// See [`super::Fido2Error::InvalidSignature`].
    pub const ERROR_INVALID_SIGNATURE: u32 = 0x0001_0006;
    /// See [`super::Fido2Error::NotFound`].
    pub const ERROR_NOT_FOUND: u32 = 0x0001_0007;
    /// See [`super::Fido2Error::IntegrityCheckFailed`].
    pub const ERROR_INTEGRITY_CHECK_FAILED: u32 = 0x0001_0008;
    /// See [`super::Fido2Error::Decompress`].
    pub const ERROR_DECOMPRESS: u32 = 0x0001_0009;
    /// See [`super::Fido2Error::UserPresenceRequired`].
    pub const ERROR_USER_PRESENCE_REQUIRED: u32 = 0x0001_000a;
    /// See [`super::Fido2Error::Internal`].
    pub const ERROR_INTERNAL: u32 = 0x0001_000b;
    /// A required pointer argument was NULL. Has no corresponding [`super::Fido2Error`] variant -
    /// it is caught at the FFI boundary before any Rust call is made.
    pub const ERROR_NULL_POINTER: u32 = 0x0001_000c;
    /// See [`super::Fido2Error::InvalidArgument`].
    pub const ERROR_INVALID_ARGUMENT: u32 = 0x0001_000d;
}

/// Convert a [`Fido2Error`] into the numeric code used over the C language API. The underlying
/// CTAP status byte carried by [`Fido2Error::Ctap`], and the required size carried by
/// [`Fido2Error::ShortBuffer`], are lost in this conversion; callers needing that detail should
/// inspect the Rust error directly rather than go through the FFI boundary.
impl From<Fido2Error> for u32 {
    fn from(err: Fido2Error) -> u32 {
        match err {
            Fido2Error::Ctap(_) => c_errors::ERROR_CTAP,
            Fido2Error::Cbor => c_errors::ERROR_CBOR,
            Fido2Error::Transport => c_errors::ERROR_TRANSPORT,
            Fido2Error::AppletNotSelected => c_errors::ERROR_APPLET_NOT_SELECTED,
            Fido2Error::ShortBuffer(_) => c_errors::ERROR_SHORT_BUFFER,
            Fido2Error::Crypto => c_errors::ERROR_CRYPTO,
            Fido2Error::InvalidSignature => c_errors::ERROR_INVALID_SIGNATURE,
            Fido2Error::NotFound => c_errors::ERROR_NOT_FOUND,
            Fido2Error::IntegrityCheckFailed => c_errors::ERROR_INTEGRITY_CHECK_FAILED,
            Fido2Error::Decompress => c_errors::ERROR_DECOMPRESS,
            Fido2Error::UserPresenceRequired => c_errors::ERROR_USER_PRESENCE_REQUIRED,
            Fido2Error::Internal => c_errors::ERROR_INTERNAL,
            Fido2Error::InvalidArgument => c_errors::ERROR_INVALID_ARGUMENT,
        }
    }
}
