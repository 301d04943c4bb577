/***************************************************************************************************
 * Host I/O surface
 *
 * Generalizes the original `Connector` function-pointer vtable (connect/disconnect/
 * service_discovery/open_session/close_session/execute_transaction/cancel_transaction) down to
 * the four operations `fido2_client`'s NFC transport actually drives: open a channel to the
 * authenticator, close it, and exchange raw bytes over it. Everything above that - APDU framing,
 * chaining, GET_RESPONSE reassembly - lives in `fido2_client::transport` and is built on top of
 * this trait, not baked into it.
 **************************************************************************************************/
use fido2_error::Fido2Error;

/// A synchronous, blocking byte transport to a FIDO2 authenticator.
///
/// Implementors are expected to be a thin wrapper over whatever the platform provides - an NFC
/// reader driver, a USB CCID stack, or (for tests) an in-process simulator. All operations are
/// synchronous: `fido2_client` performs one request/response round-trip at a time and never holds
/// more than one outstanding operation against a given handle.
pub trait HostIo {
    /// Open a channel to the authenticator. Implementations that do not need an explicit open
    /// step (e.g. an always-present in-process simulator) may treat this as a no-op.
    fn open(&mut self) -> Result<(), Fido2Error>;

    /// Close a previously opened channel. Must be idempotent: calling `close` on an already-closed
    /// or never-opened handle returns `Ok(())`.
    fn close(&mut self) -> Result<(), Fido2Error>;

    /// Write `data` to the authenticator in full, or fail.
    fn write(&mut self, data: &[u8]) -> Result<(), Fido2Error>;

    /// Read up to `out.len()` bytes from the authenticator into `out`, returning the number of
    /// bytes actually read.
    fn read(&mut self, out: &mut [u8]) -> Result<usize, Fido2Error>;
}
