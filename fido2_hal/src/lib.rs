/***************************************************************************************************
 * Copyright (c) 2022 Qualcomm Innovation Center, Inc. All rights reserved.
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
 * fido2_hal
 *
 * The hardware abstraction layer a platform provides to `fido2_client`: a byte-oriented transport
 * handle (`HostIo`) and a cryptographic provider (`CryptoProvider`). Both are traits rather than
 * the function-pointer vtable the original connector used, so a caller can hand `fido2_client` a
 * `&dyn HostIo` / `&dyn CryptoProvider` built from whatever concrete implementation its platform
 * offers - real NFC hardware and a hardware crypto engine on a production target, or the
 * in-process simulator used by this workspace's own tests.
 **************************************************************************************************/
#![no_std]

extern crate getrandom;

mod crypto;
mod hostio;

#[cfg(feature = "software-crypto")]
pub mod software;

pub use crypto::CryptoProvider;
pub use hostio::HostIo;
