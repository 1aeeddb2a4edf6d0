// Generate this documentation in a prettier form with `cargo doc --release --open`

//! On-device crypto oracle for side-channel power/EM analysis.
//!
//! A host sends commands over the serial link; the device runs exactly one cryptographic
//! primitive on attacker-chosen input under a loaded secret, while a GPIO trigger brackets that
//! primitive and nothing else, so that an oscilloscope captures a trace aligned to the operation.
//!
//! ## Building
//!
//! To compile the firmware by hand, please ensure that you do the following:
//!
//!  - Install the following packages (or equivalent) for your operating system:
//!    - `binutils-arm-none-eabi`
//!    - `gcc-arm-none-eabi`
//!  - Install the `thumbv7m-none-eabi` target via rustup: `rustup target add thumbv7m-none-eabi`
//!  - Build it! `RUSTFLAGS="-C link-arg=-Tlink.x" cargo build --release --target thumbv7m-none-eabi`.
//!    Add `--features p256-ecdh` for the point multiplication oracle instead of AES, and
//!    `--features semihosted` to log debug information to the host under QEMU. Set
//!    `ORACLE_ENCODING=hex` to speak simpleserial v1 hex lines instead of raw frames.
//!
//! To run via QEMU, perform an additional objcopy step, the output of which can then be used as a
//! `-kernel` argument: `arm-none-eabi-objcopy -O binary target/thumbv7m-none-eabi/release/oracle kernel`
//!
//! The library (everything but the firmware entry point) also builds on the host, which is where
//! its tests run: `cargo test`.
//!
//! ## Design
//!
//! The firmware is split into the following modules:
//!
//!  - [The interface](interface), the hardware port: serial bytes, the trigger line and board
//!    bring-up. It is the only place with unsafe code.
//!  - [The channel](channel), the driver for communications, which decodes request frames, routes
//!    them, and frames responses and acknowledgements.
//!  - [The command table](command), the fixed mapping from a command code to its payload length
//!    and handler.
//!  - [The oracle](oracle), the trait for the session state and the trigger discipline every
//!    variant follows.
//!
//! As we wish to swap the primitive under study without touching the protocol, the
//! [channel](channel::Channel) is generic over an [`Oracle`](oracle::Oracle) and a
//! [`Port`](interface::Port). Two oracle families are present: [AES-128-ECB](ecb) and
//! [P-256 scalar multiplication](ecdh). Exactly one is built into the firmware.
//!
//! The device is strictly half-duplex and single threaded. One command is read, its handler runs
//! to completion, and its response and acknowledgement are sent before the next byte is read. No
//! interrupts are used, so nothing can run inside the trigger window but the primitive itself.

#![cfg_attr(not(test), no_std)]
#![warn(clippy::pedantic)] // enforce pedantic checks -- false positive prone
#![deny(clippy::missing_docs_in_private_items)] // enforce documentation

pub mod channel;
pub mod command;
pub mod cursor;
pub mod ecb;
pub mod ecdh;
pub mod interface;
pub mod oracle;

/// Prints to the host over semihosting when built with the `semihosted` feature; expands to
/// nothing otherwise. Never used while the trigger is high.
#[macro_export]
macro_rules! debug {
    ($($args: expr),+) => {
        #[cfg(feature = "semihosted")]
        ::cortex_m_semihosting::hprintln!($($args),+).ok();
    }
}
