//! Firmware entry point: brings the board up with the oracle variant selected at build time, then
//! serves the host forever.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]
#![warn(clippy::pedantic)] // enforce pedantic checks -- false positive prone
#![deny(clippy::missing_docs_in_private_items)] // enforce documentation

#[cfg(not(any(feature = "aes-ecb", feature = "p256-ecdh")))]
compile_error!("select an oracle variant with the `aes-ecb` or `p256-ecdh` feature");

#[cfg(target_os = "none")]
mod firmware {
    use cortex_m_rt::entry;
    use cortex_m_rt::exception;
    use lm3s6965 as _;
    #[cfg(not(feature = "semihosted"))]
    use panic_halt as _;
    #[cfg(feature = "semihosted")]
    use panic_semihosting as _;

    use oracle::channel::{Channel, Encoding};
    use oracle::debug;
    use oracle::interface::Board;

    /// The oracle built into this firmware; `p256-ecdh` takes precedence over `aes-ecb`
    #[cfg(feature = "p256-ecdh")]
    type Variant = oracle::ecdh::P256Oracle;
    /// The oracle built into this firmware
    #[cfg(not(feature = "p256-ecdh"))]
    type Variant = oracle::ecb::AesOracle;

    // includes the code generated by build.rs; these are the values specified at build time
    include!(concat!(env!("OUT_DIR"), "/values.rs"));

    /// Entrypoint for the oracle firmware, which brings the board up, builds the command table for
    /// the selected variant, then enters the command loop
    #[entry]
    fn main() -> ! {
        let mut channel = match Channel::new(Board::new(), Variant::default(), ENCODING) {
            Ok(channel) => channel,
            Err(err) => panic!("invalid command table: {:?}", err),
        };
        debug!("Oracle ready: {:?}, {:?}", channel.port(), ENCODING);

        channel.run()
    }

    /// Handler for exceptions generated by the processor. In our case, we are not handling them as
    /// they do not pertain to our use case (we are not asynchronously processing input from UART0)
    #[exception]
    #[allow(non_snake_case)]
    fn DefaultHandler(_irqn: i16) {}
}

/// The firmware only runs on the target; host builds exist for the library and its tests
#[cfg(not(target_os = "none"))]
fn main() {}
