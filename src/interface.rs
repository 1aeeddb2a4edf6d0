//! The hardware port consumed by the oracle: byte-level serial I/O, the trigger line, and the
//! one-time platform bring-up.
//!
//! The channel and the oracles only ever see the [`Serial`], [`Trigger`] and [`Port`] traits. The
//! concrete [`Board`] drives the lm3s6965 directly through memory-mapped registers, in the same
//! way as the UART handling of the controller firmware this crate grew out of: UART0 carries the
//! host protocol and pin 0 of GPIO port B is the scope trigger.
//!
//! All unsafe code in this crate lives here, as register reads and writes.

use core::fmt::Formatter;
use core::fmt::{Debug, Result as FmtResult};
use core::result::Result as CoreResult;
use cty::uintptr_t;
use volatile_register::{RO, RW, WO};

use crate::interface::RWStatusMask::{RXFE, TXFF};

/// Base address of UART0, which is wired to the host
pub const UART0_BASE: uintptr_t = 0x4000_C000;

/// Base address of GPIO port B, which carries the trigger pin
pub const GPIOB_BASE: uintptr_t = 0x4000_5000;

/// Base address of the clock gating block of the system control registers
pub const RCGC_BASE: uintptr_t = 0x400F_E100;

/// Pin number of the trigger on GPIO port B
pub const TRIGGER_PIN: usize = 0;

/// Register block of a UART peripheral
#[repr(C)]
#[allow(dead_code)]
struct UART {
    /// Data register
    dr: RW<u32>,
    /// Receive status / error clear
    rsr: RW<u32>,
    /// Reserved
    reserved1: [u8; 16],
    /// Flag register
    fr: RO<u32>,
    /// Reserved
    reserved2: [u8; 4],
    /// IrDA low-power register
    ilpr: RW<u32>,
    /// Integer baud rate divisor
    ibrd: RW<u32>,
    /// Fractional baud rate divisor
    fbrd: RW<u32>,
    /// Line control
    lcrh: RW<u32>,
    /// Control
    ctl: RW<u32>,
    /// Interrupt FIFO level select
    ifls: RW<u32>,
    /// Interrupt mask
    im: RW<u32>,
    /// Raw interrupt status
    ris: RO<u32>,
    /// Masked interrupt status
    mis: RO<u32>,
    /// Interrupt clear
    icr: WO<u32>,
    /// DMA control
    dmactl: RW<u32>,
}

/// Register block of a GPIO port, up to the digital enable register
#[repr(C)]
#[allow(dead_code)]
struct GPIO {
    /// Masked data registers; writing index `m` only touches the pins set in `m`
    data: [RW<u32>; 256],
    /// Direction
    dir: RW<u32>,
    /// Interrupt sense
    is: RW<u32>,
    /// Interrupt both edges
    ibe: RW<u32>,
    /// Interrupt event
    iev: RW<u32>,
    /// Interrupt mask
    im: RW<u32>,
    /// Raw interrupt status
    ris: RO<u32>,
    /// Masked interrupt status
    mis: RO<u32>,
    /// Interrupt clear
    icr: WO<u32>,
    /// Alternate function select
    afsel: RW<u32>,
    /// Reserved
    reserved: [u8; 0xdc],
    /// 2-mA drive select
    dr2r: RW<u32>,
    /// 4-mA drive select
    dr4r: RW<u32>,
    /// 8-mA drive select
    dr8r: RW<u32>,
    /// Open drain select
    odr: RW<u32>,
    /// Pull-up select
    pur: RW<u32>,
    /// Pull-down select
    pdr: RW<u32>,
    /// Slew rate control select
    slr: RW<u32>,
    /// Digital enable
    den: RW<u32>,
}

/// Run-mode clock gating registers
#[repr(C)]
#[allow(dead_code)]
struct RCGC {
    /// Gating control 0 (watchdog, ADC, ...)
    rcgc0: RW<u32>,
    /// Gating control 1 (UARTs, timers, ...)
    rcgc1: RW<u32>,
    /// Gating control 2 (GPIO ports, ...)
    rcgc2: RW<u32>,
}

/// UART flag register bits
pub enum RWStatusMask {
    /// Receive FIFO empty
    RXFE = 0x10,
    /// Transmit FIFO full
    TXFF = 0x20,
}

/// Errors raised by a port
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// No byte was available; only non-blocking ports report this
    NoData,
}

/// Result type for port operations
pub type Result<T> = CoreResult<T, Error>;

/// Byte-level, half-duplex serial link to the host
pub trait Serial {
    /// Whether a byte is waiting to be read
    fn avail(&self) -> bool;

    /// Reads one byte. Hardware ports block until a byte arrives and never fail.
    fn readb(&mut self) -> Result<u8>;

    /// Writes one byte, blocking until the transmitter accepts it
    fn writeb(&mut self, data: u8);

    /// Fills `buf` from the link, returning the number of bytes read before the link ran dry
    fn read(&mut self, buf: &mut [u8]) -> usize {
        for (i, b) in buf.iter_mut().enumerate() {
            match self.readb() {
                Ok(res) => *b = res,
                Err(_) => return i,
            }
        }
        buf.len()
    }

    /// Writes all of `buf` to the link
    fn write(&mut self, buf: &[u8]) -> usize {
        for b in buf {
            self.writeb(*b);
        }
        buf.len()
    }
}

/// The binary trigger line observed by the oscilloscope.
///
/// Both operations sit inside the measured window, so implementations must be a single store
/// with no branching on data.
pub trait Trigger {
    /// Drives the trigger line high
    fn trigger_high(&mut self);

    /// Drives the trigger line low
    fn trigger_low(&mut self);
}

/// The full capability set the oracle firmware needs from a board. The setup operations are each
/// called exactly once, in declaration order, before the first command is read.
pub trait Port: Serial + Trigger {
    /// Clocks and any other board-level configuration
    fn platform_init(&mut self);

    /// Configures the host UART
    fn init_uart(&mut self);

    /// Configures the trigger pin as an output and drives it low
    fn trigger_setup(&mut self);
}

/// The lm3s6965 board: UART0 towards the host and a trigger on PB0
pub struct Board {
    /// UART0 register block
    uart: &'static mut UART,
    /// GPIO port B register block
    gpio: &'static mut GPIO,
    /// Clock gating registers
    rcgc: &'static mut RCGC,
}

impl Board {
    /// Mask selecting the trigger pin in the GPIO data and configuration registers
    const TRIGGER_MASK: usize = 1 << TRIGGER_PIN;

    /// Maps the board's register blocks. No hardware is touched until the [`Port`] setup
    /// operations run.
    pub fn new() -> Self {
        let uart = unsafe { &mut *(UART0_BASE as *mut UART) };
        let gpio = unsafe { &mut *(GPIOB_BASE as *mut GPIO) };
        let rcgc = unsafe { &mut *(RCGC_BASE as *mut RCGC) };
        Board { uart, gpio, rcgc }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Serial for Board {
    fn avail(&self) -> bool {
        self.uart.fr.read() & (RXFE as u32) == 0
    }

    #[allow(clippy::cast_possible_truncation)] // data lives in the low byte
    fn readb(&mut self) -> Result<u8> {
        while !self.avail() {}

        Ok(self.uart.dr.read() as u8)
    }

    fn writeb(&mut self, data: u8) {
        while self.uart.fr.read() & (TXFF as u32) != 0 {}
        unsafe {
            self.uart.dr.write(data.into());
        }
    }
}

impl Trigger for Board {
    #[inline(always)]
    fn trigger_high(&mut self) {
        unsafe {
            self.gpio.data[Board::TRIGGER_MASK].write(0xff);
        }
    }

    #[inline(always)]
    fn trigger_low(&mut self) {
        unsafe {
            self.gpio.data[Board::TRIGGER_MASK].write(0x00);
        }
    }
}

impl Port for Board {
    fn platform_init(&mut self) {
        unsafe {
            self.rcgc.rcgc1.modify(|r| r | 0x01); // UART0
            self.rcgc.rcgc2.modify(|r| r | 0x02); // GPIOB
        }
        // peripherals need a few cycles after their clock is gated on
        cortex_m::asm::delay(16);
    }

    fn init_uart(&mut self) {
        let uart = &mut self.uart;
        unsafe {
            uart.ctl.write(uart.ctl.read() & 0xffff_fffe);
            uart.ibrd.write((uart.ibrd.read() & 0xffff_0000) | 0x000a);
            uart.fbrd.write((uart.fbrd.read() & 0xffff_0000) | 0x0036);
            uart.lcrh.write(0x60);
            uart.ctl.write(uart.ctl.read() | 0x01);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn trigger_setup(&mut self) {
        let mask = Board::TRIGGER_MASK as u32;
        unsafe {
            self.gpio.afsel.modify(|r| r & !mask);
            self.gpio.dir.modify(|r| r | mask);
            self.gpio.dr8r.modify(|r| r | mask);
            self.gpio.den.modify(|r| r | mask);
        }
        self.trigger_low();
    }
}

impl Debug for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "Board {{ uart: {:#x}, gpio: {:#x}, trigger: PB{} }}",
            &*self.uart as *const UART as uintptr_t,
            &*self.gpio as *const GPIO as uintptr_t,
            TRIGGER_PIN
        )
    }
}
