//! The framed command channel: reads one command at a time from the [port](crate::interface::Port),
//! routes it through the [command table](crate::command::CommandTable) to the
//! [oracle](crate::oracle::Oracle), and frames whatever comes back.
//!
//! Two wire encodings share the same table and handlers; which one is used is fixed when the
//! firmware is built.
//!
//! [`Encoding::Binary`] is the raw form. A request is the command code followed by exactly the
//! number of payload bytes the table declares for it; there is no length field on the wire. A
//! response is `'r'`, one length byte and the payload. Every handled request is acknowledged with
//! one status byte after the handler (and its response, if any) has finished.
//!
//! ```text
//! host -> k 2b7e1516..09cf4f3c        device -> 00
//! host -> p 6bc1bee2..7393172a        device -> r 10 3ad77bb4..2466ef97 00
//! host -> x                           device -> 00
//! ```
//!
//! [`Encoding::Hex`] is the line form spoken by ChipWhisperer's simpleserial v1 host tooling: the
//! command code, the payload as ASCII hex and a newline; responses are `r<hex>\n` and the status
//! is acknowledged as `z<hex>\n`.
//!
//! ```text
//! host -> "k2b7e151628aed2a6abf7158809cf4f3c\n"    device -> "z00\n"
//! host -> "p6bc1bee22e409f96e93d7e117393172a\n"    device -> "r3ad77bb40d7a3660a89ecaf32466ef97\n" "z00\n"
//! ```
//!
//! In both encodings an unknown command code is skipped and a malformed hex line is discarded up
//! to its newline; neither runs a handler nor produces an acknowledgement. The channel assumes a
//! lossless link and never times out: reading blocks until the host sends something.
//!
//! Nothing in here runs while the trigger is high. The only trigger activity happens inside the
//! oracle, between the last payload byte being read and the first response byte being written.

use core::result::Result as CoreResult;

use crate::command::{Command, CommandTable, Entry, Status, TableError, MAX_PAYLOAD};
use crate::debug;
use crate::interface::{Error as PortError, Port};
use crate::oracle::Oracle;

/// Lead byte of a response frame
pub const RESPONSE: u8 = b'r';

/// Lead byte of an acknowledgement line in the hex encoding
pub const ACK: u8 = b'z';

/// Line terminator of the hex encoding
const NEWLINE: u8 = b'\n';

/// Optional carriage return accepted before [`NEWLINE`] in the hex encoding
const CARRIAGE_RETURN: u8 = b'\r';

/// How frames are laid out on the wire
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Encoding {
    /// Raw bytes with table-declared payload lengths
    Binary,
    /// Newline-terminated ASCII hex, simpleserial v1 compatible
    Hex,
}

/// Outcomes of a frame which did not reach a handler
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// The port ran out of bytes before a whole frame arrived
    NoData,
    /// The code is not in the command table; the byte was skipped
    UnknownCommand(u8),
    /// A hex line for the given code was invalid or had the wrong length, and was discarded
    Malformed(u8),
}

impl From<PortError> for Error {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NoData => Error::NoData,
        }
    }
}

/// Simple result type for methods in [`Channel`](Channel)
pub type Result<T> = CoreResult<T, Error>;

/// The command channel. It exclusively owns the port, the oracle (and so the key material) and
/// the command table; only the dispatch loop ever touches any of them.
pub struct Channel<P: Port, O: Oracle> {
    /// The hardware port
    port: P,
    /// The session state
    oracle: O,
    /// Routing table, built for `O` at startup
    table: CommandTable,
    /// Wire encoding
    encoding: Encoding,
    /// Payload of the request being processed, then its response
    data: [u8; MAX_PAYLOAD],
}

impl<P: Port, O: Oracle> Channel<P, O> {
    /// Brings the board up and builds the command table for `O`.
    ///
    /// Fails only when the table is misconfigured, in which case the firmware must not start.
    pub fn new(mut port: P, oracle: O, encoding: Encoding) -> CoreResult<Self, TableError> {
        port.platform_init();
        port.init_uart();
        port.trigger_setup();

        let table = CommandTable::new::<O>()?;
        debug!("Command table: {:?}", table);

        Ok(Channel {
            port,
            oracle,
            table,
            encoding,
            data: [0_u8; MAX_PAYLOAD],
        })
    }

    /// The port, for inspection
    pub fn port(&self) -> &P {
        &self.port
    }

    /// The port, for feeding host-side ports
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// The session state
    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// The command table in use
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Reads one request into the data buffer, returning its table entry
    pub fn read_frame(&mut self) -> Result<Entry> {
        match self.encoding {
            Encoding::Binary => self.read_binary(),
            Encoding::Hex => self.read_hex(),
        }
    }

    /// Reads `[code][payload]`
    fn read_binary(&mut self) -> Result<Entry> {
        let code = self.port.readb()?;
        let entry = self.table.lookup(code).ok_or_else(|| {
            debug!("Skipping unknown command {:#04x}", code);
            Error::UnknownCommand(code)
        })?;

        if self.port.read(&mut self.data[..entry.len]) < entry.len {
            return Err(Error::NoData);
        }

        Ok(entry)
    }

    /// Reads `code hex* '\n'`
    fn read_hex(&mut self) -> Result<Entry> {
        let code = loop {
            match self.port.readb()? {
                NEWLINE | CARRIAGE_RETURN => continue,
                code => break code,
            }
        };

        let entry = match self.table.lookup(code) {
            Some(entry) => entry,
            None => {
                debug!("Skipping unknown command {:#04x}", code);
                self.discard_line()?;
                return Err(Error::UnknownCommand(code));
            }
        };

        let mut text = [0_u8; 2 * MAX_PAYLOAD];
        for c in text[..2 * entry.len].iter_mut() {
            *c = self.port.readb()?;
            if *c == NEWLINE {
                debug!("Short line for {:#04x}", code);
                return Err(Error::Malformed(code));
            }
        }

        let mut end = self.port.readb()?;
        if end == CARRIAGE_RETURN {
            end = self.port.readb()?;
        }
        if end != NEWLINE {
            debug!("Long line for {:#04x}", code);
            self.discard_line()?;
            return Err(Error::Malformed(code));
        }

        hex::decode_to_slice(&text[..2 * entry.len], &mut self.data[..entry.len]).map_err(
            |_| {
                debug!("Bad hex for {:#04x}", code);
                Error::Malformed(code)
            },
        )?;

        Ok(entry)
    }

    /// Drops input up to and including the next newline
    fn discard_line(&mut self) -> Result<()> {
        while self.port.readb()? != NEWLINE {}
        Ok(())
    }

    /// Frames the first `len` bytes of the data buffer as a response
    pub fn send_response(&mut self, len: usize) {
        self.port.writeb(RESPONSE);
        match self.encoding {
            Encoding::Binary => {
                #[allow(clippy::cast_possible_truncation)]
                // bounded by MAX_PAYLOAD when the table was built
                let len_byte = len as u8;
                self.port.writeb(len_byte);
                self.port.write(&self.data[..len]);
            }
            Encoding::Hex => {
                let mut text = [0_u8; 2 * MAX_PAYLOAD];
                // cannot fail: the text buffer is sized for the largest payload
                let _ignored = hex::encode_to_slice(&self.data[..len], &mut text[..2 * len]);
                self.port.write(&text[..2 * len]);
                self.port.writeb(NEWLINE);
            }
        }
    }

    /// Acknowledges a handled request with `status`
    pub fn send_ack(&mut self, status: Status) {
        match self.encoding {
            Encoding::Binary => self.port.writeb(status.into()),
            Encoding::Hex => {
                let mut text = [0_u8; 2];
                let _ignored = hex::encode_to_slice(&[u8::from(status)], &mut text);
                self.port.writeb(ACK);
                self.port.write(&text);
                self.port.writeb(NEWLINE);
            }
        }
    }

    /// Processes exactly one request: read it, run its handler to completion, send the response
    /// frame if the handler produced one, then the acknowledgement
    pub fn step(&mut self) -> Result<Command> {
        let entry = self.read_frame()?;
        debug!("Dispatching {:?}", entry);

        let outcome = entry
            .command
            .handle(&mut self.oracle, &mut self.port, &mut self.data);

        if let Some(len) = outcome.response {
            self.send_response(len);
        }
        self.send_ack(outcome.status);

        Ok(entry.command)
    }

    /// Serves the host forever. Frames which did not reach a handler are dropped and the loop
    /// carries on with the next byte.
    pub fn run(&mut self) -> ! {
        loop {
            let _ignored = self.step();
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use proptest::prelude::*;

    use super::{Channel, Encoding, Error};
    use crate::command::Command;
    use crate::ecb::AesOracle;
    use crate::ecdh::P256Oracle;
    use crate::interface::mock::{Event, MockPort};
    use crate::oracle::Oracle;

    fn channel<O: Oracle>(oracle: O, encoding: Encoding, input: &[u8]) -> Channel<MockPort, O> {
        let mut channel = Channel::new(MockPort::default(), oracle, encoding).unwrap();
        channel.port_mut().clear();
        channel.port_mut().feed(input);
        channel
    }

    /// Steps until the scripted input runs dry, collecting what each step returned
    fn drain<O: Oracle>(channel: &mut Channel<MockPort, O>) -> Vec<Result<Command, Error>> {
        let mut results = Vec::new();
        loop {
            match channel.step() {
                Err(Error::NoData) => return results,
                res => results.push(res),
            }
        }
    }

    fn frame(code: u8, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![code];
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn bring_up_happens_once_before_any_command() {
        let channel = Channel::new(MockPort::default(), AesOracle::new(), Encoding::Binary).unwrap();

        assert_eq!(
            channel.port().events(),
            &[Event::PlatformInit, Event::InitUart, Event::TriggerSetup, Event::Low]
        );
    }

    #[test]
    fn aes_end_to_end_binary() {
        let mut input = frame(b'k', &hex!("2b7e151628aed2a6abf7158809cf4f3c"));
        input.extend(frame(b'p', &hex!("6bc1bee22e409f96e93d7e117393172a")));
        let mut channel = channel(AesOracle::new(), Encoding::Binary, &input);

        let results = drain(&mut channel);

        assert_eq!(results, vec![Ok(Command::LoadKey), Ok(Command::Operate)]);
        let mut expected = vec![0x00, b'r', 16];
        expected.extend_from_slice(&hex!("3ad77bb40d7a3660a89ecaf32466ef97"));
        expected.push(0x00);
        assert_eq!(channel.port().output(), expected);
    }

    #[test]
    fn aes_end_to_end_hex() {
        let input = b"k2b7e151628aed2a6abf7158809cf4f3c\np6BC1BEE22E409F96E93D7E117393172A\r\n";
        let mut channel = channel(AesOracle::new(), Encoding::Hex, input);

        drain(&mut channel);

        assert_eq!(
            channel.port().output(),
            b"z00\nr3ad77bb40d7a3660a89ecaf32466ef97\nz00\n".to_vec()
        );
    }

    #[test]
    fn trigger_encloses_only_the_primitive() {
        let mut input = frame(b'k', &[0x11; 16]);
        input.extend(frame(b'p', &[0x22; 16]));
        input.extend(frame(b'p', &[0x33; 16]));
        let mut channel = channel(AesOracle::new(), Encoding::Binary, &input);

        drain(&mut channel);

        let events = channel.port().events();
        let highs: Vec<usize> = (0..events.len()).filter(|i| events[*i] == Event::High).collect();
        assert_eq!(highs.len(), 2);
        for high in highs {
            // the window closes immediately with no I/O inside it
            assert_eq!(events[high + 1], Event::Low);
            // the last payload byte was read just before it opened
            assert!(matches!(events[high - 1], Event::Read(_)));
            // the response frame starts right after it closes
            assert_eq!(events[high + 2], Event::Write(b'r'));
        }
    }

    #[test]
    fn load_key_and_reset_do_not_trigger_or_respond() {
        let mut input = frame(b'k', &[0x11; 16]);
        input.push(b'x');
        input.push(b'v');
        let mut channel = channel(AesOracle::new(), Encoding::Binary, &input);

        let results = drain(&mut channel);

        assert_eq!(
            results,
            vec![Ok(Command::LoadKey), Ok(Command::Reset), Ok(Command::Version)]
        );
        assert_eq!(channel.port().windows(), 0);
        assert_eq!(channel.port().output(), vec![0x00, 0x00, 0x00]);
    }

    #[test]
    fn unknown_codes_are_skipped() {
        let mut input = vec![b'?', 0xff];
        input.extend(frame(b'p', &[0_u8; 16]));
        let mut channel = channel(AesOracle::new(), Encoding::Binary, &input);

        let results = drain(&mut channel);

        assert_eq!(
            results,
            vec![
                Err(Error::UnknownCommand(b'?')),
                Err(Error::UnknownCommand(0xff)),
                Ok(Command::Operate)
            ]
        );
        let mut expected = vec![b'r', 16];
        expected.extend_from_slice(&hex!("66e94bd4ef8a2c3b884cfa59ca342b2e"));
        expected.push(0x00);
        assert_eq!(channel.port().output(), expected);
    }

    #[test]
    fn truncated_frame_runs_nothing() {
        let mut channel = channel(AesOracle::new(), Encoding::Binary, &[b'p', 1, 2, 3]);

        assert_eq!(channel.step(), Err(Error::NoData));
        assert_eq!(channel.port().windows(), 0);
        assert!(channel.port().output().is_empty());
    }

    #[test]
    fn malformed_hex_lines_are_discarded() {
        let input = b"xxxxxxxxxxxxxxxxxxx\np00112233\npzz0102030405060708090a0b0c0d0e0f\nq12\nv\n";
        let mut channel = channel(AesOracle::new(), Encoding::Hex, input);

        let results = drain(&mut channel);

        assert_eq!(
            results,
            vec![
                Err(Error::Malformed(b'x')),
                Err(Error::Malformed(b'p')),
                Err(Error::Malformed(b'p')),
                Err(Error::UnknownCommand(b'q')),
                Ok(Command::Version),
            ]
        );
        assert_eq!(channel.port().windows(), 0);
        assert_eq!(channel.port().output(), b"z00\n".to_vec());
    }

    #[test]
    fn ecdh_end_to_end_binary() {
        let gx = hex!("6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296");
        let gy = hex!("4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5");
        let mut scalar = [0_u8; 32];
        scalar[31] = 1;

        let mut point = gx.to_vec();
        point.extend_from_slice(&gy);
        let mut input = frame(b'k', &scalar);
        input.extend(frame(b'p', &point));
        let mut channel = channel(P256Oracle::new(), Encoding::Binary, &input);

        drain(&mut channel);

        let mut expected = vec![0x00, b'r', 64];
        expected.extend_from_slice(&point);
        expected.push(0x00);
        assert_eq!(channel.port().output(), expected);
        assert_eq!(channel.port().windows(), 1);
    }

    #[test]
    fn ecdh_invalid_point_still_responds() {
        let mut input = frame(b'k', &[0x42; 32]);
        input.extend(frame(b'p', &[0x01; 64]));
        let mut channel = channel(P256Oracle::new(), Encoding::Binary, &input);

        let results = drain(&mut channel);

        assert_eq!(results, vec![Ok(Command::LoadKey), Ok(Command::Operate)]);
        let mut expected = vec![0x00, b'r', 64];
        expected.extend_from_slice(&[0_u8; 64]);
        expected.push(0x00);
        assert_eq!(channel.port().output(), expected);
        assert_eq!(channel.port().windows(), 0);
    }

    /// Runs a script and returns the payloads of the response frames, which is all the host
    /// learns from the oracle
    fn responses(script: &[(u8, [u8; 16])], resets: &[bool]) -> Vec<Vec<u8>> {
        let mut input = Vec::new();
        for (i, (code, payload)) in script.iter().enumerate() {
            if resets.get(i).copied().unwrap_or(false) {
                input.push(b'x');
            }
            input.extend(frame(*code, payload));
        }
        let mut channel = channel(AesOracle::new(), Encoding::Binary, &input);
        drain(&mut channel);

        let out = channel.port().output();
        let mut frames = Vec::new();
        let mut i = 0;
        while i < out.len() {
            if out[i] == 0x00 {
                i += 1;
                continue;
            }
            assert_eq!(out[i], b'r');
            let len = out[i + 1] as usize;
            frames.push(out[i + 2..i + 2 + len].to_vec());
            i += 2 + len;
        }
        frames
    }

    proptest! {
        #[test]
        fn reset_never_changes_later_output(
            script in prop::collection::vec(
                (prop_oneof![Just(b'k'), Just(b'p')], any::<[u8; 16]>()),
                1..8,
            ),
            resets in prop::collection::vec(any::<bool>(), 8),
        ) {
            prop_assert_eq!(responses(&script, &[]), responses(&script, &resets));
        }

        #[test]
        fn same_key_and_block_give_the_same_ciphertext(key in any::<[u8; 16]>(), pt in any::<[u8; 16]>()) {
            let mut input = frame(b'k', &key);
            input.extend(frame(b'p', &pt));
            input.extend(frame(b'p', &pt));
            let mut channel = channel(AesOracle::new(), Encoding::Binary, &input);
            drain(&mut channel);

            let out = channel.port().output();
            // ack, then two (r, len, ct[16], ack) groups
            prop_assert_eq!(out.len(), 1 + 2 * 19);
            prop_assert_eq!(&out[3..19], &out[22..38]);
        }
    }
}
