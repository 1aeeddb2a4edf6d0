//! The command table: a closed set of single-byte commands, each with a fixed payload length and a
//! handler, routed by the [channel](crate::channel).
//!
//! | code | payload | effect |
//! |------|---------|--------|
//! | `k`  | [`Oracle::KEY_LEN`] | load key material |
//! | `p`  | [`Oracle::INPUT_LEN`] | run the oracle inside the trigger window, answer with an `r` frame |
//! | `x`  | 0 | reset hook; changes nothing |
//! | `v`  | 0 | protocol version probe; changes nothing |
//!
//! Payload lengths depend on the oracle variant, so the [`CommandTable`] is built once for that
//! variant at startup and checked there; it is never modified afterwards.

use crate::interface::Trigger;
use crate::oracle::Oracle;

/// Largest payload the channel can carry, which bounds every entry of the table
pub const MAX_PAYLOAD: usize = 64;

/// Every command understood by the oracle firmware
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub enum Command {
    /// Replace the key material; `k`
    LoadKey,
    /// Run the primitive on the payload and respond with the result; `p`
    Operate,
    /// Reset hook; `x`
    Reset,
    /// Version probe; `v`
    Version,
}

/// Status acknowledged after every handled command. Only success is ever produced; other codes
/// are reserved by the protocol for error signalling.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(u8)]
pub enum Status {
    /// The handler ran to completion
    Ok = 0x00,
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status as u8
    }
}

/// What a handler leaves for the channel to send back
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Outcome {
    /// Length of the response payload at the start of the data buffer, if a response is due
    pub response: Option<usize>,
    /// Status to acknowledge
    pub status: Status,
}

impl Outcome {
    /// Acknowledge only
    const fn ack() -> Self {
        Self {
            response: None,
            status: Status::Ok,
        }
    }

    /// Respond with `len` bytes, then acknowledge
    const fn respond(len: usize) -> Self {
        Self {
            response: Some(len),
            status: Status::Ok,
        }
    }
}

impl Command {
    /// All commands, in table order
    pub const ALL: [Command; 4] = [
        Command::LoadKey,
        Command::Operate,
        Command::Reset,
        Command::Version,
    ];

    /// The wire code of this command
    pub const fn code(self) -> u8 {
        match self {
            Command::LoadKey => b'k',
            Command::Operate => b'p',
            Command::Reset => b'x',
            Command::Version => b'v',
        }
    }

    /// The payload length this command carries for the oracle variant `O`
    pub fn payload_len<O: Oracle>(self) -> usize {
        match self {
            Command::LoadKey => O::KEY_LEN,
            Command::Operate => O::INPUT_LEN,
            Command::Reset | Command::Version => 0,
        }
    }

    /// Runs the handler of this command against the session state.
    ///
    /// `data` holds the decoded payload at its start and is where a response is left; it is the
    /// channel's whole data buffer, so the oracle may write a result longer than its request.
    pub fn handle<O: Oracle, T: Trigger>(
        self,
        oracle: &mut O,
        trigger: &mut T,
        data: &mut [u8],
    ) -> Outcome {
        match self {
            Command::LoadKey => {
                oracle.load_key(&data[..O::KEY_LEN]);
                Outcome::ack()
            }
            Command::Operate => Outcome::respond(oracle.operate(trigger, data)),
            Command::Reset => {
                oracle.reset();
                Outcome::ack()
            }
            Command::Version => Outcome::ack(),
        }
    }
}

/// A table entry: a command and the exact number of payload bytes that follow its code
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Entry {
    /// The routed command
    pub command: Command,
    /// Payload length for the configured oracle variant
    pub len: usize,
}

/// Configuration errors found while building the table. Any of these is fatal at startup.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TableError {
    /// Two entries share a wire code
    DuplicateCode(u8),
    /// An entry (or the oracle's response) does not fit in the channel's data buffer
    PayloadTooLarge {
        /// Code of the offending entry
        code: u8,
        /// Length it asked for
        len: usize,
    },
}

/// The fixed command-code to (payload length, handler) mapping for one oracle variant
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CommandTable {
    /// One entry per command, in [`Command::ALL`] order
    entries: [Entry; 4],
}

impl CommandTable {
    /// Builds the table for the oracle variant `O`, checking that codes are unique and that every
    /// payload (and the oracle's response) fits in [`MAX_PAYLOAD`]
    pub fn new<O: Oracle>() -> Result<Self, TableError> {
        let mut entries = [Entry {
            command: Command::Reset,
            len: 0,
        }; 4];

        for (i, command) in Command::ALL.iter().copied().enumerate() {
            let entry = Entry {
                command,
                len: command.payload_len::<O>(),
            };

            if entry.len > MAX_PAYLOAD
                || (command == Command::Operate && O::OUTPUT_LEN > MAX_PAYLOAD)
            {
                return Err(TableError::PayloadTooLarge {
                    code: command.code(),
                    len: entry.len.max(O::OUTPUT_LEN),
                });
            }
            if entries[..i].iter().any(|e| e.command.code() == command.code()) {
                return Err(TableError::DuplicateCode(command.code()));
            }

            entries[i] = entry;
        }

        Ok(Self { entries })
    }

    /// Finds the entry routed by `code`
    pub fn lookup(&self, code: u8) -> Option<Entry> {
        self.entries.iter().copied().find(|e| e.command.code() == code)
    }

    /// All entries, in table order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}
