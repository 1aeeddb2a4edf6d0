//! AES-128 in ECB mode: one forward block transform per request under the loaded key.
//!
//! The key schedule is expanded when the key is loaded, so the trigger window covers the ten
//! rounds of the cipher only. Before any key is loaded the oracle still encrypts, using the
//! schedule of the all-zero key.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockCipher, NewBlockCipher};
use aes::Aes128;

use crate::interface::Trigger;
use crate::oracle::{Oracle, TriggerWindow};

/// Size of an AES block, and of an AES-128 key
pub const BLOCK_LEN: usize = 16;

/// AES-128-ECB oracle; the session state is the expanded round-key schedule
pub struct AesOracle {
    /// Round keys derived from the last loaded key
    schedule: Aes128,
}

impl AesOracle {
    /// Creates an oracle with no key loaded
    pub fn new() -> Self {
        Self {
            schedule: Aes128::new(&GenericArray::default()),
        }
    }
}

impl Default for AesOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl Oracle for AesOracle {
    const KEY_LEN: usize = BLOCK_LEN;
    const INPUT_LEN: usize = BLOCK_LEN;
    const OUTPUT_LEN: usize = BLOCK_LEN;

    fn load_key(&mut self, key: &[u8]) {
        self.schedule = Aes128::new(GenericArray::from_slice(&key[..BLOCK_LEN]));
    }

    fn operate<T: Trigger>(&mut self, trigger: &mut T, data: &mut [u8]) -> usize {
        let schedule = &self.schedule;
        let block = GenericArray::from_mut_slice(&mut data[..BLOCK_LEN]);

        TriggerWindow::measure(trigger, || schedule.encrypt_block(block));

        BLOCK_LEN
    }
}
