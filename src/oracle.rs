//! Defines the trait for the oracle, the persistent session state which holds the loaded key and
//! runs exactly one cryptographic primitive per request. This is segmented out in its own module
//! mostly for visual clarity.
//!
//! See [Oracle](Oracle) for details on how oracle variants should be defined, and
//! [`TriggerWindow`](TriggerWindow) for the trigger discipline every variant must follow.

use core::sync::atomic::{compiler_fence, Ordering};

use crate::interface::Trigger;

/// Defines the operations every oracle variant exposes to the command table.
///
/// Your implementation should ensure that:
///  - the loaded key is the only state kept between commands, and is only replaced by
///    [`load_key`](Oracle::load_key)
///  - [`operate`](Oracle::operate) is a pure function of (loaded key, input): no counters, no IVs
///  - the trigger is raised through [`TriggerWindow`] around the primitive call and nothing else;
///    parsing, validation and encoding all happen outside of the window
///  - no input makes the oracle fail or refuse to run
pub trait Oracle {
    /// Length of the key material carried by the `k` command
    const KEY_LEN: usize;
    /// Length of the request carried by the `p` command
    const INPUT_LEN: usize;
    /// Length of the result sent back in the `r` frame
    const OUTPUT_LEN: usize;

    /// Replaces the key material with `key`, which is exactly [`KEY_LEN`](Oracle::KEY_LEN)
    /// bytes long.
    ///
    /// This operation must always succeed.
    fn load_key(&mut self, key: &[u8]);

    /// Runs the primitive on the [`INPUT_LEN`](Oracle::INPUT_LEN) request bytes at the start of
    /// `data`, overwriting them in place with the result. Returns the number of result bytes.
    ///
    /// `data` is at least as long as the larger of the input and output lengths.
    fn operate<T: Trigger>(&mut self, trigger: &mut T, data: &mut [u8]) -> usize;

    /// Reset hook of the protocol. Deliberately leaves the key material untouched.
    fn reset(&mut self) {}
}

/// A raised trigger. The trigger goes high when the window is opened and low when the window is
/// dropped, so a window can never outlive the scope of the primitive it brackets.
#[must_use = "the trigger drops as soon as the window is dropped"]
pub struct TriggerWindow<'a, T: Trigger> {
    /// The trigger line held high for the lifetime of this window
    trigger: &'a mut T,
}

impl<'a, T: Trigger> TriggerWindow<'a, T> {
    /// Raises the trigger
    #[inline(always)]
    pub fn open(trigger: &'a mut T) -> Self {
        trigger.trigger_high();
        compiler_fence(Ordering::SeqCst);
        Self { trigger }
    }

    /// Runs `primitive` with the trigger raised, and nothing else
    #[inline(always)]
    pub fn measure<R, F: FnOnce() -> R>(trigger: &'a mut T, primitive: F) -> R {
        let window = Self::open(trigger);
        let result = primitive();
        drop(window);
        result
    }
}

impl<'a, T: Trigger> Drop for TriggerWindow<'a, T> {
    #[inline(always)]
    fn drop(&mut self) {
        compiler_fence(Ordering::SeqCst);
        self.trigger.trigger_low();
    }
}
