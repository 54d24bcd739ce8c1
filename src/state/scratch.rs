//! Boot request kept in a word of memory that survives a software reset.

use crate::{
    Error,
    state::{BootFlag, BootRequest},
};

/// Watchdog scratch register 0 on the RP2040.
pub const RP2040_WATCHDOG_SCRATCH0: usize = 0x4005_800C;

/// A single scratch word: `0` is a normal boot, anything else a return to the bootloader.
pub struct ScratchRegister {
    word: *mut u32,
}

impl ScratchRegister {
    /// # Safety
    ///
    /// `word` must point to a valid, aligned `u32` that nothing else accesses while this handle
    /// exists.
    pub const unsafe fn new(word: *mut u32) -> Self {
        Self { word }
    }

    /// Ask the bootloader to stay resident on the next reset. Called by the application.
    pub fn request_bootloader(&mut self) {
        // Safety: guaranteed by the constructor.
        unsafe { self.word.write_volatile(1) }
    }
}

impl BootFlag for ScratchRegister {
    async fn take(&mut self) -> Result<BootRequest, Error> {
        // Safety: guaranteed by the constructor.
        let value = unsafe { self.word.read_volatile() };
        if value == 0 {
            return Ok(BootRequest::Normal);
        }

        debug!("Scratch word {:#x} requests bootloader, clearing", value);
        unsafe { self.word.write_volatile(0) };
        Ok(BootRequest::ReturnToBootloader)
    }
}
