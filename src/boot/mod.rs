#[cfg(feature = "cortex_m")]
pub mod cortex_m;

/// One-way transfer of the processor into an application image.
///
/// Implementations exist per architecture; everything else in the crate is target neutral.
pub trait HandOff {
    /// Disable and clear every external interrupt the bootloader may have left enabled.
    fn mask_interrupts(&mut self);

    /// Point the vector table base at `addr`.
    ///
    /// # Safety
    ///
    /// `addr` must hold a valid vector table; any interrupt taken afterwards is dispatched
    /// through it.
    unsafe fn set_vector_table_base(&mut self, addr: u32);

    /// Load the initial stack pointer and reset vector from the first two words at `addr`
    /// and branch there.
    ///
    /// # Safety
    ///
    /// `addr` must point to the vector table of a complete image.
    unsafe fn jump_to_image(&mut self, addr: u32) -> !;
}

/// Mask interrupts, relocate the vector table to the image and jump into it.
///
/// # Safety
///
/// See [`HandOff::jump_to_image`]. All peripherals claimed by the bootloader must have been
/// released.
pub unsafe fn hand_off<H: HandOff>(handoff: &mut H, addr: u32) -> ! {
    info!("Handing off to image at {:#x}", addr);

    handoff.mask_interrupts();
    unsafe {
        handoff.set_vector_table_base(addr);
        handoff.jump_to_image(addr)
    }
}
