use cortex_m::peripheral::NVIC;

use crate::boot::HandOff;

/// Vector Table Offset Register.
const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;

/// Simple hand-off mechanism for Cortex-M without support for TrustZone.
pub struct SimpleCortexM;

impl HandOff for SimpleCortexM {
    fn mask_interrupts(&mut self) {
        // Safety: clears enable and pending bits, nothing runs on the bootloader's behalf anymore.
        // Banks beyond the implemented interrupt lines are write-ignored.
        let nvic = unsafe { &*NVIC::PTR };
        for reg in nvic.icer.iter() {
            unsafe { reg.write(u32::MAX) };
        }
        for reg in nvic.icpr.iter() {
            unsafe { reg.write(u32::MAX) };
        }
    }

    unsafe fn set_vector_table_base(&mut self, addr: u32) {
        unsafe { SCB_VTOR.write_volatile(addr) };
        cortex_m::asm::dsb();
        cortex_m::asm::isb();
    }

    unsafe fn jump_to_image(&mut self, addr: u32) -> ! {
        unsafe { cortex_m::asm::bootload(addr as *const u32) }
    }
}
