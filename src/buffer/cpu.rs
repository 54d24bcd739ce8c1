use crate::buffer::Transfer;

/// Transfer engine for targets without a spare DMA channel.
///
/// Transfers complete before `start_*` returns, which satisfies the same ordering contract.
pub struct CpuTransfer;

impl Transfer for CpuTransfer {
    unsafe fn start_fill(&mut self, dst: *mut u8, len: usize, value: u8) {
        unsafe { core::ptr::write_bytes(dst, value, len) }
    }

    unsafe fn start_copy(&mut self, src: *const u8, dst: *mut u8, len: usize) {
        unsafe { core::ptr::copy_nonoverlapping(src, dst, len) }
    }

    async fn wait(&mut self) {}

    fn wait_blocking(&mut self) {}
}
