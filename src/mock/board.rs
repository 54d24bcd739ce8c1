use std::vec::Vec;

use embedded_hal::digital::{ErrorKind, ErrorType, InputPin, OutputPin, StatefulOutputPin};

use crate::{
    Error,
    boot::HandOff,
    bootloader::Board,
    buffer::{CpuTransfer, Transfer},
    mock::{MockFlash, MockStorage},
    state::{BootFlag, BootRequest},
};

pub struct MockBoard;

impl Board for MockBoard {
    type Flash = MockFlash;
    type Storage = MockStorage;
    type Transfer = CpuTransfer;
    type Indicator = MockPin;
    type ForcePin = MockPin;
    type Flag = MockFlag;
    type HandOff = MockHandOff;
}

pub struct MockPin {
    pub high: bool,
    pub toggles: usize,
    /// Fail every output operation.
    pub broken: bool,
}

impl MockPin {
    pub const fn new(high: bool) -> Self {
        Self {
            high,
            toggles: 0,
            broken: false,
        }
    }

    fn check(&self) -> Result<(), ErrorKind> {
        if self.broken {
            return Err(ErrorKind::Other);
        }
        Ok(())
    }
}

impl ErrorType for MockPin {
    type Error = ErrorKind;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.high = true;
        Ok(())
    }
}

impl StatefulOutputPin for MockPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.high = !self.high;
        self.toggles += 1;
        Ok(())
    }
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.high)
    }
}

pub struct MockFlag {
    pub request: BootRequest,
}

impl MockFlag {
    pub const fn new(request: BootRequest) -> Self {
        Self { request }
    }
}

impl BootFlag for MockFlag {
    async fn take(&mut self) -> Result<BootRequest, Error> {
        Ok(core::mem::replace(&mut self.request, BootRequest::Normal))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandOffOp {
    Mask,
    Vtor(u32),
    Jump(u32),
}

/// Records the hand-off sequence; the jump panics since there is nothing to run.
pub struct MockHandOff {
    pub ops: Vec<HandOffOp>,
}

impl MockHandOff {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }
}

impl HandOff for MockHandOff {
    fn mask_interrupts(&mut self) {
        self.ops.push(HandOffOp::Mask);
    }

    unsafe fn set_vector_table_base(&mut self, addr: u32) {
        self.ops.push(HandOffOp::Vtor(addr));
    }

    unsafe fn jump_to_image(&mut self, addr: u32) -> ! {
        self.ops.push(HandOffOp::Jump(addr));
        panic!("jump to {:#x}", addr)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransferOp {
    Fill,
    Copy,
    Wait,
    WaitBlocking,
}

/// Engine completing every transfer immediately while logging what was asked of it.
pub struct MockTransfer {
    inner: CpuTransfer,
    pub ops: Vec<TransferOp>,
}

impl MockTransfer {
    pub fn new() -> Self {
        Self {
            inner: CpuTransfer,
            ops: Vec::new(),
        }
    }
}

impl Transfer for MockTransfer {
    unsafe fn start_fill(&mut self, dst: *mut u8, len: usize, value: u8) {
        self.ops.push(TransferOp::Fill);
        unsafe { self.inner.start_fill(dst, len, value) }
    }

    unsafe fn start_copy(&mut self, src: *const u8, dst: *mut u8, len: usize) {
        self.ops.push(TransferOp::Copy);
        unsafe { self.inner.start_copy(src, dst, len) }
    }

    async fn wait(&mut self) {
        self.ops.push(TransferOp::Wait);
    }

    fn wait_blocking(&mut self) {
        self.ops.push(TransferOp::WaitBlocking);
    }
}
