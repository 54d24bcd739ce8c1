mod board;

pub use board::{
    HandOffOp, MockBoard, MockFlag, MockHandOff, MockPin, MockTransfer, TransferOp,
};
pub use storage::{MockFile, MockStorage};

use std::{collections::BTreeMap, vec, vec::Vec};

use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind};

const WRITE_SIZE: usize = 4;
const ERASE_SIZE: usize = 4096;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FlashOp {
    Erase(u32),
    Program(u32),
}

#[derive(Debug)]
pub struct WearTracker(BTreeMap<u32, usize>);

impl WearTracker {
    pub const fn new() -> Self {
        WearTracker(BTreeMap::new())
    }

    pub fn increase(&mut self, sector: u32) {
        *self.0.entry(sector).or_insert(0) += 1;
    }

    /// Check erase count on all sectors starting in `range` for worst wear.
    pub fn check(&self, range: core::ops::Range<u32>, wear_level: usize) -> bool {
        self.0
            .range(range)
            .all(|(_, v)| *v <= wear_level)
    }
}

/// NOR flash that refuses to program a word twice without erasing it in between.
pub struct MockFlash {
    data: Vec<u8>,
    programmed: Vec<bool>,
    pub ops: Vec<FlashOp>,
    pub wear: WearTracker,
    pub reads: usize,
    pub fail_program_at: Option<u32>,
}

impl MockFlash {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0xFF; capacity],
            programmed: vec![false; capacity / WRITE_SIZE],
            ops: Vec::new(),
            wear: WearTracker::new(),
            reads: 0,
            fail_program_at: None,
        }
    }

    /// Place content as if it had been programmed by an earlier update.
    pub fn preload(&mut self, offset: u32, bytes: &[u8]) {
        let offset = offset as usize;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);

        let words = offset / WRITE_SIZE..(offset + bytes.len()).div_ceil(WRITE_SIZE);
        self.programmed[words].fill(true);
    }

    pub fn read_page(&self, offset: u32, len: usize) -> Vec<u8> {
        let offset = offset as usize;
        self.data[offset..offset + len].to_vec()
    }

    fn check_bounds(&self, offset: u32, len: usize) -> Result<(), NorFlashErrorKind> {
        if offset as usize + len > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(())
    }

    fn do_read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), NorFlashErrorKind> {
        self.check_bounds(offset, bytes.len())?;

        let offset = offset as usize;
        bytes.copy_from_slice(&self.data[offset..offset + bytes.len()]);
        self.reads += 1;
        Ok(())
    }

    fn do_erase(&mut self, from: u32, to: u32) -> Result<(), NorFlashErrorKind> {
        if from as usize % ERASE_SIZE != 0 || to as usize % ERASE_SIZE != 0 || from >= to {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.check_bounds(from, (to - from) as usize)?;

        self.data[from as usize..to as usize].fill(0xFF);
        self.programmed[from as usize / WRITE_SIZE..to as usize / WRITE_SIZE].fill(false);
        for sector in (from..to).step_by(ERASE_SIZE) {
            self.wear.increase(sector);
        }

        self.ops.push(FlashOp::Erase(from));
        Ok(())
    }

    fn do_write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), NorFlashErrorKind> {
        if offset as usize % WRITE_SIZE != 0 || bytes.len() % WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        self.check_bounds(offset, bytes.len())?;
        if self.fail_program_at == Some(offset) {
            return Err(NorFlashErrorKind::Other);
        }

        let start = offset as usize;
        for word in start / WRITE_SIZE..(start + bytes.len()) / WRITE_SIZE {
            assert!(
                !self.programmed[word],
                "word at {:#x} programmed twice without erase",
                word * WRITE_SIZE
            );
            self.programmed[word] = true;
        }
        self.data[start..start + bytes.len()].copy_from_slice(bytes);

        self.ops.push(FlashOp::Program(offset));
        Ok(())
    }
}

impl ErrorType for MockFlash {
    type Error = NorFlashErrorKind;
}

impl embedded_storage::nor_flash::ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.do_read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl embedded_storage::nor_flash::NorFlash for MockFlash {
    const WRITE_SIZE: usize = WRITE_SIZE;
    const ERASE_SIZE: usize = ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.do_erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.do_write(offset, bytes)
    }
}

impl embedded_storage_async::nor_flash::ReadNorFlash for MockFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.do_read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl embedded_storage_async::nor_flash::NorFlash for MockFlash {
    const WRITE_SIZE: usize = WRITE_SIZE;
    const ERASE_SIZE: usize = ERASE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.do_erase(from, to)
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.do_write(offset, bytes)
    }
}
