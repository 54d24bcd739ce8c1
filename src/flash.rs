//! Erase-before-program writer for the application flash region.
//!
//! The writer keeps two frontiers over the region: the erase frontier (one past the last erased
//! byte) and the program frontier (next page to program). Both only move forward. A page is
//! programmed only below the erase frontier; reaching it forces an erase of the next sector.
//!
//! Every erase and program runs inside a critical section, so no handler that could touch flash
//! runs while the array is being mutated.

use embedded_storage::nor_flash::NorFlash;

use crate::{
    Error, Layout,
    buffer::{BufferManager, Transfer},
};

pub struct FlashWriter<'f, F: NorFlash> {
    flash: &'f mut F,
    layout: Layout,
    program_frontier: u32,
    erase_frontier: u32,
}

impl<'f, F: NorFlash> FlashWriter<'f, F> {
    pub fn new(flash: &'f mut F, layout: Layout) -> Result<Self, Error> {
        layout.validate(F::WRITE_SIZE, F::ERASE_SIZE, flash.capacity())?;

        Ok(Self {
            flash,
            layout,
            program_frontier: layout.start,
            erase_frontier: layout.start,
        })
    }

    pub fn program_frontier(&self) -> u32 {
        self.program_frontier
    }

    pub fn erase_frontier(&self) -> u32 {
        self.erase_frontier
    }

    /// Reset both frontiers, clear the streaming buffer and erase the first sector.
    ///
    /// Must run before any page is committed. From here on the resident image is no longer
    /// bootable until [`FlashWriter::commit_first_page`] succeeds.
    pub async fn begin_image<T: Transfer>(
        &mut self,
        buffers: &mut BufferManager<'_, T>,
    ) -> Result<(), Error> {
        self.program_frontier = self.layout.start;
        self.erase_frontier = self.layout.start;

        buffers.clear_streaming().await;
        buffers.await_done().await;

        self.erase_next_sector()?;
        info!(
            "Erased first sector at {:#x}, proceeding",
            self.layout.start
        );

        Ok(())
    }

    /// Commit the page held in the streaming buffer.
    ///
    /// The first page of an image is only captured into the deferred buffer; its slot at the
    /// region start is skipped over and left erased.
    pub async fn commit_page<T: Transfer>(
        &mut self,
        buffers: &mut BufferManager<'_, T>,
        is_first_page: bool,
    ) -> Result<(), Error> {
        if is_first_page {
            debug_assert_eq!(self.program_frontier, self.layout.start);

            buffers.capture_first_page().await;
            buffers.await_done().await;
            self.program_frontier += self.layout.page_size;
        } else {
            self.program_streaming(buffers).await?;
        }

        buffers.clear_streaming().await;
        Ok(())
    }

    /// Commit the last, possibly short, page of an image.
    ///
    /// Bytes past the end of the data must already be filled by the caller.
    pub async fn commit_final_partial_page<T: Transfer>(
        &mut self,
        buffers: &mut BufferManager<'_, T>,
    ) -> Result<(), Error> {
        self.program_streaming(buffers).await
    }

    /// Program the deferred first page at the region start.
    ///
    /// This is the last flash mutation of an update: only after it has completed does the
    /// region hold a bootable image.
    pub async fn commit_first_page<T: Transfer>(
        &mut self,
        buffers: &mut BufferManager<'_, T>,
    ) -> Result<(), Error> {
        let start = self.layout.start;
        let page = buffers.first_page().await;
        program(self.flash, start, page)?;

        info!("First page written at {:#x}", start);
        Ok(())
    }

    async fn program_streaming<T: Transfer>(
        &mut self,
        buffers: &mut BufferManager<'_, T>,
    ) -> Result<(), Error> {
        if self.program_frontier >= self.erase_frontier {
            self.erase_next_sector()?;
        }
        debug_assert!(self.program_frontier < self.erase_frontier);

        let addr = self.program_frontier;
        let page = buffers.streaming().await;
        program(self.flash, addr, page)?;

        self.program_frontier += self.layout.page_size;
        Ok(())
    }

    fn erase_next_sector(&mut self) -> Result<(), Error> {
        let from = self.erase_frontier;
        let to = from + self.layout.sector_size;
        if to > self.layout.end() {
            error!("Image exceeds flash region ending at {:#x}", self.layout.end());
            return Err(Error::ImageTooLarge);
        }

        critical_section::with(|_| self.flash.erase(from, to)).map_err(|_| {
            error!("Erase of sector at {:#x} failed", from);
            Error::Erase(from)
        })?;
        trace!("Erased sector at {:#x}", from);

        self.erase_frontier = to;
        Ok(())
    }
}

fn program<F: NorFlash>(flash: &mut F, addr: u32, page: &[u8]) -> Result<(), Error> {
    critical_section::with(|_| flash.write(addr, page)).map_err(|_| {
        error!("Program of page at {:#x} failed", addr);
        Error::Program(addr)
    })
}
