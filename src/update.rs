//! State machine streaming an image file into the flash region.
//!
//! ```text
//! AwaitingSource -> Streaming -> Finalizing -> HandOff
//!        \              |            /
//!         `---------> Fault <-------'
//! ```
//!
//! The stream length is never known up front: a page read that comes back short (or empty)
//! ends it. The first page is held back and written in `Finalizing`, so an interrupted update
//! never leaves a region that passes the marker check.

use embedded_hal::digital::StatefulOutputPin;
use embedded_storage::nor_flash::NorFlash;

use crate::{
    Error,
    buffer::{BufferManager, FILL_VALUE, Transfer},
    flash::FlashWriter,
    source::{self, Storage},
};

/// Pages between two progress messages.
const PROGRESS_INTERVAL: u32 = 0x100;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    AwaitingSource,
    Streaming,
    Finalizing,
    HandOff,
    /// Terminal for this boot attempt.
    Fault(Error),
}

/// Outcome of a completed update.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Report {
    /// Pages committed, including the first page and a final partial page.
    pub pages: u32,
    /// Bytes read from the image file.
    pub bytes: u32,
}

pub struct UpdateSession<'s, 'b, F, S, T, I>
where
    F: NorFlash,
    S: Storage,
    T: Transfer,
    I: StatefulOutputPin,
{
    image_name: &'s str,
    writer: FlashWriter<'s, F>,
    buffers: &'s mut BufferManager<'b, T>,
    storage: &'s mut S,
    indicator: &'s mut I,
    file: Option<S::File>,
    mounted: bool,
    first_page: bool,
    phase: Phase,
    report: Report,
}

impl<'s, 'b, F, S, T, I> UpdateSession<'s, 'b, F, S, T, I>
where
    F: NorFlash,
    S: Storage,
    T: Transfer,
    I: StatefulOutputPin,
{
    pub fn new(
        image_name: &'s str,
        writer: FlashWriter<'s, F>,
        buffers: &'s mut BufferManager<'b, T>,
        storage: &'s mut S,
        indicator: &'s mut I,
    ) -> Self {
        Self {
            image_name,
            writer,
            buffers,
            storage,
            indicator,
            file: None,
            mounted: false,
            first_page: false,
            phase: Phase::AwaitingSource,
            report: Report::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn report(&self) -> Report {
        self.report
    }

    /// Drive the session until the image is committed.
    ///
    /// On error the session is left in [`Phase::Fault`]; flash is not touched any further.
    pub async fn run(&mut self) -> Result<Report, Error> {
        loop {
            match self.phase {
                Phase::HandOff => return Ok(self.report),
                Phase::Fault(e) => return Err(e),
                phase => {
                    if let Err(e) = self.step().await {
                        error!("Update failed in {}: {}", phase, e);
                        self.phase = Phase::Fault(e);
                    }
                }
            }
        }
    }

    /// Perform a single transition.
    pub async fn step(&mut self) -> Result<(), Error> {
        match self.phase {
            Phase::AwaitingSource => {
                self.open_source().await?;
                self.writer.begin_image(self.buffers).await?;
                self.first_page = true;
                self.phase = Phase::Streaming;
            }
            Phase::Streaming => {
                if self.stream_page().await? {
                    self.phase = Phase::Finalizing;
                }
            }
            Phase::Finalizing => {
                self.writer.commit_first_page(self.buffers).await?;
                info!(
                    "Image loaded, {} bytes in {} pages",
                    self.report.bytes, self.report.pages
                );
                self.phase = Phase::HandOff;
            }
            Phase::HandOff | Phase::Fault(_) => {}
        }

        Ok(())
    }

    /// Close the image file, unmount the volume and join outstanding buffer transfers.
    ///
    /// Only what was actually acquired is released.
    pub async fn release(self) {
        if let Some(file) = self.file {
            self.storage.close(file).await;
        }
        if self.mounted {
            self.storage.unmount().await;
        }
        self.buffers.await_done().await;
    }

    async fn open_source(&mut self) -> Result<(), Error> {
        self.storage.mount().await.inspect_err(|_| {
            error!("Failed to mount storage");
        })?;
        self.mounted = true;
        info!("Storage mounted");

        if !self.storage.exists(self.image_name).await {
            error!("Image file '{}' not found", self.image_name);
            return Err(Error::ImageMissing);
        }

        self.file = Some(self.storage.open(self.image_name).await?);
        info!("Image file '{}' found, loading", self.image_name);
        Ok(())
    }

    /// Read and commit one page. Returns whether the stream has ended.
    async fn stream_page(&mut self) -> Result<bool, Error> {
        let Some(file) = self.file.as_mut() else {
            return Err(Error::Open);
        };

        let page = self.buffers.streaming().await;
        let read = source::read_page(file, page).await?;
        self.report.bytes += read as u32;

        if read == page.len() {
            self.writer.commit_page(self.buffers, self.first_page).await?;
            self.first_page = false;
            self.page_committed();
            return Ok(false);
        }

        // End of stream. Whatever the read left past the data is not image content.
        page[read..].fill(FILL_VALUE);

        if self.first_page {
            if read == 0 {
                error!("Image file is empty");
                return Err(Error::EmptyImage);
            }
            // The whole image fits in its first page, which stays deferred.
            self.writer.commit_page(self.buffers, true).await?;
            self.first_page = false;
            self.page_committed();
        } else if read > 0 {
            self.writer.commit_final_partial_page(self.buffers).await?;
            self.page_committed();
        }

        Ok(true)
    }

    fn page_committed(&mut self) {
        self.report.pages += 1;
        if self.indicator.toggle().is_err() {
            warn!("Failed to toggle the progress indicator");
        }

        if self.report.pages % PROGRESS_INTERVAL == 0 {
            info!("{} KiB written", self.report.bytes / 1024);
        }
    }
}
