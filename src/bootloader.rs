//! Top-level driver tying the boot decision, the update and the hand-off together.

use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
use embedded_storage::nor_flash::{NorFlash, ReadNorFlash};

use crate::{
    Config, Error,
    arbiter::{self, Decision},
    boot::{self, HandOff},
    buffer::{BufferManager, Transfer},
    flash::FlashWriter,
    source::Storage,
    state::BootFlag,
    update::{Report, UpdateSession},
};

/// Representation of a concrete board, naming the implementation of every capability.
pub trait Board {
    type Flash: NorFlash;
    type Storage: Storage;
    type Transfer: Transfer;
    /// Progress heartbeat, lit on fault.
    type Indicator: StatefulOutputPin;
    /// Pulled up; held low to stay in the bootloader.
    type ForcePin: InputPin;
    type Flag: BootFlag;
    type HandOff: HandOff;
}

/// Everything the bootloader owns until it hands off.
pub struct Peripherals<'b, B: Board> {
    pub flash: B::Flash,
    pub storage: B::Storage,
    pub buffers: BufferManager<'b, B::Transfer>,
    pub indicator: B::Indicator,
    pub force_pin: B::ForcePin,
    pub flag: B::Flag,
    pub handoff: B::HandOff,
}

pub struct Bootloader<'b, B: Board> {
    config: Config,
    p: Peripherals<'b, B>,
}

impl<'b, B: Board> Bootloader<'b, B> {
    pub fn new(config: Config, p: Peripherals<'b, B>) -> Result<Self, Error> {
        config.validate(
            <B::Flash as NorFlash>::WRITE_SIZE,
            <B::Flash as NorFlash>::ERASE_SIZE,
            ReadNorFlash::capacity(&p.flash),
        )?;

        Ok(Self { config, p })
    }

    /// Boot: either start the resident image or reflash it first. Never returns.
    pub async fn run(mut self) -> ! {
        match self.arbitrate().await {
            Decision::Boot => {}
            Decision::Update(reason) => {
                info!("Entering update, reason: {}", reason);
                if let Err(e) = self.update().await {
                    self.fault(e);
                }
            }
        }

        self.hand_off().await
    }

    pub async fn arbitrate(&mut self) -> Decision {
        arbiter::decide(
            &mut self.p.flag,
            &mut self.p.flash,
            &mut self.p.force_pin,
            &self.config.layout,
            &self.config.marker,
        )
        .await
    }

    /// Stream the image file into flash, then close and unmount the volume.
    pub async fn update(&mut self) -> Result<Report, Error> {
        let writer = FlashWriter::new(&mut self.p.flash, self.config.layout)?;
        let mut session = UpdateSession::new(
            self.config.image_name,
            writer,
            &mut self.p.buffers,
            &mut self.p.storage,
            &mut self.p.indicator,
        );

        let result = session.run().await;
        session.release().await;
        result
    }

    /// Signal an unrecoverable condition and park the CPU.
    pub fn fault(mut self, error: Error) -> ! {
        self.signal_fault(error);

        loop {
            core::hint::spin_loop();
        }
    }

    /// Light the indicator for a fault. It stays lit until reset.
    pub fn signal_fault(&mut self, error: Error) {
        error!("Fatal: {}, halting", error);
        if self.p.indicator.set_high().is_err() {
            warn!("Failed to light the fault indicator");
        }
    }

    /// Release every bootloader-owned resource and jump into the image.
    pub async fn hand_off(self) -> ! {
        let Self { config, p } = self;
        let Peripherals {
            flash,
            storage,
            buffers,
            indicator,
            force_pin,
            flag,
            mut handoff,
        } = p;

        buffers.release().await;
        drop((flash, storage, indicator, force_pin, flag));

        // Safety: the image was either validated by its marker or has just been written in
        // full, and nothing claimed by the bootloader remains in use.
        unsafe { boot::hand_off(&mut handoff, config.image_address) }
    }
}
