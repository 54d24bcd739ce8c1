//! Bootloader that reflashes an application image streamed from a storage volume.
//!
//! On boot the [`arbiter`] decides whether the resident image can be started. If not, the
//! [`update`] state machine streams the image file page by page into program flash through the
//! [`flash::FlashWriter`], holding the first page back until everything else is written.
//! Control is then handed to the image through a [`boot::HandOff`] implementation.
#![no_std]

#[macro_use]
mod fmt;

pub mod arbiter;
pub mod boot;
pub mod bootloader;
pub mod buffer;
pub mod flash;
pub mod source;
pub mod state;
pub mod update;

pub use bootloader::{Board, Bootloader, Peripherals};

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod mock;

/// Any condition that ends the current boot attempt.
///
/// None of these are recoverable inside the bootloader: the device halts with the indicator lit
/// and waits for the operator to power-cycle or replace the media.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Flash region geometry does not match the flash device.
    Layout,
    /// A page buffer does not have the configured page size.
    BufferSize,
    /// The storage volume could not be mounted.
    Mount,
    /// The image file is not present on the volume.
    ImageMissing,
    /// The image file exists but could not be opened.
    Open,
    /// The storage reported an error while streaming the image.
    Read,
    /// The image file contains no data.
    EmptyImage,
    /// The image does not fit in the flash region.
    ImageTooLarge,
    /// Erasing the sector at this flash offset failed.
    Erase(u32),
    /// Programming the page at this flash offset failed.
    Program(u32),
    /// The persisted boot state could not be accessed.
    State,
}

/// Flash region receiving the application image.
///
/// All addresses are offsets into the flash device, not bus addresses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
    /// First byte of the region.
    pub start: u32,
    /// Length of the region in bytes.
    pub size: u32,
    /// Erase granularity.
    pub sector_size: u32,
    /// Program granularity.
    pub page_size: u32,
}

impl Layout {
    pub const fn end(&self) -> u32 {
        self.start + self.size
    }

    /// Check the geometry against the constraints of a flash device.
    pub fn validate(&self, write_size: usize, erase_size: usize, capacity: usize) -> Result<(), Error> {
        let page = self.page_size as usize;
        let sector = self.sector_size as usize;

        let consistent = page != 0
            && sector != 0
            && sector % page == 0
            && write_size != 0
            && page % write_size == 0
            && erase_size != 0
            && sector % erase_size == 0
            && self.start % self.sector_size == 0
            && self.size != 0
            && self.size % self.sector_size == 0
            && (self.start as usize).saturating_add(self.size as usize) <= capacity;

        if consistent {
            Ok(())
        } else {
            error!("Layout does not match flash geometry");
            Err(Error::Layout)
        }
    }
}

/// Byte pattern inside the image header identifying a real application.
///
/// This is a heuristic, not an integrity check: the image content itself is never verified.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Marker {
    /// Offset of the pattern from the start of the region.
    pub offset: u32,
    pub bytes: [u8; 4],
}

impl Marker {
    /// `BINARY_INFO_MARKER_START` as placed by the Pico SDK right after the vector table.
    pub const PICO_BINARY_INFO: Marker = Marker {
        offset: 0xD4,
        bytes: [0xF2, 0xEB, 0x88, 0x71],
    };
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    pub layout: Layout,
    pub marker: Marker,
    /// Name of the image file on the storage volume.
    pub image_name: &'static str,
    /// Bus address at which the region is executed, pointing to the image vector table.
    pub image_address: u32,
}

impl Config {
    /// RP2040 with 2 MiB of flash, application linked at 128 KiB.
    pub const PICO: Config = Config {
        layout: Layout {
            start: 0x2_0000,
            size: 0x20_0000 - 0x2_0000,
            sector_size: 4096,
            page_size: 256,
        },
        marker: Marker::PICO_BINARY_INFO,
        image_name: "firmware.bin",
        image_address: 0x1000_0000 + 0x2_0000,
    };

    /// Check the layout against a flash device and the marker against the layout.
    ///
    /// The marker has to sit inside the first page: that page is written last, so a region
    /// carrying the marker is always complete.
    pub fn validate(&self, write_size: usize, erase_size: usize, capacity: usize) -> Result<(), Error> {
        self.layout.validate(write_size, erase_size, capacity)?;

        let marker_end = self.marker.offset.checked_add(self.marker.bytes.len() as u32);
        if marker_end.is_none_or(|end| end > self.layout.page_size) {
            error!("Marker at {:#x} lies outside the first page", self.marker.offset);
            return Err(Error::Layout);
        }

        Ok(())
    }
}
