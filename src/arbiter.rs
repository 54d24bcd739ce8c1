//! Cold-boot decision between starting the resident image and reflashing it.

use embedded_hal::digital::InputPin;
use embedded_storage::nor_flash::ReadNorFlash;

use crate::{
    Layout, Marker,
    state::{BootFlag, BootRequest},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Decision {
    /// Start the resident image without touching flash.
    Boot,
    /// Stay in the bootloader and reflash.
    Update(Reason),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reason {
    /// The application asked to return to the bootloader before resetting.
    Requested,
    /// The region does not carry the validity marker.
    NoValidImage,
    /// The force-bootloader input is held low.
    Forced,
}

/// Check whether the flash region looks like it holds an application.
pub fn image_is_valid<F: ReadNorFlash>(flash: &mut F, layout: &Layout, marker: &Marker) -> bool {
    let mut found = [0u8; 4];
    match flash.read(layout.start + marker.offset, &mut found) {
        Ok(()) => found == marker.bytes,
        Err(_) => {
            warn!("Could not read image marker, assuming no image");
            false
        }
    }
}

/// Decide what this boot does.
///
/// A pending boot request wins and is consumed without looking at the image. Otherwise the
/// image must carry its marker, and even a valid image is bypassed while `force` is low.
pub async fn decide<F, P, B>(
    flag: &mut B,
    flash: &mut F,
    force: &mut P,
    layout: &Layout,
    marker: &Marker,
) -> Decision
where
    F: ReadNorFlash,
    P: InputPin,
    B: BootFlag,
{
    let decision = match flag.take().await {
        Ok(BootRequest::ReturnToBootloader) => Decision::Update(Reason::Requested),
        Ok(BootRequest::Normal) | Err(_) => {
            if !image_is_valid(flash, layout, marker) {
                Decision::Update(Reason::NoValidImage)
            } else if force.is_low().unwrap_or(false) {
                info!("Valid image bypassed, force pin is low");
                Decision::Update(Reason::Forced)
            } else {
                Decision::Boot
            }
        }
    };

    info!("Boot decision: {}", decision);
    decision
}
