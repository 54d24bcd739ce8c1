//! Boot mode request persisted across a software reset.

use serde::{Deserialize, Serialize};

use crate::Error;

pub mod scratch;
#[cfg(feature = "simple_state")]
pub mod simple;

/// What the bootloader should do on the next boot, as requested by the application.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootRequest {
    /// Start the resident image if it looks valid.
    Normal,
    /// Stay in the bootloader and reflash, regardless of the resident image.
    ReturnToBootloader,
}

/// Storage of the [`BootRequest`].
#[allow(async_fn_in_trait)]
pub trait BootFlag {
    /// Read the pending request and reset it to [`BootRequest::Normal`].
    ///
    /// A request is honoured for exactly one boot.
    async fn take(&mut self) -> Result<BootRequest, Error>;
}
