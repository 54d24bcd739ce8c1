//! Simple straightforward implementation of keeping the boot request in flash.
//!
//! This implementation focusses on correctness and ease, contrary to efficiency and code size.
//! Leverages `sequential-storage` and `postcard` to store and serialize/deserialize the request.

use core::ops::Range;

use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::{
    cache::KeyPointerCache,
    map::{SerializationError, Value},
};

use crate::{
    Error,
    state::{BootFlag, BootRequest},
};

/// Upper bound for a serialized [`BootRequest`].
const MAX_SERIALIZED_SIZE: usize = 16;

impl<'a> Value<'a> for BootRequest {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        let buffer = postcard::to_slice(self, buffer).map_err(|e| match e {
            postcard::Error::SerializeBufferFull => SerializationError::BufferTooSmall,
            // Unmapped error.
            _ => SerializationError::Custom(0),
        })?;

        Ok(buffer.len())
    }

    fn deserialize_from(buffer: &'a [u8]) -> Result<Self, SerializationError>
    where
        Self: Sized,
    {
        postcard::from_bytes(buffer).map_err(|e| match e {
            postcard::Error::DeserializeUnexpectedEnd => SerializationError::BufferTooSmall,
            postcard::Error::DeserializeBadVarint
            | postcard::Error::DeserializeBadEnum
            | postcard::Error::DeserializeBadEncoding => SerializationError::InvalidFormat,
            // Unmapped error.
            _ => SerializationError::Custom(0),
        })
    }
}

/// Boot request stored in a dedicated partition of at least two erase pages.
pub struct FlashFlag<NVM: NorFlash> {
    nvm: NVM,
    range: Range<u32>,
    nvm_cache: KeyPointerCache<2, (), 1>,
}

impl<NVM: NorFlash> FlashFlag<NVM> {
    pub fn new(nvm: NVM, range: Range<u32>) -> Self {
        Self {
            nvm,
            range,
            nvm_cache: KeyPointerCache::new(),
        }
    }

    pub async fn get(&mut self) -> Result<BootRequest, Error> {
        let mut data_buffer = [0u8; MAX_SERIALIZED_SIZE];

        let request = sequential_storage::map::fetch_item::<(), BootRequest, _>(
            &mut self.nvm,
            self.range.clone(),
            &mut self.nvm_cache,
            &mut data_buffer,
            &(),
        )
        .await
        .map_err(|_| {
            error!("Failed to fetch boot request");
            Error::State
        })?;

        Ok(request.unwrap_or_else(|| {
            debug!("State NVM does not contain value");
            BootRequest::Normal
        }))
    }

    pub async fn store(&mut self, request: BootRequest) -> Result<(), Error> {
        let mut data_buffer = [0u8; MAX_SERIALIZED_SIZE];

        debug!("Storing {}", request);

        sequential_storage::map::store_item::<(), BootRequest, _>(
            &mut self.nvm,
            self.range.clone(),
            &mut self.nvm_cache,
            &mut data_buffer,
            &(),
            &request,
        )
        .await
        .map_err(|_| {
            error!("Failed to store boot request");
            Error::State
        })
    }
}

impl<NVM: NorFlash> BootFlag for FlashFlag<NVM> {
    async fn take(&mut self) -> Result<BootRequest, Error> {
        let request = self.get().await?;
        if request != BootRequest::Normal {
            self.store(BootRequest::Normal).await?;
        }
        Ok(request)
    }
}
