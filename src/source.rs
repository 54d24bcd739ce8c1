//! Storage volume carrying the update image, read as a stream of fixed-size pages.

use embedded_io_async::Read;

use crate::Error;

/// Mountable volume holding named files, such as a FAT partition on an SD card.
#[allow(async_fn_in_trait)]
pub trait Storage {
    type File: Read;

    async fn mount(&mut self) -> Result<(), Error>;

    async fn exists(&mut self, name: &str) -> bool;

    async fn open(&mut self, name: &str) -> Result<Self::File, Error>;

    async fn close(&mut self, file: Self::File);

    async fn unmount(&mut self);
}

/// Fill `page` from `file`, returning the number of bytes read.
///
/// Reads are repeated until the page is full or the file reports end of file, so anything less
/// than `page.len()` means the stream has ended. Bytes past the returned count are left as they
/// were and must not be treated as data.
pub async fn read_page<R: Read>(file: &mut R, page: &mut [u8]) -> Result<usize, Error> {
    let mut filled = 0;

    while filled < page.len() {
        match file.read(&mut page[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(_) => {
                error!("Storage read failed after {} bytes of page", filled);
                return Err(Error::Read);
            }
        }
    }

    Ok(filled)
}
