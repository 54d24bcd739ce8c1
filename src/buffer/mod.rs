//! Page buffers and the engine that clears and duplicates them in the background.

use crate::{Error, Layout};

mod cpu;

pub use cpu::CpuTransfer;

/// Value the streaming buffer is cleared to.
pub const FILL_VALUE: u8 = 0x00;

/// Memory-to-memory transfer engine, typically a DMA channel.
///
/// A started transfer may run in the background; [`Transfer::wait`] returns once it is complete.
/// Only one transfer is in flight at a time.
#[allow(async_fn_in_trait)]
pub trait Transfer {
    /// Start filling `len` bytes at `dst` with `value`.
    ///
    /// # Safety
    ///
    /// `dst` must stay valid and untouched for `len` bytes until [`Transfer::wait`] returns.
    unsafe fn start_fill(&mut self, dst: *mut u8, len: usize, value: u8);

    /// Start copying `len` bytes from `src` to `dst`.
    ///
    /// # Safety
    ///
    /// Both regions must be valid, must not overlap, and must stay untouched until
    /// [`Transfer::wait`] returns.
    unsafe fn start_copy(&mut self, src: *const u8, dst: *mut u8, len: usize);

    /// Block until the transfer in flight (if any) has finished.
    async fn wait(&mut self);

    /// Busy-wait for the transfer in flight, for contexts that cannot await.
    fn wait_blocking(&mut self);
}

impl<T: Transfer + ?Sized> Transfer for &mut T {
    unsafe fn start_fill(&mut self, dst: *mut u8, len: usize, value: u8) {
        unsafe { T::start_fill(self, dst, len, value) }
    }

    unsafe fn start_copy(&mut self, src: *const u8, dst: *mut u8, len: usize) {
        unsafe { T::start_copy(self, src, dst, len) }
    }

    async fn wait(&mut self) {
        T::wait(self).await
    }

    fn wait_blocking(&mut self) {
        T::wait_blocking(self)
    }
}

/// Owner of the streaming page buffer and the deferred first-page buffer.
///
/// Every accessor joins the transfer in flight before handing out the buffer, so a buffer is
/// never observed while the engine is still writing to it. Dropping the manager busy-waits for
/// the transfer in flight, since the buffers are released to their owner at that point.
pub struct BufferManager<'b, T: Transfer> {
    streaming: &'b mut [u8],
    first_page: &'b mut [u8],
    engine: T,
    pending: bool,
}

impl<'b, T: Transfer> BufferManager<'b, T> {
    pub fn new(
        streaming: &'b mut [u8],
        first_page: &'b mut [u8],
        engine: T,
        layout: &Layout,
    ) -> Result<Self, Error> {
        let page = layout.page_size as usize;
        if streaming.len() != page || first_page.len() != page {
            return Err(Error::BufferSize);
        }

        Ok(Self {
            streaming,
            first_page,
            engine,
            pending: false,
        })
    }

    /// Start clearing the streaming buffer.
    pub async fn clear_streaming(&mut self) {
        self.await_done().await;

        let len = self.streaming.len();
        // Safety: the buffer is borrowed for 'b and only touched again after `await_done`.
        unsafe {
            self.engine
                .start_fill(self.streaming.as_mut_ptr(), len, FILL_VALUE)
        };
        self.pending = true;
    }

    /// Start copying the streaming buffer into the first-page buffer.
    pub async fn capture_first_page(&mut self) {
        self.await_done().await;

        let len = self.streaming.len();
        // Safety: distinct borrows of equal length, untouched until `await_done`.
        unsafe {
            self.engine.start_copy(
                self.streaming.as_ptr(),
                self.first_page.as_mut_ptr(),
                len,
            )
        };
        self.pending = true;
    }

    /// Join the transfer in flight.
    pub async fn await_done(&mut self) {
        if self.pending {
            self.engine.wait().await;
            self.pending = false;
        }
    }

    pub async fn streaming(&mut self) -> &mut [u8] {
        self.await_done().await;
        &mut *self.streaming
    }

    pub async fn first_page(&mut self) -> &[u8] {
        self.await_done().await;
        &*self.first_page
    }

    pub fn engine(&self) -> &T {
        &self.engine
    }

    /// Finish outstanding work and drop the buffers.
    pub async fn release(mut self) {
        self.await_done().await;
    }
}

impl<T: Transfer> Drop for BufferManager<'_, T> {
    fn drop(&mut self) {
        if self.pending {
            self.engine.wait_blocking();
            self.pending = false;
        }
    }
}
