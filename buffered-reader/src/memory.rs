use std::fmt;
use std::io;

use crate::{BufferedReader, buffered_reader_generic_read_impl};

/// A `BufferedReader` that reads from an in-memory buffer (`&[u8]`).
///
/// Since the whole buffer is already in memory, `data` never needs to
/// actually read anything; it's essentially a cursor over a slice.
pub struct Memory<'a, C> {
    buffer: &'a [u8],
    cursor: usize,
    cookie: C,
}

impl<'a> Memory<'a, ()> {
    /// Creates a new reader over `buffer`.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_cookie(buffer, ())
    }
}

impl<'a, C> Memory<'a, C> {
    /// Like [`Memory::new`], but attaching `cookie`.
    pub fn with_cookie(buffer: &'a [u8], cookie: C) -> Self {
        Memory { buffer, cursor: 0, cookie }
    }
}

impl<'a, C> fmt::Debug for Memory<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Memory")
            .field("bytes remaining", &(self.buffer.len() - self.cursor))
            .finish()
    }
}

impl<'a, C> io::Read for Memory<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Memory<'a, C> {
    fn buffer(&self) -> &[u8] {
        &self.buffer[self.cursor..]
    }

    fn data(&mut self, _amount: usize) -> Result<&[u8], io::Error> {
        Ok(&self.buffer[self.cursor..])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        assert!(self.cursor + amount <= self.buffer.len());
        self.cursor += amount;
        &self.buffer[self.cursor - amount..]
    }

    fn read_so_far(&self) -> u64 { self.cursor as u64 }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
        where Self: 'b
    {
        None
    }
    fn get_mut(&mut self) -> Option<&mut (dyn BufferedReader<C> + '_)> { None }
    fn get_ref(&self) -> Option<&(dyn BufferedReader<C> + '_)> { None }

    fn cookie_set(&mut self, cookie: C) -> C {
        std::mem::replace(&mut self.cookie, cookie)
    }
    fn cookie_ref(&self) -> &C { &self.cookie }
    fn cookie_mut(&mut self) -> &mut C { &mut self.cookie }
}
