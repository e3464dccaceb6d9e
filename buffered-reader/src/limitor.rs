use std::cmp;
use std::fmt;
use std::io;

use crate::{BufferedReader, buffered_reader_generic_read_impl};

/// Caps an inner reader at a fixed number of bytes.
///
/// Used to give a fixed-length OpenPGP packet body its own reader:
/// once `limit` bytes have been consumed, this reader reports EOF
/// regardless of how much data remains in the wrapped reader.
pub struct Limitor<'a, C> {
    reader: Box<dyn BufferedReader<C> + 'a>,
    limit: u64,
    cookie: C,
}

impl<'a> Limitor<'a, ()> {
    /// Wraps `reader`, exposing at most `limit` more bytes.
    pub fn new(reader: Box<dyn BufferedReader<()> + 'a>, limit: u64) -> Self {
        Self::with_cookie(reader, limit, ())
    }
}

impl<'a, C> Limitor<'a, C> {
    /// Like [`Limitor::new`], but attaching `cookie`.
    pub fn with_cookie(reader: Box<dyn BufferedReader<C> + 'a>, limit: u64, cookie: C) -> Self {
        Limitor { reader, limit, cookie }
    }
}

impl<'a, C> fmt::Debug for Limitor<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Limitor")
            .field("limit", &self.limit)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<'a, C> io::Read for Limitor<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Limitor<'a, C> {
    fn buffer(&self) -> &[u8] {
        let buf = self.reader.buffer();
        &buf[..cmp::min(buf.len() as u64, self.limit) as usize]
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let amount = cmp::min(amount as u64, self.limit) as usize;
        let buf = self.reader.data(amount)?;
        Ok(&buf[..cmp::min(buf.len() as u64, self.limit) as usize])
    }

    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        if amount as u64 > self.limit {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
                                       "beyond limitor's limit"));
        }
        let buf = self.reader.data_hard(amount)?;
        Ok(&buf[..cmp::min(buf.len() as u64, self.limit) as usize])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        assert!(amount as u64 <= self.limit);
        self.limit -= amount as u64;
        self.reader.consume(amount)
    }

    fn read_so_far(&self) -> u64 { self.reader.read_so_far() }

    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
        where Self: 'b
    {
        Some(self.reader)
    }
    fn get_mut(&mut self) -> Option<&mut (dyn BufferedReader<C> + '_)> {
        Some(&mut self.reader)
    }
    fn get_ref(&self) -> Option<&(dyn BufferedReader<C> + '_)> {
        Some(&self.reader)
    }

    fn cookie_set(&mut self, cookie: C) -> C {
        std::mem::replace(&mut self.cookie, cookie)
    }
    fn cookie_ref(&self) -> &C { &self.cookie }
    fn cookie_mut(&mut self) -> &mut C { &mut self.cookie }
}
