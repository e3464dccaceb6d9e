use std::fmt;
use std::io;

use bzip2::read::BzDecoder;

use crate::{BufferedReader, Generic, buffered_reader_generic_read_impl};

/// Decompresses a BZip2 stream (RFC 4880 compression algorithm 3).
pub struct Bzip<'a, C> {
    reader: Generic<BzDecoder<Box<dyn BufferedReader<()> + 'a>>, C>,
}

impl<'a> Bzip<'a, ()> {
    /// Wraps `reader`, decompressing what it produces.
    pub fn new(reader: Box<dyn BufferedReader<()> + 'a>) -> Self {
        Self::with_cookie(reader, ())
    }
}

impl<'a, C> Bzip<'a, C> {
    /// Like [`Bzip::new`], but attaching `cookie`.
    pub fn with_cookie(reader: Box<dyn BufferedReader<()> + 'a>, cookie: C) -> Self {
        Bzip {
            reader: Generic::with_cookie(BzDecoder::new(reader), None, cookie),
        }
    }
}

impl<'a, C> fmt::Debug for Bzip<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Bzip").finish()
    }
}

impl<'a, C> io::Read for Bzip<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Bzip<'a, C> {
    fn buffer(&self) -> &[u8] { self.reader.buffer() }
    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> { self.reader.data(amount) }
    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> { self.reader.data_hard(amount) }
    fn consume(&mut self, amount: usize) -> &[u8] { self.reader.consume(amount) }
    fn read_so_far(&self) -> u64 { self.reader.read_so_far() }
    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
        where Self: 'b
    {
        None
    }
    fn get_mut(&mut self) -> Option<&mut (dyn BufferedReader<C> + '_)> { None }
    fn get_ref(&self) -> Option<&(dyn BufferedReader<C> + '_)> { None }
    fn cookie_set(&mut self, cookie: C) -> C { self.reader.cookie_set(cookie) }
    fn cookie_ref(&self) -> &C { self.reader.cookie_ref() }
    fn cookie_mut(&mut self) -> &mut C { self.reader.cookie_mut() }
}
