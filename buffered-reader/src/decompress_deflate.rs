use std::fmt;
use std::io;
use std::io::Read;

use flate2::read::{DeflateDecoder, ZlibDecoder};

use crate::{BufferedReader, Generic, buffered_reader_generic_read_impl};

/// Decompresses a raw DEFLATE stream (RFC 4880 compression algorithm 2).
pub struct Deflate<'a, C> {
    reader: Generic<DeflateDecoder<Box<dyn BufferedReader<()> + 'a>>, C>,
}

impl<'a> Deflate<'a, ()> {
    /// Wraps `reader`, inflating what it produces.
    pub fn new(reader: Box<dyn BufferedReader<()> + 'a>) -> Self {
        Self::with_cookie(reader, ())
    }
}

impl<'a, C> Deflate<'a, C> {
    /// Like [`Deflate::new`], but attaching `cookie`.
    pub fn with_cookie(reader: Box<dyn BufferedReader<()> + 'a>, cookie: C) -> Self {
        Deflate {
            reader: Generic::with_cookie(
                DeflateDecoder::new(reader), None, cookie),
        }
    }
}

impl<'a, C> fmt::Debug for Deflate<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Deflate").finish()
    }
}

impl<'a, C> io::Read for Deflate<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Deflate<'a, C> {
    fn buffer(&self) -> &[u8] { self.reader.buffer() }
    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> { self.reader.data(amount) }
    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> { self.reader.data_hard(amount) }
    fn consume(&mut self, amount: usize) -> &[u8] { self.reader.consume(amount) }
    fn read_so_far(&self) -> u64 { self.reader.read_so_far() }
    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
        where Self: 'b
    {
        // The DEFLATE decoder owns the wrapped reader directly (not
        // through the `BufferedReader` interface), so there is
        // nothing to hand back.
        None
    }
    fn get_mut(&mut self) -> Option<&mut (dyn BufferedReader<C> + '_)> { None }
    fn get_ref(&self) -> Option<&(dyn BufferedReader<C> + '_)> { None }
    fn cookie_set(&mut self, cookie: C) -> C { self.reader.cookie_set(cookie) }
    fn cookie_ref(&self) -> &C { self.reader.cookie_ref() }
    fn cookie_mut(&mut self) -> &mut C { self.reader.cookie_mut() }
}

/// Decompresses a zlib stream (RFC 4880 compression algorithm 1).
pub struct Zlib<'a, C> {
    reader: Generic<ZlibDecoder<Box<dyn BufferedReader<()> + 'a>>, C>,
}

impl<'a> Zlib<'a, ()> {
    /// Wraps `reader`, inflating what it produces.
    pub fn new(reader: Box<dyn BufferedReader<()> + 'a>) -> Self {
        Self::with_cookie(reader, ())
    }
}

impl<'a, C> Zlib<'a, C> {
    /// Like [`Zlib::new`], but attaching `cookie`.
    pub fn with_cookie(reader: Box<dyn BufferedReader<()> + 'a>, cookie: C) -> Self {
        Zlib {
            reader: Generic::with_cookie(
                ZlibDecoder::new(reader), None, cookie),
        }
    }
}

impl<'a, C> fmt::Debug for Zlib<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Zlib").finish()
    }
}

impl<'a, C> io::Read for Zlib<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Zlib<'a, C> {
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
