use std::fmt;
use std::io;

use crate::{BufferedReader, buffered_reader_generic_read_impl};

/// Holds back the last `reserve` bytes of the wrapped reader.
///
/// Used to split a trailer (e.g. an MDC packet, or an AEAD chunk's
/// final authentication tag) off the end of a stream whose total
/// length isn't known up front: callers see everything except the
/// last `reserve` bytes until EOF, at which point [`Self::reserved`]
/// returns the held-back tail.
pub struct Reserve<'a, C> {
    reader: Box<dyn BufferedReader<C> + 'a>,
    reserve: usize,
    cookie: C,
}

impl<'a> Reserve<'a, ()> {
    /// Wraps `reader`, holding back its last `reserve` bytes.
    pub fn new(reader: Box<dyn BufferedReader<()> + 'a>, reserve: usize) -> Self {
        Self::with_cookie(reader, reserve, ())
    }
}

impl<'a, C> Reserve<'a, C> {
    /// Like [`Reserve::new`], but attaching `cookie`.
    pub fn with_cookie(reader: Box<dyn BufferedReader<C> + 'a>, reserve: usize, cookie: C) -> Self {
        Reserve { reader, reserve, cookie }
    }

    /// Returns the held-back tail.  Only meaningful once the caller
    /// has consumed everything else (i.e. `data(1)` after exhausting
    /// the visible stream returns empty).
    pub fn reserved(&mut self) -> Result<&[u8], io::Error> {
        let buf = self.reader.data_eof()?;
        if buf.len() < self.reserve {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
                                       "stream shorter than reserved trailer"));
        }
        Ok(&buf[buf.len() - self.reserve..])
    }
}

impl<'a, C> fmt::Debug for Reserve<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Reserve")
            .field("reserve", &self.reserve)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<'a, C> io::Read for Reserve<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Reserve<'a, C> {
    fn buffer(&self) -> &[u8] {
        let buf = self.reader.buffer();
        &buf[..buf.len().saturating_sub(self.reserve)]
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        // We must always know whether there are at least `reserve`
        // bytes beyond what we expose, so ask for that much extra.
        let buf = self.reader.data(amount + self.reserve)?;
        Ok(&buf[..buf.len().saturating_sub(self.reserve)])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        let visible = self.buffer().len();
        assert!(amount <= visible, "cannot consume into the reserved trailer");
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
