use std::fmt;
use std::io;

use crate::{BufferedReader, buffered_reader_generic_read_impl};

/// A reader that only peeks at its inner reader: `consume` on `Dup`
/// advances `Dup`'s own cursor but never calls `consume` on the inner
/// reader.
///
/// Used during format detection (e.g. sniffing whether a message
/// starts with an armor header) when the bytes must remain available
/// to whatever parser runs next.
pub struct Dup<'a, C> {
    reader: Box<dyn BufferedReader<C> + 'a>,
    cursor: usize,
    cookie: C,
}

impl<'a> Dup<'a, ()> {
    /// Wraps `reader` without taking ownership of its cursor.
    pub fn new(reader: Box<dyn BufferedReader<()> + 'a>) -> Self {
        Self::with_cookie(reader, ())
    }
}

impl<'a, C> Dup<'a, C> {
    /// Like [`Dup::new`], but attaching `cookie`.
    pub fn with_cookie(reader: Box<dyn BufferedReader<C> + 'a>, cookie: C) -> Self {
        Dup { reader, cursor: 0, cookie }
    }
}

impl<'a, C> fmt::Debug for Dup<'a, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Dup")
            .field("cursor", &self.cursor)
            .field("reader", &self.reader)
            .finish()
    }
}

impl<'a, C> io::Read for Dup<'a, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<'a, C: fmt::Debug + Send + Sync> BufferedReader<C> for Dup<'a, C> {
    fn buffer(&self) -> &[u8] {
        &self.reader.buffer()[self.cursor..]
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let buf = self.reader.data(self.cursor + amount)?;
        Ok(&buf[self.cursor..])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        self.cursor += amount;
        &self.reader.buffer()[self.cursor - amount..]
    }

    fn read_so_far(&self) -> u64 { self.cursor as u64 }

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
