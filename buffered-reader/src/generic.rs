use std::cmp;
use std::fmt;
use std::io;
use std::io::Read;

use crate::{BufferedReader, buffered_reader_generic_read_impl};

/// Wraps an arbitrary `Read`er, adding the `BufferedReader` interface.
///
/// This is the reader at the bottom of every stack: it owns a file,
/// socket, or other `std::io::Read` implementation and buffers reads
/// from it.
pub struct Generic<T, C> {
    buffer: Vec<u8>,
    // Offset of the cursor in `buffer`, i.e. the start of unconsumed
    // data.
    cursor: usize,
    // Set once the underlying reader has reported EOF.
    eof: bool,
    // A saved error returned by a previous, unsuccessful fill.
    error: Option<io::Error>,
    reader: T,
    total_consumed: u64,
    cookie: C,
}

impl<T: fmt::Debug, C> fmt::Debug for Generic<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("buffered_reader::Generic")
            .field("reader", &self.reader)
            .field("buffer bytes remaining", &(self.buffer.len() - self.cursor))
            .finish()
    }
}

impl<T: io::Read> Generic<T, ()> {
    /// Creates a new buffered reader, using an internal buffer that
    /// is grown as needed starting from `preferred_chunk_size` bytes
    /// (or a sensible default if `None`).
    pub fn new(reader: T, preferred_chunk_size: Option<usize>) -> Self {
        Self::with_cookie(reader, preferred_chunk_size, ())
    }
}

impl<T: io::Read, C> Generic<T, C> {
    /// Like [`Generic::new`], but attaching `cookie` to this layer.
    pub fn with_cookie(reader: T, preferred_chunk_size: Option<usize>, cookie: C) -> Self {
        Generic {
            buffer: Vec::with_capacity(
                preferred_chunk_size.unwrap_or(crate::DEFAULT_BUF_SIZE)),
            cursor: 0,
            eof: false,
            error: None,
            reader,
            total_consumed: 0,
            cookie,
        }
    }

    fn fill(&mut self, amount: usize) -> Result<(), io::Error> {
        if self.cursor > 0 {
            self.buffer.drain(..self.cursor);
            self.cursor = 0;
        }

        while self.buffer.len() < amount && !self.eof {
            if let Some(err) = self.error.take() {
                return Err(err);
            }

            let start = self.buffer.len();
            let want = cmp::max(amount - start, crate::DEFAULT_BUF_SIZE);
            self.buffer.resize(start + want, 0);

            loop {
                match self.reader.read(&mut self.buffer[start..]) {
                    Ok(0) => {
                        self.buffer.truncate(start);
                        self.eof = true;
                        break;
                    }
                    Ok(n) => {
                        self.buffer.truncate(start + n);
                        break;
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.buffer.truncate(start);
                        self.error = Some(e);
                        break;
                    }
                }
            }

            if self.error.is_some() && self.buffer.len() < amount {
                return Err(self.error.take().unwrap());
            }
        }

        Ok(())
    }
}

impl<T: io::Read, C> io::Read for Generic<T, C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        buffered_reader_generic_read_impl(self, buf)
    }
}

impl<T: io::Read + fmt::Debug + Send + Sync, C: fmt::Debug + Send + Sync>
    BufferedReader<C> for Generic<T, C>
{
    fn buffer(&self) -> &[u8] {
        &self.buffer[self.cursor..]
    }

    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        if self.buffer.len() - self.cursor < amount {
            self.fill(amount)?;
        }
        Ok(&self.buffer[self.cursor..])
    }

    fn consume(&mut self, amount: usize) -> &[u8] {
        assert!(self.cursor + amount <= self.buffer.len());
        self.cursor += amount;
        self.total_consumed += amount as u64;
        &self.buffer[self.cursor - amount..]
    }

    fn read_so_far(&self) -> u64 { self.total_consumed }

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
