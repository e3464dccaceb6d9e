//! A `BufferedReader` is a super-powered `Read`er.
//!
//! Like the [`BufRead`] trait, the `BufferedReader` trait has an
//! internal buffer that is directly exposed to the user.  Unlike
//! [`BufRead`], the amount of buffering is controlled by the reader
//! of the data, not the writer: every call to [`BufferedReader::data`]
//! can ask for more or less lookahead, and the returned slice always
//! points into the reader's own buffer, so callers can parse in place
//! instead of copying into a scratch buffer.
//!
//! On top of that, `BufferedReader`s are meant to be stacked: a
//! framing reader (partial-length reassembly, a size limit, a
//! decompressor) wraps an inner reader, and [`BufferedReader::into_inner`]
//! lets a parser recover the reader it wrapped once it is done.  Each
//! layer owns its child only if it constructed that child itself;
//! layers that merely borrow a child do not propagate `finish`/close
//! semantics to it. Lifetime is strictly LIFO: a parent is never read
//! from again once a child has been pushed on top of it, until that
//! child is popped via `into_inner`.
//!
//! [`BufRead`]: std::io::BufRead

use std::cmp;
use std::fmt;
use std::io;
use std::io::{Error, ErrorKind};

mod generic;
mod memory;
mod limitor;
mod reserve;
mod dup;
mod eof;
#[cfg(feature = "compression-deflate")]
mod decompress_deflate;
#[cfg(feature = "compression-bzip2")]
mod decompress_bzip2;

pub use self::generic::Generic;
pub use self::memory::Memory;
pub use self::limitor::Limitor;
pub use self::reserve::Reserve;
pub use self::dup::Dup;
pub use self::eof::EOF;
#[cfg(feature = "compression-deflate")]
pub use self::decompress_deflate::{Deflate, Zlib};
#[cfg(feature = "compression-bzip2")]
pub use self::decompress_bzip2::Bzip;

/// The default size of the internal buffer that readers fill lazily.
pub const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// A pull-read byte source with bounded peek and deferred close.
///
/// This is the "Source" abstraction of the OpenPGP pipeline: every
/// layer of the message processing stack (armor, decryption,
/// decompression, signature verification, the literal data packet
/// itself) is a `BufferedReader` that reads from the `BufferedReader`
/// beneath it.
pub trait BufferedReader<C = ()>: io::Read + fmt::Debug + Send + Sync {
    /// Returns the data currently in the internal buffer, without
    /// reading any further.
    ///
    /// This returns the same bytes as `self.data(0)`, but does not
    /// require a mutable borrow.
    fn buffer(&self) -> &[u8];

    /// Ensures that the internal buffer holds at least `amount` bytes,
    /// and returns it.
    ///
    /// If fewer than `amount` bytes are available, the returned slice
    /// contains everything read so far (up to and including EOF); it
    /// is never shorter on a later call for the same or smaller
    /// `amount` than it was on an earlier one; once bytes have been
    /// returned, they remain buffered until `consume`d.
    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error>;

    /// Like [`Self::data`], but errors with [`io::ErrorKind::UnexpectedEof`]
    /// if fewer than `amount` bytes are available.
    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let result = self.data(amount);
        if let Ok(buffer) = result {
            if buffer.len() < amount {
                return Err(Error::new(ErrorKind::UnexpectedEof,
                                       "unexpected EOF"));
            }
        }
        result
    }

    /// Buffers and returns all remaining data through EOF.
    ///
    /// This can buffer an unbounded amount of data; callers must know
    /// that the remaining amount is limited (e.g., because an outer
    /// framing layer bounds it).
    fn data_eof(&mut self) -> Result<&[u8], io::Error> {
        let mut s = DEFAULT_BUF_SIZE;
        while s < usize::MAX / 2 {
            match self.data(s) {
                Ok(buffer) => {
                    if buffer.len() < s {
                        s = buffer.len();
                        break;
                    } else {
                        s *= 2;
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.buffer())
    }

    /// Advances the read cursor by `amount` bytes.
    ///
    /// It is only legal to consume data that a previous call to
    /// `data` (or a related function) actually returned.  Returns the
    /// buffer including the just-consumed bytes (the reference stays
    /// valid until the next call that invalidates the buffer).
    fn consume(&mut self, amount: usize) -> &[u8];

    /// Combines [`Self::data`] and [`Self::consume`].
    fn data_consume(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let amount = cmp::min(amount, self.data(amount)?.len());
        let buffer = self.consume(amount);
        assert!(buffer.len() >= amount);
        Ok(buffer)
    }

    /// Combines [`Self::data_hard`] and [`Self::consume`].
    fn data_consume_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        let len = self.data_hard(amount)?.len();
        assert!(len >= amount);
        let buffer = self.consume(amount);
        assert!(buffer.len() >= amount);
        Ok(buffer)
    }

    /// Peeks at up to `amount` bytes without consuming them.
    ///
    /// This is simply `data`, named the way the pipeline's "bounded
    /// peek" requirement describes it.
    fn peek(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.data(amount)
    }

    /// Discards `amount` bytes, reading and buffering them first if
    /// necessary.  Returns the number of bytes actually skipped (less
    /// than `amount` only at EOF).
    fn skip(&mut self, amount: u64) -> Result<u64, io::Error> {
        let mut skipped = 0u64;
        let mut remaining = amount;
        while remaining > 0 {
            let chunk = cmp::min(remaining, DEFAULT_BUF_SIZE as u64) as usize;
            let got = self.data_consume(chunk)?.len().min(chunk);
            if got == 0 {
                break;
            }
            skipped += got as u64;
            remaining -= got as u64;
        }
        Ok(skipped)
    }

    /// Returns whether the source is at EOF (i.e., no more bytes are
    /// available without blocking past the end of input).
    fn eof(&mut self) -> Result<bool, io::Error> {
        Ok(self.data(1)?.is_empty())
    }

    /// A convenience function for reading a 16-bit big-endian integer.
    fn read_be_u16(&mut self) -> Result<u16, io::Error> {
        let input = self.data_consume_hard(2)?;
        Ok(((input[0] as u16) << 8) + (input[1] as u16))
    }

    /// A convenience function for reading a 32-bit big-endian integer.
    fn read_be_u32(&mut self) -> Result<u32, io::Error> {
        let input = self.data_consume_hard(4)?;
        Ok(((input[0] as u32) << 24) + ((input[1] as u32) << 16)
           + ((input[2] as u32) << 8) + (input[3] as u32))
    }

    /// Reads (without consuming) up to and including the first byte
    /// equal to `terminal`, or through EOF if `terminal` never occurs.
    fn read_to(&mut self, terminal: u8) -> Result<&[u8], io::Error> {
        let mut n = 128;
        let len;
        loop {
            let data = self.data(n)?;
            if let Some(pos) = data.iter().position(|c| *c == terminal) {
                len = pos + 1;
                break;
            } else if data.len() < n {
                len = data.len();
                break;
            } else {
                n = cmp::max(2 * n, data.len() + 1024);
            }
        }
        Ok(&self.buffer()[..len])
    }

    /// Like `data_consume_hard`, but copies the data into a
    /// caller-owned buffer.
    fn steal(&mut self, amount: usize) -> Result<Vec<u8>, io::Error> {
        let data = self.data_consume_hard(amount)?;
        Ok(data[..amount].to_vec())
    }

    /// Like [`Self::steal`], but takes everything through EOF.
    fn steal_eof(&mut self) -> Result<Vec<u8>, io::Error> {
        let len = self.data_eof()?.len();
        self.steal(len)
    }

    /// Discards all remaining data.  Returns whether anything was
    /// discarded.
    fn drop_eof(&mut self) -> Result<bool, io::Error> {
        let mut any = false;
        loop {
            let buffer = self.data_consume(DEFAULT_BUF_SIZE)?;
            if !buffer.is_empty() {
                any = true;
            }
            if buffer.len() < DEFAULT_BUF_SIZE {
                break;
            }
        }
        Ok(any)
    }

    /// The number of bytes consumed so far.  Monotonically
    /// increasing for the lifetime of the reader.
    fn read_so_far(&self) -> u64 { 0 }

    /// Finalizes the reader, running any integrity check that can
    /// only be evaluated once the underlying data has been fully
    /// consumed (MDC hash comparison, AEAD tag verification, ...).
    ///
    /// The default implementation does nothing; layers that carry
    /// integrity state override it.  `finish` is called bottom-up as
    /// the stack unwinds, so an outer layer's `finish` runs only
    /// after its child's `finish` has already validated the data
    /// that flowed through it.
    fn finish(&mut self) -> Result<(), io::Error> { Ok(()) }

    /// Returns the wrapped reader, if this reader owns one and is
    /// willing to give it up.
    fn into_inner<'a>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'a>>
        where Self: 'a;

    /// Returns a mutable reference to the wrapped reader, if any.
    fn get_mut(&mut self) -> Option<&mut (dyn BufferedReader<C> + '_)>;

    /// Returns a reference to the wrapped reader, if any.
    fn get_ref(&self) -> Option<&(dyn BufferedReader<C> + '_)>;

    /// Sets this reader's cookie, returning the old value.
    ///
    /// The cookie is arbitrary state a higher layer can stash on each
    /// stack frame (e.g., the packet tag a length-limiting reader was
    /// created for).
    fn cookie_set(&mut self, cookie: C) -> C;

    /// Returns a reference to this reader's cookie.
    fn cookie_ref(&self) -> &C;

    /// Returns a mutable reference to this reader's cookie.
    fn cookie_mut(&mut self) -> &mut C;
}

/// Implements `std::io::Read::read` in terms of `data_consume`.
///
/// Every concrete `BufferedReader` implements `Read` this way; we
/// can't blanket-impl it (`impl<T: BufferedReader> Read for T` runs
/// afoul of coherence), so each implementation calls this helper.
pub fn buffered_reader_generic_read_impl<T, C>(bio: &mut T, buf: &mut [u8])
    -> Result<usize, io::Error>
    where T: BufferedReader<C> + ?Sized
{
    let inner = bio.data_consume(buf.len())?;
    let amount = cmp::min(buf.len(), inner.len());
    buf[..amount].copy_from_slice(&inner[..amount]);
    Ok(amount)
}

impl<'a, C> BufferedReader<C> for Box<dyn BufferedReader<C> + 'a> {
    fn buffer(&self) -> &[u8] { self.as_ref().buffer() }
    fn data(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data(amount)
    }
    fn data_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data_hard(amount)
    }
    fn data_eof(&mut self) -> Result<&[u8], io::Error> {
        self.as_mut().data_eof()
    }
    fn consume(&mut self, amount: usize) -> &[u8] {
        self.as_mut().consume(amount)
    }
    fn data_consume(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data_consume(amount)
    }
    fn data_consume_hard(&mut self, amount: usize) -> Result<&[u8], io::Error> {
        self.as_mut().data_consume_hard(amount)
    }
    fn read_so_far(&self) -> u64 { self.as_ref().read_so_far() }
    fn finish(&mut self) -> Result<(), io::Error> { self.as_mut().finish() }
    fn into_inner<'b>(self: Box<Self>) -> Option<Box<dyn BufferedReader<C> + 'b>>
        where Self: 'b
    {
        (*self).into_inner()
    }
    fn get_mut(&mut self) -> Option<&mut (dyn BufferedReader<C> + '_)> {
        self.as_mut().get_mut()
    }
    fn get_ref(&self) -> Option<&(dyn BufferedReader<C> + '_)> {
        self.as_ref().get_ref()
    }
    fn cookie_set(&mut self, cookie: C) -> C { self.as_mut().cookie_set(cookie) }
    fn cookie_ref(&self) -> &C { self.as_ref().cookie_ref() }
    fn cookie_mut(&mut self) -> &mut C { self.as_mut().cookie_mut() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_data_is_stable() {
        let mut br = Memory::new(&b"0123456789"[..]);
        let first = br.data(10).unwrap().len();
        let second = br.buffer().len();
        assert_eq!(first, second);
    }

    #[test]
    fn data_hard_errors_at_eof() {
        let mut br = Memory::new(&b"0123456789"[..]);
        assert!(br.data_hard(20).is_err());
        assert_eq!(br.data(20).unwrap().len(), 10);
    }

    #[test]
    fn consume_then_read_to() {
        let orig = b"0123456789";
        let mut br = Memory::new(&orig[..]);
        assert_eq!(br.read_to(b'3').unwrap(), b"0123");
        br.consume(3);
        assert_eq!(br.read_to(b'5').unwrap(), b"345");
    }

    #[test]
    fn limitor_bounds_reads() {
        let data = b"0123456789";
        let inner: Box<dyn BufferedReader<()>> = Box::new(Memory::new(&data[..]));
        let mut lim = Limitor::new(inner, 5);
        assert_eq!(lim.data_eof().unwrap().len(), 5);
        lim.consume(5);
        assert_eq!(lim.data(1).unwrap().len(), 0);
    }
}
