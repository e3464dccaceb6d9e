//! Push-write sinks: the mirror of [`buffered_reader::BufferedReader`]
//! for the write side of the message pipeline.
//!
//! Where the pull side stacks `BufferedReader`s (armor wraps
//! decryption wraps decompression wraps the literal data packet), the
//! push side stacks `Sink`s in the same order an encrypting/signing
//! caller builds them: a `LiteralSink` writes a literal data packet's
//! body into a `CompressingSink`, which deflates into an
//! `EncryptingSink`, which encrypts into an `ArmorSink`, which
//! base64-encodes into the caller's `Write`.
//!
//! [`Input`] and [`Output`] are the byte-I/O handles a
//! [`crate::context::Context`] caller opens a stream with: a path, an
//! in-memory buffer, or a callback, erased behind `Read`/`Write` so
//! the pipeline beneath never cares which.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use crate::error::Result;

/// A push-write layer in the message pipeline.
///
/// Each layer owns the one beneath it (the way
/// [`buffered_reader::BufferedReader::into_inner`] documents for the
/// pull side) and is responsible for finishing it — flushing
/// buffered bytes, writing a trailer (MDC digest, AEAD final chunk,
/// armor CRC-24 and end blurb) — when [`Sink::close`] is called.
/// Closing happens LIFO: an outer layer's `close` must call the inner
/// layer's `close` only after it has written everything the inner
/// layer needs to see.
pub trait Sink: Write {
    /// Finishes this layer and everything beneath it.
    ///
    /// If `discard` is true, the layer abandons its output instead of
    /// writing a trailer — used when an operation fails partway
    /// through and the caller does not want a truncated-but-otherwise
    /// well-formed message to reach the underlying writer.
    fn close(&mut self, discard: bool) -> io::Result<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn close(&mut self, discard: bool) -> io::Result<()> {
        (**self).close(discard)
    }
}

/// Adapts a plain [`Write`] (one that needs no trailer) into a
/// [`Sink`], so it can terminate a sink stack.
pub struct Plain<W: Write>(W);

impl<W: Write> Plain<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Plain(inner)
    }

    /// Unwraps the inner writer.
    pub fn into_inner(self) -> W {
        self.0
    }
}

impl<W: Write> Write for Plain<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl<W: Write> Sink for Plain<W> {
    fn close(&mut self, _discard: bool) -> io::Result<()> {
        self.0.flush()
    }
}

/// A byte source: a file, an in-memory buffer, or a caller-supplied
/// callback, erased behind `Read` so the pipeline takes one type
/// regardless of where the bytes actually come from.
pub struct Input<'a>(Box<dyn Read + 'a>);

impl<'a> Input<'a> {
    /// Opens `path` for reading.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Input<'static>> {
        Ok(Input(Box::new(File::open(path)?)))
    }

    /// Reads from `data`, a borrowed in-memory buffer.
    pub fn from_memory(data: &'a [u8]) -> Input<'a> {
        Input(Box::new(Cursor::new(data)))
    }

    /// Reads from any other `Read` implementation, e.g. a
    /// caller-supplied callback wrapped in a small adapter.
    pub fn from_callback<R: Read + 'a>(reader: R) -> Input<'a> {
        Input(Box::new(reader))
    }
}

impl<'a> Read for Input<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

/// A byte sink: a file, an in-memory buffer, a caller-supplied
/// callback, or the null sink, erased behind `Write`.
pub struct Output<'a>(Box<dyn Write + 'a>);

impl<'a> Output<'a> {
    /// Creates (or truncates) `path` for writing.
    pub fn to_path<P: AsRef<Path>>(path: P) -> Result<Output<'static>> {
        Ok(Output(Box::new(File::create(path)?)))
    }

    /// Appends to `buf`, an owned in-memory buffer the caller reads
    /// back once the operation closes it.
    pub fn to_memory(buf: &'a mut Vec<u8>) -> Output<'a> {
        Output(Box::new(buf))
    }

    /// Writes through any other `Write` implementation, e.g. a
    /// caller-supplied callback wrapped in a small adapter.
    pub fn to_callback<W: Write + 'a>(writer: W) -> Output<'a> {
        Output(Box::new(writer))
    }

    /// Discards everything written to it — used when a caller wants
    /// to run an operation (e.g. verification) purely for its
    /// [`crate::context::Status`]/signature results, without
    /// producing output.
    pub fn null() -> Output<'static> {
        Output(Box::new(io::sink()))
    }
}

impl<'a> Write for Output<'a> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_forwards_writes() {
        let mut sink = Plain::new(Vec::new());
        sink.write_all(b"hello").unwrap();
        sink.close(false).unwrap();
        assert_eq!(sink.into_inner(), b"hello");
    }

    #[test]
    fn output_to_memory_round_trips() {
        let mut buf = Vec::new();
        {
            let mut out = Output::to_memory(&mut buf);
            out.write_all(b"hi").unwrap();
        }
        assert_eq!(buf, b"hi");
    }

    #[test]
    fn input_from_memory_reads_back() {
        let data = b"hello".to_vec();
        let mut input = Input::from_memory(&data);
        let mut read = Vec::new();
        input.read_to_end(&mut read).unwrap();
        assert_eq!(read, b"hello");
    }

    #[test]
    fn output_null_discards() {
        let mut out = Output::null();
        out.write_all(b"discarded").unwrap();
    }
}
