use std::fmt;
use std::io;

use crate::BufferedReader;

/// A reader that is always at EOF.
///
/// Used to cap a stack when a caller supplies the plaintext for a
/// detached signature out of band: there is no literal data source,
/// just an immediate end of input.
#[derive(Debug)]
pub struct EOF<C> {
    cookie: C,
}

impl EOF<()> {
    /// Creates a new, perpetually empty reader.
    pub fn new() -> Self {
        EOF { cookie: () }
    }
}

impl Default for EOF<()> {
    fn default() -> Self { Self::new() }
}

impl<C> io::Read for EOF<C> {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, io::Error> {
        Ok(0)
    }
}

impl<C: fmt::Debug + Send + Sync> BufferedReader<C> for EOF<C> {
    fn buffer(&self) -> &[u8] { &[] }
    fn data(&mut self, _amount: usize) -> Result<&[u8], io::Error> { Ok(&[]) }
    fn consume(&mut self, amount: usize) -> &[u8] {
        assert_eq!(amount, 0);
        &[]
    }
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
