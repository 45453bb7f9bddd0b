//! Line writer facade managing one dot-encoded block at a time

use std::fmt;
use std::io::{self, Write};

use crate::encoder::{closed_error, DotConfig, DotEncoder, DotState, CRLF};

/// Writes requests or responses of a line-oriented text protocol.
///
/// The sink is normally a `BufWriter` around the connection; the writer
/// flushes it after every complete line or block but never closes it.
///
/// At most one dot-encoded block is open at a time. Opening a new block or
/// writing a line first terminates a block that is still open, and any error
/// from that implicit termination is discarded.
#[derive(Debug)]
pub struct Writer<W: Write> {
    inner: W,
    dot: Option<DotEncoder>,
}

impl<W: Write> Writer<W> {
    /// Create a writer over `inner`
    pub fn new(inner: W) -> Self {
        Self { inner, dot: None }
    }

    /// Reference to the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutable reference to the underlying sink
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap the sink. An open block is left unterminated.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Whether a dot-encoded block is still waiting for its terminator
    pub fn has_open_dot(&self) -> bool {
        self.dot.is_some()
    }

    /// Write the formatted line followed by `\r\n` and flush.
    ///
    /// ```
    /// use emx_textproto::Writer;
    ///
    /// let mut w = Writer::new(Vec::new());
    /// w.print_line(format_args!("foo {}", 123))?;
    /// assert_eq!(w.get_ref().as_slice(), b"foo 123\r\n");
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn print_line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        self.close_stale_dot();
        self.inner.write_fmt(args)?;
        self.inner.write_all(CRLF)?;
        self.inner.flush()
    }

    /// Start a dot-encoded block.
    ///
    /// The returned handle implements [`Write`]; everything written to it is
    /// dot-encoded. Call [`DotBlock::close`] to write the terminating `.\r\n`.
    /// A handle dropped without closing leaves the block open until the next
    /// call to `dot_block`, [`Writer::print_line`] or [`Writer::close_dot`].
    pub fn dot_block(&mut self, config: DotConfig) -> DotBlock<'_, W> {
        self.close_stale_dot();
        tracing::trace!(escape = config.escape_leading_dots, "opening dot block");
        self.dot = Some(DotEncoder::new(config));
        DotBlock { writer: self }
    }

    /// Terminate the open block, if any, and flush.
    ///
    /// Does nothing when no block is open.
    pub fn close_dot(&mut self) -> io::Result<()> {
        match self.dot.take() {
            Some(mut encoder) => {
                encoder.finish(&mut self.inner)?;
                self.inner.flush()
            }
            None => Ok(()),
        }
    }

    fn close_stale_dot(&mut self) {
        if self.dot.is_none() {
            return;
        }
        tracing::debug!("closing dot block left open");
        if let Err(e) = self.close_dot() {
            tracing::debug!(error = %e, "discarding error from implicit dot block close");
        }
    }
}

/// Handle to the dot-encoded block currently open on a [`Writer`]
#[derive(Debug)]
pub struct DotBlock<'a, W: Write> {
    writer: &'a mut Writer<W>,
}

impl<W: Write> DotBlock<'_, W> {
    /// Terminate the block and flush the sink.
    ///
    /// The block is detached from its writer first. A second call writes nothing.
    pub fn close(&mut self) -> io::Result<()> {
        self.writer.close_dot()
    }

    /// Whether the block was already terminated
    pub fn is_closed(&self) -> bool {
        self.writer.dot.is_none()
    }

    /// Transducer state, or `None` once closed
    pub fn state(&self) -> Option<DotState> {
        self.writer.dot.as_ref().map(DotEncoder::state)
    }
}

impl<W: Write> Write for DotBlock<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writer = &mut *self.writer;
        match writer.dot.as_mut() {
            Some(encoder) => encoder.encode(&mut writer.inner, buf),
            None => Err(closed_error()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.inner.flush()
    }
}
