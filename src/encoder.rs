//! Dot-encoding transducer

use std::io::{self, Write};

/// Line terminator used on the wire
pub const CRLF: &[u8] = b"\r\n";
/// Block terminator: a line holding a single dot
pub const DOT_CRLF: &[u8] = b".\r\n";

// Bytes emitted by close. Each state starts at a different offset, so an
// unterminated line gets CR, LF and the terminator, a pending CR gets LF and
// the terminator, and a clean line start gets the terminator alone.
const CLOSE_CHAIN: &[u8] = b"\r\n.\r\n";

/// Configuration for a dot-encoded block, fixed for the block's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DotConfig {
    /// Double the leading dot of every line (disable when the input is already escaped)
    pub escape_leading_dots: bool,
}

impl DotConfig {
    /// Default configuration: escaping enabled
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for input that was already dot-escaped upstream
    pub fn unescaped() -> Self {
        Self { escape_leading_dots: false }
    }

    /// Enable or disable leading-dot escaping
    pub fn with_escaping(mut self, enabled: bool) -> Self {
        self.escape_leading_dots = enabled;
        self
    }
}

impl Default for DotConfig {
    fn default() -> Self {
        Self { escape_leading_dots: true }
    }
}

/// Position of the output cursor relative to line boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DotState {
    /// Nothing written yet
    Begin,
    /// Cursor at the start of a line
    BeginLine,
    /// Output ends with a CR whose LF has not arrived yet
    Cr,
    /// Cursor in the middle of a line
    Data,
}

/// How a segment of input ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    /// Already CRLF, or the LF completing a CR from the previous write
    Crlf,
    /// Bare LF that must be widened to CRLF
    Lf,
    /// CR as the last byte delivered so far
    Cr,
    /// No line ending at all
    None,
}

impl LineEnding {
    fn classify(segment: &[u8], state: DotState) -> Self {
        match segment {
            [.., b'\r', b'\n'] => LineEnding::Crlf,
            [b'\n'] if state == DotState::Cr => LineEnding::Crlf,
            [.., b'\n'] => LineEnding::Lf,
            [.., b'\r'] => LineEnding::Cr,
            _ => LineEnding::None,
        }
    }
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::other("dot block already closed")
}

/// The dot-encoding state machine.
///
/// It owns no sink: every call takes the destination explicitly, which lets
/// both [`DotWriter`] and [`crate::writer::DotBlock`] drive the same logic
/// over a sink they reach in different ways.
///
/// Input is cut into segments at each `\n` (inclusive). A segment starting
/// with `.` at a line start gets an extra `.` in front of it, bare `\n` is
/// widened to `\r\n`, and [`DotEncoder::finish`] completes the current line
/// and appends `.\r\n`.
#[derive(Debug, Clone)]
pub struct DotEncoder {
    state: DotState,
    config: DotConfig,
    closed: bool,
}

impl DotEncoder {
    /// Create an encoder in the [`DotState::Begin`] state
    pub fn new(config: DotConfig) -> Self {
        Self {
            state: DotState::Begin,
            config,
            closed: false,
        }
    }

    /// Current transducer state
    pub fn state(&self) -> DotState {
        self.state
    }

    /// Configuration the encoder was created with
    pub fn config(&self) -> DotConfig {
        self.config
    }

    /// Whether [`DotEncoder::finish`] already ran
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Encode `buf` into `sink`, returning the number of input bytes consumed.
    ///
    /// Escape dots never count toward the returned length. The first sink
    /// error aborts the call and is returned as is.
    pub fn encode<W: Write + ?Sized>(&mut self, sink: &mut W, mut buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }

        let mut consumed = 0;
        while !buf.is_empty() {
            let (segment, rest) = match buf.iter().position(|&b| b == b'\n') {
                Some(i) => buf.split_at(i + 1),
                None => (buf, &buf[buf.len()..]),
            };

            if self.config.escape_leading_dots && self.at_line_start() && segment[0] == b'.' {
                sink.write_all(b".")?;
            }

            self.state = match LineEnding::classify(segment, self.state) {
                LineEnding::Crlf => {
                    sink.write_all(segment)?;
                    DotState::BeginLine
                }
                LineEnding::Lf => {
                    sink.write_all(&segment[..segment.len() - 1])?;
                    sink.write_all(CRLF)?;
                    DotState::BeginLine
                }
                LineEnding::Cr => {
                    sink.write_all(segment)?;
                    DotState::Cr
                }
                LineEnding::None => {
                    sink.write_all(segment)?;
                    DotState::Data
                }
            };

            consumed += segment.len();
            buf = rest;
        }

        Ok(consumed)
    }

    /// Complete the current line and write the block terminator.
    ///
    /// Runs once; later calls write nothing. Flushing is left to the caller.
    pub fn finish<W: Write + ?Sized>(&mut self, sink: &mut W) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let start = match self.state {
            DotState::Begin | DotState::Data => 0,
            DotState::Cr => 1,
            DotState::BeginLine => 2,
        };
        tracing::trace!(state = ?self.state, "terminating dot block");
        sink.write_all(&CLOSE_CHAIN[start..])?;
        self.state = DotState::BeginLine;
        Ok(())
    }

    fn at_line_start(&self) -> bool {
        matches!(self.state, DotState::Begin | DotState::BeginLine)
    }
}

impl Default for DotEncoder {
    fn default() -> Self {
        Self::new(DotConfig::default())
    }
}

/// Dot-encodes everything written to it onto a sink it owns.
///
/// Use this when no [`crate::Writer`] manages the connection. Call
/// [`DotWriter::close`] to terminate the block; dropping the writer leaves
/// the block unterminated.
#[derive(Debug)]
pub struct DotWriter<W: Write> {
    inner: W,
    encoder: DotEncoder,
}

impl<W: Write> DotWriter<W> {
    /// Start a dot-encoded block on `inner`
    pub fn new(inner: W, config: DotConfig) -> Self {
        Self {
            inner,
            encoder: DotEncoder::new(config),
        }
    }

    /// Reference to the underlying sink
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutable reference to the underlying sink.
    ///
    /// Writing to it directly corrupts the block.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Current transducer state
    pub fn state(&self) -> DotState {
        self.encoder.state()
    }

    /// Whether the block was already terminated
    pub fn is_closed(&self) -> bool {
        self.encoder.is_closed()
    }

    /// Terminate the block and flush the sink.
    ///
    /// A second call writes nothing.
    pub fn close(&mut self) -> io::Result<()> {
        if self.encoder.is_closed() {
            return Ok(());
        }
        self.encoder.finish(&mut self.inner)?;
        self.inner.flush()
    }

    /// Unwrap the sink without terminating the block
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for DotWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.encode(&mut self.inner, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"abc\n.def\n..ghi\n.jkl\n.";

    fn encode_all(input: &[u8], config: DotConfig) -> Vec<u8> {
        let mut writer = DotWriter::new(Vec::new(), config);
        writer.write_all(input).unwrap();
        writer.close().unwrap();
        writer.into_inner()
    }

    fn encode_chunks(chunks: &[&[u8]], config: DotConfig) -> Vec<u8> {
        let mut writer = DotWriter::new(Vec::new(), config);
        for chunk in chunks {
            let n = writer.write(chunk).unwrap();
            assert_eq!(n, chunk.len());
        }
        writer.close().unwrap();
        writer.into_inner()
    }

    /// Sink that accepts `limit` bytes and fails afterwards
    struct FailingSink {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_encode_escapes_leading_dots() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
        let n = writer.write(SAMPLE).unwrap();
        assert_eq!(n, 21);
        writer.close().unwrap();
        assert_eq!(
            writer.into_inner(),
            b"abc\r\n..def\r\n...ghi\r\n..jkl\r\n..\r\n.\r\n"
        );
    }

    #[test]
    fn test_encode_without_escaping() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::unescaped());
        let n = writer.write(SAMPLE).unwrap();
        assert_eq!(n, 21);
        writer.close().unwrap();
        assert_eq!(writer.into_inner(), b"abc\r\n.def\r\n..ghi\r\n.jkl\r\n.\r\n.\r\n");
    }

    #[test]
    fn test_close_after_empty_write() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
        assert_eq!(writer.write(b"").unwrap(), 0);
        assert_eq!(writer.state(), DotState::Begin);
        writer.close().unwrap();
        assert_eq!(writer.into_inner(), b"\r\n.\r\n");
    }

    #[test]
    fn test_close_without_write() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
        writer.close().unwrap();
        assert_eq!(writer.into_inner(), b"\r\n.\r\n");
    }

    #[test]
    fn test_close_twice_writes_terminator_once() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
        writer.write_all(b"hello\n").unwrap();
        writer.close().unwrap();
        let len = writer.get_ref().len();
        writer.close().unwrap();
        assert_eq!(writer.get_ref().len(), len);
        assert_eq!(writer.into_inner(), b"hello\r\n.\r\n");
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
        writer.close().unwrap();
        assert!(writer.is_closed());
        assert!(writer.write(b"late\n").is_err());
        assert_eq!(writer.into_inner(), b"\r\n.\r\n");
    }

    #[test]
    fn test_single_dot_line() {
        assert_eq!(encode_all(b".", DotConfig::default()), b"..\r\n.\r\n");
        assert_eq!(encode_all(b".", DotConfig::unescaped()), b".\r\n.\r\n");
    }

    #[test]
    fn test_first_line_dot_is_escaped() {
        assert_eq!(encode_all(b".hidden\nshown\n", DotConfig::default()), b"..hidden\r\nshown\r\n.\r\n");
    }

    #[test]
    fn test_dot_mid_line_untouched() {
        assert_eq!(encode_all(b"a.b\nc .\n", DotConfig::default()), b"a.b\r\nc .\r\n.\r\n");
    }

    #[test]
    fn test_crlf_input_passes_through() {
        assert_eq!(encode_all(b"one\r\ntwo\r\n", DotConfig::default()), b"one\r\ntwo\r\n.\r\n");
    }

    #[test]
    fn test_mixed_line_endings_normalized() {
        assert_eq!(encode_all(b"one\ntwo\r\nthree", DotConfig::default()), b"one\r\ntwo\r\nthree\r\n.\r\n");
    }

    #[test]
    fn test_trailing_cr_resolved_on_close() {
        let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
        writer.write_all(b"line\r").unwrap();
        assert_eq!(writer.state(), DotState::Cr);
        writer.close().unwrap();
        assert_eq!(writer.into_inner(), b"line\r\n.\r\n");
    }

    #[test]
    fn test_crlf_split_across_writes() {
        let out = encode_chunks(&[b"line\r", b"\n", b".next"], DotConfig::default());
        assert_eq!(out, b"line\r\n..next\r\n.\r\n");
    }

    #[test]
    fn test_lone_cr_followed_by_data() {
        let split = encode_chunks(&[b"a\r", b"b\n"], DotConfig::default());
        let whole = encode_all(b"a\rb\n", DotConfig::default());
        assert_eq!(split, whole);
        assert_eq!(whole, b"a\rb\r\n.\r\n");
    }

    #[test]
    fn test_escape_state_persists_across_writes() {
        let out = encode_chunks(&[b"first\n", b".", b"second\n"], DotConfig::default());
        assert_eq!(out, b"first\r\n..second\r\n.\r\n");
    }

    #[test]
    fn test_state_transitions() {
        let mut encoder = DotEncoder::default();
        let mut sink = Vec::new();
        assert_eq!(encoder.state(), DotState::Begin);
        encoder.encode(&mut sink, b"abc").unwrap();
        assert_eq!(encoder.state(), DotState::Data);
        encoder.encode(&mut sink, b"\r").unwrap();
        assert_eq!(encoder.state(), DotState::Cr);
        encoder.encode(&mut sink, b"\n").unwrap();
        assert_eq!(encoder.state(), DotState::BeginLine);
        encoder.encode(&mut sink, b"x\n").unwrap();
        assert_eq!(encoder.state(), DotState::BeginLine);
        encoder.finish(&mut sink).unwrap();
        assert!(encoder.is_closed());
        assert_eq!(sink, b"abc\r\nx\r\n.\r\n");
    }

    #[test]
    fn test_consumed_count_ignores_escapes() {
        let mut encoder = DotEncoder::default();
        let mut sink = Vec::new();
        let input = b"..\n..\n..\n";
        assert_eq!(encoder.encode(&mut sink, input).unwrap(), input.len());
        assert_eq!(sink, b"...\r\n...\r\n...\r\n");
    }

    #[test]
    fn test_any_two_way_split_matches_single_write() {
        let inputs: [&[u8]; 5] = [
            SAMPLE,
            b"a\r\n.b\r\n\r\n.\r\n",
            b"\n\n.\n..\r\r\n.x\ry\n",
            b".leading\r",
            b"\r\r\n\n\r.",
        ];
        for config in [DotConfig::default(), DotConfig::unescaped()] {
            for input in inputs {
                let whole = encode_all(input, config);
                for i in 0..=input.len() {
                    let (a, b) = input.split_at(i);
                    assert_eq!(encode_chunks(&[a, b], config), whole, "split at {} of {:?}", i, input);
                }
            }
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_single_write() {
        let input: &[u8] = b"From: a@example.com\n\n.\n..\nbody\r\n.end\r";
        let chunks: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(encode_chunks(&chunks, DotConfig::default()), encode_all(input, DotConfig::default()));
    }

    /// Reverse of the encoding: strip one leading dot, stop at the terminator
    fn decode(encoded: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for line in encoded.split_inclusive(|&b| b == b'\n') {
            if line == DOT_CRLF {
                break;
            }
            out.extend_from_slice(line.strip_prefix(b".").unwrap_or(line));
        }
        out
    }

    #[test]
    fn test_decoded_block_matches_input() {
        let input: &[u8] = b"From: a@example.com\n.hidden\n..double\n\nend\r\n...";
        let encoded = encode_all(input, DotConfig::default());
        assert_eq!(decode(&encoded), b"From: a@example.com\r\n.hidden\r\n..double\r\n\r\nend\r\n...\r\n");
    }

    #[test]
    fn test_sink_error_is_propagated() {
        let mut sink = FailingSink { written: Vec::new(), limit: 6 };
        let mut encoder = DotEncoder::default();
        assert_eq!(encoder.encode(&mut sink, b"abc\n").unwrap(), 4);
        let err = encoder.encode(&mut sink, b"def\nghi\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(sink.written, b"abc\r\n");
    }

    #[test]
    fn test_close_error_is_propagated() {
        let sink = FailingSink { written: Vec::new(), limit: 4 };
        let mut writer = DotWriter::new(sink, DotConfig::default());
        writer.write_all(b"abc").unwrap();
        assert!(writer.close().is_err());
    }

    #[test]
    fn test_config_builders() {
        assert!(DotConfig::new().escape_leading_dots);
        assert!(!DotConfig::unescaped().escape_leading_dots);
        assert_eq!(DotConfig::new().with_escaping(false), DotConfig::unescaped());
        assert_eq!(DotEncoder::new(DotConfig::unescaped()).config(), DotConfig::unescaped());
    }

    #[test]
    fn test_dot_writer_over_file() {
        use std::io::{Read, Seek, SeekFrom};

        let file = tempfile::tempfile().unwrap();
        let mut writer = DotWriter::new(io::BufWriter::new(file), DotConfig::default());
        writer.write_all(b"line one\n.line two\n").unwrap();
        writer.close().unwrap();

        let mut file = writer.into_inner().into_inner().unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"line one\r\n..line two\r\n.\r\n");
    }
}
