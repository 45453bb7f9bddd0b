//! # emx-textproto
//!
//! Writer side of line-oriented text protocols (SMTP, NNTP, POP3).
//!
//! ## Dot Encoding
//!
//! Those protocols send an arbitrary block of text as one multi-line message
//! and end it with a line holding a single dot:
//!
//! ```text
//! Subject: hello
//!
//! ..a line that started with a dot
//! .
//! ```
//!
//! The writer:
//! - Normalizes `\n` line endings to `\r\n`
//! - Doubles the leading `.` of any line that starts with one, so the receiver
//!   never mistakes data for the terminator (can be disabled when the input is
//!   already escaped)
//! - Appends the `.\r\n` terminator exactly once when the block is closed
//!
//! ## Usage
//!
//! ```
//! use std::io::Write;
//! use emx_textproto::{DotConfig, Writer};
//!
//! let mut w = Writer::new(Vec::new());
//! w.print_line(format_args!("DATA"))?;
//!
//! let mut body = w.dot_block(DotConfig::default());
//! body.write_all(b"Subject: hi\n\n.signature\n")?;
//! body.close()?;
//!
//! assert_eq!(w.get_ref().as_slice(), b"DATA\r\nSubject: hi\r\n\r\n..signature\r\n.\r\n");
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! The [`Writer`] keeps at most one block open: starting another block or
//! writing a line terminates the previous one. [`DotWriter`] does the same
//! encoding over a sink it owns, without the facade.
//!
//! ## Binary Bodies
//!
//! The [`payload`] module classifies bodies as text or binary and wraps binary
//! ones as base64 lines before they go into a block.

pub mod encoder;
pub mod payload;
pub mod writer;

pub use encoder::{DotConfig, DotEncoder, DotState, DotWriter, CRLF, DOT_CRLF};
pub use payload::{Base64Mode, BinaryReason, PayloadConfig, PayloadKind};
pub use writer::{DotBlock, Writer};
