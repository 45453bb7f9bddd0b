//! Example of sending a binary body through a standalone dot writer

use std::io::Write;

use emx_textproto::payload::{self, Base64Mode, PayloadConfig, PayloadKind};
use emx_textproto::{DotConfig, DotWriter};

fn main() -> anyhow::Result<()> {
    println!("=== Binary Payload Example ===\n");

    // Simulated JPEG header
    let jpeg_header = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
    let config = PayloadConfig::default();

    match payload::detect(&jpeg_header, &config) {
        PayloadKind::Text => println!("Detected: text"),
        PayloadKind::Binary { reason } => println!("Detected: binary ({:?})", reason),
    }

    let (body, reason) = payload::prepare(&jpeg_header, Base64Mode::Auto, &config);
    println!("Wrapped as base64: {}", reason.is_some());

    let mut writer = DotWriter::new(Vec::new(), DotConfig::default());
    writer.write_all(&body)?;
    writer.close()?;
    let wire = writer.into_inner();

    println!("On the wire: {:?}", String::from_utf8_lossy(&wire));

    // Strip the terminator and decode to verify the round-trip
    let lines = &wire[..wire.len() - emx_textproto::DOT_CRLF.len()];
    let decoded = payload::decode_base64_lines(lines)?;
    assert_eq!(decoded, jpeg_header);

    println!("\nRound-trip verification passed!");

    Ok(())
}
