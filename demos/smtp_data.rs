//! Example of sending a mail body in an SMTP DATA exchange

use std::io::{BufWriter, Write};

use emx_textproto::{DotConfig, Writer};

fn main() -> anyhow::Result<()> {
    println!("=== SMTP DATA Example ===\n");

    let mut writer = Writer::new(BufWriter::new(Vec::new()));

    writer.print_line(format_args!("MAIL FROM:<{}>", "alice@example.com"))?;
    writer.print_line(format_args!("RCPT TO:<{}>", "bob@example.com"))?;
    writer.print_line(format_args!("DATA"))?;

    // Bare \n endings and lines starting with a dot are handled by the block
    let message = "Subject: Dots\n\nThe next line starts with a dot:\n.like this\n.\nBye";
    let mut body = writer.dot_block(DotConfig::default());
    let n = body.write(message.as_bytes())?;
    body.close()?;
    println!("Body: {} bytes consumed", n);

    writer.print_line(format_args!("QUIT"))?;

    let wire = writer.into_inner().into_inner()?;
    println!("On the wire:");
    println!("---");
    for line in String::from_utf8(wire.clone())?.split_inclusive("\r\n") {
        println!("{:?}", line);
    }
    println!("---");

    assert!(wire.ends_with(b"Bye\r\n.\r\nQUIT\r\n"));
    println!("\nBlock terminated correctly!");

    Ok(())
}
