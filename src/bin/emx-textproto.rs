//! emx-textproto CLI
//!
//! Dot-encode message bodies for line-oriented protocols.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use emx_textproto::payload::{self, Base64Mode, PayloadConfig};
use emx_textproto::{DotConfig, Writer};
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emx-textproto")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Dot-encoding tool for SMTP/NNTP/POP3 style protocols")]
struct Cli {
    /// Verbose output (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dot-encode each input as one block
    Encode {
        /// Files and directories to encode (default: stdin)
        inputs: Vec<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Do not double leading dots (input is already escaped)
        #[arg(long)]
        no_escape: bool,

        /// Wrap bodies as base64 lines
        #[arg(long, value_enum, default_value_t = Base64Arg::Never)]
        base64: Base64Arg,

        /// Line written before every block, e.g. "DATA"
        #[arg(long)]
        header: Option<String>,
    },

    /// Write a single CRLF-terminated line
    Line {
        /// Words of the line, joined by single spaces
        #[arg(required = true)]
        words: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Base64Arg {
    Never,
    Auto,
    Always,
}

impl From<Base64Arg> for Base64Mode {
    fn from(arg: Base64Arg) -> Self {
        match arg {
            Base64Arg::Never => Base64Mode::Never,
            Base64Arg::Auto => Base64Mode::Auto,
            Base64Arg::Always => Base64Mode::Always,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Encode { inputs, output, no_escape, base64, header } => {
            let config = DotConfig::new().with_escaping(!no_escape);
            encode_inputs(inputs, output, config, base64.into(), header)?;
        }
        Commands::Line { words, output } => {
            write_line(&words.join(" "), output)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "emx_textproto=debug" } else { "emx_textproto=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(io::stderr)
        .init();
}

fn open_output(output: Option<&Path>) -> Result<Writer<BufWriter<Box<dyn Write>>>> {
    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            fs::File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    Ok(Writer::new(BufWriter::new(sink)))
}

fn encode_inputs(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    config: DotConfig,
    mode: Base64Mode,
    header: Option<String>,
) -> Result<()> {
    let mut writer = open_output(output.as_deref())?;

    if inputs.is_empty() {
        let mut body = Vec::new();
        io::stdin().read_to_end(&mut body).context("Failed to read stdin")?;
        return encode_body(&mut writer, "<stdin>", &body, config, mode, header.as_deref());
    }

    let mut blocks = 0;
    for input in &inputs {
        for path in collect_files(input)? {
            let body = fs::read(&path).with_context(|| format!("Failed to read file: {}", path.display()))?;
            encode_body(&mut writer, &path.display().to_string(), &body, config, mode, header.as_deref())?;
            blocks += 1;
        }
    }
    tracing::debug!(blocks, "encoded all inputs");

    Ok(())
}

fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk: {}", input.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn encode_body<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    body: &[u8],
    config: DotConfig,
    mode: Base64Mode,
    header: Option<&str>,
) -> Result<()> {
    if let Some(header) = header {
        writer
            .print_line(format_args!("{}", header))
            .with_context(|| format!("Failed to write header for {}", name))?;
    }

    let (prepared, reason) = payload::prepare(body, mode, &PayloadConfig::default());
    if let Some(reason) = reason {
        tracing::debug!(name, ?reason, "wrapping body as base64");
    }

    let mut block = writer.dot_block(config);
    block
        .write_all(&prepared)
        .with_context(|| format!("Failed to encode {}", name))?;
    block.close().with_context(|| format!("Failed to terminate block for {}", name))?;

    tracing::debug!(name, bytes = body.len(), "encoded block");
    Ok(())
}

fn write_line(line: &str, output: Option<PathBuf>) -> Result<()> {
    let mut writer = open_output(output.as_deref())?;
    writer
        .print_line(format_args!("{}", line))
        .context("Failed to write line")?;
    Ok(())
}
