use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use haneul_vm::{Endian, ParserConfig};
use tracing::info;
use tracing_subscriber::filter::EnvFilter;

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum Format {
    /// One listing per function.
    Disasm,
    /// The whole parsed byte file as RON.
    Ron,
}

#[derive(Parser, Debug)]
#[command(name = "haneul-inspect", version, about = "Inspect Haneul byte files")]
struct Cli {
    /// Byte file to load.
    path: PathBuf,

    /// RON file with parser settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Check that every operand refers to something that exists.
    #[arg(long)]
    verify: bool,

    #[arg(long, value_enum, default_value_t = Format::Disasm)]
    format: Format,

    /// Read multi-byte scalars most significant byte first.
    #[arg(long)]
    big_endian: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config `{}`", path.display()))?;
            ParserConfig::from_ron_str(&text)?
        }
        None => ParserConfig::default(),
    };
    if cli.big_endian {
        config.endian = Endian::Big;
    }

    let mut parser = haneul_vm::Parser::with_config(config);
    parser.load(&cli.path)?;
    parser.parse()?;
    let file = parser.take_result();

    info!(
        path = %cli.path.display(),
        functions = file.info_count(),
        "parsed byte file"
    );

    if cli.verify {
        haneul_vm::verify(&file)?;
        info!("verification passed");
    }

    let output = match cli.format {
        Format::Disasm => {
            let mut out = String::new();
            file.disassemble(&mut out)?;
            out
        }
        Format::Ron => ron::ser::to_string_pretty(&file, ron::ser::PrettyConfig::default())?,
    };
    print!("{output}");

    Ok(())
}
