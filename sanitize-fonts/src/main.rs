//! binary sanitizer tool
//!
//! Takes a font file or font collection, validates each table it knows how
//! to sanitize, and writes a new font file built from the validated tables.
//!

use clap::Parser;
use sanitize_fonts::{parse_tag_list, sanitize_font, Options, SanitizeFlags};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The input font file.
    #[arg(short, long)]
    path: std::path::PathBuf,

    /// The output font file
    #[arg(short, long)]
    output_file: std::path::PathBuf,

    /// List of tables to remove before sanitizing
    #[arg(long)]
    drop_tables: Option<String>,

    /// Drop a table that fails to sanitize instead of rejecting the font
    #[arg(long)]
    drop_errored_tables: bool,

    /// Do not drop tables that the tool does not know how to sanitize
    #[arg(long)]
    passthrough_tables: bool,

    /// The largest table that may be written, in bytes
    #[arg(long)]
    max_table_size: Option<usize>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let drop_tables = match parse_tag_list(args.drop_tables.as_deref().unwrap_or_default()) {
        Ok(tags) => tags,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let mut options = Options {
        flags: parse_sanitize_flags(&args),
        drop_tables,
        ..Default::default()
    };
    if let Some(max_table_size) = args.max_table_size {
        options.max_table_size = max_table_size;
    }

    let font_bytes = match std::fs::read(&args.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", args.path.display());
            std::process::exit(1);
        }
    };

    let output_bytes = match sanitize_font(&font_bytes, &options) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::write(&args.output_file, output_bytes) {
        eprintln!("Failed to write {}: {e}", args.output_file.display());
        std::process::exit(1);
    }
}

fn parse_sanitize_flags(args: &Args) -> SanitizeFlags {
    let mut flags = SanitizeFlags::default();
    if args.drop_errored_tables {
        flags |= SanitizeFlags::SANITIZE_FLAGS_DROP_ERRORED_TABLES;
    }

    if args.passthrough_tables {
        flags |= SanitizeFlags::SANITIZE_FLAGS_PASSTHROUGH_UNRECOGNIZED;
    }
    flags
}
