//! Command-line front end for the `kxr` container format.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use kxr::{
    default_pack_output, default_unpack_output, Error, KxrContainer, PackProgress, Packer,
    ResourceTree, UnpackProgress, Unpacker,
};

#[derive(Parser)]
#[command(name = "kxr", author, version, about = "Pack and unpack .kxr binary container archives")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack a directory into a .kxr container
    Pack {
        source_dir: PathBuf,
        /// Destination .kxr path (default: `<parent>/<source_dir_name>.kxr`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Unpack a .kxr container into a directory
    Unpack {
        source_kxr: PathBuf,
        /// Destination directory (default: `<parent>/<matched_name>`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let _ = std::fs::create_dir_all("logs");
    let file_appender = tracing_appender::rolling::daily("logs", "kxr.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    guard
}

/// Asks the user whether to overwrite an existing path, per spec §7's
/// user-visible pack-refusal flow. Defaults to "no" on empty input.
fn confirm_overwrite(path: &std::path::Path) -> io::Result<bool> {
    print!("{} already exists. Overwrite? [y/N] ", path.display());
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{prefix:>10.cyan.bold} [{bar:40}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    bar
}

fn run_pack(source_dir: PathBuf, output: Option<PathBuf>) -> kxr::Result<()> {
    let output = output.unwrap_or_else(|| default_pack_output(&source_dir));

    if output.exists() {
        if confirm_overwrite(&output).map_err(Error::Io)? {
            std::fs::remove_file(&output)?;
        } else {
            info!(path = %output.display(), "pack skipped, output left in place");
            return Ok(());
        }
    }

    let preview = ResourceTree::from_dir(&source_dir)?.summary();
    println!(
        "{} folders, {} files ({} will be compressed)",
        preview.folders, preview.files, preview.zipped_files
    );

    let bar = progress_bar();
    bar.set_prefix("pack");
    let bar_handle = bar.clone();
    let mut packer = Packer::new().with_progress(move |p: PackProgress| {
        bar_handle.set_length(p.total as u64);
        bar_handle.set_position(p.current as u64);
        bar_handle.set_message(p.name);
    });

    let started = std::time::Instant::now();
    info!(source = %source_dir.display(), output = %output.display(), "packing");
    packer.pack(&source_dir, &output)?;
    bar.finish_with_message("done");
    info!(elapsed = ?started.elapsed(), "pack complete");
    println!("packed {} -> {}", source_dir.display(), output.display());
    Ok(())
}

fn run_unpack(source_kxr: PathBuf, output: Option<PathBuf>) -> kxr::Result<()> {
    if !source_kxr.exists() {
        return Err(Error::SourceNotFound(source_kxr));
    }
    let output = match output {
        Some(output) => output,
        None => default_unpack_output(&source_kxr)?,
    };

    let container = KxrContainer::open(&source_kxr)?;
    let preview = container.root().summary();
    println!(
        "{} folders, {} files ({} are compressed)",
        preview.folders, preview.files, preview.zipped_files
    );

    let bar = progress_bar();
    bar.set_prefix("unpack");
    let bar_handle = bar.clone();
    let mut unpacker = Unpacker::new().with_progress(move |p: UnpackProgress| {
        bar_handle.set_length(p.total as u64);
        bar_handle.set_position(p.current as u64);
        bar_handle.set_message(p.name);
    });

    let started = std::time::Instant::now();
    info!(source = %source_kxr.display(), output = %output.display(), "unpacking");
    unpacker.unpack(&container, &output)?;
    bar.finish_with_message("done");
    info!(elapsed = ?started.elapsed(), "unpack complete");
    println!("unpacked {} -> {}", source_kxr.display(), output.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging();

    let result = match cli.command {
        Command::Pack { source_dir, output } => run_pack(source_dir, output),
        Command::Unpack { source_kxr, output } => run_unpack(source_kxr, output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
