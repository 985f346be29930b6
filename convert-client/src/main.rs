use std::{
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::Context;
use clap::Parser;
use convert_client::{
    BatchController, DirSaver, HttpTransport, ItemStatus, LogObserver, SourceFile,
};

#[derive(Parser, Debug)]
#[command(name = "convert-client", about = "Convert images to JPEG through a lite-convert server")]
struct Args {
    /// Base URL of the conversion server
    #[arg(short, long, default_value = "http://localhost:3000")]
    server: String,

    /// Directory the converted files are written to
    #[arg(short, long, default_value = "converted")]
    out: PathBuf,

    /// Also download every converted image as one ZIP (needs at least two)
    #[arg(short, long)]
    archive: bool,

    /// Image files to convert
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("convert_client", log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

async fn read_source(path: &Path) -> anyhow::Result<SourceFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let metadata = tokio::fs::metadata(path).await?;
    let last_modified_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream");

    Ok(SourceFile::new(name, mime_type, last_modified_ms, bytes))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(read_source(path).await?);
    }

    let saver = DirSaver::new(&args.out)?;
    let mut controller =
        BatchController::with_observer(HttpTransport::new(&args.server), LogObserver);

    let added = controller.add_files(files);
    if added == 0 {
        anyhow::bail!("no image files given");
    }

    controller.convert_all().await;

    for item in controller.batch().iter() {
        match item.status() {
            ItemStatus::Succeeded => {
                let path = controller.save_item(item.id(), &saver)?;
                println!("ok      {} -> {}", item.name(), path.display());
            }
            _ => println!(
                "failed  {} ({})",
                item.name(),
                item.error().unwrap_or("not converted")
            ),
        }
    }

    if args.archive {
        if controller.actions().archive_visible {
            if let Some(path) = controller.download_archive(&saver).await? {
                println!("archive {}", path.display());
            }
        } else {
            println!("archive skipped: fewer than two images converted");
        }
    }

    controller.clear_all();
    Ok(())
}
