//! Downloading scans and thumbnails to JPEG files
//!
//! Files are named after the scan and written to `--output-dir`.

use crate::{Cli, OutputFormat};
use anyhow::{Context, Result};
use doxie_core::DeviceSession;
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};

pub async fn get_scan(cli: &Cli, scanner: &DeviceSession, name: &str) -> Result<()> {
    let img = scanner.scan(name).await?;
    let path = save_image(&img, &cli.output_dir, name)?;
    report(cli, "scan", name, &path);
    Ok(())
}

pub async fn get_thumbnail(cli: &Cli, scanner: &DeviceSession, name: &str) -> Result<()> {
    let img = scanner.thumbnail(name).await?;
    let path = save_image(&img, &cli.output_dir, name)?;
    report(cli, "thumbnail", name, &path);
    Ok(())
}

/// Download every scan on the scanner. A failed download aborts; a failed
/// save is reported and the remaining scans are still fetched.
pub async fn get_scans(cli: &Cli, scanner: &DeviceSession) -> Result<()> {
    let items = scanner.scans().await?;
    tracing::info!("Downloading {} scans to {}", items.len(), cli.output_dir.display());

    let mut failed = 0;
    for item in &items {
        let img = scanner.scan(&item.name).await?;
        match save_image(&img, &cli.output_dir, &item.name) {
            Ok(path) => report(cli, "scan", &item.name, &path),
            Err(e) => {
                failed += 1;
                eprintln!("error saving scan {}: {:#}", item.name, e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} scans could not be saved", failed, items.len());
    }
    Ok(())
}

/// Write `img` as a JPEG named after the scan.
fn save_image(img: &DynamicImage, dir: &Path, name: &str) -> Result<PathBuf> {
    let path = output_path(dir, name);
    img.save_with_format(&path, ImageFormat::Jpeg)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!("Saved {}", path.display());
    Ok(path)
}

/// Only the file name part of `name` is used, so a scan name can never
/// point outside the output directory.
fn output_path(dir: &Path, name: &str) -> PathBuf {
    let file = Path::new(name)
        .file_name()
        .map(|f| f.to_os_string())
        .unwrap_or_else(|| "scan.jpg".into());
    dir.join(file)
}

fn report(cli: &Cli, kind: &str, name: &str, path: &Path) {
    match cli.format {
        OutputFormat::Text => println!("downloaded {} {}", kind, name),
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "downloaded": kind,
                "name": name,
                "path": path.display().to_string(),
            })
        ),
    }
}
