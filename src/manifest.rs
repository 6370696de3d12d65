// Image manifest generator: scans a directory tree for images and writes one
// JSON line per image, each asking the same prompt about it.

use crate::model::ManifestRecord;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Default manifest file name.
pub const DEFAULT_OUTPUT: &str = "out.jsonl";

/// Extensions that count as images, in matching order. Matching is case
/// sensitive: `a.PNG` is not an image.
pub const IMAGE_EXTENSIONS: [&str; 6] = [".png", ".jpg", ".jpeg", ".gif", ".bmp", ".webp"];

/// Collect image files under `root`, directories top-down. Within one
/// directory, matches are grouped by extension in `IMAGE_EXTENSIONS` order
/// and sorted by name inside each group. Unreadable entries are skipped.
pub fn find_images(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<(PathBuf, Vec<OsString>)> = Vec::new();
    let mut index: HashMap<PathBuf, usize> = HashMap::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_dir() {
            index.insert(entry.path().to_path_buf(), dirs.len());
            dirs.push((entry.path().to_path_buf(), Vec::new()));
            continue;
        }
        // Links to directories are not followed and never count as files.
        if entry.path_is_symlink() && entry.path().is_dir() {
            continue;
        }

        let slot = entry.path().parent().and_then(|p| index.get(p));
        if let Some(&i) = slot {
            dirs[i].1.push(entry.file_name().to_os_string());
        }
    }

    let mut matches = Vec::new();
    for (dir, names) in &dirs {
        for ext in IMAGE_EXTENSIONS {
            for name in names.iter().filter(|n| n.to_string_lossy().ends_with(ext)) {
                matches.push(dir.join(name));
            }
        }
    }
    matches
}

/// `<parent-directory-name>/<filename>`, or just the file name when the
/// parent has no name of its own (e.g. a file directly under `/`).
pub fn format_image_path(image: &Path) -> String {
    let file_name = image
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let parent = image.parent().and_then(|p| match p.components().next_back() {
        Some(Component::Normal(s)) => Some(s.to_string_lossy().into_owned()),
        Some(Component::CurDir) => Some(".".to_string()),
        Some(Component::ParentDir) => Some("..".to_string()),
        _ => None,
    });

    match parent {
        Some(parent) => format!("{}/{}", parent, file_name),
        None => file_name,
    }
}

/// Build the manifest records for `images`, indexed from zero.
pub fn records(images: &[PathBuf], prompt: &str) -> Vec<ManifestRecord> {
    images
        .iter()
        .enumerate()
        .map(|(idx, image)| ManifestRecord::new(idx, prompt, format_image_path(image)))
        .collect()
}

/// Scan `root` and write the manifest to `out`, replacing any previous
/// content. Returns the number of records written.
pub fn write_manifest(root: &Path, prompt: &str, out: &Path) -> Result<usize> {
    let images = find_images(root);
    let file = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let mut writer = BufWriter::new(file);

    let recs = records(&images, prompt);
    for rec in &recs {
        serde_json::to_writer(&mut writer, rec).context("Failed to encode manifest record")?;
        writer.write_all(b"\n").context("Failed to write manifest")?;
    }
    writer.flush().context("Failed to write manifest")?;

    info!(root = %root.display(), out = %out.display(), records = recs.len(), "manifest written");
    Ok(recs.len())
}
