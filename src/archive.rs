//! Zip archives exchanged with the Metadata API.
//!
//! Retrieved archives put unpackaged components under `unpackaged/` and
//! each named package under its own folder. Extraction maps `unpackaged/`
//! to `src/` and everything else to `packages/`. A single-package archive,
//! with `package.xml` at its root, goes entirely to `src/`.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, ErrorKind, Result};

const UNPACKAGED_DIR: &str = "unpackaged";
const SOURCE_DIR: &str = "src";
const PACKAGES_DIR: &str = "packages";

/// Decode a base64 archive and extract it under `extract_to`.
///
/// Returns the written files in archive order. With `ignore_package_xml`
/// the retrieved `package.xml` manifest is skipped.
pub fn extract_encoded(
    encoded: &str,
    extract_to: &Path,
    ignore_package_xml: bool,
) -> Result<Vec<PathBuf>> {
    let bytes = general_purpose::STANDARD.decode(encoded.trim())?;
    extract(&bytes, extract_to, ignore_package_xml)
}

/// Extract raw archive bytes under `extract_to`.
pub fn extract(bytes: &[u8], extract_to: &Path, ignore_package_xml: bool) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut written = Vec::with_capacity(archive.len());
    let single_package = archive.file_names().any(|name| name == "package.xml");
    let manifest = if single_package {
        PathBuf::from("package.xml")
    } else {
        Path::new(UNPACKAGED_DIR).join("package.xml")
    };

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry
            .enclosed_name()
            .ok_or_else(|| Error::new(ErrorKind::UnsafePath(entry.name().to_string())))?;

        if ignore_package_xml && name == manifest {
            continue;
        }

        let relative = if single_package {
            Path::new(SOURCE_DIR).join(&name)
        } else {
            local_path(&name)
        };
        let target = extract_to.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut file)?;
        debug!(path = %target.display(), "Extracted");
        written.push(target);
    }

    info!(files = written.len(), dir = %extract_to.display(), "Archive extracted");
    Ok(written)
}

/// Where an archive entry lands relative to the extraction directory.
fn local_path(name: &Path) -> PathBuf {
    match name.strip_prefix(UNPACKAGED_DIR) {
        Ok(rest) => Path::new(SOURCE_DIR).join(rest),
        Err(_) => Path::new(PACKAGES_DIR).join(name),
    }
}

/// Zip every file under `dir`, named relative to it.
///
/// Entries are sorted so the same tree always gives the same archive
/// layout. Hidden files and directories are skipped.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for relative in &files {
        zip.start_file(entry_name(relative), options)?;
        zip.write_all(&fs::read(dir.join(relative))?)?;
    }
    let cursor = zip.finish()?;

    info!(files = files.len(), dir = %dir.display(), "Directory packed");
    Ok(cursor.into_inner())
}

/// [`pack_directory`], base64 encoded for a `deploy` call.
pub fn pack_directory_base64(dir: &Path) -> Result<String> {
    Ok(general_purpose::STANDARD.encode(pack_directory(dir)?))
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    Ok(())
}

/// Archive names always use `/`.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
