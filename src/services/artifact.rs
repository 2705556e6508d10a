use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::{domain::bank::RunDocument, errors::ArtifactError};

const MARKER_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Writes the run document next to its final path and renames it into place, so a reader
/// never sees a half written artifact.
pub fn write(document: &RunDocument, path: &Path) -> Result<(), ArtifactError> {
    let io_error = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    document
        .serialize(&mut serializer)
        .map_err(ArtifactError::Encode)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    if path.exists() {
        log::warn!(
            "Overwriting pending artifact {} that was never loaded",
            path.display()
        );
    }

    let partial = path.with_extension("json.partial");
    fs::write(&partial, &buf).map_err(io_error)?;
    fs::rename(&partial, path).map_err(io_error)?;

    log::info!(
        "Wrote {} banks / {} reviews to {}",
        document.banks.len(),
        document.review_count(),
        path.display()
    );
    Ok(())
}

pub fn read(path: &Path) -> Result<RunDocument, ArtifactError> {
    let content = fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&content).map_err(|source| ArtifactError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/<stem>.json` becomes `<dir>/<stem>_<YYYYMMDD_HHMMSS>.json`.
pub fn completed_path(path: &Path, at: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}_{}.json", stem, at.format(MARKER_FORMAT)))
}

/// Renames the artifact to its completed name. This is the only record that it was loaded.
/// An earlier marker with the same timestamp is kept; this one gets a `_<n>` suffix.
pub fn mark_completed(path: &Path, at: NaiveDateTime) -> io::Result<PathBuf> {
    let first = completed_path(path, at);
    let stem = first
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut target = first;
    let mut suffix = 1;
    while target.exists() {
        target = path.with_file_name(format!("{}_{}.json", stem, suffix));
        suffix += 1;
    }
    fs::rename(path, &target)?;
    Ok(target)
}
