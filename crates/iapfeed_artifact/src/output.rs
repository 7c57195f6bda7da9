//! Artifact naming, writing and compression.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use flate2::{Compression, GzBuilder};

use crate::error::ArtifactError;

/// Returns `<prefix>-YYYYMMDD.xml`.
pub fn artifact_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}-{}.xml", date.format("%Y%m%d"))
}

/// Writes the document into `dir` under its dated name.
///
/// The file is written to a temporary sibling and renamed into place, so a
/// reader never sees a partial document.
pub fn write_artifact(
    dir: &Path,
    prefix: &str,
    date: NaiveDate,
    xml: &str,
) -> Result<PathBuf, ArtifactError> {
    fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(artifact_file_name(prefix, date));
    let tmp = path.with_extension("xml.tmp");
    fs::write(&tmp, xml.as_bytes()).map_err(|source| ArtifactError::Io {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| ArtifactError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::info!(path = %path.display(), bytes = xml.len(), "wrote artifact");
    Ok(path)
}

/// Gzip-compresses `xml_path` into `<xml_path>.gz`.
///
/// The gzip header carries no file name and a zero modification time, so
/// the same document always compresses to the same bytes.
pub fn compress(xml_path: &Path) -> Result<PathBuf, ArtifactError> {
    let data = fs::read(xml_path).map_err(|source| ArtifactError::Io {
        path: xml_path.to_path_buf(),
        source,
    })?;
    let mut gz_name = xml_path.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    let io_err = |source| ArtifactError::Io {
        path: gz_path.clone(),
        source,
    };
    let file = fs::File::create(&gz_path).map_err(io_err)?;
    let mut encoder = GzBuilder::new().mtime(0).write(file, Compression::default());
    encoder.write_all(&data).map_err(io_err)?;
    encoder.finish().map_err(io_err)?;
    tracing::debug!(path = %gz_path.display(), "compressed artifact");
    Ok(gz_path)
}
