//! Compressed MusicXML (`.mxl`) unwrapping

use std::io::{Cursor, Read};
use std::path::Path;

use log::debug;
use zip::ZipArchive;

const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a valid MXL archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("container manifest is not valid XML: {0}")]
    Manifest(#[from] roxmltree::Error),

    #[error("MXL archive contains no score file")]
    NoScore,

    #[error("score file {0} is not UTF-8 text")]
    Encoding(String),
}

/// Read a score file, unwrapping it first when it is an `.mxl` archive
pub fn read_score_file(path: &Path, compressed: bool) -> Result<String, ContainerError> {
    let bytes = std::fs::read(path)?;
    if compressed {
        unwrap_mxl(&bytes)
    } else {
        String::from_utf8(bytes).map_err(|_| ContainerError::Encoding(path.display().to_string()))
    }
}

/// Extract the root score from an MXL archive.
///
/// Follows the first `rootfile` named by `META-INF/container.xml`; archives
/// without a manifest fall back to the first `.musicxml`/`.xml` entry
/// outside `META-INF/`.
pub fn unwrap_mxl(bytes: &[u8]) -> Result<String, ContainerError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let rootfile = match read_entry(&mut archive, CONTAINER_PATH) {
        Ok(manifest) => rootfile_from_manifest(&manifest)?,
        Err(ContainerError::Zip(zip::result::ZipError::FileNotFound)) => None,
        Err(e) => return Err(e),
    };

    let name = match rootfile {
        Some(name) => name,
        None => first_score_entry(&archive).ok_or(ContainerError::NoScore)?,
    };
    debug!("Unwrapping MXL rootfile {name}");

    match read_entry(&mut archive, &name) {
        Err(ContainerError::Zip(zip::result::ZipError::FileNotFound)) => {
            Err(ContainerError::NoScore)
        }
        other => other,
    }
}

fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<String, ContainerError> {
    let mut entry = archive.by_name(name)?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    String::from_utf8(buf).map_err(|_| ContainerError::Encoding(name.to_string()))
}

fn rootfile_from_manifest(manifest: &str) -> Result<Option<String>, ContainerError> {
    let doc = roxmltree::Document::parse(manifest)?;
    Ok(doc
        .descendants()
        .filter(|node| node.tag_name().name() == "rootfile")
        .find_map(|node| node.attribute("full-path"))
        .map(str::to_string))
}

fn first_score_entry(archive: &ZipArchive<Cursor<&[u8]>>) -> Option<String> {
    let mut names: Vec<&str> = archive
        .file_names()
        .filter(|name| !name.starts_with("META-INF/"))
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            lower.ends_with(".musicxml") || lower.ends_with(".xml")
        })
        .collect();
    names.sort_unstable();
    names.first().map(|name| (*name).to_string())
}
