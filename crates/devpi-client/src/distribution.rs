//! Reading core metadata out of Python distribution archives.
//!
//! Wheels and eggs are zip files carrying `*.dist-info/METADATA` or
//! `EGG-INFO/PKG-INFO`; source distributions are gzipped tarballs with a
//! `PKG-INFO` in their top-level directory. All three use RFC 822 style
//! headers.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};

use crate::error::{DevpiError, Result};

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Wheel,
    Sdist,
    Egg,
}

impl ArchiveKind {
    pub const SUPPORTED: &'static str = ".whl, .tar.gz, .tgz, .egg";

    /// Classify by file name suffix.
    pub fn detect(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".whl") {
            Some(ArchiveKind::Wheel)
        } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Some(ArchiveKind::Sdist)
        } else if file_name.ends_with(".egg") {
            Some(ArchiveKind::Egg)
        } else {
            None
        }
    }
}

/// The subset of core metadata needed for an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreMetadata {
    pub metadata_version: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub summary: Option<String>,
}

impl CoreMetadata {
    /// Parse the header block of a METADATA / PKG-INFO document.
    ///
    /// Parsing stops at the first blank line, where the long description
    /// begins. Folded continuation lines are joined with a single space.
    pub fn parse(text: &str) -> Self {
        let mut meta = CoreMetadata::default();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((key, value)) = current.take() {
                meta.apply(&key, value);
            }
            if let Some((key, value)) = line.split_once(':') {
                current = Some((key.trim().to_string(), value.trim().to_string()));
            }
        }
        if let Some((key, value)) = current {
            meta.apply(&key, value);
        }
        meta
    }

    fn apply(&mut self, key: &str, value: String) {
        let slot = match key.to_ascii_lowercase().as_str() {
            "metadata-version" => &mut self.metadata_version,
            "name" => &mut self.name,
            "version" => &mut self.version,
            "summary" => &mut self.summary,
            _ => return,
        };
        // First occurrence wins; UNKNOWN is what setuptools writes for unset.
        if slot.is_none() && !value.is_empty() && value != "UNKNOWN" {
            *slot = Some(value);
        }
    }
}

/// Lowercase hex SHA-256 of `data`, as devpi expects in `sha256_digest`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// A package file loaded from disk with its metadata.
#[derive(Debug, Clone)]
pub struct Distribution {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: ArchiveKind,
    pub metadata: CoreMetadata,
    pub sha256: String,
    pub bytes: Vec<u8>,
}

impl Distribution {
    /// Load `path`, checking it exists and has a supported suffix.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DevpiError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let kind = ArchiveKind::detect(&file_name).ok_or_else(|| {
            DevpiError::validation(format!(
                "Unsupported package file type: {file_name}. Supported types: {}",
                ArchiveKind::SUPPORTED
            ))
        })?;

        let bytes = fs::read(path)?;
        let metadata = read_metadata(kind, &bytes).map_err(|detail| DevpiError::Package {
            detail: format!("Could not parse package metadata from {file_name}: {detail}"),
        })?;

        Ok(Distribution {
            path: path.to_path_buf(),
            sha256: sha256_hex(&bytes),
            file_name,
            kind,
            metadata,
            bytes,
        })
    }

    /// Name and version, or an error when either is missing.
    pub fn name_and_version(&self) -> Result<(&str, &str)> {
        match (&self.metadata.name, &self.metadata.version) {
            (Some(name), Some(version)) => Ok((name, version)),
            _ => Err(DevpiError::Package {
                detail: "Package metadata is incomplete - missing name or version".to_string(),
            }),
        }
    }
}

fn read_metadata(kind: ArchiveKind, bytes: &[u8]) -> std::result::Result<CoreMetadata, String> {
    let text = match kind {
        ArchiveKind::Wheel => read_zip_member(bytes, |name| {
            let mut parts = name.split('/');
            matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(dir), Some("METADATA"), None) if dir.ends_with(".dist-info")
            )
        })?,
        ArchiveKind::Egg => read_zip_member(bytes, |name| name == "EGG-INFO/PKG-INFO")?,
        ArchiveKind::Sdist => read_sdist_pkg_info(bytes)?,
    };
    Ok(CoreMetadata::parse(&text))
}

fn read_zip_member(
    bytes: &[u8],
    wanted: impl Fn(&str) -> bool,
) -> std::result::Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let member = archive
        .file_names()
        .filter(|name| wanted(name))
        .min_by_key(|name| name.len())
        .map(str::to_string)
        .ok_or_else(|| "no metadata file found in archive".to_string())?;

    let mut file = archive.by_name(&member).map_err(|e| e.to_string())?;
    let mut raw = Vec::new();
    file.read_to_end(&mut raw).map_err(|e| e.to_string())?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

fn read_sdist_pkg_info(bytes: &[u8]) -> std::result::Result<String, String> {
    let mut archive = tar::Archive::new(GzDecoder::new(Cursor::new(bytes)));
    let entries = archive.entries().map_err(|e| e.to_string())?;

    for entry in entries {
        let mut entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path().map_err(|e| e.to_string())?.into_owned();
        let parts: Vec<_> = path
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect();
        if parts.len() == 2 && path.file_name().is_some_and(|n| n == "PKG-INFO") {
            let mut raw = Vec::new();
            entry.read_to_end(&mut raw).map_err(|e| e.to_string())?;
            return Ok(String::from_utf8_lossy(&raw).into_owned());
        }
    }
    Err("no PKG-INFO found in source distribution".to_string())
}
