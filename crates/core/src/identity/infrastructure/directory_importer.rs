use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::domain::identity_repository::StoreError;
use crate::identity::domain::identity_store::{IdentityStore, RegisterError};
use crate::video::infrastructure::image_file_source::is_image_file;

/// Outcome of a bulk import, one entry per image file considered.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub registered: Vec<String>,
    /// Name and reason for persons refused by the store.
    pub skipped: Vec<(String, String)>,
    /// Files that could not be decoded.
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Registers every image in `dir`, naming each person after the file stem.
///
/// Refused registrations (taken name, near-duplicate face) are reported and
/// skipped; only a persistence failure aborts the import.
pub fn import_directory(store: &IdentityStore, dir: &Path) -> Result<ImportReport, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    paths.sort();

    let mut report = ImportReport::default();
    for path in paths {
        let Some(name) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(person_name_from_stem)
        else {
            continue;
        };
        let image = match image::open(&path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                log::warn!("Skipping unreadable image {}: {e}", path.display());
                report.unreadable.push((path, e.to_string()));
                continue;
            }
        };
        match store.register(&name, &image) {
            Ok(id) => {
                log::info!("Imported {name:?} from {} as {id}", path.display());
                report.registered.push(name);
            }
            Err(RegisterError::Store(e)) => return Err(e),
            Err(e) => {
                log::info!("Skipped {name:?}: {e}");
                report.skipped.push((name, e.to_string()));
            }
        }
    }
    Ok(report)
}

/// `"juan_perez"` → `"Juan Perez"`.
pub fn person_name_from_stem(stem: &str) -> String {
    stem.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
