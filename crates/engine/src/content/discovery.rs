use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::AppPaths;

use super::types::{ContentDiscoveryError, ContentRequest};

#[derive(Debug, Clone)]
pub(crate) struct ModSource {
    pub mod_id: String,
    pub mod_load_index: u32,
    pub source_dir: PathBuf,
}

/// XML file found under a mod directory, with its `/`-joined relative path.
#[derive(Debug, Clone)]
pub(crate) struct XmlFile {
    pub rel_path: String,
    pub path: PathBuf,
}

pub(crate) fn discover_mod_sources(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<Vec<ModSource>, ContentDiscoveryError> {
    let mut seen = HashSet::<String>::new();
    let mut sources = vec![ModSource {
        mod_id: "base".to_string(),
        mod_load_index: 0,
        source_dir: app_paths.base_content_dir.clone(),
    }];

    for (idx, mod_id) in request.enabled_mods.iter().enumerate() {
        let trimmed = mod_id.trim();
        if trimmed.is_empty() {
            return Err(ContentDiscoveryError::EmptyEnabledMod);
        }
        if trimmed == "base" || !seen.insert(trimmed.to_string()) {
            return Err(ContentDiscoveryError::DuplicateEnabledMod {
                mod_id: trimmed.to_string(),
            });
        }
        let mod_dir = app_paths.mods_dir.join(trimmed);
        ensure_dir_exists(trimmed, &mod_dir)?;
        sources.push(ModSource {
            mod_id: trimmed.to_string(),
            mod_load_index: (idx + 1) as u32,
            source_dir: mod_dir,
        });
    }

    Ok(sources)
}

/// Every `.xml` file under `root`, sorted by relative path so load order
/// does not depend on the filesystem.
pub(crate) fn collect_xml_files(root: &Path) -> Result<Vec<XmlFile>, ContentDiscoveryError> {
    let mut files = Vec::<XmlFile>::new();
    collect_recursive(root, root, &mut files)?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn collect_recursive(
    root: &Path,
    current: &Path,
    files: &mut Vec<XmlFile>,
) -> Result<(), ContentDiscoveryError> {
    let entries = fs::read_dir(current).map_err(|source| ContentDiscoveryError::ReadDir {
        path: current.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| ContentDiscoveryError::ReadDirEntry {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(root, &path, files)?;
            continue;
        }
        if !is_xml_file(&path) {
            continue;
        }
        let rel_path = normalize_rel_path(path.strip_prefix(root).unwrap_or(&path));
        files.push(XmlFile { rel_path, path });
    }
    Ok(())
}

fn is_xml_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn ensure_dir_exists(mod_id: &str, path: &Path) -> Result<(), ContentDiscoveryError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ContentDiscoveryError::EnabledModMissing {
            mod_id: mod_id.to_string(),
            expected_dir: path.to_path_buf(),
        })
    }
}
