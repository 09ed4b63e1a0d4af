use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::AppPaths;

use super::compiler::{read_error, ContentCompileError, ContentCompiler};
use super::database::ContentDatabase;
use super::discovery::{collect_xml_files, discover_mod_sources};
use super::hashing::ContentHasher;
use super::types::{ContentDiscoveryError, ContentRequest};

#[derive(Debug, Error)]
pub enum ContentPipelineError {
    #[error(transparent)]
    Discovery(#[from] ContentDiscoveryError),
    #[error(transparent)]
    Compile(#[from] ContentCompileError),
}

/// Loads `assets/base` and every enabled mod, in order, into one database.
pub fn load_content_database(
    app_paths: &AppPaths,
    request: &ContentRequest,
) -> Result<ContentDatabase, ContentPipelineError> {
    let sources = discover_mod_sources(app_paths, request)?;
    let mut compiler = ContentCompiler::new();
    let mut hasher = ContentHasher::new();

    for source in &sources {
        let files = collect_xml_files(&source.source_dir)?;
        hasher.add_mod(&source.mod_id);
        let mut defs = 0usize;
        for file in &files {
            let bytes = fs::read(&file.path)
                .map_err(|error| read_error(&source.mod_id, file.path.clone(), error))?;
            hasher.add_file(&file.rel_path, &bytes);
            let raw = String::from_utf8_lossy(&bytes);
            defs += compiler.add_document(&source.mod_id, &file.path, &raw)?;
        }
        info!(
            mod_id = %source.mod_id,
            mod_load_index = source.mod_load_index,
            source_dir = %source.source_dir.display(),
            xml_file_count = files.len(),
            defs,
            "content_mod_loaded"
        );
    }

    let database = compiler.finish(hasher.finish())?;
    info!(
        total_mods = sources.len(),
        characters = database.characters.len(),
        templates = database.templates.len(),
        lessons = database.lessons.len(),
        fingerprint = %database.fingerprint,
        "content_pipeline_summary"
    );
    Ok(database)
}

/// Compiles a single in-memory document as the base mod.
pub fn compile_content_from_str(raw: &str) -> Result<ContentDatabase, ContentCompileError> {
    let mut compiler = ContentCompiler::new();
    let mut hasher = ContentHasher::new();
    hasher.add_mod("base");
    hasher.add_file("<memory>", raw.as_bytes());
    compiler.add_document("base", Path::new("<memory>"), raw)?;
    compiler.finish(hasher.finish())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::content::ContentErrorCode;
    use crate::world::Location;

    fn setup_app_paths(root: &Path) -> AppPaths {
        let base = root.join("assets").join("base");
        let mods = root.join("mods");
        fs::create_dir_all(&base).expect("base");
        fs::create_dir_all(&mods).expect("mods");
        AppPaths {
            root: root.to_path_buf(),
            base_content_dir: base,
            mods_dir: mods,
        }
    }

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, content).expect("write");
    }

    fn shipped_assets() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("base")
    }

    #[test]
    fn base_then_mod_overrides_and_fingerprint_tracks_inputs() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(
            &app.base_content_dir.join("map.xml"),
            r#"<Defs><Floor id="Bottom" y="10" minX="0" maxX="40"/><Location id="Desk" at="5,10"/></Defs>"#,
        );
        write_file(
            &app.base_content_dir.join("people").join("pupils.xml"),
            r#"<Defs><Character id="EINSTEIN" kind="Pupil" at="12,10"/></Defs>"#,
        );
        write_file(
            &app.mods_dir.join("moved").join("desk.xml"),
            r#"<Defs><Location id="Desk" at="9,10"/></Defs>"#,
        );

        let base_only = load_content_database(&app, &ContentRequest::default()).expect("base");
        assert_eq!(base_only.map.location("Desk"), Some(Location::new(5, 10)));
        assert_eq!(base_only.characters.len(), 1);

        let request = ContentRequest {
            enabled_mods: vec!["moved".to_string()],
        };
        let modded = load_content_database(&app, &request).expect("modded");
        assert_eq!(modded.map.location("Desk"), Some(Location::new(9, 10)));
        assert_ne!(base_only.fingerprint, modded.fingerprint);

        let again = load_content_database(&app, &request).expect("again");
        assert_eq!(modded.fingerprint, again.fingerprint);
    }

    #[test]
    fn compile_errors_carry_the_mod_and_file() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        write_file(&app.base_content_dir.join("map.xml"), "<Defs/>");
        write_file(
            &app.mods_dir.join("broken").join("scripts.xml"),
            r#"<Defs><CommandList id="X"><Command kind="Moonwalk"/></CommandList></Defs>"#,
        );

        let err = load_content_database(
            &app,
            &ContentRequest {
                enabled_mods: vec!["broken".to_string()],
            },
        )
        .expect_err("error");
        match err {
            ContentPipelineError::Compile(err) => {
                assert_eq!(err.code, ContentErrorCode::UnknownCommandKind);
                assert_eq!(err.mod_id, "broken");
                assert!(err
                    .file_path
                    .ends_with(Path::new("broken").join("scripts.xml")));
            }
            other => panic!("expected a compile error, got {other}"),
        }
    }

    #[test]
    fn missing_mod_is_a_discovery_error() {
        let temp = TempDir::new().expect("temp");
        let app = setup_app_paths(temp.path());
        let err = load_content_database(
            &app,
            &ContentRequest {
                enabled_mods: vec!["ghost".to_string()],
            },
        )
        .expect_err("error");
        assert!(matches!(
            err,
            ContentPipelineError::Discovery(ContentDiscoveryError::EnabledModMissing { .. })
        ));
    }

    #[test]
    fn shipped_base_content_compiles() {
        let temp = TempDir::new().expect("temp");
        let app = AppPaths {
            root: temp.path().to_path_buf(),
            base_content_dir: shipped_assets(),
            mods_dir: temp.path().join("mods"),
        };
        let db = load_content_database(&app, &ContentRequest::default()).expect("compile");
        assert!(db.character("WACKER").is_some());
        assert!(db.character("ERIC").is_some());
        assert!(!db.lessons.is_empty());
        for def in &db.characters {
            if let Some(template) = &def.default_template {
                assert!(db.templates.contains(template), "{template}");
            }
        }
    }

    #[test]
    fn in_memory_document_compiles() {
        let db = compile_content_from_str(
            r#"<Defs><CommandList id="Idle"><Command kind="SitStill"/></CommandList></Defs>"#,
        )
        .expect("compile");
        assert!(db.templates.contains("Idle"));
        assert_eq!(db.fingerprint.len(), 64);
    }
}
