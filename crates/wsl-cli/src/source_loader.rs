use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use wsl_core::{ScriptError, ScriptProgram};
use wsl_parser::parse_script;

use crate::{map_cli_source_read, map_cli_source_scan};

pub(crate) const SCRIPT_EXTENSIONS: &[&str] = &["wsl", "cmd"];

#[derive(Debug, Clone)]
pub(crate) struct LoadedScript {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) program: ScriptProgram,
}

/// Finds a script by path, or by name with one of the script extensions
/// appended. Relative names are tried against `base` first.
pub(crate) fn resolve_script_path(script: &str, base: Option<&Path>) -> Result<PathBuf, ScriptError> {
    let requested = PathBuf::from(script);
    let mut candidates = Vec::new();
    if let Some(base) = base.filter(|_| requested.is_relative()) {
        candidates.push(base.join(&requested));
    }
    candidates.push(requested);

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(candidate);
        }
        if candidate.extension().is_some() {
            continue;
        }
        if let Some(found) = SCRIPT_EXTENSIONS
            .iter()
            .map(|extension| candidate.with_extension(extension))
            .find(|path| path.is_file())
        {
            return Ok(found);
        }
    }

    Err(ScriptError::new(
        "CLI_SOURCE_NOT_FOUND",
        format!("Script does not exist: {}", script),
    ))
}

pub(crate) fn script_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "script".to_string())
}

pub(crate) fn load_script(path: &Path) -> Result<LoadedScript, ScriptError> {
    let source = fs::read_to_string(path).map_err(map_cli_source_read)?;
    Ok(LoadedScript {
        name: script_name(path),
        path: path.to_path_buf(),
        program: parse_script(&source),
    })
}

pub(crate) fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            SCRIPT_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
}

/// A single file, or every script file below a directory, sorted.
pub(crate) fn collect_script_files(root: &Path) -> Result<Vec<PathBuf>, ScriptError> {
    if !root.exists() {
        return Err(ScriptError::new(
            "CLI_SOURCE_NOT_FOUND",
            format!("Path does not exist: {}", root.display()),
        ));
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(map_cli_source_scan)?;
        if entry.file_type().is_file() && is_script_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ScriptError::new(
            "CLI_SOURCE_EMPTY",
            format!("No .wsl/.cmd files under {}", root.display()),
        ));
    }
    Ok(files)
}
