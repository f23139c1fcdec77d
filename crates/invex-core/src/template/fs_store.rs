//! Template store backed by a directory of JSON files.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{SnapshotCell, TemplateSet, TemplateStore};
use crate::error::TemplateError;
use crate::models::Template;

/// Loads every `*.json` file of a directory as one template.
///
/// Files are read in file-name order, which is the store order used for
/// matching. A file that does not parse is logged and skipped; when two
/// files declare the same template name the first one wins.
#[derive(Debug)]
pub struct FileSystemTemplateStore {
    dir: PathBuf,
    read_only: bool,
    current: SnapshotCell,
}

impl FileSystemTemplateStore {
    /// Open a writable store and load its templates.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        Self::with_options(dir, false)
    }

    /// Open a store that refuses `save` and `delete`.
    pub fn open_read_only(dir: impl Into<PathBuf>) -> Result<Self, TemplateError> {
        Self::with_options(dir, true)
    }

    pub fn with_options(dir: impl Into<PathBuf>, read_only: bool) -> Result<Self, TemplateError> {
        let dir = dir.into();
        let set = load_dir(&dir)?;
        Ok(Self {
            dir,
            read_only,
            current: SnapshotCell::new(set),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Path a template with this name is saved to.
    pub fn path_for(&self, template_name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_stem(template_name)))
    }

    fn ensure_writable(&self, action: &str, name: &str) -> Result<(), TemplateError> {
        if self.read_only {
            error!("Template store {} is read-only, cannot {} '{}'", self.dir.display(), action, name);
            return Err(TemplateError::ReadOnly);
        }
        Ok(())
    }
}

impl TemplateStore for FileSystemTemplateStore {
    fn snapshot(&self) -> Arc<TemplateSet> {
        self.current.load()
    }

    fn save(&self, template: Template) -> Result<(), TemplateError> {
        self.ensure_writable("save", &template.template_name)?;
        if template.template_name.trim().is_empty() {
            return Err(TemplateError::BlankName);
        }

        // Overwrite the file the template was loaded from, whatever its name.
        let path = match backing_files(&self.dir, &template.template_name)?.into_iter().next() {
            Some(existing) => existing,
            None => self.path_for(&template.template_name),
        };
        let json = serde_json::to_string_pretty(&template).map_err(|source| TemplateError::Json {
            path: path.display().to_string(),
            source,
        })?;
        fs::create_dir_all(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        fs::write(&path, json).map_err(|source| io_error(&path, source))?;
        info!("Saved template '{}' -> {}", template.template_name, path.display());

        self.reload()
    }

    fn delete(&self, name: &str) -> Result<bool, TemplateError> {
        self.ensure_writable("delete", name)?;
        if self.snapshot().get(name).is_none() {
            return Ok(false);
        }

        // Shadowed duplicates go too, or the next reload would revive one.
        for path in backing_files(&self.dir, name)? {
            fs::remove_file(&path).map_err(|source| io_error(&path, source))?;
            info!("Deleted template file {}", path.display());
        }

        self.reload()?;
        Ok(true)
    }

    fn reload(&self) -> Result<(), TemplateError> {
        let set = load_dir(&self.dir)?;
        self.current.publish(set);
        Ok(())
    }
}

/// Replace every character outside ASCII alphanumerics, CJK ideographs and
/// `-` with `-`.
pub fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || ('\u{4e00}'..='\u{9fa5}').contains(&c) {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn load_dir(dir: &Path) -> Result<TemplateSet, TemplateError> {
    if !dir.exists() {
        warn!("Template directory does not exist: {}", dir.display());
        return Ok(TemplateSet::default());
    }

    let mut seen = HashSet::new();
    let mut templates = Vec::new();

    for path in json_files(dir)? {
        match read_template(&path) {
            Ok(template) => {
                if !seen.insert(template.template_name.clone()) {
                    warn!(
                        "Duplicate template name '{}' in {}, keeping the first",
                        template.template_name,
                        path.display()
                    );
                    continue;
                }
                debug!("Loaded template '{}' from {}", template.template_name, path.display());
                templates.push(template);
            }
            Err(e) => error!("Failed to load template file: {}", e),
        }
    }

    info!("Loaded {} templates from {}", templates.len(), dir.display());
    Ok(TemplateSet::new(templates))
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, TemplateError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(io_error(dir, source)),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|source| io_error(dir, source))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Files declaring the template `name`, in load order.
fn backing_files(dir: &Path, name: &str) -> Result<Vec<PathBuf>, TemplateError> {
    let mut files = Vec::new();
    for path in json_files(dir)? {
        match read_template(&path) {
            Ok(template) if template.template_name == name => files.push(path),
            Ok(_) => {}
            Err(e) => debug!("Skipping unreadable template file: {}", e),
        }
    }
    Ok(files)
}

fn read_template(path: &Path) -> Result<Template, TemplateError> {
    let content = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    serde_json::from_str(&content).map_err(|source| TemplateError::Json {
        path: path.display().to_string(),
        source,
    })
}

fn io_error(path: &Path, source: io::Error) -> TemplateError {
    TemplateError::Io {
        path: path.display().to_string(),
        source,
    }
}
