//! Macro storage - one `.MacroScript` JSON file per macro, plus a cache of
//! the current macro so it survives a restart

use crate::codec::{self, Format, MacroScript};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const EXTENSION: &str = "MacroScript";
pub const CACHE_FILE: &str = "macro_cache.json";

pub struct MacroStorage {
    dir: PathBuf,
}

impl MacroStorage {
    /// `$HOME/.windreplay`
    pub fn new() -> Result<Self> {
        Self::with_dir(default_dir()?)
    }

    pub fn with_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating storage dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Write `script` as `<name>.MacroScript`. Without a name the file is
    /// named after the current time.
    pub fn save(&self, script: &MacroScript, name: Option<&str>) -> Result<PathBuf> {
        let stem = match name.map(sanitize).filter(|s| !s.is_empty()) {
            Some(stem) => stem,
            None => format!("macro_{}", chrono::Local::now().format("%Y%m%d_%H%M%S")),
        };
        let path = self.dir.join(format!("{}.{}", stem, EXTENSION));
        self.write(&path, script)?;
        tracing::info!(path = %path.display(), events = script.events.len(), "macro saved");
        Ok(path)
    }

    /// Load by file name (relative to the storage dir) or by path.
    pub fn load(&self, name: &str) -> Result<MacroScript> {
        let (format, script) = self.load_with_format(name)?;
        if format == Format::Legacy {
            tracing::info!(name, "loaded a legacy macro file");
        }
        Ok(script)
    }

    pub fn load_with_format(&self, name: &str) -> Result<(Format, MacroScript)> {
        let path = self.resolve(name);
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let decoded = codec::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
        Ok(decoded)
    }

    /// Saved macro file names, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(EXTENSION) {
                if let Some(s) = path.file_name().and_then(|n| n.to_str()) {
                    files.push(s.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.resolve(name);
        fs::remove_file(&path).with_context(|| format!("deleting {}", path.display()))?;
        Ok(())
    }

    pub fn save_cache(&self, script: &MacroScript) -> Result<PathBuf> {
        let path = self.cache_path();
        self.write(&path, script)?;
        tracing::debug!(events = script.events.len(), "macro cache updated");
        Ok(path)
    }

    /// The cached macro, or `None` when nothing has been cached yet.
    pub fn load_cache(&self) -> Result<Option<MacroScript>> {
        let path = self.cache_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let (_, script) = codec::decode(&bytes).context("decoding macro cache")?;
        Ok(Some(script))
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(CACHE_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let candidate = Path::new(name);
        if candidate.is_absolute() || candidate.components().count() > 1 {
            candidate.to_path_buf()
        } else {
            self.dir.join(name)
        }
    }

    fn write(&self, path: &Path, script: &MacroScript) -> Result<()> {
        let bytes = script.to_bytes()?;
        fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

pub fn default_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME not set")?;
    Ok(PathBuf::from(home).join(".windreplay"))
}

fn sanitize(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
