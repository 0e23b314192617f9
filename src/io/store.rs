//! Model persistence.
//!
//! A stored model is the opaque `SiteModel` bundle (fitted parameters plus CV
//! metrics). `JsonModelStore` keeps one `<prefix>_<site>.json` per site; floats
//! are written with enough precision to reload bit-identically, and writes go
//! through a temporary file plus rename so readers never see a partial file.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::info;

use crate::domain::SiteId;
use crate::error::{ForecastError, Result};
use crate::models::{MODEL_SCHEMA_VERSION, SiteModel};

pub trait ModelStore: Send + Sync {
    fn save(&self, model: &SiteModel) -> Result<()>;

    /// The stored model for `site_id`, or `None` if there is none.
    fn load(&self, site_id: &str) -> Result<Option<SiteModel>>;

    fn list(&self) -> Result<Vec<SiteId>>;
}

#[derive(Debug, Clone)]
pub struct JsonModelStore {
    dir: PathBuf,
    prefix: String,
}

impl JsonModelStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn path_for(&self, site_id: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", self.prefix, sanitize(site_id)))
    }
}

impl ModelStore for JsonModelStore {
    fn save(&self, model: &SiteModel) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(model.site_id());
        let tmp = path.with_extension("json.tmp");

        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, model)
                .map_err(|e| ForecastError::Store(format!("failed to serialize model: {e}")))?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)?;

        info!(site = model.site_id(), path = %path.display(), "saved model");
        Ok(())
    }

    fn load(&self, site_id: &str) -> Result<Option<SiteModel>> {
        let path = self.path_for(site_id);
        if !path.exists() {
            return Ok(None);
        }
        let model = read_model(&path)?;
        if model.site_id() != site_id {
            return Err(ForecastError::Store(format!(
                "'{}' holds a model for site '{}', expected '{site_id}'",
                path.display(),
                model.site_id()
            )));
        }
        info!(site = site_id, path = %path.display(), "loaded model");
        Ok(Some(model))
    }

    fn list(&self) -> Result<Vec<SiteId>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let head = format!("{}_", self.prefix);
        let mut out: Vec<SiteId> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let site = name.strip_prefix(&head)?.strip_suffix(".json")?;
                Some(site.to_string())
            })
            .collect();
        out.sort();
        Ok(out)
    }
}

fn read_model(path: &Path) -> Result<SiteModel> {
    let reader = BufReader::new(File::open(path)?);
    let model: SiteModel = serde_json::from_reader(reader)
        .map_err(|e| ForecastError::Store(format!("invalid model file '{}': {e}", path.display())))?;
    if model.model.schema_version != MODEL_SCHEMA_VERSION {
        return Err(ForecastError::Store(format!(
            "'{}' has schema version {}, expected {MODEL_SCHEMA_VERSION}",
            path.display(),
            model.model.schema_version
        )));
    }
    Ok(model)
}

/// Keep file names portable.
fn sanitize(site_id: &str) -> String {
    site_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// In-process store (tests, one-shot CLI runs).
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    models: RwLock<HashMap<SiteId, SiteModel>>,
}

impl MemoryModelStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelStore for MemoryModelStore {
    fn save(&self, model: &SiteModel) -> Result<()> {
        let mut guard = self.models.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(model.site_id().to_string(), model.clone());
        Ok(())
    }

    fn load(&self, site_id: &str) -> Result<Option<SiteModel>> {
        let guard = self.models.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(site_id).cloned())
    }

    fn list(&self) -> Result<Vec<SiteId>> {
        let guard = self.models.read().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<SiteId> = guard.keys().cloned().collect();
        out.sort();
        Ok(out)
    }
}
