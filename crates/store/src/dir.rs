//! Directory-backed plan store.
//!
//! One file per plan, named `<id>.yaml` (`.yml` and `.json` are accepted on
//! the way in). Files are parsed and validated on every read; nothing is
//! cached, so edits on disk are picked up immediately.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chainrun_types::Plan;

use crate::{PlanStore, require_id};

const EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

pub struct DirPlanStore {
    root: PathBuf,
}

impl DirPlanStore {
    /// Opens a store over an existing directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Opens a store, creating the directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create plan directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn existing_path(&self, id: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{id}.{ext}")))
            .find(|path| path.is_file())
    }

    fn load_file(path: &Path) -> Result<Plan> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file {}", path.display()))?;
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let mut plan: Plan = if is_json {
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse plan file {}", path.display()))?
        } else {
            serde_yaml::from_str(&raw)
                .with_context(|| format!("failed to parse plan file {}", path.display()))?
        };
        if plan.id.is_none() {
            plan.id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string);
        }
        plan.validate()
            .with_context(|| format!("plan file {} failed validation", path.display()))?;
        Ok(plan)
    }
}

/// Plan ids double as file stems, so anything path-like is rejected.
fn check_id_is_plain(id: &str) -> Result<()> {
    if id.contains(['/', '\\']) || id == "." || id == ".." {
        bail!("plan id '{id}' is not a valid file name");
    }
    Ok(())
}

impl PlanStore for DirPlanStore {
    fn list(&self) -> Result<Vec<Plan>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to read plan directory {}", self.root.display()))?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| EXTENSIONS.contains(&ext))
            })
            .collect();
        paths.sort();

        paths.iter().map(|path| Self::load_file(path)).collect()
    }

    fn get(&self, id: &str) -> Result<Option<Plan>> {
        check_id_is_plain(id)?;
        match self.existing_path(id) {
            Some(path) => Self::load_file(&path).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, plan: &Plan) -> Result<()> {
        let id = require_id(plan)?;
        check_id_is_plain(id)?;
        plan.validate()
            .with_context(|| format!("plan '{id}' failed validation"))?;

        let rendered = serde_yaml::to_string(plan)
            .with_context(|| format!("failed to render plan '{id}' as YAML"))?;
        let path = self.root.join(format!("{id}.yaml"));
        fs::write(&path, rendered)
            .with_context(|| format!("failed to write plan file {}", path.display()))?;
        tracing::debug!(plan_id = id, path = %path.display(), "saved plan");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        check_id_is_plain(id)?;
        let mut removed = false;
        while let Some(path) = self.existing_path(id) {
            fs::remove_file(&path)
                .with_context(|| format!("failed to delete plan file {}", path.display()))?;
            removed = true;
        }
        Ok(removed)
    }
}
