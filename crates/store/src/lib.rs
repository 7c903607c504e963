//! Plan persistence.
//!
//! The engine takes whichever [`PlanStore`] it is handed: an in-memory store
//! for tests and embedding, or a directory of YAML/JSON plan files for the
//! CLI. Plans are validated on the way in, so anything a store hands out is
//! structurally sound.

mod dir;
mod memory;

pub use dir::DirPlanStore;
pub use memory::MemoryPlanStore;

use anyhow::Result;
use chainrun_types::Plan;

/// Backing storage for named plans.
///
/// Implementations validate plans on `save` and on load, and keep listing
/// order stable (authoring order for the memory store, file-name order for
/// the directory store).
pub trait PlanStore: Send + Sync {
    /// All stored plans.
    fn list(&self) -> Result<Vec<Plan>>;

    /// Looks up one plan by id. `Ok(None)` when the id is unknown.
    fn get(&self, id: &str) -> Result<Option<Plan>>;

    /// Persists a plan under its id, replacing any previous version.
    fn save(&self, plan: &Plan) -> Result<()>;

    /// Removes a plan. Returns whether anything was deleted.
    fn delete(&self, id: &str) -> Result<bool>;
}

fn require_id(plan: &Plan) -> Result<&str> {
    plan.id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow::anyhow!("cannot store a plan without an id"))
}
