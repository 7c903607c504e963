//! In-memory plan store for tests and embedded use.

use std::sync::Mutex;

use anyhow::{Context, Result};
use chainrun_types::Plan;
use indexmap::IndexMap;

use crate::{PlanStore, require_id};

/// Keeps plans in an ordered map guarded by a mutex. Listing order is
/// insertion order, which for seeded catalogs means authoring order.
#[derive(Default)]
pub struct MemoryPlanStore {
    plans: Mutex<IndexMap<String, Plan>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `plans`, validating each.
    pub fn seeded(plans: impl IntoIterator<Item = Plan>) -> Result<Self> {
        let store = Self::new();
        for plan in plans {
            store.save(&plan)?;
        }
        Ok(store)
    }

    fn plans(&self) -> std::sync::MutexGuard<'_, IndexMap<String, Plan>> {
        self.plans.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlanStore for MemoryPlanStore {
    fn list(&self) -> Result<Vec<Plan>> {
        Ok(self.plans().values().cloned().collect())
    }

    fn get(&self, id: &str) -> Result<Option<Plan>> {
        Ok(self.plans().get(id).cloned())
    }

    fn save(&self, plan: &Plan) -> Result<()> {
        let id = require_id(plan)?;
        plan.validate()
            .with_context(|| format!("plan '{id}' failed validation"))?;
        self.plans().insert(id.to_string(), plan.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.plans().shift_remove(id).is_some())
    }
}
