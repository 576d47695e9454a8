// src/catalog.rs

//! Read-only service plan catalog.

use std::collections::HashMap;

use crate::errors::{Result, SupervisorError};
use crate::types::OperationKind;

/// Service plan as far as backup orchestration cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub backup_enabled: bool,
    pub restore_enabled: bool,
}

impl Plan {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            backup_enabled: true,
            restore_enabled: true,
        }
    }

    pub fn supports(&self, kind: OperationKind) -> bool {
        match kind {
            OperationKind::Backup => self.backup_enabled,
            OperationKind::Restore => self.restore_enabled,
        }
    }
}

pub trait Catalog: Send + Sync {
    fn get_plan(&self, plan_id: &str) -> Result<Plan>;
}

/// Catalog backed by a fixed set of plans.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    plans: HashMap<String, Plan>,
}

impl StaticCatalog {
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.insert(plan.id.clone(), plan);
        self
    }
}

impl Catalog for StaticCatalog {
    fn get_plan(&self, plan_id: &str) -> Result<Plan> {
        self.plans
            .get(plan_id)
            .cloned()
            .ok_or_else(|| SupervisorError::Validation(format!("unknown plan '{plan_id}'")))
    }
}
