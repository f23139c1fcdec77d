//! In-memory template store.

use std::sync::Arc;

use tracing::{debug, info};

use super::{SnapshotCell, TemplateSet, TemplateStore};
use crate::error::TemplateError;
use crate::models::Template;

/// Template store that keeps everything in memory.
///
/// Useful for tests and for embedding a fixed template set. `reload`
/// restores the templates the store was created with.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    seed: TemplateSet,
    current: SnapshotCell,
}

impl MemoryTemplateStore {
    pub fn new(templates: Vec<Template>) -> Self {
        let seed = TemplateSet::new(templates);
        Self {
            current: SnapshotCell::new(seed.clone()),
            seed,
        }
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn snapshot(&self) -> Arc<TemplateSet> {
        self.current.load()
    }

    fn save(&self, template: Template) -> Result<(), TemplateError> {
        if template.template_name.trim().is_empty() {
            return Err(TemplateError::BlankName);
        }
        debug!("Saving template '{}' in memory", template.template_name);
        self.current.update(|set| set.with_saved(template));
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool, TemplateError> {
        let mut existed = false;
        self.current.update(|set| {
            existed = set.get(name).is_some();
            set.without(name)
        });
        Ok(existed)
    }

    fn reload(&self) -> Result<(), TemplateError> {
        self.current.publish(self.seed.clone());
        info!("Reloaded {} in-memory templates", self.seed.len());
        Ok(())
    }
}
