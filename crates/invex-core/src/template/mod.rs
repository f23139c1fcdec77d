//! Template storage and selection.
//!
//! Stores publish their contents as an immutable [`TemplateSet`] behind an
//! `Arc`. Every mutation builds a new set and swaps the reference, so a
//! reader holding a snapshot never sees a half-applied reload.

mod fs_store;
mod memory;

pub use fs_store::{sanitize_file_stem, FileSystemTemplateStore};
pub use memory::MemoryTemplateStore;

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::TemplateError;
use crate::models::Template;

/// An ordered, immutable collection of templates.
///
/// Order is store order: the first template that matches a text wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateSet {
    templates: Vec<Template>,
}

impl TemplateSet {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn as_slice(&self) -> &[Template] {
        &self.templates
    }

    /// First template, in store order, whose identifiers all occur in `text`.
    pub fn find_for(&self, text: &str) -> Option<&Template> {
        let found = self.templates.iter().find(|t| t.matches(text));
        match found {
            Some(t) => debug!("Template '{}' matched", t.template_name),
            None => debug!("No template matched among {}", self.templates.len()),
        }
        found
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.template_name == name)
    }

    /// Copy of this set with `template` replacing the entry of the same
    /// name in place, or appended when the name is new.
    pub fn with_saved(&self, template: Template) -> Self {
        let mut templates = self.templates.clone();
        match templates
            .iter_mut()
            .find(|t| t.template_name == template.template_name)
        {
            Some(slot) => *slot = template,
            None => templates.push(template),
        }
        Self { templates }
    }

    /// Copy of this set without the template named `name`.
    pub fn without(&self, name: &str) -> Self {
        Self {
            templates: self
                .templates
                .iter()
                .filter(|t| t.template_name != name)
                .cloned()
                .collect(),
        }
    }
}

impl FromIterator<Template> for TemplateSet {
    fn from_iter<I: IntoIterator<Item = Template>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Source of templates for the extraction engine.
pub trait TemplateStore: Send + Sync {
    /// The current template collection.
    fn snapshot(&self) -> Arc<TemplateSet>;

    /// Persist `template`, replacing any template with the same name.
    fn save(&self, template: Template) -> Result<(), TemplateError>;

    /// Remove the template named `name`. Returns whether one existed.
    fn delete(&self, name: &str) -> Result<bool, TemplateError>;

    /// Replace the whole collection from the backing source.
    fn reload(&self) -> Result<(), TemplateError>;

    /// First template, in store order, matching `text`.
    fn find_template_for(&self, text: &str) -> Option<Template> {
        self.snapshot().find_for(text).cloned()
    }

    fn all(&self) -> Vec<Template> {
        self.snapshot().as_slice().to_vec()
    }

    fn get_by_name(&self, name: &str) -> Option<Template> {
        self.snapshot().get(name).cloned()
    }
}

/// Shared slot holding the published snapshot.
#[derive(Debug, Default)]
pub(crate) struct SnapshotCell {
    inner: RwLock<Arc<TemplateSet>>,
}

impl SnapshotCell {
    pub(crate) fn new(set: TemplateSet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(set)),
        }
    }

    pub(crate) fn load(&self) -> Arc<TemplateSet> {
        match self.inner.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub(crate) fn publish(&self, set: TemplateSet) {
        let set = Arc::new(set);
        match self.inner.write() {
            Ok(mut guard) => *guard = set,
            Err(poisoned) => *poisoned.into_inner() = set,
        }
    }

    /// Build the next set from the current one and publish it atomically
    /// with respect to other writers.
    pub(crate) fn update<F>(&self, f: F)
    where
        F: FnOnce(&TemplateSet) -> TemplateSet,
    {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = f(&guard);
        *guard = Arc::new(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn receipts() -> TemplateSet {
        TemplateSet::new(vec![
            Template::new("generic").with_identifier("收据"),
            Template::new("non-tax")
                .with_identifier("收据")
                .with_identifier("非税收入"),
            Template::new("unlabelled"),
        ])
    }

    #[test]
    fn test_first_match_in_store_order_wins() {
        let set = receipts();
        let text = "非税收入 统一收据";
        for _ in 0..3 {
            assert_eq!(set.find_for(text).unwrap().template_name, "generic");
        }
    }

    #[test]
    fn test_all_identifiers_must_be_present() {
        let set = TemplateSet::new(vec![
            Template::new("non-tax")
                .with_identifier("收据")
                .with_identifier("非税收入"),
        ]);
        assert!(set.find_for("统一收据").is_none());
        assert!(set.find_for("非税收入统一收据").is_some());
    }

    #[test]
    fn test_template_without_identifiers_never_matches() {
        let set = TemplateSet::new(vec![Template::new("unlabelled")]);
        assert!(set.find_for("").is_none());
        assert!(set.find_for("anything at all").is_none());
    }

    #[test]
    fn test_with_saved_replaces_in_place() {
        let set = receipts();
        let updated = set.with_saved(Template::new("generic").with_identifier("发票"));
        let names: Vec<_> = updated.iter().map(|t| t.template_name.as_str()).collect();
        assert_eq!(names, vec!["generic", "non-tax", "unlabelled"]);
        assert_eq!(updated.get("generic").unwrap().identifiers, vec!["发票"]);
        // The earlier snapshot is untouched.
        assert_eq!(set.get("generic").unwrap().identifiers, vec!["收据"]);
    }

    #[test]
    fn test_without_removes_by_name() {
        let set = receipts().without("non-tax");
        assert_eq!(set.len(), 2);
        assert!(set.get("non-tax").is_none());
    }

    #[test]
    fn test_snapshot_survives_publish() {
        let cell = SnapshotCell::new(receipts());
        let before = cell.load();
        cell.publish(TemplateSet::default());
        assert_eq!(before.len(), 3);
        assert!(cell.load().is_empty());
    }
}
