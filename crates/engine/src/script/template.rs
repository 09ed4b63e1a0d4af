use std::collections::BTreeMap;
use std::sync::Arc;

use super::command::Command;
use super::registry::Blueprint;

/// Immutable, shareable script: an ordered sequence of blueprints.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandListTemplate {
    id: String,
    blueprints: Vec<Blueprint>,
}

impl CommandListTemplate {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blueprints: Vec::new(),
        }
    }

    pub fn add_blueprint(&mut self, blueprint: Blueprint) {
        self.blueprints.push(blueprint);
    }

    pub fn with_blueprint(mut self, blueprint: Blueprint) -> Self {
        self.add_blueprint(blueprint);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    pub fn blueprint(&self, index: usize) -> Option<&Blueprint> {
        self.blueprints.get(index)
    }

    pub fn blueprints(&self) -> &[Blueprint] {
        &self.blueprints
    }

    /// Fresh command instances for every blueprint at and after `start`.
    pub fn instantiate(&self, start: usize) -> Vec<Box<dyn Command>> {
        self.blueprints
            .iter()
            .skip(start)
            .map(Blueprint::instantiate)
            .collect()
    }
}

/// Every template the content pipeline produced, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, Arc<CommandListTemplate>>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any template with the same id.
    pub fn insert(&mut self, template: CommandListTemplate) -> Arc<CommandListTemplate> {
        let template = Arc::new(template);
        self.templates
            .insert(template.id().to_string(), Arc::clone(&template));
        template
    }

    pub fn get(&self, id: &str) -> Option<Arc<CommandListTemplate>> {
        self.templates.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.templates.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}
