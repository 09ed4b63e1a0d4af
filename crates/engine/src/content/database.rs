use crate::script::TemplateLibrary;
use crate::world::{CharacterDef, Lesson, SkoolMap};

/// Compiled, cross-checked content: everything needed to build a world.
#[derive(Debug, Clone, Default)]
pub struct ContentDatabase {
    pub map: SkoolMap,
    /// Spawn order; a character's position here becomes its `ActorId`.
    pub characters: Vec<CharacterDef>,
    pub templates: TemplateLibrary,
    pub lessons: Vec<Lesson>,
    /// SHA-256 of the mod list and every input file, lowercase hex.
    pub fingerprint: String,
}

impl ContentDatabase {
    pub fn character(&self, config_id: &str) -> Option<&CharacterDef> {
        self.characters
            .iter()
            .find(|def| def.config_id == config_id)
    }

    pub fn lesson(&self, id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.id == id)
    }
}
