mod character;
mod map;
mod timetable;

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commands::KnockedOver;
use crate::content::ContentDatabase;
use crate::script::{CommandListTemplate, TemplateLibrary};

pub use character::{
    Actor, ActorId, AnimatoryState, Character, CharacterDef, CharacterKind, Direction, Flight,
    Location,
};
pub use map::{Barrier, BarrierKind, Blackboard, Floor, Route, SkoolMap, Staircase, Step};
pub use timetable::{Lesson, Timetable};

/// Everything the commands act on: characters with their command lists, the
/// map, lesson signals and the shared rng.
#[derive(Debug)]
pub struct World {
    pub(crate) characters: Vec<Character>,
    map: SkoolMap,
    signals: BTreeSet<String>,
    templates: TemplateLibrary,
    timetable: Timetable,
    rng: StdRng,
    tick: u64,
    bells_rung: u64,
    // Actor whose command list is currently detached and running.
    active: Option<ActorId>,
}

impl World {
    pub fn new(map: SkoolMap, templates: TemplateLibrary, timetable: Timetable, seed: u64) -> Self {
        Self {
            characters: Vec::new(),
            map,
            signals: BTreeSet::new(),
            templates,
            timetable,
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            bells_rung: 0,
            active: None,
        }
    }

    pub fn from_content(database: &ContentDatabase, seed: u64) -> Self {
        let mut world = Self::new(
            database.map.clone(),
            database.templates.clone(),
            Timetable::new(database.lessons.clone()),
            seed,
        );
        for def in &database.characters {
            world.spawn(def);
        }
        world
    }

    pub fn spawn(&mut self, def: &CharacterDef) -> ActorId {
        let id = ActorId(self.characters.len());
        self.characters.push(Character::from_def(id, def));
        id
    }

    /// Hands every character its first script: the current lesson's
    /// assignment, or its default template.
    pub fn start(&mut self) {
        info!(
            characters = self.characters.len(),
            templates = self.templates.len(),
            lesson = self.timetable.current().map_or("<none>", |lesson| lesson.id.as_str()),
            "world_started"
        );
        self.assign_lesson_templates();
    }

    /// Rings the bell if the lesson is over, then lets every character whose
    /// speed gate opens take one scheduler step, in id order.
    pub fn tick(&mut self) {
        self.tick += 1;
        if self.timetable.advance() {
            self.ring_bell();
        }
        for index in 0..self.characters.len() {
            if self.characters[index].ready_to_act() {
                self.command_character(ActorId(index));
            }
        }
    }

    pub fn command_character(&mut self, actor: ActorId) {
        let Some(character) = self.characters.get_mut(actor.index()) else {
            return;
        };
        let mut list = std::mem::take(&mut character.command_list);
        self.active = Some(actor);
        list.command(actor, self);
        self.active = None;
        self.characters[actor.index()].command_list = list;
    }

    /// Switches another character's script. The character currently running
    /// must change its own script through its command context instead.
    pub fn set_character_template(&mut self, target: ActorId, template_id: &str) -> bool {
        if self.active == Some(target) {
            warn!(
                actor = target.index(),
                template = template_id,
                "set_template_on_running_actor"
            );
            return false;
        }
        let Some(template) = self.templates.get(template_id) else {
            warn!(
                actor = target.index(),
                template = template_id,
                "template_unresolved"
            );
            return false;
        };
        self.install_template(target, template)
    }

    fn install_template(&mut self, target: ActorId, template: Arc<CommandListTemplate>) -> bool {
        let Some(character) = self.characters.get_mut(target.index()) else {
            return false;
        };
        let mut list = std::mem::take(&mut character.command_list);
        list.set_template(template, target, self);
        self.characters[target.index()].command_list = list;
        true
    }

    fn ring_bell(&mut self) {
        self.bells_rung += 1;
        self.signals.clear();
        info!(
            tick = self.tick,
            lesson = self.timetable.current().map_or("<none>", |lesson| lesson.id.as_str()),
            "bell_rung"
        );
        self.assign_lesson_templates();
    }

    fn assign_lesson_templates(&mut self) {
        for index in 0..self.characters.len() {
            let character = &self.characters[index];
            let template_id = self
                .timetable
                .template_for(&character.config_id)
                .map(str::to_string)
                .or_else(|| character.default_template.clone());
            let Some(template_id) = template_id else {
                continue;
            };
            debug!(
                character = character.config_id.as_str(),
                template = template_id.as_str(),
                "lesson_template_assigned"
            );
            self.set_character_template(ActorId(index), &template_id);
        }
    }

    pub fn character(&self, id: ActorId) -> Option<&Character> {
        self.characters.get(id.index())
    }

    pub fn character_mut(&mut self, id: ActorId) -> Option<&mut Character> {
        self.characters.get_mut(id.index())
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn find_character(&self, config_id: &str) -> Option<ActorId> {
        self.characters
            .iter()
            .find(|character| character.config_id == config_id)
            .map(|character| character.id)
    }

    pub fn vulnerable_character_at(&self, location: Location, exclude: ActorId) -> Option<ActorId> {
        self.characters
            .iter()
            .find(|character| {
                character.id != exclude
                    && character.location == location
                    && character.is_vulnerable()
            })
            .map(|character| character.id)
    }

    pub fn chair_is_free(&self, chair: Location) -> bool {
        !self
            .characters
            .iter()
            .any(|character| character.location == chair && character.is_sitting())
    }

    pub fn map(&self) -> &SkoolMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut SkoolMap {
        &mut self.map
    }

    /// Named map location, blackboard, or a character's current position.
    pub fn resolve_location(&self, name: &str) -> Option<Location> {
        if let Some(location) = self.map.location(name) {
            return Some(location);
        }
        if let Some(board) = self.map.blackboard(name) {
            return Some(board.location);
        }
        self.find_character(name)
            .and_then(|id| self.character(id))
            .map(|character| character.location)
    }

    pub fn signal(&mut self, name: &str) {
        self.signals.insert(name.to_string());
    }

    pub fn unsignal(&mut self, name: &str) {
        self.signals.remove(name);
    }

    pub fn is_signalled(&self, name: &str) -> bool {
        self.signals.contains(name)
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    pub fn template(&self, id: &str) -> Option<Arc<CommandListTemplate>> {
        self.templates.get(id)
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn bells_rung(&self) -> u64 {
        self.bells_rung
    }

    /// Floors a character and stacks a `KnockedOver` on its command list.
    pub fn knock_over(&mut self, target: ActorId, ticks: u32) -> bool {
        if self.active == Some(target) {
            return false;
        }
        let Some(character) = self.characters.get_mut(target.index()) else {
            return false;
        };
        if !character.is_vulnerable() {
            return false;
        }
        character.state = AnimatoryState::KnockedOver;
        character.bubble = None;
        character
            .command_list
            .add_command(Box::new(KnockedOver::new(ticks)));
        debug!(actor = target.index(), ticks, "character_knocked_over");
        true
    }

    pub fn launch_projectile(
        &mut self,
        projectile: ActorId,
        from: Location,
        direction: Direction,
        shooter: ActorId,
    ) -> bool {
        let Some(character) = self.characters.get_mut(projectile.index()) else {
            return false;
        };
        if character.flight.is_some() {
            return false;
        }
        character.location = from;
        character.direction = direction;
        character.state = AnimatoryState::Flying;
        character.flight = Some(Flight {
            direction,
            shooter,
            travelled: 0,
        });
        true
    }

    pub fn water_plant(&mut self, plant: ActorId) -> bool {
        match self.characters.get_mut(plant.index()) {
            Some(character) if character.kind == CharacterKind::Plant => {
                character.watered = true;
                true
            }
            _ => false,
        }
    }

    pub fn push_bike(&mut self, bike: ActorId, direction: Direction, momentum: u32) -> bool {
        match self.characters.get_mut(bike.index()) {
            Some(character) if character.kind == CharacterKind::Bike => {
                character.direction = direction;
                character.momentum = momentum;
                character.state = AnimatoryState::Riding;
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            bells_rung: self.bells_rung,
            lesson: self.timetable.current().map(|lesson| lesson.id.clone()),
            signals: self.signals.iter().cloned().collect(),
            characters: self
                .characters
                .iter()
                .map(|character| CharacterSnapshot {
                    id: character.config_id.clone(),
                    name: character.name.clone(),
                    location: character.location,
                    direction: character.direction,
                    state: character.state,
                    template: character
                        .command_list
                        .template_id()
                        .map(str::to_string),
                    cursor: character.command_list.cursor(),
                    stack: character
                        .command_list
                        .stack_names()
                        .into_iter()
                        .map(str::to_string)
                        .collect(),
                    bubble: character.bubble.clone(),
                })
                .collect(),
            doors: self
                .map
                .barriers()
                .iter()
                .filter(|barrier| barrier.kind == BarrierKind::Door)
                .map(|barrier| DoorSnapshot {
                    id: barrier.id.clone(),
                    shut: barrier.shut,
                })
                .collect(),
            boards: self
                .map
                .blackboards()
                .iter()
                .map(|board| BoardSnapshot {
                    id: board.id.clone(),
                    text: board.text.clone(),
                    writer: board
                        .writer
                        .and_then(|writer| self.character(writer))
                        .map(|character| character.config_id.clone()),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub bells_rung: u64,
    pub lesson: Option<String>,
    pub signals: Vec<String>,
    pub characters: Vec<CharacterSnapshot>,
    pub doors: Vec<DoorSnapshot>,
    pub boards: Vec<BoardSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterSnapshot {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub direction: Direction,
    pub state: AnimatoryState,
    pub template: Option<String>,
    pub cursor: usize,
    pub stack: Vec<String>,
    pub bubble: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoorSnapshot {
    pub id: String,
    pub shut: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub id: String,
    pub text: String,
    pub writer: Option<String>,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Two floors joined by one staircase, a door on the lower floor, two
    /// chairs and a blackboard.
    pub(crate) fn test_map() -> SkoolMap {
        let mut map = SkoolMap::new();
        map.add_floor(Floor {
            id: "Top".to_string(),
            y: 3,
            min_x: 0,
            max_x: 40,
        });
        map.add_floor(Floor {
            id: "Bottom".to_string(),
            y: 10,
            min_x: 0,
            max_x: 40,
        });
        map.add_staircase(
            Staircase::new("Stairs", Location::new(20, 10), Location::new(13, 3))
                .expect("valid staircase"),
        );
        map.add_barrier(Barrier {
            id: "TestDoor".to_string(),
            kind: BarrierKind::Door,
            x: 30,
            top_y: 4,
            bottom_y: 10,
            shut: false,
        });
        map.add_location("Desk", Location::new(5, 10));
        map.add_location("Landing", Location::new(5, 3));
        map.add_chair(Location::new(8, 10));
        map.add_chair(Location::new(12, 10));
        map.add_blackboard(Blackboard::new("Board", Location::new(2, 10), 12));
        map
    }

    pub(crate) fn def(config_id: &str, kind: CharacterKind, location: Location) -> CharacterDef {
        CharacterDef {
            config_id: config_id.to_string(),
            name: config_id.to_string(),
            kind,
            location,
            direction: Direction::Right,
            speed: 1,
            default_template: None,
        }
    }

    pub(crate) fn world_with(templates: TemplateLibrary) -> World {
        World::new(test_map(), templates, Timetable::default(), 7)
    }

    pub(crate) fn one_actor_world() -> (World, ActorId) {
        let mut world = world_with(TemplateLibrary::new());
        let actor = world.spawn(&def(
            "ANGELFACE",
            CharacterKind::Pupil,
            Location::new(10, 10),
        ));
        (world, actor)
    }
}
