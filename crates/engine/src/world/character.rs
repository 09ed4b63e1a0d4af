use serde::{Deserialize, Serialize};

use crate::script::CommandList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ActorId(pub usize);

impl ActorId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    #[default]
    Right,
}

impl Direction {
    pub fn dx(self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }

    /// Direction that moves `from_x` towards `to_x`; `None` when they match.
    pub fn towards(from_x: i32, to_x: i32) -> Option<Self> {
        match to_x.cmp(&from_x) {
            std::cmp::Ordering::Less => Some(Self::Left),
            std::cmp::Ordering::Greater => Some(Self::Right),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    pub fn distance_x(self, other: Location) -> i32 {
        (self.x - other.x).abs()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum AnimatoryState {
    #[default]
    Standing,
    Midstride,
    Sitting,
    ArmUp,
    Hitting,
    Firing,
    KnockedOver,
    Riding,
    Fallen,
    Hidden,
    Flying,
    Growing,
    Grown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CharacterKind {
    Teacher,
    Pupil,
    Eric,
    Animal,
    Projectile,
    Plant,
    Bike,
}

impl CharacterKind {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "teacher" => Some(Self::Teacher),
            "pupil" => Some(Self::Pupil),
            "eric" => Some(Self::Eric),
            "animal" => Some(Self::Animal),
            "projectile" => Some(Self::Projectile),
            "plant" => Some(Self::Plant),
            "bike" => Some(Self::Bike),
            _ => None,
        }
    }

    /// People walk the floors and can be knocked over.
    pub fn is_person(self) -> bool {
        matches!(self, Self::Teacher | Self::Pupil | Self::Eric)
    }
}

/// What commands may observe and change about the body they drive.
pub trait Actor {
    fn location(&self) -> Location;
    fn direction(&self) -> Direction;
    fn animatory_state(&self) -> AnimatoryState;
    fn set_animatory_state(&mut self, state: AnimatoryState);
    fn turn(&mut self);
    /// One horizontal step in the facing direction.
    fn step_forward(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Flight {
    pub direction: Direction,
    pub shooter: ActorId,
    pub travelled: u32,
}

/// Spawn description for one character, as loaded from content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterDef {
    pub config_id: String,
    pub name: String,
    pub kind: CharacterKind,
    pub location: Location,
    pub direction: Direction,
    pub speed: u32,
    pub default_template: Option<String>,
}

#[derive(Debug)]
pub struct Character {
    pub id: ActorId,
    pub config_id: String,
    pub name: String,
    pub kind: CharacterKind,
    pub location: Location,
    pub direction: Direction,
    pub state: AnimatoryState,
    /// Ticks per action; 1 acts every tick.
    pub speed: u32,
    pub running: bool,
    pub bubble: Option<String>,
    pub flight: Option<Flight>,
    pub momentum: u32,
    pub watered: bool,
    pub default_template: Option<String>,
    action_timer: u32,
    pub(crate) command_list: CommandList,
}

impl Character {
    pub fn from_def(id: ActorId, def: &CharacterDef) -> Self {
        let state = match def.kind {
            CharacterKind::Projectile | CharacterKind::Plant => AnimatoryState::Hidden,
            _ => AnimatoryState::Standing,
        };
        Self {
            id,
            config_id: def.config_id.clone(),
            name: def.name.clone(),
            kind: def.kind,
            location: def.location,
            direction: def.direction,
            state,
            speed: def.speed.max(1),
            running: false,
            bubble: None,
            flight: None,
            momentum: 0,
            watered: false,
            default_template: def.default_template.clone(),
            action_timer: 0,
            command_list: CommandList::new(),
        }
    }

    pub fn command_list(&self) -> &CommandList {
        &self.command_list
    }

    /// The cell directly in front of the character.
    pub fn facing(&self) -> Location {
        self.location.offset(self.direction.dx(), 0)
    }

    pub fn is_sitting(&self) -> bool {
        self.state == AnimatoryState::Sitting
    }

    pub fn is_vulnerable(&self) -> bool {
        self.kind.is_person()
            && !matches!(
                self.state,
                AnimatoryState::KnockedOver | AnimatoryState::Fallen | AnimatoryState::Hidden
            )
    }

    /// Moves one step with an optional vertical component (staircases).
    pub fn walk(&mut self, direction: Direction, dy: i32) {
        self.direction = direction;
        self.step_forward();
        self.location.y += dy;
    }

    /// Speed gate: `true` when the character gets to act this tick.
    pub(crate) fn ready_to_act(&mut self) -> bool {
        if self.running || self.action_timer == 0 {
            self.action_timer = self.speed.saturating_sub(1);
            return true;
        }
        self.action_timer -= 1;
        false
    }
}

impl Actor for Character {
    fn location(&self) -> Location {
        self.location
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn animatory_state(&self) -> AnimatoryState {
        self.state
    }

    fn set_animatory_state(&mut self, state: AnimatoryState) {
        self.state = state;
    }

    fn turn(&mut self) {
        self.direction = self.direction.reversed();
    }

    fn step_forward(&mut self) {
        self.location.x += self.direction.dx();
        self.state = match self.state {
            AnimatoryState::Midstride => AnimatoryState::Standing,
            AnimatoryState::Standing | AnimatoryState::Sitting => AnimatoryState::Midstride,
            other => other,
        };
    }
}
