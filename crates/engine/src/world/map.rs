use std::collections::BTreeMap;

use serde::Serialize;

use super::character::{ActorId, Direction, Location};

/// A walkable horizontal run at height `y`. Smaller `y` is higher up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Floor {
    pub id: String,
    pub y: i32,
    pub min_x: i32,
    pub max_x: i32,
}

impl Floor {
    pub fn contains(&self, location: Location) -> bool {
        location.y == self.y && (self.min_x..=self.max_x).contains(&location.x)
    }
}

/// A diagonal flight of stairs; each step up moves one column towards `top`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staircase {
    pub id: String,
    pub bottom: Location,
    pub top: Location,
}

impl Staircase {
    /// `None` unless the ends describe a 45 degree climb.
    pub fn new(id: impl Into<String>, bottom: Location, top: Location) -> Option<Self> {
        let height = bottom.y - top.y;
        if height <= 0 || (top.x - bottom.x).abs() != height {
            return None;
        }
        Some(Self {
            id: id.into(),
            bottom,
            top,
        })
    }

    pub fn up_direction(&self) -> Direction {
        if self.top.x > self.bottom.x {
            Direction::Right
        } else {
            Direction::Left
        }
    }

    pub fn contains(&self, location: Location) -> bool {
        if location.y < self.top.y || location.y > self.bottom.y {
            return false;
        }
        let climbed = self.bottom.y - location.y;
        location.x == self.bottom.x + climbed * self.up_direction().dx()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarrierKind {
    Wall,
    Door,
}

/// A vertical obstacle occupying column `x` between `top_y` and `bottom_y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barrier {
    pub id: String,
    pub kind: BarrierKind,
    pub x: i32,
    pub top_y: i32,
    pub bottom_y: i32,
    pub shut: bool,
}

impl Barrier {
    pub fn blocks(&self) -> bool {
        match self.kind {
            BarrierKind::Wall => true,
            BarrierKind::Door => self.shut,
        }
    }

    pub fn spans(&self, y: i32) -> bool {
        (self.top_y..=self.bottom_y).contains(&y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blackboard {
    pub id: String,
    pub location: Location,
    pub capacity: usize,
    pub text: String,
    pub writer: Option<ActorId>,
}

impl Blackboard {
    pub fn new(id: impl Into<String>, location: Location, capacity: usize) -> Self {
        Self {
            id: id.into(),
            location,
            capacity,
            text: String::new(),
            writer: None,
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self.text.is_empty()
    }

    /// Appends one character; `false` once the board is full.
    pub fn write_char(&mut self, ch: char, writer: ActorId) -> bool {
        if self.text.chars().count() >= self.capacity {
            return false;
        }
        self.text.push(ch);
        self.writer = Some(writer);
        true
    }

    pub fn wipe(&mut self) {
        self.text.clear();
        self.writer = None;
    }
}

/// The next single move along floors and staircases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub direction: Direction,
    pub dy: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Arrived,
    Step(Step),
    /// The next cell is behind a wall or shut door.
    Blocked { barrier: String },
    Unreachable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkoolMap {
    floors: Vec<Floor>,
    staircases: Vec<Staircase>,
    barriers: Vec<Barrier>,
    locations: BTreeMap<String, Location>,
    chairs: Vec<Location>,
    blackboards: Vec<Blackboard>,
}

impl SkoolMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_floor(&mut self, floor: Floor) {
        self.floors.retain(|existing| existing.id != floor.id);
        self.floors.push(floor);
    }

    pub fn add_staircase(&mut self, staircase: Staircase) {
        self.staircases.retain(|existing| existing.id != staircase.id);
        self.staircases.push(staircase);
    }

    pub fn add_barrier(&mut self, barrier: Barrier) {
        self.barriers.retain(|existing| existing.id != barrier.id);
        self.barriers.push(barrier);
    }

    pub fn add_location(&mut self, id: impl Into<String>, location: Location) {
        self.locations.insert(id.into(), location);
    }

    pub fn add_chair(&mut self, location: Location) {
        if !self.chairs.contains(&location) {
            self.chairs.push(location);
        }
    }

    pub fn add_blackboard(&mut self, blackboard: Blackboard) {
        self.blackboards
            .retain(|existing| existing.id != blackboard.id);
        self.blackboards.push(blackboard);
    }

    pub fn floors(&self) -> &[Floor] {
        &self.floors
    }

    pub fn staircases(&self) -> &[Staircase] {
        &self.staircases
    }

    pub fn barriers(&self) -> &[Barrier] {
        &self.barriers
    }

    pub fn chairs(&self) -> &[Location] {
        &self.chairs
    }

    pub fn blackboards(&self) -> &[Blackboard] {
        &self.blackboards
    }

    pub fn location(&self, id: &str) -> Option<Location> {
        self.locations.get(id).copied()
    }

    pub fn location_ids(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    pub fn barrier(&self, id: &str) -> Option<&Barrier> {
        self.barriers.iter().find(|barrier| barrier.id == id)
    }

    pub fn barrier_mut(&mut self, id: &str) -> Option<&mut Barrier> {
        self.barriers.iter_mut().find(|barrier| barrier.id == id)
    }

    pub fn blackboard(&self, id: &str) -> Option<&Blackboard> {
        self.blackboards.iter().find(|board| board.id == id)
    }

    pub fn blackboard_mut(&mut self, id: &str) -> Option<&mut Blackboard> {
        self.blackboards.iter_mut().find(|board| board.id == id)
    }

    pub fn floor_at(&self, location: Location) -> Option<&Floor> {
        self.floors.iter().find(|floor| floor.contains(location))
    }

    pub fn is_walkable(&self, location: Location) -> bool {
        self.floor_at(location).is_some()
            || self
                .staircases
                .iter()
                .any(|staircase| staircase.contains(location))
    }

    /// First blocking barrier in the column being stepped into.
    pub fn barrier_at(&self, x: i32, y: i32) -> Option<&Barrier> {
        self.barriers
            .iter()
            .find(|barrier| barrier.x == x && barrier.spans(y) && barrier.blocks())
    }

    pub fn next_step(&self, from: Location, to: Location) -> Option<Step> {
        match self.route(from, to) {
            Route::Step(step) => Some(step),
            _ => None,
        }
    }

    /// One move from `from` towards `to`, changing floors by the nearest
    /// staircase in the right direction.
    pub fn route(&self, from: Location, to: Location) -> Route {
        if from == to {
            return Route::Arrived;
        }

        let Some(floor) = self.floor_at(from) else {
            return self.route_on_stairs(from, to);
        };
        let target_y = match self.floor_at(to) {
            Some(target) => target.y,
            None if self.is_walkable(to) => to.y,
            None => return Route::Unreachable,
        };

        if target_y == floor.y {
            return match Direction::towards(from.x, to.x) {
                Some(direction) => self.horizontal(from, direction),
                None => Route::Arrived,
            };
        }

        let going_up = target_y < floor.y;
        let entry = self
            .staircases
            .iter()
            .filter_map(|staircase| {
                let end = if going_up {
                    staircase.bottom
                } else {
                    staircase.top
                };
                floor.contains(end).then_some((staircase, end))
            })
            .min_by_key(|(_, end)| end.distance_x(from));
        let Some((staircase, end)) = entry else {
            return Route::Unreachable;
        };

        match Direction::towards(from.x, end.x) {
            Some(direction) => self.horizontal(from, direction),
            None if going_up => Route::Step(Step {
                direction: staircase.up_direction(),
                dy: -1,
            }),
            None => Route::Step(Step {
                direction: staircase.up_direction().reversed(),
                dy: 1,
            }),
        }
    }

    fn horizontal(&self, from: Location, direction: Direction) -> Route {
        let next_x = from.x + direction.dx();
        if let Some(barrier) = self.barrier_at(next_x, from.y) {
            return Route::Blocked {
                barrier: barrier.id.clone(),
            };
        }
        Route::Step(Step { direction, dy: 0 })
    }

    fn route_on_stairs(&self, from: Location, to: Location) -> Route {
        let Some(staircase) = self
            .staircases
            .iter()
            .find(|staircase| staircase.contains(from))
        else {
            return Route::Unreachable;
        };
        if to.y < from.y {
            Route::Step(Step {
                direction: staircase.up_direction(),
                dy: -1,
            })
        } else {
            Route::Step(Step {
                direction: staircase.up_direction().reversed(),
                dy: 1,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_floor_map() -> SkoolMap {
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
            id: "Door".to_string(),
            kind: BarrierKind::Door,
            x: 30,
            top_y: 4,
            bottom_y: 10,
            shut: true,
        });
        map
    }

    fn walk(map: &SkoolMap, from: Location, to: Location) -> (Location, usize) {
        let mut at = from;
        for moves in 0..200 {
            match map.route(at, to) {
                Route::Arrived => return (at, moves),
                Route::Step(step) => {
                    at = at.offset(step.direction.dx(), step.dy);
                }
                other => panic!("stuck at {at:?}: {other:?}"),
            }
        }
        panic!("never arrived");
    }

    #[test]
    fn staircase_rejects_non_diagonal_ends() {
        assert!(Staircase::new("Bad", Location::new(0, 10), Location::new(3, 3)).is_none());
        assert!(Staircase::new("Flat", Location::new(0, 10), Location::new(3, 10)).is_none());
    }

    #[test]
    fn route_climbs_stairs_between_floors() {
        let map = two_floor_map();

        let (end, moves) = walk(&map, Location::new(25, 10), Location::new(5, 3));

        assert_eq!(end, Location::new(5, 3));
        assert_eq!(moves, 5 + 7 + 8);
    }

    #[test]
    fn route_descends_from_the_middle_of_a_staircase() {
        let map = two_floor_map();

        let (end, _) = walk(&map, Location::new(16, 6), Location::new(2, 10));

        assert_eq!(end, Location::new(2, 10));
    }

    #[test]
    fn shut_door_blocks_and_open_door_lets_through() {
        let mut map = two_floor_map();

        assert_eq!(
            map.route(Location::new(29, 10), Location::new(35, 10)),
            Route::Blocked {
                barrier: "Door".to_string()
            }
        );
        map.barrier_mut("Door").expect("door").shut = false;
        assert!(map.next_step(Location::new(29, 10), Location::new(35, 10)).is_some());
    }

    #[test]
    fn off_map_target_is_unreachable() {
        let map = two_floor_map();
        assert_eq!(
            map.route(Location::new(5, 10), Location::new(5, 7)),
            Route::Unreachable
        );
    }

    #[test]
    fn blackboard_fills_up_and_wipes() {
        let mut board = Blackboard::new("Board", Location::new(2, 10), 2);
        assert!(board.write_char('a', ActorId(1)));
        assert!(board.write_char('b', ActorId(1)));
        assert!(!board.write_char('c', ActorId(1)));
        assert_eq!(board.text, "ab");
        board.wipe();
        assert!(!board.is_dirty());
        assert_eq!(board.writer, None);
    }
}
