use rand::Rng;
use tracing::{debug, warn};

use super::combat::KNOCKOUT_TICKS;
use crate::script::{
    done, Args, BlueprintError, Command, CommandContext, ComplexCommand, Outcome, Step, StepFn,
};
use crate::world::{Actor, AnimatoryState, Location};

#[derive(Debug)]
pub struct DoorMove {
    door: String,
    shut: bool,
}

pub type MoveDoor = ComplexCommand<DoorMove>;

fn reach_for_door(_state: &mut DoorMove, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::ArmUp);
    Step::Finished
}

fn swing_door(state: &mut DoorMove, ctx: &mut CommandContext<'_>) -> Step {
    let actor = ctx.actor_id();
    match ctx.world_mut().map_mut().barrier_mut(&state.door) {
        Some(door) => {
            door.shut = state.shut;
            debug!(
                actor = actor.index(),
                door = state.door.as_str(),
                shut = state.shut,
                "door_moved"
            );
        }
        None => warn!(actor = actor.index(), door = state.door.as_str(), "door_unresolved"),
    }
    Step::Finished
}

fn let_go(_state: &mut DoorMove, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::Standing);
    Step::Finished
}

const DOOR_STEPS: &[StepFn<DoorMove>] = &[reach_for_door, swing_door, let_go, done];

pub fn move_door(door: impl Into<String>, shut: bool) -> MoveDoor {
    let name = if shut { "ShutDoor" } else { "OpenDoor" };
    MoveDoor::new(
        name,
        DoorMove {
            door: door.into(),
            shut,
        },
        DOOR_STEPS,
    )
    .uninterruptible()
}

/// Script of a catapult pellet: idle until launched, then fly up to `range`
/// cells, knocking over the first person in the way.
#[derive(Debug)]
pub struct MovePellet {
    range: u32,
}

impl MovePellet {
    fn land(ctx: &mut CommandContext<'_>) -> Outcome {
        let pellet = ctx.actor_mut();
        pellet.flight = None;
        pellet.set_animatory_state(AnimatoryState::Hidden);
        Outcome::Done
    }
}

impl Command for MovePellet {
    fn name(&self) -> &'static str {
        "MovePellet"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        let Some(flight) = ctx.actor().flight else {
            return Outcome::Continue;
        };
        if flight.travelled >= self.range {
            return Self::land(ctx);
        }
        let next = ctx.actor().location.offset(flight.direction.dx(), 0);
        let map = ctx.world().map();
        if map.barrier_at(next.x, next.y).is_some() || map.floor_at(next).is_none() {
            return Self::land(ctx);
        }

        let pellet = ctx.actor_mut();
        pellet.location = next;
        if let Some(flight) = pellet.flight.as_mut() {
            flight.travelled += 1;
        }
        if let Some(victim) = ctx.world().vulnerable_character_at(next, flight.shooter) {
            debug!(pellet = ctx.actor_id().index(), victim = victim.index(), "pellet_hit");
            ctx.world_mut().knock_over(victim, KNOCKOUT_TICKS);
            return Self::land(ctx);
        }
        Outcome::Continue
    }
}

const FROG_MAX_HOPS: u32 = 3;

/// Hops a few cells, turning round at walls and floor edges.
#[derive(Debug)]
pub struct MoveFrog {
    hops: Option<u32>,
}

impl Command for MoveFrog {
    fn name(&self) -> &'static str {
        "MoveFrog"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        let hops = match self.hops {
            Some(hops) => hops,
            None => {
                let hops = ctx.world_mut().rng().gen_range(1..=FROG_MAX_HOPS);
                self.hops = Some(hops);
                hops
            }
        };
        if hops == 0 {
            return Outcome::Done;
        }
        let ahead = ctx.actor().facing();
        if hop_allowed(ctx, ahead) {
            ctx.actor_mut().step_forward();
        } else {
            ctx.actor_mut().turn();
        }
        self.hops = Some(hops - 1);
        Outcome::Continue
    }
}

fn hop_allowed(ctx: &CommandContext<'_>, ahead: Location) -> bool {
    let map = ctx.world().map();
    map.floor_at(ahead).is_some() && map.barrier_at(ahead.x, ahead.y).is_none()
}

/// Stays hidden until watered, grows, blooms for a while, then wilts.
#[derive(Debug)]
pub struct GrowPlant {
    grow_ticks: u32,
    bloom_ticks: u32,
    elapsed: u32,
}

impl Command for GrowPlant {
    fn name(&self) -> &'static str {
        "GrowPlant"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if !ctx.actor().watered {
            return Outcome::Continue;
        }
        self.elapsed += 1;
        let state = if self.elapsed <= self.grow_ticks {
            AnimatoryState::Growing
        } else if self.elapsed <= self.grow_ticks + self.bloom_ticks {
            AnimatoryState::Grown
        } else {
            let plant = ctx.actor_mut();
            plant.watered = false;
            plant.set_animatory_state(AnimatoryState::Hidden);
            return Outcome::Done;
        };
        ctx.actor_mut().set_animatory_state(state);
        Outcome::Continue
    }
}

/// Rolls while it has momentum; falls over when it hits something.
#[derive(Debug)]
pub struct MoveBike;

impl Command for MoveBike {
    fn name(&self) -> &'static str {
        "MoveBike"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if ctx.actor().momentum == 0 {
            return Outcome::Continue;
        }
        let ahead = ctx.actor().facing();
        if !hop_allowed(ctx, ahead) {
            let bike = ctx.actor_mut();
            bike.momentum = 0;
            bike.set_animatory_state(AnimatoryState::Fallen);
            return Outcome::Done;
        }
        let bike = ctx.actor_mut();
        bike.location = ahead;
        bike.momentum -= 1;
        if bike.momentum > 0 {
            return Outcome::Continue;
        }
        bike.set_animatory_state(AnimatoryState::Standing);
        Outcome::Done
    }
}

pub(super) fn build_open_door(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(move_door(args.text(0)?, false)))
}

pub(super) fn build_shut_door(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(move_door(args.text(0)?, true)))
}

pub(super) fn build_move_pellet(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(MovePellet {
        range: args.count(0)?,
    }))
}

pub(super) fn build_move_frog(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(MoveFrog { hops: None }))
}

pub(super) fn build_grow_plant(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(GrowPlant {
        grow_ticks: args.count(0)?,
        bloom_ticks: args.count(1)?,
        elapsed: 0,
    }))
}

pub(super) fn build_move_bike(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(MoveBike))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run, scripted, template};
    use crate::script::CommandList;
    use crate::world::test_support::{def, one_actor_world};
    use crate::world::{CharacterKind, Direction};

    #[test]
    fn shut_door_is_uninterruptible_until_the_door_has_moved() {
        let (mut world, actor) = one_actor_world();
        let mut list = CommandList::new();
        list.add_command(Box::new(move_door("TestDoor", true)));

        run(&mut list, &mut world, actor, 1);
        assert!(!list.is_interruptible());
        assert!(!world.map().barrier("TestDoor").expect("door").shut);
        run(&mut list, &mut world, actor, 3);
        assert!(world.map().barrier("TestDoor").expect("door").shut);
        assert_eq!(list.stack_len(), 0);
    }

    #[test]
    fn pellet_flies_until_it_hits_someone() {
        let (mut world, shooter) = one_actor_world();
        let pellet = world.spawn(&def("PELLET", CharacterKind::Projectile, Location::new(0, 0)));
        let victim = world.spawn(&def("EINSTEIN", CharacterKind::Pupil, Location::new(14, 10)));
        let mut list = scripted(
            &mut world,
            pellet,
            template("Pellet", &[("MovePellet", &["10"])]),
        );

        run(&mut list, &mut world, pellet, 2);
        assert!(world.launch_projectile(pellet, Location::new(11, 10), Direction::Right, shooter));
        run(&mut list, &mut world, pellet, 3);

        assert_eq!(
            world.character(victim).expect("victim").state,
            AnimatoryState::KnockedOver
        );
        let pellet = world.character(pellet).expect("pellet");
        assert!(pellet.flight.is_none());
        assert_eq!(pellet.state, AnimatoryState::Hidden);
    }

    #[test]
    fn pellet_lands_at_a_shut_door() {
        let (mut world, shooter) = one_actor_world();
        world.map_mut().barrier_mut("TestDoor").expect("door").shut = true;
        let pellet = world.spawn(&def("PELLET", CharacterKind::Projectile, Location::new(0, 0)));
        let mut list = CommandList::new();
        list.add_command(Box::new(MovePellet { range: 20 }));
        assert!(world.launch_projectile(pellet, Location::new(28, 10), Direction::Right, shooter));

        run(&mut list, &mut world, pellet, 2);

        let pellet = world.character(pellet).expect("pellet");
        assert_eq!(pellet.location, Location::new(29, 10));
        assert!(pellet.flight.is_none());
    }

    #[test]
    fn plant_grows_only_after_watering() {
        let (mut world, _) = one_actor_world();
        let plant = world.spawn(&def("PLANT", CharacterKind::Plant, Location::new(3, 10)));
        let mut list = CommandList::new();
        list.add_command(Box::new(GrowPlant {
            grow_ticks: 2,
            bloom_ticks: 1,
            elapsed: 0,
        }));

        run(&mut list, &mut world, plant, 3);
        assert_eq!(world.character(plant).expect("plant").state, AnimatoryState::Hidden);

        assert!(world.water_plant(plant));
        run(&mut list, &mut world, plant, 2);
        assert_eq!(world.character(plant).expect("plant").state, AnimatoryState::Growing);
        run(&mut list, &mut world, plant, 1);
        assert_eq!(world.character(plant).expect("plant").state, AnimatoryState::Grown);
        run(&mut list, &mut world, plant, 1);
        let plant = world.character(plant).expect("plant");
        assert_eq!(plant.state, AnimatoryState::Hidden);
        assert!(!plant.watered);
        assert_eq!(list.stack_len(), 0);
    }

    #[test]
    fn pushed_bike_rolls_then_stops() {
        let (mut world, _) = one_actor_world();
        let bike = world.spawn(&def("BIKE", CharacterKind::Bike, Location::new(20, 10)));
        let mut list = CommandList::new();
        list.add_command(Box::new(MoveBike));

        run(&mut list, &mut world, bike, 2);
        assert_eq!(world.character(bike).expect("bike").location, Location::new(20, 10));

        assert!(world.push_bike(bike, Direction::Left, 3));
        run(&mut list, &mut world, bike, 3);
        let character = world.character(bike).expect("bike");
        assert_eq!(character.location, Location::new(17, 10));
        assert_eq!(character.state, AnimatoryState::Standing);
        assert_eq!(list.stack_len(), 0);
    }

    #[test]
    fn frog_turns_round_at_the_floor_edge() {
        let (mut world, _) = one_actor_world();
        let mut frog_def = def("FROG", CharacterKind::Animal, Location::new(40, 10));
        frog_def.direction = Direction::Right;
        let frog = world.spawn(&frog_def);
        let mut list = CommandList::new();
        list.add_command(Box::new(MoveFrog { hops: Some(2) }));

        run(&mut list, &mut world, frog, 2);

        let character = world.character(frog).expect("frog");
        assert_eq!(character.direction, Direction::Left);
        assert_eq!(character.location, Location::new(39, 10));
    }
}
