use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::script::{
    done, Args, BlueprintError, Command, CommandContext, ComplexCommand, Outcome, Step, StepFn,
};
use crate::world::{Actor, AnimatoryState, Location, Route};

/// Result of one [`walk_towards`] action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Arrived,
    Moving,
    /// A wall or shut door is in the way; try again next tick.
    Waiting,
    Lost,
}

/// Spends the actor's action on getting closer to `target`. Standing up and
/// turning round each take a whole action.
pub fn walk_towards(ctx: &mut CommandContext<'_>, target: Location) -> Progress {
    let (location, sitting) = {
        let actor = ctx.actor();
        (actor.location, actor.is_sitting())
    };
    if location == target {
        let actor = ctx.actor_mut();
        if actor.state == AnimatoryState::Midstride {
            actor.set_animatory_state(AnimatoryState::Standing);
        }
        return Progress::Arrived;
    }
    if sitting {
        ctx.actor_mut()
            .set_animatory_state(AnimatoryState::Standing);
        return Progress::Moving;
    }

    match ctx.world().map().route(location, target) {
        Route::Arrived => Progress::Arrived,
        Route::Step(step) => {
            let actor = ctx.actor_mut();
            if actor.direction != step.direction {
                actor.turn();
            } else {
                actor.walk(step.direction, step.dy);
            }
            Progress::Moving
        }
        Route::Blocked { .. } => Progress::Waiting,
        Route::Unreachable => Progress::Lost,
    }
}

/// Walks to a named location, re-resolving it every action so moving
/// targets (characters) are followed.
#[derive(Debug)]
pub struct GoTo {
    target: String,
    destination: Option<Location>,
    patched: bool,
    warned: bool,
}

impl GoTo {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            destination: None,
            patched: false,
            warned: false,
        }
    }
}

impl Command for GoTo {
    fn name(&self) -> &'static str {
        "GoTo"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if !self.patched {
            self.destination = ctx.world().resolve_location(&self.target);
        }
        let Some(destination) = self.destination else {
            if !self.warned {
                warn!(
                    actor = ctx.actor_id().index(),
                    location = self.target.as_str(),
                    "location_unresolved"
                );
                self.warned = true;
            }
            return Outcome::Continue;
        };
        follow_route(ctx, destination)
    }

    fn is_go_to(&self) -> bool {
        true
    }

    fn destination(&self) -> Option<Location> {
        self.destination
    }

    fn set_destination(&mut self, destination: Location) {
        self.destination = Some(destination);
        self.patched = true;
    }
}

fn follow_route(ctx: &mut CommandContext<'_>, destination: Location) -> Outcome {
    match walk_towards(ctx, destination) {
        Progress::Arrived => Outcome::Done,
        Progress::Moving | Progress::Waiting => Outcome::Continue,
        Progress::Lost => {
            warn!(
                actor = ctx.actor_id().index(),
                x = destination.x,
                y = destination.y,
                "destination_unreachable"
            );
            Outcome::Done
        }
    }
}

#[derive(Debug)]
pub struct GoToXY {
    destination: Location,
}

impl GoToXY {
    pub fn new(destination: Location) -> Self {
        Self { destination }
    }
}

impl Command for GoToXY {
    fn name(&self) -> &'static str {
        "GoToXY"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        follow_route(ctx, self.destination)
    }

    fn is_go_to(&self) -> bool {
        true
    }

    fn destination(&self) -> Option<Location> {
        Some(self.destination)
    }

    fn set_destination(&mut self, destination: Location) {
        self.destination = destination;
    }
}

/// A single action's worth of [`GoToXY`].
#[derive(Debug)]
pub struct GoTowardsXY {
    destination: Location,
}

impl Command for GoTowardsXY {
    fn name(&self) -> &'static str {
        "GoTowardsXY"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        walk_towards(ctx, self.destination);
        Outcome::Done
    }
}

/// Picks one of its locations (any named location when none are given) and
/// walks there.
#[derive(Debug)]
pub struct GoToRandomLocation {
    choices: Vec<String>,
    inner: Option<GoTo>,
}

impl Command for GoToRandomLocation {
    fn name(&self) -> &'static str {
        "GoToRandomLocation"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.inner.is_none() {
            let mut choices = self.choices.clone();
            if choices.is_empty() {
                choices = ctx
                    .world()
                    .map()
                    .location_ids()
                    .map(str::to_string)
                    .collect();
            }
            let Some(choice) = choices.choose(ctx.world_mut().rng()).cloned() else {
                return Outcome::Done;
            };
            self.inner = Some(GoTo::new(choice));
        }
        match self.inner.as_mut() {
            Some(inner) => inner.execute(ctx),
            None => Outcome::Done,
        }
    }

    fn is_go_to(&self) -> bool {
        true
    }

    fn destination(&self) -> Option<Location> {
        self.inner.as_ref().and_then(|inner| inner.destination())
    }

    fn set_destination(&mut self, destination: Location) {
        if let Some(inner) = self.inner.as_mut() {
            inner.set_destination(destination);
        }
    }
}

/// Wanders to a random spot within `range` columns on the current floor.
#[derive(Debug)]
pub struct MoveAbout {
    range: i32,
    target: Option<Location>,
}

impl Command for MoveAbout {
    fn name(&self) -> &'static str {
        "MoveAbout"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        let target = match self.target {
            Some(target) => target,
            None => {
                let location = ctx.actor().location;
                let range = self.range;
                let dx = ctx.world_mut().rng().gen_range(-range..=range);
                let target = clamp_to_floor(ctx, location.offset(dx, 0));
                self.target = Some(target);
                target
            }
        };
        follow_route(ctx, target)
    }
}

fn clamp_to_floor(ctx: &CommandContext<'_>, location: Location) -> Location {
    let map = ctx.world().map();
    match map.floors().iter().find(|floor| floor.y == location.y) {
        Some(floor) => Location::new(location.x.clamp(floor.min_x, floor.max_x), location.y),
        None => location,
    }
}

const WALK_AROUND_STRIDE: i32 = 4;

/// Paces away from the starting point and back, `times` round trips.
#[derive(Debug)]
pub struct WalkAround {
    remaining: u32,
    origin: Option<Location>,
    outbound: bool,
}

impl Command for WalkAround {
    fn name(&self) -> &'static str {
        "WalkAround"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.remaining == 0 {
            return Outcome::Done;
        }
        let origin = *self.origin.get_or_insert(ctx.actor().location);
        let target = if self.outbound {
            let away = ctx.actor().direction.dx() * WALK_AROUND_STRIDE;
            clamp_to_floor(ctx, origin.offset(away, 0))
        } else {
            origin
        };
        match walk_towards(ctx, target) {
            Progress::Moving | Progress::Waiting => {}
            Progress::Arrived | Progress::Lost => {
                if !self.outbound {
                    self.remaining -= 1;
                }
                self.outbound = !self.outbound;
            }
        }
        if self.remaining == 0 {
            Outcome::Done
        } else {
            Outcome::Continue
        }
    }
}

/// Walks wherever the leader is heading, or to the leader when it is not
/// heading anywhere. Finishes once both stand together with the leader idle.
/// A patched destination replaces the leader's for the rest of the walk.
#[derive(Debug)]
pub struct FollowLeader {
    leader: String,
    destination: Option<Location>,
    patched: bool,
    warned: bool,
}

impl FollowLeader {
    pub fn new(leader: impl Into<String>) -> Self {
        Self {
            leader: leader.into(),
            destination: None,
            patched: false,
            warned: false,
        }
    }
}

impl Command for FollowLeader {
    fn name(&self) -> &'static str {
        "FollowLeader"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if let Some(destination) = self.destination.filter(|_| self.patched) {
            return follow_route(ctx, destination);
        }
        let Some(leader) = ctx
            .world()
            .find_character(&self.leader)
            .and_then(|id| ctx.world().character(id))
        else {
            if !self.warned {
                warn!(
                    actor = ctx.actor_id().index(),
                    leader = self.leader.as_str(),
                    "leader_unresolved"
                );
                self.warned = true;
            }
            return Outcome::Done;
        };
        let heading = leader.command_list().go_to_destination();
        let destination = heading.unwrap_or(leader.location);
        self.destination = Some(destination);

        match walk_towards(ctx, destination) {
            Progress::Arrived if heading.is_none() => Outcome::Done,
            Progress::Lost => Outcome::Done,
            _ => Outcome::Continue,
        }
    }

    fn is_go_to(&self) -> bool {
        true
    }

    fn destination(&self) -> Option<Location> {
        self.destination
    }

    fn set_destination(&mut self, destination: Location) {
        self.destination = Some(destination);
        self.patched = true;
    }
}

#[derive(Debug, Default)]
pub struct SeatSearch {
    chair: Option<Location>,
}

pub type FindSeat = ComplexCommand<SeatSearch>;

fn pick_chair(state: &mut SeatSearch, ctx: &mut CommandContext<'_>) -> Step {
    let location = ctx.actor().location;
    let chair = ctx
        .world()
        .map()
        .chairs()
        .iter()
        .copied()
        .filter(|chair| chair.y == location.y && ctx.world().chair_is_free(*chair))
        .min_by_key(|chair| chair.distance_x(location));
    state.chair = chair;
    match chair {
        Some(chair) => Step::Push(Box::new(GoToXY::new(chair))),
        None => Step::Done,
    }
}

fn sit_down(state: &mut SeatSearch, ctx: &mut CommandContext<'_>) -> Step {
    let Some(chair) = state.chair else {
        return Step::Restart;
    };
    if ctx.actor().location != chair || !ctx.world().chair_is_free(chair) {
        return Step::Restart;
    }
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::Sitting);
    Step::Finished
}

const FIND_SEAT_STEPS: &[StepFn<SeatSearch>] = &[pick_chair, sit_down, done];

/// Sits down and never finishes; a new script moves the character on.
#[derive(Debug)]
pub struct SitStill;

impl Command for SitStill {
    fn name(&self) -> &'static str {
        "SitStill"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if !ctx.actor().is_sitting() {
            ctx.actor_mut()
                .set_animatory_state(AnimatoryState::Sitting);
        }
        Outcome::Continue
    }
}

/// Meant as a controlling command: the actor runs while it keeps being
/// injected and slows down again once it lapses.
#[derive(Debug)]
pub struct WalkFast;

impl Command for WalkFast {
    fn name(&self) -> &'static str {
        "WalkFast"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        ctx.actor_mut().running = true;
        Outcome::Done
    }

    fn finish(&mut self, ctx: &mut CommandContext<'_>) {
        ctx.actor_mut().running = false;
    }
}

/// Controlling command that keeps the bottom go-to aimed at a character.
#[derive(Debug)]
pub struct TrackCharacter {
    target: String,
}

impl Command for TrackCharacter {
    fn name(&self) -> &'static str {
        "TrackCharacter"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        let location = ctx
            .world()
            .find_character(&self.target)
            .and_then(|id| ctx.world().character(id))
            .map(|character| character.location);
        if let Some(location) = location {
            ctx.set_go_to_destination(location);
        }
        Outcome::Done
    }
}

fn location_arg(args: &Args<'_>) -> Result<Location, BlueprintError> {
    Ok(Location::new(args.int(0)?, args.int(1)?))
}

pub(super) fn build_go_to(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(GoTo::new(args.text(0)?)))
}

pub(super) fn build_go_to_xy(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(GoToXY::new(location_arg(args)?)))
}

pub(super) fn build_go_towards_xy(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(GoTowardsXY {
        destination: location_arg(args)?,
    }))
}

pub(super) fn build_go_to_random_location(
    args: &Args<'_>,
) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(GoToRandomLocation {
        choices: args.texts_from(0)?,
        inner: None,
    }))
}

pub(super) fn build_move_about(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(MoveAbout {
        range: args.count(0)? as i32,
        target: None,
    }))
}

pub(super) fn build_walk_around(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(WalkAround {
        remaining: args.count(0)?,
        origin: None,
        outbound: true,
    }))
}

pub(super) fn build_follow_leader(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(FollowLeader::new(args.text(0)?)))
}

pub(super) fn build_find_seat(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(FindSeat::new(
        "FindSeat",
        SeatSearch::default(),
        FIND_SEAT_STEPS,
    )))
}

pub(super) fn build_sit_still(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(SitStill))
}

pub(super) fn build_walk_fast(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(WalkFast))
}

pub(super) fn build_track_character(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(TrackCharacter {
        target: args.text(0)?.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{run, scripted, template};
    use crate::script::CommandList;
    use crate::world::test_support::{def, one_actor_world};
    use crate::world::{CharacterKind, Direction};

    fn place(world: &mut crate::world::World, actor: crate::world::ActorId, location: Location) {
        world.character_mut(actor).expect("actor").location = location;
    }

    #[test]
    fn go_to_xy_say_restart_converges_and_repeats() {
        let (mut world, actor) = one_actor_world();
        let mut list = scripted(
            &mut world,
            actor,
            template(
                "Loop",
                &[("GoToXY", &["5", "10"]), ("Say", &["hi"]), ("Restart", &[])],
            ),
        );

        run(&mut list, &mut world, actor, 7);
        let character = world.character(actor).expect("actor");
        assert_eq!(character.location, Location::new(5, 10));
        assert_eq!(character.bubble.as_deref(), Some("hi"));

        place(&mut world, actor, Location::new(9, 10));
        run(&mut list, &mut world, actor, 5);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(9, 10));
        assert_eq!(list.top_name(), Some("Say"));

        run(&mut list, &mut world, actor, 4);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(5, 10));
        assert_eq!(list.top_name(), Some("GoToXY"));
        run(&mut list, &mut world, actor, 1);
        assert_eq!(list.top_name(), Some("Say"));
        assert_eq!(list.cursor(), 2);
    }

    #[test]
    fn walking_turns_before_stepping_and_stands_before_walking() {
        let (mut world, actor) = one_actor_world();
        world
            .character_mut(actor)
            .expect("actor")
            .set_animatory_state(AnimatoryState::Sitting);
        let mut list = CommandList::new();
        list.add_command(Box::new(GoToXY::new(Location::new(8, 10))));

        run(&mut list, &mut world, actor, 1);
        let character = world.character(actor).expect("actor");
        assert_eq!(character.state, AnimatoryState::Standing);
        assert_eq!(character.location, Location::new(10, 10));

        run(&mut list, &mut world, actor, 1);
        assert_eq!(world.character(actor).expect("actor").direction, Direction::Left);
        run(&mut list, &mut world, actor, 2);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(8, 10));
        run(&mut list, &mut world, actor, 1);
        assert_eq!(list.stack_len(), 0);
    }

    #[test]
    fn go_to_waits_for_unknown_location_and_walks_to_named_one() {
        let (mut world, actor) = one_actor_world();
        let mut list = CommandList::new();
        list.add_command(Box::new(GoTo::new("Nowhere")));
        run(&mut list, &mut world, actor, 3);
        assert_eq!(list.top_name(), Some("GoTo"));
        assert_eq!(world.character(actor).expect("actor").location, Location::new(10, 10));

        let mut list = CommandList::new();
        list.add_command(Box::new(GoTo::new("Landing")));
        run(&mut list, &mut world, actor, 40);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(5, 3));
        assert_eq!(list.stack_len(), 0);
    }

    #[test]
    fn shut_door_stalls_go_to_until_opened() {
        let (mut world, actor) = one_actor_world();
        place(&mut world, actor, Location::new(28, 10));
        world.map_mut().barrier_mut("TestDoor").expect("door").shut = true;
        let mut list = CommandList::new();
        list.add_command(Box::new(GoToXY::new(Location::new(33, 10))));

        run(&mut list, &mut world, actor, 5);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(29, 10));

        world.map_mut().barrier_mut("TestDoor").expect("door").shut = false;
        run(&mut list, &mut world, actor, 4);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(33, 10));
    }

    #[test]
    fn track_character_retargets_the_bottom_go_to() {
        let (mut world, actor) = one_actor_world();
        let eric = world.spawn(&def("ERIC", CharacterKind::Eric, Location::new(25, 10)));
        let mut list = CommandList::new();
        list.add_command(Box::new(GoToXY::new(Location::new(0, 10))));
        list.set_controlling_command(Box::new(TrackCharacter {
            target: "ERIC".to_string(),
        }));

        run(&mut list, &mut world, actor, 1);
        assert_eq!(list.go_to_destination(), Some(Location::new(25, 10)));

        place(&mut world, eric, Location::new(30, 10));
        run(&mut list, &mut world, actor, 1);
        assert_eq!(list.go_to_destination(), Some(Location::new(30, 10)));
        assert!(list.is_go_toing());
    }

    #[test]
    fn follow_leader_heads_for_the_leaders_destination() {
        let (mut world, actor) = one_actor_world();
        let leader = world.spawn(&def("WACKER", CharacterKind::Teacher, Location::new(12, 10)));
        world
            .character_mut(leader)
            .expect("leader")
            .command_list
            .add_command(Box::new(GoToXY::new(Location::new(30, 10))));
        let mut list = CommandList::new();
        list.add_command(Box::new(FollowLeader::new("WACKER")));

        run(&mut list, &mut world, actor, 3);

        assert_eq!(list.go_to_destination(), Some(Location::new(30, 10)));
        assert_eq!(world.character(actor).expect("actor").location, Location::new(13, 10));
    }

    #[test]
    fn patched_follow_leader_keeps_its_new_destination() {
        let (mut world, actor) = one_actor_world();
        let leader = world.spawn(&def("WACKER", CharacterKind::Teacher, Location::new(12, 10)));
        world
            .character_mut(leader)
            .expect("leader")
            .command_list
            .add_command(Box::new(GoToXY::new(Location::new(30, 10))));
        let mut list = CommandList::new();
        list.add_command(Box::new(FollowLeader::new("WACKER")));
        run(&mut list, &mut world, actor, 1);

        assert!(list.set_go_to_destination(Location::new(0, 10)));
        run(&mut list, &mut world, actor, 3);

        assert_eq!(list.go_to_destination(), Some(Location::new(0, 10)));
        assert!(world.character(actor).expect("actor").location.x < 11);
        assert_eq!(list.top_name(), Some("FollowLeader"));
    }

    #[test]
    fn find_seat_takes_the_nearest_free_chair() {
        let (mut world, actor) = one_actor_world();
        let sitter = world.spawn(&def("EINSTEIN", CharacterKind::Pupil, Location::new(12, 10)));
        world
            .character_mut(sitter)
            .expect("sitter")
            .set_animatory_state(AnimatoryState::Sitting);
        let mut list = scripted(
            &mut world,
            actor,
            template("Seat", &[("FindSeat", &[]), ("SitStill", &[])]),
        );

        run(&mut list, &mut world, actor, 6);

        let character = world.character(actor).expect("actor");
        assert_eq!(character.location, Location::new(8, 10));
        assert!(character.is_sitting());
    }

    #[test]
    fn walk_fast_runs_until_the_controlling_command_lapses() {
        let (mut world, actor) = one_actor_world();
        let mut list = CommandList::new();
        list.add_command(Box::new(GoToXY::new(Location::new(13, 10))));
        list.set_controlling_command(Box::new(WalkFast));

        run(&mut list, &mut world, actor, 1);
        assert!(world.character(actor).expect("actor").running);
        run(&mut list, &mut world, actor, 4);
        assert!(!world.character(actor).expect("actor").running);
        assert!(!list.has_controlling_command());
    }

    #[test]
    fn walk_around_returns_to_its_origin() {
        let (mut world, actor) = one_actor_world();
        let mut list = CommandList::new();
        list.add_command(Box::new(WalkAround {
            remaining: 1,
            origin: None,
            outbound: true,
        }));

        run(&mut list, &mut world, actor, 30);

        assert_eq!(list.stack_len(), 0);
        assert_eq!(world.character(actor).expect("actor").location, Location::new(10, 10));
    }
}
