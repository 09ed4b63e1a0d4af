//! Built-in command kinds that scripts can name.

mod combat;
mod control;
mod lesson;
mod movement;
mod objects;

use crate::script::{ArgSchema, ArgType, CommandFactory, CommandRegistry};

pub use combat::{FireCatapult, Hit, HitOrFireNowAndThen, KnockedOver, KNOCKOUT_TICKS};
pub use control::{
    JumpIf, Restart, SetControllingCommand, SetRestartPoint, SetSubcommand, Signal, SitForAWhile,
    WaitUntil,
};
pub use lesson::{ConductClass, FetchTruant, Say, WipeBoard, WriteOnBoard};
pub use movement::{
    walk_towards, FindSeat, FollowLeader, GoTo, GoToRandomLocation, GoToXY, GoTowardsXY, MoveAbout,
    Progress, SitStill, TrackCharacter, WalkAround, WalkFast,
};
pub use objects::{GrowPlant, MoveBike, MoveDoor, MoveFrog, MovePellet};

const TEXT: &[ArgType] = &[ArgType::Text];
const INT: &[ArgType] = &[ArgType::Int];
const INT_INT: &[ArgType] = &[ArgType::Int, ArgType::Int];
const TEXT_INT: &[ArgType] = &[ArgType::Text, ArgType::Int];
const TEXT_TEXT: &[ArgType] = &[ArgType::Text, ArgType::Text];
const COMMAND: &[ArgType] = &[ArgType::Blueprint];

impl CommandRegistry {
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: &[(&'static str, &'static str, ArgSchema, CommandFactory)] = &[
            (
                "Restart",
                "Restart the script from its restart point",
                ArgSchema::NONE,
                control::build_restart,
            ),
            (
                "SetRestartPoint",
                "Make the current position the restart point",
                ArgSchema::NONE,
                control::build_set_restart_point,
            ),
            (
                "JumpIfShut",
                "<door> <offset>: jump when the door is shut",
                ArgSchema::new(TEXT_INT),
                control::build_jump_if_shut,
            ),
            (
                "JumpIfOpen",
                "<door> <offset>: jump when the door is open",
                ArgSchema::new(TEXT_INT),
                control::build_jump_if_open,
            ),
            (
                "JumpIfSignal",
                "<signal> <offset>: jump when the signal is raised",
                ArgSchema::new(TEXT_INT),
                control::build_jump_if_signal,
            ),
            (
                "Signal",
                "<signal>: raise a lesson signal",
                ArgSchema::new(TEXT),
                control::build_signal,
            ),
            (
                "Unsignal",
                "<signal>: lower a lesson signal",
                ArgSchema::new(TEXT),
                control::build_unsignal,
            ),
            (
                "WaitUntil",
                "<signal>: wait for a lesson signal",
                ArgSchema::new(TEXT),
                control::build_wait_until,
            ),
            (
                "SetControllingCommand",
                "<kind> [args...]: install a controlling command",
                ArgSchema::new(COMMAND),
                control::build_set_controlling_command,
            ),
            (
                "SetSubcommand",
                "<kind> [args...]: install a subcommand",
                ArgSchema::new(COMMAND),
                control::build_set_subcommand,
            ),
            (
                "SitForAWhile",
                "<min> <max>: sit for a random number of actions",
                ArgSchema::new(INT_INT),
                control::build_sit_for_a_while,
            ),
            (
                "GoTo",
                "<location>: walk to a named location",
                ArgSchema::new(TEXT),
                movement::build_go_to,
            ),
            (
                "GoToXY",
                "<x> <y>: walk to coordinates",
                ArgSchema::new(INT_INT),
                movement::build_go_to_xy,
            ),
            (
                "GoTowardsXY",
                "<x> <y>: take one step towards coordinates",
                ArgSchema::new(INT_INT),
                movement::build_go_towards_xy,
            ),
            (
                "GoToRandomLocation",
                "[location...]: walk to a random location",
                ArgSchema::NONE.with_rest(ArgType::Text),
                movement::build_go_to_random_location,
            ),
            (
                "MoveAbout",
                "<range>: wander near the current position",
                ArgSchema::new(INT),
                movement::build_move_about,
            ),
            (
                "WalkAround",
                "<times>: pace up and down",
                ArgSchema::new(INT),
                movement::build_walk_around,
            ),
            (
                "FollowLeader",
                "<character>: follow another character",
                ArgSchema::new(TEXT),
                movement::build_follow_leader,
            ),
            (
                "FindSeat",
                "Find a free chair and sit on it",
                ArgSchema::NONE,
                movement::build_find_seat,
            ),
            (
                "SitStill",
                "Sit down and stay put",
                ArgSchema::NONE,
                movement::build_sit_still,
            ),
            (
                "WalkFast",
                "Run while installed as a controlling command",
                ArgSchema::NONE,
                movement::build_walk_fast,
            ),
            (
                "TrackCharacter",
                "<character>: keep the current destination on a character",
                ArgSchema::new(TEXT),
                movement::build_track_character,
            ),
            (
                "Hit",
                "Throw a punch",
                ArgSchema::NONE,
                combat::build_hit,
            ),
            (
                "FireCatapult",
                "<pellet>: fire a catapult pellet",
                ArgSchema::new(TEXT),
                combat::build_fire_catapult,
            ),
            (
                "HitOrFireNowAndThen",
                "<pellet> <percent>: sometimes hit or fire",
                ArgSchema::new(TEXT_INT),
                combat::build_hit_or_fire_now_and_then,
            ),
            (
                "KnockedOver",
                "<ticks>: lie on the floor",
                ArgSchema::new(INT),
                combat::build_knocked_over,
            ),
            (
                "Say",
                "<text...>: speak",
                ArgSchema::new(TEXT).with_rest(ArgType::Text),
                lesson::build_say,
            ),
            (
                "WriteOnBoard",
                "<board> <text...>: write on a blackboard",
                ArgSchema::new(TEXT_TEXT).with_rest(ArgType::Text),
                lesson::build_write_on_board,
            ),
            (
                "WipeBoard",
                "<board>: wipe a blackboard",
                ArgSchema::new(TEXT),
                lesson::build_wipe_board,
            ),
            (
                "ConductClass",
                "<text...>: teach a lesson",
                ArgSchema::new(TEXT).with_rest(ArgType::Text),
                lesson::build_conduct_class,
            ),
            (
                "FetchTruant",
                "<character> <text> [template]: fetch a missing pupil",
                ArgSchema::new(TEXT_TEXT).with_optional(TEXT),
                lesson::build_fetch_truant,
            ),
            (
                "OpenDoor",
                "<door>: open a door",
                ArgSchema::new(TEXT),
                objects::build_open_door,
            ),
            (
                "ShutDoor",
                "<door>: shut a door",
                ArgSchema::new(TEXT),
                objects::build_shut_door,
            ),
            (
                "MovePellet",
                "<range>: fly while launched",
                ArgSchema::new(INT),
                objects::build_move_pellet,
            ),
            (
                "MoveFrog",
                "Hop about",
                ArgSchema::NONE,
                objects::build_move_frog,
            ),
            (
                "GrowPlant",
                "<grow> <bloom>: grow once watered",
                ArgSchema::new(INT_INT),
                objects::build_grow_plant,
            ),
            (
                "MoveBike",
                "Roll while pushed",
                ArgSchema::NONE,
                objects::build_move_bike,
            ),
        ];
        for &(name, help, schema, factory) in builtins {
            registry
                .register(name, help, schema, factory)
                .expect("built-in command registration should not fail");
        }
        registry
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::script::{CommandList, CommandListTemplate};
    use crate::world::{ActorId, World};
    use crate::CommandRegistry;

    pub(crate) fn template(id: &str, steps: &[(&str, &[&str])]) -> Arc<CommandListTemplate> {
        let registry = CommandRegistry::with_builtins();
        let mut template = CommandListTemplate::new(id);
        for (kind, args) in steps {
            let raw = args.iter().map(|arg| arg.to_string()).collect::<Vec<_>>();
            template.add_blueprint(registry.resolve(kind, &raw).expect("resolve"));
        }
        Arc::new(template)
    }

    pub(crate) fn scripted(
        world: &mut World,
        actor: ActorId,
        template: Arc<CommandListTemplate>,
    ) -> CommandList {
        let mut list = CommandList::new();
        list.set_template(template, actor, world);
        list
    }

    pub(crate) fn run(list: &mut CommandList, world: &mut World, actor: ActorId, ticks: usize) {
        for _ in 0..ticks {
            list.command(actor, world);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_looked_up_case_insensitively() {
        let registry = CommandRegistry::with_builtins();
        assert!(registry.len() >= 37);
        assert_eq!(registry.spec("gotoxy").map(|spec| spec.name()), Some("GoToXY"));
        assert!(registry.spec("Teleport").is_none());
    }

    #[test]
    fn nested_blueprint_takes_the_remaining_arguments() {
        let registry = CommandRegistry::with_builtins();
        let raw = ["GoToXY", "3", "10"].map(str::to_string);

        let blueprint = registry
            .resolve("SetSubcommand", &raw)
            .expect("resolve nested");

        assert_eq!(blueprint.kind(), "SetSubcommand");
        assert_eq!(blueprint.args().len(), 1);
    }

    #[test]
    fn bad_builtin_arguments_fail_at_load_time() {
        let registry = CommandRegistry::with_builtins();
        assert!(registry.resolve("GoToXY", &["x".to_string(), "1".to_string()]).is_err());
        assert!(registry
            .resolve("SitForAWhile", &["9".to_string(), "2".to_string()])
            .is_err());
        assert!(registry.resolve("KnockedOver", &["-1".to_string()]).is_err());
    }
}
