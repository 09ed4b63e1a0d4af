use std::fmt;

use crate::world::{ActorId, Character, Location, World};

/// Result of advancing a [`Command`] by one step.
#[derive(Debug)]
pub enum Outcome {
    /// This tick's work is done; stay on top of the stack.
    Continue,
    /// The command has finished and is popped.
    Done,
    /// Push another command; it runs before this one is revisited.
    Push(Box<dyn Command>),
}

/// A single unit of actor behaviour with its own progress state.
///
/// A command instance is bound to exactly one actor for its whole life and is
/// never shared between command lists.
pub trait Command: fmt::Debug {
    /// Behaviour kind, as registered in the [`CommandRegistry`](super::CommandRegistry).
    fn name(&self) -> &'static str;

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome;

    /// Called when the command is removed before it reported [`Outcome::Done`].
    fn finish(&mut self, _ctx: &mut CommandContext<'_>) {}

    /// Atomic actions (door moves, punches, writing on a board) return `false`
    /// for as long as they must not be torn down.
    fn is_interruptible(&self) -> bool {
        true
    }

    /// True only for the destination-seeking family.
    fn is_go_to(&self) -> bool {
        false
    }

    fn destination(&self) -> Option<Location> {
        None
    }

    fn set_destination(&mut self, _destination: Location) {}
}

/// Mutations a running command asks of its own command list. They are applied
/// by the list once the command's `execute`/`finish` call has returned.
#[derive(Debug)]
pub(crate) enum ScriptRequest {
    Restart,
    SetRestartPoint,
    Jump(isize),
    SetTemplate(String),
    SetControllingCommand(Box<dyn Command>),
    SetSubcommand(Box<dyn Command>),
    SetGoToDestination(Location),
}

/// What a command sees while it runs: its own actor, the rest of the world, and
/// a handle on its command list.
pub struct CommandContext<'a> {
    actor: ActorId,
    world: &'a mut World,
    requests: &'a mut Vec<ScriptRequest>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        actor: ActorId,
        world: &'a mut World,
        requests: &'a mut Vec<ScriptRequest>,
    ) -> Self {
        Self {
            actor,
            world,
            requests,
        }
    }

    pub fn actor_id(&self) -> ActorId {
        self.actor
    }

    pub fn actor(&self) -> &Character {
        &self.world.characters[self.actor.index()]
    }

    pub fn actor_mut(&mut self) -> &mut Character {
        &mut self.world.characters[self.actor.index()]
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut *self.world
    }

    pub fn restart(&mut self) {
        self.requests.push(ScriptRequest::Restart);
    }

    pub fn set_restart_point(&mut self) {
        self.requests.push(ScriptRequest::SetRestartPoint);
    }

    /// Offsets are in blueprint units relative to the command being executed:
    /// `-1` re-runs it, `0` continues normally, `1` skips the next one.
    pub fn jump(&mut self, offset: isize) {
        self.requests.push(ScriptRequest::Jump(offset));
    }

    pub fn set_template(&mut self, template_id: impl Into<String>) {
        self.requests
            .push(ScriptRequest::SetTemplate(template_id.into()));
    }

    pub fn set_controlling_command(&mut self, command: Box<dyn Command>) {
        self.requests
            .push(ScriptRequest::SetControllingCommand(command));
    }

    pub fn set_subcommand(&mut self, command: Box<dyn Command>) {
        self.requests.push(ScriptRequest::SetSubcommand(command));
    }

    pub fn set_go_to_destination(&mut self, destination: Location) {
        self.requests
            .push(ScriptRequest::SetGoToDestination(destination));
    }

    /// Switches another character's script. Retargeting the running actor is
    /// routed through its own command list instead of the world.
    pub fn set_character_template(&mut self, target: ActorId, template_id: &str) -> bool {
        if target == self.actor {
            if self.world.templates().get(template_id).is_none() {
                return false;
            }
            self.set_template(template_id);
            return true;
        }
        self.world.set_character_template(target, template_id)
    }
}

/// Stand-in for a blueprint that could not be built at dispatch time.
/// It completes immediately.
#[derive(Debug)]
pub struct Inert {
    kind: &'static str,
}

impl Inert {
    pub fn new(kind: &'static str) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl Command for Inert {
    fn name(&self) -> &'static str {
        "Inert"
    }

    fn execute(&mut self, _ctx: &mut CommandContext<'_>) -> Outcome {
        Outcome::Done
    }
}
