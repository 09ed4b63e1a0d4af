use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::world::{ActorId, Location, World};

use super::command::{Command, CommandContext, Outcome, ScriptRequest};
use super::template::CommandListTemplate;

/// Upper bound on loop iterations inside one [`CommandList::command`] call.
/// A script whose every step completes immediately would otherwise spin forever.
pub const MAX_STEPS_PER_TICK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EntryId(u64);

#[derive(Debug)]
struct StackEntry {
    id: EntryId,
    command: Box<dyn Command>,
}

/// A command layered over the script: either parked here between ticks, or
/// on the stack (then `parked` is `None`).
#[derive(Debug)]
struct Layer {
    id: EntryId,
    parked: Option<Box<dyn Command>>,
    pushed: bool,
    // `finish` already ran; the timer lapse must not run it again.
    finished: bool,
}

impl Layer {
    fn new(id: EntryId, command: Box<dyn Command>) -> Self {
        Self {
            id,
            parked: Some(command),
            pushed: false,
            finished: false,
        }
    }
}

/// Per-actor scheduler: an execution stack fed from a template, plus the
/// controlling command and subcommand that are re-injected every tick.
#[derive(Debug, Default)]
pub struct CommandList {
    stack: Vec<StackEntry>,
    template: Option<Arc<CommandListTemplate>>,
    // Instantiated commands for template indices `scripted_base..`.
    scripted: Vec<Option<Box<dyn Command>>>,
    scripted_base: usize,
    cursor: usize,
    restart_cursor: usize,
    controlling: Option<Layer>,
    controlling_timer: i32,
    subcommand: Option<Layer>,
    next_entry_id: u64,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template_id(&self) -> Option<&str> {
        self.template.as_deref().map(CommandListTemplate::id)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn restart_cursor(&self) -> usize {
        self.restart_cursor
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    /// Command names from the bottom of the stack to the top.
    pub fn stack_names(&self) -> Vec<&'static str> {
        self.stack.iter().map(|entry| entry.command.name()).collect()
    }

    pub fn top_name(&self) -> Option<&'static str> {
        self.stack.last().map(|entry| entry.command.name())
    }

    /// Names of the instantiated, not yet dispatched script commands.
    pub fn scripted_names(&self) -> Vec<&'static str> {
        self.scripted
            .iter()
            .flatten()
            .map(|command| command.name())
            .collect()
    }

    pub fn has_controlling_command(&self) -> bool {
        self.controlling.is_some()
    }

    pub fn has_subcommand(&self) -> bool {
        self.subcommand.is_some()
    }

    /// Advances the owning actor by one tick.
    pub fn command(&mut self, actor: ActorId, world: &mut World) {
        if !self.stack.is_empty() && self.is_interruptible() {
            self.inject_controlling_command();
        }
        if self.is_interruptible() {
            self.inject_subcommand();
        }

        for _ in 0..MAX_STEPS_PER_TICK {
            let Some(mut entry) = self.stack.pop() else {
                self.tick_controlling_timer(actor, world);
                match self.next_scripted() {
                    Some(command) => {
                        trace!(
                            actor = actor.index(),
                            command = command.name(),
                            cursor = self.cursor,
                            "command_dispatched"
                        );
                        self.add_command(command);
                        continue;
                    }
                    None => return,
                }
            };

            let mut requests = Vec::new();
            let outcome = {
                let mut ctx = CommandContext::new(actor, world, &mut requests);
                entry.command.execute(&mut ctx)
            };
            let tick_done = match outcome {
                Outcome::Continue => {
                    self.stack.push(entry);
                    true
                }
                Outcome::Done => {
                    trace!(
                        actor = actor.index(),
                        command = entry.command.name(),
                        "command_done"
                    );
                    self.retire(entry);
                    false
                }
                Outcome::Push(next) => {
                    self.stack.push(entry);
                    self.add_command(next);
                    false
                }
            };
            self.apply_requests(actor, world, requests);
            if tick_done {
                return;
            }
        }

        warn!(
            actor = actor.index(),
            template = self.template_id().unwrap_or("<none>"),
            cursor = self.cursor,
            limit = MAX_STEPS_PER_TICK,
            "command_list_step_limit_reached"
        );
    }

    /// `false` while any command on the stack is in an atomic action.
    pub fn is_interruptible(&self) -> bool {
        self.stack
            .iter()
            .all(|entry| entry.command.is_interruptible())
    }

    /// Pushes a command on top of the stack; it runs on the actor's next tick.
    pub fn add_command(&mut self, command: Box<dyn Command>) {
        let id = self.alloc_entry_id();
        self.stack.push(StackEntry { id, command });
    }

    pub fn restart(&mut self) {
        self.restart_at(self.restart_cursor);
    }

    /// Moves the cursor to `index` and re-instantiates the script from the
    /// restart point. An index below the restart point lowers it.
    pub fn restart_at(&mut self, index: usize) {
        let len = self.template.as_ref().map_or(0, |template| template.len());
        let index = index.min(len);
        if index < self.restart_cursor {
            self.restart_cursor = index;
        }
        self.cursor = index;
        self.scripted_base = self.restart_cursor;
        self.scripted = match &self.template {
            Some(template) => template
                .instantiate(self.restart_cursor)
                .into_iter()
                .map(Some)
                .collect(),
            None => Vec::new(),
        };
    }

    pub fn set_restart_point(&mut self) {
        self.restart_cursor = self.cursor;
        self.restart();
    }

    pub fn jump(&mut self, offset: isize) {
        let target = self.cursor.saturating_add_signed(offset);
        self.restart_at(target);
    }

    /// Replaces the script. Leading interruptible stack entries are finished
    /// and dropped; everything from the first atomic action upwards stays.
    pub fn set_template(
        &mut self,
        template: Arc<CommandListTemplate>,
        actor: ActorId,
        world: &mut World,
    ) {
        while self
            .stack
            .first()
            .is_some_and(|entry| entry.command.is_interruptible())
        {
            let mut entry = self.stack.remove(0);
            self.finish_command(entry.command.as_mut(), actor, world);
            self.mark_finished(entry.id);
            self.retire(entry);
        }
        debug!(
            actor = actor.index(),
            from = self.template_id().unwrap_or("<none>"),
            to = template.id(),
            kept = self.stack.len(),
            "command_list_template_set"
        );
        self.subcommand = None;
        self.template = Some(template);
        self.restart_cursor = 0;
        self.restart();
    }

    /// Installs a command that is re-pushed every tick until it has been
    /// absent from a settled stack for one tick.
    pub fn set_controlling_command(&mut self, command: Box<dyn Command>) {
        let id = self.alloc_entry_id();
        self.controlling = Some(Layer::new(id, command));
        self.controlling_timer = 1;
    }

    pub fn set_subcommand(&mut self, command: Box<dyn Command>) {
        let id = self.alloc_entry_id();
        self.subcommand = Some(Layer::new(id, command));
    }

    pub fn clear_subcommand(&mut self) {
        self.subcommand = None;
    }

    /// Whether the bottom of the stack, the long-lived travel command, is
    /// seeking a destination.
    pub fn is_go_toing(&self) -> bool {
        self.stack
            .first()
            .is_some_and(|entry| entry.command.is_go_to())
    }

    pub fn go_to_destination(&self) -> Option<Location> {
        self.stack
            .first()
            .filter(|entry| entry.command.is_go_to())
            .and_then(|entry| entry.command.destination())
    }

    pub fn set_go_to_destination(&mut self, destination: Location) -> bool {
        match self.stack.first_mut() {
            Some(entry) if entry.command.is_go_to() => {
                entry.command.set_destination(destination);
                true
            }
            _ => false,
        }
    }

    fn alloc_entry_id(&mut self) -> EntryId {
        let id = EntryId(self.next_entry_id);
        self.next_entry_id = self.next_entry_id.wrapping_add(1);
        id
    }

    fn inject_controlling_command(&mut self) {
        let Some(layer) = self.controlling.as_mut() else {
            return;
        };
        let Some(command) = layer.parked.take() else {
            return;
        };
        layer.pushed = true;
        let id = layer.id;
        self.stack.push(StackEntry { id, command });
    }

    fn inject_subcommand(&mut self) {
        let Some(layer) = self.subcommand.as_mut() else {
            return;
        };
        let Some(command) = layer.parked.take() else {
            return;
        };
        layer.pushed = true;
        let id = layer.id;
        self.stack.push(StackEntry { id, command });
    }

    /// A popped layer command goes back to its slot; anything else is dropped.
    fn retire(&mut self, entry: StackEntry) {
        if let Some(layer) = self
            .controlling
            .as_mut()
            .filter(|layer| layer.id == entry.id)
        {
            layer.parked = Some(entry.command);
            return;
        }
        if let Some(layer) = self
            .subcommand
            .as_mut()
            .filter(|layer| layer.id == entry.id)
        {
            layer.parked = Some(entry.command);
        }
    }

    fn mark_finished(&mut self, id: EntryId) {
        if let Some(layer) = self
            .controlling
            .as_mut()
            .filter(|layer| layer.id == id)
        {
            layer.finished = true;
        }
    }

    fn tick_controlling_timer(&mut self, actor: ActorId, world: &mut World) {
        if self.controlling.is_none() {
            return;
        }
        self.controlling_timer -= 1;
        if self.controlling_timer >= 0 {
            return;
        }
        let Some(layer) = self.controlling.take() else {
            return;
        };
        // Only a command that actually reached the stack gets finished.
        if layer.pushed && !layer.finished {
            if let Some(mut command) = layer.parked {
                trace!(
                    actor = actor.index(),
                    command = command.name(),
                    "controlling_command_lapsed"
                );
                self.finish_command(command.as_mut(), actor, world);
            }
        }
    }

    fn next_scripted(&mut self) -> Option<Box<dyn Command>> {
        let template = Arc::clone(self.template.as_ref()?);
        if template.is_empty() {
            return None;
        }
        if self.cursor >= template.len() {
            if self.restart_cursor >= template.len() {
                self.restart_cursor = 0;
            }
            debug!(
                template = template.id(),
                restart_cursor = self.restart_cursor,
                "command_list_wrapped"
            );
            self.restart();
        }

        let index = self.cursor;
        self.cursor += 1;
        let slot = index
            .checked_sub(self.scripted_base)
            .and_then(|offset| self.scripted.get_mut(offset))
            .and_then(Option::take);
        match slot {
            Some(command) => Some(command),
            None => template.blueprint(index).map(|blueprint| blueprint.instantiate()),
        }
    }

    fn finish_command(&mut self, command: &mut dyn Command, actor: ActorId, world: &mut World) {
        let mut requests = Vec::new();
        {
            let mut ctx = CommandContext::new(actor, world, &mut requests);
            command.finish(&mut ctx);
        }
        self.apply_requests(actor, world, requests);
    }

    fn apply_requests(
        &mut self,
        actor: ActorId,
        world: &mut World,
        requests: Vec<ScriptRequest>,
    ) {
        for request in requests {
            match request {
                ScriptRequest::Restart => self.restart(),
                ScriptRequest::SetRestartPoint => self.set_restart_point(),
                ScriptRequest::Jump(offset) => self.jump(offset),
                ScriptRequest::SetTemplate(template_id) => {
                    match world.templates().get(&template_id) {
                        Some(template) => self.set_template(template, actor, world),
                        None => warn!(
                            actor = actor.index(),
                            template = template_id.as_str(),
                            "template_unresolved"
                        ),
                    }
                }
                ScriptRequest::SetControllingCommand(command) => {
                    self.set_controlling_command(command)
                }
                ScriptRequest::SetSubcommand(command) => self.set_subcommand(command),
                ScriptRequest::SetGoToDestination(destination) => {
                    self.set_go_to_destination(destination);
                }
            }
        }
    }
}
