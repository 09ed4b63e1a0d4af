use rand::Rng;
use tracing::warn;

use crate::script::{Args, Blueprint, BlueprintError, Command, CommandContext, Outcome};
use crate::world::{Actor, AnimatoryState};

#[derive(Debug)]
pub struct Restart;

impl Command for Restart {
    fn name(&self) -> &'static str {
        "Restart"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        ctx.restart();
        Outcome::Done
    }
}

#[derive(Debug)]
pub struct SetRestartPoint;

impl Command for SetRestartPoint {
    fn name(&self) -> &'static str {
        "SetRestartPoint"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        ctx.set_restart_point();
        Outcome::Done
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    DoorShut(String),
    DoorOpen(String),
    Signalled(String),
}

/// Jumps `offset` script entries when its condition holds, otherwise falls
/// through to the next entry.
#[derive(Debug)]
pub struct JumpIf {
    name: &'static str,
    condition: Condition,
    offset: isize,
}

impl JumpIf {
    fn holds(&self, ctx: &CommandContext<'_>) -> bool {
        match &self.condition {
            Condition::DoorShut(door) | Condition::DoorOpen(door) => {
                let Some(barrier) = ctx.world().map().barrier(door) else {
                    warn!(
                        actor = ctx.actor_id().index(),
                        door = door.as_str(),
                        "door_unresolved"
                    );
                    return false;
                };
                barrier.shut == matches!(self.condition, Condition::DoorShut(_))
            }
            Condition::Signalled(signal) => ctx.world().is_signalled(signal),
        }
    }
}

impl Command for JumpIf {
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.holds(ctx) {
            ctx.jump(self.offset);
        }
        Outcome::Done
    }
}

#[derive(Debug)]
pub struct Signal {
    signal: String,
    raise: bool,
}

impl Command for Signal {
    fn name(&self) -> &'static str {
        if self.raise {
            "Signal"
        } else {
            "Unsignal"
        }
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.raise {
            ctx.world_mut().signal(&self.signal);
        } else {
            ctx.world_mut().unsignal(&self.signal);
        }
        Outcome::Done
    }
}

#[derive(Debug)]
pub struct WaitUntil {
    signal: String,
}

impl Command for WaitUntil {
    fn name(&self) -> &'static str {
        "WaitUntil"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if ctx.world().is_signalled(&self.signal) {
            Outcome::Done
        } else {
            Outcome::Continue
        }
    }
}

/// Builds a fresh command from its blueprint every time it runs and installs
/// it as the actor's controlling command.
#[derive(Debug)]
pub struct SetControllingCommand {
    blueprint: Blueprint,
}

impl Command for SetControllingCommand {
    fn name(&self) -> &'static str {
        "SetControllingCommand"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        ctx.set_controlling_command(self.blueprint.instantiate());
        Outcome::Done
    }
}

#[derive(Debug)]
pub struct SetSubcommand {
    blueprint: Blueprint,
}

impl Command for SetSubcommand {
    fn name(&self) -> &'static str {
        "SetSubcommand"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        ctx.set_subcommand(self.blueprint.instantiate());
        Outcome::Done
    }
}

/// Sits down, then stays seated for a random number of actions.
#[derive(Debug)]
pub struct SitForAWhile {
    min: u32,
    max: u32,
    remaining: Option<u32>,
}

impl Command for SitForAWhile {
    fn name(&self) -> &'static str {
        "SitForAWhile"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        let remaining = match self.remaining {
            Some(remaining) => remaining,
            None => {
                let (min, max) = (self.min, self.max);
                ctx.actor_mut()
                    .set_animatory_state(AnimatoryState::Sitting);
                let ticks = ctx.world_mut().rng().gen_range(min..=max);
                self.remaining = Some(ticks);
                return Outcome::Continue;
            }
        };
        if remaining == 0 {
            return Outcome::Done;
        }
        self.remaining = Some(remaining - 1);
        Outcome::Continue
    }
}

pub(super) fn build_restart(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(Restart))
}

pub(super) fn build_set_restart_point(
    _args: &Args<'_>,
) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(SetRestartPoint))
}

fn offset(args: &Args<'_>, index: usize) -> Result<isize, BlueprintError> {
    Ok(args.int(index)? as isize)
}

pub(super) fn build_jump_if_shut(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(JumpIf {
        name: "JumpIfShut",
        condition: Condition::DoorShut(args.text(0)?.to_string()),
        offset: offset(args, 1)?,
    }))
}

pub(super) fn build_jump_if_open(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(JumpIf {
        name: "JumpIfOpen",
        condition: Condition::DoorOpen(args.text(0)?.to_string()),
        offset: offset(args, 1)?,
    }))
}

pub(super) fn build_jump_if_signal(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(JumpIf {
        name: "JumpIfSignal",
        condition: Condition::Signalled(args.text(0)?.to_string()),
        offset: offset(args, 1)?,
    }))
}

pub(super) fn build_signal(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(Signal {
        signal: args.text(0)?.to_string(),
        raise: true,
    }))
}

pub(super) fn build_unsignal(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(Signal {
        signal: args.text(0)?.to_string(),
        raise: false,
    }))
}

pub(super) fn build_wait_until(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(WaitUntil {
        signal: args.text(0)?.to_string(),
    }))
}

pub(super) fn build_set_controlling_command(
    args: &Args<'_>,
) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(SetControllingCommand {
        blueprint: args.blueprint(0)?.clone(),
    }))
}

pub(super) fn build_set_subcommand(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(SetSubcommand {
        blueprint: args.blueprint(0)?.clone(),
    }))
}

pub(super) fn build_sit_for_a_while(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    let min = args.count(0)?;
    let max = args.count(1)?;
    if min > max {
        return Err(args.invalid(format!("minimum {min} is greater than maximum {max}")));
    }
    Ok(Box::new(SitForAWhile {
        min,
        max,
        remaining: None,
    }))
}
