use tracing::{debug, warn};

use super::movement::{GoTo, GoToXY};
use crate::script::{
    done, Args, BlueprintError, Command, CommandContext, ComplexCommand, Outcome, Step, StepFn,
};
use crate::world::{Actor, AnimatoryState};

const SAY_EXTRA_TICKS: u32 = 4;

/// Shows a speech bubble for a time proportional to its length.
#[derive(Debug)]
pub struct Say {
    text: String,
    remaining: Option<u32>,
}

impl Say {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            remaining: None,
        }
    }
}

impl Command for Say {
    fn name(&self) -> &'static str {
        "Say"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        let Some(remaining) = self.remaining else {
            self.remaining = Some(self.text.chars().count() as u32 + SAY_EXTRA_TICKS);
            ctx.actor_mut().bubble = Some(self.text.clone());
            return Outcome::Continue;
        };
        let remaining = remaining.saturating_sub(1);
        self.remaining = Some(remaining);
        if remaining > 0 {
            return Outcome::Continue;
        }
        ctx.actor_mut().bubble = None;
        Outcome::Done
    }

    fn finish(&mut self, ctx: &mut CommandContext<'_>) {
        ctx.actor_mut().bubble = None;
    }
}

/// Writes one character per action; the arm stays raised until done.
#[derive(Debug)]
pub struct WriteOnBoard {
    board: String,
    text: Vec<char>,
    written: usize,
}

impl WriteOnBoard {
    fn write_next(&mut self, ctx: &mut CommandContext<'_>) -> bool {
        let writer = ctx.actor_id();
        let Some(ch) = self.text.get(self.written).copied() else {
            return false;
        };
        let Some(board) = ctx.world_mut().map_mut().blackboard_mut(&self.board) else {
            return false;
        };
        if !board.write_char(ch, writer) {
            return false;
        }
        self.written += 1;
        true
    }
}

impl Command for WriteOnBoard {
    fn name(&self) -> &'static str {
        "WriteOnBoard"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if ctx.world().map().blackboard(&self.board).is_none() {
            warn!(
                actor = ctx.actor_id().index(),
                board = self.board.as_str(),
                "blackboard_unresolved"
            );
            return Outcome::Done;
        }
        if self.written == 0 {
            let board = self.board.clone();
            if let Some(board) = ctx.world_mut().map_mut().blackboard_mut(&board) {
                board.wipe();
            }
        }
        if self.write_next(ctx) {
            let state = if self.written % 2 == 0 {
                AnimatoryState::Standing
            } else {
                AnimatoryState::ArmUp
            };
            ctx.actor_mut().set_animatory_state(state);
            return Outcome::Continue;
        }
        ctx.actor_mut()
            .set_animatory_state(AnimatoryState::Standing);
        Outcome::Done
    }

    fn finish(&mut self, ctx: &mut CommandContext<'_>) {
        while self.write_next(ctx) {}
        ctx.actor_mut()
            .set_animatory_state(AnimatoryState::Standing);
    }

    fn is_interruptible(&self) -> bool {
        false
    }
}

#[derive(Debug)]
pub struct Wipe {
    board: String,
}

pub type WipeBoard = ComplexCommand<Wipe>;

fn approach_board(state: &mut Wipe, ctx: &mut CommandContext<'_>) -> Step {
    match ctx.world().map().blackboard(&state.board) {
        Some(board) => Step::Push(Box::new(GoToXY::new(board.location))),
        None => {
            warn!(
                actor = ctx.actor_id().index(),
                board = state.board.as_str(),
                "blackboard_unresolved"
            );
            Step::Done
        }
    }
}

fn wipe(state: &mut Wipe, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::ArmUp);
    if let Some(board) = ctx.world_mut().map_mut().blackboard_mut(&state.board) {
        board.wipe();
    }
    Step::Finished
}

fn lower_duster(_state: &mut Wipe, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::Standing);
    Step::Finished
}

const WIPE_STEPS: &[StepFn<Wipe>] = &[approach_board, wipe, lower_duster, done];

const CLASS_PAUSE_TICKS: u32 = 6;

#[derive(Debug)]
pub struct Class {
    text: String,
    paused: u32,
}

pub type ConductClass = ComplexCommand<Class>;

fn tell_class(state: &mut Class, _ctx: &mut CommandContext<'_>) -> Step {
    state.paused = 0;
    Step::Push(Box::new(Say::new(state.text.clone())))
}

fn pause(state: &mut Class, _ctx: &mut CommandContext<'_>) -> Step {
    state.paused += 1;
    if state.paused < CLASS_PAUSE_TICKS {
        Step::Pending
    } else {
        Step::Finished
    }
}

fn pace(_state: &mut Class, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut().turn();
    Step::Finished
}

// Never finishes; the bell replaces the script.
const CLASS_STEPS: &[StepFn<Class>] = &[tell_class, pause, pace];

#[derive(Debug)]
pub struct Truancy {
    truant: String,
    text: String,
    follow_template: Option<String>,
}

pub type FetchTruant = ComplexCommand<Truancy>;

fn find_truant(state: &mut Truancy, ctx: &mut CommandContext<'_>) -> Step {
    if ctx.world().find_character(&state.truant).is_none() {
        warn!(
            actor = ctx.actor_id().index(),
            truant = state.truant.as_str(),
            "truant_unresolved"
        );
        return Step::Done;
    }
    Step::Push(Box::new(GoTo::new(state.truant.clone())))
}

fn scold(state: &mut Truancy, _ctx: &mut CommandContext<'_>) -> Step {
    Step::Push(Box::new(Say::new(state.text.clone())))
}

fn send_back(state: &mut Truancy, ctx: &mut CommandContext<'_>) -> Step {
    if let (Some(truant), Some(template)) = (
        ctx.world().find_character(&state.truant),
        state.follow_template.as_deref(),
    ) {
        if ctx.set_character_template(truant, template) {
            debug!(
                actor = ctx.actor_id().index(),
                truant = truant.index(),
                template,
                "truant_sent_back"
            );
        }
    }
    ctx.restart();
    Step::Done
}

const FETCH_STEPS: &[StepFn<Truancy>] = &[find_truant, scold, send_back];

pub(super) fn build_say(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(Say::new(args.texts_from(0)?.join(" "))))
}

pub(super) fn build_write_on_board(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    let text = args.texts_from(1)?.join(" ");
    Ok(Box::new(WriteOnBoard {
        board: args.text(0)?.to_string(),
        text: text.chars().collect(),
        written: 0,
    }))
}

pub(super) fn build_wipe_board(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(WipeBoard::new(
        "WipeBoard",
        Wipe {
            board: args.text(0)?.to_string(),
        },
        WIPE_STEPS,
    )))
}

pub(super) fn build_conduct_class(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(ConductClass::new(
        "ConductClass",
        Class {
            text: args.texts_from(0)?.join(" "),
            paused: 0,
        },
        CLASS_STEPS,
    )))
}

pub(super) fn build_fetch_truant(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    let follow_template = if args.len() > 2 {
        Some(args.text(2)?.to_string())
    } else {
        None
    };
    Ok(Box::new(FetchTruant::new(
        "FetchTruant",
        Truancy {
            truant: args.text(0)?.to_string(),
            text: args.text(1)?.to_string(),
            follow_template,
        },
        FETCH_STEPS,
    )))
}
