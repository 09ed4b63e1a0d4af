use rand::Rng;
use tracing::{debug, warn};

use crate::script::{
    done, Args, BlueprintError, Command, CommandContext, ComplexCommand, Outcome, Step, StepFn,
};
use crate::world::{Actor, AnimatoryState, CharacterKind};

/// How long a punched or pelleted character stays down.
pub const KNOCKOUT_TICKS: u32 = 8;

#[derive(Debug, Default)]
pub struct Punch;

pub type Hit = ComplexCommand<Punch>;

fn raise_fist(_state: &mut Punch, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::ArmUp);
    Step::Finished
}

fn strike(_state: &mut Punch, ctx: &mut CommandContext<'_>) -> Step {
    let actor = ctx.actor_id();
    let facing = ctx.actor().facing();
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::Hitting);
    if let Some(victim) = ctx.world().vulnerable_character_at(facing, actor) {
        debug!(actor = actor.index(), victim = victim.index(), "punch_landed");
        ctx.world_mut().knock_over(victim, KNOCKOUT_TICKS);
    }
    Step::Finished
}

fn lower_arm<S>(_state: &mut S, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::Standing);
    Step::Finished
}

const HIT_STEPS: &[StepFn<Punch>] = &[raise_fist, strike, lower_arm, done];

pub fn hit() -> Hit {
    Hit::new("Hit", Punch, HIT_STEPS).uninterruptible()
}

#[derive(Debug)]
pub struct Catapult {
    pellet: String,
}

pub type FireCatapult = ComplexCommand<Catapult>;

fn take_aim(_state: &mut Catapult, ctx: &mut CommandContext<'_>) -> Step {
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::ArmUp);
    Step::Finished
}

fn release(state: &mut Catapult, ctx: &mut CommandContext<'_>) -> Step {
    let shooter = ctx.actor_id();
    let (from, direction) = {
        let actor = ctx.actor();
        (actor.facing(), actor.direction)
    };
    ctx.actor_mut()
        .set_animatory_state(AnimatoryState::Firing);
    match ctx.world().find_character(&state.pellet) {
        Some(pellet) => {
            if ctx
                .world_mut()
                .launch_projectile(pellet, from, direction, shooter)
            {
                debug!(actor = shooter.index(), pellet = state.pellet.as_str(), "catapult_fired");
            }
        }
        None => warn!(
            actor = shooter.index(),
            pellet = state.pellet.as_str(),
            "pellet_unresolved"
        ),
    }
    Step::Finished
}

const FIRE_STEPS: &[StepFn<Catapult>] = &[take_aim, release, lower_arm, done];

pub fn fire_catapult(pellet: impl Into<String>) -> FireCatapult {
    FireCatapult::new(
        "FireCatapult",
        Catapult {
            pellet: pellet.into(),
        },
        FIRE_STEPS,
    )
    .uninterruptible()
}

/// Controlling command for tearaways: now and then, while on their feet,
/// they throw a punch or fire their catapult.
#[derive(Debug)]
pub struct HitOrFireNowAndThen {
    pellet: String,
    percent: u32,
    acted: bool,
}

impl HitOrFireNowAndThen {
    fn pellet_ready(&self, ctx: &CommandContext<'_>) -> bool {
        ctx.world()
            .find_character(&self.pellet)
            .and_then(|id| ctx.world().character(id))
            .is_some_and(|pellet| {
                pellet.kind == CharacterKind::Projectile && pellet.flight.is_none()
            })
    }
}

impl Command for HitOrFireNowAndThen {
    fn name(&self) -> &'static str {
        "HitOrFireNowAndThen"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.acted {
            self.acted = false;
            return Outcome::Done;
        }
        let standing = matches!(
            ctx.actor().state,
            AnimatoryState::Standing | AnimatoryState::Midstride
        );
        if !standing {
            return Outcome::Done;
        }
        let percent = self.percent;
        if ctx.world_mut().rng().gen_range(0..100) >= percent {
            return Outcome::Done;
        }
        let fire = self.pellet_ready(ctx) && ctx.world_mut().rng().gen_bool(0.5);
        self.acted = true;
        if fire {
            Outcome::Push(Box::new(fire_catapult(self.pellet.clone())))
        } else {
            Outcome::Push(Box::new(hit()))
        }
    }
}

/// Lies on the floor for a while, then gets back up.
#[derive(Debug)]
pub struct KnockedOver {
    remaining: u32,
}

impl KnockedOver {
    pub fn new(ticks: u32) -> Self {
        Self { remaining: ticks }
    }
}

impl Command for KnockedOver {
    fn name(&self) -> &'static str {
        "KnockedOver"
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.remaining == 0 {
            ctx.actor_mut()
                .set_animatory_state(AnimatoryState::Standing);
            return Outcome::Done;
        }
        self.remaining -= 1;
        ctx.actor_mut()
            .set_animatory_state(AnimatoryState::KnockedOver);
        Outcome::Continue
    }

    fn is_interruptible(&self) -> bool {
        false
    }
}

pub(super) fn build_hit(_args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(hit()))
}

pub(super) fn build_fire_catapult(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(fire_catapult(args.text(0)?)))
}

pub(super) fn build_hit_or_fire_now_and_then(
    args: &Args<'_>,
) -> Result<Box<dyn Command>, BlueprintError> {
    let percent = args.count(1)?;
    if percent > 100 {
        return Err(args.invalid(format!("percent must be at most 100, got {percent}")));
    }
    Ok(Box::new(HitOrFireNowAndThen {
        pellet: args.text(0)?.to_string(),
        percent,
        acted: false,
    }))
}

pub(super) fn build_knocked_over(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
    Ok(Box::new(KnockedOver::new(args.count(0)?)))
}
