use std::fmt;

use super::command::{Command, CommandContext, Outcome};

/// What a single step of a [`ComplexCommand`] reports back.
#[derive(Debug)]
pub enum Step {
    /// Not finished; run the same step again next tick.
    Pending,
    /// Finished; the next step runs next tick. The last step wraps to the first.
    Finished,
    /// The whole command is finished.
    Done,
    /// Push another command, then carry on with the next step once it is done.
    Push(Box<dyn Command>),
    /// Finished; start again from the first step next tick.
    Restart,
}

pub type StepFn<S> = fn(&mut S, &mut CommandContext<'_>) -> Step;

/// Conventional terminal step.
pub fn done<S>(_state: &mut S, _ctx: &mut CommandContext<'_>) -> Step {
    Step::Done
}

/// A command made from a fixed, ordered list of steps sharing one state value.
pub struct ComplexCommand<S: 'static> {
    name: &'static str,
    state: S,
    steps: &'static [StepFn<S>],
    // `None` means "begin at step 0 on the next execute".
    index: Option<usize>,
    interruptible: bool,
}

impl<S: 'static> ComplexCommand<S> {
    pub fn new(name: &'static str, state: S, steps: &'static [StepFn<S>]) -> Self {
        Self {
            name,
            state,
            steps,
            index: None,
            interruptible: true,
        }
    }

    pub fn uninterruptible(mut self) -> Self {
        self.interruptible = false;
        self
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn step_index(&self) -> usize {
        self.index.unwrap_or(0)
    }

    pub fn restart(&mut self) {
        self.index = None;
    }

    fn advance(&mut self, from: usize) {
        self.index = Some((from + 1) % self.steps.len());
    }
}

impl<S> fmt::Debug for ComplexCommand<S>
where
    S: fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComplexCommand")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("index", &self.index)
            .field("steps", &self.steps.len())
            .field("interruptible", &self.interruptible)
            .finish()
    }
}

impl<S> Command for ComplexCommand<S>
where
    S: fmt::Debug + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(&mut self, ctx: &mut CommandContext<'_>) -> Outcome {
        if self.steps.is_empty() {
            return Outcome::Done;
        }
        let index = self.index.unwrap_or(0);
        self.index = Some(index);
        match (self.steps[index])(&mut self.state, ctx) {
            Step::Pending => Outcome::Continue,
            Step::Finished => {
                self.advance(index);
                Outcome::Continue
            }
            Step::Done => Outcome::Done,
            Step::Push(next) => {
                self.advance(index);
                Outcome::Push(next)
            }
            Step::Restart => {
                self.restart();
                Outcome::Continue
            }
        }
    }

    fn is_interruptible(&self) -> bool {
        self.interruptible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::test_support::one_actor_world;

    #[derive(Debug, Default)]
    struct Trace {
        calls: Vec<&'static str>,
        waits: u32,
    }

    fn first(state: &mut Trace, _ctx: &mut CommandContext<'_>) -> Step {
        state.calls.push("first");
        Step::Finished
    }

    fn wait_twice(state: &mut Trace, _ctx: &mut CommandContext<'_>) -> Step {
        state.calls.push("wait");
        state.waits += 1;
        if state.waits < 3 {
            Step::Pending
        } else {
            Step::Finished
        }
    }

    fn again(state: &mut Trace, _ctx: &mut CommandContext<'_>) -> Step {
        state.calls.push("again");
        if state.calls.iter().filter(|call| **call == "again").count() == 1 {
            Step::Restart
        } else {
            Step::Done
        }
    }

    fn push_inert(state: &mut Trace, _ctx: &mut CommandContext<'_>) -> Step {
        state.calls.push("push");
        Step::Push(Box::new(crate::script::Inert::new("Probe")))
    }

    const WAITING_STEPS: &[StepFn<Trace>] = &[first, wait_twice, done];
    const RESTARTING_STEPS: &[StepFn<Trace>] = &[first, again];
    const PUSHING_STEPS: &[StepFn<Trace>] = &[first, push_inert];
    const DONE_STEPS: &[StepFn<Trace>] = &[done];

    #[test]
    fn pending_step_repeats_and_finished_step_advances() {
        let (mut world, actor) = one_actor_world();
        let mut requests = Vec::new();
        let mut command = ComplexCommand::new("Probe", Trace::default(), WAITING_STEPS);
        let mut ctx = crate::script::CommandContext::new(actor, &mut world, &mut requests);

        assert!(matches!(command.execute(&mut ctx), Outcome::Continue));
        assert_eq!(command.step_index(), 1);
        assert!(matches!(command.execute(&mut ctx), Outcome::Continue));
        assert!(matches!(command.execute(&mut ctx), Outcome::Continue));
        assert_eq!(command.step_index(), 1);
        assert!(matches!(command.execute(&mut ctx), Outcome::Continue));
        assert_eq!(command.step_index(), 2);
        assert!(matches!(command.execute(&mut ctx), Outcome::Done));
        assert_eq!(command.state().calls, vec!["first", "wait", "wait", "wait"]);
    }

    #[test]
    fn restart_begins_again_at_first_step() {
        let (mut world, actor) = one_actor_world();
        let mut requests = Vec::new();
        let mut command = ComplexCommand::new("Probe", Trace::default(), RESTARTING_STEPS);
        let mut ctx = crate::script::CommandContext::new(actor, &mut world, &mut requests);

        let mut done = false;
        for _ in 0..5 {
            if matches!(command.execute(&mut ctx), Outcome::Done) {
                done = true;
                break;
            }
        }

        assert!(done);
        assert_eq!(command.state().calls, vec!["first", "again", "first", "again"]);
    }

    #[test]
    fn pushing_advances_and_last_step_wraps() {
        let (mut world, actor) = one_actor_world();
        let mut requests = Vec::new();
        let mut command = ComplexCommand::new("Probe", Trace::default(), PUSHING_STEPS);
        let mut ctx = crate::script::CommandContext::new(actor, &mut world, &mut requests);

        assert!(matches!(command.execute(&mut ctx), Outcome::Continue));
        match command.execute(&mut ctx) {
            Outcome::Push(pushed) => assert_eq!(pushed.name(), "Inert"),
            other => panic!("expected push, got {other:?}"),
        }
        assert_eq!(command.step_index(), 0);
    }

    #[test]
    fn uninterruptible_flag_is_reported() {
        let command = ComplexCommand::new("Probe", Trace::default(), DONE_STEPS).uninterruptible();
        assert!(!command.is_interruptible());
    }
}
