//! The per-actor behaviour scheduler.
//!
//! Every actor owns a [`CommandList`]: a stack of live [`Command`]s fed from a
//! shared, immutable [`CommandListTemplate`]. Once per tick the world calls
//! [`CommandList::command`], which drives zero or more command executions
//! synchronously before returning.

mod command;
mod command_list;
mod complex;
mod registry;
mod template;

pub use command::{Command, CommandContext, Inert, Outcome};
pub use command_list::{CommandList, MAX_STEPS_PER_TICK};
pub use complex::{done, ComplexCommand, Step, StepFn};
pub use registry::{
    Arg, ArgSchema, ArgType, Args, Blueprint, BlueprintError, CommandFactory, CommandRegistry,
    CommandSpec,
};
pub use template::{CommandListTemplate, TemplateLibrary};
