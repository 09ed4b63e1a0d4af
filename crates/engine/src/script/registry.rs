use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::warn;

use super::command::{Command, Inert};

/// A construction parameter, already typed at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    Text(String),
    Blueprint(Box<Blueprint>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Int,
    Text,
    /// A nested `kind arg...` sequence; consumes every remaining raw argument.
    Blueprint,
}

#[derive(Debug, Clone, Copy)]
pub struct ArgSchema {
    pub required: &'static [ArgType],
    pub optional: &'static [ArgType],
    pub rest: Option<ArgType>,
}

impl ArgSchema {
    pub const NONE: Self = Self::new(&[]);

    pub const fn new(required: &'static [ArgType]) -> Self {
        Self {
            required,
            optional: &[],
            rest: None,
        }
    }

    pub const fn with_optional(mut self, optional: &'static [ArgType]) -> Self {
        self.optional = optional;
        self
    }

    pub const fn with_rest(mut self, rest: ArgType) -> Self {
        self.rest = Some(rest);
        self
    }

    fn positional_count(&self) -> usize {
        self.required.len() + self.optional.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    #[error("unknown command kind '{name}'")]
    UnknownKind { name: String },
    #[error("command kind '{name}' is registered twice")]
    DuplicateKind { name: String },
    #[error("{kind}: missing argument {index} ({expected:?})")]
    MissingArgument {
        kind: String,
        index: usize,
        expected: ArgType,
    },
    #[error("{kind}: expected at most {expected} arguments, found {found}")]
    TooManyArguments {
        kind: String,
        expected: usize,
        found: usize,
    },
    #[error("{kind}: argument {index} must be an integer, got '{value}'")]
    InvalidInt {
        kind: String,
        index: usize,
        value: String,
    },
    #[error("{kind}: {message}")]
    InvalidArgument { kind: String, message: String },
}

/// Typed view over a blueprint's arguments, handed to command factories.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    kind: &'static str,
    values: &'a [Arg],
}

impl<'a> Args<'a> {
    pub fn new(kind: &'static str, values: &'a [Arg]) -> Self {
        Self { kind, values }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, index: usize) -> Result<i32, BlueprintError> {
        match self.values.get(index) {
            Some(Arg::Int(value)) => Ok(*value),
            Some(other) => Err(self.invalid(format!(
                "argument {index} is not an integer: {other:?}"
            ))),
            None => Err(self.missing(index, ArgType::Int)),
        }
    }

    pub fn int_or(&self, index: usize, default: i32) -> Result<i32, BlueprintError> {
        if index >= self.values.len() {
            return Ok(default);
        }
        self.int(index)
    }

    /// Integer that must be zero or positive.
    pub fn count(&self, index: usize) -> Result<u32, BlueprintError> {
        let value = self.int(index)?;
        u32::try_from(value)
            .map_err(|_| {
                self.invalid(format!(
                    "argument {index} must not be negative, got {value}"
                ))
            })
    }

    pub fn count_or(&self, index: usize, default: u32) -> Result<u32, BlueprintError> {
        if index >= self.values.len() {
            return Ok(default);
        }
        self.count(index)
    }

    pub fn text(&self, index: usize) -> Result<&'a str, BlueprintError> {
        match self.values.get(index) {
            Some(Arg::Text(value)) => Ok(value.as_str()),
            Some(other) => Err(self.invalid(format!("argument {index} is not text: {other:?}"))),
            None => Err(self.missing(index, ArgType::Text)),
        }
    }

    pub fn texts_from(&self, index: usize) -> Result<Vec<String>, BlueprintError> {
        (index..self.values.len())
            .map(|i| self.text(i).map(str::to_string))
            .collect()
    }

    pub fn blueprint(&self, index: usize) -> Result<&'a Blueprint, BlueprintError> {
        match self.values.get(index) {
            Some(Arg::Blueprint(value)) => Ok(value.as_ref()),
            Some(other) => Err(self.invalid(format!(
                "argument {index} is not a command: {other:?}"
            ))),
            None => Err(self.missing(index, ArgType::Blueprint)),
        }
    }

    pub fn invalid(&self, message: impl Into<String>) -> BlueprintError {
        BlueprintError::InvalidArgument {
            kind: self.kind.to_string(),
            message: message.into(),
        }
    }

    fn missing(&self, index: usize, expected: ArgType) -> BlueprintError {
        BlueprintError::MissingArgument {
            kind: self.kind.to_string(),
            index,
            expected,
        }
    }
}

pub type CommandFactory = fn(&Args<'_>) -> Result<Box<dyn Command>, BlueprintError>;

/// An unconstructed command: kind, typed arguments, and the factory that
/// stamps out fresh instances of it.
#[derive(Clone)]
pub struct Blueprint {
    kind: &'static str,
    args: Vec<Arg>,
    factory: CommandFactory,
}

impl Blueprint {
    pub fn new(kind: &'static str, args: Vec<Arg>, factory: CommandFactory) -> Self {
        Self {
            kind,
            args,
            factory,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn build(&self) -> Result<Box<dyn Command>, BlueprintError> {
        (self.factory)(&Args::new(self.kind, &self.args))
    }

    /// Builds a fresh command; a failing factory yields an [`Inert`] command.
    pub fn instantiate(&self) -> Box<dyn Command> {
        match self.build() {
            Ok(command) => command,
            Err(error) => {
                warn!(kind = self.kind, error = %error, "blueprint_instantiation_failed");
                Box::new(Inert::new(self.kind))
            }
        }
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("kind", &self.kind)
            .field("args", &self.args)
            .finish()
    }
}

impl PartialEq for Blueprint {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.args == other.args
    }
}

pub struct CommandSpec {
    name: &'static str,
    help: &'static str,
    schema: ArgSchema,
    factory: CommandFactory,
}

impl CommandSpec {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn help(&self) -> &'static str {
        self.help
    }

    pub fn schema(&self) -> ArgSchema {
        self.schema
    }
}

/// Name → factory table used to resolve script data into [`Blueprint`]s.
/// Lookups are case-insensitive; unknown kinds are rejected at load time.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
    lookup_by_lower_name: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            lookup_by_lower_name: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &'static str,
        help: &'static str,
        schema: ArgSchema,
        factory: CommandFactory,
    ) -> Result<(), BlueprintError> {
        let key = name.to_ascii_lowercase();
        if self.lookup_by_lower_name.contains_key(&key) {
            return Err(BlueprintError::DuplicateKind {
                name: name.to_string(),
            });
        }
        self.lookup_by_lower_name.insert(key, self.specs.len());
        self.specs.push(CommandSpec {
            name,
            help,
            schema,
            factory,
        });
        Ok(())
    }

    pub fn spec(&self, name: &str) -> Option<&CommandSpec> {
        self.lookup_by_lower_name
            .get(&name.to_ascii_lowercase())
            .and_then(|index| self.specs.get(*index))
    }

    pub fn specs(&self) -> &[CommandSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Types `raw` against the kind's schema and trial-builds the result once,
    /// so bad values are reported here rather than when an actor reaches them.
    pub fn resolve(&self, name: &str, raw: &[String]) -> Result<Blueprint, BlueprintError> {
        let spec = self.spec(name).ok_or_else(|| BlueprintError::UnknownKind {
            name: name.to_string(),
        })?;
        let schema = spec.schema;
        let mut args = Vec::with_capacity(raw.len());
        let mut index = 0usize;

        let positional = schema
            .required
            .iter()
            .map(|arg_type| (*arg_type, true))
            .chain(schema.optional.iter().map(|arg_type| (*arg_type, false)));
        for (arg_type, required) in positional {
            if index >= raw.len() {
                if required {
                    return Err(BlueprintError::MissingArgument {
                        kind: spec.name.to_string(),
                        index,
                        expected: arg_type,
                    });
                }
                break;
            }
            if arg_type == ArgType::Blueprint {
                let nested = self.resolve(&raw[index], &raw[index + 1..])?;
                args.push(Arg::Blueprint(Box::new(nested)));
                index = raw.len();
                break;
            }
            args.push(parse_scalar(spec.name, index, arg_type, &raw[index])?);
            index += 1;
        }

        if index < raw.len() {
            match schema.rest {
                Some(ArgType::Blueprint) | None => {
                    return Err(BlueprintError::TooManyArguments {
                        kind: spec.name.to_string(),
                        expected: schema.positional_count(),
                        found: raw.len(),
                    });
                }
                Some(arg_type) => {
                    for (offset, value) in raw[index..].iter().enumerate() {
                        args.push(parse_scalar(spec.name, index + offset, arg_type, value)?);
                    }
                }
            }
        }

        let blueprint = Blueprint::new(spec.name, args, spec.factory);
        blueprint.build()?;
        Ok(blueprint)
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_scalar(
    kind: &str,
    index: usize,
    arg_type: ArgType,
    raw: &str,
) -> Result<Arg, BlueprintError> {
    match arg_type {
        ArgType::Int => raw
            .trim()
            .parse::<i32>()
            .map(Arg::Int)
            .map_err(|_| BlueprintError::InvalidInt {
                kind: kind.to_string(),
                index,
                value: raw.to_string(),
            }),
        ArgType::Text => Ok(Arg::Text(raw.to_string())),
        ArgType::Blueprint => Err(BlueprintError::InvalidArgument {
            kind: kind.to_string(),
            message: format!("argument {index} cannot be a nested command here"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{CommandContext, Outcome};

    #[derive(Debug)]
    struct Wait {
        ticks: u32,
    }

    impl Command for Wait {
        fn name(&self) -> &'static str {
            "Wait"
        }

        fn execute(&mut self, _ctx: &mut CommandContext<'_>) -> Outcome {
            if self.ticks == 0 {
                return Outcome::Done;
            }
            self.ticks -= 1;
            Outcome::Continue
        }
    }

    fn build_wait(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
        Ok(Box::new(Wait {
            ticks: args.count(0)?,
        }))
    }

    fn build_wrapper(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
        Ok(args.blueprint(0)?.instantiate())
    }

    fn build_list(args: &Args<'_>) -> Result<Box<dyn Command>, BlueprintError> {
        if args.texts_from(0)?.is_empty() {
            return Err(args.invalid("needs at least one entry"));
        }
        Ok(Box::new(Inert::new("List")))
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register("Wait", "wait", ArgSchema::new(&[ArgType::Int]), build_wait)
            .expect("register wait");
        registry
            .register(
                "Wrap",
                "wrap",
                ArgSchema::new(&[ArgType::Blueprint]),
                build_wrapper,
            )
            .expect("register wrap");
        registry
            .register(
                "List",
                "list",
                ArgSchema::NONE.with_rest(ArgType::Text),
                build_list,
            )
            .expect("register list");
        registry
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = registry();
        let blueprint = registry
            .resolve("wAiT", &["3".to_string()])
            .expect("resolve");
        assert_eq!(blueprint.kind(), "Wait");
        assert_eq!(blueprint.args(), &[Arg::Int(3)]);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let error = registry()
            .resolve("Teleport", &[])
            .expect_err("unknown kind");
        assert_eq!(
            error,
            BlueprintError::UnknownKind {
                name: "Teleport".to_string()
            }
        );
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = registry();
        let error = registry
            .register("WAIT", "again", ArgSchema::NONE, build_wait)
            .expect_err("duplicate");
        assert!(matches!(error, BlueprintError::DuplicateKind { .. }));
    }

    #[test]
    fn arity_and_types_are_checked() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("Wait", &[]),
            Err(BlueprintError::MissingArgument { index: 0, .. })
        ));
        assert!(matches!(
            registry.resolve("Wait", &["1".to_string(), "2".to_string()]),
            Err(BlueprintError::TooManyArguments { found: 2, .. })
        ));
        assert!(matches!(
            registry.resolve("Wait", &["soon".to_string()]),
            Err(BlueprintError::InvalidInt { .. })
        ));
    }

    #[test]
    fn factory_errors_surface_at_resolve_time() {
        let registry = registry();
        assert!(matches!(
            registry.resolve("Wait", &["-4".to_string()]),
            Err(BlueprintError::InvalidArgument { .. })
        ));
        assert!(matches!(
            registry.resolve("List", &[]),
            Err(BlueprintError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn nested_blueprint_consumes_remaining_arguments() {
        let registry = registry();
        let blueprint = registry
            .resolve("Wrap", &["Wait".to_string(), "2".to_string()])
            .expect("resolve");
        let Arg::Blueprint(inner) = &blueprint.args()[0] else {
            panic!("expected nested blueprint");
        };
        assert_eq!(inner.kind(), "Wait");
        assert_eq!(blueprint.instantiate().name(), "Wait");

        assert!(matches!(
            registry.resolve("Wrap", &["Nope".to_string()]),
            Err(BlueprintError::UnknownKind { .. })
        ));
    }
}
