use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::debug;

use crate::script::{BlueprintError, CommandListTemplate, CommandRegistry, TemplateLibrary};
use crate::world::{
    Barrier, BarrierKind, Blackboard, CharacterDef, CharacterKind, Direction, Floor, Lesson,
    Location, SkoolMap, Staircase,
};

use super::database::ContentDatabase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDefInMod,
    UnknownCommandKind,
    InvalidCommand,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub mod_id: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (mod={}, file={}, line={}, column={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (mod={}, file={})",
                self.code,
                self.message,
                self.mod_id,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

pub(crate) fn read_error(
    mod_id: &str,
    path: PathBuf,
    source: std::io::Error,
) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read XML file: {source}"),
        mod_id: mod_id.to_string(),
        file_path: path,
        location: None,
    }
}

/// Where a definition came from, kept until cross-references are checked.
#[derive(Debug, Clone)]
struct Origin {
    mod_id: String,
    file_path: PathBuf,
    location: SourceLocation,
}

impl Origin {
    fn error(&self, code: ContentErrorCode, message: String) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.clone(),
            file_path: self.file_path.clone(),
            location: Some(self.location),
        }
    }
}

#[derive(Debug)]
struct PendingCharacter {
    def: CharacterDef,
    origin: Origin,
}

#[derive(Debug)]
struct PendingLesson {
    lesson: Lesson,
    assignment_origins: BTreeMap<String, Origin>,
}

/// Accumulates `<Defs>` documents in load order. Later mods override
/// earlier definitions with the same id; a mod may define an id only once.
pub struct ContentCompiler {
    registry: CommandRegistry,
    map: SkoolMap,
    characters: Vec<PendingCharacter>,
    templates: TemplateLibrary,
    lessons: Vec<PendingLesson>,
    current_mod: String,
    seen_in_mod: HashSet<(&'static str, String)>,
}

impl ContentCompiler {
    pub fn new() -> Self {
        Self::with_registry(CommandRegistry::with_builtins())
    }

    pub fn with_registry(registry: CommandRegistry) -> Self {
        Self {
            registry,
            map: SkoolMap::new(),
            characters: Vec::new(),
            templates: TemplateLibrary::new(),
            lessons: Vec::new(),
            current_mod: String::new(),
            seen_in_mod: HashSet::new(),
        }
    }

    /// Compiles one document; returns how many definitions it contained.
    pub fn add_document(
        &mut self,
        mod_id: &str,
        file_path: &Path,
        raw: &str,
    ) -> Result<usize, ContentCompileError> {
        if self.current_mod != mod_id {
            self.current_mod = mod_id.to_string();
            self.seen_in_mod.clear();
        }

        let doc = Document::parse(raw).map_err(|error| ContentCompileError {
            code: ContentErrorCode::XmlMalformed,
            message: format!("malformed XML: {error}"),
            mod_id: mod_id.to_string(),
            file_path: file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: error.pos().row as usize,
                column: error.pos().col as usize,
            }),
        })?;
        let ctx = DocContext {
            mod_id,
            file_path,
            doc: &doc,
        };

        let root = doc.root_element();
        if root.tag_name().name() != "Defs" {
            return Err(ctx.error(
                ContentErrorCode::InvalidRoot,
                "root element must be <Defs>".to_string(),
                root,
            ));
        }

        let mut count = 0usize;
        for child in root.children().filter(|node| node.is_element()) {
            match child.tag_name().name() {
                "Floor" => self.parse_floor(&ctx, child)?,
                "Staircase" => self.parse_staircase(&ctx, child)?,
                "Wall" => self.parse_barrier(&ctx, child, BarrierKind::Wall)?,
                "Door" => self.parse_barrier(&ctx, child, BarrierKind::Door)?,
                "Location" => self.parse_location(&ctx, child)?,
                "Chair" => self.parse_chair(&ctx, child)?,
                "Blackboard" => self.parse_blackboard(&ctx, child)?,
                "Character" => self.parse_character(&ctx, child)?,
                "CommandList" => self.parse_command_list(&ctx, child)?,
                "Lesson" => self.parse_lesson(&ctx, child)?,
                other => {
                    return Err(ctx.error(
                        ContentErrorCode::UnknownDefType,
                        format!("unsupported def type <{other}>"),
                        child,
                    ))
                }
            }
            count += 1;
        }

        debug!(
            mod_id,
            file = %file_path.display(),
            defs = count,
            "content_document_compiled"
        );
        Ok(count)
    }

    /// Checks cross-references and produces the database.
    pub fn finish(self, fingerprint: String) -> Result<ContentDatabase, ContentCompileError> {
        for pending in &self.characters {
            if let Some(template) = &pending.def.default_template {
                if !self.templates.contains(template) {
                    return Err(pending.origin.error(
                        ContentErrorCode::UnknownReference,
                        format!(
                            "character '{}' uses unknown command list '{}'",
                            pending.def.config_id, template
                        ),
                    ));
                }
            }
        }

        for pending in &self.lessons {
            for (character, template) in &pending.lesson.assignments {
                let Some(origin) = pending.assignment_origins.get(character) else {
                    continue;
                };
                if !self
                    .characters
                    .iter()
                    .any(|known| &known.def.config_id == character)
                {
                    return Err(origin.error(
                        ContentErrorCode::UnknownReference,
                        format!(
                            "lesson '{}' assigns unknown character '{}'",
                            pending.lesson.id, character
                        ),
                    ));
                }
                if !self.templates.contains(template) {
                    return Err(origin.error(
                        ContentErrorCode::UnknownReference,
                        format!(
                            "lesson '{}' assigns unknown command list '{}'",
                            pending.lesson.id, template
                        ),
                    ));
                }
            }
        }

        Ok(ContentDatabase {
            map: self.map,
            characters: self
                .characters
                .into_iter()
                .map(|pending| pending.def)
                .collect(),
            templates: self.templates,
            lessons: self
                .lessons
                .into_iter()
                .map(|pending| pending.lesson)
                .collect(),
            fingerprint,
        })
    }

    fn claim(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
        def_type: &'static str,
        id: &str,
    ) -> Result<(), ContentCompileError> {
        if self.seen_in_mod.insert((def_type, id.to_string())) {
            return Ok(());
        }
        Err(ctx.error(
            ContentErrorCode::DuplicateDefInMod,
            format!(
                "duplicate {def_type} '{id}' in mod '{}'; each mod may define an id only once",
                ctx.mod_id
            ),
            node,
        ))
    }

    fn parse_floor(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["id", "y", "minX", "maxX"])?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Floor", id)?;
        let y = ctx.int(node, "y")?;
        let min_x = ctx.int(node, "minX")?;
        let max_x = ctx.int(node, "maxX")?;
        if min_x > max_x {
            return Err(ctx.error(
                ContentErrorCode::InvalidValue,
                format!("floor '{id}' has minX {min_x} greater than maxX {max_x}"),
                node,
            ));
        }
        self.map.add_floor(Floor {
            id: id.to_string(),
            y,
            min_x,
            max_x,
        });
        Ok(())
    }

    fn parse_staircase(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["id", "bottom", "top"])?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Staircase", id)?;
        let bottom = ctx.location(node, "bottom")?;
        let top = ctx.location(node, "top")?;
        let staircase = Staircase::new(id, bottom, top).ok_or_else(|| {
            ctx.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "staircase '{id}' must rise one row per column with its top above its bottom"
                ),
                node,
            )
        })?;
        self.map.add_staircase(staircase);
        Ok(())
    }

    fn parse_barrier(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
        kind: BarrierKind,
    ) -> Result<(), ContentCompileError> {
        match kind {
            BarrierKind::Wall => ctx.check_attributes(node, &["id", "x", "topY", "bottomY"])?,
            BarrierKind::Door => {
                ctx.check_attributes(node, &["id", "x", "topY", "bottomY", "shut"])?
            }
        }
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Barrier", id)?;
        let x = ctx.int(node, "x")?;
        let top_y = ctx.int(node, "topY")?;
        let bottom_y = ctx.int(node, "bottomY")?;
        if top_y > bottom_y {
            return Err(ctx.error(
                ContentErrorCode::InvalidValue,
                format!("barrier '{id}' has topY {top_y} below bottomY {bottom_y}"),
                node,
            ));
        }
        let shut = match node.attribute("shut") {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| {
                ctx.error(
                    ContentErrorCode::InvalidValue,
                    format!("shut '{raw}' must be true or false"),
                    node,
                )
            })?,
        };
        self.map.add_barrier(Barrier {
            id: id.to_string(),
            kind,
            x,
            top_y,
            bottom_y,
            shut,
        });
        Ok(())
    }

    fn parse_location(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["id", "at"])?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Location", id)?;
        let at = ctx.location(node, "at")?;
        self.map.add_location(id, at);
        Ok(())
    }

    fn parse_chair(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["at"])?;
        let at = ctx.location(node, "at")?;
        self.map.add_chair(at);
        Ok(())
    }

    fn parse_blackboard(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["id", "at", "capacity"])?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Blackboard", id)?;
        let at = ctx.location(node, "at")?;
        let capacity = ctx.positive(node, "capacity")?;
        self.map
            .add_blackboard(Blackboard::new(id, at, capacity as usize));
        Ok(())
    }

    fn parse_character(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(
            node,
            &["id", "name", "kind", "at", "direction", "speed", "script"],
        )?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Character", id)?;
        let kind_raw = ctx.required(node, "kind")?;
        let kind = CharacterKind::from_token(kind_raw).ok_or_else(|| {
            ctx.error(
                ContentErrorCode::InvalidValue,
                format!(
                    "invalid kind '{kind_raw}'; allowed values: Teacher, Pupil, Eric, Animal, Projectile, Plant, Bike"
                ),
                node,
            )
        })?;
        let direction = match node.attribute("direction") {
            None => Direction::default(),
            Some(raw) => Direction::from_token(raw).ok_or_else(|| {
                ctx.error(
                    ContentErrorCode::InvalidValue,
                    format!("invalid direction '{raw}'; allowed values: Left, Right"),
                    node,
                )
            })?,
        };
        let speed = match node.attribute("speed") {
            None => 1,
            Some(_) => ctx.positive(node, "speed")?,
        };
        let def = CharacterDef {
            config_id: id.to_string(),
            name: node.attribute("name").unwrap_or(id).to_string(),
            kind,
            location: ctx.location(node, "at")?,
            direction,
            speed,
            default_template: node.attribute("script").map(str::to_string),
        };
        let pending = PendingCharacter {
            def,
            origin: ctx.origin(node),
        };

        // Overrides keep the original spawn slot.
        match self
            .characters
            .iter_mut()
            .find(|existing| existing.def.config_id == id)
        {
            Some(existing) => *existing = pending,
            None => self.characters.push(pending),
        }
        Ok(())
    }

    fn parse_command_list(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["id"])?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "CommandList", id)?;

        let mut template = CommandListTemplate::new(id);
        for child in node.children().filter(|child| child.is_element()) {
            if child.tag_name().name() != "Command" {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!(
                        "unexpected <{}> in <CommandList>; only <Command> is allowed",
                        child.tag_name().name()
                    ),
                    child,
                ));
            }
            ctx.check_attributes(child, &["kind", "args"])?;
            let kind = ctx.required(child, "kind")?;
            let mut raw_args = child
                .attribute("args")
                .map(|args| {
                    args.split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            for arg in child.children().filter(|arg| arg.is_element()) {
                if arg.tag_name().name() != "Arg" {
                    return Err(ctx.error(
                        ContentErrorCode::UnknownField,
                        format!(
                            "unexpected <{}> in <Command>; only <Arg> is allowed",
                            arg.tag_name().name()
                        ),
                        arg,
                    ));
                }
                raw_args.push(arg.text().map(str::trim).unwrap_or_default().to_string());
            }

            let blueprint = self.registry.resolve(kind, &raw_args).map_err(|error| {
                let code = match error {
                    BlueprintError::UnknownKind { .. } => ContentErrorCode::UnknownCommandKind,
                    _ => ContentErrorCode::InvalidCommand,
                };
                ctx.error(code, format!("command list '{id}': {error}"), child)
            })?;
            template.add_blueprint(blueprint);
        }

        self.templates.insert(template);
        Ok(())
    }

    fn parse_lesson(
        &mut self,
        ctx: &DocContext<'_, '_>,
        node: Node<'_, '_>,
    ) -> Result<(), ContentCompileError> {
        ctx.check_attributes(node, &["id", "ticks"])?;
        let id = ctx.required(node, "id")?;
        self.claim(ctx, node, "Lesson", id)?;
        let ticks = ctx.positive(node, "ticks")?;

        let mut assignments = BTreeMap::<String, String>::new();
        let mut assignment_origins = BTreeMap::<String, Origin>::new();
        for child in node.children().filter(|child| child.is_element()) {
            if child.tag_name().name() != "Assign" {
                return Err(ctx.error(
                    ContentErrorCode::UnknownField,
                    format!(
                        "unexpected <{}> in <Lesson>; only <Assign> is allowed",
                        child.tag_name().name()
                    ),
                    child,
                ));
            }
            ctx.check_attributes(child, &["character", "script"])?;
            let character = ctx.required(child, "character")?;
            let script = ctx.required(child, "script")?;
            if assignments
                .insert(character.to_string(), script.to_string())
                .is_some()
            {
                return Err(ctx.error(
                    ContentErrorCode::DuplicateField,
                    format!("lesson '{id}' assigns '{character}' more than once"),
                    child,
                ));
            }
            assignment_origins.insert(character.to_string(), ctx.origin(child));
        }

        let pending = PendingLesson {
            lesson: Lesson {
                id: id.to_string(),
                ticks,
                assignments,
            },
            assignment_origins,
        };
        match self
            .lessons
            .iter_mut()
            .find(|existing| existing.lesson.id == id)
        {
            Some(existing) => *existing = pending,
            None => self.lessons.push(pending),
        }
        Ok(())
    }
}

impl Default for ContentCompiler {
    fn default() -> Self {
        Self::new()
    }
}

struct DocContext<'a, 'input> {
    mod_id: &'a str,
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn source_location(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn origin(&self, node: Node<'_, '_>) -> Origin {
        Origin {
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: self.source_location(node),
        }
    }

    fn error(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            mod_id: self.mod_id.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: Some(self.source_location(node)),
        }
    }

    fn check_attributes(
        &self,
        node: Node<'_, '_>,
        allowed: &[&str],
    ) -> Result<(), ContentCompileError> {
        match node
            .attributes()
            .find(|attribute| !allowed.contains(&attribute.name()))
        {
            Some(unknown) => Err(self.error(
                ContentErrorCode::UnknownField,
                format!(
                    "unknown attribute '{}' on <{}>",
                    unknown.name(),
                    node.tag_name().name()
                ),
                node,
            )),
            None => Ok(()),
        }
    }

    fn required<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, ContentCompileError> {
        let value = node.attribute(name).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(self.error(
                ContentErrorCode::MissingField,
                format!(
                    "missing required attribute '{name}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            ));
        }
        Ok(value)
    }

    fn int(&self, node: Node<'_, '_>, name: &str) -> Result<i32, ContentCompileError> {
        let value = self.required(node, name)?;
        value.parse::<i32>().map_err(|_| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{name} '{value}' is not a valid integer"),
                node,
            )
        })
    }

    fn positive(&self, node: Node<'_, '_>, name: &str) -> Result<u32, ContentCompileError> {
        let value = self.required(node, name)?;
        match value.parse::<u32>() {
            Ok(parsed) if parsed > 0 => Ok(parsed),
            _ => Err(self.error(
                ContentErrorCode::InvalidValue,
                format!("{name} '{value}' must be a positive integer"),
                node,
            )),
        }
    }

    /// Parses an `x,y` pair.
    fn location(&self, node: Node<'_, '_>, name: &str) -> Result<Location, ContentCompileError> {
        let value = self.required(node, name)?;
        let parsed = value.split_once(',').and_then(|(x, y)| {
            Some(Location::new(
                x.trim().parse().ok()?,
                y.trim().parse().ok()?,
            ))
        });
        parsed.ok_or_else(|| {
            self.error(
                ContentErrorCode::InvalidValue,
                format!("{name} '{value}' must be an 'x,y' pair"),
                node,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Arg;

    const SKOOL: &str = r#"<Defs>
        <Floor id="Top" y="3" minX="0" maxX="40"/>
        <Floor id="Bottom" y="10" minX="0" maxX="40"/>
        <Staircase id="Stairs" bottom="20,10" top="13,3"/>
        <Door id="StaffRoomDoor" x="30" topY="4" bottomY="10" shut="true"/>
        <Wall id="WestWall" x="0" topY="0" bottomY="10"/>
        <Location id="Desk" at="5,10"/>
        <Chair at="8,10"/>
        <Blackboard id="Board" at="2,10" capacity="12"/>
        <Character id="WACKER" name="Mr Wacker" kind="Teacher" at="10,10" direction="Left" speed="2" script="Pace"/>
        <Character id="EINSTEIN" kind="Pupil" at="12,10"/>
        <CommandList id="Pace">
            <Command kind="GoTo" args="Desk"/>
            <Command kind="Say"><Arg>Sit down, boy</Arg></Command>
            <Command kind="restart"/>
        </CommandList>
        <Lesson id="Assembly" ticks="40">
            <Assign character="WACKER" script="Pace"/>
        </Lesson>
    </Defs>"#;

    fn compile(documents: &[(&str, &str)]) -> Result<ContentDatabase, ContentCompileError> {
        let mut compiler = ContentCompiler::new();
        for (mod_id, raw) in documents {
            compiler.add_document(mod_id, Path::new("defs.xml"), raw)?;
        }
        compiler.finish("test".to_string())
    }

    #[test]
    fn full_document_compiles() {
        let db = compile(&[("base", SKOOL)]).expect("compile");

        assert_eq!(db.map.floors().len(), 2);
        assert_eq!(db.map.staircases().len(), 1);
        assert!(db.map.barrier("StaffRoomDoor").expect("door").shut);
        assert_eq!(db.map.location("Desk"), Some(Location::new(5, 10)));
        assert_eq!(db.map.chairs(), &[Location::new(8, 10)]);
        assert_eq!(db.map.blackboard("Board").expect("board").capacity, 12);

        let wacker = db.character("WACKER").expect("wacker");
        assert_eq!(wacker.name, "Mr Wacker");
        assert_eq!(wacker.direction, Direction::Left);
        assert_eq!(wacker.speed, 2);
        assert_eq!(wacker.default_template.as_deref(), Some("Pace"));
        let einstein = db.character("EINSTEIN").expect("einstein");
        assert_eq!(einstein.name, "EINSTEIN");
        assert_eq!(einstein.speed, 1);
        assert_eq!(einstein.default_template, None);

        let pace = db.templates.get("Pace").expect("template");
        let kinds = pace
            .blueprints()
            .iter()
            .map(|blueprint| blueprint.kind())
            .collect::<Vec<_>>();
        assert_eq!(kinds, vec!["GoTo", "Say", "Restart"]);
        assert_eq!(
            pace.blueprint(1).expect("say").args(),
            &[Arg::Text("Sit down, boy".to_string())]
        );

        let assembly = db.lesson("Assembly").expect("lesson");
        assert_eq!(assembly.ticks, 40);
        assert_eq!(assembly.assignments.get("WACKER").map(String::as_str), Some("Pace"));
        assert_eq!(db.fingerprint, "test");
    }

    #[test]
    fn unknown_command_kind_reports_location() {
        let err = compile(&[(
            "base",
            "<Defs>\n<CommandList id=\"X\">\n<Command kind=\"Dance\"/>\n</CommandList>\n</Defs>",
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::UnknownCommandKind);
        assert_eq!(err.mod_id, "base");
        assert_eq!(err.location.map(|loc| loc.line), Some(3));
    }

    #[test]
    fn bad_command_argument_is_invalid_command() {
        let err = compile(&[(
            "base",
            r#"<Defs><CommandList id="X"><Command kind="GoToXY" args="five 10"/></CommandList></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::InvalidCommand);
        assert!(err.message.contains("GoToXY"));
    }

    #[test]
    fn unknown_and_missing_attributes_error() {
        let unknown = compile(&[(
            "base",
            r#"<Defs><Floor id="F" y="1" minX="0" maxX="4" colour="red"/></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(unknown.code, ContentErrorCode::UnknownField);

        let missing = compile(&[("base", r#"<Defs><Floor id="F" y="1" minX="0"/></Defs>"#)])
            .expect_err("err");
        assert_eq!(missing.code, ContentErrorCode::MissingField);
        assert!(missing.location.is_some());
    }

    #[test]
    fn malformed_xml_and_wrong_root_error() {
        let malformed = compile(&[("base", "<Defs><Floor></Defs>")]).expect_err("err");
        assert_eq!(malformed.code, ContentErrorCode::XmlMalformed);
        assert!(malformed.location.is_some());

        let root = compile(&[("base", "<Skool/>")]).expect_err("err");
        assert_eq!(root.code, ContentErrorCode::InvalidRoot);

        let def_type = compile(&[("base", "<Defs><Piano/></Defs>")]).expect_err("err");
        assert_eq!(def_type.code, ContentErrorCode::UnknownDefType);
    }

    #[test]
    fn same_mod_duplicate_errors_across_files() {
        let mut compiler = ContentCompiler::new();
        compiler
            .add_document(
                "base",
                Path::new("a.xml"),
                r#"<Defs><Location id="Desk" at="1,1"/></Defs>"#,
            )
            .expect("first file");
        let err = compiler
            .add_document(
                "base",
                Path::new("b.xml"),
                r#"<Defs><Location id="Desk" at="2,2"/></Defs>"#,
            )
            .expect_err("err");
        assert_eq!(err.code, ContentErrorCode::DuplicateDefInMod);
        assert!(err.file_path.ends_with("b.xml"));
    }

    #[test]
    fn later_mod_overrides_in_place() {
        let db = compile(&[
            ("base", SKOOL),
            (
                "late_bell",
                r#"<Defs>
                    <Character id="WACKER" kind="Teacher" at="20,10" speed="3"/>
                    <Lesson id="Assembly" ticks="5"/>
                    <Door id="StaffRoomDoor" x="30" topY="4" bottomY="10"/>
                </Defs>"#,
            ),
        ])
        .expect("compile");

        assert_eq!(db.characters[0].config_id, "WACKER");
        assert_eq!(db.characters[0].location, Location::new(20, 10));
        assert_eq!(db.characters[0].default_template, None);
        assert_eq!(db.lessons.len(), 1);
        assert_eq!(db.lessons[0].ticks, 5);
        assert!(!db.map.barrier("StaffRoomDoor").expect("door").shut);
    }

    #[test]
    fn unknown_references_are_rejected() {
        let character = compile(&[(
            "base",
            r#"<Defs><Character id="A" kind="Pupil" at="1,1" script="Nowhere"/></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(character.code, ContentErrorCode::UnknownReference);
        assert!(character.location.is_some());

        let lesson = compile(&[(
            "base",
            r#"<Defs><CommandList id="S"/><Lesson id="L" ticks="3"><Assign character="GHOST" script="S"/></Lesson></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(lesson.code, ContentErrorCode::UnknownReference);
        assert!(lesson.message.contains("GHOST"));
    }

    #[test]
    fn invalid_geometry_and_values_error() {
        let stairs = compile(&[(
            "base",
            r#"<Defs><Staircase id="S" bottom="20,10" top="10,3"/></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(stairs.code, ContentErrorCode::InvalidValue);

        let speed = compile(&[(
            "base",
            r#"<Defs><Character id="A" kind="Pupil" at="1,1" speed="0"/></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(speed.code, ContentErrorCode::InvalidValue);

        let kind = compile(&[(
            "base",
            r#"<Defs><Character id="A" kind="Headmaster" at="1,1"/></Defs>"#,
        )])
        .expect_err("err");
        assert_eq!(kind.code, ContentErrorCode::InvalidValue);
    }
}
