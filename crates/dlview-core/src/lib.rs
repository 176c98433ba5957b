pub mod listing;
pub mod value;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use value::{Body, MapEntry, PointerTarget, ValueNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    #[default]
    Invalid,
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Array,
    Chan,
    Func,
    Interface,
    Map,
    Ptr,
    Slice,
    String,
    Struct,
    UnsafePointer,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Invalid => "invalid",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Int8 => "int8",
            Kind::Int16 => "int16",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Uint => "uint",
            Kind::Uint8 => "uint8",
            Kind::Uint16 => "uint16",
            Kind::Uint32 => "uint32",
            Kind::Uint64 => "uint64",
            Kind::Uintptr => "uintptr",
            Kind::Float32 => "float32",
            Kind::Float64 => "float64",
            Kind::Complex64 => "complex64",
            Kind::Complex128 => "complex128",
            Kind::Array => "array",
            Kind::Chan => "chan",
            Kind::Func => "func",
            Kind::Interface => "interface",
            Kind::Map => "map",
            Kind::Ptr => "ptr",
            Kind::Slice => "slice",
            Kind::String => "string",
            Kind::Struct => "struct",
            Kind::UnsafePointer => "unsafe.Pointer",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much of a value the backend materializes per query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadConfig {
    pub follow_pointers: bool,
    pub max_variable_recurse: u32,
    pub max_string_len: u32,
    pub max_array_values: u32,
    /// Negative means "all fields".
    pub max_struct_fields: i32,
}

pub const LONG_LOAD_CONFIG: LoadConfig = LoadConfig {
    follow_pointers: true,
    max_variable_recurse: 1,
    max_string_len: 1024,
    max_array_values: 64,
    max_struct_fields: -1,
};

impl Default for LoadConfig {
    fn default() -> Self {
        LONG_LOAD_CONFIG
    }
}

/// The (goroutine, frame) pair variable and expression queries run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalScope {
    pub goroutine_id: i64,
    pub frame: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub pc: u64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub function: Option<Function>,
}

impl Location {
    pub fn function_name(&self) -> &str {
        self.function
            .as_ref()
            .map(|function| function.name.as_str())
            .unwrap_or("(nil)")
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.function_name(),
            shorten_file_path(&self.file),
            self.line
        )
    }
}

/// Keeps the last two path components, which is what fits in a list row.
pub fn shorten_file_path(path: &str) -> &str {
    let mut slashes = path.rmatch_indices('/').map(|(idx, _)| idx);
    match (slashes.next(), slashes.next()) {
        (Some(_), Some(second)) => &path[second + 1..],
        _ => path,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goroutine {
    pub id: i64,
    #[serde(default)]
    pub current_loc: Location,
    #[serde(default)]
    pub user_current_loc: Location,
    #[serde(default)]
    pub go_statement_loc: Location,
    #[serde(default, rename = "threadID")]
    pub thread_id: i64,
}

/// Which of a goroutine's locations a goroutine list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoroutineLocation {
    Current,
    #[default]
    User,
    GoStatement,
}

impl GoroutineLocation {
    pub const ALL: [GoroutineLocation; 3] = [
        GoroutineLocation::Current,
        GoroutineLocation::User,
        GoroutineLocation::GoStatement,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GoroutineLocation::Current => "Current location",
            GoroutineLocation::User => "User location",
            GoroutineLocation::GoStatement => "Go statement location",
        }
    }

    pub fn next(self) -> Self {
        match self {
            GoroutineLocation::Current => GoroutineLocation::User,
            GoroutineLocation::User => GoroutineLocation::GoStatement,
            GoroutineLocation::GoStatement => GoroutineLocation::Current,
        }
    }

    pub fn pick(self, goroutine: &Goroutine) -> &Location {
        match self {
            GoroutineLocation::Current => &goroutine.current_loc,
            GoroutineLocation::User => &goroutine.user_current_loc,
            GoroutineLocation::GoStatement => &goroutine.go_statement_loc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: i64,
    #[serde(default)]
    pub pc: u64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub function: Option<Function>,
    #[serde(default, rename = "goroutineID")]
    pub goroutine_id: i64,
}

impl Thread {
    pub fn location(&self) -> Location {
        Location {
            pc: self.pc,
            file: self.file.clone(),
            line: self.line,
            function: self.function.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stackframe {
    #[serde(flatten)]
    pub location: Location,
}

impl Stackframe {
    pub fn describe(&self) -> String {
        format!(
            "{}\nat {}:{}",
            self.location.function_name(),
            shorten_file_path(&self.location.file),
            self.location.line
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub addr: u64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub function_name: String,
    #[serde(default)]
    pub cond: String,
    #[serde(default)]
    pub tracepoint: bool,
    #[serde(default)]
    pub stacktrace: u32,
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub load_args: Option<LoadConfig>,
    #[serde(default)]
    pub load_locals: Option<LoadConfig>,
}

impl Breakpoint {
    /// Negative IDs belong to breakpoints the backend manages itself.
    pub fn is_internal(&self) -> bool {
        self.id < 0
    }

    pub fn describe(&self) -> String {
        format!(
            "{} in {}\nat {}:{} ({:#x})",
            self.name, self.function_name, self.file, self.line, self.addr
        )
    }
}

/// Edits applied to a breakpoint before it is sent back with `amend`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BreakpointEdit {
    pub tracepoint: bool,
    pub cond: String,
    /// One expression per line; blank lines are dropped.
    pub print: String,
    pub stacktrace: u32,
    pub load_args: Option<LoadConfig>,
    pub load_locals: Option<LoadConfig>,
}

impl BreakpointEdit {
    pub fn from_breakpoint(bp: &Breakpoint) -> Self {
        let mut print = String::new();
        for variable in &bp.variables {
            print.push_str(variable);
            print.push('\n');
        }
        Self {
            tracepoint: bp.tracepoint,
            cond: bp.cond.clone(),
            print,
            stacktrace: bp.stacktrace,
            load_args: bp.load_args,
            load_locals: bp.load_locals,
        }
    }

    pub fn apply(&self, bp: &mut Breakpoint) {
        bp.tracepoint = self.tracepoint;
        bp.cond = self.cond.clone();
        bp.stacktrace = self.stacktrace.min(200);
        bp.load_args = self.load_args;
        bp.load_locals = self.load_locals;
        bp.variables = self
            .print
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }
}

/// Execution state reported after a goroutine or thread switch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebuggerState {
    #[serde(default)]
    pub current_goroutine_id: Option<i64>,
    #[serde(default)]
    pub current_thread_id: Option<i64>,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub exited: bool,
}

/// A variable as the backend reports it. See [`ValueNode`] for the shape
/// the inspection views work with.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub addr: u64,
    #[serde(default)]
    pub only_addr: bool,
    #[serde(default, rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub real_type: String,
    #[serde(default)]
    pub kind: Kind,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub len: i64,
    #[serde(default)]
    pub cap: i64,
    #[serde(default)]
    pub children: Vec<Variable>,
    #[serde(default)]
    pub unreadable: String,
}
