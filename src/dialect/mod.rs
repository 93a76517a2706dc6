//! Per-target dialect: the set of primitive builtins and reserved names.
//!
//! A [`Dialect`] is parameterized by a target [`EvmVersion`] and an optional
//! extension (container format) revision. It arbitrates three things:
//!
//! - which instructions of the [`instructions`] table are exposed to programs
//!   as *builtins* — low-level control-flow and stack-manipulation
//!   instructions never are, the middle end owns those concerns;
//! - which identifiers are *reserved* and cannot be (re)declared;
//! - on-demand synthesis of *verbatim* builtins `verbatim_<n>i_<m>o`
//!   wrapping raw opcode sequences opaque to the optimizer.
//!
//! # Handle space
//!
//! Builtins are referred to by [`BuiltinHandle`], a dense id. The range
//! `[0, VERBATIM_ID_OFFSET)` is reserved for verbatim functions, keyed by
//! their input/output arity; named builtins live at
//! `VERBATIM_ID_OFFSET + table index`. Handles are only meaningful relative
//! to the dialect that produced them.
//!
//! # Caching
//!
//! Dialects are immutable after construction and cached process-wide per
//! `(version, extension, object access)` key; [`Dialect::for_version`] and
//! [`Dialect::for_objects`] return shared [`Arc`]s. [`Dialect::reset_cache`]
//! drops the cache — call it whenever external name-interning state is reset.

mod instructions;

pub use instructions::{EvmVersion, Instruction, InstructionFlags, InstructionInfo};

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use strum::IntoEnumIterator;

/// Maximum number of input slots of a verbatim builtin.
pub const MAX_VERBATIM_INPUTS: usize = 100;
/// Maximum number of output slots of a verbatim builtin.
pub const MAX_VERBATIM_OUTPUTS: usize = 100;
/// First handle id used for named builtins; everything below is the verbatim
/// id space.
pub const VERBATIM_ID_OFFSET: usize = MAX_VERBATIM_INPUTS * (MAX_VERBATIM_OUTPUTS + 1);

/// Dense identifier of a builtin within one dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuiltinHandle(pub(crate) u32);

impl BuiltinHandle {
    /// Whether this handle denotes a verbatim builtin.
    #[must_use]
    pub fn is_verbatim(self) -> bool {
        (self.0 as usize) < VERBATIM_ID_OFFSET
    }
}

impl fmt::Display for BuiltinHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Control-flow effects of calling a builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFlowSideEffects {
    /// `false` for terminating builtins (`stop`, `return`, `revert`, ...):
    /// execution never reaches the statement after the call.
    pub can_continue: bool,
}

/// Descriptor of a single builtin function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    /// Canonical name.
    pub name: String,
    /// Number of runtime stack inputs (literal-only positions excluded).
    pub inputs: usize,
    /// Number of stack outputs.
    pub outputs: usize,
    /// One entry per call-site argument position; `true` marks positions
    /// that must be literals and are carried verbatim instead of evaluated.
    pub literal_arguments: Vec<bool>,
    /// Control-flow effects.
    pub control_flow: ControlFlowSideEffects,
}

impl BuiltinFunction {
    fn from_instruction(instruction: Instruction) -> Self {
        let info = instruction.info();
        BuiltinFunction {
            name: info.name.to_string(),
            inputs: info.inputs as usize,
            outputs: info.outputs as usize,
            literal_arguments: vec![false; info.inputs as usize],
            control_flow: ControlFlowSideEffects {
                can_continue: !instruction.terminates(),
            },
        }
    }

    fn high_level(name: &str, literal_arguments: Vec<bool>, outputs: usize) -> Self {
        let inputs = literal_arguments.iter().filter(|lit| !**lit).count();
        BuiltinFunction {
            name: name.to_string(),
            inputs,
            outputs,
            literal_arguments,
            control_flow: ControlFlowSideEffects { can_continue: true },
        }
    }

    fn verbatim(inputs: usize, outputs: usize) -> Self {
        let mut literal_arguments = vec![false; inputs + 1];
        literal_arguments[0] = true; // the raw opcode payload
        BuiltinFunction {
            name: format!("verbatim_{inputs}i_{outputs}o"),
            inputs,
            outputs,
            literal_arguments,
            control_flow: ControlFlowSideEffects { can_continue: true },
        }
    }

    /// Number of arguments a call site must supply (runtime plus literal).
    #[must_use]
    pub fn call_arity(&self) -> usize {
        self.literal_arguments.len()
    }

    /// Whether argument position `index` must be a literal.
    #[must_use]
    pub fn literal_argument(&self, index: usize) -> bool {
        self.literal_arguments.get(index).copied().unwrap_or(false)
    }
}

/// Handles to the arithmetic builtins downstream passes reach for.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArithmeticHandles {
    /// `add`
    pub add: Option<BuiltinHandle>,
    /// `sub`
    pub sub: Option<BuiltinHandle>,
    /// `mul`
    pub mul: Option<BuiltinHandle>,
    /// `exp`
    pub exp: Option<BuiltinHandle>,
    /// `shl`
    pub shl: Option<BuiltinHandle>,
    /// `not`
    pub not: Option<BuiltinHandle>,
}

/// The per-target registry of builtins and reserved names.
///
/// See the [module documentation](self) for the full picture. Instances are
/// obtained via [`Dialect::for_version`] / [`Dialect::for_objects`] and
/// shared; all queries take `&self`.
pub struct Dialect {
    version: EvmVersion,
    extension: Option<u8>,
    object_access: bool,
    /// Builtin table: one slot per instruction (in table order), `None` where
    /// the instruction is unavailable or not exposed, followed by the
    /// high-level builtins. Named handles are offset into this table.
    functions: Vec<Option<Arc<BuiltinFunction>>>,
    builtins_by_name: FxHashMap<String, BuiltinHandle>,
    reserved: Vec<&'static str>,
    /// Verbatim builtins materialized on demand, keyed by arity index.
    verbatim_functions: Mutex<FxHashMap<u32, Arc<BuiltinFunction>>>,

    discard_function: Option<BuiltinHandle>,
    equality_function: Option<BuiltinHandle>,
    boolean_negation_function: Option<BuiltinHandle>,
    memory_store_function: Option<BuiltinHandle>,
    memory_load_function: Option<BuiltinHandle>,
    storage_store_function: Option<BuiltinHandle>,
    storage_load_function: Option<BuiltinHandle>,
    hash_function: Option<BuiltinHandle>,
    arithmetic: ArithmeticHandles,
}

type DialectKey = (EvmVersion, Option<u8>, bool);

fn dialect_cache() -> &'static Mutex<FxHashMap<DialectKey, Arc<Dialect>>> {
    static CACHE: OnceLock<Mutex<FxHashMap<DialectKey, Arc<Dialect>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(FxHashMap::default()))
}

impl Dialect {
    /// Returns the shared dialect for `(version, extension)` without object
    /// access (no `verbatim_*` builtins, no data builtins).
    #[must_use]
    pub fn for_version(version: EvmVersion, extension: Option<u8>) -> Arc<Dialect> {
        Self::cached(version, extension, false)
    }

    /// Returns the shared dialect for `(version, extension)` with object
    /// access enabled.
    #[must_use]
    pub fn for_objects(version: EvmVersion, extension: Option<u8>) -> Arc<Dialect> {
        Self::cached(version, extension, true)
    }

    /// Drops every cached dialect.
    ///
    /// Must be invoked whenever external name-interning state is reset, so
    /// that stale handles cannot outlive the names they were derived from.
    pub fn reset_cache() {
        dialect_cache().lock().expect("dialect cache poisoned").clear();
    }

    fn cached(version: EvmVersion, extension: Option<u8>, object_access: bool) -> Arc<Dialect> {
        let mut cache = dialect_cache().lock().expect("dialect cache poisoned");
        cache
            .entry((version, extension, object_access))
            .or_insert_with(|| Arc::new(Dialect::new(version, extension, object_access)))
            .clone()
    }

    fn new(version: EvmVersion, extension: Option<u8>, object_access: bool) -> Self {
        assert!(
            extension.is_none() || version.supports_container_format(),
            "extension version requires a target with container-format support"
        );

        let mut functions = Vec::new();
        for instruction in Instruction::iter() {
            functions.push(if builtin_eligible(instruction, version, extension) {
                Some(Arc::new(BuiltinFunction::from_instruction(instruction)))
            } else {
                None
            });
        }
        for builtin in high_level_builtins(extension, object_access) {
            functions.push(builtin.map(Arc::new));
        }

        let mut builtins_by_name = FxHashMap::default();
        for (index, function) in functions.iter().enumerate() {
            if let Some(function) = function {
                let handle = BuiltinHandle((VERBATIM_ID_OFFSET + index) as u32);
                builtins_by_name.insert(function.name.clone(), handle);
            }
        }

        let mut dialect = Dialect {
            version,
            extension,
            object_access,
            functions,
            builtins_by_name,
            reserved: reserved_identifiers(version, extension),
            verbatim_functions: Mutex::new(FxHashMap::default()),
            discard_function: None,
            equality_function: None,
            boolean_negation_function: None,
            memory_store_function: None,
            memory_load_function: None,
            storage_store_function: None,
            storage_load_function: None,
            hash_function: None,
            arithmetic: ArithmeticHandles::default(),
        };
        dialect.discard_function = dialect.named_handle("pop");
        dialect.equality_function = dialect.named_handle("eq");
        dialect.boolean_negation_function = dialect.named_handle("iszero");
        dialect.memory_store_function = dialect.named_handle("mstore");
        dialect.memory_load_function = dialect.named_handle("mload");
        dialect.storage_store_function = dialect.named_handle("sstore");
        dialect.storage_load_function = dialect.named_handle("sload");
        dialect.hash_function = dialect.named_handle("keccak256");
        dialect.arithmetic = ArithmeticHandles {
            add: dialect.named_handle("add"),
            sub: dialect.named_handle("sub"),
            mul: dialect.named_handle("mul"),
            exp: dialect.named_handle("exp"),
            shl: dialect.named_handle("shl"),
            not: dialect.named_handle("not"),
        };
        dialect
    }

    fn named_handle(&self, name: &str) -> Option<BuiltinHandle> {
        self.builtins_by_name.get(name).copied()
    }

    /// The target version this dialect was built for.
    #[must_use]
    pub const fn version(&self) -> EvmVersion {
        self.version
    }

    /// The extension (container format) revision, if any.
    #[must_use]
    pub const fn extension(&self) -> Option<u8> {
        self.extension
    }

    /// Whether object-access builtins (`verbatim_*`, data builtins) exist.
    #[must_use]
    pub const fn object_access(&self) -> bool {
        self.object_access
    }

    /// Looks up a builtin by name.
    ///
    /// With object access enabled, names of the form `verbatim_<n>i_<m>o`
    /// (0 ≤ n, m ≤ 99) materialize a verbatim builtin on first use; repeated
    /// lookups return the same handle.
    #[must_use]
    pub fn find_builtin(&self, name: &str) -> Option<BuiltinHandle> {
        if self.object_access {
            if let Some(suffix) = name.strip_prefix("verbatim_") {
                if let Some((inputs, outputs)) = parse_verbatim_arity(suffix) {
                    return Some(self.verbatim_function(inputs, outputs));
                }
            }
        }
        self.builtins_by_name.get(name).copied()
    }

    /// Returns the descriptor for a handle.
    ///
    /// # Panics
    ///
    /// Panics when the handle was not produced by this dialect: that is a
    /// misconfiguration, not an input error.
    #[must_use]
    pub fn builtin(&self, handle: BuiltinHandle) -> Arc<BuiltinFunction> {
        if handle.is_verbatim() {
            let verbatims = self.verbatim_functions.lock().expect("verbatim cache poisoned");
            return verbatims
                .get(&handle.0)
                .expect("verbatim handle without materialized builtin")
                .clone();
        }
        let index = handle.0 as usize - VERBATIM_ID_OFFSET;
        self.functions
            .get(index)
            .and_then(Option::as_ref)
            .expect("builtin handle outside dialect table")
            .clone()
    }

    /// Returns the handle for the verbatim builtin with the given arity,
    /// materializing its descriptor on first use.
    ///
    /// # Panics
    ///
    /// Panics when an arity beyond [`MAX_VERBATIM_INPUTS`] /
    /// [`MAX_VERBATIM_OUTPUTS`] is requested.
    #[must_use]
    pub fn verbatim_function(&self, inputs: usize, outputs: usize) -> BuiltinHandle {
        assert!(inputs <= MAX_VERBATIM_INPUTS, "verbatim input arity out of range");
        assert!(outputs <= MAX_VERBATIM_OUTPUTS, "verbatim output arity out of range");
        let index = (inputs + outputs * MAX_VERBATIM_INPUTS) as u32;
        debug_assert!((index as usize) < VERBATIM_ID_OFFSET);

        let mut verbatims = self.verbatim_functions.lock().expect("verbatim cache poisoned");
        verbatims
            .entry(index)
            .or_insert_with(|| Arc::new(BuiltinFunction::verbatim(inputs, outputs)));
        BuiltinHandle(index)
    }

    /// Whether `name` may not be declared by programs under this dialect.
    #[must_use]
    pub fn reserved_identifier(&self, name: &str) -> bool {
        if self.object_access && name.starts_with("verbatim") {
            return true;
        }
        self.reserved.binary_search_by(|probe| (*probe).cmp(name)).is_ok()
    }

    /// Handle of the value-discarding builtin (`pop`).
    #[must_use]
    pub fn discard_function(&self) -> Option<BuiltinHandle> {
        self.discard_function
    }

    /// Handle of the equality builtin (`eq`).
    #[must_use]
    pub fn equality_function(&self) -> Option<BuiltinHandle> {
        self.equality_function
    }

    /// Handle of the boolean-negation builtin (`iszero`).
    #[must_use]
    pub fn boolean_negation_function(&self) -> Option<BuiltinHandle> {
        self.boolean_negation_function
    }

    /// Handle of the memory store builtin (`mstore`).
    #[must_use]
    pub fn memory_store_function(&self) -> Option<BuiltinHandle> {
        self.memory_store_function
    }

    /// Handle of the memory load builtin (`mload`).
    #[must_use]
    pub fn memory_load_function(&self) -> Option<BuiltinHandle> {
        self.memory_load_function
    }

    /// Handle of the storage store builtin (`sstore`).
    #[must_use]
    pub fn storage_store_function(&self) -> Option<BuiltinHandle> {
        self.storage_store_function
    }

    /// Handle of the storage load builtin (`sload`).
    #[must_use]
    pub fn storage_load_function(&self) -> Option<BuiltinHandle> {
        self.storage_load_function
    }

    /// Handle of the hashing builtin (`keccak256`).
    #[must_use]
    pub fn hash_function(&self) -> Option<BuiltinHandle> {
        self.hash_function
    }

    /// Handles of the arithmetic builtins.
    #[must_use]
    pub const fn arithmetic(&self) -> &ArithmeticHandles {
        &self.arithmetic
    }
}

impl fmt::Debug for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dialect")
            .field("version", &self.version)
            .field("extension", &self.extension)
            .field("object_access", &self.object_access)
            .finish_non_exhaustive()
    }
}

/// Whether an instruction is exposed as a builtin for the given target.
fn builtin_eligible(
    instruction: Instruction,
    version: EvmVersion,
    extension: Option<u8>,
) -> bool {
    if !instruction.is_available(version, extension) {
        return false;
    }
    if instruction.is_low_level_control_flow() || instruction.is_low_level_stack_manipulation() {
        return false;
    }
    // The randomness opcode kept its old name on pre-merge targets.
    if instruction == Instruction::Difficulty && version >= EvmVersion::Paris {
        return false;
    }
    true
}

/// The high-level builtins appended after the instruction table. Slots are
/// `None` when gated off so that table indices are stable across configs.
fn high_level_builtins(extension: Option<u8>, object_access: bool) -> Vec<Option<BuiltinFunction>> {
    let object = |builtin: BuiltinFunction| object_access.then_some(builtin);
    vec![
        object(BuiltinFunction::high_level("linkersymbol", vec![true], 1)),
        object(BuiltinFunction::high_level("datasize", vec![true], 1)),
        object(BuiltinFunction::high_level("dataoffset", vec![true], 1)),
        object(BuiltinFunction::high_level(
            "datacopy",
            vec![false, false, false],
            0,
        )),
        object(BuiltinFunction::high_level(
            "setimmutable",
            vec![false, true, false],
            0,
        )),
        object(BuiltinFunction::high_level("loadimmutable", vec![true], 1)),
        (object_access && extension.is_some())
            .then(|| BuiltinFunction::high_level("auxdataloadn", vec![true], 1)),
    ]
}

/// Constructs the reserved-identifier set for a target.
///
/// Starts from the full instruction name table and excludes instructions the
/// target does not have yet (for the grandfathered late additions) or that
/// only exist in a container revision that is not active; the fixed
/// high-level names are always added.
fn reserved_identifiers(version: EvmVersion, extension: Option<u8>) -> Vec<&'static str> {
    let excluded = |instruction: Instruction| -> bool {
        let late = |name: &str, since: EvmVersion| {
            instruction.name() == name && version < since
        };
        late("basefee", EvmVersion::London)
            || late("prevrandao", EvmVersion::Paris)
            || late("blobhash", EvmVersion::Cancun)
            || late("blobbasefee", EvmVersion::Cancun)
            || late("mcopy", EvmVersion::Cancun)
            || late("tload", EvmVersion::Cancun)
            || late("tstore", EvmVersion::Cancun)
            || late("clz", EvmVersion::Osaka)
            || (extension.is_none()
                && instruction
                    .info()
                    .flags
                    .contains(InstructionFlags::CONTAINER_ONLY))
    };

    let mut reserved: Vec<&'static str> = Instruction::iter()
        .filter(|instruction| !excluded(*instruction))
        .map(Instruction::name)
        .collect();
    reserved.extend([
        "linkersymbol",
        "datasize",
        "dataoffset",
        "datacopy",
        "setimmutable",
        "loadimmutable",
    ]);
    if extension.is_some() {
        reserved.push("auxdataloadn");
    }
    reserved.sort_unstable();
    reserved.dedup();
    reserved
}

/// Parses the `<n>i_<m>o` suffix of a verbatim builtin name. Arities are one
/// or two digits without redundant leading zeros.
fn parse_verbatim_arity(suffix: &str) -> Option<(usize, usize)> {
    let (inputs, rest) = parse_arity_number(suffix)?;
    let rest = rest.strip_prefix("i_")?;
    let (outputs, rest) = parse_arity_number(rest)?;
    let rest = rest.strip_prefix('o')?;
    rest.is_empty().then_some((inputs, outputs))
}

fn parse_arity_number(text: &str) -> Option<(usize, &str)> {
    let digits: String = text.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() || digits.len() > 2 || (digits.len() > 1 && digits.starts_with('0')) {
        return None;
    }
    Some((digits.parse().ok()?, &text[digits.len()..]))
}
