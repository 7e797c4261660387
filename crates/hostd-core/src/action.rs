//! Action registry: maps an action name to a builder that turns caller
//! arguments into a typed process [`Invocation`].
//!
//! Builders are pure. Unknown argument keys are ignored; a recognized key
//! holding a value that cannot be coerced fails the build.

use crate::coerce::{field, to_bool, to_int, to_name_list};
use crate::error::{HostdError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const SHED_ACTION: &str = "gpu_shed.shed";
pub const RESTORE_ACTION: &str = "gpu_shed.restore";

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// A fully derived process invocation: program, arguments, and an
/// environment overlay applied on top of the daemon's own environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_if(self, cond: bool, arg: &str) -> Self {
        if cond {
            self.arg(arg)
        } else {
            self
        }
    }

    pub fn env_opt(mut self, key: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.env.insert(key.to_string(), v.to_string());
        }
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Action trait
// ---------------------------------------------------------------------------

pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate `args` and derive the invocation. Errors are human-readable
    /// and name the offending key.
    fn build(&self, args: &Map<String, Value>) -> std::result::Result<Invocation, String>;
}

// ---------------------------------------------------------------------------
// gpu_shed.shed
// ---------------------------------------------------------------------------

/// Recognized arguments of `gpu_shed.shed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShedArgs {
    pub protect: Option<String>,
    pub all: bool,
    pub auto: bool,
    pub high_only: bool,
    pub quiet: bool,
    pub gpu_index: Option<i64>,
    pub target_free_mib: Option<i64>,
    pub stop_timeout: Option<i64>,
}

impl ShedArgs {
    pub fn from_map(args: &Map<String, Value>) -> std::result::Result<Self, String> {
        Ok(Self {
            protect: field(args, "protect", to_name_list)?.filter(|p| !p.is_empty()),
            all: field(args, "all", to_bool)?.unwrap_or(false),
            auto: field(args, "auto", to_bool)?.unwrap_or(false),
            high_only: field(args, "high_only", to_bool)?.unwrap_or(false),
            quiet: field(args, "quiet", to_bool)?.unwrap_or(true),
            gpu_index: field(args, "gpu_index", to_int)?,
            target_free_mib: field(args, "target_free_mib", to_int)?,
            stop_timeout: field(args, "stop_timeout", to_int)?,
        })
    }

    pub fn invocation(&self, script: &Path) -> Invocation {
        let mut inv = Invocation::new(script)
            .arg("shed")
            .arg_if(self.all, "--all")
            .arg_if(self.auto, "--auto");
        // `all` wins over `protect`
        if let (Some(protect), false) = (&self.protect, self.all) {
            inv = inv.arg("--protect").arg(protect.clone());
        }
        inv.arg_if(self.high_only, "--high-only")
            .arg_if(self.quiet, "--quiet")
            .env_opt("GPU_INDEX", self.gpu_index)
            .env_opt("TARGET_FREE_MIB", self.target_free_mib)
            .env_opt("STOP_TIMEOUT", self.stop_timeout)
    }
}

#[derive(Debug, Clone)]
pub struct ShedAction {
    script: PathBuf,
}

impl ShedAction {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Action for ShedAction {
    fn name(&self) -> &'static str {
        SHED_ACTION
    }

    fn build(&self, args: &Map<String, Value>) -> std::result::Result<Invocation, String> {
        Ok(ShedArgs::from_map(args)?.invocation(&self.script))
    }
}

// ---------------------------------------------------------------------------
// gpu_shed.restore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreArgs {
    pub quiet: bool,
}

impl RestoreArgs {
    pub fn from_map(args: &Map<String, Value>) -> std::result::Result<Self, String> {
        Ok(Self {
            quiet: field(args, "quiet", to_bool)?.unwrap_or(true),
        })
    }

    pub fn invocation(&self, script: &Path) -> Invocation {
        Invocation::new(script)
            .arg("restore")
            .arg_if(self.quiet, "--quiet")
    }
}

#[derive(Debug, Clone)]
pub struct RestoreAction {
    script: PathBuf,
}

impl RestoreAction {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

impl Action for RestoreAction {
    fn name(&self) -> &'static str {
        RESTORE_ACTION
    }

    fn build(&self, args: &Map<String, Value>) -> std::result::Result<Invocation, String> {
        Ok(RestoreArgs::from_map(args)?.invocation(&self.script))
    }
}

// ---------------------------------------------------------------------------
// ActionRegistry
// ---------------------------------------------------------------------------

/// Immutable after construction; shared by reference across requests.
#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, Box<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock registry: `gpu_shed.shed` and `gpu_shed.restore` backed by
    /// the same script.
    pub fn gpu_shed(script: impl Into<PathBuf>) -> Self {
        let script = script.into();
        let mut registry = Self::new();
        registry.register(ShedAction::new(script.clone()));
        registry.register(RestoreAction::new(script));
        registry
    }

    pub fn register(&mut self, action: impl Action + 'static) {
        self.actions.insert(action.name(), Box::new(action));
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.actions.keys().copied()
    }

    pub fn resolve(&self, name: &str) -> Result<&dyn Action> {
        self.actions
            .get(name)
            .map(|a| a.as_ref())
            .ok_or_else(|| HostdError::UnknownAction(Value::from(name)))
    }

    /// Resolve `name` and build its invocation from `args`.
    pub fn build(&self, name: &str, args: &Map<String, Value>) -> Result<Invocation> {
        self.resolve(name)?
            .build(args)
            .map_err(|detail| HostdError::InvalidArgs {
                action: name.to_string(),
                detail,
            })
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.actions.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCRIPT: &str = "/opt/scripts/main/gpu-shed.sh";

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn registry() -> ActionRegistry {
        ActionRegistry::gpu_shed(SCRIPT)
    }

    #[test]
    fn shed_defaults_to_quiet() {
        let inv = registry().build(SHED_ACTION, &Map::new()).unwrap();
        assert_eq!(inv.argv(), vec![SCRIPT, "shed", "--quiet"]);
        assert!(inv.env.is_empty());
    }

    #[test]
    fn shed_builds_full_flag_set_in_order() {
        let inv = registry()
            .build(
                SHED_ACTION,
                &obj(json!({
                    "protect": "comfyui",
                    "auto": true,
                    "high_only": true,
                    "quiet": false,
                })),
            )
            .unwrap();
        assert_eq!(
            inv.argv(),
            vec![SCRIPT, "shed", "--auto", "--protect", "comfyui", "--high-only"]
        );
    }

    #[test]
    fn all_suppresses_protect() {
        let inv = registry()
            .build(SHED_ACTION, &obj(json!({"all": true, "protect": "comfyui"})))
            .unwrap();
        assert_eq!(inv.argv(), vec![SCRIPT, "shed", "--all", "--quiet"]);
    }

    #[test]
    fn protect_list_is_joined() {
        let inv = registry()
            .build(SHED_ACTION, &obj(json!({"protect": ["comfyui", "ollama"]})))
            .unwrap();
        assert!(inv.args.windows(2).any(|w| w == ["--protect", "comfyui,ollama"]));
    }

    #[test]
    fn integer_options_become_env_overrides() {
        let inv = registry()
            .build(
                SHED_ACTION,
                &obj(json!({"gpu_index": 1, "target_free_mib": "8192", "stop_timeout": 30.0})),
            )
            .unwrap();
        assert_eq!(inv.env.get("GPU_INDEX").map(String::as_str), Some("1"));
        assert_eq!(inv.env.get("TARGET_FREE_MIB").map(String::as_str), Some("8192"));
        assert_eq!(inv.env.get("STOP_TIMEOUT").map(String::as_str), Some("30"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let inv = registry()
            .build(RESTORE_ACTION, &obj(json!({"future_flag": [1, 2, 3]})))
            .unwrap();
        assert_eq!(inv.argv(), vec![SCRIPT, "restore", "--quiet"]);
    }

    #[test]
    fn restore_without_quiet() {
        let inv = registry()
            .build(RESTORE_ACTION, &obj(json!({"quiet": false})))
            .unwrap();
        assert_eq!(inv.argv(), vec![SCRIPT, "restore"]);
    }

    #[test]
    fn incoercible_value_fails_build() {
        let err = registry()
            .build(SHED_ACTION, &obj(json!({"gpu_index": "first"})))
            .unwrap_err();
        match err {
            HostdError::InvalidArgs { action, detail } => {
                assert_eq!(action, SHED_ACTION);
                assert!(detail.starts_with("gpu_index"), "got {detail}");
            }
            other => panic!("expected InvalidArgs, got {other:?}"),
        }
    }

    #[test]
    fn unknown_action_is_not_found() {
        let err = registry().build("gpu_shed.explode", &Map::new()).unwrap_err();
        assert!(matches!(err, HostdError::UnknownAction(ref n) if *n == "gpu_shed.explode"));
    }

    #[test]
    fn names_are_sorted() {
        let names: Vec<_> = registry().names().collect();
        assert_eq!(names, vec![RESTORE_ACTION, SHED_ACTION]);
    }
}
