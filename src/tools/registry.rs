use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;
use thiserror::Error;

use super::{FetchUrl, Tool, ToolArgs, ToolSpec, WebSearch};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("global tool registry is already initialized")]
    AlreadyInitialized,
}

/// Result of invoking a tool by name. Never an `Err`: every variant becomes
/// the content of a tool message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success(String),
    UnknownTool(String),
    InvalidArguments(String),
    Failed(String),
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success(_))
    }

    /// Text sent back to the model.
    pub fn into_content(self) -> String {
        match self {
            Self::Success(output) => output,
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(output) => f.write_str(output),
            Self::UnknownTool(name) => write!(f, "Error: Unknown tool '{}'", name),
            Self::InvalidArguments(reason) => write!(f, "Error: Invalid arguments: {}", reason),
            Self::Failed(reason) => write!(f, "Error: {}", reason),
        }
    }
}

struct Entry {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

/// Name-keyed set of tools, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.entries.iter().map(|e| &e.spec.name).collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A name that is already taken is a hard error.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let spec = tool.spec();
        if self.by_name.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateTool(spec.name));
        }

        tracing::debug!(tool = %spec.name, "Registered tool");
        self.by_name.insert(spec.name.clone(), self.entries.len());
        self.entries.push(Entry { spec, tool });
        Ok(())
    }

    /// All specs, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.entries.iter().map(|e| e.spec.clone()).collect()
    }

    /// Specs for the named subset, in the order given.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<ToolSpec>, RegistryError> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.get(name)
                    .map(|e| e.spec.clone())
                    .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
            })
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the tool called `name` with decoded JSON `arguments`.
    pub async fn invoke(&self, name: &str, arguments: Value) -> ToolOutcome {
        let Some(entry) = self.get(name) else {
            return ToolOutcome::UnknownTool(name.to_string());
        };

        let args = match prepare_args(&entry.spec, arguments) {
            Ok(args) => args,
            Err(reason) => return ToolOutcome::InvalidArguments(reason),
        };

        match entry.tool.execute(args).await {
            Ok(output) => ToolOutcome::Success(output),
            Err(e) => ToolOutcome::Failed(format!("{:#}", e)),
        }
    }

    fn get(&self, name: &str) -> Option<&Entry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }
}

/// Check required parameters are present and fill declared defaults.
fn prepare_args(spec: &ToolSpec, arguments: Value) -> Result<ToolArgs, String> {
    let mut args = match arguments {
        Value::Object(map) => map,
        // A tool without parameters may be called with no arguments at all.
        Value::Null => ToolArgs::new(),
        other => return Err(format!("expected a JSON object, got {}", json_kind(&other))),
    };

    let missing: Vec<&str> = spec
        .required_parameters()
        .filter(|p| args.get(&p.name).map_or(true, Value::is_null))
        .map(|p| p.name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required parameter(s): {}", missing.join(", ")));
    }

    for param in &spec.parameters {
        if let Some(default) = &param.default {
            let slot = args.entry(param.name.clone()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = default.clone();
            }
        }
    }

    Ok(args)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Registry with the built-in tools.
pub fn default_registry() -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register(WebSearch::new())?;
    registry.register(FetchUrl::new())?;
    Ok(registry)
}

static GLOBAL: OnceLock<Arc<ToolRegistry>> = OnceLock::new();

/// Install the process-wide registry. Succeeds exactly once.
pub fn init_global(registry: ToolRegistry) -> Result<Arc<ToolRegistry>, RegistryError> {
    let registry = Arc::new(registry);
    GLOBAL
        .set(Arc::clone(&registry))
        .map_err(|_| RegistryError::AlreadyInitialized)?;
    Ok(registry)
}

/// The process-wide registry, if [`init_global`] has run.
pub fn global() -> Option<Arc<ToolRegistry>> {
    GLOBAL.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ParamType};
    use serde_json::json;

    fn echo_tool(name: &str) -> FnTool<impl Fn(&ToolArgs) -> anyhow::Result<String> + Send + Sync> {
        let spec = ToolSpec::builder(name, "Echo the query back.")
            .param("query", ParamType::String, "Text to echo")
            .optional_param("times", ParamType::Integer, "Repetitions", 1)
            .build();
        FnTool::new(spec, |args: &ToolArgs| {
            let query = args["query"].as_str().unwrap_or_default();
            let times = args["times"].as_u64().unwrap_or(0) as usize;
            Ok(query.repeat(times))
        })
    }

    fn failing_tool() -> FnTool<impl Fn(&ToolArgs) -> anyhow::Result<String> + Send + Sync> {
        FnTool::new(ToolSpec::builder("explode", "Always fails.").build(), |_: &ToolArgs| {
            Err(anyhow::anyhow!("kaboom"))
        })
    }

    #[test]
    fn duplicate_name_fails_at_registration() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).expect("first registration");

        let err = registry.register(echo_tool("echo")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("echo".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn specs_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("b")).unwrap();
        registry.register(echo_tool("a")).unwrap();
        registry.register(failing_tool()).unwrap();

        let names: Vec<_> = registry.specs().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "a", "explode"]);
    }

    #[test]
    fn select_rejects_unknown_names() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        assert_eq!(registry.select(&["echo"]).unwrap().len(), 1);
        assert_eq!(
            registry.select(&["echo", "nope"]).unwrap_err(),
            RegistryError::UnknownTool("nope".to_string())
        );
    }

    #[tokio::test]
    async fn invoke_fills_defaults() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let outcome = registry.invoke("echo", json!({"query": "hi"})).await;
        assert_eq!(outcome, ToolOutcome::Success("hi".to_string()));

        let outcome = registry.invoke("echo", json!({"query": "hi", "times": 3})).await;
        assert_eq!(outcome, ToolOutcome::Success("hihihi".to_string()));
    }

    #[tokio::test]
    async fn explicit_null_takes_the_default() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let outcome = registry
            .invoke("echo", json!({"query": "ab", "times": null}))
            .await;
        assert_eq!(outcome, ToolOutcome::Success("ab".to_string()));
    }

    #[test]
    fn debug_lists_tool_names() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();
        assert_eq!(format!("{:?}", registry), r#"ToolRegistry { tools: ["echo"] }"#);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_outcome_not_an_error() {
        let registry = ToolRegistry::new();

        let outcome = registry.invoke("get_weather", json!({})).await;
        assert!(outcome.is_error());
        assert_eq!(outcome.into_content(), "Error: Unknown tool 'get_weather'");
    }

    #[tokio::test]
    async fn missing_required_parameter_is_invalid() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_tool("echo")).unwrap();

        let outcome = registry.invoke("echo", json!({"times": 2})).await;
        assert_eq!(
            outcome,
            ToolOutcome::InvalidArguments("missing required parameter(s): query".to_string())
        );

        let outcome = registry.invoke("echo", json!(["hi"])).await;
        assert!(matches!(outcome, ToolOutcome::InvalidArguments(ref r) if r.contains("an array")));
    }

    #[tokio::test]
    async fn tool_failure_is_captured() {
        let mut registry = ToolRegistry::new();
        registry.register(failing_tool()).unwrap();

        let outcome = registry.invoke("explode", Value::Null).await;
        assert_eq!(outcome, ToolOutcome::Failed("kaboom".to_string()));
        assert_eq!(outcome.into_content(), "Error: kaboom");
    }

    #[test]
    fn default_registry_has_builtin_tools() {
        let registry = default_registry().expect("builtins register cleanly");
        assert!(registry.contains("web_search"));
        assert!(registry.contains("fetch_url"));
    }

    #[test]
    fn global_registry_initializes_once() {
        let first = init_global(ToolRegistry::new());
        let second = init_global(ToolRegistry::new());

        assert!(first.is_ok());
        assert!(matches!(second, Err(RegistryError::AlreadyInitialized)));
        assert!(global().is_some());
    }
}
