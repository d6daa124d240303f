//! Tool registry: named, schema-described functions the model may call.
//!
//! Every tool carries an explicit [`ToolSpec`] built with [`ToolSpec::builder`].
//! The registry rejects duplicate names at registration time and never fails
//! an invocation with an error: unknown names, bad arguments and tool failures
//! all come back as a [`ToolOutcome`] the engine turns into a tool message.

mod registry;
mod spec;
mod web;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use registry::{
    default_registry, global, init_global, RegistryError, ToolOutcome, ToolRegistry,
};
pub use spec::{ParamSpec, ParamType, SchemaType, ToolSpec, ToolSpecBuilder};
pub use web::{FetchUrl, WebSearch};

/// Named tool arguments after JSON decoding.
pub type ToolArgs = Map<String, Value>;

/// A function the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Declarative schema; `spec().name` is the registry key.
    fn spec(&self) -> ToolSpec;

    /// Run the tool. Optional parameters are already filled with their
    /// declared defaults.
    async fn execute(&self, args: ToolArgs) -> anyhow::Result<String>;
}

/// Adapter turning a plain closure plus a spec into a [`Tool`].
pub struct FnTool<F> {
    spec: ToolSpec,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&ToolArgs) -> anyhow::Result<String> + Send + Sync,
{
    pub fn new(spec: ToolSpec, func: F) -> Self {
        Self { spec, func }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&ToolArgs) -> anyhow::Result<String> + Send + Sync,
{
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn execute(&self, args: ToolArgs) -> anyhow::Result<String> {
        (self.func)(&args)
    }
}
