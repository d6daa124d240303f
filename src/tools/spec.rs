//! Declarative tool schemas.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// JSON schema type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Schema type for a Rust type, via the fixed [`SchemaType`] table.
    pub fn of<T: SchemaType + ?Sized>() -> Self {
        T::PARAM_TYPE
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

/// Maps Rust types onto JSON schema types: text to `string`, integers to
/// `integer`, floats to `number`, `bool` to `boolean`, sequences to `array`,
/// maps to `object`.
pub trait SchemaType {
    const PARAM_TYPE: ParamType;
}

macro_rules! schema_type {
    ($param:ident => $($ty:ty),+) => {
        $(impl SchemaType for $ty {
            const PARAM_TYPE: ParamType = ParamType::$param;
        })+
    };
}

schema_type!(String => String, str);
schema_type!(Integer => i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);
schema_type!(Number => f32, f64);
schema_type!(Boolean => bool);

impl<T> SchemaType for Vec<T> {
    const PARAM_TYPE: ParamType = ParamType::Array;
}

impl<T> SchemaType for [T] {
    const PARAM_TYPE: ParamType = ParamType::Array;
}

impl<K, V> SchemaType for HashMap<K, V> {
    const PARAM_TYPE: ParamType = ParamType::Object;
}

impl<K, V> SchemaType for BTreeMap<K, V> {
    const PARAM_TYPE: ParamType = ParamType::Object;
}

impl SchemaType for Map<String, Value> {
    const PARAM_TYPE: ParamType = ParamType::Object;
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: Option<String>,
    pub required: bool,
    /// Value used when the model omits an optional parameter.
    pub default: Option<Value>,
}

/// Immutable schema of a registered tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
}

impl ToolSpec {
    /// Start a spec. Only the first line of `description` is kept.
    pub fn builder(name: impl Into<String>, description: &str) -> ToolSpecBuilder {
        ToolSpecBuilder {
            spec: ToolSpec {
                name: name.into(),
                description: first_line(description),
                parameters: Vec::new(),
            },
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParamSpec> {
        self.parameters.iter().filter(|p| p.required)
    }

    /// Render as an OpenAI function-tool definition.
    pub fn to_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            prop.insert("type".to_string(), json!(param.param_type.as_str()));
            if let Some(description) = &param.description {
                prop.insert("description".to_string(), json!(description));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self.required_parameters().map(|p| p.name.as_str()).collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}

/// Builder returned by [`ToolSpec::builder`].
#[derive(Debug, Clone)]
pub struct ToolSpecBuilder {
    spec: ToolSpec,
}

impl ToolSpecBuilder {
    /// A required parameter (no default).
    pub fn param(self, name: impl Into<String>, param_type: ParamType, description: &str) -> Self {
        self.push(name.into(), param_type, description, None)
    }

    /// An optional parameter, filled with `default` when the model omits it.
    pub fn optional_param(
        self,
        name: impl Into<String>,
        param_type: ParamType,
        description: &str,
        default: impl Into<Value>,
    ) -> Self {
        self.push(name.into(), param_type, description, Some(default.into()))
    }

    pub fn build(self) -> ToolSpec {
        self.spec
    }

    fn push(
        mut self,
        name: String,
        param_type: ParamType,
        description: &str,
        default: Option<Value>,
    ) -> Self {
        let description = description.trim();
        self.spec.parameters.push(ParamSpec {
            name,
            param_type,
            description: (!description.is_empty()).then(|| description.to_string()),
            required: default.is_none(),
            default,
        });
        self
    }
}

fn first_line(doc: &str) -> String {
    doc.trim().lines().next().unwrap_or("").trim().to_string()
}
