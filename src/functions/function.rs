//! Function catalog entries.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use super::arguments::FunctionArguments;
use super::parameters::FunctionParameters;
use crate::error::ParleyError;

/// Type alias for a function implementation.
type FunctionHandler =
    dyn Fn(FunctionArguments) -> BoxFuture<'static, Result<String, ParleyError>> + Send + Sync;

/// A capability the model may call.
///
/// Entries built with [`Function::descriptive`] have no implementation: the
/// model is told about them, but invocations are left for the caller.
#[derive(Clone)]
pub struct Function {
    name: String,
    description: Option<String>,
    input_schema: serde_json::Value,
    requires_explicit_approval: bool,
    implementation: Option<Arc<FunctionHandler>>,
}

impl Function {
    /// Create a function from a closure.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: FunctionParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(FunctionArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ParleyError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema: parameters.schema,
            requires_explicit_approval: false,
            implementation: Some(Arc::new(move |args| Box::pin(handler(args)))),
        }
    }

    /// Create an entry the engine never executes.
    pub fn descriptive(
        name: impl Into<String>,
        description: Option<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description,
            input_schema,
            requires_explicit_approval: false,
            implementation: None,
        }
    }

    /// Builder: require the request's approval callback to accept each call.
    pub fn requiring_approval(mut self) -> Self {
        self.requires_explicit_approval = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// JSON Schema of the parameter document.
    pub fn input_schema(&self) -> &serde_json::Value {
        &self.input_schema
    }

    pub fn requires_explicit_approval(&self) -> bool {
        self.requires_explicit_approval
    }

    pub fn has_implementation(&self) -> bool {
        self.implementation.is_some()
    }

    /// Run the implementation. Returns `None` for descriptive-only entries.
    pub fn invoke(
        &self,
        parameters: serde_json::Value,
    ) -> Option<BoxFuture<'static, Result<String, ParleyError>>> {
        self.implementation
            .as_ref()
            .map(|handler| handler(FunctionArguments::new(parameters)))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("requires_explicit_approval", &self.requires_explicit_approval)
            .field("has_implementation", &self.implementation.is_some())
            .finish()
    }
}

/// Read-only lookup of a request's functions by name.
#[derive(Debug)]
pub struct FunctionCatalog<'a> {
    by_name: HashMap<&'a str, &'a Function>,
}

impl<'a> FunctionCatalog<'a> {
    /// Index `functions` by name. The first entry wins when names collide.
    pub fn new(functions: &'a [Function]) -> Self {
        let mut by_name = HashMap::with_capacity(functions.len());
        for function in functions {
            if by_name.contains_key(function.name()) {
                tracing::warn!(name = function.name(), "duplicate function name in catalog");
                continue;
            }
            by_name.insert(function.name(), function);
        }
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&'a Function> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
