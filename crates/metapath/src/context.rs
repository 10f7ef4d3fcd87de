//! Static and dynamic evaluation contexts.
//!
//! The static context is fixed when an expression is compiled and captured
//! by the compiled expression. A dynamic context is created per evaluation;
//! `let` bindings extend it by pushing a frame onto a shared parent chain, so
//! an extension never changes what its parent sees.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local};

use crate::error::{Error, ErrorCode};
use crate::functions::{FunctionRegistry, shared_default_registry};
use crate::item::Sequence;
use crate::model::{ExpandedName, MetapathNode};

pub const METAPATH_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath";
pub const METAPATH_FUNCTIONS_NS: &str = "http://csrc.nist.gov/ns/metaschema/metapath-functions";
pub const CODEPOINT_COLLATION: &str = "http://www.w3.org/2005/xpath-functions/collation/codepoint";

#[derive(Debug, Clone)]
pub struct StaticContext {
    base_uri: Option<String>,
    namespaces: HashMap<String, String>,
    default_function_namespace: Option<String>,
    default_model_namespace: Option<String>,
    default_collation: String,
}

impl Default for StaticContext {
    fn default() -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert("meta".to_string(), METAPATH_NS.to_string());
        namespaces.insert("mp".to_string(), METAPATH_FUNCTIONS_NS.to_string());
        Self {
            base_uri: None,
            namespaces,
            default_function_namespace: Some(METAPATH_FUNCTIONS_NS.to_string()),
            default_model_namespace: None,
            default_collation: CODEPOINT_COLLATION.to_string(),
        }
    }
}

impl StaticContext {
    pub fn builder() -> StaticContextBuilder {
        StaticContextBuilder::new()
    }

    pub fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }

    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str)
    }

    pub fn default_function_namespace(&self) -> Option<&str> {
        self.default_function_namespace.as_deref()
    }

    /// Namespace applied to unprefixed names in name tests.
    pub fn default_model_namespace(&self) -> Option<&str> {
        self.default_model_namespace.as_deref()
    }

    pub fn default_collation(&self) -> &str {
        &self.default_collation
    }

    /// A fresh dynamic context: no variables, the current clock, the
    /// built-in function library.
    pub fn new_dynamic_context<N: MetapathNode>(&self) -> DynamicContext<N> {
        DynamicContextBuilder::new(Arc::new(self.clone())).build()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticContextBuilder {
    ctx: StaticContext,
}

impl StaticContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_uri(mut self, uri: impl Into<String>) -> Self {
        self.ctx.base_uri = Some(uri.into());
        self
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.ctx.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_default_function_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_function_namespace = Some(uri.into());
        self
    }

    pub fn with_default_model_namespace(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_model_namespace = Some(uri.into());
        self
    }

    pub fn with_default_collation(mut self, uri: impl Into<String>) -> Self {
        self.ctx.default_collation = uri.into();
        self
    }

    /// Only the codepoint collation is supported; anything else is `FOCH0002`.
    pub fn build(self) -> Result<StaticContext, Error> {
        if self.ctx.default_collation != CODEPOINT_COLLATION {
            return Err(Error::from_code(
                ErrorCode::FOCH0002,
                format!("unsupported collation '{}'", self.ctx.default_collation),
            ));
        }
        Ok(self.ctx)
    }
}

struct VariableFrame<N> {
    name: ExpandedName,
    value: Sequence<N>,
    parent: Option<Arc<VariableFrame<N>>>,
}

#[derive(Clone)]
pub struct DynamicContext<N> {
    static_ctx: Arc<StaticContext>,
    now: DateTime<FixedOffset>,
    implicit_timezone: FixedOffset,
    variables: Option<Arc<VariableFrame<N>>>,
    functions: Arc<FunctionRegistry<N>>,
}

impl<N> core::fmt::Debug for DynamicContext<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names = Vec::new();
        let mut cur = self.variables.as_deref();
        while let Some(frame) = cur {
            names.push(frame.name.to_string());
            cur = frame.parent.as_deref();
        }
        f.debug_struct("DynamicContext")
            .field("now", &self.now)
            .field("implicit_timezone", &self.implicit_timezone)
            .field("variables", &names)
            .finish_non_exhaustive()
    }
}

impl<N: MetapathNode> DynamicContext<N> {
    pub fn static_context(&self) -> &StaticContext {
        &self.static_ctx
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.now
    }

    pub fn implicit_timezone(&self) -> FixedOffset {
        self.implicit_timezone
    }

    pub fn functions(&self) -> &FunctionRegistry<N> {
        &self.functions
    }

    /// Extend with one binding. The receiver is left untouched.
    pub fn bind_variable(&self, name: ExpandedName, value: Sequence<N>) -> Self {
        let mut next = self.clone();
        next.variables = Some(Arc::new(VariableFrame {
            name,
            value,
            parent: self.variables.clone(),
        }));
        next
    }

    /// Innermost binding of `name`; `MPST0008` if none exists.
    pub fn variable(&self, name: &ExpandedName) -> Result<Sequence<N>, Error> {
        let mut cur = self.variables.as_deref();
        while let Some(frame) = cur {
            if &frame.name == name {
                return Ok(frame.value.clone());
            }
            cur = frame.parent.as_deref();
        }
        Err(Error::from_code(
            ErrorCode::MPST0008,
            format!("variable ${} is not bound", name.local),
        ))
    }

    pub fn is_bound(&self, name: &ExpandedName) -> bool {
        self.variable(name).is_ok()
    }
}

pub struct DynamicContextBuilder<N> {
    static_ctx: Arc<StaticContext>,
    now: Option<DateTime<FixedOffset>>,
    timezone: Option<FixedOffset>,
    variables: Vec<(ExpandedName, Sequence<N>)>,
    functions: Option<Arc<FunctionRegistry<N>>>,
}

impl<N: MetapathNode> DynamicContextBuilder<N> {
    pub fn new(static_ctx: Arc<StaticContext>) -> Self {
        Self {
            static_ctx,
            now: None,
            timezone: None,
            variables: Vec::new(),
            functions: None,
        }
    }

    /// Fix the clock, e.g. for reproducible `current-date-time()`.
    pub fn with_now(mut self, now: DateTime<FixedOffset>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn with_timezone(mut self, tz: FixedOffset) -> Self {
        self.timezone = Some(tz);
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: Sequence<N>) -> Self {
        self.variables.push((name, value));
        self
    }

    pub fn with_functions(mut self, functions: Arc<FunctionRegistry<N>>) -> Self {
        self.functions = Some(functions);
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        let now = self.now.unwrap_or_else(|| Local::now().fixed_offset());
        let implicit_timezone = self.timezone.unwrap_or_else(|| *now.offset());
        let mut ctx = DynamicContext {
            static_ctx: self.static_ctx,
            now,
            implicit_timezone,
            variables: None,
            functions: self.functions.unwrap_or_else(shared_default_registry),
        };
        for (name, value) in self.variables {
            ctx = ctx.bind_variable(name, value);
        }
        ctx
    }
}
