//! Compilation entry points and the compiled-expression handle.
use core::fmt;
use core::str::FromStr;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, OnceLock};

use lru::LruCache;
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::ast::{AstPrinter, Expr, FreeVariables};
use crate::context::{DynamicContext, DynamicContextBuilder, StaticContext};
use crate::error::{Error, ErrorCode};
use crate::evaluator::eval;
use crate::item::{AtomicType, AtomicValue, Item, Sequence};
use crate::model::{ExpandedName, MetapathNode};
use crate::parser::parse_expression;

static DEFAULT_STATIC_CONTEXT: OnceLock<Arc<StaticContext>> = OnceLock::new();

fn default_static_ctx() -> Arc<StaticContext> {
    DEFAULT_STATIC_CONTEXT
        .get_or_init(|| Arc::new(StaticContext::default()))
        .clone()
}

/// Compile against the default static context.
pub fn compile(text: &str) -> Result<CompiledExpression, Error> {
    compile_inner(text, default_static_ctx())
}

pub fn compile_with_context(
    text: &str,
    static_ctx: StaticContext,
) -> Result<CompiledExpression, Error> {
    compile_inner(text, Arc::new(static_ctx))
}

fn compile_inner(text: &str, static_ctx: Arc<StaticContext>) -> Result<CompiledExpression, Error> {
    // `.` needs no parse tree.
    let ast = if text.trim() == "." {
        Expr::ContextItem
    } else {
        parse_expression(text, &static_ctx).map_err(|mut e| {
            debug!(text, code = %e.code, "could not compile expression");
            e.message = format!("could not compile expression: {}", e.message);
            e.in_expression(text)
        })?
    };
    debug!(text, "compiled expression");
    Ok(CompiledExpression {
        ast: Arc::new(ast),
        source: Arc::from(text),
        static_ctx,
    })
}

/// An immutable compiled expression. Cloning shares the tree; one value can
/// be evaluated from several threads, each with its own dynamic context.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    ast: Arc<Expr>,
    source: Arc<str>,
    static_ctx: Arc<StaticContext>,
}

impl CompiledExpression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn static_context(&self) -> &StaticContext {
        &self.static_ctx
    }

    /// Variables the expression reads without binding them itself.
    pub fn free_variables(&self) -> BTreeSet<ExpandedName> {
        FreeVariables::collect(&self.ast)
    }

    /// A dynamic context over this expression's static context with the
    /// default clock and function library.
    pub fn new_dynamic_context<N: MetapathNode>(&self) -> DynamicContext<N> {
        DynamicContextBuilder::new(self.static_ctx.clone()).build()
    }

    /// Evaluate with `node` as the context item in a fresh dynamic context.
    pub fn evaluate<N: MetapathNode>(&self, node: &N) -> Result<Sequence<N>, Error> {
        let ctx = self.new_dynamic_context();
        self.evaluate_in(Some(&Sequence::node(node.clone())), &ctx)
    }

    /// Evaluate against an explicit focus. `None` leaves the context item
    /// absent; expressions that read it fail with `MPDY0002`.
    pub fn evaluate_in<N: MetapathNode>(
        &self,
        focus: Option<&Sequence<N>>,
        ctx: &DynamicContext<N>,
    ) -> Result<Sequence<N>, Error> {
        eval(&self.ast, ctx, focus).map_err(|e| {
            debug!(expression = %self.source, code = %e.code, "evaluation failed");
            e.in_expression(&self.source)
        })
    }

    pub fn evaluate_as<N: MetapathNode>(
        &self,
        node: &N,
        result_type: ResultType,
    ) -> Result<ConvertedResult<N>, Error> {
        let ctx = self.new_dynamic_context();
        self.evaluate_as_in(Some(&Sequence::node(node.clone())), result_type, &ctx)
    }

    pub fn evaluate_as_in<N: MetapathNode>(
        &self,
        focus: Option<&Sequence<N>>,
        result_type: ResultType,
        ctx: &DynamicContext<N>,
    ) -> Result<ConvertedResult<N>, Error> {
        let seq = self.evaluate_in(focus, ctx)?;
        convert(seq, result_type).map_err(|e| e.in_expression(&self.source))
    }
}

impl fmt::Display for CompiledExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&AstPrinter::print(&self.ast))
    }
}

/// Target shape for [`CompiledExpression::evaluate_as`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Number,
    String,
    Boolean,
    Sequence,
    Node,
}

impl FromStr for ResultType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "number" => Ok(ResultType::Number),
            "string" => Ok(ResultType::String),
            "boolean" => Ok(ResultType::Boolean),
            "sequence" => Ok(ResultType::Sequence),
            "node" => Ok(ResultType::Node),
            _ => Err(Error::from_code(
                ErrorCode::MPTY0004,
                format!("invalid result type '{s}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConvertedResult<N> {
    Number(Decimal),
    String(String),
    Boolean(bool),
    Sequence(Sequence<N>),
    /// First item of the result, `None` when empty.
    Node(Option<N>),
}

/// - `Boolean`: effective boolean value.
/// - `String`: string value of the first item, `""` when empty.
/// - `Node`: the first item, which must be a node.
/// - `Number`: the single item cast to decimal; an empty or longer result
///   is an error.
fn convert<N: MetapathNode>(
    seq: Sequence<N>,
    result_type: ResultType,
) -> Result<ConvertedResult<N>, Error> {
    match result_type {
        ResultType::Sequence => Ok(ConvertedResult::Sequence(seq)),
        ResultType::Boolean => seq.ebv().map(ConvertedResult::Boolean),
        ResultType::String => Ok(ConvertedResult::String(
            seq.first().map(Item::string_value).unwrap_or_default(),
        )),
        ResultType::Node => match seq.first() {
            None => Ok(ConvertedResult::Node(None)),
            Some(Item::Node(n)) => Ok(ConvertedResult::Node(Some(n.clone()))),
            Some(other) => Err(Error::type_err(format!(
                "expected a node result, got '{other}'"
            ))),
        },
        ResultType::Number => {
            if seq.len() > 1 {
                return Err(Error::type_err(format!(
                    "expected a single numeric result, got {} items",
                    seq.len()
                )));
            }
            let first = seq
                .first()
                .ok_or_else(|| Error::type_err("expected a numeric result, got an empty sequence"))?;
            match first.atomize()?.cast_to(AtomicType::Decimal)? {
                AtomicValue::Decimal(d) => Ok(ConvertedResult::Number(d)),
                AtomicValue::Integer(i) => Ok(ConvertedResult::Number(Decimal::from(i))),
                other => Err(Error::type_err(format!(
                    "expected a numeric result, got {}",
                    other.type_of()
                ))),
            }
        }
    }
}

/// Memoizes compiled expressions by source text, evicting the least
/// recently used entry once `capacity` is reached.
#[derive(Debug)]
pub struct CompileCache {
    static_ctx: Arc<StaticContext>,
    entries: Mutex<LruCache<String, CompiledExpression>>,
}

impl CompileCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_context(capacity, StaticContext::default())
    }

    pub fn with_context(capacity: NonZeroUsize, static_ctx: StaticContext) -> Self {
        Self {
            static_ctx: Arc::new(static_ctx),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Compiled form of `text`, compiling on a miss. Failures are not cached.
    pub fn get_or_compile(&self, text: &str) -> Result<CompiledExpression, Error> {
        if let Some(hit) = self.lock().get(text) {
            trace!(text, "compile cache hit");
            return Ok(hit.clone());
        }
        trace!(text, "compile cache miss");
        let compiled = compile_inner(text, self.static_ctx.clone())?;
        self.lock().put(text.to_string(), compiled.clone());
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CompiledExpression>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
