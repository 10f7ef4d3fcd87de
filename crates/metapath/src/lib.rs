//! Metapath expression engine.
//!
//! Compile an expression once with [`compile`], then evaluate it against any
//! node of a tree implementing [`MetapathNode`]:
//!
//! ```
//! use metapath::simple_node::{assembly, doc, field};
//! use metapath::{compile, Item};
//!
//! let d = doc()
//!     .child(assembly("catalog").child(field("title", "Controls")))
//!     .build();
//! let titles = compile("//title").unwrap().evaluate(&d).unwrap();
//! assert_eq!(titles.len(), 1);
//! assert_eq!(titles.first().map(Item::string_value).as_deref(), Some("Controls"));
//! ```
pub mod ast;
pub mod compiler;
pub mod context;
pub mod error;
mod evaluator;
pub mod functions;
pub mod item;
pub mod model;
pub mod parser;
pub mod simple_node;

pub use ast::{AstPrinter, Expr, ExprVisitor, FreeVariables};
pub use compiler::{
    CompileCache, CompiledExpression, ConvertedResult, ResultType, compile, compile_with_context,
};
pub use context::{
    DynamicContext, DynamicContextBuilder, METAPATH_FUNCTIONS_NS, METAPATH_NS, StaticContext,
    StaticContextBuilder,
};
pub use error::{Error, ErrorCode, ErrorKind};
pub use functions::{
    CallCtx, FunctionRegistry, SequenceType, default_function_registry, shared_default_registry,
};
pub use item::{AtomicType, AtomicValue, Item, Sequence};
pub use model::{ExpandedName, MetapathNode, NodeKind};
pub use simple_node::SimpleNode;
