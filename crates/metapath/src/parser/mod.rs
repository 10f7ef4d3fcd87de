//! Source text to [`Expr`].
//!
//! The pest grammar yields a concrete parse tree that [`builder::AstBuilder`]
//! walks exactly once; the parse tree is dropped afterwards.
mod builder;

use std::sync::Arc;

use pest::Parser;
use tracing::trace;

use crate::ast::Expr;
use crate::context::StaticContext;
use crate::error::{Error, ErrorCode};

#[derive(pest_derive::Parser)]
#[grammar = "parser/metapath.pest"]
pub struct MetapathParser;

/// Parse and build the expression tree, resolving names against `static_ctx`.
pub fn parse_expression(text: &str, static_ctx: &StaticContext) -> Result<Expr, Error> {
    let mut pairs = MetapathParser::parse(Rule::metapath, text).map_err(|e| {
        Error::from_code(
            ErrorCode::MPST0003,
            format!("syntax error: {}", e.variant.message()),
        )
        .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    })?;
    let root = pairs
        .next()
        .ok_or_else(|| Error::from_code(ErrorCode::MPST0003, "empty parse tree"))?;
    trace!(text, "parsed metapath");
    builder::AstBuilder::new(static_ctx).build(root)
}
