//! Expression tree.
//!
//! An [`Expr`] is built once by the parser and never changes afterwards; a
//! compiled expression shares it behind an `Arc` across threads and
//! evaluations. Static traversals go through [`ExprVisitor`]; evaluation is
//! a single `match` in the evaluator.
mod printer;
mod visitor;

pub use printer::AstPrinter;
pub use visitor::{ExprVisitor, FreeVariables, walk_children};

use core::fmt;

use rust_decimal::Decimal;

use crate::item::AtomicType;
use crate::model::ExpandedName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    Children,
    Descendant,
    DescendantOrSelf,
    Flag,
}

impl Axis {
    pub fn name(&self) -> &'static str {
        match self {
            Axis::SelfAxis => "self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::Children => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Flag => "flag",
        }
    }

    /// Reverse axes number their positional predicates outward from the
    /// context node.
    pub fn is_reverse(&self) -> bool {
        matches!(self, Axis::Parent | Axis::Ancestor | Axis::AncestorOrSelf)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
}

impl ArithmeticOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "div",
            ArithmeticOp::IntegerDivide => "idiv",
            ArithmeticOp::Modulo => "mod",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    pub fn general_symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }

    pub fn value_keyword(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "eq",
            ComparisonOp::Ne => "ne",
            ComparisonOp::Lt => "lt",
            ComparisonOp::Le => "le",
            ComparisonOp::Gt => "gt",
            ComparisonOp::Ge => "ge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Wildcard {
    /// `*`: any named node.
    AnyName,
    /// `node()`: any node at all.
    AnyNode,
    /// `*:local`
    LocalName(String),
    /// `prefix:*`, already resolved to a namespace URI.
    Namespace(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    /// A name test, a wildcard, or a nested path evaluated per candidate.
    pub test: Box<Expr>,
    pub predicates: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntegerLiteral(i64),
    DecimalLiteral(Decimal),
    StringLiteral(String),
    EmptySequence,
    /// `.`
    ContextItem,
    VariableReference(ExpandedName),
    FunctionCall {
        name: ExpandedName,
        args: Vec<Expr>,
    },
    /// `a, b, c`
    Sequence(Vec<Expr>),
    Negate(Box<Expr>),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    ValueComparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    GeneralComparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Union(Vec<Expr>),
    Intersect {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Except {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a || b`
    StringConcat(Vec<Expr>),
    /// `a to b`
    Range {
        start: Box<Expr>,
        end: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    /// One binding; `let $a := x, $b := y return e` nests.
    Let {
        name: ExpandedName,
        bound: Box<Expr>,
        body: Box<Expr>,
    },
    /// `/`
    RootSlashOnly,
    /// `/path`
    RootSlash(Box<Expr>),
    /// `//path`
    RootDoubleSlash(Box<Expr>),
    /// `left/right`
    RelativeSlash {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `left//right`
    RelativeDoubleSlash {
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Step(Step),
    NameTest(ExpandedName),
    Wildcard(Wildcard),
    /// Predicates applied to a primary expression: `(a, b)[1]`.
    Filter {
        base: Box<Expr>,
        predicates: Vec<Expr>,
    },
}

/// Item type inferred without evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StaticType {
    Item,
    Node,
    Atomic(AtomicType),
}

impl StaticType {
    /// Most specific type covering both.
    pub fn common(self, other: StaticType) -> StaticType {
        match (self, other) {
            (StaticType::Node, StaticType::Node) => StaticType::Node,
            (StaticType::Atomic(a), StaticType::Atomic(b)) => {
                StaticType::Atomic(a.common_supertype(b))
            }
            _ => StaticType::Item,
        }
    }
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticType::Item => f.write_str("item()"),
            StaticType::Node => f.write_str("node()"),
            StaticType::Atomic(t) => f.write_str(t.name()),
        }
    }
}

impl Expr {
    /// Direct sub-expressions in source order.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::IntegerLiteral(_)
            | Expr::DecimalLiteral(_)
            | Expr::StringLiteral(_)
            | Expr::EmptySequence
            | Expr::ContextItem
            | Expr::VariableReference(_)
            | Expr::RootSlashOnly
            | Expr::NameTest(_)
            | Expr::Wildcard(_) => Vec::new(),
            Expr::FunctionCall { args: items, .. }
            | Expr::Sequence(items)
            | Expr::And(items)
            | Expr::Or(items)
            | Expr::Union(items)
            | Expr::StringConcat(items) => items.iter().collect(),
            Expr::Negate(inner) | Expr::RootSlash(inner) | Expr::RootDoubleSlash(inner) => {
                vec![&**inner]
            }
            Expr::Arithmetic { left, right, .. }
            | Expr::ValueComparison { left, right, .. }
            | Expr::GeneralComparison { left, right, .. }
            | Expr::Intersect { left, right }
            | Expr::Except { left, right }
            | Expr::RelativeSlash { left, right }
            | Expr::RelativeDoubleSlash { left, right } => vec![&**left, &**right],
            Expr::Range { start, end } => vec![&**start, &**end],
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => vec![&**condition, &**then_branch, &**else_branch],
            Expr::Let { bound, body, .. } => vec![&**bound, &**body],
            Expr::Step(step) => core::iter::once(step.test.as_ref())
                .chain(step.predicates.iter())
                .collect(),
            Expr::Filter { base, predicates } => core::iter::once(base.as_ref())
                .chain(predicates.iter())
                .collect(),
        }
    }

    /// One-line description used by the printer.
    pub fn label(&self) -> String {
        match self {
            Expr::IntegerLiteral(v) => format!("IntegerLiteral[value={v}]"),
            Expr::DecimalLiteral(v) => format!("DecimalLiteral[value={}]", v.normalize()),
            Expr::StringLiteral(v) => format!("StringLiteral[value={v:?}]"),
            Expr::EmptySequence => "EmptySequence".to_string(),
            Expr::ContextItem => "ContextItem".to_string(),
            Expr::VariableReference(name) => format!("VariableReference[name={name}]"),
            Expr::FunctionCall { name, args } => {
                format!("FunctionCall[name={name}, arity={}]", args.len())
            }
            Expr::Sequence(_) => "Sequence".to_string(),
            Expr::Negate(_) => "Negate".to_string(),
            Expr::Arithmetic { op, .. } => format!("Arithmetic[op={}]", op.symbol()),
            Expr::And(_) => "And".to_string(),
            Expr::Or(_) => "Or".to_string(),
            Expr::ValueComparison { op, .. } => {
                format!("ValueComparison[op={}]", op.value_keyword())
            }
            Expr::GeneralComparison { op, .. } => {
                format!("GeneralComparison[op={}]", op.general_symbol())
            }
            Expr::Union(_) => "Union".to_string(),
            Expr::Intersect { .. } => "Intersect".to_string(),
            Expr::Except { .. } => "Except".to_string(),
            Expr::StringConcat(_) => "StringConcat".to_string(),
            Expr::Range { .. } => "Range".to_string(),
            Expr::If { .. } => "If".to_string(),
            Expr::Let { name, .. } => format!("Let[name={name}]"),
            Expr::RootSlashOnly => "RootSlashOnly".to_string(),
            Expr::RootSlash(_) => "RootSlash".to_string(),
            Expr::RootDoubleSlash(_) => "RootDoubleSlash".to_string(),
            Expr::RelativeSlash { .. } => "RelativeSlash".to_string(),
            Expr::RelativeDoubleSlash { .. } => "RelativeDoubleSlash".to_string(),
            Expr::Step(step) => format!(
                "Step[axis={}, predicates={}]",
                step.axis.name(),
                step.predicates.len()
            ),
            Expr::NameTest(name) => format!("NameTest[name={name}]"),
            Expr::Wildcard(w) => match w {
                Wildcard::AnyName => "Wildcard[*]".to_string(),
                Wildcard::AnyNode => "Wildcard[node()]".to_string(),
                Wildcard::LocalName(l) => format!("Wildcard[*:{l}]"),
                Wildcard::Namespace(ns) => format!("Wildcard[Q{{{ns}}}*]"),
            },
            Expr::Filter { predicates, .. } => format!("Filter[predicates={}]", predicates.len()),
        }
    }

    /// The item type this kind of expression always produces, independent
    /// of its operands.
    pub fn base_result_type(&self) -> StaticType {
        match self {
            Expr::IntegerLiteral(_) | Expr::Range { .. } => StaticType::Atomic(AtomicType::Integer),
            Expr::DecimalLiteral(_) => StaticType::Atomic(AtomicType::Decimal),
            Expr::StringLiteral(_) | Expr::StringConcat(_) => {
                StaticType::Atomic(AtomicType::String)
            }
            Expr::And(_)
            | Expr::Or(_)
            | Expr::ValueComparison { .. }
            | Expr::GeneralComparison { .. } => StaticType::Atomic(AtomicType::Boolean),
            Expr::Arithmetic { .. } | Expr::Negate(_) => StaticType::Atomic(AtomicType::AnyAtomic),
            Expr::RootSlashOnly
            | Expr::RootSlash(_)
            | Expr::RootDoubleSlash(_)
            | Expr::RelativeSlash { .. }
            | Expr::RelativeDoubleSlash { .. }
            | Expr::Step(_)
            | Expr::NameTest(_)
            | Expr::Wildcard(_)
            | Expr::Union(_)
            | Expr::Intersect { .. }
            | Expr::Except { .. } => StaticType::Node,
            _ => StaticType::Item,
        }
    }

    /// The base type narrowed by what the operands are known to produce.
    pub fn static_result_type(&self) -> StaticType {
        let common_of = |items: &[&Expr]| {
            items
                .iter()
                .map(|e| e.static_result_type())
                .reduce(StaticType::common)
                .unwrap_or(StaticType::Item)
        };
        match self {
            Expr::Arithmetic { left, right, .. } => {
                match common_of(&[&**left, &**right]) {
                    t @ StaticType::Atomic(a) if a.is_numeric() => t,
                    _ => self.base_result_type(),
                }
            }
            Expr::Negate(inner) => match inner.static_result_type() {
                t @ StaticType::Atomic(a) if a.is_numeric() => t,
                _ => self.base_result_type(),
            },
            Expr::Sequence(items) => common_of(&items.iter().collect::<Vec<_>>()),
            Expr::If {
                then_branch,
                else_branch,
                ..
            } => common_of(&[&**then_branch, &**else_branch]),
            Expr::Let { body, .. } => body.static_result_type(),
            Expr::Filter { base, .. } => base.static_result_type(),
            _ => self.base_result_type(),
        }
    }

    /// Double dispatch into the per-kind method of `visitor`.
    pub fn accept<C, V: ExprVisitor<C>>(&self, visitor: &mut V, ctx: &C) -> V::Output {
        match self {
            Expr::IntegerLiteral(v) => visitor.visit_integer_literal(self, *v, ctx),
            Expr::DecimalLiteral(v) => visitor.visit_decimal_literal(self, v, ctx),
            Expr::StringLiteral(v) => visitor.visit_string_literal(self, v, ctx),
            Expr::EmptySequence => visitor.visit_empty_sequence(self, ctx),
            Expr::ContextItem => visitor.visit_context_item(self, ctx),
            Expr::VariableReference(name) => visitor.visit_variable_reference(self, name, ctx),
            Expr::FunctionCall { name, args } => visitor.visit_function_call(self, name, args, ctx),
            Expr::Sequence(items) => visitor.visit_sequence(self, items, ctx),
            Expr::Negate(inner) => visitor.visit_negate(self, inner, ctx),
            Expr::Arithmetic { op, left, right } => {
                visitor.visit_arithmetic(self, *op, left, right, ctx)
            }
            Expr::And(items) => visitor.visit_and(self, items, ctx),
            Expr::Or(items) => visitor.visit_or(self, items, ctx),
            Expr::ValueComparison { op, left, right } => {
                visitor.visit_value_comparison(self, *op, left, right, ctx)
            }
            Expr::GeneralComparison { op, left, right } => {
                visitor.visit_general_comparison(self, *op, left, right, ctx)
            }
            Expr::Union(items) => visitor.visit_union(self, items, ctx),
            Expr::Intersect { left, right } => visitor.visit_intersect(self, left, right, ctx),
            Expr::Except { left, right } => visitor.visit_except(self, left, right, ctx),
            Expr::StringConcat(items) => visitor.visit_string_concat(self, items, ctx),
            Expr::Range { start, end } => visitor.visit_range(self, start, end, ctx),
            Expr::If {
                condition,
                then_branch,
                else_branch,
            } => visitor.visit_if(self, condition, then_branch, else_branch, ctx),
            Expr::Let { name, bound, body } => visitor.visit_let(self, name, bound, body, ctx),
            Expr::RootSlashOnly => visitor.visit_root_slash_only(self, ctx),
            Expr::RootSlash(path) => visitor.visit_root_slash(self, path, ctx),
            Expr::RootDoubleSlash(path) => visitor.visit_root_double_slash(self, path, ctx),
            Expr::RelativeSlash { left, right } => {
                visitor.visit_relative_slash(self, left, right, ctx)
            }
            Expr::RelativeDoubleSlash { left, right } => {
                visitor.visit_relative_double_slash(self, left, right, ctx)
            }
            Expr::Step(step) => visitor.visit_step(self, step, ctx),
            Expr::NameTest(name) => visitor.visit_name_test(self, name, ctx),
            Expr::Wildcard(w) => visitor.visit_wildcard(self, w, ctx),
            Expr::Filter { base, predicates } => visitor.visit_filter(self, base, predicates, ctx),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&AstPrinter::print(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_type(src: &str) -> StaticType {
        crate::compile(src).unwrap().ast().static_result_type()
    }

    const INTEGER: StaticType = StaticType::Atomic(AtomicType::Integer);
    const DECIMAL: StaticType = StaticType::Atomic(AtomicType::Decimal);

    #[test]
    fn literals_have_their_own_type() {
        assert_eq!(static_type("1"), INTEGER);
        assert_eq!(static_type("1.5"), DECIMAL);
        assert_eq!(static_type("'a'"), StaticType::Atomic(AtomicType::String));
        assert_eq!(static_type("'a' || 1"), StaticType::Atomic(AtomicType::String));
        assert_eq!(static_type("()"), StaticType::Item);
    }

    #[test]
    fn arithmetic_promotes_numeric_operands() {
        assert_eq!(static_type("1 + 2"), INTEGER);
        assert_eq!(static_type("1 + 2.5"), DECIMAL);
        assert_eq!(static_type("-(2.5)"), DECIMAL);
        assert_eq!(static_type("1 + 'a'"), StaticType::Atomic(AtomicType::AnyAtomic));
        assert_eq!(static_type("1 to 3"), INTEGER);
    }

    #[test]
    fn paths_and_comparisons() {
        assert_eq!(static_type("//control/title"), StaticType::Node);
        assert_eq!(static_type("/"), StaticType::Node);
        assert_eq!(static_type("a | b"), StaticType::Node);
        assert_eq!(static_type("1 = 2"), StaticType::Atomic(AtomicType::Boolean));
        assert_eq!(static_type("1 lt 2 and true()"), StaticType::Atomic(AtomicType::Boolean));
    }

    #[test]
    fn branches_and_bindings_combine() {
        assert_eq!(static_type("if (.) then 1 else 2.5"), DECIMAL);
        assert_eq!(static_type("if (.) then //a else 1"), StaticType::Item);
        assert_eq!(static_type("if (.) then a else b"), StaticType::Node);
        assert_eq!(static_type("(1, 2)[1]"), INTEGER);
        assert_eq!(static_type("let $x := 1 return 'x'"), StaticType::Atomic(AtomicType::String));
        assert_eq!(static_type("let $x := 1 return $x"), StaticType::Item);
    }

    #[test]
    fn common_types_and_names() {
        assert_eq!(INTEGER.common(DECIMAL), DECIMAL);
        assert_eq!(
            INTEGER.common(StaticType::Atomic(AtomicType::Date)),
            StaticType::Atomic(AtomicType::AnyAtomic)
        );
        assert_eq!(StaticType::Node.common(INTEGER), StaticType::Item);
        assert_eq!(StaticType::Node.to_string(), "node()");
        assert_eq!(DECIMAL.to_string(), "decimal");
        assert_eq!(StaticType::Item.to_string(), "item()");
    }
}
