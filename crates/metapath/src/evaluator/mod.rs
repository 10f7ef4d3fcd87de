//! Tree-walking evaluation of [`Expr`].
//!
//! Evaluation is one recursive `match` over the expression kinds. The focus
//! is the sequence `.` denotes; `None` means no context item was supplied
//! at all, which only matters to expressions that read it.
pub(crate) mod arithmetic;
mod axis;
pub(crate) mod comparison;
mod path;
mod set_ops;

use core::cmp::Ordering;

use itertools::Itertools;

use crate::ast::Expr;
use crate::context::DynamicContext;
use crate::error::{Error, ErrorCode};
use crate::functions::CallCtx;
use crate::item::numeric::{NumKind, classify};
use crate::item::{AtomicType, AtomicValue, Item, Sequence};
use crate::model::{ExpandedName, MetapathNode};

/// Longest sequence a single `to` expression may produce.
pub(crate) const MAX_RANGE_ITEMS: u64 = 1 << 24;

impl Expr {
    /// Evaluate with `focus` as the context sequence.
    pub fn evaluate<N: MetapathNode>(
        &self,
        ctx: &DynamicContext<N>,
        focus: &Sequence<N>,
    ) -> Result<Sequence<N>, Error> {
        eval(self, ctx, Some(focus))
    }
}

pub(crate) fn require_focus<N>(focus: Option<&Sequence<N>>) -> Result<&Sequence<N>, Error> {
    focus.ok_or_else(|| Error::from_code(ErrorCode::MPDY0002, "context item is absent"))
}

pub(crate) fn eval<N: MetapathNode>(
    expr: &Expr,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    match expr {
        Expr::IntegerLiteral(v) => Ok(Sequence::atomic(*v)),
        Expr::DecimalLiteral(v) => Ok(Sequence::atomic(*v)),
        Expr::StringLiteral(v) => Ok(Sequence::atomic(v.as_str())),
        Expr::EmptySequence => Ok(Sequence::empty()),
        Expr::ContextItem => require_focus(focus).cloned(),
        Expr::VariableReference(name) => ctx.variable(name),
        Expr::FunctionCall { name, args } => call_function(name, args, ctx, focus),
        Expr::Sequence(items) => {
            let mut out = Sequence::empty();
            for item in items {
                out.extend(eval(item, ctx, focus)?);
            }
            Ok(out)
        }
        Expr::Negate(inner) => arithmetic::negate(&eval(inner, ctx, focus)?),
        Expr::Arithmetic { op, left, right } => {
            let l = eval(left, ctx, focus)?;
            let r = eval(right, ctx, focus)?;
            arithmetic::evaluate(ctx, *op, &l, &r)
        }
        Expr::And(operands) => {
            for operand in operands {
                if !eval(operand, ctx, focus)?.ebv()? {
                    return Ok(Sequence::atomic(false));
                }
            }
            Ok(Sequence::atomic(true))
        }
        Expr::Or(operands) => {
            for operand in operands {
                if eval(operand, ctx, focus)?.ebv()? {
                    return Ok(Sequence::atomic(true));
                }
            }
            Ok(Sequence::atomic(false))
        }
        Expr::ValueComparison { op, left, right } => {
            let l = eval(left, ctx, focus)?;
            let r = eval(right, ctx, focus)?;
            comparison::value_compare(ctx, *op, &l, &r)
        }
        Expr::GeneralComparison { op, left, right } => {
            let l = eval(left, ctx, focus)?;
            let r = eval(right, ctx, focus)?;
            comparison::general_compare(ctx, *op, &l, &r)
        }
        Expr::Union(operands) => {
            let evaluated = operands
                .iter()
                .map(|o| eval(o, ctx, focus))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(set_ops::union(evaluated))
        }
        Expr::Intersect { left, right } => {
            let l = eval(left, ctx, focus)?;
            let r = eval(right, ctx, focus)?;
            set_ops::intersect(&l, &r)
        }
        Expr::Except { left, right } => {
            let l = eval(left, ctx, focus)?;
            let r = eval(right, ctx, focus)?;
            set_ops::except(&l, &r)
        }
        Expr::StringConcat(operands) => string_concat(operands, ctx, focus),
        Expr::Range { start, end } => range(start, end, ctx, focus),
        Expr::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if eval(condition, ctx, focus)?.ebv()? {
                eval(then_branch, ctx, focus)
            } else {
                eval(else_branch, ctx, focus)
            }
        }
        Expr::Let { name, bound, body } => {
            let value = eval(bound, ctx, focus)?;
            let scoped = ctx.bind_variable(name.clone(), value);
            eval(body, &scoped, focus)
        }
        Expr::RootSlashOnly => path::root_slash_only(focus),
        Expr::RootSlash(inner) => path::root_slash(inner, ctx, focus),
        Expr::RootDoubleSlash(inner) => path::root_double_slash(inner, ctx, focus),
        Expr::RelativeSlash { left, right } => path::relative_slash(left, right, ctx, focus),
        Expr::RelativeDoubleSlash { left, right } => {
            path::relative_double_slash(left, right, ctx, focus)
        }
        Expr::Step(step) => path::step(step, ctx, focus),
        Expr::NameTest(name) => path::name_test(name, focus),
        Expr::Wildcard(wildcard) => path::wildcard_test(wildcard, focus),
        Expr::Filter { base, predicates } => {
            let base = eval(base, ctx, focus)?;
            Ok(Sequence::of(apply_predicates(
                base.into_vec(),
                predicates,
                ctx,
                false,
            )?))
        }
    }
}

/// Filter `items` through each predicate in turn, re-numbering positions
/// between predicates. A predicate whose value is a single number keeps the
/// item at that 1-based position; any other value is taken by its
/// effective boolean value. With `reverse`, positions count from the end.
pub(crate) fn apply_predicates<N: MetapathNode>(
    mut items: Vec<Item<N>>,
    predicates: &[Expr],
    ctx: &DynamicContext<N>,
    reverse: bool,
) -> Result<Vec<Item<N>>, Error> {
    for predicate in predicates {
        let len = items.len();
        let mut kept = Vec::with_capacity(len);
        for (i, item) in items.into_iter().enumerate() {
            let position = if reverse { len - i } else { i + 1 };
            let focus = Sequence::singleton(item);
            let value = eval(predicate, ctx, Some(&focus))?;
            if predicate_holds(&value, position)? {
                kept.extend(focus);
            }
        }
        items = kept;
    }
    Ok(items)
}

fn predicate_holds<N: MetapathNode>(value: &Sequence<N>, position: usize) -> Result<bool, Error> {
    if let [Item::Atomic(a)] = value.items()
        && let Some(n) = classify(a)
    {
        let position = NumKind::Int(i64::try_from(position).unwrap_or(i64::MAX));
        return Ok(n.compare(position) == Ordering::Equal);
    }
    value.ebv()
}

fn call_function<N: MetapathNode>(
    name: &ExpandedName,
    args: &[Expr],
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let static_ctx = ctx.static_context();
    let function = ctx
        .functions()
        .resolve(name, args.len(), static_ctx.default_function_namespace())?;
    let values = args
        .iter()
        .map(|a| eval(a, ctx, focus))
        .collect::<Result<Vec<_>, _>>()?;
    let call = CallCtx {
        dyn_ctx: ctx,
        static_ctx,
        focus,
    };
    function.invoke(name, &call, values)
}

/// Zero or one atomized value; more is a type error naming `what`.
pub(crate) fn zero_or_one<N: MetapathNode>(
    seq: &Sequence<N>,
    what: &str,
) -> Result<Option<AtomicValue>, Error> {
    let mut atoms = seq.atomize()?;
    if atoms.len() > 1 {
        return Err(Error::type_err(format!(
            "{what} expects at most one item, got {}",
            atoms.len()
        )));
    }
    Ok(atoms.pop())
}

fn string_concat<N: MetapathNode>(
    operands: &[Expr],
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let parts = operands
        .iter()
        .map(|o| {
            let value = zero_or_one(&eval(o, ctx, focus)?, "'||'")?;
            Ok(value.map(|v| v.to_string()).unwrap_or_default())
        })
        .collect::<Result<Vec<String>, Error>>()?;
    Ok(Sequence::atomic(parts.into_iter().join("")))
}

fn range_bound<N: MetapathNode>(seq: &Sequence<N>) -> Result<Option<i64>, Error> {
    match zero_or_one(seq, "'to'")? {
        None => Ok(None),
        Some(AtomicValue::Integer(i)) => Ok(Some(i)),
        Some(v @ AtomicValue::Untyped(_)) => match v.cast_to(AtomicType::Integer)? {
            AtomicValue::Integer(i) => Ok(Some(i)),
            _ => Ok(None),
        },
        Some(other) => Err(Error::type_err(format!(
            "range bound must be an integer, got {}",
            other.type_of()
        ))),
    }
}

fn range<N: MetapathNode>(
    start: &Expr,
    end: &Expr,
    ctx: &DynamicContext<N>,
    focus: Option<&Sequence<N>>,
) -> Result<Sequence<N>, Error> {
    let (Some(from), Some(to)) = (
        range_bound(&eval(start, ctx, focus)?)?,
        range_bound(&eval(end, ctx, focus)?)?,
    ) else {
        return Ok(Sequence::empty());
    };
    if from > to {
        return Ok(Sequence::empty());
    }
    let count = to.abs_diff(from).saturating_add(1);
    if count > MAX_RANGE_ITEMS {
        return Err(Error::from_code(
            ErrorCode::FOAR0002,
            format!("range {from} to {to} has {count} items, more than {MAX_RANGE_ITEMS}"),
        ));
    }
    Ok((from..=to).map(|i| Item::Atomic(AtomicValue::Integer(i))).collect())
}
