//! Static visitor protocol over [`Expr`].
//!
//! Every per-kind method defaults to [`ExprVisitor::visit_children`], which
//! folds the results of all children with `aggregate_result`, seeded by
//! `default_result`. Concrete visitors override only the kinds they care
//! about. `should_visit_next_child` lets a visitor stop early.
use std::collections::BTreeSet;

use rust_decimal::Decimal;

use super::{ArithmeticOp, ComparisonOp, Expr, Step, Wildcard};
use crate::model::ExpandedName;

/// Default child walk, usable from overriding implementations.
pub fn walk_children<C, V: ExprVisitor<C>>(visitor: &mut V, expr: &Expr, ctx: &C) -> V::Output {
    let mut acc = visitor.default_result();
    for child in expr.children() {
        if !visitor.should_visit_next_child(expr, &acc, ctx) {
            break;
        }
        let next = child.accept(visitor, ctx);
        acc = visitor.aggregate_result(acc, next, ctx);
    }
    acc
}

pub trait ExprVisitor<C>: Sized {
    type Output;

    fn default_result(&mut self) -> Self::Output;

    fn aggregate_result(&mut self, _acc: Self::Output, next: Self::Output, _ctx: &C) -> Self::Output {
        next
    }

    fn should_visit_next_child(&mut self, _parent: &Expr, _acc: &Self::Output, _ctx: &C) -> bool {
        true
    }

    fn visit_children(&mut self, expr: &Expr, ctx: &C) -> Self::Output {
        walk_children(self, expr, ctx)
    }

    fn visit_integer_literal(&mut self, expr: &Expr, _value: i64, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_decimal_literal(&mut self, expr: &Expr, _value: &Decimal, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_string_literal(&mut self, expr: &Expr, _value: &str, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_empty_sequence(&mut self, expr: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_context_item(&mut self, expr: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_variable_reference(&mut self, expr: &Expr, _name: &ExpandedName, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_function_call(
        &mut self,
        expr: &Expr,
        _name: &ExpandedName,
        _args: &[Expr],
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_sequence(&mut self, expr: &Expr, _items: &[Expr], ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_negate(&mut self, expr: &Expr, _operand: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_arithmetic(
        &mut self,
        expr: &Expr,
        _op: ArithmeticOp,
        _left: &Expr,
        _right: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_and(&mut self, expr: &Expr, _operands: &[Expr], ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_or(&mut self, expr: &Expr, _operands: &[Expr], ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_value_comparison(
        &mut self,
        expr: &Expr,
        _op: ComparisonOp,
        _left: &Expr,
        _right: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_general_comparison(
        &mut self,
        expr: &Expr,
        _op: ComparisonOp,
        _left: &Expr,
        _right: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_union(&mut self, expr: &Expr, _operands: &[Expr], ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_intersect(&mut self, expr: &Expr, _left: &Expr, _right: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_except(&mut self, expr: &Expr, _left: &Expr, _right: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_string_concat(&mut self, expr: &Expr, _operands: &[Expr], ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_range(&mut self, expr: &Expr, _start: &Expr, _end: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_if(
        &mut self,
        expr: &Expr,
        _condition: &Expr,
        _then_branch: &Expr,
        _else_branch: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_let(
        &mut self,
        expr: &Expr,
        _name: &ExpandedName,
        _bound: &Expr,
        _body: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_root_slash_only(&mut self, expr: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_root_slash(&mut self, expr: &Expr, _path: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_root_double_slash(&mut self, expr: &Expr, _path: &Expr, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_relative_slash(
        &mut self,
        expr: &Expr,
        _left: &Expr,
        _right: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_relative_double_slash(
        &mut self,
        expr: &Expr,
        _left: &Expr,
        _right: &Expr,
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_step(&mut self, expr: &Expr, _step: &Step, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_name_test(&mut self, expr: &Expr, _name: &ExpandedName, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_wildcard(&mut self, expr: &Expr, _wildcard: &Wildcard, ctx: &C) -> Self::Output {
        self.visit_children(expr, ctx)
    }
    fn visit_filter(
        &mut self,
        expr: &Expr,
        _base: &Expr,
        _predicates: &[Expr],
        ctx: &C,
    ) -> Self::Output {
        self.visit_children(expr, ctx)
    }
}

/// Collects variables referenced but not bound by an enclosing `let`.
#[derive(Debug, Default)]
pub struct FreeVariables;

impl FreeVariables {
    pub fn collect(expr: &Expr) -> BTreeSet<ExpandedName> {
        expr.accept(&mut FreeVariables, &())
    }
}

impl ExprVisitor<()> for FreeVariables {
    type Output = BTreeSet<ExpandedName>;

    fn default_result(&mut self) -> Self::Output {
        BTreeSet::new()
    }

    fn aggregate_result(&mut self, mut acc: Self::Output, next: Self::Output, _ctx: &()) -> Self::Output {
        acc.extend(next);
        acc
    }

    fn visit_variable_reference(&mut self, _expr: &Expr, name: &ExpandedName, _ctx: &()) -> Self::Output {
        BTreeSet::from([name.clone()])
    }

    fn visit_let(
        &mut self,
        _expr: &Expr,
        name: &ExpandedName,
        bound: &Expr,
        body: &Expr,
        ctx: &(),
    ) -> Self::Output {
        let mut free = bound.accept(self, ctx);
        let mut in_body = body.accept(self, ctx);
        in_body.remove(name);
        free.append(&mut in_body);
        free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;

    struct IntegerSum;

    impl ExprVisitor<()> for IntegerSum {
        type Output = i64;

        fn default_result(&mut self) -> i64 {
            0
        }

        fn aggregate_result(&mut self, acc: i64, next: i64, _ctx: &()) -> i64 {
            acc + next
        }

        fn visit_integer_literal(&mut self, _expr: &Expr, value: i64, _ctx: &()) -> i64 {
            value
        }
    }

    struct FirstInteger;

    impl ExprVisitor<()> for FirstInteger {
        type Output = Option<i64>;

        fn default_result(&mut self) -> Option<i64> {
            None
        }

        fn aggregate_result(&mut self, acc: Option<i64>, next: Option<i64>, _ctx: &()) -> Option<i64> {
            acc.or(next)
        }

        fn should_visit_next_child(&mut self, _parent: &Expr, acc: &Option<i64>, _ctx: &()) -> bool {
            acc.is_none()
        }

        fn visit_integer_literal(&mut self, _expr: &Expr, value: i64, _ctx: &()) -> Option<i64> {
            Some(value)
        }
    }

    #[test]
    fn default_walk_reaches_every_child() {
        let compiled = compile("1 + (2 * 3) - count((4, 5))").unwrap();
        assert_eq!(compiled.ast().accept(&mut IntegerSum, &()), 15);
    }

    #[test]
    fn walk_stops_when_asked() {
        let compiled = compile("(7, 8, 9)").unwrap();
        assert_eq!(compiled.ast().accept(&mut FirstInteger, &()), Some(7));
    }

    #[test]
    fn let_binds_only_inside_its_body() {
        let compiled = compile("let $x := 1 return $x, $x").unwrap();
        let free: Vec<String> = FreeVariables::collect(compiled.ast())
            .into_iter()
            .map(|n| n.local)
            .collect();
        assert_eq!(free, vec!["x"]);
    }
}
