use std::str::FromStr;

use pest::iterators::Pair;
use rust_decimal::Decimal;

use super::Rule;
use crate::ast::{ArithmeticOp, Axis, ComparisonOp, Expr, Step, Wildcard};
use crate::context::StaticContext;
use crate::error::{Error, ErrorCode};
use crate::model::ExpandedName;

/// Which default namespace an unprefixed name picks up.
#[derive(Clone, Copy)]
enum NameRole {
    Function,
    Variable,
    ModelItem,
    Flag,
}

fn malformed(pair: &Pair<'_, Rule>, what: &str) -> Error {
    let (line, col) = pair.line_col();
    Error::from_code(
        ErrorCode::MPST0003,
        format!("malformed {what} at {line}:{col}: `{}`", pair.as_str()),
    )
}

fn boxed(e: Expr) -> Box<Expr> {
    Box::new(e)
}

pub(crate) struct AstBuilder<'a> {
    ctx: &'a StaticContext,
}

impl<'a> AstBuilder<'a> {
    pub(crate) fn new(ctx: &'a StaticContext) -> Self {
        Self { ctx }
    }

    pub(crate) fn build(&self, root: Pair<'_, Rule>) -> Result<Expr, Error> {
        let expr = root
            .clone()
            .into_inner()
            .find(|p| p.as_rule() == Rule::expr)
            .ok_or_else(|| malformed(&root, "expression"))?;
        self.expr(expr)
    }

    fn expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut items = pair
            .into_inner()
            .map(|p| self.expr_single(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Expr::Sequence(items)
        })
    }

    fn expr_single(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        match pair.as_rule() {
            Rule::let_expr => self.let_expr(pair),
            Rule::if_expr => self.if_expr(pair),
            Rule::or_expr => self.or_expr(pair),
            _ => Err(malformed(&pair, "expression")),
        }
    }

    fn let_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut bindings = Vec::new();
        let mut body = None;
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::K_LET | Rule::K_RETURN => {}
                Rule::let_binding => {
                    let mut inner = p.clone().into_inner();
                    let name_pair = inner.next().ok_or_else(|| malformed(&p, "let binding"))?;
                    let value = inner.next().ok_or_else(|| malformed(&p, "let binding"))?;
                    bindings.push((
                        self.resolve_name(&name_pair, NameRole::Variable)?,
                        self.expr_single(value)?,
                    ));
                }
                _ => body = Some(self.expr_single(p)?),
            }
        }
        let mut expr = body.ok_or_else(|| malformed(&pair, "let expression"))?;
        for (name, bound) in bindings.into_iter().rev() {
            expr = Expr::Let {
                name,
                bound: boxed(bound),
                body: boxed(expr),
            };
        }
        Ok(expr)
    }

    fn if_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let parts: Vec<_> = pair
            .clone()
            .into_inner()
            .filter(|p| !matches!(p.as_rule(), Rule::K_IF | Rule::K_THEN | Rule::K_ELSE))
            .collect();
        let [condition, then_branch, else_branch] = <[_; 3]>::try_from(parts)
            .map_err(|_| malformed(&pair, "if expression"))?;
        Ok(Expr::If {
            condition: boxed(self.expr(condition)?),
            then_branch: boxed(self.expr_single(then_branch)?),
            else_branch: boxed(self.expr_single(else_branch)?),
        })
    }

    /// Operands of an n-ary rule, keeping only pairs of `operand` rule.
    fn operands<'i>(pair: Pair<'i, Rule>, operand: Rule) -> Vec<Pair<'i, Rule>> {
        pair.into_inner().filter(|p| p.as_rule() == operand).collect()
    }

    fn n_ary(
        &self,
        pair: Pair<'_, Rule>,
        operand: Rule,
        next: impl Fn(&Self, Pair<'_, Rule>) -> Result<Expr, Error>,
        wrap: fn(Vec<Expr>) -> Expr,
    ) -> Result<Expr, Error> {
        let mut items = Self::operands(pair, operand)
            .into_iter()
            .map(|p| next(self, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            wrap(items)
        })
    }

    fn or_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.n_ary(pair, Rule::and_expr, Self::and_expr, Expr::Or)
    }

    fn and_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.n_ary(pair, Rule::comparison_expr, Self::comparison_expr, Expr::And)
    }

    fn comparison_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut inner = pair.clone().into_inner();
        let left = inner.next().ok_or_else(|| malformed(&pair, "comparison"))?;
        let left = self.string_concat_expr(left)?;
        let Some(op) = inner.next() else {
            return Ok(left);
        };
        let right = inner.next().ok_or_else(|| malformed(&pair, "comparison"))?;
        let right = boxed(self.string_concat_expr(right)?);
        let left = boxed(left);
        let kind = match op.as_str().trim() {
            "=" | "eq" => ComparisonOp::Eq,
            "!=" | "ne" => ComparisonOp::Ne,
            "<" | "lt" => ComparisonOp::Lt,
            "<=" | "le" => ComparisonOp::Le,
            ">" | "gt" => ComparisonOp::Gt,
            ">=" | "ge" => ComparisonOp::Ge,
            _ => return Err(malformed(&op, "comparison operator")),
        };
        Ok(match op.as_rule() {
            Rule::value_comp => Expr::ValueComparison {
                op: kind,
                left,
                right,
            },
            _ => Expr::GeneralComparison {
                op: kind,
                left,
                right,
            },
        })
    }

    fn string_concat_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.n_ary(pair, Rule::range_expr, Self::range_expr, Expr::StringConcat)
    }

    fn range_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut bounds = Self::operands(pair.clone(), Rule::additive_expr).into_iter();
        let start = bounds.next().ok_or_else(|| malformed(&pair, "range"))?;
        let start = self.additive_expr(start)?;
        match bounds.next() {
            None => Ok(start),
            Some(end) => Ok(Expr::Range {
                start: boxed(start),
                end: boxed(self.additive_expr(end)?),
            }),
        }
    }

    /// Left-associative fold of `operand (op operand)*`.
    fn fold_binary(
        &self,
        pair: Pair<'_, Rule>,
        next: impl Fn(&Self, Pair<'_, Rule>) -> Result<Expr, Error>,
        combine: impl Fn(&Pair<'_, Rule>, Expr, Expr) -> Result<Expr, Error>,
    ) -> Result<Expr, Error> {
        let mut inner = pair.clone().into_inner();
        let first = inner.next().ok_or_else(|| malformed(&pair, "operand"))?;
        let mut acc = next(self, first)?;
        while let Some(op) = inner.next() {
            let rhs = inner.next().ok_or_else(|| malformed(&op, "operand"))?;
            acc = combine(&op, acc, next(self, rhs)?)?;
        }
        Ok(acc)
    }

    fn arithmetic(op: &Pair<'_, Rule>, left: Expr, right: Expr) -> Result<Expr, Error> {
        let op = match op.as_str().trim() {
            "+" => ArithmeticOp::Add,
            "-" => ArithmeticOp::Subtract,
            "*" => ArithmeticOp::Multiply,
            "div" => ArithmeticOp::Divide,
            "idiv" => ArithmeticOp::IntegerDivide,
            "mod" => ArithmeticOp::Modulo,
            _ => return Err(malformed(op, "arithmetic operator")),
        };
        Ok(Expr::Arithmetic {
            op,
            left: boxed(left),
            right: boxed(right),
        })
    }

    fn additive_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.fold_binary(pair, Self::multiplicative_expr, Self::arithmetic)
    }

    fn multiplicative_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.fold_binary(pair, Self::union_expr, Self::arithmetic)
    }

    fn union_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.n_ary(
            pair,
            Rule::intersect_except_expr,
            Self::intersect_except_expr,
            Expr::Union,
        )
    }

    fn intersect_except_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.fold_binary(pair, Self::unary_expr, |op, left, right| {
            let (left, right) = (boxed(left), boxed(right));
            match op.as_str().trim() {
                "intersect" => Ok(Expr::Intersect { left, right }),
                "except" => Ok(Expr::Except { left, right }),
                _ => Err(malformed(op, "set operator")),
            }
        })
    }

    fn unary_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut minus = 0usize;
        let mut operand = None;
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::unary_sign if p.as_str() == "-" => minus += 1,
                Rule::unary_sign => {}
                _ => operand = Some(self.path_expr(p)?),
            }
        }
        let operand = operand.ok_or_else(|| malformed(&pair, "unary expression"))?;
        Ok(if minus % 2 == 1 {
            Expr::Negate(boxed(operand))
        } else {
            operand
        })
    }

    fn path_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let inner = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| malformed(&pair, "path"))?;
        match inner.as_rule() {
            Rule::root_double_slash => {
                let rel = inner
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| malformed(&inner, "path"))?;
                Ok(Expr::RootDoubleSlash(boxed(self.relative_path(rel)?)))
            }
            Rule::root_slash => match inner.into_inner().next() {
                Some(rel) => Ok(Expr::RootSlash(boxed(self.relative_path(rel)?))),
                None => Ok(Expr::RootSlashOnly),
            },
            Rule::relative_path_expr => self.relative_path(inner),
            _ => Err(malformed(&inner, "path")),
        }
    }

    fn relative_path(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        self.fold_binary(pair, Self::step_expr, |sep, left, right| {
            let (left, right) = (boxed(left), boxed(right));
            Ok(match sep.as_str() {
                "//" => Expr::RelativeDoubleSlash { left, right },
                _ => Expr::RelativeSlash { left, right },
            })
        })
    }

    fn step_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        match pair.as_rule() {
            Rule::postfix_expr => self.postfix_expr(pair),
            Rule::axis_step => self.axis_step(pair),
            _ => Err(malformed(&pair, "step")),
        }
    }

    fn postfix_expr(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut inner = pair.clone().into_inner();
        let primary = inner.next().ok_or_else(|| malformed(&pair, "primary expression"))?;
        let base = self.primary(primary)?;
        let predicates = inner
            .map(|p| self.predicate(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(if predicates.is_empty() {
            base
        } else {
            Expr::Filter {
                base: boxed(base),
                predicates,
            }
        })
    }

    fn predicate(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let inner = pair
            .clone()
            .into_inner()
            .next()
            .ok_or_else(|| malformed(&pair, "predicate"))?;
        self.expr(inner)
    }

    fn primary(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        match pair.as_rule() {
            Rule::integer_literal => Ok(match pair.as_str().parse::<i64>() {
                Ok(v) => Expr::IntegerLiteral(v),
                // too large for an integer; keep it exact as a decimal
                Err(_) => Expr::DecimalLiteral(Self::decimal(&pair)?),
            }),
            Rule::decimal_literal => Ok(Expr::DecimalLiteral(Self::decimal(&pair)?)),
            Rule::string_literal => {
                let content = pair.clone().into_inner().next();
                Ok(Expr::StringLiteral(match content {
                    Some(c) if c.as_rule() == Rule::dq_inner => c.as_str().replace("\"\"", "\""),
                    Some(c) => c.as_str().replace("''", "'"),
                    None => String::new(),
                }))
            }
            Rule::var_ref => {
                let name = pair
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| malformed(&pair, "variable reference"))?;
                Ok(Expr::VariableReference(
                    self.resolve_name(&name, NameRole::Variable)?,
                ))
            }
            Rule::parenthesized_expr => match pair.into_inner().next() {
                Some(inner) => self.expr(inner),
                None => Ok(Expr::EmptySequence),
            },
            Rule::context_item => Ok(Expr::ContextItem),
            Rule::function_call => {
                let mut inner = pair.clone().into_inner();
                let name = inner
                    .next()
                    .ok_or_else(|| malformed(&pair, "function call"))?;
                let name = self.resolve_name(&name, NameRole::Function)?;
                let args = inner
                    .map(|p| self.expr_single(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::FunctionCall { name, args })
            }
            _ => Err(malformed(&pair, "primary expression")),
        }
    }

    fn decimal(pair: &Pair<'_, Rule>) -> Result<Decimal, Error> {
        let text = pair.as_str();
        let mut normalized = String::with_capacity(text.len() + 1);
        if text.starts_with('.') {
            normalized.push('0');
        }
        normalized.push_str(text.strip_suffix('.').unwrap_or(text));
        Decimal::from_str(&normalized).map_err(|e| {
            malformed(pair, "numeric literal").with_source(Some(
                std::sync::Arc::new(e) as std::sync::Arc<dyn std::error::Error + Send + Sync>
            ))
        })
    }

    fn axis_step(&self, pair: Pair<'_, Rule>) -> Result<Expr, Error> {
        let mut inner = pair.clone().into_inner();
        let head = inner.next().ok_or_else(|| malformed(&pair, "step"))?;
        let (axis, test) = match head.as_rule() {
            Rule::explicit_step => {
                let mut parts = head.clone().into_inner();
                let axis_pair = parts.next().ok_or_else(|| malformed(&head, "axis step"))?;
                let test_pair = parts.next().ok_or_else(|| malformed(&head, "axis step"))?;
                let axis = match axis_pair.as_str() {
                    "self" => Axis::SelfAxis,
                    "parent" => Axis::Parent,
                    "ancestor" => Axis::Ancestor,
                    "ancestor-or-self" => Axis::AncestorOrSelf,
                    "child" => Axis::Children,
                    "descendant" => Axis::Descendant,
                    "descendant-or-self" => Axis::DescendantOrSelf,
                    "flag" => Axis::Flag,
                    _ => return Err(malformed(&axis_pair, "axis")),
                };
                let role = if axis == Axis::Flag {
                    NameRole::Flag
                } else {
                    NameRole::ModelItem
                };
                (axis, self.node_test(test_pair, role)?)
            }
            Rule::abbrev_flag_step => {
                let test_pair = head
                    .clone()
                    .into_inner()
                    .next()
                    .ok_or_else(|| malformed(&head, "flag step"))?;
                (Axis::Flag, self.node_test(test_pair, NameRole::Flag)?)
            }
            Rule::abbrev_parent => (Axis::Parent, Expr::Wildcard(Wildcard::AnyNode)),
            _ => (Axis::Children, self.node_test(head, NameRole::ModelItem)?),
        };
        let predicates = inner
            .map(|p| self.predicate(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Step(Step {
            axis,
            test: boxed(test),
            predicates,
        }))
    }

    fn node_test(&self, pair: Pair<'_, Rule>, role: NameRole) -> Result<Expr, Error> {
        match pair.as_rule() {
            Rule::kind_test => Ok(Expr::Wildcard(Wildcard::AnyNode)),
            Rule::wildcard => {
                let text = pair.as_str();
                if text == "*" {
                    Ok(Expr::Wildcard(Wildcard::AnyName))
                } else if let Some(local) = text.strip_prefix("*:") {
                    Ok(Expr::Wildcard(Wildcard::LocalName(local.to_string())))
                } else if let Some(prefix) = text.strip_suffix(":*") {
                    Ok(Expr::Wildcard(Wildcard::Namespace(
                        self.resolve_prefix(prefix, &pair)?.to_string(),
                    )))
                } else {
                    Err(malformed(&pair, "wildcard"))
                }
            }
            Rule::qname | Rule::uri_qualified_name => {
                Ok(Expr::NameTest(self.resolve_name(&pair, role)?))
            }
            _ => Err(malformed(&pair, "node test")),
        }
    }

    fn resolve_prefix(&self, prefix: &str, pair: &Pair<'_, Rule>) -> Result<&'a str, Error> {
        self.ctx.namespace_uri(prefix).ok_or_else(|| {
            let (line, col) = pair.line_col();
            Error::from_code(
                ErrorCode::MPST0081,
                format!("unknown namespace prefix '{prefix}' at {line}:{col}"),
            )
        })
    }

    fn resolve_name(&self, pair: &Pair<'_, Rule>, role: NameRole) -> Result<ExpandedName, Error> {
        match pair.as_rule() {
            Rule::uri_qualified_name => {
                let mut ns = None;
                let mut local = None;
                for p in pair.clone().into_inner() {
                    match p.as_rule() {
                        Rule::uri_text => ns = Some(p.as_str().trim()),
                        Rule::ncname => local = Some(p.as_str()),
                        _ => {}
                    }
                }
                let local = local.ok_or_else(|| malformed(pair, "name"))?;
                Ok(ExpandedName::new(ns.filter(|s| !s.is_empty()), local))
            }
            Rule::qname => match pair.as_str().split_once(':') {
                Some((prefix, local)) => Ok(ExpandedName::new(
                    Some(self.resolve_prefix(prefix, pair)?),
                    local,
                )),
                None => {
                    let default_ns = match role {
                        NameRole::Function => self.ctx.default_function_namespace(),
                        NameRole::ModelItem => self.ctx.default_model_namespace(),
                        NameRole::Variable | NameRole::Flag => None,
                    };
                    Ok(ExpandedName::new(default_ns, pair.as_str()))
                }
            },
            _ => Err(malformed(pair, "name")),
        }
    }
}
