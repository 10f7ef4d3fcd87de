//! String functions. Only the codepoint collation exists, so comparisons
//! and searches work on Unicode scalar values.
use itertools::Itertools;
use rust_decimal::Decimal;

use super::{CallCtx, opt_atomic, opt_str};
use crate::error::{Error, ErrorCode};
use crate::item::numeric::round_half_up;
use crate::item::{AtomicValue, Sequence};
use crate::model::MetapathNode;

/// String value of the argument at `index`, or of the context item.
fn string_arg<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
    index: usize,
) -> Result<String, Error> {
    let arg = ctx.arg_or_context(args, index)?;
    Ok(arg.first().map(|it| it.string_value()).unwrap_or_default())
}

pub(super) fn string<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(string_arg(ctx, args, 0)?))
}

pub(super) fn string_length<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let n = string_arg(ctx, args, 0)?.chars().count();
    Ok(Sequence::atomic(i64::try_from(n).unwrap_or(i64::MAX)))
}

pub(super) fn concat<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(args.iter().map(opt_str).join("")))
}

pub(super) fn contains<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(opt_str(&args[0]).contains(&opt_str(&args[1]))))
}

pub(super) fn starts_with<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(opt_str(&args[0]).starts_with(&opt_str(&args[1]))))
}

pub(super) fn ends_with<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(opt_str(&args[0]).ends_with(&opt_str(&args[1]))))
}

fn number<N: MetapathNode>(arg: &Sequence<N>) -> Decimal {
    opt_atomic(arg)
        .and_then(AtomicValue::as_decimal)
        .unwrap_or_default()
}

/// Characters at 1-based positions `p` with
/// `round(start) <= p < round(start) + round(length)`.
pub(super) fn substring<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let source = opt_str(&args[0]);
    let start = round_half_up(number(&args[1]));
    let end = args
        .get(2)
        .and_then(|len| start.checked_add(round_half_up(number(len))));
    let out: String = source
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            let p = Decimal::from(*i + 1);
            p >= start && end.is_none_or(|e| p < e)
        })
        .map(|(_, c)| c)
        .collect();
    Ok(Sequence::atomic(out))
}

pub(super) fn upper_case<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(opt_str(&args[0]).to_uppercase()))
}

pub(super) fn lower_case<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    Ok(Sequence::atomic(opt_str(&args[0]).to_lowercase()))
}

pub(super) fn normalize_space<N: MetapathNode>(
    ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let s = string_arg(ctx, args, 0)?;
    Ok(Sequence::atomic(s.split_whitespace().join(" ")))
}

fn build_regex(pattern: &str, flags: &str) -> Result<fancy_regex::Regex, Error> {
    let mut builder = fancy_regex::RegexBuilder::new(pattern);
    for ch in flags.chars() {
        match ch {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.verbose_mode(true);
            }
            _ => {
                return Err(Error::from_code(
                    ErrorCode::FORX0001,
                    format!("unsupported regex flag: {ch}"),
                ));
            }
        }
    }
    Ok(builder.build()?)
}

pub(super) fn matches<N: MetapathNode>(
    _ctx: &CallCtx<N>,
    args: &[Sequence<N>],
) -> Result<Sequence<N>, Error> {
    let input = opt_str(&args[0]);
    let flags = args.get(2).map(opt_str).unwrap_or_default();
    let re = build_regex(&opt_str(&args[1]), &flags)?;
    Ok(Sequence::atomic(re.is_match(&input)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_flags() {
        assert!(build_regex("^abc$", "i").unwrap().is_match("ABC").unwrap());
        let err = build_regex("a", "z").unwrap_err();
        assert_eq!(err.code, ErrorCode::FORX0001);
        let err = build_regex("(", "").unwrap_err();
        assert_eq!(err.code, ErrorCode::FORX0002);
    }
}
