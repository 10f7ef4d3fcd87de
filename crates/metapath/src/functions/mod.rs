//! Function registry, call-time argument conversion and the built-in library.
//!
//! Functions are keyed by expanded name and an arity range. Each registration
//! carries the declared parameter types; arguments are converted against
//! them before the implementation runs, so implementations can rely on the
//! shapes they declared.
mod boolean;
mod nodes;
mod numeric;
mod sequences;
mod strings;
mod temporal;

use core::any::{Any, TypeId};
use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::context::{DynamicContext, METAPATH_FUNCTIONS_NS, StaticContext};
use crate::error::{Error, ErrorCode};
use crate::item::numeric::{NumKind, classify_promoting};
use crate::item::{AtomicType, AtomicValue, Item, Sequence};
use crate::model::{ExpandedName, MetapathNode};

pub type Arity = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    One,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    fn admits(self, n: usize) -> bool {
        match self {
            Occurrence::One => n == 1,
            Occurrence::ZeroOrOne => n <= 1,
            Occurrence::ZeroOrMore => true,
            Occurrence::OneOrMore => n >= 1,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Occurrence::One => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemTest {
    AnyItem,
    Node,
    AnyAtomic,
    /// Integer or decimal; untyped text is parsed as a number.
    Numeric,
    Atomic(AtomicType),
}

/// Declared type of a parameter: an item test plus an occurrence indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub item: ItemTest,
    pub occurrence: Occurrence,
}

impl SequenceType {
    pub const fn new(item: ItemTest, occurrence: Occurrence) -> Self {
        Self { item, occurrence }
    }

    pub const fn any_items() -> Self {
        Self::new(ItemTest::AnyItem, Occurrence::ZeroOrMore)
    }

    pub const fn atomic(t: AtomicType, occurrence: Occurrence) -> Self {
        Self::new(ItemTest::Atomic(t), occurrence)
    }

    pub const fn optional_string() -> Self {
        Self::atomic(AtomicType::String, Occurrence::ZeroOrOne)
    }

    pub const fn optional_node() -> Self {
        Self::new(ItemTest::Node, Occurrence::ZeroOrOne)
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            ItemTest::AnyItem => f.write_str("item()")?,
            ItemTest::Node => f.write_str("node()")?,
            ItemTest::AnyAtomic => f.write_str("any-atomic-type")?,
            ItemTest::Numeric => f.write_str("numeric")?,
            ItemTest::Atomic(t) => f.write_str(t.name())?,
        }
        f.write_str(self.occurrence.suffix())
    }
}

/// Error type returned by function resolution.
#[derive(Debug, Clone)]
pub enum ResolveError {
    /// No function with the (possibly default-namespace resolved) name exists.
    Unknown(ExpandedName),
    /// The name is known, but not for the requested arity.
    WrongArity {
        name: ExpandedName,
        arity: Arity,
        available: Vec<Arity>,
    },
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::Unknown(name) => {
                Error::from_code(ErrorCode::MPST0017, format!("unknown function {name}"))
            }
            ResolveError::WrongArity {
                name,
                arity,
                available,
            } => {
                let listed = available
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::from_code(
                    ErrorCode::MPST0017,
                    format!(
                        "function {} does not accept {arity} argument(s) (accepts {listed})",
                        name.local
                    ),
                )
            }
        }
    }
}

/// What an implementation sees besides its arguments.
pub struct CallCtx<'a, N> {
    pub dyn_ctx: &'a DynamicContext<N>,
    pub static_ctx: &'a StaticContext,
    /// `None` when the expression was evaluated without a context item.
    pub focus: Option<&'a Sequence<N>>,
}

impl<N: MetapathNode> CallCtx<'_, N> {
    /// The single context item, for zero-argument forms such as `string()`.
    pub fn context_item(&self) -> Result<Item<N>, Error> {
        match self.focus.map(Sequence::items) {
            None | Some([]) => Err(Error::from_code(
                ErrorCode::MPDY0002,
                "context item is absent",
            )),
            Some([item]) => Ok(item.clone()),
            Some(items) => Err(Error::type_err(format!(
                "context is a sequence of {} items, expected one",
                items.len()
            ))),
        }
    }

    /// The explicit argument at `index`, or the context item when the call
    /// used the shorter form.
    pub(crate) fn arg_or_context(
        &self,
        args: &[Sequence<N>],
        index: usize,
    ) -> Result<Sequence<N>, Error> {
        match args.get(index) {
            Some(arg) => Ok(arg.clone()),
            None => self.context_item().map(Sequence::singleton),
        }
    }
}

pub type FunctionImpl<N> =
    Arc<dyn Fn(&CallCtx<N>, &[Sequence<N>]) -> Result<Sequence<N>, Error> + Send + Sync>;

/// One overload: an arity range, its parameter types and the implementation.
pub struct Function<N> {
    pub min_arity: Arity,
    /// `None` for variadic functions.
    pub max_arity: Option<Arity>,
    /// Declared parameter types; calls past the end reuse the last entry.
    pub params: Vec<SequenceType>,
    func: FunctionImpl<N>,
}

impl<N: MetapathNode> Function<N> {
    fn accepts(&self, arity: Arity) -> bool {
        arity >= self.min_arity && self.max_arity.is_none_or(|m| arity <= m)
    }

    fn param_type(&self, index: usize) -> SequenceType {
        self.params
            .get(index)
            .or(self.params.last())
            .copied()
            .unwrap_or(SequenceType::any_items())
    }

    /// Convert every argument to its declared type, then run the function.
    pub fn invoke(
        &self,
        name: &ExpandedName,
        call: &CallCtx<N>,
        args: Vec<Sequence<N>>,
    ) -> Result<Sequence<N>, Error> {
        let converted = args
            .into_iter()
            .enumerate()
            .map(|(i, arg)| convert_argument(name, i, self.param_type(i), arg))
            .collect::<Result<Vec<_>, _>>()?;
        (self.func)(call, &converted)
    }
}

fn argument_mismatch(name: &ExpandedName, index: usize, expected: SequenceType, found: &str) -> Error {
    Error::type_err(format!(
        "{}(): argument {} expects {expected}, got {found}",
        name.local,
        index + 1
    ))
}

/// Function conversion: atomize for atomic parameters, cast untyped text to
/// the declared type, then check the occurrence indicator.
fn convert_argument<N: MetapathNode>(
    name: &ExpandedName,
    index: usize,
    expected: SequenceType,
    arg: Sequence<N>,
) -> Result<Sequence<N>, Error> {
    let converted: Sequence<N> = match expected.item {
        ItemTest::AnyItem => arg,
        ItemTest::Node => {
            if let Some(bad) = arg.iter().find(|it| !it.is_node()) {
                return Err(argument_mismatch(name, index, expected, &format!("'{bad}'")));
            }
            arg
        }
        ItemTest::AnyAtomic => arg.atomize()?.into_iter().map(Item::Atomic).collect(),
        ItemTest::Numeric => arg
            .atomize()?
            .into_iter()
            .map(|v| match classify_promoting(&v)? {
                Some(n) => Ok(Item::Atomic(NumKind::into_atomic(n))),
                None => Err(argument_mismatch(
                    name,
                    index,
                    expected,
                    v.type_of().name(),
                )),
            })
            .collect::<Result<_, Error>>()?,
        ItemTest::Atomic(target) => arg
            .atomize()?
            .into_iter()
            .map(|v| match v {
                AtomicValue::Untyped(_) => v.cast_to(target).map(Item::Atomic),
                v if v.type_of().derives_from(target) => Ok(Item::Atomic(v)),
                v => Err(argument_mismatch(
                    name,
                    index,
                    expected,
                    v.type_of().name(),
                )),
            })
            .collect::<Result<_, Error>>()?,
    };
    if !expected.occurrence.admits(converted.len()) {
        return Err(argument_mismatch(
            name,
            index,
            expected,
            &format!("a sequence of {} items", converted.len()),
        ));
    }
    Ok(converted)
}

pub struct FunctionRegistry<N> {
    fns: HashMap<ExpandedName, Vec<Function<N>>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self {
            fns: HashMap::new(),
        }
    }
}

impl<N: MetapathNode> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` for `min_arity..=max_arity` (`None`: variadic).
    pub fn register_range(
        &mut self,
        name: ExpandedName,
        min_arity: Arity,
        max_arity: Option<Arity>,
        params: Vec<SequenceType>,
        func: FunctionImpl<N>,
    ) {
        let overloads = self.fns.entry(name).or_default();
        overloads.push(Function {
            min_arity,
            max_arity,
            params,
            func,
        });
        // Most specific first: higher min, then the bounded range before the open one.
        overloads.sort_by(|a, b| {
            b.min_arity
                .cmp(&a.min_arity)
                .then_with(|| match (a.max_arity, b.max_arity) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => core::cmp::Ordering::Less,
                    (None, Some(_)) => core::cmp::Ordering::Greater,
                    (None, None) => core::cmp::Ordering::Equal,
                })
        });
    }

    /// Exact arity, taken from the number of declared parameters.
    pub fn register_ns<F>(&mut self, ns_uri: &str, local: &str, params: Vec<SequenceType>, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[Sequence<N>]) -> Result<Sequence<N>, Error>,
    {
        let arity = params.len();
        self.register_range(
            ExpandedName::new(Some(ns_uri), local),
            arity,
            Some(arity),
            params,
            Arc::new(f),
        );
    }

    /// Optional trailing parameters: `params` declares the longest form.
    pub fn register_ns_range<F>(
        &mut self,
        ns_uri: &str,
        local: &str,
        min_arity: Arity,
        params: Vec<SequenceType>,
        f: F,
    ) where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[Sequence<N>]) -> Result<Sequence<N>, Error>,
    {
        let max = params.len();
        self.register_range(
            ExpandedName::new(Some(ns_uri), local),
            min_arity,
            Some(max),
            params,
            Arc::new(f),
        );
    }

    /// Any number of arguments from `min_arity`, all of type `param`.
    pub fn register_ns_variadic<F>(
        &mut self,
        ns_uri: &str,
        local: &str,
        min_arity: Arity,
        param: SequenceType,
        f: F,
    ) where
        F: 'static + Send + Sync + Fn(&CallCtx<N>, &[Sequence<N>]) -> Result<Sequence<N>, Error>,
    {
        self.register_range(
            ExpandedName::new(Some(ns_uri), local),
            min_arity,
            None,
            vec![param],
            Arc::new(f),
        );
    }

    pub fn contains(&self, name: &ExpandedName, arity: Arity) -> bool {
        self.fns
            .get(name)
            .is_some_and(|o| o.iter().any(|f| f.accepts(arity)))
    }

    /// Resolve by name and arity. An unqualified name is looked up as-is
    /// first, then in `default_ns`.
    pub fn resolve(
        &self,
        name: &ExpandedName,
        arity: Arity,
        default_ns: Option<&str>,
    ) -> Result<&Function<N>, ResolveError> {
        if let Some(f) = self
            .fns
            .get(name)
            .and_then(|o| o.iter().find(|f| f.accepts(arity)))
        {
            return Ok(f);
        }
        let effective = match (&name.ns_uri, default_ns) {
            (None, Some(ns)) => ExpandedName::new(Some(ns), &name.local),
            _ => name.clone(),
        };
        let Some(overloads) = self.fns.get(&effective) else {
            return Err(ResolveError::Unknown(effective));
        };
        if let Some(f) = overloads.iter().find(|f| f.accepts(arity)) {
            return Ok(f);
        }
        let mut available: Vec<Arity> = overloads
            .iter()
            .flat_map(|f| f.min_arity..=f.max_arity.unwrap_or(f.min_arity))
            .collect();
        available.sort_unstable();
        available.dedup();
        Err(ResolveError::WrongArity {
            name: effective,
            arity,
            available,
        })
    }
}

/// Shorthands for parameter declarations.
mod types {
    use super::{ItemTest, Occurrence, SequenceType};
    use crate::item::AtomicType;

    pub(super) const ITEMS: SequenceType = SequenceType::any_items();
    pub(super) const ATOMICS: SequenceType = SequenceType::new(ItemTest::AnyAtomic, Occurrence::ZeroOrMore);
    pub(super) const OPT_ATOMIC: SequenceType = SequenceType::new(ItemTest::AnyAtomic, Occurrence::ZeroOrOne);
    pub(super) const OPT_ITEM: SequenceType = SequenceType::new(ItemTest::AnyItem, Occurrence::ZeroOrOne);
    pub(super) const OPT_STRING: SequenceType = SequenceType::optional_string();
    pub(super) const STRING: SequenceType = SequenceType::atomic(AtomicType::String, Occurrence::One);
    pub(super) const OPT_NUMERIC: SequenceType = SequenceType::new(ItemTest::Numeric, Occurrence::ZeroOrOne);
    pub(super) const NUMERIC: SequenceType = SequenceType::new(ItemTest::Numeric, Occurrence::One);
    pub(super) const OPT_NODE: SequenceType = SequenceType::optional_node();
    pub(super) const OPT_DATE: SequenceType = SequenceType::atomic(AtomicType::Date, Occurrence::ZeroOrOne);
}

type SharedRegistries = Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static SHARED_REGISTRIES: OnceLock<SharedRegistries> = OnceLock::new();

/// The built-in library for node type `N`, built on first use and shared by
/// every dynamic context that does not supply its own registry.
pub fn shared_default_registry<N: MetapathNode>() -> Arc<FunctionRegistry<N>> {
    let shared = {
        let mut registries = SHARED_REGISTRIES
            .get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registries
            .entry(TypeId::of::<N>())
            .or_insert_with(|| Arc::new(default_function_registry::<N>()) as Arc<dyn Any + Send + Sync>)
            .clone()
    };
    shared
        .downcast::<FunctionRegistry<N>>()
        .unwrap_or_else(|_| Arc::new(default_function_registry()))
}

/// The built-in library, registered under the Metapath function namespace.
pub fn default_function_registry<N: MetapathNode>() -> FunctionRegistry<N> {
    use types::*;
    const NS: &str = METAPATH_FUNCTIONS_NS;
    let mut reg = FunctionRegistry::new();

    // ===== Booleans =====
    reg.register_ns(NS, "true", vec![], boolean::fn_true::<N>);
    reg.register_ns(NS, "false", vec![], boolean::fn_false::<N>);
    reg.register_ns(NS, "not", vec![ITEMS], boolean::fn_not::<N>);
    reg.register_ns(NS, "boolean", vec![ITEMS], boolean::fn_boolean::<N>);

    // ===== Sequences =====
    reg.register_ns(NS, "count", vec![ITEMS], sequences::count::<N>);
    reg.register_ns(NS, "empty", vec![ITEMS], sequences::empty::<N>);
    reg.register_ns(NS, "exists", vec![ITEMS], sequences::exists::<N>);
    reg.register_ns(NS, "head", vec![ITEMS], sequences::head::<N>);
    reg.register_ns(NS, "tail", vec![ITEMS], sequences::tail::<N>);
    reg.register_ns(NS, "reverse", vec![ITEMS], sequences::reverse::<N>);
    reg.register_ns(NS, "distinct-values", vec![ATOMICS], sequences::distinct_values::<N>);
    reg.register_ns_range(NS, "data", 0, vec![ITEMS], sequences::data::<N>);
    reg.register_ns(NS, "exactly-one", vec![ITEMS], sequences::exactly_one::<N>);
    reg.register_ns(NS, "zero-or-one", vec![ITEMS], sequences::zero_or_one::<N>);
    reg.register_ns(NS, "one-or-more", vec![ITEMS], sequences::one_or_more::<N>);

    // ===== Strings =====
    reg.register_ns_range(NS, "string", 0, vec![OPT_ITEM], strings::string::<N>);
    reg.register_ns_range(NS, "string-length", 0, vec![OPT_STRING], strings::string_length::<N>);
    reg.register_ns_variadic(NS, "concat", 2, OPT_ATOMIC, strings::concat::<N>);
    reg.register_ns(NS, "contains", vec![OPT_STRING, OPT_STRING], strings::contains::<N>);
    reg.register_ns(NS, "starts-with", vec![OPT_STRING, OPT_STRING], strings::starts_with::<N>);
    reg.register_ns(NS, "ends-with", vec![OPT_STRING, OPT_STRING], strings::ends_with::<N>);
    reg.register_ns_range(NS, "substring", 2, vec![OPT_STRING, NUMERIC, NUMERIC], strings::substring::<N>);
    reg.register_ns(NS, "upper-case", vec![OPT_STRING], strings::upper_case::<N>);
    reg.register_ns(NS, "lower-case", vec![OPT_STRING], strings::lower_case::<N>);
    reg.register_ns_range(NS, "normalize-space", 0, vec![OPT_STRING], strings::normalize_space::<N>);
    reg.register_ns_range(NS, "matches", 2, vec![OPT_STRING, STRING, STRING], strings::matches::<N>);

    // ===== Numbers =====
    reg.register_ns(NS, "abs", vec![OPT_NUMERIC], numeric::abs::<N>);
    reg.register_ns(NS, "ceiling", vec![OPT_NUMERIC], numeric::ceiling::<N>);
    reg.register_ns(NS, "floor", vec![OPT_NUMERIC], numeric::floor::<N>);
    reg.register_ns(NS, "round", vec![OPT_NUMERIC], numeric::round::<N>);
    reg.register_ns(NS, "sum", vec![ATOMICS], numeric::sum::<N>);
    reg.register_ns(NS, "avg", vec![ATOMICS], numeric::avg::<N>);
    reg.register_ns(NS, "min", vec![ATOMICS], numeric::min::<N>);
    reg.register_ns(NS, "max", vec![ATOMICS], numeric::max::<N>);

    // ===== Dates, durations and constructors =====
    reg.register_ns(NS, "current-date-time", vec![], temporal::current_date_time::<N>);
    reg.register_ns(NS, "current-date", vec![], temporal::current_date::<N>);
    reg.register_ns(NS, "implicit-timezone", vec![], temporal::implicit_timezone::<N>);
    reg.register_ns(NS, "year-from-date", vec![OPT_DATE], temporal::year_from_date::<N>);
    reg.register_ns(NS, "month-from-date", vec![OPT_DATE], temporal::month_from_date::<N>);
    reg.register_ns(NS, "day-from-date", vec![OPT_DATE], temporal::day_from_date::<N>);
    for target in [
        AtomicType::Date,
        AtomicType::DateTime,
        AtomicType::YearMonthDuration,
        AtomicType::DayTimeDuration,
        AtomicType::Integer,
        AtomicType::Decimal,
    ] {
        reg.register_ns(NS, target.name(), vec![OPT_ATOMIC], temporal::constructor::<N>(target));
    }

    // ===== Nodes =====
    reg.register_ns_range(NS, "name", 0, vec![OPT_NODE], nodes::name::<N>);
    reg.register_ns_range(NS, "local-name", 0, vec![OPT_NODE], nodes::local_name::<N>);
    reg.register_ns_range(NS, "root", 0, vec![OPT_NODE], nodes::root::<N>);
    reg.register_ns_range(NS, "has-children", 0, vec![OPT_NODE], nodes::has_children::<N>);

    reg
}

/// The single value of an argument already converted to `T?`, if present.
pub(crate) fn opt_atomic<N: MetapathNode>(arg: &Sequence<N>) -> Option<&AtomicValue> {
    arg.first().and_then(Item::as_atomic)
}

/// String value of an optional string argument; empty sequence is `""`.
pub(crate) fn opt_str<N: MetapathNode>(arg: &Sequence<N>) -> String {
    opt_atomic(arg).map(ToString::to_string).unwrap_or_default()
}
