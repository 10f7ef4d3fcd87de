use metapath::simple_node::{assembly, doc, field};
use metapath::{AtomicValue, Error, ErrorCode, Item, Sequence, SimpleNode, compile};
use rstest::rstest;
use rust_decimal::Decimal;

fn try_eval(expr: &str) -> Result<Sequence<SimpleNode>, Error> {
    let compiled = compile(expr)?;
    let ctx = compiled.new_dynamic_context();
    compiled.evaluate_in(None, &ctx)
}

fn eval(expr: &str) -> Sequence<SimpleNode> {
    try_eval(expr).unwrap()
}

fn atoms(seq: &Sequence<SimpleNode>) -> Vec<AtomicValue> {
    seq.iter().map(|it| it.as_atomic().cloned().unwrap()).collect()
}

fn single(expr: &str) -> AtomicValue {
    let out = atoms(&eval(expr));
    assert_eq!(out.len(), 1, "{expr} should yield one item");
    out.into_iter().next().unwrap()
}

fn strings(seq: &Sequence<SimpleNode>) -> Vec<String> {
    seq.iter().map(Item::string_value).collect()
}

fn dec(text: &str) -> AtomicValue {
    AtomicValue::Decimal(text.parse::<Decimal>().unwrap())
}

#[rstest]
#[case("2 + 3", AtomicValue::Integer(5))]
#[case("7 - 10", AtomicValue::Integer(-3))]
#[case("6 * 7", AtomicValue::Integer(42))]
#[case("7 div 2", dec("3.5"))]
#[case("7 idiv 2", AtomicValue::Integer(3))]
#[case("-7 idiv 2", AtomicValue::Integer(-3))]
#[case("7 mod 3", AtomicValue::Integer(1))]
#[case("1.5 * 2", dec("3.0"))]
#[case("0.1 + 0.2", dec("0.3"))]
fn numeric_arithmetic(#[case] expr: &str, #[case] expected: AtomicValue) {
    let got = single(expr);
    assert!(got.value_eq(&expected), "{expr}: {got:?} != {expected:?}");
}

#[rstest]
fn integer_addition_equals_decimal_five() {
    assert!(single("2 + 3").value_eq(&dec("5")));
    assert!(single("6 div 2").value_eq(&AtomicValue::Integer(3)));
}

#[rstest]
#[case("1 div 0", ErrorCode::FOAR0001)]
#[case("1 idiv 0", ErrorCode::FOAR0001)]
#[case("5 mod 0", ErrorCode::FOAR0001)]
#[case("9223372036854775807 + 1", ErrorCode::FOAR0002)]
#[case("'a' + 1", ErrorCode::MPTY0004)]
#[case("(1, 2) + 1", ErrorCode::MPTY0004)]
fn arithmetic_errors(#[case] expr: &str, #[case] code: ErrorCode) {
    assert_eq!(try_eval(expr).unwrap_err().code, code);
}

#[rstest]
fn empty_operand_gives_empty_result() {
    assert!(eval("() + 1").is_empty());
    assert!(eval("-()").is_empty());
}

#[rstest]
#[case("date('2024-01-15') + year-month-duration('P1Y')", "2025-01-15")]
#[case("year-month-duration('P1Y') + date('2024-01-15')", "2025-01-15")]
#[case("date('2024-01-31') + year-month-duration('P1M')", "2024-02-29")]
#[case("date('2024-01-15') + day-time-duration('P3D')", "2024-01-18")]
#[case("date('2024-03-01') - date('2024-02-01')", "P29D")]
#[case("date('2024-03-01') - year-month-duration('P2M')", "2024-01-01")]
#[case("year-month-duration('P1Y') + year-month-duration('P2M')", "P1Y2M")]
#[case("day-time-duration('PT1H') + day-time-duration('PT30M')", "PT1H30M")]
#[case("day-time-duration('PT1H') - day-time-duration('PT30M')", "PT30M")]
#[case("year-month-duration('P1Y') * 2", "P2Y")]
#[case("2 * day-time-duration('PT1H')", "PT2H")]
#[case("day-time-duration('PT2H') div 2", "PT1H")]
#[case("year-month-duration('P1Y') div year-month-duration('P6M')", "2")]
fn temporal_arithmetic(#[case] expr: &str, #[case] expected: &str) {
    assert_eq!(strings(&eval(expr)), [expected]);
}

#[rstest]
fn date_time_plus_duration_crosses_midnight() {
    let out = single(
        "date-time('2024-01-01T23:00:00') + day-time-duration('PT2H') = date-time('2024-01-02T01:00:00')",
    );
    assert_eq!(out, AtomicValue::Boolean(true));
}

#[rstest]
#[case("date('2024-01-15') + date('2024-01-16')", "date + date")]
#[case("date('2024-01-15') * 2", "date * integer")]
#[case("year-month-duration('P1Y') + day-time-duration('P1D')", "year-month-duration + day-time-duration")]
fn unsupported_pairings_name_both_types(#[case] expr: &str, #[case] pairing: &str) {
    let err = try_eval(expr).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPTY0004);
    assert!(err.message.contains(pairing), "{}", err.message);
    assert_eq!(err.expression.as_deref(), Some(expr));
}

#[rstest]
#[case("1 = 1.0", true)]
#[case("(1, 2, 3) = 3", true)]
#[case("(1, 2) = (3, 4)", false)]
#[case("(1, 2) != (1, 2)", true)]
#[case("() = ()", false)]
#[case("'abc' < 'abd'", true)]
#[case("1 eq 1", true)]
#[case("2 gt 10", false)]
#[case("'b' ge 'a'", true)]
#[case("date('2024-01-01') lt date('2024-01-02')", true)]
#[case("date-time('2024-01-01T10:00:00+02:00') eq date-time('2024-01-01T08:00:00Z')", true)]
#[case("day-time-duration('PT60M') eq day-time-duration('PT1H')", true)]
fn comparisons(#[case] expr: &str, #[case] expected: bool) {
    assert_eq!(single(expr), AtomicValue::Boolean(expected));
}

#[rstest]
fn value_comparison_with_empty_operand_is_empty() {
    assert!(eval("() eq 1").is_empty());
}

#[rstest]
#[case("(1, 2) eq 1")]
#[case("'1' = 1")]
#[case("true() lt 1")]
fn comparison_type_errors_are_raised(#[case] expr: &str) {
    assert_eq!(try_eval(expr).unwrap_err().code, ErrorCode::MPTY0004);
}

#[rstest]
fn logical_operators_short_circuit() {
    assert_eq!(single("1 = 2 and (1, 2) eq 1"), AtomicValue::Boolean(false));
    assert_eq!(single("1 = 1 or (1, 2) eq 1"), AtomicValue::Boolean(true));
    assert_eq!(single("1 = 1 and 'x'"), AtomicValue::Boolean(true));
    assert_eq!(
        try_eval("1 = 1 and (1, 2) eq 1").unwrap_err().code,
        ErrorCode::MPTY0004
    );
}

#[rstest]
fn atomic_set_operations_keep_first_occurrence_order() {
    assert_eq!(strings(&eval("(3, 1, 2) union (2, 4)")), ["3", "1", "2", "4"]);
    assert_eq!(strings(&eval("(1, 2, 3) intersect (3, 2)")), ["2", "3"]);
    assert_eq!(strings(&eval("(1, 2, 3) except 2")), ["1", "3"]);
    assert_eq!(strings(&eval("(1, 1.0) | 1")), ["1"]);
}

#[rstest]
fn node_intersect_and_except_return_document_order() {
    let d = doc()
        .child(
            assembly("catalog")
                .child(field("title", "A"))
                .child(field("title", "B"))
                .child(field("title", "C")),
        )
        .build();
    let eval_at = |expr: &str| strings(&compile(expr).unwrap().evaluate(&d).unwrap());
    assert_eq!(
        eval_at("(//title[3], //title[1], //title[2]) intersect //title"),
        ["A", "B", "C"]
    );
    assert_eq!(
        eval_at("(//title[3], //title[1], //title[2]) except //title[2]"),
        ["A", "C"]
    );
}

#[rstest]
fn node_union_deduplicates_by_identity_not_value() {
    let d = doc()
        .child(
            assembly("catalog")
                .child(field("title", "Same"))
                .child(field("title", "Same")),
        )
        .build();
    let twice = compile("(//title) | (/catalog/title)").unwrap().evaluate(&d).unwrap();
    assert_eq!(twice.len(), 2);
    let once = compile("(//title[1]) | (/catalog/title[1])").unwrap().evaluate(&d).unwrap();
    assert_eq!(once.len(), 1);
}

#[rstest]
#[case("1 to 3", &["1", "2", "3"])]
#[case("3 to 1", &[])]
#[case("() to 3", &[])]
#[case("2 to 2", &["2"])]
#[case("'a' || 1 || ()", &["a1"])]
#[case("if (()) then 1 else 2", &["2"])]
#[case("if ('x') then 1 else 2", &["1"])]
#[case("(10, 20, 30)[2]", &["20"])]
#[case("(10, 20, 30)[. > 15]", &["20", "30"])]
#[case("(10, 20, 30)[. > 15][1]", &["20"])]
#[case("let $x := 2, $y := $x * 3 return $y + 1", &["7"])]
#[case("let $x := 1 return let $x := $x + 1 return $x", &["2"])]
#[case("(1, (), (2, 3))", &["1", "2", "3"])]
#[case("(: a comment :) 1 + (: nested (: inner :) :) 1", &["2"])]
fn other_expressions(#[case] expr: &str, #[case] expected: &[&str]) {
    assert_eq!(strings(&eval(expr)), expected);
}

#[rstest]
fn range_bounds_must_be_integers() {
    assert_eq!(try_eval("1.5 to 3").unwrap_err().code, ErrorCode::MPTY0004);
}

#[rstest]
fn oversized_ranges_are_refused() {
    assert_eq!(
        try_eval("1 to 9223372036854775807").unwrap_err().code,
        ErrorCode::FOAR0002
    );
    assert_eq!(strings(&eval("count(1 to 100000)")), ["100000"]);
    assert_eq!(
        strings(&eval("9223372036854775807 to 9223372036854775807")),
        ["9223372036854775807"]
    );
}

#[rstest]
fn effective_boolean_value_of_many_atomics_is_an_error() {
    assert_eq!(
        try_eval("if ((1, 2)) then 1 else 2").unwrap_err().code,
        ErrorCode::FORG0006
    );
}
