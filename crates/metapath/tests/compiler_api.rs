use std::sync::Arc;
use std::thread;

use metapath::simple_node::{assembly, doc, field};
use metapath::{
    AstPrinter, CompiledExpression, ConvertedResult, DynamicContextBuilder, ErrorCode, ErrorKind,
    ExpandedName, Item, MetapathNode, ResultType, Sequence, SimpleNode, StaticContext, compile,
    compile_with_context,
};
use rstest::{fixture, rstest};
use rust_decimal::Decimal;

#[fixture]
fn catalog() -> SimpleNode {
    doc()
        .child(
            assembly("catalog")
                .child(field("title", "Controls"))
                .child(assembly("group").child(field("title", "Access")))
                .child(field("version", "1.25")),
        )
        .build()
}

fn eval_as(expr: &str, node: &SimpleNode, ty: ResultType) -> ConvertedResult<SimpleNode> {
    compile(expr).unwrap().evaluate_as(node, ty).unwrap()
}

#[rstest]
fn evaluate_as_string_takes_the_first_item(catalog: SimpleNode) {
    assert_eq!(
        eval_as("1 to 3", &catalog, ResultType::String),
        ConvertedResult::String("1".to_string())
    );
    assert_eq!(
        eval_as("//title", &catalog, ResultType::String),
        ConvertedResult::String("Controls".to_string())
    );
    assert_eq!(
        eval_as("()", &catalog, ResultType::String),
        ConvertedResult::String(String::new())
    );
}

#[rstest]
fn evaluate_as_boolean_uses_effective_boolean_value(catalog: SimpleNode) {
    assert_eq!(eval_as("()", &catalog, ResultType::Boolean), ConvertedResult::Boolean(false));
    assert_eq!(eval_as("//title", &catalog, ResultType::Boolean), ConvertedResult::Boolean(true));
    assert_eq!(eval_as("0", &catalog, ResultType::Boolean), ConvertedResult::Boolean(false));
    let err = compile("(1, 2)")
        .unwrap()
        .evaluate_as(&catalog, ResultType::Boolean)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::FORG0006);
}

#[rstest]
#[case("2 + 3", "5")]
#[case("7 div 2", "3.5")]
#[case("/catalog/version", "1.25")]
#[case("'0.5'", "0.5")]
fn evaluate_as_number_casts_to_decimal(catalog: SimpleNode, #[case] expr: &str, #[case] expected: &str) {
    let expected: Decimal = expected.parse().unwrap();
    assert_eq!(eval_as(expr, &catalog, ResultType::Number), ConvertedResult::Number(expected));
}

#[rstest]
#[case("()")]
#[case("'abc'")]
#[case("true() and false() or date('2024-01-01')")]
fn evaluate_as_number_failures(catalog: SimpleNode, #[case] expr: &str) {
    assert!(compile(expr).unwrap().evaluate_as(&catalog, ResultType::Number).is_err());
}

#[rstest]
#[case("(1, 2, 3)")]
#[case("//title")]
fn evaluate_as_number_requires_a_single_item(catalog: SimpleNode, #[case] expr: &str) {
    let err = compile(expr)
        .unwrap()
        .evaluate_as(&catalog, ResultType::Number)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MPTY0004);
    assert!(err.message.contains("single numeric result"), "{}", err.message);
}

#[rstest]
fn evaluate_as_node_and_sequence(catalog: SimpleNode) {
    let ConvertedResult::Node(Some(group)) = eval_as("/catalog/group", &catalog, ResultType::Node) else {
        panic!("expected a node");
    };
    assert_eq!(group.name(), Some(ExpandedName::local("group")));
    assert_eq!(eval_as("()", &catalog, ResultType::Node), ConvertedResult::Node(None));
    let err = compile("1").unwrap().evaluate_as(&catalog, ResultType::Node).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPTY0004);

    let ConvertedResult::Sequence(seq) = eval_as("//title", &catalog, ResultType::Sequence) else {
        panic!("expected a sequence");
    };
    assert_eq!(seq.len(), 2);
}

#[rstest]
#[case("number", ResultType::Number)]
#[case("STRING", ResultType::String)]
#[case("Boolean", ResultType::Boolean)]
#[case("sequence", ResultType::Sequence)]
#[case("node", ResultType::Node)]
fn result_types_parse_from_names(#[case] name: &str, #[case] expected: ResultType) {
    assert_eq!(name.parse::<ResultType>().unwrap(), expected);
}

#[rstest]
fn unknown_result_type_is_an_invalid_type_error() {
    let err = "map".parse::<ResultType>().unwrap_err();
    assert_eq!(err.code, ErrorCode::MPTY0004);
    assert!(err.message.contains("invalid result type"));
}

#[rstest]
#[case(".")]
#[case("1 + 2 * 3")]
#[case("//control[@id = 'ac-1']/title")]
#[case("let $x := (1, 2) return if ($x = 2) then 'a' || 'b' else ()")]
#[case("/catalog/group[1] | /catalog/group[last-group]")]
#[case("ancestor-or-self::*[2]/@*")]
#[case("count(1 to 10) eq 10 and not(empty(.))")]
fn printing_is_a_function_of_tree_shape(#[case] src: &str) {
    let a = compile(src).unwrap();
    let b = compile(src).unwrap();
    assert_eq!(a.ast(), b.ast());
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(a.to_string(), AstPrinter::print(b.ast()));
}

#[rstest]
fn printer_renders_one_indented_line_per_node() {
    let compiled = compile("1 + 2").unwrap();
    assert_eq!(
        compiled.to_string(),
        "Arithmetic[op=+]\n  IntegerLiteral[value=1]\n  IntegerLiteral[value=2]\n"
    );
    assert_eq!(compile(".").unwrap().to_string(), "ContextItem\n");
}

#[rstest]
#[case("1 +")]
#[case("//")]
#[case("(1, 2")]
#[case("1 = = 2")]
fn syntax_errors_carry_the_source_text(#[case] src: &str) {
    let err = compile(src).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPST0003);
    assert_eq!(err.kind, ErrorKind::Static);
    assert!(err.is_static());
    assert_eq!(err.expression.as_deref(), Some(src));
    assert!(err.message.starts_with("could not compile expression"));
    assert!(err.to_string().contains(&format!("in expression `{src}`")));
}

#[rstest]
fn unknown_prefix_is_a_static_error() {
    let err = compile("nope:title").unwrap_err();
    assert_eq!(err.code, ErrorCode::MPST0081);
}

#[rstest]
fn evaluation_errors_name_the_expression(catalog: SimpleNode) {
    let err = compile("1 div 0").unwrap().evaluate(&catalog).unwrap_err();
    assert_eq!(err.code, ErrorCode::FOAR0001);
    assert_eq!(err.kind, ErrorKind::Dynamic);
    assert_eq!(err.expression.as_deref(), Some("1 div 0"));
}

#[rstest]
fn absent_context_item() {
    let compiled = compile(".").unwrap();
    let ctx = compiled.new_dynamic_context::<SimpleNode>();
    let err = compiled.evaluate_in(None, &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPDY0002);
    let err = compile("title").unwrap().evaluate_in(None, &ctx).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPDY0002);
}

#[rstest]
fn accessors(catalog: SimpleNode) {
    let compiled = compile("let $a := 1 return $a + $b + $c").unwrap();
    assert_eq!(compiled.source(), "let $a := 1 return $a + $b + $c");
    let free: Vec<String> = compiled.free_variables().into_iter().map(|n| n.local).collect();
    assert_eq!(free, ["b", "c"]);
    assert!(compiled.static_context().default_function_namespace().is_some());
    let err = compiled.evaluate(&catalog).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPST0008);
}

#[rstest]
fn empty_focus_yields_empty_steps() {
    let compiled = compile("child::title").unwrap();
    let ctx = compiled.new_dynamic_context::<SimpleNode>();
    let out = compiled.evaluate_in(Some(&Sequence::empty()), &ctx).unwrap();
    assert!(out.is_empty());
}

#[rstest]
fn compiled_expressions_are_shared_across_threads(catalog: SimpleNode) {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CompiledExpression>();

    let compiled = compile("count(//title)").unwrap();
    thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let compiled = &compiled;
                let catalog = &catalog;
                s.spawn(move || compiled.evaluate(catalog).unwrap())
            })
            .collect();
        for h in handles {
            let out = h.join().unwrap();
            assert_eq!(out.first().map(Item::string_value).as_deref(), Some("2"));
        }
    });
}

#[rstest]
fn compile_with_context_uses_its_model_namespace() {
    let d = doc()
        .child(SimpleNode::assembly(ExpandedName::new(Some("urn:oscal"), "catalog")))
        .child(assembly("catalog"))
        .build();
    let ns_ctx = StaticContext::builder()
        .with_default_model_namespace("urn:oscal")
        .build()
        .unwrap();
    let scoped = compile_with_context("catalog", ns_ctx).unwrap();
    assert_eq!(scoped.evaluate(&d).unwrap().len(), 1);
    assert_eq!(compile("catalog").unwrap().evaluate(&d).unwrap().len(), 2);
}

#[rstest]
fn variables_from_the_dynamic_context() {
    let compiled = compile("$limit * 2").unwrap();
    assert!(compiled.free_variables().contains(&ExpandedName::local("limit")));
    let ctx = DynamicContextBuilder::<SimpleNode>::new(Arc::new(StaticContext::default()))
        .with_variable(ExpandedName::local("limit"), Sequence::atomic(21_i64))
        .build();
    let out = compiled.evaluate_in(None, &ctx).unwrap();
    assert_eq!(out.first().map(Item::string_value).as_deref(), Some("42"));
}
