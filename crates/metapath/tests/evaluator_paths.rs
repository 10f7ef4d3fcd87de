use metapath::simple_node::{assembly, cycled, doc, field, flag};
use metapath::{ErrorCode, Item, MetapathNode, NodeKind, Sequence, SimpleNode, compile};
use rstest::{fixture, rstest};

#[fixture]
fn catalog() -> SimpleNode {
    doc()
        .child(
            assembly("catalog")
                .flag(flag("uuid", "c-1"))
                .child(field("title", "Controls"))
                .child(
                    assembly("group")
                        .flag(flag("id", "ac"))
                        .child(field("title", "Access"))
                        .child(
                            assembly("control")
                                .flag(flag("id", "ac-1"))
                                .child(field("title", "Policy"))
                                .child(
                                    assembly("part")
                                        .flag(flag("name", "statement"))
                                        .child(
                                            assembly("part")
                                                .flag(flag("name", "item"))
                                                .child(cycled("part").child(field("title", "Repeated"))),
                                        ),
                                ),
                        )
                        .child(
                            assembly("control")
                                .flag(flag("id", "ac-2"))
                                .child(field("title", "Accounts")),
                        ),
                )
                .child(
                    assembly("group")
                        .flag(flag("id", "au"))
                        .child(field("title", "Audit")),
                ),
        )
        .build()
}

fn eval(expr: &str, node: &SimpleNode) -> Sequence<SimpleNode> {
    compile(expr).unwrap().evaluate(node).unwrap()
}

fn strings(seq: &Sequence<SimpleNode>) -> Vec<String> {
    seq.iter().map(Item::string_value).collect()
}

fn names(seq: &Sequence<SimpleNode>) -> Vec<String> {
    seq.iter()
        .map(|it| {
            let n = it.as_node().unwrap();
            n.name().map_or_else(|| n.kind().name().to_string(), |q| q.local)
        })
        .collect()
}

fn first_node(expr: &str, node: &SimpleNode) -> SimpleNode {
    eval(expr, node).first().and_then(Item::as_node).cloned().unwrap()
}

#[rstest]
fn dot_is_the_context_node(catalog: SimpleNode) {
    let group = first_node("/catalog/group", &catalog);
    let out = eval(".", &group);
    assert_eq!(out.len(), 1);
    assert_eq!(out.first().and_then(Item::as_node), Some(&group));
}

#[rstest]
fn descendant_or_self_starts_with_self_in_preorder(catalog: SimpleNode) {
    let control = first_node("//control", &catalog);
    let out = eval("descendant-or-self::*", &control);
    assert_eq!(out.first().and_then(Item::as_node), Some(&control));
    assert_eq!(names(&out), ["control", "title", "part", "part", "part"]);
    let expected: Vec<SimpleNode> = control.descendants_or_self();
    assert_eq!(out, Sequence::from_nodes(expected));
}

#[rstest]
fn search_stops_at_the_cycle_marker(catalog: SimpleNode) {
    let titles = eval("//title", &catalog);
    assert_eq!(strings(&titles), ["Controls", "Access", "Policy", "Accounts", "Audit"]);
    assert_eq!(eval("//part", &catalog).len(), 3);
}

#[rstest]
fn descendant_axis_reports_the_marker_but_not_its_children(catalog: SimpleNode) {
    let control = first_node("//control", &catalog);
    let parts = eval("descendant::part", &control);
    assert_eq!(parts.len(), 3);
    let marker = parts.iter().last().and_then(Item::as_node).unwrap();
    assert_eq!(marker.kind(), NodeKind::CycledAssembly);
    assert!(eval("descendant::title", &control).iter().all(|t| t.string_value() != "Repeated"));
    assert!(eval("child::*", marker).is_empty());
}

#[rstest]
fn flags_are_reached_through_the_flag_axis(catalog: SimpleNode) {
    assert_eq!(strings(&eval("//control/@id", &catalog)), ["ac-1", "ac-2"]);
    assert_eq!(strings(&eval("/catalog/flag::uuid", &catalog)), ["c-1"]);
    assert!(eval("/catalog/uuid", &catalog).is_empty());
}

#[rstest]
#[case("/catalog/group[@id = 'au']/title", &["Audit"])]
#[case("/catalog/group/control[2]/title", &["Accounts"])]
#[case("//control[title = 'Policy']/@id", &["ac-1"])]
#[case("/catalog/group[1]/title", &["Access"])]
#[case("//group/control[@id = 'ac-2']/../title", &["Access"])]
fn predicates_and_parent_steps(catalog: SimpleNode, #[case] expr: &str, #[case] expected: &[&str]) {
    assert_eq!(strings(&eval(expr, &catalog)), expected);
}

#[rstest]
fn reverse_axes_count_positions_outward(catalog: SimpleNode) {
    let marker = first_node("//part/part/part", &catalog);
    assert_eq!(names(&eval("ancestor::*[1]", &marker)), ["part"]);
    assert_eq!(names(&eval("ancestor::*[3]", &marker)), ["control"]);
    // unnamed document node is not matched by *; order stays root first
    assert_eq!(
        names(&eval("ancestor::*", &marker)),
        ["catalog", "group", "control", "part", "part"]
    );
}

#[rstest]
fn parent_and_self_axes(catalog: SimpleNode) {
    let title = first_node("//control/title", &catalog);
    assert_eq!(names(&eval("parent::*", &title)), ["control"]);
    assert_eq!(names(&eval("self::title", &title)), ["title"]);
    assert!(eval("self::control", &title).is_empty());
    assert_eq!(names(&eval("ancestor-or-self::control", &title)), ["control"]);
}

#[rstest]
fn relative_double_slash_searches_below_each_base_node(catalog: SimpleNode) {
    assert_eq!(
        strings(&eval("/catalog/group//title", &catalog)),
        ["Access", "Policy", "Accounts", "Audit"]
    );
}

#[rstest]
fn root_slash_alone_returns_the_document(catalog: SimpleNode) {
    let title = first_node("//control/title", &catalog);
    let out = eval("/", &title);
    assert_eq!(out.first().and_then(Item::as_node), Some(&catalog));
}

#[rstest]
fn steps_do_not_deduplicate(catalog: SimpleNode) {
    // both controls share one parent group
    assert_eq!(names(&eval("//control/..", &catalog)), ["group", "group"]);
}

#[rstest]
fn step_on_an_atomic_focus_is_a_type_error(catalog: SimpleNode) {
    let err = compile("('a', 'b')[child::title]")
        .unwrap()
        .evaluate(&catalog)
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::MPTY0019);
    assert!(err.message.contains("not a node item"));
}

#[rstest]
fn base_path_must_be_nodes(catalog: SimpleNode) {
    let err = compile("(1, 2)/title").unwrap().evaluate(&catalog).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPTY0020);
}

#[rstest]
fn root_of_a_detached_assembly_is_an_error() {
    let lone = assembly("catalog").child(field("title", "x")).build();
    let err = compile("/title").unwrap().evaluate(&lone).unwrap_err();
    assert_eq!(err.code, ErrorCode::MPDY0050);
    assert_eq!(strings(&eval("title", &lone)), ["x"]);
}

#[rstest]
fn wildcards_and_kind_test(catalog: SimpleNode) {
    let control = first_node("//control", &catalog);
    assert_eq!(names(&eval("*", &control)), ["title", "part"]);
    assert_eq!(names(&eval("*:part", &control)), ["part"]);
    assert_eq!(names(&eval("child::node()", &control)), ["title", "part"]);
    assert_eq!(eval("@*", &control).len(), 1);
}
