use indoc::indoc;

use crate::document::{Document, NodeRef, TokenSource};
use crate::{Options, TokenSpan, compile};

fn kinds(program: &crate::Program, doc: &Document) -> Vec<String> {
    doc.annotations().iter().map(|a| program.types().name(a.kind).to_string()).collect()
}

#[test]
fn alice_twice_gives_two_person_annotations_in_order() {
    let program = compile(indoc! {r#"
        [alice]
        "Alice"
        annotation:
            capture=*
            type=PERSON
    "#})
    .unwrap();
    let mut doc = Document::tokenize("Alice met Bob. Later, Alice went home.");
    program.execute(&mut doc);

    assert_eq!(kinds(&program, &doc), ["PERSON", "PERSON"]);
    let spans: Vec<TokenSpan> = doc.annotations().iter().map(|a| a.span).collect();
    assert_eq!(spans, [TokenSpan::new(0, 1), TokenSpan::new(6, 7)]);
    for ann in doc.annotations() {
        assert_eq!(doc.covered_text(ann.span), "Alice");
    }
}

#[test]
fn relation_links_constructed_annotations() {
    let program = compile(indoc! {r#"
        [has]
        (?<A> {pos=NN}) "has" (?<B> {pos=NN})
        annotation:
            capture=A
            type=THING
        annotation:
            capture=B
            type=PART
        relation:
            source=A
            target=B
            type=ATTRIBUTE
            value="HAS_A"
    "#})
    .unwrap();
    let mut doc =
        Document::from_sentences(&[&["car", "has", "wheel"]]).with_token_attrs("pos", &["NN", "VBZ", "NN"]);
    program.execute(&mut doc);

    let a = doc.annotations().iter().find(|a| a.span == TokenSpan::new(0, 1)).unwrap();
    let b = doc.annotations().iter().find(|a| a.span == TokenSpan::new(2, 3)).unwrap();
    let outgoing: Vec<_> = doc.outgoing(NodeRef::Annotation(a.id)).collect();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(program.types().name(outgoing[0].kind), "ATTRIBUTE");
    assert_eq!(outgoing[0].value, "HAS_A");
    assert_eq!(outgoing[0].target, NodeRef::Annotation(b.id));
}

#[test]
fn execution_is_deterministic() {
    let program = compile(indoc! {r#"
        [np]
        {pos=DT}? (?<head> {pos=JJ}* {pos=NN}+)
        annotation:
            capture=*
            type=NP
            $head = lower(text(head))
        relation:
            source=*
            target=head
            type=HEAD
    "#})
    .unwrap();
    let base = Document::from_sentences(&[&["The", "big", "Dog", "saw", "a", "cat"], &["Cats", "sleep"]])
        .with_token_attrs("pos", &["DT", "JJ", "NN", "VBD", "DT", "NN", "NN", "VBP"]);

    let mut first = base.clone();
    program.execute(&mut first);
    let mut second = base.clone();
    program.execute(&mut second);
    assert_eq!(first, second);

    let mut reset = first.clone();
    reset.clear_annotations();
    program.execute(&mut reset);
    assert_eq!(reset, first);

    let heads: Vec<&str> = first.annotations().iter().filter_map(|a| a.attribute("head")).collect();
    assert_eq!(heads, ["big dog", "cat", "cats"]);
}

#[test]
fn undeclared_capture_fails_at_compile_time() {
    let err = compile(indoc! {r#"
        [bad]
        (?<A> .)
        relation:
            source=A
            target=B
            type=R
    "#})
    .unwrap_err();
    assert_eq!(err.rule.as_deref(), Some("bad"));
    assert_eq!(err.message, "unresolved reference 'B'");
}

#[test]
fn missing_optional_capture_skips_only_what_needs_it() {
    let program = compile(indoc! {r#"
        [title]
        (?<title> "Dr")? (?<name> {pos=NNP})
        annotation:
            capture=title
            type=TITLE
        annotation:
            capture=name
            type=NAME
            $full = text(title) + " " + text(name)
            $plain = text(name)
        relation:
            source=title
            target=name
            type=TITLE_OF
    "#})
    .unwrap();
    let mut doc = Document::from_sentences(&[&["Smith", "arrived"]]).with_token_attrs("pos", &["NNP", "VBD"]);
    let metrics = program.execute_with(&mut doc, &Options::default());

    assert_eq!(kinds(&program, &doc), ["NAME"]);
    let name = &doc.annotations()[0];
    assert_eq!(name.attribute("full"), None);
    assert_eq!(name.attribute("plain"), Some("Smith"));
    assert!(doc.relations().is_empty());

    let rule = metrics.rule("title").unwrap();
    assert_eq!(rule.matches, 1);
    assert_eq!(rule.annotations, 1);
    // TITLE constructor, `$full`, TITLE_OF relation.
    assert_eq!(rule.skipped, 3);
}

#[test]
fn later_rules_see_earlier_annotations() {
    let program = compile(indoc! {r#"
        [people]
        {pos=NNP}+
        annotation:
            capture=*
            type=PERSON

        [knows]
        (?<a> {pos=NNP}+) "knows" (?<b> {pos=NNP}+)
        relation:
            source=a
            target=b
            type=KNOWS
    "#})
    .unwrap();
    let mut doc = Document::from_sentences(&[&["Ada", "Lovelace", "knows", "Charles"]])
        .with_token_attrs("pos", &["NNP", "NNP", "VBZ", "NNP"]);
    program.execute(&mut doc);

    assert_eq!(kinds(&program, &doc), ["PERSON", "PERSON"]);
    let rel = &doc.relations()[0];
    assert_eq!(rel.source, NodeRef::Annotation(doc.annotations()[0].id));
    assert_eq!(rel.target, NodeRef::Annotation(doc.annotations()[1].id));
}

#[test]
fn capture_endpoint_without_node_is_skipped() {
    let program = compile(indoc! {r#"
        [pair]
        (?<a> "x" "y") (?<b> "z")
        relation:
            source=a
            target=b
            type=NEXT
    "#})
    .unwrap();
    let mut doc = Document::from_sentences(&[&["x", "y", "z"]]);
    let metrics = program.execute_with(&mut doc, &Options::default());
    assert!(doc.relations().is_empty());
    assert_eq!(metrics.rule("pair").unwrap().skipped, 1);
}

#[test]
fn rerunning_duplicates_output() {
    let program = compile("[a]\n\"a\"\nannotation:\n capture=*\n type=A\n").unwrap();
    let mut doc = Document::from_sentences(&[&["a", "b", "a"]]);
    program.execute(&mut doc);
    program.execute(&mut doc);
    assert_eq!(doc.annotations().len(), 4);
}

#[test]
fn guards_and_value_expressions() {
    let program = compile(indoc! {r#"
        [cmp]
        (?<x> .) "vs" (?<y> .)
        annotation:
            capture=x
            type=SIDE
        annotation:
            capture=y
            type=SIDE
        relation:
            source=x
            target=y
            type=SAME
            guard=lower(text(x)) == lower(text(y))
            value=text(x) + "=" + text(y)
        relation:
            source=x
            target=y
            type=DIFFERENT
            guard=text(x) != text(y)
        relation:
            source=x
            target=y
            type=BROKEN
            guard=text(x)
    "#})
    .unwrap();
    let mut doc = Document::from_sentences(&[&["Red", "vs", "red"]]);
    let metrics = program.execute_with(&mut doc, &Options::default());

    let rels: Vec<(&str, &str)> =
        doc.relations().iter().map(|r| (program.types().name(r.kind), r.value.as_str())).collect();
    assert_eq!(rels, [("SAME", "Red=red"), ("DIFFERENT", "")]);
    let rule = metrics.rule("cmp").unwrap();
    assert_eq!(rule.relations, 2);
    // BROKEN's guard is a string.
    assert_eq!(rule.skipped, 1);
}

#[test]
fn document_scope_crosses_sentences() {
    let src = indoc! {r#"
        [span]
        scope=document
        "from" (?<body> .+?) "to"
        annotation:
            capture=body
            type=BODY

        [local]
        "from" (?<body> .+?) "to"
        annotation:
            capture=body
            type=LOCAL
    "#};
    let program = compile(src).unwrap();
    let mut doc = Document::tokenize("We drove from Paris. Then on to Rome.");
    program.execute(&mut doc);

    assert_eq!(kinds(&program, &doc), ["BODY"]);
    assert_eq!(doc.covered_text(doc.annotations()[0].span), "Paris. Then on");
}

#[test]
fn gating_never_changes_results() {
    let program = compile(indoc! {r#"
        [born]
        (?<who> {pos=NNP}) "born"i "in" (?<where> {pos=NNP})
        annotation:
            capture=who
            type=PERSON
        annotation:
            capture=where
            type=PLACE
    "#})
    .unwrap();
    let base = Document::from_sentences(&[&["Ada", "BORN", "in", "London"], &["Bob", "lives", "in", "Paris"]])
        .with_token_attrs("pos", &["NNP", "VBN", "IN", "NNP", "NNP", "VBZ", "IN", "NNP"]);

    let mut gated = base.clone();
    let gated_metrics = program.execute_with(&mut gated, &Options::default());
    let mut ungated = base.clone();
    let ungated_metrics = program.execute_with(&mut ungated, &Options::default().gate_rules(false));

    assert_eq!(gated, ungated);
    assert_eq!(gated.annotations().len(), 2);
    assert_eq!(gated_metrics.rules[0].sequences_skipped, 1);
    assert_eq!(ungated_metrics.rules[0].sequences_skipped, 0);
    assert_eq!(ungated_metrics.rules[0].sequences_scanned, 2);
}

#[test]
fn zero_length_trigger_never_annotates() {
    let program = compile("[empty]\n\"q\"*\nannotation:\n capture=*\n type=Q\n").unwrap();
    let mut doc = Document::from_sentences(&[&["a", "q", "q", "b"]]);
    let metrics = program.execute_with(&mut doc, &Options::default());
    let spans: Vec<TokenSpan> = doc.annotations().iter().map(|a| a.span).collect();
    assert_eq!(spans, [TokenSpan::new(1, 3)]);
    assert_eq!(metrics.matches(), 1);
}

#[test]
fn fuel_exhaustion_is_counted_not_fatal() {
    let program = compile(indoc! {r#"
        [slow]
        (. | . .)+ "end"
        annotation:
            capture=*
            type=SLOW

        [fast]
        "x"
        annotation:
            capture=*
            type=X
    "#})
    .unwrap();
    let words: Vec<&str> = vec!["x"; 40];
    let mut doc = Document::from_sentences(&[words.as_slice()]);
    let metrics = program.execute_with(&mut doc, &Options::default().exec_fuel(200).gate_rules(false));

    assert!(metrics.rule("slow").unwrap().fuel_exhausted > 0);
    assert_eq!(metrics.rule("fast").unwrap().annotations, 40);
    assert_eq!(doc.token_count(), 40);
}

#[test]
fn document_scope_spans_thousands_of_tokens() {
    let program = compile(indoc! {r#"
        [body]
        scope=document
        "from" (?<body> .+) "to"
        annotation:
            capture=body
            type=BODY
    "#})
    .unwrap();
    let mut words: Vec<&str> = vec!["from"];
    words.extend(std::iter::repeat_n("w", 3000));
    words.push("to");
    let mut doc = Document::from_sentences(&[words.as_slice()]);
    let metrics = program.execute_with(&mut doc, &Options::default());

    let rule = metrics.rule("body").unwrap();
    assert_eq!(rule.fuel_exhausted, 0);
    assert_eq!(rule.annotations, 1);
    assert_eq!(doc.annotations()[0].span, TokenSpan::new(1, 3001));
}

#[test]
fn extract_all_reports_rule_and_attributes() {
    let program = compile(indoc! {r#"
        [money]
        (?<amount> {pos=CD}) (?<unit> "dollars"i)
        annotation:
            capture=*
            type=MONEY
            $amount = text(amount)
            $unit = lower(text(unit))
    "#})
    .unwrap();
    let doc = Document::from_sentences(&[&["paid", "40", "Dollars"]]).with_token_attrs("pos", &["VBD", "CD", "NNS"]);
    let found = program.extract_all(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].rule, "money");
    assert_eq!(found[0].text, "40 Dollars");
    assert_eq!(found[0].attribute("amount"), Some("40"));
    assert_eq!(found[0].attribute("unit"), Some("dollars"));
    assert!(doc.annotations().is_empty());
}
