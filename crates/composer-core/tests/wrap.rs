use composer_core::{
    Attrs, Document, Editor, Node, Point, SchemaRegistry, Selection, can_lift, can_wrap,
    lift_out, toggle_wrap, wrap_selection_in,
};
use serde_json::Value;

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection, SchemaRegistry::composer())
}

fn span(anchor: (Vec<usize>, usize), focus: (Vec<usize>, usize)) -> Selection {
    Selection {
        anchor: Point::new(anchor.0, anchor.1),
        focus: Point::new(focus.0, focus.1),
    }
}

#[test]
fn wrap_selection_in_card_wraps_the_block_run() {
    let mut editor = editor_with(
        vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ],
        span((vec![0, 0], 0), (vec![2, 0], 1)),
    );

    assert!(wrap_selection_in(&mut editor, "card", Attrs::default()));

    assert_eq!(editor.doc().children.len(), 1);
    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(card.kind, "card");
    assert_eq!(card.children.len(), 3);
    // Defaults are merged in at wrap time.
    assert_eq!(
        card.attrs.get("background_color").and_then(|v| v.as_str()),
        Some("#ffffff")
    );

    assert_eq!(editor.selection().anchor.path, vec![0, 0, 0]);
    assert_eq!(editor.selection().focus.path, vec![0, 2, 0]);
    assert!(editor.run_query::<bool>("card.is_active", None).unwrap());
}

#[test]
fn wrap_merges_explicit_attrs_over_defaults() {
    let mut editor = editor_with(
        vec![Node::paragraph("x")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    let mut attrs = Attrs::default();
    attrs.insert(
        "background_color".to_string(),
        Value::String("#0f172a".to_string()),
    );
    assert!(wrap_selection_in(&mut editor, "card", attrs));

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("background_color").and_then(|v| v.as_str()),
        Some("#0f172a")
    );
    assert_eq!(
        card.attrs.get("border_radius").and_then(|v| v.as_str()),
        Some("8px")
    );
}

#[test]
fn toggle_wrap_twice_restores_the_original_shape() {
    let original = vec![
        Node::paragraph("a"),
        Node::paragraph("b"),
        Node::paragraph("c"),
    ];
    let mut editor = editor_with(original.clone(), span((vec![0, 0], 0), (vec![1, 0], 1)));
    let before = editor.doc().clone();

    assert!(toggle_wrap(&mut editor, "card", Attrs::default()));
    assert!(matches!(
        &editor.doc().children[0],
        Node::Element(el) if el.kind == "card"
    ));

    assert!(toggle_wrap(&mut editor, "card", Attrs::default()));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn toggle_wrap_banner_round_trips_paragraphs() {
    let mut editor = editor_with(
        vec![Node::paragraph("note"), Node::paragraph("after")],
        Selection::collapsed(Point::new(vec![0, 0], 2)),
    );
    let before = editor.doc().clone();

    let mut attrs = Attrs::default();
    attrs.insert(
        "banner_type".to_string(),
        Value::String("warning".to_string()),
    );
    assert!(toggle_wrap(&mut editor, "banner", attrs.clone()));
    assert!(
        editor.run_query::<bool>("banner.is_active", None).unwrap()
    );
    assert_eq!(
        editor
            .run_query::<Option<String>>("banner.active_type", None)
            .unwrap()
            .as_deref(),
        Some("warning")
    );

    assert!(toggle_wrap(&mut editor, "banner", attrs));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn lift_out_without_matching_ancestor_is_a_no_op() {
    let mut editor = editor_with(
        vec![Node::paragraph("a")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    let before = editor.doc().clone();

    assert!(!lift_out(&mut editor, "banner"));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn lift_out_removes_exactly_one_level() {
    let mut editor = editor_with(
        vec![Node::paragraph("pre")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    assert!(wrap_selection_in(&mut editor, "card", Attrs::default()));
    assert!(wrap_selection_in(&mut editor, "card", Attrs::default()));

    // Two nested cards; one lift peels one layer.
    assert!(lift_out(&mut editor, "card"));
    let Node::Element(outer) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(outer.kind, "card");
    assert!(matches!(
        &outer.children[0],
        Node::Element(el) if el.kind == "paragraph"
    ));
}

#[test]
fn wrap_in_void_or_inline_kind_is_rejected() {
    let mut editor = editor_with(
        vec![Node::paragraph("a")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    let before = editor.doc().clone();

    assert!(!wrap_selection_in(&mut editor, "divider", Attrs::default()));
    assert!(!wrap_selection_in(&mut editor, "button", Attrs::default()));
    assert_eq!(editor.doc(), &before);
}

#[test]
fn can_wrap_and_can_lift_track_selection_context() {
    let mut editor = editor_with(
        vec![Node::paragraph("a")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );

    assert!(can_wrap(&editor, "card"));
    assert!(!can_lift(&editor, "card"));

    assert!(wrap_selection_in(&mut editor, "card", Attrs::default()));
    assert!(can_lift(&editor, "card"));
}

#[test]
fn banner_normalize_folds_non_paragraph_children() {
    let banner = composer_core::banner_node("info", vec![Node::heading(2, "shout")]);
    let editor = editor_with(
        vec![banner],
        Selection::collapsed(Point::new(vec![0, 0, 0], 0)),
    );

    let Node::Element(el) = &editor.doc().children[0] else {
        panic!("expected banner element");
    };
    assert_eq!(el.kind, "banner");
    assert!(matches!(
        &el.children[0],
        Node::Element(p) if p.kind == "paragraph"
    ));
}

#[test]
#[should_panic(expected = "unknown node kind")]
fn wrap_with_unregistered_kind_panics() {
    let mut editor = editor_with(
        vec![Node::paragraph("a")],
        Selection::collapsed(Point::new(vec![0, 0], 0)),
    );
    wrap_selection_in(&mut editor, "sidebar", Attrs::default());
}
