use composer_core::{
    Attrs, Document, Editor, Node, Point, SchemaRegistry, Selection, card_node, render,
    update_attributes,
};
use serde_json::Value;

fn attrs(pairs: &[(&str, &str)]) -> Attrs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

fn card_editor() -> Editor {
    let doc = Document {
        children: vec![
            card_node(Attrs::default(), vec![Node::paragraph("inside")]),
            Node::paragraph("outside"),
        ],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0, 0], 2));
    Editor::new(doc, selection, SchemaRegistry::composer())
}

#[test]
fn update_attributes_shallow_merges_into_the_active_node() {
    let mut editor = card_editor();

    assert!(update_attributes(
        &mut editor,
        "card",
        attrs(&[("background_color", "#000000"), ("padding", "32px")]),
    ));

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("background_color").and_then(|v| v.as_str()),
        Some("#000000")
    );
    assert_eq!(card.attrs.get("padding").and_then(|v| v.as_str()), Some("32px"));
    // Untouched keys keep their values.
    assert_eq!(
        card.attrs.get("border_radius").and_then(|v| v.as_str()),
        Some("8px")
    );
}

#[test]
fn update_attributes_without_target_leaves_the_document_untouched() {
    let mut editor = card_editor();
    editor.set_selection(Selection::collapsed(Point::new(vec![1, 0], 3)));
    let before = render(editor.doc());

    assert!(!update_attributes(
        &mut editor,
        "card",
        attrs(&[("background_color", "#000000")]),
    ));

    assert_eq!(render(editor.doc()), before);
    assert!(!editor.can_undo());
}

#[test]
fn update_attributes_does_not_move_the_selection() {
    let mut editor = card_editor();
    let before = editor.selection().clone();

    assert!(update_attributes(
        &mut editor,
        "card",
        attrs(&[("text_color", "#334155")]),
    ));

    assert_eq!(editor.selection(), &before);
}

#[test]
#[should_panic(expected = "unknown node kind")]
fn update_attributes_with_unregistered_kind_panics() {
    let mut editor = card_editor();
    update_attributes(&mut editor, "callout", attrs(&[("x", "y")]));
}

#[test]
fn card_update_command_targets_the_enclosing_card() {
    let mut editor = card_editor();

    editor
        .run_command(
            "card.update",
            Some(serde_json::json!({ "border_radius": "24px" })),
        )
        .unwrap();

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("border_radius").and_then(|v| v.as_str()),
        Some("24px")
    );
}

#[test]
fn active_attrs_query_reflects_the_selection() {
    let mut editor = card_editor();

    let active: Option<Attrs> = editor.run_query("card.active_attrs", None).unwrap();
    let active = active.expect("selection is inside the card");
    assert_eq!(
        active.get("background_color").and_then(|v| v.as_str()),
        Some("#ffffff")
    );

    editor.set_selection(Selection::collapsed(Point::new(vec![1, 0], 0)));
    let active: Option<Attrs> = editor.run_query("card.active_attrs", None).unwrap();
    assert!(active.is_none());
}

#[test]
fn preview_transaction_settles_without_committing() {
    let editor = card_editor();
    let before = editor.doc().clone();

    let tx = composer_core::Transaction::new(vec![composer_core::Op::SetNodeAttrs {
        path: vec![0],
        patch: composer_core::AttrPatch {
            set: attrs(&[("background_color", "#cffafe")]),
            remove: Vec::new(),
        },
    }]);
    let preview = editor.preview_transaction(&tx).unwrap();

    let Node::Element(card) = &preview.doc.children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("background_color").and_then(|v| v.as_str()),
        Some("#cffafe")
    );
    // The editor itself is untouched by a preview.
    assert_eq!(editor.doc(), &before);
}

#[test]
fn banner_set_type_command_is_a_no_op_outside_banners() {
    let mut editor = card_editor();
    let before = editor.doc().clone();

    editor
        .run_command(
            "banner.set_type",
            Some(serde_json::json!({ "banner_type": "error" })),
        )
        .unwrap();

    assert_eq!(editor.doc(), &before);
}
