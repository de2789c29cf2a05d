use composer_core::{
    Attrs, Document, Editor, Node, Point, SchemaRegistry, Selection, TriggerRange, card_node,
    insert_templated_fragment,
};

#[test]
fn divider_insert_adds_divider_and_trailing_paragraph() {
    let mut editor = Editor::with_composer_blocks();

    editor.run_command("divider.insert", None).unwrap();

    assert_eq!(editor.doc().children.len(), 3);
    assert!(matches!(&editor.doc().children[1], Node::Void(v) if v.kind == "divider"));
    assert!(matches!(
        &editor.doc().children[2],
        Node::Element(el) if el.kind == "paragraph"
    ));
    // The caret lands in the trailing paragraph so typing continues below.
    assert_eq!(editor.selection().focus.path, vec![2, 0]);
}

#[test]
fn card_insert_places_caret_inside_the_card() {
    let mut editor = Editor::with_composer_blocks();

    editor.run_command("card.insert", None).unwrap();

    assert!(matches!(
        &editor.doc().children[1],
        Node::Element(el) if el.kind == "card"
    ));
    assert_eq!(editor.selection().focus.path, vec![1, 0, 0]);
}

#[test]
fn fragment_replaces_paragraph_emptied_by_trigger_deletion() {
    let doc = Document {
        children: vec![Node::paragraph("/card")],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 5));
    let mut editor = Editor::new(doc, selection, SchemaRegistry::composer());

    let trigger = TriggerRange {
        path: vec![0, 0],
        range: 0..5,
    };
    assert!(insert_templated_fragment(
        &mut editor,
        card_node(Attrs::default(), Vec::new()),
        Some(trigger),
    ));

    // The trigger paragraph is gone; the card takes its place.
    assert!(matches!(
        &editor.doc().children[0],
        Node::Element(el) if el.kind == "card"
    ));
    assert!(matches!(
        &editor.doc().children[1],
        Node::Element(el) if el.kind == "paragraph"
    ));
    assert_eq!(editor.doc().children.len(), 2);
}

#[test]
fn fragment_keeps_surrounding_text_when_trigger_is_mid_block() {
    let doc = Document {
        children: vec![Node::paragraph("intro /div")],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0], 10));
    let mut editor = Editor::new(doc, selection, SchemaRegistry::composer());

    let trigger = TriggerRange {
        path: vec![0, 0],
        range: 6..10,
    };
    assert!(insert_templated_fragment(&mut editor, Node::divider(), Some(trigger)));

    let Node::Element(first) = &editor.doc().children[0] else {
        panic!("expected paragraph");
    };
    let Node::Text(text) = &first.children[0] else {
        panic!("expected text leaf");
    };
    assert_eq!(text.text, "intro ");
    assert!(matches!(&editor.doc().children[1], Node::Void(v) if v.kind == "divider"));
}

#[test]
fn button_insert_command_uses_label_argument() {
    let mut editor = Editor::with_composer_blocks();

    editor
        .run_command(
            "button.insert",
            Some(serde_json::json!({
                "label": "Sign up",
                "attrs": { "url": "https://example.com/signup" }
            })),
        )
        .unwrap();

    let Node::Element(button) = &editor.doc().children[1] else {
        panic!("expected button element");
    };
    assert_eq!(button.kind, "button");
    assert_eq!(
        button.attrs.get("url").and_then(|v| v.as_str()),
        Some("https://example.com/signup")
    );
    let Node::Text(label) = &button.children[0] else {
        panic!("expected label text");
    };
    assert_eq!(label.text, "Sign up");
}

#[test]
fn undo_reverses_a_fragment_insertion() {
    let mut editor = Editor::with_composer_blocks();
    let before = editor.doc().clone();

    editor.run_command("divider.insert", None).unwrap();
    assert_eq!(editor.doc().children.len(), 3);

    assert!(editor.undo());
    assert_eq!(editor.doc(), &before);

    assert!(editor.redo());
    assert_eq!(editor.doc().children.len(), 3);
}
