use composer_core::{
    Attrs, Document, Editor, Node, Path, Point, SchemaRegistry, Selection, card_node,
};
use composer_menus::{
    NodeLayout, PanelController, Rect, Side, SidesField, SidesMode, normalize_length,
};
use serde_json::Value;

struct FixedLayout;

impl NodeLayout for FixedLayout {
    fn node_rect(&self, path: &Path) -> Option<Rect> {
        Some(Rect::new(path.len() as f64, 0.0, 240.0, 48.0))
    }
}

fn card_editor() -> Editor {
    let doc = Document {
        children: vec![
            card_node(Attrs::default(), vec![Node::paragraph("inside")]),
            Node::paragraph("outside"),
        ],
    };
    let selection = Selection::collapsed(Point::new(vec![0, 0, 0], 0));
    Editor::new(doc, selection, SchemaRegistry::composer())
}

#[test]
fn sync_shows_the_panel_over_the_active_card() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");

    panel.sync(&editor, &FixedLayout);

    assert!(panel.is_visible());
    assert_eq!(panel.rect(), Some(Rect::new(1.0, 0.0, 240.0, 48.0)));
    assert_eq!(
        panel.mirror().get("background_color").and_then(|v| v.as_str()),
        Some("#ffffff")
    );

    editor.set_selection(Selection::collapsed(Point::new(vec![1, 0], 0)));
    panel.sync(&editor, &FixedLayout);
    assert!(!panel.is_visible());
    assert!(panel.mirror().is_empty());
}

#[test]
fn sync_is_skipped_while_the_panel_holds_focus() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);
    assert!(panel.is_visible());

    panel.set_focus_within(true);
    panel.edit_field("padding", "99");

    // A selection change that would hide the panel is suppressed, and the
    // in-flight draft survives.
    editor.set_selection(Selection::collapsed(Point::new(vec![1, 0], 0)));
    panel.sync(&editor, &FixedLayout);
    assert!(panel.is_visible());
    assert_eq!(panel.field_text("padding"), "99");

    // Once focus leaves the panel, the next event resynchronizes normally.
    panel.set_focus_within(false);
    panel.sync(&editor, &FixedLayout);
    assert!(!panel.is_visible());
}

#[test]
fn editor_blur_hides_the_panel_unless_focus_moved_into_it() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);

    editor.set_selection(Selection::collapsed(Point::new(vec![1, 0], 0)));

    panel.set_focus_within(true);
    panel.on_editor_blur(&editor, &FixedLayout);
    assert!(panel.is_visible());

    panel.set_focus_within(false);
    panel.on_editor_blur(&editor, &FixedLayout);
    assert!(!panel.is_visible());
}

#[test]
fn instant_attributes_commit_immediately() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);

    assert!(panel.commit_instant(
        &mut editor,
        "background_color",
        Value::String("#fde68a".to_string()),
    ));

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("background_color").and_then(|v| v.as_str()),
        Some("#fde68a")
    );
}

#[test]
fn typed_fields_buffer_until_commit_and_gain_a_px_suffix() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);

    panel.edit_field("padding", "1");
    panel.edit_field("padding", "12");

    // Nothing reaches the document per keystroke.
    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(card.attrs.get("padding").and_then(|v| v.as_str()), Some("16px"));
    assert!(!editor.can_undo());

    assert!(panel.commit_field(&mut editor, "padding"));

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(card.attrs.get("padding").and_then(|v| v.as_str()), Some("12px"));
    // One transaction, not one per keystroke.
    assert!(editor.can_undo());
    editor.undo();
    assert!(!editor.can_undo());
}

#[test]
fn values_with_units_pass_through_unchanged() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);

    panel.edit_field("border_radius", "12%");
    assert!(panel.commit_field(&mut editor, "border_radius"));

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("border_radius").and_then(|v| v.as_str()),
        Some("12%")
    );
}

#[test]
fn committing_an_unchanged_value_is_skipped() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);

    panel.edit_field("padding", "16");
    assert!(!panel.commit_field(&mut editor, "padding"));
    assert!(!editor.can_undo());
}

#[test]
fn commit_without_a_target_is_a_silent_no_op() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);
    panel.edit_field("padding", "24");

    // The user clicked away; the card is no longer active when the blur
    // commit fires.
    editor.set_selection(Selection::collapsed(Point::new(vec![1, 0], 0)));
    assert!(!panel.commit_field(&mut editor, "padding"));
    assert!(!editor.can_undo());
}

#[test]
fn normalize_length_suffixes_bare_numbers_only() {
    assert_eq!(normalize_length("12"), "12px");
    assert_eq!(normalize_length("1.5"), "1.5px");
    assert_eq!(normalize_length(" 8 "), "8px");
    assert_eq!(normalize_length("12%"), "12%");
    assert_eq!(normalize_length("2em"), "2em");
    assert_eq!(normalize_length("auto"), "auto");
    assert_eq!(normalize_length(""), "");
}

#[test]
fn sides_field_detects_unified_values() {
    let unified = SidesField::from_value("16px");
    assert!(unified.is_unified());
    assert_eq!(unified.mode(), SidesMode::Unified);
    assert_eq!(unified.css_value(), "16px");

    let pair = SidesField::from_value("10px 20px");
    assert!(!pair.is_unified());
    assert_eq!(pair.mode(), SidesMode::Independent);
    assert_eq!(pair.side(Side::Top), "10px");
    assert_eq!(pair.side(Side::Right), "20px");
    assert_eq!(pair.side(Side::Bottom), "10px");
    assert_eq!(pair.side(Side::Left), "20px");
    assert_eq!(pair.css_value(), "10px 20px 10px 20px");
}

#[test]
fn sides_become_unified_when_all_four_match() {
    let mut field = SidesField::from_value("4px 8px");
    field.set_side(Side::Right, "4px");
    field.set_side(Side::Left, "4px");
    assert!(field.is_unified());
    assert_eq!(field.css_value(), "4px");
}

#[test]
fn toggling_sides_mode_does_not_commit_anything() {
    let mut editor = card_editor();
    let mut panel = PanelController::new("card");
    panel.sync(&editor, &FixedLayout);

    let mut field = SidesField::from_value("16px");
    field.toggle_mode();
    assert_eq!(field.mode(), SidesMode::Independent);
    field.toggle_mode();
    assert_eq!(field.mode(), SidesMode::Unified);

    // Mode flips alone leave the document and history untouched.
    assert!(!editor.can_undo());

    // A subsequent edit plus commit is what lands in the document.
    field.set_side(Side::Top, "24");
    panel.edit_field("padding", field.css_value());
    assert!(panel.commit_field(&mut editor, "padding"));

    let Node::Element(card) = &editor.doc().children[0] else {
        panic!("expected card element");
    };
    assert_eq!(
        card.attrs.get("padding").and_then(|v| v.as_str()),
        Some("24px 16px 16px 16px")
    );
}
