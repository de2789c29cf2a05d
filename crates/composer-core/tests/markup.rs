use composer_core::{
    Attrs, ComposerValue, Document, Editor, Node, banner_node, button_node, card_node,
    column_block_node, parse, render,
};
use serde_json::Value;

fn attrs(pairs: &[(&str, &str)]) -> Attrs {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

fn doc(children: Vec<Node>) -> Document {
    Document { children }
}

#[test]
fn paragraph_and_heading_round_trip() {
    let original = doc(vec![
        Node::heading(2, "Title"),
        Node::paragraph("Body text"),
    ]);

    let markup = render(&original);
    assert_eq!(markup, "<h2>Title</h2><p>Body text</p>");
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn text_is_entity_escaped() {
    let original = doc(vec![Node::paragraph("a < b & c > d")]);

    let markup = render(&original);
    assert_eq!(markup, "<p>a &lt; b &amp; c &gt; d</p>");
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn divider_round_trip() {
    let original = doc(vec![Node::paragraph("x"), Node::divider()]);

    let markup = render(&original);
    assert_eq!(markup, "<p>x</p><hr class=\"editor-divider\">");
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn banner_round_trip_carries_type() {
    let original = doc(vec![banner_node("warning", vec![Node::paragraph("heads up")])]);

    let markup = render(&original);
    assert_eq!(
        markup,
        "<div class=\"banner banner-warning\" data-type=\"warning\"><p>heads up</p></div>"
    );
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn banner_parse_defaults_to_info() {
    let parsed = parse("<div class=\"banner\"><p>x</p></div>").unwrap();
    let Node::Element(el) = &parsed.children[0] else {
        panic!("expected banner element");
    };
    assert_eq!(el.kind, "banner");
    assert_eq!(
        el.attrs.get("banner_type").and_then(|v| v.as_str()),
        Some("info")
    );
}

#[test]
fn banner_parse_rejects_unknown_type() {
    let parsed =
        parse("<div class=\"banner banner-loud\" data-type=\"loud\"><p>x</p></div>").unwrap();
    let Node::Element(el) = &parsed.children[0] else {
        panic!("expected banner element");
    };
    assert_eq!(
        el.attrs.get("banner_type").and_then(|v| v.as_str()),
        Some("info")
    );
}

#[test]
fn card_round_trip_with_custom_attrs() {
    let original = doc(vec![card_node(
        attrs(&[("background_color", "#ff0000"), ("padding", "24px")]),
        vec![Node::paragraph("inside")],
    )]);

    let markup = render(&original);
    assert!(markup.starts_with("<div class=\"card-block\" style=\"background-color: #ff0000;"));
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn card_parse_fills_missing_attrs_with_defaults() {
    let parsed = parse("<div class=\"card-block\"><p>x</p></div>").unwrap();
    let Node::Element(el) = &parsed.children[0] else {
        panic!("expected card element");
    };
    assert_eq!(el.kind, "card");
    assert_eq!(
        el.attrs.get("background_color").and_then(|v| v.as_str()),
        Some("#ffffff")
    );
    assert_eq!(
        el.attrs.get("border_radius").and_then(|v| v.as_str()),
        Some("8px")
    );
    assert_eq!(el.attrs.get("padding").and_then(|v| v.as_str()), Some("16px"));
    assert_eq!(
        el.attrs.get("border_style").and_then(|v| v.as_str()),
        Some("solid")
    );
}

#[test]
fn button_round_trip() {
    let original = doc(vec![button_node(
        "Get started",
        attrs(&[("url", "https://example.com"), ("alignment", "center")]),
    )]);

    let markup = render(&original);
    assert!(markup.starts_with("<a data-type=\"button\" class=\"editor-button-block\""));
    assert!(markup.contains("href=\"https://example.com\""));
    assert!(markup.contains("text-align: center"));
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn plain_anchor_is_rejected() {
    assert!(parse("<a href=\"https://example.com\">x</a>").is_err());
}

#[test]
fn column_block_round_trip() {
    let original = doc(vec![column_block_node(3)]);

    let markup = render(&original);
    assert_eq!(
        markup,
        "<div class=\"column-block\">\
         <div class=\"column\"><p></p></div>\
         <div class=\"column\"><p></p></div>\
         <div class=\"column\"><p></p></div>\
         </div>"
    );
    assert_eq!(parse(&markup).unwrap(), original);
}

#[test]
fn render_parse_render_is_stable() {
    let original = doc(vec![
        Node::heading(1, "Newsletter"),
        banner_node("success", vec![Node::paragraph("Launched & live")]),
        card_node(
            attrs(&[("border_radius", "12px")]),
            vec![Node::paragraph("Card body"), button_node("Go", Attrs::default())],
        ),
        column_block_node(2),
        Node::divider(),
    ]);

    let first = render(&original);
    let reparsed = parse(&first).unwrap();
    assert_eq!(render(&reparsed), first);
}

#[test]
fn parse_tolerates_whitespace_between_blocks() {
    let parsed = parse("<p>a</p>\n  <hr class=\"editor-divider\">\n<p>b</p>").unwrap();
    assert_eq!(parsed.children.len(), 3);
}

#[test]
fn parse_reports_unsupported_and_mismatched_tags() {
    assert!(parse("<span>x</span>").is_err());
    assert!(parse("<p>x</div>").is_err());
    assert!(parse("<div class=\"card-block\"><p>x</p>").is_err());
}

#[test]
fn set_content_and_get_content_round_trip_through_editor() {
    let mut editor = Editor::with_composer_blocks();
    let markup = "<h1>Hello</h1><div class=\"banner banner-error\" data-type=\"error\"><p>nope</p></div>";

    editor.set_content(markup).unwrap();
    assert_eq!(editor.get_content(), markup);
    assert!(!editor.can_undo());
}

#[test]
fn composer_value_json_round_trip() {
    let original = doc(vec![card_node(Attrs::default(), vec![Node::paragraph("x")])]);
    let value = ComposerValue::from_document(original.clone());

    let json = value.to_json_pretty().unwrap();
    let restored = ComposerValue::from_json_str(&json).unwrap();
    assert_eq!(restored.schema, "composer-doc");
    assert_eq!(restored.version, 1);
    assert_eq!(restored.into_document(), original);
}
