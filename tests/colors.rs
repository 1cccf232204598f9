// SPDX-License-Identifier: MIT OR Apache-2.0

use logtree::{
    BackgroundColor, ColorMatcher, ColorSupport, Handler, HandlerRegistry, KeywordStyle, Level,
    LevelRegistry, Manager, MemoryBuffer, RESET, SinkTarget, TemplateFormatter, TextColor,
    TextEffect,
};
use std::sync::Arc;

fn matcher(support: ColorSupport) -> Arc<ColorMatcher> {
    let matcher = ColorMatcher::with_support(support);
    matcher
        .add_mapping("failure", ["fail(ed|ure)?"], KeywordStyle::new(TextColor::Red))
        .unwrap();
    matcher
        .add_mapping(
            "disk",
            ["disk"],
            KeywordStyle::new(TextColor::Yellow)
                .background(BackgroundColor::Blue)
                .effect(TextEffect::Underline),
        )
        .unwrap();
    Arc::new(matcher)
}

fn colored_logger(support: ColorSupport) -> (Arc<Manager>, MemoryBuffer) {
    let manager = Manager::with_levels(Arc::new(LevelRegistry::new()));
    let buffer = MemoryBuffer::new();
    let handler = Handler::builder(SinkTarget::Memory(buffer.clone()))
        .levels(manager.levels().clone())
        .registry(Arc::new(HandlerRegistry::new()))
        .level(Level::DEBUG)
        .formatter(TemplateFormatter::new("%(message)s", "%H").unwrap())
        .matcher(matcher(support))
        .build()
        .unwrap();
    manager.root().add_handler(handler);
    (manager, buffer)
}

#[test]
fn first_registered_mapping_wins() {
    let (manager, buffer) = colored_logger(ColorSupport::Always);
    manager.root().error("disk failure").unwrap();
    manager.root().warning("disk almost full").unwrap();
    manager.root().info("all good").unwrap();
    assert_eq!(
        buffer.drain(),
        [
            format!("\x1b[31mdisk failure{RESET}"),
            format!("\x1b[33m\x1b[44m\x1b[4mdisk almost full{RESET}"),
            "all good".to_string(),
        ]
    );
}

#[test]
fn unsupported_terminal_leaves_text_alone() {
    let (manager, buffer) = colored_logger(ColorSupport::Never);
    manager.root().error("disk failure").unwrap();
    assert_eq!(buffer.drain(), ["disk failure"]);
}

#[test]
fn mappings_can_be_replaced_and_removed() {
    let matcher = matcher(ColorSupport::Always);
    matcher
        .add_mapping("failure", ["nothing-matches-this"], KeywordStyle::new(TextColor::Green))
        .unwrap();
    let names: Vec<String> = matcher
        .mappings()
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, ["failure", "disk"]);
    assert!(matcher.colorize("failed disk").starts_with("\x1b[33m"));

    matcher.remove_mapping("disk").unwrap();
    assert_eq!(matcher.colorize("failed disk"), "failed disk");
    assert!(matcher.remove_mapping("disk").unwrap_err().is_unknown_identifier());
}

#[test]
fn bad_mappings_are_rejected() {
    let matcher = ColorMatcher::with_support(ColorSupport::Always);
    let style = KeywordStyle::new(TextColor::Cyan);
    assert!(matcher.add_mapping("", ["x"], style).unwrap_err().is_invalid_argument());
    assert!(
        matcher
            .add_mapping("empty", Vec::<String>::new(), style)
            .unwrap_err()
            .is_invalid_argument()
    );
    assert!(matcher.add_mapping("regex", ["("], style).unwrap_err().is_invalid_argument());
    assert!(
        KeywordStyle::parse("MAUVE", None, None)
            .unwrap_err()
            .is_unknown_identifier()
    );
    assert!(matcher.mappings().is_empty());
}
