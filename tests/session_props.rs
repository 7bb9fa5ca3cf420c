//! Randomized editing sequences against the session invariants.

use proptest::prelude::*;
use std::collections::HashSet;

use stencil::{
    BulkCreateSession, Config,
    document::{BACKGROUND, ElementKind, ElementMeta, NewElement, ShapeProps, TextProps},
};

#[derive(Debug, Clone)]
enum Edit {
    AddText(Option<&'static str>),
    AddShape(Option<&'static str>),
    Rename(usize, &'static str),
    Delete(usize),
    CopyPaste(usize),
    Map(usize, &'static str),
}

const NAMES: &[&str] = &[
    "Title",
    "Subtitle",
    "Background",
    "Headline",
    "Text_1",
    "Title_copy",
    "Price",
    " ",
];

const COLUMNS: &[&str] = &["headline", "cta"];

fn edit() -> impl Strategy<Value = Edit> {
    let name = || prop::sample::select(NAMES);
    prop_oneof![
        prop::option::of(name()).prop_map(Edit::AddText),
        prop::option::of(name()).prop_map(Edit::AddShape),
        (any::<usize>(), name()).prop_map(|(i, n)| Edit::Rename(i, n)),
        any::<usize>().prop_map(Edit::Delete),
        any::<usize>().prop_map(Edit::CopyPaste),
        (any::<usize>(), prop::sample::select(COLUMNS)).prop_map(|(i, c)| Edit::Map(i, c)),
    ]
}

fn name_at(session: &BulkCreateSession, i: usize) -> String {
    let elements = session.document().elements();
    elements[i % elements.len()].name.clone()
}

fn add(session: &mut BulkCreateSession, kind: ElementKind, name: Option<&str>) {
    let mut new = NewElement::new(kind);
    if let Some(name) = name {
        new = new.named(name);
    }
    let _ = session.add_element(new);
}

fn check_invariants(session: &BulkCreateSession) -> Result<(), TestCaseError> {
    let elements = session.document().elements();
    prop_assert!(elements[0].is_background());
    prop_assert_eq!(elements.iter().filter(|e| e.name == BACKGROUND).count(), 1);

    let mut seen = HashSet::new();
    for e in elements {
        prop_assert!(!e.name.trim().is_empty());
        prop_assert!(seen.insert(e.name.as_str()), "duplicate name {}", e.name);
    }
    for (element, _) in session.mapping().iter() {
        let target = session.document().element(element);
        prop_assert!(target.is_some_and(|e| e.kind.is_text()), "orphan mapping {}", element);
    }
    Ok(())
}

proptest! {
    #[test]
    fn edits_keep_names_unique_and_mappings_attached(
        edits in prop::collection::vec(edit(), 1..40)
    ) {
        let mut session = BulkCreateSession::new(Config::default());
        session.import_csv("headline,cta\nHello,Buy\n").unwrap();

        for edit in edits {
            match edit {
                Edit::AddText(name) => {
                    add(&mut session, ElementKind::Text(TextProps::editor_default()), name)
                }
                Edit::AddShape(name) => {
                    add(&mut session, ElementKind::Shape(ShapeProps::editor_default()), name)
                }
                Edit::Rename(i, to) => {
                    let from = name_at(&session, i);
                    let column = session.mapping().get(&from).map(str::to_string);
                    if session.rename_element(&from, to).is_ok() {
                        let to = to.trim();
                        prop_assert_eq!(session.mapping().get(to), column.as_deref());
                        if from != to {
                            prop_assert_eq!(session.mapping().get(&from), None);
                        }
                    } else {
                        prop_assert_eq!(session.mapping().get(&from), column.as_deref());
                    }
                }
                Edit::Delete(i) => {
                    let name = name_at(&session, i);
                    session.delete_element(&name);
                }
                Edit::CopyPaste(i) => {
                    let name = name_at(&session, i);
                    if session.copy(&name).is_ok() {
                        session.paste().unwrap();
                    }
                }
                Edit::Map(i, column) => {
                    let name = name_at(&session, i);
                    let _ = session.set_mapping(&name, Some(column));
                }
            }
            check_invariants(&session)?;
        }
    }
}
