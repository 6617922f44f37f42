//! Random sequences of tree edits, checking after every step that the text still describes exactly
//! the tree we hold and that paths still lead back to their widgets.

use proptest::prelude::*;

use kvweave::config::Config;
use kvweave::logic::interpret::{BasicInterpreter, MarkupInterpreter};
use kvweave::logic::locate;
use kvweave::model::catalog::Catalog;
use kvweave::model::path;
use kvweave::model::tree::WidgetId;
use kvweave::session::collab::{Collaborators, NullWatcher};
use kvweave::session::error::Trouble;
use kvweave::session::reload::ReloadState;
use kvweave::session::{EditFlags, Session};

const CLASSES: &[&str] = &["BoxLayout", "GridLayout", "AnchorLayout", "Button", "Label", "Image"];

#[derive(Debug, Clone)]
enum Edit {
    Add { class: usize, target: usize, index: usize },
    Move { widget: usize, target: usize, index: usize },
    Remove { widget: usize },
    Undo,
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => (0..CLASSES.len(), any::<usize>(), any::<usize>()).prop_map(|(class, target, index)| Edit::Add { class, target, index }),
        4 => (any::<usize>(), any::<usize>(), any::<usize>()).prop_map(|(widget, target, index)| Edit::Move { widget, target, index }),
        1 => any::<usize>().prop_map(|widget| Edit::Remove { widget }),
        1 => Just(Edit::Undo),
    ]
}

fn session() -> Session {
    let config = Config::default();
    let collaborators = Collaborators::standard(&config).with_watcher(Box::new(NullWatcher));
    let mut s = Session::with_collaborators(config, Catalog::builtin(), collaborators);
    s.load_text("BoxLayout:\n").unwrap();
    s
}

fn live(s: &Session) -> Vec<WidgetId> {
    s.tree().iter().collect()
}

fn pick(widgets: &[WidgetId], n: usize) -> WidgetId {
    widgets[n % widgets.len()]
}

fn child_count_without(s: &Session, parent: WidgetId, widget: WidgetId) -> usize {
    s.tree().children(parent).iter().filter(|c| **c != widget).count()
}

fn apply(s: &mut Session, edit: &Edit) -> Result<(), kvweave::session::error::Error> {
    let widgets = live(s);

    match *edit {
        Edit::Add { class, target, index } => {
            let parent = pick(&widgets, target);
            let widget = s.create_widget(CLASSES[class]);
            let index = index % (s.tree().children(parent).len() + 1);
            s.add_child(widget, Some(parent), Some(index), EditFlags::empty())
        },
        Edit::Move { widget, target, index } => {
            if widgets.len() < 2 {
                return Ok(());
            }
            let widget = pick(&widgets[1..], widget);
            let parent = pick(&widgets, target);
            let index = index % (child_count_without(s, parent, widget) + 1);
            s.move_child(widget, parent, index, EditFlags::empty())
        },
        Edit::Remove { widget } => {
            if widgets.len() < 2 {
                return Ok(());
            }
            s.remove_child(pick(&widgets[1..], widget), EditFlags::empty()).map(|_| ())
        },
        Edit::Undo => s.undo().map(|_| ()),
    }
}

fn check_consistent(s: &Session) -> Result<(), TestCaseError> {
    let parsed = BasicInterpreter::default().parse(s.document().text())
        .map_err(|e| TestCaseError::fail(format!("text stopped parsing: {}\n{}", e, s.document().text())))?;
    let root = parsed.root.ok_or_else(|| TestCaseError::fail("text lost its root"))?;
    prop_assert_eq!(root.shape(), s.tree().shape(), "text:\n{}", s.document().text());

    let root_id = s.root().ok_or_else(|| TestCaseError::fail("tree lost its root"))?;
    let root_rule = s.root_rule().ok_or_else(|| TestCaseError::fail("no root rule"))?;
    let lines = s.document().lines(s.config().indent_width);

    for widget in s.tree().iter() {
        let at = s.path_of(widget);
        prop_assert_eq!(path::resolve_path(s.tree(), root_id, &at), Some(widget));

        let class = s.tree().class(widget);
        let region = locate::find_region(&lines, root_rule, &at, class)
            .map_err(|e| TestCaseError::fail(format!("{} at {}: {}", class.unwrap_or("?"), path::format(&at), e)))?;

        if let Some((parent_path, _)) = path::split_last(&at) {
            let parent = s.widget_at(parent_path).and_then(|p| s.tree().class(p));
            let outer = locate::find_region(&lines, root_rule, parent_path, parent)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert!(outer.contains(&region), "{:?} not inside {:?}", region, outer);
        }
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn edits_keep_text_and_tree_in_step(edits in prop::collection::vec(edit(), 1..40)) {
        let mut s = session();

        for edit in &edits {
            if let Err(e) = apply(&mut s, edit) {
                /* refusing a placement is fine; losing track of the text isn't */
                prop_assert!(!matches!(e.trouble, Trouble::StaleLocation(_) | Trouble::TextMutation(_)), "{:?} failed: {}", edit, e);
            }

            prop_assert_ne!(s.reload_state(), ReloadState::Armed);
            check_consistent(&s)?;
        }
    }

    #[test]
    fn undoing_everything_restores_the_text(edits in prop::collection::vec(edit(), 1..25)) {
        let mut s = session();
        let original = s.document().text().to_string();

        for edit in &edits {
            if let Edit::Undo = edit {
                continue;
            }
            let _ = apply(&mut s, edit);
        }

        while s.undo().unwrap_or(false) {}
        prop_assert_eq!(s.document().text(), original.as_str());
        check_consistent(&s)?;
    }

    #[test]
    fn paths_round_trip_after_appends(parents in prop::collection::vec(any::<usize>(), 1..30)) {
        let mut s = session();

        for parent in parents {
            let widgets: Vec<WidgetId> = live(&s).into_iter()
                .filter(|w| s.tree().get(*w).map_or(false, |w| w.container.accepts_children()))
                .collect();
            let widget = s.create_widget("BoxLayout");
            s.add_child(widget, Some(pick(&widgets, parent)), None, EditFlags::empty()).unwrap();
            prop_assert_eq!(s.path_of(widget).last().copied(), Some(0));
        }

        check_consistent(&s)?;
    }
}
