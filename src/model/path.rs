use itertools::Itertools;

use crate::model::tree;

/// Sibling indices from the root down. At every level, index 0 is the *last* child in declaration
/// order, so the most recently appended child is always 0.
pub type Path = Vec<usize>;

pub fn format(path: &[usize]) -> String {
    if path.is_empty() {
        "root".to_string()
    } else {
        path.iter().join(".")
    }
}

pub fn parse(text: &str) -> Option<Path> {
    let text = text.trim();
    if text.is_empty() || text == "root" {
        return Some(Vec::new());
    }
    text.split('.').map(|i| i.trim().parse::<usize>().ok()).collect()
}

/// Converts between a declaration-order position and a path index among `len` siblings. The
/// mapping is its own inverse.
pub fn flip(index: usize, len: usize) -> usize {
    len - 1 - index
}

/// Index that `widget` contributes to its path, or None if it is detached. Pages of a switching
/// container are its direct children here, so the page that is showing contributes its own
/// position like any other child, and the hidden pages stay addressable.
pub fn index_in_parent(tree: &tree::WidgetTree, widget: tree::WidgetId) -> Option<usize> {
    let parent = tree.parent(widget)?;
    let siblings = tree.children(parent);
    let position = siblings.iter().position(|c| *c == widget)?;

    Some(flip(position, siblings.len()))
}

/// Walks up from `widget` until it reaches the root (or something detached), collecting indices.
pub fn compute_path(tree: &tree::WidgetTree, widget: tree::WidgetId) -> Path {
    let mut path = Vec::new();
    let mut current = widget;

    while Some(current) != tree.root() {
        match (tree.parent(current), index_in_parent(tree, current)) {
            (Some(parent), Some(index)) => {
                path.push(index);
                current = parent;
            },
            _ => break,
        }
    }

    path.reverse();
    path
}

/// Inverse of `compute_path`. Returns None if the path doesn't fit the tree's current shape.
pub fn resolve_path(tree: &tree::WidgetTree, root: tree::WidgetId, path: &[usize]) -> Option<tree::WidgetId> {
    let mut current = root;
    for index in path {
        let children = tree.children(current);
        if *index >= children.len() {
            return None;
        }
        current = children[flip(*index, children.len())];
    }
    Some(current)
}

/// Path of the parent plus the last component, the way callers that move things around need it.
pub fn split_last(path: &[usize]) -> Option<(&[usize], usize)> {
    let (last, parent) = path.split_last()?;
    Some((parent, *last))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::catalog;

    #[test]
    fn test_format_and_parse() {
        assert_eq!(format(&[]), "root");
        assert_eq!(format(&[1, 0, 2]), "1.0.2");
        assert_eq!(parse("1.0.2"), Some(vec![1, 0, 2]));
        assert_eq!(parse("root"), Some(vec![]));
        assert_eq!(parse(""), Some(vec![]));
        assert_eq!(parse("1.x"), None);
    }

    #[test]
    fn test_flip_is_an_involution() {
        for len in 1..5 {
            for i in 0..len {
                assert_eq!(flip(flip(i, len), len), i);
            }
        }
        assert_eq!(flip(0, 3), 2);
    }

    #[test]
    fn test_last_child_is_index_zero() {
        let catalog = catalog::Catalog::builtin();
        let mut tree = tree::WidgetTree::new();
        let root = tree.create("BoxLayout", &catalog);
        tree.set_root(Some(root)).unwrap();
        let button = tree.create("Button", &catalog);
        let label = tree.create("Label", &catalog);
        tree.attach(button, root, 0).unwrap();
        tree.attach(label, root, 1).unwrap();

        assert_eq!(compute_path(&tree, root), Vec::<usize>::new());
        assert_eq!(compute_path(&tree, label), vec![0]);
        assert_eq!(compute_path(&tree, button), vec![1]);
        assert_eq!(resolve_path(&tree, root, &[0]), Some(label));
        assert_eq!(resolve_path(&tree, root, &[1]), Some(button));
        assert_eq!(resolve_path(&tree, root, &[2]), None);
        assert_eq!(resolve_path(&tree, root, &[0, 0]), None);
    }

    #[test]
    fn test_nested_round_trip() {
        let catalog = catalog::Catalog::builtin();
        let mut tree = tree::WidgetTree::new();
        let root = tree.create("BoxLayout", &catalog);
        tree.set_root(Some(root)).unwrap();

        let mut all = vec![root];
        let mut parents = vec![root];
        for i in 0..12 {
            let class = if i % 3 == 0 { "GridLayout" } else { "Button" };
            let w = tree.create(class, &catalog);
            let parent = parents[i % parents.len()];
            let position = tree.children(parent).len();
            tree.attach(w, parent, position).unwrap();
            if class == "GridLayout" {
                parents.push(w);
            }
            all.push(w);
        }

        for w in all {
            let path = compute_path(&tree, w);
            assert_eq!(resolve_path(&tree, root, &path), Some(w), "path {:?}", path);
        }
    }

    #[test]
    fn test_switching_container_paths() {
        let catalog = catalog::Catalog::builtin();
        let mut tree = tree::WidgetTree::new();
        let manager = tree.create("ScreenManager", &catalog);
        tree.set_root(Some(manager)).unwrap();
        let first = tree.create("Screen", &catalog);
        let second = tree.create("Screen", &catalog);
        tree.attach(first, manager, 0).unwrap();
        tree.attach(second, manager, 1).unwrap();
        let button = tree.create("Button", &catalog);
        tree.attach(button, second, 0).unwrap();

        tree.set_active(manager, second).unwrap();
        assert_eq!(compute_path(&tree, button), vec![0, 0]);
        assert_eq!(compute_path(&tree, first), vec![1]);

        /* switching pages doesn't renumber them */
        tree.set_active(manager, first).unwrap();
        assert_eq!(compute_path(&tree, first), vec![1]);
        assert_eq!(compute_path(&tree, second), vec![0]);
        assert_eq!(resolve_path(&tree, manager, &compute_path(&tree, button)), Some(button));
    }

    #[test]
    fn test_detached_widget_paths_stop_at_the_detachment() {
        let catalog = catalog::Catalog::builtin();
        let mut tree = tree::WidgetTree::new();
        let root = tree.create("BoxLayout", &catalog);
        tree.set_root(Some(root)).unwrap();
        let orphan = tree.create("BoxLayout", &catalog);
        let child = tree.create("Button", &catalog);
        tree.attach(child, orphan, 0).unwrap();

        assert_eq!(compute_path(&tree, child), vec![0]);
        assert_eq!(compute_path(&tree, orphan), Vec::<usize>::new());
    }
}
