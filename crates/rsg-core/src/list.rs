//! Composite node: an ordered list of child handles.
//!
//! Insertion order is traversal order. The list holds its own handle to
//! every child, so a child stays alive while it is listed. Parent links
//! are recorded in the repository, not here.

use crate::context::{ApplyContext, ApplyMode};
use crate::error::Result;
use crate::id::NodeUid;
use crate::node::{NodeBase, SceneNode};
use crate::repository::{Handle, RepositoryRef};
use std::collections::HashSet;

#[derive(Debug)]
pub struct NodeList {
    base: NodeBase,
    repo: RepositoryRef,
    children: Vec<Handle>,
}

impl Default for NodeList {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeList {
    pub fn new() -> Self {
        Self::with_base(NodeBase::new("list"))
    }

    pub fn named(name: &str) -> Self {
        Self::with_base(NodeBase::named("list", name))
    }

    pub(crate) fn with_base(base: NodeBase) -> Self {
        Self {
            base,
            repo: RepositoryRef::default(),
            children: Vec::new(),
        }
    }

    /// A list with a new identity and a new reference to each of the same children.
    pub(crate) fn duplicate_with(&self, base: NodeBase) -> Self {
        Self {
            base,
            repo: self.repo.clone(),
            children: self.children.clone(),
        }
    }

    /// Bind to the owning repository and record parent links for the
    /// children added before the list was inserted.
    pub(crate) fn attach(&mut self, repo: &RepositoryRef) {
        self.repo = repo.clone();
        for uid in self.children.iter().filter_map(Handle::uid) {
            self.repo.link(self.base.uid, uid);
        }
    }

    // ─── Membership ──────────────────────────────────────────────────────

    /// Append a child. Invalid handles are rejected.
    pub fn add(&mut self, child: &Handle) -> bool {
        let Some(uid) = child.uid() else {
            return false;
        };
        self.children.push(child.clone());
        self.repo.link(self.base.uid, uid);
        true
    }

    /// Remove the first occurrence of `child`.
    pub fn remove(&mut self, child: &Handle) -> bool {
        let Some(uid) = child.uid() else {
            return false;
        };
        self.remove_uid(uid)
    }

    fn remove_uid(&mut self, uid: NodeUid) -> bool {
        let Some(pos) = self.children.iter().position(|h| h.uid() == Some(uid)) else {
            return false;
        };
        self.repo.unlink(self.base.uid, uid);
        self.children.remove(pos);
        self.set_content_changed(true, true, false);
        true
    }

    /// Release the child at `index` but keep its slot, which traversal then skips.
    pub fn clear_child(&mut self, index: usize) -> bool {
        let Some(handle) = self.children.get_mut(index) else {
            return false;
        };
        if let Some(uid) = handle.uid() {
            self.repo.unlink(self.base.uid, uid);
        }
        handle.clear();
        true
    }

    /// Remove every child.
    pub fn reset(&mut self) {
        for uid in self.children.iter().filter_map(Handle::uid) {
            self.repo.unlink(self.base.uid, uid);
        }
        self.children.clear();
        self.set_content_changed(true, true, false);
    }

    pub fn children(&self) -> &[Handle] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    /// Child with `uid`. With `recursive`, nested lists are searched depth-first
    /// after the direct children.
    pub fn find_by_uid(&self, uid: NodeUid, recursive: bool) -> Handle {
        let mut seen = HashSet::from([self.base.uid]);
        self.find_rec(uid, recursive, &mut seen)
    }

    fn find_rec(&self, uid: NodeUid, recursive: bool, seen: &mut HashSet<NodeUid>) -> Handle {
        if let Some(h) = self.children.iter().find(|h| h.uid() == Some(uid)) {
            return h.clone();
        }
        if !recursive {
            return Handle::invalid();
        }
        for child in &self.children {
            let Some(child_uid) = child.uid() else {
                continue;
            };
            if !seen.insert(child_uid) {
                continue;
            }
            let found = child
                .with(|n| n.as_list().map(|l| l.find_rec(uid, true, seen)))
                .flatten();
            if let Some(h) = found.filter(Handle::is_valid) {
                return h;
            }
        }
        Handle::invalid()
    }

    /// Direct children called `name`, in list order.
    pub fn find_by_name(&self, name: &str) -> Vec<Handle> {
        self.children
            .iter()
            .filter(|h| h.with(|n| n.name().as_str() == name).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Remove every direct child called `name`. Returns how many were removed.
    pub fn remove_by_name(&mut self, name: &str) -> usize {
        let uids: Vec<NodeUid> = self
            .find_by_name(name)
            .iter()
            .filter_map(Handle::uid)
            .collect();
        uids.into_iter().filter(|&uid| self.remove_uid(uid)).count()
    }

    /// Drop children that nothing but this list refers to.
    /// Returns how many were removed.
    pub fn prune_unique(&mut self) -> usize {
        let before = self.children.len();
        let owner = self.base.uid;
        let repo = self.repo.clone();
        self.children.retain(|h| {
            let keep = h.ref_count() > 1;
            if !keep && let Some(uid) = h.uid() {
                repo.unlink(owner, uid);
            }
            keep
        });
        let removed = before - self.children.len();
        if removed > 0 {
            self.set_content_changed(true, true, false);
        }
        removed
    }

    // ─── Content tracking ────────────────────────────────────────────────

    pub fn enable_content_tracking(&self, val: bool) {
        self.repo.enable_content_tracking(self.base.uid, val);
    }

    pub fn set_content_changed(&self, val: bool, tell_parents: bool, tell_children: bool) {
        self.repo
            .set_content_changed(self.base.uid, val, tell_parents, tell_children);
    }

    pub fn is_content_changed(&self) -> bool {
        self.repo.is_content_changed(self.base.uid)
    }

    /// Lists that hold this one as a child.
    pub fn parents(&self) -> Vec<NodeUid> {
        self.repo.parents(self.base.uid)
    }

    // ─── Traversal ───────────────────────────────────────────────────────

    /// Apply the children in order, skipping invalid ones.
    /// Returns whether any child asked for more animation frames.
    pub fn apply_children(&self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        let mut animate = false;
        for (i, child) in self.children.iter().enumerate() {
            if !child.is_valid() {
                log::trace!("{}: skipping invalid child {i}", self.base.uid);
                continue;
            }
            animate |= child
                .apply(mode, ctx)
                .map_err(|e| e.context(format!("applying child {i} of list {}", self.base.uid)))?;
        }
        Ok(animate)
    }

    /// Full composite apply: save the stacks, record the list on the pick
    /// path, apply the children, restore.
    pub fn apply_scoped(&self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        let mut scope = ctx.frame_scope();
        if mode == ApplyMode::Pick {
            scope.names.push(self.base.uid);
        }
        let animate = self.apply_children(mode, &mut scope)?;
        if mode == ApplyMode::Pick {
            scope.names.pop();
        }
        Ok(animate)
    }
}

impl SceneNode for NodeList {
    crate::node_boilerplate!();

    fn apply(&mut self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        self.apply_scoped(mode, ctx)
    }

    fn duplicate(&self) -> Option<Box<dyn SceneNode>> {
        Some(Box::new(self.duplicate_with(self.base.duplicate())))
    }

    fn attached(&mut self, repo: &RepositoryRef) {
        self.attach(repo);
    }

    fn as_list(&self) -> Option<&NodeList> {
        Some(self)
    }

    fn as_list_mut(&mut self) -> Option<&mut NodeList> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Repository;
    use crate::leaf::ColorNode;
    use crate::color::Color;

    fn list_with(repo: &Repository, names: &[&str]) -> (Handle, Vec<Handle>) {
        let list = repo.insert(NodeList::new());
        let children: Vec<Handle> = names
            .iter()
            .map(|n| repo.insert(ColorNode::named(n, Color::WHITE)))
            .collect();
        list.with_as_mut::<NodeList, _>(|l| {
            for c in &children {
                assert!(l.add(c));
            }
        });
        (list, children)
    }

    #[test]
    fn add_rejects_invalid_handles() {
        let repo = Repository::new();
        let list = repo.insert(NodeList::new());
        let added = list.with_as_mut::<NodeList, _>(|l| l.add(&Handle::invalid()));
        assert_eq!(added, Some(false));
    }

    #[test]
    fn list_keeps_children_alive() {
        let repo = Repository::new();
        let (list, mut children) = list_with(&repo, &["a"]);
        assert_eq!(children[0].ref_count(), 2);
        let uid = children[0].uid().unwrap();
        children.clear();
        assert!(repo.contains(uid));
        drop(list);
        assert!(!repo.contains(uid));
    }

    #[test]
    fn parents_are_recorded_by_uid() {
        let repo = Repository::new();
        let (list, children) = list_with(&repo, &["a", "b"]);
        let list_uid = list.uid().unwrap();
        let weak = repo.downgrade();
        assert_eq!(weak.parents(children[0].uid().unwrap()), vec![list_uid]);

        list.with_as_mut::<NodeList, _>(|l| assert!(l.remove(&children[0])));
        assert!(weak.parents(children[0].uid().unwrap()).is_empty());
        assert_eq!(children[0].ref_count(), 1);
    }

    #[test]
    fn find_by_uid_recurses_into_nested_lists() {
        let repo = Repository::new();
        let (inner, leaves) = list_with(&repo, &["leaf"]);
        let outer = repo.insert(NodeList::new());
        outer.with_as_mut::<NodeList, _>(|l| l.add(&inner));

        let target = leaves[0].uid().unwrap();
        let shallow = outer.with_as::<NodeList, _>(|l| l.find_by_uid(target, false)).unwrap();
        assert!(!shallow.is_valid());
        let deep = outer.with_as::<NodeList, _>(|l| l.find_by_uid(target, true)).unwrap();
        assert_eq!(deep, leaves[0]);
    }

    #[test]
    fn name_lookup_and_removal() {
        let repo = Repository::new();
        let (list, _children) = list_with(&repo, &["axis", "grid", "axis"]);
        let found = list.with_as::<NodeList, _>(|l| l.find_by_name("axis")).unwrap();
        assert_eq!(found.len(), 2);

        let removed = list.with_as_mut::<NodeList, _>(|l| l.remove_by_name("axis"));
        assert_eq!(removed, Some(2));
        assert_eq!(list.with_as::<NodeList, _>(NodeList::len), Some(1));
    }

    #[test]
    fn prune_unique_drops_exclusively_owned_children() {
        let repo = Repository::new();
        let (list, mut children) = list_with(&repo, &["kept", "pruned"]);
        let pruned_uid = children[1].uid().unwrap();
        children.truncate(1);

        let removed = list.with_as_mut::<NodeList, _>(NodeList::prune_unique);
        assert_eq!(removed, Some(1));
        assert!(!repo.contains(pruned_uid));
        assert!(children[0].is_valid());
    }

    #[test]
    fn content_changes_travel_up_to_parents() {
        let repo = Repository::new();
        let inner = repo.insert(NodeList::new());
        let outer = repo.insert(NodeList::new());
        outer.with_as_mut::<NodeList, _>(|l| {
            l.enable_content_tracking(true);
            l.add(&inner)
        });

        // Tracking propagates to sublists added later.
        assert!(inner.with_as::<NodeList, _>(|l| l.repo.is_content_tracked(l.base.uid)).unwrap());

        inner.with_as::<NodeList, _>(|l| l.set_content_changed(true, true, false));
        assert_eq!(outer.with_as::<NodeList, _>(NodeList::is_content_changed), Some(true));

        outer.with_as::<NodeList, _>(|l| l.set_content_changed(false, false, true));
        assert_eq!(inner.with_as::<NodeList, _>(NodeList::is_content_changed), Some(false));
    }

    #[test]
    fn removing_children_marks_the_list_and_its_parents_changed() {
        let repo = Repository::new();
        let (inner, children) = list_with(&repo, &["a", "b", "c"]);
        let outer = repo.insert(NodeList::new());
        outer.with_as_mut::<NodeList, _>(|l| {
            l.enable_content_tracking(true);
            l.add(&inner)
        });
        let changed = |h: &Handle| h.with_as::<NodeList, _>(NodeList::is_content_changed);
        let consume = || outer.with_as::<NodeList, _>(|l| l.set_content_changed(false, false, true));

        inner.with_as_mut::<NodeList, _>(NodeList::reset);
        assert_eq!(changed(&inner), Some(true));
        assert_eq!(changed(&outer), Some(true));

        consume();
        assert_eq!(changed(&inner), Some(false));
        inner.with_as_mut::<NodeList, _>(|l| {
            l.add(&children[0]);
            l.add(&children[1]);
        });
        inner.with_as_mut::<NodeList, _>(|l| l.remove(&children[0]));
        assert_eq!(changed(&outer), Some(true));

        consume();
        assert_eq!(inner.with_as_mut::<NodeList, _>(|l| l.remove_by_name("b")), Some(1));
        assert_eq!(changed(&inner), Some(true));

        consume();
        let extra = repo.insert(NodeList::named("extra"));
        inner.with_as_mut::<NodeList, _>(|l| l.add(&extra));
        drop(extra);
        assert_eq!(inner.with_as_mut::<NodeList, _>(NodeList::prune_unique), Some(1));
        assert_eq!(changed(&outer), Some(true));
    }

    #[test]
    fn content_flag_is_ignored_without_tracking() {
        let repo = Repository::new();
        let list = repo.insert(NodeList::new());
        list.with_as::<NodeList, _>(|l| l.set_content_changed(true, true, true));
        assert_eq!(list.with_as::<NodeList, _>(NodeList::is_content_changed), Some(false));
    }

    #[test]
    fn duplicate_shares_children() {
        let repo = Repository::new();
        let (list, children) = list_with(&repo, &["a"]);
        let copy = repo.copy(&list);
        assert!(copy.is_valid());
        assert_ne!(copy.uid(), list.uid());
        assert_eq!(children[0].ref_count(), 3);
        assert_eq!(repo.downgrade().parents(children[0].uid().unwrap()).len(), 2);
    }
}
