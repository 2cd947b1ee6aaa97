//! Node ownership: the repository and reference-counted handles.
//!
//! The repository owns every node. A [`Handle`] is a registered token
//! pointing at one node; the node lives exactly as long as at least one
//! handle to it is registered. Handles never own the node themselves, so
//! [`Repository::reset`] can delete the whole graph at once and leave
//! every outstanding handle invalid rather than dangling.
//!
//! Node cells are `Rc<RefCell<..>>` so a caller can clone the cell out of
//! the map, release the map borrow, and only then borrow the node. This
//! keeps handle creation and release legal while a node is being applied.
//!
//! The registry also records composite structure as a parent → child
//! graph over uids, plus the content-changed flags of composite nodes.
//! Parents are looked up by uid, so a back-reference never keeps a parent
//! alive.

use crate::context::{ApplyContext, ApplyMode};
use crate::error::{Result, SceneError};
use crate::id::NodeUid;
use crate::node::SceneNode;
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::Dfs;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

type NodeCell = Rc<RefCell<Box<dyn SceneNode>>>;
type HandleKey = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ContentState {
    tracked: bool,
    changed: bool,
}

struct Entry {
    node: NodeCell,
    handles: SmallVec<[HandleKey; 4]>,
    composite: bool,
    content: ContentState,
}

/// Outcome of releasing one handle registration.
pub(crate) enum Release {
    /// The node or the registration was not known.
    NotFound,
    /// Other handles remain.
    Released,
    /// That was the last handle; the node has been removed and is returned
    /// so it can be dropped outside the registry borrow.
    Deleted(#[allow(dead_code)] NodeCell),
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Release::NotFound => "NotFound",
            Release::Released => "Released",
            Release::Deleted(_) => "Deleted",
        })
    }
}

/// Handle registrations plus the composite structure of the scene.
///
/// Edges go from parent → child, one edge per occurrence, so a child added
/// twice to the same list has two parallel edges.
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<NodeUid, Entry>,
    graph: StableDiGraph<NodeUid, ()>,
    id_index: HashMap<NodeUid, NodeIndex>,
    next_key: HandleKey,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("nodes", &self.entries.len())
            .field("links", &self.graph.edge_count())
            .finish()
    }
}

impl Registry {
    fn alloc_key(&mut self) -> HandleKey {
        self.next_key += 1;
        self.next_key
    }

    fn insert(&mut self, uid: NodeUid, node: NodeCell, composite: bool) -> HandleKey {
        let key = self.alloc_key();
        let mut handles = SmallVec::new();
        handles.push(key);
        self.entries.insert(
            uid,
            Entry {
                node,
                handles,
                composite,
                content: ContentState::default(),
            },
        );
        let idx = self.graph.add_node(uid);
        self.id_index.insert(uid, idx);
        key
    }

    fn register(&mut self, uid: NodeUid) -> Option<HandleKey> {
        if !self.entries.contains_key(&uid) {
            return None;
        }
        let key = self.alloc_key();
        self.entries.get_mut(&uid)?.handles.push(key);
        Some(key)
    }

    pub(crate) fn deregister(&mut self, uid: NodeUid, key: HandleKey) -> Release {
        let Some(entry) = self.entries.get_mut(&uid) else {
            return Release::NotFound;
        };
        let Some(pos) = entry.handles.iter().position(|&k| k == key) else {
            return Release::NotFound;
        };
        entry.handles.swap_remove(pos);
        if !entry.handles.is_empty() {
            return Release::Released;
        }
        match self.remove_entry(uid) {
            Some(node) => Release::Deleted(node),
            None => Release::NotFound,
        }
    }

    /// Remove the node and every link to or from it.
    fn remove_entry(&mut self, uid: NodeUid) -> Option<NodeCell> {
        let entry = self.entries.remove(&uid)?;
        if let Some(idx) = self.id_index.remove(&uid) {
            self.graph.remove_node(idx);
        }
        log::trace!("deleted node {uid}");
        Some(entry.node)
    }

    fn clear(&mut self) -> Vec<Entry> {
        self.graph.clear();
        self.id_index.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    fn is_bound(&self, uid: NodeUid, key: HandleKey) -> bool {
        self.entries
            .get(&uid)
            .is_some_and(|e| e.handles.contains(&key))
    }

    fn node(&self, uid: NodeUid) -> Option<NodeCell> {
        self.entries.get(&uid).map(|e| Rc::clone(&e.node))
    }

    fn ref_count(&self, uid: NodeUid) -> usize {
        self.entries.get(&uid).map_or(0, |e| e.handles.len())
    }

    /// Neighbours of `uid` in `dir`, once per edge.
    fn neighbors(&self, uid: NodeUid, dir: Direction) -> Vec<NodeUid> {
        let Some(&idx) = self.id_index.get(&uid) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, dir)
            .map(|n| self.graph[n])
            .collect()
    }

    fn link(&mut self, parent: NodeUid, child: NodeUid) {
        let (Some(&p), Some(&c)) = (self.id_index.get(&parent), self.id_index.get(&child)) else {
            return;
        };
        self.graph.add_edge(p, c, ());
        let tracked = self.entries.get(&parent).is_some_and(|e| e.content.tracked);
        if tracked {
            self.enable_content_tracking(child, true);
        }
    }

    /// Remove one parent → child edge.
    fn unlink(&mut self, parent: NodeUid, child: NodeUid) {
        let (Some(&p), Some(&c)) = (self.id_index.get(&parent), self.id_index.get(&child)) else {
            return;
        };
        if let Some(edge) = self.graph.find_edge(p, c) {
            self.graph.remove_edge(edge);
        }
    }

    fn set_content_changed(&mut self, uid: NodeUid, val: bool, tell_parents: bool, tell_children: bool) {
        let Some(entry) = self.entries.get_mut(&uid) else {
            return;
        };
        if !entry.composite || !entry.content.tracked || entry.content.changed == val {
            return;
        }
        entry.content.changed = val;

        if tell_parents {
            for p in self.neighbors(uid, Direction::Incoming) {
                self.set_content_changed(p, true, true, false);
            }
        }
        if tell_children {
            for c in self.neighbors(uid, Direction::Outgoing) {
                self.set_content_changed(c, false, false, true);
            }
        }
    }

    fn enable_content_tracking(&mut self, uid: NodeUid, val: bool) {
        let Some(&start) = self.id_index.get(&uid) else {
            return;
        };
        // Only composites have outgoing edges, so the walk never passes
        // through a leaf.
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            if let Some(entry) = self.entries.get_mut(&self.graph[idx])
                && entry.composite
            {
                entry.content.tracked = val;
            }
        }
    }
}

fn insert_into(registry: &Rc<RefCell<Registry>>, node: Box<dyn SceneNode>) -> Handle {
    let uid = node.uid();
    let composite = node.is_composite();
    let cell: NodeCell = Rc::new(RefCell::new(node));
    let key = registry.borrow_mut().insert(uid, Rc::clone(&cell), composite);

    let repo = RepositoryRef {
        registry: Rc::downgrade(registry),
    };
    cell.borrow_mut().attached(&repo);

    Handle {
        binding: Some(Binding {
            uid,
            key,
            registry: Rc::downgrade(registry),
        }),
    }
}

// ─── Repository ──────────────────────────────────────────────────────────

/// Owner of all nodes of one scene.
///
/// Dropping the repository deletes every node it still owns; handles that
/// outlive it simply become invalid.
#[derive(Debug, Default)]
pub struct Repository {
    registry: Rc<RefCell<Registry>>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `node` and return the first handle to it.
    pub fn insert<N: SceneNode>(&self, node: N) -> Handle {
        self.insert_boxed(Box::new(node))
    }

    pub fn insert_boxed(&self, node: Box<dyn SceneNode>) -> Handle {
        insert_into(&self.registry, node)
    }

    /// Duplicate the node behind `handle` and return a handle to the copy.
    ///
    /// The result is invalid if `handle` is invalid, belongs to another
    /// repository, or its node type does not support duplication.
    pub fn copy(&self, handle: &Handle) -> Handle {
        if !self.owns(handle) {
            return Handle::invalid();
        }
        handle.duplicate()
    }

    /// Number of live handles to the node behind `handle`. 0 if invalid.
    pub fn ref_count(&self, handle: &Handle) -> usize {
        if !self.owns(handle) {
            return 0;
        }
        handle.ref_count()
    }

    /// A new handle to the node with `uid`, or an invalid handle if no such node exists.
    pub fn lookup(&self, uid: NodeUid) -> Handle {
        self.downgrade().lookup(uid)
    }

    pub fn contains(&self, uid: NodeUid) -> bool {
        self.registry.borrow().entries.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Uids of all live nodes, in no particular order.
    pub fn uids(&self) -> Vec<NodeUid> {
        self.registry.borrow().entries.keys().copied().collect()
    }

    /// Delete every node and invalidate every handle.
    ///
    /// Handles are not released one by one. The map is emptied first, so
    /// releases triggered while the nodes are dropped find nothing to do.
    pub fn reset(&self) {
        let drained = self.registry.borrow_mut().clear();
        log::debug!("repository reset: deleting {} nodes", drained.len());
        drop(drained);
    }

    pub fn downgrade(&self) -> RepositoryRef {
        RepositoryRef {
            registry: Rc::downgrade(&self.registry),
        }
    }

    fn owns(&self, handle: &Handle) -> bool {
        handle
            .binding
            .as_ref()
            .is_some_and(|b| Weak::ptr_eq(&b.registry, &Rc::downgrade(&self.registry)))
    }
}

/// Non-owning view of a repository, held by nodes that need to reach it.
#[derive(Debug, Clone, Default)]
pub struct RepositoryRef {
    registry: Weak<RefCell<Registry>>,
}

impl RepositoryRef {
    pub fn is_alive(&self) -> bool {
        self.registry.strong_count() > 0
    }

    pub fn lookup(&self, uid: NodeUid) -> Handle {
        let Some(registry) = self.registry.upgrade() else {
            return Handle::invalid();
        };
        let key = registry.borrow_mut().register(uid);
        match key {
            Some(key) => Handle {
                binding: Some(Binding {
                    uid,
                    key,
                    registry: Weak::clone(&self.registry),
                }),
            },
            None => Handle::invalid(),
        }
    }

    pub fn ref_count(&self, uid: NodeUid) -> usize {
        self.read(|r| r.ref_count(uid)).unwrap_or(0)
    }

    pub fn contains(&self, uid: NodeUid) -> bool {
        self.read(|r| r.entries.contains_key(&uid)).unwrap_or(false)
    }

    /// Composite nodes that hold `uid` as a child (once per occurrence).
    pub fn parents(&self, uid: NodeUid) -> Vec<NodeUid> {
        self.read(|r| r.neighbors(uid, Direction::Incoming))
            .unwrap_or_default()
    }

    /// Children of composite `uid` (once per occurrence).
    pub fn children(&self, uid: NodeUid) -> Vec<NodeUid> {
        self.read(|r| r.neighbors(uid, Direction::Outgoing))
            .unwrap_or_default()
    }

    pub(crate) fn link(&self, parent: NodeUid, child: NodeUid) {
        self.write(|r| r.link(parent, child));
    }

    pub(crate) fn unlink(&self, parent: NodeUid, child: NodeUid) {
        self.write(|r| r.unlink(parent, child));
    }

    /// Set the content-changed flag of composite `uid`. Has no effect unless
    /// content tracking is enabled for it. Parents are told that their
    /// content changed, children are told that theirs has been consumed.
    pub fn set_content_changed(&self, uid: NodeUid, val: bool, tell_parents: bool, tell_children: bool) {
        self.write(|r| r.set_content_changed(uid, val, tell_parents, tell_children));
    }

    pub fn is_content_changed(&self, uid: NodeUid) -> bool {
        self.read(|r| r.entries.get(&uid).is_some_and(|e| e.content.changed))
            .unwrap_or(false)
    }

    /// Enable or disable content tracking for composite `uid` and every composite below it.
    pub fn enable_content_tracking(&self, uid: NodeUid, val: bool) {
        self.write(|r| r.enable_content_tracking(uid, val));
    }

    pub fn is_content_tracked(&self, uid: NodeUid) -> bool {
        self.read(|r| r.entries.get(&uid).is_some_and(|e| e.content.tracked))
            .unwrap_or(false)
    }

    fn read<R>(&self, f: impl FnOnce(&Registry) -> R) -> Option<R> {
        let registry = self.registry.upgrade()?;
        let guard = registry.try_borrow().ok()?;
        let result = f(&guard);
        Some(result)
    }

    fn write<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> Option<R> {
        let registry = self.registry.upgrade()?;
        let mut guard = registry.try_borrow_mut().ok()?;
        let result = f(&mut guard);
        Some(result)
    }
}

// ─── Handle ──────────────────────────────────────────────────────────────

struct Binding {
    uid: NodeUid,
    key: HandleKey,
    registry: Weak<RefCell<Registry>>,
}

/// Reference-counted reference to one node in a repository, or to nothing.
///
/// Cloning registers a new reference; dropping or [`clear`](Handle::clear)ing
/// releases it. The node is deleted when its last reference is released.
#[derive(Default)]
pub struct Handle {
    binding: Option<Binding>,
}

impl Handle {
    /// A handle bound to nothing.
    pub const fn invalid() -> Self {
        Handle { binding: None }
    }

    /// Whether this handle is registered with a live repository and its node exists.
    pub fn is_valid(&self) -> bool {
        let Some(b) = &self.binding else {
            return false;
        };
        let Some(registry) = b.registry.upgrade() else {
            return false;
        };
        let bound = registry.try_borrow().is_ok_and(|r| r.is_bound(b.uid, b.key));
        bound
    }

    /// Uid of the referenced node, if the handle is valid.
    pub fn uid(&self) -> Option<NodeUid> {
        if !self.is_valid() {
            return None;
        }
        self.binding.as_ref().map(|b| b.uid)
    }

    /// Release the reference and become invalid.
    pub fn clear(&mut self) {
        let Some(b) = self.binding.take() else {
            return;
        };
        let Some(registry) = b.registry.upgrade() else {
            return;
        };
        let released = match registry.try_borrow_mut() {
            Ok(mut r) => r.deregister(b.uid, b.key),
            Err(_) => {
                log::warn!("handle to {} released while the repository was busy", b.uid);
                Release::NotFound
            }
        };
        // The deleted node (and the handles it owns) drop here, after the registry borrow ended.
        drop(released);
    }

    /// Bind to `node`, which is handed to `repo`.
    ///
    /// Fails and leaves both the handle and `node` untouched if the handle
    /// already references a live node.
    pub fn set(&mut self, node: Box<dyn SceneNode>, repo: &Repository) -> std::result::Result<(), Box<dyn SceneNode>> {
        if self.is_valid() {
            return Err(node);
        }
        self.clear();
        *self = repo.insert_boxed(node);
        Ok(())
    }

    /// Duplicate the referenced node through its owning repository.
    pub fn duplicate(&self) -> Handle {
        let Some(b) = &self.binding else {
            return Handle::invalid();
        };
        let Some(registry) = b.registry.upgrade() else {
            return Handle::invalid();
        };
        let Some(copy) = self.with(|n| n.duplicate()).flatten() else {
            log::debug!("node {} cannot be duplicated", b.uid);
            return Handle::invalid();
        };
        insert_into(&registry, copy)
    }

    /// Number of live handles to the referenced node. 0 if invalid.
    pub fn ref_count(&self) -> usize {
        let Some(b) = &self.binding else {
            return 0;
        };
        let Some(registry) = b.registry.upgrade() else {
            return 0;
        };
        let count = match registry.try_borrow() {
            Ok(r) if r.is_bound(b.uid, b.key) => r.ref_count(b.uid),
            _ => 0,
        };
        count
    }

    /// The repository this handle is registered with.
    pub fn repository(&self) -> Option<RepositoryRef> {
        let b = self.binding.as_ref()?;
        Some(RepositoryRef {
            registry: Weak::clone(&b.registry),
        })
    }

    fn cell(&self) -> Option<NodeCell> {
        let b = self.binding.as_ref()?;
        let registry = b.registry.upgrade()?;
        let guard = registry.try_borrow().ok()?;
        if !guard.is_bound(b.uid, b.key) {
            return None;
        }
        let cell = guard.node(b.uid);
        cell
    }

    /// Run `f` on the node. `None` if the handle is invalid or the node is
    /// currently borrowed mutably (e.g. it is being applied).
    pub fn with<R>(&self, f: impl FnOnce(&dyn SceneNode) -> R) -> Option<R> {
        let cell = self.cell()?;
        let node = cell.try_borrow().ok()?;
        let result = f(&**node);
        Some(result)
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn SceneNode) -> R) -> Option<R> {
        let cell = self.cell()?;
        let mut node = cell.try_borrow_mut().ok()?;
        let result = f(&mut **node);
        Some(result)
    }

    /// Like [`with`](Handle::with), but only if the node is a `T`.
    pub fn with_as<T: SceneNode, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.with(|n| n.as_any().downcast_ref::<T>().map(f)).flatten()
    }

    pub fn with_as_mut<T: SceneNode, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.with_mut(|n| n.as_any_mut().downcast_mut::<T>().map(f)).flatten()
    }

    /// Apply the referenced node. An invalid handle applies nothing.
    ///
    /// Reaching a node that is already being applied means the graph has a
    /// cycle; that is reported as [`SceneError::Cycle`].
    pub fn apply(&self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool> {
        let Some(cell) = self.cell() else {
            return Ok(false);
        };
        let Ok(mut node) = cell.try_borrow_mut() else {
            let uid = self.binding.as_ref().map_or(NodeUid::from_raw(0), |b| b.uid);
            log::warn!("cycle detected: node {uid} reached while being applied");
            return Err(SceneError::Cycle(uid));
        };
        log::trace!("apply {:?} {} ({})", mode, node.uid(), node.type_name());
        let result = node.apply(mode, ctx);
        result
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        let Some(b) = &self.binding else {
            return Handle::invalid();
        };
        RepositoryRef {
            registry: Weak::clone(&b.registry),
        }
        .lookup(b.uid)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.clear();
    }
}

impl PartialEq for Handle {
    /// Two handles are equal if they reference the same node, or are both invalid.
    fn eq(&self, other: &Self) -> bool {
        self.uid() == other.uid()
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uid() {
            Some(uid) => write!(f, "Handle({uid})"),
            None => f.write_str("Handle(invalid)"),
        }
    }
}
