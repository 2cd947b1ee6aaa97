//! The scene node trait and the state every node carries.

use crate::context::{ApplyContext, ApplyMode};
use crate::error::Result;
use crate::id::{NodeName, NodeUid};
use crate::list::NodeList;
use crate::repository::RepositoryRef;
use crate::scene::Scene;
use std::any::Any;

/// Identity and naming shared by all nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeBase {
    pub uid: NodeUid,
    pub name: NodeName,
    pub type_name: &'static str,
}

impl NodeBase {
    /// Fresh base with a newly allocated uid.
    pub fn new(type_name: &'static str) -> Self {
        Self {
            uid: NodeUid::next(),
            name: NodeName::unnamed(),
            type_name,
        }
    }

    pub fn named(type_name: &'static str, name: &str) -> Self {
        Self {
            name: NodeName::intern(name),
            ..Self::new(type_name)
        }
    }

    /// Base for a copy: same name and type, new uid.
    pub fn duplicate(&self) -> Self {
        Self {
            uid: NodeUid::next(),
            ..self.clone()
        }
    }
}

/// A node of the scene graph.
///
/// Nodes are created by the caller, handed to
/// [`Repository::insert`](crate::Repository::insert) and from then on only
/// reached through [`Handle`](crate::Handle)s.
pub trait SceneNode: Any {
    fn base(&self) -> &NodeBase;
    fn base_mut(&mut self) -> &mut NodeBase;

    /// Apply the node. Returns `true` if the node needs further animation
    /// frames; errors are reserved for resource exhaustion and cycles.
    fn apply(&mut self, mode: ApplyMode, ctx: &mut ApplyContext) -> Result<bool>;

    /// A copy of this node with a new uid. `None` if the node type cannot be copied.
    fn duplicate(&self) -> Option<Box<dyn SceneNode>> {
        None
    }

    /// Called once the node is owned by a repository.
    fn attached(&mut self, _repo: &RepositoryRef) {}

    fn as_list(&self) -> Option<&NodeList> {
        None
    }

    fn as_list_mut(&mut self) -> Option<&mut NodeList> {
        None
    }

    fn as_scene(&self) -> Option<&Scene> {
        None
    }

    fn as_scene_mut(&mut self) -> Option<&mut Scene> {
        None
    }

    /// Tools win over every other node when a pick is resolved.
    fn is_tool(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn uid(&self) -> NodeUid {
        self.base().uid
    }

    fn name(&self) -> NodeName {
        self.base().name
    }

    fn set_name(&mut self, name: &str) {
        self.base_mut().name = NodeName::intern(name);
    }

    fn type_name(&self) -> &'static str {
        self.base().type_name
    }

    fn is_composite(&self) -> bool {
        self.as_list().is_some()
    }
}

/// Implements the boilerplate accessors of [`SceneNode`] for a struct with a `base` field.
#[macro_export]
macro_rules! node_boilerplate {
    () => {
        fn base(&self) -> &$crate::NodeBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut $crate::NodeBase {
            &mut self.base
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}
