pub mod color;
pub mod context;
pub mod draw;
pub mod error;
pub mod geometry;
pub mod id;
pub mod leaf;
pub mod list;
pub mod node;
pub mod pick;
pub mod repository;
pub mod scene;
pub mod tool;

pub use color::Color;
pub use context::{ApplyContext, ApplyMode, CurrentPick, FrameScope, RenderPass, StackKind, StereoEye};
pub use draw::{DrawCall, DrawSink, Primitive, RecordingSink};
pub use error::{Result, SceneError};
pub use geometry::VertexList;
pub use id::{NodeName, NodeUid};
pub use leaf::{ColorNode, FrameOp, FrameStackNode, FrameTarget};
pub use list::NodeList;
pub use node::{NodeBase, SceneNode};
pub use pick::{PickColor, PickName, PickNames};
pub use repository::{Handle, Repository, RepositoryRef};
pub use scene::{DragChannel, DragRange, DrawFlags, PickOptions, Scene};
pub use tool::{Tool, ToolCallback};
