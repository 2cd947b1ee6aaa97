pub mod config;
pub mod input;
pub mod requests;
pub mod view;

pub use config::{ConfigError, ViewConfig};
pub use input::{InputEvent, MouseButton, MouseEvent, MouseTranslator, drag_channel};
pub use requests::{VisChannel, VisRequest};
pub use view::{PickEvent, View, ViewError};
