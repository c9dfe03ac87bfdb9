//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use entity_mirror::prelude::*;
//! ```

pub use crate::builtin::{Ammo, Health, Sprite, Transform, Turret};
pub use crate::component::{Component, ComponentType, Hook};
pub use crate::config::RuntimeConfig;
pub use crate::debug::{Diagnostics, MirrorInspector};
pub use crate::effects::{AssetResolver, EffectSink};
pub use crate::entity::{EntityHandle, NodeId};
pub use crate::error::{MirrorError, Result};
pub use crate::lifecycle::EntityManager;
pub use crate::message::{ComponentData, PacketBuilder};
pub use crate::render_node::{NodeDesc, NodeParent, VisualSource};
pub use crate::render_pass::{GpuBackend, RenderPass};
