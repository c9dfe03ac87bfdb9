//! Render node types
//!
//! A node is either a visual quad (textured or flat colored) or an attach
//! point that only carries a transform. Nodes hang off a hitbox anchor or
//! off another node of the same entity.

use glam::{Vec2, Vec3};
use smallvec::SmallVec;

use crate::entity::NodeId;
use crate::math::{LocalTransform, WorldTransform};

/// Opaque texture index handed out by the asset resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureRef(pub u32);

/// What a visual node paints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VisualSource {
    Texture(TextureRef),
    Color(Vec3),
}

impl VisualSource {
    /// Pack for the vertex stream: (reference, is_color flag).
    pub(crate) fn encode(&self) -> (u32, u32) {
        match *self {
            VisualSource::Texture(TextureRef(index)) => (index, 0),
            VisualSource::Color(rgb) => {
                let c = (rgb.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
                ((c.x as u32) << 16 | (c.y as u32) << 8 | c.z as u32, 1)
            }
        }
    }
}

/// Node variant
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    /// Painted quad of `size` world units centered on the node origin
    Visual { source: VisualSource, size: Vec2 },
    /// Transform-only pivot used to move several visuals together
    AttachPoint,
}

impl NodeKind {
    pub fn is_visual(&self) -> bool {
        matches!(self, NodeKind::Visual { .. })
    }
}

/// Where a node is rooted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeParent {
    /// Index of a physics hitbox anchor on the entity
    Hitbox(usize),
    Node(NodeId),
}

/// Mutable paint and transform attributes of a node.
///
/// Obtained through `RenderBuffer::edit`, which marks the buffer dirty.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeAttributes {
    pub transform: LocalTransform,
    pub opacity: f32,
    pub tint: Vec3,
    /// Jitter magnitude applied at composition time, in world units
    pub shake: f32,
}

impl Default for NodeAttributes {
    fn default() -> Self {
        Self {
            transform: LocalTransform::identity(),
            opacity: 1.0,
            tint: Vec3::ONE,
            shake: 0.0,
        }
    }
}

/// Tags used for cross-component lookup
pub type Tags = SmallVec<[String; 2]>;

/// Everything needed to attach a new node.
#[derive(Clone, Debug)]
pub struct NodeDesc {
    pub kind: NodeKind,
    pub parent: NodeParent,
    pub z_index: f32,
    pub attributes: NodeAttributes,
    pub tags: Tags,
}

impl NodeDesc {
    pub fn visual(source: VisualSource, size: Vec2) -> Self {
        Self {
            kind: NodeKind::Visual { source, size },
            parent: NodeParent::Hitbox(0),
            z_index: 0.0,
            attributes: NodeAttributes::default(),
            tags: Tags::new(),
        }
    }

    pub fn attach_point() -> Self {
        Self {
            kind: NodeKind::AttachPoint,
            ..Self::visual(VisualSource::Color(Vec3::ONE), Vec2::ZERO)
        }
    }

    pub fn parent(mut self, parent: NodeParent) -> Self {
        self.parent = parent;
        self
    }

    pub fn z_index(mut self, z_index: f32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn offset(mut self, offset: Vec2) -> Self {
        self.attributes.transform.offset = offset;
        self
    }

    pub fn rotation(mut self, rotation: f32) -> Self {
        self.attributes.transform.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec2) -> Self {
        self.attributes.transform.scale = scale;
        self
    }

    pub fn inherit_rotation(mut self, inherit: bool) -> Self {
        self.attributes.transform.inherit_rotation = inherit;
        self
    }

    pub fn tint(mut self, tint: Vec3) -> Self {
        self.attributes.tint = tint;
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.attributes.opacity = opacity;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Render node stored in an entity's node tree
#[derive(Clone, Debug)]
pub struct RenderNode {
    pub(crate) kind: NodeKind,
    pub(crate) parent: NodeParent,
    pub(crate) children: SmallVec<[NodeId; 4]>,
    pub(crate) z_index: f32,
    pub(crate) attributes: NodeAttributes,
    pub(crate) tags: Tags,
    /// Last composed world transform
    pub(crate) world: WorldTransform,
}

impl RenderNode {
    pub(crate) fn from_desc(desc: NodeDesc) -> Self {
        Self {
            kind: desc.kind,
            parent: desc.parent,
            children: SmallVec::new(),
            z_index: desc.z_index,
            attributes: desc.attributes,
            tags: desc.tags,
            world: WorldTransform::identity(),
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> NodeParent {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn z_index(&self) -> f32 {
        self.z_index
    }

    pub fn attributes(&self) -> &NodeAttributes {
        &self.attributes
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// World transform as of the last composition pass
    pub fn world_transform(&self) -> WorldTransform {
        self.world
    }
}
