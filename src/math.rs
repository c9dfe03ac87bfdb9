//! 2D transform composition for render nodes.

use glam::Vec2;

/// Local transform of a render node (relative to its parent)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTransform {
    pub offset: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    /// When false the node ignores its parent's rotation.
    pub inherit_rotation: bool,
}

impl LocalTransform {
    pub fn identity() -> Self {
        Self {
            offset: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
            inherit_rotation: true,
        }
    }

    pub fn with_offset(offset: Vec2) -> Self {
        Self {
            offset,
            ..Self::identity()
        }
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// World-space transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldTransform {
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
}

impl WorldTransform {
    pub fn identity() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation: 0.0,
            scale: Vec2::ONE,
        }
    }

    /// Transform of a hitbox anchor (anchors carry no scale)
    pub fn anchor(position: Vec2, rotation: f32) -> Self {
        Self {
            position,
            rotation,
            scale: Vec2::ONE,
        }
    }

    /// Combine parent world + local child → world child
    ///
    /// The child's offset is scaled and rotated by the parent. Rotation
    /// accumulates unless the child opts out; scale always multiplies.
    pub fn from_local(parent: &WorldTransform, child: &LocalTransform) -> Self {
        let scaled = child.offset * parent.scale;
        let rotated = Vec2::from_angle(parent.rotation).rotate(scaled);
        let rotation = if child.inherit_rotation {
            parent.rotation + child.rotation
        } else {
            child.rotation
        };

        WorldTransform {
            position: parent.position + rotated,
            rotation,
            scale: parent.scale * child.scale,
        }
    }

    /// Map a point in this transform's local space to world space.
    pub fn apply(&self, point: Vec2) -> Vec2 {
        self.position + Vec2::from_angle(self.rotation).rotate(point * self.scale)
    }
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self::identity()
    }
}
