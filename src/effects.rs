//! External collaborators reached from component hooks.
//!
//! Effects are fire-and-forget: hooks never wait on them and never see a
//! failure. Asset lookups return a texture index the GPU backend understands.

use ahash::AHashMap;
use glam::Vec2;

use crate::entity::EntityHandle;
use crate::render_node::TextureRef;

/// Particle and sound output
pub trait EffectSink {
    /// Emit a named particle effect at a world position.
    fn spawn_particles(&mut self, entity: EntityHandle, effect: &str, at: Vec2);

    /// Play a named sound at a world position.
    fn play_sound(&mut self, entity: EntityHandle, sound: &str, at: Vec2);

    /// Get name for debugging
    fn name(&self) -> &str {
        "EffectSink"
    }
}

/// Resolves asset names to texture indices.
pub trait AssetResolver {
    fn resolve(&mut self, name: &str) -> TextureRef;
}

/// Drops every effect.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEffects;

impl EffectSink for NullEffects {
    fn spawn_particles(&mut self, _: EntityHandle, _: &str, _: Vec2) {}

    fn play_sound(&mut self, _: EntityHandle, _: &str, _: Vec2) {}

    fn name(&self) -> &str {
        "NullEffects"
    }
}

/// Reports every effect through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEffects;

impl EffectSink for LoggingEffects {
    fn spawn_particles(&mut self, entity: EntityHandle, effect: &str, at: Vec2) {
        tracing::debug!(%entity, effect, x = at.x, y = at.y, "particles");
    }

    fn play_sound(&mut self, entity: EntityHandle, sound: &str, at: Vec2) {
        tracing::debug!(%entity, sound, x = at.x, y = at.y, "sound");
    }

    fn name(&self) -> &str {
        "LoggingEffects"
    }
}

/// Recorded effect
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Particles {
        entity: EntityHandle,
        name: String,
        at: Vec2,
    },
    Sound {
        entity: EntityHandle,
        name: String,
        at: Vec2,
    },
}

/// Keeps every effect in order of emission.
#[derive(Debug, Default, Clone)]
pub struct RecordingEffects {
    pub effects: Vec<Effect>,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Effect> {
        self.effects
            .iter()
            .filter(|e| matches!(e, Effect::Particles { .. }))
    }

    pub fn sounds(&self) -> impl Iterator<Item = &Effect> {
        self.effects
            .iter()
            .filter(|e| matches!(e, Effect::Sound { .. }))
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }
}

impl EffectSink for RecordingEffects {
    fn spawn_particles(&mut self, entity: EntityHandle, effect: &str, at: Vec2) {
        self.effects.push(Effect::Particles {
            entity,
            name: effect.to_owned(),
            at,
        });
    }

    fn play_sound(&mut self, entity: EntityHandle, sound: &str, at: Vec2) {
        self.effects.push(Effect::Sound {
            entity,
            name: sound.to_owned(),
            at,
        });
    }

    fn name(&self) -> &str {
        "RecordingEffects"
    }
}

/// Hands out texture indices in first-seen order and remembers them.
#[derive(Debug, Default, Clone)]
pub struct TableResolver {
    table: AHashMap<String, TextureRef>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a name with a known index.
    pub fn with(mut self, name: impl Into<String>, texture: TextureRef) -> Self {
        self.table.insert(name.into(), texture);
        self
    }

    pub fn get(&self, name: &str) -> Option<TextureRef> {
        self.table.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl AssetResolver for TableResolver {
    fn resolve(&mut self, name: &str) -> TextureRef {
        if let Some(texture) = self.table.get(name) {
            return *texture;
        }
        let next = self
            .table
            .values()
            .map(|t| t.0 + 1)
            .max()
            .unwrap_or(0);
        let texture = TextureRef(next);
        self.table.insert(name.to_owned(), texture);
        texture
    }
}
