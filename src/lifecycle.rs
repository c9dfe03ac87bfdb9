// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Entity lifecycle manager
//!
//! Drives each mirrored entity through
//! `absent → constructing → live → removing → absent` from incoming
//! packets, and exposes the hook entry points the simulation loop uses
//! between packets.

use ahash::AHashMap;
use glam::Vec2;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::bitset::ComponentSet;
use crate::component::{
    BuildContext, Component, ComponentType, Hook, HookContext, NodeHandles, ScratchParams,
};
use crate::config::RuntimeConfig;
use crate::effects::{AssetResolver, EffectSink, LoggingEffects, TableResolver};
use crate::entity::EntityHandle;
use crate::error::{MirrorError, Result};
use crate::event::{EventQueue, LifecycleEvent};
use crate::message::{read_handle, read_type_id, MessageKind};
use crate::packet::PacketReader;
use crate::registry::ComponentRegistry;
use crate::render_buffer::RenderBuffer;
use crate::render_pass::{FrameStats, GpuBackend, RenderBuffers, RenderPass};

/// Where an entity is in its lifecycle. Absent entities have no record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityState {
    Constructing,
    Live,
    Removing,
}

/// Per-entity bookkeeping
#[derive(Clone, Debug)]
pub struct EntityRecord {
    /// Types named in the snapshot. Fixes the entity's delta layout for
    /// its whole life, even after a component is detached.
    pub declared: ComponentSet,
    pub state: EntityState,
}

/// Counters for one processed packet
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketStats {
    pub spawned: usize,
    pub updated: usize,
    pub removed: usize,
    /// Duplicate snapshots and removes for unknown entities
    pub ignored: usize,
}

/// Client-side mirror of server entities
pub struct EntityManager<E: EffectSink = LoggingEffects, A: AssetResolver = TableResolver> {
    config: RuntimeConfig,
    registry: ComponentRegistry,
    buffers: RenderBuffers,
    entities: AHashMap<EntityHandle, EntityRecord>,
    pass: RenderPass,
    events: EventQueue,
    effects: E,
    assets: A,
}

impl EntityManager {
    /// Manager with every built-in component type registered.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let registry = ComponentRegistry::with_builtins(&config)?;
        Ok(Self::with_parts(
            config,
            registry,
            LoggingEffects,
            TableResolver::new(),
        ))
    }
}

impl<E: EffectSink, A: AssetResolver> EntityManager<E, A> {
    pub fn with_parts(config: RuntimeConfig, registry: ComponentRegistry, effects: E, assets: A) -> Self {
        Self {
            buffers: RenderBuffers::new(config.vertex_pool_nodes),
            pass: RenderPass::new(config.shake_seed),
            events: EventQueue::new(),
            entities: AHashMap::new(),
            config,
            registry,
            effects,
            assets,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn effects(&self) -> &E {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut E {
        &mut self.effects
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn buffers(&self) -> &RenderBuffers {
        &self.buffers
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, entity: EntityHandle) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Live entity handles in ascending order
    pub fn entities(&self) -> Vec<EntityHandle> {
        let mut handles: Vec<_> = self.entities.keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn record(&self, entity: EntityHandle) -> Result<&EntityRecord> {
        self.entities
            .get(&entity)
            .ok_or(MirrorError::EntityNotFound(entity))
    }

    /// Whether `entity` currently holds a `ty` instance.
    pub fn has(&self, entity: EntityHandle, ty: ComponentType) -> bool {
        self.contains(entity) && self.registry.has(entity, ty)
    }

    /// Component state; asking for a type the entity does not hold is a
    /// contract violation, never a default.
    pub fn get<C: Component>(&self, entity: EntityHandle) -> Result<&C::State> {
        self.record(entity)?;
        self.registry.get::<C>(entity)
    }

    pub fn get_mut<C: Component>(&mut self, entity: EntityHandle) -> Result<&mut C::State> {
        self.record(entity)?;
        self.registry.get_mut::<C>(entity)
    }

    pub fn buffer(&self, entity: EntityHandle) -> Result<&RenderBuffer> {
        self.buffers.get(entity)
    }

    pub fn buffer_mut(&mut self, entity: EntityHandle) -> Result<&mut RenderBuffer> {
        self.buffers.get_mut(entity)
    }

    /// External physics moved one of the entity's hitboxes.
    pub fn set_anchor(
        &mut self,
        entity: EntityHandle,
        index: usize,
        position: Vec2,
        rotation: f32,
    ) -> Result<()> {
        self.buffers
            .get_mut(entity)?
            .set_anchor(index, position, rotation)
    }

    /// Take pending lifecycle events.
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        self.events.drain().collect()
    }

    /// Decode and apply every message in `bytes`.
    ///
    /// Stops at the first fatal error; messages before it stay applied.
    pub fn process_packet(&mut self, bytes: &[u8]) -> Result<PacketStats> {
        let mut reader = PacketReader::new(bytes);
        let result = self.process_messages(&mut reader);
        match &result {
            Ok(_) if !reader.is_exhausted() => {
                tracing::warn!(
                    trailing = reader.remaining(),
                    "packet has unread bytes after its last message"
                );
            }
            Err(err) => {
                tracing::error!(offset = reader.offset(), kind = ?err.kind(), "packet aborted: {err}");
            }
            Ok(_) => {}
        }
        result
    }

    fn process_messages(&mut self, reader: &mut PacketReader<'_>) -> Result<PacketStats> {
        let mut stats = PacketStats::default();
        let count = reader.read_count("message count")?;
        for _ in 0..count {
            let kind = MessageKind::from_wire(reader.read_count("message kind")?)?;
            let entity = read_handle(reader)?;
            match kind {
                MessageKind::Snapshot => {
                    if self.apply_snapshot(entity, reader)? {
                        stats.spawned += 1;
                    } else {
                        stats.ignored += 1;
                    }
                }
                MessageKind::Delta => {
                    self.apply_delta(entity, reader)?;
                    stats.updated += 1;
                }
                MessageKind::Remove => {
                    let died = reader.read_bool()?;
                    if self.contains(entity) {
                        self.teardown(entity, died)?;
                        stats.removed += 1;
                    } else {
                        tracing::warn!(%entity, "remove for unknown entity");
                        stats.ignored += 1;
                    }
                }
            }
        }
        Ok(stats)
    }

    /// Returns false when a duplicate snapshot was skipped.
    fn apply_snapshot(&mut self, entity: EntityHandle, reader: &mut PacketReader<'_>) -> Result<bool> {
        #[cfg(feature = "profiling")]
        let span = info_span!("snapshot", entity = entity.raw());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let component_count = reader.read_count("component count")?;
        if component_count > ComponentType::COUNT {
            return Err(MirrorError::InvalidNumber {
                what: "component count",
                value: component_count as f64,
            });
        }
        let mut declared = ComponentSet::empty();
        for _ in 0..component_count {
            let ty = read_type_id(reader)?;
            if !self.registry.is_registered(ty) {
                return Err(MirrorError::UnregisteredComponent(ty));
            }
            if !declared.insert(ty) {
                return Err(MirrorError::DuplicateComponent {
                    entity,
                    component: ty,
                });
            }
        }

        if self.entities.contains_key(&entity) {
            if self.config.strict_snapshots {
                return Err(MirrorError::EntityAlreadyLive(entity));
            }
            tracing::warn!(%entity, "snapshot for live entity skipped");
            for ty in declared {
                self.registry.erased(ty)?.pad(reader)?;
            }
            return Ok(false);
        }
        if self.entities.len() >= self.config.max_entities {
            return Err(MirrorError::EntityLimit(self.config.max_entities));
        }

        // Parameters decode in wire order so later types can read earlier ones.
        let mut scratch = ScratchParams::new();
        for ty in declared {
            let array = self.registry.erased(ty)?;
            if self.registry.is_enabled(ty) {
                scratch.insert(ty, array.decode_params(reader)?);
            } else {
                array.pad(reader)?;
            }
        }

        self.entities.insert(
            entity,
            EntityRecord {
                declared,
                state: EntityState::Constructing,
            },
        );
        match self.construct(entity, &scratch) {
            Ok(()) => {
                if let Some(record) = self.entities.get_mut(&entity) {
                    record.state = EntityState::Live;
                }
                tracing::debug!(%entity, components = declared.len(), "entity spawned");
                self.events.push(LifecycleEvent::Spawned(entity));
                Ok(true)
            }
            Err(err) => {
                self.rollback(entity);
                tracing::error!(%entity, "construction failed: {err}");
                self.events.push(LifecycleEvent::ConstructFailed(entity));
                Err(err)
            }
        }
    }

    fn construct(&mut self, entity: EntityHandle, scratch: &ScratchParams) -> Result<()> {
        let mut capacity = 0;
        for ty in scratch.types() {
            let params = scratch
                .get_erased(ty)
                .ok_or(MirrorError::UnregisteredComponent(ty))?;
            capacity += self.registry.erased(ty)?.max_render_nodes(params)?;
        }

        let buffer = self.buffers.create(entity, capacity)?;
        let mut ctx = BuildContext {
            entity,
            buffer,
            scratch,
            assets: &mut self.assets,
        };

        let mut handles: [NodeHandles; ComponentType::COUNT] = Default::default();
        for ty in scratch.types() {
            let params = scratch
                .get_erased(ty)
                .ok_or(MirrorError::UnregisteredComponent(ty))?;
            handles[ty.index()] = self
                .registry
                .erased(ty)?
                .build_render_nodes(params, &mut ctx)?;
        }
        for ty in scratch.types() {
            let params = scratch
                .get_erased(ty)
                .ok_or(MirrorError::UnregisteredComponent(ty))?;
            let nodes = std::mem::take(&mut handles[ty.index()]);
            self.registry
                .erased_mut(ty)?
                .create(entity, params, nodes, &mut ctx)?;
        }

        for ty in scratch.types() {
            self.fire(entity, ty, Hook::Load, 0.0)?;
        }
        for ty in scratch.types() {
            self.fire(entity, ty, Hook::Spawn, 0.0)?;
        }
        Ok(())
    }

    /// Drop whatever a failed construction left behind, without hooks.
    fn rollback(&mut self, entity: EntityHandle) {
        for ty in ComponentType::ALL {
            if let Ok(array) = self.registry.erased_mut(ty) {
                array.remove(entity);
            }
        }
        self.buffers.remove(entity);
        self.entities.remove(&entity);
    }

    fn apply_delta(&mut self, entity: EntityHandle, reader: &mut PacketReader<'_>) -> Result<()> {
        #[cfg(feature = "profiling")]
        let span = info_span!("delta", entity = entity.raw());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let declared = self.record(entity)?.declared;
        {
            let buffer = self.buffers.get_mut(entity)?;
            let mut ctx = HookContext {
                entity,
                buffer,
                effects: &mut self.effects,
                assets: &mut self.assets,
                dt: 0.0,
            };
            for ty in declared {
                self.registry
                    .erased_mut(ty)?
                    .apply_or_skip(entity, reader, &mut ctx)?;
            }
        }
        for ty in declared {
            if self.registry.is_active(entity, ty) {
                self.fire(entity, ty, Hook::Tick, 0.0)?;
            }
        }
        Ok(())
    }

    /// Run one hook on one component of `entity`.
    fn fire(&mut self, entity: EntityHandle, ty: ComponentType, hook: Hook, dt: f32) -> Result<()> {
        let buffer = self.buffers.get_mut(entity)?;
        let mut ctx = HookContext {
            entity,
            buffer,
            effects: &mut self.effects,
            assets: &mut self.assets,
            dt,
        };
        self.registry.erased_mut(ty)?.run_hook(entity, hook, &mut ctx)
    }

    /// Run `hook` on every component the entity holds, in wire order.
    fn fire_all(&mut self, entity: EntityHandle, hook: Hook) -> Result<()> {
        let declared = self.record(entity)?.declared;
        for ty in declared {
            if self.registry.has(entity, ty) {
                self.fire(entity, ty, hook, 0.0)?;
            }
        }
        Ok(())
    }

    /// Remove a live entity. Every hook runs even if an earlier one fails;
    /// the first failure is returned after teardown completes.
    fn teardown(&mut self, entity: EntityHandle, died: bool) -> Result<()> {
        let declared = match self.entities.get_mut(&entity) {
            Some(record) => {
                record.state = EntityState::Removing;
                record.declared
            }
            None => return Err(MirrorError::EntityNotFound(entity)),
        };

        let hook = if died { Hook::Die } else { Hook::Remove };
        let mut first_error = None;
        for ty in declared {
            if !self.registry.has(entity, ty) {
                continue;
            }
            if let Err(err) = self.fire(entity, ty, hook, 0.0) {
                tracing::warn!(%entity, component = %ty, hook = hook.name(), "hook failed during removal: {err}");
                first_error.get_or_insert(err);
            }
        }

        // Dropping the buffer detaches every node and frees its pool slots.
        self.buffers.remove(entity);
        for ty in declared {
            if let Ok(array) = self.registry.erased_mut(ty) {
                array.remove(entity);
            }
        }
        self.entities.remove(&entity);
        tracing::debug!(%entity, died, "entity removed");
        self.events.push(LifecycleEvent::Removed { entity, died });

        first_error.map_or(Ok(()), Err)
    }

    /// Kill a live entity locally, running death hooks.
    pub fn kill(&mut self, entity: EntityHandle) -> Result<()> {
        self.teardown(entity, true)
    }

    /// Remove a live entity locally, running removal hooks.
    pub fn despawn(&mut self, entity: EntityHandle) -> Result<()> {
        self.teardown(entity, false)
    }

    pub fn notify_hit(&mut self, entity: EntityHandle, at: Vec2) -> Result<()> {
        self.fire_all(entity, Hook::Hit(at))
    }

    pub fn notify_collision(&mut self, entity: EntityHandle, other: EntityHandle) -> Result<()> {
        self.fire_all(entity, Hook::Collision(other))
    }

    /// Advance every live entity by `dt` seconds. Inactive components are
    /// skipped.
    pub fn tick(&mut self, dt: f32) -> Result<()> {
        for entity in self.entities() {
            let declared = self.record(entity)?.declared;
            for ty in declared {
                if self.registry.is_active(entity, ty) {
                    self.fire(entity, ty, Hook::Tick, dt)?;
                }
            }
        }
        Ok(())
    }

    /// Toggle whether a component applies deltas and ticks on this client.
    pub fn set_component_active(
        &mut self,
        entity: EntityHandle,
        ty: ComponentType,
        active: bool,
    ) -> Result<()> {
        self.record(entity)?;
        let array = self.registry.erased_mut(ty)?;
        if array.is_active(entity) == active && array.has(entity) {
            return Ok(());
        }
        array.set_active(entity, active)?;
        self.events.push(LifecycleEvent::ActiveChanged {
            entity,
            component: ty,
            active,
        });
        Ok(())
    }

    /// Detach one component from a live entity.
    ///
    /// The type stays declared, so its delta fields are padded from now on.
    pub fn detach_component(&mut self, entity: EntityHandle, ty: ComponentType) -> Result<()> {
        self.record(entity)?;
        if !self.registry.has(entity, ty) {
            return Err(MirrorError::MissingComponent {
                entity,
                component: ty,
            });
        }
        let hook_result = self.fire(entity, ty, Hook::Remove, 0.0);
        self.registry.erased_mut(ty)?.remove(entity);
        self.events
            .push(LifecycleEvent::ComponentDetached(entity, ty));
        hook_result
    }

    /// Compose dirty buffers and upload them.
    pub fn render(&mut self, backend: &mut dyn GpuBackend) -> FrameStats {
        self.pass.run(&mut self.buffers, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{Ammo, AmmoParams, Health, HealthParams, Transform, TransformParams};
    use crate::effects::RecordingEffects;
    use crate::message::{ComponentData, PacketBuilder};

    fn manager() -> EntityManager<RecordingEffects, TableResolver> {
        let config = RuntimeConfig::default();
        let registry = ComponentRegistry::with_builtins(&config).unwrap();
        EntityManager::with_parts(config, registry, RecordingEffects::new(), TableResolver::new())
    }

    fn health(current: f32, show_bar: bool) -> ComponentData {
        ComponentData::new::<Health>(HealthParams {
            current,
            max: 100.0,
            show_bar,
        })
    }

    #[test]
    fn test_snapshot_then_remove() {
        let mut mgr = manager();
        let spawn = PacketBuilder::new()
            .snapshot(EntityHandle(1), vec![health(100.0, false)])
            .to_bytes()
            .unwrap();
        let stats = mgr.process_packet(&spawn).unwrap();
        assert_eq!(stats.spawned, 1);
        assert_eq!(mgr.record(EntityHandle(1)).unwrap().state, EntityState::Live);

        let remove = PacketBuilder::new()
            .remove(EntityHandle(1), true)
            .to_bytes()
            .unwrap();
        mgr.process_packet(&remove).unwrap();
        assert!(!mgr.contains(EntityHandle(1)));
        assert!(!mgr.has(EntityHandle(1), ComponentType::Health));
        assert_eq!(mgr.effects().sounds().count(), 1);
        assert_eq!(
            mgr.drain_events(),
            vec![
                LifecycleEvent::Spawned(EntityHandle(1)),
                LifecycleEvent::Removed {
                    entity: EntityHandle(1),
                    died: true
                }
            ]
        );
    }

    #[test]
    fn test_duplicate_snapshot_padded_unless_strict() {
        let mut mgr = manager();
        let bytes = PacketBuilder::new()
            .snapshot(EntityHandle(2), vec![health(10.0, false)])
            .snapshot(EntityHandle(2), vec![health(99.0, false)])
            .snapshot(EntityHandle(3), vec![health(5.0, false)])
            .to_bytes()
            .unwrap();
        let stats = mgr.process_packet(&bytes).unwrap();
        assert_eq!(stats.spawned, 2);
        assert_eq!(stats.ignored, 1);
        assert_eq!(mgr.get::<Health>(EntityHandle(2)).unwrap().current, 10.0);
        assert_eq!(mgr.get::<Health>(EntityHandle(3)).unwrap().current, 5.0);

        let config = RuntimeConfig {
            strict_snapshots: true,
            ..RuntimeConfig::default()
        };
        let registry = ComponentRegistry::with_builtins(&config).unwrap();
        let mut strict =
            EntityManager::with_parts(config, registry, RecordingEffects::new(), TableResolver::new());
        assert!(matches!(
            strict.process_packet(&bytes),
            Err(MirrorError::EntityAlreadyLive(EntityHandle(2)))
        ));
    }

    #[test]
    fn test_delta_for_unknown_entity_aborts() {
        let mut mgr = manager();
        let bytes = PacketBuilder::new()
            .delta(EntityHandle(8), vec![health(1.0, false)])
            .to_bytes()
            .unwrap();
        let err = mgr.process_packet(&bytes).unwrap_err();
        assert_eq!(err, MirrorError::EntityNotFound(EntityHandle(8)));
    }

    #[test]
    fn test_remove_for_unknown_entity_is_ignored() {
        let mut mgr = manager();
        let bytes = PacketBuilder::new()
            .remove(EntityHandle(8), false)
            .snapshot(EntityHandle(9), vec![health(1.0, false)])
            .to_bytes()
            .unwrap();
        let stats = mgr.process_packet(&bytes).unwrap();
        assert_eq!(stats.ignored, 1);
        assert!(mgr.contains(EntityHandle(9)));
    }

    #[test]
    fn test_failed_construction_rolls_back() {
        let mut mgr = manager();
        // Health wants two bar nodes but the pool only has one slot.
        let config = RuntimeConfig {
            vertex_pool_nodes: 1,
            ..RuntimeConfig::default()
        };
        let registry = ComponentRegistry::with_builtins(&config).unwrap();
        let mut small =
            EntityManager::with_parts(config, registry, RecordingEffects::new(), TableResolver::new());
        let bytes = PacketBuilder::new()
            .snapshot(
                EntityHandle(4),
                vec![
                    health(50.0, true),
                    ComponentData::new::<Transform>(TransformParams::default()),
                ],
            )
            .to_bytes()
            .unwrap();
        assert!(matches!(
            small.process_packet(&bytes),
            Err(MirrorError::PoolExhausted { .. })
        ));
        assert!(!small.contains(EntityHandle(4)));
        assert!(!small.registry().has(EntityHandle(4), ComponentType::Transform));
        assert!(!small.buffers().contains(EntityHandle(4)));

        // Same packet succeeds with room.
        assert_eq!(mgr.process_packet(&bytes).unwrap().spawned, 1);
    }

    #[test]
    fn test_inactive_component_pads_delta() {
        let mut mgr = manager();
        let e = EntityHandle(5);
        let spawn = PacketBuilder::new()
            .snapshot(
                e,
                vec![
                    health(100.0, false),
                    ComponentData::new::<Ammo>(AmmoParams {
                        count: 3,
                        capacity: 6,
                    }),
                ],
            )
            .to_bytes()
            .unwrap();
        mgr.process_packet(&spawn).unwrap();
        mgr.set_component_active(e, ComponentType::Health, false)
            .unwrap();

        let delta = PacketBuilder::new()
            .delta(
                e,
                vec![
                    health(20.0, false),
                    ComponentData::new::<Ammo>(AmmoParams {
                        count: 1,
                        capacity: 6,
                    }),
                ],
            )
            .to_bytes()
            .unwrap();
        mgr.process_packet(&delta).unwrap();
        assert_eq!(mgr.get::<Health>(e).unwrap().current, 100.0);
        assert_eq!(mgr.get::<Ammo>(e).unwrap().count, 1);
    }

    #[test]
    fn test_hooks_reach_effects() {
        let mut mgr = manager();
        let e = EntityHandle(6);
        let spawn = PacketBuilder::new()
            .snapshot(e, vec![health(100.0, false)])
            .to_bytes()
            .unwrap();
        mgr.process_packet(&spawn).unwrap();
        mgr.notify_hit(e, Vec2::new(1.0, 2.0)).unwrap();
        assert_eq!(mgr.effects().particles().count(), 1);
        assert!(matches!(
            mgr.notify_hit(EntityHandle(99), Vec2::ZERO),
            Err(MirrorError::EntityNotFound(_))
        ));

        mgr.kill(e).unwrap();
        assert_eq!(mgr.effects().sounds().count(), 1);
        assert!(mgr.kill(e).is_err());
    }
}
