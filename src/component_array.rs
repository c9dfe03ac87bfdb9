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

//! Component arrays
//!
//! One sparse array per component type: entity handle → instance plus an
//! active flag. Inactive instances still exist but are skipped for deltas
//! (their fields are padded) and ticks.

use std::any::Any;
use std::marker::PhantomData;

use ahash::AHashMap;

use crate::component::{BuildContext, Component, ComponentType, Hook, HookContext, NodeHandles};
use crate::entity::EntityHandle;
use crate::error::{MirrorError, Result};
use crate::packet::PacketReader;

/// Stored instance
#[derive(Debug)]
pub struct Instance<S> {
    pub state: S,
    pub active: bool,
}

/// Sparse per-type store
pub struct ComponentArray<C: Component> {
    instances: AHashMap<EntityHandle, Instance<C::State>>,
    _marker: PhantomData<C>,
}

impl<C: Component> ComponentArray<C> {
    pub fn new() -> Self {
        Self {
            instances: AHashMap::new(),
            _marker: PhantomData,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        C::TYPE
    }

    pub fn has(&self, entity: EntityHandle) -> bool {
        self.instances.contains_key(&entity)
    }

    /// Fails with `MissingComponent` when the entity has no instance.
    pub fn get(&self, entity: EntityHandle) -> Result<&C::State> {
        self.instances
            .get(&entity)
            .map(|instance| &instance.state)
            .ok_or(MirrorError::MissingComponent {
                entity,
                component: C::TYPE,
            })
    }

    pub fn get_mut(&mut self, entity: EntityHandle) -> Result<&mut C::State> {
        self.instances
            .get_mut(&entity)
            .map(|instance| &mut instance.state)
            .ok_or(MirrorError::MissingComponent {
                entity,
                component: C::TYPE,
            })
    }

    /// Construct a live instance from decoded parameters.
    pub fn create(
        &mut self,
        entity: EntityHandle,
        params: &C::Params,
        nodes: NodeHandles,
        ctx: &mut BuildContext<'_>,
    ) -> Result<()> {
        if self.has(entity) {
            return Err(MirrorError::DuplicateComponent {
                entity,
                component: C::TYPE,
            });
        }
        let state = C::construct(ctx, params, nodes)?;
        self.insert(entity, state)
    }

    /// Store an already-built state.
    pub fn insert(&mut self, entity: EntityHandle, state: C::State) -> Result<()> {
        if self.has(entity) {
            return Err(MirrorError::DuplicateComponent {
                entity,
                component: C::TYPE,
            });
        }
        self.instances.insert(
            entity,
            Instance {
                state,
                active: true,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, entity: EntityHandle) -> Option<C::State> {
        self.instances.remove(&entity).map(|instance| instance.state)
    }

    pub fn set_active(&mut self, entity: EntityHandle, active: bool) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&entity)
            .ok_or(MirrorError::MissingComponent {
                entity,
                component: C::TYPE,
            })?;
        instance.active = active;
        Ok(())
    }

    /// Present and active: deltas apply, ticks run.
    pub fn is_active(&self, entity: EntityHandle) -> bool {
        self.instances
            .get(&entity)
            .is_some_and(|instance| instance.active)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityHandle, &Instance<C::State>)> {
        self.instances.iter().map(|(entity, instance)| (*entity, instance))
    }

    /// Apply a delta if the instance is active, otherwise skip its fields.
    pub fn apply_or_skip(
        &mut self,
        entity: EntityHandle,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<bool> {
        match self.instances.get_mut(&entity) {
            Some(instance) if instance.active => {
                C::update_from_data(&mut instance.state, reader, ctx)?;
                Ok(true)
            }
            _ => {
                C::pad(reader)?;
                Ok(false)
            }
        }
    }

    /// Run `hook` on the entity's instance.
    ///
    /// `Tick` is only delivered to active instances; every other hook runs
    /// regardless of the active flag.
    pub fn run_hook(
        &mut self,
        entity: EntityHandle,
        hook: Hook,
        ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        let instance = self
            .instances
            .get_mut(&entity)
            .ok_or(MirrorError::MissingComponent {
                entity,
                component: C::TYPE,
            })?;
        if matches!(hook, Hook::Tick) && !instance.active {
            return Ok(());
        }
        C::dispatch(&mut instance.state, ctx, hook)
    }
}

impl<C: Component> Default for ComponentArray<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased face of a [`ComponentArray`], stored in the registry table.
pub trait ErasedArray {
    fn component_type(&self) -> ComponentType;
    fn decode_params(&self, reader: &mut PacketReader<'_>) -> Result<Box<dyn Any>>;
    fn pad(&self, reader: &mut PacketReader<'_>) -> Result<()>;
    fn max_render_nodes(&self, params: &dyn Any) -> Result<usize>;
    fn build_render_nodes(
        &self,
        params: &dyn Any,
        ctx: &mut BuildContext<'_>,
    ) -> Result<NodeHandles>;
    fn create(
        &mut self,
        entity: EntityHandle,
        params: &dyn Any,
        nodes: NodeHandles,
        ctx: &mut BuildContext<'_>,
    ) -> Result<()>;
    fn has(&self, entity: EntityHandle) -> bool;
    fn is_active(&self, entity: EntityHandle) -> bool;
    fn set_active(&mut self, entity: EntityHandle, active: bool) -> Result<()>;
    fn remove(&mut self, entity: EntityHandle) -> bool;
    fn apply_or_skip(
        &mut self,
        entity: EntityHandle,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<bool>;
    fn run_hook(&mut self, entity: EntityHandle, hook: Hook, ctx: &mut HookContext<'_>)
        -> Result<()>;
    fn len(&self) -> usize;
    fn describe(&self, entity: EntityHandle) -> Option<String>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn downcast_params<C: Component>(params: &dyn Any) -> Result<&C::Params> {
    params
        .downcast_ref::<C::Params>()
        .ok_or(MirrorError::UnregisteredComponent(C::TYPE))
}

impl<C: Component> ErasedArray for ComponentArray<C> {
    fn component_type(&self) -> ComponentType {
        C::TYPE
    }

    fn decode_params(&self, reader: &mut PacketReader<'_>) -> Result<Box<dyn Any>> {
        Ok(Box::new(C::decode_params(reader)?))
    }

    fn pad(&self, reader: &mut PacketReader<'_>) -> Result<()> {
        C::pad(reader)
    }

    fn max_render_nodes(&self, params: &dyn Any) -> Result<usize> {
        Ok(C::max_render_nodes(downcast_params::<C>(params)?))
    }

    fn build_render_nodes(
        &self,
        params: &dyn Any,
        ctx: &mut BuildContext<'_>,
    ) -> Result<NodeHandles> {
        C::build_render_nodes(ctx, downcast_params::<C>(params)?)
    }

    fn create(
        &mut self,
        entity: EntityHandle,
        params: &dyn Any,
        nodes: NodeHandles,
        ctx: &mut BuildContext<'_>,
    ) -> Result<()> {
        ComponentArray::create(self, entity, downcast_params::<C>(params)?, nodes, ctx)
    }

    fn has(&self, entity: EntityHandle) -> bool {
        ComponentArray::has(self, entity)
    }

    fn is_active(&self, entity: EntityHandle) -> bool {
        ComponentArray::is_active(self, entity)
    }

    fn set_active(&mut self, entity: EntityHandle, active: bool) -> Result<()> {
        ComponentArray::set_active(self, entity, active)
    }

    fn remove(&mut self, entity: EntityHandle) -> bool {
        ComponentArray::remove(self, entity).is_some()
    }

    fn apply_or_skip(
        &mut self,
        entity: EntityHandle,
        reader: &mut PacketReader<'_>,
        ctx: &mut HookContext<'_>,
    ) -> Result<bool> {
        ComponentArray::apply_or_skip(self, entity, reader, ctx)
    }

    fn run_hook(
        &mut self,
        entity: EntityHandle,
        hook: Hook,
        ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        ComponentArray::run_hook(self, entity, hook, ctx)
    }

    fn len(&self) -> usize {
        ComponentArray::len(self)
    }

    fn describe(&self, entity: EntityHandle) -> Option<String> {
        self.instances.get(&entity).map(|instance| {
            format!(
                "{}{}: {:?}",
                C::TYPE,
                if instance.active { "" } else { " (inactive)" },
                instance.state
            )
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
