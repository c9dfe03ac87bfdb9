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

//! Component registry
//!
//! A fixed table of component arrays indexed by [`ComponentType`]. Built
//! once at startup; the set of registered types is the wire contract and
//! does not change afterwards.

use crate::bitset::ComponentSet;
use crate::builtin::{Ammo, Health, Sprite, Transform, Turret};
use crate::component::{Component, ComponentType};
use crate::component_array::{ComponentArray, ErasedArray};
use crate::config::RuntimeConfig;
use crate::entity::EntityHandle;
use crate::error::{MirrorError, Result};

/// Builder for [`ComponentRegistry`]
pub struct RegistryBuilder {
    slots: [Option<Box<dyn ErasedArray>>; ComponentType::COUNT],
    disabled: ComponentSet,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            disabled: ComponentSet::empty(),
        }
    }

    /// Register component type `C`. Each type may be registered once.
    pub fn register<C: Component>(mut self) -> Result<Self> {
        let slot = &mut self.slots[C::TYPE.index()];
        if slot.is_some() {
            return Err(MirrorError::DuplicateRegistration(C::TYPE));
        }
        *slot = Some(Box::new(ComponentArray::<C>::new()));
        Ok(self)
    }

    /// Keep `ty` registered for decoding but never instantiate it on this
    /// client. Its fields are always padded.
    pub fn disable(mut self, ty: ComponentType) -> Self {
        self.disabled.insert(ty);
        self
    }

    pub fn build(self) -> ComponentRegistry {
        ComponentRegistry {
            slots: self.slots,
            disabled: self.disabled,
        }
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Table of component arrays, one slot per [`ComponentType`]
pub struct ComponentRegistry {
    slots: [Option<Box<dyn ErasedArray>>; ComponentType::COUNT],
    disabled: ComponentSet,
}

impl ComponentRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Registry with every built-in type, honoring the config's disabled list.
    pub fn with_builtins(config: &RuntimeConfig) -> Result<Self> {
        let mut builder = RegistryBuilder::new()
            .register::<Transform>()?
            .register::<Health>()?
            .register::<Sprite>()?
            .register::<Ammo>()?
            .register::<Turret>()?;
        for &ty in &config.disabled_components {
            builder = builder.disable(ty);
        }
        Ok(builder.build())
    }

    pub fn is_registered(&self, ty: ComponentType) -> bool {
        self.slots[ty.index()].is_some()
    }

    /// Registered and allowed to exist on this client.
    pub fn is_enabled(&self, ty: ComponentType) -> bool {
        self.is_registered(ty) && !self.disabled.contains(ty)
    }

    /// Registered types in wire order
    pub fn registered(&self) -> ComponentSet {
        ComponentType::ALL
            .into_iter()
            .filter(|ty| self.is_registered(*ty))
            .collect()
    }

    pub fn disabled(&self) -> ComponentSet {
        self.disabled
    }

    pub fn array<C: Component>(&self) -> Result<&ComponentArray<C>> {
        self.erased(C::TYPE)?
            .as_any()
            .downcast_ref::<ComponentArray<C>>()
            .ok_or(MirrorError::UnregisteredComponent(C::TYPE))
    }

    pub fn array_mut<C: Component>(&mut self) -> Result<&mut ComponentArray<C>> {
        self.erased_mut(C::TYPE)?
            .as_any_mut()
            .downcast_mut::<ComponentArray<C>>()
            .ok_or(MirrorError::UnregisteredComponent(C::TYPE))
    }

    pub fn erased(&self, ty: ComponentType) -> Result<&dyn ErasedArray> {
        self.slots[ty.index()]
            .as_deref()
            .ok_or(MirrorError::UnregisteredComponent(ty))
    }

    pub fn erased_mut(&mut self, ty: ComponentType) -> Result<&mut dyn ErasedArray> {
        match self.slots[ty.index()].as_deref_mut() {
            Some(array) => Ok(array),
            None => Err(MirrorError::UnregisteredComponent(ty)),
        }
    }

    pub fn has(&self, entity: EntityHandle, ty: ComponentType) -> bool {
        self.slots[ty.index()]
            .as_ref()
            .is_some_and(|array| array.has(entity))
    }

    /// Present and active for `entity`: deltas apply and ticks run.
    pub fn is_active(&self, entity: EntityHandle, ty: ComponentType) -> bool {
        self.slots[ty.index()]
            .as_ref()
            .is_some_and(|array| array.is_active(entity))
    }

    /// Typed access to an entity's component state.
    pub fn get<C: Component>(&self, entity: EntityHandle) -> Result<&C::State> {
        self.array::<C>()?.get(entity)
    }

    pub fn get_mut<C: Component>(&mut self, entity: EntityHandle) -> Result<&mut C::State> {
        self.array_mut::<C>()?.get_mut(entity)
    }

    /// Total live instances across every array
    pub fn instance_count(&self) -> usize {
        self.slots.iter().flatten().map(|array| array.len()).sum()
    }
}
