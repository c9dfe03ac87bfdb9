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

//! Render buffer table and the per-frame composition pass
//!
//! All entity buffers are sub-ranges of one global vertex pool. The frame
//! pass visits only dirty buffers, recomposes them and hands their
//! sub-range to the GPU backend.

use ahash::AHashMap;
use rand::rngs::SmallRng;
use rand::SeedableRng;

#[cfg(feature = "profiling")]
use tracing::info_span;

use crate::entity::EntityHandle;
use crate::error::{MirrorError, Result};
use crate::render_buffer::{NodeRange, RenderBuffer, Vertex, INDICES_PER_NODE, VERTICES_PER_NODE};

/// GPU side of the render buffers. Buffer objects and draw calls live
/// behind this trait.
pub trait GpuBackend {
    /// Upload one entity's block into the global vertex/index buffers.
    fn sub_upload(
        &mut self,
        entity: EntityHandle,
        first_vertex: usize,
        vertices: &[Vertex],
        first_index: usize,
        indices: &[u32],
    );
}

/// Backend that drops everything (headless clients, tests)
#[derive(Debug, Default)]
pub struct NullBackend;

impl GpuBackend for NullBackend {
    fn sub_upload(&mut self, _: EntityHandle, _: usize, _: &[Vertex], _: usize, _: &[u32]) {}
}

/// One recorded upload
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub entity: EntityHandle,
    pub first_vertex: usize,
    pub vertices: Vec<Vertex>,
    pub first_index: usize,
    pub indices: Vec<u32>,
}

/// Backend that keeps every upload, for tests and debugging
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub uploads: Vec<Upload>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploads_for(&self, entity: EntityHandle) -> impl Iterator<Item = &Upload> {
        self.uploads.iter().filter(move |u| u.entity == entity)
    }

    pub fn clear(&mut self) {
        self.uploads.clear();
    }
}

impl GpuBackend for RecordingBackend {
    fn sub_upload(
        &mut self,
        entity: EntityHandle,
        first_vertex: usize,
        vertices: &[Vertex],
        first_index: usize,
        indices: &[u32],
    ) {
        self.uploads.push(Upload {
            entity,
            first_vertex,
            vertices: vertices.to_vec(),
            first_index,
            indices: indices.to_vec(),
        });
    }
}

/// First-fit allocator of node slots in the global vertex pool
#[derive(Debug, Clone)]
pub struct NodePool {
    capacity: usize,
    /// Free ranges sorted by start, never adjacent
    free: Vec<NodeRange>,
}

impl NodePool {
    pub fn new(capacity: usize) -> Self {
        let free = if capacity > 0 {
            vec![NodeRange {
                start: 0,
                len: capacity,
            }]
        } else {
            Vec::new()
        };
        Self { capacity, free }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn free_slots(&self) -> usize {
        self.free.iter().map(|r| r.len).sum()
    }

    pub fn allocate(&mut self, len: usize) -> Result<NodeRange> {
        if len == 0 {
            return Ok(NodeRange { start: 0, len: 0 });
        }
        let index = self
            .free
            .iter()
            .position(|r| r.len >= len)
            .ok_or(MirrorError::PoolExhausted {
                requested: len,
                capacity: self.capacity,
            })?;

        let slot = &mut self.free[index];
        let range = NodeRange {
            start: slot.start,
            len,
        };
        slot.start += len;
        slot.len -= len;
        if slot.len == 0 {
            self.free.remove(index);
        }
        Ok(range)
    }

    pub fn release(&mut self, range: NodeRange) {
        if range.len == 0 {
            return;
        }
        let index = self
            .free
            .iter()
            .position(|r| r.start > range.start)
            .unwrap_or(self.free.len());
        self.free.insert(index, range);

        // Merge with the following range, then with the preceding one.
        if index + 1 < self.free.len()
            && self.free[index].start + self.free[index].len == self.free[index + 1].start
        {
            self.free[index].len += self.free[index + 1].len;
            self.free.remove(index + 1);
        }
        if index > 0 && self.free[index - 1].start + self.free[index - 1].len == self.free[index].start
        {
            self.free[index - 1].len += self.free[index].len;
            self.free.remove(index);
        }
    }
}

/// Global table: entity handle → render buffer
#[derive(Debug)]
pub struct RenderBuffers {
    buffers: AHashMap<EntityHandle, RenderBuffer>,
    pool: NodePool,
    /// Ranges freed since the last pass, still holding geometry on the GPU
    released: Vec<(EntityHandle, NodeRange)>,
}

impl RenderBuffers {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            buffers: AHashMap::new(),
            pool: NodePool::new(pool_capacity),
            released: Vec::new(),
        }
    }

    /// Allocate a buffer of `capacity` visual nodes for `entity`.
    pub fn create(&mut self, entity: EntityHandle, capacity: usize) -> Result<&mut RenderBuffer> {
        if let Some(old) = self.buffers.remove(&entity) {
            self.retire(entity, old.range());
        }
        let range = self.pool.allocate(capacity)?;
        Ok(self
            .buffers
            .entry(entity)
            .or_insert_with(|| RenderBuffer::new(entity, range)))
    }

    /// Drop an entity's buffer and return its slots to the pool.
    ///
    /// The slots are cleared on the GPU by the next pass.
    pub fn remove(&mut self, entity: EntityHandle) -> Option<RenderBuffer> {
        let buffer = self.buffers.remove(&entity)?;
        self.retire(entity, buffer.range());
        Some(buffer)
    }

    fn retire(&mut self, entity: EntityHandle, range: NodeRange) {
        self.pool.release(range);
        if range.len > 0 {
            self.released.push((entity, range));
        }
    }

    /// Freed ranges not yet cleared on the GPU
    pub fn pending_releases(&self) -> usize {
        self.released.len()
    }

    pub fn contains(&self, entity: EntityHandle) -> bool {
        self.buffers.contains_key(&entity)
    }

    pub fn get(&self, entity: EntityHandle) -> Result<&RenderBuffer> {
        self.buffers
            .get(&entity)
            .ok_or(MirrorError::EntityNotFound(entity))
    }

    pub fn get_mut(&mut self, entity: EntityHandle) -> Result<&mut RenderBuffer> {
        self.buffers
            .get_mut(&entity)
            .ok_or(MirrorError::EntityNotFound(entity))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn pool(&self) -> &NodePool {
        &self.pool
    }

    pub fn dirty_count(&self) -> usize {
        self.buffers.values().filter(|b| b.is_dirty()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityHandle, &RenderBuffer)> {
        self.buffers.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityHandle, &mut RenderBuffer)> {
        self.buffers.iter_mut()
    }
}

/// Per-frame statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub composed: usize,
    pub skipped: usize,
    pub quads: usize,
    /// Freed ranges overwritten with degenerate quads
    pub released: usize,
}

/// Per-frame composition pass
#[derive(Debug)]
pub struct RenderPass {
    seed: u64,
    frame: u64,
}

impl RenderPass {
    /// `seed` drives shake jitter so frames are reproducible.
    pub fn new(seed: u64) -> Self {
        Self { seed, frame: 0 }
    }

    /// Jitter stream for one entity in the current frame. Independent of
    /// table order and of which other buffers are dirty.
    fn jitter_rng(&self, entity: EntityHandle) -> SmallRng {
        let mixed = self.seed
            ^ u64::from(entity.raw()).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ self.frame.wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
        SmallRng::seed_from_u64(mixed)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Recompose and upload every dirty buffer; clean buffers are skipped.
    pub fn run(&mut self, buffers: &mut RenderBuffers, backend: &mut dyn GpuBackend) -> FrameStats {
        #[cfg(feature = "profiling")]
        let span = info_span!("render_pass", frame = self.frame, entities = buffers.len());
        #[cfg(feature = "profiling")]
        let _guard = span.enter();

        let mut stats = FrameStats::default();

        // Clear freed ranges first; a buffer reusing one uploads over it below.
        for (entity, range) in std::mem::take(&mut buffers.released) {
            let vertices = vec![Vertex::default(); range.len * VERTICES_PER_NODE];
            let indices = vec![range.first_vertex() as u32; range.len * INDICES_PER_NODE];
            backend.sub_upload(
                entity,
                range.first_vertex(),
                &vertices,
                range.first_index(),
                &indices,
            );
            stats.released += 1;
        }

        for (&entity, buffer) in buffers.iter_mut() {
            if !buffer.is_dirty() {
                stats.skipped += 1;
                continue;
            }
            let mut rng = self.jitter_rng(entity);
            stats.quads += buffer.compose(&mut rng);
            stats.composed += 1;

            let range = buffer.range();
            let (vertices, indices) = buffer.full_block();
            backend.sub_upload(
                entity,
                range.first_vertex(),
                vertices,
                range.first_index(),
                indices,
            );
        }

        tracing::trace!(
            frame = self.frame,
            composed = stats.composed,
            skipped = stats.skipped,
            "render pass"
        );
        self.frame += 1;
        stats
    }
}
