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

//! Entity Mirror - client-side replica of server-authoritative entities
//!
//! Decodes snapshot/delta/remove packets into typed per-entity components,
//! and lazily composes each entity's render node tree into GPU vertex data.

pub mod bitset;
pub mod builtin;
pub mod component;
pub mod component_array;
pub mod config;
pub mod debug;
pub mod effects;
pub mod entity;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod math;
pub mod message;
pub mod node_tree;
pub mod packet;
pub mod prelude;
pub mod registry;
pub mod render_buffer;
pub mod render_node;
pub mod render_pass;

pub use bitset::*;
pub use component::*;
pub use component_array::*;
pub use config::*;
pub use effects::*;
pub use entity::*;
pub use error::*;
pub use event::*;
pub use lifecycle::*;
pub use math::*;
pub use message::*;
pub use node_tree::*;
pub use packet::*;
pub use registry::*;
pub use render_buffer::*;
pub use render_node::*;
pub use render_pass::*;
