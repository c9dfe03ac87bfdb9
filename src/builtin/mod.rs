// Built-in component types, in wire order

pub mod ammo;
pub mod health;
pub mod sprite;
pub mod transform;
pub mod turret;

pub use ammo::{Ammo, AmmoParams, AmmoState, EMPTY_PIP_OPACITY, PIP_TAG};
pub use health::{Health, HealthBar, HealthParams, HealthState};
pub use sprite::{Sprite, SpriteParams, SpriteState};
pub use transform::{Transform, TransformParams, TransformState};
pub use turret::{Turret, TurretParams, TurretState, MAX_PIPS};
