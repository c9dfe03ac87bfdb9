#![allow(dead_code, unused_imports)]

use entity_mirror::builtin::{
    AmmoParams, HealthParams, SpriteParams, TransformParams, TurretParams,
};
use entity_mirror::prelude::*;
use entity_mirror::NullBackend;
use glam::Vec3;
use std::{fs::File, time::Instant};

#[cfg(feature = "profiling")]
use tracing_subscriber::{self, prelude::*};

fn tank(handle: u32) -> (EntityHandle, Vec<ComponentData>) {
    let x = (handle % 100) as f32;
    let y = (handle / 100) as f32;
    (
        EntityHandle(handle),
        vec![
            ComponentData::new::<Transform>(TransformParams { x, y, rotation: 0.0 }),
            ComponentData::new::<Health>(HealthParams {
                current: 100.0,
                max: 100.0,
                show_bar: true,
            }),
            ComponentData::new::<Sprite>(SpriteParams {
                texture: "tank_body".into(),
                width: 1.0,
                height: 1.0,
                z: 0.0,
                tint: Vec3::ONE,
            }),
            ComponentData::new::<Ammo>(AmmoParams {
                count: 6,
                capacity: 6,
            }),
            ComponentData::new::<Turret>(TurretParams {
                rotation: 0.0,
                barrel_texture: "tank_barrel".into(),
            }),
        ],
    )
}

fn delta(handle: u32, frame: u32) -> Vec<ComponentData> {
    let t = frame as f32 * 0.016;
    vec![
        ComponentData::new::<Transform>(TransformParams {
            x: (handle % 100) as f32 + t,
            y: (handle / 100) as f32,
            rotation: t,
        }),
        ComponentData::new::<Health>(HealthParams {
            current: 100.0 - (frame % 100) as f32,
            max: 100.0,
            show_bar: true,
        }),
        ComponentData::new::<Sprite>(SpriteParams {
            texture: "tank_body".into(),
            width: 1.0,
            height: 1.0,
            z: 0.0,
            tint: Vec3::ONE,
        }),
        ComponentData::new::<Ammo>(AmmoParams {
            count: 6 - frame % 7,
            capacity: 6,
        }),
        ComponentData::new::<Turret>(TurretParams {
            rotation: -t,
            barrel_texture: "tank_barrel".into(),
        }),
    ]
}

#[cfg(feature = "profiling")]
#[tracing::instrument(skip(manager))]
fn profile_frames(manager: &mut EntityManager, count: u32, frames: u32) {
    let mut backend = NullBackend;
    for frame in 0..frames {
        let _span = tracing::info_span!("frame", frame).entered();
        let mut builder = PacketBuilder::new();
        // A quarter of the entities move each frame.
        for handle in (frame % 4..count).step_by(4) {
            builder = builder.delta(EntityHandle(handle), delta(handle, frame));
        }
        let bytes = builder.to_bytes().unwrap();
        manager.process_packet(&bytes).unwrap();
        manager.tick(0.016).unwrap();
        let stats = manager.render(&mut backend);
        if frame % 30 == 0 {
            tracing::info!(frame, composed = stats.composed, quads = stats.quads, "frame");
        }
    }
}

#[cfg(feature = "profiling")]
fn main() {
    // Set up tracing subscriber to write to a file
    let file = File::create("trace.json").unwrap();
    let (non_blocking, _guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .init();

    const COUNT: u32 = 2_000;
    let mut manager = EntityManager::new(RuntimeConfig::default()).unwrap();

    println!("Spawning {COUNT} entities...");
    let start = Instant::now();
    {
        let _span = tracing::info_span!("spawn").entered();
        let mut builder = PacketBuilder::new();
        for handle in 0..COUNT {
            let (entity, components) = tank(handle);
            builder = builder.snapshot(entity, components);
        }
        let bytes = builder.to_bytes().unwrap();
        manager.process_packet(&bytes).unwrap();
    }
    println!("Snapshot applied in: {:?}", start.elapsed());

    println!("Profiling 300 frames of deltas...");
    let start = Instant::now();
    profile_frames(&mut manager, COUNT, 300);
    println!("300 frames complete in: {:?}", start.elapsed());
}

#[cfg(not(feature = "profiling"))]
fn main() {
    println!("profile_sync binary requires --features profiling");
}
