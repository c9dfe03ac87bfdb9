use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use entity_mirror::render_node::{NodeDesc, NodeParent, TextureRef, VisualSource};
use entity_mirror::{EntityHandle, NullBackend, RenderBuffers, RenderPass};
use glam::{Vec2, Vec3};

const ENTITIES: u32 = 1_000;
const NODES: usize = 12;

fn populated() -> RenderBuffers {
    let mut buffers = RenderBuffers::new(ENTITIES as usize * NODES);
    for raw in 0..ENTITIES {
        let buffer = buffers.create(EntityHandle(raw), NODES).unwrap();
        let pivot = buffer
            .attach(NodeDesc::attach_point().rotation(0.3))
            .unwrap();
        for i in 0..NODES {
            let source = if i % 2 == 0 {
                VisualSource::Texture(TextureRef(i as u32))
            } else {
                VisualSource::Color(Vec3::new(1.0, 0.5, 0.0))
            };
            buffer
                .attach(
                    NodeDesc::visual(source, Vec2::splat(0.5))
                        .parent(NodeParent::Node(pivot))
                        .offset(Vec2::new(i as f32 * 0.1, 0.0))
                        .z_index((i % 3) as f32),
                )
                .unwrap();
        }
    }
    buffers
}

fn compose_all_dirty(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");

    group.bench_function("all_dirty_1k_entities", |b| {
        b.iter_batched(
            populated,
            |mut buffers| {
                let mut pass = RenderPass::new(0);
                pass.run(&mut buffers, &mut NullBackend)
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn compose_few_dirty(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let mut buffers = populated();
    let mut pass = RenderPass::new(0);
    pass.run(&mut buffers, &mut NullBackend);

    group.bench_function("ten_percent_moved", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            for raw in (frame % 10..ENTITIES).step_by(10) {
                buffers
                    .get_mut(EntityHandle(raw))
                    .unwrap()
                    .set_anchor(0, Vec2::new(frame as f32, 0.0), 0.0)
                    .unwrap();
            }
            pass.run(&mut buffers, &mut NullBackend)
        })
    });

    group.finish();
}

criterion_group!(benches, compose_all_dirty, compose_few_dirty);
criterion_main!(benches);
