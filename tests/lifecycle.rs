use entity_mirror::builtin::{
    AmmoParams, HealthParams, SpriteParams, TransformParams, TurretParams, EMPTY_PIP_OPACITY,
    MAX_PIPS,
};
use entity_mirror::prelude::*;
use entity_mirror::{
    BuildContext, ComponentRegistry, FieldSink, HookContext, LifecycleEvent, NodeHandles,
    PacketReader, RecordingEffects, TableResolver,
};
use glam::{Vec2, Vec3};

type Manager = EntityManager<RecordingEffects, TableResolver>;

fn manager_with(config: RuntimeConfig) -> Manager {
    let registry = ComponentRegistry::with_builtins(&config).unwrap();
    EntityManager::with_parts(config, registry, RecordingEffects::new(), TableResolver::new())
}

fn manager() -> Manager {
    manager_with(RuntimeConfig::default())
}

fn transform() -> ComponentData {
    ComponentData::new::<Transform>(TransformParams::default())
}

fn health(current: f32, show_bar: bool) -> ComponentData {
    ComponentData::new::<Health>(HealthParams {
        current,
        max: 100.0,
        show_bar,
    })
}

fn sprite() -> ComponentData {
    ComponentData::new::<Sprite>(SpriteParams {
        texture: "tank_body".to_string(),
        width: 2.0,
        height: 1.5,
        z: 0.0,
        tint: Vec3::ONE,
    })
}

fn ammo(count: u32, capacity: u32) -> ComponentData {
    ComponentData::new::<Ammo>(AmmoParams { count, capacity })
}

fn turret() -> ComponentData {
    ComponentData::new::<Turret>(TurretParams {
        rotation: 0.0,
        barrel_texture: "barrel".to_string(),
    })
}

fn send(mgr: &mut Manager, builder: PacketBuilder) -> Result<entity_mirror::PacketStats> {
    mgr.process_packet(&builder.to_bytes().unwrap())
}

#[test]
fn test_remove_is_idempotent_and_handle_reusable() {
    let mut mgr = manager();
    let e = EntityHandle(10);
    let free_before = mgr.buffers().pool().free_slots();

    send(&mut mgr, PacketBuilder::new().snapshot(e, vec![transform(), health(50.0, true)])).unwrap();
    assert!(mgr.buffers().pool().free_slots() < free_before);

    let stats = send(&mut mgr, PacketBuilder::new().remove(e, false).remove(e, false)).unwrap();
    assert_eq!(stats.removed, 1);
    assert_eq!(stats.ignored, 1);
    assert!(!mgr.contains(e));
    assert!(!mgr.has(e, ComponentType::Health));
    assert_eq!(mgr.buffers().pool().free_slots(), free_before);

    // The same handle spawns a fresh entity.
    send(&mut mgr, PacketBuilder::new().snapshot(e, vec![health(80.0, false)])).unwrap();
    assert_eq!(mgr.get::<Health>(e).unwrap().current, 80.0);
    assert!(!mgr.has(e, ComponentType::Transform));

    let events = mgr.drain_events();
    assert_eq!(
        events,
        vec![
            LifecycleEvent::Spawned(e),
            LifecycleEvent::Removed {
                entity: e,
                died: false
            },
            LifecycleEvent::Spawned(e),
        ]
    );
}

#[test]
fn test_duplicate_snapshot_keeps_first_instance() {
    let mut mgr = manager();
    let e = EntityHandle(4);
    let stats = send(
        &mut mgr,
        PacketBuilder::new()
            .snapshot(e, vec![health(30.0, false)])
            .snapshot(e, vec![health(90.0, false)])
            .delta(e, vec![health(35.0, false)]),
    )
    .unwrap();
    assert_eq!(stats.spawned, 1);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.updated, 1);
    assert_eq!(mgr.get::<Health>(e).unwrap().current, 35.0);
    assert_eq!(mgr.registry().instance_count(), 1);
}

#[test]
fn test_death_runs_die_hooks() {
    let mut mgr = manager();
    let e = EntityHandle(5);
    send(&mut mgr, PacketBuilder::new().snapshot(e, vec![transform(), health(1.0, true)])).unwrap();
    send(&mut mgr, PacketBuilder::new().remove(e, true)).unwrap();
    assert_eq!(mgr.effects().sounds().count(), 1);
    assert!(mgr.is_empty());
}

#[test]
fn test_disabled_component_is_padded() {
    let config = RuntimeConfig::from_json_str(r#"{ "disabled_components": ["sprite"] }"#).unwrap();
    let mut mgr = manager_with(config);
    let e = EntityHandle(6);

    send(
        &mut mgr,
        PacketBuilder::new().snapshot(e, vec![transform(), health(100.0, false), sprite(), ammo(3, 6)]),
    )
    .unwrap();
    assert!(!mgr.has(e, ComponentType::Sprite));
    assert!(mgr.has(e, ComponentType::Ammo));
    assert_eq!(mgr.buffer(e).unwrap().capacity(), 0);

    // Ammo follows the skipped sprite fields on the wire.
    send(
        &mut mgr,
        PacketBuilder::new().delta(e, vec![transform(), health(70.0, false), sprite(), ammo(1, 6)]),
    )
    .unwrap();
    assert_eq!(mgr.get::<Health>(e).unwrap().current, 70.0);
    assert_eq!(mgr.get::<Ammo>(e).unwrap().count, 1);
}

#[test]
fn test_detached_component_keeps_delta_layout() {
    let mut mgr = manager();
    let e = EntityHandle(7);
    send(
        &mut mgr,
        PacketBuilder::new().snapshot(e, vec![transform(), health(100.0, true), sprite(), ammo(2, 2)]),
    )
    .unwrap();
    assert_eq!(mgr.buffer(e).unwrap().capacity(), 3);
    assert_eq!(mgr.buffer(e).unwrap().visual_count(), 3);

    mgr.detach_component(e, ComponentType::Sprite).unwrap();
    assert_eq!(mgr.buffer(e).unwrap().visual_count(), 2);
    assert!(matches!(
        mgr.get::<Sprite>(e),
        Err(MirrorError::MissingComponent { .. })
    ));
    assert!(mgr.detach_component(e, ComponentType::Sprite).is_err());

    send(
        &mut mgr,
        PacketBuilder::new().delta(e, vec![transform(), health(20.0, true), sprite(), ammo(0, 2)]),
    )
    .unwrap();
    assert_eq!(mgr.get::<Health>(e).unwrap().current, 20.0);
    assert_eq!(mgr.get::<Ammo>(e).unwrap().count, 0);
}

#[test]
fn test_inactive_component_skips_delta_and_tick() {
    let mut mgr = manager();
    let e = EntityHandle(8);
    send(&mut mgr, PacketBuilder::new().snapshot(e, vec![health(100.0, false), ammo(4, 4)])).unwrap();
    mgr.set_component_active(e, ComponentType::Health, false).unwrap();

    send(&mut mgr, PacketBuilder::new().delta(e, vec![health(10.0, false), ammo(2, 4)])).unwrap();
    assert_eq!(mgr.get::<Health>(e).unwrap().current, 100.0);
    assert_eq!(mgr.get::<Ammo>(e).unwrap().count, 2);

    mgr.set_component_active(e, ComponentType::Health, true).unwrap();
    send(&mut mgr, PacketBuilder::new().delta(e, vec![health(10.0, false), ammo(2, 4)])).unwrap();
    assert_eq!(mgr.get::<Health>(e).unwrap().current, 10.0);
}

#[test]
fn test_turret_pips_follow_ammo() {
    let mut mgr = manager();
    let e = EntityHandle(9);
    send(
        &mut mgr,
        PacketBuilder::new().snapshot(e, vec![transform(), ammo(2, 4), turret()]),
    )
    .unwrap();

    let pips = mgr.get::<Turret>(e).unwrap().pips.clone();
    assert_eq!(pips.len(), 4);

    mgr.tick(0.016).unwrap();
    let buffer = mgr.buffer(e).unwrap();
    let opacities: Vec<f32> = pips
        .iter()
        .map(|&pip| buffer.node(pip).unwrap().attributes().opacity)
        .collect();
    assert_eq!(opacities, vec![1.0, 1.0, EMPTY_PIP_OPACITY, EMPTY_PIP_OPACITY]);

    // Barrel and pivot plus one pip per round, capped.
    let big = EntityHandle(11);
    send(
        &mut mgr,
        PacketBuilder::new().snapshot(big, vec![ammo(20, 20), turret()]),
    )
    .unwrap();
    assert_eq!(mgr.get::<Turret>(big).unwrap().pips.len(), MAX_PIPS);
    assert_eq!(mgr.buffer(big).unwrap().visual_count(), 1 + MAX_PIPS);
}

#[test]
fn test_collision_shakes_turret() {
    let mut mgr = manager();
    let e = EntityHandle(12);
    send(&mut mgr, PacketBuilder::new().snapshot(e, vec![turret()])).unwrap();
    assert_eq!(mgr.get::<Turret>(e).unwrap().shake, 0.0);

    mgr.notify_collision(e, EntityHandle(13)).unwrap();
    let shake = mgr.get::<Turret>(e).unwrap().shake;
    assert!(shake > 0.0);

    mgr.tick(0.1).unwrap();
    assert!(mgr.get::<Turret>(e).unwrap().shake < shake);
}

#[test]
fn test_entity_limit() {
    let config = RuntimeConfig {
        max_entities: 1,
        ..RuntimeConfig::default()
    };
    let mut mgr = manager_with(config);
    send(&mut mgr, PacketBuilder::new().snapshot(EntityHandle(1), vec![transform()])).unwrap();
    let err = send(&mut mgr, PacketBuilder::new().snapshot(EntityHandle(2), vec![transform()]))
        .unwrap_err();
    assert_eq!(err, MirrorError::EntityLimit(1));
}

/// Declares one node, then attaches as many as its params ask for.
struct Greedy;

impl Component for Greedy {
    const TYPE: ComponentType = ComponentType::Sprite;
    type Params = u32;
    type State = ();

    fn decode_params(reader: &mut PacketReader<'_>) -> Result<u32> {
        Ok(reader.read_count("greedy nodes")? as u32)
    }

    fn encode_params<W: FieldSink + ?Sized>(params: &u32, out: &mut W) -> Result<()> {
        out.write_number(f64::from(*params))
    }

    fn pad(reader: &mut PacketReader<'_>) -> Result<()> {
        reader.pad_numbers(1)
    }

    fn max_render_nodes(_params: &u32) -> usize {
        1
    }

    fn build_render_nodes(ctx: &mut BuildContext<'_>, params: &u32) -> Result<NodeHandles> {
        let mut nodes = NodeHandles::new();
        for _ in 0..*params {
            nodes.push(ctx.attach(NodeDesc::visual(VisualSource::Color(Vec3::ONE), Vec2::ONE))?);
        }
        Ok(nodes)
    }

    fn construct(_ctx: &mut BuildContext<'_>, _params: &u32, _nodes: NodeHandles) -> Result<()> {
        Ok(())
    }

    fn update_from_data(
        _state: &mut (),
        reader: &mut PacketReader<'_>,
        _ctx: &mut HookContext<'_>,
    ) -> Result<()> {
        reader.pad_numbers(1)
    }
}

fn greedy_manager() -> Manager {
    let registry = ComponentRegistry::builder()
        .register::<Transform>()
        .unwrap()
        .register::<Greedy>()
        .unwrap()
        .build();
    EntityManager::with_parts(
        RuntimeConfig::default(),
        registry,
        RecordingEffects::new(),
        TableResolver::new(),
    )
}

#[test]
fn test_capacity_overrun_rolls_back_and_aborts_packet() {
    let mut mgr = greedy_manager();
    let free_before = mgr.buffers().pool().free_slots();

    let err = send(
        &mut mgr,
        PacketBuilder::new()
            .snapshot(EntityHandle(1), vec![ComponentData::new::<Greedy>(1)])
            .snapshot(EntityHandle(2), vec![ComponentData::new::<Greedy>(3)])
            .snapshot(EntityHandle(3), vec![ComponentData::new::<Greedy>(1)]),
    )
    .unwrap_err();
    assert_eq!(
        err,
        MirrorError::CapacityExceeded {
            entity: EntityHandle(2),
            capacity: 1,
        }
    );
    assert!(err.is_fatal());

    // Messages before the failure stay applied; nothing after it runs.
    assert!(mgr.contains(EntityHandle(1)));
    assert!(!mgr.contains(EntityHandle(2)));
    assert!(!mgr.contains(EntityHandle(3)));
    assert_eq!(mgr.buffers().pool().free_slots(), free_before - 1);
    assert!(mgr
        .drain_events()
        .contains(&LifecycleEvent::ConstructFailed(EntityHandle(2))));
}

#[test]
fn test_unregistered_type_rejected() {
    let mut mgr = greedy_manager();
    let err = send(
        &mut mgr,
        PacketBuilder::new().snapshot(EntityHandle(1), vec![health(1.0, false)]),
    )
    .unwrap_err();
    assert_eq!(err, MirrorError::UnregisteredComponent(ComponentType::Health));
    assert!(mgr.is_empty());
}
