//! # Scenario Tests
//!
//! End-to-end behavior of the engine on small, hand-built projects.

use bindery_core::connector::SyncContext;
use bindery_core::geometry::build::{add_box, add_polygon};
use bindery_core::semantic::InstanceTransform;
use bindery_core::{
    BindingId, ConnectionState, DescriptiveBinding, DescriptiveKind, ElementId, EntityId,
    Exchange, ExchangeConfig, FsAssetImporter, GeometricReference, GeometryEventKind,
    GeometryId, GeometryKind, GeometryModel, InstanceType, ManualScheduler, ModelId, NetworkGraph,
    NetworkMirror, PlanarMeasurements, SemanticGraph, Vec3, WarningLog, evaluate,
};
use std::time::Duration;

const GEOMETRY: ModelId = ModelId(1);
const PIPING: ModelId = ModelId(2);

// =============================================================================
// HELPERS
// =============================================================================

/// Graphs and collaborators for driving bindings without an exchange.
struct Bench {
    semantic: SemanticGraph,
    model: GeometryModel,
    config: ExchangeConfig,
    scheduler: ManualScheduler,
    warnings: WarningLog,
    importer: FsAssetImporter,
}

impl Bench {
    fn new(model: ModelId, config: ExchangeConfig) -> Self {
        Self {
            semantic: SemanticGraph::new(),
            model: GeometryModel::new(model, "bench"),
            config,
            scheduler: ManualScheduler::new(),
            warnings: WarningLog::new(),
            importer: FsAssetImporter::new(None, &[]),
        }
    }

    fn cx(&mut self) -> SyncContext<'_> {
        SyncContext {
            semantic: &mut self.semantic,
            model: &mut self.model,
            measurements: &PlanarMeasurements,
            importer: &self.importer,
            config: &self.config,
            scheduler: &mut self.scheduler,
            warnings: &mut self.warnings,
        }
    }
}

fn rectangle(width: f64, height: f64) -> [Vec3; 4] {
    [
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(width, 0.0, 0.0),
        Vec3::new(width, 0.0, height),
        Vec3::new(0.0, 0.0, height),
    ]
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("parameter present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// =============================================================================
// SCENARIO 1: FACE PARAMETERS
// =============================================================================

#[test]
fn face_binding_derives_area_and_extents() {
    let mut exchange = Exchange::new(ExchangeConfig::default()).expect("exchange");
    let mut model = GeometryModel::new(GEOMETRY, "walls");
    let face = add_polygon(&mut model, "north wall", &rectangle(4.0, 3.0)).expect("face");
    exchange.add_model(model).expect("model");
    let wall = exchange
        .semantic_mut()
        .add_component("north wall", InstanceType::Surface, None)
        .expect("component");

    let state = exchange
        .connect(wall, GeometricReference::new(GEOMETRY, face))
        .expect("connect");

    assert!(state.is_empty());
    let semantic = exchange.semantic();
    assert_close(semantic.parameter_value(wall, "area"), 12.0);
    assert_close(semantic.parameter_value(wall, "area_min"), 12.0);
    assert_close(semantic.parameter_value(wall, "area_max"), 12.0);
    assert_close(semantic.parameter_value(wall, "width"), 4.0);
    assert_close(semantic.parameter_value(wall, "height"), 3.0);
}

// =============================================================================
// SCENARIO 2: NODE DELETION
// =============================================================================

#[test]
fn deleting_a_node_removes_its_polylines_first() {
    let mut bench = Bench::new(PIPING, ExchangeConfig::default());
    let mut network = NetworkGraph::new("heating");
    let root = network.root();
    let a = network.add_node(root, "boiler", Vec3::ZERO).expect("a");
    let b = network.add_node(root, "valve", Vec3::new(1.0, 0.0, 0.0)).expect("b");
    let c = network.add_node(root, "radiator", Vec3::new(2.0, 0.0, 0.0)).expect("c");
    let ab = network.add_edge(root, "supply", a, b).expect("ab");
    let bc = network.add_edge(root, "branch", b, c).expect("bc");
    network.add_edge(root, "bypass", a, c).expect("ac");
    let mut mirror = NetworkMirror::new(PIPING, network);
    mirror.update(&mut bench.cx()).expect("update");

    let primitive = |element: ElementId| {
        mirror
            .binding_for_element(element)
            .expect("binding")
            .primitive()
    };
    let (polyline_ab, polyline_bc, vertex_b) = (primitive(ab), primitive(bc), primitive(b));
    bench.model.take_events();

    mirror.network_mut().delete(b).expect("delete");
    mirror.update(&mut bench.cx()).expect("update");

    let removed: Vec<_> = bench
        .model
        .take_events()
        .into_iter()
        .filter_map(|event| match event.kind {
            GeometryEventKind::Removed(ids) => Some(ids),
            _ => None,
        })
        .flatten()
        .collect();
    let position = |id: GeometryId| removed.iter().position(|r| *r == id).expect("removed");
    assert!(position(polyline_ab) < position(vertex_b));
    assert!(position(polyline_bc) < position(vertex_b));
    for id in [polyline_ab, polyline_bc, vertex_b] {
        assert!(!bench.model.contains(id));
    }
    assert_eq!(bench.model.ids_of_kind(GeometryKind::Polyline).len(), 1);
    assert_eq!(mirror.bindings().len(), 3);
}

// =============================================================================
// SCENARIO 3: DEBOUNCED UPDATES
// =============================================================================

#[test]
fn rapid_requests_apply_once_with_the_latest_primitive() {
    let config = ExchangeConfig {
        enable_async_updates: true,
        update_delay_ms: 1000,
        ..ExchangeConfig::default()
    };
    let delay = config.update_delay();
    let mut bench = Bench::new(GEOMETRY, config);
    let first = add_polygon(&mut bench.model, "first", &rectangle(2.0, 2.0)).expect("first");
    let second = add_polygon(&mut bench.model, "second", &rectangle(5.0, 2.0)).expect("second");
    let wall = bench
        .semantic
        .add_component("wall", InstanceType::Surface, None)
        .expect("component");
    let mut binding = DescriptiveBinding::new(
        BindingId(1),
        DescriptiveKind::Face,
        wall,
        bench.model.reference(first),
    );

    binding
        .request_parameter_update(&mut bench.cx(), first)
        .expect("first request");
    assert!(bench.scheduler.advance(delay / 2).is_empty());
    binding
        .request_parameter_update(&mut bench.cx(), second)
        .expect("second request");

    // The first deadline has passed; the restarted timer has not.
    assert!(bench.scheduler.advance(delay * 3 / 4).is_empty());
    assert_eq!(binding.applied_updates(), 0);

    let due = bench.scheduler.advance(delay / 4);
    assert_eq!(due, vec![BindingId(1)]);
    for _ in due {
        binding.on_timer(&mut bench.cx()).expect("timer");
    }

    assert_eq!(binding.applied_updates(), 1);
    assert_eq!(binding.last_applied(), Some(second));
    assert_close(bench.semantic.parameter_value(wall, "area"), 10.0);
    assert!(bench.scheduler.advance(delay * 10).is_empty());
}

// =============================================================================
// SCENARIO 4: PARENT MISMATCH
// =============================================================================

#[test]
fn volume_under_surface_parent_is_a_parent_mismatch() {
    let mut semantic = SemanticGraph::new();
    let mut model = GeometryModel::new(GEOMETRY, "building");
    let facade = semantic
        .add_component("facade", InstanceType::Surface, None)
        .expect("parent");
    let room = semantic
        .add_component("room", InstanceType::Volume, Some(facade))
        .expect("child");
    let outer = add_box(&mut model, "outer", Vec3::ZERO, Vec3::new(10.0, 10.0, 3.0)).expect("outer");
    let inner = add_box(&mut model, "inner", Vec3::ONE, Vec3::new(4.0, 4.0, 2.0)).expect("inner");

    let state = evaluate(
        semantic.component(facade),
        model.geometry_from_id(outer),
        semantic.component(room),
        model.geometry_from_id(inner),
    );

    assert_eq!(state, ConnectionState::PARENT_INSTANCE_MISMATCH);
}

// =============================================================================
// EXCHANGE-LEVEL BEHAVIOR
// =============================================================================

fn piping_exchange() -> (Exchange, ElementId, EntityId) {
    let mut exchange = Exchange::new(ExchangeConfig::default()).expect("exchange");
    exchange
        .add_model(GeometryModel::new(PIPING, "piping"))
        .expect("model");
    let pump = exchange
        .semantic_mut()
        .add_component("pump", InstanceType::NetworkNode, None)
        .expect("component");
    let mut network = NetworkGraph::new("circuit");
    let root = network.root();
    let a = network.add_node(root, "pump", Vec3::ZERO).expect("a");
    let b = network.add_node(root, "tank", Vec3::new(3.0, 0.0, 0.0)).expect("b");
    network.add_edge(root, "line", a, b).expect("edge");
    network.set_content(a, Some(pump)).expect("content");
    exchange.attach_network(PIPING, network).expect("attach");
    (exchange, a, pump)
}

#[test]
fn transform_toggles_do_not_ping_pong() {
    let (mut exchange, node, pump) = piping_exchange();
    let binding = exchange
        .mirror(PIPING)
        .and_then(|m| m.node_binding(node))
        .expect("node binding");
    let vertex = GeometricReference::new(PIPING, binding.vertex());
    let proxy = binding.proxy().expect("proxy");

    for (round, edge) in [2.0, 1.0, 3.0].into_iter().enumerate() {
        let transform = InstanceTransform {
            size: Vec3::new(edge, edge, edge),
            rotation: Vec3::ZERO,
        };
        exchange
            .semantic_mut()
            .set_instance_transform(pump, vertex, transform, None)
            .expect("resize instance");
        let rounds = exchange.pump().expect("pump");
        assert!(rounds <= exchange.config().max_event_rounds);

        let binding = exchange
            .mirror(PIPING)
            .and_then(|m| m.node_binding(node))
            .expect("node binding");
        assert_eq!(binding.proxy_pushes(), round as u64 + 1);
        assert_eq!(binding.instance_pushes(), 0);
    }

    exchange
        .model_mut(PIPING)
        .expect("model")
        .set_proxy_transform(proxy, Vec3::new(0.5, 0.5, 0.5), Vec3::ZERO, None)
        .expect("resize proxy");
    exchange.pump().expect("pump");

    let binding = exchange
        .mirror(PIPING)
        .and_then(|m| m.node_binding(node))
        .expect("node binding");
    assert_eq!(binding.instance_pushes(), 1);
    assert_eq!(binding.proxy_pushes(), 3);
    let instance = exchange
        .semantic()
        .get(pump)
        .expect("pump")
        .instance_at(vertex)
        .expect("instance")
        .transform;
    assert_eq!(instance.size, Vec3::new(0.5, 0.5, 0.5));
}

#[test]
fn network_edits_are_mirrored_on_pump() {
    let (mut exchange, _, _) = piping_exchange();
    let network = exchange.network_mut(PIPING).expect("network");
    let root = network.root();
    let tank = network
        .ids_of_kind(bindery_core::ElementKind::Node)
        .last()
        .copied()
        .expect("tank");
    let drain = network
        .add_node(root, "drain", Vec3::new(3.0, -2.0, 0.0))
        .expect("drain");
    network.add_edge(root, "outlet", tank, drain).expect("edge");

    exchange.pump().expect("pump");

    let mirror = exchange.mirror(PIPING).expect("mirror");
    assert_eq!(mirror.bindings().len(), 5);
    let model = exchange.model(PIPING).expect("model");
    assert_eq!(model.ids_of_kind(GeometryKind::Vertex).len(), 3);
    assert_eq!(model.ids_of_kind(GeometryKind::Polyline).len(), 2);
    assert!(mirror.passes() >= 2);
}

#[test]
fn missing_asset_files_become_warnings() {
    let (mut exchange, node, pump) = piping_exchange();
    exchange
        .semantic_mut()
        .set_files(pump, vec!["missing/pump.obj".to_string()])
        .expect("files");
    exchange.pump().expect("pump");

    let warnings = exchange.take_warnings();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("pump"));
    // The cube stays in place of the failed import.
    let binding = exchange
        .mirror(PIPING)
        .and_then(|m| m.node_binding(node))
        .expect("node binding");
    assert!(binding.proxy().is_some());
}

#[test]
fn reloading_a_model_keeps_parameters_current() {
    let mut exchange = Exchange::new(ExchangeConfig::default()).expect("exchange");
    let mut model = GeometryModel::new(GEOMETRY, "rooms");
    let volume = add_box(&mut model, "office", Vec3::ZERO, Vec3::new(4.0, 5.0, 3.0)).expect("box");
    exchange.add_model(model).expect("model");
    let office = exchange
        .semantic_mut()
        .add_component("office", InstanceType::Volume, None)
        .expect("component");
    exchange
        .connect(office, GeometricReference::new(GEOMETRY, volume))
        .expect("connect");
    assert_close(exchange.semantic().parameter_value(office, "volume_gross"), 60.0);

    let mut reloaded = GeometryModel::new(GEOMETRY, "rooms");
    let volume = add_box(&mut reloaded, "office", Vec3::ZERO, Vec3::new(4.0, 5.0, 4.0)).expect("box");
    exchange.replace_model(GEOMETRY, reloaded).expect("replace");

    let id = exchange.binding_of(office).expect("binding");
    assert_eq!(
        exchange.binding(id).expect("binding").target(),
        GeometricReference::new(GEOMETRY, volume)
    );
    assert_close(exchange.semantic().parameter_value(office, "volume_gross"), 80.0);
    exchange.advance_time(Duration::from_secs(5)).expect("no timers");
}
