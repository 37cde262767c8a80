//! # Property-Based Tests
//!
//! Randomized checks of the evaluator, the structural pass and the network
//! mirror.

use bindery_core::admissibility::geometry_contains;
use bindery_core::connector::SyncContext;
use bindery_core::geometry::build::{add_box, add_polygon};
use bindery_core::geometry::topology::polyline_edges;
use bindery_core::proxy::ProxyMesh;
use bindery_core::{
    BindingId, ConnectionState, DescriptiveBinding, DescriptiveKind, ElementId, ElementKind,
    ExchangeConfig, FsAssetImporter, GeometricReference, GeometryId, GeometryKind, GeometryModel,
    InstanceType, ManualScheduler, ModelId, NetworkGraph, NetworkMirror, PlanarMeasurements,
    SemanticGraph, Vec3, WarningLog, evaluate,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;

const GEOMETRY: ModelId = ModelId(1);
const PIPING: ModelId = ModelId(2);

// =============================================================================
// STRATEGIES
// =============================================================================

fn instance_type() -> impl Strategy<Value = InstanceType> {
    prop::sample::select(vec![
        InstanceType::None,
        InstanceType::Volume,
        InstanceType::Space,
        InstanceType::Surface,
        InstanceType::Line,
        InstanceType::Point,
        InstanceType::NetworkNode,
        InstanceType::NetworkEdge,
    ])
}

fn geometry_kind() -> impl Strategy<Value = GeometryKind> {
    prop::sample::select(vec![
        GeometryKind::Vertex,
        GeometryKind::Edge,
        GeometryKind::EdgeLoop,
        GeometryKind::Face,
        GeometryKind::Volume,
        GeometryKind::Polyline,
        GeometryKind::ProxyShape,
    ])
}

/// A model holding at least one primitive of every kind.
fn every_kind() -> GeometryModel {
    let mut model = GeometryModel::new(GEOMETRY, "catalogue");
    add_box(&mut model, "box", Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0)).expect("box");
    let edge = model.ids_of_kind(GeometryKind::Edge)[0];
    model.add_polyline("run", vec![edge]).expect("polyline");
    let vertex = model.ids_of_kind(GeometryKind::Vertex)[0];
    model
        .add_proxy("proxy", vertex, Vec3::ONE, Vec3::ZERO, ProxyMesh::cube())
        .expect("proxy");
    model
}

fn sample(model: &GeometryModel, kind: GeometryKind) -> GeometryId {
    model.ids_of_kind(kind)[0]
}

// =============================================================================
// EVALUATOR
// =============================================================================

proptest! {
    /// Every flag is raised exactly when its rule applies, whatever else is
    /// present or missing.
    #[test]
    fn evaluation_reports_every_applicable_flag(
        parent_type in prop::option::of(instance_type()),
        entity_type in prop::option::of(instance_type()),
        parent_kind in prop::option::of(geometry_kind()),
        kind in prop::option::of(geometry_kind()),
    ) {
        let model = every_kind();
        let mut semantic = SemanticGraph::new();
        let parent = parent_type.map(|t| semantic.add_component("parent", t, None).expect("parent"));
        let entity = entity_type.map(|t| semantic.add_component("entity", t, parent).expect("entity"));

        let parent_entity = parent.and_then(|id| semantic.component(id));
        let entity_ref = entity.and_then(|id| semantic.component(id));
        let parent_primitive = parent_kind.and_then(|k| model.geometry_from_id(sample(&model, k)));
        let primitive = kind.and_then(|k| model.geometry_from_id(sample(&model, k)));

        let state = evaluate(parent_entity, parent_primitive, entity_ref, primitive);
        prop_assert_eq!(state, evaluate(parent_entity, parent_primitive, entity_ref, primitive));

        prop_assert_eq!(state.contains(ConnectionState::SOURCE_MISSING), entity_type.is_none());
        prop_assert_eq!(state.contains(ConnectionState::TARGET_MISSING), kind.is_none());

        let kind_mismatch = matches!((entity_type, kind), (Some(t), Some(k)) if !t.accepts(k));
        prop_assert_eq!(state.contains(ConnectionState::KIND_MISMATCH), kind_mismatch);

        let instance_mismatch = matches!(
            (parent_type, entity_type),
            (Some(p), Some(c)) if !p.accepts_child(c)
        );
        prop_assert_eq!(
            state.contains(ConnectionState::PARENT_INSTANCE_MISMATCH),
            instance_mismatch
        );

        let geometry_mismatch = matches!(
            (parent_kind, kind),
            (Some(p), Some(c)) if !geometry_contains(p, c)
        );
        prop_assert_eq!(
            state.contains(ConnectionState::PARENT_GEOMETRY_MISMATCH),
            geometry_mismatch
        );

        let geometry_missing = parent_kind.is_none() && parent_type.is_some_and(InstanceType::is_bindable);
        prop_assert_eq!(
            state.contains(ConnectionState::PARENT_GEOMETRY_MISSING),
            geometry_missing
        );
        prop_assert_eq!(
            state.contains(ConnectionState::PARENT_ENTITY_MISSING),
            parent_type.is_none() && parent_kind.is_some()
        );

        prop_assert!(!state.intersects(
            ConnectionState::DUPLICATE_ENTITY_BINDING
                | ConnectionState::DUPLICATE_GEOMETRY_BINDING
                | ConnectionState::GENERATED_SUBSTRUCTURE_LEFTOVER
        ));
    }

    /// A second structural pass over an unchanged target changes nothing.
    #[test]
    fn structural_pass_is_idempotent(width in 0.5f64..50.0, height in 0.5f64..50.0) {
        let mut model = GeometryModel::new(GEOMETRY, "walls");
        let face = add_polygon(
            &mut model,
            "wall",
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(width, 0.0, 0.0),
                Vec3::new(width, 0.0, height),
                Vec3::new(0.0, 0.0, height),
            ],
        )
        .expect("face");
        let mut bench = Bench::new(model);
        let wall = bench
            .semantic
            .add_component("wall", InstanceType::Surface, None)
            .expect("wall");
        let mut binding = DescriptiveBinding::new(
            BindingId(1),
            DescriptiveKind::Face,
            wall,
            GeometricReference::new(GEOMETRY, face),
        );

        prop_assert!(binding.synchronize_structure(&mut bench.cx()).expect("first"));
        let after_first = bench.semantic.get(wall).expect("wall").clone();
        prop_assert!(binding.synchronize_structure(&mut bench.cx()).expect("second"));
        let after_second = bench.semantic.get(wall).expect("wall").clone();

        prop_assert_eq!(after_first.instances.len(), 1);
        prop_assert_eq!(after_first, after_second);
    }
}

// =============================================================================
// NETWORK MIRROR
// =============================================================================

struct Bench {
    semantic: SemanticGraph,
    model: GeometryModel,
    config: ExchangeConfig,
    scheduler: ManualScheduler,
    warnings: WarningLog,
    importer: FsAssetImporter,
}

impl Bench {
    fn new(model: GeometryModel) -> Self {
        Self {
            semantic: SemanticGraph::new(),
            model,
            config: ExchangeConfig::default(),
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

/// Build a network from random node positions and endpoint index pairs.
///
/// With `nested`, a sub-network of two boundary nodes joins the root as one
/// extra endpoint.
fn random_network(positions: &[(f64, f64)], links: &[(usize, usize)], nested: bool) -> NetworkGraph {
    let mut network = NetworkGraph::new("random");
    let root = network.root();
    let mut endpoints: Vec<ElementId> = positions
        .iter()
        .enumerate()
        .map(|(i, (x, y))| {
            network
                .add_node(root, format!("n{i}"), Vec3::new(*x, *y, 0.0))
                .expect("node")
        })
        .collect();

    if nested {
        let sub = network.add_network(root, "plant").expect("sub-network");
        let entry = network
            .add_node(sub, "inlet", Vec3::new(-1.0, -1.0, 0.0))
            .expect("inlet");
        let exit = network
            .add_node(sub, "outlet", Vec3::new(-2.0, -1.0, 0.0))
            .expect("outlet");
        network.add_edge(sub, "internal", entry, exit).expect("internal");
        network.set_boundary(sub, Some(entry), Some(exit)).expect("boundary");
        endpoints.push(sub);
    }

    for (i, (start, end)) in links.iter().enumerate() {
        let (start, end) = (start % endpoints.len(), end % endpoints.len());
        if start != end {
            network
                .add_edge(root, format!("e{i}"), endpoints[start], endpoints[end])
                .expect("edge");
        }
    }
    network
}

fn assert_mirrored(mirror: &NetworkMirror, model: &GeometryModel) -> Result<(), TestCaseError> {
    let network = mirror.network();
    for element in network.elements() {
        if !matches!(element.kind(), ElementKind::Node | ElementKind::Edge) {
            continue;
        }
        let reference = element.representation.expect("representation");
        prop_assert_eq!(reference.model, PIPING);
        prop_assert!(model.contains(reference.geometry));
        prop_assert!(mirror.bindings().contains_key(&reference.geometry));
    }

    let mut owners: BTreeMap<GeometryId, usize> = BTreeMap::new();
    for element in network.elements() {
        let owned = match element.kind() {
            ElementKind::Node => {
                let binding = mirror.node_binding(element.id).expect("node binding");
                let mut owned = vec![binding.vertex()];
                owned.extend(binding.proxy());
                owned
            }
            ElementKind::Edge => {
                let polyline = mirror
                    .binding_for_element(element.id)
                    .expect("edge binding")
                    .primitive();
                let mut owned = vec![polyline];
                owned.extend(polyline_edges(model, polyline).expect("edges"));
                owned
            }
            ElementKind::Network => Vec::new(),
        };
        for id in owned {
            *owners.entry(id).or_default() += 1;
        }
    }

    for primitive in model.primitives() {
        match primitive.kind() {
            GeometryKind::Volume | GeometryKind::Face | GeometryKind::EdgeLoop => {
                prop_assert!(false, "unrelated primitive {} survived", primitive.id);
            }
            _ => prop_assert_eq!(owners.get(&primitive.id).copied(), Some(1)),
        }
    }
    Ok(())
}

proptest! {
    /// Every element is represented, and every primitive belongs to exactly
    /// one element.
    #[test]
    fn mirror_is_complete_and_minimal(
        positions in vec((-100.0f64..100.0, -100.0f64..100.0), 1..8),
        links in vec((0usize..16, 0usize..16), 0..12),
        nested in any::<bool>(),
        stray in any::<bool>(),
    ) {
        let mut model = GeometryModel::new(PIPING, "piping");
        if stray {
            add_box(&mut model, "leftover", Vec3::ZERO, Vec3::ONE).expect("box");
        }
        let mut bench = Bench::new(model);
        let mut mirror = NetworkMirror::new(PIPING, random_network(&positions, &links, nested));

        mirror.update(&mut bench.cx()).expect("update");
        assert_mirrored(&mirror, &bench.model)?;

        let before: Vec<_> = mirror.bindings().keys().copied().collect();
        mirror.update(&mut bench.cx()).expect("second update");
        let after: Vec<_> = mirror.bindings().keys().copied().collect();
        prop_assert_eq!(before, after);
    }

    /// Deleting any node keeps the mirror complete and minimal.
    #[test]
    fn mirror_survives_node_deletion(
        positions in vec((-100.0f64..100.0, -100.0f64..100.0), 2..8),
        links in vec((0usize..16, 0usize..16), 0..12),
        victim in 0usize..8,
    ) {
        let mut bench = Bench::new(GeometryModel::new(PIPING, "piping"));
        let mut mirror = NetworkMirror::new(PIPING, random_network(&positions, &links, false));
        mirror.update(&mut bench.cx()).expect("update");

        let nodes = mirror.network().ids_of_kind(ElementKind::Node);
        let victim = nodes[victim % nodes.len()];
        mirror.network_mut().delete(victim).expect("delete");
        mirror.update(&mut bench.cx()).expect("update after delete");

        prop_assert!(mirror.binding_for_element(victim).is_none());
        assert_mirrored(&mirror, &bench.model)?;
    }
}
