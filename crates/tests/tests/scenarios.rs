//! End-to-end scenarios for the compute engine.
//!
//! These drive whole module graphs through a world: lazy evaluation,
//! invalidation on input changes, fused multi-output producers,
//! allocate-before-fill with dynamic shapes, cycle detection and scoping.

use weft_engine::{Array, Error, Module, ModuleCtx, Result, World};
use weft_tests::{MeshModule, ScaleModule, SquareModule};

/// A single triangle plus one adjacent triangle (a quad split in two).
///
/// Faces: (0,1,2) and (0,2,3). The shared diagonal is edge (0,2).
fn quad_mesh() -> (Array, Array) {
    let v_pos = Array::from_f32_with_lanes(
        vec![
            0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, //
            1.0, 1.0, 0.0, //
            0.0, 1.0, 0.0,
        ],
        3,
        [4],
    );
    let f_verts = Array::from_i32_with_lanes(vec![0, 1, 2, 0, 2, 3], 3, [2]);
    (v_pos, f_verts)
}

#[test]
fn test_lazy_square() {
    let world = World::new();
    let m = world.require::<SquareModule>().expect("require");

    m.x.set(6.0).expect("set x");
    assert_eq!(m.y.get().expect("get y"), 36.0);

    let record = world
        .registry()
        .resource(m.y.name())
        .expect("resource record");
    assert_eq!(record.version(), 1);
    assert_eq!(record.dep_sig(), &vec![(m.x.name().clone(), 1)]);

    // Second read: cached, the producer does not run again.
    assert_eq!(m.y.get().expect("get y"), 36.0);
    assert_eq!(m.runs.get(), 1);
}

#[test]
fn test_invalidation_recomputes() {
    let world = World::new();
    let m = world.require::<SquareModule>().expect("require");

    m.x.set(6.0).expect("set x");
    assert_eq!(m.y.get().expect("get y"), 36.0);

    m.x.set(7.0).expect("set x");
    assert_eq!(m.x.version().expect("version"), 2);

    assert_eq!(m.y.get().expect("get y"), 49.0);
    assert_eq!(m.runs.get(), 2);

    let record = world
        .registry()
        .resource(m.y.name())
        .expect("resource record");
    assert_eq!(record.version(), 2);
    assert_eq!(record.dep_sig(), &vec![(m.x.name().clone(), 2)]);
}

#[test]
fn test_manual_override_holds_until_upstream_change() {
    let world = World::new();
    let m = world.require::<SquareModule>().expect("require");

    m.x.set(6.0).expect("set x");
    assert_eq!(m.y.get().expect("get y"), 36.0);

    // Nothing is read-only: overriding a produced value sticks...
    m.y.set(1000.0).expect("override y");
    assert_eq!(m.y.get().expect("get y"), 1000.0);
    assert_eq!(m.runs.get(), 1);

    // ...until the next upstream change triggers recomputation.
    m.x.set(2.0).expect("set x");
    assert_eq!(m.y.get().expect("get y"), 4.0);
    assert_eq!(m.runs.get(), 2);
}

#[test]
fn test_multi_output_fusion_runs_once() {
    let world = World::new();
    let mesh = world.require::<MeshModule>().expect("require");

    let (v_pos, f_verts) = quad_mesh();
    mesh.v_pos.set(v_pos).expect("set positions");
    mesh.f_verts.set(f_verts).expect("set faces");

    mesh.e_verts.ensure().expect("ensure edges");
    assert_eq!(mesh.runs.get(), 1);

    // The fused producer already committed every edge resource; ensuring a
    // sibling output must not run it again.
    mesh.e_opp.ensure().expect("ensure opposites");
    mesh.e_faces.ensure().expect("ensure edge faces");
    assert_eq!(mesh.runs.get(), 1);

    // Two triangles sharing one diagonal: 5 unique edges.
    let e_verts = mesh.e_verts.get().expect("edges");
    assert_eq!(e_verts.shape(), &[5]);
    assert_eq!(e_verts.lanes(), 2);

    // The shared edge (0,2) carries both faces and both opposite vertices.
    let edges = e_verts.as_i32().expect("i32 edges");
    let e_faces = mesh.e_faces.get().expect("edge faces");
    let faces = e_faces.as_i32().expect("i32 faces");
    let shared = (0..5)
        .find(|&e| edges[2 * e] == 0 && edges[2 * e + 1] == 2)
        .expect("shared diagonal present");
    assert_eq!(&faces[2 * shared..2 * shared + 2], &[0, 1]);
}

#[test]
fn test_mesh_edit_rebuilds_topology() {
    let world = World::new();
    let mesh = world.require::<MeshModule>().expect("require");

    let (v_pos, f_verts) = quad_mesh();
    mesh.v_pos.set(v_pos).expect("set positions");
    mesh.f_verts.set(f_verts).expect("set faces");
    mesh.e_verts.ensure().expect("ensure edges");
    assert_eq!(mesh.runs.get(), 1);

    // Shrink to a single triangle: 3 edges after rebuild.
    mesh.f_verts
        .set(Array::from_i32_with_lanes(vec![0, 1, 2], 3, [1]))
        .expect("set faces");
    let e_verts = mesh.e_verts.get().expect("edges");
    assert_eq!(e_verts.shape(), &[3]);
    assert_eq!(mesh.runs.get(), 2);
}

#[test]
fn test_allocate_then_fill() {
    let world = World::new();
    let scale = world.require::<ScaleModule>().expect("require");

    scale
        .samples
        .set(Array::from_f64(vec![1.0, 2.0, 3.0], [3]))
        .expect("set samples");

    let scaled = scale.scaled.get().expect("scaled");
    assert_eq!(scaled.as_f64(), Some(&[2.0, 4.0, 6.0][..]));

    // One pass, one commit: version bumped exactly once, signature current.
    let record = world
        .registry()
        .resource(scale.scaled.name())
        .expect("record");
    assert_eq!(record.version(), 1);
    assert_eq!(
        record.dep_sig(),
        &vec![(scale.samples.name().clone(), 1)]
    );

    // A different input length reallocates and still validates under the
    // mirrored shape.
    scale
        .samples
        .set(Array::from_f64(vec![1.0, 1.0, 1.0, 1.0], [4]))
        .expect("set samples");
    let scaled = scale.scaled.get().expect("scaled");
    assert_eq!(scaled.shape(), &[4]);
    assert_eq!(scale.runs.get(), 2);
}

#[test]
fn test_resource_cycle_detected() {
    use weft_engine::{Producer, Registry, ResourceName};

    struct Claim(Vec<ResourceName>);
    impl Producer for Claim {
        fn outputs(&self) -> &[ResourceName] {
            &self.0
        }
        fn compute(&self, _registry: &Registry) -> Result<()> {
            Ok(())
        }
        fn label(&self) -> &str {
            "claim"
        }
    }

    let world = World::new();
    let registry = world.registry();
    let pa = registry.add_producer(Claim(vec!["a".into()])).expect("pa");
    let pb = registry.add_producer(Claim(vec!["b".into()])).expect("pb");
    registry
        .declare("a")
        .dep("b")
        .producer(pa)
        .finish()
        .expect("a");
    registry
        .declare("b")
        .dep("a")
        .producer(pb)
        .finish()
        .expect("b");

    match registry.ensure(&"a".into()) {
        Err(Error::ResourceCycle { path }) => {
            let path: Vec<&str> = path.iter().map(ResourceName::as_str).collect();
            assert_eq!(path, vec!["a", "b", "a"]);
        }
        other => panic!("expected resource cycle, got {other:?}"),
    }
}

struct ModA;
struct ModB;

impl Module for ModA {
    const NAME: &'static str = "A";

    fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
        ctx.require::<ModB>()?;
        Ok(Self)
    }
}

impl Module for ModB {
    const NAME: &'static str = "B";

    fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
        ctx.require::<ModA>()?;
        Ok(Self)
    }
}

#[test]
fn test_module_cycle_detected() {
    let world = World::new();
    match world.require::<ModA>() {
        Err(Error::ModuleCycle { path }) => {
            assert_eq!(path.join(" -> "), ":A -> :B -> :A");
        }
        other => panic!("expected module cycle, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_scoped_instances_are_independent() {
    let world = World::new();
    let left = world.require_scoped::<SquareModule>("left").expect("left");
    let right = world
        .require_scoped::<SquareModule>("right")
        .expect("right");

    assert_eq!(left.x.name().as_str(), "left.Square.x");
    assert_eq!(right.x.name().as_str(), "right.Square.x");

    left.x.set(2.0).expect("set left");
    right.x.set(5.0).expect("set right");
    assert_eq!(left.y.get().expect("left y"), 4.0);
    assert_eq!(right.y.get().expect("right y"), 25.0);
}

#[test]
fn test_spec_rejects_bad_input() {
    let world = World::new();
    let mesh = world.require::<MeshModule>().expect("require");

    // Positions are declared as vec3f; a plain f64 array must bounce.
    let wrong = Array::from_f64(vec![0.0; 12], [12]);
    let result = world
        .registry()
        .set(mesh.v_pos.name(), weft_engine::Buffer::Array(wrong));
    assert!(matches!(result, Err(Error::Validation { .. })));
    assert_eq!(mesh.v_pos.version().expect("version"), 0);
}

#[test]
fn test_explain_reports_staleness_cause() {
    let world = World::new();
    let m = world.require::<SquareModule>().expect("require");

    m.x.set(6.0).expect("set x");
    let _ = m.y.get().expect("get y");
    m.x.set(7.0).expect("set x");

    let text = world
        .registry()
        .explain(m.y.name(), 4)
        .expect("explain");
    assert!(text.contains("Square.y"));
    assert!(text.contains("producer=square"));
    assert!(text.contains("STALE"));
    assert!(text.contains("Square.x"));

    // Explaining is read-only: y is still stale and recomputes on demand.
    assert_eq!(m.y.get().expect("get y"), 49.0);
}

#[test]
fn test_ensure_many_shares_one_pass() {
    let world = World::new();
    let mesh = world.require::<MeshModule>().expect("require");

    let (v_pos, f_verts) = quad_mesh();
    mesh.v_pos.set(v_pos).expect("set positions");
    mesh.f_verts.set(f_verts).expect("set faces");

    world
        .registry()
        .ensure_many(&[
            mesh.e_verts.name().clone(),
            mesh.e_faces.name().clone(),
            mesh.e_opp.name().clone(),
        ])
        .expect("ensure_many");
    assert_eq!(mesh.runs.get(), 1);
}
