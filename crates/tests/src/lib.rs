//! Reusable module graphs for end-to-end engine tests.
//!
//! The scenario tests in `tests/` drive these modules the way application
//! code does: require a module from a world, set inputs through typed refs,
//! read derived resources lazily and let the registry decide what runs.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use weft_engine::{
    shape_of, Array, Dtype, Error, IoRecord, Module, ModuleCtx, ResourceName, ResourceRef,
    ResourceSpec, Result, WiredProducer,
};

/// `y = x * x`, the smallest possible producer graph.
pub struct SquareModule {
    /// Input scalar.
    pub x: ResourceRef<f64>,
    /// Derived square of `x`.
    pub y: ResourceRef<f64>,
    /// How many times the producer ran.
    pub runs: Rc<Cell<u32>>,
}

struct SquareIo {
    x: ResourceRef<f64>,
    y: ResourceRef<f64>,
}

impl IoRecord for SquareIo {
    fn outputs(&self) -> Vec<ResourceName> {
        vec![self.y.name().clone()]
    }
}

impl Module for SquareModule {
    const NAME: &'static str = "Square";

    fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
        let x = ctx.input("x", None, "Input scalar")?;
        let y = ctx.reserve("y", None, "Square of x");
        let runs = Rc::new(Cell::new(0));

        let io = SquareIo {
            x: x.clone(),
            y: y.clone(),
        };
        let counter = Rc::clone(&runs);
        let producer = ctx.add_producer(WiredProducer::new("square", io, move |io, _reg| {
            counter.set(counter.get() + 1);
            let x = io.x.peek()?.unwrap_or(0.0);
            io.y.set(x * x)
        })?)?;
        ctx.declare(&y).dep(&x).producer(producer).finish()?;

        Ok(Self { x, y, runs })
    }
}

/// Triangle mesh with lazily built edge topology.
///
/// One fused producer owns all three edge resources, so ensuring any of
/// them builds the whole topology in a single pass.
pub struct MeshModule {
    /// Vertex positions, `(nV,)` of vec3f.
    pub v_pos: ResourceRef<Array>,
    /// Face vertex indices, `(nF,)` of vec3i.
    pub f_verts: ResourceRef<Array>,
    /// Unique undirected edges, `(nE,)` of vec2i.
    pub e_verts: ResourceRef<Array>,
    /// Adjacent faces per edge, `(nE,)` of vec2i, `-1` on boundaries.
    pub e_faces: ResourceRef<Array>,
    /// Opposite vertex per edge side, `(nE,)` of vec2i, `-1` on boundaries.
    pub e_opp: ResourceRef<Array>,
    /// How many times the topology producer ran.
    pub runs: Rc<Cell<u32>>,
}

struct TopologyIo {
    f_verts: ResourceRef<Array>,
    e_verts: ResourceRef<Array>,
    e_faces: ResourceRef<Array>,
    e_opp: ResourceRef<Array>,
}

impl IoRecord for TopologyIo {
    fn outputs(&self) -> Vec<ResourceName> {
        vec![
            self.e_verts.name().clone(),
            self.e_faces.name().clone(),
            self.e_opp.name().clone(),
        ]
    }
}

fn build_topology(io: &TopologyIo) -> Result<()> {
    let faces_buf = io.f_verts.peek()?.ok_or_else(|| Error::Validation {
        name: io.f_verts.name().clone(),
        reason: "faces not set".to_string(),
    })?;
    let faces = faces_buf.as_i32().ok_or_else(|| Error::Validation {
        name: io.f_verts.name().clone(),
        reason: "faces must be an i32 array".to_string(),
    })?;
    let n_f = faces_buf.element_count();

    let mut edge_ids: HashMap<(i32, i32), usize> = HashMap::new();
    let mut e_verts: Vec<i32> = Vec::new();
    let mut e_faces: Vec<i32> = Vec::new();
    let mut e_opp: Vec<i32> = Vec::new();

    {
        let mut add_half_edge = |a: i32, b: i32, face: i32, opposite: i32| -> Result<()> {
            let key = if a < b { (a, b) } else { (b, a) };
            match edge_ids.get(&key) {
                None => {
                    edge_ids.insert(key, e_verts.len() / 2);
                    e_verts.extend([key.0, key.1]);
                    e_faces.extend([face, -1]);
                    e_opp.extend([opposite, -1]);
                }
                Some(&eid) => {
                    if e_faces[2 * eid + 1] != -1 {
                        return Err(Error::Validation {
                            name: io.e_faces.name().clone(),
                            reason: format!("non-manifold edge at {key:?} (more than 2 faces)"),
                        });
                    }
                    e_faces[2 * eid + 1] = face;
                    e_opp[2 * eid + 1] = opposite;
                }
            }
            Ok(())
        };

        for face in 0..n_f {
            let a = faces[3 * face];
            let b = faces[3 * face + 1];
            let c = faces[3 * face + 2];
            add_half_edge(a, b, face as i32, c)?;
            add_half_edge(b, c, face as i32, a)?;
            add_half_edge(c, a, face as i32, b)?;
        }
    }

    let n_e = e_verts.len() / 2;
    io.e_verts
        .set_buffer(Array::from_i32_with_lanes(e_verts, 2, [n_e]), false)?;
    io.e_faces
        .set_buffer(Array::from_i32_with_lanes(e_faces, 2, [n_e]), false)?;
    io.e_opp
        .set_buffer(Array::from_i32_with_lanes(e_opp, 2, [n_e]), false)?;

    io.e_verts.commit()?;
    io.e_faces.commit()?;
    io.e_opp.commit()
}

impl Module for MeshModule {
    const NAME: &'static str = "Mesh";

    fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
        let v_pos = ctx.input(
            "V_pos",
            Some(ResourceSpec::array().with_dtype(Dtype::F32).with_lanes(3)),
            "Vertex positions, shape (nV,) of vec3f",
        )?;
        let f_verts = ctx.input(
            "F_verts",
            Some(ResourceSpec::array().with_dtype(Dtype::I32).with_lanes(3)),
            "Face vertex indices, shape (nF,) of vec3i",
        )?;

        let edge_spec = ResourceSpec::array().with_dtype(Dtype::I32).with_lanes(2);
        let e_verts = ctx.reserve(
            "E_verts",
            Some(edge_spec.clone()),
            "Unique undirected edges, shape (nE,) of vec2i",
        );
        let e_faces = ctx.reserve(
            "E_faces",
            Some(edge_spec.clone()),
            "Adjacent faces per edge, shape (nE,) of vec2i",
        );
        let e_opp = ctx.reserve(
            "E_opp",
            Some(edge_spec),
            "Opposite vertex per edge side, shape (nE,) of vec2i",
        );

        let runs = Rc::new(Cell::new(0));
        let io = TopologyIo {
            f_verts: f_verts.clone(),
            e_verts: e_verts.clone(),
            e_faces: e_faces.clone(),
            e_opp: e_opp.clone(),
        };
        let counter = Rc::clone(&runs);
        let producer =
            ctx.add_producer(WiredProducer::new("build-topology", io, move |io, _reg| {
                counter.set(counter.get() + 1);
                build_topology(io)
            })?)?;

        for edge_resource in [&e_verts, &e_faces, &e_opp] {
            ctx.declare(edge_resource)
                .deps([&v_pos, &f_verts])
                .producer(producer)
                .finish()?;
        }

        Ok(Self {
            v_pos,
            f_verts,
            e_verts,
            e_faces,
            e_opp,
            runs,
        })
    }
}

/// `scaled = 2 * samples`, demonstrating allocate-before-fill with a
/// dynamic output shape mirroring the input.
pub struct ScaleModule {
    /// Input samples, `(n,)` of f64.
    pub samples: ResourceRef<Array>,
    /// Doubled samples, `(n,)` of f64.
    pub scaled: ResourceRef<Array>,
    /// How many times the producer ran.
    pub runs: Rc<Cell<u32>>,
}

struct ScaleIo {
    samples: ResourceRef<Array>,
    scaled: ResourceRef<Array>,
}

impl IoRecord for ScaleIo {
    fn outputs(&self) -> Vec<ResourceName> {
        vec![self.scaled.name().clone()]
    }
}

impl Module for ScaleModule {
    const NAME: &'static str = "Scale";

    fn construct(ctx: &mut ModuleCtx<'_>) -> Result<Self> {
        let samples = ctx.input(
            "samples",
            Some(ResourceSpec::array().with_dtype(Dtype::F64)),
            "Input samples, shape (n,)",
        )?;
        let scaled = ctx.reserve(
            "scaled",
            Some(
                ResourceSpec::array()
                    .with_dtype(Dtype::F64)
                    .with_shape_fn(shape_of(&samples)),
            ),
            "Doubled samples, shape (n,)",
        );

        let runs = Rc::new(Cell::new(0));
        let io = ScaleIo {
            samples: samples.clone(),
            scaled: scaled.clone(),
        };
        let counter = Rc::clone(&runs);
        let producer = ctx.add_producer(WiredProducer::new("scale", io, move |io, _reg| {
            counter.set(counter.get() + 1);
            let input = io.samples.peek()?.ok_or_else(|| Error::Validation {
                name: io.samples.name().clone(),
                reason: "samples not set".to_string(),
            })?;
            let doubled: Vec<f64> = input
                .as_f64()
                .map(|data| data.iter().map(|v| v * 2.0).collect())
                .unwrap_or_default();
            let n = input.element_count();

            let needs_alloc = match io.scaled.peek()? {
                Some(existing) => existing.shape() != &[n][..],
                None => true,
            };
            if needs_alloc {
                io.scaled.set_buffer(Array::zeros(Dtype::F64, [n]), false)?;
            }
            io.scaled.mutate(|buffer| {
                if let Some(out) = buffer.as_array_mut().and_then(Array::as_f64_mut) {
                    out.copy_from_slice(&doubled);
                }
            })?;
            io.scaled.commit()
        })?)?;
        ctx.declare(&scaled)
            .dep(&samples)
            .producer(producer)
            .finish()?;

        Ok(Self {
            samples,
            scaled,
            runs,
        })
    }
}
