//! Static collision boundaries and particle contact response.
//!
//! Response is reactive: a penetrating particle is projected back onto the
//! surface. If it is still moving into the solid, its normal velocity becomes
//! `-damping * v_n` and its tangential velocity is scaled by `1 - friction`;
//! a particle already heading back out keeps its velocity. Every shape
//! applies this per contact normal. One pass per substep, so a very deep
//! single-step penetration may resolve against the wrong face.

use glam::Vec3;
use log::warn;

use crate::config::unit_interval;
use crate::error::{check_bounds, FluidError, FluidResult};
use crate::particle::FluidParticle;

#[derive(Clone, Debug, PartialEq)]
pub enum BoundaryShape {
    /// Axis-aligned container; particles are kept inside.
    Box { center: Vec3, size: Vec3 },
    /// Solid ball; particles are kept outside.
    Sphere { center: Vec3, radius: f32 },
    /// Half-space; particles are kept on the side `normal` points to.
    Plane { point: Vec3, normal: Vec3 },
    /// Triangle soup. Carried for consumers; has no collision response.
    Mesh {
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FluidBoundary {
    pub shape: BoundaryShape,
    /// Fraction of tangential velocity removed on contact, in [0, 1]
    pub friction: f32,
}

impl FluidBoundary {
    pub fn container(center: Vec3, size: Vec3) -> Self {
        Self::frictionless(BoundaryShape::Box { center, size })
    }

    /// Container spanning `[min, max]`.
    pub fn container_between(min: Vec3, max: Vec3) -> Self {
        Self::container((min + max) * 0.5, max - min)
    }

    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self::frictionless(BoundaryShape::Sphere { center, radius })
    }

    /// Half-space through `point`. `normal` is normalised; a zero normal is
    /// rejected by [`validate`](Self::validate).
    pub fn plane(point: Vec3, normal: Vec3) -> Self {
        Self::frictionless(BoundaryShape::Plane {
            point,
            normal: normal.normalize_or_zero(),
        })
    }

    /// Horizontal floor at height `y`.
    pub fn floor(y: f32) -> Self {
        Self::plane(Vec3::new(0.0, y, 0.0), Vec3::Y)
    }

    pub fn mesh(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self::frictionless(BoundaryShape::Mesh {
            vertices,
            triangles,
        })
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    fn frictionless(shape: BoundaryShape) -> Self {
        Self {
            shape,
            friction: 0.0,
        }
    }

    pub fn validate(&self) -> FluidResult<()> {
        unit_interval("friction", self.friction)?;
        match &self.shape {
            BoundaryShape::Box { center, size } => {
                check_bounds(*center - *size * 0.5, *center + *size * 0.5)
            }
            BoundaryShape::Sphere { center, radius } => {
                if center.is_finite() && radius.is_finite() && *radius > 0.0 {
                    Ok(())
                } else {
                    Err(FluidError::config(
                        "radius",
                        format!("sphere radius must be positive, got {}", radius),
                    ))
                }
            }
            BoundaryShape::Plane { point, normal } => {
                if point.is_finite() && normal.is_normalized() {
                    Ok(())
                } else {
                    Err(FluidError::config(
                        "normal",
                        format!("plane normal must be non-zero, got {}", normal),
                    ))
                }
            }
            BoundaryShape::Mesh {
                vertices,
                triangles,
            } => {
                let len = vertices.len();
                match triangles.iter().flatten().find(|&&i| i as usize >= len) {
                    Some(&index) => Err(FluidError::config(
                        "triangles",
                        format!("vertex index {} out of range for {} vertices", index, len),
                    )),
                    None => Ok(()),
                }
            }
        }
    }

    /// Whether `point` lies in the region particles are kept out of.
    pub fn is_solid(&self, point: Vec3) -> bool {
        match &self.shape {
            BoundaryShape::Box { center, size } => {
                let half = *size * 0.5;
                let min = *center - half;
                let max = *center + half;
                point.cmplt(min).any() || point.cmpgt(max).any()
            }
            BoundaryShape::Sphere { center, radius } => point.distance(*center) < *radius,
            BoundaryShape::Plane { point: origin, normal } => (point - *origin).dot(*normal) < 0.0,
            BoundaryShape::Mesh { .. } => false,
        }
    }

    /// Push `particle` out of the solid region. Returns whether it was in contact.
    pub fn resolve(&self, particle: &mut FluidParticle, damping: f32) -> bool {
        let keep_tangent = 1.0 - self.friction;
        match &self.shape {
            BoundaryShape::Box { center, size } => {
                let half = *size * 0.5;
                let min = (*center - half).to_array();
                let max = (*center + half).to_array();
                let mut contact = false;
                for (axis, inward) in [Vec3::X, Vec3::Y, Vec3::Z].into_iter().enumerate() {
                    let pos = particle.position[axis];
                    let (wall, normal) = if pos < min[axis] {
                        (min[axis], inward)
                    } else if pos > max[axis] {
                        (max[axis], -inward)
                    } else {
                        continue;
                    };
                    particle.position[axis] = wall;
                    reflect(particle, normal, damping, keep_tangent);
                    contact = true;
                }
                contact
            }
            BoundaryShape::Sphere { center, radius } => {
                let diff = particle.position - *center;
                let dist = diff.length();
                if dist >= *radius {
                    return false;
                }
                let normal = if dist > 0.0 { diff / dist } else { Vec3::Y };
                particle.position = *center + normal * *radius;
                reflect(particle, normal, damping, keep_tangent);
                true
            }
            BoundaryShape::Plane { point, normal } => {
                let d = (particle.position - *point).dot(*normal);
                if d >= 0.0 {
                    return false;
                }
                particle.position -= *normal * d;
                reflect(particle, *normal, damping, keep_tangent);
                true
            }
            BoundaryShape::Mesh { .. } => false,
        }
    }
}

/// Damp the inbound normal velocity and the tangential remainder.
fn reflect(particle: &mut FluidParticle, normal: Vec3, damping: f32, keep_tangent: f32) {
    let vn = particle.velocity.dot(normal);
    if vn < 0.0 {
        let tangent = particle.velocity - normal * vn;
        particle.velocity = tangent * keep_tangent - normal * (damping * vn);
    }
}

/// Boundary list owned by a solver.
#[derive(Clone, Debug, Default)]
pub struct Boundaries {
    list: Vec<FluidBoundary>,
}

impl Boundaries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append. Boundaries are immutable once added.
    pub fn add(&mut self, boundary: FluidBoundary) -> FluidResult<()> {
        boundary.validate()?;
        if let BoundaryShape::Mesh { triangles, .. } = &boundary.shape {
            warn!(
                "mesh boundary with {} triangles added; meshes have no collision response",
                triangles.len()
            );
        }
        self.list.push(boundary);
        Ok(())
    }

    pub fn as_slice(&self) -> &[FluidBoundary] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn is_solid(&self, point: Vec3) -> bool {
        self.list.iter().any(|b| b.is_solid(point))
    }

    /// Resolve every particle against every boundary, in insertion order.
    pub fn resolve(&self, particles: &mut [FluidParticle], damping: f32) {
        if self.list.is_empty() {
            return;
        }
        for particle in particles.iter_mut() {
            for boundary in &self.list {
                boundary.resolve(particle, damping);
            }
        }
    }
}
