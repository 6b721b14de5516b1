// src/geometry/raybox.rs - Slab-method ray/bounding-box intersection
//
// Determines whether the vessel's travel ray enters the bounding box around
// a nearby object and, if so, where. Objects are reported by the host as a
// position plus a mean radius; the box is a cube of side 2 x radius, a
// deliberate fidelity compromise over a true sphere test.
use super::vec3::{Vector3, NUM_AXES};

/// Ray built from the vessel's motion: origin at the current position,
/// direction from the previous position to the current one. The direction is
/// not normalised and may have zero components.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vector3,
    pub direction: Vector3,
}

/// Axis-aligned box around a reported object.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub centre: Vector3,
    pub half_width: f64,
    pub half_height: f64,
}

impl BoundingBox {
    /// Cube approximation of a sphere: width = height = 2 x radius.
    pub fn from_radius(centre: Vector3, radius: f64) -> Self {
        Self {
            centre,
            half_width: radius,
            half_height: radius,
        }
    }

    fn half_extent(&self, axis: usize) -> f64 {
        // y is the vertical axis
        if axis == 1 {
            self.half_height
        } else {
            self.half_width
        }
    }

    fn min(&self, axis: usize) -> f64 {
        self.centre[axis] - self.half_extent(axis)
    }

    fn max(&self, axis: usize) -> f64 {
        self.centre[axis] + self.half_extent(axis)
    }
}

/// Where the ray origin sits relative to one axis slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quadrant {
    Left,
    Right,
    Middle,
}

/// One collision test against one obstacle. The entry coordinate of the last
/// positive test is cached; a negative test never touches the cache, so a
/// coordinate can only be observed after the call that produced it.
#[derive(Debug)]
pub struct RayBox {
    bounds: BoundingBox,
    collision_coord: Option<Vector3>,
}

impl RayBox {
    pub fn new(centre: Vector3, radius: f64) -> Self {
        Self {
            bounds: BoundingBox::from_radius(centre, radius),
            collision_coord: None,
        }
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Entry coordinate found by the last positive `intersect` call.
    pub fn collision_coordinate(&self) -> Option<Vector3> {
        self.collision_coord
    }

    /// Slab-method intersection test. Returns true when the ray enters the
    /// box, with the entry coordinate cached for `collision_coordinate`.
    pub fn intersect(&mut self, ray: &Ray) -> bool {
        let mut quadrant = [Quadrant::Middle; NUM_AXES];
        let mut candidate_plane = [0.0; NUM_AXES];
        let mut inside = true;

        // Classify the origin against each slab and pick candidate planes
        for axis in 0..NUM_AXES {
            if ray.origin[axis] < self.bounds.min(axis) {
                quadrant[axis] = Quadrant::Left;
                candidate_plane[axis] = self.bounds.min(axis);
                inside = false;
            } else if ray.origin[axis] > self.bounds.max(axis) {
                quadrant[axis] = Quadrant::Right;
                candidate_plane[axis] = self.bounds.max(axis);
                inside = false;
            }
        }

        // Origin inside the box: immediate impact at the origin itself
        if inside {
            self.collision_coord = Some(ray.origin);
            return true;
        }

        // Parametric distance to each candidate plane. A zero direction
        // component means the ray runs parallel to that slab and can never
        // cross its boundary plane: t = -1 marks it non-viable.
        let mut max_t = [-1.0; NUM_AXES];
        for axis in 0..NUM_AXES {
            if quadrant[axis] != Quadrant::Middle && ray.direction[axis] != 0.0 {
                max_t[axis] = (candidate_plane[axis] - ray.origin[axis]) / ray.direction[axis];
            }
        }

        // The entry plane is the last one the ray crosses: largest t wins,
        // ties keep the lowest-indexed axis.
        let mut which_plane = 0;
        for axis in 1..NUM_AXES {
            if max_t[axis] > max_t[which_plane] {
                which_plane = axis;
            }
        }

        // Box behind the ray
        if max_t[which_plane] < 0.0 {
            return false;
        }

        let mut hit = Vector3::zero();
        for axis in 0..NUM_AXES {
            if axis == which_plane {
                hit[axis] = candidate_plane[axis];
            } else {
                hit[axis] = ray.origin[axis] + max_t[which_plane] * ray.direction[axis];
                if hit[axis] < self.bounds.min(axis) || hit[axis] > self.bounds.max(axis) {
                    return false;
                }
            }
        }

        self.collision_coord = Some(hit);
        true
    }
}
