//! Narrow-phase tests: planar circles, cell walls with door gaps, and
//! oriented boxes (point, segment and box-box separating axis tests).

use crate::map::{cell_of, MapGrid};
use crate::{CELL_SIZE, DOOR_GAP_MAX, DOOR_GAP_MIN, DOOR_HEIGHT};
use glam::{Mat3, Vec3};

const SAT_EPSILON: f32 = 1e-6;

/// Planar (XZ) overlap of two circles whose radii sum to `combined`.
#[inline]
pub fn circles_overlap(a: Vec3, b: Vec3, combined: f32) -> bool {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz < combined * combined
}

/// Separating direction (planar, from `b` towards `a`) and penetration
/// depth of two overlapping circles.
pub fn circle_separation(a: Vec3, b: Vec3, combined: f32) -> Option<(Vec3, f32)> {
    if !circles_overlap(a, b, combined) {
        return None;
    }
    let delta = Vec3::new(a.x - b.x, 0.0, a.z - b.z);
    let dist = delta.length();
    if dist < 1e-4 {
        // Coincident centres; pick an arbitrary axis.
        return Some((Vec3::X, combined));
    }
    Some((delta / dist, combined - dist))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    NegX,
    PosX,
    NegZ,
    PosZ,
}

/// Open interval of cell-local offsets a door leaves passable.
#[inline]
pub fn in_door_gap(offset: f32) -> bool {
    offset > DOOR_GAP_MIN && offset < DOOR_GAP_MAX
}

/// Whether the wall on `face` of cell `(ix, iz)` stops something at the
/// given transverse cell-local offset with its feet at height `y`.
pub fn face_blocks(map: &MapGrid, ix: i32, iz: i32, face: Face, transverse: f32, y: f32) -> bool {
    let (nx, nz, door) = match face {
        Face::NegX => (ix - 1, iz, map.has_door_x(ix - 1, iz)),
        Face::PosX => (ix + 1, iz, map.has_door_x(ix, iz)),
        Face::NegZ => (ix, iz - 1, map.has_door_z(ix, iz - 1)),
        Face::PosZ => (ix, iz + 1, map.has_door_z(ix, iz)),
    };
    if !map.is_inside(ix, iz) && !map.is_inside(nx, nz) {
        return false;
    }
    !(door && y < DOOR_HEIGHT && in_door_gap(transverse))
}

/// Minimal positional push that moves a circle of `radius` back out of
/// every blocking face of the cell it is in. Zero when nothing blocks.
pub fn wall_correction(map: &MapGrid, pos: Vec3, radius: f32) -> Vec3 {
    let ix = cell_of(pos.x);
    let iz = cell_of(pos.z);
    let offx = pos.x - ix as f32 * CELL_SIZE;
    let offz = pos.z - iz as f32 * CELL_SIZE;
    let mut push = Vec3::ZERO;

    if offx < radius {
        if face_blocks(map, ix, iz, Face::NegX, offz, pos.y) {
            push.x = radius - offx;
        }
    } else if offx > CELL_SIZE - radius && face_blocks(map, ix, iz, Face::PosX, offz, pos.y) {
        push.x = CELL_SIZE - radius - offx;
    }

    if offz < radius {
        if face_blocks(map, ix, iz, Face::NegZ, offx, pos.y) {
            push.z = radius - offz;
        }
    } else if offz > CELL_SIZE - radius && face_blocks(map, ix, iz, Face::PosZ, offx, pos.y) {
        push.z = CELL_SIZE - radius - offz;
    }

    push
}

/// Oriented bounding box: centre, orthonormal basis (columns are the
/// local X/Y/Z axes in world space) and half-extents along those axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    pub basis: Mat3,
    pub half_extents: Vec3,
}

impl Obb {
    pub fn new(center: Vec3, basis: Mat3, half_extents: Vec3) -> Self {
        Self {
            center,
            basis,
            half_extents,
        }
    }

    pub fn axis_aligned(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(center, Mat3::IDENTITY, half_extents)
    }

    /// Box whose local X axis points along heading `yaw`, i.e. towards
    /// `(cos yaw, 0, sin yaw)`, then pitched about its local Z and rolled
    /// about its local X.
    pub fn from_rotations(center: Vec3, yaw: f32, pitch: f32, roll: f32, half_extents: Vec3) -> Self {
        let basis = Mat3::from_rotation_y(-yaw) * Mat3::from_rotation_z(pitch) * Mat3::from_rotation_x(roll);
        Self::new(center, basis, half_extents)
    }

    pub fn from_yaw(center: Vec3, yaw: f32, half_extents: Vec3) -> Self {
        Self::from_rotations(center, yaw, 0.0, 0.0, half_extents)
    }

    #[inline]
    pub fn axis(&self, i: usize) -> Vec3 {
        self.basis.col(i)
    }

    /// World direction expressed in box-local coordinates.
    #[inline]
    pub fn direction_to_local(&self, d: Vec3) -> Vec3 {
        Vec3::new(d.dot(self.axis(0)), d.dot(self.axis(1)), d.dot(self.axis(2)))
    }

    #[inline]
    pub fn to_local(&self, p: Vec3) -> Vec3 {
        self.direction_to_local(p - self.center)
    }

    #[inline]
    pub fn from_local(&self, local: Vec3) -> Vec3 {
        self.center + self.basis * local
    }

    /// Highest world-space Y reached by the box.
    pub fn top(&self) -> f32 {
        let e = self.half_extents;
        self.center.y
            + self.axis(0).y.abs() * e.x
            + self.axis(1).y.abs() * e.y
            + self.axis(2).y.abs() * e.z
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        let local = self.to_local(p).abs();
        let e = self.half_extents;
        local.x <= e.x && local.y <= e.y && local.z <= e.z
    }

    /// Segment from `start` to `start + delta` against the box: the three
    /// box axes, then the segment direction crossed with each box axis.
    pub fn intersects_segment(&self, start: Vec3, delta: Vec3) -> bool {
        let e = self.half_extents;
        let half = self.direction_to_local(delta * 0.5);
        let mid = self.to_local(start + delta * 0.5);
        let mut ah = half.abs();

        if mid.x.abs() > e.x + ah.x || mid.y.abs() > e.y + ah.y || mid.z.abs() > e.z + ah.z {
            return false;
        }

        // Guard against a near-parallel segment making the cross axes vanish.
        ah += Vec3::splat(SAT_EPSILON);

        if (mid.y * half.z - mid.z * half.y).abs() > e.y * ah.z + e.z * ah.y {
            return false;
        }
        if (mid.z * half.x - mid.x * half.z).abs() > e.x * ah.z + e.z * ah.x {
            return false;
        }
        if (mid.x * half.y - mid.y * half.x).abs() > e.x * ah.y + e.y * ah.x {
            return false;
        }
        true
    }

    /// 15-axis separating axis test. True iff no separating axis exists.
    pub fn intersects_obb(&self, other: &Obb) -> bool {
        let ea = self.half_extents.to_array();
        let eb = other.half_extents.to_array();

        let mut r = [[0.0f32; 3]; 3];
        let mut abs_r = [[0.0f32; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                r[i][j] = self.axis(i).dot(other.axis(j));
                abs_r[i][j] = r[i][j].abs() + SAT_EPSILON;
            }
        }
        let t = self.to_local(other.center).to_array();

        for i in 0..3 {
            let rb = eb[0] * abs_r[i][0] + eb[1] * abs_r[i][1] + eb[2] * abs_r[i][2];
            if t[i].abs() > ea[i] + rb {
                return false;
            }
        }

        for j in 0..3 {
            let ra = ea[0] * abs_r[0][j] + ea[1] * abs_r[1][j] + ea[2] * abs_r[2][j];
            let dist = t[0] * r[0][j] + t[1] * r[1][j] + t[2] * r[2][j];
            if dist.abs() > ra + eb[j] {
                return false;
            }
        }

        for i in 0..3 {
            let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
            for j in 0..3 {
                let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
                let ra = ea[i1] * abs_r[i2][j] + ea[i2] * abs_r[i1][j];
                let rb = eb[j1] * abs_r[i][j2] + eb[j2] * abs_r[i][j1];
                let dist = t[i2] * r[i1][j] - t[i1] * r[i2][j];
                if dist.abs() > ra + rb {
                    return false;
                }
            }
        }

        true
    }
}
