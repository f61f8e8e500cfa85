use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// One triangle's vertex indices plus its material index, packed the way
/// the teacher packs `index_buffer: &[UVec4]` (`x,y,z` = vertex indices,
/// `w` = material index).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VertexIndices {
    pub i0: u32,
    pub i1: u32,
    pub i2: u32,
    pub material_index: u32,
}

/// Cold per-vertex shading data (normal, tangent, uv) — kept out of the
/// hot intersection path's cache lines, matching spec.md section 3's
/// `VertexShadingData`. The teacher's `PerVertexData` interleaves the
/// position in with this; this port keeps positions in their own
/// tightly-packed array instead (see `VertexBuffer`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerVertexData {
    pub normal: Vec3,
    _pad0: f32,
    pub tangent: Vec3,
    _pad1: f32,
    pub uv: Vec2,
    _pad2: [f32; 2],
}

impl PerVertexData {
    pub fn new(normal: Vec3, tangent: Vec3, uv: Vec2) -> Self {
        Self {
            normal,
            _pad0: 0.0,
            tangent,
            _pad1: 0.0,
            uv,
            _pad2: [0.0; 2],
        }
    }
}

/// A single owning arena for a triangle mesh: positions, packed indices,
/// and per-vertex shading data, laid out so cold shading data never has
/// to be touched on the hot intersection path (spec.md section 3).
#[derive(Debug, Clone, Default)]
pub struct VertexBuffer {
    pub positions: Vec<Vec3>,
    pub indices: Vec<VertexIndices>,
    pub shading: Vec<PerVertexData>,
}

impl VertexBuffer {
    pub fn new(positions: Vec<Vec3>, indices: Vec<VertexIndices>, shading: Vec<PerVertexData>) -> Self {
        debug_assert_eq!(positions.len(), shading.len());
        Self {
            positions,
            indices,
            shading,
        }
    }

    pub fn triangle_positions(&self, tri: usize) -> (Vec3, Vec3, Vec3) {
        let idx = self.indices[tri];
        (
            self.positions[idx.i0 as usize],
            self.positions[idx.i1 as usize],
            self.positions[idx.i2 as usize],
        )
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len()
    }
}
