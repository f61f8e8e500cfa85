use crate::{error::SceneError, Aabb};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::io::{Read, Write};

/// Implicit-layout BVH node: a parent's two children sit contiguously at
/// `child_index` and `child_index + 1`. 32 bytes, matching spec.md section 3.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BvhNode {
    pub min: [f32; 3],
    pub child_index: u32,
    pub max: [f32; 3],
    /// Low 30 bits: `num_leaves` (0 => interior node). High 2 bits: the
    /// axis the builder split on, used to pick front-to-back child order.
    packed: u32,
}

const NUM_LEAVES_MASK: u32 = 0x3FFF_FFFF;
const SPLIT_AXIS_SHIFT: u32 = 30;

impl BvhNode {
    pub const MAX_DEPTH: usize = 128;

    pub fn new_interior(aabb: Aabb, child_index: u32, split_axis: u32) -> Self {
        debug_assert!(split_axis < 3);
        Self {
            min: aabb.min.to_array(),
            max: aabb.max.to_array(),
            child_index,
            packed: (split_axis & 0x3) << SPLIT_AXIS_SHIFT,
        }
    }

    pub fn new_leaf(aabb: Aabb, first_primitive: u32, num_leaves: u32, split_axis: u32) -> Self {
        debug_assert!(num_leaves > 0 && num_leaves <= NUM_LEAVES_MASK);
        debug_assert!(split_axis < 3);
        Self {
            min: aabb.min.to_array(),
            max: aabb.max.to_array(),
            child_index: first_primitive,
            packed: (num_leaves & NUM_LEAVES_MASK) | ((split_axis & 0x3) << SPLIT_AXIS_SHIFT),
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(Vec3::from_array(self.min), Vec3::from_array(self.max))
    }

    pub fn is_leaf(&self) -> bool {
        self.num_leaves() != 0
    }

    pub fn num_leaves(&self) -> u32 {
        self.packed & NUM_LEAVES_MASK
    }

    pub fn split_axis(&self) -> u32 {
        self.packed >> SPLIT_AXIS_SHIFT
    }

    /// First primitive index, valid only when `is_leaf()`.
    pub fn first_primitive(&self) -> u32 {
        self.child_index
    }

    /// Index of the left child; the right child is `child_index + 1`.
    /// Valid only when `!is_leaf()`.
    pub fn left_child(&self) -> u32 {
        self.child_index
    }

    pub fn right_child(&self) -> u32 {
        self.child_index + 1
    }
}

/// `"RTBVH001"` — spec.md section 6, BVH on-disk format.
pub const BVH_MAGIC: [u8; 8] = *b"RTBVH001";

/// Serializes nodes in the little-endian on-disk layout: an 8-byte magic,
/// a `u32` node count, a reserved `u32`, then `node_count` 32-byte nodes.
pub fn write_bvh<W: Write>(mut w: W, nodes: &[BvhNode]) -> std::io::Result<()> {
    w.write_all(&BVH_MAGIC)?;
    w.write_all(&(nodes.len() as u32).to_le_bytes())?;
    w.write_all(&0u32.to_le_bytes())?;
    w.write_all(bytemuck::cast_slice(nodes))?;
    Ok(())
}

pub fn read_bvh<R: Read>(mut r: R) -> Result<Vec<BvhNode>, SceneError> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)
        .map_err(|e| SceneError::Io(e.to_string()))?;
    if magic != BVH_MAGIC {
        return Err(SceneError::MalformedBvh("bad magic".into()));
    }
    let mut count_buf = [0u8; 4];
    r.read_exact(&mut count_buf)
        .map_err(|e| SceneError::Io(e.to_string()))?;
    let node_count = u32::from_le_bytes(count_buf) as usize;
    let mut reserved = [0u8; 4];
    r.read_exact(&mut reserved)
        .map_err(|e| SceneError::Io(e.to_string()))?;

    let mut bytes = vec![0u8; node_count * std::mem::size_of::<BvhNode>()];
    r.read_exact(&mut bytes)
        .map_err(|e| SceneError::Io(e.to_string()))?;
    Ok(bytemuck::cast_slice(&bytes).to_vec())
}

/// `BVH::CalculateStats` from the original renderer: walks the tree and
/// emits aggregate shape statistics (spec.md section 6).
#[derive(Debug, Clone, Default)]
pub struct BvhStats {
    pub max_depth: u32,
    pub total_area: f64,
    pub total_volume: f64,
    pub leaves_count_histogram: Vec<u32>,
}

pub fn calculate_stats(nodes: &[BvhNode]) -> BvhStats {
    let mut stats = BvhStats::default();
    if nodes.is_empty() {
        return stats;
    }
    calculate_stats_for_node(nodes, 0, 0, &mut stats);
    stats
}

fn calculate_stats_for_node(nodes: &[BvhNode], node: usize, depth: u32, stats: &mut BvhStats) {
    let n = &nodes[node];
    stats.max_depth = stats.max_depth.max(depth);
    stats.total_area += n.aabb().surface_area() as f64;
    stats.total_volume += n.aabb().volume() as f64;

    if n.is_leaf() {
        let leaves = n.num_leaves() as usize;
        if stats.leaves_count_histogram.len() <= leaves {
            stats.leaves_count_histogram.resize(leaves + 1, 0);
        }
        stats.leaves_count_histogram[leaves] += 1;
    } else {
        calculate_stats_for_node(nodes, n.left_child() as usize, depth + 1, stats);
        calculate_stats_for_node(nodes, n.right_child() as usize, depth + 1, stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_nodes() -> Vec<BvhNode> {
        let root_box = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let left_box = Aabb::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::ZERO);
        let right_box = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0));
        vec![
            BvhNode::new_interior(root_box, 1, 0),
            BvhNode::new_leaf(left_box, 0, 1, 0),
            BvhNode::new_leaf(right_box, 1, 1, 0),
        ]
    }

    #[test]
    fn save_load_round_trip_is_node_for_node_equal() {
        let nodes = sample_nodes();
        let mut buf = Vec::new();
        write_bvh(&mut buf, &nodes).unwrap();
        let loaded = read_bvh(std::io::Cursor::new(buf)).unwrap();
        assert_eq!(nodes, loaded);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let bytes = vec![0u8; 16];
        assert!(read_bvh(std::io::Cursor::new(bytes)).is_err());
    }

    #[test]
    fn stats_count_two_leaves_at_depth_one() {
        let nodes = sample_nodes();
        let stats = calculate_stats(&nodes);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.leaves_count_histogram.get(1).copied().unwrap_or(0), 2);
    }

    #[test]
    fn empty_tree_has_no_crash() {
        let stats = calculate_stats(&[]);
        assert_eq!(stats.max_depth, 0);
    }
}
