//! BVH traversal (spec.md section 4.3): single-ray explicit-stack DFS and
//! width-8 packet traversal over the implicit [`BvhNode`] layout. Grounded
//! on the teacher's `BVHReference::intersect_front_to_back` (the scalar
//! near/far ordering and early-out shape survive; the fixed primitive
//! payload is replaced with a generic leaf callback so the same traversal
//! serves both the scene-level BVH, whose leaves are objects, and a mesh's
//! local BVH, whose leaves are triangles). Construction (median-split, not
//! SAH) is out of scope per spec.md section 1 but is kept minimal here so
//! the rest of the crate has a finished BVH to traverse; it is grounded on
//! the teacher's centroid-based `BVH::build` in the original `src/bvh.rs`.

use shared_structs::{Aabb, BvhNode, Ray};

use crate::intersection::{intersect_aabb, intersect_aabb_two_sided, intersect_aabb_x8, RaySoa8};
use crate::simd::Vector8f;

/// Result of a nearest-hit query: `primitive_index` is whatever index was
/// passed into `indices` at build time (an object id for the scene BVH, a
/// triangle id for a mesh's local BVH).
#[derive(Debug, Clone, Copy)]
pub struct BvhHit {
    pub distance: f32,
    pub primitive_index: u32,
    pub u: f32,
    pub v: f32,
}

/// Builds an implicit-layout BVH over `aabbs` by recursive median split on
/// the dominant axis of the running centroid bounds (spec.md section 1:
/// construction is out of scope for the core; this exists only so the
/// traversal above has something real to walk). Returns `(nodes, indices)`
/// where `indices[node.first_primitive()..][..node.num_leaves()]` are
/// positions into the original `aabbs` slice.
pub fn build(aabbs: &[Aabb]) -> (Vec<BvhNode>, Vec<u32>) {
    if aabbs.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut indices: Vec<u32> = (0..aabbs.len() as u32).collect();
    let centroids: Vec<_> = aabbs.iter().map(|b| b.centroid()).collect();

    let mut nodes = Vec::with_capacity(aabbs.len() * 2 - 1);
    nodes.push(BvhNode::new_leaf(Aabb::EMPTY, 0, 0, 0));
    build_recursive(&mut nodes, 0, &mut indices, 0, aabbs.len(), aabbs, &centroids, 1);
    (nodes, indices)
}

const LEAF_THRESHOLD: usize = 4;

fn build_recursive(
    nodes: &mut Vec<BvhNode>,
    node_index: usize,
    indices: &mut [u32],
    start: usize,
    end: usize,
    aabbs: &[Aabb],
    centroids: &[glam::Vec3],
    depth: usize,
) {
    let mut bounds = Aabb::EMPTY;
    for &i in &indices[start..end] {
        bounds = bounds.union(aabbs[i as usize]);
    }

    let count = end - start;
    if count <= LEAF_THRESHOLD || depth >= BvhNode::MAX_DEPTH {
        nodes[node_index] = BvhNode::new_leaf(bounds, start as u32, count as u32, 0);
        return;
    }

    let mut centroid_bounds = Aabb::EMPTY;
    for &i in &indices[start..end] {
        centroid_bounds = centroid_bounds.union_point(centroids[i as usize]);
    }
    let axis = centroid_bounds.dominant_axis() as usize;
    let mid = (start + end) / 2;
    indices[start..end].sort_unstable_by(|&a, &b| {
        let ca = centroids[a as usize][axis];
        let cb = centroids[b as usize][axis];
        ca.partial_cmp(&cb).unwrap()
    });

    let left_index = nodes.len();
    nodes.push(BvhNode::new_leaf(Aabb::EMPTY, 0, 0, 0));
    nodes.push(BvhNode::new_leaf(Aabb::EMPTY, 0, 0, 0));
    nodes[node_index] = BvhNode::new_interior(bounds, left_index as u32, axis as u32);

    build_recursive(nodes, left_index, indices, start, mid, aabbs, centroids, depth + 1);
    build_recursive(nodes, left_index + 1, indices, mid, end, aabbs, centroids, depth + 1);
}

/// Single-ray nearest-hit DFS (spec.md section 4.3.1). `test_leaf` is
/// handed each primitive index in a leaf's range and the current ray
/// (whose `t_max` has already been shrunk by any closer hit found so far)
/// and returns `Some((t, u, v))` on a hit.
pub fn traverse_nearest(
    nodes: &[BvhNode],
    indices: &[u32],
    ray: &Ray,
    mut test_leaf: impl FnMut(u32, &Ray) -> Option<(f32, f32, f32)>,
) -> Option<BvhHit> {
    if nodes.is_empty() {
        return None;
    }

    let mut stack = [0u32; BvhNode::MAX_DEPTH];
    let mut stack_len = 0usize;
    let mut node_index = 0u32;
    let mut best: Option<BvhHit> = None;
    let mut ray = *ray;

    loop {
        let node = nodes[node_index as usize];
        if node.is_leaf() {
            let first = node.first_primitive();
            for i in 0..node.num_leaves() {
                let prim = indices[(first + i) as usize];
                if let Some((t, u, v)) = test_leaf(prim, &ray) {
                    if t > 0.0 && t <= ray.t_max {
                        ray.t_max = t;
                        best = Some(BvhHit { distance: t, primitive_index: prim, u, v });
                    }
                }
            }
        } else {
            let left = node.left_child();
            let right = node.right_child();
            let left_near = intersect_aabb(&ray, &nodes[left as usize].aabb());
            let right_near = intersect_aabb(&ray, &nodes[right as usize].aabb());

            match (left_near, right_near) {
                (Some(ln), Some(rn)) => {
                    let (near_child, near_t, far_child, far_t) = if ln <= rn {
                        (left, ln, right, rn)
                    } else {
                        (right, rn, left, ln)
                    };
                    if far_t <= ray.t_max {
                        stack[stack_len] = far_child;
                        stack_len += 1;
                    }
                    let _ = near_t;
                    node_index = near_child;
                    continue;
                }
                (Some(_), None) => {
                    node_index = left;
                    continue;
                }
                (None, Some(_)) => {
                    node_index = right;
                    continue;
                }
                (None, None) => {}
            }
        }

        if stack_len == 0 {
            break;
        }
        stack_len -= 1;
        node_index = stack[stack_len];
    }

    best
}

/// Shadow-ray traversal: returns on the first hit with `t < ray.t_max`, no
/// child ordering needed (spec.md section 4.3.1).
pub fn traverse_any(
    nodes: &[BvhNode],
    indices: &[u32],
    ray: &Ray,
    mut test_leaf: impl FnMut(u32, &Ray) -> Option<f32>,
) -> bool {
    if nodes.is_empty() {
        return false;
    }

    let mut stack = [0u32; BvhNode::MAX_DEPTH];
    let mut stack_len = 0usize;
    let mut node_index = 0u32;

    loop {
        let node = nodes[node_index as usize];
        if node.is_leaf() {
            let first = node.first_primitive();
            for i in 0..node.num_leaves() {
                let prim = indices[(first + i) as usize];
                if let Some(t) = test_leaf(prim, ray) {
                    if t > 0.0 && t < ray.t_max {
                        return true;
                    }
                }
            }
        } else {
            let left = node.left_child();
            let right = node.right_child();
            if intersect_aabb_two_sided(ray, &nodes[left as usize].aabb()).is_some() {
                stack[stack_len] = left;
                stack_len += 1;
            }
            if intersect_aabb_two_sided(ray, &nodes[right as usize].aabb()).is_some() {
                stack[stack_len] = right;
                stack_len += 1;
            }
        }

        if stack_len == 0 {
            return false;
        }
        stack_len -= 1;
        node_index = stack[stack_len];
    }
}

/// One group of up to 8 rays for packet traversal (spec.md section 4.3.2).
/// `ray_offsets` is the only link back to the original packet index after
/// reordering — every operation below must preserve it alongside the rays
/// it describes (spec.md section 9, "Packet traversal coherence").
#[derive(Debug, Clone)]
pub struct RayGroup {
    pub rays: [Ray; 8],
    pub max_distances: [f32; 8],
    pub ray_offsets: [u32; 8],
    pub active_mask: u8,
}

impl RayGroup {
    pub fn active_count(&self) -> u32 {
        self.active_mask.count_ones()
    }
}

/// Compacts `groups` in place: groups with zero active lanes are moved to
/// the end of the slice. Returns the number of groups that still have at
/// least one active ray.
pub fn compact_groups(groups: &mut [RayGroup]) -> usize {
    let mut write = 0usize;
    for read in 0..groups.len() {
        if groups[read].active_mask != 0 {
            groups.swap(write, read);
            write += 1;
        }
    }
    write
}

/// If utilization across `groups[..active_groups]` drops below 50%
/// (`4 * active_groups >= total_active_rays`, spec.md section 4.3.2),
/// physically swaps rays so that live lanes pack into the front groups
/// densely, shrinking the active group count accordingly. Returns the new
/// active group count.
pub fn reorder_rays(groups: &mut [RayGroup], active_groups: usize) -> usize {
    let total_active: u32 = groups[..active_groups].iter().map(RayGroup::active_count).sum();
    if total_active == 0 {
        return 0;
    }
    if 4 * active_groups as u32 >= total_active {
        return compact_after_reorder(groups, active_groups, total_active);
    }
    active_groups
}

fn compact_after_reorder(groups: &mut [RayGroup], active_groups: usize, total_active: u32) -> usize {
    let mut flat_rays = Vec::with_capacity(total_active as usize);
    let mut flat_offsets = Vec::with_capacity(total_active as usize);
    let mut flat_distances = Vec::with_capacity(total_active as usize);

    for group in groups[..active_groups].iter() {
        for lane in 0..8 {
            if group.active_mask & (1 << lane) != 0 {
                flat_rays.push(group.rays[lane]);
                flat_offsets.push(group.ray_offsets[lane]);
                flat_distances.push(group.max_distances[lane]);
            }
        }
    }

    let new_group_count = ((total_active as usize) + 7) / 8;
    for g in 0..new_group_count {
        let base = g * 8;
        let lanes_here = (flat_rays.len() - base).min(8);
        let mut mask = 0u8;
        for lane in 0..lanes_here {
            groups[g].rays[lane] = flat_rays[base + lane];
            groups[g].ray_offsets[lane] = flat_offsets[base + lane];
            groups[g].max_distances[lane] = flat_distances[base + lane];
            mask |= 1 << lane;
        }
        groups[g].active_mask = mask;
    }
    for g in groups.iter_mut().skip(new_group_count).take(active_groups.saturating_sub(new_group_count)) {
        g.active_mask = 0;
    }
    new_group_count
}

fn ray_group_to_soa(group: &RayGroup) -> RaySoa8 {
    let mut origin = [[0.0f32; 8]; 3];
    let mut dir = [[0.0f32; 8]; 3];
    let mut inv_dir = [[0.0f32; 8]; 3];
    let mut origin_div_dir = [[0.0f32; 8]; 3];
    let mut t_max = [0.0f32; 8];
    for lane in 0..8 {
        let ray = &group.rays[lane];
        for axis in 0..3 {
            origin[axis][lane] = ray.origin[axis];
            dir[axis][lane] = ray.direction[axis];
            inv_dir[axis][lane] = ray.inv_dir[axis];
            origin_div_dir[axis][lane] = ray.origin_div_dir[axis];
        }
        t_max[lane] = group.max_distances[lane];
    }
    RaySoa8 {
        origin: std::array::from_fn(|axis| Vector8f::from_array(origin[axis])),
        dir: std::array::from_fn(|axis| Vector8f::from_array(dir[axis])),
        inv_dir: std::array::from_fn(|axis| Vector8f::from_array(inv_dir[axis])),
        origin_div_dir: std::array::from_fn(|axis| Vector8f::from_array(origin_div_dir[axis])),
        t_max: Vector8f::from_array(t_max),
    }
}

/// Width-8 packet traversal (spec.md section 4.3.2). `groups` is consumed
/// (not borrowed) because a stack frame must own a snapshot of the group
/// state at the point a node was pushed: both children of an interior node
/// inherit the same surviving-ray set and independently narrow it against
/// their own AABB when popped. `test_leaf` mirrors `traverse_nearest`'s
/// per-primitive callback. Returns one slot per original packet ray,
/// indexed by `ray_offsets` (spec.md section 9, "Packet traversal
/// coherence") rather than by final group/lane position.
pub fn traverse_packet(
    nodes: &[BvhNode],
    indices: &[u32],
    mut groups: Vec<RayGroup>,
    mut test_leaf: impl FnMut(u32, &Ray) -> Option<(f32, f32, f32)>,
) -> Vec<Option<BvhHit>> {
    let total_rays = groups.len() * 8;
    let mut results: Vec<Option<BvhHit>> = vec![None; total_rays];
    if nodes.is_empty() || groups.is_empty() {
        return results;
    }

    let mut active_groups = groups.len();
    let mut stack: Vec<(u32, Vec<RayGroup>, usize)> = Vec::new();
    let mut node_index = 0u32;

    loop {
        let node = nodes[node_index as usize];
        let aabb = node.aabb();

        // Step 1: intersect the node AABB against every active group,
        // narrowing each lane's mask to rays that can still reach it.
        let mut total_hits = 0u32;
        for group in groups[..active_groups].iter_mut() {
            let soa = ray_group_to_soa(group);
            let (hit, _t_near) = intersect_aabb_x8(&soa, &aabb);
            group.active_mask &= hit.move_mask() as u8;
            total_hits += group.active_mask.count_ones();
        }

        // Step 2: zero hits across the whole packet, this subtree is dead.
        if total_hits == 0 {
            match stack.pop() {
                Some((next_node, next_groups, next_active)) => {
                    node_index = next_node;
                    groups = next_groups;
                    active_groups = next_active;
                    continue;
                }
                None => break,
            }
        }

        // Step 3: compact dead groups to the back, then repack lanes across
        // groups if utilization has dropped below 50%.
        active_groups = compact_groups(&mut groups[..active_groups]);
        active_groups = reorder_rays(&mut groups, active_groups);

        if node.is_leaf() {
            // Step 4: leaf dispatch — every surviving lane tests every
            // primitive in the leaf's range, same inner loop as the
            // single-ray traversal but over each active lane of each group.
            let first = node.first_primitive();
            for group in groups[..active_groups].iter_mut() {
                for lane in 0..8 {
                    if group.active_mask & (1 << lane) == 0 {
                        continue;
                    }
                    let mut ray = group.rays[lane];
                    ray.t_max = group.max_distances[lane];
                    for i in 0..node.num_leaves() {
                        let prim = indices[(first + i) as usize];
                        if let Some((t, u, v)) = test_leaf(prim, &ray) {
                            if t > 0.0 && t <= ray.t_max {
                                ray.t_max = t;
                                group.max_distances[lane] = t;
                                let offset = group.ray_offsets[lane] as usize;
                                results[offset] = Some(BvhHit { distance: t, primitive_index: prim, u, v });
                            }
                        }
                    }
                }
            }
            match stack.pop() {
                Some((next_node, next_groups, next_active)) => {
                    node_index = next_node;
                    groups = next_groups;
                    active_groups = next_active;
                    continue;
                }
                None => break,
            }
        } else {
            // Step 5: push both children, ordered by the node's split axis
            // as a coherence heuristic — individual rays in the packet may
            // disagree on which child is actually nearer, so each child
            // re-tests the inherited snapshot against its own AABB when
            // popped rather than trusting this ordering for correctness.
            let left = node.left_child();
            let right = node.right_child();
            let snapshot = groups[..active_groups].to_vec();
            if node.split_axis() % 2 == 0 {
                stack.push((right, snapshot, active_groups));
                node_index = left;
            } else {
                stack.push((left, snapshot, active_groups));
                node_index = right;
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use shared_structs::Ray;

    fn aabbs_for_grid() -> Vec<Aabb> {
        (0..16)
            .map(|i| {
                let x = i as f32 * 2.0;
                Aabb::new(Vec3::new(x, -0.5, -0.5), Vec3::new(x + 1.0, 0.5, 0.5))
            })
            .collect()
    }

    #[test]
    fn build_produces_a_leaf_for_every_primitive() {
        let aabbs = aabbs_for_grid();
        let (nodes, indices) = build(&aabbs);
        assert_eq!(indices.len(), aabbs.len());
        let mut covered = vec![false; aabbs.len()];
        for node in &nodes {
            if node.is_leaf() {
                for i in 0..node.num_leaves() {
                    covered[indices[(node.first_primitive() + i) as usize] as usize] = true;
                }
            }
        }
        assert!(covered.iter().all(|&c| c));
    }

    #[test]
    fn traverse_nearest_finds_closest_box() {
        let aabbs = aabbs_for_grid();
        let (nodes, indices) = build(&aabbs);
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), f32::INFINITY);
        let hit = traverse_nearest(&nodes, &indices, &ray, |prim, r| {
            intersect_aabb(r, &aabbs[prim as usize]).map(|t| (t, 0.0, 0.0))
        });
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().primitive_index, 0);
    }

    #[test]
    fn traverse_nearest_on_empty_bvh_returns_none() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X, f32::INFINITY);
        let hit = traverse_nearest(&[], &[], &ray, |_, _| None);
        assert!(hit.is_none());
    }

    #[test]
    fn traverse_any_returns_early_on_first_hit() {
        let aabbs = aabbs_for_grid();
        let (nodes, indices) = build(&aabbs);
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), f32::INFINITY);
        assert!(traverse_any(&nodes, &indices, &ray, |prim, r| {
            intersect_aabb(r, &aabbs[prim as usize])
        }));
    }

    fn dummy_group(offsets: [u32; 8], mask: u8) -> RayGroup {
        RayGroup {
            rays: [Ray::new(Vec3::ZERO, Vec3::X, f32::INFINITY); 8],
            max_distances: [f32::INFINITY; 8],
            ray_offsets: offsets,
            active_mask: mask,
        }
    }

    #[test]
    fn compact_groups_moves_empty_groups_to_the_end() {
        let mut groups = vec![
            dummy_group([0, 1, 2, 3, 4, 5, 6, 7], 0b0000_0000),
            dummy_group([8, 9, 10, 11, 12, 13, 14, 15], 0b1111_1111),
        ];
        let active = compact_groups(&mut groups);
        assert_eq!(active, 1);
        assert_eq!(groups[0].ray_offsets[0], 8);
    }

    #[test]
    fn reorder_preserves_ray_offsets_after_packing() {
        let mut groups = vec![
            dummy_group([0, 1, 2, 3, 4, 5, 6, 7], 0b0000_0001), // only lane 0 alive: offset 0
            dummy_group([8, 9, 10, 11, 12, 13, 14, 15], 0b0000_0010), // only lane 1 alive: offset 9
        ];
        let new_count = reorder_rays(&mut groups, 2);
        assert_eq!(new_count, 1);
        let mut surviving_offsets: Vec<u32> = (0..8)
            .filter(|&lane| groups[0].active_mask & (1 << lane) != 0)
            .map(|lane| groups[0].ray_offsets[lane])
            .collect();
        surviving_offsets.sort();
        assert_eq!(surviving_offsets, vec![0, 9]);
    }

    fn groups_from_rays(rays: &[Ray]) -> Vec<RayGroup> {
        rays.chunks(8)
            .enumerate()
            .map(|(group_index, chunk)| {
                let mut group_rays = [Ray::new(Vec3::ZERO, Vec3::X, 0.0); 8];
                let mut max_distances = [0.0f32; 8];
                let mut ray_offsets = [0u32; 8];
                let mut mask = 0u8;
                for (lane, ray) in chunk.iter().enumerate() {
                    group_rays[lane] = *ray;
                    max_distances[lane] = ray.t_max;
                    ray_offsets[lane] = (group_index * 8 + lane) as u32;
                    mask |= 1 << lane;
                }
                RayGroup {
                    rays: group_rays,
                    max_distances,
                    ray_offsets,
                    active_mask: mask,
                }
            })
            .collect()
    }

    #[test]
    fn traverse_packet_matches_traverse_nearest_for_each_ray() {
        let aabbs = aabbs_for_grid();
        let (nodes, indices) = build(&aabbs);
        let rays: Vec<Ray> = (0..16)
            .map(|i| {
                let x = i as f32 * 2.0;
                Ray::new(Vec3::new(x + 0.5, -10.0, 0.0), Vec3::new(0.0, 1.0, 0.0), f32::INFINITY)
            })
            .collect();
        let groups = groups_from_rays(&rays);
        let leaf_test = |prim: u32, r: &Ray| intersect_aabb(r, &aabbs[prim as usize]).map(|t| (t, 0.0, 0.0));
        let results = traverse_packet(&nodes, &indices, groups, leaf_test);

        for (i, ray) in rays.iter().enumerate() {
            let scalar = traverse_nearest(&nodes, &indices, ray, leaf_test);
            match (results[i].as_ref(), scalar.as_ref()) {
                (Some(p), Some(s)) => {
                    assert_eq!(p.primitive_index, s.primitive_index);
                    assert!((p.distance - s.distance).abs() < 1e-4);
                }
                (None, None) => {}
                other => panic!("packet/scalar mismatch at ray {i}: {other:?}"),
            }
        }
    }

    #[test]
    fn traverse_packet_preserves_ray_offsets_when_some_rays_miss() {
        let aabbs = aabbs_for_grid();
        let (nodes, indices) = build(&aabbs);
        let mut rays = vec![Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), f32::INFINITY); 4];
        rays.extend(
            std::iter::repeat(Ray::new(Vec3::new(0.0, 100.0, 0.0), Vec3::new(0.0, 1.0, 0.0), f32::INFINITY))
                .take(4),
        );
        let groups = groups_from_rays(&rays);
        let results = traverse_packet(&nodes, &indices, groups, |prim, r| {
            intersect_aabb(r, &aabbs[prim as usize]).map(|t| (t, 0.0, 0.0))
        });

        for result in &results[0..4] {
            assert_eq!(result.as_ref().unwrap().primitive_index, 0);
        }
        for result in &results[4..8] {
            assert!(result.is_none());
        }
    }

    #[test]
    fn traverse_packet_on_empty_groups_returns_no_results() {
        let aabbs = aabbs_for_grid();
        let (nodes, indices) = build(&aabbs);
        let results = traverse_packet(&nodes, &indices, Vec::new(), |prim, r| {
            intersect_aabb(r, &aabbs[prim as usize]).map(|t| (t, 0.0, 0.0))
        });
        assert!(results.is_empty());
    }
}
