//! Assemble ChESS corners into a regular checkerboard grid.
//!
//! Each corner gets at most one neighbour per image direction (right, left,
//! up, down). A neighbour must sit at roughly 45 degrees to both corner
//! orientations (ChESS orientations follow the square diagonals) and the two
//! orientations must be roughly orthogonal. Edges are kept only when both
//! ends agree, then BFS over the largest component yields integer grid
//! coordinates.

use std::collections::{HashMap, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::CheckerboardSpec;

/// Corner candidate in image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Corner {
    pub position: Point2<f32>,
    /// Diagonal direction in radians, defined modulo pi.
    pub orientation: f32,
    pub strength: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridGraphParams {
    pub k_neighbors: usize,
    pub orientation_tolerance_deg: f32,
    /// Absolute spacing window in pixels.
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    /// Neighbour distance relative to the corner's nearest neighbour.
    pub max_spacing_ratio: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
            min_spacing_pix: 4.0,
            max_spacing_pix: 400.0,
            max_spacing_ratio: 2.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    fn opposite(self) -> Self {
        match self {
            NeighborDirection::Right => NeighborDirection::Left,
            NeighborDirection::Left => NeighborDirection::Right,
            NeighborDirection::Up => NeighborDirection::Down,
            NeighborDirection::Down => NeighborDirection::Up,
        }
    }

    fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            NeighborDirection::Right => 0,
            NeighborDirection::Left => 1,
            NeighborDirection::Up => 2,
            NeighborDirection::Down => 3,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Absolute angle difference in `[0, pi]`.
fn angle_diff_abs(a: f32, b: f32) -> f32 {
    let two_pi = 2.0 * PI;
    let mut diff = (b - a).rem_euclid(two_pi);
    if diff >= PI {
        diff -= two_pi;
    }
    diff.abs()
}

/// Angle between an undirected axis and a directed vector, in `[0, pi/2]`.
fn axis_vec_diff(axis_angle: f32, vec_angle: f32) -> f32 {
    let d = angle_diff_abs(axis_angle, vec_angle);
    d.min(PI - d)
}

fn direction_quadrant(v: &Vector2<f32>) -> NeighborDirection {
    if v.x.abs() > v.y.abs() {
        if v.x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if v.y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn evaluate_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    spacing_limit: f32,
    params: &GridGraphParams,
) -> Option<NodeNeighbor> {
    let tol = params.orientation_tolerance_deg.to_radians();

    // Orientations are modulo pi, so "orthogonal" means a difference near pi/2 after folding.
    let ori_diff = axis_vec_diff(corner.orientation, neighbor.orientation);
    let score_orientation = (FRAC_PI_2 - ori_diff).abs();
    if score_orientation > tol {
        return None;
    }

    let v = neighbor.position - corner.position;
    let distance = v.norm();
    if distance < params.min_spacing_pix
        || distance > params.max_spacing_pix
        || distance > spacing_limit
    {
        return None;
    }

    let edge_angle = v.y.atan2(v.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tol || score_neighbor > tol {
        return None;
    }

    Some(NodeNeighbor {
        direction: direction_quadrant(&v),
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbour per direction: lowest score, then shortest.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> [Option<NodeNeighbor>; 4] {
    let mut best: [Option<NodeNeighbor>; 4] = [None; 4];
    for candidate in candidates {
        let slot = &mut best[candidate.direction.slot()];
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }
    best
}

pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        if corners.len() < 2 {
            return Self {
                neighbors: vec![Vec::new(); corners.len()],
            };
        }

        let coords: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree: KdTree<f32, 2> = (&coords).into();

        let mut slots = Vec::with_capacity(corners.len());
        for (i, corner) in corners.iter().enumerate() {
            let query = [corner.position.x, corner.position.y];
            let results = tree.nearest_n::<SquaredEuclidean>(&query, params.k_neighbors + 1);

            let nearest = results
                .iter()
                .filter(|nn| nn.item as usize != i)
                .map(|nn| nn.distance.sqrt())
                .fold(f32::INFINITY, f32::min);
            let spacing_limit = nearest * params.max_spacing_ratio;

            let candidates = results
                .into_iter()
                .filter(|nn| nn.item as usize != i)
                .filter_map(|nn| {
                    let j = nn.item as usize;
                    evaluate_neighbor(corner, &corners[j], j, spacing_limit, params)
                })
                .collect();
            slots.push(select_neighbors(candidates));
        }

        // Mutual agreement: i -> j (dir) must be matched by j -> i (opposite dir).
        let neighbors = slots
            .iter()
            .enumerate()
            .map(|(i, node)| {
                node.iter()
                    .flatten()
                    .filter(|n| {
                        slots[n.index][n.direction.opposite().slot()]
                            .map(|back| back.index == i)
                            .unwrap_or(false)
                    })
                    .copied()
                    .collect()
            })
            .collect();

        Self { neighbors }
    }

    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut components = Vec::new();

        for start in 0..self.neighbors.len() {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                component.push(node);
                for n in &self.neighbors[node] {
                    if !visited[n.index] {
                        stack.push(n.index);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    /// BFS grid coordinates for one component. `None` when two corners
    /// collide on the same cell or one corner is reached with two coordinates.
    pub fn assign_grid_coordinates(&self, component: &[usize]) -> Option<HashMap<usize, (i32, i32)>> {
        let start = *component.first()?;
        let mut coords: HashMap<usize, (i32, i32)> = HashMap::with_capacity(component.len());
        let mut occupied: HashMap<(i32, i32), usize> = HashMap::with_capacity(component.len());
        let mut queue = VecDeque::from([(start, (0, 0))]);

        while let Some((node, ij)) = queue.pop_front() {
            if let Some(&prev) = coords.get(&node) {
                if prev != ij {
                    return None;
                }
                continue;
            }
            if occupied.insert(ij, node).is_some() {
                return None;
            }
            coords.insert(node, ij);
            for n in &self.neighbors[node] {
                let (di, dj) = n.direction.step();
                queue.push_back((n.index, (ij.0 + di, ij.1 + dj)));
            }
        }
        Some(coords)
    }
}

/// Order detected corners to match `spec`, row-major.
///
/// The grid may come out transposed relative to the board; both layouts are
/// accepted because any consistent labelling yields a valid plane pose.
pub fn assemble_board(
    corners: &[Corner],
    spec: &CheckerboardSpec,
    params: &GridGraphParams,
) -> Option<Vec<Point2<f64>>> {
    let wide = spec.corners_wide as i32;
    let high = spec.corners_high as i32;
    let needed = spec.corner_count();
    if corners.len() < needed {
        return None;
    }

    let graph = GridGraph::new(corners, params);
    let mut components = graph.connected_components();
    components.sort_by_key(|c| std::cmp::Reverse(c.len()));

    for component in components.iter().take_while(|c| c.len() >= needed) {
        let Some(coords) = graph.assign_grid_coordinates(component) else {
            continue;
        };
        let min_i = coords.values().map(|c| c.0).min()?;
        let min_j = coords.values().map(|c| c.1).min()?;
        let max_i = coords.values().map(|c| c.0).max()?;
        let max_j = coords.values().map(|c| c.1).max()?;
        let (w, h) = (max_i - min_i + 1, max_j - min_j + 1);

        let transposed = if w == wide && h == high {
            false
        } else if w == high && h == wide {
            true
        } else {
            log::debug!("grid component {w}x{h} does not match board {wide}x{high}");
            continue;
        };
        if coords.len() != needed {
            continue;
        }

        let mut ordered = vec![Point2::new(0.0, 0.0); needed];
        for (&idx, &(i, j)) in &coords {
            let (col, row) = if transposed {
                (j - min_j, i - min_i)
            } else {
                (i - min_i, j - min_j)
            };
            let p = corners[idx].position;
            ordered[(row * wide + col) as usize] = Point2::new(p.x as f64, p.y as f64);
        }
        return Some(ordered);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation,
            strength: 1.0,
        }
    }

    fn lattice(cols: usize, rows: usize, spacing: f32, origin: (f32, f32)) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(make_corner(
                    origin.0 + i as f32 * spacing,
                    origin.1 + j as f32 * spacing,
                    orientation,
                ));
            }
        }
        corners
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let corners = lattice(3, 3, 10.0, (0.0, 0.0));
        let graph = GridGraph::new(&corners, &GridGraphParams::default());
        let center: HashMap<_, _> = graph.neighbors[4]
            .iter()
            .map(|n| (n.direction, n.index))
            .collect();
        assert_eq!(center.len(), 4);
        assert_eq!(center[&NeighborDirection::Left], 3);
        assert_eq!(center[&NeighborDirection::Right], 5);
        assert_eq!(center[&NeighborDirection::Up], 1);
        assert_eq!(center[&NeighborDirection::Down], 7);
        assert_eq!(graph.neighbors[0].len(), 2);
    }

    #[test]
    fn rejects_parallel_orientations() {
        let corners = vec![make_corner(0.0, 0.0, FRAC_PI_4), make_corner(10.0, 0.0, FRAC_PI_4)];
        let graph = GridGraph::new(&corners, &GridGraphParams::default());
        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn assembles_board_in_row_major_order() {
        let spec = CheckerboardSpec::new(5, 4, 25.0).unwrap();
        let mut corners = lattice(5, 4, 20.0, (100.0, 50.0));
        // Shuffle-ish and add clutter far away.
        corners.reverse();
        corners.push(make_corner(600.0, 400.0, 0.3));

        let ordered = assemble_board(&corners, &spec, &GridGraphParams::default()).expect("board");
        assert_eq!(ordered.len(), 20);
        assert_eq!(ordered[0], Point2::new(100.0, 50.0));
        assert_eq!(ordered[1], Point2::new(120.0, 50.0));
        assert_eq!(ordered[5], Point2::new(100.0, 70.0));
        assert_eq!(ordered[19], Point2::new(180.0, 110.0));
    }

    #[test]
    fn assembles_transposed_board() {
        let spec = CheckerboardSpec::new(4, 5, 25.0).unwrap();
        let corners = lattice(5, 4, 20.0, (0.0, 0.0));
        let ordered = assemble_board(&corners, &spec, &GridGraphParams::default()).expect("board");
        assert_eq!(ordered.len(), 20);
        // Board column runs along image y when transposed.
        assert_eq!(ordered[1], Point2::new(0.0, 20.0));
        assert_eq!(ordered[4], Point2::new(20.0, 0.0));
    }

    #[test]
    fn incomplete_board_is_rejected() {
        let spec = CheckerboardSpec::new(5, 4, 25.0).unwrap();
        let mut corners = lattice(5, 4, 20.0, (0.0, 0.0));
        corners.remove(7);
        assert!(assemble_board(&corners, &spec, &GridGraphParams::default()).is_none());
    }
}
