use std::collections::VecDeque;

use super::topology::MeshTopology;

/// BFS island detection over UV-continuous edges.
///
/// Faces are connected when they share a welded edge with matching UVs on
/// both ends and the same material. Returns face lists in discovery order.
pub(crate) fn uv_islands(topo: &MeshTopology, materials: &[u32]) -> Vec<Vec<u32>> {
    let num_faces = topo.face_count();
    let mut visited = vec![false; num_faces];
    let mut islands = Vec::new();

    for start in 0..num_faces {
        if visited[start] {
            continue;
        }

        let mut queue = VecDeque::new();
        queue.push_back(start);
        visited[start] = true;

        let mut island_faces = Vec::new();
        while let Some(face) = queue.pop_front() {
            island_faces.push(face as u32);

            for e in 0..3 {
                let Some(neighbor) = topo.neighbors[face][e] else {
                    continue;
                };
                let neighbor = neighbor as usize;
                if visited[neighbor]
                    || topo.texture_seam[face][e]
                    || materials[neighbor] != materials[face]
                {
                    continue;
                }
                visited[neighbor] = true;
                queue.push_back(neighbor);
            }
        }

        islands.push(island_faces);
    }

    islands
}
