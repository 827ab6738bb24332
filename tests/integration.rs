//! End-to-end integration tests.
//!
//! These tests build synthetic meshes, run the full atlas generation and
//! check the guarantees every output must satisfy.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use uv_atlas::config::{ChartConfig, PackConfig, RunConfig};
use uv_atlas::{
    Atlas, AtlasBuilder, AtlasError, InputMesh, InputVertex, OutputMesh, Pipeline, RejectReason,
    VertexLayout,
};

/// Flat `nx` x `ny` quad grid in the XY plane.
fn grid(nx: usize, ny: usize) -> (Vec<InputVertex>, Vec<u16>) {
    let row = nx + 1;
    let mut vertices = Vec::new();
    for y in 0..=ny {
        for x in 0..=nx {
            vertices.push(InputVertex::new(
                [x as f32, y as f32, 0.0],
                [0.0, 0.0, 1.0],
                [x as f32 / nx as f32, y as f32 / ny as f32],
            ));
        }
    }
    let mut indices = Vec::new();
    for y in 0..ny {
        for x in 0..nx {
            let a = (y * row + x) as u16;
            let r = row as u16;
            indices.extend_from_slice(&[a, a + 1, a + r + 1, a, a + r + 1, a + r]);
        }
    }
    (vertices, indices)
}

/// Five-quad strip bent 90 degrees after the third quad (10 triangles).
fn bent_strip() -> InputMesh<u64> {
    let mut vertices = Vec::new();
    for i in 0..=5usize {
        let x = i.min(3) as f32;
        let z = i.saturating_sub(3) as f32;
        vertices.push(InputVertex::new([x, 0.0, z], [0.0; 3], [0.0; 2]));
        vertices.push(InputVertex::new([x, 1.0, z], [0.0; 3], [0.0; 2]));
    }
    let mut indices = Vec::new();
    for i in 0..5u16 {
        let a = 2 * i;
        indices.extend_from_slice(&[a, a + 2, a + 3, a, a + 3, a + 1]);
    }
    InputMesh::new(vertices, indices, 2)
}

/// Closed box with 8 shared corners and no normals.
fn closed_box(size: f32) -> InputMesh<u64> {
    let vertices = (0..8)
        .map(|i| {
            let p = [(i & 1) as f32, ((i >> 1) & 1) as f32, ((i >> 2) & 1) as f32];
            InputVertex::new(p.map(|c| c * size), [0.0; 3], [0.0; 2])
        })
        .collect();
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 3, 0, 3, 1, // -z
        4, 5, 7, 4, 7, 6, // +z
        0, 1, 5, 0, 5, 4, // -y
        2, 6, 7, 2, 7, 3, // +y
        0, 4, 6, 0, 6, 2, // -x
        1, 3, 7, 1, 7, 5, // +x
    ];
    InputMesh::new(vertices, indices, 3)
}

/// Open cylinder, `segments` around and `rings` high.
fn cylinder(segments: usize, rings: usize) -> InputMesh<u64> {
    let mut vertices = Vec::new();
    for r in 0..=rings {
        for s in 0..segments {
            let a = s as f32 / segments as f32 * std::f32::consts::TAU;
            vertices.push(InputVertex::new(
                [a.cos(), a.sin(), r as f32 * 0.5],
                [a.cos(), a.sin(), 0.0],
                [0.0; 2],
            ));
        }
    }
    let mut indices = Vec::new();
    for r in 0..rings {
        for s in 0..segments {
            let a = (r * segments + s) as u16;
            let b = (r * segments + (s + 1) % segments) as u16;
            let (c, d) = (a + segments as u16, b + segments as u16);
            indices.extend_from_slice(&[a, b, d, a, d, c]);
        }
    }
    InputMesh::new(vertices, indices, 4)
}

fn generate(meshes: &[InputMesh<u64>], pack: &PackConfig) -> Atlas {
    let mut builder = AtlasBuilder::new();
    for mesh in meshes {
        builder.add_mesh(mesh).unwrap();
    }
    builder.generate(&ChartConfig::default(), pack).unwrap()
}

/// Conservation, index validity, UV bounds and winding.
fn assert_valid(input: &InputMesh<u64>, output: &OutputMesh, pages: usize) {
    assert_eq!(output.triangle_count(), input.triangle_count());
    assert_eq!(output.index_count(), input.indices.len());
    for (i, &index) in output.indices.iter().enumerate() {
        let v = output.vertex(index as usize).expect("index out of range");
        assert_eq!(v.original_vertex_index, input.indices[i] as u32);
        assert!(v.uv.iter().all(|c| (0.0..=1.0).contains(c)), "uv {:?}", v.uv);
        assert!((v.page_index as usize) < pages);
    }
}

fn scene() -> Vec<InputMesh<u64>> {
    let (vertices, indices) = grid(4, 3);
    vec![
        InputMesh::new(vertices, indices, 1),
        bent_strip(),
        closed_box(2.0),
        cylinder(12, 3),
    ]
}

#[test]
fn scene_outputs_are_valid() {
    let meshes = scene();
    let atlas = generate(&meshes, &PackConfig::default());

    assert_eq!(atlas.meshes.len(), meshes.len());
    assert_eq!(atlas.page_count(), 1);
    assert!(atlas.width > 0 && atlas.height > 0);
    for (input, output) in meshes.iter().zip(&atlas.meshes) {
        assert_valid(input, output, atlas.page_count());
    }
    let u = atlas.pages[0].utilization;
    assert!(u > 0.0 && u <= 1.0);
}

#[test]
fn two_ten_triangle_meshes() {
    let (vertices, indices) = grid(5, 1);
    let meshes = vec![InputMesh::new(vertices, indices, 1), bent_strip()];
    let atlas = generate(&meshes, &PackConfig::default());

    assert_eq!(atlas.meshes.len(), 2);
    let triangles: usize = atlas.meshes.iter().map(|m| m.triangle_count()).sum();
    assert_eq!(triangles, 20);
    assert!(atlas.page_count() >= 1);
    for page in &atlas.pages {
        assert!(page.utilization > 0.0 && page.utilization <= 1.0);
    }
    // The bend splits the strip into two charts
    let mut charts: Vec<u32> = atlas.meshes[1].vertices.iter().map(|v| v.chart_index).collect();
    charts.sort_unstable();
    charts.dedup();
    assert_eq!(charts.len(), 2);
}

#[test]
fn single_triangle() {
    let mesh = InputMesh::new(
        vec![
            InputVertex::new([0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            InputVertex::new([2.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            InputVertex::new([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
        ],
        vec![0, 1, 2],
        0u64,
    );
    let atlas = generate(std::slice::from_ref(&mesh), &PackConfig::default());
    assert_eq!(atlas.chart_count, 1);
    assert_valid(&mesh, &atlas.meshes[0], 1);

    let uvs: Vec<[f32; 2]> = atlas.meshes[0].vertices.iter().map(|v| v.uv).collect();
    let distinct = uvs
        .iter()
        .enumerate()
        .all(|(i, a)| uvs[i + 1..].iter().all(|b| a != b));
    assert!(distinct, "triangle collapsed in UV space: {uvs:?}");
}

#[test]
fn regeneration_is_deterministic_across_thread_counts() {
    let mut builder = AtlasBuilder::new();
    for mesh in scene() {
        builder.add_mesh(&mesh).unwrap();
    }
    let pack = PackConfig {
        brute_force: true,
        ..Default::default()
    };

    let first = builder.generate(&ChartConfig::default(), &pack).unwrap();
    let again = builder.generate(&ChartConfig::default(), &pack).unwrap();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let serial = pool
        .install(|| builder.generate(&ChartConfig::default(), &pack))
        .unwrap();

    for other in [&again, &serial] {
        assert_eq!(first.meshes, other.meshes);
        assert_eq!(first.pages, other.pages);
        assert_eq!((first.width, first.height), (other.width, other.height));
    }
}

#[test]
fn rejected_mesh_does_not_block_others() {
    let mut builder = AtlasBuilder::new();
    builder.add_mesh(&bent_strip()).unwrap();

    let mut broken = closed_box(1.0);
    broken.vertices[3].position[1] = f32::NAN;
    let err = builder.add_mesh(&broken).unwrap_err();
    assert_eq!(err.mesh_index, 1);
    assert_eq!(err.reason, RejectReason::NonFiniteAttribute { vertex: 3 });

    let mut short = bent_strip();
    short.face_materials.pop();
    let err = builder.add_mesh(&short).unwrap_err();
    assert_eq!(err.mesh_index, 2);
    assert!(matches!(err.reason, RejectReason::MaterialCountMismatch { .. }));

    let (vertices, indices) = grid(2, 2);
    assert_eq!(builder.add_mesh(&InputMesh::new(vertices, indices, 5)), Ok(1));
    // Rejected meshes never registered their materials
    assert_eq!(builder.materials().len(), 2);

    let atlas = builder
        .generate(&ChartConfig::default(), &PackConfig::default())
        .unwrap();
    assert_eq!(atlas.meshes.len(), 2);
    assert_eq!(atlas.meshes[1].triangle_count(), 8);
}

#[test]
fn charts_never_cross_materials() {
    let (vertices, indices) = grid(4, 4);
    let materials: Vec<u64> = (0..indices.len() / 3).map(|f| (f % 3) as u64).collect();
    let mesh = InputMesh::with_face_materials(vertices, indices, materials.clone());
    let atlas = generate(std::slice::from_ref(&mesh), &PackConfig::default());

    let output = &atlas.meshes[0];
    let mut chart_material: HashMap<u32, u64> = HashMap::new();
    for (face, tri) in output.indices.chunks_exact(3).enumerate() {
        for &i in tri {
            let chart = output.vertices[i as usize].chart_index;
            let material = *chart_material.entry(chart).or_insert(materials[face]);
            assert_eq!(material, materials[face], "chart {chart} mixes materials");
        }
    }
    assert!(chart_material.len() >= 3);
}

#[test]
fn fixed_resolution_spreads_over_pages() {
    let pack = PackConfig {
        resolution: 16,
        texels_per_unit: 10.0,
        ..Default::default()
    };
    let mesh = closed_box(1.0);
    let atlas = generate(std::slice::from_ref(&mesh), &pack);

    assert_eq!((atlas.width, atlas.height), (16, 16));
    assert_eq!(atlas.chart_count, 6);
    assert_eq!(atlas.page_count(), 6);
    assert!(atlas.pages.iter().all(|p| p.chart_count == 1));
    assert_valid(&mesh, &atlas.meshes[0], 6);
}

#[test]
fn chart_larger_than_page_is_infeasible() {
    let mut builder = AtlasBuilder::new();
    builder.add_mesh(&closed_box(1.0)).unwrap();
    let pack = PackConfig {
        resolution: 8,
        texels_per_unit: 10.0,
        ..Default::default()
    };
    let err = builder.generate(&ChartConfig::default(), &pack).unwrap_err();
    assert!(matches!(err, AtlasError::PackingInfeasible { .. }));
}

#[test]
fn extreme_texel_density_is_infeasible() {
    let mut builder = AtlasBuilder::new();
    builder.add_mesh(&cylinder(8, 4)).unwrap();
    for resolution in [4096, 0] {
        let pack = PackConfig {
            texels_per_unit: 1e10,
            resolution,
            ..Default::default()
        };
        let err = builder.generate(&ChartConfig::default(), &pack).unwrap_err();
        assert!(
            matches!(err, AtlasError::PackingInfeasible { .. }),
            "resolution {resolution}: {err}"
        );
    }
}

#[test]
fn pre_unwrapped_islands_keep_their_shape() {
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        InputVertex::new([0.0, 0.0, 0.0], n, [0.0, 0.0]),
        InputVertex::new([1.0, 0.0, 0.0], n, [0.4, 0.0]),
        InputVertex::new([0.0, 1.0, 0.0], n, [0.0, 0.4]),
        InputVertex::new([1.0, 1.0, 0.0], n, [0.6, 0.6]),
        InputVertex::new([0.0, 1.0, 0.0], n, [1.0, 0.6]),
        InputVertex::new([1.0, 0.0, 0.0], n, [0.6, 1.0]),
    ];
    let mesh = InputMesh::new(vertices, vec![0, 1, 2, 3, 4, 5], 0u64).pre_unwrapped();
    let atlas = generate(std::slice::from_ref(&mesh), &PackConfig::default());

    assert_eq!(atlas.chart_count, 2);
    let output = &atlas.meshes[0];
    assert_valid(&mesh, output, 1);

    let dims = [atlas.width as f32, atlas.height as f32];
    let texel = |i: u32| {
        let uv = output.vertices[i as usize].uv;
        [uv[0] * dims[0], uv[1] * dims[1]]
    };
    let dist = |a: [f32; 2], b: [f32; 2]| ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt();
    for tri in output.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0], tri[1], tri[2]].map(texel);
        let (ab, ac) = (dist(a, b), dist(a, c));
        assert!(ab > 1.0);
        assert!((ab - ac).abs() / ab < 0.02, "legs {ab} and {ac} differ");
    }
}

#[test]
fn strided_buffer_input() {
    let (vertices, indices) = grid(3, 2);
    let bytes: &[u8] = bytemuck::cast_slice(&vertices);
    let mesh = InputMesh::from_strided(bytes, VertexLayout::PACKED, indices, 9u64).unwrap();
    assert_eq!(mesh.vertices, vertices);

    let atlas = generate(std::slice::from_ref(&mesh), &PackConfig::default());
    assert_valid(&mesh, &atlas.meshes[0], atlas.page_count());
}

#[test]
fn diagnostic_images_match_pages() {
    let pack = PackConfig {
        create_image: true,
        block_align: true,
        ..Default::default()
    };
    let atlas = generate(&scene(), &pack);
    assert_eq!(atlas.images.len(), atlas.page_count());
    assert_eq!(atlas.width % 4, 0);
    assert_eq!(atlas.height % 4, 0);
    assert_eq!(atlas.images[0].dimensions(), (atlas.width, atlas.height));
}

/// Two objects: a 3x3 grid (18 triangles) and a tilted quad (2 triangles).
fn write_scene_obj(dir: &Path) -> std::path::PathBuf {
    let mut obj = String::from("o panel\n");
    for y in 0..4 {
        for x in 0..4 {
            obj.push_str(&format!("v {x} {y} 0\n"));
        }
    }
    for y in 0..3 {
        for x in 0..3 {
            let a = y * 4 + x + 1;
            let (b, c, d) = (a + 1, a + 5, a + 4);
            obj.push_str(&format!("f {a} {b} {c}\nf {a} {c} {d}\n"));
        }
    }
    obj.push_str("o roof\nv 0 0 1\nv 2 0 1\nv 2 1 2\nv 0 1 2\nf 17 18 19\nf 17 19 20\n");

    let path = dir.join("scene.obj");
    fs::write(&path, obj).unwrap();
    path
}

#[test]
fn cli_pipeline_writes_outputs() {
    let tmp = tempfile::tempdir().unwrap();
    let input = write_scene_obj(tmp.path());
    let output = tmp.path().join("out");

    let config = RunConfig {
        input,
        output: output.clone(),
        pack: PackConfig {
            create_image: true,
            ..Default::default()
        },
        ..Default::default()
    };
    let result = Pipeline::run(&config).unwrap();
    assert_eq!(result.accepted, 2);
    assert_eq!(result.rejected, 0);
    assert!(result.page_count >= 1);

    let obj = fs::read_to_string(output.join("atlas.obj")).unwrap();
    assert!(obj.contains("o panel\n") && obj.contains("o roof\n"));
    assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 20);

    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(output.join("atlas.json")).unwrap()).unwrap();
    assert_eq!(summary["meshes"].as_array().unwrap().len(), 2);
    assert_eq!(summary["meshes"][0]["triangles"], 18);
    assert!(output.join("page_0.png").exists());
}

#[test]
fn cli_pipeline_missing_input() {
    let tmp = tempfile::tempdir().unwrap();
    let config = RunConfig {
        input: tmp.path().join("missing.obj"),
        output: tmp.path().join("out"),
        ..Default::default()
    };
    let err = Pipeline::run(&config).unwrap_err();
    assert!(matches!(err, AtlasError::Input(_)));
}
