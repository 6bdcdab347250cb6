use cgmath::{vec3, EuclideanSpace, InnerSpace};
use cms::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

mod fields;
use fields::{mixed, skewed_sphere, sphere, uniform};

#[test]
fn unit_sphere_at_uniform_depth() {
    let mesh = mesh_from_field(sphere, &uniform(4)).unwrap();

    assert!(mesh.triangle_count() > 0);
    for vertex in &mesh.vertices {
        let radius = vertex.position.to_vec().magnitude();
        assert!((radius - 1.).abs() < 0.05, "vertex at radius {}", radius);
    }
    assert_eq!(mesh.boundary_edges(), vec![]);
}

#[test]
fn shifted_iso_level() {
    let config = CmsConfig {
        iso_level: -0.75,
        ..uniform(4)
    };
    let mesh = mesh_from_field(sphere, &config).unwrap();

    assert!(mesh.triangle_count() > 0);
    for vertex in &mesh.vertices {
        let radius = vertex.position.to_vec().magnitude();
        assert!((radius - 0.5).abs() < 0.05, "vertex at radius {}", radius);
    }
    assert!(mesh.is_watertight());
}

#[test]
fn mixed_depth_sphere_is_watertight() {
    let mut cms = CubicalMarchingSquares::new(skewed_sphere, mixed()).unwrap();
    let mesh = cms.extract().unwrap();

    let octree = cms.octree().unwrap();
    let levels: Vec<u32> = octree
        .cells()
        .iter()
        .filter(|cell| cell.is_leaf())
        .map(|cell| cell.level)
        .collect();
    assert_eq!(levels.iter().min(), Some(&2));
    assert!(levels.iter().any(|&level| level > 2));
    assert!(cms.stats().transitional_faces > 0);

    assert!(mesh.triangle_count() > 0);
    assert_eq!(mesh.boundary_edges(), vec![]);
}

#[test]
fn stretched_box_keeps_axes_apart() {
    let (a, b, c) = (1.6f32, 0.8f32, 0.4f32);
    let ellipsoid = move |x: f32, y: f32, z: f32| {
        (x / a).powi(2) + (y / b).powi(2) + (z / c).powi(2) - 1.
    };
    let config = CmsConfig {
        bounds_min: [-2., -1., -0.5],
        bounds_max: [2., 1., 0.5],
        min_depth: 2,
        max_depth: 6,
        ..CmsConfig::default()
    };

    let mesh = mesh_from_field(ellipsoid, &config).unwrap();
    assert!(mesh.triangle_count() > 0);
    assert_eq!(mesh.boundary_edges(), vec![]);

    let extent = |axis: usize| {
        mesh.vertices
            .iter()
            .map(|vertex| vertex.position[axis].abs())
            .fold(0f32, f32::max)
    };
    assert!((extent(0) - a).abs() < 0.1, "x extent {}", extent(0));
    assert!((extent(1) - b).abs() < 0.1, "y extent {}", extent(1));
    assert!((extent(2) - c).abs() < 0.05, "z extent {}", extent(2));

    for vertex in &mesh.vertices {
        let p = vertex.position;
        let gradient = vec3(
            2. * p.x / (a * a),
            2. * p.y / (b * b),
            2. * p.z / (c * c),
        );
        assert!(
            vertex.normal.dot(gradient.normalize()) > 0.5,
            "normal {:?} at {:?}",
            vertex.normal,
            p
        );
    }
}

#[test]
fn constant_fields_give_empty_meshes() {
    let outside = mesh_from_field(|_: f32, _: f32, _: f32| 1., &uniform(3)).unwrap();
    assert_eq!(outside, Mesh::default());

    let inside = mesh_from_field(|_: f32, _: f32, _: f32| -1., &uniform(3)).unwrap();
    assert_eq!(inside, Mesh::default());
}

#[test]
fn repeated_extraction_does_not_resample() {
    let calls = AtomicUsize::new(0);
    let field = |x: f32, y: f32, z: f32| {
        calls.fetch_add(1, Ordering::Relaxed);
        sphere(x, y, z)
    };

    let mut cms = CubicalMarchingSquares::new(field, uniform(3)).unwrap();
    assert!(!cms.is_sampled());
    let first = cms.extract().unwrap();
    let after_first = calls.load(Ordering::Relaxed);
    let samples = cms.stats().grid_samples;
    assert_eq!(samples, 9 * 9 * 9);

    let second = cms.extract().unwrap();
    let after_second = calls.load(Ordering::Relaxed);

    assert_eq!(first, second);
    assert_eq!(after_second - after_first, after_first - samples);
}

#[test]
fn invalid_configs_are_rejected_before_sampling() {
    let calls = AtomicUsize::new(0);
    let field = |x: f32, y: f32, z: f32| {
        calls.fetch_add(1, Ordering::Relaxed);
        sphere(x, y, z)
    };

    let configs = [
        CmsConfig {
            max_depth: 0,
            min_depth: 0,
            ..CmsConfig::default()
        },
        CmsConfig {
            max_depth: MAX_DEPTH + 1,
            ..CmsConfig::default()
        },
        CmsConfig {
            min_depth: 4,
            max_depth: 3,
            ..CmsConfig::default()
        },
    ];
    for config in configs {
        assert!(matches!(
            CubicalMarchingSquares::new(field, config),
            Err(CmsError::InvalidDepth { .. })
        ));
    }

    let flat = CmsConfig {
        bounds_max: [1., -1., 1.],
        ..CmsConfig::default()
    };
    assert!(matches!(
        mesh_from_field(field, &flat),
        Err(CmsError::InvalidBounds { axis: 1, .. })
    ));

    let negative = CmsConfig {
        complexity_threshold: -1.,
        ..CmsConfig::default()
    };
    assert!(matches!(
        mesh_from_field(field, &negative),
        Err(CmsError::InvalidParameter { .. })
    ));

    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn desired_cells_restrict_output() {
    let mut cms = CubicalMarchingSquares::new(sphere, uniform(2)).unwrap();
    let full = cms.extract().unwrap();

    let octree = cms.octree().unwrap();
    let root = octree.root();
    let leaf = octree
        .cells()
        .iter()
        .find(|cell| cell.is_leaf() && !cell.components.is_empty())
        .map(|cell| cell.id)
        .unwrap();

    cms.set_desired_cells([leaf]);
    let partial = cms.extract().unwrap();
    assert!(partial.triangle_count() > 0);
    assert!(partial.triangle_count() < full.triangle_count());

    cms.set_desired_cells([root, CellId(usize::MAX)]);
    assert_eq!(cms.extract().unwrap(), full);

    cms.clear_desired_cells();
    assert_eq!(cms.extract().unwrap(), full);
}

#[test]
fn stats_describe_the_last_extraction() {
    let mut cms = CubicalMarchingSquares::new(skewed_sphere, mixed()).unwrap();
    let mesh = cms.extract().unwrap();
    let stats = *cms.stats();
    let octree = cms.octree().unwrap();

    assert_eq!(stats.grid_samples, 33 * 33 * 33);
    assert_eq!(stats.cells, octree.cell_count());
    assert_eq!(
        stats.leaves,
        octree.cells().iter().filter(|cell| cell.is_leaf()).count()
    );
    assert_eq!(stats.components, cms.components().count());
    assert_eq!(stats.vertices, mesh.vertices.len());
    assert_eq!(stats.triangles, mesh.triangle_count());
    assert!(stats.crossing_vertices <= stats.vertices);
}
