use checkerboard_calibration::board::{Board, BoardConfig};
use checkerboard_calibration::config::CalibrateOptions;
use checkerboard_calibration::error::CalibError;
use checkerboard_calibration::optimization::calibrate_camera;
use checkerboard_calibration::synthetic::{SyntheticCamera, project_corners, random_board_pose};
use glam::{Vec2, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn synthetic_views(
    camera: &SyntheticCamera,
    num_views: usize,
    seed: u64,
) -> (Vec<Vec<Vec3>>, Vec<Vec<Vec2>>) {
    let model = camera.model();
    let config = BoardConfig::default();
    let board = Board::from_config(&config);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut object_points = Vec::new();
    let mut image_points = Vec::new();
    for _ in 0..num_views {
        let pose = random_board_pose(&mut rng, &model, &config, 10.0).expect("pose");
        object_points.push(board.object_points.clone());
        image_points.push(project_corners(&model, &pose, &config));
    }
    (object_points, image_points)
}

#[test]
fn test_calibrate_recovers_intrinsics() {
    let camera = SyntheticCamera::default();
    let (obj, img) = synthetic_views(&camera, 12, 42);
    let result = calibrate_camera(&obj, &img, (640, 480), &CalibrateOptions::default())
        .expect("calibration should succeed");

    let gt = camera.params;
    assert!((result.fx() - gt[0]).abs() / gt[0] < 0.01, "fx {}", result.fx());
    assert!((result.fy() - gt[1]).abs() / gt[1] < 0.01, "fy {}", result.fy());
    assert!((result.cx() - gt[2]).abs() < 3.0, "cx {}", result.cx());
    assert!((result.cy() - gt[3]).abs() < 3.0, "cy {}", result.cy());
    assert!((result.distortion[0] - gt[4]).abs() < 0.02, "k1 {}", result.distortion[0]);
    assert!(result.rms < 0.05, "rms {}", result.rms);
    assert_eq!(result.poses.len(), 12);
    assert_eq!(result.image_size, (640, 480));
    // boards sit in front of the camera
    assert!(result.poses.iter().all(|p| p.tvec[2] > 0.0));
}

fn with_pixel_noise(image_points: &mut [Vec<Vec2>], amplitude: f32, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for p in image_points.iter_mut().flatten() {
        p.x += rng.random_range(-amplitude..amplitude);
        p.y += rng.random_range(-amplitude..amplitude);
    }
}

#[test]
fn test_more_views_do_not_worsen_focal_estimate() {
    let camera = SyntheticCamera::default();
    let (obj, mut img) = synthetic_views(&camera, 16, 11);
    with_pixel_noise(&mut img, 0.4, 99);
    let options = CalibrateOptions {
        fix_k3: true,
        ..CalibrateOptions::default()
    };
    let gt = camera.params;
    let focal_error = |n: usize| {
        let result = calibrate_camera(&obj[..n], &img[..n], (640, 480), &options)
            .expect("calibration should succeed");
        assert!(result.rms >= 0.0 && result.rms.is_finite());
        let ex = (result.fx() - gt[0]).abs() / gt[0];
        let ey = (result.fy() - gt[1]).abs() / gt[1];
        ex.max(ey)
    };

    let few = focal_error(4);
    let many = focal_error(16);
    assert!(many <= few + 1e-3, "4 views {} 16 views {}", few, many);
    assert!(many < 0.01, "16 views {}", many);
}

#[test]
fn test_fixed_coefficients_stay_zero() {
    let camera = SyntheticCamera {
        params: [600.0, 600.0, 320.0, 240.0, -0.05, 0.0, 0.0, 0.0, 0.0],
        ..SyntheticCamera::default()
    };
    let (obj, img) = synthetic_views(&camera, 8, 7);
    let options = CalibrateOptions {
        fix_k3: true,
        zero_tangent_dist: true,
        ..CalibrateOptions::default()
    };
    let result = calibrate_camera(&obj, &img, (640, 480), &options).unwrap();
    assert_eq!(result.distortion[2], 0.0);
    assert_eq!(result.distortion[3], 0.0);
    assert_eq!(result.distortion[4], 0.0);
    assert!((result.fx() - 600.0).abs() < 6.0);
    assert!((result.distortion[0] + 0.05).abs() < 0.01);
}

#[test]
fn test_single_view_calibrates() {
    let camera = SyntheticCamera::default();
    let (obj, img) = synthetic_views(&camera, 1, 3);
    let options = CalibrateOptions {
        fix_k3: true,
        zero_tangent_dist: true,
        ..CalibrateOptions::default()
    };
    let result = calibrate_camera(&obj, &img, (640, 480), &options).unwrap();
    assert_eq!(result.poses.len(), 1);
    assert!(result.rms.is_finite());
    assert!(result.fx() > 0.0 && result.fy() > 0.0);
}

#[test]
fn test_rejects_bad_correspondences() {
    let options = CalibrateOptions::default();
    assert!(matches!(
        calibrate_camera(&[], &[], (640, 480), &options),
        Err(CalibError::NoObservations)
    ));

    let camera = SyntheticCamera::default();
    let (obj, mut img) = synthetic_views(&camera, 2, 1);
    img[1].pop();
    assert!(matches!(
        calibrate_camera(&obj, &img, (640, 480), &options),
        Err(CalibError::InvalidInput(_))
    ));

    let (mut obj, img) = synthetic_views(&camera, 2, 1);
    obj[0][3].z = 1.0;
    assert!(matches!(
        calibrate_camera(&obj, &img, (640, 480), &options),
        Err(CalibError::InvalidInput(_))
    ));

    let (obj, img) = synthetic_views(&camera, 2, 1);
    assert!(matches!(
        calibrate_camera(&obj, &img, (0, 480), &options),
        Err(CalibError::InvalidInput(_))
    ));
}
