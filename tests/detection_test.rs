use checkerboard_calibration::board::{Board, BoardConfig};
use checkerboard_calibration::config::DetectorConfig;
use checkerboard_calibration::data_loader::observe_image;
use checkerboard_calibration::detection::{detect_corners, find_chessboard_corners};
use checkerboard_calibration::synthetic::{
    SyntheticCamera, occlude, project_corners, random_board_pose, render_checkerboard,
};
use checkerboard_calibration::types::Roi;
use checkerboard_calibration::vision::NativeBackend;
use image::DynamicImage;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn max_distance(a: &[glam::Vec2], b: &[glam::Vec2]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(p, q)| p.distance(*q))
        .fold(0.0, f32::max)
}

#[test]
fn test_detects_and_orders_rendered_board() {
    let camera = SyntheticCamera::default();
    let model = camera.model();
    let config = BoardConfig::default();
    let board = Board::from_config(&config);
    let backend = NativeBackend::default();
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    for _ in 0..4 {
        let pose = random_board_pose(&mut rng, &model, &config, 20.0).unwrap();
        let img = render_checkerboard(&model, &pose, &config, 3);
        let expected = project_corners(&model, &pose, &config);

        assert!(detect_corners(&img, &DetectorConfig::default()).len() >= 48);
        let coarse = find_chessboard_corners(&img, board.pattern_size(), &DetectorConfig::default())
            .expect("board should be found");
        assert_eq!(coarse.len(), 48);
        assert!(max_distance(&coarse, &expected) < 1.5);

        let refined = observe_image(&backend, &DynamicImage::ImageLuma8(img), &board)
            .expect("board should be found");
        assert_eq!(refined.len(), 48);
        let err = max_distance(&refined, &expected);
        assert!(err < 0.3, "max corner error {}", err);
    }
}

#[test]
fn test_occluded_board_is_not_observed() {
    let camera = SyntheticCamera::default();
    let model = camera.model();
    let config = BoardConfig::default();
    let board = Board::from_config(&config);
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let pose = random_board_pose(&mut rng, &model, &config, 20.0).unwrap();
    let mut img = render_checkerboard(&model, &pose, &config, 2);

    // hide the left half of the corners
    let corners = project_corners(&model, &pose, &config);
    let split = (corners[3].x + corners[4].x) * 0.5;
    occlude(
        &mut img,
        Roi {
            x: 0,
            y: 0,
            width: split as u32,
            height: 480,
        },
        128,
    );
    let observed = observe_image(
        &NativeBackend::default(),
        &DynamicImage::ImageLuma8(img),
        &board,
    );
    assert!(observed.is_none());
}

#[test]
fn test_wrong_pattern_size_is_not_observed() {
    let camera = SyntheticCamera::default();
    let model = camera.model();
    let config = BoardConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let pose = random_board_pose(&mut rng, &model, &config, 20.0).unwrap();
    let img = render_checkerboard(&model, &pose, &config, 2);

    let bigger = Board::init_checkerboard(9, 7, 30.0);
    let observed = observe_image(
        &NativeBackend::default(),
        &DynamicImage::ImageLuma8(img),
        &bigger,
    );
    assert!(observed.is_none());
}

#[test]
fn test_blank_image_is_not_observed() {
    let img = image::GrayImage::from_pixel(320, 240, image::Luma([128]));
    let board = Board::from_config(&BoardConfig::default());
    assert!(observe_image(&NativeBackend::default(), &DynamicImage::ImageLuma8(img), &board).is_none());
}
