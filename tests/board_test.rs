use checkerboard_calibration::board::{Board, BoardConfig, create_default_8x6_board};
use checkerboard_calibration::config::CalibConfig;

#[test]
fn test_board_init() {
    let board = Board::from_config(&BoardConfig::default());
    assert_eq!(board.len(), 8 * 6);
    assert_eq!(board.pattern_size(), (8, 6));

    let s = 30.0;
    // row by row, x varying fastest
    let p0 = board.object_points[0];
    let p1 = board.object_points[1];
    let p8 = board.object_points[8];
    let last = board.object_points[47];

    assert!((p0.x - 0.0).abs() < 1e-6 && (p0.y - 0.0).abs() < 1e-6);
    assert!((p1.x - s).abs() < 1e-6 && (p1.y - 0.0).abs() < 1e-6);
    assert!((p8.x - 0.0).abs() < 1e-6 && (p8.y - s).abs() < 1e-6);
    assert!((last.x - 7.0 * s).abs() < 1e-4 && (last.y - 5.0 * s).abs() < 1e-4);
    assert!(board.object_points.iter().all(|p| p.z == 0.0));
}

#[test]
fn test_default_board_helper() {
    let board = create_default_8x6_board();
    assert_eq!(board.config, BoardConfig::default());
    assert_eq!(board.len(), board.config.num_corners());
}

#[test]
fn test_board_config_aliases() {
    let config: BoardConfig =
        serde_json::from_str(r#"{"rows": 9, "cols": 7, "square_size": 0.025}"#).unwrap();
    assert_eq!(config.corners_x, 9);
    assert_eq!(config.corners_y, 7);
    assert!((config.square_size - 0.025).abs() < 1e-9);

    let partial: BoardConfig = serde_json::from_str(r#"{"corners_x": 5}"#).unwrap();
    assert_eq!(partial.corners_x, 5);
    assert_eq!(partial.corners_y, 6);
}

#[test]
fn test_calib_config_defaults() {
    let config: CalibConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, CalibConfig::default());
    assert_eq!(config.board.num_corners(), 48);
    assert_eq!(config.subpix.half_window, 5);
    assert_eq!(config.subpix.max_iterations, 30);
    assert!(!config.calibrate.fix_k3);
}

#[test]
fn test_empty_board() {
    let board = Board::init_checkerboard(0, 6, 1.0);
    assert!(board.is_empty());
}
