use checkerboard_calibration::error::CalibError;
use checkerboard_calibration::io::npz::{NpyArray, open_npz, read_npz_array, save_npz};
use checkerboard_calibration::io::{
    CALIB_DATA_FILE, CalibrationArchive, ParameterBlock, object_from_json, object_to_json,
    read_calibration_npz, write_calibration_npz, write_detailed_report, write_report,
};
use checkerboard_calibration::types::{CalibrationResult, RvecTvec, camera_matrix};
use checkerboard_calibration::util::ReprojectionError;
use std::path::PathBuf;
use tempfile::TempDir;

fn sample_result() -> CalibrationResult {
    CalibrationResult {
        camera_matrix: camera_matrix(812.345678901, 810.1, 639.5000001, 359.25),
        distortion: [-0.123456789, 0.0456, 0.00011, -0.00022, 0.0033],
        poses: vec![
            RvecTvec {
                rvec: [0.1, -0.2, 0.3],
                tvec: [-40.0, 12.5, 600.0],
            },
            RvecTvec {
                rvec: [-0.05, 0.25, 1.0e-9],
                tvec: [33.3, -7.0, 451.123456789],
            },
        ],
        rms: 0.21,
        image_size: (1280, 720),
    }
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() <= 1e-12 * b.abs().max(1.0), "{} != {}", a, b);
}

#[test]
fn test_npz_round_trip_is_lossless() {
    let temp_dir = TempDir::new().unwrap();
    let result = sample_result();
    let path = write_calibration_npz(temp_dir.path(), &result).unwrap();
    assert_eq!(path, temp_dir.path().join(CALIB_DATA_FILE));

    let archive = read_calibration_npz(&path).unwrap();
    assert_eq!(archive, CalibrationArchive::from(&result));
    for (a, b) in archive
        .camera_matrix
        .iter()
        .zip(result.camera_matrix.iter())
    {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn test_npz_array_shapes() {
    let temp_dir = TempDir::new().unwrap();
    let path = write_calibration_npz(temp_dir.path(), &sample_result()).unwrap();
    let mut archive = open_npz(&path).unwrap();
    assert_eq!(read_npz_array(&mut archive, "mtx").unwrap().shape, vec![3, 3]);
    assert_eq!(read_npz_array(&mut archive, "dist").unwrap().shape, vec![1, 5]);
    assert_eq!(read_npz_array(&mut archive, "rvecs").unwrap().shape, vec![2, 3, 1]);
    assert_eq!(read_npz_array(&mut archive, "tvecs").unwrap().shape, vec![2, 3, 1]);
    assert!(read_npz_array(&mut archive, "missing").is_err());

    // row-major storage
    let mtx = read_npz_array(&mut archive, "mtx").unwrap();
    assert_eq!(mtx.data[2], 639.5000001);
    assert_eq!(mtx.data[8], 1.0);
}

#[test]
fn test_npz_rejects_bad_shape() {
    assert!(matches!(
        NpyArray::new(vec![2, 2], vec![1.0, 2.0, 3.0]),
        Err(CalibError::InvalidInput(_))
    ));

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.npz");
    let mtx = NpyArray::new(vec![2, 2], vec![1.0; 4]).unwrap();
    let dist = NpyArray::new(vec![1, 5], vec![0.0; 5]).unwrap();
    let vecs = NpyArray::new(vec![0, 3, 1], vec![]).unwrap();
    save_npz(
        &path,
        &[("mtx", &mtx), ("dist", &dist), ("rvecs", &vecs), ("tvecs", &vecs)],
    )
    .unwrap();
    assert!(matches!(read_calibration_npz(&path), Err(CalibError::Npy { .. })));
}

#[test]
fn test_parameter_block() {
    let result = sample_result();
    let block = ParameterBlock::new(&result);
    let json: serde_json::Value = serde_json::from_str(&block.to_json_string().unwrap()).unwrap();

    let intr = &json["intrinsic_parameters"];
    assert_close(intr["fx"].as_f64().unwrap(), 812.345678901);
    assert_close(intr["fy"].as_f64().unwrap(), 810.1);
    assert_close(intr["ppx"].as_f64().unwrap(), 639.5000001);
    assert_close(intr["ppy"].as_f64().unwrap(), 359.25);
    assert_eq!(intr["width_px"].as_u64().unwrap(), 1280);
    assert_eq!(intr["height_px"].as_u64().unwrap(), 720);

    // unpacked in storage order
    let dist = &json["distortion_parameters"];
    assert_close(dist["rk1"].as_f64().unwrap(), -0.123456789);
    assert_close(dist["rk2"].as_f64().unwrap(), 0.0456);
    assert_close(dist["tp1"].as_f64().unwrap(), 0.00011);
    assert_close(dist["tp2"].as_f64().unwrap(), -0.00022);
    assert_close(dist["rk3"].as_f64().unwrap(), 0.0033);

    let keys: Vec<_> = intr.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["fx", "fy", "height_px", "ppx", "ppy", "width_px"]);
}

#[test]
fn test_reports() {
    let temp_dir = TempDir::new().unwrap();
    let result = sample_result();
    let error = ReprojectionError {
        total: 0.02,
        per_view: vec![0.01, 0.03],
    };
    let paths = vec![PathBuf::from("a.jpg"), PathBuf::from("b.jpg")];
    let json_path = temp_dir.path().join("calibration_report.json");
    write_detailed_report(&json_path, &result, &error, &paths, 5).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert!(json["timestamp"].is_string());
    assert_eq!(json["images"], 5);
    assert_eq!(json["observations"], 2);
    assert_eq!(json["skipped"], 3);
    assert_eq!(json["views"].as_array().unwrap().len(), 2);
    assert_eq!(json["views"][1]["path"], "b.jpg");
    assert_close(json["views"][1]["error"].as_f64().unwrap(), 0.03);
    assert_close(json["total_error"].as_f64().unwrap(), 0.02);
    assert_eq!(json["camera_matrix"][2][2].as_f64().unwrap(), 1.0);

    let txt_path = temp_dir.path().join("report.txt");
    write_report(&txt_path, 2, (0.5, 0.25)).unwrap();
    let txt = std::fs::read_to_string(&txt_path).unwrap();
    assert!(txt.contains("2 views"));
    assert!(txt.contains("0.50000"));
    assert!(txt.contains("0.25000"));
}

#[test]
fn test_json_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("block.json");
    let block = ParameterBlock::new(&sample_result());
    object_to_json(&path, &block).unwrap();
    let back: ParameterBlock = object_from_json(&path).unwrap();
    assert_eq!(back.intrinsic_parameters.width_px, 1280);
    assert_close(back.intrinsic_parameters.fx, block.intrinsic_parameters.fx);
    assert_close(back.distortion_parameters.rk3, block.distortion_parameters.rk3);

    let missing: Result<ParameterBlock, _> = object_from_json(&temp_dir.path().join("none.json"));
    assert!(matches!(missing, Err(CalibError::Io(_))));
}
