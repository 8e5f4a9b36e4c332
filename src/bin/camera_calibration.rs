use checkerboard_calibration::config::CalibConfig;
use checkerboard_calibration::io::{self, ParameterBlock};
use checkerboard_calibration::pipeline::{run_calibration, undistort_demo};
use checkerboard_calibration::util::point_error_stats;
use checkerboard_calibration::vision::NativeBackend;
use checkerboard_calibration::visualization::{side_by_side, Visualizer};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(version, about, author)]
struct CCRSCli {
    /// path to image folder, every *.jp*g inside is used
    path: PathBuf,

    /// calibration config json, missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// inner corners along a board row
    #[arg(long)]
    corners_x: Option<usize>,

    /// inner corners along a board column
    #[arg(long)]
    corners_y: Option<usize>,

    /// side length of one square
    #[arg(long)]
    square_size: Option<f32>,

    /// stream detections and the undistortion demo to a rerun viewer
    #[arg(long)]
    visualize: bool,

    /// save the rerun recording to this file instead of spawning a viewer
    #[arg(long)]
    rrd: Option<PathBuf>,

    /// seed for picking the undistortion demo image
    #[arg(long)]
    seed: Option<u64>,

    /// save the original and undistorted demo image side by side as
    /// undistorted_sample.png in the image folder
    #[arg(long)]
    save_undistorted: bool,

    /// write a json report here, and a text summary next to it
    #[arg(long)]
    report: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = CCRSCli::parse();

    let mut config: CalibConfig = match &cli.config {
        Some(path) => io::object_from_json(path)?,
        None => CalibConfig::default(),
    };
    if let Some(v) = cli.corners_x {
        config.board.corners_x = v;
    }
    if let Some(v) = cli.corners_y {
        config.board.corners_y = v;
    }
    if let Some(v) = cli.square_size {
        config.board.square_size = v;
    }

    let visualizer = match (&cli.rrd, cli.visualize) {
        (Some(path), _) => Some(Visualizer::save(path)?),
        (None, true) => Some(Visualizer::spawn()?),
        (None, false) => None,
    };

    let backend = NativeBackend::from_config(&config);
    println!("reading images from directory {}", cli.path.display());
    let now = Instant::now();
    let calibration = run_calibration(&cli.path, &config, &backend, visualizer.as_ref())?;
    let duration_sec = now.elapsed().as_secs_f64();
    log::info!("calibration took {:.3} sec", duration_sec);

    let result = &calibration.result;
    let npz_path = io::write_calibration_npz(&cli.path, result)?;
    println!("ret {}", result.rms);
    println!("mtx {}", result.camera_matrix);
    println!("dist {:?}", result.distortion);
    for (i, pose) in result.poses.iter().enumerate() {
        println!("view {}: rvec {:?} tvec {:?}", i, pose.rvec, pose.tvec);
    }
    println!("imageSize {:?}", result.image_size);
    println!("Total error: {}", calibration.error.total);
    println!("saved {}", npz_path.display());

    if let Some(report_path) = &cli.report {
        let view_paths: Vec<_> = calibration
            .observations
            .frames()
            .iter()
            .map(|f| f.path.clone())
            .collect();
        io::write_detailed_report(
            report_path,
            result,
            &calibration.error,
            &view_paths,
            calibration.image_paths.len(),
        )?;
        let avg_med = point_error_stats(
            &backend,
            result,
            &calibration.observations.object_points(),
            &calibration.observations.image_points(),
        );
        io::write_report(&report_path.with_extension("txt"), result.poses.len(), avg_med)?;
    }

    println!("{}", ParameterBlock::new(result).to_json_string()?);

    let demo = match undistort_demo(&calibration.image_paths, result, &backend, cli.seed) {
        Ok(demo) => demo,
        Err(e) => {
            log::warn!("undistortion demo skipped: {}", e);
            return Ok(());
        }
    };
    log::info!(
        "optimal camera matrix for alpha 1: {} roi {:?}",
        demo.optimal_camera_matrix,
        demo.roi
    );

    if cli.save_undistorted {
        let path = cli.path.join("undistorted_sample.png");
        side_by_side(&demo.original, &demo.undistorted)?.save(&path)?;
        println!("saved {}", path.display());
    }
    if let Some(vis) = &visualizer {
        vis.log_undistortion(&demo.original, &demo.undistorted)?;
    }
    Ok(())
}
