use checkerboard_calibration::board::BoardConfig;
use checkerboard_calibration::io::object_to_json;
use checkerboard_calibration::synthetic::{
    SyntheticCamera, occlude, project_corners, random_board_pose, render_checkerboard,
};
use checkerboard_calibration::types::{Roi, RvecTvec};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a synthetic calibration dataset
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Board configuration JSON
        #[arg(short, long)]
        board_config: Option<PathBuf>,

        /// Camera JSON with width, height and the nine pinhole parameters
        #[arg(short, long)]
        camera: Option<PathBuf>,

        /// Number of frames to generate
        #[arg(short, long, default_value = "20")]
        num_frames: usize,

        /// Frames whose board is hidden behind a flat patch
        #[arg(long, default_value = "0")]
        occluded: usize,

        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

#[derive(Serialize)]
struct GroundTruth {
    camera: SyntheticCamera,
    board: BoardConfig,
    frames: Vec<GroundTruthFrame>,
}

#[derive(Serialize)]
struct GroundTruthFrame {
    file: String,
    occluded: bool,
    pose: RvecTvec,
    corners: Vec<(f32, f32)>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match args.command {
        Commands::Generate {
            output,
            board_config,
            camera,
            num_frames,
            occluded,
            seed,
        } => {
            let board: BoardConfig = match board_config {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => BoardConfig::default(),
            };
            let camera: SyntheticCamera = match camera {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => SyntheticCamera::default(),
            };
            generate_dataset(&output, &board, &camera, num_frames, occluded, seed)?;
        }
    }

    Ok(())
}

fn generate_dataset(
    output_dir: &Path,
    board: &BoardConfig,
    camera: &SyntheticCamera,
    num_frames: usize,
    occluded: usize,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(output_dir)?;
    let model = camera.model();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let pose = random_board_pose(&mut rng, &model, board, 10.0)
            .ok_or("no board pose fits inside the image")?;
        let mut img = render_checkerboard(&model, &pose, board, 3);
        let hidden = frame_idx < occluded;
        if hidden {
            occlude(
                &mut img,
                Roi {
                    x: 0,
                    y: 0,
                    width: camera.width,
                    height: camera.height,
                },
                128,
            );
        }
        let file = format!("{:06}.jpg", frame_idx);
        img.save(output_dir.join(&file))?;
        frames.push(GroundTruthFrame {
            file,
            occluded: hidden,
            pose,
            corners: project_corners(&model, &pose, board)
                .iter()
                .map(|p| (p.x, p.y))
                .collect(),
        });
    }

    object_to_json(
        &output_dir.join("ground_truth.json"),
        &GroundTruth {
            camera: *camera,
            board: *board,
            frames,
        },
    )?;
    log::info!("generated {} frames in {}", num_frames, output_dir.display());
    Ok(())
}
