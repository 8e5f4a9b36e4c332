use glam;
use serde::{Deserialize, Serialize};

/// Checkerboard geometry.
///
/// `corners_x` counts the interior corners along one row of the board (the
/// board's x axis), `corners_y` the interior corners along one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    #[serde(alias = "rows")]
    pub corners_x: usize,
    #[serde(alias = "cols")]
    pub corners_y: usize,
    /// Side length of one square, in the unit the translations are reported in.
    pub square_size: f32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            corners_x: 8,
            corners_y: 6,
            square_size: 30.0,
        }
    }
}

impl BoardConfig {
    pub fn num_corners(&self) -> usize {
        self.corners_x * self.corners_y
    }
}

pub struct Board {
    pub config: BoardConfig,
    /// Object points on the z = 0 plane, row by row, x varying fastest.
    pub object_points: Vec<glam::Vec3>,
}

impl Board {
    pub fn from_config(board_config: &BoardConfig) -> Board {
        Self::init_checkerboard(
            board_config.corners_x,
            board_config.corners_y,
            board_config.square_size,
        )
    }

    pub fn init_checkerboard(corners_x: usize, corners_y: usize, square_size: f32) -> Board {
        let mut object_points = Vec::with_capacity(corners_x * corners_y);
        for y in 0..corners_y {
            for x in 0..corners_x {
                object_points.push(glam::Vec3 {
                    x: x as f32 * square_size,
                    y: y as f32 * square_size,
                    z: 0.0,
                });
            }
        }
        Board {
            config: BoardConfig {
                corners_x,
                corners_y,
                square_size,
            },
            object_points,
        }
    }

    pub fn pattern_size(&self) -> (usize, usize) {
        (self.config.corners_x, self.config.corners_y)
    }

    pub fn len(&self) -> usize {
        self.object_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_points.is_empty()
    }
}

pub fn create_default_8x6_board() -> Board {
    Board::from_config(&BoardConfig::default())
}
