//! Binary amplitude shapes centred on the optical axis.

use ndarray::{Array2, Zip};

use crate::error::{ensure_positive, OpticsError, OpticsResult};
use crate::grid::Grid;

const EDGE: f64 = 1e-12;

/// Checkerboard of `tiles` squares of side `tile_length`, 1 on even tiles.
/// Samples outside the board are 0.
pub fn checkerboard(grid: &Grid, tile_length: [f64; 2], tiles: [usize; 2]) -> OpticsResult<Array2<f64>> {
    ensure_positive("tile_length", tile_length[0])?;
    ensure_positive("tile_length", tile_length[1])?;
    if tiles[0] == 0 || tiles[1] == 0 {
        return Err(OpticsError::invalid(
            "tiles",
            format!("must be positive, got {:?}", tiles),
        ));
    }
    let index = |v: f64, axis: usize| -> Option<i64> {
        let t = tile_length[axis];
        let i = ((v + tiles[axis] as f64 * t / 2.0) / t).floor() as i64;
        (0..tiles[axis] as i64).contains(&i).then_some(i)
    };
    let (x, y) = grid.meshgrid();
    Ok(Zip::from(&x).and(&y).map_collect(|&x, &y| {
        match (index(x, 0), index(y, 1)) {
            (Some(i), Some(j)) if (i + j) % 2 == 0 => 1.0,
            _ => 0.0,
        }
    }))
}

/// Disk of the given radius.
pub fn circle(grid: &Grid, radius: f64) -> OpticsResult<Array2<f64>> {
    ensure_positive("radius", radius)?;
    let limit = radius * radius * (1.0 + EDGE);
    Ok(grid.radius_squared().mapv(|r2| if r2 <= limit { 1.0 } else { 0.0 }))
}

/// Rectangle with side lengths `side = [a, b]`.
pub fn rectangle(grid: &Grid, side: [f64; 2]) -> OpticsResult<Array2<f64>> {
    ensure_positive("side", side[0])?;
    ensure_positive("side", side[1])?;
    let (hx, hy) = (side[0] / 2.0 * (1.0 + EDGE), side[1] / 2.0 * (1.0 + EDGE));
    let (x, y) = grid.meshgrid();
    Ok(Zip::from(&x).and(&y).map_collect(|&x, &y| {
        if x.abs() <= hx && y.abs() <= hy {
            1.0
        } else {
            0.0
        }
    }))
}

pub fn square(grid: &Grid, side: f64) -> OpticsResult<Array2<f64>> {
    rectangle(grid, [side, side])
}
