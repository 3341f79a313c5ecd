//! Timing-model design matrix and its column-normalized basis.
//!
//! The design matrix has one row per TOA and one column per linear timing-model
//! parameter:
//!
//! - column 0: constant phase offset
//! - one column per fitted spin parameter `Fk`: `(t - t̄)^(k+1) / (k+1)!`
//!
//! Both timing-model flavours (plain linear and ridge regression) marginalize over
//! the column-normalized ("scaled") version of this matrix.
//!
//! Red-noise style terms use a Fourier basis sampled at `i / Tspan`.

use nalgebra::DMatrix;

use crate::data::Pulsar;

/// Columns with a norm below this are left unscaled.
const NORM_EPS: f64 = 1e-300;

/// Build the linear timing-model design matrix of a pulsar.
pub fn design_matrix(pulsar: &Pulsar) -> DMatrix<f64> {
    let spin_orders: Vec<u32> = pulsar
        .fitpars
        .iter()
        .filter_map(|p| p.strip_prefix('F').and_then(|k| k.parse::<u32>().ok()))
        .collect();

    let n = pulsar.toas.len();
    let mean = if n == 0 {
        0.0
    } else {
        pulsar.toas.iter().sum::<f64>() / n as f64
    };

    let mut m = DMatrix::zeros(n, 1 + spin_orders.len());
    for (row, &toa) in pulsar.toas.iter().enumerate() {
        let dt = toa - mean;
        m[(row, 0)] = 1.0;
        for (col, &k) in spin_orders.iter().enumerate() {
            let power = k + 1;
            m[(row, col + 1)] = dt.powi(power as i32) / factorial(power);
        }
    }
    m
}

/// Divide every column by its Euclidean norm.
pub fn scaled_tm_basis(design: &DMatrix<f64>) -> DMatrix<f64> {
    let mut scaled = design.clone();
    for mut column in scaled.column_iter_mut() {
        let norm = column.norm();
        if norm > NORM_EPS {
            column /= norm;
        }
    }
    scaled
}

/// Sine/cosine pairs at frequencies `1/tspan .. components/tspan`.
///
/// Column `2i` holds `sin(2π f_i t)` and column `2i + 1` holds `cos(2π f_i t)`.
/// A non-positive `tspan` yields an empty basis.
pub fn fourier_basis(toas: &[f64], components: usize, tspan: f64) -> DMatrix<f64> {
    if tspan <= 0.0 {
        return DMatrix::zeros(toas.len(), 0);
    }
    let mut f = DMatrix::zeros(toas.len(), 2 * components);
    for (row, &toa) in toas.iter().enumerate() {
        for i in 0..components {
            let phase = 2.0 * std::f64::consts::PI * (i + 1) as f64 / tspan * toa;
            f[(row, 2 * i)] = phase.sin();
            f[(row, 2 * i + 1)] = phase.cos();
        }
    }
    f
}

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}
