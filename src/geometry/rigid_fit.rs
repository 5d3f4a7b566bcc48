//! Closed-form rigid alignment of two point sets (Horn's method).

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

use super::SE3;

/// Rigid transform `T` minimizing `Σ‖T·a_i − b_i‖²` over paired points.
///
/// Horn's closed form: SVD of the cross-covariance of the centered sets,
/// with the last singular direction flipped when the best orthogonal fit is
/// a reflection.
///
/// Returns `None` for fewer than three pairs, mismatched lengths, or when
/// the SVD does not produce both factors.
pub fn fit_rigid_transform(from: &[Vector3<f64>], to: &[Vector3<f64>]) -> Option<SE3> {
    if from.len() < 3 || from.len() != to.len() {
        return None;
    }

    let mean_from = compute_centroid(from);
    let mean_to = compute_centroid(to);
    let cross_cov = from
        .iter()
        .zip(to)
        .fold(Matrix3::zeros(), |acc: Matrix3<f64>, (a, b)| {
            acc + (a - mean_from) * (b - mean_to).transpose()
        });

    let svd = cross_cov.svd(true, true);
    let (u, v) = (svd.u?, svd.v_t?.transpose());

    let sign = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, sign));
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
        v * correction * u.transpose(),
    ));

    Some(SE3 {
        rotation,
        translation: mean_to - rotation * mean_from,
    })
}

/// Compute centroid of a set of 3D points.
fn compute_centroid(points: &[Vector3<f64>]) -> Vector3<f64> {
    match points.len() {
        0 => Vector3::zeros(),
        n => points.iter().sum::<Vector3<f64>>() / n as f64,
    }
}
