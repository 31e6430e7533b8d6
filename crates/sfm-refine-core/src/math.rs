use nalgebra::Vector3;

pub type Real = f64;

pub type Vec3 = Vector3<Real>;

/// Quadratic mean (root mean square) of a sequence of values.
///
/// Returns `None` for an empty sequence.
pub fn quadratic_mean<I>(values: I) -> Option<Real>
where
    I: IntoIterator<Item = Real>,
{
    let (sum_sq, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(acc, n), v| (acc + v * v, n + 1));
    if n == 0 {
        None
    } else {
        Some((sum_sq / n as Real).sqrt())
    }
}

/// Isotropic 3-D accuracy vector.
pub fn isotropic(sigma: Real) -> Vec3 {
    Vec3::repeat(sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_mean_of_empty_is_none() {
        assert!(quadratic_mean(Vec::<Real>::new()).is_none());
    }

    #[test]
    fn quadratic_mean_matches_definition() {
        let rms = quadratic_mean([3.0, 4.0]).unwrap();
        assert_relative_eq!(rms, (12.5f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn isotropic_repeats_sigma() {
        let v = isotropic(0.02);
        assert_eq!(v, Vec3::new(0.02, 0.02, 0.02));
    }
}
