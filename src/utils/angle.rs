//! Angle wrapping for periodic quantities (heading, bearing)

use nalgebra::RealField;

/// Wraps an angle into `(-π, π]`.
///
/// Non-finite input yields NaN.
#[inline]
pub fn normalize_angle<T: RealField + Copy>(angle: T) -> T {
    let pi = T::pi();
    let two_pi = T::two_pi();

    // `%` keeps the sign of the dividend, so the remainder lies in (-2π, 2π)
    let mut wrapped = angle % two_pi;
    if wrapped > pi {
        wrapped -= two_pi;
    } else if wrapped <= -pi {
        wrapped += two_pi;
    }
    wrapped
}
