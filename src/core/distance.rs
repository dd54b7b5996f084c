/// Squared Euclidean distance between two vectors of equal length
///
/// This is the metric of a flat L2 index: no square root is taken, so the
/// ordering matches true Euclidean distance while staying cheaper to compute.
///
/// # Arguments
/// * `a` - First vector
/// * `b` - Second vector, same length as `a`
///
/// # Returns
/// Sum of squared component differences
#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Dot product of two vectors of equal length
#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean norm of a vector
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scale a vector in place to unit length
///
/// Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let n = norm(v);
    if n > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}
