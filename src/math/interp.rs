//! Piecewise-linear interpolation with linear extrapolation.

/// Evaluate the piecewise-linear interpolant through `(xs, ys)` at `x`.
///
/// Outside `[xs[0], xs[last]]` the first/last segment is extended.
/// `xs` must be strictly increasing; callers validate this once when
/// building the interpolant. An empty grid yields NaN and a single point
/// is a constant.
pub fn interp_linear(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let len = xs.len().min(ys.len());
    match len {
        0 => return f64::NAN,
        1 => return ys[0],
        _ => {}
    }
    let last = len - 1;

    // Segment index `i` such that xs[i] <= x < xs[i+1], clamped to the
    // outermost segments for extrapolation.
    let i = match xs.partition_point(|&v| v <= x) {
        0 => 0,
        p if p > last => last - 1,
        p => (p - 1).min(last - 1),
    };

    let (x0, x1) = (xs[i], xs[i + 1]);
    let (y0, y1) = (ys[i], ys[i + 1]);
    if x == x1 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Return `true` if `xs` is finite and strictly increasing.
pub fn is_strictly_increasing(xs: &[f64]) -> bool {
    xs.iter().all(|v| v.is_finite()) && xs.windows(2).all(|w| w[1] > w[0])
}
