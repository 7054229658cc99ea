/// calculate the how many bits are needed to represent the count(0->count-1),
/// like 8 to 3, 16 to 4
/// ```
/// use neuro_tile::tools::math::count_to_log;
/// assert_eq!(count_to_log(8), 3);
/// assert_eq!(count_to_log(16), 4);
/// assert_eq!(count_to_log(32), 5);
/// ```
///
/// when count is not power of 2, it will be rounded up to the next power of 2
///
/// ```
/// use neuro_tile::tools::math::count_to_log;
/// assert_eq!(count_to_log(9), 4);
/// assert_eq!(count_to_log(1), 0);
/// ```
pub fn count_to_log(count: usize) -> usize {
    if count <= 1 {
        return 0;
    }
    let mut count = count - 1;
    let mut bits = 0;
    while count > 0 {
        count >>= 1;
        bits += 1;
    }
    bits
}

/// integer division rounding up
/// ```
/// use neuro_tile::tools::math::ceil_div;
/// assert_eq!(ceil_div(10, 4), 3);
/// assert_eq!(ceil_div(8, 4), 2);
/// assert_eq!(ceil_div(0, 4), 0);
/// ```
pub fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// `ceil(log2(x))` on a real value, clamped at zero for `x <= 1`
/// ```
/// use neuro_tile::tools::math::ceil_log2;
/// assert_eq!(ceil_log2(256.0 / 128.0), 1);
/// assert_eq!(ceil_log2(5.0), 3);
/// assert_eq!(ceil_log2(0.5), 0);
/// ```
pub fn ceil_log2(x: f64) -> usize {
    if x <= 1.0 {
        0
    } else {
        x.log2().ceil() as usize
    }
}

/// `ceil(sqrt(n))`, the side of the smallest square grid holding `n` items
/// ```
/// use neuro_tile::tools::math::ceil_sqrt;
/// assert_eq!(ceil_sqrt(16), 4);
/// assert_eq!(ceil_sqrt(17), 5);
/// ```
pub fn ceil_sqrt(n: usize) -> usize {
    (n as f64).sqrt().ceil() as usize
}
