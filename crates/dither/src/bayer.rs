use crate::DitherError;

/// Builds an `n`x`n` ordered-dither matrix in row-major order.
///
/// The matrix is grown recursively from the 1x1 seed:
///
/// ```text
///   M(2n) = | 4M(n) + 0   4M(n) + 2 |
///           | 4M(n) + 3   4M(n) + 1 |
/// ```
///
/// so every value in `0..n*n` appears exactly once.
pub fn bayer_matrix(n: u32) -> Result<Vec<u32>, DitherError> {
    if n == 0 || n > 256 || !n.is_power_of_two() {
        return Err(DitherError::InvalidBayerSize(n));
    }

    let mut size = 1usize;
    let mut matrix = vec![0u32];
    while size < n as usize {
        let next = size * 2;
        let mut grown = vec![0u32; next * next];
        for y in 0..size {
            for x in 0..size {
                let base = matrix[y * size + x] * 4;
                grown[y * next + x] = base;
                grown[y * next + x + size] = base + 2;
                grown[(y + size) * next + x] = base + 3;
                grown[(y + size) * next + x + size] = base + 1;
            }
        }
        matrix = grown;
        size = next;
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_matches_classic_layout() {
        assert_eq!(bayer_matrix(2).unwrap(), vec![0, 2, 3, 1]);
    }

    #[test]
    fn four_by_four_matches_classic_layout() {
        let expected = vec![0, 8, 2, 10, 12, 4, 14, 6, 3, 11, 1, 9, 15, 7, 13, 5];
        assert_eq!(bayer_matrix(4).unwrap(), expected);
    }

    #[test]
    fn larger_matrices_are_permutations() {
        for n in [8u32, 16] {
            let mut values = bayer_matrix(n).unwrap();
            values.sort_unstable();
            let expected: Vec<u32> = (0..n * n).collect();
            assert_eq!(values, expected, "size {n}");
        }
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(matches!(
            bayer_matrix(6),
            Err(DitherError::InvalidBayerSize(6))
        ));
        assert!(matches!(
            bayer_matrix(0),
            Err(DitherError::InvalidBayerSize(0))
        ));
    }
}
