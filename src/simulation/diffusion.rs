use super::matrix::Matrix;

/// Orthogonal neighbor offsets: up, down, left, right
const NEIGHBOR_OFFSETS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Diffuse `field` toward its 4-neighbor average.
///
/// Every output value is computed from the untouched input, so processing
/// order cannot bias the result. Edge cells average only the neighbors that
/// exist; a cell without neighbors keeps its value. A `rate` of zero returns
/// the input unchanged, as does a uniform field.
pub fn diffuse(field: &Matrix<f64>, rate: f64) -> Matrix<f64> {
    let size = field.size();
    let mut out = field.clone();

    for row in 0..size {
        for col in 0..size {
            let (sum, count) = neighbors(row, col, size)
                .map(|(r, c)| field.get(r, c))
                .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
            if count == 0 {
                continue;
            }
            let average = sum / f64::from(count);
            let old = field.get(row, col);
            out.set(row, col, old + (average - old) * rate);
        }
    }

    out
}

/// In-bounds orthogonal neighbors of (row, col)
fn neighbors(row: usize, col: usize, size: usize) -> impl Iterator<Item = (usize, usize)> {
    NEIGHBOR_OFFSETS.iter().filter_map(move |&(dr, dc)| {
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        (r < size && c < size).then_some((r, c))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(values: &[f64], size: usize) -> Matrix<f64> {
        let mut m = Matrix::new(size);
        for (i, v) in values.iter().enumerate() {
            m.set(i / size, i % size, *v);
        }
        m
    }

    #[test]
    fn test_zero_rate_is_identity() {
        let m = field(&[1.0, 5.0, 2.0, 8.0, 3.0, 0.5, 9.0, 4.0, 7.0], 3);
        assert_eq!(diffuse(&m, 0.0), m);
    }

    #[test]
    fn test_uniform_field_is_steady() {
        let m = field(&[70.0; 16], 4);
        assert_eq!(diffuse(&m, 0.2), m);
    }

    #[test]
    fn test_edge_and_corner_averages() {
        // 0 1 2
        // 3 4 5
        // 6 7 8
        let m = field(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], 3);
        let out = diffuse(&m, 1.0);

        // Corner (0,0): neighbors 1 and 3
        assert_eq!(out.get(0, 0), 2.0);
        // Edge (0,1): neighbors 0, 2, 4
        assert_eq!(out.get(0, 1), 2.0);
        // Center: neighbors 1, 7, 3, 5
        assert_eq!(out.get(1, 1), 4.0);
    }

    #[test]
    fn test_partial_rate_blends() {
        let m = field(&[0.0, 10.0, 10.0, 10.0], 2);
        let out = diffuse(&m, 0.5);
        assert_eq!(out.get(0, 0), 5.0);
        // (0,1): neighbors (1,1)=10 and (0,0)=0 -> average 5
        assert_eq!(out.get(0, 1), 7.5);
    }

    #[test]
    fn test_single_cell_keeps_value() {
        let m = field(&[42.0], 1);
        assert_eq!(diffuse(&m, 1.0).get(0, 0), 42.0);
    }

    #[test]
    fn test_uses_snapshot_not_partial_updates() {
        let m = field(&[100.0, 0.0, 0.0, 0.0], 2);
        let out = diffuse(&m, 1.0);
        // (0,1) sees the pre-step 100 at (0,0), not its diffused value
        assert_eq!(out.get(0, 1), 50.0);
        assert_eq!(out.get(1, 0), 50.0);
        assert_eq!(out.get(1, 1), 0.0);
    }
}
