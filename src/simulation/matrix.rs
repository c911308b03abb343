/// Square row-major matrix of per-cell values.
///
/// Used for the per-step snapshots the simulator hands back to drivers.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T> {
    size: usize,
    data: Vec<T>,
}

impl<T: Copy + Default> Matrix<T> {
    /// Create a `size` x `size` matrix filled with `T::default()`
    pub fn new(size: usize) -> Self {
        Self {
            size,
            data: vec![T::default(); size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.size + col] = value;
    }

    /// Values in row-major order
    pub fn values(&self) -> &[T] {
        &self.data
    }

    /// Iterate rows as slices
    #[cfg(test)]
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        self.data.chunks(self.size.max(1))
    }
}

impl Matrix<f64> {
    /// Sum of all entries, accumulated in row-major order
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}
