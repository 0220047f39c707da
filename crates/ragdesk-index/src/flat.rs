use ragdesk_core::{Error, Result};

/// One k-NN result: the index row and its squared Euclidean distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

/// Exact (brute force) L2 index over row-major `f32` vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dim: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self { dim, data: Vec::new() }
    }

    /// Builds an index sized to the first vector. Every other vector must
    /// have the same length.
    pub fn from_vectors(vectors: &[Vec<f32>]) -> Result<Self> {
        let dim = vectors.first().map(Vec::len).unwrap_or(0);
        let mut index = Self::new(dim);
        index.data.reserve(dim * vectors.len());
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    /// Wraps raw row-major storage, as read back from disk.
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        if (dim == 0 && !data.is_empty()) || (dim > 0 && data.len() % dim != 0) {
            return Err(Error::DimensionMismatch { expected: dim, actual: data.len(), row: 0 });
        }
        Ok(Self { dim, data })
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len(), row: self.len() });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        if i >= self.len() {
            return None;
        }
        Some(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Up to `k` nearest rows, ascending by distance then row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len(), row: 0 });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(row, v)| Neighbor { row, distance: squared_l2(v, query) })
            .collect();
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row)));
        neighbors.truncate(k);
        Ok(neighbors)
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FlatL2Index {
        FlatL2Index::from_vectors(&[vec![0.0, 0.0], vec![3.0, 4.0], vec![1.0, 0.0]]).unwrap()
    }

    #[test]
    fn search_orders_by_squared_distance() {
        let hits = index().search(&[0.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|n| n.row).collect();
        assert_eq!(rows, vec![0, 2, 1]);
        assert_eq!(hits[2].distance, 25.0);
    }

    #[test]
    fn k_is_clamped_to_row_count() {
        assert_eq!(index().search(&[0.0, 0.0], 10).unwrap().len(), 3);
        assert!(index().search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn equal_distances_keep_row_order() {
        let idx = FlatL2Index::from_vectors(&[vec![1.0], vec![-1.0], vec![1.0]]).unwrap();
        let rows: Vec<usize> = idx.search(&[0.0], 3).unwrap().iter().map(|n| n.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let err = FlatL2Index::from_vectors(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1, row: 1 }));
        assert!(index().search(&[1.0], 1).is_err());
    }

    #[test]
    fn rows_read_back_in_insertion_order() {
        let idx = index();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(idx.row(3), None);
    }
}
