//! Row-major f32 matrix with a little-endian binary codec.
//!
//! The on-disk form is raw rows with no header; row count and dimension live
//! in the index sidecar, which is what makes a loaded matrix verifiable.

use bytes::{Buf, BufMut, BytesMut};

use clipvault_common::ClipVaultError;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl VectorMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    /// Append one row. The row must match the matrix dimension.
    pub fn push_row(&mut self, row: &[f32]) -> Result<(), ClipVaultError> {
        if row.len() != self.dim {
            return Err(ClipVaultError::Embedding(format!(
                "vector of dimension {} appended to matrix of dimension {}",
                row.len(),
                self.dim
            )));
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.data.len() * 4);
        for v in &self.data {
            buf.put_f32_le(*v);
        }
        buf.to_vec()
    }

    /// Decode a matrix of exactly `rows` x `dim` values. Any size mismatch is
    /// a malformed-state error, never a truncated matrix.
    pub fn from_bytes(dim: usize, rows: usize, mut bytes: &[u8]) -> Result<Self, ClipVaultError> {
        let expected = rows * dim * 4;
        if bytes.len() != expected {
            return Err(ClipVaultError::Store(format!(
                "matrix file holds {} bytes, expected {} ({rows} rows x {dim} dims)",
                bytes.len(),
                expected
            )));
        }
        let mut data = Vec::with_capacity(rows * dim);
        while bytes.has_remaining() {
            data.push(bytes.get_f32_le());
        }
        Ok(Self { dim, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_bytes() {
        let mut m = VectorMatrix::new(3);
        m.push_row(&[1.0, 2.0, 3.0]).unwrap();
        m.push_row(&[-0.5, 0.25, 4.5]).unwrap();

        let bytes = m.to_bytes();
        assert_eq!(bytes.len(), 2 * 3 * 4);

        let decoded = VectorMatrix::from_bytes(3, 2, &bytes).unwrap();
        assert_eq!(decoded, m);
        assert_eq!(decoded.row(1), &[-0.5, 0.25, 4.5]);
    }

    #[test]
    fn rejects_row_of_wrong_dimension() {
        let mut m = VectorMatrix::new(2);
        assert!(m.push_row(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn rejects_byte_length_mismatch() {
        let bytes = vec![0u8; 10];
        match VectorMatrix::from_bytes(3, 1, &bytes) {
            Err(ClipVaultError::Store(_)) => {}
            other => panic!("expected store error, got {other:?}"),
        }
    }
}
