//! Small dense complex matrices for MIMO processing
//!
//! Determinants and adjugates use cofactor expansion over row/column index
//! lists, with closed forms for 1x1 and 2x2. The element type is generic so
//! the same code serves exact integer (`Complex<i128>`) and floating-point
//! (`Complex<f64>`) equalization.

use num_traits::{One, Zero};
use std::ops::{Add, Mul, Neg, Sub};

/// Ring operations needed by cofactor expansion
pub trait Element:
    Copy + Zero + One + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Neg<Output = Self>
{
}

impl<T> Element for T where
    T: Copy + Zero + One + Add<Output = T> + Sub<Output = T> + Mul<Output = T> + Neg<Output = T>
{
}

/// Row-major n x n matrix
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix<T> {
    n: usize,
    data: Vec<T>,
}

impl<T: Element> SquareMatrix<T> {
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, |i, j| if i == j { T::one() } else { T::zero() })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: T) {
        self.data[i * self.n + j] = value;
    }

    /// Add `value` to every diagonal element
    pub fn add_diagonal(&mut self, value: T) {
        for i in 0..self.n {
            let d = self.get(i, i);
            self.set(i, i, d + value);
        }
    }

    /// Determinant of the sub-matrix selected by `rows` x `cols`
    fn minor_det(&self, rows: &[usize], cols: &[usize]) -> T {
        match rows.len() {
            0 => T::one(),
            1 => self.get(rows[0], cols[0]),
            2 => {
                self.get(rows[0], cols[0]) * self.get(rows[1], cols[1])
                    - self.get(rows[0], cols[1]) * self.get(rows[1], cols[0])
            }
            m => {
                // expand along the first selected row
                let sub_rows = &rows[1..];
                let mut sub_cols = Vec::with_capacity(m - 1);
                let mut det = T::zero();
                for (c, &col) in cols.iter().enumerate() {
                    sub_cols.clear();
                    sub_cols.extend(cols.iter().enumerate().filter(|&(i, _)| i != c).map(|(_, &j)| j));
                    let term = self.get(rows[0], col) * self.minor_det(sub_rows, &sub_cols);
                    det = if c % 2 == 0 { det + term } else { det - term };
                }
                det
            }
        }
    }

    pub fn determinant(&self) -> T {
        let all: Vec<usize> = (0..self.n).collect();
        self.minor_det(&all, &all)
    }

    /// Transposed cofactor matrix: `A * adj(A) = det(A) * I`
    pub fn adjugate(&self) -> Self {
        let n = self.n;
        let mut adj = Self::from_fn(n, |_, _| T::zero());
        let mut rows = Vec::with_capacity(n);
        let mut cols = Vec::with_capacity(n);
        for i in 0..n {
            for j in 0..n {
                rows.clear();
                cols.clear();
                rows.extend((0..n).filter(|&r| r != i));
                cols.extend((0..n).filter(|&c| c != j));
                let cofactor = self.minor_det(&rows, &cols);
                adj.set(j, i, if (i + j) % 2 == 0 { cofactor } else { -cofactor });
            }
        }
        adj
    }

    /// Matrix-vector product
    pub fn mul_vec(&self, v: &[T]) -> Vec<T> {
        (0..self.n)
            .map(|i| (0..self.n).fold(T::zero(), |acc, j| acc + self.get(i, j) * v[j]))
            .collect()
    }

    /// Diagonal element `i` of `self * other`
    pub fn product_diagonal(&self, other: &Self, i: usize) -> T {
        (0..self.n).fold(T::zero(), |acc, j| acc + self.get(i, j) * other.get(j, i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    type Ci = Complex<i128>;
    type Cf = Complex<f64>;

    fn ci(re: i128, im: i128) -> Ci {
        Ci::new(re, im)
    }

    #[test]
    fn test_small_closed_forms() {
        let m1 = SquareMatrix::from_fn(1, |_, _| ci(3, -2));
        assert_eq!(m1.determinant(), ci(3, -2));
        assert_eq!(m1.adjugate(), SquareMatrix::identity(1));

        let m2 = SquareMatrix::from_vec_for_test(2, vec![ci(1, 0), ci(2, 1), ci(0, -1), ci(4, 0)]);
        // 1*4 - (2+i)(-i) = 4 + 2i - 1 = 3 + 2i
        assert_eq!(m2.determinant(), ci(3, 2));
        let adj = m2.adjugate();
        assert_eq!(adj.get(0, 0), ci(4, 0));
        assert_eq!(adj.get(0, 1), ci(-2, -1));
        assert_eq!(adj.get(1, 0), ci(0, 1));
        assert_eq!(adj.get(1, 1), ci(1, 0));
    }

    #[test]
    fn test_adjugate_identity_4x4() {
        let values = [
            [4, 1, 0, 2],
            [1, 5, 1, 0],
            [0, 1, 6, 1],
            [2, 0, 1, 7],
        ];
        let m = SquareMatrix::from_fn(4, |i, j| ci(values[i][j], (i as i128) - (j as i128)));
        let det = m.determinant();
        let adj = m.adjugate();
        for i in 0..4 {
            for j in 0..4 {
                let p = (0..4).fold(Ci::zero(), |acc, k| acc + m.get(i, k) * adj.get(k, j));
                let expected = if i == j { det } else { Ci::zero() };
                assert_eq!(p, expected, "({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_float_inverse_3x3() {
        let m = SquareMatrix::from_fn(3, |i, j| {
            if i == j {
                Cf::new(3.0 + i as f64, 0.0)
            } else {
                Cf::new(0.5, if i < j { 0.25 } else { -0.25 })
            }
        });
        let det = m.determinant();
        let adj = m.adjugate();
        for i in 0..3 {
            let d = m.product_diagonal(&adj, i) / det;
            assert!((d.re - 1.0).abs() < 1e-12 && d.im.abs() < 1e-12);
        }
        assert_eq!(m.mul_vec(&[Cf::one(), Cf::zero(), Cf::zero()])[0], Cf::new(3.0, 0.0));
    }

    impl<T: Element> SquareMatrix<T> {
        fn from_vec_for_test(n: usize, data: Vec<T>) -> Self {
            Self { n, data }
        }
    }
}
