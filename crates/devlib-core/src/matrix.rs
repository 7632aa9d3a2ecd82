//! Sparse stamp matrix with stable entry handles.
//!
//! Devices request one [`MatrixEntry`] per nonzero they contribute during
//! setup and write through it on every load. A handle stays valid until
//! [`Matrix::invalidate_entries`] is called (the matrix was reallocated);
//! after that every device must reacquire its handles before loading.
//!
//! Row or column 0 is the ground equation. Requests touching it return the
//! trash-can entry, which accepts writes and is never read back.

use indexmap::IndexMap;
use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::error::{Error, Result};

/// Opaque handle to one nonzero of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixEntry {
    slot: u32,
    generation: u32,
}

impl MatrixEntry {
    /// The ground trash-can entry.
    pub const TRASH: MatrixEntry = MatrixEntry {
        slot: 0,
        generation: 0,
    };

    /// Whether this handle points at the ground trash can.
    pub fn is_trash(self) -> bool {
        self.slot == 0
    }

    fn index(self) -> usize {
        self.slot as usize
    }
}

/// Real/complex coefficient matrix addressed through entry handles.
#[derive(Debug, Clone)]
pub struct Matrix {
    /// (row, col) -> slot, in allocation order.
    index: IndexMap<(usize, usize), u32>,
    real: Vec<f64>,
    imag: Vec<f64>,
    /// Iteration-invariant values restored by [`Matrix::clear_to_preload`].
    preload: Vec<f64>,
    has_preload: bool,
    generation: u32,
    entry_limit: Option<usize>,
    stale_writes: usize,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

impl Matrix {
    /// Create an empty matrix holding only the trash-can slot.
    pub fn new() -> Self {
        Self {
            index: IndexMap::new(),
            real: vec![0.0],
            imag: vec![0.0],
            preload: vec![0.0],
            has_preload: false,
            generation: 1,
            entry_limit: None,
            stale_writes: 0,
        }
    }

    /// Cap the number of allocatable entries. Requests beyond the cap fail
    /// with [`Error::NoMem`].
    pub fn set_entry_limit(&mut self, limit: Option<usize>) {
        self.entry_limit = limit;
    }

    /// Acquire the handle for `(row, col)`, allocating the entry if needed.
    pub fn get_entry(&mut self, row: usize, col: usize) -> Result<MatrixEntry> {
        if row == 0 || col == 0 {
            return Ok(MatrixEntry::TRASH);
        }
        if let Some(&slot) = self.index.get(&(row, col)) {
            return Ok(MatrixEntry {
                slot,
                generation: self.generation,
            });
        }
        if self.entry_limit.is_some_and(|limit| self.index.len() >= limit) {
            return Err(Error::NoMem { row, col });
        }
        let slot = self.real.len() as u32;
        self.real.push(0.0);
        self.imag.push(0.0);
        self.preload.push(0.0);
        self.index.insert((row, col), slot);
        Ok(MatrixEntry {
            slot,
            generation: self.generation,
        })
    }

    /// Look up an existing entry without allocating.
    pub fn find_entry(&self, row: usize, col: usize) -> Option<MatrixEntry> {
        self.index.get(&(row, col)).map(|&slot| MatrixEntry {
            slot,
            generation: self.generation,
        })
    }

    /// Whether a handle belongs to the current allocation.
    pub fn is_valid(&self, entry: MatrixEntry) -> bool {
        entry.is_trash() || entry.generation == self.generation
    }

    /// Add a real value through a handle.
    #[inline]
    pub fn add(&mut self, entry: MatrixEntry, value: f64) {
        if entry.is_trash() {
            return;
        }
        if entry.generation != self.generation {
            self.stale_writes += 1;
            return;
        }
        self.real[entry.index()] += value;
    }

    /// Add a complex value through a handle.
    #[inline]
    pub fn add_complex(&mut self, entry: MatrixEntry, re: f64, im: f64) {
        if entry.is_trash() {
            return;
        }
        if entry.generation != self.generation {
            self.stale_writes += 1;
            return;
        }
        self.real[entry.index()] += re;
        self.imag[entry.index()] += im;
    }

    /// Add an iteration-invariant value. It is written into the live matrix
    /// and restored by every [`Matrix::clear_to_preload`].
    pub fn preload_add(&mut self, entry: MatrixEntry, value: f64) {
        if entry.is_trash() {
            return;
        }
        if entry.generation != self.generation {
            self.stale_writes += 1;
            return;
        }
        self.preload[entry.index()] += value;
        self.real[entry.index()] += value;
        self.has_preload = true;
    }

    /// Whether any preloaded values exist.
    pub fn has_preload(&self) -> bool {
        self.has_preload
    }

    /// Drop all preloaded values.
    pub fn clear_preload(&mut self) {
        self.preload.fill(0.0);
        self.has_preload = false;
    }

    /// Zero every entry (real and imaginary parts).
    pub fn clear(&mut self) {
        self.real.fill(0.0);
        self.imag.fill(0.0);
    }

    /// Reset the real parts to the preloaded values and zero the imaginary parts.
    pub fn clear_to_preload(&mut self) {
        self.real.copy_from_slice(&self.preload);
        self.imag.fill(0.0);
    }

    /// Discard the entry map, as after a matrix reallocation. Every handle
    /// issued so far becomes stale.
    pub fn invalidate_entries(&mut self) {
        self.index.clear();
        self.real.truncate(1);
        self.imag.truncate(1);
        self.preload.truncate(1);
        self.has_preload = false;
        self.generation = self.generation.wrapping_add(1).max(1);
        log::debug!("matrix entries invalidated (generation {})", self.generation);
    }

    /// Real part stored at a handle.
    pub fn value(&self, entry: MatrixEntry) -> f64 {
        if entry.is_trash() || !self.is_valid(entry) {
            0.0
        } else {
            self.real[entry.index()]
        }
    }

    /// Real part at `(row, col)`, zero if the entry does not exist.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.index
            .get(&(row, col))
            .map_or(0.0, |&slot| self.real[slot as usize])
    }

    /// Complex value at `(row, col)`, zero if the entry does not exist.
    pub fn get_complex(&self, row: usize, col: usize) -> Complex64 {
        self.index.get(&(row, col)).map_or(Complex64::new(0.0, 0.0), |&slot| {
            Complex64::new(self.real[slot as usize], self.imag[slot as usize])
        })
    }

    /// Number of allocated (non-trash) entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no entries have been allocated.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Writes dropped because they used a stale handle.
    pub fn stale_writes(&self) -> usize {
        self.stale_writes
    }

    /// Iterate `(row, col, real)` in allocation order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.index
            .iter()
            .map(|(&(r, c), &slot)| (r, c, self.real[slot as usize]))
    }

    /// Dense real matrix over equations `1..=size` (ground dropped).
    pub fn to_dense(&self, size: usize) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(size, size);
        for (&(r, c), &slot) in &self.index {
            if r <= size && c <= size {
                m[(r - 1, c - 1)] += self.real[slot as usize];
            }
        }
        m
    }

    /// Dense complex matrix over equations `1..=size` (ground dropped).
    pub fn to_dense_complex(&self, size: usize) -> DMatrix<Complex64> {
        let mut m = DMatrix::from_element(size, size, Complex64::new(0.0, 0.0));
        for (&(r, c), &slot) in &self.index {
            if r <= size && c <= size {
                let s = slot as usize;
                m[(r - 1, c - 1)] += Complex64::new(self.real[s], self.imag[s]);
            }
        }
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ground_requests_return_trash() {
        let mut m = Matrix::new();
        assert!(m.get_entry(0, 3).unwrap().is_trash());
        assert!(m.get_entry(2, 0).unwrap().is_trash());
        assert!(m.is_empty());
    }

    #[test]
    fn test_same_position_same_handle() {
        let mut m = Matrix::new();
        let a = m.get_entry(1, 2).unwrap();
        let b = m.get_entry(1, 2).unwrap();
        assert_eq!(a, b);
        m.add(a, 1.5);
        m.add(b, 0.5);
        assert_eq!(m.get(1, 2), 2.0);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_entry_limit_reports_no_mem() {
        let mut m = Matrix::new();
        m.set_entry_limit(Some(1));
        m.get_entry(1, 1).unwrap();
        assert!(matches!(m.get_entry(1, 2), Err(Error::NoMem { row: 1, col: 2 })));
        // Existing entries are still handed out.
        assert!(m.get_entry(1, 1).is_ok());
    }

    #[test]
    fn test_invalidate_makes_handles_stale() {
        let mut m = Matrix::new();
        let e = m.get_entry(1, 1).unwrap();
        m.invalidate_entries();
        assert!(!m.is_valid(e));
        m.add(e, 1.0);
        assert_eq!(m.stale_writes(), 1);

        let fresh = m.get_entry(1, 1).unwrap();
        assert!(m.is_valid(fresh));
        m.add(fresh, 2.0);
        assert_eq!(m.get(1, 1), 2.0);
    }

    #[test]
    fn test_preload_survives_clear_to_preload() {
        let mut m = Matrix::new();
        let e = m.get_entry(1, 2).unwrap();
        m.preload_add(e, 1.0);
        m.add(e, 3.0);
        assert_eq!(m.get(1, 2), 4.0);
        m.clear_to_preload();
        assert_eq!(m.get(1, 2), 1.0);
        m.clear();
        assert_eq!(m.get(1, 2), 0.0);
    }

    #[test]
    fn test_to_dense_drops_ground() {
        let mut m = Matrix::new();
        let e = m.get_entry(2, 1).unwrap();
        m.add(e, -1.0);
        let t = m.get_entry(0, 1).unwrap();
        m.add(t, 100.0);
        let d = m.to_dense(2);
        assert_eq!(d[(1, 0)], -1.0);
        assert_eq!(d.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn test_complex_parts() {
        let mut m = Matrix::new();
        let e = m.get_entry(1, 1).unwrap();
        m.add_complex(e, 1.0, -2.0);
        assert_eq!(m.get_complex(1, 1), Complex64::new(1.0, -2.0));
        let d = m.to_dense_complex(1);
        assert_eq!(d[(0, 0)], Complex64::new(1.0, -2.0));
    }
}
