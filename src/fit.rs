//! Least-squares superposition of one frame onto another.

use glam::Vec3;
use nalgebra::{Matrix3, Vector3};

use crate::error::{Error, Result};
use crate::selection::AtomSelection;
use crate::Frame;

/// Check that `selection` is non-empty and fits both `mobile` and `reference`.
pub(crate) fn check_selection(
    mobile: &Frame,
    reference: &Frame,
    selection: &AtomSelection,
) -> Result<()> {
    if selection.is_empty() {
        return Err(Error::Selection("cannot fit over zero atoms".to_string()));
    }
    if !selection.fits(mobile.natoms()) || !selection.fits(reference.natoms()) {
        return Err(Error::Selection(format!(
            "fit selection of {} atoms does not fit a frame of {} atoms onto {} reference atoms",
            selection.len(),
            mobile.natoms(),
            reference.natoms()
        )));
    }
    Ok(())
}

fn to_vector(v: Vec3) -> Vector3<f64> {
    Vector3::new(v.x as f64, v.y as f64, v.z as f64)
}

fn centroid(frame: &Frame, selection: &AtomSelection) -> Vector3<f64> {
    let sum: Vector3<f64> = selection.iter().map(|idx| to_vector(frame.coord(idx))).sum();
    sum / selection.len() as f64
}

/// The rigid motion that best superposes the selected atoms of a mobile frame onto a reference.
///
/// A point `x` of the mobile frame is moved to `rotation * (x - from) + to`.
#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    pub rotation: Matrix3<f64>,
    pub from: Vector3<f64>,
    pub to: Vector3<f64>,
    rmsd: f64,
}

impl Superposition {
    /// Compute the optimal rotation and translation with the Kabsch algorithm.
    pub fn compute(mobile: &Frame, reference: &Frame, selection: &AtomSelection) -> Result<Self> {
        check_selection(mobile, reference, selection)?;

        let from = centroid(mobile, selection);
        let to = centroid(reference, selection);
        let mut h = Matrix3::zeros();
        for idx in selection.iter() {
            let x = to_vector(mobile.coord(idx)) - from;
            let y = to_vector(reference.coord(idx)) - to;
            h += x * y.transpose();
        }

        let svd = h.svd(true, true);
        let rotation = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => {
                let mut r = v_t.transpose() * u.transpose();
                // Correct for a reflection.
                if r.determinant() < 0.0 {
                    let mut v_t = v_t;
                    v_t.row_mut(2).neg_mut();
                    r = v_t.transpose() * u.transpose();
                }
                r
            }
            _ => Matrix3::identity(),
        };

        let mut superposition = Self {
            rotation,
            from,
            to,
            rmsd: 0.0,
        };
        let sum: f64 = selection
            .iter()
            .map(|idx| {
                let moved = superposition.transform(mobile.coord(idx));
                (moved - to_vector(reference.coord(idx))).norm_squared()
            })
            .sum();
        superposition.rmsd = (sum / selection.len() as f64).sqrt();
        Ok(superposition)
    }

    /// The deviation between the selected atoms after superposition.
    pub fn rmsd(&self) -> f64 {
        self.rmsd
    }

    fn transform(&self, point: Vec3) -> Vector3<f64> {
        self.rotation * (to_vector(point) - self.from) + self.to
    }

    /// Move every atom of `frame`, not only the selected ones.
    pub fn apply(&self, frame: &mut Frame) {
        for chunk in frame.positions_mut().chunks_exact_mut(3) {
            let moved = self.transform(Vec3::from_slice(chunk));
            chunk[0] = moved.x as f32;
            chunk[1] = moved.y as f32;
            chunk[2] = moved.z as f32;
        }
    }
}
