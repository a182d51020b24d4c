//! Lazy, memory-bounded iteration over molecular dynamics trajectories.
//!
//! A [`TrajectoryIterator`] stitches one or more trajectory files together into a single logical
//! sequence of frames. Frames are only read when they are asked for, and every frame can be
//! re-imaged into its periodic box, fitted onto a reference structure, and projected onto a
//! subset of atoms on its way out.
//!
//! ```no_run
//! use trajiter::{FrameIterOptions, FrameRange, TrajectoryIterator};
//!
//! # fn main() -> trajiter::Result<()> {
//! let (topology, reference) = trajiter::pdb::read("protein.pdb")?;
//! let traj = TrajectoryIterator::open("md.xyz", topology, FrameRange::default())?;
//! let options = FrameIterOptions::default()
//!     .with_autoimage(true)
//!     .with_rmsfit(reference, "@CA")
//!     .with_mask("@CA");
//! for frame in traj.frame_iter(options)? {
//!     let frame = frame?;
//!     println!("{}", frame.natoms());
//! }
//! # Ok(())
//! # }
//! ```

use glam::{Mat3, Vec3};

pub use crate::error::{Error, Result};
pub use crate::fanout::{FanOutExt, Slice, Tee};
pub use crate::iterator::{
    ChunkIter, ChunkIterOptions, Filenames, FrameIter, FrameIterOptions, TrajectoryIterator,
};
pub use crate::pipeline::{Pipeline, RmsFit};
pub use crate::reader::{open_source, FrameSource};
pub use crate::selection::{
    resolve_frame_slices, AtomSelection, FrameRange, FrameSlices, Mask, ResolvedRange,
};
pub use crate::source::SourceSequence;
pub use crate::topology::{Atom, Topology};
pub use crate::trajectory::Trajectory;

mod error;
pub mod fanout;
pub mod fit;
pub mod image;
mod iterator;
pub mod mask;
pub mod mdcrd;
pub mod pdb;
mod pipeline;
pub mod reader;
pub mod selection;
mod source;
mod topology;
mod trajectory;
pub mod xyz;

/// The box vectors of a periodic cell, stored as the columns of the matrix.
pub type BoxVec = Mat3;

/// Build the box vectors of a cell from its edge lengths and its angles in degrees.
///
/// The first vector lies along x and the second in the xy-plane.
pub fn boxvec_from_lengths_angles(lengths: [f32; 3], angles: [f32; 3]) -> BoxVec {
    let [a, b, c] = lengths;
    let [alpha, beta, gamma] = angles.map(f32::to_radians);
    let (cos_alpha, cos_beta, cos_gamma) = (alpha.cos(), beta.cos(), gamma.cos());
    let sin_gamma = gamma.sin();

    let va = Vec3::new(a, 0.0, 0.0);
    let vb = Vec3::new(b * cos_gamma, b * sin_gamma, 0.0);
    let cx = cos_beta;
    let cy = (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
    let cz = (1.0 - cx * cx - cy * cy).max(0.0).sqrt();
    let vc = Vec3::new(c * cx, c * cy, c * cz);
    Mat3::from_cols(va, vb, vc)
}

/// The coordinates of all atoms in one snapshot of a trajectory.
///
/// The positions are stored flat, as `[x0, y0, z0, x1, y1, z1, ...]`. Their number is always a
/// multiple of three.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Frame {
    /// The periodic box of this frame, if it has one.
    pub boxvec: Option<BoxVec>,
    positions: Vec<f32>,
}

impl Frame {
    /// Create a frame of `natoms` atoms, all placed at the origin.
    pub fn new(natoms: usize) -> Self {
        Self {
            boxvec: None,
            positions: vec![0.0; natoms * 3],
        }
    }

    /// Create a frame from flat positions.
    pub fn from_positions(positions: Vec<f32>) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(Error::ShapeMismatch(format!(
                "{} values cannot be split into xyz triples",
                positions.len()
            )));
        }
        Ok(Self {
            boxvec: None,
            positions,
        })
    }

    /// Create a frame from a list of coordinates.
    pub fn from_coords(coords: impl IntoIterator<Item = Vec3>) -> Self {
        let mut frame = Self::default();
        frame.positions.extend(coords.into_iter().flat_map(|c| c.to_array()));
        frame
    }

    /// Append atoms with the given coordinates to this frame.
    pub fn append_xyz(&mut self, xyz: &[[f32; 3]]) {
        self.positions.extend(xyz.iter().flatten());
    }

    pub fn with_boxvec(mut self, boxvec: Option<BoxVec>) -> Self {
        self.boxvec = boxvec;
        self
    }

    pub fn natoms(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn positions(&self) -> &[f32] {
        &self.positions
    }

    /// Mutable access to the positions. The number of atoms cannot change through this slice.
    pub fn positions_mut(&mut self) -> &mut [f32] {
        &mut self.positions
    }

    /// Change the number of atoms in this frame. New atoms are placed at the origin.
    pub fn resize(&mut self, natoms: usize) {
        self.positions.resize(natoms * 3, 0.0);
    }

    pub fn coords(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.positions.chunks_exact(3).map(Vec3::from_slice)
    }

    /// The position of the atom at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not smaller than [`Frame::natoms`].
    pub fn coord(&self, idx: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[idx * 3..idx * 3 + 3])
    }

    /// Set the position of the atom at `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not smaller than [`Frame::natoms`].
    pub fn set_coord(&mut self, idx: usize, coord: Vec3) {
        self.positions[idx * 3..idx * 3 + 3].copy_from_slice(&coord.to_array());
    }

    /// Move every atom by `offset`.
    pub fn translate(&mut self, offset: Vec3) {
        for chunk in self.positions.chunks_exact_mut(3) {
            let moved = Vec3::from_slice(chunk) + offset;
            chunk.copy_from_slice(&moved.to_array());
        }
    }

    /// Extract the atoms in `selection` into a new, smaller frame.
    ///
    /// The new frame keeps the box of this frame.
    pub fn project(&self, selection: &AtomSelection) -> Result<Frame> {
        if !selection.fits(self.natoms()) {
            return Err(Error::ShapeMismatch(format!(
                "selection of {} atoms reaches beyond a frame of {} atoms",
                selection.len(),
                self.natoms()
            )));
        }
        let mut positions = Vec::with_capacity(selection.len() * 3);
        for idx in selection.iter() {
            positions.extend_from_slice(&self.positions[idx * 3..idx * 3 + 3]);
        }
        Ok(Frame {
            boxvec: self.boxvec,
            positions,
        })
    }

    /// The root mean square deviation between the `selection` of this frame and the same atoms in
    /// `reference`, without superposing them first.
    pub fn rmsd_nofit(&self, reference: &Frame, selection: &AtomSelection) -> Result<f64> {
        fit::check_selection(self, reference, selection)?;
        let sum: f64 = selection
            .iter()
            .map(|idx| self.coord(idx).distance_squared(reference.coord(idx)) as f64)
            .sum();
        Ok((sum / selection.len() as f64).sqrt())
    }

    /// The root mean square deviation between the `selection` of this frame and the same atoms in
    /// `reference`, after optimally superposing them. This frame is left untouched.
    pub fn rmsd(&self, reference: &Frame, selection: &AtomSelection) -> Result<f64> {
        let superposition = fit::Superposition::compute(self, reference, selection)?;
        Ok(superposition.rmsd())
    }

    /// Superpose this frame onto `reference`, fitting over the atoms in `selection` and moving
    /// all atoms. Returns the deviation after the fit.
    pub fn rmsfit(&mut self, reference: &Frame, selection: &AtomSelection) -> Result<f64> {
        let superposition = fit::Superposition::compute(self, reference, selection)?;
        superposition.apply(self);
        Ok(superposition.rmsd())
    }
}
