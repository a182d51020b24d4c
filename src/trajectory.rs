use std::sync::Arc;

use crate::error::{Error, Result};
use crate::image;
use crate::selection::{AtomSelection, Mask};
use crate::{Frame, Topology};

/// An in-memory trajectory: a list of frames that share one topology.
///
/// Chunks produced by [`crate::ChunkIter`] are trajectories, and a whole
/// [`crate::TrajectoryIterator`] can be loaded into one with
/// [`crate::TrajectoryIterator::to_mutable_trajectory`].
#[derive(Debug, Clone)]
pub struct Trajectory {
    topology: Arc<Topology>,
    frames: Vec<Frame>,
}

impl Trajectory {
    pub fn new(topology: impl Into<Arc<Topology>>) -> Self {
        Self {
            topology: topology.into(),
            frames: Vec::new(),
        }
    }

    /// Create a trajectory from `frames`, which must all have the atom count of `topology`.
    pub fn with_frames(topology: impl Into<Arc<Topology>>, frames: Vec<Frame>) -> Result<Self> {
        let mut trajectory = Self::new(topology);
        trajectory.frames.reserve(frames.len());
        for frame in frames {
            trajectory.push(frame)?;
        }
        Ok(trajectory)
    }

    pub(crate) fn from_parts(topology: Arc<Topology>, frames: Vec<Frame>) -> Self {
        Self { topology, frames }
    }

    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if frame.natoms() != self.n_atoms() {
            return Err(Error::ShapeMismatch(format!(
                "cannot add a frame of {} atoms to a trajectory of {} atoms",
                frame.natoms(),
                self.n_atoms()
            )));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.topology.natoms()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// `(n_frames, n_atoms, 3)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n_frames(), self.n_atoms(), 3)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Re-image every frame into its periodic box.
    pub fn autoimage(&mut self) -> Result<()> {
        for frame in &mut self.frames {
            image::autoimage(frame, &self.topology)?;
        }
        Ok(())
    }

    /// Superpose every frame onto `reference`, fitting over the atoms selected by `mask`.
    ///
    /// Returns the deviation of each frame after its fit.
    pub fn rmsfit(&mut self, reference: &Frame, mask: impl Into<Mask>) -> Result<Vec<f64>> {
        let selection = self.topology.resolve(&mask.into())?;
        self.superpose(reference, &selection)
    }

    /// Superpose every frame onto `reference`, fitting over the atoms in `selection`.
    pub fn superpose(&mut self, reference: &Frame, selection: &AtomSelection) -> Result<Vec<f64>> {
        self.frames
            .iter_mut()
            .map(|frame| frame.rmsfit(reference, selection))
            .collect()
    }

    /// The deviation of every frame from `reference` over the atoms selected by `mask`, without
    /// fitting.
    pub fn rmsd_nofit(&self, reference: &Frame, mask: impl Into<Mask>) -> Result<Vec<f64>> {
        let selection = self.topology.resolve(&mask.into())?;
        self.frames
            .iter()
            .map(|frame| frame.rmsd_nofit(reference, &selection))
            .collect()
    }
}

impl IntoIterator for Trajectory {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.into_iter()
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use glam::{Mat3, Vec3};

    use super::*;
    use crate::{Atom, BoxVec};

    fn topology() -> Topology {
        let atoms = (0..3).map(|i| Atom::new("C", "MOL", i, i as i32 + 1)).collect();
        Topology::new(atoms)
            .with_molecules(vec![0..1, 1..2, 2..3])
            .unwrap()
            .with_box(BoxVec::from_diagonal(Vec3::splat(5.0)))
    }

    fn frame(offset: f32) -> Frame {
        Frame::from_coords([
            Vec3::new(1.0, 1.0, 1.0) + offset,
            Vec3::new(2.0, 1.0, 1.0) + offset,
            Vec3::new(1.0, 3.0, 2.0) + offset,
        ])
    }

    #[test]
    fn frames_must_match_topology() {
        let mut trajectory = Trajectory::new(topology());
        trajectory.push(frame(0.0)).unwrap();
        assert!(matches!(
            trajectory.push(Frame::new(2)),
            Err(Error::ShapeMismatch(_))
        ));
        assert_eq!(trajectory.shape(), (1, 3, 3));
        assert!(Trajectory::with_frames(topology(), vec![frame(0.0), Frame::new(4)]).is_err());
    }

    #[test]
    fn autoimage_every_frame() {
        let frames = vec![frame(0.0), frame(7.0), frame(-12.0)];
        let mut trajectory = Trajectory::with_frames(topology(), frames).unwrap();
        trajectory.autoimage().unwrap();
        for frame in &trajectory {
            for coord in frame.coords() {
                assert!(coord.cmpge(Vec3::ZERO).all() && coord.cmplt(Vec3::splat(5.0)).all());
            }
        }
    }

    #[test]
    fn edit_frames_in_place() {
        let mut trajectory = Trajectory::with_frames(topology(), vec![frame(0.0); 2]).unwrap();
        trajectory.frames_mut()[1].translate(Vec3::X * 5.0);
        assert!((trajectory.frames()[1].coord(0).x - 6.0).abs() < 1e-6);
        trajectory.autoimage().unwrap();
        let [first, second] = trajectory.frames() else {
            panic!("expected two frames");
        };
        for (a, b) in first.coords().zip(second.coords()) {
            assert!((a - b).length() < 1e-5);
        }
    }

    #[test]
    fn rmsfit_every_frame() {
        let reference = frame(0.0);
        let rotation = Mat3::from_rotation_x(0.7);
        let rotated = Frame::from_coords(reference.coords().map(|c| rotation * c));
        let mut trajectory =
            Trajectory::with_frames(topology(), vec![rotated, frame(3.0)]).unwrap();

        let before = trajectory.rmsd_nofit(&reference, "*").unwrap();
        let after = trajectory.rmsfit(&reference, "*").unwrap();
        assert_eq!(after.len(), 2);
        assert!(before.iter().all(|&rmsd| rmsd > 0.5));
        assert!(after.iter().all(|&rmsd| rmsd < 1e-4));
        assert!(matches!(
            trajectory.rmsfit(&reference, "@O"),
            Err(Error::Selection(_))
        ));
    }
}
