//! Re-imaging of coordinates into the primary periodic cell.

use std::ops::Range;

use glam::Vec3;

use crate::error::{Error, Result};
use crate::{BoxVec, Frame, Topology};

fn center_of_geometry(frame: &Frame, atoms: Range<usize>) -> Vec3 {
    let n = atoms.len();
    let sum: Vec3 = atoms.map(|idx| frame.coord(idx)).sum();
    sum / n as f32
}

fn translate_atoms(frame: &mut Frame, atoms: Range<usize>, offset: Vec3) {
    for idx in atoms {
        let moved = frame.coord(idx) + offset;
        frame.set_coord(idx, moved);
    }
}

/// The periodic box used to image `frame`: its own, or otherwise the one of the topology.
fn imaging_box(frame: &Frame, topology: &Topology) -> Result<BoxVec> {
    let boxvec = frame.boxvec.or(topology.boxvec()).ok_or_else(|| {
        Error::InvalidArgument("autoimage requires periodic box information".to_string())
    })?;
    if boxvec.determinant().abs() <= f32::EPSILON {
        return Err(Error::InvalidArgument(format!(
            "cannot image into a degenerate box {boxvec:?}"
        )));
    }
    Ok(boxvec)
}

/// Re-image `frame` in place.
///
/// The frame is first translated such that the center of geometry of the first molecule sits in
/// the center of the box. Then every molecule is moved by whole box vectors until its center of
/// geometry lies inside the primary cell. Molecules are never broken up.
pub fn autoimage(frame: &mut Frame, topology: &Topology) -> Result<()> {
    if frame.natoms() != topology.natoms() {
        return Err(Error::ShapeMismatch(format!(
            "cannot image a frame of {} atoms with a topology of {} atoms",
            frame.natoms(),
            topology.natoms()
        )));
    }
    let boxvec = imaging_box(frame, topology)?;
    let inverse = boxvec.inverse();
    let molecules = topology.molecules();
    let Some(anchor) = molecules.first() else {
        return Ok(());
    };

    let center = boxvec * Vec3::splat(0.5);
    let anchor_center = center_of_geometry(frame, anchor.clone());
    frame.translate(center - anchor_center);

    for molecule in molecules {
        let fractional = inverse * center_of_geometry(frame, molecule.clone());
        let shift = -fractional.floor();
        if shift != Vec3::ZERO {
            translate_atoms(frame, molecule.clone(), boxvec * shift);
        }
    }

    Ok(())
}
