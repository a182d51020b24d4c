use std::ops::Range;

use crate::error::{Error, Result};
use crate::mask::MaskExpr;
use crate::selection::{AtomSelection, Mask};
use crate::BoxVec;

/// The identity of one atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub name: String,
    pub resname: String,
    /// Zero-based sequential index of the residue this atom belongs to.
    pub resid: usize,
    /// The residue number as it was written in the source file.
    pub resnum: i32,
    pub chain: char,
}

impl Atom {
    pub fn new(
        name: impl Into<String>,
        resname: impl Into<String>,
        resid: usize,
        resnum: i32,
    ) -> Self {
        Self {
            name: name.into(),
            resname: resname.into(),
            resid,
            resnum,
            chain: ' ',
        }
    }

    pub fn with_chain(mut self, chain: char) -> Self {
        self.chain = chain;
        self
    }
}

/// Static description of the atoms, molecules and periodic box shared by all frames of a
/// trajectory.
///
/// A topology is never changed by iteration. It is shared between all frames and chunks that are
/// derived from one trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    atoms: Vec<Atom>,
    molecules: Vec<Range<usize>>,
    boxvec: Option<BoxVec>,
}

impl Topology {
    /// Create a topology in which all `atoms` form a single molecule.
    pub fn new(atoms: Vec<Atom>) -> Self {
        let molecules = if atoms.is_empty() {
            Vec::new()
        } else {
            vec![0..atoms.len()]
        };
        Self {
            atoms,
            molecules,
            boxvec: None,
        }
    }

    /// Set the molecules of this topology.
    ///
    /// The molecules must be non-empty, in order, and together cover every atom exactly once.
    pub fn with_molecules(mut self, molecules: Vec<Range<usize>>) -> Result<Self> {
        let mut expected_start = 0;
        for molecule in &molecules {
            if molecule.start != expected_start || molecule.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "molecule {molecule:?} does not continue at atom {expected_start}"
                )));
            }
            expected_start = molecule.end;
        }
        if expected_start != self.natoms() {
            return Err(Error::InvalidArgument(format!(
                "molecules cover {expected_start} of {} atoms",
                self.natoms()
            )));
        }
        self.molecules = molecules;
        Ok(self)
    }

    pub fn with_box(mut self, boxvec: BoxVec) -> Self {
        self.boxvec = Some(boxvec);
        self
    }

    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn molecules(&self) -> &[Range<usize>] {
        &self.molecules
    }

    pub fn boxvec(&self) -> Option<BoxVec> {
        self.boxvec
    }

    /// The number of residues, assuming sequential residue indices.
    pub fn nresidues(&self) -> usize {
        self.atoms.last().map_or(0, |atom| atom.resid + 1)
    }

    /// Resolve a [`Mask`] into the atoms it selects.
    ///
    /// Index lists are checked against the number of atoms. A mask that selects no atoms at all
    /// is an error.
    pub fn resolve(&self, mask: &Mask) -> Result<AtomSelection> {
        let selection = match mask {
            Mask::Selector(expr) => {
                let expr: MaskExpr = expr.parse()?;
                AtomSelection::from_mask(&expr.evaluate(self))
            }
            Mask::Indices(indices) => {
                let selection = AtomSelection::from_index_list(indices);
                if !selection.fits(self.natoms()) {
                    return Err(Error::Selection(format!(
                        "index list reaches beyond the {} atoms of the topology",
                        self.natoms()
                    )));
                }
                selection
            }
        };
        if selection.is_empty() {
            return Err(Error::Selection(format!("mask {mask:?} selects no atoms")));
        }
        log::debug!("mask {mask:?} selects {} atoms", selection.len());
        Ok(selection)
    }

    /// Shorthand for resolving a mask expression.
    pub fn select(&self, expr: &str) -> Result<AtomSelection> {
        self.resolve(&Mask::from(expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dipeptide() -> Topology {
        let names = [("N", "ALA"), ("CA", "ALA"), ("C", "ALA"), ("N", "GLY"), ("CA", "GLY")];
        let atoms = names
            .iter()
            .enumerate()
            .map(|(i, &(name, resname))| {
                let resid = if i < 3 { 0 } else { 1 };
                Atom::new(name, resname, resid, resid as i32 + 1)
            })
            .collect();
        Topology::new(atoms)
    }

    #[test]
    fn single_molecule_by_default() {
        let topology = dipeptide();
        assert_eq!(topology.molecules(), &[0..5]);
        assert_eq!(topology.nresidues(), 2);
        assert!(Topology::new(vec![]).molecules().is_empty());
    }

    #[test]
    fn molecules_must_cover_all_atoms() {
        assert!(dipeptide().with_molecules(vec![0..3, 3..5]).is_ok());
        assert!(dipeptide().with_molecules(vec![0..3]).is_err());
        assert!(dipeptide().with_molecules(vec![0..3, 4..5]).is_err());
        assert!(dipeptide().with_molecules(vec![0..0, 0..5]).is_err());
    }

    #[test]
    fn resolve_indices() {
        let topology = dipeptide();
        let selection = topology.resolve(&Mask::Indices(vec![4, 1, 1])).unwrap();
        assert_eq!(selection.indices(), &[1, 4]);
        assert!(matches!(
            topology.resolve(&Mask::Indices(vec![5])),
            Err(Error::Selection(_))
        ));
        assert!(matches!(
            topology.resolve(&Mask::Indices(vec![])),
            Err(Error::Selection(_))
        ));
    }

    #[test]
    fn resolve_selector() {
        let topology = dipeptide();
        assert_eq!(topology.select("@CA").unwrap().indices(), &[1, 4]);
        assert_eq!(topology.select(":GLY").unwrap().indices(), &[3, 4]);
        assert!(matches!(topology.select("@CB"), Err(Error::Selection(_))));
        assert!(matches!(topology.select("@("), Err(Error::Selection(_))));
    }
}
