//! Topologies and reference structures from PDB files.
//!
//! Only `ATOM`, `HETATM`, `TER`, `CRYST1` and `ENDMDL` records are read. Of a file with multiple
//! models, only the first one is used.

use std::ops::Range;
use std::path::Path;

use crate::error::{Error, Result};
use crate::{boxvec_from_lengths_angles, Atom, BoxVec, Frame, Topology};

/// Residue names of solvent molecules and ions. Every residue with one of these names is a
/// molecule of its own.
const SOLVENT: &[&str] = &[
    "WAT", "HOH", "SOL", "TIP3", "NA", "CL", "K", "Na+", "Cl-", "K+",
];

fn is_solvent(resname: &str) -> bool {
    SOLVENT.contains(&resname)
}

/// The trimmed text in the given columns, or an empty string for a short line.
fn column(line: &str, columns: Range<usize>) -> &str {
    let end = columns.end.min(line.len());
    line.get(columns.start..end).unwrap_or_default().trim()
}

/// Read the topology and the coordinates stored in a PDB file.
///
/// The returned frame can be used as a reference structure for fitting.
pub fn read(path: impl AsRef<Path>) -> Result<(Topology, Frame)> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    let (topology, frame) = parse(&contents, path)?;
    log::info!(
        "read {} atoms in {} residues and {} molecules from '{}'",
        topology.natoms(),
        topology.nresidues(),
        topology.molecules().len(),
        path.display()
    );
    Ok((topology, frame))
}

/// The identity of a residue, as far as it can be told from one atom record.
#[derive(PartialEq)]
struct ResidueKey<'a> {
    resnum: i32,
    insertion: &'a str,
    resname: &'a str,
    chain: char,
}

fn parse(contents: &str, path: &Path) -> Result<(Topology, Frame)> {
    let mut atoms: Vec<Atom> = Vec::new();
    let mut frame = Frame::default();
    let mut boxvec: Option<BoxVec> = None;
    let mut molecules = Vec::new();
    let mut molecule_start = 0;
    let mut after_ter = false;
    let mut previous: Option<ResidueKey> = None;

    for (idx, line) in contents.lines().enumerate() {
        let lineno = idx + 1;
        let bad = |what: &str| Error::format(path, lineno, format!("invalid {what}"));
        let record = column(line, 0..6);
        match record {
            "ATOM" | "HETATM" => {}
            "TER" => {
                after_ter = true;
                continue;
            }
            "ENDMDL" => break,
            "CRYST1" => {
                let value = |columns: Range<usize>| column(line, columns).parse::<f32>();
                let (Ok(a), Ok(b), Ok(c)) = (value(6..15), value(15..24), value(24..33)) else {
                    return Err(bad("box lengths"));
                };
                // Angles are optional and default to a rectangular box.
                let angle = |columns| value(columns).unwrap_or(90.0);
                let angles = [angle(33..40), angle(40..47), angle(47..54)];
                boxvec = Some(boxvec_from_lengths_angles([a, b, c], angles));
                continue;
            }
            _ => continue,
        }

        let name = column(line, 12..16);
        let resname = column(line, 17..21);
        let chain = column(line, 21..22).chars().next().unwrap_or(' ');
        let resnum: i32 = column(line, 22..26)
            .parse()
            .map_err(|_| bad("residue number"))?;
        let key = ResidueKey {
            resnum,
            insertion: column(line, 26..27),
            resname,
            chain,
        };
        let mut coord = [0.0; 3];
        for (value, start) in coord.iter_mut().zip([30, 38, 46]) {
            *value = column(line, start..start + 8)
                .parse()
                .map_err(|_| bad("coordinate"))?;
        }

        let resid = match (&previous, atoms.last()) {
            (Some(previous), Some(last)) if *previous == key => last.resid,
            (_, Some(last)) => last.resid + 1,
            (_, None) => 0,
        };
        let new_residue = atoms.last().map_or(false, |last| last.resid != resid);
        let new_molecule = match (&previous, atoms.last()) {
            (Some(previous), Some(_)) => {
                after_ter
                    || previous.chain != chain
                    || (new_residue && (is_solvent(resname) || is_solvent(previous.resname)))
            }
            _ => false,
        };
        if new_molecule {
            molecules.push(molecule_start..atoms.len());
            molecule_start = atoms.len();
        }
        after_ter = false;

        atoms.push(Atom::new(name, resname, resid, resnum).with_chain(chain));
        frame.append_xyz(&[coord]);
        previous = Some(key);
    }
    if molecule_start < atoms.len() {
        molecules.push(molecule_start..atoms.len());
    }

    if atoms.is_empty() {
        return Err(Error::format(path, 0, "no atoms found"));
    }
    let mut topology = Topology::new(atoms).with_molecules(molecules)?;
    if let Some(boxvec) = boxvec {
        topology = topology.with_box(boxvec);
    }
    Ok((topology, frame.with_boxvec(boxvec)))
}
