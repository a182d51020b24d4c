//! A small peptide in a periodic box, together with trajectory files of it.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};

use glam::{Mat3, Vec3};
use tempfile::TempDir;
use trajiter::xyz::XyzWriter;
use trajiter::Frame;

/// The edge length of the cubic periodic box.
pub const BOX: f32 = 20.0;

/// Three residues of three backbone atoms each.
pub const RESIDUES: [&str; 3] = ["ALA", "GLY", "SER"];
pub const NAMES: [&str; 3] = ["N", "CA", "C"];
pub const NATOMS: usize = 9;

pub fn reference_coords() -> Vec<Vec3> {
    (0..NATOMS)
        .map(|i| {
            let i = i as f32;
            Vec3::new(8.0 + 1.2 * i, 10.0 + (i * 1.3).sin(), 10.0 + 0.4 * (i * 0.7).cos())
        })
        .collect()
}

pub fn reference() -> Frame {
    Frame::from_coords(reference_coords())
}

/// The reference, rotated about its first atom and drifting along x. Later frames drift across
/// the periodic boundary.
pub fn frame(i: usize) -> Frame {
    let rotation = Mat3::from_rotation_z(0.3 * i as f32) * Mat3::from_rotation_x(0.1 * i as f32);
    let pivot = reference_coords()[0];
    let drift = Vec3::new(4.0 * i as f32, -1.5 * i as f32, 0.0);
    Frame::from_coords(
        reference_coords()
            .into_iter()
            .map(|c| rotation * (c - pivot) + pivot + drift),
    )
}

pub fn pdb_contents() -> String {
    let mut pdb = String::new();
    writeln!(
        pdb,
        "CRYST1{BOX:>9.3}{BOX:>9.3}{BOX:>9.3}{:>7.2}{:>7.2}{:>7.2} P 1           1",
        90.0, 90.0, 90.0
    )
    .unwrap();
    for (i, coord) in reference_coords().into_iter().enumerate() {
        let resname = RESIDUES[i / 3];
        let name = NAMES[i % 3];
        writeln!(
            pdb,
            "ATOM  {:>5}  {name:<3} {resname} A{:>4}    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00",
            i + 1,
            i / 3 + 1,
            coord.x,
            coord.y,
            coord.z
        )
        .unwrap();
    }
    pdb.push_str("END\n");
    pdb
}

pub fn atom_names() -> Vec<String> {
    (0..NATOMS).map(|i| NAMES[i % 3].to_string()).collect()
}

pub fn write_xyz(path: &Path, frames: impl IntoIterator<Item = Frame>) {
    let mut writer = XyzWriter::new(File::create(path).unwrap(), atom_names());
    for frame in frames {
        writer.write_frame(&frame).unwrap();
    }
    writer.flush().unwrap();
}

/// Write `frames` as an Amber ASCII trajectory, with a box line after every frame.
pub fn write_mdcrd(path: &Path, frames: impl IntoIterator<Item = Frame>) {
    let mut contents = String::from("written for testing\n");
    for frame in frames {
        for line in frame.positions().chunks(10) {
            for value in line {
                write!(contents, "{value:8.3}").unwrap();
            }
            contents.push('\n');
        }
        writeln!(contents, "{BOX:8.3}{BOX:8.3}{BOX:8.3}").unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// A directory with the topology of the peptide and trajectories of it.
pub struct System {
    pub dir: TempDir,
    pub pdb: PathBuf,
}

impl System {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let pdb = dir.path().join("peptide.pdb");
        std::fs::write(&pdb, pdb_contents()).unwrap();
        Self { dir, pdb }
    }

    /// Write an xyz trajectory of `frame(i)` for every `i` in `indices`.
    pub fn xyz(&self, name: &str, indices: impl IntoIterator<Item = usize>) -> PathBuf {
        let path = self.dir.path().join(name);
        write_xyz(&path, indices.into_iter().map(frame));
        path
    }

    /// Write an mdcrd trajectory of `frame(i)` for every `i` in `indices`.
    pub fn mdcrd(&self, name: &str, indices: impl IntoIterator<Item = usize>) -> PathBuf {
        let path = self.dir.path().join(name);
        write_mdcrd(&path, indices.into_iter().map(frame));
        path
    }

    pub fn topology(&self) -> (trajiter::Topology, Frame) {
        trajiter::pdb::read(&self.pdb).unwrap()
    }
}

pub fn assert_close(a: &Frame, b: &Frame, tolerance: f32) {
    assert_eq!(a.natoms(), b.natoms());
    for (idx, (a, b)) in a.coords().zip(b.coords()).enumerate() {
        assert!(
            a.distance(b) <= tolerance,
            "atom {idx} differs: {a} and {b} (tolerance {tolerance})"
        );
    }
}
