use glam::Vec3;
use trajiter::{AtomSelection, Frame, FrameIterOptions, FrameRange, TrajectoryIterator};

mod common;
use common::{assert_close, System, BOX, NATOMS};

fn frames(system: &System, options: FrameIterOptions) -> Vec<Frame> {
    let xyz = system.xyz("ten.xyz", 0..10);
    let (topology, _) = system.topology();
    let traj = TrajectoryIterator::open(&xyz, topology, FrameRange::default()).unwrap();
    let frames = traj.frame_iter(options).unwrap();
    frames.map(Result::unwrap).collect()
}

fn center(frame: &Frame) -> Vec3 {
    frame.coords().sum::<Vec3>() / frame.natoms() as f32
}

#[test]
fn autoimage_brings_the_peptide_into_the_box() {
    let system = System::new();
    let raw = frames(&system, FrameIterOptions::default());
    let imaged = frames(&system, FrameIterOptions::default().with_autoimage(true));

    // Later frames have drifted out of the box.
    assert!(center(&raw[9]).x > BOX);
    for (raw, imaged) in raw.iter().zip(&imaged) {
        let center = center(imaged);
        assert!(center.cmpge(Vec3::ZERO).all() && center.cmplt(Vec3::splat(BOX)).all());
        // The peptide is one molecule, so it is moved as a whole.
        let shift = imaged.coord(0) - raw.coord(0);
        for (a, b) in raw.coords().zip(imaged.coords()) {
            assert!((b - a - shift).length() < 1e-3);
        }
    }
}

#[test]
fn rmsfit_superposes_onto_the_reference() {
    let system = System::new();
    let (_, reference) = system.topology();
    let all = AtomSelection::all(NATOMS);

    let raw = frames(&system, FrameIterOptions::default());
    let fitted = frames(
        &system,
        FrameIterOptions::default().with_rmsfit(reference.clone(), "*"),
    );
    assert!(raw[5].rmsd_nofit(&reference, &all).unwrap() > 1.0);
    for frame in &fitted {
        // The reference is read from a file with three decimals.
        assert!(frame.rmsd_nofit(&reference, &all).unwrap() < 1e-2);
    }
}

#[test]
fn fitting_ignores_imaging() {
    let system = System::new();
    let (_, reference) = system.topology();
    let fit = FrameIterOptions::default().with_rmsfit(reference.clone(), "@CA,C");
    let plain = frames(&system, fit.clone());
    let imaged = frames(&system, fit.with_autoimage(true));
    for (a, b) in plain.iter().zip(&imaged) {
        assert_close(a, b, 1e-3);
    }
}

#[test]
fn fit_over_one_mask_and_keep_another() {
    let system = System::new();
    let (topology, reference) = system.topology();
    let options = FrameIterOptions::default()
        .with_autoimage(true)
        .with_rmsfit(reference.clone(), "@CA")
        .with_mask(":2-3@N");
    let nitrogens = topology.select(":2-3@N").unwrap();
    assert_eq!(nitrogens.indices(), &[3, 6]);
    let expected = reference.project(&nitrogens).unwrap();
    for frame in frames(&system, options) {
        assert_eq!(frame.natoms(), 2);
        assert_close(&frame, &expected, 1e-2);
    }
}

#[test]
fn index_masks() {
    let system = System::new();
    let options = FrameIterOptions::default().with_mask(vec![8, 0]);
    let raw = frames(&system, FrameIterOptions::default());
    for (masked, raw) in frames(&system, options).iter().zip(&raw) {
        assert_eq!(masked.natoms(), 2);
        assert_eq!(masked.coord(0), raw.coord(0));
        assert_eq!(masked.coord(1), raw.coord(8));
    }
}

#[test]
fn chunks_share_the_topology() {
    let system = System::new();
    let xyz = system.xyz("ten.xyz", 0..10);
    let (topology, _) = system.topology();
    let traj = TrajectoryIterator::open(&xyz, topology, FrameRange::default()).unwrap();

    let options = trajiter::ChunkIterOptions::default().with_chunk(5);
    for chunk in traj.chunk_iter(options.clone()).unwrap() {
        assert!(std::sync::Arc::ptr_eq(chunk.unwrap().topology(), traj.topology()));
    }
    for chunk in traj.chunk_iter(options.with_copy_top(true)).unwrap() {
        let chunk = chunk.unwrap();
        assert!(!std::sync::Arc::ptr_eq(chunk.topology(), traj.topology()));
        assert_eq!(chunk.topology().as_ref(), traj.topology().as_ref());
    }
}
