//! Iterate over a molecular dynamics trajectory, re-imaging, fitting and filtering its frames.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;
use trajiter::xyz::XyzWriter;
use trajiter::{
    AtomSelection, ChunkIterOptions, Frame, FrameIterOptions, FrameRange, FrameSlices, Mask,
    Pipeline, TrajectoryIterator,
};

/// Iterate over one or more trajectory files that share a topology.
///
/// Without an output path, the index of every frame is printed next to its deviation from the
/// first frame.
#[derive(Parser)]
struct Args {
    /// Topology path (pdb).
    topology: PathBuf,

    /// Trajectory paths (xyz, mdcrd). Their frames are read one file after the other.
    #[arg(required = true)]
    trajectories: Vec<PathBuf>,

    /// Frame range within each file in the format `start:stop:stride`. Each value is optional.
    ///
    /// Pass it once to use the same range for all files, or once per file.
    ///
    /// - `:100` selects the first 100 frames.
    ///
    /// - `3:14` selects the 4th up to and including the 14th frame, 11 frames in total.
    ///
    /// - `:100:2` selects every second frame from the first 100 frames, 50 in total.
    #[arg(short, long)]
    frames: Vec<FrameRange>,

    /// Only write the atoms selected by this mask, such as `@CA` or `:1-10&!@H*`.
    #[arg(short, long)]
    mask: Option<String>,

    /// Re-image every frame into its periodic box.
    #[arg(long)]
    autoimage: bool,

    /// Superpose every frame onto the first frame, fitting over the atoms in this mask.
    #[arg(long)]
    rmsfit: Option<String>,

    /// Read the frames in chunks of this many frames.
    #[arg(long)]
    chunk: Option<usize>,

    /// Write the resulting frames to this path (xyz).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log more. Pass twice for debug output.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let (topology, _) = trajiter::pdb::read(&args.topology)?;
    let slices = match args.frames.len() {
        0 => FrameSlices::default(),
        1 => FrameSlices::Shared(args.frames[0]),
        _ => FrameSlices::PerFile(args.frames.clone()),
    };
    let traj = TrajectoryIterator::open(args.trajectories.clone(), topology, slices)?;
    log::info!("{traj:?}");
    if traj.is_empty() {
        log::warn!("no frames selected");
        return Ok(());
    }
    let reference = traj.get_frame(0)?;

    let mask = args.mask.as_deref().map(Mask::from);
    let selection = match &mask {
        Some(mask) => traj.topology().resolve(mask)?,
        None => AtomSelection::all(traj.n_atoms()),
    };
    // The deviation is taken over the fit mask, or else over the atoms that are written.
    let deviation = match &args.rmsfit {
        Some(expr) => traj.topology().select(expr)?,
        None => selection.clone(),
    };
    // The output mask is applied after the deviation is known, in both modes.
    let project = Pipeline::new(traj.topology().clone(), false, None, mask.as_ref())?;

    let mut writer = match &args.output {
        Some(path) => {
            let names = selection
                .iter()
                .map(|idx| traj.topology().atoms()[idx].name.clone())
                .collect();
            Some(XyzWriter::new(BufWriter::new(File::create(path)?), names))
        }
        None => None,
    };
    let mut stdout = std::io::stdout().lock();
    let mut emit = |idx: usize, frame: Frame| -> Result<(), Box<dyn std::error::Error>> {
        match writer.as_mut() {
            Some(writer) => writer.write_frame(&project.project(frame)?)?,
            None => {
                let rmsd = frame.rmsd_nofit(&reference, &deviation)?;
                writeln!(stdout, "{idx}\t{rmsd:.4}")?;
            }
        }
        Ok(())
    };

    match args.chunk {
        Some(chunk) => {
            let mut options = ChunkIterOptions::default()
                .with_chunk(chunk)
                .with_autoimage(args.autoimage);
            if let Some(fit) = &args.rmsfit {
                options = options.with_rmsfit(reference.clone(), fit.as_str());
            }
            let mut idx = 0;
            for chunk in traj.chunk_iter(options)? {
                for frame in chunk? {
                    emit(idx, frame)?;
                    idx += 1;
                }
            }
        }
        None => {
            let mut options = FrameIterOptions::default().with_autoimage(args.autoimage);
            if let Some(fit) = &args.rmsfit {
                options = options.with_rmsfit(reference.clone(), fit.as_str());
            }
            for (idx, frame) in traj.frame_iter(options)?.enumerate() {
                emit(idx, frame?)?;
            }
        }
    }

    if let Some(writer) = writer.as_mut() {
        writer.flush()?;
    }
    Ok(())
}
