use std::sync::Arc;

use crate::error::{Error, Result};
use crate::image::autoimage;
use crate::selection::{AtomSelection, Mask};
use crate::{Frame, Topology, Trajectory};

/// A request to superpose every frame onto a `reference`, fitting over the atoms in `mask`.
#[derive(Debug, Clone)]
pub struct RmsFit {
    pub reference: Frame,
    pub mask: Mask,
}

impl RmsFit {
    pub fn new(reference: Frame, mask: impl Into<Mask>) -> Self {
        Self {
            reference,
            mask: mask.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct ResolvedFit {
    reference: Frame,
    selection: AtomSelection,
}

/// The transformations applied to every frame on its way out of an iteration.
///
/// The steps always run in the same order:
///
/// 1. Re-image the frame into its periodic box.
/// 2. Superpose the frame onto the reference, moving all of its atoms.
/// 3. Project the frame onto the atoms in the output mask.
///
/// All masks are resolved when the pipeline is built, so a bad mask is reported before any frame
/// is read.
#[derive(Debug, Clone)]
pub struct Pipeline {
    topology: Arc<Topology>,
    autoimage: bool,
    rmsfit: Option<ResolvedFit>,
    mask: Option<AtomSelection>,
}

impl Pipeline {
    pub fn new(
        topology: Arc<Topology>,
        autoimage: bool,
        rmsfit: Option<&RmsFit>,
        mask: Option<&Mask>,
    ) -> Result<Self> {
        let rmsfit = match rmsfit {
            Some(RmsFit { reference, mask }) => {
                let selection = topology.resolve(mask)?;
                if !selection.fits(reference.natoms()) {
                    return Err(Error::Selection(format!(
                        "fit mask {mask:?} reaches beyond the {} atoms of the reference",
                        reference.natoms()
                    )));
                }
                Some(ResolvedFit {
                    reference: reference.clone(),
                    selection,
                })
            }
            None => None,
        };
        let mask = mask.map(|mask| topology.resolve(mask)).transpose()?;
        Ok(Self {
            topology,
            autoimage,
            rmsfit,
            mask,
        })
    }

    /// A pipeline that passes every frame through unchanged.
    pub fn identity(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            autoimage: false,
            rmsfit: None,
            mask: None,
        }
    }

    /// The number of atoms in the frames that come out of this pipeline.
    pub fn output_natoms(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(self.topology.natoms(), AtomSelection::len)
    }

    /// Re-image and superpose `frame` in place, as far as requested.
    pub fn transform(&self, frame: &mut Frame) -> Result<()> {
        if self.autoimage {
            autoimage(frame, &self.topology)?;
        }
        if let Some(ResolvedFit {
            reference,
            selection,
        }) = &self.rmsfit
        {
            frame.rmsfit(reference, selection)?;
        }
        Ok(())
    }

    /// Re-image and superpose every frame of `chunk`: first all frames are re-imaged, then all of
    /// them are superposed onto the same reference.
    pub fn transform_chunk(&self, chunk: &mut Trajectory) -> Result<()> {
        if self.autoimage {
            chunk.autoimage()?;
        }
        if let Some(ResolvedFit {
            reference,
            selection,
        }) = &self.rmsfit
        {
            chunk.superpose(reference, selection)?;
        }
        Ok(())
    }

    /// Extract the atoms of the output mask. Without a mask, the frame is returned as is.
    pub fn project(&self, frame: Frame) -> Result<Frame> {
        match &self.mask {
            Some(selection) => frame.project(selection),
            None => Ok(frame),
        }
    }

    /// Run all steps on one frame.
    pub fn apply(&self, mut frame: Frame) -> Result<Frame> {
        self.transform(&mut frame)?;
        self.project(frame)
    }
}
