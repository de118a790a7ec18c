//! Per-frame pass ordering.
//!
//! The orchestrator only decides order and batching; a [`StageRecorder`] does
//! the encoding. Animation and clustering are each submitted on their own,
//! geometry and lighting go out together, and in-order queue execution makes
//! every pass see the previous one's writes.

use crate::{cluster::ClusterCamera, error::RenderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameStage {
    AnimateLights,
    AssignClusters,
    RenderGeometry,
    RenderLighting,
}

impl FrameStage {
    pub const ORDER: [FrameStage; 4] = [
        FrameStage::AnimateLights,
        FrameStage::AssignClusters,
        FrameStage::RenderGeometry,
        FrameStage::RenderLighting,
    ];

    /// Whether the batch holding this stage is submitted right after it.
    pub fn ends_batch(self) -> bool {
        !matches!(self, FrameStage::RenderGeometry)
    }

    pub fn label(self) -> &'static str {
        match self {
            FrameStage::AnimateLights => "Move Lights",
            FrameStage::AssignClusters => "Cluster Lights",
            FrameStage::RenderGeometry => "G-Buffer",
            FrameStage::RenderLighting => "Lighting",
        }
    }
}

/// Inputs that change every frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs {
    /// Seconds since startup, fed to the light animation.
    pub time: f32,
    pub camera: ClusterCamera,
    pub resolution: (u32, u32),
}

pub trait StageRecorder {
    /// One unit of submitted work (a command encoder on the GPU path).
    type Batch;

    fn begin_batch(&mut self, first: FrameStage) -> Self::Batch;

    fn record(
        &mut self,
        batch: &mut Self::Batch,
        stage: FrameStage,
        inputs: &FrameInputs,
    ) -> Result<(), RenderError>;

    fn submit(&mut self, batch: Self::Batch);
}

#[derive(Debug, Default)]
pub struct FrameOrchestrator {
    frames: u64,
}

impl FrameOrchestrator {
    pub fn frames_submitted(&self) -> u64 {
        self.frames
    }

    /// Records and submits one frame. A failing stage drops its unsubmitted
    /// batch; batches already submitted stay submitted.
    pub fn run_frame<R: StageRecorder>(
        &mut self,
        recorder: &mut R,
        inputs: &FrameInputs,
    ) -> Result<(), RenderError> {
        let mut batch = None;
        for stage in FrameStage::ORDER {
            let current = batch.get_or_insert_with(|| recorder.begin_batch(stage));
            recorder.record(current, stage, inputs)?;
            if stage.ends_batch() {
                if let Some(done) = batch.take() {
                    recorder.submit(done);
                }
            }
        }
        self.frames += 1;
        Ok(())
    }
}
