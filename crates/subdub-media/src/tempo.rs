//! Tempo correction of synthesized speech clips.
//!
//! A clip is stretched or compressed so its duration matches a target window.
//! FFmpeg's `atempo` only accepts factors in `[0.5, 2.0]`, so larger changes
//! are expressed as a chain of filters whose product is the requested factor.

use std::fmt;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::toolkit::MediaToolkit;

/// Relative deviation below which no transform is applied.
pub const TEMPO_TOLERANCE: f64 = 0.05;

/// Smallest net factor a clip is corrected by.
pub const MIN_TEMPO_FACTOR: f64 = 0.25;

/// Largest net factor a clip is corrected by.
pub const MAX_TEMPO_FACTOR: f64 = 4.0;

/// Range accepted by a single `atempo` stage.
pub const STAGE_MIN: f64 = 0.5;
pub const STAGE_MAX: f64 = 2.0;

/// Speed factor needed to fit `measured` seconds into `target` seconds.
pub fn tempo_factor(measured: f64, target: f64) -> MediaResult<f64> {
    if !(target.is_finite() && target > 0.0) {
        return Err(MediaError::InvalidTempo(format!(
            "target duration must be positive, got {target}"
        )));
    }
    if !(measured.is_finite() && measured > 0.0) {
        return Err(MediaError::InvalidTempo(format!(
            "measured duration must be positive, got {measured}"
        )));
    }
    Ok(measured / target)
}

/// Whether `factor` is close enough to 1.0 to leave the clip unchanged.
pub fn within_tolerance(factor: f64) -> bool {
    (factor - 1.0).abs() < TEMPO_TOLERANCE
}

/// Ordered elementary tempo stages, each within `[STAGE_MIN, STAGE_MAX]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoChain {
    factors: Vec<f64>,
}

impl TempoChain {
    /// Clamp `factor` to `[MIN_TEMPO_FACTOR, MAX_TEMPO_FACTOR]` and decompose it.
    pub fn for_factor(factor: f64) -> Self {
        let mut remaining = factor.clamp(MIN_TEMPO_FACTOR, MAX_TEMPO_FACTOR);
        let mut factors = Vec::new();

        while remaining > STAGE_MAX {
            factors.push(STAGE_MAX);
            remaining /= STAGE_MAX;
        }
        while remaining < STAGE_MIN {
            factors.push(STAGE_MIN);
            remaining /= STAGE_MIN;
        }
        factors.push(remaining);

        Self { factors }
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Net factor applied by the whole chain.
    pub fn product(&self) -> f64 {
        self.factors.iter().product()
    }

    /// Render as an FFmpeg audio filter, e.g. `atempo=2.000000,atempo=1.500000`.
    pub fn to_filter(&self) -> String {
        self.factors
            .iter()
            .map(|f| format!("atempo={:.6}", f))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for TempoChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_filter())
    }
}

/// Result of correcting one clip.
#[derive(Debug, Clone, PartialEq)]
pub enum TempoOutcome {
    /// Within tolerance; the clip was copied as-is
    Copied { duration: f64 },
    /// The chain was applied
    Adjusted {
        chain: TempoChain,
        /// Re-measured duration, if the probe succeeded
        duration: Option<f64>,
    },
}

impl TempoOutcome {
    /// Resulting duration, falling back to `expected` when it could not be measured.
    pub fn duration_or(&self, expected: f64) -> f64 {
        match self {
            TempoOutcome::Copied { duration } => *duration,
            TempoOutcome::Adjusted { duration, .. } => duration.unwrap_or(expected),
        }
    }

    pub fn was_adjusted(&self) -> bool {
        matches!(self, TempoOutcome::Adjusted { .. })
    }
}

/// Applies tempo corrections through a [`MediaToolkit`].
pub struct TempoCorrector<'a> {
    toolkit: &'a dyn MediaToolkit,
}

impl<'a> TempoCorrector<'a> {
    pub fn new(toolkit: &'a dyn MediaToolkit) -> Self {
        Self { toolkit }
    }

    /// Apply `factor` to `input`, writing `output`.
    ///
    /// `measured` is the input's duration and is reported unchanged when the
    /// factor is within tolerance.
    pub async fn apply(
        &self,
        input: &Path,
        measured: f64,
        factor: f64,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<TempoOutcome> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        if within_tolerance(factor) {
            debug!(factor, "Tempo within tolerance, copying clip");
            self.toolkit.copy(input, output).await?;
            return Ok(TempoOutcome::Copied { duration: measured });
        }

        let chain = TempoChain::for_factor(factor);
        debug!(factor, chain = %chain, "Applying tempo chain");
        self.toolkit
            .transform_tempo(input, &chain, output, cancel)
            .await?;

        let duration = match self.toolkit.probe_duration(output).await {
            Ok(d) => Some(d),
            Err(e) => {
                warn!("Could not measure corrected clip {}: {}", output.display(), e);
                None
            }
        };

        Ok(TempoOutcome::Adjusted { chain, duration })
    }

    /// Stretch `input` so that it lasts `target` seconds.
    pub async fn correct_to_duration(
        &self,
        input: &Path,
        target: f64,
        output: &Path,
        cancel: &CancellationToken,
    ) -> MediaResult<TempoOutcome> {
        if !(target.is_finite() && target > 0.0) {
            return Err(MediaError::InvalidTempo(format!(
                "target duration must be positive, got {target}"
            )));
        }

        let measured = self.toolkit.probe_duration(input).await?;
        let factor = tempo_factor(measured, target)?;
        self.apply(input, measured, factor, output, cancel).await
    }
}
