//! Pipeline orchestrator: one upload in, one streamed print-kit archive out.
//!
//! ```text
//! printkit-prepare     normalize ──▶ trim ──▶ upscale
//!                                                │ (caller waits ≤ stage timeout)
//! caller thread                                  ▼ spawn producer ──▶ return PrintKit
//!                                                     │
//! printkit-archive     ┌──────────────────────────────┴───────────────────────┐
//!                      │ crop workers (rayon pool)        zip writer          │
//!                      │  per ratio: master ─▶ subs ══entry_queue══▶ add_entry │
//!                      └──────────────────────────────────────────┬───────────┘
//!                                                                  ▼
//!                                           ChunkSink ══chunk_queue══▶ ArchiveStream
//! ```
//!
//! Decode, trim and upscale failures are returned from [`Pipeline::run`]
//! before any archive byte exists, as is a preparation that outlives the stage
//! timeout. Everything after that is reported through the stream: a failed
//! crop, a timeout, or a short archive makes the stream's last item an error,
//! and no manifest is written.
//!
//! ## Progress
//!
//! Like the rest of the crate's stages, the pipeline takes an optional
//! `Sender<ProcessEvent>`; the CLI drains it on a printer thread. Sends are
//! best-effort and never fail the pipeline.

use crate::archive::{ArchiveEntry, ArchiveError, ArchiveStream, ArchiveWriter, ChunkSink};
use crate::cancel::CancelToken;
use crate::catalogue::AspectRatio;
use crate::config::{KitConfig, effective_threads};
use crate::imaging::{
    CropStrategy, Cropper, Dimensions, EdgeSaliencyDetector, DisabledDetector, ImageEngine,
    ImagingError, JpegParams, RasterImage, RustEngine, SaliencyDetector, UpscalePath,
    aspect_frame, load_icc_profile, normalize, upscale,
};
use crate::intake::{self, IntakeError, Upload};
use crate::manifest::{self, ManifestInfo};
use crate::plan::{KitPlan, KitRequest, PlannedSize, RatioPlan};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, sync_channel};
use std::thread;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid upload: {0}")]
    Input(#[from] IntakeError),
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Image processing failed: {0}")]
    Encode(String),
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
    #[error("No stage finished within {secs}s")]
    Timeout { secs: u64 },
    #[error("Request cancelled")]
    Cancelled,
    #[error("Archive incomplete: {written} of {expected} images written")]
    Incomplete { expected: usize, written: usize },
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<ImagingError> for PipelineError {
    fn from(err: ImagingError) -> Self {
        match err {
            ImagingError::Decode(msg) => PipelineError::Decode(msg),
            ImagingError::UnsupportedFormat(msg) => PipelineError::UnsupportedFormat(msg),
            other => PipelineError::Encode(other.to_string()),
        }
    }
}

impl PipelineError {
    /// Message for the uploader; detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Input(e) => e.user_message(),
            PipelineError::Decode(_) | PipelineError::UnsupportedFormat(_) => {
                "Could not read the image file".to_string()
            }
            PipelineError::Cancelled => "Request cancelled".to_string(),
            PipelineError::Timeout { .. } => "Processing took too long".to_string(),
            _ => "Failed to generate print kit".to_string(),
        }
    }
}

/// Progress events emitted while a kit is built.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Normalized {
        width: u32,
        height: u32,
        orientation: u16,
        had_alpha: bool,
    },
    /// Source cut to the nearest master aspect before the upscale.
    Trimmed {
        width: u32,
        height: u32,
        strategy: CropStrategy,
    },
    Upscaled {
        width: u32,
        height: u32,
        path: UpscalePath,
    },
    /// One archive entry encoded and queued for the zip writer.
    Cropped {
        ratio: AspectRatio,
        label: String,
        width: u32,
        height: u32,
        strategy: CropStrategy,
    },
    /// Manifest written and archive finalized.
    Finished { images: usize },
}

/// A kit whose archive is being produced in the background.
pub struct PrintKit {
    /// `<basename>_Etsy_Print_Kit.zip`
    pub filename: String,
    pub content_disposition: String,
    pub plan: KitPlan,
    pub stream: ArchiveStream,
}

/// What [`Pipeline::run_to_writer`] delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitSummary {
    pub filename: String,
    pub images: usize,
    pub bytes: u64,
}

/// Request-independent state: engine, detector, worker pool and settings.
///
/// Cheap to clone; every request gets its own channels and cancel token.
#[derive(Clone)]
pub struct Pipeline {
    engine: Arc<dyn ImageEngine>,
    detector: Arc<dyn SaliencyDetector>,
    pool: Arc<ThreadPool>,
    config: KitConfig,
    jpeg: JpegParams,
}

/// Facts about the source carried from preparation into the producer.
struct SourceFacts {
    original: Dimensions,
    orientation: u16,
    had_alpha: bool,
    /// Set when the source was cut to the masters' aspect band.
    trimmed: Option<Dimensions>,
    upscale: UpscalePath,
}

/// Output of the `printkit-prepare` thread.
struct Prepared {
    canvas: RasterImage,
    source: SourceFacts,
}

/// Everything the producer thread owns for one request.
struct KitJob {
    plan: Arc<KitPlan>,
    /// The upscaled raster, read-only from here on.
    canvas: Arc<RasterImage>,
    source: SourceFacts,
    generated_at: DateTime<Utc>,
    token: CancelToken,
    events: Option<Sender<ProcessEvent>>,
}

impl Pipeline {
    /// Production pipeline: [`RustEngine`] plus the saliency detector when
    /// `crop.content_aware` is set.
    pub fn new(config: KitConfig) -> Result<Self, PipelineError> {
        let detector: Arc<dyn SaliencyDetector> = if config.crop.content_aware {
            Arc::new(EdgeSaliencyDetector::new())
        } else {
            Arc::new(DisabledDetector)
        };
        Self::with_parts(config, Arc::new(RustEngine::new()), detector)
    }

    pub fn with_parts(
        config: KitConfig,
        engine: Arc<dyn ImageEngine>,
        detector: Arc<dyn SaliencyDetector>,
    ) -> Result<Self, PipelineError> {
        let threads = effective_threads(&config.processing);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("printkit-crop-{i}"))
            .build()
            .map_err(|e| PipelineError::WorkerPool(e.to_string()))?;

        let mut jpeg = config.jpeg_params();
        jpeg.icc_profile = load_icc_profile(&config.color.icc_profile);
        debug!(threads, icc = jpeg.icc_profile.is_some(), "pipeline ready");

        Ok(Self {
            engine,
            detector,
            pool: Arc::new(pool),
            config,
            jpeg,
        })
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    /// Validate, normalize and upscale `upload`, then start streaming its kit.
    ///
    /// Returns once the shared canvas exists; crops and compression continue
    /// on a background thread while the caller drains [`PrintKit::stream`].
    #[instrument(skip_all, fields(file = %upload.filename))]
    pub fn run(
        &self,
        upload: Upload,
        request: KitRequest,
        events: Option<Sender<ProcessEvent>>,
    ) -> Result<PrintKit, PipelineError> {
        let token = CancelToken::new();
        let upload = intake::validate_upload(upload, self.config.upload.max_bytes)?;
        let plan = Arc::new(KitPlan::new(
            &upload.basename,
            request,
            self.config.output.dpi,
        ));
        let generated_at = Utc::now();

        let prepared = self.prepare(upload.bytes, Arc::clone(&plan), &token, &events)?;

        let (sink, stream) = crate::archive::archive_channel(
            self.config.archive.chunk_queue,
            self.config.archive.chunk_size,
            token.clone(),
        );

        let job = KitJob {
            plan: Arc::clone(&plan),
            canvas: Arc::new(prepared.canvas),
            source: prepared.source,
            generated_at,
            token,
            events,
        };
        let this = self.clone();
        thread::Builder::new()
            .name("printkit-archive".to_string())
            .spawn(move || this.produce(job, sink))?;

        Ok(PrintKit {
            filename: intake::archive_filename(&plan.basename),
            content_disposition: intake::content_disposition(&plan.basename),
            plan: plan.as_ref().clone(),
            stream,
        })
    }

    /// Run [`prepare_source`](Self::prepare_source) on the `printkit-prepare`
    /// thread and wait for it at most one stage timeout.
    ///
    /// On timeout the token is cancelled; the worker notices at its next
    /// stage boundary and its result is dropped.
    fn prepare(
        &self,
        bytes: Vec<u8>,
        plan: Arc<KitPlan>,
        token: &CancelToken,
        events: &Option<Sender<ProcessEvent>>,
    ) -> Result<Prepared, PipelineError> {
        let (tx, rx) = mpsc::channel();
        {
            let this = self.clone();
            let token = token.clone();
            let events = events.clone();
            thread::Builder::new()
                .name("printkit-prepare".to_string())
                .spawn(move || {
                    let result = this.prepare_source(&bytes, &plan, &token, &events);
                    tx.send(result).ok();
                })?;
        }

        let outcome = match self.config.processing.stage_timeout() {
            Some(limit) => rx.recv_timeout(limit),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match outcome {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                token.cancel();
                let secs = self.config.processing.stage_timeout_secs;
                warn!(secs, "source preparation timed out");
                Err(PipelineError::Timeout { secs })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(PipelineError::WorkerPool("prepare worker panicked".into()))
            }
        }
    }

    /// Normalize, trim to the masters' aspect band, and upscale to the canvas.
    fn prepare_source(
        &self,
        bytes: &[u8],
        plan: &KitPlan,
        token: &CancelToken,
        events: &Option<Sender<ProcessEvent>>,
    ) -> Result<Prepared, PipelineError> {
        let normalized = normalize(self.engine.as_ref(), bytes)?;
        emit(
            events,
            ProcessEvent::Normalized {
                width: normalized.raster.width(),
                height: normalized.raster.height(),
                orientation: normalized.orientation,
                had_alpha: normalized.had_alpha,
            },
        );
        check_cancelled(token)?;

        let mut raster = normalized.raster;
        let mut trimmed = None;
        if let Some(aspect) = aspect_frame(raster.dimensions(), &plan.master_pixels()) {
            let cropper = Cropper::new(self.engine.as_ref(), self.detector.as_ref(), &self.jpeg);
            let framed = cropper.trim(&raster, aspect)?;
            let dims = framed.raster.dimensions();
            debug!(from = %raster.dimensions(), to = %dims, "source trimmed");
            emit(
                events,
                ProcessEvent::Trimmed {
                    width: dims.width,
                    height: dims.height,
                    strategy: framed.strategy,
                },
            );
            trimmed = Some(dims);
            raster = framed.raster;
            check_cancelled(token)?;
        }

        let upscaled = upscale(self.engine.as_ref(), raster, plan.canvas)?;
        emit(
            events,
            ProcessEvent::Upscaled {
                width: upscaled.raster.width(),
                height: upscaled.raster.height(),
                path: upscaled.path,
            },
        );
        check_cancelled(token)?;

        Ok(Prepared {
            canvas: upscaled.raster,
            source: SourceFacts {
                original: normalized.original,
                orientation: normalized.orientation,
                had_alpha: normalized.had_alpha,
                trimmed,
                upscale: upscaled.path,
            },
        })
    }

    /// [`run`](Self::run), then copy the whole stream into `out`.
    ///
    /// A failure reported through the stream comes back as the original
    /// [`PipelineError`], not as an opaque IO error.
    pub fn run_to_writer<W: Write>(
        &self,
        upload: Upload,
        request: KitRequest,
        events: Option<Sender<ProcessEvent>>,
        out: &mut W,
    ) -> Result<KitSummary, PipelineError> {
        let mut kit = self.run(upload, request, events)?;
        let bytes = io::copy(&mut kit.stream, out).map_err(from_stream_error)?;
        out.flush()?;
        Ok(KitSummary {
            filename: kit.filename,
            images: kit.plan.image_count(),
            bytes,
        })
    }

    /// Body of the `printkit-archive` thread. Ends the stream one way or the other.
    fn produce(self, job: KitJob, sink: ChunkSink) {
        let closer = sink.closer();
        let mut writer = ArchiveWriter::new(sink, self.config.archive.compression_level);

        let outcome = match self.fill(&job, &mut writer) {
            Ok(master_strategies) => {
                let info = ManifestInfo {
                    original: job.source.original,
                    generated_at: job.generated_at,
                    orientation: job.source.orientation,
                    had_alpha: job.source.had_alpha,
                    trimmed: job.source.trimmed,
                    upscale: job.source.upscale,
                    quality: self.jpeg.quality,
                    chroma: self.jpeg.chroma,
                    content_aware: self.config.crop.content_aware,
                    icc_embedded: self.jpeg.icc_profile.is_some(),
                    master_strategies,
                };
                let text = manifest::render(&job.plan, &info);
                writer.finalize(&text).map_err(PipelineError::from)
            }
            Err(err) => {
                // Refuse further writes before the zip writer's drop tries to
                // close the archive.
                job.token.cancel();
                drop(writer);
                Err(err)
            }
        };

        let basename = &job.plan.basename;
        match outcome {
            Ok(entries) => {
                info!(entries, %basename, "archive finalized");
                emit(
                    &job.events,
                    ProcessEvent::Finished {
                        images: entries - 1,
                    },
                );
                closer.finish();
            }
            Err(err) => {
                job.token.cancel();
                if matches!(err, PipelineError::Cancelled) {
                    warn!(%basename, "consumer went away, kit cancelled");
                } else {
                    warn!(%basename, error = %err, "kit failed");
                }
                closer.fail(io::Error::other(err));
            }
        }
    }

    /// Run the crop fan-out and the zip writer side by side until every
    /// planned image is archived. Returns the strategy of each ratio's master.
    ///
    /// The writer does not wait for the workers once it has failed: they own
    /// their handle on the canvas and stop at the next cancellation check.
    fn fill(
        &self,
        job: &KitJob,
        writer: &mut ArchiveWriter<ChunkSink>,
    ) -> Result<BTreeMap<String, CropStrategy>, PipelineError> {
        let (entry_tx, entry_rx) = sync_channel(self.config.archive.entry_queue);

        let workers = {
            let this = self.clone();
            let plan = Arc::clone(&job.plan);
            let canvas = Arc::clone(&job.canvas);
            let token = job.token.clone();
            let events = job.events.clone();
            thread::Builder::new()
                .name("printkit-crops".to_string())
                .spawn(move || this.crop_all(&plan, &canvas, entry_tx, &token, &events))?
        };

        let written = match self.drain(entry_rx, writer, &job.token) {
            Ok(written) => written,
            Err(err) => {
                job.token.cancel();
                return Err(err);
            }
        };

        let strategies = workers
            .join()
            .unwrap_or_else(|_| Err(PipelineError::WorkerPool("crop worker panicked".into())))?;
        let expected = job.plan.image_count();
        if written != expected {
            return Err(PipelineError::Incomplete { expected, written });
        }
        Ok(strategies)
    }

    /// Crop every ratio on the worker pool, sending entries as they finish.
    fn crop_all(
        &self,
        plan: &KitPlan,
        canvas: &RasterImage,
        entries: SyncSender<ArchiveEntry>,
        token: &CancelToken,
        events: &Option<Sender<ProcessEvent>>,
    ) -> Result<BTreeMap<String, CropStrategy>, PipelineError> {
        self.pool.install(|| {
            plan.ratios
                .par_iter()
                .map_with(entries, |tx, ratio| {
                    let strategy = self.crop_ratio(ratio, canvas, tx, token, events)?;
                    Ok((ratio.ratio.as_str().to_string(), strategy))
                })
                .collect::<Result<BTreeMap<_, _>, PipelineError>>()
        })
    }

    /// Master from the shared canvas, then every sub-size from the master.
    fn crop_ratio(
        &self,
        ratio: &RatioPlan,
        canvas: &RasterImage,
        tx: &SyncSender<ArchiveEntry>,
        token: &CancelToken,
        events: &Option<Sender<ProcessEvent>>,
    ) -> Result<CropStrategy, PipelineError> {
        let cropper = Cropper::new(self.engine.as_ref(), self.detector.as_ref(), &self.jpeg);

        check_cancelled(token)?;
        let master = cropper.crop_raster(canvas, ratio.master.pixels)?;
        let strategy = master.strategy;
        let encoded = cropper.encode(&master)?;
        deliver(tx, events, ratio, &ratio.master, encoded.bytes, strategy)?;

        ratio.subs.par_iter().try_for_each_with(tx.clone(), |tx, sub| {
            check_cancelled(token)?;
            let result = cropper.crop(&master.raster, sub.pixels)?;
            deliver(tx, events, ratio, sub, result.bytes, result.strategy)
        })?;

        Ok(strategy)
    }

    /// Zip writer loop: archive entries until every worker hung up.
    fn drain(
        &self,
        entries: Receiver<ArchiveEntry>,
        writer: &mut ArchiveWriter<ChunkSink>,
        token: &CancelToken,
    ) -> Result<usize, PipelineError> {
        let timeout = self.config.processing.stage_timeout();
        loop {
            let next = match timeout {
                Some(limit) => entries.recv_timeout(limit),
                None => entries
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match next {
                Ok(entry) => writer.add_entry(entry).map_err(|e| {
                    if token.is_cancelled() {
                        PipelineError::Cancelled
                    } else {
                        PipelineError::Archive(e)
                    }
                })?,
                Err(RecvTimeoutError::Timeout) => {
                    token.cancel();
                    return Err(PipelineError::Timeout {
                        secs: self.config.processing.stage_timeout_secs,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(writer.entries_written()),
            }
        }
    }
}

fn check_cancelled(token: &CancelToken) -> Result<(), PipelineError> {
    if token.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Hand an encoded crop to the zip writer. Ownership of `bytes` moves with it.
fn deliver(
    tx: &SyncSender<ArchiveEntry>,
    events: &Option<Sender<ProcessEvent>>,
    ratio: &RatioPlan,
    size: &PlannedSize,
    bytes: Vec<u8>,
    strategy: CropStrategy,
) -> Result<(), PipelineError> {
    tx.send(ArchiveEntry {
        path: size.path.clone(),
        bytes,
    })
    .map_err(|_| PipelineError::Cancelled)?;
    emit(
        events,
        ProcessEvent::Cropped {
            ratio: ratio.ratio,
            label: size.entry.file_label(),
            width: size.pixels.width,
            height: size.pixels.height,
            strategy,
        },
    );
    Ok(())
}

fn emit(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

/// Recover the producer's [`PipelineError`] from the stream's IO error.
fn from_stream_error(err: io::Error) -> PipelineError {
    let is_pipeline = err
        .get_ref()
        .is_some_and(|inner| inner.is::<PipelineError>());
    if !is_pipeline {
        return PipelineError::Io(err);
    }
    match err.into_inner().map(|inner| inner.downcast::<PipelineError>()) {
        Some(Ok(inner)) => *inner,
        _ => PipelineError::Io(io::Error::other("archive stream failed")),
    }
}
