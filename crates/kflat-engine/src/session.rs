//! Capture control plane: arm a target, fire it, collect the image.

use indexmap::IndexMap;
use kflat_core::TypeRegistry;
use log::{debug, info};

use crate::config::FlattenConfig;
use crate::context::FlattenContext;
use crate::error::FlattenError;
use crate::memory::SourceMemory;

/// Something that can be captured: an address space, its types, and the
/// roots to flatten from it.
pub trait CaptureTarget {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn memory(&self) -> &dyn SourceMemory;

    fn types(&self) -> &TypeRegistry;

    /// Flatten the target's roots into `flat`.
    fn capture(&self, flat: &mut FlattenContext<'_>) -> Result<(), FlattenError>;
}

/// Arguments of [`Session::begin`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnableRequest {
    pub target: String,
    /// Only invocations from this process fire the capture.
    pub pid: Option<u32>,
    /// Log a summary of every run.
    pub debug: bool,
}

impl EnableRequest {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_owned(),
            ..Default::default()
        }
    }
}

/// Outcome of [`Session::end`].
#[derive(Debug)]
pub struct DisableReport {
    /// How many times the armed target was invoked.
    pub invoked: u32,
    /// Size of the retained image, 0 when there is none.
    pub size: u64,
    /// Why the capture failed, if it did.
    pub error: Option<FlattenError>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a capture is already enabled")]
    AlreadyEnabled,
    #[error("no capture is enabled")]
    NotEnabled,
    #[error("unknown capture target `{0}`")]
    UnknownTarget(String),
    #[error("no completed image to map")]
    NoImage,
}

struct Armed {
    request: EnableRequest,
    invoked: u32,
    outcome: Option<Result<Vec<u8>, FlattenError>>,
}

/// Registry of capture targets and the state of the current capture.
///
/// Only the first matching invocation after [`begin`](Self::begin) runs the
/// capture. A failed run keeps no image.
pub struct Session {
    targets: IndexMap<String, Box<dyn CaptureTarget>>,
    config: FlattenConfig,
    armed: Option<Armed>,
    image: Option<Vec<u8>>,
}

impl Session {
    pub fn new(config: FlattenConfig) -> Self {
        Self {
            targets: IndexMap::new(),
            config,
            armed: None,
            image: None,
        }
    }

    /// Add a target, replacing any target with the same name.
    pub fn register(&mut self, target: Box<dyn CaptureTarget>) {
        self.targets.insert(target.name().to_owned(), target);
    }

    pub fn targets(&self) -> impl Iterator<Item = &dyn CaptureTarget> {
        self.targets.values().map(|t| t.as_ref())
    }

    pub fn config(&self) -> &FlattenConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm a capture of `request.target`.
    pub fn begin(&mut self, request: EnableRequest) -> Result<(), SessionError> {
        if self.armed.is_some() {
            return Err(SessionError::AlreadyEnabled);
        }
        if !self.targets.contains_key(&request.target) {
            return Err(SessionError::UnknownTarget(request.target));
        }
        debug!("capture of `{}` enabled", request.target);
        self.armed = Some(Armed {
            request,
            invoked: 0,
            outcome: None,
        });
        Ok(())
    }

    /// Fire the armed target from process `pid`.
    ///
    /// Returns whether this invocation ran the capture.
    pub fn invoke(&mut self, pid: u32) -> Result<bool, SessionError> {
        let armed = self.armed.as_mut().ok_or(SessionError::NotEnabled)?;
        if armed.request.pid.is_some_and(|want| want != pid) {
            return Ok(false);
        }
        armed.invoked += 1;
        if armed.outcome.is_some() {
            return Ok(false);
        }

        let target = self
            .targets
            .get(&armed.request.target)
            .ok_or_else(|| SessionError::UnknownTarget(armed.request.target.clone()))?;
        let outcome = run(target.as_ref(), &self.config);
        if armed.request.debug {
            match &outcome {
                Ok(image) => info!("`{}` captured: {} bytes", target.name(), image.len()),
                Err(err) => info!("`{}` failed: {err}", target.name()),
            }
        }
        armed.outcome = Some(outcome);
        Ok(true)
    }

    /// Disarm and keep the image of a successful run for [`map`](Self::map).
    pub fn end(&mut self) -> Result<DisableReport, SessionError> {
        let armed = self.armed.take().ok_or(SessionError::NotEnabled)?;
        let (image, error) = match armed.outcome {
            Some(Ok(image)) => (Some(image), None),
            Some(Err(err)) => (None, Some(err)),
            None => (None, None),
        };
        self.image = image;
        let size = self.image.as_ref().map_or(0, |i| i.len() as u64);
        debug!(
            "capture of `{}` disabled after {} invocations",
            armed.request.target, armed.invoked
        );
        Ok(DisableReport {
            invoked: armed.invoked,
            size,
            error,
        })
    }

    /// The image of the last completed capture.
    pub fn map(&self) -> Result<&[u8], SessionError> {
        self.image.as_deref().ok_or(SessionError::NoImage)
    }

    /// Take ownership of the last completed image.
    pub fn take_image(&mut self) -> Option<Vec<u8>> {
        self.image.take()
    }
}

fn run(target: &dyn CaptureTarget, config: &FlattenConfig) -> Result<Vec<u8>, FlattenError> {
    let mut flat = FlattenContext::new(target.memory(), target.types(), config.clone())?;
    target.capture(&mut flat)?;
    flat.finish()
}
