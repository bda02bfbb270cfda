//! SPDX-License-Identifier: GPL-3.0-or-later

//! Error kinds for the pipeline (see spec §7 "Error handling design").
//!
//! Most call sites propagate `anyhow::Error` the way the stages and
//! controller in this crate always have; `PipelineError` exists for the
//! handful of conditions a caller may want to match on specifically,
//! chiefly `ModelInit`, which is the only fatal condition in the system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("object detector model failed to load: {0}")]
    ModelInit(String),

    #[error("pattern {0:?} references a step that is not a recognized state")]
    InvalidPatternStep(String),

    #[error("queue fabric misuse: {0}")]
    Queue(String),

    #[error("configuration error: {0}")]
    Config(String),
}
