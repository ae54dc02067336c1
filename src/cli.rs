// This is free and unencumbered software released into the public domain.

//! CLI helpers (error reporting, verbosity handling).
//!
//! This module must compile even when the crate feature `cli` is disabled,
//! because the library is built in non-CLI configurations.

#[cfg(feature = "cli")]
use crate::shared::PipelineError;

#[cfg(feature = "cli")]
use asimov_module::SysexitsError::{self, *};

#[cfg(feature = "cli")]
use clientele::StandardOptions;

#[cfg(feature = "cli")]
pub fn handle_error(err: &PipelineError, flags: &StandardOptions) -> SysexitsError {
    #[cfg(feature = "tracing")]
    {
        use asimov_module::tracing::{debug, error};

        error!(target: "ar_camera_pipeline", %err, "pipeline command failed");

        if flags.debug || flags.verbose >= 2 {
            debug!(target: "ar_camera_pipeline", ?err, "detailed error");
        }
    }

    report_error(err, flags);
    map_error_to_sysexit(err)
}

#[cfg(feature = "cli")]
pub fn info_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("INFO: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::info!(target: "ar_camera_pipeline", "{msg}");
}

#[cfg(feature = "cli")]
pub fn warn_user(flags: &StandardOptions, msg: &str) {
    if flags.debug || flags.verbose >= 1 {
        eprintln!("WARN: {msg}");
    }

    #[cfg(feature = "tracing")]
    asimov_module::tracing::warn!(target: "ar_camera_pipeline", "{msg}");
}

#[cfg(feature = "cli")]
fn report_error(err: &PipelineError, flags: &StandardOptions) {
    use std::error::Error as _;
    use std::io::Write;

    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "ERROR: {err}");

    if flags.debug || flags.verbose >= 2 {
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(stderr, "  Caused by: {}", cause);
            source = cause.source();
        }
    }
}

#[cfg(feature = "cli")]
fn map_error_to_sysexit(err: &PipelineError) -> SysexitsError {
    match err {
        PipelineError::NoDriver => EX_UNAVAILABLE,
        PipelineError::NoCamera => EX_USAGE,
        PipelineError::NotConfigured => EX_CONFIG,
        PipelineError::InvalidConfig(_) => EX_USAGE,
        PipelineError::InvalidFrame(_) => EX_DATAERR,
        PipelineError::Unsupported(_) => EX_UNAVAILABLE,
        PipelineError::Closed => EX_SOFTWARE,
        PipelineError::DriverError { .. } => EX_SOFTWARE,
        PipelineError::Engine(_) => EX_SOFTWARE,
        PipelineError::Other(_) => EX_SOFTWARE,
    }
}

// When `cli` is disabled, keep the module linkable without exposing CLI-only types.
#[cfg(not(feature = "cli"))]
#[inline]
pub fn info_user(_msg: &str) {}

#[cfg(not(feature = "cli"))]
#[inline]
pub fn warn_user(_msg: &str) {}
