use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use facegate_core::{
    average, validate_batch, Descriptor, EnrollmentError, EnrollmentLifecycle, EnrollmentPolicy,
    EnrollmentStatus, EnrollmentSummary, GalleryStore, Identification, IdentityId, MatchResult,
    Matcher, RawDescriptor,
};

use crate::cli::Commands;
use crate::config::ConfigError;

/// Result of one command, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Enrolled {
        identity: IdentityId,
        summary: EnrollmentSummary,
    },
    Verified {
        identity: IdentityId,
        result: MatchResult,
    },
    Identified(Option<Identification>),
    Revoked {
        identity: IdentityId,
    },
    Status(EnrollmentStatus),
    Averaged(Descriptor),
}

pub fn dispatch<S, M>(command: &Commands, lifecycle: &EnrollmentLifecycle<S, M>) -> Result<Report>
where
    S: GalleryStore,
    M: Matcher,
{
    let report = match command {
        Commands::Enroll {
            identity,
            samples,
            average: use_average,
        } => {
            let identity = IdentityId::from(identity.as_str());
            let samples = read_samples(samples)?;
            let summary = if *use_average {
                lifecycle_with_average(lifecycle).enroll(&identity, &samples)?
            } else {
                lifecycle.enroll(&identity, &samples)?
            };
            Report::Enrolled { identity, summary }
        }
        Commands::Verify { identity, query } => {
            let identity = IdentityId::from(identity.as_str());
            let query = read_query(query)?;
            let result = lifecycle.verify_detailed(&identity, &query)?;
            Report::Verified { identity, result }
        }
        Commands::Identify { query } => {
            let query = read_query(query)?;
            Report::Identified(lifecycle.identify(&query)?)
        }
        Commands::Revoke { identity } => {
            let identity = IdentityId::from(identity.as_str());
            lifecycle.revoke(&identity)?;
            Report::Revoked { identity }
        }
        Commands::Status { identity } => {
            Report::Status(lifecycle.status(&IdentityId::from(identity.as_str()))?)
        }
        Commands::Average { samples } => {
            let descriptors =
                validate_batch(&read_samples(samples)?).map_err(EnrollmentError::from)?;
            Report::Averaged(average(&descriptors).map_err(EnrollmentError::from)?)
        }
    };
    Ok(report)
}

/// Borrowing view of `lifecycle` that stores the mean of the samples.
fn lifecycle_with_average<'a, S, M>(
    lifecycle: &'a EnrollmentLifecycle<S, M>,
) -> EnrollmentLifecycle<&'a S, &'a M>
where
    S: GalleryStore,
    M: Matcher,
{
    EnrollmentLifecycle::with_matcher(lifecycle.store(), lifecycle.matcher())
        .with_policy(*lifecycle.policy())
        .with_enrollment_policy(EnrollmentPolicy::Average)
}

/// Exit status for a failed command: 2 for bad input or configuration, 3 for
/// storage failures, 1 otherwise.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<EnrollmentError>() {
        return if err.is_client_error() { 2 } else { 3 };
    }
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<InputError>().is_some()
    {
        return 2;
    }
    1
}

pub fn exit_code(err: &anyhow::Error) -> ExitCode {
    ExitCode::from(exit_status(err))
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct InputError {
    message: String,
}

/// Parse an enrollment batch. The outer array is parsed first so a sample of
/// the wrong shape is reported by index.
pub fn read_samples(path: &Path) -> Result<Vec<RawDescriptor>> {
    let contents = read_input(path)?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(&contents).map_err(|err| InputError {
            message: format!(
                "{}: samples must be a JSON array of descriptor arrays: {err}",
                path.display()
            ),
        })?;

    let mut samples = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let sample: RawDescriptor = serde_json::from_value(value).map_err(|err| InputError {
            message: format!("sample {index} rejected: descriptor must be a JSON array: {err}"),
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

pub fn read_query(path: &Path) -> Result<RawDescriptor> {
    let contents = read_input(path)?;
    let query: RawDescriptor = serde_json::from_str(&contents).map_err(|err| InputError {
        message: format!(
            "{}: query must be a JSON array of numbers: {err}",
            path.display()
        ),
    })?;
    Ok(query)
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        return Ok(buf);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
