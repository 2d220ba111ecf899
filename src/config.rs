use crate::errors::DownloadError;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf};

const DEFAULT_MAX_CONCURRENT: i64 = 8;
const DEFAULT_MAX_OBJECTS: i64 = 1000;
const MAX_CONCURRENT_ENV: &str = "GSDOWNLOAD_MAX_CONCURRENT";
const MAX_OBJECTS_ENV: &str = "GSDOWNLOAD_MAX_OBJECTS";

/// Settings for one download run, fixed once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadConfig {
    pub bucket: String,
    /// Normalized: empty, or ending in `/` with no leading `/`.
    pub prefix: String,
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub not_found_is_error: bool,
    /// `0` means unlimited.
    pub max_concurrent: usize,
    /// `0` means unlimited.
    pub max_objects: usize,
    pub verbose: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(
    name = "gsdownload",
    author,
    version,
    about = "Bulk download objects from a Google Cloud Storage bucket"
)]
pub struct Args {
    /// Bucket to download from
    pub bucket: String,

    /// Only objects whose names start with this prefix are downloaded
    pub prefix: String,

    /// Directory the objects are written to
    pub output_directory: PathBuf,

    /// Display a list of the files that will be downloaded and then exit without downloading them
    #[arg(long)]
    pub dry_run: bool,

    /// The maximum number of concurrent downloads, 0 for unlimited [default: 8] (overrides GSDOWNLOAD_MAX_CONCURRENT)
    #[arg(long, allow_negative_numbers = true)]
    pub max_concurrent: Option<i64>,

    /// The maximum number of objects to download, 0 for unlimited [default: 1000] (overrides GSDOWNLOAD_MAX_OBJECTS)
    #[arg(long, allow_negative_numbers = true)]
    pub max_objects: Option<i64>,

    /// Exit with non-zero exit code if no objects were found matching the specified prefix
    #[arg(long = "error")]
    pub not_found_is_error: bool,

    /// Include additional information about each object that is downloaded
    #[arg(short, long)]
    pub verbose: bool,
}

impl DownloadConfig {
    /// Parse CLI args, falling back to environment variables for the limits.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse(), |key| env::var(key))
    }

    /// Build a config from parsed args, reading limit fallbacks through
    /// `lookup`.
    pub fn from_args(
        args: Args,
        lookup: impl Fn(&str) -> Result<String, env::VarError>,
    ) -> Result<Self> {
        if args.bucket.is_empty() {
            return Err(DownloadError::config("bucket must not be empty").into());
        }
        if args.output_directory.as_os_str().is_empty() {
            return Err(DownloadError::config("output directory must not be empty").into());
        }

        let max_concurrent = resolve_limit(
            "--max-concurrent",
            args.max_concurrent,
            MAX_CONCURRENT_ENV,
            DEFAULT_MAX_CONCURRENT,
            &lookup,
        )?;
        let max_objects = resolve_limit(
            "--max-objects",
            args.max_objects,
            MAX_OBJECTS_ENV,
            DEFAULT_MAX_OBJECTS,
            &lookup,
        )?;

        Ok(Self {
            bucket: args.bucket,
            prefix: normalize_prefix(&args.prefix),
            output_dir: args.output_directory,
            dry_run: args.dry_run,
            not_found_is_error: args.not_found_is_error,
            max_concurrent,
            max_objects,
            verbose: args.verbose,
        })
    }
}

/// Ensure a trailing `/`, treat a bare `/` as "everything", and drop one
/// leading `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let mut normalized = prefix.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    if normalized == "/" {
        return String::new();
    }
    match normalized.strip_prefix('/') {
        Some(stripped) => stripped.to_string(),
        None => normalized,
    }
}

/// Flag value, else environment value, else `default`. Negative values are
/// rejected wherever they come from.
fn resolve_limit(
    flag: &str,
    value: Option<i64>,
    env_key: &str,
    default: i64,
    lookup: &impl Fn(&str) -> Result<String, env::VarError>,
) -> Result<usize> {
    let value = match value {
        Some(value) => value,
        None => match lookup(env_key) {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("parsing {} value `{}`", env_key, raw))?,
            Err(env::VarError::NotPresent) => default,
            Err(err) => return Err(err).with_context(|| format!("reading {}", env_key)),
        },
    };

    usize::try_from(value).map_err(|_| {
        DownloadError::config(format!("{} must be greater than or equal to zero", flag)).into()
    })
}
