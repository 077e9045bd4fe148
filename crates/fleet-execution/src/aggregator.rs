use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{ExecutionError, ExecutionResult};

pub const DEFAULT_RESULT_PATTERN: &str = "bw_*.txt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParsePolicy {
    /// Fail on the first line that is not a number.
    #[default]
    Strict,
    /// Skip lines that are not numbers.
    Lenient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSummary {
    pub files: usize,
    pub values: usize,
    pub skipped: usize,
    pub total: f64,
}

/// The line shown to the operator, e.g. `sum = 7.0`.
/// Integral totals are always written in positional notation with a trailing `.0`.
impl fmt::Display for AggregateSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total.is_finite() && self.total.fract() == 0.0 {
            write!(f, "sum = {:.1}", self.total)
        } else {
            let mut buffer = ryu::Buffer::new();
            write!(f, "sum = {}", buffer.format(self.total))
        }
    }
}

/// Sums the numbers in the result files the workers wrote.
/// Every non-empty line of a result file holds one floating-point number.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    directory: PathBuf,
    pattern: String,
    policy: ParsePolicy,
}

impl ResultAggregator {
    pub fn new(directory: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            pattern: pattern.into(),
            policy: ParsePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Lists the result files in a stable order.
    /// The directory part is matched literally, and only the pattern may contain wildcards.
    pub fn result_files(&self) -> ExecutionResult<Vec<PathBuf>> {
        let directory = self.directory.to_str().ok_or_else(|| {
            ExecutionError::InvalidPattern(format!(
                "non-UTF-8 directory: {}",
                self.directory.display()
            ))
        })?;
        let pattern = Path::new(&glob::Pattern::escape(directory)).join(&self.pattern);
        let pattern = pattern.to_str().ok_or_else(|| {
            ExecutionError::InvalidPattern(format!("non-UTF-8 pattern: {}", pattern.display()))
        })?;
        let entries =
            glob::glob(pattern).map_err(|e| ExecutionError::InvalidPattern(e.to_string()))?;
        let mut files = vec![];
        for entry in entries {
            let path = entry.map_err(|e| ExecutionError::IoError(e.into()))?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn aggregate(&self) -> ExecutionResult<AggregateSummary> {
        let mut summary = AggregateSummary {
            files: 0,
            values: 0,
            skipped: 0,
            total: 0.0,
        };
        match fs::metadata(&self.directory) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(ExecutionError::NotADirectory {
                    path: self.directory.clone(),
                });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "result directory {} does not exist",
                    self.directory.display()
                );
                return Ok(summary);
            }
            Err(e) => {
                return Err(ExecutionError::ResultFile {
                    path: self.directory.clone(),
                    source: e,
                });
            }
        }
        for path in self.result_files()? {
            let content = fs::read_to_string(&path).map_err(|source| ExecutionError::ResultFile {
                path: path.clone(),
                source,
            })?;
            self.accumulate(&path, &content, &mut summary)?;
            summary.files += 1;
        }
        debug!(
            "aggregated {} values from {} files in {}",
            summary.values,
            summary.files,
            self.directory.display()
        );
        Ok(summary)
    }

    fn accumulate(
        &self,
        path: &Path,
        content: &str,
        summary: &mut AggregateSummary,
    ) -> ExecutionResult<()> {
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<f64>() {
                Ok(value) => {
                    summary.total += value;
                    summary.values += 1;
                }
                Err(_) => match self.policy {
                    ParsePolicy::Strict => {
                        return Err(ExecutionError::ParseError {
                            path: path.to_path_buf(),
                            line: number + 1,
                            value: line.to_string(),
                        });
                    }
                    ParsePolicy::Lenient => {
                        warn!(
                            "{}:{}: skipping invalid number {line:?}",
                            path.display(),
                            number + 1
                        );
                        summary.skipped += 1;
                    }
                },
            }
        }
        Ok(())
    }
}
