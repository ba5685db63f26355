//! Format generation
//!
//! Single-format generation reuses a stored dependency output when one
//! exists. Batch generation walks the requested formats in dependency order
//! so a shared dependency runs once and its output feeds every format derived
//! from it. Every temp file created along the way is removed before the call
//! returns, whether it succeeds or not.

use crate::context::Context;
use crate::error::{ContextError, StorageError};
use crate::formatter::{discard_temp_file, FormatInput, FormatScope, InputKind, Produced};
use crate::storage::{extension_of, FileSource, ReadPath};
use crate::types::DataToken;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Outcome of a batch generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    /// Source token; generation never changes it
    pub data: DataToken,
    /// Formats computed and persisted during the call, in order
    pub generated: Vec<String>,
    /// Requested formats already stored and left untouched
    pub reused: Vec<String>,
    /// Dependencies persisted although they were not requested
    pub side_effects: Vec<String>,
}

impl GenerationReport {
    fn new(data: DataToken) -> Self {
        Self {
            data,
            generated: Vec::new(),
            reused: Vec::new(),
            side_effects: Vec::new(),
        }
    }
}

impl Context {
    /// Generate `format` for `data` unless it is already stored.
    ///
    /// With `regenerate` the formatter always runs. When the formatter derives
    /// from a format already in storage, it is fed that stored output instead
    /// of the source.
    pub fn generate_format(
        &self,
        data: &DataToken,
        format: &str,
        regenerate: bool,
    ) -> Result<DataToken, ContextError> {
        let formatter = self.formatter(format)?;
        if !regenerate && self.storage.file_exists(data, Some(format)) {
            debug!(context = %self.name, data = %data, format, "Format already stored");
            return Ok(data.clone());
        }

        let (input, kind) = match formatter.dependency() {
            Some(dependency) if self.storage.file_exists(data, Some(dependency)) => (
                self.storage.read_path(data, Some(dependency))?,
                InputKind::Dependency,
            ),
            _ => (self.storage.read_path(data, None)?, InputKind::Source),
        };

        let result = self
            .run_formatter(format, FormatInput { path: &input.path, kind })
            .and_then(|produced| {
                let persisted = self.persist(data, format, produced.path());
                produced.discard();
                persisted
            });
        if input.temporary {
            discard_temp_file(&input.path);
        }
        result?;

        info!(context = %self.name, data = %data, format, "Generated format");
        Ok(data.clone())
    }

    /// Generate several formats in dependency order.
    ///
    /// `None` requests every registered format. Duplicates are ignored and
    /// unknown names fail before anything runs. `regenerate` forces the
    /// requested formats only; a dependency that is not requested is reused
    /// when stored. A dependency cycle among the formats to run fails with
    /// [`ContextError::Cycle`] naming a formatter on the cycle, and
    /// nothing is written.
    pub fn generate_formats(
        &self,
        data: &DataToken,
        formats: Option<&[&str]>,
        regenerate: bool,
    ) -> Result<GenerationReport, ContextError> {
        let requested: Vec<String> = match formats {
            None => self.formatter_names().to_vec(),
            Some(formats) => {
                let mut unique: Vec<String> = Vec::with_capacity(formats.len());
                for format in formats {
                    if !unique.iter().any(|f| f == format) {
                        unique.push(format.to_string());
                    }
                }
                unique
            }
        };
        for format in &requested {
            self.formatter(format)?;
        }

        debug!(
            context = %self.name,
            data = %data,
            formats = ?requested,
            regenerate,
            "Batch generation started"
        );

        let plan = self.plan_batch(data, &requested, regenerate)?;
        let mut state = GenerationState::new(self, data);
        let mut report = GenerationReport::new(data.clone());

        for step in plan {
            if !step.requested {
                if state.prepare(&step.format, false)? {
                    report.generated.push(step.format.clone());
                    report.side_effects.push(step.format);
                }
                continue;
            }
            if !regenerate && self.storage.file_exists(data, Some(&step.format)) {
                state.mark_stored(&step.format);
                report.reused.push(step.format);
                continue;
            }
            state.prepare(&step.format, true)?;
            report.generated.push(step.format);
        }

        info!(
            context = %self.name,
            data = %data,
            generated = report.generated.len(),
            reused = report.reused.len(),
            side_effects = ?report.side_effects,
            "Batch generation finished"
        );
        Ok(report)
    }

    /// Order the work of a batch before anything runs.
    ///
    /// Dependencies of formats that will run are added when they are not
    /// stored, so every formatter in the batch runs at most once and always
    /// after its dependency. A cycle among the planned formats fails here,
    /// before the first write.
    fn plan_batch(
        &self,
        data: &DataToken,
        requested: &[String],
        regenerate: bool,
    ) -> Result<Vec<PlannedStep>, ContextError> {
        let will_run = |format: &str, requested: bool| {
            (requested && regenerate) || !self.storage.file_exists(data, Some(format))
        };

        let mut pending: Vec<PlannedStep> = requested
            .iter()
            .map(|format| PlannedStep {
                format: format.clone(),
                requested: true,
            })
            .collect();
        let mut next = 0;
        while next < pending.len() {
            let step = pending[next].clone();
            next += 1;
            if !will_run(&step.format, step.requested) {
                continue;
            }
            let formatter = self.formatter(&step.format)?;
            let Some(dependency) = formatter.dependency() else {
                continue;
            };
            if pending.iter().any(|p| p.format == dependency) || !will_run(dependency, false) {
                continue;
            }
            pending.push(PlannedStep {
                format: dependency.to_string(),
                requested: false,
            });
        }

        let mut plan = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let (ready, blocked): (Vec<PlannedStep>, Vec<PlannedStep>) =
                pending.iter().cloned().partition(|step| {
                    match self.formatters.get(&step.format).and_then(|f| f.dependency()) {
                        None => true,
                        Some(dependency) => !pending.iter().any(|p| p.format == dependency),
                    }
                });

            if ready.is_empty() {
                let formatter = self.first_on_cycle(&blocked);
                error!(
                    context = %self.name,
                    formatter = %formatter,
                    blocked = ?blocked.iter().map(|step| &step.format).collect::<Vec<_>>(),
                    "Cycle in formatter hierarchy"
                );
                return Err(ContextError::Cycle {
                    formatter,
                    context: self.name.clone(),
                });
            }
            plan.extend(ready);
            pending = blocked;
        }
        Ok(plan)
    }

    /// First blocked format whose dependency chain leads back to itself.
    fn first_on_cycle(&self, blocked: &[PlannedStep]) -> String {
        let dependency_of = |format: &str| {
            self.formatters
                .get(format)
                .and_then(|f| f.dependency())
                .filter(|dependency| blocked.iter().any(|step| step.format == *dependency))
        };
        blocked
            .iter()
            .find(|start| {
                let mut current = dependency_of(&start.format);
                for _ in 0..blocked.len() {
                    match current {
                        Some(format) if format == start.format => return true,
                        Some(format) => current = dependency_of(format),
                        None => return false,
                    }
                }
                false
            })
            .or_else(|| blocked.first())
            .map(|step| step.format.clone())
            .unwrap_or_default()
    }

    /// [`Context::generate_format`] holding this context's lock for `data`.
    pub fn generate_format_serialized(
        &self,
        data: &DataToken,
        format: &str,
        regenerate: bool,
    ) -> Result<DataToken, ContextError> {
        self.locks
            .with_token(data, || self.generate_format(data, format, regenerate))
    }

    /// [`Context::generate_formats`] holding this context's lock for `data`.
    pub fn generate_formats_serialized(
        &self,
        data: &DataToken,
        formats: Option<&[&str]>,
        regenerate: bool,
    ) -> Result<GenerationReport, ContextError> {
        self.locks
            .with_token(data, || self.generate_formats(data, formats, regenerate))
    }

    /// Run one formatter in a fresh scope. An output equal to the input is
    /// returned as a passthrough so it is never deleted as a temp file.
    fn run_formatter(
        &self,
        format: &str,
        input: FormatInput<'_>,
    ) -> Result<Produced, ContextError> {
        let mut scope = FormatScope::new(&self.formatters);
        let produced = scope.run(format, input).map_err(|e| {
            if let ContextError::Cycle { formatter, .. } = &e {
                error!(
                    context = %self.name,
                    format,
                    formatter = %formatter,
                    "Cycle in formatter hierarchy"
                );
            }
            e
        })?;
        if produced.path() == input.path {
            return Ok(Produced::passthrough(input.path.to_path_buf()));
        }
        Ok(produced)
    }

    /// Store the file at `path` as `format` of `data`.
    fn persist(&self, data: &DataToken, format: &str, path: &Path) -> Result<(), ContextError> {
        let saved = if self.storage.accepts_paths() {
            self.storage
                .save_formatted_file(data, FileSource::Path(path), format)
        } else {
            std::fs::read(path)
                .map_err(StorageError::from)
                .and_then(|bytes| {
                    let extension = extension_of(path);
                    self.storage.save_formatted_file(
                        data,
                        FileSource::Content {
                            bytes: &bytes,
                            extension: extension.as_deref(),
                        },
                        format,
                    )
                })
        };

        saved.map(|_| ()).map_err(|source| {
            error!(
                context = %self.name,
                data = %data,
                format,
                error = %source,
                "Failed to persist generated format"
            );
            ContextError::PersistFailed {
                context: self.name.clone(),
                data: data.to_string(),
                format: format.to_string(),
                source,
            }
        })
    }
}

/// One format of a batch plan
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedStep {
    format: String,
    /// `false` for a dependency pulled in by a requested format
    requested: bool,
}

/// What a batch knows about one format
#[derive(Debug)]
enum Prepared {
    /// In storage; not read yet
    Stored,
    /// Readable at `path`; `disposable` if this batch owns the file
    Materialized { path: PathBuf, disposable: bool },
}

/// Per-call bookkeeping of a batch. Dropping it deletes every temp file it owns.
struct GenerationState<'a> {
    context: &'a Context,
    data: &'a DataToken,
    prepared: HashMap<String, Prepared>,
    source: Option<ReadPath>,
}

impl<'a> GenerationState<'a> {
    fn new(context: &'a Context, data: &'a DataToken) -> Self {
        Self {
            context,
            data,
            prepared: HashMap::new(),
            source: None,
        }
    }

    fn is_prepared(&self, format: &str) -> bool {
        self.prepared.contains_key(format)
    }

    fn mark_stored(&mut self, format: &str) {
        self.prepared
            .entry(format.to_string())
            .or_insert(Prepared::Stored);
    }

    /// Make `format` available to its dependents, generating it when needed.
    ///
    /// Returns `true` when the formatter ran and the result was persisted,
    /// `false` when a stored copy was reused.
    fn prepare(&mut self, format: &str, regenerate: bool) -> Result<bool, ContextError> {
        let storage = self.context.storage.clone();
        if !regenerate && storage.file_exists(self.data, Some(format)) {
            self.mark_stored(format);
            return Ok(false);
        }

        let formatter = self.context.formatter(format)?;
        let (path, kind) = match formatter.dependency() {
            Some(dependency) if self.is_prepared(dependency) => {
                (self.materialize(dependency)?, InputKind::Dependency)
            }
            Some(dependency) if storage.file_exists(self.data, Some(dependency)) => {
                self.mark_stored(dependency);
                (self.materialize(dependency)?, InputKind::Dependency)
            }
            _ => (self.source_path()?, InputKind::Source),
        };

        debug!(
            context = %self.context.name,
            data = %self.data,
            format,
            input = ?kind,
            "Preparing format"
        );
        let produced = self
            .context
            .run_formatter(format, FormatInput { path: &path, kind })?;
        if let Err(e) = self.context.persist(self.data, format, produced.path()) {
            produced.discard();
            return Err(e);
        }

        let disposable = produced.is_disposable();
        self.prepared.insert(
            format.to_string(),
            Prepared::Materialized {
                path: produced.into_path(),
                disposable,
            },
        );
        Ok(true)
    }

    /// Readable path for a prepared format, reading it from storage on first use.
    fn materialize(&mut self, format: &str) -> Result<PathBuf, ContextError> {
        if let Some(Prepared::Materialized { path, .. }) = self.prepared.get(format) {
            return Ok(path.clone());
        }
        let read = self.context.storage.read_path(self.data, Some(format))?;
        let path = read.path.clone();
        self.prepared.insert(
            format.to_string(),
            Prepared::Materialized {
                path: read.path,
                disposable: read.temporary,
            },
        );
        Ok(path)
    }

    fn source_path(&mut self) -> Result<PathBuf, ContextError> {
        if let Some(source) = &self.source {
            return Ok(source.path.clone());
        }
        let read = self.context.storage.read_path(self.data, None)?;
        let path = read.path.clone();
        self.source = Some(read);
        Ok(path)
    }
}

impl Drop for GenerationState<'_> {
    fn drop(&mut self) {
        for prepared in self.prepared.values() {
            if let Prepared::Materialized {
                path,
                disposable: true,
            } = prepared
            {
                discard_temp_file(path);
            }
        }
        if let Some(source) = self.source.take() {
            if source.temporary {
                discard_temp_file(&source.path);
            }
        }
    }
}
