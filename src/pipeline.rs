//! Run driver for registered modules
//!
//! A run is `begin` on every module, `process` for each decoded event, then
//! `end`. A `begin` failure aborts the run before any event is touched. A
//! module failing on one event is recorded and the run moves on.

use crate::config::{Config, TransportConfig};
use crate::email::{EmailModule, LogTransport, LoginModule, SendmailTransport, Transport};
use crate::error::{DecodeError, ModuleError, PipelineError};
use crate::events::{Event, Timestamp};
use crate::modules::{Module, ModuleQueries, ModuleRegistry};
use log::{debug, error, info, warn};

/// Fragment produced by one module for one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub module: String,
    pub detail: String,
}

/// Outcome of running one event through every module
#[derive(Debug, Default)]
pub struct EventReport {
    pub event_id: String,
    pub matches: Vec<Match>,
    pub errors: Vec<PipelineError>,
}

impl EventReport {
    pub fn is_match(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Totals for a completed run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub events_processed: usize,
    pub decode_failures: usize,
    pub matches: usize,
    pub process_errors: Vec<PipelineError>,
    pub end_error: Option<PipelineError>,
}

impl RunSummary {
    /// True when no event failed to decode or process and `end` succeeded
    pub fn is_clean(&self) -> bool {
        self.decode_failures == 0 && self.process_errors.is_empty() && self.end_error.is_none()
    }
}

/// Drives the lifecycle of a registry of modules
pub struct Pipeline {
    registry: ModuleRegistry,
}

impl Pipeline {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }

    /// Build the standard pipeline: the email dispatcher with the login module
    pub fn from_config(config: &Config, transport: Box<dyn Transport>) -> Self {
        let mut registry = ModuleRegistry::new(config.disabled_modules());

        let mut login = LoginModule::new();
        if config.login.declare_filter {
            login = login.with_filter(config.query.log_group_name.clone());
        }

        // Detail modules honour the same disabled list as top-level modules
        let mut email =
            EmailModule::new(config.email.clone(), transport, registry.disabled().clone());
        email.register(Box::new(login));

        registry.register(Box::new(email));
        Self::new(registry)
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Per-module query descriptors for the window `[start, end)`
    pub fn queries(&self, start: Timestamp, end: Timestamp) -> Vec<ModuleQueries> {
        if end <= start {
            warn!("Polling window is empty: start {} is not before end {}", start, end);
        }
        self.registry.filters(start, end)
    }

    /// Run one event through every registered module
    ///
    /// A failing module does not stop the remaining modules from seeing the
    /// event.
    pub fn process(&self, event: &Event) -> EventReport {
        let mut report = EventReport {
            event_id: event.id().to_string(),
            ..Default::default()
        };

        for (name, module) in self.registry.iter() {
            match module.process(event) {
                Ok(detail) => {
                    if detail.is_empty() {
                        continue;
                    }
                    debug!("{} matched event {}", name, report.event_id);
                    report.matches.push(Match {
                        module: name.to_string(),
                        detail,
                    });
                }
                Err(ModuleError::NotApplicable) => {}
                Err(source) => {
                    let err = PipelineError::Process {
                        module: name.to_string(),
                        event_id: report.event_id.clone(),
                        source,
                    };
                    error!("{}", err);
                    report.errors.push(err);
                }
            }
        }

        report
    }

    /// Execute a full run over a sequence of decoded events
    ///
    /// # Errors
    ///
    /// Returns the `begin` failure when any module fails to start; no event is
    /// processed in that case. `end` failures are reported in the summary.
    pub fn run<I>(&mut self, events: I) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<Event, DecodeError>>,
    {
        info!("Starting run with {} module(s)", self.registry.len());
        self.registry.begin()?;

        let mut summary = RunSummary::default();
        for decoded in events {
            let event = match decoded {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping undecodable event: {}", e);
                    summary.decode_failures += 1;
                    continue;
                }
            };

            let report = self.process(&event);
            if report.is_match() {
                info!(
                    "Event {} ({}, {}) matched {} module(s)",
                    report.event_id,
                    event.name,
                    event
                        .timestamp()
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "no eventTime".to_string()),
                    report.matches.len()
                );
            }
            summary.events_processed += 1;
            summary.matches += report.matches.len();
            summary.process_errors.extend(report.errors);
        }

        if let Err(e) = self.registry.end() {
            error!("{}", e);
            summary.end_error = Some(e);
        }

        info!(
            "Run finished: {} event(s), {} match(es), {} decode failure(s), {} process error(s)",
            summary.events_processed,
            summary.matches,
            summary.decode_failures,
            summary.process_errors.len()
        );
        Ok(summary)
    }
}

/// Build the transport selected in the configuration
pub fn transport_from_config(config: &Config) -> Box<dyn Transport> {
    match &config.email.transport {
        TransportConfig::Log => Box::new(LogTransport),
        TransportConfig::Sendmail { command } => Box::new(SendmailTransport::new(command.clone())),
    }
}
