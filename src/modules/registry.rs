use crate::error::{Phase, PipelineError};
use crate::events::Timestamp;
use crate::modules::{DisabledModules, Module, ModuleQueries};
use log::{debug, error, info, warn};

/// Ordered table of live modules keyed by name
///
/// Iteration follows registration order. Registering a name that is already
/// present replaces the earlier module in place, so the table never holds two
/// entries with the same name.
pub struct ModuleRegistry {
    modules: Vec<(String, Box<dyn Module>)>,
    disabled: DisabledModules,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new(DisabledModules::default())
    }
}

impl ModuleRegistry {
    /// Create an empty registry that refuses the given module names
    pub fn new(disabled: DisabledModules) -> Self {
        Self {
            modules: Vec::new(),
            disabled,
        }
    }

    /// Register a module
    ///
    /// Returns `false` when the module's name is disabled and it was dropped.
    pub fn register(&mut self, module: Box<dyn Module>) -> bool {
        let name = module.name().to_string();

        if self.disabled.contains(&name) {
            info!("disabled {} module", name);
            return false;
        }

        match self.modules.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => {
                warn!("module {} registered twice, replacing earlier instance", name);
                entry.1 = module;
            }
            None => {
                self.modules.push((name.clone(), module));
            }
        }

        info!("registered {} module", name);
        true
    }

    /// Call `begin` on every module in order, stopping at the first failure
    pub fn begin(&mut self) -> Result<(), PipelineError> {
        for (name, module) in self.modules.iter_mut() {
            debug!("Begin {}", name);
            module
                .begin()
                .map_err(|source| PipelineError::Lifecycle {
                    module: name.clone(),
                    phase: Phase::Begin,
                    source,
                })?;
        }
        Ok(())
    }

    /// Call `end` on every module, returning the first failure
    ///
    /// Later modules are still ended after a failure so each can release its
    /// run-scoped resources.
    pub fn end(&mut self) -> Result<(), PipelineError> {
        let mut first_error = None;

        for (name, module) in self.modules.iter_mut() {
            debug!("End {}", name);
            if let Err(source) = module.end() {
                error!("End failed for module '{}': {}", name, source);
                if first_error.is_none() {
                    first_error = Some(PipelineError::Lifecycle {
                        module: name.clone(),
                        phase: Phase::End,
                        source,
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Collect query descriptors from every module for the window `[start, end)`
    pub fn filters(&self, start: Timestamp, end: Timestamp) -> Vec<ModuleQueries> {
        self.modules
            .iter()
            .map(|(name, module)| ModuleQueries {
                module: name.clone(),
                queries: module.filter(start, end),
            })
            .collect()
    }

    /// Iterate over `(name, module)` pairs in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Module)> {
        self.modules
            .iter()
            .map(|(name, module)| (name.as_str(), module.as_ref()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|(existing, _)| existing == name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn disabled(&self) -> &DisabledModules {
        &self.disabled
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::error::ModuleError;
    use crate::events::{Event, Timestamp};
    use crate::modules::{Module, QueryDescriptor};
    use std::sync::{Arc, Mutex};

    /// Shared log of lifecycle calls, e.g. `"a:begin"`, `"a:process:evt-1"`
    pub type CallLog = Arc<Mutex<Vec<String>>>;

    /// How a fake module answers `process`
    #[derive(Clone)]
    pub enum Reply {
        Detail(String),
        NotApplicable,
        Fail,
        /// Fail only for the given event ID, otherwise return the detail
        FailOn(String, String),
    }

    /// Configurable module that records every call it receives
    pub struct FakeModule {
        pub name: String,
        pub reply: Reply,
        pub fail_begin: bool,
        pub fail_end: bool,
        pub queries: Vec<String>,
        pub calls: CallLog,
    }

    impl FakeModule {
        pub fn new(name: &str, reply: Reply, calls: &CallLog) -> Self {
            Self {
                name: name.to_string(),
                reply,
                fail_begin: false,
                fail_end: false,
                queries: Vec::new(),
                calls: Arc::clone(calls),
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl Module for FakeModule {
        fn name(&self) -> &str {
            &self.name
        }

        fn filter(&self, start: Timestamp, end: Timestamp) -> Vec<QueryDescriptor> {
            self.queries
                .iter()
                .map(|pattern| QueryDescriptor::new(pattern.clone(), start, end))
                .collect()
        }

        fn begin(&mut self) -> Result<(), ModuleError> {
            self.record(format!("{}:begin", self.name));
            if self.fail_begin {
                return Err(ModuleError::Failed("begin failed".to_string()));
            }
            Ok(())
        }

        fn process(&self, event: &Event) -> Result<String, ModuleError> {
            self.record(format!("{}:process:{}", self.name, event.id()));
            match &self.reply {
                Reply::Detail(detail) => Ok(detail.clone()),
                Reply::NotApplicable => Err(ModuleError::NotApplicable),
                Reply::Fail => Err(ModuleError::Failed("process failed".to_string())),
                Reply::FailOn(event_id, detail) => {
                    if event.id() == event_id {
                        Err(ModuleError::Failed("process failed".to_string()))
                    } else {
                        Ok(detail.clone())
                    }
                }
            }
        }

        fn end(&mut self) -> Result<(), ModuleError> {
            self.record(format!("{}:end", self.name));
            if self.fail_end {
                return Err(ModuleError::Failed("end failed".to_string()));
            }
            Ok(())
        }
    }

    pub fn event(name: &str, id: &str) -> Event {
        Event {
            name: name.to_string(),
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }
}
