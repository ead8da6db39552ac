use crate::config::EmailConfig;
use crate::email::transport::{Notification, Transport};
use crate::error::{ModuleError, PipelineError};
use crate::events::{Event, Timestamp};
use crate::modules::{DisabledModules, Module, ModuleRegistry, QueryDescriptor};
use log::{debug, info};
use minijinja::{context, Environment};

const BODY_TEMPLATE_NAME: &str = "email.html";

/// Built-in HTML body, used when no template file is configured
pub const DEFAULT_BODY_TEMPLATE: &str = r#"<head>
  <style>
    table {border-collapse: collapse;}
    td, th {border: 1px solid Black;}
    th {background: LightGray;}
    tr:nth-child(even) {background: #F3F3F3;}
    tr:nth-child(odd) {background: White;}
  </style>
</head>
<body>
  <h1>{{ event.eventType }} in {{ alias }}</h1>
  <table>
    <tr><th colspan="2">Event Details</th></tr>
    <tr><td>EventType</td><td>{{ event.eventType }}</td></tr>
    <tr><td>EventID</td><td>{{ event.eventID }}</td></tr>
    <tr><td>EventTime</td><td>{{ event.eventTime }}</td></tr>
    <tr><td>EventName</td><td>{{ event.eventName }}</td></tr>
    <tr><td>UserAgent</td><td>{{ event.userAgent }}</td></tr>
    <tr><td>AWS Region</td><td>{{ event.awsRegion }}</td></tr>
    <tr><td>SourceIPAddress</td><td>{{ event.sourceIPAddress }}</td></tr>
  </table>
  &nbsp;
  {{ detail|safe }}
</body>
"#;

/// Notification dispatcher built on the module contract
///
/// Owns a private registry of detail modules. Every detail module that claims
/// an event contributes one fragment, and every fragment is sent as its own
/// notification: an event matching two detail modules produces two emails.
pub struct EmailModule {
    config: EmailConfig,
    transport: Box<dyn Transport>,
    providers: ModuleRegistry,
    env: Option<Environment<'static>>,
}

impl EmailModule {
    /// Create a dispatcher; detail modules named in `disabled` are refused
    pub fn new(config: EmailConfig, transport: Box<dyn Transport>, disabled: DisabledModules) -> Self {
        Self {
            config,
            transport,
            providers: ModuleRegistry::new(disabled),
            env: None,
        }
    }

    /// Register a detail module, returning `false` if it is disabled
    pub fn register(&mut self, provider: Box<dyn Module>) -> bool {
        let registered = self.providers.register(provider);
        if registered {
            debug!("email now has {} sub-module(s)", self.providers.len());
        }
        registered
    }

    pub fn providers(&self) -> &ModuleRegistry {
        &self.providers
    }

    /// Subject line: the event type followed by the account label
    pub fn subject(&self, event: &Event) -> String {
        let event_type = event.event_type.as_deref().unwrap_or("");
        format!("{} {}", event_type, self.config.account_alias)
            .trim()
            .to_string()
    }

    /// Render the HTML body for one fragment
    pub fn body(&self, event: &Event, detail: &str) -> Result<String, ModuleError> {
        let env = self
            .env
            .as_ref()
            .ok_or_else(|| ModuleError::Failed("email template not compiled".to_string()))?;

        let body = env.get_template(BODY_TEMPLATE_NAME)?.render(context! {
            alias => &self.config.account_alias,
            event => event,
            detail => detail,
        })?;
        Ok(body)
    }

    fn notification(&self, event: &Event, detail: &str) -> Result<Notification, ModuleError> {
        Ok(Notification {
            subject: self.subject(event),
            body: self.body(event, detail)?,
            recipients: self.config.recipients.clone(),
            sender: self.config.sender.clone(),
        })
    }

    fn send(&self, event: &Event, detail: &str) -> Result<(), ModuleError> {
        let notification = self.notification(event, detail)?;
        self.transport.send(&notification)?;
        info!(
            "dispatched email for event {}: {}",
            event.id(),
            notification.subject
        );
        Ok(())
    }

    fn load_template(&self) -> Result<String, ModuleError> {
        match &self.config.template {
            Some(path) => {
                debug!("Loading email template from {}", path.display());
                Ok(std::fs::read_to_string(path)?)
            }
            None => Ok(DEFAULT_BODY_TEMPLATE.to_string()),
        }
    }
}

impl Module for EmailModule {
    fn name(&self) -> &str {
        "email"
    }

    fn filter(&self, start: Timestamp, end: Timestamp) -> Vec<QueryDescriptor> {
        if end <= start {
            debug!("Empty polling window {} .. {}, no queries", start, end);
            return Vec::new();
        }

        self.providers
            .filters(start, end)
            .into_iter()
            .flat_map(|q| q.queries)
            .collect()
    }

    fn begin(&mut self) -> Result<(), ModuleError> {
        let source = self.load_template()?;
        let mut env = Environment::new();
        env.add_template_owned(BODY_TEMPLATE_NAME, source)?;
        self.env = Some(env);

        self.providers.begin()?;
        Ok(())
    }

    fn process(&self, event: &Event) -> Result<String, ModuleError> {
        let mut dispatched = Vec::new();

        for (name, provider) in self.providers.iter() {
            let detail = match provider.process(event) {
                Ok(detail) => detail,
                Err(ModuleError::NotApplicable) => continue,
                Err(source) => {
                    return Err(PipelineError::Process {
                        module: name.to_string(),
                        event_id: event.id().to_string(),
                        source,
                    }
                    .into())
                }
            };

            if detail.trim().is_empty() {
                debug!("{} returned an empty fragment for event {}", name, event.id());
                continue;
            }

            self.send(event, &detail)
                .map_err(|source| PipelineError::Process {
                    module: name.to_string(),
                    event_id: event.id().to_string(),
                    source,
                })?;
            dispatched.push(detail);
        }

        if dispatched.is_empty() {
            return Err(ModuleError::NotApplicable);
        }
        Ok(dispatched.join("\n"))
    }

    fn end(&mut self) -> Result<(), ModuleError> {
        let result = self.providers.end();
        self.env = None;
        result?;
        Ok(())
    }
}
