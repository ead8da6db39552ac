use crate::error::ModuleError;
use crate::events::{Event, Timestamp};
use crate::modules::{Module, QueryDescriptor};
use log::debug;
use minijinja::{context, Environment};
use serde::Serialize;

/// Event name this module reports on
pub const CONSOLE_LOGIN: &str = "ConsoleLogin";

const TEMPLATE_NAME: &str = "login.html";

const TEMPLATE: &str = r#"<table>
{%- if rows %}
<tr><th colspan="2">UserIdentity</th></tr>
{%- for row in rows %}
<tr><td>{{ row.label }}</td><td>{{ row.value }}</td></tr>
{%- endfor %}
{%- endif %}
</table>"#;

/// Detail module for console sign-in events
///
/// Renders the caller's identity as a two-column table. Fields that are absent
/// or empty produce no row.
pub struct LoginModule {
    env: Option<Environment<'static>>,
    declare_filter: bool,
    log_group_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Row<'a> {
    label: &'static str,
    value: &'a str,
}

impl Default for LoginModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LoginModule {
    /// Create a login module that relies on the shared query
    pub fn new() -> Self {
        Self {
            env: None,
            declare_filter: false,
            log_group_name: None,
        }
    }

    /// Declare a query restricted to `ConsoleLogin` events
    pub fn with_filter(mut self, log_group_name: Option<String>) -> Self {
        self.declare_filter = true;
        self.log_group_name = log_group_name;
        self
    }

    fn rows(event: &Event) -> Vec<Row<'_>> {
        let identity = match &event.user_identity {
            Some(identity) => identity,
            None => return Vec::new(),
        };

        let mfa = event.mfa_authenticated();

        [
            ("AccessKeyID", identity.access_key_id.as_deref()),
            ("AccountID", identity.account_id.as_deref()),
            ("Arn", identity.arn.as_deref()),
            ("MFAAuthenticated", mfa),
            ("PrincipalID", identity.principal_id.as_deref()),
            ("Type", identity.identity_type.as_deref()),
            ("UserName", identity.user_name.as_deref()),
        ]
        .into_iter()
        .filter_map(|(label, value)| match value {
            Some(value) if !value.is_empty() => Some(Row { label, value }),
            _ => None,
        })
        .collect()
    }
}

impl Module for LoginModule {
    fn name(&self) -> &str {
        "email.login"
    }

    fn filter(&self, start: Timestamp, end: Timestamp) -> Vec<QueryDescriptor> {
        if !self.declare_filter {
            return Vec::new();
        }

        let query = QueryDescriptor::new(QueryDescriptor::event_name_pattern(CONSOLE_LOGIN), start, end);
        match &self.log_group_name {
            Some(group) => vec![query.with_log_group(group.clone())],
            None => vec![query],
        }
    }

    fn begin(&mut self) -> Result<(), ModuleError> {
        let mut env = Environment::new();
        env.add_template_owned(TEMPLATE_NAME, TEMPLATE)?;
        self.env = Some(env);
        Ok(())
    }

    fn process(&self, event: &Event) -> Result<String, ModuleError> {
        if event.name != CONSOLE_LOGIN {
            return Err(ModuleError::NotApplicable);
        }

        let env = self
            .env
            .as_ref()
            .ok_or_else(|| ModuleError::Failed("login template not compiled".to_string()))?;

        let rows = Self::rows(event);
        debug!("Rendering {} identity rows for event {}", rows.len(), event.id());

        let detail = env
            .get_template(TEMPLATE_NAME)?
            .render(context! { rows => rows })?;
        Ok(detail)
    }

    fn end(&mut self) -> Result<(), ModuleError> {
        self.env = None;
        Ok(())
    }
}
