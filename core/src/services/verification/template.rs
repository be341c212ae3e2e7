//! Message templates with `{{variable}}` substitution
//!
//! Recognised variables: `{{code}}`, `{{recipient}}`, `{{expires_in_minutes}}`
//! and `{{app_name}}`. Unknown variables are left untouched.

use std::collections::HashMap;

use crate::domain::entities::{Message, Purpose};
use crate::errors::{DomainError, DomainResult};

const CODE_PLACEHOLDER: &str = "{{code}}";

/// Subject and body text registered for one purpose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Renders verification messages from per-purpose templates
///
/// Rendering is pure: the code only ends up in the returned [`Message`].
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    app_name: String,
    templates: HashMap<Purpose, MessageTemplate>,
}

impl TemplateRenderer {
    /// Renderer with no templates registered
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            templates: HashMap::new(),
        }
    }

    /// Renderer with the built-in templates for every purpose
    pub fn with_default_templates(app_name: impl Into<String>) -> Self {
        let mut renderer = Self::new(app_name);
        for purpose in Purpose::ALL {
            renderer.templates.insert(purpose, default_template(purpose));
        }
        renderer
    }

    /// Register (or replace) the template of a purpose
    ///
    /// A body without the `{{code}}` placeholder is rejected.
    pub fn register(&mut self, purpose: Purpose, template: MessageTemplate) -> DomainResult<()> {
        if !template.body.contains(CODE_PLACEHOLDER) {
            return Err(DomainError::Configuration {
                message: format!("template for {} does not embed {}", purpose, CODE_PLACEHOLDER),
            });
        }
        self.templates.insert(purpose, template);
        Ok(())
    }

    /// Fail unless every listed purpose has a template
    pub fn ensure_purposes(&self, purposes: &[Purpose]) -> DomainResult<()> {
        match purposes.iter().find(|p| !self.templates.contains_key(p)) {
            Some(missing) => Err(DomainError::Configuration {
                message: format!("no template registered for purpose {}", missing),
            }),
            None => Ok(()),
        }
    }

    /// Render the message for a purpose
    ///
    /// # Arguments
    ///
    /// * `purpose` - Selects the template
    /// * `recipient` - Destination address, also available as `{{recipient}}`
    /// * `code` - Plaintext code
    /// * `ttl_seconds` - Lifetime of the code, rendered in whole minutes
    pub fn render(
        &self,
        purpose: Purpose,
        recipient: &str,
        code: &str,
        ttl_seconds: i64,
    ) -> DomainResult<Message> {
        let template = self
            .templates
            .get(&purpose)
            .ok_or_else(|| DomainError::UnknownTemplate {
                purpose: purpose.to_string(),
            })?;

        let minutes = ((ttl_seconds + 59) / 60).max(1).to_string();
        let vars = [
            ("code", code),
            ("recipient", recipient),
            ("expires_in_minutes", minutes.as_str()),
            ("app_name", self.app_name.as_str()),
        ];

        Ok(Message::new(
            recipient,
            substitute(&template.subject, &vars),
            substitute(&template.body, &vars),
        ))
    }
}

/// Single left-to-right pass, so substituted values are never re-scanned
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        output.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let key = after_open[..end].trim();
                match vars.iter().find(|(name, _)| *name == key) {
                    Some((_, value)) => output.push_str(value),
                    None => output.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after_open[end + 2..];
            }
            None => {
                output.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    output.push_str(rest);
    output
}

fn default_template(purpose: Purpose) -> MessageTemplate {
    match purpose {
        Purpose::SignupVerify => MessageTemplate::new(
            "Verify your {{app_name}} account",
            "Hello,\n\n\
             Use the following verification code to finish creating your {{app_name}} account:\n\n\
             {{code}}\n\n\
             The code expires in {{expires_in_minutes}} minutes. If you did not sign up, \
             you can ignore this e-mail.\n",
        ),
        Purpose::PasswordReset => MessageTemplate::new(
            "Your {{app_name}} password reset code",
            "Hello,\n\n\
             A password reset was requested for {{recipient}}. Enter this code to continue:\n\n\
             {{code}}\n\n\
             The code expires in {{expires_in_minutes}} minutes. If you did not request a reset, \
             your password stays unchanged.\n",
        ),
        Purpose::EmailChange => MessageTemplate::new(
            "Confirm your new {{app_name}} e-mail address",
            "Hello,\n\n\
             Enter this code to confirm {{recipient}} as the new address of your {{app_name}} account:\n\n\
             {{code}}\n\n\
             The code expires in {{expires_in_minutes}} minutes.\n",
        ),
    }
}
