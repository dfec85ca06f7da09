//! One handler invocation: options and event in, one delivered message out.
//!
//! [`dispatch`] layers the event's annotations over the options, validates
//! them, and hands the resulting [`HandlerConfig`] to an [`EmailHandler`].
//! Every configuration problem surfaces before a transport is created.

use crate::config::{HandlerConfig, HandlerOptions};
use crate::error::{HandlerError, TemplateError};
use crate::event::Event;
use crate::message::compose;
use crate::recipients::Recipients;
use crate::smtp::{Envelope, MailTransport, SmtpTransport};
use crate::template::{RenderedMessage, TemplateEngine};
use chrono::{DateTime, Local, TimeZone};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Renders an event and delivers it through a [`MailTransport`].
pub struct EmailHandler {
    config: HandlerConfig,
    engine: TemplateEngine,
    transport: Arc<dyn MailTransport>,
}

impl EmailHandler {
    /// Handler delivering over SMTP as described by `config`.
    pub fn new(config: HandlerConfig) -> Self {
        let transport = Arc::new(SmtpTransport::from_config(&config));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: HandlerConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            config,
            engine: TemplateEngine::new(),
            transport,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Render subject and body for `event`.
    pub fn render(&self, event: &Event) -> Result<RenderedMessage, TemplateError> {
        self.engine.render_message(
            &self.config.subject_template,
            &self.config.body_template,
            event,
        )
    }

    /// Build the envelope and the full wire message for `event`.
    pub fn prepare<Tz>(
        &self,
        event: &Event,
        date: &DateTime<Tz>,
    ) -> Result<(Envelope, String), TemplateError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let recipients = Recipients::from_tokens(&self.config.to_email);
        let rendered = self.render(event)?;
        let message = compose(&self.config.from_header, &recipients, &rendered, date);
        let envelope = Envelope {
            from: self.config.from_email.clone(),
            recipients,
        };
        Ok((envelope, message))
    }

    /// Render, compose and send one message for `event`.
    pub async fn handle(&self, event: &Event) -> Result<(), HandlerError> {
        let entity = event
            .entity
            .as_ref()
            .map(|e| e.metadata.name.as_str())
            .unwrap_or_default();
        let check = event
            .check
            .as_ref()
            .map(|c| c.metadata.name.as_str())
            .unwrap_or_default();
        let span = tracing::info_span!(
            "handle_event",
            entity = %entity,
            check = %check,
            transport = %self.transport.name()
        );

        async {
            let (envelope, message) = self.prepare(event, &Local::now())?;

            tracing::info!(
                host = %self.config.smtp_host,
                port = self.config.smtp_port,
                recipients = %envelope.recipients,
                "Sending notification"
            );
            self.transport.send(&envelope, &message).await?;
            tracing::info!(recipients = envelope.recipients.len(), "Notification sent");
            Ok::<(), HandlerError>(())
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for EmailHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailHandler")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// Run one invocation over SMTP.
pub async fn dispatch(options: HandlerOptions, event: &Event) -> Result<(), HandlerError> {
    dispatch_with(options, event, |config| {
        Arc::new(SmtpTransport::from_config(config)) as Arc<dyn MailTransport>
    })
    .await
}

/// Run one invocation with a caller-supplied transport.
///
/// `make_transport` is only called once the options are valid.
pub async fn dispatch_with<F>(
    mut options: HandlerOptions,
    event: &Event,
    make_transport: F,
) -> Result<(), HandlerError>
where
    F: FnOnce(&HandlerConfig) -> Arc<dyn MailTransport>,
{
    options.apply_annotations(event)?;
    let config = options.validate()?;
    let transport = make_transport(&config);
    EmailHandler::with_transport(config, transport)
        .handle(event)
        .await
}
