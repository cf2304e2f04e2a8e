//! Email transport and approval-request template.
//!
//! Two transports are provided: [`LogTransport`] writes the message to the
//! log and always succeeds (development setups), [`HttpEmailTransport`]
//! posts to a Resend-compatible HTTP API.

use crate::config::EmailConfig;
use crate::error::AppError;
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// File attached to an outgoing email.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Outgoing email.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Deliver one message. Failures are `AppError::Dependency`.
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError>;

    /// Whether messages actually leave the process.
    fn is_live(&self) -> bool;
}

/// Transport that only logs what would have been sent.
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        log::info!(
            "[email] Would send to {} subject={:?} ({} bytes html, {} attachments)",
            message.to,
            message.subject,
            message.html.len(),
            message.attachments.len()
        );
        Ok(())
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[derive(Serialize)]
struct ApiAttachment<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ApiEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ApiAttachment<'a>>,
}

/// Transport posting JSON to an HTTP email API with a bearer key.
#[derive(Debug, Clone)]
pub struct HttpEmailTransport {
    client: Client,
    config: EmailConfig,
}

impl HttpEmailTransport {
    pub fn new(config: EmailConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build email client: {}", e)))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        let body = ApiEmail {
            from: &self.config.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
            attachments: message
                .attachments
                .iter()
                .map(|a| ApiAttachment {
                    filename: &a.filename,
                    content: base64::engine::general_purpose::STANDARD.encode(&a.content),
                })
                .collect(),
        };

        let mut request = self.client.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::dependency_named(
                format!("Email API returned HTTP {}: {}", status.as_u16(), text),
                "email",
            ));
        }

        Ok(())
    }

    fn is_live(&self) -> bool {
        true
    }
}

/// Values interpolated into the approval-request email.
#[derive(Debug, Clone)]
pub struct ApprovalRequestContext<'a> {
    pub user_name: &'a str,
    pub project_name: &'a str,
    pub artifact_label: &'a str,
    pub artifact_name: &'a str,
    pub approval_link: &'a str,
}

/// Rendered subject and body.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Escape text for safe interpolation into HTML.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render the approval-request email for one reviewer.
pub fn approval_request_email(ctx: &ApprovalRequestContext<'_>) -> RenderedEmail {
    let user_name = escape_html(ctx.user_name);
    let project_name = escape_html(ctx.project_name);
    let artifact_name = escape_html(ctx.artifact_name);
    let link = escape_html(ctx.approval_link);
    let label = ctx.artifact_label;
    let title_label = capitalize(label);

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <style>
      body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
      .header {{ background: #8B7FC8; color: white; padding: 20px; text-align: center; }}
      .content {{ background: #f9f9f9; padding: 30px; border: 2px solid #6B8E23; }}
      .button {{ display: inline-block; background: #FF8C42; color: white; padding: 12px 30px; text-decoration: none; border-radius: 5px; margin: 20px 0; }}
      .footer {{ text-align: center; margin-top: 20px; color: #666; font-size: 12px; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header"><h1>Approval Request</h1></div>
      <div class="content">
        <p>Hi {user_name},</p>
        <p>You have been requested to review and approve a {label}:</p>
        <ul>
          <li><strong>Project:</strong> {project_name}</li>
          <li><strong>{title_label}:</strong> {artifact_name}</li>
        </ul>
        <p>Please review the {label} and provide your approval or feedback.</p>
        <p style="text-align: center;"><a href="{link}" class="button">Review {title_label}</a></p>
        <p>If the button doesn't work, copy and paste this link into your browser:</p>
        <p style="word-break: break-all; color: #8B7FC8;">{link}</p>
      </div>
      <div class="footer"><p>This is an automated message from the approvals system.</p></div>
    </div>
  </body>
</html>
"#
    );

    RenderedEmail {
        subject: format!("Approval Request: {}", ctx.artifact_name),
        html,
    }
}
