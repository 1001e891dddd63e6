//! Outbound email through a transactional email HTTP API.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::EmailConfig;
use crate::error::AppError;
use crate::models::order::Order;
use crate::models::pharmacy::Pharmacy;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Skipped,
}

impl SendOutcome {
    fn label(&self) -> &'static str {
        match self {
            SendOutcome::Sent => "sent",
            SendOutcome::Skipped => "skipped",
        }
    }
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: Option<EmailConfig>,
}

impl Mailer {
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<SendOutcome, AppError> {
        let Some(config) = &self.config else {
            debug!(to = %message.to, subject = %message.subject, "email disabled; skipping");
            return Ok(SendOutcome::Skipped);
        };

        let payload = ProviderPayload {
            from: &config.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: message.text.as_deref(),
        };

        let response = self
            .client
            .post(&config.api_url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::Internal(format!("email request failed: {err}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "email provider returned {status}: {details}"
            )));
        }

        Ok(SendOutcome::Sent)
    }
}

pub async fn run_email_worker(
    state: Arc<AppState>,
    mailer: Mailer,
    mut email_rx: mpsc::Receiver<EmailMessage>,
) {
    info!(enabled = mailer.is_enabled(), "email worker started");

    while let Some(message) = email_rx.recv().await {
        state.metrics.emails_in_queue.dec();

        match mailer.send(&message).await {
            Ok(outcome) => {
                state
                    .metrics
                    .emails_total
                    .with_label_values(&[outcome.label()])
                    .inc();
                if outcome == SendOutcome::Sent {
                    info!(to = %message.to, subject = %message.subject, "email sent");
                }
            }
            Err(err) => {
                state.metrics.emails_total.with_label_values(&["error"]).inc();
                error!(error = %err, to = %message.to, "failed to send email");
            }
        }
    }

    warn!("email worker stopped: queue channel closed");
}

pub fn is_plausible_address(address: &str) -> bool {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !address.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn order_created_email(order: &Order, pharmacy: &Pharmacy) -> Option<EmailMessage> {
    if !is_plausible_address(&pharmacy.email) {
        return None;
    }

    let pumps = order.pump_numbers.join(", ");
    Some(EmailMessage {
        to: pharmacy.email.trim().to_string(),
        subject: format!("New delivery order {}", order.id),
        html: format!(
            "<p>Order <b>{}</b> was created by {} for {}.</p><p>Pumps: {}</p>",
            order.id,
            escape_html(&order.created_by_employee_name),
            escape_html(&order.customer.name),
            escape_html(&pumps),
        ),
        text: Some(format!(
            "Order {} was created by {} for {}. Pumps: {}",
            order.id, order.created_by_employee_name, order.customer.name, pumps
        )),
    })
}

pub fn delivery_confirmation_email(order: &Order) -> Option<EmailMessage> {
    let to = order.customer.email.as_deref().filter(|to| is_plausible_address(to))?;
    let driver = order.driver_name.clone().unwrap_or_default();
    let pumps = order.pump_numbers.join(", ");

    let mut html = format!(
        "<p>Your order from {} was delivered by {}.</p><p>Pumps: {}</p>",
        escape_html(&order.pharmacy_name),
        escape_html(&driver),
        escape_html(&pumps),
    );
    if let Some(url) = order.legal_pdf_url() {
        html.push_str(&format!(
            "<p><a href=\"{}\">Delivery record (PDF)</a></p>",
            escape_html(url)
        ));
    }

    Some(EmailMessage {
        to: to.trim().to_string(),
        subject: format!("Delivery confirmed: order {}", order.id),
        html,
        text: Some(format!(
            "Your order from {} was delivered by {}. Pumps: {}",
            order.pharmacy_name, driver, pumps
        )),
    })
}

pub fn delivery_pdf_email(order: &Order, to: &str) -> Result<EmailMessage, AppError> {
    let url = order
        .legal_pdf_url()
        .ok_or_else(|| AppError::Conflict("PDF is not available yet".to_string()))?;
    if !is_plausible_address(to) {
        return Err(AppError::BadRequest(format!("invalid email address: {to}")));
    }

    Ok(EmailMessage {
        to: to.trim().to_string(),
        subject: format!("Delivery record for order {}", order.id),
        html: format!(
            "<p>Delivery record for {} (order {}).</p><p><a href=\"{}\">Download PDF</a></p>",
            escape_html(&order.customer.name),
            order.id,
            escape_html(url),
        ),
        text: Some(format!("Delivery record for order {}: {}", order.id, url)),
    })
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
