//! Outgoing email
//!
//! Handlers render a template into an [`OutgoingEmail`] and hand it to the
//! configured [`Mailer`]. The default mailer queues messages in the
//! `email_outbox` table; a separate relay owns SMTP delivery.

use axum::async_trait;
use hrms_common::time::now_rfc3339;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// A rendered message ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> hrms_common::Result<()>;
}

/// Queues mail in the `email_outbox` table
pub struct OutboxMailer {
    db: SqlitePool,
}

impl OutboxMailer {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: OutgoingEmail) -> hrms_common::Result<()> {
        sqlx::query(
            "INSERT INTO email_outbox (id, recipient, subject, html_body, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&email.to)
        .bind(&email.subject)
        .bind(&email.html)
        .bind(now_rfc3339())
        .execute(&self.db)
        .await?;

        info!("Queued email '{}' to {}", email.subject, email.to);
        Ok(())
    }
}

/// Send without failing the caller; problems are only logged
pub async fn send_quietly(mailer: &dyn Mailer, email: OutgoingEmail) {
    let to = email.to.clone();
    let subject = email.subject.clone();
    if let Err(e) = mailer.send(email).await {
        warn!("Failed to send '{}' to {}: {}", subject, to, e);
    }
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body style=\"font-family: Arial, sans-serif; color: #333;\">\
         <h2>{}</h2>{}<p style=\"color: #888; font-size: 12px;\">HRMS</p></body></html>",
        escape(heading),
        body
    )
}

/// Message templates
pub mod templates {
    use super::{escape, layout, OutgoingEmail};

    pub fn verification(to: &str, name: &str, token: &str) -> OutgoingEmail {
        let link = format!("/verify-email?token={}", token);
        OutgoingEmail {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            html: layout(
                "Verify your email address",
                &format!(
                    "<p>Hello {},</p><p>Confirm your address by opening \
                     <a href=\"{}\">this link</a>. It expires in 24 hours.</p>\
                     <p>Verification token: <code>{}</code></p>",
                    escape(name),
                    escape(&link),
                    escape(token)
                ),
            ),
        }
    }

    pub fn reset_code(to: &str, name: &str, code: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Your password reset code".to_string(),
            html: layout(
                "Password reset",
                &format!(
                    "<p>Hello {},</p><p>Your verification code is \
                     <strong style=\"font-size: 24px;\">{}</strong>.</p>\
                     <p>The code expires in 10 minutes. Ignore this email if you did not \
                     request a reset.</p>",
                    escape(name),
                    escape(code)
                ),
            ),
        }
    }

    pub fn reset_confirmation(to: &str, name: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.to_string(),
            subject: "Your password has been reset".to_string(),
            html: layout(
                "Password changed",
                &format!(
                    "<p>Hello {},</p><p>Your password was reset successfully. If this \
                     was not you, contact HR immediately.</p>",
                    escape(name)
                ),
            ),
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct InterviewDetails<'a> {
        pub date: &'a str,
        pub time: Option<&'a str>,
        pub location: Option<&'a str>,
        pub notes: Option<&'a str>,
    }

    pub fn interview_invitation(
        to: &str,
        name: &str,
        job_title: &str,
        details: &InterviewDetails<'_>,
    ) -> OutgoingEmail {
        let mut rows = format!("<li>Date: {}</li>", escape(details.date));
        if let Some(time) = details.time {
            rows.push_str(&format!("<li>Time: {}</li>", escape(time)));
        }
        if let Some(location) = details.location {
            rows.push_str(&format!("<li>Location: {}</li>", escape(location)));
        }
        let notes = details
            .notes
            .map(|n| format!("<p>{}</p>", escape(n)))
            .unwrap_or_default();

        OutgoingEmail {
            to: to.to_string(),
            subject: format!("Interview Invitation - {}", job_title),
            html: layout(
                "Interview invitation",
                &format!(
                    "<p>Dear {},</p><p>We would like to invite you to interview for the \
                     <strong>{}</strong> position.</p><ul>{}</ul>{}",
                    escape(name),
                    escape(job_title),
                    rows,
                    notes
                ),
            ),
        }
    }

    pub fn job_offer(to: &str, name: &str, job_title: &str, onboarding_token: &str) -> OutgoingEmail {
        let link = format!("/onboarding/{}", onboarding_token);
        OutgoingEmail {
            to: to.to_string(),
            subject: format!("Job Offer - {}", job_title),
            html: layout(
                "Congratulations!",
                &format!(
                    "<p>Dear {},</p><p>We are delighted to offer you the <strong>{}</strong> \
                     position.</p><p>Complete your onboarding within 7 days using \
                     <a href=\"{}\">this link</a>.</p>",
                    escape(name),
                    escape(job_title),
                    escape(&link)
                ),
            ),
        }
    }

    pub fn application_update(to: &str, name: &str, job_title: &str, status: &str) -> OutgoingEmail {
        let summary = match status {
            "reviewed" => "Your application has been reviewed by our team.",
            "shortlisted" => "Good news: you have been shortlisted for the next stage.",
            "rejected" => {
                "After careful consideration we will not be moving forward with your application."
            }
            "hired" => "Congratulations, you have been selected for the position.",
            _ => "The status of your application has changed.",
        };
        OutgoingEmail {
            to: to.to_string(),
            subject: format!("Application Update - {}", job_title),
            html: layout(
                "Application update",
                &format!(
                    "<p>Dear {},</p><p>{}</p><p>Position: <strong>{}</strong><br>Status: \
                     <strong>{}</strong></p>",
                    escape(name),
                    summary,
                    escape(job_title),
                    escape(status)
                ),
            ),
        }
    }
}
