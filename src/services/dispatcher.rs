//! Notification fan-out for approval rounds and vote outcomes.
//!
//! Issuing a round notifies every reviewer in two phases. All in-app
//! notifications are written first; emails are then sent concurrently, each
//! under its own timeout and all under one overall deadline. Email failures
//! are counted and logged, never surfaced as errors.

use crate::error::AppError;
use crate::models::{
    ArtifactDescriptor, DeliveryStatus, NewNotification, NotificationType, User, Vote, VoteStatus,
};
use crate::services::directory::UserDirectory;
use crate::services::email::{approval_request_email, ApprovalRequestContext, EmailMessage, EmailTransport};
use crate::services::notification_sink::{DeliveryRecord, NotificationSink};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Timing and link settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Prefix for links in emails, e.g. `https://approvals.example.com`.
    pub public_base_url: String,
    /// Upper bound for a single email send.
    pub email_timeout: Duration,
    /// Upper bound for the whole email phase of a round.
    pub overall_timeout: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            public_base_url: String::new(),
            email_timeout: Duration::from_secs(10),
            overall_timeout: Duration::from_secs(20),
        }
    }
}

/// Delivery counts for one round.
///
/// `succeeded` and `failed` count emails. `in_app_failed` counts reviewers
/// whose in-app notification could not be written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub succeeded: usize,
    pub failed: usize,
    pub in_app_failed: usize,
}

impl DispatchReport {
    pub fn emails(succeeded: usize, failed: usize) -> Self {
        Self {
            succeeded,
            failed,
            in_app_failed: 0,
        }
    }
}

pub struct NotificationDispatcher {
    directory: Arc<dyn UserDirectory>,
    sink: Arc<dyn NotificationSink>,
    transport: Arc<dyn EmailTransport>,
    settings: DispatchSettings,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        sink: Arc<dyn NotificationSink>,
        transport: Arc<dyn EmailTransport>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            directory,
            sink,
            transport,
            settings,
        }
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    /// Notify every reviewer of a newly issued round.
    ///
    /// Runs after the round has committed, so it never fails. Every reviewer
    /// gets an in-app notification attempt, including ones the directory
    /// does not know; write failures are counted in `in_app_failed`. Emails
    /// without a directory entry, failed sends, and sends unfinished at the
    /// deadline are counted in `failed`.
    pub async fn on_round_issued(&self, reviewer_ids: &[i64], artifact: &ArtifactDescriptor) -> DispatchReport {
        let path = artifact.approval_path();
        let mut report = DispatchReport::default();

        for &reviewer_id in reviewer_ids {
            let created = self
                .sink
                .create(NewNotification {
                    user_id: reviewer_id,
                    kind: NotificationType::ApprovalRequest,
                    title: "New Approval Request".to_string(),
                    message: format!(
                        "You have been requested to approve the {} \"{}\" in project \"{}\"",
                        artifact.kind.label(),
                        artifact.name,
                        artifact.project_display_name()
                    ),
                    link: Some(path.clone()),
                })
                .await;
            if let Err(e) = created {
                log::warn!(
                    "[dispatch] Failed to create in-app notification for reviewer {}: {}",
                    reviewer_id,
                    e
                );
                report.in_app_failed += 1;
            }
        }

        let (users, lookup_error) = match self.directory.resolve_map(reviewer_ids).await {
            Ok(users) => (users, None),
            Err(e) => {
                log::warn!("[dispatch] User directory lookup failed: {}", e);
                (HashMap::new(), Some(format!("User directory unavailable: {}", e)))
            }
        };

        let mut recipients: Vec<&User> = Vec::with_capacity(reviewer_ids.len());

        for &reviewer_id in reviewer_ids {
            match users.get(&reviewer_id) {
                Some(user) => recipients.push(user),
                None => {
                    log::warn!(
                        "[dispatch] Reviewer {} not found in user directory, skipping email",
                        reviewer_id
                    );
                    report.failed += 1;
                    self.record(DeliveryRecord {
                        artifact_id: artifact.id,
                        recipient_id: reviewer_id,
                        recipient_email: None,
                        status: DeliveryStatus::Failed,
                        error_message: Some(
                            lookup_error
                                .clone()
                                .unwrap_or_else(|| "Reviewer not found in user directory".to_string()),
                        ),
                    })
                    .await;
                }
            }
        }

        let link = format!(
            "{}{}",
            self.settings.public_base_url.trim_end_matches('/'),
            path
        );
        let deadline = Instant::now() + self.settings.overall_timeout;
        let mut finished = vec![false; recipients.len()];

        let mut sends: FuturesUnordered<_> = recipients
            .iter()
            .enumerate()
            .map(|(index, user)| {
                let link = link.as_str();
                async move { (index, self.send_request_email(user, artifact, link).await) }
            })
            .collect();

        loop {
            match tokio::time::timeout_at(deadline, sends.next()).await {
                Ok(Some((index, result))) => {
                    finished[index] = true;
                    let user = recipients[index];
                    let (status, error_message) = match result {
                        Ok(()) => {
                            report.succeeded += 1;
                            (DeliveryStatus::Sent, None)
                        }
                        Err(e) => {
                            log::warn!("[dispatch] Email to {} failed: {}", user.email, e);
                            report.failed += 1;
                            (DeliveryStatus::Failed, Some(e.to_string()))
                        }
                    };
                    self.record(DeliveryRecord {
                        artifact_id: artifact.id,
                        recipient_id: user.id,
                        recipient_email: Some(user.email.clone()),
                        status,
                        error_message,
                    })
                    .await;
                }
                Ok(None) => break,
                Err(_) => {
                    log::warn!(
                        "[dispatch] Round deadline of {:?} reached with emails still in flight",
                        self.settings.overall_timeout
                    );
                    break;
                }
            }
        }
        drop(sends);

        for (index, user) in recipients.iter().enumerate() {
            if finished[index] {
                continue;
            }
            report.failed += 1;
            self.record(DeliveryRecord {
                artifact_id: artifact.id,
                recipient_id: user.id,
                recipient_email: Some(user.email.clone()),
                status: DeliveryStatus::Failed,
                error_message: Some("Round delivery deadline exceeded".to_string()),
            })
            .await;
        }

        log::info!(
            "[dispatch] Artifact {}: {} emails sent, {} failed, {} in-app failed ({} reviewers, live transport: {})",
            artifact.id,
            report.succeeded,
            report.failed,
            report.in_app_failed,
            reviewer_ids.len(),
            self.transport.is_live()
        );

        report
    }

    /// Tell the requester of a round that a reviewer decided.
    ///
    /// In-app only. Nothing is sent for pending votes, votes without a
    /// requester, or a reviewer deciding on their own request. Failures are
    /// logged and swallowed.
    pub async fn notify_decision(&self, vote: &Vote, artifact: &ArtifactDescriptor) {
        let Some(requester_id) = vote.requested_by else {
            return;
        };
        if requester_id == vote.reviewer_id {
            return;
        }

        let (kind, title, verb) = match vote.status {
            VoteStatus::Approved => (NotificationType::ApprovalApproved, "Approval Granted", "approved"),
            VoteStatus::Rejected => (NotificationType::ApprovalRejected, "Approval Rejected", "rejected"),
            VoteStatus::Pending => return,
        };

        let reviewer_name = match self.directory.resolve(&[vote.reviewer_id]).await {
            Ok(users) => users
                .first()
                .map(|u| u.display_name().to_string())
                .unwrap_or_else(|| "A reviewer".to_string()),
            Err(e) => {
                log::warn!("[dispatch] Failed to resolve reviewer {}: {}", vote.reviewer_id, e);
                "A reviewer".to_string()
            }
        };

        let notification = NewNotification {
            user_id: requester_id,
            kind,
            title: title.to_string(),
            message: format!(
                "{} {} the {} \"{}\" in project \"{}\"",
                reviewer_name,
                verb,
                artifact.kind.label(),
                artifact.name,
                artifact.project_display_name()
            ),
            link: Some(artifact.approval_path()),
        };

        if let Err(e) = self.sink.create(notification).await {
            log::warn!(
                "[dispatch] Failed to notify requester {} about vote {}: {}",
                requester_id,
                vote.id,
                e
            );
        }
    }

    async fn send_request_email(
        &self,
        user: &User,
        artifact: &ArtifactDescriptor,
        link: &str,
    ) -> Result<(), AppError> {
        let rendered = approval_request_email(&ApprovalRequestContext {
            user_name: user.display_name(),
            project_name: artifact.project_display_name(),
            artifact_label: artifact.kind.label(),
            artifact_name: &artifact.name,
            approval_link: link,
        });

        let message = EmailMessage {
            to: user.email.clone(),
            subject: rendered.subject,
            html: rendered.html,
            attachments: Vec::new(),
        };

        match tokio::time::timeout(self.settings.email_timeout, self.transport.send(&message)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::dependency_named(
                format!("Email send timed out after {:?}", self.settings.email_timeout),
                "email",
            )),
        }
    }

    async fn record(&self, delivery: DeliveryRecord) {
        let recipient_id = delivery.recipient_id;
        if let Err(e) = self.sink.record_delivery(delivery).await {
            log::warn!(
                "[dispatch] Failed to record email delivery for user {}: {}",
                recipient_id,
                e
            );
        }
    }
}
