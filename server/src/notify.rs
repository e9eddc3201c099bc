//! Notification derivation: per-type business rules turning a recorded
//! activity into zero or more addressed notifications.
//!
//! Derivation is a pure mapping evaluated once per activity. It never
//! consults connectivity — the router drops pushes for offline recipients —
//! and it never retries or queues. A room-targeted rule expands into one
//! notification per resolved member before delivery, so every notification
//! has exactly one recipient.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::{ActivityRecord, ActivityType};
use crate::error::RosterError;
use crate::roster::EnrollmentStore;

/// A derived, targeted message for one recipient.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub recipient_user_id: String,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
    /// Best-effort delivery signal, set by the dispatch path. Not a
    /// durability guarantee.
    pub delivered: bool,
    /// Recipient-side state; always false at push time.
    pub read: bool,
}

impl Notification {
    fn new(recipient: &str, kind: ActivityType, title: &str, message: String, data: Option<Value>) -> Self {
        Self {
            recipient_user_id: recipient.to_string(),
            kind,
            title: title.to_string(),
            message,
            data,
            created_at: Utc::now(),
            delivered: false,
            read: false,
        }
    }
}

// --- Producer payload contracts (§ data model) ---
// Field names follow the platform's JSON convention. Parsing failures are
// producer contract violations: logged, zero notifications, never an error.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionPayload {
    teacher_id: String,
    #[serde(default)]
    student_name: Option<String>,
    assignment_title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GradePayload {
    student_id: String,
    assignment_title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewAssignmentPayload {
    class_id: String,
    #[serde(alias = "title")]
    assignment_title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizPayload {
    teacher_id: String,
    #[serde(default)]
    student_name: Option<String>,
    #[serde(alias = "title")]
    quiz_title: String,
}

/// Applies the per-type derivation rules.
pub struct NotificationDeriver {
    roster: Arc<dyn EnrollmentStore>,
}

impl NotificationDeriver {
    pub fn new(roster: Arc<dyn EnrollmentStore>) -> Self {
        Self { roster }
    }

    /// Derive the addressed notifications for one recorded activity.
    pub async fn derive(&self, activity: &ActivityRecord) -> Vec<Notification> {
        match &activity.kind {
            ActivityType::AssignmentSubmitted => self.assignment_submitted(activity),
            ActivityType::GradePosted => self.grade_posted(activity),
            ActivityType::NewAssignment => self.new_assignment(activity).await,
            ActivityType::QuizCompleted => self.quiz_completed(activity),
            ActivityType::TutorInteraction | ActivityType::Other(_) => {
                // Recorded for history, nothing to push.
                tracing::debug!(
                    activity_type = %activity.kind.as_str(),
                    "No derivation rule for activity type"
                );
                Vec::new()
            }
        }
    }

    /// One notification to the assignment's owning teacher.
    fn assignment_submitted(&self, activity: &ActivityRecord) -> Vec<Notification> {
        let Some(payload) = parse_payload::<SubmissionPayload>(activity) else {
            return Vec::new();
        };

        let student = payload.student_name.unwrap_or_else(|| activity.user_id.clone());
        vec![Notification::new(
            &payload.teacher_id,
            ActivityType::AssignmentSubmitted,
            "Assignment Submitted",
            format!("{} submitted {}", student, payload.assignment_title),
            Some(activity.payload.clone()),
        )]
    }

    /// One notification to the graded student.
    fn grade_posted(&self, activity: &ActivityRecord) -> Vec<Notification> {
        let Some(payload) = parse_payload::<GradePayload>(activity) else {
            return Vec::new();
        };

        vec![Notification::new(
            &payload.student_id,
            ActivityType::GradePosted,
            "Grade Posted",
            format!("Your grade for {} has been posted", payload.assignment_title),
            Some(activity.payload.clone()),
        )]
    }

    /// One notification per enrolled member of the assignment's class.
    /// The acting user is excluded — nobody needs a push about their own
    /// action. A missing room drops the broadcast; it does not error.
    async fn new_assignment(&self, activity: &ActivityRecord) -> Vec<Notification> {
        let Some(payload) = parse_payload::<NewAssignmentPayload>(activity) else {
            return Vec::new();
        };

        let members = match self.roster.members_of(&payload.class_id).await {
            Ok(members) => members,
            Err(RosterError::RoomNotFound(room)) => {
                tracing::warn!(
                    room_id = %room,
                    activity_id = %activity.id,
                    "Class not found, dropping broadcast"
                );
                return Vec::new();
            }
            Err(RosterError::Storage(e)) => {
                tracing::warn!(
                    room_id = %payload.class_id,
                    activity_id = %activity.id,
                    error = %e,
                    "Roster unavailable, dropping broadcast"
                );
                return Vec::new();
            }
        };

        members
            .into_iter()
            .filter(|member| member != &activity.user_id)
            .map(|member| {
                Notification::new(
                    &member,
                    ActivityType::NewAssignment,
                    "New Assignment",
                    format!("New assignment posted: {}", payload.assignment_title),
                    Some(activity.payload.clone()),
                )
            })
            .collect()
    }

    /// One notification to the quiz's owning teacher.
    fn quiz_completed(&self, activity: &ActivityRecord) -> Vec<Notification> {
        let Some(payload) = parse_payload::<QuizPayload>(activity) else {
            return Vec::new();
        };

        let student = payload.student_name.unwrap_or_else(|| activity.user_id.clone());
        vec![Notification::new(
            &payload.teacher_id,
            ActivityType::QuizCompleted,
            "Quiz Completed",
            format!("{} completed {}", student, payload.quiz_title),
            Some(activity.payload.clone()),
        )]
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(activity: &ActivityRecord) -> Option<T> {
    match serde_json::from_value(activity.payload.clone()) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(
                activity_id = %activity.id,
                activity_type = %activity.kind.as_str(),
                error = %e,
                "Malformed activity payload, no notification derived"
            );
            None
        }
    }
}
