//! Domain records shared by the store, the pipeline and callers.

use crate::error::RenderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned group identifier.
pub type GroupId = i64;

/// Store-assigned member identifier.
pub type MemberId = i64;

/// A named collection of recipients rendered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Members in load order.
    pub members: Vec<Member>,
}

/// One recipient. Belongs to exactly one group for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub group_id: GroupId,
    pub name: String,
    pub contact: String,
    /// Public path of the last document rendered for this member.
    pub output_reference: Option<String>,
}

/// Input for adding a member to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub contact: String,
}

impl NewMember {
    pub fn new(name: impl Into<String>, contact: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contact: contact.into(),
        }
    }
}

/// A pending write of one member's output reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputUpdate {
    pub member_id: MemberId,
    pub output_reference: String,
}

/// What happened for one recipient of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientOutcome {
    pub member_id: MemberId,
    pub member_name: String,
    /// File name inside the output directory (set even when rendering failed).
    pub file_name: String,
    /// Public reference, present only when the render succeeded.
    pub output_reference: Option<String>,
    /// Present only when the render failed.
    pub error: Option<RenderError>,
}

impl RecipientOutcome {
    pub fn rendered(member: &Member, file_name: String, output_reference: String) -> Self {
        Self {
            member_id: member.id,
            member_name: member.name.clone(),
            file_name,
            output_reference: Some(output_reference),
            error: None,
        }
    }

    pub fn failed(member: &Member, file_name: String, error: RenderError) -> Self {
        Self {
            member_id: member.id,
            member_name: member.name.clone(),
            file_name,
            output_reference: None,
            error: Some(error),
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.error.is_none() && self.output_reference.is_some()
    }
}

/// Aggregate result of one personalization batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// The group after the batch, with the committed output references applied.
    pub group: Group,
    pub generated_count: usize,
    /// One entry per member, in render order.
    pub recipients: Vec<RecipientOutcome>,
    /// Rendered files whose references were committed but that could not be
    /// moved into the output directory. Those references point at nothing.
    #[serde(default)]
    pub unpublished: Vec<String>,
}

impl BatchReport {
    pub fn failed_count(&self) -> usize {
        self.recipients.len() - self.generated_count
    }

    /// True when every committed reference has its file in place.
    pub fn fully_published(&self) -> bool {
        self.unpublished.is_empty()
    }

    /// Response body handed back to the transport layer.
    pub fn response(&self) -> PersonalizeResponse {
        PersonalizeResponse::generated(self.generated_count)
    }
}

/// Body of a successful personalization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalizeResponse {
    pub message: String,
    pub count: usize,
}

impl PersonalizeResponse {
    pub fn generated(count: usize) -> Self {
        Self {
            message: format!("Successfully generated {} PDFs", count),
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: MemberId, name: &str) -> Member {
        Member {
            id,
            group_id: 1,
            name: name.into(),
            contact: "555-0100".into(),
            output_reference: None,
        }
    }

    #[test]
    fn outcome_constructors() {
        let ok = RecipientOutcome::rendered(&member(1, "Ann"), "a (Ann).pdf".into(), "/pdfs/a (Ann).pdf".into());
        assert!(ok.is_rendered());

        let bad = RecipientOutcome::failed(&member(2, "Bo"), "a (Bo).pdf".into(), RenderError::NoPages);
        assert!(!bad.is_rendered());
        assert_eq!(bad.output_reference, None);
    }

    #[test]
    fn response_message_matches_count() {
        let r = PersonalizeResponse::generated(2);
        assert_eq!(r.message, "Successfully generated 2 PDFs");
        assert_eq!(r.count, 2);

        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["count"], 2);
    }
}
