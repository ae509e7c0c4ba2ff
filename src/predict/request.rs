//! PredictionRequest: a validated sequence plus optional editing context
//!
//! The context fields are passed through to the remote predictor untouched.
//! Nothing here validates them.

use crate::sequence::Sequence;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optional experiment parameters some predictor deployments accept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disease: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pam_sequence: Option<String>,
    #[serde(default, rename = "guideRNA", skip_serializing_if = "Option::is_none")]
    pub guide_rna: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_type: Option<String>,
}

impl EditContext {
    pub fn is_empty(&self) -> bool {
        *self == EditContext::default()
    }
}

/// A request owned by the caller until submitted, then immutable.
///
/// Serializes to the predictor's request body: `{"sequence": ..., <context>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictionRequest {
    #[serde(skip)]
    pub id: String,
    pub sequence: Sequence,
    #[serde(flatten)]
    pub context: EditContext,
}

impl PredictionRequest {
    pub fn new(sequence: Sequence) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sequence,
            context: EditContext::default(),
        }
    }

    pub fn with_context(mut self, context: EditContext) -> Self {
        self.context = context;
        self
    }
}
