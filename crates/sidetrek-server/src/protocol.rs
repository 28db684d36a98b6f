//! Server → UI messages

use serde::{Deserialize, Serialize};
use sidetrek_dbt::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Lineage graph of the dbt project
    Dag,
}

/// One frame sent to the UI.
///
/// `data` holds the payload as JSON text; the UI parses it per topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: Topic,
    pub data: String,
}

impl Envelope {
    pub fn dag(graph: &Graph) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: Topic::Dag,
            data: serde_json::to_string(graph)?,
        })
    }

    /// Frame body
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
