//! Turn replay fixture schema and validation.
//!
//! A fixture describes one turn: an optional inbound activity followed by the
//! send, update and delete operations the bot performs, in order.

use std::path::Path;

use anyhow::{bail, Context, Result};
use parley_schema::Activity;
use serde::{Deserialize, Serialize};

pub const TURN_REPLAY_FIXTURE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReplayOperation {
    Send { activities: Vec<Activity> },
    Update { activity: Activity },
    Delete { activity_id: String },
}

impl ReplayOperation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Send { .. } => "send",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplayFixture {
    pub schema_version: u32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inbound: Option<Activity>,
    pub operations: Vec<ReplayOperation>,
}

pub fn parse_replay_fixture(raw: &str) -> Result<ReplayFixture> {
    let fixture: ReplayFixture =
        serde_json::from_str(raw).context("failed to parse turn replay fixture")?;
    validate_replay_fixture(&fixture)?;
    Ok(fixture)
}

pub fn load_replay_fixture(path: &Path) -> Result<ReplayFixture> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixture {}", path.display()))?;
    parse_replay_fixture(&raw)
        .with_context(|| format!("invalid turn replay fixture {}", path.display()))
}

pub fn validate_replay_fixture(fixture: &ReplayFixture) -> Result<()> {
    if fixture.schema_version != TURN_REPLAY_FIXTURE_SCHEMA_VERSION {
        bail!(
            "unsupported turn replay fixture schema_version {} (expected {})",
            fixture.schema_version,
            TURN_REPLAY_FIXTURE_SCHEMA_VERSION
        );
    }
    if fixture.name.trim().is_empty() {
        bail!("fixture name cannot be empty");
    }
    if fixture.operations.is_empty() {
        bail!("fixture must include at least one operation");
    }

    for (index, operation) in fixture.operations.iter().enumerate() {
        let label = format!("fixture operation index {index} ({})", operation.label());
        match operation {
            ReplayOperation::Send { activities } => {
                if activities.is_empty() {
                    bail!("{label} has no activities");
                }
            }
            ReplayOperation::Update { activity } => {
                let has_id = activity
                    .id
                    .as_deref()
                    .is_some_and(|id| !id.trim().is_empty());
                if !has_id {
                    bail!("{label} has an activity without an id");
                }
            }
            ReplayOperation::Delete { activity_id } => {
                if activity_id.trim().is_empty() {
                    bail!("{label} has empty activity_id");
                }
                if fixture.inbound.is_none() {
                    bail!("{label} requires an inbound activity to address the delete");
                }
            }
        }
    }
    Ok(())
}
