use crate::clusters::{filter_live, join_clusters};
use crate::config::RunConfig;
use crate::model::Release;

use std::collections::BTreeSet;
use std::fmt;

/// What to do with a release once decommissioned clusters are taken out
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    NoOp,
    /// Rewrite the scheduling record to the given sorted, comma-joined live clusters
    Reannotate(String),
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoOp => f.write_str("none"),
            Action::Reannotate(record) => write!(f, "reannotate to {record:?}"),
            Action::Delete => f.write_str("delete"),
        }
    }
}

/// Live clusters of `release`
pub fn live_clusters(release: &Release, config: &RunConfig) -> BTreeSet<String> {
    filter_live(&release.selected_clusters(), config.decommissioned())
}

/// Contender status only matters once no live cluster is left.
pub fn needs_contender_check(release: &Release, config: &RunConfig) -> bool {
    live_clusters(release, config).is_empty()
}

/// First match wins:
///
/// | live clusters | record up to date | contender | action        |
/// |---------------|-------------------|-----------|---------------|
/// | some          | yes               | -         | `NoOp`        |
/// | some          | no                | -         | `Reannotate`  |
/// | none          | -                 | yes       | `NoOp`        |
/// | none          | -                 | no        | `Delete`      |
pub fn decide(live: &BTreeSet<String>, recorded: Option<&str>, is_contender: bool) -> Action {
    if !live.is_empty() {
        let record = join_clusters(live);
        if recorded == Some(record.as_str()) {
            return Action::NoOp;
        }
        return Action::Reannotate(record);
    }
    if is_contender {
        Action::NoOp
    } else {
        Action::Delete
    }
}

pub fn resolve_action(release: &Release, config: &RunConfig, is_contender: bool) -> Action {
    decide(
        &live_clusters(release, config),
        release.recorded_clusters(),
        is_contender,
    )
}
