use itertools::Itertools;
use std::collections::BTreeSet;

/// Clusters of `selected` that are still live.
///
/// A release scheduled nowhere and a release scheduled only on decommissioned
/// clusters both come out empty.
pub fn filter_live(selected: &BTreeSet<String>, decommissioned: &BTreeSet<String>) -> BTreeSet<String> {
    selected.difference(decommissioned).cloned().collect()
}

/// Renders a cluster set the way it is stored in the scheduling record
pub fn join_clusters(clusters: &BTreeSet<String>) -> String {
    clusters.iter().join(",")
}
