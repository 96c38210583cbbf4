//! Bitokens: a target cluster id paired with the cluster ids of the source
//! words it is aligned to.
//!
//! `A_D-x` is target cluster `x` aligned to source positions holding `A` and
//! `D` (ascending source order). Unaligned targets get `NULL-x`.

use crate::alignment::Alignment;
use mtfeatures_core::NULL_CLUSTER;
use std::collections::BTreeSet;

/// Bitoken for one target position.
///
/// Links that point past the end of `source_clusters` are ignored; if none
/// remain the source side is `NULL`.
pub fn bitoken(
    source_clusters: &[String],
    links: Option<&BTreeSet<usize>>,
    target_cluster: &str,
) -> String {
    let mut out = String::new();
    for &pos in links.into_iter().flatten() {
        match source_clusters.get(pos) {
            Some(cluster) => {
                if !out.is_empty() {
                    out.push('_');
                }
                out.push_str(cluster);
            }
            None => {
                tracing::trace!(pos, len = source_clusters.len(), "alignment link outside source");
            }
        }
    }
    if out.is_empty() {
        tracing::trace!(target = target_cluster, "unaligned target word");
        out.push_str(NULL_CLUSTER);
    }
    out.push('-');
    out.push_str(target_cluster);
    out
}

/// Bitokens for every position of `target_clusters`.
pub fn build<S: AsRef<str>>(
    source_clusters: &[String],
    target_clusters: &[S],
    alignment: &Alignment,
) -> Vec<String> {
    target_clusters
        .iter()
        .enumerate()
        .map(|(i, t)| bitoken(source_clusters, alignment.sources(i), t.as_ref()))
        .collect()
}
