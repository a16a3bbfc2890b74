//! Operator-side integrity check for curriculum node trees.
//!
//! Scans one curriculum or every live curriculum and reports invariant
//! violations through `tracing`.

pub mod config;

use curriculum_core::types::DbId;
use curriculum_db::error::TreeResult;
use curriculum_db::models::integrity::TreeIntegrityReport;
use curriculum_db::repositories::CurriculumRepo;
use curriculum_db::tree_manager::NodeTreeManager;

/// Aggregate result of one check run.
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub curricula_scanned: usize,
    pub reports_with_issues: Vec<TreeIntegrityReport>,
}

impl CheckSummary {
    pub fn issue_count(&self) -> usize {
        self.reports_with_issues
            .iter()
            .map(TreeIntegrityReport::issue_count)
            .sum()
    }

    pub fn is_clean(&self) -> bool {
        self.reports_with_issues.is_empty()
    }
}

/// Scan `only` if given, otherwise every live curriculum.
pub async fn run_check(manager: &NodeTreeManager, only: Option<DbId>) -> TreeResult<CheckSummary> {
    let curriculum_ids = match only {
        Some(id) => vec![id],
        None => CurriculumRepo::list_active_ids(manager.pool()).await?,
    };

    let mut summary = CheckSummary::default();
    for curriculum_id in curriculum_ids {
        let report = manager.scan(curriculum_id).await?;
        summary.curricula_scanned += 1;
        if report.is_clean() {
            tracing::debug!(curriculum_id, "Curriculum tree is consistent");
            continue;
        }
        log_report(&report);
        summary.reports_with_issues.push(report);
    }
    Ok(summary)
}

fn log_report(report: &TreeIntegrityReport) {
    let curriculum_id = report.curriculum_id;
    for dup in &report.duplicate_sibling_orders {
        tracing::warn!(
            curriculum_id,
            parent_node_id = ?dup.parent_node_id,
            order_index = dup.order_index,
            node_ids = ?dup.node_ids,
            "Active siblings share an order_index"
        );
    }
    if !report.orphaned_active_nodes.is_empty() {
        tracing::warn!(
            curriculum_id,
            node_ids = ?report.orphaned_active_nodes,
            "Active nodes under a deleted or foreign parent"
        );
    }
    if !report.content_mismatches.is_empty() {
        tracing::warn!(
            curriculum_id,
            node_ids = ?report.content_mismatches,
            "Node content missing or out of step with its node"
        );
    }
    if !report.live_links_on_deleted_nodes.is_empty() {
        tracing::warn!(
            curriculum_id,
            link_ids = ?report.live_links_on_deleted_nodes,
            "Active links on deleted nodes"
        );
    }
}
