use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::{self, HarvestTarget};
use crate::fetch::Fetcher;
use crate::project::{self, RecordSet, SubjectStub};

/// Outcome of a harvest run over a batch of term units.
pub struct HarvestOutcome {
    pub ok: usize,
    pub failed: usize,
    pub records: usize,
}

/// Bounded work queue over term units: each term is fetched and projected in
/// its own task, and completed record sets stream back to the single DB
/// writer here. A term that fails (fetch of its root, shape violation, or a
/// rolled-back write) is logged and skipped; its siblings are unaffected.
pub async fn harvest_terms(
    conn: &Connection,
    fetcher: &Fetcher,
    targets: Vec<HarvestTarget>,
    concurrency: usize,
) -> Result<HarvestOutcome> {
    let total = targets.len();
    let term_permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let (tx, mut rx) =
        tokio::sync::mpsc::channel::<(i64, String, Result<RecordSet>)>(concurrency.max(1) * 2);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} terms ({eta})")?
            .progress_chars("=> "),
    );

    for target in targets {
        let fetcher = fetcher.clone();
        let permits = Arc::clone(&term_permits);
        let tx = tx.clone();
        tokio::spawn(async move {
            let _permit = match permits.acquire().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let result = harvest_term(&fetcher, &target).await;
            let _ = tx.send((target.term_id, target.term_name, result)).await;
        });
    }
    // Close our sender so the loop ends when every task has reported.
    drop(tx);

    let mut ok = 0usize;
    let mut failed = 0usize;
    let mut records = 0usize;

    while let Some((term_id, term_name, result)) = rx.recv().await {
        match result.and_then(|set| {
            db::save_record_set(conn, &set)?;
            Ok(set)
        }) {
            Ok(set) => {
                info!(
                    "{} ({}): {} subjects, {} courses, {} sections, {} meetings",
                    term_name,
                    term_id,
                    set.subjects.len(),
                    set.courses.len(),
                    set.sections.len(),
                    set.meetings.len()
                );
                records += set.total_records();
                ok += 1;
            }
            Err(e) => {
                warn!("term {} ({}) failed: {:#}", term_name, term_id, e);
                failed += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(HarvestOutcome { ok, failed, records })
}

/// Harvest one term: fetch its root, fetch every subject's cascade document
/// concurrently, then run the pure projection over the collected trees.
pub async fn harvest_term(fetcher: &Fetcher, target: &HarvestTarget) -> Result<RecordSet> {
    let root_url = with_mode(&target.url, "summary");
    let term_root = fetcher
        .fetch_tree(&root_url)
        .await
        .with_context(|| format!("term root fetch failed: {}", root_url))?;

    let (term_row, stubs) = project::subject_stubs(&term_root)?;
    info!(
        "{}: fetching {} subject cascades",
        target.term_name,
        stubs.len()
    );

    let docs = fetch_cascades(fetcher, stubs).await;
    project::project_subject_docs(term_row, &docs)
}

/// Fetch all subject cascade documents of one term. Results keep the term
/// root's subject order; a failed fetch stays in place as `None` so the
/// projection can exclude exactly that branch.
async fn fetch_cascades(
    fetcher: &Fetcher,
    stubs: Vec<SubjectStub>,
) -> Vec<(SubjectStub, Option<serde_json::Value>)> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(stubs.len().max(1));

    for (idx, stub) in stubs.iter().cloned().enumerate() {
        let fetcher = fetcher.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let doc = match &stub.href {
                Some(href) => fetcher.fetch_tree(&with_mode(href, "cascade")).await,
                None => {
                    warn!("subject {} has no detail URL, excluding branch", stub.id);
                    None
                }
            };
            let _ = tx.send((idx, stub, doc)).await;
        });
    }
    drop(tx);

    let mut docs: Vec<Option<(SubjectStub, Option<serde_json::Value>)>> =
        (0..stubs.len()).map(|_| None).collect();
    while let Some((idx, stub, doc)) = rx.recv().await {
        docs[idx] = Some((stub, doc));
    }
    docs.into_iter().flatten().collect()
}

fn with_mode(url: &str, mode: &str) -> String {
    if url.contains('?') {
        format!("{}&mode={}", url, mode)
    } else {
        format!("{}?mode={}", url, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_appends_correctly() {
        assert_eq!(
            with_mode("http://x/2020/fall.xml", "cascade"),
            "http://x/2020/fall.xml?mode=cascade"
        );
        assert_eq!(
            with_mode("http://x/fall.xml?foo=1", "summary"),
            "http://x/fall.xml?foo=1&mode=summary"
        );
    }
}
