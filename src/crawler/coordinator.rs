//! Sync coordinator - main pass orchestration logic
//!
//! This module drives one sync pass through its phases:
//! - Discovering the delegation's editions and their athletes
//! - Filtering out athletes the store already has
//! - Fetching and parsing profiles with a bounded worker pool
//! - Persisting accumulated athletes before their events
//! - Rolling derived fields up onto athlete rows
//!
//! Failures are contained per unit of work: a bad edition page or athlete
//! profile is logged and skipped. Anything already accumulated is flushed
//! before a pass aborts.

use crate::config::Config;
use crate::crawler::detail_parser::{parse_athlete, AthleteDetail};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Claim, Frontier};
use crate::crawler::list_parser::{
    athlete_url, country_url, edition_url, extract_athlete_ids, extract_edition_ids,
};
use crate::output::SyncSummary;
use crate::state::SyncPhase;
use crate::storage::{
    AthleteRecord, EventRecord, RollupOutcome, RunCounts, RunStatus, SqliteStorage, Storage,
};
use crate::{AthleteId, SyncError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

/// Per-invocation switches
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Re-scrape athletes that are already stored
    pub refresh: bool,

    /// Skip discovery and re-scrape exactly these athletes
    pub targets: Vec<AthleteId>,
}

/// Main sync coordinator structure
pub struct Coordinator<S: Storage = SqliteStorage> {
    config: Config,
    base_url: Url,
    storage: S,
    fetcher: Fetcher,
    config_hash: String,
    options: SyncOptions,
    interrupted: Arc<AtomicBool>,

    phase: SyncPhase,
    counts: RunCounts,
    editions: usize,
    failed_editions: usize,
    events_inserted: u64,
    pending_athletes: Vec<AthleteRecord>,
    pending_events: Vec<EventRecord>,
}

impl<S: Storage> Coordinator<S> {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `storage` - The persistence gateway this pass writes to
    /// * `config_hash` - Hash recorded on the run row
    /// * `options` - Refresh / targeted re-scrape switches
    pub fn new(
        config: Config,
        storage: S,
        config_hash: String,
        options: SyncOptions,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.source.base_url)?;
        let fetcher = Fetcher::from_config(&config)?;

        Ok(Self {
            config,
            base_url,
            storage,
            fetcher,
            config_hash,
            options,
            interrupted: Arc::new(AtomicBool::new(false)),
            phase: SyncPhase::DiscoverEditions,
            counts: RunCounts::default(),
            editions: 0,
            failed_editions: 0,
            events_inserted: 0,
            pending_athletes: Vec::new(),
            pending_events: Vec::new(),
        })
    }

    /// Flag that, once set, stops scheduling new work and aborts the pass
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// The storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Releases the storage backend
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Runs one sync pass
    ///
    /// The run row is always finished: `completed` when the pass reaches
    /// `Done`, `aborted` otherwise. An interrupted pass returns `Ok` with an
    /// aborted summary; any other abort returns the error that caused it.
    pub async fn run(&mut self) -> Result<SyncSummary, SyncError> {
        let started = Instant::now();
        let run_id = self.storage.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting sync run {} for delegation {}",
            run_id,
            self.config.source.country_code
        );

        let outcome = self.execute().await;

        let rollup = match &outcome {
            Ok(rollup) => *rollup,
            Err(e) => {
                tracing::error!("Sync run {} failed: {}", run_id, e);
                None
            }
        };

        if self.phase != SyncPhase::Done {
            self.abort();
        }

        let status = if self.phase == SyncPhase::Done {
            RunStatus::Completed
        } else {
            RunStatus::Aborted
        };
        self.storage.finish_run(run_id, status, &self.counts)?;

        let summary = SyncSummary {
            run_id,
            status,
            phase: self.phase,
            editions: self.editions,
            failed_editions: self.failed_editions,
            counts: self.counts,
            events_inserted: self.events_inserted,
            rollup,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            "Sync run {} {}: {} discovered, {} skipped, {} fetched, {} failed, {} persisted in {:?}",
            run_id,
            status.to_db_string(),
            self.counts.discovered,
            self.counts.skipped_known,
            self.counts.fetched,
            self.counts.failed,
            self.counts.persisted,
            summary.elapsed
        );

        outcome.map(|_| summary)
    }

    /// Walks the phases; returns early with `Ok(None)` when interrupted
    async fn execute(&mut self) -> Result<Option<RollupOutcome>, SyncError> {
        let discovered = if self.options.targets.is_empty() {
            self.discover().await?
        } else {
            self.transition(SyncPhase::DiscoverAthletes)?;
            tracing::info!(
                "Re-scraping {} requested athletes, skipping discovery",
                self.options.targets.len()
            );
            self.options.targets.clone()
        };

        if self.is_interrupted() {
            return Ok(None);
        }

        self.transition(SyncPhase::FilterKnown)?;
        let queue = self.filter_known(discovered)?;

        if queue.is_empty() {
            tracing::info!("No new athletes to fetch");
        } else {
            self.transition(SyncPhase::FetchDetail)?;
            self.fetch_details(queue).await?;
            self.persist_pending()?;
        }

        if self.is_interrupted() {
            return Ok(None);
        }

        self.transition(SyncPhase::Rollup)?;
        let rollup = self.storage.run_rollup()?;
        tracing::info!(
            "Rollup updated {} athletes, cleared {}",
            rollup.rolled_up,
            rollup.cleared
        );

        self.transition(SyncPhase::Done)?;
        Ok(Some(rollup))
    }

    /// Collects athlete IDs from every edition page, in first-seen order
    ///
    /// A failed country page aborts the pass; a failed edition page is
    /// skipped.
    async fn discover(&mut self) -> Result<Vec<AthleteId>, SyncError> {
        let code = self.config.source.country_code.clone();
        let country = country_url(&self.base_url, &code)?;

        let page = self.fetcher.fetch(country.as_str()).await?;
        let edition_ids = extract_edition_ids(&page.body, &country, &code);
        self.editions = edition_ids.len();
        tracing::info!("Found {} editions for {}", edition_ids.len(), code);
        if edition_ids.is_empty() {
            tracing::warn!(
                "No editions found on {}; the page layout may have changed",
                country
            );
        }

        let mut seen = HashSet::new();
        let mut discovered = Vec::new();
        for edition_id in edition_ids {
            if self.is_interrupted() {
                tracing::warn!("Interrupted during discovery");
                break;
            }
            self.transition(SyncPhase::DiscoverAthletes)?;

            let url = edition_url(&self.base_url, &code, edition_id)?;
            let page = match self.fetcher.fetch(url.as_str()).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Skipping edition {}: {}", edition_id, e);
                    self.failed_editions += 1;
                    continue;
                }
            };

            let athlete_ids = extract_athlete_ids(&page.body, &url);
            if athlete_ids.is_empty() {
                tracing::warn!("Edition {} lists no athletes", edition_id);
            }
            let before = discovered.len();
            discovered.extend(athlete_ids.into_iter().filter(|id| seen.insert(*id)));
            tracing::info!(
                "Edition {}: {} new athlete IDs ({} so far)",
                edition_id,
                discovered.len() - before,
                discovered.len()
            );
        }

        // Editions that all failed or listed nobody still reach FilterKnown
        if self.phase == SyncPhase::DiscoverEditions {
            self.transition(SyncPhase::DiscoverAthletes)?;
        }

        Ok(discovered)
    }

    /// Claims every discovered ID against the store's known set
    fn filter_known(&mut self, discovered: Vec<AthleteId>) -> Result<Vec<AthleteId>, SyncError> {
        let refresh = self.options.refresh || !self.options.targets.is_empty();
        let mut frontier = Frontier::new(self.storage.known_athlete_ids()?, refresh);
        tracing::debug!("Store already holds {} athletes", frontier.known_count());

        let mut queue = Vec::new();
        for id in discovered {
            match frontier.claim(id) {
                Claim::Fetch => queue.push(id),
                Claim::AlreadyStored => {
                    tracing::debug!("Athlete {} already stored, skipping", id);
                    self.counts.skipped_known += 1;
                }
                Claim::AlreadySeen => {}
            }
        }
        self.counts.discovered = frontier.seen_count() as u64;

        tracing::info!(
            "{} athletes discovered, {} already stored, {} to fetch",
            self.counts.discovered,
            self.counts.skipped_known,
            queue.len()
        );
        if self.counts.discovered == 0 {
            tracing::warn!("Zero athletes discovered; check the source markup");
        }

        Ok(queue)
    }

    /// Fetches and parses profiles with at most `max-concurrent-fetches` in flight
    ///
    /// Every worker shares the fetcher's pacer, so the global request rate is
    /// unchanged by the worker count.
    async fn fetch_details(&mut self, queue: Vec<AthleteId>) -> Result<(), SyncError> {
        let workers = self.config.crawler.max_concurrent_fetches.max(1) as usize;
        let total = queue.len();
        let mut pending = queue.into_iter();
        let mut tasks = JoinSet::new();
        let mut done = 0usize;

        loop {
            while tasks.len() < workers && !self.is_interrupted() {
                let Some(id) = pending.next() else {
                    break;
                };
                let url = athlete_url(&self.base_url, id)?;
                let fetcher = self.fetcher.clone();
                tasks.spawn(async move { (id, fetch_athlete(&fetcher, &url, id).await) });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            done += 1;

            match joined {
                Ok((id, Ok(detail))) => {
                    tracing::debug!(
                        "Fetched athlete {} ({}) with {} events [{}/{}]",
                        id,
                        detail.record.used_name,
                        detail.events.len(),
                        done,
                        total
                    );
                    self.transition(SyncPhase::Accumulate)?;
                    self.counts.fetched += 1;
                    self.pending_athletes.push(detail.record);
                    self.pending_events.extend(detail.events);

                    let flush_every = self.config.crawler.flush_every;
                    if flush_every > 0 && self.pending_athletes.len() >= flush_every {
                        self.persist_pending()?;
                    }
                    self.transition(SyncPhase::FetchDetail)?;
                }
                Ok((id, Err(e))) => {
                    tracing::warn!("Skipping athlete {}: {}", id, e);
                    self.counts.failed += 1;
                }
                Err(e) => {
                    tracing::error!("Athlete fetch task failed: {}", e);
                    self.counts.failed += 1;
                }
            }

            if done % 50 == 0 {
                tracing::info!("Progress: {}/{} profiles processed", done, total);
            }
        }

        if self.is_interrupted() {
            tracing::warn!(
                "Interrupted with {} athletes not yet fetched",
                total - done
            );
        }

        Ok(())
    }

    /// Writes the accumulated batch: athletes first, then their events
    ///
    /// A failed batch is retried in full up to `persist-retries` times. If it
    /// still fails the batch is dropped and the pass aborts; earlier batches
    /// stay committed.
    fn persist_pending(&mut self) -> Result<(), SyncError> {
        self.transition(SyncPhase::PersistBatch)?;
        if self.pending_athletes.is_empty() {
            return Ok(());
        }

        let mut athletes = std::mem::take(&mut self.pending_athletes);
        let mut events = std::mem::take(&mut self.pending_events);
        athletes.sort_by_key(|a| a.athlete_id);
        events.sort_by_key(|e| e.athlete_id);

        let mut retry = 0;
        loop {
            match self.storage.persist_batch(&athletes, &events) {
                Ok((_, inserted)) => {
                    self.counts.persisted += athletes.len() as u64;
                    self.events_inserted += inserted;
                    tracing::info!(
                        "Persisted {} athletes and {} events",
                        athletes.len(),
                        inserted
                    );
                    return Ok(());
                }
                Err(e) if retry < self.config.crawler.persist_retries => {
                    retry += 1;
                    tracing::warn!("Persisting batch failed ({}), retry {}", e, retry);
                }
                Err(e) => {
                    tracing::error!(
                        "Dropping batch of {} athletes after {} retries",
                        athletes.len(),
                        retry
                    );
                    return Err(e.into());
                }
            }
        }
    }

    /// Flushes what was accumulated and moves to `Aborted`
    fn abort(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        if let Err(e) = self.persist_pending() {
            tracing::error!("Flushing before abort failed: {}", e);
        }
        self.phase = SyncPhase::Aborted;
    }

    fn transition(&mut self, next: SyncPhase) -> Result<(), SyncError> {
        if !self.phase.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        if self.phase != next {
            tracing::trace!("Phase {} -> {}", self.phase, next);
        }
        self.phase = next;
        Ok(())
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

async fn fetch_athlete(
    fetcher: &Fetcher,
    url: &Url,
    athlete_id: AthleteId,
) -> Result<AthleteDetail, SyncError> {
    let page = fetcher.fetch(url.as_str()).await?;
    Ok(parse_athlete(&page.body, athlete_id)?)
}
