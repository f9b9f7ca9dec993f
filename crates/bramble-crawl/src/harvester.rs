//! Composed harvest flows over one session and one storage router.
//!
//! The harvester owns the scoped resources for a run: the session manager
//! (and through it the only live transport handle), the storage router,
//! and the cancellation token the run loop observes. `run` is the
//! guaranteed-close entry point — whatever way the work ends, the session
//! is persisted and released before it returns.

use crate::engine::{CrawlEngine, CrawlPolicy, WalkEnd, WalkReport};
use crate::error::Result;
use crate::extract::{
    ForumIndexExtractor, MemberProfileExtractor, PrintViewExtractor, TopicListExtractor,
};
use crate::urls;
use bramble_core::config::{AppConfig, OutputMode};
use bramble_core::{collections, Record};
use bramble_session::SessionManager;
use bramble_store::{Database, StorageRouter};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// What a run should harvest.
#[derive(Debug, Clone)]
pub enum Task {
    /// One thread by URL
    Thread {
        url: String,
        start: u64,
        stop: Option<u64>,
    },
    /// Member profiles by UID enumeration
    Members { start: u64, stop: Option<u64> },
    /// Forum discovery with nested topic and thread walks
    Forums { limit_pages: Option<u64> },
    /// Members first, then the full forum traversal
    All {
        member_stop: Option<u64>,
        limit_pages: Option<u64>,
    },
}

/// Outcome of a full run.
#[derive(Debug)]
pub struct RunReport {
    pub pages_fetched: u64,
    pub records_stored: u64,
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// Scoped owner of the session, router and cancellation token for a run.
pub struct Harvester {
    session: SessionManager,
    router: StorageRouter,
    base: Url,
    delay: Duration,
    topic_page_size: u64,
    post_page_step: u64,
    cancel: CancellationToken,
}

impl Harvester {
    /// Build a harvester over a started session, wiring the storage
    /// backend from configuration.
    pub async fn new(config: &AppConfig, session: SessionManager) -> Result<Self> {
        let router = match config.storage.mode {
            OutputMode::Database => {
                let database = Database::connect(&config.storage.database_url).await?;
                database.run_migrations().await?;
                StorageRouter::with_database(database, config.storage.output_dir.clone())
            }
            OutputMode::File => StorageRouter::file_only(config.storage.output_dir.clone()),
        };

        Ok(Self {
            session,
            router,
            base: Url::parse(&config.site.base_url)?,
            delay: Duration::from_millis(config.crawl.delay_ms),
            topic_page_size: config.crawl.topic_page_size,
            post_page_step: config.crawl.post_page_step,
            cancel: CancellationToken::new(),
        })
    }

    /// Start a browser-transport session and build a harvester over it.
    pub async fn launch_browser(config: &AppConfig) -> Result<Self> {
        let session = SessionManager::start_browser(config).await?;
        Self::new(config, session).await
    }

    /// Start a plain-HTTP session and build a harvester over it.
    pub async fn launch_http(config: &AppConfig) -> Result<Self> {
        let session = SessionManager::start_http(config).await?;
        Self::new(config, session).await
    }

    /// Token an embedder can use to request a cooperative stop.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run a task to completion with interrupt handling and the
    /// guaranteed close path, consuming the harvester.
    pub async fn run(mut self, task: Task) -> RunReport {
        let started = Instant::now();

        let cancel = self.cancel.clone();
        let interrupt_watch = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received; unwinding after the current fetch");
                cancel.cancel();
            }
        });

        if !self.session.ensure_authenticated(false).await {
            tracing::warn!("Session is not authenticated; protected pages may fail");
        }

        let (pages, records) = match task {
            Task::Thread { url, start, stop } => {
                let report = self.harvest_thread(&url, start, stop).await;
                (report.pages, report.records_stored)
            }
            Task::Members { start, stop } => {
                let report = self.harvest_members(start, stop).await;
                (report.pages, report.records_stored)
            }
            Task::Forums { limit_pages } => self.harvest_forums(limit_pages).await,
            Task::All {
                member_stop,
                limit_pages,
            } => {
                let members = self.harvest_members(1, member_stop).await;
                let (forum_pages, forum_records) = self.harvest_forums(limit_pages).await;
                (members.pages + forum_pages, members.records_stored + forum_records)
            }
        };

        interrupt_watch.abort();
        let interrupted = self.cancel.is_cancelled();

        // Guaranteed close: persist credentials, release the browser and
        // the database pool no matter how the work ended.
        self.session.close().await;
        self.router.close().await;

        let report = RunReport {
            pages_fetched: pages,
            records_stored: records,
            interrupted,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            "Run finished in {:.2?}: {} records from {} pages{}",
            report.elapsed,
            report.records_stored,
            report.pages_fetched,
            if report.interrupted { " (interrupted)" } else { "" }
        );
        report
    }

    /// Walk one thread's print view.
    pub async fn harvest_thread(
        &mut self,
        topic_url: &str,
        start: u64,
        stop: Option<u64>,
    ) -> WalkReport {
        let Some(print_url) = urls::ensure_print_view(&self.base, topic_url) else {
            tracing::error!("Could not derive a print view from {}", topic_url);
            return WalkReport {
                pages: 0,
                records_stored: 0,
                end: WalkEnd::TransportFailure,
                records: Vec::new(),
            };
        };

        let mut context = Record::new();
        if let Some(forum_id) = urls::query_param_int(&self.base, topic_url, "f") {
            context.insert("forum_id".to_string(), json!(forum_id));
        }
        if let Some(topic_id) = urls::query_param_int(&self.base, topic_url, "t") {
            context.insert("topic_id".to_string(), json!(topic_id));
        }

        self.walk_print_view(&print_url, context, start, stop).await
    }

    /// Walk member profiles from `start` to the inclusive `stop` UID.
    pub async fn harvest_members(&mut self, start: u64, stop: Option<u64>) -> WalkReport {
        tracing::info!("Harvesting members from UID {} (stop: {:?})", start, stop);

        let base = self.base.clone();
        let policy = CrawlPolicy {
            start,
            step: 1,
            stop,
            delay: self.delay,
            tag_offsets: false,
        };

        CrawlEngine::new(&mut self.session, &self.router)
            .with_cancellation(self.cancel.clone())
            .walk(
                collections::MEMBERS,
                &Record::new(),
                policy,
                &move |cursor| urls::profile_url(&base, cursor.offset),
                &MemberProfileExtractor,
            )
            .await
    }

    /// Discover forums, walk each forum's topic listing, and nest a
    /// thread walk for every newly seen topic.
    ///
    /// Returns (pages fetched, records stored) across the whole traversal.
    pub async fn harvest_forums(&mut self, limit_pages: Option<u64>) -> (u64, u64) {
        let mut pages = 0u64;
        let mut records = 0u64;

        let forums = self.discover_forums().await;
        if !forums.is_empty() {
            pages += 1;
            records += forums.len() as u64;
        }

        for forum in forums {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(forum_id) = forum.get("forum_id").and_then(serde_json::Value::as_i64) else {
                continue;
            };
            let forum_name = forum
                .get("forum_name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("?");
            tracing::info!("Harvesting forum {} ({})", forum_id, forum_name);

            let (forum_pages, forum_records) = self.harvest_forum(forum_id, limit_pages).await;
            pages += forum_pages;
            records += forum_records;
        }

        (pages, records)
    }

    /// Close the session and router without running a task.
    pub async fn shutdown(mut self) {
        self.session.close().await;
        self.router.close().await;
    }

    async fn walk_print_view(
        &mut self,
        print_url: &str,
        context: Record,
        start: u64,
        stop: Option<u64>,
    ) -> WalkReport {
        let policy = CrawlPolicy {
            start,
            step: self.post_page_step,
            stop,
            delay: self.delay,
            tag_offsets: true,
        };

        let print_url = print_url.to_string();
        CrawlEngine::new(&mut self.session, &self.router)
            .with_cancellation(self.cancel.clone())
            .walk(
                collections::THREAD_POSTS,
                &context,
                policy,
                &move |cursor| urls::with_offset(&print_url, cursor.offset),
                &PrintViewExtractor,
            )
            .await
    }

    /// Fetch the site index once and store the discovered forums.
    async fn discover_forums(&mut self) -> Vec<Record> {
        let index = urls::index_url(&self.base);
        let policy = CrawlPolicy {
            start: 0,
            step: 0, // single page
            stop: None,
            delay: self.delay,
            tag_offsets: false,
        };

        let base = self.base.clone();
        let report = CrawlEngine::new(&mut self.session, &self.router)
            .with_cancellation(self.cancel.clone())
            .walk(
                collections::FORUMS,
                &Record::new(),
                policy,
                &move |_cursor| index.clone(),
                &ForumIndexExtractor::new(base),
            )
            .await;

        tracing::info!("Discovered {} forums", report.records.len());
        report.records
    }

    async fn harvest_forum(&mut self, forum_id: i64, limit_pages: Option<u64>) -> (u64, u64) {
        let mut context = Record::new();
        context.insert("forum_id".to_string(), json!(forum_id));

        // limit_pages counts listing pages; the stop offset is the first
        // offset of the last allowed page
        let stop = limit_pages.map(|n| n.saturating_sub(1) * self.topic_page_size);
        let policy = CrawlPolicy {
            start: 0,
            step: self.topic_page_size,
            stop,
            delay: self.delay,
            tag_offsets: false,
        };

        let base = self.base.clone();
        let listing = CrawlEngine::new(&mut self.session, &self.router)
            .with_cancellation(self.cancel.clone())
            .walk(
                collections::FORUM_TOPICS,
                &context,
                policy,
                &move |cursor| urls::forum_page_url(&base, forum_id, cursor.offset),
                &TopicListExtractor::new(self.base.clone()),
            )
            .await;

        let mut pages = listing.pages;
        let mut records = listing.records_stored;

        // Nested thread walks share the session and router but keep their
        // own cursors and signatures. Sticky topics repeat on every
        // listing page; walk each topic once.
        let mut seen: std::collections::HashSet<i64> = std::collections::HashSet::new();
        for topic in listing.records {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(topic_id) = topic.get("topic_id").and_then(serde_json::Value::as_i64) else {
                continue;
            };
            if !seen.insert(topic_id) {
                continue;
            }

            let topic_title = topic.get("topic_title").cloned();
            tracing::info!(
                "Harvesting topic {} ({})",
                topic_id,
                topic_title
                    .as_ref()
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("?")
            );

            let topic_view = urls::topic_url(&self.base, forum_id, topic_id);
            let Some(print_url) = urls::ensure_print_view(&self.base, &topic_view) else {
                continue;
            };

            let mut thread_context = Record::new();
            thread_context.insert("forum_id".to_string(), json!(forum_id));
            thread_context.insert("topic_id".to_string(), json!(topic_id));
            if let Some(title) = topic_title {
                thread_context.insert("topic_title".to_string(), title);
            }

            let thread = self.walk_print_view(&print_url, thread_context, 0, None).await;
            pages += thread.pages;
            records += thread.records_stored;
        }

        (pages, records)
    }
}
