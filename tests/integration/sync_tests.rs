//! Integration tests for the sync pass
//!
//! These tests use wiremock to stand in for the results site and a temporary
//! SQLite file for the store, and drive full passes end-to-end.

use olympedia_sync::config::{Config, CrawlerConfig, OutputConfig, SourceConfig, UserAgentConfig};
use olympedia_sync::crawler::{sync, SyncOptions};
use olympedia_sync::storage::{open_storage, RunStatus, SqliteStorage, Storage};
use olympedia_sync::SyncPhase;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, db_path: &Path) -> Config {
    Config {
        source: SourceConfig {
            base_url: base_url.to_string(),
            country_code: "IND".to_string(),
        },
        crawler: CrawlerConfig {
            request_delay_ms: 0,
            request_timeout_secs: 5,
            max_retries: 1,
            retry_backoff_ms: 1,
            ..CrawlerConfig::default()
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestSync".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: db_path.to_string_lossy().into_owned(),
        },
    }
}

/// One result row: (games, event, pos, medal)
type Row<'a> = (&'a str, &'a str, &'a str, &'a str);

fn profile_page(name: &str, medals: Option<(u32, u32, u32)>, rows: &[Row<'_>]) -> String {
    let medal_table = medals
        .map(|(gold, silver, bronze)| {
            format!(
                r#"<table class="medals-OG">
                    <tr><th>Gold</th><td>{}</td></tr>
                    <tr><th>Silver</th><td>{}</td></tr>
                    <tr><th>Bronze</th><td>{}</td></tr>
                    <tr><th>Total</th><td>{}</td></tr>
                </table>"#,
                gold,
                silver,
                bronze,
                gold + silver + bronze
            )
        })
        .unwrap_or_default();

    let result_rows: String = rows
        .iter()
        .map(|(games, event, pos, medal)| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>IND</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                games, event, pos, medal, name
            )
        })
        .collect();

    format!(
        r#"<html><body>
        <h1>{name}</h1>
        <table class="biodata">
            <tr><th>Roles</th><td>Competed in Olympic Games</td></tr>
            <tr><th>Sex</th><td>Female</td></tr>
            <tr><th>Used name</th><td>{name}</td></tr>
            <tr><th>NOC</th><td><a href="/countries/IND">India</a></td></tr>
        </table>
        {medal_table}
        <h2>Results</h2>
        <table class="table">
            <thead><tr><th>Games</th><th>Event</th><th>Team</th><th>Pos</th><th>Medal</th><th>As</th></tr></thead>
            <tbody>{result_rows}</tbody>
        </table>
        </body></html>"#
    )
}

fn simple_profile(id: u32) -> String {
    let pos = id.to_string();
    profile_page(
        &format!("Athlete {}", id),
        None,
        &[("2020 Summer Olympics", "Athletics", pos.as_str(), "")],
    )
}

/// Mounts a country page linking the given editions
async fn mount_country(server: &MockServer, edition_ids: &[u32]) {
    let edition_links: String = edition_ids
        .iter()
        .map(|id| format!(r#"<a href="/countries/IND/editions/{}">Edition</a>"#, id))
        .collect();
    Mock::given(method("GET"))
        .and(path("/countries/IND"))
        .respond_with(ResponseTemplate::new(200).set_body_string(edition_links))
        .mount(server)
        .await;
}

/// Mounts one edition page listing the given athletes
async fn mount_edition(server: &MockServer, edition_id: u32, athletes: &[u32]) {
    let links: String = athletes
        .iter()
        .map(|id| format!(r#"<tr><td><a href="/athletes/{}">Athlete</a></td></tr>"#, id))
        .collect();
    Mock::given(method("GET"))
        .and(path(format!("/countries/IND/editions/{}", edition_id)))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(format!("<table>{}</table>", links)),
        )
        .mount(server)
        .await;
}

/// Mounts a country page with the given editions and each edition's athletes
async fn mount_listings(server: &MockServer, editions: &[(u32, Vec<u32>)]) {
    let edition_ids: Vec<u32> = editions.iter().map(|(id, _)| *id).collect();
    mount_country(server, &edition_ids).await;
    for (edition_id, athletes) in editions {
        mount_edition(server, *edition_id, athletes).await;
    }
}

async fn mount_profile(server: &MockServer, id: u32, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/athletes/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

fn open(db_path: &Path) -> SqliteStorage {
    open_storage(db_path).unwrap()
}

#[tokio::test]
async fn test_full_pass_persists_athletes_and_events() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    // Athlete 2 appears in both editions
    mount_listings(&server, &[(5, vec![1, 2]), (61, vec![2, 3])]).await;
    mount_profile(
        &server,
        1,
        profile_page(
            "P·V· Sindhu",
            Some((0, 1, 1)),
            &[
                ("2016 Summer Olympics", "Badminton", "2", "Silver"),
                ("2020 Summer Olympics", "Badminton", "3", "Bronze"),
            ],
        ),
        1,
    )
    .await;
    mount_profile(&server, 2, simple_profile(2), 1).await;
    mount_profile(&server, 3, simple_profile(3), 1).await;

    let summary = sync(
        create_test_config(&server.uri(), &db_path),
        "hash".to_string(),
        SyncOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.phase, SyncPhase::Done);
    assert_eq!(summary.editions, 2);
    assert_eq!(summary.counts.discovered, 3);
    assert_eq!(summary.counts.skipped_known, 0);
    assert_eq!(summary.counts.fetched, 3);
    assert_eq!(summary.counts.failed, 0);
    assert_eq!(summary.counts.persisted, 3);
    assert_eq!(summary.events_inserted, 4);

    let storage = open(&db_path);
    let sindhu = storage.get_athlete(1).unwrap().unwrap();
    assert_eq!(sindhu.record.used_name, "P V Sindhu");
    assert_eq!(sindhu.record.nationality, "India");
    assert_eq!(
        serde_json::to_string(&sindhu.record.medals_og).unwrap(),
        r#"{"Gold":0,"Silver":1,"Bronze":1,"Total":2}"#
    );
    assert_eq!(sindhu.disciplines.as_deref(), Some("Badminton"));
    assert_eq!(
        sindhu.events.as_deref(),
        Some("2016 Summer Olympics — Badminton [2] [Silver] | 2020 Summer Olympics — Badminton [3] [Bronze]")
    );

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "hash");
    assert_eq!(run.counts, summary.counts);
}

#[tokio::test]
async fn test_second_pass_fetches_nothing_and_changes_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    mount_listings(&server, &[(5, vec![1, 2, 3])]).await;
    for id in [1, 2, 3] {
        // One fetch across both passes
        mount_profile(&server, id, simple_profile(id), 1).await;
    }

    let config = create_test_config(&server.uri(), &db_path);
    let first = sync(config.clone(), "hash".to_string(), SyncOptions::default())
        .await
        .unwrap();
    let after_first = {
        let storage = open(&db_path);
        (
            storage.count_athletes().unwrap(),
            storage.count_events().unwrap(),
            storage.get_athlete(2).unwrap(),
        )
    };

    let second = sync(config, "hash".to_string(), SyncOptions::default())
        .await
        .unwrap();
    let after_second = {
        let storage = open(&db_path);
        (
            storage.count_athletes().unwrap(),
            storage.count_events().unwrap(),
            storage.get_athlete(2).unwrap(),
        )
    };

    assert_eq!(first.counts.fetched, 3);
    assert_eq!(second.counts.discovered, 3);
    assert_eq!(second.counts.skipped_known, 3);
    assert_eq!(second.counts.fetched, 0);
    assert_eq!(second.counts.persisted, 0);
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_failed_profile_does_not_block_the_rest() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    let ids: Vec<u32> = (1..=6).collect();
    mount_listings(&server, &[(5, ids.clone())]).await;
    for id in [1, 2, 4, 5, 6] {
        mount_profile(&server, id, simple_profile(id), 1).await;
    }
    // First attempt plus one retry
    Mock::given(method("GET"))
        .and(path("/athletes/3"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), &db_path);
    let summary = sync(config, "hash".to_string(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.counts.fetched, 5);
    assert_eq!(summary.counts.failed, 1);
    assert_eq!(summary.counts.persisted, 5);

    let storage = open(&db_path);
    let mut known: Vec<u32> = storage.known_athlete_ids().unwrap().into_iter().collect();
    known.sort_unstable();
    assert_eq!(known, vec![1, 2, 4, 5, 6]);
}

#[tokio::test]
async fn test_rerun_after_failure_fetches_only_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    let broken = MockServer::start().await;
    mount_listings(&broken, &[(5, vec![1, 2])]).await;
    mount_profile(&broken, 1, simple_profile(1), 1).await;
    Mock::given(method("GET"))
        .and(path("/athletes/2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&broken)
        .await;
    sync(
        create_test_config(&broken.uri(), &db_path),
        "hash".to_string(),
        SyncOptions::default(),
    )
    .await
    .unwrap();

    let healthy = MockServer::start().await;
    mount_listings(&healthy, &[(5, vec![1, 2])]).await;
    mount_profile(&healthy, 1, simple_profile(1), 0).await;
    mount_profile(&healthy, 2, simple_profile(2), 1).await;
    let summary = sync(
        create_test_config(&healthy.uri(), &db_path),
        "hash".to_string(),
        SyncOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.counts.skipped_known, 1);
    assert_eq!(summary.counts.fetched, 1);
    assert_eq!(open(&db_path).count_athletes().unwrap(), 2);
}

#[tokio::test]
async fn test_rollup_orders_events_by_games() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    mount_listings(&server, &[(5, vec![10])]).await;
    mount_profile(
        &server,
        10,
        profile_page(
            "Runner",
            Some((1, 0, 0)),
            &[
                ("2016 Summer", "Athletics", "1", "Gold"),
                ("2012 Summer", "Athletics", "5", ""),
            ],
        ),
        1,
    )
    .await;

    sync(
        create_test_config(&server.uri(), &db_path),
        "hash".to_string(),
        SyncOptions::default(),
    )
    .await
    .unwrap();

    let athlete = open(&db_path).get_athlete(10).unwrap().unwrap();
    assert_eq!(athlete.disciplines.as_deref(), Some("Athletics"));
    assert_eq!(
        athlete.events.as_deref(),
        Some("2012 Summer — Athletics [5] | 2016 Summer — Athletics [1] [Gold]")
    );
}

#[tokio::test]
async fn test_edition_failure_and_non_profile_are_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    mount_country(&server, &[5, 9]).await;
    mount_edition(&server, 5, &[1, 2]).await;
    Mock::given(method("GET"))
        .and(path("/countries/IND/editions/9"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_profile(&server, 1, simple_profile(1), 1).await;
    mount_profile(
        &server,
        2,
        "<html><body><h1>Page not found</h1></body></html>".to_string(),
        1,
    )
    .await;

    let summary = sync(
        create_test_config(&server.uri(), &db_path),
        "hash".to_string(),
        SyncOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.editions, 2);
    assert_eq!(summary.failed_editions, 1);
    assert_eq!(summary.counts.fetched, 1);
    assert_eq!(summary.counts.failed, 1);
    assert!(open(&db_path).get_athlete(2).unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_workers_fetch_each_athlete_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    let ids: Vec<u32> = (100..112).collect();
    // Overlapping editions list the same athletes
    mount_listings(&server, &[(1, ids[..8].to_vec()), (2, ids[4..].to_vec())]).await;
    for id in &ids {
        mount_profile(&server, *id, simple_profile(*id), 1).await;
    }

    let mut config = create_test_config(&server.uri(), &db_path);
    config.crawler.max_concurrent_fetches = 4;
    config.crawler.flush_every = 5;

    let summary = sync(config, "hash".to_string(), SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.counts.discovered, 12);
    assert_eq!(summary.counts.fetched, 12);
    assert_eq!(summary.counts.persisted, 12);
    assert_eq!(summary.events_inserted, 12);

    let storage = open(&db_path);
    assert_eq!(storage.count_athletes().unwrap(), 12);
    assert_eq!(storage.count_athletes_with_events().unwrap(), 12);
}

#[tokio::test]
async fn test_refresh_updates_without_duplicating_events() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    mount_listings(&server, &[(5, vec![7])]).await;
    // Fetched by the initial pass and again by the refresh
    mount_profile(
        &server,
        7,
        profile_page(
            "Shooter",
            Some((1, 0, 0)),
            &[("2008 Summer Olympics", "Shooting", "1", "Gold")],
        ),
        2,
    )
    .await;

    let config = create_test_config(&server.uri(), &db_path);
    sync(config.clone(), "hash".to_string(), SyncOptions::default())
        .await
        .unwrap();

    let options = SyncOptions {
        refresh: true,
        targets: Vec::new(),
    };
    let summary = sync(config, "hash".to_string(), options).await.unwrap();

    assert_eq!(summary.counts.skipped_known, 0);
    assert_eq!(summary.counts.fetched, 1);
    assert_eq!(summary.events_inserted, 0);

    let storage = open(&db_path);
    assert_eq!(storage.count_events().unwrap(), 1);
    assert_eq!(storage.count_medalists().unwrap(), 1);
}

#[tokio::test]
async fn test_empty_country_page_completes_with_nothing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("sync.db");

    Mock::given(method("GET"))
        .and(path("/countries/IND"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Redesigned</p>"))
        .mount(&server)
        .await;

    let summary = sync(
        create_test_config(&server.uri(), &db_path),
        "hash".to_string(),
        SyncOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.editions, 0);
    assert_eq!(summary.counts.discovered, 0);
    assert_eq!(open(&db_path).count_athletes().unwrap(), 0);
}
