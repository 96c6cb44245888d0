//! Drives the router in-process, one request at a time.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use vote_server::api::{self, AppState, ResultRow, TallyResponse};
use vote_server::backend::Tallies;
use vote_server::seed;

/// A seeded server over a scratch static folder and database.
struct TestApp {
    _files: tempfile::TempDir,
    _db: tempfile::TempDir,
    tallies: Arc<Tallies>,
    router: Router,
}

impl TestApp {
    fn spawn(files: &[&str], dual_ledger: bool) -> Result<Self> {
        Self::build(files, dual_ledger, None)
    }

    /// Like `spawn`, but starts with a cached key count of `size_hint`
    /// instead of the real one.
    fn with_size_hint(files: &[&str], size_hint: u64) -> Result<Self> {
        Self::build(files, false, Some(size_hint))
    }

    fn build(files: &[&str], dual_ledger: bool, size_hint: Option<u64>) -> Result<Self> {
        let static_dir = tempfile::tempdir()?;
        for file in files {
            let path = static_dir.path().join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, file.as_bytes())?;
        }

        let db = tempfile::tempdir()?;
        let tallies = Tallies::open(&db.path().join("votes.db"), dual_ledger)?;
        seed::seed(static_dir.path(), &tallies)?;
        let size = match size_hint {
            Some(hint) => hint,
            None => tallies.repository().count()?,
        };

        let tallies = Arc::new(tallies);
        let router = api::router(AppState::new(Arc::clone(&tallies), size), static_dir.path());
        Ok(Self {
            _files: static_dir,
            _db: db,
            tallies,
            router,
        })
    }

    fn empty() -> Result<Self> {
        Self::spawn(&[], false)
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Vec<u8>)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, body.to_vec()))
    }

    async fn get(&self, uri: &str) -> Result<(StatusCode, Vec<u8>)> {
        self.send(Request::get(uri).body(Body::empty())?).await
    }

    async fn post_vote(&self, route: &str, key: &str, vote: &str) -> Result<(StatusCode, Vec<u8>)> {
        let body = serde_json::json!({ "Key": key, "Vote": vote }).to_string();
        let request = Request::post(route)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        self.send(request).await
    }
}

#[tokio::test]
async fn votes_move_tallies() -> Result<()> {
    let app = TestApp::spawn(&["a.png", "b.png"], false)?;

    for _ in 0..2 {
        let (status, _) = app.post_vote("/api/vote/", "static/a.png", "true").await?;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = app.post_vote("/api/vote/", "static/b.png", "false").await?;
    assert_eq!(status, StatusCode::OK);
    let reply: TallyResponse = serde_json::from_slice(&body)?;
    assert_eq!(
        reply,
        TallyResponse {
            key: "static/b.png".into(),
            tally: -1
        }
    );

    let (status, body) = app.get("/api/tally/?key=static/a.png").await?;
    assert_eq!(status, StatusCode::OK);
    let reply: TallyResponse = serde_json::from_slice(&body)?;
    assert_eq!(reply.tally, 2);

    let (status, body) = app.get("/api/minkey/").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"static/b.png");
    Ok(())
}

#[tokio::test]
async fn unvote_reverses_a_vote() -> Result<()> {
    let app = TestApp::spawn(&["a.png"], false)?;

    app.post_vote("/api/vote/", "static/a.png", "true").await?;
    let (status, body) = app.post_vote("/api/unvote/", "static/a.png", "true").await?;
    assert_eq!(status, StatusCode::OK);
    let reply: TallyResponse = serde_json::from_slice(&body)?;
    assert_eq!(reply.tally, 0);
    Ok(())
}

#[tokio::test]
async fn dual_mode_unvote_needs_a_prior_vote() -> Result<()> {
    let app = TestApp::spawn(&["a.png"], true)?;

    let (status, _) = app.post_vote("/api/unvote/", "static/a.png", "true").await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.get("/api/tally/?key=static/a.png").await?;
    assert_eq!(status, StatusCode::OK);
    let reply: TallyResponse = serde_json::from_slice(&body)?;
    assert_eq!(reply.tally, 0);
    Ok(())
}

#[tokio::test]
async fn bad_vote_and_unknown_key() -> Result<()> {
    let app = TestApp::spawn(&["a.png"], false)?;

    let (status, _) = app.post_vote("/api/vote/", "static/a.png", "maybe").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post_vote("/api/vote/", "static/ghost.png", "true").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/tally/?key=static/ghost.png").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(app.tallies.repository().get("static/a.png")?, 0);
    Ok(())
}

#[tokio::test]
async fn getkey_returns_a_seeded_resource() -> Result<()> {
    let files = ["a.png", "b.png", "nested/c.png"];
    let app = TestApp::spawn(&files, false)?;

    for _ in 0..20 {
        let (status, body) = app.get("/api/getkey/").await?;
        assert_eq!(status, StatusCode::ACCEPTED);
        let key = String::from_utf8(body)?;
        assert!(
            ["static/a.png", "static/b.png", "static/nested/c.png"].contains(&key.as_str()),
            "unexpected key {key}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn getkey_recovers_from_a_stale_size_hint() -> Result<()> {
    // Cached count claims ten resources, only one exists.
    let app = TestApp::with_size_hint(&["a.png"], 10)?;

    for _ in 0..20 {
        let (status, body) = app.get("/api/getkey/").await?;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, b"static/a.png");
    }
    Ok(())
}

#[tokio::test]
async fn selection_on_empty_store_is_not_found() -> Result<()> {
    let app = TestApp::empty()?;

    let (status, _) = app.get("/api/getkey/").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/minkey/").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.get("/api/results/").await?;
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<ResultRow> = serde_json::from_slice(&body)?;
    assert!(rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn results_include_attempts_in_dual_mode() -> Result<()> {
    let app = TestApp::spawn(&["a.png", "b.png"], true)?;

    app.post_vote("/api/vote/", "static/a.png", "true").await?;
    app.post_vote("/api/vote/", "static/b.png", "false").await?;
    app.post_vote("/api/vote/", "static/b.png", "false").await?;

    let (status, body) = app.get("/api/results/").await?;
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<ResultRow> = serde_json::from_slice(&body)?;
    assert_eq!(
        rows,
        vec![
            ResultRow {
                key: "static/b.png".into(),
                tally: -2,
                attempts: Some(2)
            },
            ResultRow {
                key: "static/a.png".into(),
                tally: 1,
                attempts: Some(1)
            },
        ]
    );
    Ok(())
}

#[tokio::test]
async fn static_files_are_served_at_their_keys() -> Result<()> {
    let app = TestApp::spawn(&["nested/c.png"], false)?;

    let (status, body) = app.get("/static/nested/c.png").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"nested/c.png");

    let (status, _) = app.get("/static/missing.png").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
