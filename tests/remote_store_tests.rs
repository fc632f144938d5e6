//! Remote backend listing against a stub of the storage platform's REST API.
//! The real API lists one folder level per call with a per-request cap, so
//! the client has to paginate and descend into subfolders itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use media_vault::object_store::{ListOptions, ObjectStore, RemoteStore};

type Fixture = Arc<Vec<String>>;

#[derive(Deserialize)]
struct ListRequest {
    prefix: String,
    limit: u32,
    offset: u32,
}

/// One folder level of the fixture: direct files as entries with ids,
/// subfolders as entries without, sorted by name and sliced by limit/offset.
async fn list_handler(
    State(paths): State<Fixture>,
    Path(_bucket): Path<String>,
    Json(req): Json<ListRequest>,
) -> Json<Value> {
    let folder = req.prefix.trim_end_matches('/');
    let base = if folder.is_empty() {
        String::new()
    } else {
        format!("{folder}/")
    };

    let mut files = Vec::new();
    let mut dirs = BTreeSet::new();
    for path in paths.iter() {
        if let Some(rest) = path.strip_prefix(&base) {
            match rest.split_once('/') {
                None => files.push(rest.to_string()),
                Some((dir, _)) => {
                    dirs.insert(dir.to_string());
                }
            }
        }
    }

    let mut entries: Vec<Value> = dirs
        .into_iter()
        .map(|d| json!({ "name": d, "id": null }))
        .collect();
    for file in files {
        entries.push(json!({
            "name": file,
            "id": file,
            "metadata": { "size": 3, "mimetype": "image/png" },
        }));
    }
    entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

    let page: Vec<Value> = entries
        .into_iter()
        .skip(req.offset as usize)
        .take(req.limit as usize)
        .collect();
    Json(Value::Array(page))
}

async fn stub_store(paths: Vec<String>) -> RemoteStore {
    let app = Router::new()
        .route("/object/list/:bucket", post(list_handler))
        .with_state(Arc::new(paths));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    RemoteStore::new(&format!("http://{addr}"), "test-key").unwrap()
}

#[tokio::test]
async fn test_remote_list_descends_into_subfolders() {
    let store = stub_store(vec![
        "u1/raw/a.png".to_string(),
        "u1/raw/nested/b.png".to_string(),
        "u1/raw/nested/deep/c.png".to_string(),
        "u1/other/d.png".to_string(),
    ])
    .await;

    let listed = store
        .list("media", "u1/raw/", ListOptions::default())
        .await
        .unwrap();
    let paths: Vec<&str> = listed.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "u1/raw/a.png",
            "u1/raw/nested/b.png",
            "u1/raw/nested/deep/c.png",
        ]
    );
}

#[tokio::test]
async fn test_remote_list_paginates_past_the_request_cap() {
    // More objects than a single request can return.
    let paths: Vec<String> = (0..1203).map(|i| format!("u1/raw/f{i:04}.png")).collect();
    let store = stub_store(paths).await;

    let listed = store
        .list("media", "u1/raw/", ListOptions::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1203);
    assert_eq!(listed[0].path, "u1/raw/f0000.png");
    assert_eq!(listed[1202].path, "u1/raw/f1202.png");
}

#[tokio::test]
async fn test_remote_list_applies_limit_and_offset_after_the_walk() {
    let paths: Vec<String> = (0..20).map(|i| format!("u1/raw/f{i:02}.png")).collect();
    let store = stub_store(paths).await;

    let listed = store
        .list(
            "media",
            "u1/raw/",
            ListOptions {
                limit: Some(5),
                offset: Some(10),
            },
        )
        .await
        .unwrap();
    let got: Vec<&str> = listed.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(
        got,
        vec![
            "u1/raw/f10.png",
            "u1/raw/f11.png",
            "u1/raw/f12.png",
            "u1/raw/f13.png",
            "u1/raw/f14.png",
        ]
    );
}
