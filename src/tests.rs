//! Integration tests for the blog API and the remote adapter.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::admin::{AdminConsole, SessionGate, View};
use crate::assets::{AssetUpload, FsAssetStore, UPLOAD_URL_PREFIX};
use crate::cli::{self, Command, OutputFormat, PageArgs, RemoteCommand};
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::errors::AppError;
use crate::models::{BlogInput, BlogPatch, ListQuery, Visibility, VisibilityFilter};
use crate::store::{BlogStore, KvFile, RemoteStore};
use crate::{create_router, AppState};

const TEST_KEY: &str = "test-api-key";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    psk: Option<String>,
    temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(TEST_KEY.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let upload_dir = temp_dir.path().join("uploads");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        let assets = Arc::new(FsAssetStore::new(upload_dir.clone(), UPLOAD_URL_PREFIX));

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            upload_dir,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            author: "Test Author".to_string(),
            ..Config::default()
        };

        let state = AppState {
            repo,
            assets,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = &psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            psk,
            temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn remote_store(&self) -> RemoteStore {
        RemoteStore::builder(self.base_url.clone())
            .api_key(self.psk.clone())
            .build()
            .unwrap()
    }

    async fn create(&self, body: Value) -> Value {
        let resp = self
            .client
            .post(self.url("/api/blogs"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }
}

fn input(title: &str) -> BlogInput {
    BlogInput {
        title: title.to_string(),
        body: "<p>Some words here</p>".to_string(),
        ..BlogInput::default()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
    assert!(fixture.remote_store().health().await.unwrap());
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::with_psk(Some("secret-key".to_string())).await;

    // Request without API key
    let resp = Client::new()
        .get(fixture.url("/api/blogs"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::with_psk(Some("correct-key".to_string())).await;

    // Request with wrong API key
    let resp = Client::new()
        .get(fixture.url("/api/blogs"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The remote adapter surfaces it as an auth failure
    let store = RemoteStore::builder(fixture.base_url.clone())
        .api_key(Some("wrong-key".to_string()))
        .build()
        .unwrap();
    let err = store.list(VisibilityFilter::All).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn test_auth_bearer_and_valid_psk() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/blogs").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let resp = Client::new()
        .get(fixture.url("/api/blogs"))
        .bearer_auth(TEST_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_psk_is_open() {
    let fixture = TestFixture::with_psk(None).await;

    let (status, _) = fixture.get_json("/api/blogs").await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_blog_crud() {
    let fixture = TestFixture::new().await;

    // Create
    let created = fixture
        .create(json!({
            "title": "Hello, World!",
            "body": "<p>First post</p>",
            "subtitle": "An introduction",
            "tags": ["intro", "intro", "meta"]
        }))
        .await;
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["slug"], "hello-world");
    assert_eq!(created["visibility"], "draft");
    assert_eq!(created["author"], "Test Author");
    assert_eq!(created["tags"], json!(["intro", "meta"]));
    assert_eq!(created["readTime"], 1);
    assert_eq!(created["createdAt"], created["updatedAt"]);

    // Get
    let (status, body) = fixture.get_json(&format!("/api/blogs/{}", id)).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["title"], "Hello, World!");

    // Update: absent fields are kept
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/blogs/{}", id)))
        .json(&json!({ "title": "Hello again", "visibility": "public" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["data"]["id"], id.as_str());
    assert_eq!(updated["data"]["slug"], "hello-again");
    assert_eq!(updated["data"]["subtitle"], "An introduction");
    assert_eq!(updated["data"]["visibility"], "public");
    assert_eq!(updated["data"]["createdAt"], created["createdAt"]);
    assert_ne!(updated["data"]["updatedAt"], created["updatedAt"]);

    // Delete
    let resp = fixture
        .client
        .delete(fixture.url(&format!("/api/blogs/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Verify deleted
    let (status, body) = fixture.get_json(&format!("/api/blogs/{}", id)).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_validation_errors() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/blogs"))
        .json(&json!({ "title": "", "body": "<p>Body</p>" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, list) = fixture.get_json("/api/blogs").await;
    assert_eq!(list["data"]["total"], 0);

    let created = fixture.create(json!({ "title": "T", "body": "B" })).await;
    let resp = fixture
        .client
        .put(fixture.url(&format!("/api/blogs/{}", created["id"].as_str().unwrap())))
        .json(&json!({ "body": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_missing_blog() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get_json("/api/blogs/nope").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let resp = fixture
        .client
        .put(fixture.url("/api/blogs/nope"))
        .json(&json!({ "title": "X" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = fixture
        .client
        .delete(fixture.url("/api/blogs/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_list_filter_search_and_paging() {
    let fixture = TestFixture::new().await;

    fixture
        .create(json!({ "title": "Learning Rust", "body": "b", "visibility": "public" }))
        .await;
    fixture
        .create(json!({ "title": "Cooking", "body": "b", "subtitle": "With rusty pans" }))
        .await;
    fixture
        .create(json!({ "title": "Travel 100%", "body": "b", "visibility": "private" }))
        .await;

    let (_, body) = fixture.get_json("/api/blogs").await;
    let titles: Vec<&str> = body["data"]["blogs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Travel 100%", "Cooking", "Learning Rust"]);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["limit"], 20);

    let (_, body) = fixture.get_json("/api/blogs?visibility=published").await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = fixture.get_json("/api/blogs?visibility=hidden").await;
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = fixture.get_json("/api/blogs?visibility=draft").await;
    assert_eq!(body["data"]["blogs"][0]["title"], "Cooking");

    let (_, body) = fixture.get_json("/api/blogs?search=RUST").await;
    assert_eq!(body["data"]["total"], 2);

    let (_, body) = fixture
        .get_json("/api/blogs?search=rust&visibility=hidden")
        .await;
    assert_eq!(body["data"]["total"], 1);

    // Wildcards match literally
    let (_, body) = fixture.get_json("/api/blogs?search=%25").await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = fixture.get_json("/api/blogs?limit=2&page=2").await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["blogs"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["blogs"][0]["title"], "Learning Rust");

    let (status, body) = fixture.get_json("/api/blogs?visibility=secret").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_by_tag_and_slug() {
    let fixture = TestFixture::new().await;

    fixture
        .create(json!({ "title": "Tagged Post", "body": "b", "tags": ["rust", "web"] }))
        .await;
    fixture
        .create(json!({ "title": "Other", "body": "b", "tags": ["Rust"] }))
        .await;

    let (_, body) = fixture.get_json("/api/blogs/tag/rust").await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["blogs"][0]["title"], "Tagged Post");

    let (status, body) = fixture.get_json("/api/blogs/tagged-post").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["title"], "Tagged Post");

    let store = fixture.remote_store();
    let page = store.by_tag("web", &ListQuery::default()).await.unwrap();
    assert_eq!(page.blogs.len(), 1);
    let found = store.get_by_slug("other").await.unwrap().unwrap();
    assert_eq!(found.tags, vec!["Rust".to_string()]);
    assert!(store.get_by_slug("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_endpoint() {
    let fixture = TestFixture::new().await;
    let bytes = vec![0x89, b'P', b'N', b'G', 1, 2, 3];

    let resp = fixture
        .client
        .post(fixture.url("/api/uploads?filename=banner.png"))
        .body(bytes.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let url = body["data"]["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/"));
    assert!(url.ends_with(".png"));

    // Stored files are served without the API key
    let served = Client::new().get(fixture.url(url)).send().await.unwrap();
    assert_eq!(served.status(), 200);
    assert_eq!(served.bytes().await.unwrap().to_vec(), bytes);

    let resp = fixture
        .client
        .post(fixture.url("/api/uploads?filename=notes.txt"))
        .body(vec![1, 2, 3])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_remote_store_lifecycle() {
    let fixture = TestFixture::new().await;
    let store = fixture.remote_store();

    let a = store.create(input("A")).await.unwrap();
    assert_eq!(a.slug, "a");
    let b = store.create(input("B")).await.unwrap();

    // Insertion order, oldest first
    let all = store.list(VisibilityFilter::All).await.unwrap();
    let ids: Vec<&str> = all.iter().map(|blog| blog.id.as_str()).collect();
    assert_eq!(ids, vec![a.id.as_str(), b.id.as_str()]);

    let patch = BlogPatch {
        title: Some("A2".to_string()),
        ..BlogPatch::default()
    };
    let a2 = store.update(&a.id, patch).await.unwrap();
    assert_eq!(a2.slug, "a2");
    assert_eq!(a2.created_at, a.created_at);
    assert!(a2.updated_at > a.updated_at);

    let published = store.set_visibility(&b.id, Visibility::Public).await.unwrap();
    assert_eq!(published.visibility, Visibility::Public);
    assert_eq!(store.recent(5).await.unwrap().len(), 1);
    assert_eq!(
        store.list(VisibilityFilter::Hidden).await.unwrap()[0].id,
        a.id
    );
    store.set_visibility(&b.id, Visibility::Draft).await.unwrap();

    let found = store
        .search("a2", &ListQuery::default())
        .await
        .unwrap();
    assert_eq!(found.total, 1);

    assert!(store.remove(&a.id).await.unwrap());
    assert!(store.remove(&b.id).await.unwrap());
    assert!(store.list(VisibilityFilter::All).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_store_missing_ids() {
    let fixture = TestFixture::new().await;
    let store = fixture.remote_store();

    assert!(!store.remove("missing").await.unwrap());
    assert!(store.get("missing").await.unwrap().is_none());
    let err = store
        .update("missing", BlogPatch::visibility(Visibility::Public))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_remote_store_unreachable() {
    // Nothing listens on the discard port
    let store = RemoteStore::builder("http://127.0.0.1:9").build().unwrap();
    let err = store.list(VisibilityFilter::All).await.unwrap_err();
    assert!(matches!(err, AppError::Transport(_)));
}

#[tokio::test]
async fn test_admin_console_over_remote_store() {
    let fixture = TestFixture::new().await;
    let remote = Arc::new(fixture.remote_store());
    let kv = KvFile::new(fixture.temp_dir.path().join("admin-store.json"));
    let mut console = AdminConsole::new(
        remote.clone(),
        remote,
        SessionGate::new(kv, "pw"),
        true,
    );

    console.login("pw").await.unwrap();

    let mut draft = console.new_draft().unwrap();
    draft.title = "Remote Post".to_string();
    draft.body = "<p>Over HTTP</p>".to_string();
    draft.add_tag("remote");
    assert!(console.create(&draft).await.is_err());

    draft
        .attach_banner(
            AssetUpload::new("banner.jpg", vec![0xff, 0xd8, 0xff]),
            console.uploader(),
        )
        .await
        .unwrap();
    let created = console.create(&draft).await.unwrap();
    assert_eq!(console.view(), View::Blogs);
    assert!(created.banner.is_some());

    let published = console.toggle_visibility(&created.id, true).await.unwrap();
    assert_eq!(published.visibility, Visibility::Public);

    let dashboard = console.dashboard().unwrap();
    assert_eq!(dashboard.stats.total, 1);
    assert_eq!(dashboard.stats.published, 1);
    assert_eq!(dashboard.recent[0].id, created.id);

    assert_eq!(console.list("remote", VisibilityFilter::All).unwrap().len(), 1);
    assert!(console.delete(&created.id).await.unwrap());
    assert!(console.blogs().is_empty());
}

#[tokio::test]
async fn test_cli_remote_queries() {
    let fixture = TestFixture::new().await;
    let store = fixture.remote_store();
    let mut post = input("Tagged Post");
    post.tags = vec!["rust".to_string()];
    store.create(post).await.unwrap();

    let config = Config {
        api_url: fixture.base_url.clone(),
        api_psk: Some(TEST_KEY.to_string()),
        ..Config::default()
    };
    let remote = |command| cli::run(Command::Remote { command }, OutputFormat::Json, &config);

    remote(RemoteCommand::Health).await.unwrap();
    remote(RemoteCommand::Tag {
        tag: "rust".to_string(),
        page: PageArgs::default(),
    })
    .await
    .unwrap();
    remote(RemoteCommand::Slug {
        slug: "tagged-post".to_string(),
    })
    .await
    .unwrap();
    let err = remote(RemoteCommand::Slug {
        slug: "missing".to_string(),
    })
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let unauthorized = Config {
        api_psk: None,
        ..config.clone()
    };
    let err = cli::run(
        Command::Remote {
            command: RemoteCommand::Recent { limit: 5 },
        },
        OutputFormat::Text,
        &unauthorized,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}
