#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use recipebox::app::{build_router, AppState};
use recipebox::auth::models::AuthenticatedUser;
use recipebox::auth::verifier::JwtVerifier;
use recipebox::counters::{CounterSnapshot, CounterStore};
use recipebox::db::counter_repository::MongoCounterRepository;
use recipebox::db::memory::{InMemoryCounterRepository, InMemoryRecipeRepository};
use recipebox::db::repository::{MongoRecipeRepository, RecipeRepository};
use recipebox::storage::client::{InMemoryStorageClient, S3StorageClient, StorageClient};

pub const JWT_SECRET: &str = "test-secret";

/// Holds running containers and provides the Axum router for integration tests.
///
/// Containers are kept alive for as long as this struct lives. When dropped,
/// containers are stopped and cleaned up automatically.
pub struct TestEnv {
    _mongo: Option<ContainerAsync<Mongo>>,
    _minio: Option<ContainerAsync<MinIO>>,
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<dyn StorageClient>,
    verifier: JwtVerifier,
}

impl TestEnv {
    /// Spin up MongoDB and MinIO and build a router wired to them.
    pub async fn start() -> Self {
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("recipebox_test");

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");
        let minio_endpoint = format!("http://127.0.0.1:{}", minio_port);

        // Set env vars for AWS SDK to pick up MinIO credentials
        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "minioadmin");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "minioadmin");
            std::env::set_var("AWS_REGION", "us-east-1");
        }

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&minio_endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .load()
            .await;
        let s3_client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );

        let bucket_name = "recipebox-test";
        let _ = s3_client.create_bucket().bucket(bucket_name).send().await;

        Self::assemble(
            Arc::new(MongoRecipeRepository::new(&mongo_db)),
            CounterStore::new(Arc::new(MongoCounterRepository::new(&mongo_db))),
            Arc::new(S3StorageClient::new(s3_client, bucket_name.to_string())),
            Some(mongo_container),
            Some(minio_container),
        )
    }

    /// Same wiring over the in-memory backend; no containers needed.
    pub fn in_memory() -> Self {
        Self::assemble(
            Arc::new(InMemoryRecipeRepository::new()),
            CounterStore::new(Arc::new(InMemoryCounterRepository::new())),
            Arc::new(InMemoryStorageClient::new()),
            None,
            None,
        )
    }

    fn assemble(
        recipes: Arc<dyn RecipeRepository>,
        counters: CounterStore,
        storage: Arc<dyn StorageClient>,
        mongo: Option<ContainerAsync<Mongo>>,
        minio: Option<ContainerAsync<MinIO>>,
    ) -> Self {
        let (state, _worker) = AppState::with_lifecycle(
            recipes,
            counters,
            storage.clone(),
            Arc::new(JwtVerifier::new(JWT_SECRET)),
        );

        Self {
            _mongo: mongo,
            _minio: minio,
            router: build_router(state.clone()),
            state,
            storage,
            verifier: JwtVerifier::new(JWT_SECRET),
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(self.router.clone())
    }

    /// A valid bearer token for a test user.
    pub fn token(&self) -> String {
        self.verifier
            .issue(
                &AuthenticatedUser {
                    user_id: "uid-test".to_string(),
                    email: Some("cook@example.com".to_string()),
                },
                chrono::Duration::minutes(30),
            )
            .expect("Failed to sign test token")
    }

    /// Helper: create a recipe through the API and return its id.
    pub async fn create_recipe(
        &self,
        server: &axum_test::TestServer,
        name: &str,
        serves: u32,
        is_published: bool,
    ) -> String {
        let response = server
            .post("/api/v1/recipes")
            .authorization_bearer(self.token())
            .json(&recipe_json(name, serves, is_published))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        body["id"]
            .as_str()
            .expect("Response should contain id")
            .to_string()
    }

    /// Helper: wait until the lifecycle worker has brought the counters to
    /// `expected`. Counter updates run after the response is sent.
    pub async fn wait_for_counters(&self, expected: CounterSnapshot) {
        let mut last = None;
        for _ in 0..100 {
            let current = self
                .state
                .counters
                .snapshot()
                .await
                .expect("Failed to read counters");
            if current == expected {
                return;
            }
            last = Some(current);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("Counters never reached {:?}, last seen {:?}", expected, last);
    }
}

/// A valid create/replace payload.
pub fn recipe_json(name: &str, serves: u32, is_published: bool) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "category": "vegetables",
        "directions": "Chop everything and roast until golden.",
        "serves": serves,
        "totalTime": 45,
        "publishDate": 1_700_000_000,
        "isPublished": is_published,
        "ingredients": [
            { "amount": "1", "unit": "kg", "name": "potatoes" }
        ],
        "imageUrl": format!("/api/v1/images/{name}.png"),
    })
}
