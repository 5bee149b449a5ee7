#[cfg(test)]
pub mod test_utils {
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum_test::TestServer;
    use migration::{Migrator, MigratorTrait};
    use model::entities::user;
    use sea_orm::{Database, DatabaseConnection};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Create AppState for testing
    pub async fn setup_test_app_state() -> AppState {
        let db = setup_test_db().await;
        AppState { db }
    }

    /// Create a user directly through the model layer, bypassing the API
    pub async fn create_test_user(
        state: &AppState,
        username: &str,
        email: &str,
        password: &str,
    ) -> user::Model {
        user::Entity::signup(&state.db, username, email, password, None)
            .await
            .expect("Failed to create test user")
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr) // Output to stderr, which is captured by tests
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create an axum test server over a fresh database.
    ///
    /// Cookies are saved across requests so the session survives between
    /// login and subsequent calls, the way a browser would behave.
    pub async fn setup_test_server() -> (TestServer, AppState) {
        let _ = init_test_tracing();

        let state = setup_test_app_state().await;
        let router = create_router(state.clone());
        let mut server = TestServer::new(router).expect("Failed to start test server");
        server.do_save_cookies();
        (server, state)
    }

    /// Log `username` in through the HTTP API so the session cookie is saved
    pub async fn log_in(server: &TestServer, username: &str, password: &str) {
        let response = server
            .post("/login")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .await;
        response.assert_status_ok();
    }
}
