pub mod server;

use secrecy::SecretString;

/// Runtime configuration assembled from CLI arguments and environment.
#[derive(Debug)]
pub struct ServerArgs {
    pub port: u16,
    /// Absent DSN selects the in-memory store.
    pub dsn: Option<String>,
    pub secret: SecretString,
    pub base_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<SecretString>,
    pub mail_endpoint: Option<String>,
    pub mail_api_key: Option<SecretString>,
    pub mail_from: Option<String>,
    pub session_ttl_seconds: i64,
    pub reset_ttl_seconds: i64,
}

#[derive(Debug)]
pub enum Action {
    Server(ServerArgs),
}
