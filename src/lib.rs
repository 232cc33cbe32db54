pub mod authority_client;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;

use authority_client::AuthorityClient;
use services::scan_session::ScanSession;
use session::OperatorSession;

// Общие зависимости для сессий сканирования
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub authority: AuthorityClient,
    pub operator: OperatorSession,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Self, error::ScanError> {
        let authority = AuthorityClient::from_config(&config.authority, &config.circuit_breaker)?;
        let operator = OperatorSession::from_config(&config.operator)?;

        if operator.current_user_id().is_none() {
            return Err(error::ScanError::NoOperator);
        }

        Ok(Self {
            config,
            authority,
            operator,
        })
    }

    pub fn scan_session(&self) -> ScanSession<AuthorityClient> {
        ScanSession::new(
            self.authority.clone(),
            self.operator.clone(),
            self.config.operator.device_info.clone(),
        )
    }
}
