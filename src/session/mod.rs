use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::{config::OperatorConfig, error::ScanError};

/// Текущая сессия оператора. Передаётся в сессию сканирования явно,
/// никакого глобального хранилища токенов здесь нет.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorSession {
    user_id: Option<String>,
    token: Option<String>,
}

// Поля токена, из которых берётся идентификатор оператора
#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default, rename = "userId", alias = "user_id")]
    user_id: Option<serde_json::Value>,
}

impl OperatorSession {
    pub fn new(user_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            token,
        }
    }

    /// Разбирает JWT оператора. Подпись проверяет сервер, здесь только
    /// читаются поля и срок действия.
    pub fn from_token(token: &str) -> Result<Self, ScanError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
        let user_id = match data.claims.user_id {
            Some(serde_json::Value::String(id)) => Some(id),
            Some(serde_json::Value::Number(id)) => Some(id.to_string()),
            _ => data.claims.sub,
        };

        Ok(Self {
            user_id: user_id.filter(|id| !id.is_empty()),
            token: Some(token.to_string()),
        })
    }

    pub fn from_config(config: &OperatorConfig) -> Result<Self, ScanError> {
        let mut session = match &config.token {
            Some(token) => Self::from_token(token)?,
            None => Self::default(),
        };
        if let Some(id) = &config.operator_id {
            session.user_id = Some(id.clone());
        }
        Ok(session)
    }

    pub fn current_user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn current_token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}
