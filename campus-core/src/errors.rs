use std::io;

use thiserror::Error;

/// Result type used across the campus core crate.
pub type Result<T> = std::result::Result<T, CampusError>;

/// Canonical error representation shared by all services.
#[derive(Debug, Error)]
pub enum CampusError {
    #[error("Erro de I/O: {0}")]
    IoError(#[from] io::Error),

    #[error("Erro de serialização: {0}")]
    SerializationError(String),

    #[error("Erro de deserialização: {0}")]
    DeserializationError(String),

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("Conflito de agenda: {0}")]
    Conflict(String),

    #[error("Transição proibida: {0}")]
    ProhibitedTransition(String),

    #[error("Atributo desconhecido: {0}")]
    UnknownAttribute(String),

    #[error("Erro de configuração: {0}")]
    ConfigError(String),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(String),

    #[error("Erro geral: {0}")]
    GeneralError(String),
}

impl From<serde_json::Error> for CampusError {
    fn from(err: serde_json::Error) -> Self {
        CampusError::DeserializationError(err.to_string())
    }
}

impl From<sqlx::Error> for CampusError {
    fn from(err: sqlx::Error) -> Self {
        CampusError::DatabaseError(err.to_string())
    }
}

impl From<anyhow::Error> for CampusError {
    fn from(err: anyhow::Error) -> Self {
        CampusError::GeneralError(err.to_string())
    }
}

/// Dedicated configuration error used by the configuration module.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Variável de ambiente obrigatória ausente: {0}")]
    MissingEnvVar(String),

    #[error("Valor inválido para variável de ambiente {key}: {source}")]
    InvalidEnvVar {
        key: &'static str,
        #[source]
        source: std::env::VarError,
    },

    #[error("Erro interno: {0}")]
    Internal(String),
}

impl From<ConfigError> for CampusError {
    fn from(value: ConfigError) -> Self {
        CampusError::ConfigError(value.to_string())
    }
}
