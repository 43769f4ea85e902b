#[derive(thiserror::Error, Debug)]
pub enum FixateError {
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("TOML deserialization error: {source}")]
    TomlDe {
        #[from]
        source: toml::de::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("wire error: {source}")]
    Wire {
        #[from]
        source: fixate_types::Error,
    },
    #[error("image encoding error: {source}")]
    Image {
        #[from]
        source: image::ImageError,
    },
    #[error("CSV error: {source}")]
    Csv {
        #[from]
        source: csv::Error,
    },
    #[error("robot shim error: {0}")]
    Shim(String),
}

pub type Result<T> = std::result::Result<T, FixateError>;
