#[derive(Debug, thiserror::Error)]
pub enum MailbatchError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("YAML parse error in {path}: {source}")]
    ConfigYaml {
        path: std::path::PathBuf,
        source: serde_yaml::Error,
    },

    #[error("JSON parse error in {path}: {source}")]
    JsonParse {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    TomlParse {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },

    #[error("unsupported file format: '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    #[error("CSV parse error in {path}: {source}")]
    CsvParse {
        path: std::path::PathBuf,
        source: csv::Error,
    },

    #[error("CSV file has no headers: {path}")]
    CsvNoHeaders { path: std::path::PathBuf },

    #[error("invalid data shape in {path}: {message}")]
    InvalidDataShape {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("column '{column}' is missing from the input table")]
    MissingColumn { column: String },

    #[error("template error in field '{field}': {reason}")]
    Template { field: String, reason: String },

    #[error("template in field '{field}' references undefined placeholders: {}", names.join(", "))]
    UndefinedPlaceholder { field: String, names: Vec<String> },

    #[error("template file '{filename}' not found among input files")]
    TemplateFileNotFound { filename: String },

    #[error("attachment list for row {row_index} is not a JSON array of filenames: {reason}")]
    AttachmentFormat { row_index: usize, reason: String },

    #[error("attachment '{filename}' for row {row_index} not found among input files")]
    AttachmentNotFound { row_index: usize, filename: String },

    #[error("invalid recipient address '{value}'")]
    InvalidRecipient { value: String },

    #[error("recipient '{value}' does not match any of the allowed address masks")]
    RecipientNotAllowed { value: String },

    #[error("row {row_index}: {source}")]
    Recipient {
        row_index: usize,
        source: Box<MailbatchError>,
    },

    #[error("connection error: {reason}")]
    Connection { reason: String },

    #[error("send error for row {row_index}: {reason}")]
    Send { row_index: usize, reason: String },

    #[error("keyring error: {reason}")]
    Keyring { reason: String },

    #[error("CSV write error in {path}: {source}")]
    CsvWrite {
        path: std::path::PathBuf,
        source: csv::Error,
    },
}

impl MailbatchError {
    /// Configuration and input problems the operator can fix; everything else
    /// is treated as an internal or transport failure.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Send { .. } | Self::Keyring { .. } => false,
            Self::Io { .. } | Self::CsvWrite { .. } => false,
            Self::Recipient { source, .. } => source.is_user_error(),
            _ => true,
        }
    }
}
