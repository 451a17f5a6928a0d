use thiserror::Error;

#[derive(Error, Debug)]
pub enum StarMatchError {
    #[error("Usage: starmatch <filename>")]
    UsageError { detail: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Received HTML response from catalog service")]
    HtmlResponseError,

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image data is not 2D: {detail}")]
    NotTwoDimensionalError { detail: String },

    #[error("Unsupported image format: {message}")]
    ImageFormatError { message: String },

    #[error("Catalog row {row} has {found} cells but the header has {expected}")]
    RaggedRowError {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Catalog column '{column}' not found")]
    MissingColumnError { column: String },

    #[error("Catalog row {row}: column '{column}' holds non-numeric value '{value}'")]
    InvalidCellError {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Usage,
    Network,
    DataFormat,
    Image,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl StarMatchError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn not_two_dimensional(detail: impl Into<String>) -> Self {
        Self::NotTwoDimensionalError {
            detail: detail.into(),
        }
    }

    pub fn image_format(message: impl Into<String>) -> Self {
        Self::ImageFormatError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UsageError { .. } => ErrorCategory::Usage,
            Self::HttpError(_) | Self::HtmlResponseError => ErrorCategory::Network,
            Self::CsvError(_)
            | Self::SerializationError(_)
            | Self::RaggedRowError { .. }
            | Self::MissingColumnError { .. }
            | Self::InvalidCellError { .. }
            | Self::ProcessingError { .. } => ErrorCategory::DataFormat,
            Self::ImageError(_)
            | Self::NotTwoDimensionalError { .. }
            | Self::ImageFormatError { .. } => ErrorCategory::Image,
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::System => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// Process exit code for an error that reaches `main`.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::UsageError { .. } => "Usage: starmatch <filename>".to_string(),
            Self::NotTwoDimensionalError { .. } => "Image data is not 2D".to_string(),
            Self::HtmlResponseError => {
                "The catalog service answered with an HTML page instead of CSV".to_string()
            }
            Self::HttpError(e) => match e.status() {
                Some(status) => format!("Catalog service returned HTTP {}", status),
                None => format!("Could not reach the catalog service: {}", e),
            },
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::UsageError { .. } => "Pass exactly one image file, e.g. `starmatch field.fits`",
            Self::NotTwoDimensionalError { .. } => {
                "Provide a single-plane image (FITS NAXIS = 2 or a rectangular text grid)"
            }
            Self::ImageFormatError { .. } | Self::ImageError(_) => {
                "Use a FITS, text grid or common raster image file"
            }
            Self::HttpError(_) => "Check network connectivity and the catalog endpoint URL",
            Self::HtmlResponseError => "The query was probably rejected; check the SQL text",
            Self::CsvError(_) | Self::RaggedRowError { .. } => {
                "Inspect the raw catalog response with --verbose"
            }
            Self::MissingColumnError { .. } | Self::InvalidCellError { .. } => {
                "Check the catalog column names in the [matching] config section"
            }
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration value and run again"
            }
            Self::SerializationError(_) => "Report output could not be serialized",
            Self::ProcessingError { .. } => "Run again with --verbose to see the failing stage",
            Self::IoError(_) => "Check the file path and its permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, StarMatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_and_shape_errors_exit_with_one() {
        let usage = StarMatchError::UsageError {
            detail: "missing filename".to_string(),
        };
        assert_eq!(usage.exit_code(), 1);
        assert_eq!(usage.to_string(), "Usage: starmatch <filename>");

        let shape = StarMatchError::not_two_dimensional("NAXIS = 3");
        assert_eq!(shape.exit_code(), 1);
        assert_eq!(shape.user_friendly_message(), "Image data is not 2D");
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            StarMatchError::HtmlResponseError.category(),
            ErrorCategory::Network
        );
        assert_eq!(StarMatchError::HtmlResponseError.exit_code(), 2);

        let io = StarMatchError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        assert_eq!(io.severity(), ErrorSeverity::Critical);
        assert_eq!(io.exit_code(), 3);

        let missing = StarMatchError::MissingColumnError {
            column: "ra".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::DataFormat);
    }
}
