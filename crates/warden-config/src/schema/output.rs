//! Final answer delivery.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Inline vs. file delivery of the final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Longest answer (in characters) delivered inline.
    pub inline_limit: usize,
    /// Inline content used when the answer is sent as a file.
    pub overflow_notice: String,
    /// Inline content used when there is no text but tools attached files.
    pub attachments_notice: String,
    /// Display name of the overflow attachment.
    pub overflow_file_name: String,
    /// Directory for overflow files; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            inline_limit: 2000,
            overflow_notice: "The response was too long, so it was sent as a file.".into(),
            attachments_notice: "Here are the attached file(s).".into(),
            overflow_file_name: "response.txt".into(),
            temp_dir: None,
        }
    }
}
