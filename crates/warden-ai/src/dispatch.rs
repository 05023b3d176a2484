//! Final-answer delivery: inline text, or a file when the text is too long.

use std::io::{self, Write};
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::{debug, warn};
use warden_config::OutputConfig;

use crate::host::{Delivery, DeliveryError, HostChannel};
use crate::tools::Attachment;

/// How a final answer went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Nothing to send.
    Skipped,
    Inline,
    /// Text moved to an attached file.
    Overflow,
    /// The overflow file could not be written or was refused by the host;
    /// truncated text was sent instead.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct OutputDispatcher {
    inline_limit: usize,
    overflow_notice: String,
    attachments_notice: String,
    overflow_file_name: String,
    temp_dir: Option<PathBuf>,
}

impl OutputDispatcher {
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            inline_limit: config.inline_limit,
            overflow_notice: config.overflow_notice.clone(),
            attachments_notice: config.attachments_notice.clone(),
            overflow_file_name: config.overflow_file_name.clone(),
            temp_dir: config.temp_dir.clone(),
        }
    }

    pub fn inline_limit(&self) -> usize {
        self.inline_limit
    }

    /// Deliver `text` with the tools' `attachments`.
    ///
    /// Text longer than the inline limit (in characters) is written to a
    /// temporary file that is removed once delivery finishes, whether or
    /// not it succeeded. If the host refuses the file, the truncated text is
    /// sent once more without it.
    pub async fn dispatch(
        &self,
        host: &dyn HostChannel,
        text: String,
        attachments: Vec<Attachment>,
    ) -> Result<DeliveryReport, DeliveryError> {
        if text.trim().is_empty() && attachments.is_empty() {
            debug!("Nothing to deliver");
            return Ok(DeliveryReport::Skipped);
        }

        if text.chars().count() <= self.inline_limit {
            let text = if text.trim().is_empty() {
                self.attachments_notice.clone()
            } else {
                text
            };
            host.deliver(Delivery {
                text,
                files: attachments,
            })
            .await?;
            return Ok(DeliveryReport::Inline);
        }

        let file = match self.write_overflow(&text) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Failed to write overflow file, sending truncated text");
                return self.deliver_truncated(host, &text, attachments).await;
            }
        };

        let mut files = Vec::with_capacity(attachments.len() + 1);
        files.push(Attachment::from_path(
            file.path(),
            self.overflow_file_name.clone(),
        ));
        files.extend(attachments.iter().cloned());

        let delivered = host
            .deliver(Delivery {
                text: self.overflow_notice.clone(),
                files,
            })
            .await;

        if let Err(e) = file.close() {
            warn!(error = %e, "Failed to remove overflow file");
        }
        match delivered {
            Ok(()) => Ok(DeliveryReport::Overflow),
            Err(e) => {
                warn!(error = %e, "Overflow delivery failed, sending truncated text");
                self.deliver_truncated(host, &text, attachments).await
            }
        }
    }

    async fn deliver_truncated(
        &self,
        host: &dyn HostChannel,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<DeliveryReport, DeliveryError> {
        let truncated: String = text.chars().take(self.inline_limit).collect();
        host.deliver(Delivery {
            text: truncated,
            files: attachments,
        })
        .await?;
        Ok(DeliveryReport::Fallback)
    }

    fn write_overflow(&self, text: &str) -> io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("warden-").suffix(".txt");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}
