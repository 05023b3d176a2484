//! Console host: stdin in, stdout/stderr out.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use warden_ai::{Attachment, AttachmentSource, Delivery, DeliveryError, HostChannel, PendingAction};

type Sink = Mutex<Box<dyn Write + Send>>;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Empty,
    Clear,
    Confirm(String),
    Cancel(String),
    Quit,
    Message(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Input::Empty;
        }
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("/clear"), None) => Input::Clear,
            (Some("/quit" | "/exit"), None) => Input::Quit,
            (Some("/confirm"), Some(id)) => Input::Confirm(id.to_string()),
            (Some("/cancel"), Some(id)) => Input::Cancel(id.to_string()),
            _ => Input::Message(line.to_string()),
        }
    }
}

pub struct ConsoleHost {
    out: Sink,
    err: Sink,
    out_dir: Option<PathBuf>,
    progress_open: AtomicBool,
}

impl ConsoleHost {
    pub fn stdio(out_dir: Option<PathBuf>) -> Self {
        Self::new(
            Box::new(std::io::stdout()),
            Box::new(std::io::stderr()),
            out_dir,
        )
    }

    pub fn new(
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
        out_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
            out_dir,
            progress_open: AtomicBool::new(false),
        }
    }

    /// Print a line to stdout, ending any open progress line first.
    pub fn say(&self, text: &str) -> std::io::Result<()> {
        self.end_progress()?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{text}")?;
        out.flush()
    }

    fn end_progress(&self) -> std::io::Result<()> {
        if self.progress_open.swap(false, Ordering::SeqCst) {
            let mut err = self.err.lock().unwrap_or_else(|e| e.into_inner());
            writeln!(err)?;
            err.flush()?;
        }
        Ok(())
    }

    async fn save(&self, dir: &Path, file: &Attachment) -> Result<PathBuf, DeliveryError> {
        let name = Path::new(&file.display_name)
            .file_name()
            .ok_or_else(|| DeliveryError::Attachment(file.display_name.clone()))?;
        let target = dir.join(name);
        tokio::fs::create_dir_all(dir).await?;
        match &file.source {
            AttachmentSource::Path(path) => {
                tokio::fs::copy(path, &target).await?;
            }
            AttachmentSource::Bytes(bytes) => tokio::fs::write(&target, bytes).await?,
        }
        Ok(target)
    }
}

#[async_trait]
impl HostChannel for ConsoleHost {
    async fn send_or_edit_progress(&self, content: &str) -> Result<(), DeliveryError> {
        let mut err = self.err.lock().unwrap_or_else(|e| e.into_inner());
        // Carriage return plus clear-to-end rewrites the same line.
        write!(err, "\r\x1b[K{content}")?;
        err.flush()?;
        self.progress_open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn deliver(&self, delivery: Delivery) -> Result<(), DeliveryError> {
        self.say(&delivery.text)?;
        for file in &delivery.files {
            let line = match &self.out_dir {
                Some(dir) => {
                    let saved = self.save(dir, file).await?;
                    format!("[file] {}", saved.display())
                }
                None => format!("[file] {}", file.display_name),
            };
            self.say(&line)?;
        }
        Ok(())
    }

    async fn request_confirmation(&self, action: &PendingAction) -> Result<(), DeliveryError> {
        self.say(&format!(
            "Run `{}` with {}? Type /confirm {id} or /cancel {id}",
            action.tool,
            action.args,
            id = action.id
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use warden_ai::ToolInput;
    use warden_common::{Mode, SessionKey};

    use super::*;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn host(out_dir: Option<PathBuf>) -> (ConsoleHost, Buffer, Buffer) {
        let (out, err) = (Buffer::default(), Buffer::default());
        let host = ConsoleHost::new(Box::new(out.clone()), Box::new(err.clone()), out_dir);
        (host, out, err)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Input::parse("   "), Input::Empty);
        assert_eq!(Input::parse("/clear"), Input::Clear);
        assert_eq!(Input::parse("/confirm ab12cd34"), Input::Confirm("ab12cd34".into()));
        assert_eq!(Input::parse("/cancel ab12cd34"), Input::Cancel("ab12cd34".into()));
        assert_eq!(Input::parse("/quit"), Input::Quit);
        assert_eq!(
            Input::parse("/confirm"),
            Input::Message("/confirm".into())
        );
        assert_eq!(Input::parse(" hello "), Input::Message("hello".into()));
    }

    #[tokio::test]
    async fn progress_is_rewritten_in_place_then_closed() {
        let (host, out, err) = host(None);
        host.send_or_edit_progress("Executing tool `a`…").await.unwrap();
        host.send_or_edit_progress("Executing tool `b`…").await.unwrap();
        host.deliver(Delivery {
            text: "done".into(),
            files: Vec::new(),
        })
        .await
        .unwrap();

        assert_eq!(
            err.text(),
            "\r\x1b[KExecuting tool `a`…\r\x1b[KExecuting tool `b`…\n"
        );
        assert_eq!(out.text(), "done\n");
    }

    #[tokio::test]
    async fn attachments_are_copied_to_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.txt");
        std::fs::write(&src, "long answer").unwrap();
        let out_dir = dir.path().join("out");
        let (host, out, _err) = host(Some(out_dir.clone()));

        host.deliver(Delivery {
            text: "see file".into(),
            files: vec![
                Attachment::from_path(&src, "response.txt"),
                Attachment::from_bytes(b"PNG".to_vec(), "chart.png"),
            ],
        })
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(out_dir.join("response.txt")).unwrap(),
            "long answer"
        );
        assert_eq!(std::fs::read(out_dir.join("chart.png")).unwrap(), b"PNG");
        assert!(out.text().contains("[file]"));
    }

    #[tokio::test]
    async fn confirmation_prompt_names_commands() {
        let (host, out, _err) = host(None);
        let args = json!({"to": "mods@example.com"});
        let mut action = PendingAction::new(
            SessionKey::new("u1", Mode::Text),
            "send_email",
            ToolInput::Args(args.as_object().cloned().unwrap_or_default()),
        );
        action.id = "ab12cd34".into();
        host.request_confirmation(&action).await.unwrap();
        let text = out.text();
        assert!(text.contains("/confirm ab12cd34"));
        assert!(text.contains("/cancel ab12cd34"));
    }
}
