//! Attachment preprocessing.
//!
//! Converts an optional task attachment into text appended to the task, so
//! the model only ever sees a single text prompt. Dispatch is by file
//! extension:
//! - plain text (`txt`, `py`, `json`, `md`): decoded best-effort
//! - tables (`csv`, `xlsx`): rendered as a fixed-width text table
//! - audio (`mp3`, `wav`, `m4a`): transcribed by a [`Transcriber`]
//! - images (`png`, `jpg`, `jpeg`): described by an [`ImageAnalyzer`]
//!
//! Preprocessing never fails the run: any problem is logged and the original
//! task text is returned.

pub mod audio;
pub mod image;
pub mod table;
pub mod text;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;

pub use audio::{Transcriber, Transcript, TranscriptSegment, WhisperTranscriber};
pub use image::{GeminiImageAnalyzer, ImageAnalyzer};

/// Family of an attachment, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    PlainText,
    Tabular(TableFormat),
    Audio,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl Modality {
    /// Classify a file name by extension (case-insensitive).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;

        match ext.as_str() {
            "txt" | "py" | "json" | "md" => Some(Modality::PlainText),
            "csv" => Some(Modality::Tabular(TableFormat::Csv)),
            "xlsx" => Some(Modality::Tabular(TableFormat::Xlsx)),
            "mp3" | "wav" | "m4a" => Some(Modality::Audio),
            "png" | "jpg" | "jpeg" => Some(Modality::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::PlainText => "text",
            Modality::Tabular(_) => "table",
            Modality::Audio => "audio",
            Modality::Image => "image",
        }
    }
}

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("attachment unavailable at {path}: {reason}")]
    AttachmentUnavailable { path: PathBuf, reason: String },

    #[error("unsupported attachment type: {0}")]
    UnsupportedExtension(String),

    #[error("{modality} extraction failed: {message}")]
    Extraction {
        modality: &'static str,
        message: String,
    },
}

impl PreprocessError {
    pub(crate) fn extraction(modality: Modality, message: impl Into<String>) -> Self {
        PreprocessError::Extraction {
            modality: modality.as_str(),
            message: message.into(),
        }
    }
}

/// Routes attachments to the matching extractor.
pub struct Preprocessor {
    data_root: PathBuf,
    transcriber: Option<Arc<dyn Transcriber>>,
    image_analyzer: Option<Arc<dyn ImageAnalyzer>>,
}

impl Preprocessor {
    /// Preprocessor that only handles text and tables.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            transcriber: None,
            image_analyzer: None,
        }
    }

    /// Preprocessor wired to the backends enabled in `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut preprocessor = Self::new(config.task_data_path.clone());

        if let Some(key) = &config.transcription.api_key {
            preprocessor = preprocessor.with_transcriber(Arc::new(WhisperTranscriber::new(
                key.clone(),
                config.transcription.base_url.clone(),
                config.transcription.model.clone(),
            )));
        }

        if let Some(key) = &config.vision.api_key {
            preprocessor = preprocessor.with_image_analyzer(Arc::new(GeminiImageAnalyzer::new(
                key.clone(),
                config.vision.model.clone(),
            )));
        }

        preprocessor
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_image_analyzer(mut self, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        self.image_analyzer = Some(analyzer);
        self
    }

    /// Compose the task text with the content of its attachment.
    ///
    /// Returns `task_text` unchanged when there is no attachment, when it
    /// cannot be read, when its type is unknown, or when extraction fails.
    pub async fn prepare(&self, task_text: &str, attachment: Option<&str>) -> String {
        let Some(name) = attachment.map(str::trim).filter(|n| !n.is_empty()) else {
            return task_text.to_string();
        };

        match self.extract(task_text, name).await {
            Ok(composed) => composed,
            Err(PreprocessError::UnsupportedExtension(ext)) => {
                tracing::info!("Ignoring attachment {} with unsupported type '{}'", name, ext);
                task_text.to_string()
            }
            Err(e) => {
                tracing::warn!("Error processing {}: {}", name, e);
                task_text.to_string()
            }
        }
    }

    /// Extract the attachment and compose it with the task text.
    pub async fn extract(&self, task_text: &str, name: &str) -> Result<String, PreprocessError> {
        let path = self.resolve(name)?;
        let modality = Modality::from_file_name(name).ok_or_else(|| {
            PreprocessError::UnsupportedExtension(
                Path::new(name)
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            )
        })?;

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| PreprocessError::AttachmentUnavailable {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "Extracting {} attachment {} ({} bytes)",
            modality.as_str(),
            path.display(),
            bytes.len()
        );

        match modality {
            Modality::PlainText => Ok(attached(task_text, &text::extract_text(&bytes))),
            Modality::Tabular(format) => {
                let table = match format {
                    TableFormat::Csv => table::parse_csv(&bytes),
                    TableFormat::Xlsx => table::parse_xlsx(&bytes),
                }
                .map_err(|e| PreprocessError::extraction(modality, e))?;
                Ok(attached(task_text, &table.render()))
            }
            Modality::Audio => {
                let transcriber = self.transcriber.as_ref().ok_or_else(|| {
                    PreprocessError::extraction(modality, "no transcription backend configured")
                })?;
                let transcript = transcriber
                    .transcribe(&bytes, name)
                    .await
                    .map_err(|e| PreprocessError::extraction(modality, format!("{:#}", e)))?;
                tracing::debug!("Transcribed {} segments", transcript.segments.len());
                Ok(attached(task_text, &transcript.flatten()))
            }
            Modality::Image => {
                let analyzer = self.image_analyzer.as_ref().ok_or_else(|| {
                    PreprocessError::extraction(modality, "no image analysis backend configured")
                })?;
                let answer = analyzer
                    .analyze(&bytes, image::mime_type(name), task_text)
                    .await
                    .map_err(|e| PreprocessError::extraction(modality, format!("{:#}", e)))?;
                Ok(format!("{}\n\nAnalyzed file content:\n{}", task_text, answer))
            }
        }
    }

    /// Resolve an attachment name under the data root. Names that would
    /// escape the root are treated as unavailable.
    fn resolve(&self, name: &str) -> Result<PathBuf, PreprocessError> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        let path = self.data_root.join(relative);

        if escapes {
            return Err(PreprocessError::AttachmentUnavailable {
                path,
                reason: "name leaves the task data directory".to_string(),
            });
        }
        if !path.is_file() {
            return Err(PreprocessError::AttachmentUnavailable {
                path,
                reason: "file not found".to_string(),
            });
        }
        Ok(path)
    }
}

fn attached(task_text: &str, content: &str) -> String {
    format!("{}\n\nAttached file content:\n{}", task_text, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedTranscriber;

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, audio: &[u8], _file_name: &str) -> anyhow::Result<Transcript> {
            assert_eq!(audio, b"ID3fake");
            Ok(Transcript {
                text: String::new(),
                segments: vec![
                    TranscriptSegment {
                        start: 0.0,
                        end: 2.5,
                        text: " Read pages 132,".to_string(),
                    },
                    TranscriptSegment {
                        start: 2.5,
                        end: 4.0,
                        text: " 133 and 197.".to_string(),
                    },
                ],
            })
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        async fn transcribe(&self, _audio: &[u8], _file_name: &str) -> anyhow::Result<Transcript> {
            Err(anyhow::anyhow!("model not loaded"))
        }
    }

    #[derive(Default)]
    struct RecordingAnalyzer {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ImageAnalyzer for RecordingAnalyzer {
        async fn analyze(&self, _image: &[u8], mime: &str, question: &str) -> anyhow::Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((mime.to_string(), question.to_string()));
            Ok("Black plays Rd5.".to_string())
        }
    }

    fn data_dir(files: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, bytes) in files {
            std::fs::write(dir.path().join(name), bytes).unwrap();
        }
        dir
    }

    #[test]
    fn modality_dispatch_by_extension() {
        assert_eq!(Modality::from_file_name("a.PY"), Some(Modality::PlainText));
        assert_eq!(
            Modality::from_file_name("sales.xlsx"),
            Some(Modality::Tabular(TableFormat::Xlsx))
        );
        assert_eq!(
            Modality::from_file_name("x.csv"),
            Some(Modality::Tabular(TableFormat::Csv))
        );
        assert_eq!(Modality::from_file_name("Homework.mp3"), Some(Modality::Audio));
        assert_eq!(Modality::from_file_name("board.JPEG"), Some(Modality::Image));
        assert_eq!(Modality::from_file_name("archive.zip"), None);
        assert_eq!(Modality::from_file_name("README"), None);
    }

    #[tokio::test]
    async fn no_attachment_returns_task_text() {
        let pre = Preprocessor::new("/nonexistent");
        assert_eq!(pre.prepare("question", None).await, "question");
        assert_eq!(pre.prepare("question", Some("  ")).await, "question");
    }

    #[tokio::test]
    async fn missing_attachment_returns_task_text_exactly() {
        let dir = data_dir(&[]);
        let pre = Preprocessor::new(dir.path());
        assert_eq!(pre.prepare("question", Some("gone.txt")).await, "question");
    }

    #[tokio::test]
    async fn escaping_name_is_unavailable() {
        let dir = data_dir(&[]);
        let pre = Preprocessor::new(dir.path().join("sub"));
        let err = pre.extract("q", "../secret.txt").await.unwrap_err();
        assert!(matches!(err, PreprocessError::AttachmentUnavailable { .. }));
    }

    #[tokio::test]
    async fn text_attachment_is_appended_without_entry_point_marker() {
        let source = b"def f():\n    return 1\n\nif __name__ == \"__main__\":\n    print(f())\n";
        let dir = data_dir(&[("code.py", source)]);
        let pre = Preprocessor::new(dir.path());

        let out = pre.prepare("What does this print?", Some("code.py")).await;
        assert!(out.starts_with("What does this print?\n\nAttached file content:\ndef f():"));
        assert!(!out.contains("__main__"));
        assert!(out.contains("print(f())"));
    }

    #[tokio::test]
    async fn csv_attachment_is_rendered_as_table() {
        let dir = data_dir(&[("menu.csv", b"item,price\nburger,5.5\nfries,2\n")]);
        let pre = Preprocessor::new(dir.path());

        let out = pre.prepare("Total?", Some("menu.csv")).await;
        assert_eq!(
            out,
            "Total?\n\nAttached file content:\n  item  price\nburger    5.5\n fries      2"
        );
    }

    #[tokio::test]
    async fn corrupt_xlsx_degrades_to_task_text() {
        let dir = data_dir(&[("book.xlsx", b"not a zip archive")]);
        let pre = Preprocessor::new(dir.path());
        assert_eq!(pre.prepare("Sum column B", Some("book.xlsx")).await, "Sum column B");
    }

    #[tokio::test]
    async fn xlsx_with_huge_column_reference_degrades_to_task_text() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("xl/worksheets/sheet1.xml", SimpleFileOptions::default())
                .unwrap();
            writer
                .write_all(br#"<worksheet><sheetData><row r="1"><c r="ZZZZZZZZZZZZ1"><v>1</v></c></row></sheetData></worksheet>"#)
                .unwrap();
            writer.finish().unwrap();
        }

        let dir = data_dir(&[("b.xlsx", &buf.into_inner())]);
        let pre = Preprocessor::new(dir.path());
        assert_eq!(pre.prepare("task", Some("b.xlsx")).await, "task");
    }

    #[tokio::test]
    async fn audio_attachment_is_transcribed() {
        let dir = data_dir(&[("Homework.mp3", b"ID3fake")]);
        let pre = Preprocessor::new(dir.path()).with_transcriber(Arc::new(FixedTranscriber));

        let out = pre.prepare("Which pages?", Some("Homework.mp3")).await;
        assert_eq!(
            out,
            "Which pages?\n\nAttached file content:\nRead pages 132, 133 and 197."
        );
    }

    #[tokio::test]
    async fn transcription_failure_degrades_to_task_text() {
        let dir = data_dir(&[("Homework.mp3", b"ID3fake")]);
        let pre = Preprocessor::new(dir.path()).with_transcriber(Arc::new(FailingTranscriber));
        assert_eq!(pre.prepare("Which pages?", Some("Homework.mp3")).await, "Which pages?");

        let err = pre.extract("Which pages?", "Homework.mp3").await.unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn audio_without_backend_degrades_to_task_text() {
        let dir = data_dir(&[("a.wav", b"RIFF")]);
        let pre = Preprocessor::new(dir.path());
        assert_eq!(pre.prepare("q", Some("a.wav")).await, "q");
    }

    #[tokio::test]
    async fn image_attachment_is_analyzed_with_task_as_question() {
        let dir = data_dir(&[("board.jpg", b"\xff\xd8\xff")]);
        let analyzer = Arc::new(RecordingAnalyzer::default());
        let pre = Preprocessor::new(dir.path()).with_image_analyzer(analyzer.clone());

        let out = pre.prepare("Best move for black?", Some("board.jpg")).await;
        assert_eq!(
            out,
            "Best move for black?\n\nAnalyzed file content:\nBlack plays Rd5."
        );
        let seen = analyzer.seen.lock().unwrap();
        assert_eq!(
            seen.as_slice(),
            &[("image/jpeg".to_string(), "Best move for black?".to_string())]
        );
    }

    #[tokio::test]
    async fn unknown_extension_is_ignored() {
        let dir = data_dir(&[("data.bin", b"\x00\x01")]);
        let pre = Preprocessor::new(dir.path());
        assert_eq!(pre.prepare("q", Some("data.bin")).await, "q");
        assert!(matches!(
            pre.extract("q", "data.bin").await,
            Err(PreprocessError::UnsupportedExtension(ext)) if ext == "bin"
        ));
    }

    #[tokio::test]
    async fn every_supported_extension_keeps_task_text() {
        let names = [
            "a.txt", "a.py", "a.json", "a.md", "a.csv", "a.xlsx", "a.mp3", "a.wav", "a.m4a",
            "a.png", "a.jpg", "a.jpeg",
        ];
        let files: Vec<(&str, &[u8])> = names.iter().map(|n| (*n, &b"1,2\n3,4\n"[..])).collect();
        let dir = data_dir(&files);
        let pre = Preprocessor::new(dir.path())
            .with_transcriber(Arc::new(FailingTranscriber))
            .with_image_analyzer(Arc::new(RecordingAnalyzer::default()));

        for name in names {
            let out = pre.prepare("the task", Some(name)).await;
            assert!(out.contains("the task"), "{name}: {out}");
        }
    }
}
