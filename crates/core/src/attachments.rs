use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use futures::future::try_join_all;
use snafu::{ResultExt, Snafu};

use crate::content::StagedImage;
use crate::data_url;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type AttachmentResult<T> = Result<T, AttachmentError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AttachmentError {
    #[snafu(display("failed to read image '{name}' on `{stage}`: {source}"))]
    ReadFile {
        stage: &'static str,
        name: String,
        source: std::io::Error,
    },
    /// The task converting the batch ended before producing a result.
    #[snafu(display("image batch was interrupted on `{stage}`: {details}"))]
    Interrupted {
        stage: &'static str,
        details: String,
    },
}

/// A user-selected file whose bytes can be read asynchronously.
pub trait FileHandle: Send + Sync {
    fn name(&self) -> &str;

    fn read(&self) -> BoxFuture<'_, std::io::Result<Vec<u8>>>;
}

/// File picked from the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathFile {
    path: PathBuf,
    name: String,
}

impl PathFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FileHandle for PathFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self) -> BoxFuture<'_, std::io::Result<Vec<u8>>> {
        Box::pin(tokio::fs::read(&self.path))
    }
}

/// Ordered images staged for the next submission.
///
/// Batches are all-or-nothing: a failed read anywhere in a batch leaves the
/// staged sequence exactly as it was before the batch started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentPipeline {
    staged: Vec<StagedImage>,
}

impl AttachmentPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staged(&self) -> &[StagedImage] {
        &self.staged
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Reads and encodes every file concurrently.
    ///
    /// The returned batch follows input order, not completion order. This does not
    /// touch any pipeline state, so hosts can run it off the UI thread and apply the
    /// result with [`AttachmentPipeline::append`] once it settles.
    pub async fn load_batch<F>(files: &[F]) -> AttachmentResult<Vec<StagedImage>>
    where
        F: FileHandle,
    {
        let batch = try_join_all(files.iter().map(convert_file)).await;

        match &batch {
            Ok(images) => tracing::debug!(file_count = images.len(), "image batch converted"),
            Err(error) => tracing::warn!(
                file_count = files.len(),
                error = %error,
                "image batch discarded after a failed read"
            ),
        }

        batch
    }

    /// Appends a converted batch after everything already staged.
    pub fn append(&mut self, batch: Vec<StagedImage>) {
        self.staged.extend(batch);
    }

    /// Converts `files` and appends them in selection order; returns how many were staged.
    pub async fn select_files<F>(&mut self, files: &[F]) -> AttachmentResult<usize>
    where
        F: FileHandle,
    {
        let batch = Self::load_batch(files).await?;
        let added = batch.len();
        self.append(batch);
        Ok(added)
    }

    /// Removes the image currently at `index`.
    ///
    /// Indices are positions at call time. An out-of-range index is a caller bug;
    /// it is logged and ignored.
    pub fn remove_image(&mut self, index: usize) -> Option<StagedImage> {
        if index >= self.staged.len() {
            tracing::warn!(
                index,
                staged_count = self.staged.len(),
                "ignoring removal of a staged image that does not exist"
            );
            return None;
        }

        Some(self.staged.remove(index))
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }
}

async fn convert_file<F>(file: &F) -> AttachmentResult<StagedImage>
where
    F: FileHandle,
{
    let name = file.name();
    let bytes = file.read().await.context(ReadFileSnafu {
        stage: "read-selected-file",
        name: name.to_string(),
    })?;

    let mime_type = data_url::mime_type_for(name);
    Ok(StagedImage::new(data_url::encode(&bytes, &mime_type), name))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io;
    use std::time::Duration;

    use super::*;

    /// In-memory file that resolves after a delay, optionally with an error.
    pub(crate) struct ScriptedFile {
        name: String,
        bytes: Vec<u8>,
        delay: Duration,
        fail: bool,
    }

    impl ScriptedFile {
        pub(crate) fn ok(name: &str, bytes: &[u8], delay_ms: u64) -> Self {
            Self {
                name: name.to_string(),
                bytes: bytes.to_vec(),
                delay: Duration::from_millis(delay_ms),
                fail: false,
            }
        }

        pub(crate) fn failing(name: &str, delay_ms: u64) -> Self {
            Self {
                name: name.to_string(),
                bytes: Vec::new(),
                delay: Duration::from_millis(delay_ms),
                fail: true,
            }
        }
    }

    impl FileHandle for ScriptedFile {
        fn name(&self) -> &str {
            &self.name
        }

        fn read(&self) -> BoxFuture<'_, io::Result<Vec<u8>>> {
            Box::pin(async move {
                tokio::time::sleep(self.delay).await;
                if self.fail {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreadable"))
                } else {
                    Ok(self.bytes.clone())
                }
            })
        }
    }

    fn names(pipeline: &AttachmentPipeline) -> Vec<&str> {
        pipeline
            .staged()
            .iter()
            .map(|image| image.name.as_str())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn batch_keeps_input_order_when_reads_finish_out_of_order() {
        let mut pipeline = AttachmentPipeline::new();
        let files = vec![
            ScriptedFile::ok("slow.png", b"slow", 300),
            ScriptedFile::ok("fast.jpg", b"fast", 5),
            ScriptedFile::ok("middle.gif", b"mid", 120),
        ];

        let added = pipeline.select_files(&files).await.expect("batch loads");

        assert_eq!(added, 3);
        assert_eq!(names(&pipeline), vec!["slow.png", "fast.jpg", "middle.gif"]);
        assert_eq!(pipeline.staged()[0].data_url, data_url::encode(b"slow", "image/png"));
        assert_eq!(pipeline.staged()[1].data_url, data_url::encode(b"fast", "image/jpeg"));
        assert_eq!(pipeline.staged()[2].data_url, data_url::encode(b"mid", "image/gif"));
    }

    #[tokio::test(start_paused = true)]
    async fn later_batches_append_after_existing_images() {
        let mut pipeline = AttachmentPipeline::new();
        pipeline
            .select_files(&[ScriptedFile::ok("one.png", b"1", 10)])
            .await
            .expect("first batch");
        pipeline
            .select_files(&[
                ScriptedFile::ok("two.png", b"2", 50),
                ScriptedFile::ok("three.png", b"3", 1),
            ])
            .await
            .expect("second batch");

        assert_eq!(names(&pipeline), vec!["one.png", "two.png", "three.png"]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_read_discards_whole_batch() {
        let mut pipeline = AttachmentPipeline::new();
        pipeline
            .select_files(&[ScriptedFile::ok("kept.png", b"kept", 1)])
            .await
            .expect("seed batch");
        let before = pipeline.clone();

        let result = pipeline
            .select_files(&[
                ScriptedFile::ok("good.png", b"good", 1),
                ScriptedFile::failing("broken.png", 20),
                ScriptedFile::ok("late.png", b"late", 40),
            ])
            .await;

        let Err(AttachmentError::ReadFile { name, .. }) = result else {
            panic!("expected the batch to fail");
        };
        assert_eq!(name, "broken.png");
        assert_eq!(pipeline, before);
    }

    #[test]
    fn remove_image_drops_only_that_index() {
        let mut pipeline = AttachmentPipeline::new();
        pipeline.append(
            ["a", "b", "c", "d"]
                .into_iter()
                .map(|name| StagedImage::new(format!("data:image/png;base64,{name}"), name))
                .collect(),
        );

        let removed = pipeline.remove_image(1).expect("index in range");
        assert_eq!(removed.name, "b");
        assert_eq!(names(&pipeline), vec!["a", "c", "d"]);

        assert!(pipeline.remove_image(3).is_none());
        assert_eq!(pipeline.len(), 3);

        pipeline.clear();
        assert!(pipeline.is_empty());
    }

    #[test]
    fn path_file_uses_file_name() {
        let file = PathFile::new("/tmp/uploads/diagram.png");
        assert_eq!(file.name(), "diagram.png");
        assert_eq!(file.path(), Path::new("/tmp/uploads/diagram.png"));
    }

    #[tokio::test]
    async fn path_file_reads_from_disk() {
        let path = std::env::temp_dir().join(format!("council-attach-{}.png", std::process::id()));
        tokio::fs::write(&path, b"png-bytes").await.expect("write fixture");

        let staged = AttachmentPipeline::load_batch(&[PathFile::new(&path)])
            .await
            .expect("load from disk");
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].data_url, data_url::encode(b"png-bytes", "image/png"));
    }
}
