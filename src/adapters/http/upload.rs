//! Staging of multipart uploads on local disk.

use std::io;
use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use axum::BoxError;
use futures::{Stream, TryStreamExt};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use uuid::Uuid;

use super::error::AppError;
use crate::ports::indexing::MediaUpload;

/// Stream an uploaded file into `upload_dir` under a unique name.
pub(crate) async fn stage_upload<S, E>(
    upload_dir: &Path,
    file_name: &str,
    content_type: Option<String>,
    stream: S,
) -> Result<MediaUpload, AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    if !file_name_is_valid(file_name) {
        return Err(AppError::BadRequest("Invalid file name".to_string()));
    }

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    let path = upload_dir.join(format!("{}-{}", Uuid::new_v4(), file_name));
    tracing::debug!(path = ?path, "Staging upload");
    if let Err(e) = stream_to_file(&path, stream).await {
        discard(&path).await;
        return Err(e);
    }

    Ok(MediaUpload {
        path,
        file_name: file_name.to_string(),
        content_type,
    })
}

/// Remove a staged file, logging failures.
pub(crate) async fn discard(path: &PathBuf) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = ?path, error = %e, "Failed to remove staged upload");
        }
    }
}

// Save a `Stream` to a file
async fn stream_to_file<S, E>(path: &PathBuf, stream: S) -> Result<(), AppError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    async {
        let body_with_io_error = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
        let body_reader = StreamReader::new(body_with_io_error);
        futures::pin_mut!(body_reader);

        let mut file = BufWriter::new(File::create(path).await?);
        tokio::io::copy(&mut body_reader, &mut file).await?;
        file.flush().await?;

        Ok::<_, io::Error>(())
    }
    .await
    .map_err(|err| AppError::Internal(err.to_string()))
}

/// A client file name must be a single plain path component.
fn file_name_is_valid(file_name: &str) -> bool {
    let mut components = Path::new(file_name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
