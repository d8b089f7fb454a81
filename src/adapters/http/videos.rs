use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use super::error::{AppError, AppResult};
use super::upload::{discard, stage_upload};
use super::AppState;
use crate::domain::video::VideoRecord;
use crate::ports::indexing::MediaUpload;

const TITLE_FIELD: &str = "title";
const VIDEO_FIELD: &str = "video_file";

pub(super) async fn list_videos(State(state): State<AppState>) -> AppResult<Json<Vec<VideoRecord>>> {
    Ok(Json(state.indexing.list_videos().await?))
}

pub(super) async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<VideoRecord>> {
    Ok(Json(state.indexing.get_video(&id).await?))
}

// Accepts `title` and `video_file` fields, stages the file and submits it.
pub(super) async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<VideoRecord>)> {
    let mut title: Option<String> = None;
    let mut upload: Option<MediaUpload> = None;

    let read = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().map(str::to_owned);
            match name.as_deref() {
                Some(TITLE_FIELD) => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?;
                    title = Some(text);
                }
                Some(VIDEO_FIELD) if upload.is_none() => {
                    let file_name = field
                        .file_name()
                        .map(str::to_owned)
                        .ok_or_else(|| AppError::BadRequest("video_file has no file name".to_string()))?;
                    let content_type = field.content_type().map(str::to_owned);
                    upload = Some(
                        stage_upload(&state.upload_dir, &file_name, content_type, field).await?,
                    );
                }
                _ => {}
            }
        }
        Ok::<_, AppError>(())
    }
    .await;

    let upload = match (read, upload) {
        (Ok(()), Some(upload)) => upload,
        (Ok(()), None) => return Err(AppError::BadRequest("No video file provided".to_string())),
        (Err(e), staged) => {
            if let Some(staged) = staged {
                discard(&staged.path).await;
            }
            return Err(e);
        }
    };

    let Some(title) = title else {
        discard(&upload.path).await;
        return Err(AppError::BadRequest("Title is required".to_string()));
    };

    tracing::info!(title = %title, file_name = %upload.file_name, "Received video upload");
    let result = state.indexing.submit_video(&title, &upload).await;
    discard(&upload.path).await;

    Ok((StatusCode::CREATED, Json(result?)))
}

pub(super) async fn refresh_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<VideoRecord>> {
    Ok(Json(state.indexing.refresh(&id).await?))
}

pub(super) async fn delete_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.indexing.delete_video(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
