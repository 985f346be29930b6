use axum::{
    Router,
    body::Body,
    extract::{Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};
use image_bus::{ArchiveJob, BatchError, BatchOrchestrator, SourceImage};

use crate::handler::{ApiError, ApiResult};

pub const ARCHIVE_FILE_NAME: &str = "converted-images.zip";

pub fn convert_router(orchestrator: BatchOrchestrator) -> Router {
    Router::new()
        .route("/convert-single", post(convert_single))
        .route("/convert-and-zip", post(convert_and_zip))
        .with_state(orchestrator)
}

/// Collects every file part named `field`. Parts without a file name are
/// plain form values and are skipped, as are parts under other names.
async fn read_files(multipart: &mut Multipart, field: &str) -> ApiResult<Vec<SourceImage>> {
    let mut files = Vec::new();
    loop {
        let part = multipart.next_field().await.map_err(|e| {
            ApiError::bad_request("Malformed multipart body.").with_source(e)
        })?;
        let Some(part) = part else { break };

        if part.name() != Some(field) {
            continue;
        }
        let Some(file_name) = part.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = part.bytes().await.map_err(|e| {
            ApiError::bad_request(format!("Failed to read {}.", file_name)).with_source(e)
        })?;
        files.push(SourceImage::new(file_name, bytes));
    }
    Ok(files)
}

async fn convert_single(
    State(orchestrator): State<BatchOrchestrator>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let file = read_files(&mut multipart, "image")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::bad_request("No file uploaded."))?;

    match orchestrator.convert_one(file.bytes).await {
        Ok(converted) => {
            log::debug!("converted {} ({} bytes)", file.name, converted.data.len());
            Ok(([(header::CONTENT_TYPE, converted.mime_type())], converted.data).into_response())
        }
        Err(e) => {
            log::warn!("Failed to convert {} ({}): {}", file.name, e.tag(), e);
            Err(ApiError::internal("Failed to convert the image."))
        }
    }
}

async fn convert_and_zip(
    State(orchestrator): State<BatchOrchestrator>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let files = read_files(&mut multipart, "images").await?;
    let count = files.len();

    let ArchiveJob { stream, done } =
        orchestrator
            .convert_and_archive(files)
            .map_err(|e| match e {
                BatchError::Empty => ApiError::bad_request("No files were uploaded."),
            })?;

    log::info!("streaming archive of {} file(s)", count);
    tokio::spawn(async move {
        match done.await {
            Ok(Ok(summary)) => log::info!(
                "archive sent: {} entries, {} failed",
                summary.entries,
                summary.failed
            ),
            Ok(Err(e)) => log::error!("archive stream aborted: {}", e),
            Err(e) => log::error!("archive writer task failed: {}", e),
        }
    });

    let disposition = format!("attachment; filename={}", ARCHIVE_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
#[path = "convert_test.rs"]
mod convert_test;
