//! The eight conversion operations. Every handler walks the same four phases:
//! stage the upload(s), transform (external tool or in-process library),
//! package one-or-many outputs into a single deliverable, and clean up.
//!
//! One [`CleanupGuard`] per request tracks every staged path, the
//! deliverable included. Delivery is stream-and-delete-after: the response
//! body is read into memory before the guard drops, so the storage root holds
//! nothing for this request once the handler returns, whether it succeeded,
//! failed, panicked, or was cancelled by a client disconnect.

use crate::AppState;
use crate::api::error::AppError;
use crate::services::cleanup::CleanupGuard;
use crate::services::packager::{self, Deliverable};
use crate::services::{image_ops, pdf_ops};
use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

const DEFAULT_PASSWORD: &str = "secret";

struct Upload {
    filename: String,
    bytes: Bytes,
}

struct FormData {
    uploads: Vec<Upload>,
    password: Option<String>,
}

/// Drain the multipart stream. File parts arrive under `file` or `files`;
/// the optional `password` part is plain text. Unknown fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<FormData, AppError> {
    let mut uploads = Vec::new();
    let mut password = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "files" => {
                let filename = field.file_name().unwrap_or("unnamed").to_string();
                let bytes = field.bytes().await?;
                uploads.push(Upload { filename, bytes });
            }
            "password" => password = Some(field.text().await?),
            _ => {}
        }
    }

    Ok(FormData { uploads, password })
}

fn single_upload(form: FormData) -> Result<Upload, AppError> {
    let mut uploads = form.uploads;
    match uploads.len() {
        1 => Ok(uploads.remove(0)),
        0 => Err(AppError::BadRequest("missing 'file' field".to_string())),
        _ => Err(AppError::BadRequest(
            "expected exactly one 'file' field".to_string(),
        )),
    }
}

/// Run a CPU-bound transform off the async worker; library errors become
/// conversion failures with the library's message as detail.
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("blocking task panicked: {e}")))?
        .map_err(|e| AppError::Conversion(format!("{e:#}")))
}

/// Read the deliverable into the response body. The caller's guard still
/// tracks the path, so it is unlinked the moment the handler returns.
///
/// The plain `filename=` parameter carries the name literally (deliverable
/// names are fixed ASCII); the `filename*=` form carries the percent-encoded
/// variant for clients that prefer RFC 5987.
async fn deliver(deliverable: Deliverable) -> Result<Response, AppError> {
    let data = tokio::fs::read(&deliverable.path).await?;
    let encoded = utf8_percent_encode(&deliverable.filename, NON_ALPHANUMERIC).to_string();
    Response::builder()
        .header(header::CONTENT_TYPE, deliverable.media_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"; filename*=UTF-8''{}",
                deliverable.filename, encoded
            ),
        )
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("response build failed: {e}")))
}

#[utoipa::path(
    post,
    path = "/api/word2pdf",
    responses(
        (status = 200, description = "Converted PDF"),
        (status = 500, description = "Conversion failed")
    ),
    tag = "convert"
)]
pub async fn word2pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = single_upload(read_form(multipart).await?)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    // LibreOffice writes <input stem>.pdf into --outdir; the two-part check
    // watches that path, and success renames it to a fresh token.
    let converted = input.with_extension("pdf");
    guard.track(&converted);
    state
        .invoker
        .run_expecting(
            &state.config.soffice_bin,
            [
                OsStr::new("--headless"),
                OsStr::new("--convert-to"),
                OsStr::new("pdf"),
                OsStr::new("--outdir"),
                state.staging.root().as_os_str(),
                input.as_os_str(),
            ],
            &converted,
        )
        .await?;

    let output = state.staging.allocate("pdf");
    tokio::fs::rename(&converted, &output).await?;
    guard.track(&output);

    let deliverable = packager::package(
        &state.staging,
        vec![output],
        "converted.pdf",
        "converted.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

#[utoipa::path(
    post,
    path = "/api/merge",
    responses(
        (status = 200, description = "Merged PDF"),
        (status = 500, description = "Merge failed")
    ),
    tag = "convert"
)]
pub async fn merge(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;
    if form.uploads.is_empty() {
        return Err(AppError::BadRequest("missing 'files' field".to_string()));
    }

    let mut guard = CleanupGuard::new();
    let mut inputs = Vec::with_capacity(form.uploads.len());
    for upload in &form.uploads {
        let path = state.staging.stage(&upload.filename, &upload.bytes).await?;
        guard.track(&path);
        inputs.push(path);
    }

    let output = state.staging.allocate("pdf");
    guard.track(&output);
    {
        let inputs = inputs.clone();
        let output = output.clone();
        run_blocking(move || pdf_ops::merge_documents(&inputs, &output)).await?;
    }

    let deliverable = packager::package(
        &state.staging,
        vec![output],
        "merged.pdf",
        "merged.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

#[utoipa::path(
    post,
    path = "/api/split",
    responses(
        (status = 200, description = "Single page PDF, or a zip of pages for multi-page input"),
        (status = 500, description = "Split failed")
    ),
    tag = "convert"
)]
pub async fn split(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = single_upload(read_form(multipart).await?)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    let pages = {
        let staging = state.staging.clone();
        let input = input.clone();
        run_blocking(move || pdf_ops::split_document(&input, &staging)).await?
    };
    guard.track_all(&pages);

    let deliverable = packager::package(
        &state.staging,
        pages,
        "page1.pdf",
        "pages.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

#[utoipa::path(
    post,
    path = "/api/compress",
    responses(
        (status = 200, description = "Compressed PDF"),
        (status = 500, description = "Compression failed")
    ),
    tag = "convert"
)]
pub async fn compress(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = single_upload(read_form(multipart).await?)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    let output = state.staging.allocate("pdf");
    guard.track(&output);

    let mut output_flag = OsString::from("-sOutputFile=");
    output_flag.push(output.as_os_str());
    let args: Vec<OsString> = vec![
        "-sDEVICE=pdfwrite".into(),
        "-dCompatibilityLevel=1.4".into(),
        "-dPDFSETTINGS=/ebook".into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        output_flag,
        input.as_os_str().to_os_string(),
    ];
    state
        .invoker
        .run_expecting(&state.config.gs_bin, args, &output)
        .await?;

    let deliverable = packager::package(
        &state.staging,
        vec![output],
        "compressed.pdf",
        "compressed.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

#[utoipa::path(
    post,
    path = "/api/pdf2jpg",
    responses(
        (status = 200, description = "Single JPEG, or a zip of page images for multi-page input"),
        (status = 500, description = "Rasterization failed")
    ),
    tag = "convert"
)]
pub async fn pdf2jpg(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = single_upload(read_form(multipart).await?)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    // Ghostscript expands %d to the 1-based page number.
    let base = state.staging.allocate("");
    let mut output_flag = OsString::from("-sOutputFile=");
    output_flag.push(base.as_os_str());
    output_flag.push("_page_%d.jpg");
    let args: Vec<OsString> = vec![
        "-sDEVICE=jpeg".into(),
        "-r150".into(),
        "-dJPEGQ=90".into(),
        "-dNOPAUSE".into(),
        "-dQUIET".into(),
        "-dBATCH".into(),
        output_flag,
        input.as_os_str().to_os_string(),
    ];
    let first_page = page_image_path(&base, 1);
    state
        .invoker
        .run_expecting(&state.config.gs_bin, args, &first_page)
        .await?;

    let mut pages = Vec::new();
    let mut index = 1;
    loop {
        let page = page_image_path(&base, index);
        if !tokio::fs::try_exists(&page).await? {
            break;
        }
        guard.track(&page);
        pages.push(page);
        index += 1;
    }

    let deliverable = packager::package(
        &state.staging,
        pages,
        "page1.jpg",
        "pages.zip",
        mime::IMAGE_JPEG.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

fn page_image_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!("_page_{index}.jpg"));
    PathBuf::from(name)
}

#[utoipa::path(
    post,
    path = "/api/jpg2pdf",
    responses(
        (status = 200, description = "One-page PDF embedding the image"),
        (status = 500, description = "Image decode or embedding failed")
    ),
    tag = "convert"
)]
pub async fn jpg2pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = single_upload(read_form(multipart).await?)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    let output = state.staging.allocate("pdf");
    guard.track(&output);
    {
        let input = input.clone();
        let output = output.clone();
        run_blocking(move || image_ops::image_to_pdf(&input, &output)).await?;
    }

    let deliverable = packager::package(
        &state.staging,
        vec![output],
        "img2pdf.pdf",
        "img2pdf.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

#[utoipa::path(
    post,
    path = "/api/protect",
    responses(
        (status = 200, description = "Encrypted PDF"),
        (status = 500, description = "Encryption failed")
    ),
    tag = "convert"
)]
pub async fn protect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;
    let password = form
        .password
        .clone()
        .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
    let upload = single_upload(form)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    let output = state.staging.allocate("pdf");
    guard.track(&output);
    let args: Vec<OsString> = vec![
        "--encrypt".into(),
        password.clone().into(),
        password.into(),
        "256".into(),
        "--".into(),
        input.as_os_str().to_os_string(),
        output.as_os_str().to_os_string(),
    ];
    state
        .invoker
        .run_expecting(&state.config.qpdf_bin, args, &output)
        .await?;

    let deliverable = packager::package(
        &state.staging,
        vec![output],
        "protected.pdf",
        "protected.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}

#[utoipa::path(
    post,
    path = "/api/unlock",
    responses(
        (status = 200, description = "Decrypted PDF"),
        (status = 500, description = "Decryption failed (e.g. wrong password)")
    ),
    tag = "convert"
)]
pub async fn unlock(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart).await?;
    let password = form
        .password
        .clone()
        .unwrap_or_else(|| DEFAULT_PASSWORD.to_string());
    let upload = single_upload(form)?;

    let mut guard = CleanupGuard::new();
    let input = state.staging.stage(&upload.filename, &upload.bytes).await?;
    guard.track(&input);

    let output = state.staging.allocate("pdf");
    guard.track(&output);
    let args: Vec<OsString> = vec![
        format!("--password={password}").into(),
        "--decrypt".into(),
        input.as_os_str().to_os_string(),
        output.as_os_str().to_os_string(),
    ];
    state
        .invoker
        .run_expecting(&state.config.qpdf_bin, args, &output)
        .await?;

    let deliverable = packager::package(
        &state.staging,
        vec![output],
        "unlocked.pdf",
        "unlocked.zip",
        mime::APPLICATION_PDF.as_ref(),
    )
    .await?;
    guard.track(&deliverable.path);
    deliver(deliverable).await
}
