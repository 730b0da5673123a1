//! Document indexing handlers

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
    Json,
};
use convorag_common::{
    config::UploadConfig,
    errors::{AppError, Result},
    models::{DocumentInput, DocumentRecord, Metadata},
};
use convorag_ingestion::{file_extension, load_document, ChunkingStrategy, IngestionError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use validator::Validate;

use crate::{extract::ValidatedJson, state::AppState};

/// Request to index a batch of documents
#[derive(Debug, Deserialize, Validate)]
pub struct IndexRequest {
    #[validate(length(min = 1, max = 100))]
    pub documents: Vec<DocumentInput>,

    /// `recursive` (default) or `semantic`
    #[serde(default)]
    pub chunking_strategy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub chunks_indexed: usize,
    pub total_chunks: usize,
    pub document_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub document_id: String,
    pub chunks_created: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentRecord>,
    pub total_documents: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteDocumentResponse {
    pub document_id: String,
    pub chunks_removed: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub message: String,
    pub total_chunks: usize,
}

/// Chunk, embed and index documents
pub async fn index_documents(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<IndexRequest>,
) -> Result<Json<IndexResponse>> {
    let strategy = request
        .chunking_strategy
        .as_deref()
        .map(str::parse::<ChunkingStrategy>)
        .transpose()?;

    let (chunks_indexed, document_ids) = index_batch(&state, &request.documents, strategy).await?;
    let total_chunks = state.index.total_chunks().await;
    tracing::info!(
        documents = document_ids.len(),
        chunks_indexed,
        total_chunks,
        "Documents indexed"
    );

    Ok(Json(IndexResponse {
        message: "Documents indexed successfully".to_string(),
        chunks_indexed,
        total_chunks,
        document_ids,
    }))
}

/// Load, chunk and index an uploaded file.
///
/// Multipart fields: `file` (required), `document_id`, `chunking_strategy`.
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| AppError::InvalidUpload { message: e.body_text() })?;
    let limits = &state.config.upload;

    let mut upload: Option<(String, String, Vec<u8>)> = None;
    let mut document_id = None;
    let mut strategy = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limits))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .and_then(|n| std::path::Path::new(n).file_name())
                    .and_then(|n| n.to_str())
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| AppError::InvalidUpload {
                        message: "Uploaded file has no name".to_string(),
                    })?;

                let extension = file_extension(&file_name).unwrap_or_default();
                if !limits.accepts(&extension) {
                    return Err(AppError::InvalidUpload {
                        message: format!(
                            "Unsupported file type '.{}'. Supported: {}",
                            extension,
                            limits.supported_extensions.join(", ")
                        ),
                    });
                }

                let max_bytes = limits.max_file_size_bytes();
                let mut bytes = Vec::new();
                while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limits))? {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(IngestionError::FileTooLarge { limit_mb: limits.max_file_size_mb }.into());
                    }
                    bytes.extend_from_slice(&chunk);
                }
                upload = Some((file_name, extension, bytes));
            }
            "document_id" => {
                let id = field.text().await.map_err(|e| multipart_error(e, limits))?;
                document_id = Some(id).filter(|id| !id.trim().is_empty());
            }
            "chunking_strategy" => {
                let value = field.text().await.map_err(|e| multipart_error(e, limits))?;
                strategy = Some(value.parse::<ChunkingStrategy>()?);
            }
            other => debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    let (file_name, extension, bytes) = upload.ok_or_else(|| AppError::InvalidUpload {
        message: "Missing 'file' field".to_string(),
    })?;

    let content = load_document(&file_name, &bytes)?;
    let mut metadata = Metadata::new();
    metadata.insert("file_type".to_string(), extension);
    let document = DocumentInput {
        content,
        source: file_name.clone(),
        document_id,
        metadata,
    };

    let (chunks_created, mut document_ids) =
        index_batch(&state, std::slice::from_ref(&document), strategy).await?;
    let total_chunks = state.index.total_chunks().await;
    tracing::info!(file = %file_name, bytes = bytes.len(), chunks_created, total_chunks, "File indexed");

    Ok(Json(UploadResponse {
        message: format!("Document '{}' processed successfully", file_name),
        filename: file_name,
        document_id: document_ids.pop().unwrap_or_default(),
        chunks_created,
        total_chunks,
    }))
}

async fn index_batch(
    state: &AppState,
    documents: &[DocumentInput],
    strategy: Option<ChunkingStrategy>,
) -> Result<(usize, Vec<String>)> {
    let batch = state.processor.process(documents, strategy)?;
    let chunks_indexed = state.index.add(batch.chunks).await?;

    if chunks_indexed == 0 {
        return Err(AppError::Precondition {
            message: "No chunks were indexed".to_string(),
        });
    }
    Ok((chunks_indexed, batch.document_ids))
}

fn multipart_error(e: MultipartError, limits: &UploadConfig) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return IngestionError::FileTooLarge { limit_mb: limits.max_file_size_mb }.into();
    }
    AppError::InvalidUpload { message: e.body_text() }
}

/// Registry of indexed documents
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents = state.index.documents().await;
    Json(DocumentListResponse {
        total_documents: documents.len(),
        total_chunks: state.index.total_chunks().await,
        documents,
    })
}

/// Remove a document's chunks from future results
pub async fn delete_document(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DeleteDocumentResponse>> {
    let chunks_removed = state.index.remove_document(&document_id).await?;

    Ok(Json(DeleteDocumentResponse {
        document_id,
        chunks_removed,
        total_chunks: state.index.total_chunks().await,
    }))
}

/// Drop the whole index, including persisted files
pub async fn clear_documents(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.index.clear().await?;

    Ok(Json(ClearResponse {
        message: "Index cleared".to_string(),
        total_chunks: 0,
    }))
}
