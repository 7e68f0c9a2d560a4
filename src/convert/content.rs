use crate::error::ConversionError;
use crate::protocol::converse::{
    CachePoint, ContentBlock, DocumentBlock, DocumentSource, ImageBlock, ImageSource,
    ReasoningBlock, ReasoningText, ToolResultContent,
};
use crate::protocol::mapping::{
    document_format_for, document_format_to_file_type, image_format_from_media_type,
};
use crate::protocol::payload::ToolPayload;
use crate::protocol::responses::{ContentPart, FunctionOutput, PartKind};
use crate::util::{base64_encode, format_data_uri, normalize_document_name, parse_data_uri};

// ---------------------------------------------------------------------------
// Unified part -> Converse blocks
// ---------------------------------------------------------------------------

/// Convert one unified content part, appending its block (and a cache point
/// when the part carries a cache hint) to `out`.
///
/// # Errors
///
/// Fails on audio input, on images that are not base64 data URIs, and on
/// image/file parts without a payload.
pub(crate) fn part_to_blocks_into(
    part: &ContentPart,
    out: &mut Vec<ContentBlock>,
) -> Result<(), ConversionError> {
    let block = match &part.kind {
        PartKind::InputText { text } | PartKind::OutputText { text, .. } => {
            ContentBlock::Text(text.clone())
        }
        PartKind::Refusal { refusal } => ContentBlock::Text(refusal.clone()),
        PartKind::InputImage { image_url, .. } => {
            ContentBlock::Image(image_url_to_block(image_url.as_deref())?)
        }
        PartKind::InputFile {
            filename,
            file_data,
            file_type,
            file_url,
        } => ContentBlock::Document(file_to_document(
            filename.as_deref(),
            file_data.as_deref(),
            file_type.as_deref(),
            file_url.as_deref(),
        )?),
        PartKind::ReasoningText { text, signature } => {
            ContentBlock::ReasoningContent(ReasoningBlock::ReasoningText(ReasoningText {
                text: text.clone(),
                signature: signature.clone(),
            }))
        }
        PartKind::InputAudio { .. } => {
            return Err(ConversionError::Unsupported("audio input".to_string()));
        }
    };
    out.push(block);
    if part.cache_control.is_some() {
        out.push(ContentBlock::CachePoint(CachePoint::default()));
    }
    Ok(())
}

/// Build a Converse image from a unified image URL. Only base64 data URIs are accepted.
///
/// # Errors
///
/// Fails when the URL is missing, remote, or not base64-encoded.
pub(crate) fn image_url_to_block(image_url: Option<&str>) -> Result<ImageBlock, ConversionError> {
    let url = image_url.ok_or(ConversionError::MissingPayload("input_image"))?;
    let Some(uri) = parse_data_uri(url) else {
        return Err(ConversionError::InvalidImage(
            "only base64 data URIs are supported, remote image URLs are not".to_string(),
        ));
    };
    if !uri.is_base64 {
        return Err(ConversionError::InvalidImage(
            "image data URI must be base64-encoded".to_string(),
        ));
    }
    Ok(ImageBlock {
        format: image_format_from_media_type(uri.media_type),
        source: Some(ImageSource::Bytes(uri.data.to_string())),
    })
}

/// Build a Converse document from a unified file part.
///
/// # Errors
///
/// Fails when the part has no inline data (remote file URLs are unsupported).
pub(crate) fn file_to_document(
    filename: Option<&str>,
    file_data: Option<&str>,
    file_type: Option<&str>,
    file_url: Option<&str>,
) -> Result<DocumentBlock, ConversionError> {
    let Some(data) = file_data else {
        if file_url.is_some() {
            return Err(ConversionError::Unsupported(
                "remote file URLs in documents".to_string(),
            ));
        }
        return Err(ConversionError::MissingPayload("input_file"));
    };

    let format = document_format_for(file_type, filename);
    let name = normalize_document_name(filename.unwrap_or_default());
    let source = match parse_data_uri(data) {
        Some(uri) if uri.is_base64 => DocumentSource::Bytes(uri.data.to_string()),
        Some(uri) if format.is_text() => DocumentSource::Text(uri.data.to_string()),
        Some(uri) => DocumentSource::Bytes(base64_encode(uri.data.as_bytes())),
        None if format.is_text() => DocumentSource::Text(data.to_string()),
        // Bare non-text data is taken to be base64 already.
        None => DocumentSource::Bytes(data.to_string()),
    };
    Ok(DocumentBlock {
        format,
        name,
        source: Some(source),
    })
}

/// Convert a tool output into Converse tool-result content.
///
/// String outputs are classified: JSON becomes a `json` entry, anything else `text`.
///
/// # Errors
///
/// Propagates image/file part conversion failures for list outputs.
pub(crate) fn function_output_to_result_content(
    output: &FunctionOutput,
) -> Result<Vec<ToolResultContent>, ConversionError> {
    match output {
        FunctionOutput::Text(text) => Ok(vec![payload_to_result_content(&ToolPayload::parse(text))]),
        FunctionOutput::Parts(parts) => {
            let mut content = Vec::with_capacity(parts.len());
            for part in parts {
                match &part.kind {
                    PartKind::InputText { text } | PartKind::OutputText { text, .. } => {
                        content.push(ToolResultContent::Text(text.clone()));
                    }
                    PartKind::InputImage { image_url, .. } => {
                        content.push(ToolResultContent::Image(image_url_to_block(
                            image_url.as_deref(),
                        )?));
                    }
                    PartKind::InputFile {
                        filename,
                        file_data,
                        file_type,
                        file_url,
                    } => content.push(ToolResultContent::Document(file_to_document(
                        filename.as_deref(),
                        file_data.as_deref(),
                        file_type.as_deref(),
                        file_url.as_deref(),
                    )?)),
                    other => {
                        tracing::debug!(?other, "skipping tool output part with no tool-result form");
                    }
                }
            }
            Ok(content)
        }
    }
}

#[must_use]
pub(crate) fn payload_to_result_content(payload: &ToolPayload) -> ToolResultContent {
    match payload.to_json_object() {
        Some(map) => ToolResultContent::Json(serde_json::Value::Object(map)),
        None => ToolResultContent::Text(payload.to_output_string()),
    }
}

// ---------------------------------------------------------------------------
// Converse blocks -> unified parts
// ---------------------------------------------------------------------------

/// # Errors
///
/// Fails when the image has no source.
pub(crate) fn image_to_part(image: &ImageBlock) -> Result<ContentPart, ConversionError> {
    let Some(ImageSource::Bytes(bytes)) = &image.source else {
        return Err(ConversionError::MissingPayload("image"));
    };
    Ok(ContentPart::new(PartKind::InputImage {
        image_url: Some(format_data_uri(image.format.media_type(), bytes)),
        detail: None,
    }))
}

/// # Errors
///
/// Fails when the document has no source.
pub(crate) fn document_to_part(document: &DocumentBlock) -> Result<ContentPart, ConversionError> {
    let file_type = document_format_to_file_type(document.format);
    let file_data = match &document.source {
        Some(DocumentSource::Bytes(bytes)) => {
            if bytes.starts_with("data:") {
                bytes.clone()
            } else {
                format_data_uri(file_type, bytes)
            }
        }
        Some(DocumentSource::Text(text)) => text.clone(),
        None => return Err(ConversionError::MissingPayload("document")),
    };
    Ok(ContentPart::new(PartKind::InputFile {
        filename: Some(normalize_document_name(&document.name)),
        file_data: Some(file_data),
        file_type: Some(file_type.to_string()),
        file_url: None,
    }))
}

/// Render tool-result content as the unified output string.
///
/// The first JSON entry wins; otherwise the first text entry; otherwise empty.
#[must_use]
pub(crate) fn result_content_to_output(content: &[ToolResultContent]) -> String {
    let json = content.iter().find_map(|entry| match entry {
        ToolResultContent::Json(value) => Some(value),
        _ => None,
    });
    if let Some(value) = json {
        return value.to_string();
    }
    content
        .iter()
        .find_map(|entry| match entry {
            ToolResultContent::Text(text) => Some(text.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::converse::{DocumentFormat, ImageFormat};
    use crate::protocol::responses::CacheControl;
    use serde_json::json;

    #[test]
    fn test_text_part_with_cache_hint_appends_cache_point() {
        let part = ContentPart::input_text("hello").with_cache_control(CacheControl::ephemeral());
        let mut out = Vec::new();
        part_to_blocks_into(&part, &mut out).unwrap();
        assert_eq!(
            out,
            vec![
                ContentBlock::Text("hello".to_string()),
                ContentBlock::CachePoint(CachePoint::default())
            ]
        );
    }

    #[test]
    fn test_image_data_uri() {
        let image = image_url_to_block(Some("data:image/png;base64,iVBORw0K")).unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.source, Some(ImageSource::Bytes("iVBORw0K".to_string())));
    }

    #[test]
    fn test_image_remote_url_rejected() {
        let err = image_url_to_block(Some("https://example.com/cat.png")).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidImage(_)));
        let err = image_url_to_block(None).unwrap_err();
        assert!(matches!(err, ConversionError::MissingPayload("input_image")));
    }

    #[test]
    fn test_audio_is_unsupported() {
        let part = ContentPart::new(PartKind::InputAudio {
            input_audio: json!({"data": "AAAA", "format": "wav"}),
        });
        let err = part_to_blocks_into(&part, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported(_)));
    }

    #[test]
    fn test_pdf_document_from_data_uri() {
        let document = file_to_document(
            Some("Q3 report.pdf"),
            Some("data:application/pdf;base64,JVBERi0="),
            Some("application/pdf"),
            None,
        )
        .unwrap();
        assert_eq!(document.format, DocumentFormat::Pdf);
        assert_eq!(document.name, "Q3 report");
        assert_eq!(document.source, Some(DocumentSource::Bytes("JVBERi0=".to_string())));
    }

    #[test]
    fn test_text_document_keeps_text() {
        let document = file_to_document(Some("notes.md"), Some("# Title"), None, None).unwrap();
        assert_eq!(document.format, DocumentFormat::Txt);
        assert_eq!(document.source, Some(DocumentSource::Text("# Title".to_string())));
    }

    #[test]
    fn test_document_without_payload() {
        let err = file_to_document(Some("a.pdf"), None, None, None).unwrap_err();
        assert!(matches!(err, ConversionError::MissingPayload("input_file")));
        let err = file_to_document(None, None, None, Some("https://x/y.pdf")).unwrap_err();
        assert!(matches!(err, ConversionError::Unsupported(_)));
    }

    #[test]
    fn test_function_output_classification() {
        let content =
            function_output_to_result_content(&FunctionOutput::Text(r#"{"temp":72}"#.to_string()))
                .unwrap();
        assert_eq!(content, vec![ToolResultContent::Json(json!({"temp": 72}))]);

        let content =
            function_output_to_result_content(&FunctionOutput::Text("[1,2]".to_string())).unwrap();
        assert_eq!(content, vec![ToolResultContent::Json(json!({"results": [1, 2]}))]);

        let content =
            function_output_to_result_content(&FunctionOutput::Text("sunny".to_string())).unwrap();
        assert_eq!(content, vec![ToolResultContent::Text("sunny".to_string())]);
    }

    #[test]
    fn test_result_content_prefers_json() {
        let content = vec![
            ToolResultContent::Text("fallback".to_string()),
            ToolResultContent::Json(json!({"ok": true})),
        ];
        assert_eq!(result_content_to_output(&content), r#"{"ok":true}"#);
        assert_eq!(
            result_content_to_output(&[ToolResultContent::Text("plain".to_string())]),
            "plain"
        );
        assert_eq!(result_content_to_output(&[]), "");
    }

    #[test]
    fn test_document_to_part() {
        let part = document_to_part(&DocumentBlock {
            format: DocumentFormat::Pdf,
            name: "report".to_string(),
            source: Some(DocumentSource::Bytes("JVBERi0=".to_string())),
        })
        .unwrap();
        assert_eq!(
            part.kind,
            PartKind::InputFile {
                filename: Some("report".to_string()),
                file_data: Some("data:application/pdf;base64,JVBERi0=".to_string()),
                file_type: Some("application/pdf".to_string()),
                file_url: None,
            }
        );
    }

    #[test]
    fn test_image_to_part_requires_source() {
        let err = image_to_part(&ImageBlock {
            format: ImageFormat::Gif,
            source: None,
        })
        .unwrap_err();
        assert!(matches!(err, ConversionError::MissingPayload("image")));
    }
}
