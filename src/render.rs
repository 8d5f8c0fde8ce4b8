//! Application document rendering.
//!
//! The finalization pipeline talks to a [`DocumentRenderer`]; the artifact
//! format is an implementation detail behind the trait. The shipping
//! [`HtmlRenderer`] writes a single self-contained HTML file with the
//! collected photos embedded as base64 data URIs, so the document survives
//! being forwarded around without its photo files.

use crate::errors::{AppError, AppResult};
use crate::localization::{t_args_lang, t_lang, LocalizationManager};
use crate::questions::QuestionRepository;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything the renderer needs about one finished application
pub struct RenderRequest<'a> {
    pub user_id: u64,
    pub username: Option<&'a str>,
    pub answers: &'a HashMap<String, String>,
    pub photo_paths: &'a [PathBuf],
    pub lang: &'a str,
}

/// Renders a finished application into a single document file.
///
/// Implementations signal failure through the error value and never panic;
/// the pipeline turns any error into a user-facing failure notice.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest<'_>) -> AppResult<PathBuf>;
}

/// Self-contained HTML document renderer
pub struct HtmlRenderer {
    output_dir: PathBuf,
    questions: Arc<QuestionRepository>,
    localization: Arc<LocalizationManager>,
}

impl HtmlRenderer {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        questions: Arc<QuestionRepository>,
        localization: Arc<LocalizationManager>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            questions,
            localization,
        }
    }

    fn build_document(&self, request: &RenderRequest<'_>) -> String {
        let loc = self.localization.as_ref();
        let lang = request.lang;

        let title = t_lang(loc, "document-header", lang);
        let username_display = request
            .username
            .map(|u| u.to_string())
            .unwrap_or_else(|| t_lang(loc, "username-placeholder", lang));
        let applicant_line = t_args_lang(
            loc,
            "document-applicant-info",
            &[
                ("username", username_display),
                ("user_id", request.user_id.to_string()),
            ],
            lang,
        );
        let submitted_line = t_args_lang(
            loc,
            "document-submission-time",
            &[(
                "submission_time",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            )],
            lang,
        );

        let mut body = String::new();
        body.push_str(&format!("<h1>{}</h1>\n", escape_html(&title)));
        body.push_str(&format!("<p>{}</p>\n", escape_html(&applicant_line)));
        body.push_str(&format!("<p>{}</p>\n", escape_html(&submitted_line)));

        for path in request.photo_paths {
            match photo_data_uri(path) {
                Ok(uri) => body.push_str(&format!("<p><img src=\"{uri}\" width=\"320\"></p>\n")),
                Err(e) => {
                    // A broken photo degrades to a placeholder line, it does
                    // not fail the whole document.
                    warn!(path = %path.display(), error = %e, "Could not embed photo in document");
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    let placeholder =
                        t_args_lang(loc, "document-photo-missing", &[("name", name)], lang);
                    body.push_str(&format!("<p><em>{}</em></p>\n", escape_html(&placeholder)));
                }
            }
        }

        let not_answered = t_lang(loc, "not-answered-placeholder", lang);
        for question in self.questions.snapshot() {
            let answer = request
                .answers
                .get(&question.id)
                .map(String::as_str)
                .unwrap_or(&not_answered);
            body.push_str(&format!("<h3>{}</h3>\n", escape_html(&question.text)));
            body.push_str(&format!("<p>{}</p>\n", escape_html(answer)));
        }

        format!(
            "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}</body>\n</html>\n",
            escape_html(&title)
        )
    }
}

impl DocumentRenderer for HtmlRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> AppResult<PathBuf> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            AppError::Render(format!(
                "Could not create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("application_{}_{timestamp}.html", request.user_id);
        let path = self.output_dir.join(filename);

        let document = self.build_document(request);

        if let Err(e) = fs::write(&path, document) {
            // Do not leave a partial document behind
            let _ = fs::remove_file(&path);
            return Err(AppError::Render(format!(
                "Could not write document {}: {e}",
                path.display()
            )));
        }

        info!(
            user_id = request.user_id,
            path = %path.display(),
            "Application document rendered"
        );
        Ok(path)
    }
}

/// Encode a photo file as a data URI, sniffing the MIME type from the bytes
fn photo_data_uri(path: &Path) -> AppResult<String> {
    let bytes = fs::read(path)
        .map_err(|e| AppError::FileSystem(format!("Could not read photo {}: {e}", path.display())))?;

    // Telegram photos are JPEG; sniff anyway and fall back rather than fail
    let mime = image::guess_format(&bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg");

    Ok(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
