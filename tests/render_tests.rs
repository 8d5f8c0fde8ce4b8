//! Renderer tests: the HTML document round-trip and the failure signal.

use application_bot::localization::create_localization_manager;
use application_bot::questions::QuestionRepository;
use application_bot::render::{DocumentRenderer, HtmlRenderer, RenderRequest};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn make_renderer(output_dir: PathBuf) -> HtmlRenderer {
    let dir = tempfile::tempdir().unwrap();
    let questions_path = dir.path().join("questions.json");
    fs::write(
        &questions_path,
        r#"[{"id":"name","text":"Your name?"},{"id":"city","text":"Your city?"}]"#,
    )
    .unwrap();

    let questions = Arc::new(QuestionRepository::load(&questions_path).unwrap());
    let localization = create_localization_manager("en").unwrap();
    HtmlRenderer::new(output_dir, questions, localization)
}

#[test]
fn renders_answers_and_photos() {
    let out = tempfile::tempdir().unwrap();
    let photos = tempfile::tempdir().unwrap();

    let photo_path = photos.path().join("p.jpg");
    fs::write(&photo_path, b"\x89PNG\r\n\x1a\n0000").unwrap();

    let mut answers = HashMap::new();
    answers.insert("name".to_string(), "Alice <script>".to_string());
    answers.insert("city".to_string(), "Riga".to_string());

    let renderer = make_renderer(out.path().to_path_buf());
    let request = RenderRequest {
        user_id: 42,
        username: Some("alice"),
        answers: &answers,
        photo_paths: &[photo_path],
        lang: "en",
    };

    let path = renderer.render(&request).unwrap();
    assert!(path.exists());
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("application_42_"));
    assert!(name.ends_with(".html"));

    let html = fs::read_to_string(&path).unwrap();
    assert!(html.contains("Your name?"));
    assert!(html.contains("Riga"));
    // User content is escaped, not interpreted
    assert!(html.contains("Alice &lt;script&gt;"));
    assert!(!html.contains("Alice <script>"));
    // The photo is embedded, not referenced
    assert!(html.contains("data:image/png;base64,"));
    assert!(html.contains("alice"));
}

#[test]
fn missing_answers_get_a_placeholder() {
    let out = tempfile::tempdir().unwrap();
    let renderer = make_renderer(out.path().to_path_buf());

    let answers = HashMap::new();
    let request = RenderRequest {
        user_id: 7,
        username: None,
        answers: &answers,
        photo_paths: &[],
        lang: "en",
    };

    let path = renderer.render(&request).unwrap();
    let html = fs::read_to_string(&path).unwrap();
    assert!(html.contains("No answer given"));
    // Absent username renders as the placeholder, not as an empty field
    assert!(html.contains("N/A"));
}

#[test]
fn unreadable_photo_degrades_to_placeholder() {
    let out = tempfile::tempdir().unwrap();
    let renderer = make_renderer(out.path().to_path_buf());

    let answers = HashMap::new();
    let request = RenderRequest {
        user_id: 7,
        username: Some("bob"),
        answers: &answers,
        photo_paths: &[PathBuf::from("gone/means/gone.jpg")],
        lang: "en",
    };

    // A missing photo file must not fail the whole document
    let path = renderer.render(&request).unwrap();
    let html = fs::read_to_string(&path).unwrap();
    assert!(html.contains("gone.jpg"));
    assert!(!html.contains("data:image"));
}

#[test]
fn unwritable_output_dir_is_a_failure_signal() {
    let dir = tempfile::tempdir().unwrap();
    // The "directory" is actually a file, so create_dir_all must fail
    let blocked = dir.path().join("blocked");
    fs::write(&blocked, b"file in the way").unwrap();

    let renderer = make_renderer(blocked);
    let answers = HashMap::new();
    let request = RenderRequest {
        user_id: 7,
        username: None,
        answers: &answers,
        photo_paths: &[],
        lang: "en",
    };

    assert!(renderer.render(&request).is_err());
}
