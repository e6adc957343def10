//! Root page handler - download form

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
};
use serde::Deserialize;

use crate::api::download::download_href;
use crate::models::job::DEFAULT_BITRATE_KBPS;
use crate::AppState;

/// Bitrates offered in the quality select
const QUALITY_CHOICES: [u32; 4] = [128, 192, 256, 320];

/// One-shot message carried over a redirect
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub flash: Option<String>,
    pub level: Option<String>,
    /// Finished file to link to
    pub file: Option<String>,
}

/// Minimal HTML escaping for text and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn render_flash(query: &FlashQuery) -> String {
    let Some(message) = query.flash.as_deref().filter(|m| !m.is_empty()) else {
        return String::new();
    };
    let level = match query.level.as_deref() {
        Some("success") => "success",
        _ => "error",
    };

    let link = query
        .file
        .as_deref()
        .and_then(download_href)
        .map(|href| {
            format!(
                r#" <a href="{}" class="alert-link">Click here to download</a>"#,
                escape_html(&href)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<div class="alert alert-{}" role="alert">{}{}</div>"#,
        level,
        escape_html(message),
        link
    )
}

fn render_quality_options() -> String {
    QUALITY_CHOICES
        .iter()
        .map(|kbps| {
            let selected = if *kbps == DEFAULT_BITRATE_KBPS { " selected" } else { "" };
            format!(r#"<option value="{0}"{1}>{0} kbps</option>"#, kbps, selected)
        })
        .collect::<Vec<_>>()
        .join("\n                    ")
}

/// GET /
///
/// URL form with quality select and a progress bar driven by download.js
///
/// A fresh form starts from idle: `GET /progress` stops reporting the
/// previous job. Per-job records are untouched.
pub async fn root_page(
    State(state): State<AppState>,
    Query(query): Query<FlashQuery>,
) -> impl IntoResponse {
    state.registry.clear_latest();

    let version = env!("CARGO_PKG_VERSION");
    let git_hash: String = env!("GIT_HASH").chars().take(8).collect();
    let build_profile = env!("BUILD_PROFILE");
    let build_timestamp = env!("BUILD_TIMESTAMP");

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>YouTube to MP3</title>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}
        body {{
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: #1a1a1a;
            color: #e0e0e0;
            line-height: 1.6;
        }}
        header {{
            background-color: #2a2a2a;
            border-bottom: 1px solid #3a3a3a;
            padding: 20px;
            margin-bottom: 30px;
            display: flex;
            justify-content: space-between;
            align-items: center;
        }}
        h1 {{
            font-size: 26px;
            color: #4a9eff;
        }}
        .build-info {{
            text-align: right;
            font-size: 13px;
            color: #888;
            font-family: 'Courier New', monospace;
            line-height: 1.2;
        }}
        main {{
            max-width: 640px;
            margin: 0 auto;
            padding: 0 20px;
        }}
        label {{
            display: block;
            margin: 12px 0 4px;
            color: #aaa;
        }}
        input[type=text], select {{
            width: 100%;
            padding: 10px;
            background: #2a2a2a;
            border: 1px solid #3a3a3a;
            border-radius: 4px;
            color: #e0e0e0;
        }}
        button {{
            margin-top: 16px;
            padding: 10px 24px;
            background: #4a9eff;
            border: none;
            border-radius: 4px;
            color: #fff;
            font-weight: 600;
            cursor: pointer;
        }}
        button:disabled {{
            background: #555;
            cursor: default;
        }}
        .flashes .alert {{
            padding: 10px 14px;
            border-radius: 4px;
            margin-bottom: 10px;
        }}
        .alert-success {{
            background: #10403a;
            border: 1px solid #10b981;
        }}
        .alert-error {{
            background: #4a1d1d;
            border: 1px solid #ef4444;
        }}
        .alert-link {{
            color: #fff;
            font-weight: 600;
        }}
        #progressContainer {{
            display: none;
            margin-top: 24px;
        }}
        .progress {{
            height: 20px;
            background: #2a2a2a;
            border-radius: 10px;
            overflow: hidden;
        }}
        #progressBar {{
            height: 100%;
            width: 0%;
            background: #4a9eff;
            transition: width 0.3s;
        }}
        #progressBar.failed {{
            background: #ef4444;
        }}
        .progress-info {{
            display: flex;
            justify-content: space-between;
            margin-top: 6px;
            color: #aaa;
        }}
    </style>
</head>
<body>
    <header>
        <h1>YouTube to MP3</h1>
        <div class="build-info">
            <div>af-dl v{version}</div>
            <div>{git_hash} ({build_profile})</div>
            <div>{build_timestamp}</div>
        </div>
    </header>
    <main>
        <div class="flashes">{flash}</div>
        <form id="downloadForm" method="post" action="/">
            <input type="hidden" name="job_id" id="job_id" value="">
            <label for="youtube_url">YouTube URL</label>
            <input type="text" name="youtube_url" id="youtube_url"
                   placeholder="https://www.youtube.com/watch?v=..." required>
            <label for="quality">Quality</label>
            <select name="quality" id="quality">
                    {options}
            </select>
            <button type="submit" id="downloadButton">Download MP3</button>
        </form>
        <div id="progressContainer">
            <div class="progress"><div id="progressBar"></div></div>
            <div class="progress-info">
                <span id="progressStatus">Preparing download...</span>
                <span id="progressPercent">0%</span>
            </div>
        </div>
    </main>
    <script src="/static/download.js"></script>
</body>
</html>
"#,
        version = version,
        git_hash = git_hash,
        build_profile = build_profile,
        build_timestamp = build_timestamp,
        flash = render_flash(&query),
        options = render_quality_options(),
    ))
}
