//! Requester and operator message texts (Markdown).

use chrono::{DateTime, Utc};

use dropkeep_core::types::format::escape_md;

/// Longest description forwarded to operators, in characters.
pub const DESCRIPTION_LIMIT: usize = 1500;

/// Label of the inline button that stops a transfer.
pub const STOP_BUTTON: &str = "Stop";

/// Label of the operator button that opens a chat with the author.
pub const CONTACT_BUTTON: &str = "Send Message";

/// Prefix of stop-button callback data, followed by the job id.
pub const STOP_CALLBACK_PREFIX: &str = "stop ";

/// Callback data of the stop button for `job_id`.
pub fn stop_callback(job_id: &str) -> String {
    format!("{STOP_CALLBACK_PREFIX}{job_id}")
}

pub fn starting_download() -> String {
    "▶️ Starting download…".to_string()
}

pub fn download_progress(
    filename: &str,
    got: &str,
    total: &str,
    percent: f64,
    speed: &str,
    eta: &str,
) -> String {
    format!(
        "Downloading: `{}`\n**{got}/{total} ({percent:.2}%)**\nSpeed: ~{speed}/s • {eta} left",
        escape_md(filename)
    )
}

pub fn download_success_user(filename: &str, size: &str, took: &str, speed: &str) -> String {
    format!(
        "✅ Done! The file is saved.\n• Name: `{}`\n• Size: {size}\nThanks for waiting.\n\nDetails: took {took} • speed ~{speed}/s",
        escape_md(filename)
    )
}

pub fn download_infected_user(filename: &str, signature: &str) -> String {
    format!(
        "❌ A threat was detected in the file, so it was removed.\n• Name: `{}`\n• Signature: `{}`\nIf you think this is a mistake, send another version or contact us.",
        escape_md(filename),
        escape_md(signature)
    )
}

pub fn download_failed_user(filename: &str) -> String {
    format!(
        "❌ The file could not be downloaded.\n• Name: `{}`\nPlease try again or send it in another format.",
        escape_md(filename)
    )
}

pub fn download_cancelled_user(filename: &str) -> String {
    format!(
        "🛑 Download of `{}` was cancelled at your request. Nothing was kept on the server.",
        escape_md(filename)
    )
}

pub fn file_added(path: &str) -> String {
    format!(
        "✅ `{}` was added to the download queue.\nI will let you know once it is done.",
        escape_md(path)
    )
}

pub fn file_exists(path: &str) -> String {
    format!(
        "ℹ️ This file is already in storage:\n• `{}`\n\n**Want to upload it anyway?**\nSend the file again with the caption `> new_name.ext` and it will be stored under the new name.\n**Note:** a caption starting with `>` is taken as the *file name*, so no description is forwarded.",
        escape_md(path)
    )
}

pub fn file_rejected(name: &str) -> String {
    format!(
        "⚠️ `{}` is not a valid file name. Send the file again with the caption `> new_name.ext`.",
        escape_md(name)
    )
}

pub fn admin_upload_started(
    channel: &str,
    filename: &str,
    resolution: Option<&str>,
    author: &str,
) -> String {
    let mut file_line = format!("- File: `{}`", escape_md(filename));
    if let Some(res) = resolution {
        file_line.push_str(&format!(" ({res})"));
    }
    [
        format!("🆕 New upload request from #{channel}"),
        file_line,
        format!("- From: {author}"),
    ]
    .join("\n")
}

/// Fields of the operator summary sent when a job finishes.
#[derive(Debug, Clone)]
pub struct UploadSummary<'a> {
    pub channel: &'a str,
    pub author: &'a str,
    pub filename: &'a str,
    pub resolution: Option<&'a str>,
    pub size: &'a str,
    /// `clean`, `infected:<signature>` or `error`.
    pub av_status: &'a str,
    pub retention_days: u32,
    /// Planned deletion, only when the file is kept.
    pub delete_on: Option<DateTime<Utc>>,
    pub description: Option<&'a str>,
}

pub fn admin_upload_finished(s: &UploadSummary<'_>) -> String {
    let mut lines = vec![
        "📥 Upload finished".to_string(),
        format!("- From: #{} (account: {})", s.channel, s.author),
    ];
    let mut file_line = format!("- File: `{}`", escape_md(s.filename));
    if let Some(res) = s.resolution {
        file_line.push_str(&format!(" ({res})"));
    }
    lines.push(file_line);
    lines.push(format!("- Size: **{}**", s.size));

    let retention_line = s.delete_on.map(|on| {
        format!(
            "- Retention: {} days · auto-delete **{}**",
            s.retention_days,
            on.format("%Y-%m-%d")
        )
    });
    if let Some(signature) = s.av_status.strip_prefix("infected:") {
        lines.push(format!(
            "- Antivirus: ❌ Threat detected (`{}`)",
            escape_md(signature)
        ));
        lines.push("- Status: file removed for safety".to_string());
    } else if s.av_status == "error" {
        lines.push("- Antivirus: ⚠️ Scan failed (file kept)".to_string());
        lines.extend(retention_line);
    } else {
        lines.push("- Antivirus: ✅ Clean".to_string());
        lines.extend(retention_line);
    }

    if let Some(desc) = s.description.map(str::trim).filter(|d| !d.is_empty()) {
        lines.push(String::new());
        lines.push("**Description**".to_string());
        lines.push(escape_md(&truncate_description(desc)));
    }
    lines.join("\n")
}

/// Cut `desc` to [`DESCRIPTION_LIMIT`] characters, marking the cut.
pub fn truncate_description(desc: &str) -> String {
    match desc.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((idx, _)) => format!("{}…", &desc[..idx]),
        None => desc.to_string(),
    }
}

pub fn retention_warning(filename: &str, age_days: u32, delete_in_days: u32) -> String {
    format!(
        "⚠️ `{}` has been stored for {age_days} days and will be deleted in {delete_in_days} days.",
        escape_md(filename)
    )
}

pub fn retention_deleted(filename: &str, age_days: u32) -> String {
    format!("🧹 Deleted `{}` (age: {age_days} days).", escape_md(filename))
}

pub fn start_text() -> String {
    concat!(
        "👋 Hello!\n",
        "Send me a file and I will store it on the server.\n",
        "To rename it, set the caption to `> new_name.ext`.\n",
        "Need help? Send /help."
    )
    .to_string()
}

pub fn help_text() -> String {
    [
        "📘 **Help**",
        "",
        "**How it works**",
        "• Send a file and it is saved to the server storage.",
        "• A progress message with a **Stop** button follows every upload.",
        "",
        "**File names**, in priority order:",
        "• a caption starting with `>` is the file name (no description is forwarded);",
        "• the original file name;",
        "• `File-<chat>-<message>`.",
        "",
        "**Descriptions**",
        "• A plain caption, or a text message sent just before the file, is forwarded to the operators.",
        "",
        "**Commands**",
        "• /start: short introduction",
        "• /help: this help",
        "• /use `<folder>`: store new files in a subfolder",
        "• /leave: go back to the root folder",
        "• /get: show the current folder",
    ]
    .join("\n")
}

pub fn not_admin() -> String {
    "You aren't my admin :)".to_string()
}

pub fn unsupported_media() -> String {
    concat!(
        "ℹ️ This kind of message is not supported.\n",
        "Please send the file as a document, photo, video or audio. ",
        "Voice notes, stickers and locations are not accepted."
    )
    .to_string()
}

pub fn folder_missing() -> String {
    "You haven't told me where to put your files!".to_string()
}

pub fn folder_set(folder: &str) -> String {
    format!(
        "📁 OK, new files go to `{}`. Send /leave to return to the root folder.",
        escape_md(folder)
    )
}

pub fn folder_reset() -> String {
    "📁 Back in the root folder.".to_string()
}

pub fn folder_current(folder: Option<&str>) -> String {
    match folder {
        Some(folder) => format!("📁 Current folder: `{}`", escape_md(folder)),
        None => "📁 Current folder: root".to_string(),
    }
}

/// Short answer shown on the button after a stop request.
pub fn stop_answer(found: bool) -> &'static str {
    if found { "Stopping..." } else { "Nothing to stop" }
}
