//! Template rendering using minijinja with embedded templates.

use minijinja::{Environment, Error as JinjaError, ErrorKind};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use rust_embed::Embed;
use serde::Serialize;

use crate::share::{FileEntry, ShareDuration, ShareListing, ShareToken};

/// Embedded HTML templates.
#[derive(Embed)]
#[folder = "templates/"]
pub struct Templates;

/// A template engine for the sender and receiver pages.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with embedded templates.
    pub fn new() -> Result<Self, JinjaError> {
        let mut env = Environment::new();

        for file in Templates::iter() {
            let filename = file.to_string();
            if let Some(content) = Templates::get(&filename) {
                let template_str = std::str::from_utf8(content.data.as_ref())
                    .map_err(|_| JinjaError::from(ErrorKind::InvalidOperation))?;
                env.add_template_owned(filename, template_str.to_string())?;
            }
        }

        Ok(Self { env })
    }

    /// Render the sender page.
    pub fn render_index(
        &self,
        base_url: &str,
        default_duration: ShareDuration,
    ) -> Result<String, JinjaError> {
        let template = self.env.get_template("index.html")?;
        template.render(minijinja::context! {
            base_url => base_url,
            default_duration => default_duration.to_string(),
            durations => duration_choices(),
        })
    }

    /// Render the receiver page of a live share.
    pub fn render_share(&self, share: &ShareView) -> Result<String, JinjaError> {
        let template = self.env.get_template("share.html")?;
        template.render(minijinja::context! { share => share })
    }

    /// Render the page shown for a revoked or expired share.
    pub fn render_gone(&self, reason: &str) -> Result<String, JinjaError> {
        let template = self.env.get_template("gone.html")?;
        template.render(minijinja::context! { reason => reason })
    }

    /// Render the page shown for a link that never existed.
    pub fn render_not_found(&self, detail: &str) -> Result<String, JinjaError> {
        let template = self.env.get_template("not_found.html")?;
        template.render(minijinja::context! { detail => detail })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new().expect("failed to initialize template engine")
    }
}

/// One option of the duration selector.
#[derive(Debug, Clone, Serialize)]
pub struct DurationChoice {
    pub value: String,
    pub label: &'static str,
}

fn duration_choices() -> Vec<DurationChoice> {
    [
        (ShareDuration::Manual, "Until I revoke it"),
        (ShareDuration::Minutes(10), "10 minutes"),
        (ShareDuration::Minutes(60), "1 hour"),
        (ShareDuration::Minutes(24 * 60), "1 day"),
    ]
    .into_iter()
    .map(|(duration, label)| DurationChoice {
        value: duration.to_string(),
        label,
    })
    .collect()
}

/// A view model for a share's receiver page and its JSON listing.
#[derive(Debug, Clone, Serialize)]
pub struct ShareView {
    pub token: String,
    pub files: Vec<FileView>,
    pub total_bytes: u64,
    pub total_size: String,
    pub bundle_url: String,
}

impl ShareView {
    pub fn new(token: &ShareToken, listing: &ShareListing) -> Self {
        Self {
            token: token.to_string(),
            files: listing
                .files
                .iter()
                .map(|entry| FileView::new(token, entry))
                .collect(),
            total_bytes: listing.total_bytes,
            total_size: human_size(listing.total_bytes),
            bundle_url: format!("/bundle/{token}"),
        }
    }
}

/// A view model for one downloadable file.
#[derive(Debug, Clone, Serialize)]
pub struct FileView {
    pub name: String,
    pub size_bytes: u64,
    pub size: String,
    pub url: String,
}

impl FileView {
    pub fn new(token: &ShareToken, entry: &FileEntry) -> Self {
        Self {
            name: entry.name.clone(),
            size_bytes: entry.size_bytes,
            size: human_size(entry.size_bytes),
            url: download_path(token, &entry.name),
        }
    }
}

/// Relative URL that downloads one file of a share.
pub fn download_path(token: &ShareToken, name: &str) -> String {
    format!(
        "/download/{}/{}",
        token,
        utf8_percent_encode(name, NON_ALPHANUMERIC)
    )
}

/// Format a byte count the way the receiver page shows it.
pub fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    const GIB: u64 = MIB * 1024;

    if bytes < KIB {
        format!("{bytes} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else if bytes < GIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GIB as f64)
    }
}
