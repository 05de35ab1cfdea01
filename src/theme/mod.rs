//! Theme engine
//!
//! Server-side rendering with Tera. Templates come from
//! `<themes_path>/<active>/` when that directory exists; otherwise the
//! bundled `aznews` theme compiled into the binary is used.

use anyhow::{Context, Result};
use rust_embed::RustEmbed;
use std::error::Error as StdError;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::ThemeError;

/// Bundled default theme
#[derive(RustEmbed)]
#[folder = "themes/aznews/"]
#[include = "*.html"]
struct BundledTheme;

/// Where the loaded templates came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    Directory(PathBuf),
    Bundled,
}

pub struct ThemeEngine {
    tera: Tera,
    name: String,
    source: ThemeSource,
}

impl ThemeEngine {
    pub fn new(themes_path: &Path, active: &str) -> Result<Self> {
        let theme_dir = themes_path.join(active);
        if theme_dir.is_dir() {
            let mut templates = Vec::new();
            collect_templates(&theme_dir, &theme_dir, &mut templates)?;
            let tera = build_tera(templates)?;
            tracing::info!("Loaded theme '{}' from {:?}", active, theme_dir);
            return Ok(Self {
                tera,
                name: active.to_string(),
                source: ThemeSource::Directory(theme_dir),
            });
        }

        tracing::warn!(
            "Theme directory {:?} not found, using the bundled theme",
            theme_dir
        );
        Self::bundled()
    }

    /// Engine over the templates compiled into the binary
    pub fn bundled() -> Result<Self> {
        let mut templates = Vec::new();
        for name in BundledTheme::iter() {
            let file = BundledTheme::get(&name)
                .ok_or_else(|| ThemeError::NotFound(name.to_string()))?;
            let content = String::from_utf8(file.data.into_owned())
                .with_context(|| format!("Bundled template {} is not UTF-8", name))?;
            templates.push((name.to_string(), content));
        }

        Ok(Self {
            tera: build_tera(templates)?,
            name: "aznews".to_string(),
            source: ThemeSource::Bundled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ThemeSource {
        &self.source
    }

    pub fn has_template(&self, template: &str) -> bool {
        self.tera.get_template_names().any(|name| name == template)
    }

    /// Render a template, flattening Tera's error chain into the message
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera.render(template, context).map_err(|e| {
            ThemeError::TemplateError(format!(
                "Failed to render '{}': {}",
                template,
                error_chain(&e)
            ))
            .into()
        })
    }
}

/// Register all templates in one batch; parents and macro files may come in any order
fn build_tera(mut templates: Vec<(String, String)>) -> Result<Tera> {
    templates.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut tera = Tera::default();
    tera.add_raw_templates(templates).map_err(|e| {
        ThemeError::TemplateError(format!("Failed to load templates: {}", error_chain(&e)))
    })?;
    Ok(tera)
}

/// Tera hides the useful part of an error in its source chain
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  Caused by: {}", cause));
        source = cause.source();
    }
    message
}

fn collect_templates(
    base: &Path,
    dir: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<()> {
    for entry in fs::read_dir(dir).map_err(ThemeError::IoError)? {
        let path = entry.map_err(ThemeError::IoError)?.path();
        if path.is_dir() {
            collect_templates(base, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let name = path
                .strip_prefix(base)
                .map_err(|_| ThemeError::TemplateError(format!("Bad template path {:?}", path)))?
                .to_string_lossy()
                .replace('\\', "/");
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {:?}", path))?;
            templates.push((name, content));
        }
    }
    Ok(())
}
