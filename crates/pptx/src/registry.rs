//! Template registry: resolves a [`TemplateSelector`] to a loaded template.
//!
//! Built-in templates are loaded at most once per registry and shared
//! read-only afterwards. Uploaded templates are parsed per request and are
//! never cached.

use crate::builtin::builtin_id;
use crate::template::Template;
use carousel_core::{ColorVariant, Language, Result, TemplateSelector};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

static GLOBAL: OnceLock<TemplateRegistry> = OnceLock::new();

/// Entry of [`TemplateRegistry::list_templates`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub color_variant: ColorVariant,
}

#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates_dir: Option<PathBuf>,
    cache: RwLock<HashMap<(Language, ColorVariant), Arc<Template>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read built-in templates from `<dir>/<id>.pptx` when such a file
    /// exists, instead of rendering them in memory.
    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(dir.into());
        self
    }

    /// The process-wide registry.
    pub fn global() -> &'static TemplateRegistry {
        GLOBAL.get_or_init(TemplateRegistry::new)
    }

    /// Install a configured registry as the process-wide one. Returns the
    /// registry back if one was already installed or used.
    pub fn install_global(registry: TemplateRegistry) -> std::result::Result<(), TemplateRegistry> {
        GLOBAL.set(registry)
    }

    pub fn templates_dir(&self) -> Option<&Path> {
        self.templates_dir.as_deref()
    }

    pub fn resolve(&self, selector: &TemplateSelector) -> Result<Arc<Template>> {
        match selector {
            TemplateSelector::BuiltIn {
                language,
                color_variant,
            } => self.builtin(*language, *color_variant),
            TemplateSelector::Uploaded {
                filename,
                language,
                bytes,
            } => {
                log::debug!("Parsing uploaded template '{}' ({} bytes)", filename, bytes.len());
                let template = Template::from_upload(filename, *language, bytes).map_err(|e| {
                    log::warn!("Rejected uploaded template '{}': {}", filename, e);
                    e
                })?;
                Ok(Arc::new(template))
            }
        }
    }

    /// A built-in template, loading it on first use.
    pub fn builtin(&self, language: Language, color_variant: ColorVariant) -> Result<Arc<Template>> {
        let key = (language, color_variant);

        if let Some(template) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(template));
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another request may have loaded it while we waited for the lock.
        if let Some(template) = cache.get(&key) {
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(self.load_builtin(language, color_variant)?);
        cache.insert(key, Arc::clone(&template));
        log::info!("Cached built-in template '{}'", template.id());
        Ok(template)
    }

    fn load_builtin(&self, language: Language, color_variant: ColorVariant) -> Result<Template> {
        if let Some(dir) = &self.templates_dir {
            let path = dir.join(format!("{}.pptx", builtin_id(language, color_variant)));
            if path.is_file() {
                log::debug!("Loading built-in template from {}", path.display());
                return Template::builtin_from_file(language, color_variant, &path);
            }
            log::debug!("{} not found, rendering built-in template", path.display());
        }
        Template::builtin(language, color_variant)
    }

    /// Load every built-in template now.
    pub fn preload(&self) -> Result<()> {
        for language in Language::ALL {
            for color_variant in ColorVariant::ALL {
                self.builtin(language, color_variant)?;
            }
        }
        Ok(())
    }

    /// Built-in templates available for a language.
    pub fn list_templates(&self, language: Language) -> Vec<TemplateSummary> {
        ColorVariant::ALL
            .iter()
            .map(|&color_variant| TemplateSummary {
                id: builtin_id(language, color_variant),
                color_variant,
            })
            .collect()
    }

    /// Number of built-in templates loaded so far.
    pub fn cached_count(&self) -> usize {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
