//! FormContext: everything the fields of one form share.
//!
//! Holds the field registry, the generator pipelines, the remote option
//! fetcher, the editor host and the configuration. Built once per form with
//! [`FormContext::builder`] and shared by every mounted field via `Arc`.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::config::FieldsConfig;
use crate::editor::{EditorHost, MemoryEditorHost};
use crate::normalizer::GeneratorRegistry;
use crate::registry::FieldRegistry;
use crate::remote::{HttpOptionFetcher, OptionFetcher};
use crate::types::FieldDescriptor;

/// Builder for `FormContext`. Created by `FormContext::builder()`.
pub struct FormContextBuilder {
    config: FieldsConfig,
    registry: Option<FieldRegistry>,
    generators: Option<GeneratorRegistry>,
    fetcher: Option<Arc<dyn OptionFetcher>>,
    editor_host: Option<Arc<dyn EditorHost>>,
}

impl FormContextBuilder {
    /// Use a custom field registry instead of the built-in kinds.
    pub fn with_registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use custom generator pipelines instead of the built-in ones.
    pub fn with_generators(mut self, generators: GeneratorRegistry) -> Self {
        self.generators = Some(generators);
        self
    }

    /// Fetch remote options through `fetcher` instead of HTTP.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn OptionFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Mount editor widgets through `host`.
    pub fn with_editor_host(mut self, host: Arc<dyn EditorHost>) -> Self {
        self.editor_host = Some(host);
        self
    }

    pub fn build(self) -> Arc<FormContext> {
        let registry = self.registry.unwrap_or_else(FieldRegistry::with_defaults);
        let generators = self.generators.unwrap_or_else(GeneratorRegistry::with_defaults);
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| {
                Arc::new(HttpOptionFetcher::new(self.config.api.clone())) as Arc<dyn OptionFetcher>
            });
        let editor_host = self
            .editor_host
            .unwrap_or_else(|| Arc::new(MemoryEditorHost::new()) as Arc<dyn EditorHost>);

        debug!(
            field_types = registry.field_types().len(),
            api = %self.config.api.url,
            "form context built"
        );

        Arc::new(FormContext {
            config: self.config,
            registry,
            generators,
            fetcher,
            editor_host,
        })
    }
}

pub struct FormContext {
    config: FieldsConfig,
    registry: FieldRegistry,
    generators: GeneratorRegistry,
    fetcher: Arc<dyn OptionFetcher>,
    editor_host: Arc<dyn EditorHost>,
}

impl FormContext {
    /// Start building a context for the given configuration.
    ///
    /// ```rust,ignore
    /// let ctx = FormContext::builder(FieldsConfig::load()?)
    ///     .with_editor_host(host)
    ///     .build();
    /// ```
    pub fn builder(config: FieldsConfig) -> FormContextBuilder {
        FormContextBuilder {
            config,
            registry: None,
            generators: None,
            fetcher: None,
            editor_host: None,
        }
    }

    pub fn config(&self) -> &FieldsConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    pub fn fetcher(&self) -> Arc<dyn OptionFetcher> {
        self.fetcher.clone()
    }

    pub fn editor_host(&self) -> Arc<dyn EditorHost> {
        self.editor_host.clone()
    }

    /// Element id for a field id.
    pub fn html_id(&self, id: &str) -> String {
        format!("{}{}", self.config.html_id_prefix, id)
    }

    /// Working value of a descriptor after its generator pipeline.
    pub fn normalize(&self, descriptor: &FieldDescriptor) -> Value {
        self.generators.normalize(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let ctx = FormContext::builder(FieldsConfig::default()).build();
        assert!(ctx.registry().contains("wysiwyg"));
        assert!(ctx.generators().contains(crate::normalizer::UUID_GENERATOR));
        assert_eq!(ctx.html_id("price"), "price");
    }

    #[test]
    fn test_html_id_prefix_and_custom_generators() {
        let config = FieldsConfig {
            html_id_prefix: "wcf-".into(),
            ..Default::default()
        };
        let mut generators = GeneratorRegistry::new();
        generators.register("double", |v, _| json!(v.as_i64().unwrap_or(0) * 2));
        let ctx = FormContext::builder(config)
            .with_generators(generators)
            .build();

        assert_eq!(ctx.html_id("price"), "wcf-price");
        let descriptor = FieldDescriptor::new("price", "number")
            .with_value(21)
            .with_generator("double");
        assert_eq!(ctx.normalize(&descriptor), json!(42));
    }
}
