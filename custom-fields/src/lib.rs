//! Schema-driven field rendering and value synchronization
//!
//! `custom-fields` renders admin forms from a declarative list of field
//! descriptors. It is headless: rendering produces a [`Node`] tree that
//! serializes to HTML, and every outside collaborator (remote option
//! endpoints, rich-text and code editor widgets) sits behind a trait.
//!
//! # Architecture
//!
//! - **Registry**: field type identifier → [`FieldRenderer`]; unknown types
//!   render an inert placeholder instead of failing the form
//! - **Group renderer**: [`FieldGroup`] mounts one instance per descriptor,
//!   keeps it across render passes, and threads the nesting level down
//! - **Value sync**: [`FieldValue`] keeps local edits apart from the value the
//!   form keeps re-supplying and only reports real changes
//! - **Remote options**: [`OptionSource`] debounces queries and applies only
//!   the newest initiated session
//! - **Editors**: [`EditorAdapter`] binds a field value to an opaque widget by
//!   polling or by change events
//!
//! # Trust boundary
//!
//! Titles, descriptions and option labels are [`TrustedMarkup`] and are
//! emitted unescaped. The producer of the form schema sanitizes them.
//!
//! ```rust,ignore
//! let ctx = FormContext::builder(FieldsConfig::load()?).build();
//! let mut form = FieldGroup::root(ctx, Arc::new(|id, value| println!("{id} = {value}")));
//! let html = to_html(&form.render(&descriptor.items));
//! ```

pub mod config;
pub mod context;
pub mod editor;
pub mod error;
pub mod fields;
pub mod group;
pub mod markup;
pub mod normalizer;
pub mod registry;
pub mod remote;
pub mod selection;
pub mod submission;
pub mod summary;
pub mod types;

pub use config::{ApiConfig, ConfigError, FieldsConfig};
pub use context::{FormContext, FormContextBuilder};
pub use editor::{
    EditorAdapter, EditorBinding, EditorEvent, EditorHost, EditorKind, EditorWidget, KeyPress,
    MemoryEditorHost, Propagation, SyncMode,
};
pub use error::{FieldsError, Result};
pub use group::{to_html, ChangeSink, FieldGroup, RenderedField};
pub use markup::{Element, Node, TrustedMarkup};
pub use normalizer::{FieldValue, GeneratorRegistry, OnChange, ValueSync};
pub use registry::{FieldEvent, FieldInstance, FieldRegistry, FieldRenderer, MountContext};
pub use remote::{HttpOptionFetcher, OptionFetcher, OptionQuery, OptionSource};
pub use selection::SelectionList;
pub use submission::Submission;
pub use summary::{summarize, SummaryLine};
pub use types::{FieldDescriptor, FieldOption, FormDescriptor, ObjectType, SettingsTab};
