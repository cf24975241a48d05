//! Document loading
//!
//! The [`Loader`] is the entry point: it turns a path into a [`Source`],
//! reads and parses the document, and hands the value to the link resolver
//! so that every nested reference is inlined.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::expand::Variables;
use crate::link;
use crate::repository::{CommandRunner, ProcessRunner, Repository, RepositoryOptions};
use crate::source::Source;

/// Options for loading documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Repository access settings
    pub repository: RepositoryOptions,
}

impl LoaderOptions {
    /// Use a different git executable
    pub fn with_git_program(mut self, program: impl Into<String>) -> Self {
        self.repository.git_program = program.into();
        self
    }

    /// Revision read for repository sources that do not name one
    pub fn with_default_revision(mut self, revision: impl Into<String>) -> Self {
        self.repository.default_revision = revision.into();
        self
    }

    /// Enable or disable repository detection
    pub fn with_repository_detection(mut self, detect: bool) -> Self {
        self.repository.detect = detect;
        self
    }
}

/// Loads JSON documents and inlines their references
///
/// A loader keeps no state between calls; every load is a fresh pass.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    repository: Repository,
}

impl Loader {
    /// Create a loader with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader with custom options
    pub fn with_options(options: LoaderOptions) -> Self {
        Self::with_runner(Arc::new(ProcessRunner), options)
    }

    /// Create a loader that runs git through `runner`
    pub fn with_runner(runner: Arc<dyn CommandRunner>, options: LoaderOptions) -> Self {
        Self {
            repository: Repository::new(runner, options.repository),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Classify a path without loading it
    pub async fn source(&self, reference: &str) -> Result<Source> {
        Source::parse(reference, &self.repository).await
    }

    /// Load `reference` and resolve every nested reference
    ///
    /// When `required` is false a missing document yields `null`. Malformed
    /// JSON is always an error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn run() -> jsonlink_core::Result<()> {
    /// use jsonlink_core::{Loader, Variables};
    ///
    /// let vars = Variables::new().with("locale", "en");
    /// let value = Loader::new().load("config/app.json", &vars, true).await?;
    /// println!("{}", value);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load(&self, reference: &str, variables: &Variables, required: bool) -> Result<Value> {
        let source = self.source(reference).await?;
        self.load_source(&source, variables, required).await
    }

    /// Load an already classified source
    pub async fn load_source(
        &self,
        source: &Source,
        variables: &Variables,
        required: bool,
    ) -> Result<Value> {
        self.load_nested(source.clone(), variables, required, &[]).await
    }

    /// Resolve references in an in-memory document as if it were read from `base`
    pub async fn resolve_document(
        &self,
        text: &str,
        base: &Source,
        variables: &Variables,
    ) -> Result<Value> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::invalid_document(base.to_string(), e.to_string()))?;
        link::resolve_links(self, value, base, variables, std::slice::from_ref(base)).await
    }

    /// Load `source` as one step of a resolution branch
    ///
    /// `chain` lists the documents being loaded above this one.
    pub(crate) fn load_nested<'a>(
        &'a self,
        source: Source,
        variables: &'a Variables,
        required: bool,
        chain: &'a [Source],
    ) -> BoxFuture<'a, Result<Value>> {
        async move {
            if chain.contains(&source) {
                let mut names: Vec<String> = chain.iter().map(ToString::to_string).collect();
                names.push(source.to_string());
                return Err(Error::circular_reference(names));
            }

            log::debug!("loading {}", source);
            let text = match source.read(&self.repository).await {
                Ok(text) => text,
                Err(e) if e.is_not_found() && !required => {
                    log::debug!("optional document {} not found, using null", source);
                    return Ok(Value::Null);
                }
                Err(e) => return Err(e),
            };

            let value: Value = serde_json::from_str(&text)
                .map_err(|e| Error::invalid_document(source.to_string(), e.to_string()))?;

            let mut chain = chain.to_vec();
            chain.push(source.clone());
            link::resolve_links(self, value, &source, variables, &chain).await
        }
        .boxed()
    }
}

/// Load `reference` with the process environment as variables
///
/// The document is required: a missing file is an error.
pub async fn load_json(reference: &str) -> Result<Value> {
    Loader::new()
        .load(reference, &Variables::from_env(), true)
        .await
}
