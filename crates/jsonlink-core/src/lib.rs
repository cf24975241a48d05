//! jsonlink-core: recursive JSON document loader
//!
//! Loads a JSON document and inlines every document it references. A
//! reference is a string value of the form `@[!]path[#revision]`:
//!
//! - `@b.json` - optional; a missing file becomes `null`
//! - `@!b.json` - required; a missing file is an error
//! - `@lang/${locale}/data.json` - `${name}` expands from the variables
//! - `@/srv/store.git/conf/a.json#v1.2` - a file in a git repository at a revision
//!
//! Relative references resolve against the directory of the document that
//! contains them, including inside repositories.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> jsonlink_core::Result<()> {
//! use jsonlink_core::{Loader, Variables};
//!
//! let value = Loader::new()
//!     .load("config/app.json", &Variables::from_env(), true)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod expand;
pub mod link;
pub mod repository;
pub mod source;

mod loader;

pub use error::{Error, ErrorKind, IoFailure, Result};
pub use expand::{expand, Variables};
pub use link::Reference;
pub use loader::{load_json, Loader, LoaderOptions};
pub use repository::{CommandOutput, CommandRunner, ProcessRunner, Repository, RepositoryOptions};
pub use source::{Location, Source};
