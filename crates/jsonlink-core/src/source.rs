//! Source descriptors
//!
//! A [`Source`] says where a document lives: a plain file, a file inside a
//! checked-out repository, or a file inside a bare repository, optionally
//! pinned to a revision. Sources are immutable; re-basing a reference
//! produces a new one.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, ErrorKind, IoFailure, Result};
use crate::repository::{self, Repository, REPOSITORY_SUFFIX};

/// Separator between a path and its revision (`conf/a.json#v1.2`)
pub const REVISION_SEPARATOR: char = '#';

/// A textual path split from its optional trailing revision
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub path: String,
    pub revision: Option<String>,
}

impl Location {
    /// Split a trailing `#revision` off `text`
    ///
    /// An empty revision (`a.json#`) counts as no revision.
    pub fn parse(text: &str) -> Self {
        match text.rsplit_once(REVISION_SEPARATOR) {
            Some((path, revision)) => Self {
                path: path.to_string(),
                revision: (!revision.is_empty()).then(|| revision.to_string()),
            },
            None => Self {
                path: text.to_string(),
                revision: None,
            },
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(revision) = &self.revision {
            write!(f, "{}{}", REVISION_SEPARATOR, revision)?;
        }
        Ok(())
    }
}

/// Structured location of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    repository_root: Option<PathBuf>,
    file_path: PathBuf,
    revision: Option<String>,
}

impl Source {
    /// A plain file system source
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            repository_root: None,
            file_path: normalize(path.as_ref()),
            revision: None,
        }
    }

    /// A file inside a repository, relative to its root
    pub fn in_repository(
        root: impl Into<PathBuf>,
        file_path: impl AsRef<Path>,
        revision: Option<String>,
    ) -> Self {
        Self {
            repository_root: Some(root.into()),
            file_path: normalize(file_path.as_ref()),
            revision,
        }
    }

    pub fn repository_root(&self) -> Option<&Path> {
        self.repository_root.as_deref()
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Classify a path string (with optional `#revision`)
    ///
    /// Relative paths are taken against the current directory. Bare
    /// repositories are recognized by a `.git`-suffixed component, checked-out
    /// ones by asking git for the enclosing top-level directory.
    pub async fn parse(text: &str, repo: &Repository) -> Result<Self> {
        let location = Location::parse(text);
        if location.path.is_empty() {
            return Err(Error::unresolvable(text, "empty path"));
        }

        let path = std::path::absolute(&location.path)
            .map_err(|e| Error::unresolvable(text, e.to_string()))?;
        Self::classify(normalize(&path), location.revision, repo).await
    }

    /// Re-base a reference found inside this document
    ///
    /// Absolute references are classified on their own. Relative ones are
    /// joined onto this file's directory and keep this source's repository
    /// and revision unless they name a revision of their own.
    pub async fn resolve(&self, reference: &Location, repo: &Repository) -> Result<Self> {
        if reference.path.is_empty() {
            return Err(Error::unresolvable(reference.to_string(), "empty path"));
        }

        let target = Path::new(&reference.path);
        if target.is_absolute() {
            return Self::classify(normalize(target), reference.revision.clone(), repo).await;
        }

        let joined = normalize(&self.directory().join(target));

        let Some(root) = &self.repository_root else {
            return Self::classify(joined, reference.revision.clone(), repo).await;
        };

        if joined.components().next() == Some(Component::ParentDir) {
            return Err(Error::unresolvable(
                reference.to_string(),
                format!("path escapes the repository root {}", root.display()),
            )
            .with_help("Use an absolute path to reach files outside the repository"));
        }

        Ok(Self {
            repository_root: Some(root.clone()),
            file_path: joined,
            revision: reference.revision.clone().or_else(|| self.revision.clone()),
        })
    }

    /// Read the document text
    ///
    /// Absent targets fail with a not found error; every other failure is an
    /// I/O error.
    pub async fn read(&self, repo: &Repository) -> Result<String> {
        match &self.repository_root {
            Some(root) => repo
                .read_at_revision(root, &self.file_path, self.revision.as_deref())
                .await
                .map_err(|e| {
                    let missing = matches!(
                        &e.kind,
                        ErrorKind::Io(IoFailure::Command { stderr, .. })
                            if repository::is_missing_path(stderr)
                    );
                    if missing {
                        Error::not_found(self.to_string())
                    } else {
                        e
                    }
                }),
            None => tokio::fs::read_to_string(&self.file_path)
                .await
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => Error::not_found(self.to_string()),
                    std::io::ErrorKind::InvalidData => {
                        Error::invalid_document(self.to_string(), "content is not valid UTF-8")
                    }
                    _ => Error::file_io(self.to_string(), &e),
                }),
        }
    }

    /// Directory that relative references are joined onto
    fn directory(&self) -> &Path {
        self.file_path.parent().unwrap_or(Path::new(""))
    }

    async fn classify(path: PathBuf, revision: Option<String>, repo: &Repository) -> Result<Self> {
        if let Some((root, file_path)) = split_bare_repository(&path, repo).await {
            log::debug!("{} is in bare repository {}", path.display(), root.display());
            return Ok(Self {
                repository_root: Some(root),
                file_path,
                revision,
            });
        }

        if let Some(top) = repo.root_of(&path).await {
            if let Some(file_path) = relative_to(&path, &top).await {
                log::debug!("{} is in checked-out repository {}", path.display(), top.display());
                return Ok(Self {
                    repository_root: Some(top),
                    file_path,
                    revision,
                });
            }
        }

        if let Some(revision) = revision {
            log::debug!(
                "{} is outside any repository, ignoring revision {}",
                path.display(),
                revision
            );
        }

        Ok(Self::file(path))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repository_root {
            Some(root) => {
                write!(f, "{}:{}", root.display(), self.file_path.display())?;
                if let Some(revision) = &self.revision {
                    write!(f, "{}{}", REVISION_SEPARATOR, revision)?;
                }
                Ok(())
            }
            None => write!(f, "{}", self.file_path.display()),
        }
    }
}

/// Find the first `.git`-suffixed component that is a bare repository
async fn split_bare_repository(path: &Path, repo: &Repository) -> Option<(PathBuf, PathBuf)> {
    let mut prefix = PathBuf::new();
    for component in path.components() {
        prefix.push(component.as_os_str());
        let Component::Normal(name) = component else {
            continue;
        };
        if !name.to_string_lossy().ends_with(REPOSITORY_SUFFIX) || prefix == path {
            continue;
        }
        if repo.is_bare(&prefix).await {
            let rest = path.strip_prefix(&prefix).ok()?.to_path_buf();
            return Some((prefix, rest));
        }
    }
    None
}

/// `path` relative to `top`, seeing through symlinks in either
async fn relative_to(path: &Path, top: &Path) -> Option<PathBuf> {
    if let Ok(rest) = path.strip_prefix(top) {
        return Some(rest.to_path_buf());
    }

    let top = tokio::fs::canonicalize(top).await.ok()?;
    for ancestor in path.ancestors() {
        let Ok(canonical) = tokio::fs::canonicalize(ancestor).await else {
            continue;
        };
        let real = canonical.join(path.strip_prefix(ancestor).ok()?);
        return real.strip_prefix(&top).ok().map(Path::to_path_buf);
    }
    None
}

/// Lexically remove `.` and `..` components
///
/// Leading `..` components of a relative path are kept; `..` at the root of
/// an absolute path is dropped.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}
