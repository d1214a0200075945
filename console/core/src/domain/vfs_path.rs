// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! VFS Path Codec
//!
//! Addresses nodes inside a virtual filesystem tree with a single string.
//! A path is an ordered list of components joined with `/`. Components that
//! contain a separator (`/` or `\`) or a quote are wrapped in quotes with
//! internal quotes doubled, CSV style, so any component survives a round
//! trip through the string form.
//!
//! Decoding never fails: truncated quoting and stray characters after a
//! closing quote degrade to a best-effort parse.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements the component codec, splitter and joiner

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::url_path::{decode_path_in_url, encode_path_in_url, UrlPathError};

const QUOTE: char = '"';

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Encode a single component so it can be embedded in a `/` delimited path.
pub fn encode_component(component: &str) -> Cow<'_, str> {
    if !component.contains(['/', '\\', QUOTE]) {
        return Cow::Borrowed(component);
    }

    let mut quoted = String::with_capacity(component.len() + 2);
    quoted.push(QUOTE);
    for c in component.chars() {
        if c == QUOTE {
            quoted.push(QUOTE);
        }
        quoted.push(c);
    }
    quoted.push(QUOTE);
    Cow::Owned(quoted)
}

/// Decode the next component from the front of `path`.
///
/// Returns the component and the remainder still to be parsed. A leading
/// separator yields an empty component and consumes just that separator.
pub fn consume_component(path: &str) -> (String, &str) {
    let Some(first) = path.chars().next() else {
        return (String::new(), "");
    };

    if is_separator(first) {
        // Separators are ASCII so slicing one byte stays on a boundary.
        return (String::new(), &path[1..]);
    }

    if first == QUOTE {
        return consume_quoted(&path[1..]);
    }

    match path.find(is_separator) {
        Some(end) => (path[..end].to_string(), &path[end..]),
        None => (path.to_string(), ""),
    }
}

/// Scan a quoted component. `rest` starts just after the opening quote.
fn consume_quoted(rest: &str) -> (String, &str) {
    let mut component = String::new();
    let mut chars = rest.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c != QUOTE {
            component.push(c);
            continue;
        }

        match chars.peek().copied() {
            None => return (component, ""),
            Some((_, QUOTE)) => {
                component.push(QUOTE);
                chars.next();
            }
            Some((idx, next)) if is_separator(next) => {
                return (component, &rest[idx + 1..]);
            }
            Some((_, other)) => {
                component.push(other);
                chars.next();
            }
        }
    }

    // Unterminated quote: keep what we have.
    (component, "")
}

/// Split an encoded path into its non-empty components.
pub fn split_components(path: &str) -> Vec<String> {
    let mut components = Vec::new();
    let mut rest = path;

    while !rest.is_empty() {
        let (component, remainder) = consume_component(rest);
        if !component.is_empty() {
            components.push(component);
        }
        rest = remainder;
    }

    components
}

/// Join components into the canonical encoded path.
///
/// Every component is preceded by `/`; no components yields `""`.
pub fn join_components<I, S>(components: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut result = String::new();
    for component in components {
        result.push('/');
        result.push_str(&encode_component(component.as_ref()));
    }
    result
}

/// Location of a node inside a VFS tree.
///
/// The first component names the accessor (`file`, `ntfs`, `registry`, ...)
/// for client filesystems. Empty components are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath {
    components: Vec<String>,
}

impl VfsPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse an encoded path string.
    pub fn parse(path: &str) -> Self {
        Self {
            components: split_components(path),
        }
    }

    /// Build a path from raw (unencoded) components, dropping empty ones.
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components
                .into_iter()
                .map(Into::into)
                .filter(|c: &String| !c.is_empty())
                .collect(),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn into_components(self) -> Vec<String> {
        self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn accessor(&self) -> Option<&str> {
        self.components.first().map(String::as_str)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// The containing directory, or `None` at the root.
    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Descend into `child`. An empty child leaves the path unchanged.
    pub fn join(&self, child: impl Into<String>) -> VfsPath {
        let child = child.into();
        let mut components = self.components.clone();
        if !child.is_empty() {
            components.push(child);
        }
        Self { components }
    }

    pub fn starts_with(&self, prefix: &VfsPath) -> bool {
        self.components.starts_with(&prefix.components)
    }

    /// Every ancestor path from the first component down to `self`.
    pub fn breadcrumbs(&self) -> Vec<VfsPath> {
        (1..=self.components.len())
            .map(|depth| Self {
                components: self.components[..depth].to_vec(),
            })
            .collect()
    }

    /// Canonical form with a trailing `/`, marking the path as a folder.
    pub fn to_folder_string(&self) -> String {
        format!("{}/", self)
    }

    /// DOM-safe identifier for the tree widget node of this path.
    ///
    /// Every non-alphanumeric character becomes `_` followed by its
    /// uppercase hex code point; components are joined with `-`.
    pub fn tree_node_id(&self) -> String {
        let escaped: Vec<String> = self
            .components
            .iter()
            .map(|component| {
                let mut out = String::with_capacity(component.len());
                for c in component.chars() {
                    if c.is_ascii_alphanumeric() {
                        out.push(c);
                    } else {
                        out.push_str(&format!("_{:X}", c as u32));
                    }
                }
                out
            })
            .collect();
        format!("_{}", escaped.join("-"))
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_components(&self.components))
    }
}

impl FromStr for VfsPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for VfsPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VfsPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// A browser-style VFS route: a directory plus an optional selected file.
///
/// `/file/a/b/` navigates to directory `b`; `/file/a/b` navigates to `a`
/// and selects `b` inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsRoute {
    pub directory: VfsPath,
    pub selected_file: Option<String>,
}

impl VfsRoute {
    pub fn directory(directory: VfsPath) -> Self {
        Self {
            directory,
            selected_file: None,
        }
    }

    /// Route to `path`, selecting its last component inside its parent.
    pub fn file(path: &VfsPath) -> Self {
        match (path.parent(), path.file_name()) {
            (Some(directory), Some(name)) => Self {
                directory,
                selected_file: Some(name.to_string()),
            },
            _ => Self::directory(VfsPath::root()),
        }
    }

    /// Parse the router-encoded path segment of a VFS URL.
    pub fn parse(router_path: &str) -> Result<Self, UrlPathError> {
        let decoded = decode_path_in_url(router_path)?;
        let mut components = split_components(&decoded);

        let selected_file = if router_path.ends_with('/') {
            None
        } else {
            components.pop()
        };

        Ok(Self {
            directory: VfsPath { components },
            selected_file,
        })
    }

    /// Full target path: the directory, or the selected file inside it.
    pub fn target(&self) -> VfsPath {
        match &self.selected_file {
            Some(name) => self.directory.join(name.clone()),
            None => self.directory.clone(),
        }
    }

    /// Router URL for this route on the given client.
    pub fn to_url(&self, client_id: &str) -> String {
        let path = match &self.selected_file {
            Some(name) => self.directory.join(name.clone()).to_string(),
            None => self.directory.to_folder_string(),
        };
        format!("/vfs/{}{}", client_id, encode_path_in_url(&path))
    }
}
