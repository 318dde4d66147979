//! Configuration file
//!
//! ```toml
//! connect = "127.0.0.1:7700"   # or: listen = "0.0.0.0:7700", url = "ws://host/sync"
//!
//! [[documents]]
//! id = "notes"
//! kind = "text"
//! seed = "first line"
//!
//! [[documents]]
//! id = "settings"
//! kind = "map"
//! seed = { theme = "dark", width = 80 }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use ymux_core::{ContentKind, Document, DocumentId, Value};

/// Contents of a configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub connect: Option<String>,
    pub listen: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub documents: Vec<DocumentConfig>,
}

/// One document to synchronize
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentConfig {
    pub id: String,
    #[serde(default)]
    pub kind: ContentKind,
    /// Initial content: a string, an array or a table depending on `kind`
    pub seed: Option<toml::Value>,
}

/// Where the peer is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP client
    Connect(String),
    /// TCP server accepting one peer
    Listen(String),
    /// WebSocket client
    Url(String),
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// The configured endpoint, unless the command line names one
    pub fn endpoint(&self, overrides: [Option<&String>; 3]) -> Result<Endpoint> {
        let [connect, listen, url] = overrides;
        let (connect, listen, url) = if connect.or(listen).or(url).is_some() {
            (connect, listen, url)
        } else {
            (self.connect.as_ref(), self.listen.as_ref(), self.url.as_ref())
        };

        match (connect, listen, url) {
            (Some(addr), None, None) => Ok(Endpoint::Connect(addr.clone())),
            (None, Some(addr), None) => Ok(Endpoint::Listen(addr.clone())),
            (None, None, Some(url)) => Ok(Endpoint::Url(url.clone())),
            (None, None, None) => bail!("No peer configured: use --connect, --listen or --url"),
            _ => bail!("Only one of connect, listen and url may be set"),
        }
    }
}

impl DocumentConfig {
    /// Parse `ID` or `ID=KIND` as given on the command line
    pub fn from_arg(arg: &str) -> Result<Self> {
        let (id, kind) = match arg.rsplit_once('=') {
            Some((id, kind)) => (id, kind.parse()?),
            None => (arg, ContentKind::default()),
        };
        Ok(Self {
            id: id.to_string(),
            kind,
            seed: None,
        })
    }

    /// Create the document and fill it with the seed
    pub fn build(&self) -> Result<(DocumentId, Arc<Document>)> {
        let id = DocumentId::new(self.id.as_str())?;
        let doc = Document::new(self.kind);

        match (&self.seed, self.kind) {
            (None, _) => {}
            (Some(toml::Value::String(text)), ContentKind::Text) => doc.push_text(text)?,
            (Some(toml::Value::Array(items)), ContentKind::Sequence) => {
                doc.push_items(items.iter().cloned().map(to_value).collect())?
            }
            (Some(toml::Value::Table(entries)), ContentKind::Map) => {
                for (key, value) in entries {
                    doc.set_entry(key, to_value(value.clone()))?;
                }
            }
            (Some(seed), kind) => bail!(
                "Seed for document {} is a {}, which does not fit a {} document",
                id,
                seed.type_str(),
                kind
            ),
        }

        Ok((id, Arc::new(doc)))
    }
}

fn to_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(n) => Value::from(n),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(to_value).collect()),
        toml::Value::Table(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, to_value(v)))
                .collect::<HashMap<_, _>>(),
        ),
    }
}
