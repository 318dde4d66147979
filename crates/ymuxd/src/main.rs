//! ymux Daemon (ymuxd)
//!
//! Keeps a set of documents synchronized with one peer.
//!
//! # Usage
//!
//! ```bash
//! # Wait for a peer and share one text document
//! ymuxd --listen 0.0.0.0:7700 --doc notes
//!
//! # Connect to it, printing every edit as a JSON line
//! ymuxd --connect 127.0.0.1:7700 --doc notes --print-edits
//!
//! # Documents and peer from a configuration file
//! ymuxd --config /etc/ymux/ymux.toml
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ymux_core::{ContentEdits, Document, DocumentId, Registry, Subscription};
use ymux_provider::{Provider, TcpConnection, WebSocketConnection};

use crate::config::{Config, DocumentConfig, Endpoint};

/// ymux Daemon - multi-document sync over one connection
#[derive(Parser, Debug)]
#[command(name = "ymuxd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "YMUX_CONFIG")]
    config: Option<PathBuf>,

    /// Connect to a peer over TCP
    #[arg(long, env = "YMUX_CONNECT", conflicts_with_all = ["listen", "url"])]
    connect: Option<String>,

    /// Accept one peer over TCP on this address
    #[arg(long, env = "YMUX_LISTEN", conflicts_with = "url")]
    listen: Option<String>,

    /// Connect to a peer over WebSocket
    #[arg(long, env = "YMUX_URL")]
    url: Option<String>,

    /// Document to synchronize, as ID or ID=KIND (text, sequence, map)
    #[arg(long = "doc", env = "YMUX_DOCS", value_delimiter = ',')]
    docs: Vec<String>,

    /// Print every edit as a JSON line on stdout
    #[arg(long, env = "YMUX_PRINT_EDITS")]
    print_edits: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "YMUX_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// One line of `--print-edits` output
#[derive(Serialize)]
struct EditLine<'a> {
    doc: &'a str,
    change: &'a ContentEdits,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout only carries edits
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let mut documents = config.documents.clone();
    for arg in &args.docs {
        documents.push(DocumentConfig::from_arg(arg)?);
    }
    if documents.is_empty() {
        warn!("No documents configured; only the connection will be kept");
    }

    let mut registry = Registry::new();
    let mut watched = Vec::new();
    for document in &documents {
        let (id, doc) = document.build()?;
        registry.register(id.clone(), doc.clone())?;
        watched.push((id, doc));
    }

    let _edit_subscriptions: Vec<Subscription> = if args.print_edits {
        watched.iter().map(|(id, doc)| print_edits(id, doc)).collect()
    } else {
        Vec::new()
    };

    let endpoint = config.endpoint([args.connect.as_ref(), args.listen.as_ref(), args.url.as_ref()])?;
    info!(documents = registry.len(), endpoint = ?endpoint, "Starting ymux daemon");

    let provider = match endpoint {
        Endpoint::Connect(addr) => Provider::new(registry, TcpConnection::connect(addr).await?)?,
        Endpoint::Listen(addr) => {
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to listen on {}", addr))?;
            info!(addr = %addr, "Waiting for peer");
            Provider::new(registry, TcpConnection::accept(&listener).await?)?
        }
        Endpoint::Url(url) => Provider::new(registry, WebSocketConnection::connect(&url).await?)?,
    };
    provider.open()?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
        result = provider.wait() => {
            if let Err(e) = &result {
                error!(error = %e, "Provider stopped");
            }
        }
    }

    provider.close().await.context("Synchronization failed")?;
    Ok(())
}

fn print_edits(id: &DocumentId, doc: &Arc<Document>) -> Subscription {
    let id = id.clone();
    doc.observe_edits(move |change| {
        let line = EditLine {
            doc: id.as_str(),
            change: &change,
        };
        match serde_json::to_string(&line) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!(doc_id = %id, error = %e, "Failed to encode edit"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "ymuxd",
            "--connect",
            "127.0.0.1:7700",
            "--doc",
            "notes,todo=sequence",
            "--print-edits",
        ])
        .unwrap();

        assert_eq!(args.connect.as_deref(), Some("127.0.0.1:7700"));
        assert_eq!(args.docs, vec!["notes", "todo=sequence"]);
        assert!(args.print_edits);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_endpoints_conflict() {
        assert!(Args::try_parse_from(["ymuxd", "--connect", "a:1", "--listen", "b:2"]).is_err());
        assert!(Args::try_parse_from(["ymuxd", "--listen", "b:2", "--url", "ws://c"]).is_err());
    }

    #[test]
    fn test_edit_line_json() {
        let change = ContentEdits::Text(vec![ymux_core::Edit {
            retain: 0,
            delete: 0,
            insert: "hi".to_string(),
        }]);
        let line = EditLine {
            doc: "notes",
            change: &change,
        };
        assert_eq!(
            serde_json::to_value(&line).unwrap(),
            serde_json::json!({
                "doc": "notes",
                "change": { "kind": "text", "edits": [{ "retain": 0, "delete": 0, "insert": "hi" }] },
            })
        );
    }
}
