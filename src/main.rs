use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use blockflow_codec::{export, import, load_definition, upgrade};
use blockflow_config::WorkflowDefinition;
use blockflow_editor::{EditorConfig, Session};
use blockflow_graph::{BlockGraph, NodeId, validate};
use blockflow_layout::{LayoutEngine, NodeLayout, Size};
use blockflow_store::{ChannelNotifier, FsDefinitionStore, SaveEvent, SaveWorker};

/// Blockflow - edit, validate and lay out block-graph workflow definitions
#[derive(Parser)]
#[command(name = "blockflow")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the editor config (default: ~/.blockflow/config.toml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print validation problems of a definition
  Validate {
    /// Path to the definition file (JSON)
    file: PathBuf,
  },

  /// Upgrade a definition to the current schema version
  Upgrade {
    file: PathBuf,

    /// Version the file was written at (default: its `version` field)
    #[arg(long)]
    from: Option<u32>,

    /// Write the result here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
  },

  /// Load, rebuild and re-export a definition in canonical form
  Normalize {
    file: PathBuf,

    /// Also save the result into this definition store directory
    #[arg(long, requires = "id")]
    store: Option<PathBuf>,

    /// Workflow id to save under
    #[arg(long)]
    id: Option<String>,
  },

  /// Print the computed layout of a definition
  Layout {
    file: PathBuf,

    /// JSON object mapping block labels to measured `{ "width", "height" }`
    #[arg(long)]
    sizes: Option<PathBuf>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let config = load_config(cli.config.as_deref())?;

  match cli.command {
    Some(Commands::Validate { file }) => validate_file(&file),
    Some(Commands::Upgrade { file, from, output }) => upgrade_file(&file, from, output.as_deref()),
    Some(Commands::Normalize { file, store, id }) => match (store, id) {
      (Some(store), Some(id)) => {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async { normalize_into_store(&file, store, id, &config).await })
      }
      _ => normalize_file(&file),
    },
    Some(Commands::Layout { file, sizes }) => layout_file(&file, sizes.as_deref(), &config),
    None => {
      println!("blockflow - use --help to see available commands");
      Ok(())
    }
  }
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
  match path {
    Some(path) => Ok(EditorConfig::load(path)?),
    None => match EditorConfig::default_path() {
      Some(path) => Ok(EditorConfig::load_or_default(&path)?),
      None => Ok(EditorConfig::default()),
    },
  }
}

fn read_definition(file: &Path) -> Result<WorkflowDefinition> {
  let content = std::fs::read_to_string(file)
    .with_context(|| format!("failed to read definition file: {}", file.display()))?;
  load_definition(&content)
    .with_context(|| format!("failed to load definition file: {}", file.display()))
}

fn read_graph(file: &Path) -> Result<(BlockGraph, WorkflowDefinition)> {
  let definition = read_definition(file)?;
  let (graph, _) = import(&definition)
    .with_context(|| format!("failed to import definition file: {}", file.display()))?;
  Ok((graph, definition))
}

fn validate_file(file: &Path) -> Result<()> {
  let (graph, definition) = read_graph(file)?;
  let messages = validate(&graph, &definition.parameters);
  if messages.is_empty() {
    eprintln!("{}: ok", file.display());
    return Ok(());
  }

  for message in &messages {
    println!("{message}");
  }
  bail!("{} problem(s) found in {}", messages.len(), file.display())
}

fn upgrade_file(file: &Path, from: Option<u32>, output: Option<&Path>) -> Result<()> {
  let content = std::fs::read_to_string(file)
    .with_context(|| format!("failed to read definition file: {}", file.display()))?;
  let value: Value = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse definition file: {}", file.display()))?;

  let from = match from {
    Some(version) => version,
    None => value
      .get("version")
      .and_then(Value::as_u64)
      .and_then(|v| u32::try_from(v).ok())
      .context("definition has no version; pass --from")?,
  };
  let (upgraded, version) = upgrade(value, from).context("failed to upgrade definition")?;
  info!(from, to = version, "upgraded definition");

  let json = serde_json::to_string_pretty(&upgraded)?;
  match output {
    Some(path) => std::fs::write(path, json)
      .with_context(|| format!("failed to write upgraded definition: {}", path.display()))?,
    None => println!("{json}"),
  }
  Ok(())
}

fn normalize(file: &Path) -> Result<WorkflowDefinition> {
  let definition = read_definition(file)?;
  let (graph, meta) = import(&definition)
    .with_context(|| format!("failed to import definition file: {}", file.display()))?;
  export(&graph, &meta).context("failed to export definition")
}

fn normalize_file(file: &Path) -> Result<()> {
  let normalized = normalize(file)?;
  println!("{}", serde_json::to_string_pretty(&normalized)?);
  Ok(())
}

async fn normalize_into_store(
  file: &Path,
  store_dir: PathBuf,
  workflow_id: String,
  config: &EditorConfig,
) -> Result<()> {
  let definition = normalize(file)?;
  let session = Session::from_definition(&definition, config).context("failed to open session")?;

  let store = Arc::new(FsDefinitionStore::new(store_dir));
  let (event_tx, mut event_rx) = mpsc::unbounded_channel();
  let worker = SaveWorker::new(store, Arc::new(ChannelNotifier::new(event_tx)), &config.save);
  let sender = worker.sender();
  let handle = tokio::spawn(worker.start(CancellationToken::new()));

  session
    .save(workflow_id.as_str(), &sender)
    .await
    .context("failed to queue definition")?;
  // The worker exits once the queue drains.
  drop(sender);
  handle.await.context("save worker panicked")?;

  match event_rx.recv().await {
    Some(SaveEvent::Saved { workflow_id, blocks }) => {
      eprintln!("Saved {workflow_id} ({blocks} top-level blocks)");
      Ok(())
    }
    Some(SaveEvent::Failed { workflow_id, error }) => bail!("failed to save {workflow_id}: {error}"),
    None => bail!("save worker exited without saving {workflow_id}"),
  }
}

fn layout_file(file: &Path, sizes: Option<&Path>, config: &EditorConfig) -> Result<()> {
  let (graph, _) = read_graph(file)?;

  let measured: HashMap<String, Size> = match sizes {
    Some(path) => {
      let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read sizes file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse sizes file: {}", path.display()))?
    }
    None => HashMap::new(),
  };
  let sizes: HashMap<NodeId, Size> = measured
    .into_iter()
    .filter_map(|(label, size)| graph.find_by_label(&label).map(|n| (n.id.clone(), size)))
    .collect();

  let layout = LayoutEngine::new(config.layout.clone()).layout(&graph, &sizes);

  // Blocks are keyed by label; markers keep their node ids.
  let name = |id: &str| {
    graph
      .node(id)
      .and_then(|n| n.label())
      .map_or_else(|| id.to_string(), str::to_string)
  };
  let nodes: BTreeMap<String, NodeLayout> = layout
    .nodes
    .iter()
    .map(|(id, placed)| (name(id), *placed))
    .collect();
  let hidden: Vec<String> = layout.hidden.iter().map(|id| name(id)).collect();

  let output = serde_json::json!({
    "width": layout.width,
    "height": layout.height,
    "nodes": nodes,
    "hidden": hidden,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);
  Ok(())
}
