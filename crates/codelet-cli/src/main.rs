//! codelet CLI - manage and sync code snippets from the terminal
//!
//! Quick capture, search, labeling, export, and WebDAV sync over the
//! codelet-core library.

use std::collections::BTreeSet;
use std::env;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, shells, Generator};
use codelet_core::config::Config;
use codelet_core::remote::WebDavTransport;
use codelet_core::snapshot::{render_export, ExportFormat as CoreExportFormat};
use codelet_core::{Snippet, SnippetDraft, SnippetId, SnippetPatch, SnippetStore, SyncEngine};
use serde::Serialize;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "codelet")]
#[command(about = "Manage and sync code snippets from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Optional directory for the store and config files
    #[arg(long, value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new snippet
    #[command(alias = "new")]
    Add {
        /// Snippet title
        title: String,
        /// Syntax tag (defaults to the configured default language)
        #[arg(short, long)]
        lang: Option<String>,
        /// Labels to attach (repeatable)
        #[arg(short = 'L', long = "label")]
        labels: Vec<String>,
        /// Mark as starred
        #[arg(short, long)]
        star: bool,
        /// Snippet content (stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// List snippets
    List {
        /// Filter by label
        #[arg(long)]
        label: Option<String>,
        /// Only starred snippets
        #[arg(long)]
        starred: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search snippets by title, content, or language
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a snippet's content
    Show {
        /// Snippet ID or unique ID prefix
        id: String,
    },
    /// Edit a snippet's content in $EDITOR
    Edit {
        /// Snippet ID or unique ID prefix
        id: String,
    },
    /// Delete a snippet
    Delete {
        /// Snippet ID or unique ID prefix
        id: String,
    },
    /// Manage labels
    Label {
        #[command(subcommand)]
        action: LabelCommands,
    },
    /// Export all snippets
    Export {
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Sync with the configured WebDAV remote
    Sync,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum LabelCommands {
    /// List labels with snippet counts
    List,
    /// Remove a label from one snippet
    Rm {
        /// Snippet ID or unique ID prefix
        id: String,
        /// Label name
        label: String,
    },
    /// Delete a label from every snippet referencing it
    Delete {
        /// Label name
        label: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current configuration (password redacted)
    Show,
    /// Set WebDAV and editor defaults
    Set {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        default_lang: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] codelet_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No snippet content provided")]
    EmptyContent,
    #[error("Edited snippet content cannot be empty")]
    EmptyEditedContent,
    #[error("Snippet ID cannot be empty")]
    EmptySnippetId,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Snippet not found for id/prefix: {0}")]
    SnippetNotFound(String),
    #[error("{0}")]
    AmbiguousSnippetId(String),
    #[error("Editor command failed: {0}")]
    EditorFailed(String),
    #[error(
        "Sync is not configured. Run `codelet config set --url ... --username ... --password ...` first."
    )]
    SyncNotConfigured,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum ExportFormat {
    Json,
    Markdown,
}

impl From<ExportFormat> for CoreExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codelet=info")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);

    match cli.command {
        Some(Commands::Add {
            title,
            lang,
            labels,
            star,
            content,
        }) => run_add(&title, lang, labels, star, &content, &data_dir),
        Some(Commands::List {
            label,
            starred,
            json,
        }) => run_list(label.as_deref(), starred, json, &data_dir),
        Some(Commands::Search { query, json }) => run_search(&query, json, &data_dir),
        Some(Commands::Show { id }) => run_show(&id, &data_dir),
        Some(Commands::Edit { id }) => run_edit(&id, &data_dir),
        Some(Commands::Delete { id }) => run_delete(&id, &data_dir),
        Some(Commands::Label { action }) => run_label(&action, &data_dir),
        Some(Commands::Export { format, output }) => {
            run_export(format, output.as_deref(), &data_dir)
        }
        Some(Commands::Config { action }) => run_config(action, &data_dir),
        Some(Commands::Sync) => run_sync(&data_dir).await,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())
        }
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

fn run_add(
    title: &str,
    lang: Option<String>,
    labels: Vec<String>,
    star: bool,
    content_parts: &[String],
    data_dir: &Path,
) -> Result<(), CliError> {
    let config = load_config(data_dir)?;
    let content = resolve_snippet_content(content_parts)?;

    let mut draft = SnippetDraft::new(
        title,
        content,
        lang.unwrap_or_else(|| config.default_lang.clone()),
    );
    draft.labels = labels.into_iter().collect::<BTreeSet<String>>();
    draft.starred = star;

    let store = open_store(data_dir)?;
    let snippet = store.add(draft)?;
    store.persist()?;

    println!("{}", snippet.id);
    Ok(())
}

fn run_list(
    label: Option<&str>,
    starred: bool,
    as_json: bool,
    data_dir: &Path,
) -> Result<(), CliError> {
    let store = open_store(data_dir)?;
    let snippets = match label {
        Some(name) => store.by_label(name),
        None if starred => store.starred(),
        None => store.list(),
    };
    let snippets = if starred && label.is_some() {
        snippets.into_iter().filter(|s| s.starred).collect()
    } else {
        snippets
    };

    print_snippets(&snippets, as_json)
}

fn run_search(query: &str, as_json: bool, data_dir: &Path) -> Result<(), CliError> {
    let normalized = normalize_search_query(query)?;
    let store = open_store(data_dir)?;
    print_snippets(&store.search(&normalized), as_json)
}

fn run_show(id: &str, data_dir: &Path) -> Result<(), CliError> {
    let store = open_store(data_dir)?;
    let snippet = resolve_snippet(&store, id)?;
    print!("{}", snippet.content);
    if !snippet.content.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn run_edit(id: &str, data_dir: &Path) -> Result<(), CliError> {
    let store = open_store(data_dir)?;
    let snippet = resolve_snippet(&store, id)?;

    let Some(edited) = capture_editor_input_with_initial(&snippet.content)? else {
        return Err(CliError::EmptyEditedContent);
    };

    if edited == snippet.content {
        println!("{}", snippet.id);
        return Ok(());
    }

    let updated = store.update(
        snippet.id,
        SnippetPatch {
            content: Some(edited),
            ..SnippetPatch::default()
        },
    )?;
    store.persist()?;
    println!("{}", updated.id);
    Ok(())
}

fn run_delete(id: &str, data_dir: &Path) -> Result<(), CliError> {
    let store = open_store(data_dir)?;
    let snippet = resolve_snippet(&store, id)?;

    store.remove(snippet.id)?;
    store.persist()?;
    println!("{}", snippet.id);
    Ok(())
}

fn run_label(action: &LabelCommands, data_dir: &Path) -> Result<(), CliError> {
    let store = open_store(data_dir)?;
    match action {
        LabelCommands::List => {
            let index = store.label_index();
            for name in index.names() {
                let count = index.snippets_for(name).map_or(0, BTreeSet::len);
                println!("{name}  ({count})");
            }
        }
        LabelCommands::Rm { id, label } => {
            let snippet = resolve_snippet(&store, id)?;
            store.remove_label(snippet.id, label)?;
            store.persist()?;
            println!("{}", snippet.id);
        }
        LabelCommands::Delete { label } => {
            let touched = store.delete_label(label);
            store.persist()?;
            println!("Removed label '{label}' from {touched} snippet(s)");
        }
    }
    Ok(())
}

fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    data_dir: &Path,
) -> Result<(), CliError> {
    let store = open_store(data_dir)?;
    let snippets = store.list();
    let rendered = render_export(&snippets, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

fn run_config(action: ConfigCommands, data_dir: &Path) -> Result<(), CliError> {
    let path = config_path(data_dir);
    match action {
        ConfigCommands::Show => {
            let config = load_config(data_dir)?;
            println!("url:          {}", config.webdav.url);
            println!("username:     {}", config.webdav.username);
            println!(
                "password:     {}",
                if config.webdav.password.is_empty() {
                    "(unset)"
                } else {
                    "[REDACTED]"
                }
            );
            println!("default_lang: {}", config.default_lang);
        }
        ConfigCommands::Set {
            username,
            password,
            url,
            default_lang,
        } => {
            let mut config = Config::load(&path)?;
            if let Some(username) = username {
                config.webdav.username = username;
            }
            if let Some(password) = password {
                config.webdav.password = password;
            }
            if let Some(url) = url {
                config.webdav.url = url;
            }
            if let Some(default_lang) = default_lang {
                config.default_lang = default_lang;
            }
            config.save(&path)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn run_sync(data_dir: &Path) -> Result<(), CliError> {
    let config = load_config(data_dir)?;
    if !config.webdav.is_valid() {
        return Err(CliError::SyncNotConfigured);
    }

    let store = open_store(data_dir)?;
    let transport = WebDavTransport::new(config.webdav)?;
    let engine = SyncEngine::new(transport);

    let report = engine.sync(&store).await?;
    store.persist()?;

    println!(
        "Sync completed: pulled {}, pushed {}, adopted {}, suppressed {}{}",
        report.pulled,
        report.pushed,
        report.adopted,
        report.suppressed,
        if report.retried {
            " (retried once after a remote conflict)"
        } else {
            ""
        }
    );
    Ok(())
}

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "codelet", buffer);
}

#[derive(Debug, Serialize)]
struct SnippetListItem {
    id: String,
    title: String,
    lang: String,
    preview: String,
    datetime: i64,
    relative_time: String,
    labels: Vec<String>,
    starred: bool,
}

fn print_snippets(snippets: &[Snippet], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let items = snippets
            .iter()
            .map(snippet_to_list_item)
            .collect::<Vec<SnippetListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_snippet_lines(snippets) {
            println!("{line}");
        }
    }
    Ok(())
}

fn snippet_to_list_item(snippet: &Snippet) -> SnippetListItem {
    let now_ms = chrono::Utc::now().timestamp_millis();
    SnippetListItem {
        id: snippet.id.to_string(),
        title: snippet.title.clone(),
        lang: snippet.lang.clone(),
        preview: snippet_preview(snippet, 60),
        datetime: snippet.datetime,
        relative_time: format_relative_time(snippet.datetime, now_ms),
        labels: snippet.labels.iter().cloned().collect(),
        starred: snippet.starred,
    }
}

fn format_snippet_lines(snippets: &[Snippet]) -> Vec<String> {
    let now_ms = chrono::Utc::now().timestamp_millis();
    snippets
        .iter()
        .map(|snippet| {
            let id = snippet.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let star = if snippet.starred { "*" } else { " " };
            let relative_time = format_relative_time(snippet.datetime, now_ms);
            let labels = render_labels(snippet);

            if labels.is_empty() {
                format!(
                    "{short_id:<13} {star} {:<30}  [{}]  {relative_time}",
                    truncate_title(&snippet.title, 30),
                    snippet.lang
                )
            } else {
                format!(
                    "{short_id:<13} {star} {:<30}  [{}]  {relative_time:<10}  {labels}",
                    truncate_title(&snippet.title, 30),
                    snippet.lang
                )
            }
        })
        .collect()
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn snippet_preview(snippet: &Snippet, max_chars: usize) -> String {
    let first_line = snippet.content.lines().next().unwrap_or("").trim();
    truncate_title(first_line, max_chars)
}

fn render_labels(snippet: &Snippet) -> String {
    snippet
        .labels
        .iter()
        .map(|label| format!("#{label}"))
        .collect::<Vec<String>>()
        .join(" ")
}

fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

fn resolve_snippet(store: &SnippetStore, query: &str) -> Result<Snippet, CliError> {
    let query = normalize_snippet_identifier(query)?;

    if let Ok(id) = query.parse::<SnippetId>() {
        if let Some(snippet) = store.get(id) {
            return Ok(snippet);
        }
    }

    let mut matching: Vec<Snippet> = store
        .list()
        .into_iter()
        .filter(|snippet| snippet.id.to_string().starts_with(&query))
        .collect();

    match matching.len() {
        0 => Err(CliError::SnippetNotFound(query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|snippet| snippet.id.to_string().chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");
            Err(CliError::AmbiguousSnippetId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

fn resolve_snippet_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input_with_initial("")? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

fn normalize_snippet_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySnippetId)
    } else {
        Ok(trimmed.to_string())
    }
}

fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

fn capture_editor_input_with_initial(initial_content: &str) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_snippet_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // Fallback for editor commands with args, e.g. "code --wait"
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

fn create_temp_snippet_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("codelet-snippet-{}-{now}.txt", std::process::id()))
}

fn resolve_data_dir(cli_data_dir: Option<PathBuf>) -> PathBuf {
    cli_data_dir
        .or_else(|| env::var_os("CODELET_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir)
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codelet")
}

fn store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("store.json")
}

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.json")
}

fn open_store(data_dir: &Path) -> Result<SnippetStore, CliError> {
    Ok(SnippetStore::load(&store_path(data_dir))?)
}

fn load_config(data_dir: &Path) -> Result<Config, CliError> {
    let mut config = Config::load(&config_path(data_dir))?;
    config.apply_env_overrides();
    Ok(config)
}
