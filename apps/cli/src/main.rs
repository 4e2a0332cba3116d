use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use letterpad_core::{RecordingObserver, SearchSession};
use letterpad_document::{Document, NodeId};
use letterpad_settings::{PreferencesStore, SearchAction, SearchPreferences};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "letterpad-cli",
    about = "Find & replace utilities for LetterPad documents",
    author,
    version
)]
struct Cli {
    /// 偏好設定檔路徑，提供搜尋預設值。 / Preferences file providing the search defaults.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 在文件中搜尋並列出結果。 / Search a document and list every match.
    Search(SearchArgs),
    /// 取代目前或全部的符合項目。 / Replace the first or every match.
    Replace(ReplaceArgs),
    /// 輸出文件的 HTML。 / Print the document as HTML.
    Render(RenderArgs),
    /// 檢視或修改搜尋預設值與快捷鍵（需要 --config）。 / Show or change search defaults and key bindings (requires --config).
    Defaults(DefaultsArgs),
}

#[derive(Args)]
struct MatchArgs {
    /// 要搜尋的文字（逐字比對）。 / Text to look for, matched literally.
    query: String,

    /// 文件 JSON 檔案。 / Document JSON file.
    file: PathBuf,

    /// 區分大小寫。 / Match case exactly.
    #[arg(long)]
    case_sensitive: bool,

    /// 僅比對完整單字。 / Only match whole words.
    #[arg(long)]
    whole_word: bool,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    matching: MatchArgs,

    /// 同時輸出含標記的 HTML。 / Also print the highlighted HTML.
    #[arg(long)]
    html: bool,
}

#[derive(Args)]
struct ReplaceArgs {
    #[command(flatten)]
    matching: MatchArgs,

    /// 取代文字。 / Replacement text.
    #[arg(long = "with", value_name = "TEXT")]
    replacement: String,

    /// 取代全部符合項目，而非僅第一個。 / Replace every match instead of the first one.
    #[arg(long)]
    all: bool,

    /// 將結果寫回檔案。 / Write the result back to the file.
    #[arg(long)]
    apply: bool,
}

#[derive(Args)]
struct RenderArgs {
    /// 文件 JSON 檔案。 / Document JSON file.
    file: PathBuf,
}

#[derive(Args)]
struct DefaultsArgs {
    /// 預設是否區分大小寫。 / Default for case-sensitive matching.
    #[arg(long, value_name = "true|false")]
    case_sensitive: Option<bool>,

    /// 預設是否僅比對完整單字。 / Default for whole-word matching.
    #[arg(long, value_name = "true|false")]
    whole_word: Option<bool>,

    /// 是否捲動至目前項目。 / Whether the current match is scrolled into view.
    #[arg(long, value_name = "true|false")]
    scroll_into_view: Option<bool>,

    /// 重新綁定快捷鍵，例如 `next=F3`。 / Rebind an action, e.g. `next=F3`.
    #[arg(long = "bind", value_name = "ACTION=CHORD", value_parser = parse_binding)]
    bindings: Vec<(SearchAction, String)>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run() -> Result<()> {
    let Cli { config, command } = Cli::parse();
    let defaults = load_search_defaults(config.as_deref())?;
    match command {
        Commands::Search(args) => execute_search(args, &defaults),
        Commands::Replace(args) => execute_replace(args, &defaults),
        Commands::Render(args) => execute_render(args),
        Commands::Defaults(args) => {
            let path = config.ok_or_else(|| anyhow!("defaults requires --config <PATH>"))?;
            execute_defaults(args, &path)
        }
    }
}

fn load_search_defaults(config: Option<&Path>) -> Result<SearchPreferences> {
    let Some(path) = config else {
        return Ok(SearchPreferences::default());
    };
    let store = PreferencesStore::load(path)
        .with_context(|| format!("failed to load preferences from {}", path.display()))?;
    debug!(path = %path.display(), "loaded search preferences");
    Ok(store.search_defaults().clone())
}

fn open_document(path: &Path) -> Result<Document> {
    Document::open(path).with_context(|| format!("failed to open {}", path.display()))
}

/// Command-line flags only ever switch a toggle on; preferences supply the rest.
fn session_for(matching: &MatchArgs, defaults: &SearchPreferences) -> SearchSession {
    let mut preferences = defaults.clone();
    preferences.case_sensitive |= matching.case_sensitive;
    preferences.whole_word |= matching.whole_word;
    preferences.scroll_into_view = false;
    SearchSession::from_preferences(&preferences)
}

fn execute_search(args: SearchArgs, defaults: &SearchPreferences) -> Result<()> {
    let SearchArgs { matching, html } = args;
    let mut document = open_document(&matching.file)?;
    let leaves: HashMap<NodeId, String> = document
        .text_leaves()
        .into_iter()
        .map(|leaf| (leaf.id, leaf.text.to_string()))
        .collect();

    let mut session = session_for(&matching, defaults);
    let mut observer = RecordingObserver::default();
    session.set_query(matching.query.as_str(), &mut document, &mut observer)?;

    println!(
        "Search \"{}\" ({} in {})",
        matching.query,
        session.status_label(),
        matching.file.display()
    );
    for span in session.spans() {
        let Some(text) = leaves.get(&span.leaf) else {
            continue;
        };
        println!(
            "  #{}: {}[{}]{}",
            span.rank,
            &text[..span.start],
            &text[span.start..span.end],
            &text[span.end..]
        );
    }
    if html {
        println!("{}", document.to_html());
    }
    Ok(())
}

fn execute_replace(args: ReplaceArgs, defaults: &SearchPreferences) -> Result<()> {
    let ReplaceArgs {
        matching,
        replacement,
        all,
        apply,
    } = args;
    let mut document = open_document(&matching.file)?;

    let mut session = session_for(&matching, defaults);
    let mut observer = RecordingObserver::default();
    let total = session.set_query(matching.query.as_str(), &mut document, &mut observer)?;
    session.set_replacement(replacement);

    let replaced = if all {
        session.replace_all(&mut document, &mut observer)?
    } else {
        usize::from(session.replace_current(&mut document, &mut observer)?)
    };
    session.close(&mut document);
    info!(total, replaced, "replace finished");

    println!("Replaced {replaced} of {total} matches");
    match observer.last_change() {
        Some(html) => println!("{html}"),
        None => println!("{}", document.to_html()),
    }

    if apply && replaced > 0 {
        document
            .save_as(&matching.file)
            .with_context(|| format!("failed to write {}", matching.file.display()))?;
        println!("Saved {}", matching.file.display());
    }
    Ok(())
}

fn execute_render(args: RenderArgs) -> Result<()> {
    let document = open_document(&args.file)?;
    println!("{}", document.to_html());
    Ok(())
}

fn execute_defaults(args: DefaultsArgs, path: &Path) -> Result<()> {
    let mut store = PreferencesStore::load(path)
        .with_context(|| format!("failed to load preferences from {}", path.display()))?;

    let mut search = store.search_defaults().clone();
    let before = search.clone();
    if let Some(value) = args.case_sensitive {
        search.case_sensitive = value;
    }
    if let Some(value) = args.whole_word {
        search.whole_word = value;
    }
    if let Some(value) = args.scroll_into_view {
        search.scroll_into_view = value;
    }
    if search != before {
        store.set_search_defaults(search)?;
        info!(path = %path.display(), "search defaults updated");
    }
    for (action, chord) in &args.bindings {
        store.bind(*action, chord)?;
        info!(?action, chord = %chord, "key binding updated");
    }

    let search = store.search_defaults();
    println!("case_sensitive = {}", search.case_sensitive);
    println!("whole_word = {}", search.whole_word);
    println!("scroll_into_view = {}", search.scroll_into_view);
    for (name, action) in ACTION_NAMES {
        println!("{name} = {}", store.bindings().chord_for(action));
    }
    Ok(())
}

const ACTION_NAMES: [(&str, SearchAction); 5] = [
    ("next", SearchAction::Next),
    ("previous", SearchAction::Previous),
    ("replace", SearchAction::Replace),
    ("replace-all", SearchAction::ReplaceAll),
    ("close", SearchAction::Close),
];

fn parse_binding(raw: &str) -> Result<(SearchAction, String)> {
    let Some((name, chord)) = raw.split_once('=') else {
        bail!("expected ACTION=CHORD, got `{raw}`");
    };
    let name = name.trim().to_ascii_lowercase().replace('_', "-");
    let action = ACTION_NAMES
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, action)| *action)
        .ok_or_else(|| anyhow!("unknown action `{name}`"))?;
    Ok((action, chord.to_string()))
}
