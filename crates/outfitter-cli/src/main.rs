use std::env;
use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use outfitter_contracts::api::AdviceOptions;
use outfitter_contracts::catalog::{Avatar, AvatarCatalog, Category, StyleCatalog};
use outfitter_contracts::chat::{parse_command, SessionCommand, SESSION_HELP_COMMANDS};
use outfitter_contracts::closet::{ClosetStore, FileStorage, StagingArea};
use outfitter_contracts::events::{ActivityKind, ActivityLog, ActivityPayload};
use outfitter_contracts::media::DataUri;
use outfitter_contracts::session::{Look, LookGroups, Session};
use outfitter_engine::{
    dispatch, write_look_artifacts, Stylist, DEFAULT_PROVIDER, FASHION_ADVICE_ROUTE,
    VIRTUAL_TRY_ON_ROUTE,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const DEFAULT_CLOSET_FILE: &str = "outfitter-closet.json";
const CUSTOM_AVATAR_ID: &str = "custom";

#[derive(Debug, Parser)]
#[command(name = "outfitter-rs", version, about = "Closet, look generator and virtual try-on")]
struct Cli {
    /// Closet file; defaults to $OUTFITTER_CLOSET, then outfitter-closet.json.
    #[arg(long, global = true)]
    closet: Option<PathBuf>,
    /// dryrun, gemini or proxy; defaults to $OUTFITTER_PROVIDER, then gemini.
    #[arg(long, global = true)]
    provider: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Closet(ClosetCommand),
    Advise(AdviseArgs),
    TryOn(TryOnArgs),
    Session(SessionArgs),
    #[command(subcommand)]
    Api(ApiCommand),
    Styles,
    Avatars,
}

#[derive(Debug, Subcommand)]
enum ClosetCommand {
    List,
    Add(AddArgs),
    Remove { id: String },
}

#[derive(Debug, Parser)]
struct AddArgs {
    #[arg(required = true)]
    paths: Vec<PathBuf>,
    #[arg(long)]
    category: String,
}

#[derive(Debug, Parser)]
struct AdviseArgs {
    /// Closet item id; repeat for every piece.
    #[arg(long = "item", required = true)]
    items: Vec<String>,
    #[arg(long)]
    style: Option<String>,
    #[arg(long, default_value = "")]
    prompt: String,
    #[arg(long)]
    suggest_new: bool,
    #[arg(long)]
    shoes: bool,
    #[arg(long)]
    accessories: bool,
    /// Write look images and looks.json here.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct TryOnArgs {
    #[arg(long = "item", required = true)]
    items: Vec<String>,
    #[arg(long, conflicts_with = "avatar_file")]
    avatar: Option<String>,
    /// Full-body photo to use instead of a built-in avatar.
    #[arg(long)]
    avatar_file: Option<PathBuf>,
    /// Where to write the resulting image.
    #[arg(long)]
    out: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long, default_value = "outfitter-session")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ApiCommand {
    /// Answer one fashion-advice request body (file or stdin).
    FashionAdvice { request: Option<PathBuf> },
    /// Answer one virtual-tryon request body (file or stdin).
    VirtualTryon { request: Option<PathBuf> },
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("outfitter-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let closet_path = cli.closet.clone().unwrap_or_else(default_closet_path);
    let provider = cli
        .provider
        .clone()
        .or_else(|| non_empty_env("OUTFITTER_PROVIDER"))
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());

    match cli.command {
        Command::Closet(command) => run_closet(&closet_path, command),
        Command::Advise(args) => run_advise(&closet_path, &provider, args),
        Command::TryOn(args) => run_try_on(&closet_path, &provider, args),
        Command::Session(args) => {
            run_session(&closet_path, &provider, args)?;
            Ok(0)
        }
        Command::Api(command) => run_api(&provider, command),
        Command::Styles => {
            for style in StyleCatalog::default().list() {
                println!("{:<12} {} - {}", style.value, style.label, style.description);
            }
            Ok(0)
        }
        Command::Avatars => {
            for avatar in AvatarCatalog::default().list() {
                println!("{:<10} {}", avatar.id, avatar.alt_text);
            }
            Ok(0)
        }
    }
}

fn default_closet_path() -> PathBuf {
    non_empty_env("OUTFITTER_CLOSET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CLOSET_FILE))
}

fn open_closet(path: &Path) -> ClosetStore<FileStorage> {
    ClosetStore::load(FileStorage::new(path))
}

fn run_closet(closet_path: &Path, command: ClosetCommand) -> Result<i32> {
    let mut closet = open_closet(closet_path);
    match command {
        ClosetCommand::List => {
            if closet.is_empty() {
                println!("Closet is empty ({}).", closet_path.display());
            }
            for item in closet.items() {
                println!(
                    "{}  {:<18} {} ({} bytes)",
                    item.id,
                    item.category.as_str(),
                    item.name,
                    item.size
                );
            }
        }
        ClosetCommand::Add(args) => {
            let category: Category = args.category.parse()?;
            let mut staging = StagingArea::new();
            staging.ingest_paths(&args.paths)?;
            for index in 0..staging.len() {
                staging.set_category(index, category)?;
            }
            for item in staging.commit(&mut closet)? {
                println!("Added {} ({})", item.id, item.name);
            }
        }
        ClosetCommand::Remove { id } => {
            if !closet.remove(&id) {
                eprintln!("No closet item {id}.");
                return Ok(1);
            }
            println!("Removed {id}");
        }
    }
    Ok(0)
}

fn build_stylist(provider: &str, events: Option<&Path>, session: &Session) -> Result<Stylist> {
    let stylist = Stylist::new(provider)?;
    Ok(match events {
        Some(path) => stylist.with_activity_log(ActivityLog::new(path, session.session_id.clone())),
        None => stylist,
    })
}

fn ensure_known_ids(closet_ids: &[String], requested: &[String]) -> Result<()> {
    for id in requested {
        if !closet_ids.iter().any(|known| known == id) {
            bail!("no closet item {id}");
        }
    }
    Ok(())
}

fn run_advise(closet_path: &Path, provider: &str, args: AdviseArgs) -> Result<i32> {
    let closet = open_closet(closet_path);
    let styles = StyleCatalog::default();
    let mut session = Session::new(&styles, &AvatarCatalog::default());
    let known: Vec<String> = closet.items().iter().map(|item| item.id.clone()).collect();
    ensure_known_ids(&known, &args.items)?;
    for id in &args.items {
        session.generator_selection.select(id);
    }
    if let Some(style) = args.style {
        session.style = style;
    }
    session.custom_prompt = args.prompt;
    session.options = AdviceOptions {
        suggest_new_items: args.suggest_new,
        include_shoes: args.shoes,
        include_accessories: args.accessories,
    };

    let stylist = build_stylist(provider, args.events.as_deref(), &session)?.with_styles(styles);
    if let Err(err) = stylist.generate_looks(&closet, &mut session) {
        eprintln!("{err}");
        return Ok(1);
    }
    print_look_groups(&session.looks.groups());
    if let Some(out) = args.out {
        let written = write_look_artifacts(&out, session.looks.looks())?;
        println!("Wrote {} files to {}", written.len(), out.display());
    }
    Ok(0)
}

fn run_try_on(closet_path: &Path, provider: &str, args: TryOnArgs) -> Result<i32> {
    let closet = open_closet(closet_path);
    let avatars = AvatarCatalog::default();
    let mut session = Session::new(&StyleCatalog::default(), &avatars);
    let known: Vec<String> = closet.items().iter().map(|item| item.id.clone()).collect();
    ensure_known_ids(&known, &args.items)?;
    for id in &args.items {
        session.try_on_selection.select(id);
    }

    let custom = args
        .avatar_file
        .as_deref()
        .map(Avatar::from_file)
        .transpose()?;
    if let Some(id) = args.avatar {
        session.avatar_id = id;
    }
    if custom.is_some() {
        session.avatar_id = CUSTOM_AVATAR_ID.to_string();
    }
    let avatar = resolve_avatar(&avatars, custom.as_ref(), &session.avatar_id);

    let stylist = build_stylist(provider, args.events.as_deref(), &session)?;
    let image = match stylist.try_on_selection(&closet, avatar, &mut session) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("{err}");
            return Ok(1);
        }
    };
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(format!("tryon.{}", image.file_extension())));
    write_image(&out, &image)?;
    println!("Try-on image written to {}", out.display());
    Ok(0)
}

fn run_api(provider: &str, command: ApiCommand) -> Result<i32> {
    let (route, source) = match command {
        ApiCommand::FashionAdvice { request } => (FASHION_ADVICE_ROUTE, request),
        ApiCommand::VirtualTryon { request } => (VIRTUAL_TRY_ON_ROUTE, request),
    };
    let body = match source {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?,
        None => {
            let mut body = String::new();
            io::stdin()
                .read_to_string(&mut body)
                .context("failed reading request body from stdin")?;
            body
        }
    };
    let stylist = Stylist::new(provider)?;
    let reply = dispatch(&stylist, route, &body);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "status": reply.status, "body": reply.body }))?
    );
    Ok(if reply.is_success() { 0 } else { 1 })
}

fn resolve_avatar<'a>(
    avatars: &'a AvatarCatalog,
    custom: Option<&'a Avatar>,
    avatar_id: &str,
) -> Option<&'a Avatar> {
    if avatar_id == CUSTOM_AVATAR_ID {
        return custom;
    }
    avatars.get(avatar_id)
}

/// Bare words are avatar ids; anything with a directory, an extension or an
/// existing file behind it is a photo.
fn looks_like_photo_path(value: &str) -> bool {
    let path = Path::new(value);
    path.exists() || path.extension().is_some() || path.components().count() > 1
}

fn write_image(path: &Path, image: &DataUri) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, image.decode_bytes()?)
        .with_context(|| format!("failed to write {}", path.display()))
}

struct SessionState {
    closet: ClosetStore<FileStorage>,
    staging: StagingArea,
    session: Session,
    styles: StyleCatalog,
    avatars: AvatarCatalog,
    custom_avatar: Option<Avatar>,
    stylist: Stylist,
    activity: ActivityLog,
    out_dir: PathBuf,
}

fn run_session(closet_path: &Path, provider: &str, args: SessionArgs) -> Result<()> {
    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let styles = StyleCatalog::default();
    let avatars = AvatarCatalog::default();
    let session = Session::new(&styles, &avatars);
    let activity = ActivityLog::new(&events_path, session.session_id.clone());
    let stylist = Stylist::new(provider)?
        .with_styles(styles.clone())
        .with_activity_log(activity.clone());

    let mut state = SessionState {
        closet: open_closet(closet_path),
        staging: StagingArea::new(),
        session,
        styles,
        avatars,
        custom_avatar: None,
        stylist,
        activity,
        out_dir: args.out,
    };
    state.activity.note(
        ActivityKind::SessionStarted,
        payload(json!({
            "provider": state.stylist.provider_name(),
            "closet_items": state.closet.len(),
        })),
    );

    let stdin = io::stdin();
    let mut line = String::new();
    println!(
        "Outfitter session started ({} pieces in the closet). Type /help for commands.",
        state.closet.len()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        if command.action == "noop" {
            continue;
        }
        if let Err(err) = handle_session_command(&mut state, &command) {
            println!("Error: {err:#}");
        }
    }
    Ok(())
}

fn handle_session_command(state: &mut SessionState, command: &SessionCommand) -> Result<()> {
    match command.action.as_str() {
        "help" => println!("Commands: {}", SESSION_HELP_COMMANDS.join(" ")),
        "show_closet" => print_closet(state),
        "stage" => {
            let paths: Vec<PathBuf> = command.arg_list("values").into_iter().map(PathBuf::from).collect();
            if paths.is_empty() {
                println!("/stage requires one or more image paths");
                return Ok(());
            }
            let count = state.staging.ingest_paths(&paths)?;
            state.activity.note(
                ActivityKind::ItemsStaged,
                payload(json!({ "count": count })),
            );
            println!("Staged {count} piece(s). Give each a /category, then /commit.");
        }
        "show_staged" => {
            if state.staging.is_empty() {
                println!("Nothing staged.");
            }
            for (index, item) in state.staging.items().iter().enumerate() {
                println!("[{index}] {} ({}) {}", item.name, item.mime_type, item.category.label());
            }
        }
        "set_category" => {
            let index = command
                .args
                .get("index")
                .and_then(Value::as_u64)
                .context("/category requires an index")?;
            let category: Category = command
                .arg_str("category")
                .context("/category requires a category")?
                .parse()?;
            state.staging.set_category(index as usize, category)?;
            println!("[{index}] is now {}", category.label());
        }
        "unstage" => {
            let index: usize = command
                .arg_str("value")
                .context("/unstage requires an index")?
                .parse()
                .context("/unstage index must be a number")?;
            let removed = state.staging.remove(index)?;
            println!("Dropped {}", removed.name);
        }
        "commit" => {
            let added = state.staging.commit(&mut state.closet)?;
            for item in &added {
                state.activity.note(
                    ActivityKind::ClosetItemAdded,
                    payload(json!({ "id": item.id, "category": item.category })),
                );
                println!("Added {} ({}, {})", item.id, item.name, item.category.as_str());
            }
        }
        "remove_item" => {
            let id = command.arg_str("value").context("/remove requires an item id")?;
            if state.closet.remove(id) {
                state.session.generator_selection.deselect(id);
                state.session.try_on_selection.deselect(id);
                state.activity.note(ActivityKind::ClosetItemRemoved, payload(json!({ "id": id })));
                println!("Removed {id}");
            } else {
                println!("No closet item {id}.");
            }
        }
        "select" | "tryon_select" => {
            let ids = command.arg_list("values");
            if ids.is_empty() {
                println!("/{} requires one or more item ids", command.action);
                return Ok(());
            }
            let for_try_on = command.action == "tryon_select";
            for id in ids {
                if state.closet.get(&id).is_none() {
                    println!("No closet item {id}.");
                    continue;
                }
                let selection = if for_try_on {
                    &mut state.session.try_on_selection
                } else {
                    &mut state.session.generator_selection
                };
                let selected = selection.toggle(&id);
                println!("{id} {}", if selected { "selected" } else { "deselected" });
            }
        }
        "set_style" => match command.arg_str("value") {
            Some(value) if state.styles.get(value).is_some() => {
                state.session.style = value.to_string();
                println!("Style set to {value}");
            }
            _ => {
                let known: Vec<&str> = state.styles.list().map(|style| style.value.as_str()).collect();
                println!("Styles: {}", known.join(", "));
            }
        },
        "set_prompt" => {
            state.session.custom_prompt = command.arg_str("value").unwrap_or_default().to_string();
            if state.session.custom_prompt.is_empty() {
                println!("Custom request cleared");
            } else {
                println!("Custom request: {}", state.session.custom_prompt);
            }
        }
        "set_flag" => {
            let flag = command.arg_str("flag").unwrap_or_default();
            let enabled = command
                .args
                .get("enabled")
                .and_then(Value::as_bool)
                .unwrap_or(true);
            if apply_flag(&mut state.session.options, flag, enabled) {
                println!("{flag}: {}", if enabled { "on" } else { "off" });
            } else {
                println!("Unknown option {flag}");
            }
        }
        "set_avatar" => {
            let Some(value) = command.arg_str("value") else {
                for avatar in state.avatars.list() {
                    println!("{:<10} {}", avatar.id, avatar.alt_text);
                }
                return Ok(());
            };
            if state.avatars.get(value).is_some() {
                state.session.avatar_id = value.to_string();
                println!("Avatar set to {value}");
            } else if looks_like_photo_path(value) {
                let avatar = Avatar::from_file(Path::new(value))?;
                println!("Using your photo {} as the avatar", avatar.alt_text);
                state.custom_avatar = Some(avatar);
                state.session.avatar_id = CUSTOM_AVATAR_ID.to_string();
            } else {
                println!("Unknown avatar {value}. Pick one of these or give a photo path:");
                for avatar in state.avatars.list() {
                    println!("{:<10} {}", avatar.id, avatar.alt_text);
                }
            }
        }
        "generate" => {
            if let Some(prompt) = command.arg_str("prompt") {
                state.session.custom_prompt = prompt.to_string();
            }
            println!("Generating looks…");
            let count = state
                .stylist
                .generate_looks(&state.closet, &mut state.session)?;
            println!("{count} look(s):");
            print_look_groups(&state.session.looks.groups());
        }
        "try_on" => {
            let avatar = resolve_avatar(
                &state.avatars,
                state.custom_avatar.as_ref(),
                &state.session.avatar_id,
            );
            println!("Dressing the avatar…");
            let image = state
                .stylist
                .try_on_selection(&state.closet, avatar, &mut state.session)?;
            let path = state.out_dir.join(format!(
                "tryon-{}.{}",
                unix_epoch_millis(),
                image.file_extension()
            ));
            write_image(&path, &image)?;
            println!("Try-on image written to {}", path.display());
        }
        "toggle_favorite" => {
            let id = command.arg_str("value").context("/favorite requires a look id")?;
            match state.session.looks.toggle_favorite(id) {
                Some(favorited) => {
                    state.activity.note(
                        ActivityKind::FavoriteToggled,
                        payload(json!({ "look_id": id, "is_favorited": favorited })),
                    );
                    println!("{id} {}", if favorited { "added to favorites" } else { "removed from favorites" });
                }
                None => println!("No look {id} in the current batch."),
            }
        }
        "show_looks" => {
            if state.session.looks.is_empty() {
                println!("No looks yet. Select pieces and /generate.");
            } else {
                print_look_groups(&state.session.looks.groups());
            }
        }
        "save_looks" => {
            let dir = command
                .arg_str("value")
                .map(PathBuf::from)
                .unwrap_or_else(|| state.out_dir.join("looks"));
            let written = write_look_artifacts(&dir, state.session.looks.looks())?;
            println!("Wrote {} files to {}", written.len(), dir.display());
        }
        "unknown" => {
            let name = command
                .args
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or_default();
            println!("Unknown command /{name}. Type /help for commands.");
        }
        other => println!("Unhandled action {other}"),
    }
    Ok(())
}

fn apply_flag(options: &mut AdviceOptions, flag: &str, enabled: bool) -> bool {
    match flag {
        "suggest_new_items" => options.suggest_new_items = enabled,
        "include_shoes" => options.include_shoes = enabled,
        "include_accessories" => options.include_accessories = enabled,
        _ => return false,
    }
    true
}

fn print_closet(state: &SessionState) {
    if state.closet.is_empty() {
        println!("Closet is empty. /stage some photos first.");
        return;
    }
    for item in state.closet.items() {
        let generator = if state.session.generator_selection.contains(&item.id) {
            "G"
        } else {
            "-"
        };
        let try_on = if state.session.try_on_selection.contains(&item.id) {
            "T"
        } else {
            "-"
        };
        println!(
            "[{generator}{try_on}] {}  {:<18} {}",
            item.id,
            item.category.as_str(),
            item.name
        );
    }
}

/// Favorites first on their own, then every look again.
fn print_look_groups(groups: &LookGroups<'_>) {
    if !groups.favorites.is_empty() {
        println!("Favorites:");
        for look in &groups.favorites {
            println!("  {}", format_look_line(look));
        }
        println!("All looks:");
    }
    for look in groups.all {
        println!("  {}", format_look_line(look));
    }
}

fn format_look_line(look: &Look) -> String {
    let star = if look.is_favorited { "*" } else { " " };
    let image = look
        .image
        .as_ref()
        .map(|image| image.mime_type().to_string())
        .unwrap_or_else(|| "no image".to_string());
    format!("{star} {} [{image}] {}", look.id, look.description)
}

fn unix_epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

fn payload(value: Value) -> ActivityPayload {
    match value {
        Value::Object(map) => map,
        _ => ActivityPayload::new(),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
