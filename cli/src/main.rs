//! Command-line front end for the map editor core.
//!
//! Loads a map JSON document and runs one core operation over it: hit
//! resolution, draw-order ranking, a translate or scale of a selection, or a
//! consistency check. Results go to stdout as JSON; logs go to stderr.


use std::fs;
use std::io::{self, Read};

use clap::{Args, Parser, Subcommand};
use mapedit::geometry::AffineError;
use mapedit::select::{rank_by_z_index, resolve_hit, selectables};
use mapedit::transform::{apply_affine, selection_bounds};
use mapedit::{Affine, Map, SelectionKey, Vector2};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read map from {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid transform: {0}")]
    Affine(#[from] AffineError),
    #[error("nothing selected resolves; pass --px and --py to scale")]
    NoPivot,
    #[error("map has {0} consistency issue(s)")]
    Issues(usize),
}

#[derive(Parser, Debug)]
#[command(name = "mapedit-cli", about = "Inspect and transform level maps")]
struct Cli {
    /// Map JSON file. Pass `-` to read stdin.
    #[arg(long, env = "MAPEDIT_MAP")]
    map: String,

    /// Log filter directive, e.g. `debug` or `mapedit=debug`.
    #[arg(long, env = "MAPEDIT_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the topmost room or object under a point.
    Hit {
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },
    /// Print every room and object in draw order.
    Rank,
    /// Move the selection and print the resulting map.
    Translate(TranslateArgs),
    /// Scale the selection about a pivot and print the resulting map.
    Scale(ScaleArgs),
    /// Report duplicate ids, dangling teleporter links, and unknown kinds.
    Check,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// `<room>` or `<room>/<object>`. Repeat for a multi-selection.
    #[arg(long = "select", short = 's', required = true, value_parser = parse_selection_key)]
    keys: Vec<SelectionKey>,
}

#[derive(Args, Debug)]
struct TranslateArgs {
    #[arg(long, allow_negative_numbers = true)]
    dx: f64,
    #[arg(long, allow_negative_numbers = true)]
    dy: f64,
    #[command(flatten)]
    selection: SelectArgs,
}

#[derive(Args, Debug)]
struct ScaleArgs {
    #[arg(long, allow_negative_numbers = true)]
    sx: f64,
    #[arg(long, allow_negative_numbers = true)]
    sy: f64,
    /// Pivot x. Defaults to the left edge of the selection.
    #[arg(long, allow_negative_numbers = true, requires = "py")]
    px: Option<f64>,
    /// Pivot y. Defaults to the top edge of the selection.
    #[arg(long, allow_negative_numbers = true, requires = "px")]
    py: Option<f64>,
    #[command(flatten)]
    selection: SelectArgs,
}

/// One line of `rank` output. `z_index` is `null` for the bottom band.
#[derive(Debug, Serialize)]
struct RankedEntry {
    #[serde(flatten)]
    key: SelectionKey,
    z_index: Option<f64>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(&cli.log);

    let map = load_map(&cli.map)?;
    match cli.command {
        Command::Hit { x, y } => run_hit(&map, Vector2::new(x, y)),
        Command::Rank => run_rank(&map),
        Command::Translate(args) => {
            let op = Affine::translate(Vector2::new(args.dx, args.dy));
            print_json(&apply_affine(&map, &args.selection.keys, &op))
        }
        Command::Scale(args) => run_scale(&map, &args),
        Command::Check => run_check(&map),
    }
}

fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn load_map(path: &str) -> Result<Map, CliError> {
    let read_err = |source| CliError::Read { path: path.to_owned(), source };
    let text = if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(read_err)?;
        buf
    } else {
        fs::read_to_string(path).map_err(read_err)?
    };
    let map: Map = serde_json::from_str(&text)?;
    tracing::info!(name = %map.name, rooms = map.rooms.len(), "loaded map");
    Ok(map)
}

fn run_hit(map: &Map, point: Vector2) -> Result<(), CliError> {
    let all = selectables(map);
    let hit = resolve_hit(&all, point).map(|s| s.key());
    tracing::debug!(x = point.x, y = point.y, ?hit, "resolved hit");
    print_json(&hit)
}

fn run_rank(map: &Map) -> Result<(), CliError> {
    let ranked: Vec<RankedEntry> = rank_by_z_index(&selectables(map))
        .iter()
        .map(|s| RankedEntry { key: s.key(), z_index: Some(s.z_index()).filter(|z| z.is_finite()) })
        .collect();
    print_json(&ranked)
}

fn run_scale(map: &Map, args: &ScaleArgs) -> Result<(), CliError> {
    let keys = &args.selection.keys;
    let pivot = match (args.px, args.py) {
        (Some(x), Some(y)) => Vector2::new(x, y),
        _ => selection_bounds(map, keys).ok_or(CliError::NoPivot)?.top_left(),
    };
    let op = Affine::scale(Vector2::new(args.sx, args.sy), pivot)?;
    print_json(&apply_affine(map, keys, &op))
}

fn run_check(map: &Map) -> Result<(), CliError> {
    let issues = map.issues();
    for issue in &issues {
        tracing::warn!(%issue, "map issue");
    }
    print_json(&issues)?;
    if issues.is_empty() { Ok(()) } else { Err(CliError::Issues(issues.len())) }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

/// Parse `<room>` or `<room>/<object>`. The first `/` splits room from object.
fn parse_selection_key(raw: &str) -> Result<SelectionKey, String> {
    match raw.split_once('/') {
        None if raw.is_empty() => Err("selection key is empty".to_owned()),
        None => Ok(SelectionKey::room(raw)),
        Some((room, _)) if room.is_empty() => Err(format!("missing room id in {raw:?}")),
        Some((_, id)) if id.is_empty() => Err(format!("missing object id in {raw:?}")),
        Some((room, id)) => Ok(SelectionKey::object(room, id)),
    }
}
