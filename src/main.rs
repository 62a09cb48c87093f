use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use teloxide::prelude::*;
use teloxide::types::{InputFile, Message};
use tokio::sync::Mutex;

mod album;
mod render;
mod store;

use album::*;
use render::*;
use store::*;

const DEFAULT_RENDER_COLUMNS: u32 = 2;
const COOLDOWN_RATE: usize = 3;
const COOLDOWN_WINDOW: Duration = Duration::from_millis(2500);
const TRANSMISSION_ERROR: &str = "A transmission error occurred.";

#[derive(Debug, Deserialize, Clone)]
struct Config {
    token: String,
    album_db_path: Option<PathBuf>,
    media_dir: PathBuf,
    render_columns: Option<u32>,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    config: PathBuf,
}

struct AppState {
    config: Config,
    store: CardStore,
    http: reqwest::Client,
    view_states: ViewStateStore,
    cooldowns: Mutex<HashMap<u64, Vec<Instant>>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    fs::create_dir_all(&config.media_dir).context("create media_dir")?;

    let state = AppState {
        store: CardStore::new(config.album_db_path.clone()),
        http: reqwest::Client::new(),
        view_states: ViewStateStore::new(),
        cooldowns: Mutex::new(HashMap::new()),
        config: config.clone(),
    };
    let state = std::sync::Arc::new(state);

    let bot = Bot::new(config.token.clone());

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: std::sync::Arc<AppState>) -> Result<()> {
    let user_id = match msg.from() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    let text = match msg.text() {
        Some(text) => text.to_string(),
        None => return Ok(()),
    };

    let Some(cmd) = parse_command(&text) else {
        return Ok(());
    };

    match cmd {
        "start" | "help" => {
            let help = "Use /album to view a page of your card album. \
                Arguments: a page number, a sort key (id, name, attribute, rarity), \
                a rarity (UR, SSR, SR, R, N) or attribute (Smile, Pure, Cool) to filter, \
                or all to clear filters.";
            bot.send_message(msg.chat.id, help).await?;
        }
        "album" => {
            if !check_cooldown(&state, user_id).await {
                debug!("album command throttled for user {}", user_id);
                return Ok(());
            }
            let args: Vec<&str> = text.split_whitespace().skip(1).collect();
            handle_album_command(bot, msg, state, user_id, &args).await?;
        }
        _ => {
            // Unknown command, ignore.
        }
    }

    Ok(())
}

async fn handle_album_command(
    bot: Bot,
    msg: Message,
    state: std::sync::Arc<AppState>,
    user_id: u64,
    args: &[&str],
) -> Result<()> {
    let album = match state.store.get_user_album(user_id) {
        Ok(album) => album,
        Err(err @ StoreError::NotConfigured) => {
            send_error(&bot, &msg, &err.to_string()).await?;
            return Ok(());
        }
        Err(err) => {
            error!("album fetch failed for user {}: {:#}", user_id, err);
            send_error(&bot, &msg, TRANSMISSION_ERROR).await?;
            return Ok(());
        }
    };

    let mut view = state.view_states.get(user_id).await;
    parse_album_arguments(&mut view, args);
    let mut album = apply_filters(album, &view.filters);
    apply_sort(&mut album, view.sort);
    let album_size = album.len();
    let page_cards = page_slice(&album, &mut view.page);
    let page = view.page;
    state.view_states.put(user_id, view).await;

    let urls: Vec<String> = page_cards.iter().filter_map(|card| card.image_url()).collect();
    let image_path = if urls.is_empty() {
        None
    } else {
        let columns = state.config.render_columns.unwrap_or(DEFAULT_RENDER_COLUMNS);
        let out_path = state.config.media_dir.join(render_file_name());
        match compose(&state.http, &urls, columns, &out_path).await {
            Ok(path) => path,
            Err(err) => {
                error!("album render failed for user {}: {:#}", user_id, err);
                None
            }
        }
    };

    handle_result(&bot, &msg, album_size, page, image_path).await
}

async fn handle_result(
    bot: &Bot,
    msg: &Message,
    album_size: usize,
    page: usize,
    image_path: Option<PathBuf>,
) -> Result<()> {
    let Some(path) = image_path else {
        return send_error(bot, msg, TRANSMISSION_ERROR).await;
    };

    let max_page = (album_size + PAGE_SIZE - 1) / PAGE_SIZE;
    let caption = format!("Page {} of {}", page + 1, max_page);
    bot.send_photo(msg.chat.id, InputFile::file(path.clone()))
        .caption(caption)
        .reply_to_message_id(msg.id)
        .await?;

    if let Err(err) = fs::remove_file(&path) {
        warn!("failed to remove rendered album {}: {}", path.display(), err);
    }
    Ok(())
}

async fn send_error(bot: &Bot, msg: &Message, text: &str) -> Result<()> {
    bot.send_message(msg.chat.id, text)
        .reply_to_message_id(msg.id)
        .await?;
    Ok(())
}

async fn check_cooldown(state: &AppState, user_id: u64) -> bool {
    let mut cooldowns = state.cooldowns.lock().await;
    let hits = cooldowns.entry(user_id).or_default();
    cooldown_check(hits, Instant::now())
}

fn cooldown_check(hits: &mut Vec<Instant>, now: Instant) -> bool {
    hits.retain(|hit| now.duration_since(*hit) < COOLDOWN_WINDOW);
    if hits.len() >= COOLDOWN_RATE {
        return false;
    }
    hits.push(now);
    true
}

fn render_file_name() -> String {
    let mut rng = rand::thread_rng();
    format!("album-{}-{}.png", now_ts(), rng.gen_range(0..100))
}

fn load_config(path: &Path) -> Result<Config> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let config: Config = toml::from_str(&contents).context("parse config")?;
    Ok(config)
}

fn parse_command(text: &str) -> Option<&str> {
    let first = text.split_whitespace().next()?;
    if !first.starts_with('/') {
        return None;
    }
    let cmd = first.trim_start_matches('/');
    Some(cmd.split('@').next().unwrap_or(cmd))
}

fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}
