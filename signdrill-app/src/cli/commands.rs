use crate::api::server as api_server;
use crate::cli::opts::*;
use crate::config::{AppConfig, StoreKind};
use crate::vocab;

use anyhow::{Context, Result};
use chrono::Utc;
use signdrill_core::{
    daily_streak, deck_stats, filter_by_category, filter_by_text, per_category_totals,
    progress_report, summarize, Card, CardId, CardStore, Quality, Review, SessionManager,
    MASTERY_TARGET,
};
use signdrill_json::paths::data_root;
use signdrill_json::JsonStore;
use signdrill_sqlite::SqliteStore;
use std::collections::{HashMap, HashSet};
use std::io::{stdin, stdout, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

pub type Manager = SessionManager<Arc<dyn CardStore>>;

const JSON_BACKUPS: usize = 10;

pub async fn run_cli(args: Cli, config: AppConfig) -> Result<()> {
    let store = open_store(config.store, config.db_path.clone()).await?;
    let manager = SessionManager::new(store).with_limits(config.limits());

    match args.cmd {
        Command::Api(api) => {
            let addr: std::net::SocketAddr = api
                .addr
                .unwrap_or_else(|| config.api_addr.clone())
                .parse()
                .context("invalid api address")?;
            api_server::run(manager, addr, config.session_policy()).await
        }
        Command::Card(cmd) => card_cmd(&manager, cmd).await,
        Command::Due { limit } => due_cmd(&manager, limit).await,
        Command::Study => study_cmd(&manager).await,
        Command::Review(cmd) => review_cmd(&manager, cmd).await,
        Command::Stats => stats_cmd(&manager).await,
        Command::Seed { level } => seed_cmd(&manager, level).await,
        Command::Progress => progress_cmd(&manager).await,
        Command::Reset { yes } => reset_cmd(&manager, yes).await,
        Command::Export(cmd) => export_cmd(&manager, cmd).await,
        Command::Import(cmd) => import_cmd(&manager, cmd).await,
    }
}

pub async fn open_store(store: StoreKind, db_path: Option<PathBuf>) -> Result<Arc<dyn CardStore>> {
    match store {
        StoreKind::Json => {
            let s = match db_path {
                Some(p) => {
                    let backups = p
                        .parent()
                        .map(|d| d.join("backups"))
                        .unwrap_or_else(|| PathBuf::from("backups"));
                    JsonStore::open_with(p, backups, JSON_BACKUPS).await?
                }
                None => JsonStore::open_default().await?,
            };
            Ok(Arc::new(s))
        }
        StoreKind::Sqlite => {
            let p = db_path.unwrap_or_else(|| data_root().join("signdrill.sqlite3"));
            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let s = SqliteStore::open_file(&p).await?;
            Ok(Arc::new(s))
        }
    }
}

async fn all_cards_sorted(manager: &Manager) -> Result<Vec<Card>> {
    let mut cards: Vec<Card> = manager.store().get_all().await?.into_values().collect();
    cards.sort_by(|a, b| (&a.category, &a.word).cmp(&(&b.category, &b.word)));
    Ok(cards)
}

fn print_card(c: &Card) {
    let last = c
        .last_reviewed
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}\t{}\t{}\treps={}\tinterval={}d\tease={:.2}\tdue={}\tlast={}",
        c.id(),
        c.category,
        c.word,
        c.repetitions,
        c.interval,
        c.ease_factor,
        c.due_date.format("%Y-%m-%d %H:%M"),
        last
    );
}

async fn card_cmd(manager: &Manager, cmd: CardCmd) -> Result<()> {
    match cmd {
        CardCmd::Add(a) => {
            let c = manager.add_card(&a.category, &a.word, Utc::now()).await?;
            println!("{}", c.id());
        }
        CardCmd::List {
            category,
            query,
            level,
        } => {
            let mut cards = all_cards_sorted(manager).await?;
            if let Some(level) = level {
                cards.retain(|c| vocab::difficulty_of(&c.id()) == Some(level));
            }
            if let Some(cat) = category {
                cards = filter_by_category(&cards, &cat);
            }
            if let Some(q) = query {
                cards = filter_by_text(&cards, &q);
            }
            for c in &cards {
                print_card(c);
            }
        }
    }
    Ok(())
}

async fn due_cmd(manager: &Manager, limit: usize) -> Result<()> {
    let due = manager.due_cards(Utc::now(), limit).await?;
    if due.is_empty() {
        println!("no cards due");
    }
    for c in &due {
        print_card(c);
    }
    Ok(())
}

async fn review_cmd(manager: &Manager, cmd: ReviewCmd) -> Result<()> {
    let quality = Quality::new(cmd.quality)?;
    let id = CardId::new(&cmd.card.category, &cmd.card.word);
    let out = manager.review(&id, quality, Utc::now()).await?;
    println!("→ next due in {} day(s)", out.updated_card.interval);
    Ok(())
}

async fn study_cmd(manager: &Manager) -> Result<()> {
    let mut session = manager.start_session(Utc::now(), &mut rand::rng()).await?;
    let info = session.info();
    if info.total_cards == 0 {
        println!("No cards available for study at this time. Check back later or add more signs.");
        return Ok(());
    }
    println!(
        "{} card(s): {} new, {} review",
        info.total_cards, info.new_cards, info.review_cards
    );

    while let Some(next) = session.next_card() {
        let card = next.card.clone();
        let progress = session.progress();
        println!("\n[{}/{}] {}", progress.answered + 1, progress.total, card.category);
        println!("Sign: {}", card.word);
        for q in Quality::all() {
            println!("  {q} = {}", q.label());
        }
        let quality = loop {
            // End of input ends the session like `q`.
            let Some(line) = read_line("quality (0-5, q=quit)> ")? else {
                break None;
            };
            let input = line.trim().to_lowercase();
            if input == "q" || input == "quit" {
                break None;
            }
            match input.parse::<Quality>() {
                Ok(q) => break Some(q),
                Err(_) => println!("enter 0-5, or q"),
            }
        };
        let Some(quality) = quality else { break };

        let updated = manager
            .record_answer(&mut session, &card.id(), quality, Utc::now())
            .await?;
        println!("→ next due in {} day(s)", updated.interval);
    }

    let stats = manager.end_session(session);
    println!(
        "\nstudied {}/{} card(s), average quality {:.1}",
        stats.cards_completed, stats.total_cards, stats.average_quality
    );
    Ok(())
}

async fn stats_cmd(manager: &Manager) -> Result<()> {
    let now = Utc::now();
    let cards = manager.store().get_all().await?;
    let reviews = manager.store().list_reviews().await?;

    let deck = deck_stats(cards.values(), now);
    println!("cards:      {}", deck.total_cards);
    println!("practiced:  {}", deck.cards_with_repetitions);
    println!("mastered:   {}", deck.mastered_cards);
    println!("due now:    {}", deck.due_cards);

    let summary = summarize(&reviews);
    println!("reviews:    {}", summary.totals.total);
    println!("accuracy:   {:.0}%", summary.totals.accuracy() * 100.0);
    println!("avg rating: {:.1}", summary.totals.average_quality());
    println!("day streak: {}", daily_streak(&reviews, now.date_naive()));

    let per_cat = per_category_totals(&reviews, &cards);
    if !per_cat.is_empty() {
        println!();
        for (cat, t) in per_cat {
            println!("{cat}\t{} review(s)\t{:.0}% passed", t.total, t.accuracy() * 100.0);
        }
    }
    Ok(())
}

async fn seed_cmd(manager: &Manager, level: Option<vocab::Difficulty>) -> Result<()> {
    let now = Utc::now();
    let before = manager.store().get_all().await?.len();
    for (category, word) in vocab::starter_pairs(level) {
        manager.add_card(category, word, now).await?;
    }
    let after = manager.store().get_all().await?.len();
    println!("added {} card(s)", after - before);
    Ok(())
}

async fn progress_cmd(manager: &Manager) -> Result<()> {
    let now = Utc::now();
    let cards = manager.store().get_all().await?;
    let reviews = manager.store().list_reviews().await?;
    let report = progress_report(&reviews, &cards, now.date_naive());

    println!("signs practiced: {}", report.practiced);
    println!("signs mastered:  {} ({}%)", report.mastered, report.mastery_rate);
    println!("day streak:      {}", report.streak);

    if !report.top_categories.is_empty() {
        println!("\ntop categories");
        for c in &report.top_categories {
            println!("  {}\t{}/{} mastered ({}%)", c.name, c.mastered, c.practiced, c.mastery_rate);
        }
    }
    if !report.top_words.is_empty() {
        println!("\nmost practiced");
        for w in &report.top_words {
            let state = if w.mastered {
                "mastered".to_string()
            } else {
                format!("{}/{MASTERY_TARGET}", w.mastery_progress)
            };
            println!("  {} ({})\t{}x\t{state}", w.word, w.category, w.times_practiced);
        }
    }
    if !report.recent_activity.is_empty() {
        println!("\nrecent activity");
        for d in &report.recent_activity {
            println!("  {}\t{} sign(s)", d.date, d.signs);
        }
    }
    if report.recent_achievements.is_empty() {
        println!("\nNo achievements yet. Keep practicing!");
    } else {
        println!("\nachievements");
        for a in &report.recent_achievements {
            println!("  {}\tmastered {} in {}", a.achieved_at.format("%Y-%m-%d"), a.word, a.category);
        }
    }
    Ok(())
}

async fn reset_cmd(manager: &Manager, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("reset deletes all review history; rerun with --yes to confirm");
    }
    let n = manager.reset_progress(Utc::now()).await?;
    println!("All progress has been reset ({n} card(s)).");
    Ok(())
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ExportBundle {
    version: u32,
    cards: Vec<Card>,
    reviews: Vec<Review>,
}

async fn export_cmd(manager: &Manager, cmd: ExportCmd) -> Result<()> {
    match cmd {
        ExportCmd::Json { path } => {
            let cards = all_cards_sorted(manager).await?;
            let reviews = manager.store().list_reviews().await?;
            let bundle = ExportBundle { version: 1, cards, reviews };
            let s = serde_json::to_string_pretty(&bundle)?;
            std::fs::write(&path, s)?;
            println!("wrote {}", path.display());
        }
        ExportCmd::Csv { path } => {
            let cards = all_cards_sorted(manager).await?;
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record([
                "category",
                "word",
                "ease_factor",
                "interval",
                "repetitions",
                "due_date",
                "last_reviewed",
            ])?;
            for c in cards {
                wtr.write_record([
                    c.category,
                    c.word,
                    format!("{:.4}", c.ease_factor),
                    c.interval.to_string(),
                    c.repetitions.to_string(),
                    c.due_date.to_rfc3339(),
                    c.last_reviewed.map(|t| t.to_rfc3339()).unwrap_or_default(),
                ])?;
            }
            wtr.flush()?;
            println!("wrote {}", path.display());
        }
    }
    Ok(())
}

async fn import_cmd(manager: &Manager, cmd: ImportCmd) -> Result<()> {
    match cmd {
        ImportCmd::Json { path } => {
            let data = std::fs::read_to_string(&path)?;
            let bundle: ExportBundle = serde_json::from_str(&data)?;
            let store = manager.store();
            for c in &bundle.cards {
                store.put(c).await?;
            }
            let known: HashSet<_> = store.list_reviews().await?.into_iter().map(|r| r.id).collect();
            let mut added = 0usize;
            for r in bundle.reviews.iter().filter(|r| !known.contains(&r.id)) {
                store.insert_review(r).await?;
                added += 1;
            }
            println!("imported {} card(s), {} review(s)", bundle.cards.len(), added);
        }
        ImportCmd::Csv { path } => {
            let mut rdr = csv::Reader::from_path(&path)?;
            let now = Utc::now();
            let mut count = 0usize;
            for rec in rdr.records() {
                let rec = rec?;
                let category = rec.get(0).unwrap_or("").trim();
                let word = rec.get(1).unwrap_or("").trim();
                if category.is_empty() || word.is_empty() {
                    continue;
                }
                manager.add_card(category, word, now).await?;
                count += 1;
            }
            println!("imported {count} row(s)");
        }
        ImportCmd::Browser { path } => {
            let data = std::fs::read_to_string(&path)?;
            let saved: HashMap<String, Card> =
                serde_json::from_str(&data).context("not a saved card map")?;
            let merged = merge_browser_cards(manager.store(), saved.into_values()).await?;
            println!("imported {merged} card(s)");
        }
    }
    Ok(())
}

/// Store each browser card unless the store already holds a copy reviewed at
/// the same time or later.
pub async fn merge_browser_cards<S: CardStore + ?Sized>(
    store: &S,
    cards: impl IntoIterator<Item = Card>,
) -> Result<usize> {
    let mut merged = 0;
    for card in cards {
        let keep_existing = match store.get(&card.id()).await? {
            Some(existing) => existing.last_reviewed >= card.last_reviewed,
            None => false,
        };
        if !keep_existing {
            store.put(&card).await?;
            merged += 1;
        }
    }
    Ok(merged)
}

/// `None` once stdin is exhausted.
fn read_line(prompt: &str) -> Result<Option<String>> {
    read_line_from(&mut stdin().lock(), prompt)
}

fn read_line_from(input: &mut impl BufRead, prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    stdout().flush().ok();
    let mut s = String::new();
    if input.read_line(&mut s)? == 0 {
        println!();
        return Ok(None);
    }
    Ok(Some(s))
}
