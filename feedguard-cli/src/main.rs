// File: feedguard-cli/src/main.rs

use std::path::PathBuf;
use std::sync::Arc;
use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use feedguard_common::models::ImportMode;
use feedguard_common::traits::HostDom;
use feedguard_core::console::dispatch;
use feedguard_core::dom::PageFixture;
use feedguard_core::logging::init_tracing;
use feedguard_core::test_utils::helpers::ChatPage;
use feedguard_core::{FilterConfig, FilterContext, MemoryDom, MemoryWhitelistStore};

/// Command-line arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "feedguard")]
#[command(author, version, about = "Whitelist filter for chat message feeds")]
struct Args {
    /// Page fixture (JSON). Without it a small demo conversation is used.
    #[arg(long)]
    page: Option<PathBuf>,

    /// Whitelist export to import before filtering
    #[arg(long)]
    whitelist: Option<PathBuf>,

    /// Filter config (JSON); FEEDGUARD_* variables apply when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Hide non-whitelisted messages instead of collapsing them
    #[arg(long, default_value = "false")]
    hard_hide: bool,

    /// Drop into the developer console after the report
    #[arg(long, default_value = "false")]
    console: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("feedguard=info");
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            FilterConfig::from_json_str(&raw)?
        }
        None => FilterConfig::from_env()?,
    };

    let dom: Arc<dyn HostDom> = match &args.page {
        Some(path) => {
            let fixture = PageFixture::load(path)
                .with_context(|| format!("loading page {}", path.display()))?;
            Arc::new(MemoryDom::from_fixture(&fixture)?)
        }
        None => {
            info!("No --page given; using the demo conversation");
            demo_page()?
        }
    };

    let store = Arc::new(MemoryWhitelistStore::new());
    match &args.whitelist {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading whitelist {}", path.display()))?;
            store.import_json(&raw, ImportMode::Replace)?;
        }
        None if args.page.is_none() => {
            store.add_user("alice")?;
        }
        None => warn!("No --whitelist given; every author will be filtered"),
    }
    if args.hard_hide {
        store.set_hard_hide(true);
    }

    let debounce = config.debounce();
    let ctx = FilterContext::with_store(dom, store, config)?;
    ctx.initialize().await;
    tokio::time::sleep(debounce * 2).await;

    print_report(&ctx);

    if args.console {
        run_console(&ctx).await?;
    }

    ctx.shutdown();
    info!("feedguard finished");
    Ok(())
}

fn demo_page() -> anyhow::Result<Arc<dyn HostDom>> {
    let page = ChatPage::new()?;
    page.push(Some("alice"), "hey all")?;
    page.push(None, "anyone around?")?;
    page.push(Some("bob"), "buy cheap followers")?;
    page.push(None, "link in bio")?;
    page.push_divider("Today")?;
    page.push_reply("bob", Some("Alice"), "please stop")?;
    let dom: Arc<dyn HostDom> = page.dom.clone();
    Ok(dom)
}

fn print_report(ctx: &FilterContext) {
    let rows = ctx.report();
    let width = rows.iter().map(|r| r.message_id.len()).max().unwrap_or(10).max(10);
    println!("{:<width$}  {:<20}  state", "message id", "author", width = width);
    for row in rows {
        println!(
            "{:<width$}  {:<20}  {}",
            row.message_id,
            row.author.as_deref().unwrap_or("?"),
            row.action.map(|a| a.as_str()).unwrap_or("-"),
            width = width
        );
    }
    let s = ctx.stats();
    println!(
        "processed={} filtered={} whitelisted={}",
        s.processed, s.filtered, s.whitelisted
    );
}

async fn run_console(ctx: &FilterContext) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"feedguard> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let (quit, output) = dispatch(&line, ctx).await;
        if let Some(out) = output {
            stdout.write_all(out.as_bytes()).await?;
            if !out.ends_with('\n') {
                stdout.write_all(b"\n").await?;
            }
        }
        if quit {
            break;
        }
    }
    Ok(())
}
