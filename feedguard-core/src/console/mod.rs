// File: feedguard-core/src/console/mod.rs

use crate::context::FilterContext;

mod collection;
mod toggle;
mod whitelist;

pub const HELP: &str = "\
Commands:
  help
  stats
  reset-stats
  refresh
  clear
  status
  toggle     <message-id> <on|off|clear>
  whitelist  <add|remove|list|clear> [user]
  collection <list|create|delete|switch> [name]
  mode       <normal|hard|showall|off|on>
  export
  quit
";

/// Run one console line. Returns `(quit, output)`; nothing here is fatal.
pub async fn dispatch(line: &str, ctx: &FilterContext) -> (bool, Option<String>) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let cmd = parts.first().map(|c| c.to_lowercase()).unwrap_or_default();
    let args = parts.get(1..).unwrap_or(&[]);

    match cmd.as_str() {
        "help" => (false, Some(HELP.to_string())),
        "stats" => {
            let s = ctx.stats();
            let (hits, misses) = ctx.engine.cache_counters();
            let out = format!(
                "processed={} filtered={} whitelisted={} cached={} hits={} misses={}",
                s.processed,
                s.filtered,
                s.whitelisted,
                ctx.engine.cached_results(),
                hits,
                misses
            );
            (false, Some(out))
        }
        "reset-stats" => {
            ctx.reset_stats();
            (false, Some("Stats reset.".to_string()))
        }
        "refresh" => {
            ctx.refresh_all().await;
            (false, Some("Re-scanned all messages.".to_string()))
        }
        "clear" => {
            ctx.clear_all();
            (false, Some("Filtering effects cleared.".to_string()))
        }
        "status" => (false, Some(status(ctx))),
        "toggle" => (false, Some(toggle::handle_toggle_command(args, ctx))),
        "whitelist" | "wl" => (false, Some(whitelist::handle_whitelist_command(args, ctx))),
        "collection" => (false, Some(collection::handle_collection_command(args, ctx))),
        "mode" => (false, Some(handle_mode_command(args, ctx))),
        "export" => match ctx.store.export_json() {
            Ok(json) => (false, Some(json)),
            Err(e) => (false, Some(format!("Export failed: {}", e))),
        },
        "quit" | "exit" => (true, Some("(console) shutting down...".to_string())),
        _ => {
            if cmd.is_empty() {
                (false, None)
            } else {
                (false, Some(format!("Unknown command '{}'. Type 'help' for usage.", cmd)))
            }
        }
    }
}

fn status(ctx: &FilterContext) -> String {
    let settings = ctx.store.settings();
    format!(
        "running={} enabled={} mode={:?} collection={} toggles={} pending_rechecks={}",
        ctx.is_running(),
        ctx.is_enabled(),
        settings.mode(),
        ctx.store.active_collection(),
        ctx.engine.toggle_count(),
        ctx.engine.pending_timers()
    )
}

fn handle_mode_command(args: &[&str], ctx: &FilterContext) -> String {
    let Some(mode) = args.first() else {
        return "Usage: mode <normal|hard|showall|off|on>".to_string();
    };
    let mut settings = ctx.store.settings();
    match mode.to_lowercase().as_str() {
        "normal" => {
            settings.hard_hide = false;
            settings.show_all_temporary = false;
        }
        "hard" => {
            settings.hard_hide = true;
            settings.show_all_temporary = false;
        }
        "showall" => settings.show_all_temporary = true,
        "off" => settings.enabled = false,
        "on" => settings.enabled = true,
        other => return format!("Unknown mode '{}'. Use normal, hard, showall, off or on.", other),
    }
    ctx.store.set_settings(settings);
    format!("Mode is now {:?}.", settings.mode())
}
