use crate::context::FilterContext;

pub fn handle_whitelist_command(args: &[&str], ctx: &FilterContext) -> String {
    if args.is_empty() {
        return "Usage: whitelist <add|remove|list|clear> [user]".to_string();
    }
    match args[0] {
        "add" => {
            let Some(user) = args.get(1) else {
                return "Usage: whitelist add <user>".to_string();
            };
            match ctx.store.add_user(user) {
                Ok(true) => format!("Added '{}'.", user),
                Ok(false) => format!("'{}' is already whitelisted.", user),
                Err(e) => format!("Error adding '{}': {}", user, e),
            }
        }
        "remove" => {
            let Some(user) = args.get(1) else {
                return "Usage: whitelist remove <user>".to_string();
            };
            match ctx.store.remove_user(user) {
                Ok(true) => format!("Removed '{}'.", user),
                Ok(false) => format!("'{}' was not whitelisted.", user),
                Err(e) => format!("Error removing '{}': {}", user, e),
            }
        }
        "list" => match ctx.store.users() {
            Ok(users) if users.is_empty() => "Whitelist is empty.".to_string(),
            Ok(users) => {
                let mut out = format!("Whitelist ({}):\n", ctx.store.active_collection());
                for u in users {
                    out.push_str(&format!("  {}\n", u));
                }
                out
            }
            Err(e) => format!("Error listing whitelist: {}", e),
        },
        "clear" => match ctx.store.clear_whitelist() {
            Ok(n) => format!("Removed {} users.", n),
            Err(e) => format!("Error clearing whitelist: {}", e),
        },
        other => format!("Unknown whitelist subcommand '{}'.", other),
    }
}
