use crate::context::FilterContext;

pub fn handle_collection_command(args: &[&str], ctx: &FilterContext) -> String {
    if args.is_empty() {
        return "Usage: collection <list|create|delete|switch> [name]".to_string();
    }
    if args[0] == "list" {
        let active = ctx.store.active_collection();
        let mut out = String::from("Collections:\n");
        for c in ctx.store.collections() {
            let marker = if c.name == active { "*" } else { " " };
            out.push_str(&format!("{} {} ({} users)\n", marker, c.name, c.users.len()));
        }
        return out;
    }
    let Some(name) = args.get(1) else {
        return format!("Usage: collection {} <name>", args[0]);
    };
    let result = match args[0] {
        "create" => ctx.store.create_collection(name).map(|_| format!("Created '{}'.", name)),
        "delete" => ctx.store.delete_collection(name).map(|_| format!("Deleted '{}'.", name)),
        "switch" => ctx.store.switch_collection(name).map(|switched| {
            if switched {
                format!("Switched to '{}'.", name)
            } else {
                format!("'{}' is already active.", name)
            }
        }),
        other => return format!("Unknown collection subcommand '{}'.", other),
    };
    result.unwrap_or_else(|e| format!("Error: {}", e))
}
