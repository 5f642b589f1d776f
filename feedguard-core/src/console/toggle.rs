use crate::context::FilterContext;

pub fn handle_toggle_command(args: &[&str], ctx: &FilterContext) -> String {
    if args.len() < 2 {
        return "Usage: toggle <message-id> <on|off|clear>".to_string();
    }
    let id = args[0];
    match args[1].to_lowercase().as_str() {
        "on" => {
            if ctx.set_toggle(id, true) {
                format!("Message {} forced visible.", id)
            } else {
                format!("Message {} is not rendered right now; nothing changed.", id)
            }
        }
        "off" => {
            if ctx.set_toggle(id, false) {
                format!("Message {} follows the whitelist again.", id)
            } else {
                format!("Message {} is not rendered right now.", id)
            }
        }
        "clear" => {
            ctx.clear_toggles();
            "All per-message overrides cleared.".to_string()
        }
        other => format!("Unknown toggle state '{}'. Use on, off or clear.", other),
    }
}
