//! `skill-bus inserts --scope global/project`: numbered insert listing for
//! one scope, with text preview and conditions.

use std::path::Path;

use crate::commands::utils::{config_path_for_scope, flag_value, format_conditions};
use crate::config;

const PREVIEW_LEN: usize = 60;

pub fn execute(args: &[String], cwd: &Path) -> Result<(String, i32), String> {
    let scope = flag_value(args, "--scope")
        .ok_or("Usage: skill-bus inserts --scope global|project [--cwd <path>]")?;
    let path = config_path_for_scope(scope, cwd)?;

    let mut warnings = Vec::new();
    let loaded = config::load_config(&path, &mut warnings);
    let mut out = match loaded {
        None => format!("No {} config found.", scope),
        Some(value) => {
            let inserts = value.get("inserts").and_then(|v| v.as_object());
            match inserts {
                None => format!("No inserts in {} config.", scope),
                Some(map) if map.is_empty() => format!("No inserts in {} config.", scope),
                Some(map) => {
                    let mut lines = vec![
                        format!("Available inserts ({}):", scope),
                        "  1. [Create new insert]".to_string(),
                    ];
                    for (i, (name, def)) in map.iter().enumerate() {
                        let text = def.get("text").and_then(|v| v.as_str()).unwrap_or("");
                        let mut preview: String = text
                            .chars()
                            .take(PREVIEW_LEN)
                            .map(|c| if c == '\n' { ' ' } else { c })
                            .collect();
                        if text.chars().count() > PREVIEW_LEN {
                            preview.push_str("...");
                        }
                        let conditions = def
                            .get("conditions")
                            .and_then(|v| v.as_array())
                            .cloned()
                            .unwrap_or_default();
                        let cond_line = if conditions.is_empty() {
                            "\n     (no conditions)".to_string()
                        } else {
                            format!("\n     conditions: {}", format_conditions(&conditions))
                        };
                        lines.push(format!("  {}. {} -- \"{}\"{}", i + 2, name, preview, cond_line));
                    }
                    lines.join("\n")
                }
            }
        }
    };
    for warning in &warnings {
        out.push('\n');
        out.push_str(warning);
    }
    Ok((out, 0))
}
