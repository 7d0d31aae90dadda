//! `taskloop tools`: List the tools offered to the model.

use std::path::Path;
use std::time::Duration;

use taskloop_config::AppConfig;
use taskloop_tools::{ToolTimeouts, default_registry};

pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = default_registry(ToolTimeouts {
        bash: Duration::from_secs(config.tools.bash_timeout_secs),
        grep: Duration::from_secs(config.tools.grep_timeout_secs),
    })?;

    println!("Tools ({}):", registry.len());
    for def in registry.definitions() {
        let required: Vec<&str> = def.input_schema["required"]
            .as_array()
            .map(|fields| fields.iter().filter_map(|f| f.as_str()).collect())
            .unwrap_or_default();
        let params: Vec<String> = def.input_schema["properties"]
            .as_object()
            .map(|props| {
                props
                    .keys()
                    .map(|k| {
                        if required.contains(&k.as_str()) {
                            k.clone()
                        } else {
                            format!("{k}?")
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        println!("  {}({})", def.name, params.join(", "));
        println!("      {}", def.description);
    }

    Ok(())
}
