//! `toolloop config`: configuration management commands.

use toolloop_config::EngineConfig;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match EngineConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");
            println!();
            println!("   Model:          {}", config.model);
            println!("   Max iterations: {}", config.max_iterations);
            println!("   Invocation:     {:?}", config.invocation_mode);
            println!("   Responses:      {:?}", config.response_mode);
            match config.tool_timeout_ms {
                Some(ms) => println!("   Tool timeout:   {ms}ms"),
                None => println!("   Tool timeout:   none"),
            }
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = EngineConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
