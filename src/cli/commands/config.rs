use crate::cli::args::{ConfigArgs, ConfigCommand};
use crate::config::{Config, KEYS};
use crate::error::Result;

/// Execute config command
pub async fn execute(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            println!("✅ Configuration updated: {} = {}", key, display_value(&key, &value));
            Ok(())
        }
        ConfigCommand::Get { key } => {
            let config = Config::load()?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}: {}", key, display_value(&key, &value));
                }
                None => {
                    println!("Configuration key '{}' not found", key);
                }
            }
            Ok(())
        }
        ConfigCommand::List => {
            let config = Config::load()?;
            for key in KEYS {
                let value = config.get(key).unwrap_or_default();
                println!("{} = {}", key, display_value(key, &value));
            }
            Ok(())
        }
        ConfigCommand::Path => {
            let path = Config::config_file_path()?;
            println!("Configuration file: {}", path.display());
            Ok(())
        }
        ConfigCommand::Init => {
            Config::initialize()?;
            println!("✅ Configuration initialized");
            println!();
            println!("To summarize bills, set your Gemini API key:");
            println!("  vozcivica config set summary.key YOUR_API_KEY");
            println!();
            println!("Get a key from: https://aistudio.google.com");
            Ok(())
        }
    }
}

fn display_value(key: &str, value: &str) -> String {
    if key.ends_with(".key") {
        mask_value(value)
    } else {
        value.to_string()
    }
}

/// Mask sensitive values for display
fn mask_value(value: &str) -> String {
    let count = value.chars().count();
    if count > 10 {
        let head: String = value.chars().take(10).collect();
        format!("{}...({} characters)", head, count)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_value() {
        assert_eq!(mask_value("short"), "short");
        assert_eq!(mask_value("AIzaSyA-0123456789"), "AIzaSyA-01...(18 characters)");
        // multibyte characters never split
        assert_eq!(mask_value("ççççççççççç"), "çççççççççç...(11 characters)");
    }

    #[test]
    fn test_only_keys_are_masked() {
        assert_eq!(display_value("http.user_agent", "Mozilla/5.0 (X11)"), "Mozilla/5.0 (X11)");
        assert_eq!(display_value("summary.key", "AIzaSyA-0123456789"), "AIzaSyA-01...(18 characters)");
    }
}
