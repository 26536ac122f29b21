//! `vigil rules`.

use anyhow::{Context, Result};
use std::path::Path;
use vigil_core::AppConfig;
use vigil_rules::{RuleLoader, RulePackInstaller};

pub fn list(config: &AppConfig, json: bool) -> Result<()> {
    let loader = RuleLoader::new(&config.storage.rule_packs_dir)?;
    let packs = loader.list_packs()?;

    if json {
        let listing: Vec<_> = packs
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "description": p.description,
                    "rules": p.rule_count,
                    "path": p.path,
                })
            })
            .collect();
        println!("{}", serde_json::to_string(&listing)?);
        return Ok(());
    }

    if packs.is_empty() {
        println!("no rule packs in {}", loader.rules_dir().display());
        return Ok(());
    }
    for pack in &packs {
        println!(
            "{:<24} {:>3} rules  {}",
            pack.name, pack.rule_count, pack.description
        );
    }
    Ok(())
}

pub fn validate(path: &Path) -> Result<()> {
    let pack = RulePackInstaller::check(path)
        .with_context(|| format!("{} is not a valid rule pack", path.display()))?;
    println!("{}: {} rules OK", path.display(), pack.rules.len());
    Ok(())
}

pub fn add(config: &AppConfig, path: &Path) -> Result<()> {
    let rules_dir = &config.storage.rule_packs_dir;
    std::fs::create_dir_all(rules_dir)
        .with_context(|| format!("failed to create {}", rules_dir.display()))?;

    let installed = RulePackInstaller::new(rules_dir)?.add(path)?;
    println!("installed {}", installed.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACK: &str = r#"{"description": "Basics", "rules": [
        {"id": "missing_cookie_banner", "severity": "high",
         "test": "cookie_banner_detected == `false`"}
    ]}"#;

    #[test]
    fn test_add_then_list() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = dir.path().join("basics.json");
        std::fs::write(&source, PACK).expect("write pack");

        let mut config = AppConfig::default();
        config.storage.rule_packs_dir = dir.path().join("rule-packs");

        add(&config, &source).expect("install pack");
        assert!(config
            .storage
            .rule_packs_dir
            .join("community")
            .join("basics.json")
            .is_file());
        list(&config, true).expect("list packs");
    }

    #[test]
    fn test_validate_rejects_broken_pack() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = dir.path().join("broken.json");
        std::fs::write(&source, r#"{"rules": [{"id": "x", "test": "(("}]}"#)
            .expect("write pack");

        assert!(validate(&source).is_err());
    }
}
