//! Rendering of assessments for the terminal.

use anyhow::Result;
use std::fmt::Write as _;
use vigil_scanner::Assessment;

pub fn print_assessment(assessment: &Assessment, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(assessment)?);
    } else {
        print!("{}", render_assessment(assessment));
    }
    Ok(())
}

pub fn print_failure(url: &str, error: &anyhow::Error, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({ "url": url, "error": format!("{error:#}") })
        );
    } else {
        println!("{url}\n  failed: {error:#}\n");
    }
}

/// Human-readable report of one assessment.
pub fn render_assessment(assessment: &Assessment) -> String {
    let result = &assessment.result;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{}  score {}/100  ({} ms)",
        result.url, assessment.score, result.scan_time_ms
    );
    if let Some(persona) = &result.persona_id {
        let _ = writeln!(out, "  persona:        {persona}");
    }
    let banner = if result.cookie_banner_detected {
        format!("yes ({})", result.cookie_banner_selectors.join(", "))
    } else {
        "no".to_string()
    };
    let _ = writeln!(out, "  cookie banner:  {banner}");
    let _ = writeln!(out, "  cookies:        {}", result.cookies.len());
    let third_parties: Vec<&str> = result.third_party_domains.iter().map(String::as_str).collect();
    let _ = writeln!(
        out,
        "  third parties:  {}",
        if third_parties.is_empty() {
            "none".to_string()
        } else {
            third_parties.join(", ")
        }
    );
    let _ = writeln!(out, "  scripts:        {}", result.scripts.len());
    if let Some(robots) = &result.robots_meta {
        let _ = writeln!(out, "  robots:         {robots}");
    }
    if let Some(path) = &result.capture_path {
        let _ = writeln!(out, "  capture:        {}", path.display());
    }

    if result.violations.is_empty() {
        let _ = writeln!(out, "  no violations");
    } else {
        let _ = writeln!(out, "  violations:");
        for violation in &result.violations {
            let _ = writeln!(
                out,
                "    [{}] {}: {}",
                violation.severity.as_str().to_uppercase(),
                violation.id,
                violation.description
            );
        }
    }
    out.push('\n');
    out
}
