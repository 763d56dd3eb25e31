//! `devpi-api release check`: pre-publish consistency checks.
//!
//! Verifies that the workspace version parses as semver, that the internal
//! crate dependency pins the same version, that the tag (if any) names it,
//! and that CHANGELOG.md has a section for it.

use std::path::Path;

use anyhow::{bail, Context, Result};
use semver::Version;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckItem {
    pub name: String,
    /// "ok", "failed" or "skipped".
    pub status: String,
    pub detail: String,
}

impl CheckItem {
    fn new(name: &str, status: &str, detail: impl Into<String>) -> Self {
        CheckItem {
            name: name.to_string(),
            status: status.to_string(),
            detail: detail.into(),
        }
    }

    fn passed(&self) -> bool {
        self.status != "failed"
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleaseCheckReport {
    /// "ok" or "needs_attention".
    pub overall: String,
    pub version: Option<String>,
    pub tag: Option<String>,
    pub checks: Vec<CheckItem>,
    pub recommendations: Vec<String>,
}

/// `[workspace.package].version`, or `[package].version` for a single crate.
pub fn manifest_version(manifest: &str) -> Result<Version> {
    let doc: toml::Value = toml::from_str(manifest).context("parsing Cargo.toml")?;
    let raw = doc
        .get("workspace")
        .and_then(|w| w.get("package"))
        .or_else(|| doc.get("package"))
        .and_then(|p| p.get("version"))
        .and_then(|v| v.as_str());
    let Some(raw) = raw else {
        bail!("Cargo.toml has no [workspace.package] or [package] version");
    };
    Version::parse(raw).with_context(|| format!("version '{raw}' is not valid semver"))
}

/// Versions pinned on path dependencies in `[workspace.dependencies]`.
fn internal_pins(manifest: &str) -> Vec<(String, Option<String>)> {
    let Ok(doc) = toml::from_str::<toml::Value>(manifest) else {
        return Vec::new();
    };
    let Some(deps) = doc
        .get("workspace")
        .and_then(|w| w.get("dependencies"))
        .and_then(|d| d.as_table())
    else {
        return Vec::new();
    };
    deps.iter()
        .filter(|(_, spec)| spec.get("path").is_some())
        .map(|(name, spec)| {
            let version = spec.get("version").and_then(|v| v.as_str()).map(str::to_string);
            (name.clone(), version)
        })
        .collect()
}

/// Parse a release tag; a leading `v` is allowed.
pub fn tag_version(tag: &str) -> Result<Version> {
    let raw = tag.trim();
    let raw = raw.strip_prefix('v').unwrap_or(raw);
    Version::parse(raw).with_context(|| format!("tag '{tag}' is not a semver version"))
}

/// Whether some heading reads `## [X.Y.Z]` or `## X.Y.Z`, optionally followed
/// by a date.
pub fn changelog_has_section(changelog: &str, version: &Version) -> bool {
    let wanted = version.to_string();
    changelog.lines().any(|line| {
        let Some(rest) = line.strip_prefix("## ") else {
            return false;
        };
        let rest = rest.trim();
        let rest = rest.strip_prefix('[').unwrap_or(rest);
        let head: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != ']')
            .collect();
        let head = head.strip_prefix('v').unwrap_or(&head);
        head == wanted
    })
}

pub fn build_report(tag: Option<&str>, manifest: &str, changelog: Option<&str>) -> ReleaseCheckReport {
    let mut checks = Vec::new();
    let mut recommendations = Vec::new();

    let version = match manifest_version(manifest) {
        Ok(v) => {
            checks.push(CheckItem::new("workspace_version", "ok", v.to_string()));
            Some(v)
        }
        Err(e) => {
            checks.push(CheckItem::new("workspace_version", "failed", format!("{e:#}")));
            recommendations
                .push("Set a semver `version` under [workspace.package] in Cargo.toml.".to_string());
            None
        }
    };

    if let Some(version) = &version {
        let wanted = version.to_string();
        let stale: Vec<String> = internal_pins(manifest)
            .into_iter()
            .filter(|(_, pin)| pin.as_deref() != Some(wanted.as_str()))
            .map(|(name, pin)| format!("{name} = {}", pin.unwrap_or_else(|| "unpinned".into())))
            .collect();
        if stale.is_empty() {
            checks.push(CheckItem::new("internal_pins", "ok", format!("path dependencies pin {wanted}")));
        } else {
            checks.push(CheckItem::new("internal_pins", "failed", stale.join(", ")));
            recommendations.push(format!(
                "Pin every path dependency in [workspace.dependencies] to version \"{wanted}\"."
            ));
        }
    }

    match (tag, &version) {
        (None, _) => checks.push(CheckItem::new("tag", "skipped", "no --tag given")),
        (Some(tag), version) => match tag_version(tag) {
            Ok(tagged) if Some(&tagged) == version.as_ref() => {
                checks.push(CheckItem::new("tag", "ok", format!("{tag} matches")));
            }
            Ok(tagged) => {
                let have = version
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "unknown".into());
                checks.push(CheckItem::new(
                    "tag",
                    "failed",
                    format!("{tag} names {tagged} but the workspace is at {have}"),
                ));
                recommendations.push(format!(
                    "Bump [workspace.package] version to {tagged} or re-tag as v{have}."
                ));
            }
            Err(e) => {
                checks.push(CheckItem::new("tag", "failed", format!("{e:#}")));
                recommendations.push("Tag releases as vMAJOR.MINOR.PATCH.".to_string());
            }
        },
    }

    match (changelog, &version) {
        (None, _) => {
            checks.push(CheckItem::new("changelog", "failed", "CHANGELOG.md not found"));
            recommendations.push("Add a CHANGELOG.md with a section per release.".to_string());
        }
        (Some(_), None) => checks.push(CheckItem::new("changelog", "skipped", "version unknown")),
        (Some(text), Some(version)) => {
            if changelog_has_section(text, version) {
                checks.push(CheckItem::new("changelog", "ok", format!("section for {version} found")));
            } else {
                checks.push(CheckItem::new(
                    "changelog",
                    "failed",
                    format!("no `## [{version}]` section"),
                ));
                recommendations.push(format!(
                    "Move the Unreleased notes in CHANGELOG.md under `## [{version}]`."
                ));
            }
        }
    }

    let overall = if checks.iter().all(CheckItem::passed) {
        "ok"
    } else {
        "needs_attention"
    }
    .to_string();

    ReleaseCheckReport {
        overall,
        version: version.map(|v| v.to_string()),
        tag: tag.map(str::to_string),
        checks,
        recommendations,
    }
}

pub fn check(tag: Option<&str>, manifest_path: &Path, changelog_path: &Path, json: bool) -> Result<()> {
    let manifest = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("reading {}", manifest_path.display()))?;
    let changelog = std::fs::read_to_string(changelog_path).ok();
    let report = build_report(tag, &manifest, changelog.as_deref());

    if json {
        super::print_json(&report)?;
    } else {
        println!("=== Release check ===");
        println!();
        for item in &report.checks {
            println!("  {:<18} {:<8} {}", item.name, item.status, item.detail);
        }
        if !report.recommendations.is_empty() {
            println!();
            println!("--- Recommendations ---");
            for rec in &report.recommendations {
                println!("  - {rec}");
            }
        }
        println!();
        println!("Overall: {}", report.overall);
    }

    if report.overall != "ok" {
        bail!("release is not ready");
    }
    Ok(())
}
