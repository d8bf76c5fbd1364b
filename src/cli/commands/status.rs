//! status command - Show mount state and disk layout version

use crate::cli::MountFailure;
use crate::core::config::Config;
use crate::core::types::LayoutVersion;
use crate::engine::registry::MountSession;
use crate::engine::{Context, LayoutVerdict, MountController, StatusReport};
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct StatusJson {
    enlistment: PathBuf,
    mounted: bool,
    session: Option<MountSession>,
    disk_layout_version: Option<LayoutVersion>,
    layout: String,
    layout_error: Option<String>,
}

/// Print the mount status of the enlistment containing the working
/// directory.
pub fn status(ctx: &Context, json: bool) -> Result<()> {
    let cwd = ctx
        .working_dir()
        .context("Failed to determine working directory")?;
    let config = Config::load(None).context("Failed to load configuration")?;
    let legacy = config.legacy_exit_codes();

    let controller = MountController::builder()
        .build()
        .context("Failed to start maintenance worker")?;
    let report = controller
        .status(&cwd)
        .map_err(|e| MountFailure::new(e, legacy))?;

    if json {
        let out = StatusJson {
            enlistment: report.enlistment.root().to_path_buf(),
            mounted: report.mounted,
            session: report.session.clone(),
            disk_layout_version: report.layout_version,
            layout: describe_layout(&report),
            layout_error: report.layout_error.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let mut fields = vec![
        ("enlistment", report.enlistment.root().display().to_string()),
        (
            "state",
            if report.mounted { "mounted" } else { "unmounted" }.to_string(),
        ),
    ];
    if let Some(session) = &report.session {
        fields.push(("session", session.id.to_string()));
        fields.push(("pid", session.pid.to_string()));
        fields.push(("since", session.started_at.to_rfc3339()));
    }
    fields.push((
        "layout version",
        report
            .layout_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    ));
    fields.push(("layout", describe_layout(&report)));
    output::print(output::format_fields(&fields), verbosity);
    Ok(())
}

fn describe_layout(report: &StatusReport) -> String {
    match (&report.verdict, &report.layout_error) {
        (Some(LayoutVerdict::Current), _) => "current".to_string(),
        (Some(LayoutVerdict::NeedsUpgrade { to, .. }), _) => {
            format!("upgrade to {} on next mount", to)
        }
        (Some(LayoutVerdict::DowngradeRejected { current, .. }), _) => {
            format!("written by a newer build (this build supports up to {})", current)
        }
        (Some(LayoutVerdict::TooOldRejected { min_supported, .. }), _) => {
            format!("too old (minimum supported {})", min_supported)
        }
        (None, Some(e)) => format!("unreadable: {}", e),
        (None, None) => "unknown".to_string(),
    }
}
