//! Report export: JSON for round trips, CSV for spreadsheets.
//!
//! Persisted reports carry a `schema_version`; newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::result::{ScreeningReport, SCHEMA_VERSION};

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &ScreeningReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ScreeningReport to JSON")
}

/// Deserialize a report, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ScreeningReport> {
    let report: ScreeningReport =
        serde_json::from_str(json).context("failed to deserialize ScreeningReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV ────────────────────────────────────────────────────────────

/// One row per candidate, in rank order.
///
/// Columns: rank, instrument, name, industry, score, close, change_pct,
/// cohort, cohort_rank, then one column per scoring dimension.
pub fn export_candidates_csv(report: &ScreeningReport) -> Result<String> {
    let dimensions: Vec<&str> = report
        .candidates
        .first()
        .map(|c| c.parts.iter().map(|p| p.name.as_str()).collect())
        .unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec![
        "rank",
        "instrument",
        "name",
        "industry",
        "score",
        "close",
        "change_pct",
        "cohort",
        "cohort_rank",
    ];
    header.extend(dimensions.iter().copied());
    wtr.write_record(&header)?;

    for (i, c) in report.candidates.iter().enumerate() {
        let mut row = vec![
            (i + 1).to_string(),
            c.instrument.clone(),
            c.name.clone().unwrap_or_default(),
            c.industry.clone().unwrap_or_default(),
            format!("{:.2}", c.score),
            format!("{:.3}", c.close()),
            c.change_pct().map(|v| format!("{v:.2}")).unwrap_or_default(),
            c.cohort
                .as_ref()
                .map(|m| m.group.to_string())
                .unwrap_or_default(),
            c.cohort
                .as_ref()
                .map(|m| m.rank.to_string())
                .unwrap_or_default(),
        ];
        row.extend(c.parts.iter().map(|p| format!("{:.2}", p.points)));
        wtr.write_record(&row)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Per-gate rejection counts in pipeline order.
pub fn export_rejections_csv(report: &ScreeningReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["gate", "rejected", "undefined_input", "insufficient_history"])?;
    for t in &report.diagnostics.rejections {
        wtr.write_record([
            t.gate.as_str(),
            &t.rejected.to_string(),
            &t.undefined_input.to_string(),
            &t.insufficient_history.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Report bundle ──────────────────────────────────────────────────

/// Write `{strategy}_{as_of}/` under `output_dir` with `report.json`,
/// `candidates.csv` and `rejections.csv`. Returns the created directory.
pub fn save_report(report: &ScreeningReport, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!("{}_{}", report.strategy, report.as_of.format("%Y%m%d"));
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create report dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("candidates.csv"), export_candidates_csv(report)?)?;
    std::fs::write(run_dir.join("rejections.csv"), export_rejections_csv(report)?)?;

    Ok(run_dir)
}

pub fn load_report(dir: &Path) -> Result<ScreeningReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
