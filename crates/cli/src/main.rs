mod files;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use stockaudit_allocation::{AllocationEngine, TemplateConfig, template_rows, template_table};
use stockaudit_core::{DocumentExporter, TabularSource};
use stockaudit_ledger::{RackedBatch, aggregate_physical, aggregate_sources};
use stockaudit_observability::LogFormat;
use stockaudit_reconciliation::ReconciliationSession;

use crate::files::{JsonExporter, JsonRowFile};

#[derive(Parser)]
#[command(name = "stockaudit")]
#[command(about = "Reconcile DMS stock against a physical count", long_about = None)]
struct Cli {
    /// Human-readable logs instead of JSON
    #[arg(long, global = true, default_value_t = false)]
    text_logs: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the shortage/excess report, optionally after Before/After batches
    Report {
        #[arg(long)]
        dms: PathBuf,

        #[arg(long)]
        physical: PathBuf,

        /// Before batch (reduces DMS stock only)
        #[arg(long)]
        before: Option<PathBuf>,

        /// After batch (reduces DMS and physical stock)
        #[arg(long)]
        after: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Distribute an allocation batch over racks and write template rows
    Template {
        #[arg(long)]
        physical: PathBuf,

        /// Rows with part number, optional rack, quantity
        #[arg(long)]
        batch: PathBuf,

        /// Re-apply unresolved leftovers on the highest-stock racks and regenerate
        #[arg(long, default_value_t = false)]
        apply_unresolved: bool,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Diagnostics file (stderr when omitted)
        #[arg(long)]
        diagnostics: Option<PathBuf>,

        #[command(flatten)]
        identity: TemplateIdentity,
    },
}

/// Template identity columns; flags win over environment variables.
#[derive(clap::Args)]
struct TemplateIdentity {
    #[arg(long, env = "STOCKAUDIT_DEALER_ID", default_value = "")]
    dealer_id: String,

    #[arg(long, env = "STOCKAUDIT_BRANCH_ID", default_value = "")]
    branch_id: String,

    #[arg(long, env = "STOCKAUDIT_MANUFACTURER_ID", default_value = "")]
    manufacturer_id: String,

    #[arg(long, env = "STOCKAUDIT_TAXABLE", default_value = "Y")]
    taxable: String,
}

impl From<TemplateIdentity> for TemplateConfig {
    fn from(id: TemplateIdentity) -> Self {
        if id.dealer_id.is_empty() || id.branch_id.is_empty() {
            tracing::warn!("dealer/branch id not set; template rows will leave them blank");
        }
        TemplateConfig {
            dealer_id: id.dealer_id,
            branch_id: id.branch_id,
            manufacturer_id: id.manufacturer_id,
            taxable: id.taxable,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    stockaudit_observability::init(if cli.text_logs {
        LogFormat::Text
    } else {
        LogFormat::Json
    });

    match cli.cmd {
        Commands::Report {
            dms,
            physical,
            before,
            after,
            out,
        } => run_report(dms, physical, before, after, out),
        Commands::Template {
            physical,
            batch,
            apply_unresolved,
            out,
            diagnostics,
            identity,
        } => run_template(
            physical,
            batch,
            apply_unresolved,
            out,
            diagnostics,
            identity.into(),
        ),
    }
}

fn run_report(
    dms: PathBuf,
    physical: PathBuf,
    before: Option<PathBuf>,
    after: Option<PathBuf>,
    out: Option<PathBuf>,
) -> Result<()> {
    let aggregate = aggregate_sources(&JsonRowFile::new(dms), &JsonRowFile::new(physical))
        .context("aggregate DMS and physical stock")?;
    let mut session = ReconciliationSession::new(&aggregate);

    if let Some(path) = before {
        let source = JsonRowFile::new(path);
        session = session
            .apply_before_rows(source.name(), &source.read_rows()?)
            .with_context(|| format!("apply Before batch {}", source.name()))?;
    }
    if let Some(path) = after {
        let source = JsonRowFile::new(path);
        session = session
            .apply_after_rows(source.name(), &source.read_rows()?)
            .with_context(|| format!("apply After batch {}", source.name()))?;
        for row in session.unmatched_after_rows() {
            tracing::warn!(part = %row.part, quantity = %row.quantity, "after row has no physical stock");
        }
    }

    let mut exporter = JsonExporter::new(out.as_deref());
    exporter
        .export("reconciliation report", &session.report().to_table())
        .context("write report")?;
    Ok(())
}

fn run_template(
    physical: PathBuf,
    batch: PathBuf,
    apply_unresolved: bool,
    out: Option<PathBuf>,
    diagnostics: Option<PathBuf>,
    config: TemplateConfig,
) -> Result<()> {
    let physical_rows = JsonRowFile::new(physical).read_rows()?;
    let ledger = aggregate_physical(&physical_rows).context("aggregate physical stock")?;

    let batch_source = JsonRowFile::new(batch);
    let batch = RackedBatch::from_rows(batch_source.name(), &batch_source.read_rows()?)
        .with_context(|| format!("parse allocation batch {}", batch_source.name()))?;

    let mut engine = AllocationEngine::new(ledger);
    let mut run = engine.generate(&batch);
    let mut reapplied = Vec::new();
    if apply_unresolved && !run.unresolved.is_empty() {
        reapplied = engine.apply_unmatched(&run.unresolved);
        run = engine.generate(&batch);
    }

    let rows = template_rows(&config, &run.final_stock);
    let mut exporter = JsonExporter::new(out.as_deref());
    exporter
        .export("upload template", &template_table(&rows))
        .context("write template")?;

    let report = json!({
        "run_id": run.run_id,
        "diagnostics": run.diagnostics,
        "unresolved": run.unresolved,
        "reapplied": reapplied,
    });
    let rendered = serde_json::to_string_pretty(&report).context("render diagnostics")?;
    match diagnostics {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("write diagnostics {}", path.display()))?,
        None => eprintln!("{rendered}"),
    }
    Ok(())
}
