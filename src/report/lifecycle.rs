//! Drives one generation run: pending rows in, one artifact out, statuses flipped.

use log::{error, info, warn};

use super::consolidate::Consolidator;
use super::filler::SheetFiller;
use super::workbook::{Workbook, XLSX_MIME};
use crate::api::models::{Row, RowId, RowStatus, StatusLabels};
use crate::api::store::{ObjectStore, RowStore};
use crate::config::ReportTargets;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows rendered into the uploaded artifact.
    pub processed: usize,
    /// Rows that were not pending.
    pub skipped: usize,
    /// Rendered rows whose status update failed; they stay pending and are
    /// rendered again by the next run.
    pub uncommitted: Vec<RowId>,
}

impl RunSummary {
    pub fn committed(&self) -> usize {
        self.processed - self.uncommitted.len()
    }
}

pub struct ReportRunner<'a> {
    rows: &'a dyn RowStore,
    objects: &'a dyn ObjectStore,
    filler: &'a SheetFiller,
    targets: ReportTargets,
    labels: StatusLabels,
    identifier_field: String,
}

impl<'a> ReportRunner<'a> {
    pub fn new(
        rows: &'a dyn RowStore,
        objects: &'a dyn ObjectStore,
        filler: &'a SheetFiller,
        targets: ReportTargets,
    ) -> Self {
        Self {
            rows,
            objects,
            filler,
            targets,
            labels: StatusLabels::default(),
            identifier_field: "pozo_numero".to_string(),
        }
    }

    pub fn with_labels(mut self, labels: StatusLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_identifier_field(mut self, field: impl Into<String>) -> Self {
        self.identifier_field = field.into();
        self
    }

    /// Render every pending row into one workbook and publish it.
    ///
    /// Sheets built from the template's first sheet are appended to the
    /// report already stored at the output location, so earlier runs are
    /// kept. An empty output object is started from the template instead.
    /// When the output is the template itself, the template acts as the
    /// master report and keeps its own sheets in front.
    ///
    /// Statuses are only touched after the artifact upload succeeded. Any
    /// error before that point aborts the run with the row store unchanged.
    /// A failed status update afterwards is logged and reported in
    /// [`RunSummary::uncommitted`]; that row is rendered again next run.
    pub async fn run(&self) -> Result<RunSummary> {
        let rows = self.rows.list_rows().await?;
        let total = rows.len();
        let pending: Vec<Row> = rows
            .into_iter()
            .filter(|row| self.labels.status_of(&row.record) == RowStatus::Pending)
            .collect();
        let skipped = total - pending.len();

        if pending.is_empty() {
            info!("No pending rows ({} rows total), nothing to generate", total);
            return Ok(RunSummary {
                processed: 0,
                skipped,
                uncommitted: Vec::new(),
            });
        }
        info!("{} pending rows of {}", pending.len(), total);

        let template_bytes = self.objects.download(&self.targets.template).await?;
        let template = Workbook::from_xlsx_bytes(&template_bytes)?;
        let layout = template
            .sheet(0)
            .cloned()
            .ok_or_else(|| Error::Workbook("template has no worksheets".to_string()))?;

        let records: Vec<_> = pending.iter().map(|row| row.record.clone()).collect();
        let consolidator = Consolidator::new(self.filler, self.identifier_field.clone());
        let consolidation = if self.targets.output == self.targets.template {
            info!("Appending to master report {}", self.targets.template);
            consolidator.append(template, &layout, &records)?
        } else {
            let existing = self.objects.download(&self.targets.output).await?;
            if existing.is_empty() {
                info!("Report {} is empty, starting from the template", self.targets.output);
                consolidator.consolidate(template, &records)?
            } else {
                let report = Workbook::from_xlsx_bytes(&existing)?;
                info!(
                    "Appending to report {} with {} sheets",
                    self.targets.output,
                    report.len()
                );
                consolidator.append(report, &layout, &records)?
            }
        };
        for (row, sheet) in pending.iter().zip(&consolidation.sheets) {
            if !sheet.report.is_clean() {
                warn!(
                    "Row {} ('{}') rendered with {} degraded steps",
                    row.id,
                    sheet.title,
                    sheet.report.failures.len()
                );
            }
        }

        let artifact = consolidation.workbook.to_xlsx_bytes()?;
        self.objects
            .replace(&self.targets.output, artifact, XLSX_MIME)
            .await?;
        info!("Published report {} with {} sheets", self.targets.output, records.len());

        let mut uncommitted = Vec::new();
        for row in &pending {
            let label = self.labels.label(&RowStatus::Generated);
            if let Err(e) = self.rows.update_cell(row.id, &self.labels.column, label).await {
                error!("Row {}: status not updated, it stays pending: {}", row.id, e);
                uncommitted.push(row.id);
            }
        }

        Ok(RunSummary {
            processed: pending.len(),
            skipped,
            uncommitted,
        })
    }
}
