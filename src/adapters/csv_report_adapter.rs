//! CSV report adapter implementing ReportPort.
//!
//! Missing values are written as empty cells.

use std::path::Path;

use crate::domain::comparison::Comparison;
use crate::domain::error::CarteiraError;
use crate::domain::instrument::Fundamental;
use crate::domain::ranking::PortfolioSelection;
use crate::ports::report_port::ReportPort;

pub struct CsvReportAdapter;

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn write_error(path: &Path, e: csv::Error) -> CarteiraError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => CarteiraError::Io(io),
        other => CarteiraError::Data {
            reason: format!("{}: {:?}", path.display(), other),
        },
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_selection(
        &self,
        selection: &PortfolioSelection,
        output_path: &Path,
    ) -> Result<(), CarteiraError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| write_error(output_path, e))?;

        let mut header = vec![
            "position".to_string(),
            "ticker".to_string(),
            "sector".to_string(),
            "snapshot_date".to_string(),
        ];
        header.extend(Fundamental::COLUMNS.iter().map(|f| f.key().to_string()));
        header.extend([
            format!("rank_{}", selection.profitability.key()),
            format!("rank_{}", selection.discount.key()),
            "combined_score".to_string(),
        ]);
        wtr.write_record(&header)
            .map_err(|e| write_error(output_path, e))?;

        for holding in &selection.holdings {
            let inst = &holding.instrument;
            let mut row = vec![
                holding.position.to_string(),
                inst.ticker.clone(),
                inst.sector.clone(),
                inst.snapshot_date.format("%Y-%m-%d").to_string(),
            ];
            row.extend(Fundamental::COLUMNS.iter().map(|f| cell(inst.fundamentals.get(*f))));
            row.extend([
                inst.rank_profitability.to_string(),
                inst.rank_discount.to_string(),
                inst.combined_score.to_string(),
            ]);
            wtr.write_record(&row)
                .map_err(|e| write_error(output_path, e))?;
        }

        wtr.flush()?;
        tracing::info!(path = %output_path.display(), rows = selection.len(), "selection written");
        Ok(())
    }

    fn write_comparison(
        &self,
        comparison: &Comparison,
        output_path: &Path,
    ) -> Result<(), CarteiraError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| write_error(output_path, e))?;

        wtr.write_record(["date", "portfolio", comparison.benchmark_symbol.as_str()])
            .map_err(|e| write_error(output_path, e))?;
        for row in &comparison.rows {
            wtr.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                cell(row.portfolio),
                cell(row.benchmark),
            ])
            .map_err(|e| write_error(output_path, e))?;
        }

        wtr.flush()?;
        tracing::info!(path = %output_path.display(), rows = comparison.rows.len(), "comparison written");
        Ok(())
    }
}
