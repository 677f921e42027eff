//! Report generation port trait.

use std::path::Path;

use crate::domain::comparison::Comparison;
use crate::domain::error::CarteiraError;
use crate::domain::ranking::PortfolioSelection;

/// Port for writing selection and comparison outputs.
pub trait ReportPort {
    fn write_selection(
        &self,
        selection: &PortfolioSelection,
        output_path: &Path,
    ) -> Result<(), CarteiraError>;

    fn write_comparison(
        &self,
        comparison: &Comparison,
        output_path: &Path,
    ) -> Result<(), CarteiraError>;
}
