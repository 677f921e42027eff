//! Per-user session state: comparison curves are only reachable once a
//! portfolio selection exists.

use crate::domain::error::CarteiraError;
use crate::domain::ranking::PortfolioSelection;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Session {
    #[default]
    NoSelection,
    SelectionReady(PortfolioSelection),
}

impl Session {
    pub fn new() -> Self {
        Session::NoSelection
    }

    /// The only transition. Resubmitting replaces the previous selection.
    pub fn generate_selection(&mut self, selection: PortfolioSelection) {
        tracing::debug!(holdings = selection.len(), "session selection updated");
        *self = Session::SelectionReady(selection);
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Session::SelectionReady(_))
    }

    pub fn selection(&self) -> Result<&PortfolioSelection, CarteiraError> {
        match self {
            Session::SelectionReady(selection) => Ok(selection),
            Session::NoSelection => Err(CarteiraError::NoSelection),
        }
    }
}
