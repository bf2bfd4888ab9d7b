// 🧭 Import Wizard - LIST ⇄ IMPORT
//
//   List ──on_upload──▶ Import { results, mapping }
//   Import ──on_cancel / reset──▶ List (placeholder results)
//
// A failed or aborted submission leaves the wizard in Import untouched.

use crate::import::{ColumnMapping, ImportError, ImportResults, ImportRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardView {
    List,
    Import,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WizardState {
    #[default]
    List,
    Import {
        results: ImportResults,
        mapping: ColumnMapping,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ImportWizard {
    state: WizardState,
}

impl ImportWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> WizardView {
        match self.state {
            WizardState::List => WizardView::List,
            WizardState::Import { .. } => WizardView::Import,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Enter IMPORT with freshly parsed results. The mapping starts from
    /// header detection. Results without headers are rejected.
    pub fn on_upload(&mut self, results: ImportResults) -> Result<(), ImportError> {
        if results.headers.is_empty() {
            return Err(ImportError::MissingHeaders);
        }
        let mapping = ColumnMapping::detect(&results.headers);
        tracing::info!(
            source = %results.meta.source,
            rows = results.rows.len(),
            mapped = mapping.progress().0,
            "import started"
        );
        self.state = WizardState::Import { results, mapping };
        Ok(())
    }

    /// Back to LIST, dropping the uploaded rows
    pub fn on_cancel(&mut self) {
        if self.view() == WizardView::Import {
            tracing::debug!("import closed");
        }
        self.state = WizardState::List;
    }

    /// Uploaded results; the placeholder while in LIST
    pub fn results(&self) -> ImportResults {
        match &self.state {
            WizardState::List => ImportResults::placeholder(),
            WizardState::Import { results, .. } => results.clone(),
        }
    }

    pub fn mapping(&self) -> Option<&ColumnMapping> {
        match &self.state {
            WizardState::List => None,
            WizardState::Import { mapping, .. } => Some(mapping),
        }
    }

    pub fn mapping_mut(&mut self) -> Option<&mut ColumnMapping> {
        match &mut self.state {
            WizardState::List => None,
            WizardState::Import { mapping, .. } => Some(mapping),
        }
    }

    /// Convert the uploaded rows with the current mapping. `None` in LIST.
    pub fn prepare_rows(&self, date_format: &str) -> Option<Result<Vec<ImportRow>, ImportError>> {
        match &self.state {
            WizardState::List => None,
            WizardState::Import { results, mapping } => Some(mapping.build_rows(results, date_format)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportField;

    fn uploaded() -> ImportResults {
        ImportResults {
            headers: vec!["Date".into(), "Payee".into(), "Amount".into()],
            rows: vec![vec!["2024-01-01".into(), "Grocer".into(), "-3.00".into()]],
            ..Default::default()
        }
    }

    #[test]
    fn test_upload_enters_import_with_detected_mapping() {
        let mut wizard = ImportWizard::new();
        assert_eq!(wizard.view(), WizardView::List);

        wizard.on_upload(uploaded()).unwrap();
        assert_eq!(wizard.view(), WizardView::Import);
        assert!(wizard.mapping().unwrap().is_complete());
        assert_eq!(wizard.results().rows.len(), 1);
    }

    #[test]
    fn test_upload_without_headers_stays_in_list() {
        let mut wizard = ImportWizard::new();
        assert!(wizard.on_upload(ImportResults::placeholder()).is_err());
        assert_eq!(wizard.view(), WizardView::List);
    }

    #[test]
    fn test_cancel_reopen_sequences_end_in_list() {
        let mut wizard = ImportWizard::new();
        for reopen in 0..4 {
            for _ in 0..reopen {
                wizard.on_upload(uploaded()).unwrap();
            }
            wizard.on_cancel();
            wizard.on_cancel();

            assert_eq!(wizard.view(), WizardView::List);
            assert!(wizard.results().is_placeholder());
            assert!(wizard.prepare_rows("%Y-%m-%d").is_none());
        }
    }

    #[test]
    fn test_mapping_edits_persist_in_import() {
        let mut wizard = ImportWizard::new();
        wizard.on_upload(uploaded()).unwrap();

        wizard.mapping_mut().unwrap().assign(2, None);
        let err = wizard.prepare_rows("%Y-%m-%d").unwrap().unwrap_err();

        assert!(matches!(err, ImportError::IncompleteMapping(ref missing) if missing == &[ImportField::Amount]));
        assert_eq!(wizard.view(), WizardView::Import);
    }
}
