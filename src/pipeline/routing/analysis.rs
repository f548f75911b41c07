//! Two-pass document analysis: a regex field pass, then the routed answer.

use super::patterns::extract_fields;
use super::{ModelRouter, RouteError};

pub const STRUCTURED_SECTION_HEADER: &str = "═══ STRUCTURED DATA EXTRACTION ═══\n\n";
pub const QUERY_SECTION_HEADER: &str = "═══ SPECIFIC QUERY RESPONSE ═══\n\n";

pub struct DocumentAnalyzer {
    router: ModelRouter,
}

impl DocumentAnalyzer {
    pub fn new(router: ModelRouter) -> Self {
        Self { router }
    }

    /// Analyze `text` against a batch template.
    ///
    /// The backend is chosen from the raw template; the model receives the
    /// template wrapped in answering guidelines.
    pub fn analyze(
        &self,
        text: &str,
        template: &str,
        image_based: bool,
    ) -> Result<String, RouteError> {
        let fields = extract_fields(text);
        tracing::debug!(
            confidence = fields.overall_confidence(),
            missing = fields.missing_fields().len(),
            "Structured field pass complete"
        );

        let decision = self.router.decide(template, image_based);
        let result = self
            .router
            .execute(decision, text, &guided_prompt(template))?;

        let mut out = String::new();
        out.push_str(STRUCTURED_SECTION_HEADER);
        out.push_str(&fields.to_formatted_string());
        out.push_str("\n\n");
        out.push_str(QUERY_SECTION_HEADER);
        out.push_str(&result.response);
        Ok(out)
    }
}

fn guided_prompt(template: &str) -> String {
    format!(
        "Based on the document provided, answer this question:\n\
         \n\
         {template}\n\
         \n\
         Guidelines:\n\
         1. Search ALL pages including tables and forms\n\
         2. If information is in a table, describe the table structure\n\
         3. If field is blank ([___]), explicitly state it's blank\n\
         4. Provide page numbers when referencing information\n\
         5. If answer involves numbers/amounts, quote exactly as written\n\
         6. If question asks for something not in document, say so clearly\n\
         \n\
         Be specific and cite sources."
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::routing::{BackendKind, BackendSet, MockInferenceClient};

    fn analyzer(mock: Arc<MockInferenceClient>) -> DocumentAnalyzer {
        DocumentAnalyzer::new(ModelRouter::new(Box::new(mock), BackendSet::default()))
    }

    #[test]
    fn output_has_both_sections() {
        let mock = Arc::new(MockInferenceClient::new("The PAN is ABCDE1234F (page 1)."));
        let out = analyzer(mock)
            .analyze("Name: Priya Raman\nPAN: ABCDE1234F", "What is the PAN number?", false)
            .unwrap();

        assert!(out.starts_with(STRUCTURED_SECTION_HEADER));
        assert!(out.contains("PAN: ABCDE1234F"));
        assert!(out.contains("Contributor: Priya Raman"));
        let query_at = out.find(QUERY_SECTION_HEADER).unwrap();
        assert!(out[query_at..].ends_with("The PAN is ABCDE1234F (page 1)."));
    }

    #[test]
    fn backend_chosen_from_raw_template() {
        let mock = Arc::new(MockInferenceClient::new("ok"));
        analyzer(mock.clone())
            .analyze("body", "What is the PAN number?", false)
            .unwrap();

        let recorded = mock.recorded();
        assert_eq!(recorded[0].0, BackendKind::Fast);
        assert!(recorded[0].1.prompt.contains("Guidelines:\n1. Search ALL pages"));
    }

    #[test]
    fn routing_failure_propagates() {
        let mock = Arc::new(MockInferenceClient::new("").timing_out());
        let err = analyzer(mock)
            .analyze("body", "Summarize the fees and the lock-in terms", false)
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
