//! Export of an assessment: plain text for copying and a one-page PDF.
//!
//! PDF generation via `printpdf` with the built-in Helvetica faces.

use std::io::BufWriter;

use chrono::NaiveDate;
use printpdf::*;
use thiserror::Error;

use crate::models::{AssessmentResult, RecommendationPriority};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),
}

const PRIORITY_ORDER: [RecommendationPriority; 4] = [
    RecommendationPriority::Urgent,
    RecommendationPriority::High,
    RecommendationPriority::Medium,
    RecommendationPriority::Low,
];

const WRAP_CHARS: usize = 90;
const PAGE_BOTTOM: f32 = 20.0;

/// `analysis_{case_id}_{YYYY-MM-DD}.pdf`
pub fn pdf_file_name(case_id: &str, date: NaiveDate) -> String {
    format!("analysis_{case_id}_{}.pdf", date.format("%Y-%m-%d"))
}

pub fn text_file_name(case_id: &str, date: NaiveDate) -> String {
    format!("analysis_{case_id}_{}.txt", date.format("%Y-%m-%d"))
}

fn priority_heading(priority: RecommendationPriority) -> &'static str {
    match priority {
        RecommendationPriority::Urgent => "URGENT",
        RecommendationPriority::High => "HIGH",
        RecommendationPriority::Medium => "MEDIUM",
        RecommendationPriority::Low => "LOW",
    }
}

/// Lines shared by the text and PDF renderings.
fn report_lines(case_id: &str, result: &AssessmentResult) -> Vec<ReportLine> {
    let mut lines = vec![
        ReportLine::Title(format!("AI Analysis Report - {case_id}")),
        ReportLine::Body(format!(
            "Risk: {} ({}/100)",
            result.risk_level.as_str().to_uppercase(),
            result.risk_score
        )),
    ];
    if !result.summary.is_empty() {
        lines.push(ReportLine::Body(result.summary.clone()));
    }
    if !result.model_name.is_empty() {
        lines.push(ReportLine::Body(format!(
            "Model: {} {} | Analyzed: {}",
            result.model_name, result.model_version, result.analyzed_at
        )));
    }

    if !result.key_factors.is_empty() {
        lines.push(ReportLine::Heading("KEY FACTORS".into()));
        for f in &result.key_factors {
            lines.push(ReportLine::Item(format!("{} ({}%)", f.title, f.confidence)));
            if !f.description.is_empty() {
                lines.push(ReportLine::Detail(f.description.clone()));
            }
        }
    }

    if !result.differential_diagnosis.is_empty() {
        lines.push(ReportLine::Heading("DIFFERENTIAL DIAGNOSIS".into()));
        for d in &result.differential_diagnosis {
            lines.push(ReportLine::Item(format!("{} - {}%", d.name, d.probability)));
        }
    }

    if !result.recommendations.is_empty() {
        lines.push(ReportLine::Heading("RECOMMENDATIONS".into()));
        for priority in PRIORITY_ORDER {
            for r in result.recommendations_at(priority) {
                lines.push(ReportLine::Item(format!("[{}] {}", priority_heading(priority), r.text)));
            }
        }
    }

    if !result.disclaimer.is_empty() {
        lines.push(ReportLine::Note(result.disclaimer.clone()));
    }
    lines
}

enum ReportLine {
    Title(String),
    Heading(String),
    Body(String),
    Item(String),
    Detail(String),
    Note(String),
}

/// Plain-text report for the clipboard.
pub fn render_text(case_id: &str, result: &AssessmentResult) -> String {
    let mut out = String::new();
    for line in report_lines(case_id, result) {
        match line {
            ReportLine::Title(t) => {
                out.push_str(&t);
                out.push('\n');
            }
            ReportLine::Heading(t) => {
                out.push('\n');
                out.push_str(&t);
                out.push('\n');
            }
            ReportLine::Body(t) => {
                out.push_str(&t);
                out.push('\n');
            }
            ReportLine::Item(t) => {
                out.push_str("- ");
                out.push_str(&t);
                out.push('\n');
            }
            ReportLine::Detail(t) => {
                out.push_str("  ");
                out.push_str(&t);
                out.push('\n');
            }
            ReportLine::Note(t) => {
                out.push('\n');
                out.push_str(&t);
                out.push('\n');
            }
        }
    }
    out
}

/// PDF of the report, adding pages as needed. Returns PDF bytes.
pub fn render_pdf(case_id: &str, result: &AssessmentResult) -> Result<Vec<u8>, ReportError> {
    let title = format!("AI Analysis Report - {case_id}");
    let (doc, page1, layer1) = PdfDocument::new(&title, Mm(210.0), Mm(297.0), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Font(e.to_string()))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = Mm(280.0);

    for line in report_lines(case_id, result) {
        let (text, size, x, face, gap_before, gap_after) = match &line {
            ReportLine::Title(t) => (t, 14.0, 20.0, &bold, 0.0, 10.0),
            ReportLine::Heading(t) => (t, 11.0, 20.0, &bold, 4.0, 6.0),
            ReportLine::Body(t) => (t, 10.0, 20.0, &font, 0.0, 5.0),
            ReportLine::Item(t) => (t, 9.0, 25.0, &font, 0.0, 4.5),
            ReportLine::Detail(t) => (t, 8.0, 30.0, &font, 0.0, 4.5),
            ReportLine::Note(t) => (t, 8.0, 20.0, &font, 8.0, 4.0),
        };
        y -= Mm(gap_before);
        for wrapped in wrap_text(text, WRAP_CHARS) {
            if y.0 < PAGE_BOTTOM {
                let (page, new_layer) = doc.add_page(Mm(210.0), Mm(297.0), "Layer 1");
                layer = doc.get_page(page).get_layer(new_layer);
                y = Mm(280.0);
            }
            layer.use_text(&wrapped, size, Mm(x), y, face);
            y -= Mm(gap_after);
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ReportError::Save(e.to_string()))?;
    buf.into_inner()
        .map_err(|e| ReportError::Save(e.to_string()))
}

fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.chars().count() + word.chars().count() + 1 > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> AssessmentResult {
        serde_json::from_value(serde_json::json!({
            "riskLevel": "high",
            "riskScore": 78,
            "summary": "Possible acute coronary syndrome",
            "keyFactors": [
                {"title": "Chest pain", "description": "Pressure-like for 2 hours", "confidence": 90},
                {"title": "Hypertension", "description": "", "confidence": 70}
            ],
            "differentialDiagnosis": [{"name": "ACS", "probability": 65}],
            "recommendations": [
                {"priority": "low", "text": "Lifestyle counselling"},
                {"priority": "urgent", "text": "12-lead ECG"}
            ],
            "modelName": "ChatGPT",
            "modelVersion": "gpt-4o",
            "analyzedAt": "2026-10-16 09:30:00",
            "disclaimer": "Reference only."
        }))
        .unwrap()
    }

    #[test]
    fn file_name_uses_iso_date() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(pdf_file_name("CASE-ABC", date), "analysis_CASE-ABC_2026-03-07.pdf");
        assert_eq!(text_file_name("CASE-ABC", date), "analysis_CASE-ABC_2026-03-07.txt");
    }

    #[test]
    fn text_orders_recommendations_by_priority() {
        let text = render_text("CASE-ABC", &result());
        assert!(text.starts_with("AI Analysis Report - CASE-ABC\n"));
        assert!(text.contains("Risk: HIGH (78/100)"));
        assert!(text.contains("- Chest pain (90%)\n  Pressure-like for 2 hours"));
        let urgent = text.find("[URGENT] 12-lead ECG").unwrap();
        let low = text.find("[LOW] Lifestyle counselling").unwrap();
        assert!(urgent < low);
        assert!(text.trim_end().ends_with("Reference only."));
    }

    #[test]
    fn pdf_has_header() {
        let bytes = render_pdf("CASE-ABC", &result()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_report_spills_onto_more_pages() {
        let mut long = result();
        long.key_factors = (0..120)
            .map(|i| crate::models::KeyFactor {
                title: format!("Factor {i}"),
                description: "detail ".repeat(20),
                confidence: 50,
            })
            .collect();
        let bytes = render_pdf("CASE-LONG", &long).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap_text(&"word ".repeat(40), 20);
        assert!(lines.iter().all(|l| l.chars().count() <= 20));
        assert_eq!(wrap_text("", 20), vec![String::new()]);
    }
}
