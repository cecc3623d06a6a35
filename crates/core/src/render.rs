//! Final document rendering.
//!
//! The rendered document is one logical string: header naming the doctor, the body, and the
//! brand signature. Splitting for message-size limits is left to the transport.

use crate::constants::{BRAND_NAME, DEFAULT_CASE_TEXT};
use crate::decision::Decision;
use avfito_types::NonEmptyText;


/// Wrap `body` in the fixed header and signature.
pub fn render_final(doctor_name: &str, body: &str) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        header(doctor_name),
        body.trim_end(),
        signature()
    )
}

fn header(doctor_name: &str) -> String {
    format!("{BRAND_NAME} · Ответ врача: {doctor_name}")
}

fn signature() -> String {
    format!("—\nС уважением,\nкоманда {BRAND_NAME}\nФитотерапия и клиническое сопровождение")
}

/// Body text for a finished PRO questionnaire.
pub fn render_decision(case_text: Option<&NonEmptyText>, decision: &Decision) -> String {
    let case_text = case_text.map_or(DEFAULT_CASE_TEXT, NonEmptyText::as_str);

    let mut out = format!("Клинический случай:\n{case_text}\n\nРекомендации по методике {BRAND_NAME}:");

    if decision.is_empty() {
        out.push_str("\nПо ответам не выявлено направлений, требующих отдельной коррекции.");
        return out;
    }

    for (n, rec) in decision.recommendations().iter().enumerate() {
        out.push_str(&format!("\n\n{}. {}", n + 1, rec.label));
        for action in &rec.actions {
            out.push_str(&format!("\n• {action}"));
        }
    }

    out
}

/// Finished PRO document, ready to send.
pub fn render_questionnaire_result(
    doctor_name: &str,
    case_text: Option<&NonEmptyText>,
    decision: &Decision,
) -> String {
    render_final(doctor_name, &render_decision(case_text, decision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::decide;
    use crate::decision::fixtures::sample_table;
    use crate::questionnaire::AnswerRecord;
    use avfito_types::YesNoUnknown;

    #[test]
    fn final_document_has_header_body_and_signature() {
        let doc = render_final("Dr. A", "Take rest");
        assert!(doc.starts_with("AV FITO · Ответ врача: Dr. A\n\n"));
        assert!(doc.contains("\n\nTake rest\n\n"));
        assert!(doc.ends_with(&signature()));
    }

    #[test]
    fn signature_names_the_brand() {
        assert!(signature().contains(&format!("команда {BRAND_NAME}\n")));
        assert!(signature().starts_with("—\nС уважением,"));
    }

    #[test]
    fn body_is_kept_verbatim() {
        let body = "Line one\n\n  indented line\nLine three";
        let doc = render_final("Dr. A", body);
        assert!(doc.contains(body));
    }

    #[test]
    fn decision_body_uses_default_case_text() {
        let table = sample_table();
        let decision = decide(&AnswerRecord::new(), &table);
        let body = render_decision(None, &decision);
        assert!(body.contains(DEFAULT_CASE_TEXT));
        assert!(body.contains("не выявлено"));
    }

    #[test]
    fn decision_body_lists_recommendations_in_order() {
        let table = sample_table();
        let answers: AnswerRecord = [
            ("active_itch", YesNoUnknown::Yes),
            ("stool_daily", YesNoUnknown::No),
        ]
        .into_iter()
        .collect();
        let decision = decide(&answers, &table);
        let case = NonEmptyText::new("Зуд, запоры").expect("valid");

        let doc = render_questionnaire_result("Dr. A", Some(&case), &decision);
        let gut = doc.find("1. ЖКТ").expect("gut section");
        let skin = doc.find("2. Кожа").expect("skin section");
        assert!(gut < skin);
        assert!(doc.contains("Зуд, запоры"));
        assert!(doc.ends_with(&signature()));
    }
}
