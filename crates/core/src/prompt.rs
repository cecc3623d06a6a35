//! Instructions for the text-generation backend.
//!
//! The constraints below are owned by the bot, not the backend: any backend that polishes a
//! draft receives exactly these instructions.

/// Fixed constraints every polished draft must respect.
pub const POLISH_RULES: &[&str] = &[
    "Пиши только на русском языке.",
    "Не упоминай, что текст подготовлен автоматически, нейросетью или ассистентом.",
    "Не добавляй клинических фактов, диагнозов, препаратов или дозировок, которых нет в исходном тексте.",
    "Не используй числовые соотношения и пропорции (например, 1:2 или 3/1).",
    "Сохрани смысл и все назначения врача без изменений.",
    "Структура: короткое обращение, затем рекомендации отдельными абзацами, без заголовков и markdown.",
    "Верни только итоговый текст ответа, без пояснений.",
];

/// System instructions for polishing a draft written by `doctor_name`.
pub fn polish_instructions(doctor_name: &str) -> String {
    let mut out = format!(
        "Ты помогаешь врачу ({doctor_name}) аккуратно оформить ответ пациенту.\nПравила:"
    );
    for (n, rule) in POLISH_RULES.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", n + 1, rule));
    }
    out
}

/// User-turn content carrying the raw draft.
pub fn polish_request(raw_text: &str) -> String {
    format!("Черновик врача:\n{}", raw_text.trim())
}

/// Strip wrapping artifacts a backend may add around the answer.
///
/// Removes a surrounding code fence and matching outer quotes, then trims.
pub fn sanitize_polished(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(inner) = text.strip_prefix("```") {
        let inner = inner.split_once('\n').map_or("", |(_, rest)| rest);
        text = inner.strip_suffix("```").unwrap_or(inner).trim();
    }

    for (open, close) in [('"', '"'), ('«', '»'), ('“', '”')] {
        if text.len() > 1 && text.starts_with(open) && text.ends_with(close) {
            let inner = &text[open.len_utf8()..text.len() - close.len_utf8()];
            if !inner.contains(open) && !inner.contains(close) {
                text = inner.trim();
            }
        }
    }

    text.to_owned()
}
