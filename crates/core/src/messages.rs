//! User-facing texts.
//!
//! The bot speaks Russian; every reply the dispatcher sends comes from here so the wording
//! stays consistent between handlers.

pub const HELP: &str = "Бот AV FITO для врачей.\n\n\
/access <КОД> — получить доступ\n\
/draft — подготовить ответ пациенту\n\
/pro <описание случая> — PRO-анализ по методике AV FITO\n\
/cancel — отменить текущее действие";

pub const NO_ACCESS: &str = "Нет доступа. Сначала используйте /access <CODE>";
pub const ACCESS_USAGE: &str = "Укажите код: /access <CODE>";
pub const CODE_NOT_RECOGNISED: &str = "Код не распознан. Проверьте и попробуйте ещё раз.";
pub const EMPTY_TEXT: &str = "Текст пустой. Отправьте текст ответа одним сообщением.";
pub const DRAFT_NOT_FOUND: &str = "Нет черновика для подтверждения. Начните заново: /draft";
pub const PROCESSING_ERROR: &str = "Не удалось обработать запрос. Попробуйте ещё раз позже.";
pub const UNKNOWN_COMMAND: &str = "Неизвестная команда. Список команд: /help";

pub const SEND_DRAFT_TEXT: &str = "Отправьте текст ответа одним сообщением.";
pub const DRAFT_PREVIEW_HEADER: &str = "Черновик ответа:";
pub const DRAFT_APPROVED: &str = "✅ Одобрено. Итоговый текст отправлен отдельным сообщением.";
pub const DRAFT_CANCELLED: &str = "Отменено.";

pub const PRO_INTRO: &str = "Начинаем PRO-анализ по методике AV FITO.\n\
Отвечайте кнопками — это займёт 1–2 минуты.";
pub const STALE_BUTTON: &str = "Этот вопрос уже не актуален.";

pub const BUTTON_APPROVE: &str = "✅ Одобрить";
pub const BUTTON_CANCEL: &str = "✖️ Отменить";
pub const BUTTON_YES: &str = "✅ Да";
pub const BUTTON_NO: &str = "❌ Нет";
pub const BUTTON_UNKNOWN: &str = "❓ Не знаю";

/// Greeting after a successful redemption.
pub fn access_granted(doctor_name: &str) -> String {
    format!("Доступ открыт. Добро пожаловать, {doctor_name}!")
}

/// Owner-only statistics line.
pub fn stats(sessions: usize, authorized: usize) -> String {
    format!("Сессий: {sessions}\nС доступом: {authorized}")
}
