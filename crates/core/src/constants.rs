//! Constants used throughout the AV FITO core crate.

/// Separators between `code:name` records in the access-code string.
pub const CODE_RECORD_SEPARATORS: &[char] = &[';', '\n'];

/// Separator between the code and the display name inside one record.
pub const CODE_NAME_SEPARATOR: char = ':';

/// Display name used when a code carries no name and no default is configured.
pub const DEFAULT_DOCTOR_NAME: &str = "Доктор";

/// Case text rendered when `/pro` was started without a description.
pub const DEFAULT_CASE_TEXT: &str = "Клинический кейс без уточнений";

/// Brand name used in the rendered header and signature.
pub const BRAND_NAME: &str = "AV FITO";

/// Environment variable names read once at startup.
pub const ENV_DOCTOR_CODES: &str = "DOCTOR_CODES";
pub const ENV_OWNER_ID: &str = "OWNER_ID";
pub const ENV_DEFAULT_DOCTOR_NAME: &str = "DEFAULT_DOCTOR_NAME";
pub const ENV_RULES_PATH: &str = "AVFITO_RULES_PATH";
