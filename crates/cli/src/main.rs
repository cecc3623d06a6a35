use avfito_core::constants::{DEFAULT_DOCTOR_NAME, ENV_DOCTOR_CODES, ENV_RULES_PATH};
use avfito_core::questionnaire::question_by_key;
use avfito_core::render::render_questionnaire_result;
use avfito_core::{decide, AccessRegistry, AnswerRecord, RuleTable, QUESTIONS};
use avfito_types::{NonEmptyText, YesNoUnknown};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "avfito")]
#[command(about = "AV FITO bot operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an access-code string and list the usable codes
    CheckCodes {
        /// `code:name` records; falls back to DOCTOR_CODES
        codes: Option<String>,
        /// Name used for records without one
        #[arg(long, default_value = DEFAULT_DOCTOR_NAME)]
        default_name: String,
    },
    /// List the PRO question battery
    Questions,
    /// Validate a rule table
    CheckRules {
        /// YAML rule table; falls back to AVFITO_RULES_PATH
        path: Option<PathBuf>,
    },
    /// Run the decision engine on a set of answers and print the document
    Decide {
        /// Question keys answered "yes" (comma-separated)
        #[arg(long, value_delimiter = ',')]
        yes: Vec<String>,
        /// Question keys answered "no" (comma-separated)
        #[arg(long, value_delimiter = ',')]
        no: Vec<String>,
        /// YAML rule table; falls back to AVFITO_RULES_PATH
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Doctor name shown in the header
        #[arg(long, default_value = DEFAULT_DOCTOR_NAME)]
        doctor: String,
        /// Case description (optional)
        #[arg(long)]
        case: Option<String>,
        /// Print recommendations as JSON instead of the document
        #[arg(long)]
        json: bool,
    },
}

/// Build an answer record from explicit yes/no keys. Keys not listed stay unknown.
fn answers_from(yes: &[String], no: &[String]) -> Result<AnswerRecord, String> {
    let mut pairs: Vec<(String, YesNoUnknown)> = Vec::new();
    for (keys, choice) in [(yes, YesNoUnknown::Yes), (no, YesNoUnknown::No)] {
        for key in keys.iter().map(|k| k.trim()).filter(|k| !k.is_empty()) {
            if question_by_key(key).is_none() {
                return Err(format!("unknown question key: {key}"));
            }
            if pairs.iter().any(|(k, _)| k == key) {
                return Err(format!("question key given twice: {key}"));
            }
            pairs.push((key.to_owned(), choice));
        }
    }
    Ok(pairs.into_iter().collect())
}

fn load_rules(path: Option<PathBuf>) -> Result<RuleTable, Box<dyn std::error::Error>> {
    let Some(path) = path.or_else(|| std::env::var_os(ENV_RULES_PATH).map(PathBuf::from)) else {
        return Err(format!("no rule table given and {ENV_RULES_PATH} is not set").into());
    };
    Ok(RuleTable::load(&path)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckCodes {
            codes,
            default_name,
        }) => {
            let Some(raw) = codes.or_else(|| std::env::var(ENV_DOCTOR_CODES).ok()) else {
                return Err(format!("no codes given and {ENV_DOCTOR_CODES} is not set").into());
            };
            let registry = AccessRegistry::from_raw(&raw, &default_name);
            if registry.is_empty() {
                return Err("no usable code:name records".into());
            }
            println!("{} usable access code(s)", registry.len());
        }
        Some(Commands::Questions) => {
            for (n, q) in QUESTIONS.iter().enumerate() {
                println!("{:>2}. {:<34} {}", n + 1, q.key, q.prompt);
            }
        }
        Some(Commands::CheckRules { path }) => {
            let table = load_rules(path)?;
            for rule in table.rules() {
                let keys: Vec<&str> = rule.conditions.iter().map(|c| c.question).collect();
                println!(
                    "{} [{:?}] {} <- {}",
                    rule.id,
                    rule.mode,
                    rule.label,
                    keys.join(", ")
                );
            }
            println!("{} rule(s) OK", table.len());
        }
        Some(Commands::Decide {
            yes,
            no,
            rules,
            doctor,
            case,
            json,
        }) => {
            let answers = answers_from(&yes, &no)?;
            let table = load_rules(rules)?;
            let decision = decide(&answers, &table);

            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                let case_text = case.as_deref().and_then(|c| NonEmptyText::new(c).ok());
                println!(
                    "{}",
                    render_questionnaire_result(&doctor, case_text.as_ref(), &decision)
                );
            }
        }
        None => {
            println!("Use --help for usage");
        }
    }

    Ok(())
}
