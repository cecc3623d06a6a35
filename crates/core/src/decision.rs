//! Decision engine.
//!
//! Reduces a completed [`AnswerRecord`] to a [`Decision`] using a flat table of rules. Every rule
//! is evaluated independently; all rules that fire contribute a recommendation, in the order the
//! rules are declared. No rule suppresses another, and answer order has no influence on the
//! result.
//!
//! The rule content is data. A table is parsed from YAML, validated against the question
//! battery, and then frozen. A built-in table ships with the crate.

use crate::error::{BotError, BotResult};
use crate::questionnaire::{question_by_key, AnswerRecord};
use avfito_types::{NonEmptyText, YesNoUnknown};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Domain types
// ============================================================================

/// Explicit evidence a condition waits for. `Unknown` is deliberately not representable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evidence {
    Yes,
    No,
}

impl Evidence {
    fn matches(self, answer: YesNoUnknown) -> bool {
        matches!(
            (self, answer),
            (Evidence::Yes, YesNoUnknown::Yes) | (Evidence::No, YesNoUnknown::No)
        )
    }
}

/// How a rule combines its conditions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Fires when at least one condition holds.
    #[default]
    Any,
    /// Fires only when every condition holds.
    All,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Condition {
    pub question: &'static str,
    pub expected: Evidence,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub id: NonEmptyText,
    pub label: NonEmptyText,
    pub mode: MatchMode,
    pub conditions: Vec<Condition>,
    pub actions: Vec<String>,
}

impl Rule {
    /// Keys that made this rule fire, or `None` if it does not fire.
    fn evaluate(&self, answers: &AnswerRecord) -> Option<Vec<String>> {
        let satisfied: Vec<String> = self
            .conditions
            .iter()
            .filter(|c| c.expected.matches(answers.get(c.question)))
            .map(|c| c.question.to_owned())
            .collect();

        let fires = match self.mode {
            MatchMode::Any => !satisfied.is_empty(),
            MatchMode::All => satisfied.len() == self.conditions.len(),
        };

        fires.then_some(satisfied)
    }
}

/// Validated, ordered set of rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

/// One fired rule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub rule_id: String,
    pub label: String,
    pub actions: Vec<String>,
    /// Question keys whose answers made the rule fire, in condition order.
    pub triggered_by: Vec<String>,
}

/// All fired rules, in rule-declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Decision {
    recommendations: Vec<Recommendation>,
}

impl Decision {
    pub fn recommendations(&self) -> &[Recommendation] {
        &self.recommendations
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.recommendations
            .iter()
            .map(|r| r.rule_id.as_str())
            .collect()
    }
}

/// Evaluate every rule against `answers`.
///
/// Pure and deterministic: the same key-to-answer mapping always gives the same decision.
pub fn decide(answers: &AnswerRecord, table: &RuleTable) -> Decision {
    let recommendations = table
        .rules
        .iter()
        .filter_map(|rule| {
            rule.evaluate(answers).map(|triggered_by| Recommendation {
                rule_id: rule.id.to_string(),
                label: rule.label.to_string(),
                actions: rule.actions.clone(),
                triggered_by,
            })
        })
        .collect();

    Decision { recommendations }
}

// ============================================================================
// Rule table loading
// ============================================================================

impl RuleTable {
    /// Load a table from a YAML file.
    pub fn load(path: &Path) -> BotResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BotError::InvalidRules(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    /// Parse and validate a YAML rule table.
    ///
    /// Unknown keys are rejected and schema errors name the failing path
    /// (for example `rules[2].when[0].answer`).
    ///
    /// # Errors
    ///
    /// Returns [`BotError::InvalidRules`] if:
    /// - the YAML does not match the schema,
    /// - the table has no rules,
    /// - a rule id is repeated, or an id or label is blank,
    /// - a rule has no conditions,
    /// - a condition names a question outside the battery or expects `unknown`.
    pub fn parse(yaml_text: &str) -> BotResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, RuleTableWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() || path == "." {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(BotError::InvalidRules(format!(
                    "schema mismatch at {path}: {source}"
                )));
            }
        };

        wire_to_domain(wire)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleTableWire {
    rules: Vec<RuleWire>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleWire {
    id: String,
    label: String,
    #[serde(rename = "match", default)]
    mode: MatchMode,
    when: Vec<ConditionWire>,
    #[serde(default)]
    actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConditionWire {
    question: String,
    answer: YesNoUnknown,
}

fn wire_to_domain(wire: RuleTableWire) -> BotResult<RuleTable> {
    if wire.rules.is_empty() {
        return Err(BotError::InvalidRules("rule table has no rules".into()));
    }

    let mut seen_ids = HashSet::new();
    let mut rules = Vec::with_capacity(wire.rules.len());

    for (n, rule) in wire.rules.into_iter().enumerate() {
        let id = NonEmptyText::new(&rule.id)
            .map_err(|_| BotError::InvalidRules(format!("rules[{n}].id is empty")))?;
        if !seen_ids.insert(id.clone()) {
            return Err(BotError::InvalidRules(format!("duplicate rule id '{id}'")));
        }
        let label = NonEmptyText::new(&rule.label)
            .map_err(|_| BotError::InvalidRules(format!("rule '{id}' has an empty label")))?;

        if rule.when.is_empty() {
            return Err(BotError::InvalidRules(format!(
                "rule '{id}' has no conditions"
            )));
        }

        let conditions = rule
            .when
            .into_iter()
            .map(|c| condition_to_domain(&id, c))
            .collect::<BotResult<Vec<_>>>()?;

        let actions = rule
            .actions
            .into_iter()
            .map(|a| a.trim().to_owned())
            .filter(|a| !a.is_empty())
            .collect();

        rules.push(Rule {
            id,
            label,
            mode: rule.mode,
            conditions,
            actions,
        });
    }

    Ok(RuleTable { rules })
}

fn condition_to_domain(rule_id: &NonEmptyText, wire: ConditionWire) -> BotResult<Condition> {
    let question = question_by_key(wire.question.trim()).ok_or_else(|| {
        BotError::InvalidRules(format!(
            "rule '{rule_id}' refers to unknown question '{}'",
            wire.question
        ))
    })?;

    let expected = match wire.answer {
        YesNoUnknown::Yes => Evidence::Yes,
        YesNoUnknown::No => Evidence::No,
        YesNoUnknown::Unknown => {
            return Err(BotError::InvalidRules(format!(
                "rule '{rule_id}' waits for 'unknown' on '{}'; only yes or no is evidence",
                question.key
            )))
        }
    };

    Ok(Condition {
        question: question.key,
        expected,
    })
}
