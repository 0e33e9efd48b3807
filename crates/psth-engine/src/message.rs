// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Control-message grammar
//!
//! Messages are free text matched by case-insensitive prefix:
//!
//! ```text
//! ClearDesign
//! AddCondition,<name>,<stimulus-tag>,<visible:0|1>,<unused>,<label>,<trial-type-id>...
//! TrialStart <trial-type-id>      (alias: TrialType)
//! TrialAlign
//! TrialEnd
//! ```
//!
//! Field 1 (`<name>`) is the legend label. Field 5, the condition's own
//! `<label>` on the wire, is kept as the condition's `group`.
//!
//! Tokens are comma separated when the message contains a comma, otherwise
//! whitespace separated. Empty comma fields keep their position. Unknown
//! prefixes parse to `None`.

use crate::error::{EngineError, EngineResult};
use crate::registry::ConditionDefinition;

/// Fields preceding the trial-type ids in an AddCondition message
const ADD_CONDITION_FIXED_FIELDS: usize = 5;

/// A decoded control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    ClearDesign,
    AddCondition(ConditionDefinition),
    /// `TrialStart` / `TrialType`: selects the condition for the coming trial
    TrialType(String),
    TrialAlign,
    TrialEnd,
}

impl ControlMessage {
    /// Parse a broadcast message. `Ok(None)` means the prefix is not ours.
    pub fn parse(text: &str) -> EngineResult<Option<Self>> {
        let trimmed = text.trim();
        let lowered = trimmed.to_ascii_lowercase();
        let tokens = tokenize(trimmed);

        if lowered.starts_with("cleardesign") {
            Ok(Some(ControlMessage::ClearDesign))
        } else if lowered.starts_with("addcondition") {
            parse_add_condition(trimmed, &tokens).map(Some)
        } else if lowered.starts_with("trialstart") || lowered.starts_with("trialtype") {
            match tokens.get(1).filter(|id| !id.is_empty()) {
                Some(id) => Ok(Some(ControlMessage::TrialType(id.to_string()))),
                None => Err(EngineError::malformed(trimmed, "missing trial-type id")),
            }
        } else if lowered.starts_with("trialalign") {
            Ok(Some(ControlMessage::TrialAlign))
        } else if lowered.starts_with("trialend") {
            Ok(Some(ControlMessage::TrialEnd))
        } else {
            Ok(None)
        }
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ControlMessage::ClearDesign => "ClearDesign",
            ControlMessage::AddCondition(_) => "AddCondition",
            ControlMessage::TrialType(_) => "TrialType",
            ControlMessage::TrialAlign => "TrialAlign",
            ControlMessage::TrialEnd => "TrialEnd",
        }
    }
}

/// Comma fields keep their position even when empty; only a trailing empty
/// field is dropped.
fn tokenize(text: &str) -> Vec<&str> {
    if text.contains(',') {
        let mut tokens: Vec<&str> = text.split(',').map(str::trim).collect();
        if tokens.last().is_some_and(|t| t.is_empty()) {
            tokens.pop();
        }
        tokens
    } else {
        text.split_whitespace().collect()
    }
}

fn parse_add_condition(text: &str, tokens: &[&str]) -> EngineResult<ControlMessage> {
    if tokens.len() < 1 + ADD_CONDITION_FIXED_FIELDS + 1 {
        return Err(EngineError::malformed(
            text,
            format!(
                "expected at least {} fields, got {}",
                1 + ADD_CONDITION_FIXED_FIELDS + 1,
                tokens.len()
            ),
        ));
    }

    let visible = match tokens[3] {
        "1" => true,
        "0" => false,
        other if other.eq_ignore_ascii_case("true") => true,
        other if other.eq_ignore_ascii_case("false") => false,
        other => {
            return Err(EngineError::malformed(
                text,
                format!("visible flag must be 0 or 1, got '{}'", other),
            ))
        }
    };

    let trial_type_ids = &tokens[1 + ADD_CONDITION_FIXED_FIELDS..];
    if trial_type_ids.iter().any(|id| id.is_empty()) {
        return Err(EngineError::malformed(text, "empty trial-type id"));
    }

    Ok(ControlMessage::AddCondition(ConditionDefinition {
        label: tokens[1].to_string(),
        stimulus_tag: tokens[2].to_string(),
        visible,
        group: tokens[5].to_string(),
        trial_type_ids: trial_type_ids
            .iter()
            .map(|t| t.to_string())
            .collect(),
    }))
}
