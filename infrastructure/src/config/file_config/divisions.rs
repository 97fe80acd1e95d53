//! Division routing from TOML (`[divisions]` section)

use super::ConfigValidationError;
use hq_domain::{Division, DivisionTable};
use serde::{Deserialize, Serialize};

/// Lieutenant id per division; unset divisions keep their default
/// (`trading_lieutenant`, `research_lieutenant`, `risk_lieutenant`).
///
/// ```toml
/// [divisions]
/// trading = "desk_chief"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDivisionsConfig {
    pub trading: Option<String>,
    pub research: Option<String>,
    pub risk: Option<String>,
}

impl FileDivisionsConfig {
    fn entries(&self) -> [(Division, &Option<String>); 3] {
        [
            (Division::Trading, &self.trading),
            (Division::Research, &self.research),
            (Division::Risk, &self.risk),
        ]
    }

    pub fn to_table(&self) -> DivisionTable {
        self.entries()
            .into_iter()
            .filter_map(|(division, id)| id.as_deref().map(|id| (division, id.trim())))
            .fold(DivisionTable::new(), |table, (division, id)| {
                table.with_lieutenant(division, id)
            })
    }

    pub(super) fn validate(&self) -> Result<(), ConfigValidationError> {
        for (division, id) in self.entries() {
            if id.as_deref().is_some_and(|id| id.trim().is_empty()) {
                return Err(ConfigValidationError::EmptyLieutenantId {
                    field: format!("divisions.{}", division),
                });
            }
        }
        Ok(())
    }
}
