//! Prompt templates for each stage of the chain of command

use crate::hierarchy::entities::{Agent, DomainType};

/// Output contract a trader document must keep after a self-write
pub const TRADER_DECISION_SCHEMA: &str = r#"{"action": "buy" | "sell" | "hold", "symbol": "<ticker>", "size": <number>, "confidence": <0.0-1.0>, "reasoning": "<one paragraph>"}"#;

/// Section headings an analyst document must keep after a self-write
pub const ANALYST_SECTIONS: [&str; 3] = ["## SUMMARY", "## SIGNALS", "## OUTLOOK"];

/// Templates for generating prompts at each stage
pub struct PromptTemplate;

impl PromptTemplate {
    /// User prompt sent to the General (its own document is the system prompt)
    pub fn general_command(command: &str) -> String {
        format!(
            r#"The operator has issued the following command:

{}

Assess the command and decide which division must carry it out:
- TRADING: strategy, entries and exits, position sizing, execution
- RESEARCH: news, sentiment, macro and market intelligence
- RISK: drawdown limits, exposure, hedging, compliance

Respond in this format:

ASSESSMENT: <two or three sentences>
DELEGATE TO: <TRADING | RESEARCH | RISK>
ORDERS:
<precise instructions for that division's Lieutenant>"#,
            command
        )
    }

    /// User prompt sent to the Lieutenant with its roster
    pub fn lieutenant_order(order: &str, soldiers: &[&Agent]) -> String {
        let mut prompt = format!(
            r#"The General has forwarded the following order to your division:

{}

Your soldiers and their current prompt documents:
"#,
            order
        );

        if soldiers.is_empty() {
            prompt.push_str("\n(no soldiers assigned)\n");
        }
        for soldier in soldiers {
            prompt.push_str(&format!(
                "\n--- {} [{}] ({}) ---\n{}\n",
                soldier.name, soldier.id, soldier.domain_type, soldier.current_prompt
            ));
        }

        prompt.push_str(
            r#"
Decide which soldiers must change. Respond with JSON only:

{"changes": [
  {"agent_id": "<id>", "what_changed": "<one line>", "new_prompt": "<full replacement document>"},
  {"agent_id": "<id>", "what_changed": "<one line>", "guidance": "<instructions for the soldier to rewrite itself>"}
]}

Give either a full "new_prompt" or "guidance", not both. Use the ids shown in brackets.

To add or retire a soldier instead, answer with a single block:

CREATE AGENT
NAME: <display name>
TYPE: <trader | analyst | risk>
REASON: <why>
PROMPT:
<full document>
END

or

DELETE AGENT
ID: <id>
REASON: <why>"#,
        );

        prompt
    }

    /// System prompt for a soldier rewriting its own document
    pub fn self_write_system(agent: &Agent) -> String {
        format!(
            r#"You are {}, rewriting your own operating document.
Apply the guidance you are given and keep everything else that still holds.
{}
Return only the complete revised document. No commentary, no code fences."#,
            agent.name,
            Self::output_contract(&agent.domain_type)
        )
    }

    /// User prompt for a self-write: current text plus guidance
    pub fn self_write(current_prompt: &str, guidance: &str) -> String {
        format!(
            r#"Current document:

{}

Guidance from your Lieutenant:

{}

Write the full revised document now."#,
            current_prompt, guidance
        )
    }

    /// The output contract a domain's document must preserve
    pub fn output_contract(domain: &DomainType) -> String {
        match domain {
            DomainType::Trader => format!(
                "Your document must still instruct you to answer every market snapshot with exactly one JSON object of this shape, unchanged:\n{}",
                TRADER_DECISION_SCHEMA
            ),
            DomainType::Analyst => format!(
                "Your document must still require reports with exactly these sections, in this order: {}.",
                ANALYST_SECTIONS.join(", ")
            ),
            DomainType::Risk | DomainType::Command | DomainType::Other(_) => {
                "Preserve any response format your current document defines.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::entities::NewAgent;
    use chrono::Utc;

    fn agent(domain: DomainType) -> Agent {
        Agent::from_new(
            &NewAgent::soldier("Momentum Trader", "You are the Momentum Trader.")
                .with_domain(domain),
            Utc::now(),
        )
    }

    #[test]
    fn test_general_command_asks_for_markers() {
        let prompt = PromptTemplate::general_command("increase position sizing for trading");
        assert!(prompt.contains("increase position sizing for trading"));
        assert!(prompt.contains("DELEGATE TO:"));
        assert!(prompt.contains("ORDERS:"));
    }

    #[test]
    fn test_lieutenant_order_lists_roster() {
        let soldier = agent(DomainType::Trader);
        let prompt = PromptTemplate::lieutenant_order("Size up", &[&soldier]);
        assert!(prompt.contains("Momentum Trader [momentum_trader] (trader)"));
        assert!(prompt.contains("You are the Momentum Trader."));
        assert!(prompt.contains(r#"{"changes": ["#));
    }

    #[test]
    fn test_lieutenant_order_without_soldiers() {
        let prompt = PromptTemplate::lieutenant_order("Size up", &[]);
        assert!(prompt.contains("(no soldiers assigned)"));
    }

    #[test]
    fn test_self_write_contract_by_domain() {
        let trader = PromptTemplate::self_write_system(&agent(DomainType::Trader));
        assert!(trader.contains(r#""confidence""#));

        let analyst = PromptTemplate::self_write_system(&agent(DomainType::Analyst));
        assert!(analyst.contains("## SUMMARY, ## SIGNALS, ## OUTLOOK"));

        let risk = PromptTemplate::self_write_system(&agent(DomainType::Risk));
        assert!(!risk.contains("## SIGNALS"));
        assert!(!risk.contains("confidence"));
    }

    #[test]
    fn test_self_write_includes_text_and_guidance() {
        let prompt = PromptTemplate::self_write("OLD TEXT", "tighten stops");
        assert!(prompt.contains("OLD TEXT"));
        assert!(prompt.contains("tighten stops"));
    }
}
