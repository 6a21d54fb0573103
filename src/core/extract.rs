//! Contract address extraction from deploy tool output.
//!
//! Rules are evaluated in order and the first match wins. Captures are not
//! validated here; see [`crate::utils::validation::parse_address`].

use serde::Serialize;

use crate::error::Result;
use crate::utils::parser;

/// One entry in the extraction rule table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRule {
    pub name: String,
    pub pattern: String,
}

impl AddressRule {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
        }
    }
}

/// A successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub address: String,
    pub rule: String,
}

/// Built-in rules in priority order.
pub fn builtin_rules() -> Vec<AddressRule> {
    vec![
        AddressRule::new("labelled", r"(?i)contract address:\s*(0x[0-9a-fA-F]+)"),
        AddressRule::new("forge-create", r"Deployed to:\s*(0x[0-9a-fA-F]+)"),
        AddressRule::new(
            "deployed-at",
            r"(?i)deployed\s+(?:\w+\s+)?at(?:\s+address)?:?\s*(0x[0-9a-fA-F]+)",
        ),
        AddressRule::new("broadcast-json", r#""contractAddress"\s*:\s*"(0x[0-9a-fA-F]+)""#),
        AddressRule::new("any-address", r"\b(0x[0-9a-fA-F]{40})\b"),
    ]
}

/// Configured patterns ahead of the built-ins.
///
/// Patterns are compiled up front so a typo in deploywire.toml surfaces
/// before the deploy command runs.
pub fn rules_with(custom: &[String]) -> Result<Vec<AddressRule>> {
    let mut rules = Vec::with_capacity(custom.len() + 5);
    for (idx, pattern) in custom.iter().enumerate() {
        parser::compile(pattern, "deploy.patterns")?;
        rules.push(AddressRule::new(format!("custom-{}", idx + 1), pattern.clone()));
    }
    rules.extend(builtin_rules());
    Ok(rules)
}

/// Apply `rules` in order; return the first capture of the first matching rule.
pub fn extract_with(rules: &[AddressRule], text: &str) -> Option<Extraction> {
    rules.iter().find_map(|rule| {
        parser::extract_first(text, &rule.pattern).map(|address| Extraction {
            address,
            rule: rule.name.clone(),
        })
    })
}

/// Apply the built-in rules.
pub fn extract_address(text: &str) -> Option<Extraction> {
    extract_with(&builtin_rules(), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
    const OTHER: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

    fn hit(text: &str) -> (String, String) {
        let found = extract_address(text).expect("address expected");
        (found.address, found.rule)
    }

    #[test]
    fn labelled_output() {
        let text = format!("== Logs ==\n  Contract Address: {}\n", ADDR);
        assert_eq!(hit(&text), (ADDR.to_string(), "labelled".to_string()));
    }

    #[test]
    fn labelled_is_case_insensitive() {
        let text = format!("contract address:{}", ADDR);
        assert_eq!(hit(&text).1, "labelled");
    }

    #[test]
    fn forge_create_output() {
        let text = format!(
            "Deployer: {}\nDeployed to: {}\nTransaction hash: 0xabc",
            OTHER, ADDR
        );
        assert_eq!(hit(&text), (ADDR.to_string(), "forge-create".to_string()));
    }

    #[test]
    fn deployed_at_variants() {
        for text in [
            format!("Consumer deployed at {}", ADDR),
            format!("contract deployed at address: {}", ADDR),
            format!("Deployed at: {}", ADDR),
        ] {
            assert_eq!(hit(&text), (ADDR.to_string(), "deployed-at".to_string()), "{}", text);
        }
    }

    #[test]
    fn broadcast_json() {
        let text = format!(
            r#"{{"transactionType":"CREATE","contractName":"Consumer","contractAddress": "{}"}}"#,
            ADDR
        );
        assert_eq!(hit(&text), (ADDR.to_string(), "broadcast-json".to_string()));
    }

    #[test]
    fn bare_address_fallback() {
        let text = format!("ok {}\n", ADDR);
        assert_eq!(hit(&text), (ADDR.to_string(), "any-address".to_string()));
    }

    #[test]
    fn earlier_rule_wins_over_later() {
        let text = format!("Deployed to: {}\nContract Address: {}", OTHER, ADDR);
        assert_eq!(hit(&text), (ADDR.to_string(), "labelled".to_string()));
    }

    #[test]
    fn no_rule_matches() {
        assert_eq!(extract_address("Compiling 3 files with 0.8.24\nDone"), None);
        assert_eq!(extract_address("tx 0x1234"), None);
    }

    #[test]
    fn malformed_capture_is_returned_unvalidated() {
        let found = extract_address("Contract Address: 0xABC004").unwrap();
        assert_eq!(found.address, "0xABC004");
        assert_eq!(found.rule, "labelled");

        let long = format!("Deployed to: {}ff", ADDR);
        assert_eq!(extract_address(&long).unwrap().address, format!("{}ff", ADDR));
    }

    #[test]
    fn custom_rules_take_priority() {
        let rules = rules_with(&[r"Consumer=(0x[0-9a-fA-F]{40})".to_string()]).unwrap();
        let text = format!("Contract Address: {}\nConsumer={}", OTHER, ADDR);
        let found = extract_with(&rules, &text).unwrap();
        assert_eq!(found.address, ADDR);
        assert_eq!(found.rule, "custom-1");
    }

    #[test]
    fn invalid_custom_rule_is_rejected() {
        let err = rules_with(&["(0x".to_string()]).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.invalid_argument");
    }
}
