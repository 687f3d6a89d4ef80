use regex::Regex;

use crate::MailbatchError;

/// Recipient masks compiled once per run. An empty list allows everyone.
#[derive(Debug, Clone, Default)]
pub struct AddressWhitelist {
    patterns: Vec<Regex>,
}

impl AddressWhitelist {
    pub fn new(masks: &[String]) -> crate::Result<Self> {
        let patterns = masks
            .iter()
            .map(|mask| {
                let pattern = format!("^{}$", regex::escape(mask.trim()).replace(r"\*", ".*"));
                Regex::new(&pattern).map_err(|e| MailbatchError::Config {
                    reason: format!("invalid address mask '{mask}': {e}"),
                })
            })
            .collect::<crate::Result<_>>()?;
        Ok(Self { patterns })
    }

    /// Check a recipient value, which may be a comma-separated list.
    pub fn check(&self, recipients: &str) -> crate::Result<()> {
        if self.patterns.is_empty() {
            return Ok(());
        }
        for address in recipients.split(',').map(str::trim) {
            if !self.patterns.iter().any(|p| p.is_match(address)) {
                return Err(MailbatchError::RecipientNotAllowed {
                    value: address.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist(masks: &[&str]) -> AddressWhitelist {
        let masks: Vec<String> = masks.iter().map(|m| m.to_string()).collect();
        AddressWhitelist::new(&masks).unwrap()
    }

    #[test]
    fn test_empty_whitelist_allows_all() {
        assert!(whitelist(&[]).check("anyone@anywhere.org").is_ok());
    }

    #[test]
    fn test_wildcard_domain_mask() {
        let w = whitelist(&["*@example.com"]);
        assert!(w.check("alice@example.com").is_ok());
        assert!(matches!(
            w.check("alice@example.org"),
            Err(MailbatchError::RecipientNotAllowed { value }) if value == "alice@example.org"
        ));
    }

    #[test]
    fn test_dots_are_literal() {
        let w = whitelist(&["*@example.com"]);
        assert!(w.check("alice@exampleXcom").is_err());
    }

    #[test]
    fn test_comma_separated_recipients_all_checked() {
        let w = whitelist(&["*@example.com", "boss@corp.com"]);
        assert!(w.check("a@example.com, boss@corp.com").is_ok());
        assert!(matches!(
            w.check("a@example.com, intruder@corp.com"),
            Err(MailbatchError::RecipientNotAllowed { value }) if value == "intruder@corp.com"
        ));
    }
}
