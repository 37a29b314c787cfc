use serde::{Deserialize, Serialize};
use std::fmt;

/// A card stored on the payment backend. Read-only from this side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCard {
    pub id: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
}

impl fmt::Display for SavedCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "**** {} ({:02}/{})",
            self.last4, self.exp_month, self.exp_year
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_card_wire_format() {
        let json = r#"{"id":"card_1","last4":"4242","expMonth":7,"expYear":2027}"#;
        let card: SavedCard = serde_json::from_str(json).unwrap();
        assert_eq!(card.id, "card_1");
        assert_eq!(card.exp_month, 7);
        assert_eq!(card.to_string(), "**** 4242 (07/2027)");
    }
}
