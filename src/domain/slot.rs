use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Free,
    Booked,
}

/// A numbered parking slot as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(rename = "slot_id")]
    pub id: u32,
    pub status: SlotStatus,
    #[serde(rename = "parked_vehicle_plate", default)]
    pub plate: Option<String>,
}

/// How a slot looks from the connected user's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotView {
    Free,
    Mine(String),
    Taken,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.status == SlotStatus::Free
    }

    /// Classifies the slot against the plates owned by the user.
    pub fn view<S: AsRef<str>>(&self, my_plates: &[S]) -> SlotView {
        if self.is_free() {
            return SlotView::Free;
        }
        match &self.plate {
            Some(plate) if my_plates.iter().any(|p| p.as_ref() == plate) => {
                SlotView::Mine(plate.clone())
            }
            _ => SlotView::Taken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_wire_format() {
        let json = r#"[{"slot_id":1,"status":"free","parked_vehicle_plate":null},
                      {"slot_id":2,"status":"booked","parked_vehicle_plate":"ABC-123"}]"#;
        let slots: Vec<Slot> = serde_json::from_str(json).unwrap();
        assert_eq!(slots.len(), 2);
        assert!(slots[0].is_free());
        assert_eq!(slots[1].plate.as_deref(), Some("ABC-123"));
    }

    #[test]
    fn test_slot_view() {
        let mine = Slot {
            id: 2,
            status: SlotStatus::Booked,
            plate: Some("ABC-123".to_string()),
        };
        let other = Slot {
            id: 3,
            status: SlotStatus::Booked,
            plate: Some("XYZ-999".to_string()),
        };
        let free = Slot {
            id: 1,
            status: SlotStatus::Free,
            plate: None,
        };
        let plates = ["ABC-123"];
        assert_eq!(mine.view(&plates), SlotView::Mine("ABC-123".to_string()));
        assert_eq!(other.view(&plates), SlotView::Taken);
        assert_eq!(free.view(&plates), SlotView::Free);
    }
}
