use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub room_number: i64,
    #[serde(rename = "type")]
    pub room_type: RoomType,
    pub price: f64,
    pub capacity: i64,
    pub description: String,
    pub amenities: Vec<String>,
    pub available: bool,
    pub out_of_order: bool,
    pub created_at: chrono::NaiveDateTime,
}

impl Room {
    /// Out of order overrides the operator's `available` flag.
    pub fn is_bookable(&self) -> bool {
        !self.out_of_order && self.available
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoomType {
    Single,
    Double,
    Suite,
    Deluxe,
    Presidential,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Single => "Single",
            RoomType::Double => "Double",
            RoomType::Suite => "Suite",
            RoomType::Deluxe => "Deluxe",
            RoomType::Presidential => "Presidential",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Single" => Some(RoomType::Single),
            "Double" => Some(RoomType::Double),
            "Suite" => Some(RoomType::Suite),
            "Deluxe" => Some(RoomType::Deluxe),
            "Presidential" => Some(RoomType::Presidential),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_type_round_trip() {
        for name in ["Single", "Double", "Suite", "Deluxe", "Presidential"] {
            let parsed = RoomType::parse(name).unwrap();
            assert_eq!(parsed.as_str(), name);
        }
        assert!(RoomType::parse("Penthouse").is_none());
    }

    #[test]
    fn test_out_of_order_overrides_available() {
        let mut room = Room {
            id: "r1".to_string(),
            room_number: 101,
            room_type: RoomType::Single,
            price: 80.0,
            capacity: 1,
            description: String::new(),
            amenities: vec![],
            available: true,
            out_of_order: true,
            created_at: chrono::Utc::now().naive_utc(),
        };
        assert!(!room.is_bookable());

        room.out_of_order = false;
        assert!(room.is_bookable());

        room.available = false;
        assert!(!room.is_bookable());
    }
}
