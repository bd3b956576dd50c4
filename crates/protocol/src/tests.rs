use super::*;

#[test]
fn parses_character_and_bank_together() {
    let msg = UpdateMessage::parse(
        r#"{
            "Character": {
                "Name": "curlyBoy",
                "Skin": "men1",
                "State": ["task loop", "harvest copper_rocks"],
                "Task": "chicken",
                "TaskType": "monsters",
                "TaskProgress": 3,
                "TaskTotal": 10,
                "Levels": {"mining": 12},
                "Xp": {"mining": 150},
                "MaxXp": {"mining": 600},
                "Inventory": {"copper_ore": 20, "ash_wood": 4},
                "InventoryMaxItems": 100,
                "Equipment": {"weapon": "copper_dagger", "helmet": ""},
                "Gold": 42,
                "CooldownExpires": "2024-08-01T12:00:10.5Z",
                "CooldownDuration": 20,
                "Location": {"Name": "copper_rocks", "X": 2, "Y": -1}
            },
            "Bank": {"copper": 5}
        }"#,
    )
    .unwrap()
    .expect("message");

    let ch = msg.character.expect("character");
    assert_eq!(ch.name, "curlyBoy");
    assert_eq!(ch.state.len(), 2);
    assert_eq!(ch.level("mining"), 12);
    assert_eq!(ch.max_xp("mining"), Some(600));
    assert_eq!(ch.max_xp("cooking"), None);
    assert_eq!(ch.inventory_count(), 24);
    assert_eq!(ch.equipped("weapon"), Some("copper_dagger"));
    assert_eq!(ch.equipped("helmet"), None);
    assert_eq!(
        ch.location,
        Some(Location {
            name: "copper_rocks".to_string(),
            x: 2,
            y: -1
        })
    );
    let expires = ch.cooldown_expires.expect("expiry");
    assert_eq!(expires.unix_timestamp(), 1_722_513_610);
    assert_eq!(msg.bank.unwrap().get("copper"), Some(&5));
}

#[test]
fn missing_fields_take_zero_values() {
    let msg = UpdateMessage::parse(r#"{"Character":{"Name":"A","Gold":9}}"#)
        .unwrap()
        .unwrap();
    let ch = msg.character.unwrap();
    assert_eq!(
        ch,
        Character {
            name: "A".to_string(),
            gold: 9,
            ..Character::default()
        }
    );
    assert!(msg.bank.is_none());
}

#[test]
fn null_collections_and_zero_time_are_empty() {
    let msg = UpdateMessage::parse(
        r#"{"Character":{"Name":"A","Inventory":null,"State":null,"CooldownExpires":"0001-01-01T00:00:00Z"},"Bank":null}"#,
    )
    .unwrap()
    .unwrap();
    let ch = msg.character.unwrap();
    assert!(ch.inventory.is_empty());
    assert!(ch.state.is_empty());
    assert_eq!(ch.cooldown_expires, None);
    assert!(msg.bank.is_none());
}

#[test]
fn actions_is_accepted_for_state() {
    let msg = UpdateMessage::parse(r#"{"Character":{"Name":"A","Actions":["fight"]}}"#)
        .unwrap()
        .unwrap();
    assert_eq!(msg.character.unwrap().state, vec!["fight".to_string()]);
}

#[test]
fn unknown_top_level_keys_are_ignored() {
    let msg = UpdateMessage::parse(r#"{"Bank":{"gold_ore":1},"Events":[1,2,3]}"#)
        .unwrap()
        .unwrap();
    assert!(msg.character.is_none());
    assert_eq!(msg.bank.unwrap().len(), 1);
}

#[test]
fn blank_body_is_not_a_message() {
    assert!(UpdateMessage::parse("").unwrap().is_none());
    assert!(UpdateMessage::parse("  \n").unwrap().is_none());
}

#[test]
fn empty_object_is_an_empty_message() {
    let msg = UpdateMessage::parse("{}").unwrap().unwrap();
    assert!(msg.is_empty());
}

#[test]
fn rejects_malformed_payloads() {
    assert!(matches!(
        UpdateMessage::parse("{not json"),
        Err(ProtocolError::Json(_))
    ));
    assert!(matches!(
        UpdateMessage::parse("[1,2]"),
        Err(ProtocolError::NotAnObject)
    ));
    assert!(matches!(
        UpdateMessage::parse(r#"{"Character":5}"#),
        Err(ProtocolError::Shape(_))
    ));
    assert!(matches!(
        UpdateMessage::parse(r#"{"Character":{"Name":"A","Gold":"lots"},"Bank":{"x":1}}"#),
        Err(ProtocolError::Shape(_))
    ));
    assert!(matches!(
        UpdateMessage::parse(r#"{"Bank":{"copper":"five"}}"#),
        Err(ProtocolError::Shape(_))
    ));
    assert!(matches!(
        UpdateMessage::parse(r#"{"Character":{"Gold":1}}"#),
        Err(ProtocolError::MissingName)
    ));
}

#[test]
fn serializes_with_wire_names() {
    let msg = UpdateMessage::bank(Bank::from([("copper".to_string(), 3)]));
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json, serde_json::json!({ "Bank": { "copper": 3 } }));

    let msg = UpdateMessage::character(Character {
        name: "A".to_string(),
        ..Character::default()
    });
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json[keys::CHARACTER]["Name"], "A");
    assert!(json[keys::CHARACTER]["CooldownExpires"].is_null());
    assert!(json.get(keys::BANK).is_none());
}

#[test]
fn location_name_survives_reserialization() {
    let msg = UpdateMessage::parse(
        r#"{"Character":{"Name":"A","Location":{"Name":"bank","X":4,"Y":1}}}"#,
    )
    .unwrap()
    .unwrap();
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["Character"]["Location"]["Name"], "bank");
    assert_eq!(json["Character"]["Location"]["X"], 4);
}

#[test]
fn inventory_count_saturates_on_huge_quantities() {
    let msg = UpdateMessage::parse(
        r#"{"Character":{"Name":"A","Inventory":{"a":9223372036854775807,"b":1}}}"#,
    )
    .unwrap()
    .unwrap();
    assert_eq!(msg.character.unwrap().inventory_count(), i64::MAX);
}

#[test]
fn equipment_lists_every_slot_in_display_order() {
    let mut ch = Character::default();
    ch.equipment.insert("boots".into(), "leather_boots".into());
    ch.equipment.insert("weapon".into(), "copper_dagger".into());
    ch.equipment.insert("shield".into(), String::new());
    let slots: Vec<_> = ch.equipment_in_order().collect();
    assert_eq!(slots.len(), EQUIPMENT_SLOTS.len());
    assert_eq!(slots[0], ("weapon", Some("copper_dagger")));
    assert_eq!(slots[4], ("shield", None));
    assert_eq!(slots[8], ("boots", Some("leather_boots")));
}
