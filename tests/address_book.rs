//! Round trips against a fixed wire corpus: an address book of people with
//! phone numbers, exercised as repeated messages, explicit field numbers,
//! maps, and mixed scalar kinds.

use std::collections::{BTreeMap, HashMap};

use wirebuf::{DecodeOptions, EncodeOptions, Enumeration, Message, SizePrefix};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enumeration)]
#[repr(i32)]
enum PhoneType {
    Mobile = 0,
    Home = 1,
    Work = 2,
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct PhoneNumber {
    #[wirebuf(string)]
    number: String, // field 1
    #[wirebuf(enumeration = "PhoneType")]
    phone_type: i32, // field 2
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct Person {
    #[wirebuf(string)]
    name: String, // field 1
    #[wirebuf(sint32)]
    id: i32, // field 2
    #[wirebuf(string)]
    email: String, // field 3
    #[wirebuf(message, repeated)]
    phones: Vec<PhoneNumber>, // field 4
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct AddressBook {
    #[wirebuf(message, repeated)]
    people: Vec<Person>, // field 1
}

/// Same layout as `Person`, with an extra string carried under the explicit
/// field number 10.
#[derive(Clone, Debug, PartialEq, Default, Message)]
struct PersonExplicit {
    #[wirebuf(string, tag = "10")]
    extra: String,
    #[wirebuf(string, tag = "1")]
    name: String,
    #[wirebuf(sint32, tag = "2")]
    id: i32,
    #[wirebuf(string, tag = "3")]
    email: String,
    #[wirebuf(message, repeated, tag = "4")]
    phones: Vec<PhoneNumber>,
}

/// `Person` with the phone list modelled as a map from number to type.
#[derive(Clone, Debug, PartialEq, Default, Message)]
struct PersonMap {
    #[wirebuf(string)]
    name: String,
    #[wirebuf(sint32)]
    id: i32,
    #[wirebuf(string)]
    email: String,
    #[wirebuf(map = "string, enumeration(PhoneType)")]
    phones: HashMap<String, i32>,
}

const PERSON_WIRE: &[u8] =
    b"\x0a\x08John Doe\x10\xd2\x09\x1a\x10jdoe@example.com\x22\x0c\x0a\x08555-4321\x10\x01";

const ADDRESS_BOOK_WIRE: &[u8] =
    b"\x0a\x2d\x0a\x08John Doe\x10\xd2\x09\x1a\x10jdoe@example.com\x22\x0c\x0a\x08555-4321\x10\x01\
      \x0a\x3e\x0a\x0aJohn Doe 2\x10\xd3\x09\x1a\x11jdoe2@example.com\x22\x0c\x0a\x08555-4322\x10\x01\
      \x22\x0c\x0a\x08555-4323\x10\x02";

fn john_doe() -> Person {
    Person {
        name: "John Doe".to_string(),
        // 617 zig-zags to 1234 on the wire.
        id: 617,
        email: "jdoe@example.com".to_string(),
        phones: vec![PhoneNumber {
            number: "555-4321".to_string(),
            phone_type: PhoneType::Home as i32,
        }],
    }
}

fn john_doe_2() -> Person {
    Person {
        name: "John Doe 2".to_string(),
        // -618 zig-zags to 1235 on the wire.
        id: -618,
        email: "jdoe2@example.com".to_string(),
        phones: vec![
            PhoneNumber {
                number: "555-4322".to_string(),
                phone_type: PhoneType::Home as i32,
            },
            PhoneNumber {
                number: "555-4323".to_string(),
                phone_type: PhoneType::Work as i32,
            },
        ],
    }
}

#[test]
fn person_wire_corpus() {
    assert_eq!(PERSON_WIRE.len(), 45);

    let person = Person::decode(PERSON_WIRE).unwrap();
    assert_eq!(person, john_doe());
    assert_eq!(person.phones[0].phone_type(), PhoneType::Home);

    assert_eq!(person.encode_to_vec(), PERSON_WIRE);
}

#[test]
fn address_book_wire_corpus() {
    assert_eq!(ADDRESS_BOOK_WIRE.len(), 111);

    let book = AddressBook::decode(ADDRESS_BOOK_WIRE).unwrap();
    assert_eq!(book.people, vec![john_doe(), john_doe_2()]);

    assert_eq!(book.encode_to_vec(), ADDRESS_BOOK_WIRE);
}

#[test]
fn default_person_in_address_book() {
    let book = AddressBook::decode(&b"\x0a\x00"[..]).unwrap();
    assert_eq!(book.people, vec![Person::default()]);

    // A default-valued element is still written, as a zero-length body.
    assert_eq!(book.encode_to_vec(), b"\x0a\x00");
}

#[test]
fn empty_address_book() {
    let book = AddressBook::decode(&b""[..]).unwrap();
    assert!(book.people.is_empty());
    assert!(book.encode_to_vec().is_empty());
}

#[test]
fn empty_person() {
    let person = Person::decode(&b""[..]).unwrap();
    assert_eq!(person, Person::default());
    assert!(person.encode_to_vec().is_empty());
}

#[test]
fn explicit_numbering_reads_the_same_layout() {
    let person = PersonExplicit::decode(PERSON_WIRE).unwrap();
    assert!(person.extra.is_empty());
    assert_eq!(person.name, "John Doe");
    assert_eq!(person.id, 617);
    assert_eq!(person.email, "jdoe@example.com");
    assert_eq!(person.phones.len(), 1);
}

#[test]
fn extra_field_is_skipped_by_the_narrower_type() {
    let explicit = PersonExplicit {
        extra: "extra".to_string(),
        name: "John Doe".to_string(),
        id: 617,
        email: "jdoe@example.com".to_string(),
        phones: vec![PhoneNumber {
            number: "555-4321".to_string(),
            phone_type: PhoneType::Home as i32,
        }],
    };
    let data = explicit.encode_to_vec();

    let person = Person::decode(data.as_slice()).unwrap();
    assert_eq!(person, john_doe());
}

#[test]
fn map_is_wire_compatible_with_repeated_entries() {
    let person = PersonMap::decode(PERSON_WIRE).unwrap();
    assert_eq!(person.name, "John Doe");
    assert_eq!(person.id, 617);
    assert_eq!(person.email, "jdoe@example.com");
    assert_eq!(person.phones.len(), 1);
    assert_eq!(person.phones["555-4321"], PhoneType::Home as i32);

    // One entry, so the encoding is deterministic and byte-identical to the
    // repeated-message layout.
    assert_eq!(person.encode_to_vec(), PERSON_WIRE);
}

#[test]
fn map_duplicate_key_takes_the_last_entry() {
    // Two entries under the same key, Home then Work.
    let data = b"\x22\x0c\x0a\x08555-4321\x10\x01\x22\x0c\x0a\x08555-4321\x10\x02";
    let person = PersonMap::decode(&data[..]).unwrap();
    assert_eq!(person.phones.len(), 1);
    assert_eq!(person.phones["555-4321"], PhoneType::Work as i32);
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct BTreePhones {
    #[wirebuf(btree_map = "string, enumeration(PhoneType)")]
    phones: BTreeMap<String, i32>,
}

#[test]
fn btree_map_orders_entries_by_key() {
    let mut phones = BTreeMap::new();
    phones.insert("555-4323".to_string(), PhoneType::Work as i32);
    phones.insert("555-4321".to_string(), PhoneType::Home as i32);
    let msg = BTreePhones { phones };

    let encoded = msg.encode_to_vec();
    assert_eq!(
        encoded,
        b"\x0a\x0c\x0a\x08555-4321\x10\x01\x0a\x0c\x0a\x08555-4323\x10\x02",
    );
    assert_eq!(encoded, msg.clone().encode_to_vec());
    assert_eq!(BTreePhones::decode(encoded.as_slice()).unwrap(), msg);
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct Inventory {
    #[wirebuf(map = "string, message")]
    items: HashMap<String, PhoneNumber>,
}

#[test]
fn map_with_message_values_round_trips() {
    let mut items = HashMap::new();
    items.insert(
        "home".to_string(),
        PhoneNumber {
            number: "555-4321".to_string(),
            phone_type: PhoneType::Home as i32,
        },
    );
    items.insert("empty".to_string(), PhoneNumber::default());
    let msg = Inventory { items };

    let encoded = msg.encode_to_vec();
    assert_eq!(encoded.len(), msg.encoded_len());
    assert_eq!(Inventory::decode(encoded.as_slice()).unwrap(), msg);
}

// A mixed-kind message: fixed-width floats, bytes, enums, nested and
// repeated messages, and a trailing bool.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enumeration)]
#[repr(i32)]
enum Color {
    Red = 0,
    Blue = 1,
    Green = 2,
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct Vec3 {
    #[wirebuf(float)]
    x: f32,
    #[wirebuf(float)]
    y: f32,
    #[wirebuf(float)]
    z: f32,
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct Weapon {
    #[wirebuf(string)]
    name: String,
    #[wirebuf(int32)]
    damage: i32,
}

#[derive(Clone, Debug, PartialEq, Default, Message)]
struct Monster {
    #[wirebuf(message)]
    pos: Vec3,
    #[wirebuf(int32)]
    mana: i32,
    #[wirebuf(int32)]
    hp: i32,
    #[wirebuf(string)]
    name: String,
    #[wirebuf(bytes)]
    inventory: Vec<u8>,
    #[wirebuf(enumeration = "Color")]
    color: i32,
    #[wirebuf(message, repeated)]
    weapons: Vec<Weapon>,
    #[wirebuf(message, optional)]
    equipped: Option<Weapon>,
    #[wirebuf(message, repeated)]
    path: Vec<Vec3>,
    #[wirebuf(bool)]
    boss: bool,
}

fn monster() -> Monster {
    Monster {
        pos: Vec3 {
            x: 1.0,
            y: 2.0,
            z: 3.0,
        },
        mana: 200,
        hp: 1000,
        name: "mushroom".to_string(),
        inventory: vec![1, 2, 3],
        color: Color::Blue as i32,
        weapons: vec![
            Weapon {
                name: "sword".to_string(),
                damage: 55,
            },
            Weapon {
                name: "spear".to_string(),
                damage: 150,
            },
        ],
        equipped: Some(Weapon {
            name: "none".to_string(),
            damage: 15,
        }),
        path: vec![
            Vec3 {
                x: 2.0,
                y: 3.0,
                z: 4.0,
            },
            Vec3 {
                x: 5.0,
                y: 6.0,
                z: 7.0,
            },
        ],
        boss: true,
    }
}

#[test]
fn monster_round_trips_unsized() {
    let monster = monster();
    let encoded = monster.encode_to_vec();
    assert_eq!(encoded.len(), monster.encoded_len());
    assert_eq!(Monster::decode(encoded.as_slice()).unwrap(), monster);
}

#[test]
fn monster_round_trips_with_each_size_prefix() {
    let monster = monster();
    for prefix in [SizePrefix::None, SizePrefix::Varint, SizePrefix::Fixed32] {
        let encoded = EncodeOptions::new()
            .size_prefix(prefix)
            .encode_to_vec(&monster);
        let decoded: Monster = DecodeOptions::new()
            .size_prefix(prefix)
            .decode(encoded.as_slice())
            .unwrap();
        assert_eq!(decoded, monster);
    }
}
