use super::*;

fn desk(room: &str, x: i32, y: i32) -> Furniture {
    Furniture::new(FurnitureKind::Desk, room, Cell::new(x, y))
}

#[test]
fn test_rect_overlap_and_containment() {
    let a = Rect::new(0, 0, 4, 3);
    let b = Rect::new(4, 0, 2, 2);
    let c = Rect::new(3, 2, 2, 2);

    // Touching edges do not overlap
    assert!(!a.overlaps(&b));
    assert!(a.overlaps(&c));
    assert!(a.contains(Cell::new(3, 2)));
    assert!(!a.contains(Cell::new(4, 0)));
    assert!(a.contains_rect(&Rect::new(1, 1, 2, 2)));
    assert!(!a.contains_rect(&c));
}

#[test]
fn test_rect_cells_row_major() {
    let cells: Vec<Cell> = Rect::new(2, 5, 2, 2).cells().collect();
    assert_eq!(
        cells,
        vec![
            Cell::new(2, 5),
            Cell::new(3, 5),
            Cell::new(2, 6),
            Cell::new(3, 6)
        ]
    );
}

#[test]
fn test_overlapping_rooms_rejected() {
    let rooms = vec![
        Room::new("lobby", Rect::new(0, 0, 4, 4)),
        Room::new("lab", Rect::new(3, 3, 4, 4)),
    ];

    let err = OfficeTemplate::new(rooms, vec![]).unwrap_err();
    assert_eq!(
        err,
        TemplateError::OverlappingRooms {
            first: "lobby".to_string(),
            second: "lab".to_string()
        }
    );
}

#[test]
fn test_duplicate_and_empty_rooms_rejected() {
    let rooms = vec![
        Room::new("lobby", Rect::new(0, 0, 2, 2)),
        Room::new("lobby", Rect::new(5, 5, 2, 2)),
    ];
    assert_eq!(
        OfficeTemplate::new(rooms, vec![]).unwrap_err(),
        TemplateError::DuplicateRoom("lobby".to_string())
    );

    let rooms = vec![Room::new("closet", Rect::new(0, 0, 0, 3))];
    assert_eq!(
        OfficeTemplate::new(rooms, vec![]).unwrap_err(),
        TemplateError::EmptyRoom("closet".to_string())
    );
}

#[test]
fn test_furniture_must_fit_room() {
    let rooms = vec![Room::new("lobby", Rect::new(0, 0, 3, 3))];

    let err = OfficeTemplate::new(rooms.clone(), vec![desk("lobby", 2, 2).with_size(2, 1)])
        .unwrap_err();
    assert!(matches!(err, TemplateError::FurnitureOutOfBounds { .. }));

    let err = OfficeTemplate::new(rooms.clone(), vec![desk("attic", 0, 0)]).unwrap_err();
    assert_eq!(
        err,
        TemplateError::UnknownRoom {
            room: "attic".to_string()
        }
    );

    let err = OfficeTemplate::new(
        rooms,
        vec![desk("lobby", 0, 0).with_size(2, 1), desk("lobby", 1, 0)],
    )
    .unwrap_err();
    assert_eq!(
        err,
        TemplateError::FurnitureCollision {
            room: "lobby".to_string(),
            cell: Cell::new(1, 0)
        }
    );
}

#[test]
fn test_seats_skip_furniture_and_respect_capacity() {
    let rooms = vec![Room::new("lobby", Rect::new(0, 0, 3, 2)).with_capacity(3)];
    let template = OfficeTemplate::new(rooms, vec![desk("lobby", 0, 0)]).unwrap();

    let cells: Vec<Cell> = template.seats().iter().map(|s| s.cell).collect();
    assert_eq!(cells, vec![Cell::new(1, 0), Cell::new(2, 0), Cell::new(0, 1)]);
    assert_eq!(template.capacity(), 3);
}

#[test]
fn test_seats_follow_room_priority() {
    let rooms = vec![
        Room::new("break-room", Rect::new(0, 0, 1, 1)).with_priority(5),
        Room::new("office", Rect::new(2, 0, 1, 1)),
        Room::new("lab", Rect::new(4, 0, 1, 1)),
    ];
    let template = OfficeTemplate::new(rooms, vec![]).unwrap();

    let order: Vec<&str> = template.seats().iter().map(|s| s.room.as_str()).collect();
    assert_eq!(order, vec!["office", "lab", "break-room"]);
}

#[test]
fn test_overflow_strip_below_building() {
    let rooms = vec![
        Room::new("a", Rect::new(0, 0, 2, 2)),
        Room::new("b", Rect::new(2, 1, 1, 3)),
    ];
    let template = OfficeTemplate::new(rooms, vec![]).unwrap();

    // Building spans x 0..3, y 0..4
    assert_eq!(template.overflow_cell(0), Cell::new(0, 4));
    assert_eq!(template.overflow_cell(2), Cell::new(2, 4));
    assert_eq!(template.overflow_cell(3), Cell::new(0, 5));
}

#[test]
fn test_label_defaults_to_id() {
    let mut room = Room::new("lobby", Rect::new(0, 0, 1, 1));
    room.label = String::new();
    let template = OfficeTemplate::new(vec![room], vec![]).unwrap();
    assert_eq!(template.rooms()[0].label, "lobby");
}

#[test]
fn test_load_templates_from_toml() {
    let toml = r#"
        [[offices]]
        id = "hq"

        [[offices.rooms]]
        id = "open-plan"
        label = "Open plan"
        floor = "carpet"
        bounds = { x = 0, y = 0, width = 4, height = 3 }
        capacity = 4

        [[offices.rooms]]
        id = "meeting"
        bounds = { x = 4, y = 0, width = 3, height = 3 }
        priority = 1

        [[offices.furniture]]
        kind = "desk"
        room = "open-plan"
        anchor = { x = 0, y = 0 }
        width = 2

        [[offices.furniture]]
        kind = "water_cooler"
        room = "meeting"
        anchor = { x = 6, y = 2 }

        [fallback]
        rooms = [{ id = "main", bounds = { x = 0, y = 0, width = 2, height = 2 } }]
    "#;

    let set = TemplateSet::from_toml_str(toml).unwrap();
    assert_eq!(set.len(), 1);
    assert!(set.has_fallback());

    let hq = set.get("hq").unwrap();
    assert_eq!(hq.rooms().len(), 2);
    assert_eq!(hq.rooms()[0].floor, "carpet");
    assert_eq!(hq.rooms()[1].label, "meeting");
    assert_eq!(hq.furniture()[1].kind, FurnitureKind::WaterCooler);
    // 4 capped seats in open-plan + 8 free cells in meeting
    assert_eq!(hq.capacity(), 12);

    // Unknown office resolves to the fallback
    assert_eq!(set.get("elsewhere").unwrap().capacity(), 4);
}

#[test]
fn test_invalid_template_file_is_rejected() {
    let toml = r#"
        [[offices]]
        id = "hq"
        rooms = [
            { id = "a", bounds = { x = 0, y = 0, width = 3, height = 3 } },
            { id = "b", bounds = { x = 1, y = 1, width = 3, height = 3 } },
        ]
    "#;

    let err = TemplateSet::from_toml_str(toml).unwrap_err();
    assert!(format!("{:#}", err).contains("rooms 'a' and 'b' overlap"));
}

#[test]
fn test_duplicate_office_template_rejected() {
    let mut set = TemplateSet::new();
    let template = OfficeTemplate::new(vec![Room::new("a", Rect::new(0, 0, 1, 1))], vec![]).unwrap();
    set.insert("hq", template.clone()).unwrap();
    assert_eq!(
        set.insert("hq", template).unwrap_err(),
        TemplateError::DuplicateOffice("hq".to_string())
    );
    assert!(set.get("other").is_none());
}
