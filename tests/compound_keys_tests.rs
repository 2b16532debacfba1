use std::rc::Rc;

use chrono::NaiveDate;
use memorm::database::{InMemoryDatabase, Statement};
use memorm::{ColumnBinding, EntityError, Row, ShapeRegistry, TableBinding, Value};

memorm::entity_shape! {
    pub struct Staff: "hr::Staff" {
        id: i32,
        department_id: i32,
        name: String,
        job: String,
        manager_id: i32,
        hire_date: NaiveDate,
        salary: i64,
    }
}

fn registry() -> Rc<ShapeRegistry> {
    ShapeRegistry::builder()
        .shape(Staff::declaration())
        .table(
            TableBinding::new("t_employee", Staff::SHAPE)
                .column(ColumnBinding::new("id", "id").primary_key().generated())
                .column(ColumnBinding::new("department_id", "department_id").primary_key())
                .bind("name", "name")
                .bind("job", "job")
                .bind("manager_id", "manager_id")
                .bind("hire_date", "hire_date")
                .bind("salary", "salary"),
        )
        .build()
        .unwrap()
}

fn staff_row(id: i64, department_id: i64, name: &str, job: &str, salary: i64) -> Row {
    [
        ("id", Value::Long(id)),
        ("department_id", Value::Long(department_id)),
        ("name", Value::from(name)),
        ("job", Value::from(job)),
        ("manager_id", Value::Null),
        (
            "hire_date",
            Value::Date(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap()),
        ),
        ("salary", Value::Long(salary)),
    ]
    .into_iter()
    .map(|(column, value)| (column.to_string(), value))
    .collect()
}

fn database() -> Rc<InMemoryDatabase> {
    let database = Rc::new(InMemoryDatabase::new());
    database.create_table("t_employee").unwrap();
    for row in [
        staff_row(1, 1, "vince", "engineer", 100),
        staff_row(2, 1, "marry", "clerk", 50),
        staff_row(3, 2, "tom", "director", 200),
        staff_row(4, 2, "penny", "assistant", 100),
    ] {
        database.insert_row("t_employee", row).unwrap();
    }
    database
}

fn find(database: &Rc<InMemoryDatabase>, registry: &Rc<ShapeRegistry>, id: i64) -> Staff {
    let handle = database
        .load(registry, Staff::SHAPE, &[("id", Value::Long(id))])
        .unwrap()
        .expect("staff exists");
    Staff::from_handle(handle).unwrap()
}

#[test]
fn test_add_assigns_generated_key_and_locks_compound_key() {
    let registry = registry();
    let database = database();

    let staff = Staff::create(&registry).unwrap();
    assert_eq!(staff.id().unwrap(), 0);

    staff.set_department_id(1).unwrap();
    staff.set_name("jerry".to_string()).unwrap();
    staff.set_job("engineer".to_string()).unwrap();
    staff.set_manager_id(1).unwrap();
    staff
        .set_hire_date(NaiveDate::from_ymd_opt(2020, 4, 7).unwrap())
        .unwrap();
    staff.set_salary(100).unwrap();
    assert_eq!(staff.id().unwrap(), 0);

    assert_eq!(staff.insert(database.clone()).unwrap(), 1);
    assert_eq!(staff.id().unwrap(), 5);
    assert!(!staff.has_changes());
    assert_eq!(database.row_count("t_employee").unwrap(), 5);

    match staff.set_department_id(2) {
        Err(EntityError::PrimaryKeyImmutable { property, .. }) => {
            assert_eq!(property, "department_id")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(staff.department_id().unwrap(), 1);
}

#[test]
fn test_flush_changes_sends_only_changed_columns() {
    let registry = registry();
    let database = database();

    let staff = find(&database, &registry, 2);
    assert_eq!(staff.job().unwrap(), "clerk");
    assert!(!staff.has_changes());

    staff.set_job("engineer".to_string()).unwrap();
    staff.set_salary(100).unwrap();
    assert_eq!(staff.flush_changes().unwrap(), 1);
    assert_eq!(staff.flush_changes().unwrap(), 0);

    match database.statements().unwrap().as_slice() {
        [Statement::Update(update)] => {
            assert_eq!(update.table, "t_employee");
            assert_eq!(
                update.keys,
                vec![
                    ("id".to_string(), Value::Integer(2)),
                    ("department_id".to_string(), Value::Integer(1)),
                ]
            );
            assert_eq!(update.assigned_columns(), vec!["job", "salary"]);
        }
        other => panic!("unexpected statements {other:?}"),
    }

    let staff = find(&database, &registry, 2);
    assert_eq!(staff.job().unwrap(), "engineer");
    assert_eq!(staff.salary().unwrap(), 100);
}

#[test]
fn test_delete_entity() {
    let registry = registry();
    let database = database();

    let staff = find(&database, &registry, 2);
    assert_eq!(staff.delete().unwrap(), 1);
    assert_eq!(database.row_count("t_employee").unwrap(), 3);
    assert!(
        database
            .load(&registry, Staff::SHAPE, &[("id", Value::Long(2))])
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_update_primary_key_of_loaded_entity() {
    let registry = registry();
    let database = database();

    let staff = find(&database, &registry, 1);
    assert!(matches!(
        staff.set_department_id(2),
        Err(EntityError::PrimaryKeyImmutable { .. })
    ));
    assert!(matches!(
        staff.set_id(7),
        Err(EntityError::PrimaryKeyImmutable { .. })
    ));
    assert!(!staff.has_changes());
}

#[test]
fn test_discard_changes_keeps_mutated_value() {
    let registry = registry();
    let database = database();

    let staff = find(&database, &registry, 3);
    staff.set_salary(999).unwrap();
    staff.discard_changes();

    assert_eq!(staff.flush_changes().unwrap(), 0);
    assert_eq!(staff.salary().unwrap(), 999);
    assert!(database.statements().unwrap().is_empty());
}

#[test]
fn test_nullable_column_loads_into_non_null_property() {
    let registry = registry();
    let database = database();

    // manager_id is NULL in storage but declared non-null
    let staff = find(&database, &registry, 4);
    assert_eq!(staff.get("manager_id"), Some(Value::Null));
    assert_eq!(staff.manager_id().unwrap(), 0);
}

#[test]
fn test_detached_entity_cannot_touch_storage() {
    let registry = registry();
    let staff = Staff::create(&registry).unwrap();

    assert!(matches!(staff.delete(), Err(EntityError::DetachedEntity(_))));

    staff.set_salary(10).unwrap();
    assert!(matches!(
        staff.flush_changes(),
        Err(EntityError::DetachedEntity(_))
    ));
}

#[test]
fn test_incomplete_compound_key_blocks_insert() {
    let registry = registry();
    let database = database();

    // department_id was never set, so the compound key is incomplete
    let staff = Staff::create(&registry).unwrap();
    staff.set_name("anna".to_string()).unwrap();
    match staff.insert(database.clone()) {
        Err(EntityError::MissingKey { table, column }) => {
            assert_eq!(table, "t_employee");
            assert_eq!(column, "department_id");
        }
        other => panic!("unexpected {other:?}"),
    }

    assert!(!staff.is_attached());
    assert_eq!(database.row_count("t_employee").unwrap(), 4);
    assert!(database.statements().unwrap().is_empty());
}
