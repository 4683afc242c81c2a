use std::sync::Arc;
use std::time::Duration;

use keystone::{Database, DatabaseOptions, Field, TransactionId, Tuple, TupleDesc, Type};
use tempfile::TempDir;

/// Small pages and a short lock budget keep the tests quick.
pub fn test_options() -> DatabaseOptions {
    DatabaseOptions {
        page_size: 1024,
        pool_capacity: 16,
        lock_retries: 3,
        lock_retry_wait: Duration::from_millis(5),
    }
}

pub fn setup(options: DatabaseOptions) -> (TempDir, Arc<Database>) {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::open(dir.path(), options).expect("open database");
    (dir, Arc::new(db))
}

pub fn id_name_desc() -> TupleDesc {
    TupleDesc::new(vec![
        (Type::Int, "id".to_string()),
        (Type::String, "name".to_string()),
    ])
}

pub fn id_name_row(id: i32, name: &str) -> Tuple {
    Tuple::new(
        id_name_desc(),
        vec![Field::Int(id), Field::Str(name.to_string())],
    )
    .expect("row")
}

/// Creates an `(id int pk, name string)` table holding ids 1..=n, committed.
pub fn setup_people(db: &Arc<Database>, n: i32) -> u32 {
    let table = db
        .create_table("people", id_name_desc(), "id")
        .expect("create table");
    let tid = TransactionId::new();
    for id in 1..=n {
        db.insert_tuple(tid, table, id_name_row(id, &format!("p{}", id)))
            .expect("insert");
    }
    db.transaction_complete(tid, true).expect("commit");
    table
}
