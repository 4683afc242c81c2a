use atlas::{
    Aggregate, AggregateOp, BoxedExecutor, Delete, ExecutionError, Executor, Filter, Insert,
    Predicate, SeqScan,
};
use keystone::{Field, Op, TransactionId, Tuple, TupleDesc, Type};

mod common;

fn drain(exec: &mut dyn Executor) -> Vec<Tuple> {
    exec.open().expect("open");
    let mut out = Vec::new();
    while exec.has_next().expect("has_next") {
        out.push(exec.next().expect("next"));
    }
    out
}

struct StaticRows {
    td: TupleDesc,
    rows: Vec<Tuple>,
    cursor: usize,
}

impl StaticRows {
    fn new(td: TupleDesc, rows: Vec<Tuple>) -> Self {
        StaticRows { td, rows, cursor: 0 }
    }
}

impl Executor for StaticRows {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        Ok(self.cursor < self.rows.len())
    }

    fn next(&mut self) -> Result<Tuple, ExecutionError> {
        let t = self
            .rows
            .get(self.cursor)
            .cloned()
            .ok_or(ExecutionError::NoSuchTuple)?;
        self.cursor += 1;
        Ok(t)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {}

    fn schema(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&mut self) -> Vec<&mut BoxedExecutor> {
        Vec::new()
    }

    fn set_children(&mut self, _children: Vec<BoxedExecutor>) -> Result<(), ExecutionError> {
        Ok(())
    }
}

#[test]
fn seq_scan_streams_all_rows_in_slot_order() {
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 10);

    let tid = TransactionId::new();
    let mut scan = SeqScan::new(db.clone(), tid, table).unwrap();
    let rows = drain(&mut scan);
    assert_eq!(rows.len(), 10);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(*row.field(0).unwrap(), Field::Int(i as i32 + 1));
    }
    scan.close();
    db.transaction_complete(tid, true).unwrap();
}

#[test]
fn filter_over_scan_selects_matching_ids() {
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 10);

    let tid = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid, table).unwrap();
    let mut filter = Filter::new(
        Predicate::new(0, Op::GreaterThan, Field::Int(5)),
        Box::new(scan),
    );
    let rows = drain(&mut filter);
    assert_eq!(rows.len(), 5);
    let ids: Vec<i32> = rows
        .iter()
        .map(|r| match r.field(0).unwrap() {
            Field::Int(v) => *v,
            other => panic!("expected int id, got {:?}", other),
        })
        .collect();
    assert_eq!(ids, vec![6, 7, 8, 9, 10]);
    filter.close();
    db.transaction_complete(tid, true).unwrap();
}

#[test]
fn filter_with_string_like_predicate() {
    let (_dir, db) = common::setup(common::test_options());
    let table = db.create_table("people", common::id_name_desc(), "id").unwrap();
    let tid = TransactionId::new();
    for (id, name) in [(1, "marble"), (2, "stone"), (3, "bramble")] {
        db.insert_tuple(tid, table, common::id_name_row(id, name))
            .unwrap();
    }
    db.transaction_complete(tid, true).unwrap();

    let tid2 = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid2, table).unwrap();
    let mut filter = Filter::new(
        Predicate::new(1, Op::Like, Field::Str("mble".to_string())),
        Box::new(scan),
    );
    let rows = drain(&mut filter);
    assert_eq!(rows.len(), 2);
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn scan_rewind_replays_from_the_top() {
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 4);

    let tid = TransactionId::new();
    let mut scan = SeqScan::new(db.clone(), tid, table).unwrap();
    scan.open().unwrap();
    scan.next().unwrap();
    scan.next().unwrap();
    scan.rewind().unwrap();
    let first = scan.next().unwrap();
    assert_eq!(*first.field(0).unwrap(), Field::Int(1));
    db.transaction_complete(tid, true).unwrap();
}

#[test]
fn operators_reject_use_before_open() {
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 2);

    let tid = TransactionId::new();
    let mut scan = SeqScan::new(db.clone(), tid, table).unwrap();
    assert!(matches!(
        scan.has_next(),
        Err(ExecutionError::ClosedOperator)
    ));
    scan.open().unwrap();
    scan.close();
    assert!(matches!(scan.next(), Err(ExecutionError::ClosedOperator)));
    db.transaction_complete(tid, true).unwrap();
}

#[test]
fn insert_operator_reports_count_once() {
    let (_dir, db) = common::setup(common::test_options());
    let source = common::setup_people(&db, 7);
    let dest = db.create_table("copies", common::id_name_desc(), "id").unwrap();

    let tid = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid, source).unwrap();
    let mut insert = Insert::new(db.clone(), tid, Box::new(scan), dest).unwrap();
    insert.open().unwrap();

    assert!(insert.has_next().unwrap());
    let result = insert.next().unwrap();
    assert_eq!(*result.field(0).unwrap(), Field::Int(7));
    // one-shot: the stream ends after the count tuple
    assert!(!insert.has_next().unwrap());
    assert!(matches!(insert.next(), Err(ExecutionError::NoSuchTuple)));
    insert.close();
    db.transaction_complete(tid, true).unwrap();

    let tid2 = TransactionId::new();
    let mut check = SeqScan::new(db.clone(), tid2, dest).unwrap();
    assert_eq!(drain(&mut check).len(), 7);
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn insert_rejects_mismatched_child_schema() {
    let (_dir, db) = common::setup(common::test_options());
    let ints = db
        .create_table(
            "ints",
            keystone::TupleDesc::new(vec![(Type::Int, "v".to_string())]),
            "v",
        )
        .unwrap();
    let people = common::setup_people(&db, 1);

    let tid = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid, people).unwrap();
    assert!(Insert::new(db.clone(), tid, Box::new(scan), ints).is_err());
    db.transaction_complete(tid, false).unwrap();
}

#[test]
fn delete_operator_removes_filtered_rows() {
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 10);

    let tid = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid, table).unwrap();
    let filter = Filter::new(
        Predicate::new(0, Op::LessThanOrEq, Field::Int(4)),
        Box::new(scan),
    );
    let mut delete = Delete::new(db.clone(), tid, Box::new(filter));
    let rows = drain(&mut delete);
    assert_eq!(rows.len(), 1);
    assert_eq!(*rows[0].field(0).unwrap(), Field::Int(4));
    delete.close();
    db.transaction_complete(tid, true).unwrap();

    let tid2 = TransactionId::new();
    let mut check = SeqScan::new(db.clone(), tid2, table).unwrap();
    let remaining = drain(&mut check);
    assert_eq!(remaining.len(), 6);
    assert!(remaining
        .iter()
        .all(|r| r.field(0).unwrap().compare(Op::GreaterThan, &Field::Int(4))));
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn delete_counts_only_the_tuples_it_could_remove() {
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 2);

    // one tuple straight off the table (addressable) and one built by hand
    // with no record id (not addressable)
    let tid = TransactionId::new();
    let mut scan = SeqScan::new(db.clone(), tid, table).unwrap();
    let scanned = drain(&mut scan).swap_remove(0);
    scan.close();
    let fresh = common::id_name_row(77, "nowhere");
    let child = StaticRows::new(common::id_name_desc(), vec![scanned, fresh]);

    let mut delete = Delete::new(db.clone(), tid, Box::new(child));
    let rows = drain(&mut delete);
    assert_eq!(*rows[0].field(0).unwrap(), Field::Int(1));
    delete.close();
    db.transaction_complete(tid, true).unwrap();

    let tid2 = TransactionId::new();
    let mut check = SeqScan::new(db.clone(), tid2, table).unwrap();
    assert_eq!(drain(&mut check).len(), 1);
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn aggregate_over_scan_groups_and_averages() {
    let (_dir, db) = common::setup(common::test_options());
    let table = db.create_table("kv", common::id_name_desc(), "id").unwrap();
    // (value, group): group by the string column, average the int column
    let tid = TransactionId::new();
    for (v, g) in [(1, "A"), (3, "A"), (5, "B")] {
        db.insert_tuple(tid, table, common::id_name_row(v, g)).unwrap();
    }
    db.transaction_complete(tid, true).unwrap();

    let tid2 = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid2, table).unwrap();
    let mut agg = Aggregate::new(Box::new(scan), 0, Some(1), AggregateOp::Avg).unwrap();
    let rows = drain(&mut agg);
    assert_eq!(rows.len(), 2);
    assert_eq!(*rows[0].field(0).unwrap(), Field::Str("A".to_string()));
    assert_eq!(*rows[0].field(1).unwrap(), Field::Int(2));
    assert_eq!(*rows[1].field(0).unwrap(), Field::Str("B".to_string()));
    assert_eq!(*rows[1].field(1).unwrap(), Field::Int(5));
    assert_eq!(agg.schema().field_name(0).unwrap(), "groupVal");
    assert_eq!(agg.schema().field_name(1).unwrap(), "aggregateVal");
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn scan_by_name_uses_the_catalog() {
    let (_dir, db) = common::setup(common::test_options());
    common::setup_people(&db, 3);

    let tid = TransactionId::new();
    let mut scan = SeqScan::by_name(db.clone(), tid, "people").unwrap();
    assert_eq!(drain(&mut scan).len(), 3);
    assert!(matches!(
        SeqScan::by_name(db.clone(), tid, "nobody"),
        Err(ExecutionError::TableNotFound(_))
    ));
    db.transaction_complete(tid, true).unwrap();
}

#[test]
fn filter_children_can_be_swapped() {
    let (_dir, db) = common::setup(common::test_options());
    let small = common::setup_people(&db, 3);
    let big = db.create_table("others", common::id_name_desc(), "id").unwrap();
    let tid = TransactionId::new();
    for id in 1..=8 {
        db.insert_tuple(tid, big, common::id_name_row(id, "x")).unwrap();
    }
    db.transaction_complete(tid, true).unwrap();

    let tid2 = TransactionId::new();
    let scan_small = SeqScan::new(db.clone(), tid2, small).unwrap();
    let mut filter = Filter::new(
        Predicate::new(0, Op::GreaterThanOrEq, Field::Int(1)),
        Box::new(scan_small),
    );
    assert_eq!(drain(&mut filter).len(), 3);
    assert_eq!(filter.children().len(), 1);

    let scan_big = SeqScan::new(db.clone(), tid2, big).unwrap();
    filter.set_children(vec![Box::new(scan_big)]).unwrap();
    assert_eq!(drain(&mut filter).len(), 8);
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn filter_count_matches_a_manual_count() {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(42);
    let values: Vec<i32> = (0..60).map(|_| rng.gen_range(0..100)).collect();

    let (_dir, db) = common::setup(common::test_options());
    let table = db.create_table("people", common::id_name_desc(), "id").unwrap();
    let tid = TransactionId::new();
    for v in &values {
        db.insert_tuple(tid, table, common::id_name_row(*v, "r")).unwrap();
    }
    db.transaction_complete(tid, true).unwrap();

    let expected = values.iter().filter(|v| **v > 50).count();
    let tid2 = TransactionId::new();
    let scan = SeqScan::new(db.clone(), tid2, table).unwrap();
    let mut filter = Filter::new(
        Predicate::new(0, Op::GreaterThan, Field::Int(50)),
        Box::new(scan),
    );
    assert_eq!(drain(&mut filter).len(), expected);
    db.transaction_complete(tid2, true).unwrap();
}

#[test]
fn scans_split_across_pages_see_every_row() {
    // 1 KiB pages with (int, string) rows: a handful of rows per page,
    // so 40 rows span several pages
    let (_dir, db) = common::setup(common::test_options());
    let table = common::setup_people(&db, 40);
    assert!(db.catalog().file(table).unwrap().num_pages() > 1);

    let tid = TransactionId::new();
    let mut scan = SeqScan::new(db.clone(), tid, table).unwrap();
    assert_eq!(drain(&mut scan).len(), 40);
    db.transaction_complete(tid, true).unwrap();
}
