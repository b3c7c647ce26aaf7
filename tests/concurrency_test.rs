// Concurrency scenarios: shared readers coexist, writer conflicts resolve
// by timeout with a single loser, phantom appends wait out size(), and an
// exhausted buffer pool aborts the waiter.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use quarrydb::{Database, DbConfig, DbError};

fn open_db(dir: &std::path::Path, config: DbConfig) -> Arc<Database> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Arc::new(Database::new(dir, config).unwrap())
}

/// Creates `count` blocks of `file` so tests can pin real blocks.
fn seed_blocks(db: &Database, file: &str, count: usize) -> Vec<quarrydb::BlockId> {
    let mut tx = db.new_tx().unwrap();
    let blocks = (0..count).map(|_| tx.append(file).unwrap()).collect();
    tx.commit().unwrap();
    blocks
}

#[test]
fn shared_readers_do_not_block_each_other() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(
        dir.path(),
        DbConfig::default().with_lock_wait_timeout(Duration::from_millis(500)),
    );
    let blocks = seed_blocks(&db, "data.tbl", 2);
    let block = blocks[1].clone();

    let mut t1 = db.new_tx().unwrap();
    let mut t2 = db.new_tx().unwrap();
    t1.pin(&block).unwrap();
    t2.pin(&block).unwrap();

    // Both hold an S lock on the same block at once; neither aborts.
    assert_eq!(t1.get_int(&block, 0).unwrap(), 0);
    assert_eq!(t2.get_int(&block, 0).unwrap(), 0);

    t1.commit().unwrap();
    t2.commit().unwrap();
}

#[test]
fn crossed_lock_requests_abort_exactly_one_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(
        dir.path(),
        DbConfig::default().with_lock_wait_timeout(Duration::from_secs(1)),
    );
    let blocks = seed_blocks(&db, "data.tbl", 3);
    let (blk1, blk2) = (blocks[1].clone(), blocks[2].clone());
    let barrier = Arc::new(Barrier::new(2));

    // T1 takes X(blk2) then wants S(blk1); T2 takes X(blk1) then wants
    // S(blk2). T1 starts waiting first, so its budget expires first; its
    // rollback releases blk2 and lets T2 finish.
    let t1_handle = {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        let (blk1, blk2) = (blk1.clone(), blk2.clone());
        thread::spawn(move || {
            let mut tx = db.new_tx().unwrap();
            tx.pin(&blk1).unwrap();
            tx.pin(&blk2).unwrap();
            tx.set_int(&blk2, 0, 0, false).unwrap();
            barrier.wait();
            match tx.get_int(&blk1, 0) {
                Ok(_) => {
                    tx.commit().unwrap();
                    false
                }
                Err(DbError::LockAbort(_)) => {
                    tx.rollback().unwrap();
                    true
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        })
    };

    let t2_handle = {
        let db = Arc::clone(&db);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let mut tx = db.new_tx().unwrap();
            tx.pin(&blk1).unwrap();
            tx.pin(&blk2).unwrap();
            tx.set_int(&blk1, 0, 0, false).unwrap();
            barrier.wait();
            thread::sleep(Duration::from_millis(300));
            match tx.get_int(&blk2, 0) {
                Ok(_) => {
                    tx.commit().unwrap();
                    false
                }
                Err(DbError::LockAbort(_)) => {
                    tx.rollback().unwrap();
                    true
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        })
    };

    let t1_aborted = t1_handle.join().unwrap();
    let t2_aborted = t2_handle.join().unwrap();
    assert!(
        t1_aborted ^ t2_aborted,
        "exactly one transaction must abort (t1: {t1_aborted}, t2: {t2_aborted})"
    );
}

#[test]
fn size_holds_off_concurrent_append() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(
        dir.path(),
        DbConfig::default().with_lock_wait_timeout(Duration::from_secs(5)),
    );
    seed_blocks(&db, "data.tbl", 1);

    let mut reader = db.new_tx().unwrap();
    let observed = reader.size("data.tbl").unwrap();

    let appender = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            let mut tx = db.new_tx().unwrap();
            tx.append("data.tbl").unwrap();
            tx.commit().unwrap();
        })
    };

    // The appender is stuck behind our sentinel S lock: the size we saw
    // stays true as long as we hold it.
    thread::sleep(Duration::from_millis(200));
    assert_eq!(reader.size("data.tbl").unwrap(), observed);
    reader.commit().unwrap();

    appender.join().unwrap();
    let mut check = db.new_tx().unwrap();
    assert_eq!(check.size("data.tbl").unwrap(), observed + 1);
    check.commit().unwrap();
}

#[test]
fn exhausted_buffer_pool_aborts_the_waiter() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(
        dir.path(),
        DbConfig::default()
            .with_buffer_count(1)
            .with_pin_wait_timeout(Duration::from_millis(200)),
    );
    let blocks = seed_blocks(&db, "data.tbl", 2);

    let mut t1 = db.new_tx().unwrap();
    t1.pin(&blocks[0]).unwrap();

    let mut t2 = db.new_tx().unwrap();
    assert!(matches!(
        t2.pin(&blocks[1]),
        Err(DbError::BufferAbort(_))
    ));
    t2.rollback().unwrap();

    // Once T1 lets go, the pool serves new pins again.
    t1.commit().unwrap();
    let mut t3 = db.new_tx().unwrap();
    t3.pin(&blocks[1]).unwrap();
    t3.commit().unwrap();
}
