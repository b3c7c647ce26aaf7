// End-to-end durability and atomicity scenarios: committed work survives a
// reopen, rolled-back work vanishes, and uncommitted work left by a dead
// process is undone by startup recovery.

use chrono::{TimeZone, Utc};
use quarrydb::{BlockId, Database};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn committed_write_survives_reopen_and_recovery() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    {
        let db = Database::open(dir.path()).unwrap();
        let mut tx = db.new_tx().unwrap();
        let block = tx.append("data.tbl").unwrap();
        tx.pin(&block).unwrap();
        tx.set_int(&block, 80, 42, true).unwrap();
        tx.commit().unwrap();
    }

    let db = Database::open(dir.path()).unwrap();
    db.recover().unwrap();

    let mut tx = db.new_tx().unwrap();
    let block = BlockId::new("data.tbl", 0);
    tx.pin(&block).unwrap();
    assert_eq!(tx.get_int(&block, 80).unwrap(), 42);
    tx.commit().unwrap();
}

#[test]
fn rollback_restores_the_old_value() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    let mut tx = db.new_tx().unwrap();
    let block = tx.append("data.tbl").unwrap();
    tx.pin(&block).unwrap();
    tx.set_int(&block, 80, 99, true).unwrap();
    assert_eq!(tx.get_int(&block, 80).unwrap(), 99);
    tx.rollback().unwrap();

    let mut check = db.new_tx().unwrap();
    check.pin(&block).unwrap();
    // Freshly appended blocks are zeroed, so the undo restores 0.
    assert_eq!(check.get_int(&block, 80).unwrap(), 0);
    check.commit().unwrap();
}

#[test]
fn rollback_restores_every_value_type() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();
    let stamp = Utc.with_ymd_and_hms(2023, 4, 1, 8, 0, 0).unwrap();

    let block = {
        let mut setup = db.new_tx().unwrap();
        let block = setup.append("data.tbl").unwrap();
        setup.pin(&block).unwrap();
        setup.set_int(&block, 0, 10, true).unwrap();
        setup.set_long(&block, 8, 20, true).unwrap();
        setup.set_short(&block, 16, 30, true).unwrap();
        setup.set_string(&block, 24, "before", true).unwrap();
        setup.set_bool(&block, 60, true, true).unwrap();
        setup.set_date(&block, 70, &stamp, true).unwrap();
        setup.commit().unwrap();
        block
    };

    let mut tx = db.new_tx().unwrap();
    tx.pin(&block).unwrap();
    tx.set_int(&block, 0, -1, true).unwrap();
    tx.set_long(&block, 8, -2, true).unwrap();
    tx.set_short(&block, 16, -3, true).unwrap();
    tx.set_string(&block, 24, "after!", true).unwrap();
    tx.set_bool(&block, 60, false, true).unwrap();
    tx.set_date(&block, 70, &Utc::now(), true).unwrap();
    tx.rollback().unwrap();

    let mut check = db.new_tx().unwrap();
    check.pin(&block).unwrap();
    assert_eq!(check.get_int(&block, 0).unwrap(), 10);
    assert_eq!(check.get_long(&block, 8).unwrap(), 20);
    assert_eq!(check.get_short(&block, 16).unwrap(), 30);
    assert_eq!(check.get_string(&block, 24).unwrap(), "before");
    assert!(check.get_bool(&block, 60).unwrap());
    assert_eq!(check.get_date(&block, 70).unwrap(), stamp);
    check.commit().unwrap();
}

#[test]
fn startup_recovery_undoes_uncommitted_work() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    {
        let db = Database::open(dir.path()).unwrap();
        let mut tx = db.new_tx().unwrap();
        let block = tx.append("data.tbl").unwrap();
        tx.pin(&block).unwrap();
        tx.set_int(&block, 80, 7, true).unwrap();

        // Simulate a crash after the dirty page reached disk but before
        // commit: flush the transaction's buffers and drop everything.
        db.buffer_manager().flush_all(tx.tx_num()).unwrap();
        drop(tx);
    }

    let db = Database::open(dir.path()).unwrap();
    db.recover().unwrap();

    let mut tx = db.new_tx().unwrap();
    let block = BlockId::new("data.tbl", 0);
    tx.pin(&block).unwrap();
    assert_eq!(tx.get_int(&block, 80).unwrap(), 0);
    tx.commit().unwrap();
}

#[test]
fn recovery_spares_committed_neighbors() {
    let dir = tempfile::tempdir().unwrap();

    {
        let db = Database::open(dir.path()).unwrap();
        let mut committed = db.new_tx().unwrap();
        let block = committed.append("data.tbl").unwrap();
        committed.pin(&block).unwrap();
        committed.set_int(&block, 40, 1111, true).unwrap();
        committed.commit().unwrap();

        let mut loser = db.new_tx().unwrap();
        loser.pin(&block).unwrap();
        loser.set_int(&block, 40, 2222, true).unwrap();
        db.buffer_manager().flush_all(loser.tx_num()).unwrap();
        drop(loser);
    }

    let db = Database::open(dir.path()).unwrap();
    db.recover().unwrap();

    let mut tx = db.new_tx().unwrap();
    let block = BlockId::new("data.tbl", 0);
    tx.pin(&block).unwrap();
    assert_eq!(tx.get_int(&block, 40).unwrap(), 1111);
    tx.commit().unwrap();
}

#[test]
fn size_and_append_track_file_growth() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    let mut tx = db.new_tx().unwrap();
    assert_eq!(tx.size("data.tbl").unwrap(), 0);
    tx.append("data.tbl").unwrap();
    tx.append("data.tbl").unwrap();
    assert_eq!(tx.size("data.tbl").unwrap(), 2);
    assert_eq!(tx.block_size(), 400);
    tx.commit().unwrap();
}

#[test]
fn reading_an_unpinned_block_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path()).unwrap();

    let mut tx = db.new_tx().unwrap();
    let block = tx.append("data.tbl").unwrap();
    assert!(matches!(
        tx.get_int(&block, 0),
        Err(quarrydb::DbError::BlockNotPinned(_))
    ));
    tx.rollback().unwrap();
}
