use super::*;
use common::ErrorCategory;
use proptest::prelude::*;
use tempfile::tempdir;

const PAGE: usize = 128;

fn page_of(byte: u8) -> Vec<u8> {
    vec![byte; PAGE]
}

/// Contract checks shared by both backends.
fn exercise_store(store: &mut dyn PageStore) {
    let a = store.assign_empty_page().unwrap();
    let b = store.assign_empty_page().unwrap();
    assert_eq!(a, 0);
    assert_eq!(b, PAGE as Offset);
    assert_eq!(store.page_count().unwrap(), 2);

    assert_eq!(store.reader(a).unwrap(), page_of(0));

    store.writer(b, &page_of(7)).unwrap();
    assert_eq!(store.reader(b).unwrap(), page_of(7));

    store.delete(b).unwrap();
    assert_eq!(store.reader(b).unwrap(), page_of(0));
}

#[test]
fn memory_store_contract() {
    let mut store = MemoryPageStore::new(PAGE).unwrap();
    exercise_store(&mut store);
}

#[test]
fn file_store_contract() {
    let dir = tempdir().unwrap();
    let mut store = FilePageStore::create(&dir.path().join("pages.db"), PAGE).unwrap();
    exercise_store(&mut store);
}

#[test]
fn short_buffer_is_rejected_without_writing() {
    let mut store = MemoryPageStore::new(PAGE).unwrap();
    let off = store.assign_empty_page().unwrap();
    let err = store.writer(off, &[1u8; PAGE - 1]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Input);
    assert_eq!(err.module(), Module::Storage);
    assert_eq!(store.reader(off).unwrap(), page_of(0));
}

#[test]
fn long_buffer_is_rejected_by_file_store() {
    let dir = tempdir().unwrap();
    let mut store = FilePageStore::create(&dir.path().join("pages.db"), PAGE).unwrap();
    let off = store.assign_empty_page().unwrap();
    let err = store.writer(off, &[1u8; PAGE + 1]).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Input);
    assert_eq!(store.page_count().unwrap(), 1);
}

#[test]
fn unaligned_and_unassigned_offsets_fail() {
    let mut store = MemoryPageStore::new(PAGE).unwrap();
    store.assign_empty_page().unwrap();
    assert!(store.reader(3).is_err());
    assert!(store.reader(-1).is_err());
    assert!(store.reader(PAGE as Offset * 4).is_err());

    let dir = tempdir().unwrap();
    let file = FilePageStore::create(&dir.path().join("pages.db"), PAGE).unwrap();
    assert!(file.reader(0).is_err());
}

#[test]
fn deleted_memory_pages_are_not_reassigned() {
    let mut store = MemoryPageStore::new(PAGE).unwrap();
    let a = store.assign_empty_page().unwrap();
    store.delete(a).unwrap();
    let b = store.assign_empty_page().unwrap();
    assert_ne!(a, b);
}

#[test]
fn file_pages_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pages.db");
    {
        let mut store = FilePageStore::create(&path, PAGE).unwrap();
        let off = store.assign_empty_page().unwrap();
        store.assign_empty_page().unwrap();
        store.writer(off, &page_of(9)).unwrap();
        store.close().unwrap();
    }

    let store = FilePageStore::open(&path, PAGE).unwrap();
    assert_eq!(store.page_count().unwrap(), 2);
    assert_eq!(store.reader(0).unwrap(), page_of(9));
    assert_eq!(store.reader(PAGE as Offset).unwrap(), page_of(0));
}

#[test]
fn read_only_file_store_refuses_writes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pages.db");
    {
        let mut store = FilePageStore::create(&path, PAGE).unwrap();
        let offset = store.assign_empty_page().unwrap();
        store.writer(offset, &page_of(9)).unwrap();
        store.close().unwrap();
    }

    let mut store = FilePageStore::open_read_only(&path, PAGE).unwrap();
    assert!(store.is_read_only());
    assert_eq!(store.reader(0).unwrap(), page_of(9));
    for err in [
        store.writer(0, &page_of(1)).unwrap_err(),
        store.delete(0).unwrap_err(),
        store.assign_empty_page().unwrap_err(),
    ] {
        assert!(matches!(err, DbError::Logic { .. }));
    }
    assert_eq!(store.page_count().unwrap(), 1);
    assert_eq!(store.reader(0).unwrap(), page_of(9));
    store.sync().unwrap();
    store.close().unwrap();
}

#[test]
fn opening_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = FilePageStore::open(&dir.path().join("missing.db"), PAGE).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
}

#[test]
fn ragged_file_is_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pages.db");
    std::fs::write(&path, vec![0u8; PAGE + 3]).unwrap();
    let err = FilePageStore::open(&path, PAGE).unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn closed_store_rejects_calls() {
    let mut store = MemoryPageStore::new(PAGE).unwrap();
    store.close().unwrap();
    assert!(store.assign_empty_page().is_err());

    let dir = tempdir().unwrap();
    let mut file = FilePageStore::create(&dir.path().join("pages.db"), PAGE).unwrap();
    file.close().unwrap();
    assert!(file.assign_empty_page().is_err());
    assert!(file.close().is_err());
}

#[test]
fn config_selects_backend() {
    let dir = tempdir().unwrap();
    let config = Config::builder()
        .data_dir(dir.path().join("nested"))
        .page_size(256)
        .build();
    let mut store = open_page_store(&config).unwrap();
    store.assign_empty_page().unwrap();
    store.close().unwrap();
    assert!(config.index_path().exists());

    let memory = Config::builder()
        .storage(common::StorageMode::Memory)
        .page_size(256)
        .build();
    let store = open_page_store(&memory).unwrap();
    assert_eq!(store.page_size(), 256);
}

proptest! {
    #[test]
    fn last_write_wins(writes in prop::collection::vec((0usize..4, any::<u8>()), 1..20)) {
        let mut store = MemoryPageStore::new(PAGE).unwrap();
        let offsets: Vec<Offset> = (0..4).map(|_| store.assign_empty_page().unwrap()).collect();
        let mut expected = [0u8; 4];
        for (slot, byte) in writes {
            store.writer(offsets[slot], &page_of(byte)).unwrap();
            expected[slot] = byte;
        }
        for (slot, off) in offsets.iter().enumerate() {
            prop_assert_eq!(store.reader(*off).unwrap(), page_of(expected[slot]));
        }
    }
}
