//! Integration tests for data files across access modes.

use segfile_core::{
    Cell, Config, CoreError, DataFile, DeletionTime, DiskAccessMode, FileDataInput, SliceState,
};
use segfile_testkit::{standard_row, TestDataFile, TestRow};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn mmap(cap: u64) -> Config {
    Config::new()
        .disk_access_mode(DiskAccessMode::Mmap)
        .max_segment_size(cap)
}

fn standard() -> Config {
    Config::new().disk_access_mode(DiskAccessMode::Standard)
}

fn names(data: &DataFile, position: u64, finish: &[u8]) -> Vec<String> {
    data.slice(position, finish)
        .unwrap()
        .map(|cell| String::from_utf8(cell.unwrap().name().to_vec()).unwrap())
        .collect()
}

fn all_cells(data: &DataFile, position: u64) -> Vec<Cell> {
    data.slice(position, b"").unwrap().map(|c| c.unwrap()).collect()
}

#[test]
fn slice_stops_after_finish_in_every_mode() {
    for config in [mmap(1 << 20), mmap(16), standard()] {
        let fixture = TestDataFile::write(
            config,
            vec![
                TestRow::with_names("first", &["a", "b", "c", "d", "e"]),
                TestRow::with_names("second", &["x", "y"]),
            ],
        );
        let position = fixture.index()[0].position;

        assert_eq!(names(fixture.data(), position, b"c"), ["a", "b", "c"]);
        assert_eq!(names(fixture.data(), position, b"bb"), ["a", "b"]);
        assert_eq!(names(fixture.data(), position, b""), ["a", "b", "c", "d", "e"]);
        assert_eq!(names(fixture.data(), fixture.index()[1].position, b"a"), Vec::<String>::new());
    }
}

#[test]
fn slice_exposes_row_deletion_before_cells() {
    let deletion = DeletionTime::new(1_700_000_000_000, 1_700_000_000);
    let fixture = TestDataFile::write(
        mmap(1 << 20),
        vec![TestRow::with_names("gone", &["a"]).deleted(deletion)],
    );

    let mut reader = fixture.data().slice(fixture.index()[0].position, b"").unwrap();
    assert!(reader.column_family().is_marked_for_delete());
    assert_eq!(reader.column_family().deletion_info(), deletion);

    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().is_none());
    assert_eq!(reader.state(), SliceState::Exhausted);
}

#[test]
fn mapped_and_buffered_files_read_alike() {
    let rows: Vec<TestRow> = (0..30).map(|i| standard_row(i, 1 + i % 6, 40)).collect();
    let small = TestDataFile::write(mmap(700), rows.clone());
    let tiny = TestDataFile::write(mmap(50), rows.clone());
    let buffered = TestDataFile::write(standard(), rows.clone());

    assert_eq!(small.data().length(), buffered.data().length());
    for (i, row) in rows.iter().enumerate() {
        let position = buffered.index()[i].position;
        assert_eq!(small.index()[i].position, position);

        let expected = all_cells(buffered.data(), position);
        assert_eq!(expected, row.cells);
        assert_eq!(all_cells(small.data(), position), expected);
        assert_eq!(all_cells(tiny.data(), position), expected);
    }
}

#[test]
fn segment_inputs_are_bounded_and_cover_file() {
    let fixture = TestDataFile::builder().config(mmap(1024)).rows(20).build();
    let file = fixture.data().segmented_file();

    let mut covered = 0;
    for input in file.iter_from(0) {
        let input = input.unwrap();
        assert_eq!(input.position(), covered);
        assert!(input.bytes_remaining() <= 1024);
        covered += input.bytes_remaining();
    }
    assert_eq!(covered, fixture.data().length());
}

#[test]
fn reopen_without_sidecar_matches_reopen_with_it() {
    let fixture = TestDataFile::builder().config(mmap(900)).rows(12).build();
    let with_sidecar = fixture.reopen();

    std::fs::remove_file(fixture.bounds_path()).unwrap();
    let rescanned = fixture.reopen();

    let first: Vec<(u64, u64)> = with_sidecar
        .segmented_file()
        .iter_from(0)
        .map(|s| {
            let s = s.unwrap();
            (s.position(), s.bytes_remaining())
        })
        .collect();
    let second: Vec<(u64, u64)> = rescanned
        .segmented_file()
        .iter_from(0)
        .map(|s| {
            let s = s.unwrap();
            (s.position(), s.bytes_remaining())
        })
        .collect();
    assert_eq!(first, second);
}

#[test]
fn changed_access_mode_is_reported() {
    let fixture = TestDataFile::builder().config(standard()).rows(2).build();
    let err = fixture.reopen_with(&mmap(1 << 20)).unwrap_err();

    assert!(matches!(err, CoreError::AccessModeMismatch { .. }));
    assert!(err.to_string().contains("DiskAccessMode was changed"));
}

#[test]
fn damaged_cell_marks_file_suspect() {
    let fixture = TestDataFile::builder().config(standard()).rows(3).build();
    let position = fixture.index()[1].position;

    // Kind byte of the first cell: key "key-000001" and name "cell-0000".
    let kind_offset = position + 2 + 10 + 8 + 12 + 2 + 9;
    let mut file = OpenOptions::new().write(true).open(fixture.path()).unwrap();
    file.seek(SeekFrom::Start(kind_offset)).unwrap();
    file.write_all(&[9]).unwrap();
    file.sync_all().unwrap();

    let data = fixture.reopen();
    assert!(!data.is_suspect());
    let mut reader = data.slice(position, b"").unwrap();
    let err = reader.next().unwrap().unwrap_err();

    assert!(err.is_corruption());
    assert!(data.is_suspect());
    assert!(reader.next().is_none());
    assert_eq!(all_cells(&data, fixture.index()[0].position).len(), 8);
}

#[test]
fn shared_copies_release_in_any_order() {
    let fixture = TestDataFile::builder().config(mmap(512)).rows(6).build();
    let position = fixture.index()[2].position;

    let mut original = fixture.reopen();
    let mut copy = original.shared_copy();
    assert_eq!(original.segmented_file().ref_count(), 2);

    assert!(!original.close());
    assert_eq!(all_cells(&copy, position).len(), 8);
    assert!(copy.close());
    assert!(copy.segmented_file().is_closed());

    let mut original = fixture.reopen();
    let mut copy = original.shared_copy();
    assert!(!copy.close());
    assert_eq!(all_cells(&original, position).len(), 8);
    assert!(original.close());
}

#[test]
fn concurrent_closes_tear_down_once() {
    for config in [mmap(256), standard()] {
        let fixture = TestDataFile::builder().config(config).rows(10).build();
        let original = fixture.reopen();
        let teardowns = AtomicUsize::new(0);

        let copies: Vec<DataFile> = (0..8).map(|_| original.shared_copy()).collect();
        drop(original);

        thread::scope(|scope| {
            for mut copy in copies {
                let teardowns = &teardowns;
                let fixture = &fixture;
                scope.spawn(move || {
                    let position = fixture.index()[5].position;
                    assert_eq!(all_cells(&copy, position).len(), 8);
                    if copy.close() {
                        teardowns.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn open_reader_outlives_close() {
    let fixture = TestDataFile::builder().config(mmap(1 << 20)).rows(4).build();
    let mut data = fixture.reopen();
    let mut input = data.data_input(fixture.index()[3].position).unwrap();

    assert!(data.close());
    let reader = fixture.data().slice_with(input.as_mut(), fixture.index()[3].position, b"");
    assert_eq!(reader.unwrap().count(), 8);
}

#[test]
fn position_at_end_is_rejected() {
    let fixture = TestDataFile::builder().rows(2).build();
    let err = fixture.data().slice(fixture.data().length(), b"").unwrap_err();
    assert!(matches!(err, CoreError::InvalidOperation { .. }));
}
